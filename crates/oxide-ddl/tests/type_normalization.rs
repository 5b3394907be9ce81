//! Type normalization and default lengths.

mod common;

use common::DATABASES;
use oxide_ddl::prelude::*;

const DEFAULT_LENGTHS: &[(DatabaseType, &str, Option<&str>)] = &[
    (DatabaseType::Sqlite, "varchar", None),
    (DatabaseType::Sqlite, "text", None),
    (DatabaseType::SqlServer, "char", Some("1")),
    (DatabaseType::SqlServer, "nchar", Some("1")),
    (DatabaseType::SqlServer, "binary", Some("1")),
    (DatabaseType::SqlServer, "varbinary", Some("1")),
    (DatabaseType::SqlServer, "varchar", Some("255")),
    (DatabaseType::SqlServer, "nvarchar", Some("255")),
    (DatabaseType::Oracle, "char", Some("1")),
    (DatabaseType::Oracle, "nchar", Some("1")),
    (DatabaseType::Oracle, "varchar2", Some("255")),
    (DatabaseType::Oracle, "nvarchar2", Some("255")),
    (DatabaseType::Oracle, "raw", Some("2000")),
    (DatabaseType::Oracle, "uuid", Some("36")),
];

#[test]
fn test_default_lengths() {
    for (database, name, expected) in DEFAULT_LENGTHS {
        let dialect = database.dialect();
        let descriptor = ColumnTypeDescriptor::named(*name);
        assert_eq!(
            dialect.column_length(&descriptor).as_deref(),
            *expected,
            "{database:?} {name}"
        );
    }
}

#[test]
fn test_explicit_length_is_kept() {
    for database in DATABASES {
        let dialect = database.dialect();
        for name in dialect.with_length_column_types() {
            let descriptor = ColumnTypeDescriptor::named(*name).length(42);
            assert_eq!(
                dialect.column_length(&descriptor).as_deref(),
                Some("42"),
                "{database:?} {name}"
            );
        }
    }
}

#[test]
fn test_normalize_type_is_pure() {
    let descriptors = [
        ColumnTypeDescriptor::host(HostType::Number),
        ColumnTypeDescriptor::host(HostType::String),
        ColumnTypeDescriptor::host(HostType::Boolean),
        ColumnTypeDescriptor::host(HostType::Date),
        ColumnTypeDescriptor::host(HostType::Buffer),
        ColumnTypeDescriptor::named("uuid"),
        ColumnTypeDescriptor::named("simple-json"),
        ColumnTypeDescriptor::named("simple-array"),
        ColumnTypeDescriptor::named("Integer"),
        ColumnTypeDescriptor::named("decimal").precision(10, Some(2)),
    ];
    for database in DATABASES {
        let dialect = database.dialect();
        let forward: Vec<String> = descriptors.iter().map(|d| dialect.normalize_type(d)).collect();
        let mut backward: Vec<String> = descriptors
            .iter()
            .rev()
            .map(|d| dialect.normalize_type(d))
            .collect();
        backward.reverse();
        assert_eq!(forward, backward, "{database:?}");
        let again: Vec<String> = descriptors.iter().map(|d| dialect.normalize_type(d)).collect();
        assert_eq!(forward, again, "{database:?}");
    }
}

#[test]
fn test_host_types_per_dialect() {
    let expected = [
        (DatabaseType::Sqlite, ["integer", "varchar", "boolean", "datetime"]),
        (DatabaseType::SqlServer, ["int", "nvarchar", "bit", "datetime"]),
        (DatabaseType::Oracle, ["number", "varchar2", "number", "timestamp"]),
    ];
    for (database, names) in expected {
        let dialect = database.dialect();
        let actual = [
            HostType::Number,
            HostType::String,
            HostType::Boolean,
            HostType::Date,
        ]
        .map(|host| dialect.normalize_type(&ColumnTypeDescriptor::host(host)));
        assert_eq!(actual, names.map(String::from), "{database:?}");
    }
}

#[test]
fn test_boolean_round_trip_through_integer() {
    let column = ColumnTypeDescriptor::host(HostType::Boolean);
    for database in DATABASES {
        let dialect = database.dialect();
        let wire = dialect
            .prepare_persistent_value(ColumnValue::Bool(true), &column, None)
            .unwrap();
        assert_eq!(wire, SqlValue::Int(1), "{database:?}");
        let value = dialect.prepare_hydrated_value(wire, &column, None).unwrap();
        assert_eq!(value, ColumnValue::Bool(true), "{database:?}");
    }
}

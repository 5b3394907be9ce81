//! Constraint and index name derivation.
//!
//! Derived names are a pure function of the table name and the column list, so
//! a planner can recompute the name an object *would* have and compare it with
//! the name it actually has. A mismatch means the name was chosen by the user
//! and must survive renames untouched.

use sha2::{Digest, Sha256};

/// Derives names for constraints and indices.
pub trait NamingStrategy: Send + Sync {
    /// Primary key name.
    fn primary_key_name(&self, table: &str, columns: &[String]) -> String;

    /// Unique constraint name.
    fn unique_constraint_name(&self, table: &str, columns: &[String]) -> String;

    /// Index name; the predicate of a partial index takes part in the key.
    fn index_name(&self, table: &str, columns: &[String], where_clause: Option<&str>) -> String;

    /// Check constraint name. Enum checks get a distinct suffix.
    fn check_constraint_name(&self, table: &str, expression: &str, is_enum: bool) -> String;

    /// Foreign key name.
    fn foreign_key_name(
        &self,
        table: &str,
        columns: &[String],
        referenced_table: &str,
        referenced_columns: &[String],
    ) -> String;

    /// Name of the constraint holding a column default.
    fn default_constraint_name(&self, table: &str, column: &str) -> String;
}

/// Hash-based names: a short prefix plus a truncated SHA-256 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamingStrategy;

impl DefaultNamingStrategy {
    /// Creates the strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn table_key(table: &str) -> String {
        let bare = table.rsplit('.').next().unwrap_or(table);
        bare.replace('.', "_")
    }

    fn columns_key(table: &str, columns: &[String]) -> String {
        let mut sorted = columns.to_vec();
        sorted.sort();
        format!("{}_{}", Self::table_key(table), sorted.join("_"))
    }
}

fn digest(key: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..len].to_string()
}

impl NamingStrategy for DefaultNamingStrategy {
    fn primary_key_name(&self, table: &str, columns: &[String]) -> String {
        format!("PK_{}", digest(&Self::columns_key(table, columns), 27))
    }

    fn unique_constraint_name(&self, table: &str, columns: &[String]) -> String {
        format!("UQ_{}", digest(&Self::columns_key(table, columns), 27))
    }

    fn index_name(&self, table: &str, columns: &[String], where_clause: Option<&str>) -> String {
        let mut key = Self::columns_key(table, columns);
        if let Some(predicate) = where_clause {
            key.push('_');
            key.push_str(predicate);
        }
        format!("IDX_{}", digest(&key, 26))
    }

    fn check_constraint_name(&self, table: &str, expression: &str, is_enum: bool) -> String {
        let key = format!("{}_{}", Self::table_key(table), expression);
        let name = format!("CHK_{}", digest(&key, 26));
        if is_enum {
            format!("{name}_ENUM")
        } else {
            name
        }
    }

    fn foreign_key_name(
        &self,
        table: &str,
        columns: &[String],
        _referenced_table: &str,
        _referenced_columns: &[String],
    ) -> String {
        format!("FK_{}", digest(&Self::columns_key(table, columns), 27))
    }

    fn default_constraint_name(&self, table: &str, column: &str) -> String {
        let key = format!("{}_{}", Self::table_key(table), column);
        format!("DF_{}", digest(&key, 27))
    }
}

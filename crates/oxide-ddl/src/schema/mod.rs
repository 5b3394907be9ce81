//! Schema model shared by introspection and the DDL planners.

mod constraint;
mod table;
mod view;

pub use constraint::{
    Deferrable, ForeignKeyAction, TableCheck, TableExclusion, TableForeignKey, TableIndex,
    TableUnique,
};
pub use table::{table_path, GeneratedType, GenerationStrategy, Table, TableColumn};
pub use view::View;

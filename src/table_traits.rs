//! Traits and column descriptions common to tables, views and the simulated table store.

use crate::sql_type::SqlType;

/// One column of a relation schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Column {
    pub name: String,
    pub ty: SqlType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: SqlType, nullable: bool) -> Self {
        Column {
            name: name.into(),
            ty,
            nullable,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.ty)?;
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

pub trait TableMeta {
    fn table_name(&self) -> &str;
    fn columns(&self) -> &[Column];

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name.clone()).collect()
    }
    fn column_types(&self) -> Vec<SqlType> {
        self.columns().iter().map(|c| c.ty).collect()
    }
    /// Equivalent SQL for the schema, used when displaying the registry.
    fn creation_sql(&self) -> String {
        format!(
            "CREATE TABLE {} ({})",
            self.table_name(),
            self.columns()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        )
    }
}

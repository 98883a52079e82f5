//! Defines `TableContents`, the logical table store used to simulate INSERT and DELETE statements.
//!
//! Weights are applied as statements are compiled.  A key may transiently carry a negative
//! weight (a retraction that has not been matched yet); such contents are stored as-is and
//! rejected when read through `contents`, which is the only checked read.  Zero weights are
//! pruned on every update.

use crate::table_traits::{Column, TableMeta};
use crate::temp_table::TempTable;
use crate::zset::ZSet;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Unknown table {0}")]
    TableNameNotFound(String),
    #[error("Table {0} already exists")]
    TableAlreadyExists(String),
    #[error("Table {table} has negative weight {weight} for row {row}")]
    NegativeWeight {
        table: String,
        row: String,
        weight: i64,
    },
    #[error("Error updating table {table}: {detail}")]
    Update {
        table: String,
        detail: crate::temp_table::Error,
    },
}

/// The contents of every declared table, as affected by the INSERT and DELETE statements compiled so far.
///
/// Tables are kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableContents {
    temp_tables: Vec<TempTable>,
}

impl TableContents {
    pub fn new() -> Self {
        TableContents::default()
    }

    pub fn new_table(&mut self, table_name: String, columns: Vec<Column>) -> Result<(), Error> {
        if self.get_temp_table(&table_name).is_ok() {
            return Err(Error::TableAlreadyExists(table_name));
        }
        self.temp_tables.push(TempTable::new(table_name, columns));
        Ok(())
    }

    pub fn get_temp_table(&self, tablename: &str) -> Result<&TempTable, Error> {
        self.temp_tables
            .iter()
            .find(|t| t.table_name() == tablename)
            .ok_or_else(|| Error::TableNameNotFound(tablename.to_string()))
    }

    pub fn get_temp_table_mut(&mut self, tablename: &str) -> Result<&mut TempTable, Error> {
        self.temp_tables
            .iter_mut()
            .find(|t| t.table_name() == tablename)
            .ok_or_else(|| Error::TableNameNotFound(tablename.to_string()))
    }

    /// Adds `delta` to the table.  Negative weights retract rows.
    pub fn add_to_table(&mut self, tablename: &str, delta: &ZSet) -> Result<(), Error> {
        self.get_temp_table_mut(tablename)?
            .apply(delta)
            .map_err(|detail| Error::Update {
                table: tablename.to_string(),
                detail,
            })
    }

    pub fn remove_from_table(&mut self, tablename: &str, rows: &ZSet) -> Result<(), Error> {
        self.add_to_table(tablename, &rows.negate())
    }

    /// The current contents of a table.  Fails if any row has a net-negative weight.
    pub fn contents(&self, tablename: &str) -> Result<&ZSet, Error> {
        let table = self.get_temp_table(tablename)?;
        if let Some((row, weight)) = table.rows.first_negative() {
            return Err(Error::NegativeWeight {
                table: tablename.to_string(),
                row: row.to_string(),
                weight,
            });
        }
        Ok(&table.rows)
    }

    /// The current contents of a table, including transient negative weights.
    pub fn raw(&self, tablename: &str) -> Result<&ZSet, Error> {
        Ok(&self.get_temp_table(tablename)?.rows)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.temp_tables.iter().map(|t| t.table_name())
    }

    pub fn tables(&self) -> &[TempTable] {
        &self.temp_tables
    }

    pub fn temp_schema(&self) -> String {
        let mut result = String::new();
        for tt in self.temp_tables.iter() {
            result.push_str(&format!("{};\n", tt.creation_sql()));
        }
        result
    }
}

#[cfg(test)]
fn int_zset(values: &[(i64, i64)]) -> ZSet {
    use crate::sql_value::SqlValue;
    use crate::typed_row::Row;
    let mut z = ZSet::new();
    for (v, w) in values {
        z.add(Row::new(vec![SqlValue::Int(*v)]), *w, crate::zset::WeightType::I64)
            .unwrap();
    }
    z
}

#[cfg(test)]
fn contents_with_t() -> TableContents {
    use crate::sql_type::SqlType;
    let mut tc = TableContents::new();
    tc.new_table("t".to_string(), vec![Column::new("x", SqlType::Int, true)])
        .unwrap();
    tc
}

#[test]
fn test_insert_and_remove() {
    let mut tc = contents_with_t();
    tc.add_to_table("t", &int_zset(&[(1, 1)])).unwrap();
    tc.add_to_table("t", &int_zset(&[(1, 1), (2, 1)])).unwrap();
    tc.remove_from_table("t", &int_zset(&[(1, 1)])).unwrap();
    assert_eq!(tc.contents("t").unwrap(), &int_zset(&[(1, 1), (2, 1)]));
}

#[test]
fn test_negative_weight_is_checked_on_read() {
    let mut tc = contents_with_t();
    tc.add_to_table("t", &int_zset(&[(5, -1)])).unwrap();
    assert!(matches!(tc.contents("t"), Err(Error::NegativeWeight { weight: -1, .. })));
    assert_eq!(tc.raw("t").unwrap(), &int_zset(&[(5, -1)]));
    tc.add_to_table("t", &int_zset(&[(5, 1)])).unwrap();
    assert!(tc.contents("t").unwrap().is_empty());
}

#[test]
fn test_unknown_and_duplicate_tables() {
    let mut tc = contents_with_t();
    assert_eq!(
        tc.contents("u"),
        Err(Error::TableNameNotFound("u".to_string()))
    );
    assert_eq!(
        tc.new_table("t".to_string(), vec![]),
        Err(Error::TableAlreadyExists("t".to_string()))
    );
    assert_eq!(tc.table_names().collect::<Vec<_>>(), vec!["t"]);
}

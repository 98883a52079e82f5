//! provides a simulated in-memory table: the schema of a declared table plus its current contents as a Z-set.
//!
//! The table is implemented with rust native data structures.  It is only used by the compiler to
//! simulate the effect of the INSERT and DELETE statements it compiles, so views can be checked
//! against concrete data without an execution engine.

use crate::table_traits::{Column, TableMeta};
use crate::typed_row::Row;
use crate::zset::{WeightType, ZSet};

#[derive(Debug, Clone, PartialEq)]
pub struct TempTable {
    pub table_name: String,
    pub columns: Vec<Column>,
    pub rows: ZSet,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Something went wrong appending: {0}")]
    AppendValidationError(#[from] crate::typed_row::Error),
    #[error("Weight error updating table: {0}")]
    Weight(#[from] crate::zset::Error),
}

impl TableMeta for TempTable {
    fn table_name(&self) -> &str {
        &self.table_name
    }
    fn columns(&self) -> &[Column] {
        &self.columns
    }
}

impl TempTable {
    pub fn new(table_name: String, columns: Vec<Column>) -> Self {
        TempTable {
            table_name,
            columns,
            rows: ZSet::new(),
        }
    }

    /// Validates a row against the schema and returns it converted to the column types.
    pub fn typed_row(&self, row: Vec<crate::sql_value::SqlValue>) -> Result<Row, Error> {
        Ok(crate::typed_row::validate_row_for_table(self, row)?)
    }

    /// Applies a delta.  Rows whose weight becomes zero disappear.  A delta that would overflow
    /// a weight leaves the table unchanged.
    pub fn apply(&mut self, delta: &ZSet) -> Result<(), Error> {
        // The store keeps logical weights; the narrower JIT weight type only constrains circuits.
        self.rows.add_zset(delta, WeightType::I64)?;
        Ok(())
    }

    /// Printings out tables nicely, with one line per distinct row and its weight.
    pub fn print(&self, w: &mut dyn std::io::Write, detailed: bool) -> std::io::Result<()> {
        crate::formatting::print_table(w, &self.table_name, &self.columns, &self.rows, detailed)
    }
}

#[test]
fn test_temp_table() {
    use crate::sql_type::SqlType;
    use crate::sql_value::SqlValue;
    let mut tbl = TempTable::new(
        "test".to_string(),
        vec![Column::new("b", SqlType::Int, true)],
    );
    assert_eq!(tbl.column_names(), vec![String::from("b")]);
    assert_eq!(tbl.column_types(), vec![SqlType::Int]);
    let row = tbl.typed_row(vec![SqlValue::Int(1)]).unwrap();
    let delta = ZSet::from_rows(vec![row.clone()], WeightType::I64).unwrap();
    tbl.apply(&delta).unwrap();
    tbl.apply(&delta).unwrap();
    assert_eq!(tbl.rows.weight(&row), 2);
    tbl.apply(&delta.negate()).unwrap();
    assert_eq!(tbl.rows.weight(&row), 1);

    let mut out = Vec::new();
    tbl.print(&mut out, false).unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert_eq!(printed.lines().count(), 3);
    assert!(printed.lines().nth(2).unwrap().trim_end().ends_with("1 |"));
}

#[test]
fn test_overflowing_delta_leaves_table_unchanged() {
    use crate::sql_type::SqlType;
    use crate::sql_value::SqlValue;
    let mut tbl = TempTable::new("t".to_string(), vec![Column::new("b", SqlType::Int, true)]);
    let small = tbl.typed_row(vec![SqlValue::Int(1)]).unwrap();
    let big = tbl.typed_row(vec![SqlValue::Int(2)]).unwrap();
    let mut initial = ZSet::new();
    initial.add(small.clone(), 1, WeightType::I64).unwrap();
    initial.add(big.clone(), i64::MAX, WeightType::I64).unwrap();
    tbl.apply(&initial).unwrap();

    let delta = ZSet::from_rows(vec![small.clone(), big.clone()], WeightType::I64).unwrap();
    assert!(matches!(tbl.apply(&delta), Err(Error::Weight(_))));
    assert_eq!(tbl.rows, initial);
}

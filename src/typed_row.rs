//! provides access to table rows in a typed form.
//! Rows inserted by the program are checked against the schema of their table before they are stored.
//! Any failure to convert any element in a row is treated as a failure to convert the entire row.
//! Null values are not a conversion failure, unless the column is declared NOT NULL.
use crate::sql_value::SqlValue;
use crate::table_traits::TableMeta;

/// can hold a sequence of values of any of the SQL types.
/// Rows are keys of Z-sets, so two rows are the same row iff all their values are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct Row {
    pub items: Vec<SqlValue>,
}

impl Row {
    pub fn new(items: Vec<SqlValue>) -> Self {
        Row { items }
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({})",
            self.items
                .iter()
                .map(|x| match x {
                    SqlValue::Text(s) => format!("'{}'", s),
                    x => x.to_string(),
                })
                .collect::<Vec<String>>()
                .join(", ")
        )
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Casting error, column number {}, detail : {}", colnum, detail)]
    Casting {
        detail: crate::sql_value::Error,
        colnum: usize,
    },
    #[error("Null value in column {0} which is declared NOT NULL.")]
    NullInNotNullColumn(String),
    #[error("Row has {actual} values but table {table} has {expected} columns.")]
    ArrayLenMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },
}

/// Checks `row` against the schema of `table` and converts each value to its column type.
pub fn validate_row_for_table(table: &impl TableMeta, row: Vec<SqlValue>) -> Result<Row, Error> {
    let columns = table.columns();
    if columns.len() != row.len() {
        return Err(Error::ArrayLenMismatch {
            table: table.table_name().to_string(),
            expected: columns.len(),
            actual: row.len(),
        });
    }
    let mut items = Vec::with_capacity(row.len());
    for (colnum, (value, column)) in row.iter().zip(columns).enumerate() {
        if value.is_null() && !column.nullable {
            return Err(Error::NullInNotNullColumn(column.name.clone()));
        }
        let v = value
            .cast_to(column.ty)
            .map_err(|detail| Error::Casting { colnum, detail })?;
        items.push(v);
    }
    Ok(Row { items })
}

#[cfg(test)]
struct TestTable {
    columns: Vec<crate::table_traits::Column>,
}

#[cfg(test)]
impl TableMeta for TestTable {
    fn table_name(&self) -> &str {
        "test"
    }
    fn columns(&self) -> &[crate::table_traits::Column] {
        &self.columns
    }
}

#[test]
fn test_validate_row_for_table() {
    use crate::sql_type::SqlType;
    use crate::table_traits::Column;
    use SqlValue::*;
    let table = TestTable {
        columns: vec![
            Column::new("a", SqlType::Int, false),
            Column::new("b", SqlType::Real, true),
            Column::new("c", SqlType::Text, true),
        ],
    };
    let row = validate_row_for_table(&table, vec![Int(1), Int(2), Null()]).unwrap();
    assert_eq!(row.items, vec![Int(1), Real(2.0), Null()]);

    assert_eq!(
        validate_row_for_table(&table, vec![Null(), Int(2), Null()]),
        Err(Error::NullInNotNullColumn("a".to_string()))
    );
    assert!(matches!(
        validate_row_for_table(&table, vec![Int(1)]),
        Err(Error::ArrayLenMismatch { .. })
    ));
    assert!(matches!(
        validate_row_for_table(&table, vec![Text("x".to_string()), Null(), Null()]),
        Err(Error::Casting { colnum: 0, .. })
    ));
}

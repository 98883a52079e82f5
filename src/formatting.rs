//! formatting prints out tables nicely.

use std::io::Write;

use itertools::Itertools;

use crate::table_traits::Column;
use crate::temp_db::TableContents;
use crate::zset::ZSet;

/// Prints a relation, one line per distinct row followed by its weight.
/// In the future, also csv output, etc.
pub fn print_table(
    w: &mut dyn Write,
    table_name: &str,
    columns: &[Column],
    rows: &ZSet,
    detailed: bool,
) -> std::io::Result<()> {
    writeln!(w, "Full Dump of Table {}", table_name)?;
    writeln!(
        w,
        "   | {} | {:>6} |",
        columns.iter().map(|c| format!("{:15}", c.name)).join(" | "),
        "weight"
    )?;
    if detailed {
        writeln!(
            w,
            "   | {} | {:>6} |",
            columns
                .iter()
                .map(|c| match c.nullable {
                    true => format!("{:15}", c.ty.to_string()),
                    false => format!("{:15}", format!("{} NOT NULL", c.ty)),
                })
                .join(" | "),
            ""
        )?;
    }
    for (row, weight) in rows {
        writeln!(
            w,
            "   | {} | {:>6} |",
            row.items
                .iter()
                .map(|x| format!("{:15}", x.to_string()))
                .join(" | "),
            weight
        )?;
    }
    Ok(())
}

/// Prints every table in declaration order, including rows with transient negative weights.
pub fn print_table_contents(
    w: &mut dyn Write,
    contents: &TableContents,
    detailed: bool,
) -> std::io::Result<()> {
    for table in contents.tables() {
        table.print(w, detailed)?;
    }
    Ok(())
}

#[test]
fn test_print_table() {
    use crate::sql_type::SqlType;
    use crate::sql_value::SqlValue;
    use crate::typed_row::Row;
    use crate::zset::WeightType;

    let columns = vec![
        Column::new("a", SqlType::Int, false),
        Column::new("b", SqlType::Text, true),
    ];
    let mut rows = ZSet::new();
    rows.add(
        Row::new(vec![SqlValue::Int(1), SqlValue::Text("x".to_string())]),
        2,
        WeightType::I64,
    )
    .unwrap();
    let mut out = Vec::new();
    print_table(&mut out, "t", &columns, &rows, true).unwrap();
    let printed = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Full Dump of Table t");
    assert!(lines[1].starts_with("   | a "));
    assert!(lines[1].contains(" | b "));
    assert!(lines[2].contains("NOT NULL"));
    assert!(lines[3].ends_with("|      2 |"));
}

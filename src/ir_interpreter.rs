//! executes circuit intermediate representation (IR) over a snapshot of table contents.
//!
//! Every node is evaluated once, in id order, treating each source as delivering the current
//! contents of its table in one step.  The result of each sink is the contents of its view.

use std::collections::BTreeMap;

use crate::ast::Op;
use crate::ir::{Circuit, NodeId, Operator, ScalarExpr};
use crate::sql_value::{self, SqlValue};
use crate::temp_db::TableContents;
use crate::typed_row::Row;
use crate::zset::{self, WeightType, ZSet};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Error evaluating node n{node}: {detail}")]
    Eval {
        node: NodeId,
        detail: sql_value::Error,
    },
    #[error("Predicate of node n{node} produced non-boolean value {value}")]
    NonBooleanPredicate { node: NodeId, value: String },
    #[error("Weight error in node n{node}: {detail}")]
    Weight { node: NodeId, detail: zset::Error },
    #[error("Node n{node} reads n{input}, which has not been evaluated")]
    MissingInput { node: NodeId, input: NodeId },
    #[error("{0}")]
    Table(String),
}

/// Evaluates a scalar expression over one row.
pub fn eval_scalar(expr: &ScalarExpr, row: &Row) -> Result<SqlValue, sql_value::Error> {
    match expr {
        ScalarExpr::Column(i) => Ok(row.items.get(*i).cloned().unwrap_or(SqlValue::Null())),
        ScalarExpr::Literal(v) => Ok(v.clone()),
        ScalarExpr::Binary { op, lhs, rhs } => {
            let left = eval_scalar(lhs, row)?;
            // The right side is not evaluated once the left side decides the result.
            match (op, &left) {
                (Op::And, SqlValue::Bool(false)) => Ok(SqlValue::Bool(false)),
                (Op::Or, SqlValue::Bool(true)) => Ok(SqlValue::Bool(true)),
                _ => left.binop(op, &eval_scalar(rhs, row)?),
            }
        }
        ScalarExpr::Unary { op, expr } => eval_scalar(expr, row)?.unop(op),
        ScalarExpr::IsNull { expr, negated } => {
            Ok(SqlValue::Bool(eval_scalar(expr, row)?.is_null() != *negated))
        }
    }
}

/// Whether a row passes a predicate.  `NULL` does not pass.
///
/// A conjunction is checked left to right and stops at the first conjunct that does not pass,
/// so `a AND b` rejects exactly the rows a filter on `a` followed by a filter on `b` rejects.
pub fn eval_predicate(predicate: &ScalarExpr, row: &Row) -> Result<Option<bool>, sql_value::Error> {
    if let ScalarExpr::Binary {
        op: Op::And,
        lhs,
        rhs,
    } = predicate
    {
        return match eval_predicate(lhs, row)? {
            Some(true) => eval_predicate(rhs, row),
            other => Ok(other),
        };
    }
    let value = eval_scalar(predicate, row)?;
    match value {
        SqlValue::Bool(b) => Ok(Some(b)),
        SqlValue::Null() => Ok(Some(false)),
        _ => Ok(None),
    }
}

fn negate(z: &ZSet, weight_type: WeightType) -> Result<ZSet, zset::Error> {
    let mut result = ZSet::new();
    for (row, weight) in z {
        weight_type.check(-(*weight as i128))?;
        result.add(row.clone(), -weight, weight_type)?;
    }
    Ok(result)
}

/// Runs `circuit` over `tables` and returns the contents of every view it outputs.
pub fn run_ir(circuit: &Circuit, tables: &TableContents) -> Result<BTreeMap<String, ZSet>, Error> {
    let weight_type = circuit.weight_type();
    let mut values: Vec<ZSet> = Vec::with_capacity(circuit.nodes().len());
    let mut outputs = BTreeMap::new();
    for node in circuit.nodes() {
        let id = node.id;
        let input = |i: NodeId| -> Result<&ZSet, Error> {
            values
                .get(i)
                .ok_or(Error::MissingInput { node: id, input: i })
        };
        let weight_err = |detail| Error::Weight { node: id, detail };
        let eval_err = |detail| Error::Eval { node: id, detail };
        let value = match &node.op {
            Operator::Source { table } => tables
                .contents(table)
                .map_err(|e| Error::Table(e.to_string()))?
                .clone(),
            Operator::Constant { data } => data.clone(),
            Operator::Map { input: i, exprs } => {
                let mut result = ZSet::new();
                for (row, weight) in input(*i)? {
                    let items = exprs
                        .iter()
                        .map(|e| eval_scalar(e, row))
                        .collect::<Result<Vec<SqlValue>, sql_value::Error>>()
                        .map_err(eval_err)?;
                    result
                        .add(Row::new(items), *weight, weight_type)
                        .map_err(weight_err)?;
                }
                result
            }
            Operator::Filter { input: i, predicate } => {
                let mut result = ZSet::new();
                for (row, weight) in input(*i)? {
                    match eval_predicate(predicate, row).map_err(eval_err)? {
                        Some(true) => result
                            .add(row.clone(), *weight, weight_type)
                            .map_err(weight_err)?,
                        Some(false) => (),
                        None => {
                            return Err(Error::NonBooleanPredicate {
                                node: id,
                                value: eval_scalar(predicate, row)
                                    .map(|v| v.to_string())
                                    .unwrap_or_default(),
                            })
                        }
                    }
                }
                result
            }
            Operator::Distinct { input: i } => input(*i)?.distinct(),
            Operator::Negate { input: i } => negate(input(*i)?, weight_type).map_err(weight_err)?,
            Operator::Sum { inputs } => {
                let mut result = ZSet::new();
                for i in inputs {
                    result.add_zset(input(*i)?, weight_type).map_err(weight_err)?;
                }
                result
            }
            Operator::Sink { input: i, view } => {
                let contents = input(*i)?.clone();
                outputs.insert(view.clone(), contents.clone());
                contents
            }
        };
        values.push(value);
    }
    Ok(outputs)
}

#[cfg(test)]
fn int_row(values: &[i64]) -> Row {
    Row::new(values.iter().map(|v| SqlValue::Int(*v)).collect())
}

#[test]
fn test_eval_scalar() {
    let row = int_row(&[3, 4]);
    let e = ScalarExpr::Binary {
        op: Op::Multiply,
        lhs: Box::new(ScalarExpr::Column(0)),
        rhs: Box::new(ScalarExpr::Column(1)),
    };
    assert_eq!(eval_scalar(&e, &row), Ok(SqlValue::Int(12)));
    let p = ScalarExpr::IsNull {
        expr: Box::new(ScalarExpr::Literal(SqlValue::Null())),
        negated: true,
    };
    assert_eq!(eval_predicate(&p, &row), Ok(Some(false)));
    assert_eq!(eval_predicate(&ScalarExpr::Column(0), &row), Ok(None));
}

#[test]
fn test_logical_operators_stop_at_decided_left_side() {
    let div = |n: i64| {
        Box::new(ScalarExpr::Binary {
            op: Op::Gt,
            lhs: Box::new(ScalarExpr::Binary {
                op: Op::Divide,
                lhs: Box::new(ScalarExpr::Literal(SqlValue::Int(10))),
                rhs: Box::new(ScalarExpr::Column(0)),
            }),
            rhs: Box::new(ScalarExpr::Literal(SqlValue::Int(n))),
        })
    };
    let guard = |op: Op| {
        Box::new(ScalarExpr::Binary {
            op,
            lhs: Box::new(ScalarExpr::Column(0)),
            rhs: Box::new(ScalarExpr::Literal(SqlValue::Int(0))),
        })
    };
    let zero = int_row(&[0]);
    let five = int_row(&[5]);

    let guarded = ScalarExpr::Binary {
        op: Op::And,
        lhs: guard(Op::NotEq),
        rhs: div(1),
    };
    assert_eq!(eval_scalar(&guarded, &zero), Ok(SqlValue::Bool(false)));
    assert_eq!(eval_predicate(&guarded, &zero), Ok(Some(false)));
    assert_eq!(eval_predicate(&guarded, &five), Ok(Some(true)));

    let either = ScalarExpr::Binary {
        op: Op::Or,
        lhs: guard(Op::Eq),
        rhs: div(1),
    };
    assert_eq!(eval_scalar(&either, &zero), Ok(SqlValue::Bool(true)));
    assert_eq!(eval_scalar(&either, &five), Ok(SqlValue::Bool(true)));

    // A NULL guard does not pass, so the rest of the conjunction is not evaluated.
    let null_guard = ScalarExpr::Binary {
        op: Op::And,
        lhs: Box::new(ScalarExpr::Literal(SqlValue::Null())),
        rhs: div(1),
    };
    assert_eq!(eval_predicate(&null_guard, &zero), Ok(Some(false)));
    assert!(eval_predicate(&*div(1), &zero).is_err());
}

#[test]
fn test_run_ir() {
    use crate::ir::{PartialCircuit, ZSetType};
    use crate::sql_type::SqlType;
    use crate::table_traits::Column;

    let columns = vec![Column::new("x", SqlType::Int, true)];
    let ty = ZSetType::new(columns.clone(), WeightType::I64);
    let mut tables = TableContents::new();
    tables.new_table("t".to_string(), columns).unwrap();
    let mut delta = ZSet::new();
    for (v, w) in [(1, 2), (2, 1), (5, 1)] {
        delta.add(int_row(&[v]), w, WeightType::I64).unwrap();
    }
    tables.add_to_table("t", &delta).unwrap();

    // v = SELECT DISTINCT x FROM t WHERE x < 5 EXCEPT SELECT 2
    let mut pc = PartialCircuit::new(WeightType::I64);
    let src = pc
        .add(Operator::Source { table: "t".to_string() }, ty.clone(), None)
        .unwrap();
    let filter = pc
        .add(
            Operator::Filter {
                input: src,
                predicate: ScalarExpr::Binary {
                    op: Op::Lt,
                    lhs: Box::new(ScalarExpr::Column(0)),
                    rhs: Box::new(ScalarExpr::Literal(SqlValue::Int(5))),
                },
            },
            ty.clone(),
            None,
        )
        .unwrap();
    let left = pc.add(Operator::Distinct { input: filter }, ty.clone(), None).unwrap();
    let two = pc
        .add(
            Operator::Constant {
                data: ZSet::from_rows(vec![int_row(&[2])], WeightType::I64).unwrap(),
            },
            ty.clone(),
            None,
        )
        .unwrap();
    let neg = pc.add(Operator::Negate { input: two }, ty.clone(), None).unwrap();
    let sum = pc.add(Operator::Sum { inputs: vec![left, neg] }, ty.clone(), None).unwrap();
    let d = pc.add(Operator::Distinct { input: sum }, ty.clone(), None).unwrap();
    pc.add(Operator::Sink { input: d, view: "v".to_string() }, ty, None)
        .unwrap();
    let circuit = pc.seal("c");

    let outputs = run_ir(&circuit, &tables).unwrap();
    let expected = ZSet::from_rows(vec![int_row(&[1])], WeightType::I64).unwrap();
    assert_eq!(outputs.get("v"), Some(&expected));
}

#[test]
fn test_run_ir_rejects_negative_table_contents() {
    use crate::ir::{PartialCircuit, ZSetType};
    use crate::sql_type::SqlType;
    use crate::table_traits::Column;

    let columns = vec![Column::new("x", SqlType::Int, true)];
    let mut tables = TableContents::new();
    tables.new_table("t".to_string(), columns.clone()).unwrap();
    let mut delta = ZSet::new();
    delta.add(int_row(&[1]), -1, WeightType::I64).unwrap();
    tables.add_to_table("t", &delta).unwrap();

    let mut pc = PartialCircuit::new(WeightType::I64);
    pc.add(
        Operator::Source { table: "t".to_string() },
        ZSetType::new(columns, WeightType::I64),
        None,
    )
    .unwrap();
    assert!(matches!(run_ir(&pc.seal("c"), &tables), Err(Error::Table(_))));
}

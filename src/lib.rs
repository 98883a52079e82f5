//! sqlcircuit compiles SQL table and view definitions into circuits: dataflow graphs over
//! weighted relations (Z-sets) that a runtime can evaluate incrementally as tables change.
//!
//! A `Compiler` is one compilation session.  Statements go in through `compile_statement(s)` or
//! `set_entire_input` plus `compile_input`; circuits, simulated table contents, diagnostics and
//! the I/O descriptors of the compiled program come out.

mod ast;
mod ast_to_ir;
pub mod circuit_optimizer;
pub mod compiler;
pub mod errors;
pub mod formatting;
pub mod io_description;
pub mod ir;
pub mod ir_interpreter;
mod optimize_ast;
pub mod options;
pub mod parser;
mod project;
mod pt_to_ast;
pub mod source;
pub mod sql_type;
pub mod sql_value;
pub mod table_traits;
pub mod temp_db;
pub mod temp_table;
pub mod typed_row;
pub mod zset;

extern crate pest;
#[macro_use]
extern crate pest_derive;

pub use compiler::Compiler;
pub use errors::{CompilerError, Error, Result};
pub use io_description::{JitFileAndSerialization, JitSerialization};
pub use ir::Circuit;
pub use options::{CompilerOptions, IoOptions, OptimizerOptions};
pub use source::InputSource;
pub use temp_db::TableContents;
pub use zset::{WeightType, ZSet};

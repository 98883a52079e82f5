//! The compilation session.
//!
//! A `Compiler` accepts SQL text incrementally, either through repeated API calls or as one
//! buffered input, and drives each statement through parsing and circuit building.  It owns
//! everything that outlives a single statement: the source text, the diagnostics, the circuit
//! builder (with its table and view registries and the simulated table contents), and the most
//! recently sealed circuit.

use std::io::{Read, Write};

use serde_json::{json, Value};

use crate::ast_to_ir::CircuitBuilder;
use crate::circuit_optimizer::CircuitOptimizer;
use crate::errors::{CompilerMessages, Error, Result, SourcePosition};
use crate::io_description::{
    InputTableDescription, JitFileAndSerialization, JitIODescription, JitRuntimeConfig,
    OutputViewDescription,
};
use crate::ir::Circuit;
use crate::options::CompilerOptions;
use crate::parser;
use crate::pt_to_ast;
use crate::source::{InputSource, SourceFileContents};
use crate::temp_db::TableContents;
use crate::zset::WeightType;

/// Name of the circuit sealed by `optimize` when none was sealed before.
const TEMPORARY_CIRCUIT_NAME: &str = "tmp";

pub struct Compiler {
    options: CompilerOptions,
    input_source: InputSource,
    sources: SourceFileContents,
    messages: CompilerMessages,
    builder: CircuitBuilder,
    circuit: Option<Circuit>,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        let weight_type = WeightType::for_backend(options.io_options.jit);
        let builder = CircuitBuilder::new(weight_type, options.io_options.emit_table_deltas);
        Compiler {
            options,
            input_source: InputSource::None,
            sources: SourceFileContents::new(),
            messages: CompilerMessages::new(),
            builder,
            circuit: None,
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn weight_type(&self) -> WeightType {
        self.builder.weight_type()
    }

    pub fn input_source(&self) -> InputSource {
        self.input_source
    }

    pub fn sources(&self) -> &SourceFileContents {
        &self.sources
    }

    pub fn messages(&self) -> &CompilerMessages {
        &self.messages
    }

    /// A session reads from one kind of source only.
    fn set_source(&mut self, source: InputSource) -> Result<()> {
        if self.input_source != InputSource::None && self.input_source != source {
            return Err(Error::Configuration(format!(
                "Input source already set to {}, cannot read from {}",
                self.input_source, source
            )));
        }
        self.input_source = source;
        Ok(())
    }

    /// Buffers the whole program.  With a file name the source is a file, otherwise stdin.
    pub fn set_entire_input(&mut self, file_name: Option<&str>, contents: impl Read) -> Result<()> {
        let source = match file_name {
            Some(_) => InputSource::File,
            None => InputSource::Stdin,
        };
        self.set_source(source)?;
        self.sources.set_entire_input(file_name, contents)?;
        Ok(())
    }

    /// Compiles the input buffered by `set_entire_input`.
    pub fn compile_input(&mut self) -> Result<()> {
        match self.input_source {
            InputSource::Stdin | InputSource::File => (),
            InputSource::None => {
                return Err(Error::Configuration(
                    "compile_input called without input data".to_string(),
                ))
            }
            InputSource::Api => {
                return Err(Error::Configuration(
                    "compile_input called on a session fed through compile_statement".to_string(),
                ))
            }
        }
        let program = self.sources.whole_program().to_string();
        self.compile_text(&program, SourcePosition::new(1, 1), None)
    }

    /// Compiles `text`, attaching `comment` to the circuit nodes it produces.
    ///
    /// `text` may hold several statements separated by `;`; they all share the comment.
    pub fn compile_statement(&mut self, text: &str, comment: Option<&str>) -> Result<()> {
        self.set_source(InputSource::Api)?;
        if text.trim().is_empty() {
            return Ok(());
        }
        let base = self.sources.append(text);
        self.compile_text(text, base, comment)
    }

    /// Compiles a program of `;`-separated statements.  Same as `compile_statement` without a comment.
    pub fn compile_statements(&mut self, program: &str) -> Result<()> {
        self.compile_statement(program, None)
    }

    /// Parses and builds each statement of `text`, which starts at `base` in the session's source.
    fn compile_text(&mut self, text: &str, base: SourcePosition, comment: Option<&str>) -> Result<()> {
        for statement in parser::split_statements(text, base) {
            let result = pt_to_ast::parse_statement(&statement, comment)
                .and_then(|parsed| self.builder.compile(&parsed, &mut self.messages));
            let e = match result {
                Ok(()) => continue,
                Err(e) => e,
            };
            self.messages.report_error(&e);
            if e.is_internal() {
                tracing::warn!(error = %e, "internal compiler error");
                return Err(Error::Internal(e));
            }
            if self.options.optimizer_options.throw_on_error {
                self.show_errors(&mut std::io::stderr())?;
                return Err(Error::Compilation(e.to_string()));
            }
        }
        Ok(())
    }

    /// When false, views compiled from now on are not outputs of the circuit.
    pub fn generate_output_for_next_view(&mut self, generate: bool) {
        self.builder.generate_output_for_next_view(generate);
    }

    /// Optimizes the current circuit, first sealing the partial one if there is none.
    pub fn optimize(&mut self) {
        let circuit = match self.circuit.take() {
            Some(c) => c,
            None => self.builder.seal(TEMPORARY_CIRCUIT_NAME),
        };
        let optimizer = CircuitOptimizer::new(&self.options.optimizer_options);
        self.circuit = Some(optimizer.optimize(circuit));
    }

    /// Hands out the current circuit under `name`.  The next circuit starts empty.
    pub fn get_final_circuit(&mut self, name: &str) -> Circuit {
        let circuit = match self.circuit.take() {
            Some(c) => c,
            None => self.builder.seal(name),
        };
        circuit.rename(name)
    }

    pub fn get_table_contents(&self) -> &TableContents {
        self.builder.table_contents()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.exit_code() != 0
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.has_warnings()
    }

    pub fn show_errors(&self, w: &mut dyn Write) -> std::io::Result<()> {
        self.messages.show(&self.sources, w)
    }

    /// Prints the diagnostics and fails if any of them is an error.
    pub fn throw_if_errors_occurred(&self) -> Result<()> {
        if self.has_errors() {
            self.show_errors(&mut std::io::stderr())?;
            return Err(Error::Compilation(self.messages.to_string()));
        }
        Ok(())
    }

    pub fn input_tables(&self) -> &[InputTableDescription] {
        self.builder.input_tables()
    }

    pub fn output_views(&self) -> &[OutputViewDescription] {
        self.builder.output_views()
    }

    pub fn get_io_metadata_as_json(&self) -> Value {
        json!({
            "inputs": self.input_tables().iter().map(|t| t.as_json()).collect::<Vec<Value>>(),
            "outputs": self.output_views().iter().map(|v| v.as_json()).collect::<Vec<Value>>(),
        })
    }

    /// JIT descriptors of the input tables; `files` holds one binding per table, in declaration order.
    pub fn get_input_descriptions(
        &self,
        files: &[JitFileAndSerialization],
    ) -> Result<Vec<JitIODescription>> {
        let tables = self.input_tables();
        if files.len() != tables.len() {
            return Err(Error::Configuration(format!(
                "Expected {} input files, got {}",
                tables.len(),
                files.len()
            )));
        }
        Ok(tables
            .iter()
            .zip(files)
            .map(|(t, f)| t.jit_description(f))
            .collect())
    }

    /// JIT descriptors of the output views; `files` holds one binding per view, in declaration order.
    pub fn get_output_descriptions(
        &self,
        files: &[JitFileAndSerialization],
    ) -> Result<Vec<JitIODescription>> {
        let views = self.output_views();
        if files.len() != views.len() {
            return Err(Error::Configuration(format!(
                "Expected {} output files, got {}",
                views.len(),
                files.len()
            )));
        }
        Ok(views
            .iter()
            .zip(files)
            .map(|(v, f)| v.jit_description(f))
            .collect())
    }

    pub fn create_jit_runtime_config(
        &self,
        input_files: &[JitFileAndSerialization],
        output_files: &[JitFileAndSerialization],
    ) -> Result<JitRuntimeConfig> {
        let inputs = self.get_input_descriptions(input_files)?;
        let outputs = self.get_output_descriptions(output_files)?;
        Ok(JitRuntimeConfig::new(&inputs, &outputs))
    }
}

#[test]
fn test_compile_input_requires_input() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    assert!(matches!(
        compiler.compile_input(),
        Err(Error::Configuration(_))
    ));

    // Statements compiled through the API are not compiled again.
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.compile_statement("CREATE TABLE t (x INT)", None).unwrap();
    assert!(matches!(
        compiler.compile_input(),
        Err(Error::Configuration(_))
    ));
    assert!(!compiler.has_errors());
    assert!(compiler.messages().is_empty());
    assert_eq!(compiler.input_tables().len(), 1);
}

#[test]
fn test_compile_statement_shares_comment_across_statements() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statement("CREATE TABLE t (x INT); CREATE VIEW v AS SELECT x FROM t", Some("both"))
        .unwrap();
    let circuit = compiler.get_final_circuit("c");
    assert_eq!(circuit.output_relations(), vec!["v"]);
    for node in circuit.nodes() {
        assert_eq!(node.comment, Some("both".to_string()));
    }
}

#[test]
fn test_api_text_is_accumulated() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statement("CREATE TABLE t (x INT)", Some("table t"))
        .unwrap();
    compiler.compile_statements("CREATE VIEW v AS\n  SELECT x FROM t;").unwrap();
    assert_eq!(
        compiler.sources().whole_program(),
        "CREATE TABLE t (x INT)\nCREATE VIEW v AS\n  SELECT x FROM t;"
    );
    assert_eq!(compiler.input_source(), InputSource::Api);
    let circuit = compiler.get_final_circuit("c");
    assert_eq!(circuit.nodes()[0].comment, Some("table t".to_string()));
    assert_eq!(circuit.nodes()[1].comment, None);
}

#[test]
fn test_weight_type_follows_backend() {
    let mut options = CompilerOptions::default();
    assert_eq!(Compiler::new(options.clone()).weight_type(), WeightType::I64);
    options.io_options.jit = true;
    assert_eq!(Compiler::new(options).weight_type(), WeightType::I32);
}

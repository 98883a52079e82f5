use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use sqlcircuit::formatting;
use sqlcircuit::table_traits::TableMeta;
use sqlcircuit::{Compiler, CompilerOptions, JitFileAndSerialization, JitSerialization};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// The optimized circuit, as text.
    Circuit,
    /// The optimized circuit, as JSON.
    CircuitJson,
    /// Descriptions of the input tables and output views.
    Io,
    /// The simulated contents of every table after the INSERT and DELETE statements.
    Tables,
    /// Runtime configuration for the JIT backend.
    JitConfig,
}

/// Compiles a SQL program into an incremental circuit.
#[derive(Parser, Debug)]
#[command(name = "sqlcircuit", version)]
struct Args {
    /// SQL program to compile.  Read from stdin if absent.
    file: Option<PathBuf>,
    /// Target the JIT backend (32-bit weights).
    #[arg(long)]
    jit: bool,
    /// Stop at the first error.
    #[arg(long)]
    throw_on_error: bool,
    /// Optimization level: 0 runs no passes, 1 only dead-code elimination, 2 everything.
    #[arg(short = 'O')]
    optimization_level: Option<u32>,
    /// JSON file with compiler options.  Flags override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Name of the produced circuit.
    #[arg(long, default_value = "circuit")]
    name: String,
    #[arg(long, value_enum, default_value_t = Emit::Circuit)]
    emit: Emit,
    /// Directory holding the data file of each relation, for `--emit jit-config`.
    #[arg(long, default_value = ".")]
    io_dir: PathBuf,
    /// Serialization of the data files, json or csv.
    #[arg(long, default_value = "json")]
    io_format: JitSerialization,
}

fn options_from_args(args: &Args) -> anyhow::Result<CompilerOptions> {
    let mut options = match &args.config {
        Some(path) => CompilerOptions::load_from_json(path)?,
        None => CompilerOptions::default(),
    };
    if args.jit {
        options.io_options.jit = true;
    }
    if args.throw_on_error {
        options.optimizer_options.throw_on_error = true;
    }
    if let Some(level) = args.optimization_level {
        options.optimizer_options.optimization_level = level;
    }
    Ok(options)
}

fn data_file(args: &Args, relation: &str) -> JitFileAndSerialization {
    let path = args
        .io_dir
        .join(format!("{}.{}", relation, args.io_format));
    JitFileAndSerialization::new(path.display().to_string(), args.io_format)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let options = options_from_args(&args)?;
    let throw_on_error = options.optimizer_options.throw_on_error;
    let mut compiler = Compiler::new(options);
    match &args.file {
        Some(path) => {
            let name = path.display().to_string();
            let file = File::open(path).with_context(|| format!("opening {}", name))?;
            compiler.set_entire_input(Some(name.as_str()), file)?;
        }
        None => compiler.set_entire_input(None, io::stdin().lock())?,
    }

    let result = compiler.compile_input();
    // With throw_on_error the messages were printed when compilation stopped.
    if !throw_on_error {
        compiler.show_errors(&mut io::stderr())?;
    }
    result?;
    if compiler.has_errors() {
        std::process::exit(compiler.messages().exit_code());
    }

    let mut out = io::stdout().lock();
    match args.emit {
        Emit::Circuit => {
            compiler.optimize();
            writeln!(out, "{}", compiler.get_final_circuit(&args.name))?;
        }
        Emit::CircuitJson => {
            compiler.optimize();
            let circuit = compiler.get_final_circuit(&args.name);
            writeln!(out, "{}", serde_json::to_string_pretty(&circuit)?)?;
        }
        Emit::Io => {
            writeln!(
                out,
                "{}",
                serde_json::to_string_pretty(&compiler.get_io_metadata_as_json())?
            )?;
        }
        Emit::Tables => {
            formatting::print_table_contents(&mut out, compiler.get_table_contents(), true)?;
        }
        Emit::JitConfig => {
            let inputs: Vec<JitFileAndSerialization> = compiler
                .input_tables()
                .iter()
                .map(|t| data_file(&args, t.table_name()))
                .collect();
            let outputs: Vec<JitFileAndSerialization> = compiler
                .output_views()
                .iter()
                .map(|v| data_file(&args, v.table_name()))
                .collect();
            let config = compiler.create_jit_runtime_config(&inputs, &outputs)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&config.as_json())?)?;
        }
    }
    Ok(())
}

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use residue_backend_js::JsBackend;
use residue_core::heap::HeapGraph;
use residue_core::pipeline::{Backend, BackendInput, LazyObjectsConfig, SerializerConfig};

#[derive(Parser)]
#[command(name = "residue", about = "Residual program materialization for evaluated JavaScript heaps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a JSON heap graph in human-readable form.
    PrintHeap {
        /// Path to a JSON heap graph.
        file: PathBuf,
    },
    /// Materialize a heap graph as a JavaScript program.
    Emit {
        /// Path to a JSON heap graph.
        file: PathBuf,
        /// Write the program here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JSON serializer config; flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Materialize objects marked lazy through the lazy-objects runtime.
        #[arg(long)]
        lazy_objects: bool,
        /// Treat every eligible object as lazy (implies --lazy-objects).
        #[arg(long)]
        lazy_all: bool,
        /// Global name of the lazy-objects runtime.
        #[arg(long)]
        lazy_runtime: Option<String>,
        /// Hoist modified captured bindings into shared variables.
        #[arg(long)]
        simple_closures: bool,
        /// Code blocks up to this many characters are cloned per instance.
        #[arg(long)]
        inline_threshold: Option<u32>,
        /// Features to turn off (e.g. "factories", "delay-initializations").
        #[arg(long = "disable")]
        disable: Vec<String>,
        /// Do not wrap the program in an IIFE.
        #[arg(long)]
        no_iife: bool,
        /// Emit a "use strict" directive.
        #[arg(long)]
        strict: bool,
    },
}

fn load_graph(path: &Path) -> Result<HeapGraph> {
    let file = File::open(path).with_context(|| format!("failed to open heap graph: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse heap graph: {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<SerializerConfig> {
    let Some(path) = path else {
        return Ok(SerializerConfig::default());
    };
    let file = File::open(path).with_context(|| format!("failed to open config: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn cmd_print_heap(file: &Path) -> Result<()> {
    let graph = load_graph(file)?;
    print!("{graph}");
    Ok(())
}

struct EmitOptions<'a> {
    output: Option<&'a Path>,
    config: Option<&'a Path>,
    lazy_objects: bool,
    lazy_all: bool,
    lazy_runtime: Option<&'a str>,
    simple_closures: bool,
    inline_threshold: Option<u32>,
    disable: &'a [String],
    no_iife: bool,
    strict: bool,
}

fn build_config(opts: &EmitOptions<'_>) -> Result<SerializerConfig> {
    let mut config = load_config(opts.config)?;
    if opts.lazy_objects || opts.lazy_all || opts.lazy_runtime.is_some() {
        let lazy = config.lazy_objects.get_or_insert_with(LazyObjectsConfig::default);
        lazy.select_all |= opts.lazy_all;
        if let Some(runtime) = opts.lazy_runtime {
            lazy.runtime = runtime.to_string();
        }
    }
    config.simple_closures |= opts.simple_closures;
    config.strict |= opts.strict;
    if let Some(threshold) = opts.inline_threshold {
        config.inline_threshold = threshold;
    }
    if opts.no_iife {
        config.wrap_iife = false;
    }
    let disable: Vec<&str> = opts.disable.iter().map(String::as_str).collect();
    config.disable(&disable);
    Ok(config)
}

fn cmd_emit(file: &Path, opts: &EmitOptions<'_>) -> Result<()> {
    let graph = load_graph(file)?;
    let config = build_config(opts)?;
    let backend = JsBackend;
    info!("materializing {} with the {} backend", file.display(), backend.name());
    let output = backend
        .emit(BackendInput { graph, config })
        .with_context(|| format!("failed to materialize {}", file.display()))?;
    eprintln!("[emit] {}", output.stats);
    match opts.output {
        Some(path) => {
            fs::write(path, &output.source).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("[emit] wrote {}", path.display());
        }
        None => print!("{}", output.source),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match &cli.command {
        Command::PrintHeap { file } => cmd_print_heap(file),
        Command::Emit {
            file,
            output,
            config,
            lazy_objects,
            lazy_all,
            lazy_runtime,
            simple_closures,
            inline_threshold,
            disable,
            no_iife,
            strict,
        } => {
            let opts = EmitOptions {
                output: output.as_deref(),
                config: config.as_deref(),
                lazy_objects: *lazy_objects,
                lazy_all: *lazy_all,
                lazy_runtime: lazy_runtime.as_deref(),
                simple_closures: *simple_closures,
                inline_threshold: *inline_threshold,
                disable,
                no_iife: *no_iife,
                strict: *strict,
            };
            cmd_emit(file, &opts)
        }
    }
}

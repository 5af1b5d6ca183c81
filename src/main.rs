use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use quillscript::interpreter::Interpreter;

#[derive(Debug, Parser)]
#[command(
    name = "quillscript",
    about = "Executes QuillScript source (.quill) files.",
    version
)]
struct Args {
    /// Path to a QuillScript source file.
    script: PathBuf,

    /// Print each statement before execution (equivalent to setting
    /// QUILL_TRACE=1).
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let source = fs::read_to_string(&args.script)
        .with_context(|| format!("file not found: {}", args.script.display()))?;

    let mut interpreter = Interpreter::new();
    interpreter.set_trace(args.trace || trace_from_env());
    interpreter.run_source(&source);
    Ok(())
}

fn trace_from_env() -> bool {
    env::var("QUILL_TRACE")
        .ok()
        .map(|value| {
            let lower = value.to_ascii_lowercase();
            !(lower.is_empty() || lower == "0" || lower == "false" || lower == "off")
        })
        .unwrap_or(false)
}

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the jspp binary.
#[derive(Parser, Debug)]
#[command(
    name = "jspp",
    version,
    about = "Conditional compilation for JavaScript/TypeScript via #if/#elif/#else/#endif comments"
)]
pub struct CliArgs {
    /// Files or directories to process.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Define a variable, e.g. `-D DEBUG=true` or `-D VERSION='"1.2"'`.
    /// The value is parsed as JSON; unparseable values bind as strings and a
    /// bare name binds as `true`.
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    pub defines: Vec<String>,

    /// JSON file whose top-level object supplies variable bindings.
    /// `--define` values override it.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Write transformed files into this directory, preserving names.
    #[arg(long = "outDir", alias = "out-dir")]
    pub out_dir: Option<PathBuf>,

    /// Rewrite input files in place.
    #[arg(short = 'w', long)]
    pub write: bool,

    /// Extra glob(s) selecting files inside input directories,
    /// e.g. `--include '*.vue'`.
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Suppress warnings.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

//! File collection and per-file processing.
//!
//! Errors in one file do not stop the run: each is reported with the file
//! path attached and the process exits non-zero at the end, the way a build
//! tool surfaces per-module failures.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use colored::Colorize;
use globset::{Glob, GlobSet, GlobSetBuilder};
use jspp_common::{Diagnostic, DiagnosticCategory};
use jspp_parser::{Preprocessor, PreprocessorOptions};
use rustc_hash::FxHashMap;
use serde_json::Value;
use walkdir::WalkDir;

use crate::args::CliArgs;

/// Extensions picked up when walking a directory input.
const DEFAULT_EXTENSIONS: [&str; 6] = ["js", "jsx", "ts", "tsx", "mjs", "cjs"];

/// Process every input. Returns the number of files that failed.
pub fn run(args: &CliArgs) -> Result<usize> {
    let variables = build_variables(args)?;
    let engine = Preprocessor::new(PreprocessorOptions { variables });

    let include = build_include_set(&args.include)?;
    let files = collect_files(&args.inputs, &include)?;
    if files.is_empty() {
        bail!("no input files matched");
    }
    tracing::debug!(files = files.len(), "collected inputs");

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    let mut failures = 0usize;
    for file in &files {
        if let Err(error) = process_file(&engine, file, args) {
            failures += 1;
            eprintln!(
                "{} in {} - {error:#}",
                "error".red().bold(),
                file.path.display()
            );
        }
    }
    Ok(failures)
}

/// A collected input and the path it keeps under `--outDir`.
struct InputFile {
    path: PathBuf,
    /// Relative to the walked directory root, or just the file name for a
    /// file passed directly. Keeping the subpath stops same-named files in
    /// different directories from overwriting each other in the output.
    relative: PathBuf,
}

/// Variable bindings: config file first, `--define` values override.
fn build_variables(args: &CliArgs) -> Result<FxHashMap<String, Value>> {
    let mut variables = FxHashMap::default();

    if let Some(config) = &args.config {
        let text = fs::read_to_string(config)
            .with_context(|| format!("failed to read config {}", config.display()))?;
        let parsed: Value = serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON in {}", config.display()))?;
        let Value::Object(map) = parsed else {
            bail!(
                "Invalid variables in {}: top level must be an object",
                config.display()
            );
        };
        variables.extend(map);
    }

    for define in &args.defines {
        let (name, value) = parse_define(define);
        variables.insert(name, value);
    }

    Ok(variables)
}

/// `NAME=VALUE` with the value parsed as JSON; an unparseable value binds as
/// a string and a bare `NAME` binds as `true`.
fn parse_define(define: &str) -> (String, Value) {
    match define.split_once('=') {
        None => (define.to_string(), Value::Bool(true)),
        Some((name, raw)) => {
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| Value::String(raw.to_string()));
            (name.to_string(), value)
        }
    }
}

fn build_include_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob '{pattern}'"))?);
    }
    Ok(Some(builder.build()?))
}

/// Explicit file inputs are taken as-is; directories are walked and filtered
/// by extension or the include globs.
fn collect_files(inputs: &[PathBuf], include: &Option<GlobSet>) -> Result<Vec<InputFile>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && wanted(entry.path(), include) {
                    let relative = entry
                        .path()
                        .strip_prefix(input)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
                    files.push(InputFile { path: entry.into_path(), relative });
                }
            }
        } else if input.is_file() {
            let relative = input
                .file_name()
                .map(PathBuf::from)
                .with_context(|| format!("input has no file name: {}", input.display()))?;
            files.push(InputFile { path: input.clone(), relative });
        } else {
            bail!("input not found: {}", input.display());
        }
    }
    Ok(files)
}

fn wanted(path: &Path, include: &Option<GlobSet>) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DEFAULT_EXTENSIONS.contains(&e));
    let by_glob = include.as_ref().is_some_and(|set| {
        path.file_name().is_some_and(|name| set.is_match(name))
    });
    by_extension || by_glob
}

fn process_file(engine: &Preprocessor, file: &InputFile, args: &CliArgs) -> Result<()> {
    let source = fs::read_to_string(&file.path)
        .with_context(|| format!("failed to read {}", file.path.display()))?;

    let result = engine.preprocess(&source)?;
    if !args.quiet {
        report_diagnostics(&file.path, &result.diagnostics);
    }

    match result.output {
        Some(output) => emit(file, &output, args),
        None => {
            tracing::debug!(path = %file.path.display(), "no directives, unchanged");
            // Unchanged files still land in the output directory so it is a
            // complete mirror of the inputs.
            if args.out_dir.is_some() {
                emit(file, &source, args)
            } else if !args.write {
                print!("{source}");
                Ok(())
            } else {
                Ok(())
            }
        }
    }
}

fn emit(file: &InputFile, text: &str, args: &CliArgs) -> Result<()> {
    if let Some(dir) = &args.out_dir {
        let target = dir.join(&file.relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, text)
            .with_context(|| format!("failed to write {}", target.display()))?;
    } else if args.write {
        fs::write(&file.path, text)
            .with_context(|| format!("failed to write {}", file.path.display()))?;
    } else {
        print!("{text}");
    }
    Ok(())
}

fn report_diagnostics(path: &Path, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let label = match diagnostic.category {
            DiagnosticCategory::Warning => "warning".yellow().bold(),
            DiagnosticCategory::Error => "error".red().bold(),
            DiagnosticCategory::Message => "note".cyan().bold(),
        };
        eprintln!(
            "{label}[{code}] {path}:{offset} - {message}",
            code = diagnostic.code,
            path = path.display(),
            offset = diagnostic.start,
            message = diagnostic.message_text
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_define_json_values() {
        assert_eq!(parse_define("DEBUG=true"), ("DEBUG".to_string(), json!(true)));
        assert_eq!(parse_define("VAL=7"), ("VAL".to_string(), json!(7)));
        assert_eq!(
            parse_define("NAME=\"prod\""),
            ("NAME".to_string(), json!("prod"))
        );
    }

    #[test]
    fn parse_define_falls_back_to_string() {
        assert_eq!(parse_define("ENV=prod"), ("ENV".to_string(), json!("prod")));
    }

    #[test]
    fn parse_define_bare_name_is_true() {
        assert_eq!(parse_define("DEBUG"), ("DEBUG".to_string(), json!(true)));
    }

    #[test]
    fn wanted_filters_by_extension() {
        assert!(wanted(Path::new("a/b/app.ts"), &None));
        assert!(wanted(Path::new("app.cjs"), &None));
        assert!(!wanted(Path::new("readme.md"), &None));
        assert!(!wanted(Path::new("noext"), &None));
    }

    #[test]
    fn wanted_accepts_include_globs() {
        let set = build_include_set(&["*.vue".to_string()]).expect("valid glob");
        assert!(wanted(Path::new("src/App.vue"), &set));
        assert!(!wanted(Path::new("src/App.svelte"), &set));
    }
}

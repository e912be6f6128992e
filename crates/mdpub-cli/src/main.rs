//! mdpub: CLI tool to make previewable markdown publishable

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::{CONFIG_FILE_NAME, Config};
use mdpub_core::{DocumentReport, Pipeline, RelocationSummary};

#[derive(Parser, Debug)]
#[command(name = "mdpub")]
#[command(about = "Rewrite previewable markdown for publishing")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "Examples:
  mdpub src/content/guide/index.md            # Print the rewritten document
  mdpub src/content/guide/index.md -o out.md  # Write to a specific file
  mdpub src/content -o build/content -r       # Process a directory tree
  mdpub src/content -o build/content -r -j4   # Use 4 parallel jobs
  mdpub init                                  # Create _mdpub.toml")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a sample configuration file (or the JSON schema)
    Init {
        /// Output path (default: _mdpub.toml, or stdout with --schema)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit the JSON schema of the configuration file instead
        #[arg(long)]
        schema: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input markdown file or directory
    input: Option<PathBuf>,

    /// Output file or directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel jobs (defaults to number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Process directories recursively
    #[arg(short, long)]
    recursive: bool,

    /// Configuration file (default: _mdpub.toml in the input directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only show errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Init {
        output,
        schema,
        force,
    }) = cli.command
    {
        return init(output.as_deref(), schema, force);
    }

    let args = cli.run;
    init_tracing(args.verbose, args.quiet);

    let Some(input) = args.input.as_deref() else {
        anyhow::bail!("No input given; see `mdpub --help`");
    };

    let config = load_config(input, args.config.as_deref())?;
    let pipeline = config.pipeline()?;

    if input.is_file() {
        process_file(&pipeline, input, args.output.as_deref(), args.quiet)
    } else if input.is_dir() {
        process_directory(&pipeline, input, &args)
    } else {
        anyhow::bail!("Input path does not exist: {}", input.display());
    }
}

/// Install the stderr log subscriber; `RUST_LOG` wins over the flags
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Write a sample configuration or the configuration schema
fn init(output: Option<&Path>, schema: bool, force: bool) -> Result<()> {
    let content = if schema {
        Config::json_schema_string()?
    } else {
        Config::sample().to_toml_with_schema()?
    };

    let output = match output {
        Some(p) => p.to_path_buf(),
        None if schema => {
            println!("{}", content);
            return Ok(());
        }
        None => PathBuf::from(CONFIG_FILE_NAME),
    };

    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    fs::write(&output, content)
        .with_context(|| format!("Failed to write: {}", output.display()))?;
    eprintln!("Created {}", output.display());

    Ok(())
}

/// Load `--config`, else `_mdpub.toml` next to the input, else defaults
fn load_config(input: &Path, explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path);
    }

    let dir = if input.is_dir() {
        input
    } else {
        input.parent().unwrap_or(Path::new("."))
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    Ok(Config::load_from_dir(dir)?.unwrap_or_default())
}

/// Process a single markdown file
fn process_file(pipeline: &Pipeline, input: &Path, output: Option<&Path>, quiet: bool) -> Result<()> {
    let report = match output {
        Some(output_path) => process_file_inner(pipeline, input, output_path)?,
        None => {
            let (markdown, report) = transform(pipeline, input)?;
            print!("{}", markdown);
            report
        }
    };

    report_relocation(&report.relocation, quiet);

    if report.relocation.has_failures() {
        anyhow::bail!("{} assets failed to relocate", report.relocation.failed.len());
    }

    Ok(())
}

/// Process a directory of markdown files
fn process_directory(pipeline: &Pipeline, input: &Path, args: &RunArgs) -> Result<()> {
    let Some(output_dir) = args.output.as_deref() else {
        anyhow::bail!("Directory input requires --output");
    };

    let files = collect_markdown_files(input, args.recursive)?;

    if files.is_empty() {
        if !args.quiet {
            eprintln!("No .md or .mdx files found in {}", input.display());
        }
        return Ok(());
    }

    tracing::debug!(count = files.len(), "Found markdown files");

    // Configure thread pool if jobs specified
    if let Some(n) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let success = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let results: Vec<_> = files
        .par_iter()
        .map(|file| {
            let relative = file.strip_prefix(input).unwrap_or(file);
            let output_file = output_dir.join(relative);

            match process_file_inner(pipeline, file, &output_file) {
                Ok(report) => {
                    success.fetch_add(1, Ordering::Relaxed);
                    if !args.quiet {
                        println!("{}", output_file.display());
                    }
                    Ok(report)
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    Err((file.clone(), e))
                }
            }
        })
        .collect();

    let mut relocation = RelocationSummary::default();
    for result in results {
        match result {
            Ok(report) => relocation.merge(report.relocation),
            Err((file, e)) => eprintln!("Error processing {}: {:#}", file.display(), e),
        }
    }

    let success_count = success.load(Ordering::Relaxed);
    let failed_count = failed.load(Ordering::Relaxed);

    if !args.quiet {
        eprintln!("Processed {} files, {} failed", success_count, failed_count);
    }
    report_relocation(&relocation, args.quiet);

    if failed_count > 0 {
        anyhow::bail!("{} files failed to process", failed_count);
    }
    if relocation.has_failures() {
        anyhow::bail!("{} assets failed to relocate", relocation.failed.len());
    }

    Ok(())
}

/// Transform `input` and write the result to `output`
fn process_file_inner(pipeline: &Pipeline, input: &Path, output: &Path) -> Result<DocumentReport> {
    let (markdown, report) = transform(pipeline, input)?;

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(output, &markdown).with_context(|| format!("Failed to write: {}", output.display()))?;

    Ok(report)
}

/// Run the pipeline on `input`, addressed by its absolute path
fn transform(pipeline: &Pipeline, input: &Path) -> Result<(String, DocumentReport)> {
    let path = fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve: {}", input.display()))?;

    let (markdown, report) = pipeline
        .process_file(&path)
        .with_context(|| format!("Failed to process: {}", input.display()))?;

    tracing::debug!(
        file = %input.display(),
        charts = report.charts.rendered,
        chart_errors = report.charts.failed,
        links = report.links,
        rewritten = report.relocation.rewritten,
        "Processed document"
    );

    Ok((markdown, report))
}

/// Print the relocation summary and every failed copy
fn report_relocation(summary: &RelocationSummary, quiet: bool) {
    for failure in &summary.failed {
        eprintln!(
            "Failed to relocate {} -> {}: {}",
            failure.source.display(),
            failure.dest.display(),
            failure.error
        );
    }

    if !quiet {
        eprintln!(
            "Rewrote {} URLs, copied {} assets ({} up to date, {} failed)",
            summary.rewritten,
            summary.copied,
            summary.not_required,
            summary.failed.len()
        );
    }
}

/// Collect all .md / .mdx files in a directory
fn collect_markdown_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if is_markdown(&path) {
                files.push(path);
            }
        } else if path.is_dir() && recursive {
            files.extend(collect_markdown_files(&path, recursive)?);
        }
    }

    files.sort();
    Ok(files)
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("mdx")
    })
}

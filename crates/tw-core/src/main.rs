//! Temporal Windows CLI.
//!
//! The main entry point for tw-core, handling:
//! - Sample generation (bucketing, windowing, writing)
//! - Motif feature extraction
//! - Chronological train/test splitting
//! - Configuration inspection and validation

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tw_common::error::{format_batch_human, format_error_human, BatchResult, StructuredError};
use tw_common::{EdgeRecord, Error, OutputFormat, SCHEMA_VERSION};
use tw_core::bucket::bucketize;
use tw_core::config::{load_config, ConfigError, ResolvedConfig};
use tw_core::exit_codes::ExitCode;
use tw_core::features::FeatureSet;
use tw_core::ingest;
use tw_core::log_event;
use tw_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    Stage,
};
use tw_core::pipeline::{samples_written, ExtractReport, Pipeline, RunReport, UnitReport};
use tw_core::table::TableSummary;
use tw_core::window::generate_windows;

/// Temporal Windows - labeled samples from temporal networks
#[derive(Parser)]
#[command(name = "tw-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Pipeline configuration file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Bucket, window and write samples for every class and radius
    Generate(GenerateArgs),

    /// Compute motif features for every persisted sample set
    Extract(OutputArgs),

    /// Merge features and write chronological train/test tables
    Split(OutputArgs),

    /// Generate, extract and split in one go
    Run(GenerateArgs),

    /// Bucket and window statistics for one edge file
    Inspect(InspectArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Directory with one edge file per class
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Output root
    #[arg(long, short = 'o')]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output root written by `generate`
    #[arg(long, short = 'o')]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Edge file to inspect
    edges: PathBuf,

    /// Override the configured bucket duration (seconds)
    #[arg(long)]
    bucket_secs: Option<i64>,

    /// Override the configured radii
    #[arg(long = "radius", value_delimiter = ',')]
    radii: Vec<u32>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration and its provenance
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the resolved configuration)
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = LogConfig::level_from_flags(cli.global.verbose, cli.global.quiet);
    let format = cli.global.format.is_machine().then_some(LogFormat::Jsonl);
    init_logging(&LogConfig::from_env(level, format));

    let exit_code = match cli.command {
        Commands::Generate(args) => run_generate(&cli.global, &args),
        Commands::Extract(args) => run_extract(&cli.global, &args),
        Commands::Split(args) => run_split(&cli.global, &args),
        Commands::Run(args) => run_pipeline(&cli.global, &args),
        Commands::Inspect(args) => run_inspect(&cli.global, &args),
        Commands::Config(args) => run_config(&cli.global, &args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn new_context() -> LogContext {
    LogContext::new(generate_run_id(), get_host_id())
}

fn load(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig, ExitCode> {
    match load_config(global.config.as_deref()) {
        Ok(resolved) => {
            if resolved.is_default() {
                log_event!(
                    ctx,
                    DEBUG,
                    event_names::CONFIG_DEFAULT_USED,
                    Stage::Init,
                    "using built-in configuration"
                );
            } else {
                log_event!(
                    ctx,
                    DEBUG,
                    event_names::CONFIG_LOADED,
                    Stage::Init,
                    "configuration loaded",
                    source = resolved.paths.source.to_string().as_str()
                );
            }
            Ok(resolved)
        }
        Err(e) => Err(output_config_error(global, ctx, e)),
    }
}

fn run_generate(global: &GlobalOpts, args: &GenerateArgs) -> ExitCode {
    let ctx = new_context();
    let resolved = match load(global, &ctx) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let pipeline = Pipeline::new(&resolved.config, &args.out, ctx.clone());

    if let Err(e) = pipeline.write_run_file(&resolved.snapshot()) {
        return output_error(global, &e);
    }
    let batch = match pipeline.generate(&args.input) {
        Ok(b) => b,
        Err(e) => return output_error(global, &e),
    };

    print_batch(global, &ctx, "generate", &batch, unit_line);
    match ExitCode::for_batch(&batch) {
        ExitCode::Clean if samples_written(&batch) == 0 => ExitCode::NoSamples,
        code => code,
    }
}

fn run_extract(global: &GlobalOpts, args: &OutputArgs) -> ExitCode {
    let ctx = new_context();
    let resolved = match load(global, &ctx) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let features = match FeatureSet::from_config(&resolved.config.features) {
        Ok(f) => f,
        Err(e) => return output_error(global, &e),
    };
    let pipeline = Pipeline::new(&resolved.config, &args.out, ctx.clone());

    let batch = match pipeline.extract(&features) {
        Ok(b) => b,
        Err(e) => return output_error(global, &e),
    };
    print_batch(global, &ctx, "extract", &batch, extract_line);
    ExitCode::for_batch(&batch)
}

fn run_split(global: &GlobalOpts, args: &OutputArgs) -> ExitCode {
    let ctx = new_context();
    let resolved = match load(global, &ctx) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let pipeline = Pipeline::new(&resolved.config, &args.out, ctx.clone());

    let batch = match pipeline.split() {
        Ok(b) => b,
        Err(e) => return output_error(global, &e),
    };
    print_batch(global, &ctx, "split", &batch, table_line);
    ExitCode::for_batch(&batch)
}

fn run_pipeline(global: &GlobalOpts, args: &GenerateArgs) -> ExitCode {
    let ctx = new_context();
    let resolved = match load(global, &ctx) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let features = match FeatureSet::from_config(&resolved.config.features) {
        Ok(f) => f,
        Err(e) => return output_error(global, &e),
    };
    let pipeline = Pipeline::new(&resolved.config, &args.out, ctx.clone());

    if let Err(e) = pipeline.write_run_file(&resolved.snapshot()) {
        return output_error(global, &e);
    }
    let report = match pipeline.run(&args.input, &features) {
        Ok(r) => r,
        Err(e) => return output_error(global, &e),
    };

    print_run_report(global, &report);
    run_exit_code(&report)
}

fn run_exit_code(report: &RunReport) -> ExitCode {
    let stages = [
        ExitCode::for_batch(&report.generate),
        ExitCode::for_batch(&report.extract),
        ExitCode::for_batch(&report.split),
    ];
    match stages.into_iter().find(|c| *c != ExitCode::Clean) {
        Some(code) => code,
        None if report.samples_written() == 0 => ExitCode::NoSamples,
        None => ExitCode::Clean,
    }
}

/// Statistics for one edge file.
#[derive(Debug, Serialize)]
struct InspectReport {
    path: String,
    edges: usize,
    first_timestamp: Option<String>,
    last_timestamp: Option<String>,
    bucket_secs: i64,
    buckets: usize,
    empty_buckets: usize,
    windows: Vec<RadiusStats>,
}

#[derive(Debug, Serialize)]
struct RadiusStats {
    radius: u32,
    windows: usize,
    non_empty: usize,
}

fn rfc3339(edge: Option<&EdgeRecord>) -> Option<String> {
    edge.and_then(|e| e.datetime()).map(|dt| dt.to_rfc3339())
}

fn inspect(path: &Path, bucket_secs: i64, radii: &[u32]) -> Result<InspectReport, Error> {
    let edges = ingest::read_edges(path)?;
    let buckets = bucketize(&edges, bucket_secs)?;

    let windows = radii
        .iter()
        .map(|&radius| {
            let windows = generate_windows(&buckets, radius);
            RadiusStats {
                radius,
                windows: windows.len(),
                non_empty: windows.filter(|w| !w.is_empty()).count(),
            }
        })
        .collect();

    Ok(InspectReport {
        path: path.display().to_string(),
        edges: edges.len(),
        first_timestamp: rfc3339(edges.first()),
        last_timestamp: rfc3339(edges.last()),
        bucket_secs,
        buckets: buckets.len(),
        empty_buckets: buckets.iter().filter(|b| b.is_empty()).count(),
        windows,
    })
}

fn run_inspect(global: &GlobalOpts, args: &InspectArgs) -> ExitCode {
    let ctx = new_context();
    let resolved = match load(global, &ctx) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let bucket_secs = args
        .bucket_secs
        .unwrap_or(resolved.config.bucket.duration_secs);
    let radii = if args.radii.is_empty() {
        let mut radii = resolved.config.radii.clone();
        radii.sort_unstable();
        radii.dedup();
        radii
    } else {
        args.radii.clone()
    };

    let report = match inspect(&args.edges, bucket_secs, &radii) {
        Ok(r) => r,
        Err(e) => return output_error(global, &e),
    };

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => print_json(&report, global.format),
        OutputFormat::Summary => {
            let windows: Vec<String> = report
                .windows
                .iter()
                .map(|w| format!("r{}={}", w.radius, w.non_empty))
                .collect();
            println!(
                "{}: {} edges, {} buckets ({} empty), samples {}",
                report.path,
                report.edges,
                report.buckets,
                report.empty_buckets,
                windows.join(" ")
            );
        }
        OutputFormat::Exitcode => {}
        OutputFormat::Md => {
            println!("# {}", report.path);
            println!();
            println!("- Edges: {}", report.edges);
            println!(
                "- Span: {} .. {}",
                report.first_timestamp.as_deref().unwrap_or("-"),
                report.last_timestamp.as_deref().unwrap_or("-")
            );
            println!(
                "- Buckets: {} of {}s ({} empty)",
                report.buckets, report.bucket_secs, report.empty_buckets
            );
            println!();
            println!("| radius | windows | non-empty |");
            println!("|---|---|---|");
            for w in &report.windows {
                println!("| {} | {} | {} |", w.radius, w.windows, w.non_empty);
            }
        }
    }
    ExitCode::Clean
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => run_config_show(global),
        ConfigCommands::Validate { path } => run_config_validate(global, path.as_deref()),
    }
}

/// Display the effective configuration (including defaults if no file is found).
fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let ctx = new_context();
    let resolved = match load(global, &ctx) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let snapshot = resolved.snapshot();

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => print_json(&snapshot, global.format),
        OutputFormat::Summary => {
            println!(
                "config {} from {} ({})",
                snapshot.short_id(),
                snapshot.config_source,
                snapshot.config_path.as_deref().unwrap_or("built-in")
            );
        }
        OutputFormat::Exitcode => {}
        OutputFormat::Md => {
            println!("# Configuration");
            println!();
            println!("- Source: {}", snapshot.config_source);
            println!(
                "- Path: {}",
                snapshot.config_path.as_deref().unwrap_or("built-in defaults")
            );
            println!("- Hash: {}", snapshot.config_hash);
            println!();
            match toml::to_string_pretty(&snapshot.config) {
                Ok(text) => println!("```toml\n{}```", text),
                Err(e) => eprintln!("failed to render configuration: {}", e),
            }
        }
    }
    ExitCode::Clean
}

fn run_config_validate(global: &GlobalOpts, path: Option<&Path>) -> ExitCode {
    let ctx = new_context();
    let path = path.or(global.config.as_deref());
    let resolved = match load_config(path) {
        Ok(r) => r,
        Err(e) => return output_config_error(global, &ctx, e),
    };
    let snapshot = resolved.snapshot();

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "valid",
                "path": snapshot.config_path,
                "source": snapshot.config_source,
                "hash": snapshot.config_hash,
            });
            print_json(&response, global.format);
        }
        OutputFormat::Exitcode => {}
        _ => println!(
            "valid: {}",
            snapshot.config_path.as_deref().unwrap_or("built-in defaults")
        ),
    }
    ExitCode::Clean
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "tw_core_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => print_json(&version_info, global.format),
        OutputFormat::Exitcode => {}
        _ => {
            println!("tw-core {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}

// ============================================================================
// Output helpers
// ============================================================================

fn use_color(global: &GlobalOpts) -> bool {
    !global.no_color && std::io::stderr().is_terminal()
}

fn print_json<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    let rendered = match format {
        OutputFormat::Jsonl => serde_json::to_string(value),
        _ => serde_json::to_string_pretty(value),
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

fn unit_line(u: &UnitReport) -> String {
    format!(
        "{}/{}: {} edges, {} buckets, {} windows, {} written, {} empty skipped",
        u.class, u.config, u.edges, u.buckets, u.windows, u.written, u.skipped_empty
    )
}

fn extract_line(u: &ExtractReport) -> String {
    format!("{}/{}: {} samples", u.class, u.config, u.samples)
}

fn table_line(t: &TableSummary) -> String {
    format!("{}: {} train, {} test", t.config, t.train_rows, t.test_rows)
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    run_id: &'a str,
    command: &'a str,
    generated_at: String,
    result: &'a T,
}

fn print_batch<T: Serialize>(
    global: &GlobalOpts,
    ctx: &LogContext,
    command: &str,
    batch: &BatchResult<T>,
    line: fn(&T) -> String,
) {
    match global.format {
        OutputFormat::Json => {
            let envelope = Envelope {
                schema_version: SCHEMA_VERSION,
                run_id: &ctx.run_id,
                command,
                generated_at: chrono::Utc::now().to_rfc3339(),
                result: batch,
            };
            print_json(&envelope, OutputFormat::Json);
        }
        OutputFormat::Jsonl => {
            for item in &batch.succeeded {
                print_json(item, OutputFormat::Jsonl);
            }
            for failure in &batch.failed {
                print_json(failure, OutputFormat::Jsonl);
            }
        }
        OutputFormat::Summary => {
            println!(
                "[{}] {}: {} ok, {} failed",
                ctx.run_id, command, batch.summary.succeeded, batch.summary.failed
            );
        }
        OutputFormat::Exitcode => {}
        OutputFormat::Md => {
            println!("# {}", command);
            println!();
            for item in &batch.succeeded {
                println!("- {}", line(item));
            }
            if !batch.failed.is_empty() {
                println!();
                print!("{}", format_batch_human(batch, false));
            }
        }
    }
    if !batch.failed.is_empty() && global.format != OutputFormat::Md {
        eprint!("{}", format_batch_human(batch, use_color(global)));
    }
}

fn print_run_report(global: &GlobalOpts, report: &RunReport) {
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => print_json(report, global.format),
        OutputFormat::Summary => {
            println!(
                "[{}] run: {} samples; generate {}/{}, extract {}/{}, split {}/{}",
                report.run_id,
                report.samples_written(),
                report.generate.summary.succeeded,
                report.generate.summary.total,
                report.extract.summary.succeeded,
                report.extract.summary.total,
                report.split.summary.succeeded,
                report.split.summary.total,
            );
        }
        OutputFormat::Exitcode => {}
        OutputFormat::Md => {
            println!("# run {}", report.run_id);
            println!();
            println!("## generate");
            for u in &report.generate.succeeded {
                println!("- {}", unit_line(u));
            }
            println!();
            println!("## extract");
            for u in &report.extract.succeeded {
                println!("- {}", extract_line(u));
            }
            println!();
            println!("## split");
            for t in &report.split.succeeded {
                println!("- {}", table_line(t));
            }
        }
    }
    for batch_failed in [
        &report.generate.failed,
        &report.extract.failed,
        &report.split.failed,
    ] {
        for failure in batch_failed {
            eprintln!("✗ {}: {}", failure.item_id, failure.error.message);
        }
    }
}

fn output_error(global: &GlobalOpts, error: &Error) -> ExitCode {
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "error",
                "error": StructuredError::from(error),
            });
            match serde_json::to_string_pretty(&response) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("{}", error),
            }
        }
        OutputFormat::Exitcode => {}
        _ => eprintln!("{}", format_error_human(error, use_color(global))),
    }
    ExitCode::for_error(error)
}

fn output_config_error(global: &GlobalOpts, ctx: &LogContext, error: ConfigError) -> ExitCode {
    log_event!(
        ctx,
        ERROR,
        event_names::CONFIG_ERROR,
        Stage::Init,
        "configuration error",
        error = error.to_string().as_str()
    );
    let error: Error = error.into();
    output_error(global, &error)
}

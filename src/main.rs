use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use linefix::config::{self, RepairConfig};
use linefix::grammar::Parsed;
use linefix::oracle::{HttpOracle, Oracle, ReplayOracle};
use linefix::pipeline::{patch_from_response, Pipeline, RepairOutcome, RepairReport};
use linefix::source::SourceFile;
use linefix::writer::{write_if_modified, WriteOutcome};
use linefix::WorkspaceGuard;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Directory names never descended into when collecting files.
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "target",
    ".venv",
    "venv",
    "node_modules",
    "__pycache__",
];

#[derive(Parser)]
#[command(name = "linefix")]
#[command(about = "Find and fix defects in source files with a language-model oracle", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./linefix.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse files with the oracle and apply the suggested fixes
    Repair {
        /// Files or directories to repair
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// File extension to pick up when walking directories
        #[arg(long, default_value = "py")]
        ext: String,

        /// Workspace root; files outside it are refused (defaults to cwd)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Override the oracle model
        #[arg(long)]
        model: Option<String>,

        /// Override the oracle base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Override the sampling temperature
        #[arg(long)]
        temperature: Option<f32>,

        /// Send comment-stripped, whitespace-collapsed source to the oracle
        #[arg(long)]
        compact: bool,

        /// Use recorded oracle responses (in call order) instead of the network
        #[arg(long, num_args = 1..)]
        replay: Vec<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Print the line-numbered text that would be sent to the oracle
    Annotate {
        file: PathBuf,

        #[arg(long)]
        compact: bool,
    },

    /// Apply a recorded fix response to a file without contacting the oracle
    Apply {
        file: PathBuf,

        /// File holding "<line>, <action>, <text>" lines
        #[arg(short, long)]
        edits: PathBuf,

        /// Workspace root; files outside it are refused (defaults to cwd)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        #[arg(short = 'n', long)]
        dry_run: bool,

        #[arg(short, long)]
        diff: bool,
    },

    /// Load, validate and print the effective configuration
    CheckConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = env::current_dir().context("cannot determine working directory")?;
    config::load_dotenv(&cwd);
    let mut config = config::resolve(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Repair {
            paths,
            ext,
            workspace,
            model,
            base_url,
            temperature,
            compact,
            replay,
            dry_run,
            diff,
        } => {
            if let Some(model) = model {
                config.oracle.model = model;
            }
            if let Some(base_url) = base_url {
                config.oracle.base_url = base_url;
            }
            if let Some(temperature) = temperature {
                config.oracle.temperature = temperature;
            }
            config.annotate.compact |= compact;
            config.validate()?;

            let workspace = workspace.unwrap_or_else(|| cwd.clone());
            cmd_repair(&config, &paths, &ext, &workspace, &replay, dry_run, diff)
        }

        Commands::Annotate { file, compact } => {
            config.annotate.compact |= compact;
            cmd_annotate(&config, &file)
        }

        Commands::Apply {
            file,
            edits,
            workspace,
            dry_run,
            diff,
        } => {
            let workspace = workspace.unwrap_or_else(|| cwd.clone());
            cmd_apply(&config, &file, &edits, &workspace, dry_run, diff)
        }

        Commands::CheckConfig => cmd_check_config(&config),
    }
}

/// Logs go to stderr; stdout carries the report.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_oracle(config: &RepairConfig, replay: &[PathBuf]) -> Result<Box<dyn Oracle>> {
    if !replay.is_empty() {
        let oracle = ReplayOracle::from_files(replay).context("failed to read replay files")?;
        return Ok(Box::new(oracle));
    }

    config.validate_oracle().context(
        "oracle is not configured (set MODEL_LLM / URL_LLM, [oracle] in linefix.toml, or --model)",
    )?;

    let mut builder = HttpOracle::builder(config.oracle.base_url.clone())
        .with_timeout(Duration::from_secs(config.oracle.timeout_secs));
    match config::api_key(config) {
        Some(key) => builder = builder.with_api_key(key),
        None => tracing::info!(
            variable = %config.oracle.api_key_env,
            "No API key set, sending unauthenticated requests"
        ),
    }
    Ok(Box::new(builder.build()?))
}

/// Expand directories into the files below them with extension `ext`.
fn collect_targets(paths: &[PathBuf], ext: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(path).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && SKIPPED_DIRS.iter().any(|d| entry.file_name() == *d))
        });
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some(ext)
            {
                found.push(entry.path().to_path_buf());
            }
        }
        found.sort();
        files.extend(found);
    }

    Ok(files)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (repaired)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
        if change.missing_newline() {
            println!();
        }
    }
}

fn print_skips<T>(label: &str, parsed: &Parsed<T>) {
    if parsed.skipped() == 0 {
        return;
    }
    let details = parsed
        .skip_counts()
        .iter()
        .map(|(reason, count)| format!("{count} {reason}"))
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "  {}",
        format!("{label}: skipped {} line(s): {details}", parsed.skipped()).dimmed()
    );
}

fn print_report(report: &RepairReport) {
    println!("  Defects found:");
    for defect in &report.defects.items {
        println!("    line {}: {}", defect.line, defect.message);
    }
    print_skips("defect reply", &report.defects);

    if let Some(reason) = &report.operations.failure {
        println!("  {}", format!("Fix oracle unavailable: {reason}").yellow());
        return;
    }

    for edit in &report.patch.applied {
        println!("    {} line {}", edit.action, edit.target);
    }
    if !report.patch.shadowed.is_empty() {
        println!(
            "  {}",
            format!(
                "{} duplicate edit(s) ignored (first one per line wins)",
                report.patch.shadowed.len()
            )
            .dimmed()
        );
    }
    if !report.patch.unmatched.is_empty() {
        let targets = report
            .patch
            .unmatched
            .iter()
            .map(|op| op.target.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  {}",
            format!("edit(s) for nonexistent line(s) dropped: {targets}").yellow()
        );
    }
    print_skips("fix reply", &report.operations);
}

fn cmd_repair(
    config: &RepairConfig,
    paths: &[PathBuf],
    ext: &str,
    workspace: &Path,
    replay: &[PathBuf],
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let oracle = build_oracle(config, replay)?;
    let guard = WorkspaceGuard::new(workspace)
        .with_context(|| format!("invalid workspace {}", workspace.display()))?;
    let files = collect_targets(paths, ext)?;

    if files.is_empty() {
        anyhow::bail!("No .{} files found in the given paths", ext);
    }

    if dry_run {
        println!("{}", "[DRY RUN - no files will be modified]".cyan());
    }

    let pipeline = Pipeline::new(oracle.as_ref(), config)
        .with_guard(&guard)
        .dry_run(dry_run);

    let mut total_repaired = 0;
    let mut total_clean = 0;
    let mut total_unchanged = 0;
    let mut total_unavailable = 0;
    let mut total_failed = 0;

    for file in files {
        match pipeline.run(&file) {
            Ok(RepairOutcome::Clean { path }) => {
                println!("{} {}: no defects found", "✓".green(), path.display());
                total_clean += 1;
            }
            Ok(RepairOutcome::OracleUnavailable {
                path,
                stage,
                reason,
            }) => {
                println!(
                    "{} {}: oracle unavailable during {} ({})",
                    "⊘".yellow(),
                    path.display(),
                    stage,
                    reason
                );
                total_unavailable += 1;
            }
            Ok(RepairOutcome::Unchanged(report)) => {
                println!(
                    "{} {}: fixes were not applied",
                    "⊙".yellow(),
                    report.path.display()
                );
                print_report(&report);
                total_unchanged += 1;
            }
            Ok(RepairOutcome::Repaired(report)) | Ok(RepairOutcome::WouldRepair(report)) => {
                let verb = if dry_run { "would apply" } else { "applied" };
                println!(
                    "{} {}: fixes {}",
                    "✓".green(),
                    report.path.display(),
                    verb
                );
                print_report(&report);
                if show_diff {
                    display_diff(&report.path, &report.original, &report.patch.content());
                }
                total_repaired += 1;
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), file.display(), e);
                total_failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} repaired", format!("{}", total_repaired).green());
    println!("  {} clean", format!("{}", total_clean).green());
    println!("  {} unchanged", format!("{}", total_unchanged).yellow());
    println!("  {} oracle unavailable", format!("{}", total_unavailable).yellow());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_annotate(config: &RepairConfig, file: &Path) -> Result<()> {
    let source =
        SourceFile::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    print!("{}", config.annotator().annotate(&source.lines));
    Ok(())
}

fn cmd_apply(
    config: &RepairConfig,
    file: &Path,
    edits: &Path,
    workspace: &Path,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let guard = WorkspaceGuard::new(workspace)
        .with_context(|| format!("invalid workspace {}", workspace.display()))?;
    let path = guard.validate_path(file)?;
    let source =
        SourceFile::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let response = fs::read_to_string(edits)
        .with_context(|| format!("failed to read edits from {}", edits.display()))?;

    let (operations, patch) = patch_from_response(&source, &response, &config.action_keywords());
    print_skips("edits", &operations);

    if show_diff && patch.modified {
        display_diff(&path, &source.content(), &patch.content());
    }

    if dry_run {
        let state = if patch.modified { "would change" } else { "would not change" };
        println!("{} {}", path.display(), state);
        return Ok(());
    }

    guard.revalidate(&path)?;
    match write_if_modified(&source, &patch)? {
        WriteOutcome::Written { path, bytes } => {
            println!(
                "{} {}: {} edit(s) applied ({} bytes)",
                "✓".green(),
                path.display(),
                patch.applied.len(),
                bytes
            );
        }
        WriteOutcome::Unchanged { path } => {
            println!("{} {}: not modified", "⊙".yellow(), path.display());
        }
    }

    Ok(())
}

fn cmd_check_config(config: &RepairConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    match config.validate_oracle() {
        Ok(()) => println!("{}", "Configuration OK".green()),
        Err(e) => println!(
            "{}",
            format!("Configuration valid for offline use only: {e}").yellow()
        ),
    }
    if config::api_key(config).is_none() {
        println!(
            "{}",
            format!("API key variable {} is not set", config.oracle.api_key_env).dimmed()
        );
    }
    Ok(())
}

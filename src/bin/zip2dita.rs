//! CLI binary for edgequake-zip2dita.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ProcessingConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_zip2dita::{
    analyze_file, dispatch_bundle, prepare_file, probe_endpoints, process_file, save_bundle,
    ArchiveAnalysis, ContentKind, ConversionEndpoints, ConversionOutcome, OutcomeStatus,
    PreparedBundle, ProcessingConfig, ProcessingProgressCallback, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback. Entries may finish out of order when
/// `--concurrency` > 1, so timings are keyed by entry index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening upload…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Cleaning");
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_run_start(&self, source_name: &str) {
        self.bar.set_message(format!("Sampling {source_name}…"));
    }

    fn on_kind_resolved(&self, kind: ContentKind, sampled: usize, processable: usize) {
        self.activate_bar(processable);
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("{} bundle, {processable} files to clean", kind.label())),
            dim(&format!("({sampled} sampled)"))
        ));
    }

    fn on_entry_start(&self, path: &str, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(path.to_string());
    }

    fn on_entry_complete(&self, path: &str, index: usize, total: usize, cleaned_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            index + 1,
            total,
            path,
            dim(&format!("{cleaned_len:>6} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_entry_fallback(&self, path: &str, stage: &str, reason: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        let reason: String = reason.chars().take(80).collect();
        self.bar.println(format!(
            "  {} {}  {} {}",
            yellow("⚠"),
            path,
            stage,
            dim(&reason)
        ));
    }

    fn on_dispatch_start(&self, kind: ContentKind, endpoint: Option<&str>) {
        self.bar.set_prefix("Uploading");
        self.bar.set_message(
            endpoint
                .map(str::to_string)
                .unwrap_or_else(|| format!("no {} endpoint, mocking", kind.label())),
        );
    }

    fn on_run_complete(&self, _outcome: &ConversionOutcome) {
        self.finish();
        let fallbacks = self.fallbacks.load(Ordering::SeqCst);
        if fallbacks > 0 {
            eprintln!(
                "{} {} stage(s) used their offline fallback",
                yellow("⚠"),
                fallbacks
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Clean and convert a Markdown bundle
  zip2dita docs.zip --markdown-endpoint http://localhost:3002/convert/markdown-to-dita

  # Convert a single Word document (endpoint is mandatory)
  DOCX_TO_DITA_API=http://localhost:3003/convert/docx-to-dita zip2dita report.docx

  # Look at the type vote only (no cleanup, no upload)
  zip2dita --inspect-only site.zip

  # Clean without the LLM and keep the bundle locally
  zip2dita --no-llm --no-dispatch --save-bundle cleaned.zip site.zip

  # Check which conversion services are up
  zip2dita --check-endpoints

  # Fail instead of mocking when a service is down
  zip2dita --strict --json site.zip > outcome.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  HTML_TO_DITA_API        HTML conversion endpoint
  MARKDOWN_TO_DITA_API    Markdown conversion endpoint
  DOCX_TO_DITA_API        DOCX conversion endpoint
"#;

/// Clean documentation bundles and send them to DITA conversion services.
#[derive(Parser, Debug)]
#[command(
    name = "zip2dita",
    version,
    about = "Clean HTML/Markdown/DOCX bundles and send them to DITA conversion services",
    long_about = "Detect the dominant document type of a .zip upload, clean every file of that \
type with deterministic rules plus an optional LLM pass, rebuild the archive and post it to \
the matching conversion service. A single .docx is cleaned and converted on its own.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Upload to process (.zip or .docx).
    #[arg(required_unless_present = "check_endpoints")]
    input: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// HTML-to-DITA conversion endpoint.
    #[arg(long, env = "HTML_TO_DITA_API")]
    html_endpoint: Option<String>,

    /// Markdown-to-DITA conversion endpoint.
    #[arg(long, env = "MARKDOWN_TO_DITA_API")]
    markdown_endpoint: Option<String>,

    /// DOCX-to-DITA conversion endpoint.
    #[arg(long, env = "DOCX_TO_DITA_API")]
    docx_endpoint: Option<String>,

    /// Fail instead of returning a mock result when a service is missing or down.
    #[arg(long, env = "ZIP2DITA_STRICT")]
    strict: bool,

    /// Entries classified to decide the bundle type.
    #[arg(long, env = "ZIP2DITA_SAMPLE_SIZE", default_value_t = 5)]
    sample_size: usize,

    /// Files cleaned concurrently.
    #[arg(short, long, env = "ZIP2DITA_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "ZIP2DITA_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Conversion upload timeout in seconds.
    #[arg(long, env = "ZIP2DITA_CONVERSION_TIMEOUT", default_value_t = 60)]
    conversion_timeout: u64,

    /// Skip the LLM entirely; only deterministic cleanup runs.
    #[arg(long, env = "ZIP2DITA_NO_LLM")]
    no_llm: bool,

    /// Print the type vote only, no cleanup or upload.
    #[arg(long)]
    inspect_only: bool,

    /// Probe every configured endpoint's /health and exit.
    #[arg(long)]
    check_endpoints: bool,

    /// Write the cleaned archive to this path.
    #[arg(long, value_name = "PATH")]
    save_bundle: Option<PathBuf>,

    /// Stop after cleanup; do not contact any conversion service.
    #[arg(long)]
    no_dispatch: bool,

    /// Output structured JSON instead of a summary.
    #[arg(long, env = "ZIP2DITA_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ZIP2DITA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ZIP2DITA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ZIP2DITA_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs; verbose always wins.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && !cli.inspect_only
        && !cli.check_endpoints;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as Arc<dyn ProcessingProgressCallback>),
    )?;

    // ── Endpoint health ──────────────────────────────────────────────────
    if cli.check_endpoints {
        let statuses = probe_endpoints(&config).await;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        } else {
            for s in &statuses {
                let state = match (&s.endpoint, s.available) {
                    (None, _) => dim("not configured"),
                    (Some(_), true) => green("available"),
                    (Some(_), false) => red("unavailable"),
                };
                println!(
                    "{:<9} {:<15} {}",
                    s.kind.label(),
                    state,
                    s.endpoint.as_deref().unwrap_or("")
                );
            }
        }
        return Ok(());
    }

    let input = cli.input.clone().context("No input file given")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let analysis = analyze_file(&input, &config)
            .await
            .context("Failed to analyse upload")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        } else {
            print_analysis(&analysis);
        }
        return Ok(());
    }

    // ── Full run ─────────────────────────────────────────────────────────
    let outcome = if cli.save_bundle.is_some() || cli.no_dispatch {
        let bundle = prepare_file(&input, &config).await;
        let bundle = match bundle {
            Ok(b) => b,
            Err(e) => {
                if let Some(ref cb) = progress {
                    cb.finish();
                }
                return Err(e).context("Preparation failed");
            }
        };
        if let Some(ref path) = cli.save_bundle {
            save_bundle(&bundle, path).context("Failed to save bundle")?;
            if !cli.quiet && !cli.json {
                eprintln!("{} bundle saved to {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        if cli.no_dispatch {
            if let Some(ref cb) = progress {
                cb.finish();
            }
            print_bundle(&bundle, cli.json)?;
            return Ok(());
        }
        let outcome = dispatch_bundle(&bundle, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        outcome.unwrap_or_else(|e| {
            ConversionOutcome::failed(
                &bundle.request_id,
                &bundle.source_name,
                Some(bundle.kind),
                (bundle.processed.len(), bundle.asset_count),
                &e,
            )
        })
    } else {
        process_file(&input, &config).await
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if !cli.quiet || outcome.status == OutcomeStatus::Failed {
        print_outcome(&outcome);
    }

    if outcome.status == OutcomeStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args to `ProcessingConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ProcessingConfig> {
    let mut endpoints = ConversionEndpoints::default();
    endpoints.html.url = cli.html_endpoint.clone();
    endpoints.markdown.url = cli.markdown_endpoint.clone();
    endpoints.structured_doc.url = cli.docx_endpoint.clone();
    if cli.strict {
        endpoints = endpoints.strict();
    }

    let mut builder = ProcessingConfig::builder()
        .endpoints(endpoints)
        .offline(cli.no_llm)
        .sample_size(cli.sample_size)
        .concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout)
        .conversion_timeout_secs(cli.conversion_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_analysis(a: &ArchiveAnalysis) {
    println!("File:         {}", a.source_name);
    println!(
        "Entries:      {} ({} directories, {} candidates)",
        a.total_entries, a.directories, a.candidates
    );
    println!("Dominant:     {}", bold(a.dominant.label()));
    for tally in a.votes.tallies() {
        println!("  {:<9} {} vote(s)", tally.kind.label(), tally.count);
    }
    for s in &a.sampled {
        println!(
            "  {} {}  {}",
            dim("·"),
            s.path,
            dim(&format!(
                "{} ({:?}, {:.2})",
                s.classification.kind, s.classification.source, s.classification.confidence
            ))
        );
    }
}

fn print_bundle(bundle: &PreparedBundle, json: bool) -> Result<()> {
    if json {
        let summary = serde_json::json!({
            "request_id": bundle.request_id,
            "source_name": bundle.source_name,
            "kind": bundle.kind,
            "processed": bundle.processed,
            "asset_count": bundle.asset_count,
            "excluded_count": bundle.excluded_count,
            "sampled": bundle.sampled,
            "archive_bytes": bundle.archive.len(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        eprintln!(
            "{} {} bundle: {} cleaned, {} assets, {} fallbacks, {} bytes",
            green("✔"),
            bundle.kind.label(),
            bundle.processed.len(),
            bundle.asset_count,
            bundle.fallback_count(),
            bundle.archive.len()
        );
    }
    Ok(())
}

fn print_outcome(o: &ConversionOutcome) {
    match o.status {
        OutcomeStatus::Success => {
            eprintln!(
                "{} {}  {} cleaned, {} assets  {}ms{}",
                green("✔"),
                bold(&o.source_name),
                o.processed_count,
                o.asset_count,
                o.duration_ms,
                if o.mock { yellow("  (mock)") } else { String::new() }
            );
            if let Some(ref link) = o.download_link {
                println!("{link}");
            }
            if let Some(ref msg) = o.message {
                eprintln!("   {}", dim(msg));
            }
        }
        OutcomeStatus::Failed => {
            eprintln!(
                "{} {}  {}",
                red("✘"),
                bold(&o.source_name),
                red(o.error.as_deref().unwrap_or("unknown error"))
            );
        }
    }
}

//! CLI binary for edgequake-translate.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `TranslatorConfig`, runs one streaming session and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_translate::client::llm::DEFAULT_MODEL;
use edgequake_translate::pipeline::input::load_input;
use edgequake_translate::{
    Dialect, FsArchive, ModelSelector, SessionEvent, Template, TranslationOutput,
    TranslationRequest, Translator, TranslatorConfig,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate to Hindi (stdout, Markdown)
  pdf-translate contract.pdf

  # Translate to English, write plain text to a file
  pdf-translate --target en --format text notice.pdf -o notice.txt

  # Ask the model for HTML-style markup instead of Markdown
  pdf-translate --dialect markup statement.pdf

  # Keep headers, footers and stamps
  pdf-translate --template detailed contract.pdf

  # Stream every session event as one JSON object per line
  pdf-translate --events contract.pdf > events.ndjson

  # Translate from a URL and archive input and output
  pdf-translate --archive-dir ./archive https://example.com/loan.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID for the auto-detected provider
  TRANSLATE_MODEL_ID      Model ID (same as --model)
  TRANSLATE_ARCHIVE_DIR   Archive directory (same as --archive-dir)
"#;

/// Translate PDF files and URLs with Language Models.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-translate",
    version,
    about = "Translate PDF files and URLs with Language Models",
    long_about = "Translate PDF documents (local files or URLs) with a Language Model, \
streaming the translation as it is generated and rendering the finished document as \
Markdown, plain text or JSON.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "TRANSLATE_OUTPUT")]
    output: Option<PathBuf>,

    /// Target language as an ISO 639-1 code (hi, en, …).
    #[arg(short, long, env = "TRANSLATE_TARGET", default_value = "hi")]
    target: String,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "TRANSLATE_MODEL_ID")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Output dialect requested from the model: markdown or markup.
    #[arg(long, env = "TRANSLATE_DIALECT", default_value = "markdown")]
    dialect: Dialect,

    /// Prompt template: simplified or detailed.
    #[arg(long, env = "TRANSLATE_TEMPLATE", default_value = "simplified")]
    template: Template,

    /// Result format.
    #[arg(long, env = "TRANSLATE_FORMAT", value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Print every session event as one JSON line instead of the result.
    #[arg(long)]
    events: bool,

    /// Model calls per document, including the first (1–10).
    #[arg(long, env = "TRANSLATE_MAX_ATTEMPTS", default_value_t = 3)]
    attempts: u32,

    /// Timeout for one model call in seconds.
    #[arg(long, env = "TRANSLATE_ATTEMPT_TIMEOUT", default_value_t = 300)]
    attempt_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "TRANSLATE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Archive input and output under this directory.
    #[arg(long, env = "TRANSLATE_ARCHIVE_DIR")]
    archive_dir: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "TRANSLATE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "TRANSLATE_MAX_TOKENS", default_value_t = 8000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TRANSLATE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Disable progress bar.
    #[arg(long, env = "TRANSLATE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TRANSLATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TRANSLATE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Markdown,
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so library INFO
    // logs are hidden while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.events;
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

    // ── Build translator and request ─────────────────────────────────────
    let config = build_config(&cli).await?;
    let bytes = load_input(&cli.input, cli.download_timeout, config.max_input_bytes)
        .await
        .context("Failed to load input")?;

    let model = cli.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let selector = ModelSelector::new(model).with_dialect(cli.dialect);
    let request = TranslationRequest::new(bytes, &cli.target, selector)
        .context("Invalid request")?
        .with_template(cli.template);

    let translator = Translator::new(config).context("Failed to set up the model client")?;

    // ── Run session ──────────────────────────────────────────────────────
    let mut session = translator
        .start_session(request)
        .await
        .context("Translation could not start")?;

    let canceller = session.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let bar = show_progress.then(new_progress_bar);
    let stdout = io::stdout();
    let mut output: Option<TranslationOutput> = None;

    while let Some(event) = session.next().await {
        if cli.events {
            let line = serde_json::to_string(&event).context("Failed to serialise event")?;
            let mut handle = stdout.lock();
            writeln!(handle, "{line}").context("Failed to write to stdout")?;
        }

        match event {
            SessionEvent::Start { ref document_id, input_size, target_language } => {
                if let Some(ref bar) = bar {
                    bar.set_message(format!("{document_id}  {input_size} bytes → {target_language}"));
                }
            }
            SessionEvent::Chunk { progress, .. } => {
                if let Some(ref bar) = bar {
                    bar.set_position(u64::from(progress));
                }
            }
            SessionEvent::Final { .. } => {
                if let Some(ref bar) = bar {
                    bar.set_position(100);
                    bar.finish_and_clear();
                }
                output = event.into_output();
            }
            SessionEvent::Error { message, retries_exhausted, .. } => {
                if let Some(ref bar) = bar {
                    bar.abandon();
                }
                let hint = if retries_exhausted {
                    "gave up after retrying"
                } else {
                    "the model rejected the request"
                };
                anyhow::bail!("{} Translation failed ({hint}): {message}", red("✘"));
            }
            SessionEvent::Cancelled { .. } => {
                if let Some(ref bar) = bar {
                    bar.abandon();
                }
                anyhow::bail!("Translation cancelled");
            }
        }
    }

    let output = output.context("Session ended without a result")?;

    if !cli.events {
        write_result(&cli, &output).await?;
    }

    if !cli.quiet && !cli.events {
        eprintln!(
            "{}  {} chars  {} chunks  {} attempt(s)  {:.1}s  {} → {}",
            green("✔"),
            bold(&output.stats.chars.to_string()),
            output.stats.chunks,
            output.stats.attempts,
            output.elapsed_secs,
            output.detected_language,
            output.target_language,
        );
        if output.stats.degradations > 0 || output.stats.divergent_attempts > 0 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} parse fallbacks, {} divergent retries",
                    output.stats.degradations, output.stats.divergent_attempts
                ))
            );
        }
    }

    Ok(())
}

/// Map CLI args to `TranslatorConfig`.
async fn build_config(cli: &Cli) -> Result<TranslatorConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = TranslatorConfig::builder()
        .max_attempts(cli.attempts)
        .attempt_timeout_secs(cli.attempt_timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref dir) = cli.archive_dir {
        builder = builder.archive(Arc::new(FsArchive::new(dir)));
    }

    builder.build().context("Invalid configuration")
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&TICKS);
    bar.set_style(style);
    bar.set_prefix("Translating");
    bar.set_message("Waiting for a session slot…");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

async fn write_result(cli: &Cli, output: &TranslationOutput) -> Result<()> {
    let mut rendered = match cli.format {
        FormatArg::Markdown => output.to_markdown(),
        FormatArg::Text => output.to_plain_text(),
        FormatArg::Json => {
            serde_json::to_string_pretty(output).context("Failed to serialise output")?
        }
    };
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    match cli.output {
        Some(ref path) => tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut handle = io::stdout().lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")
        }
    }
}

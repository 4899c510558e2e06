//! CLI binary for svg-imgbundle.
//!
//! A thin shim over the library crate that maps CLI flags to `BundleConfig`
//! and moves bytes between files, stdin and stdout.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use svg_imgbundle::bundle::write_atomic;
use svg_imgbundle::{BundleConfig, BundleStats, Bundler, ReferenceScope, SourceLocation};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Bundle a file next to its images, write to stdout
  imgbundle diagram.svg > bundled.svg

  # Write to a file (atomic)
  imgbundle diagram.svg -o bundled.svg

  # Read from stdin; relative image paths are left untouched
  cat diagram.svg | imgbundle - > bundled.svg

  # Only inline remote icons
  imgbundle --remote-only diagram.svg -o bundled.svg

  # Print bundling statistics as JSON on stderr
  imgbundle --stats diagram.svg -o bundled.svg

ENVIRONMENT VARIABLES:
  RUST_LOG                  Log filter (overrides --verbose / --quiet)
  IMGBUNDLE_MAX_IMAGE_SIZE  Largest accepted remote image in bytes
  IMGBUNDLE_TIMEOUT         Deadline for the whole run in seconds
"#;

#[derive(Parser, Debug)]
#[command(
    name = "imgbundle",
    version,
    about = "Inline images referenced by an SVG document as data URIs",
    long_about = "Replace every <image href=\"...\"> in an SVG document with a base64 data URI, \
fetching remote URLs and reading local files, so the document has no external dependencies.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input SVG path, or `-` for stdin.
    #[arg(default_value = "-")]
    input: String,

    /// Output path. Defaults to stdout.
    #[arg(short, long, env = "IMGBUNDLE_OUTPUT")]
    output: Option<PathBuf>,

    /// Only inline `http(s)` references.
    #[arg(long, conflicts_with = "local_only")]
    remote_only: bool,

    /// Only inline filesystem references.
    #[arg(long)]
    local_only: bool,

    #[arg(long, env = "IMGBUNDLE_MAX_IMAGE_SIZE", default_value_t = svg_imgbundle::DEFAULT_MAX_IMAGE_SIZE)]
    max_image_size: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "IMGBUNDLE_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Deadline for the whole run in seconds.
    #[arg(long, env = "IMGBUNDLE_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    #[arg(short, long, env = "IMGBUNDLE_CONCURRENCY", default_value_t = 16)]
    concurrency: usize,

    /// Print bundling statistics as JSON on stderr.
    #[arg(long, env = "IMGBUNDLE_STATS")]
    stats: bool,

    #[arg(short, long, env = "IMGBUNDLE_VERBOSE")]
    verbose: bool,

    #[arg(short, long, env = "IMGBUNDLE_QUIET")]
    quiet: bool,
}

impl Cli {
    fn scope(&self) -> ReferenceScope {
        if self.remote_only {
            ReferenceScope::Remote
        } else if self.local_only {
            ReferenceScope::Local
        } else {
            ReferenceScope::All
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build bundler ────────────────────────────────────────────────────
    let config = BundleConfig::builder()
        .max_image_size(cli.max_image_size)
        .request_timeout_secs(cli.request_timeout)
        .bundle_timeout_secs(cli.timeout)
        .concurrency(cli.concurrency)
        .scope(cli.scope())
        .build()
        .context("Invalid configuration")?;
    let bundler = Bundler::new(config).context("Failed to initialise bundler")?;

    let source = SourceLocation::parse(&cli.input);

    // ── Run ──────────────────────────────────────────────────────────────
    let stats = match (&source, &cli.output) {
        (SourceLocation::Path(input), Some(output)) => bundler
            .bundle_file(input, output, false)
            .await
            .context("Bundling failed")?,
        _ => {
            let document = read_input(&source)?;
            let out = bundler
                .bundle_detailed(&source, &document, false)
                .await
                .context("Bundling failed")?;
            write_output(cli.output.as_ref(), &out.document).await?;
            out.stats
        }
    };

    if cli.stats {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet && cli.output.is_some() {
        print_summary(&stats, cli.output.as_ref());
    }

    Ok(())
}

fn read_input(source: &SourceLocation) -> Result<Vec<u8>> {
    match source {
        SourceLocation::Path(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read '{}'", path.display())),
        SourceLocation::Stream => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            if buf.is_empty() {
                bail!("No input on stdin; pass an SVG path or pipe a document in");
            }
            Ok(buf)
        }
    }
}

async fn write_output(output: Option<&PathBuf>, document: &[u8]) -> Result<()> {
    match output {
        Some(path) => write_atomic(path, document)
            .await
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(document).context("Failed to write stdout")?;
            stdout.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}

fn print_summary(stats: &BundleStats, output: Option<&PathBuf>) {
    let target = output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    eprintln!(
        "{}  {}/{} images embedded  {}ms  →  {}",
        green("✔"),
        stats.embedded_references,
        stats.distinct_references,
        stats.duration_ms,
        bold(&target),
    );
    if stats.skipped_references > 0 {
        eprintln!(
            "   {}",
            dim(&format!("{} references left as-is", stats.skipped_references))
        );
    }
}

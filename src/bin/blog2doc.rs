//! CLI binary for blog2doc.
//!
//! A thin shim over the library crate that maps CLI flags to `ExportConfig`,
//! wires Ctrl-C to the cancel handle and prints where the books were written.

use anyhow::{Context, Result};
use blog2doc::{
    export_to_dir, CancelHandle, Credentials, ExportConfig, ExportProgressCallback, ExportStats,
    ProgressCallback, SourceKind, Variant,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while crawling (the total is unknown until
/// pagination ends) and one log line per post.
struct CliProgressCallback {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }

    /// Clear the spinner when the export fails before completing.
    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_crawl_start(&self, start_url: &str, source: SourceKind) {
        self.bar.set_prefix("Crawling");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scraping {start_url} as {source}…"))
        ));
    }

    fn on_post_fetched(&self, index: usize, title: &str, _url: &str) {
        self.bar
            .println(format!("  {} {:>4}  {}", green("✓"), index, title));
        self.bar.set_message(format!("{index} posts"));
    }

    fn on_post_failed(&self, index: usize, url: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} {:>4}  {}", red("✗"), index, dim(url)));
    }

    fn on_variant_start(&self, variant: Variant, posts: usize) {
        self.bar.set_prefix("Rendering");
        self.bar.set_message(format!("{variant} book, {posts} posts"));
    }

    fn on_export_complete(&self, stats: &ExportStats) {
        self.bar.finish_and_clear();
        let failed = self.failed.load(Ordering::SeqCst);
        eprintln!(
            "{} {} posts  {}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&stats.kept_posts.to_string()),
            dim(&format!(
                "({} unavailable, {} images cached, {} left remote)",
                failed, stats.cached_images, stats.failed_images
            )),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # WordPress blog, output in ./output
  blog2doc https://example.wordpress.com --source wordpress

  # Substack publication with custom title and author
  blog2doc https://example.substack.com --source substack \
      --title "Collected Essays" --author "A. Writer"

  # Custom cover image, stop after an hour
  blog2doc https://example.substack.com -s substack --image cover.jpg --deadline 3600

PAYWALLED SUBSTACK POSTS:
  Export SUBSTACK_SID and SUBSTACK_LLI with the values of the substack.sid and
  substack.lli cookies from a logged-in browser session. Run with
  --cookie-help for step-by-step instructions. Without them, paywalled posts
  are exported as their public preview.

ENVIRONMENT VARIABLES:
  SUBSTACK_SID   substack.sid session cookie
  SUBSTACK_LLI   substack.lli session cookie
  RUST_LOG       Override log filtering (e.g. blog2doc=debug)
"#;

const COOKIE_HELP: &str = r#"SUBSTACK COOKIE EXTRACTION

 1. Open https://substack.com in your browser and log in.
 2. Open Developer Tools (F12, or Cmd+Option+I on macOS).
 3. Go to Application (Chrome/Edge) or Storage (Firefox) → Cookies →
    https://substack.com.
 4. Copy the values of the `substack.sid` and `substack.lli` cookies.
 5. Export them before running blog2doc:

      export SUBSTACK_SID=<value of substack.sid>
      export SUBSTACK_LLI=<value of substack.lli>

 Treat these values like a password: anyone holding them is logged in as you.
"#;

/// Export a WordPress or Substack blog to offline books.
#[derive(clap::Parser, Debug)]
#[command(
    name = "blog2doc",
    version,
    about = "Export a WordPress or Substack blog to offline books, with and without images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Blog front page (WordPress) or publication URL (Substack).
    #[arg(required_unless_present = "cookie_help")]
    url: Option<String>,

    /// Blog layout: wordpress or substack.
    #[arg(short, long, env = "BLOG2DOC_SOURCE", default_value = "wordpress")]
    source: String,

    /// Document title. Default: the oldest post's title.
    #[arg(long, env = "BLOG2DOC_TITLE")]
    title: Option<String>,

    /// Document author. Default: "Unknown".
    #[arg(long, env = "BLOG2DOC_AUTHOR")]
    author: Option<String>,

    /// Cover image (URL or local path). Default: the first image in the posts.
    #[arg(long, env = "BLOG2DOC_IMAGE")]
    image: Option<String>,

    /// Directory the two books are written to.
    #[arg(short, long, env = "BLOG2DOC_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Keep downloaded images here instead of a temporary directory.
    #[arg(long, env = "BLOG2DOC_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Stop crawling after this many seconds and export what was collected.
    #[arg(long, env = "BLOG2DOC_DEADLINE")]
    deadline: Option<u64>,

    /// Images wider than this are downscaled (pixels).
    #[arg(long, env = "BLOG2DOC_MAX_WIDTH", default_value_t = 1000)]
    max_width: u32,

    /// JPEG quality for cached images (1–100).
    #[arg(long, env = "BLOG2DOC_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Print how to obtain Substack session cookies and exit.
    #[arg(long)]
    cookie_help: bool,

    /// Disable progress spinner.
    #[arg(long, env = "BLOG2DOC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BLOG2DOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BLOG2DOC_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = <Cli as clap::Parser>::parse();

    if cli.cookie_help {
        println!("{COOKIE_HELP}");
        return Ok(());
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // per-post lines carry the same information.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Cancellation ─────────────────────────────────────────────────────
    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} Interrupted; finishing with the posts collected so far", cyan("⚠"));
                cancel.cancel();
            }
        });
    }

    // ── Build config ─────────────────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb = cli_progress
        .clone()
        .map(|p| p as Arc<dyn ExportProgressCallback>);
    let config = build_config(&cli, cancel, progress_cb)?;

    if config.source == SourceKind::Substack && !config.credentials.is_authenticated() && !cli.quiet {
        eprintln!(
            "{} No Substack session cookies set; paywalled posts will be truncated {}",
            dim("ℹ"),
            dim("(see --cookie-help)")
        );
    }

    // ── Run export ───────────────────────────────────────────────────────
    let written = match export_to_dir(&config, &cli.output_dir, None).await {
        Ok(written) => written,
        Err(e) => {
            if let Some(ref progress) = cli_progress {
                progress.abandon();
            }
            return Err(e).context("Export failed");
        }
    };

    if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Exported {}/{} posts in {}ms",
                written.stats.kept_posts,
                written.stats.discovered_posts,
                written.stats.total_duration_ms
            );
        }
        eprintln!("   {}  {}", green("→"), bold(&written.illustrated.display().to_string()));
        eprintln!("   {}  {}", green("→"), bold(&written.text_only.display().to_string()));
        eprintln!(
            "   {}",
            dim(&format!(
                "{} requests, {} rate-limit backoffs, {}ms total",
                written.stats.fetch.requests,
                written.stats.fetch.rate_limited,
                written.stats.total_duration_ms
            ))
        );
    }

    Ok(())
}

/// Map CLI args to `ExportConfig`.
fn build_config(
    cli: &Cli,
    cancel: CancelHandle,
    progress: Option<ProgressCallback>,
) -> Result<ExportConfig> {
    let url = cli.url.as_deref().context("A blog URL is required")?;
    let source: SourceKind = cli.source.parse()?;

    let mut builder = ExportConfig::builder(url, source)
        .credentials(Credentials::from_env())
        .image_max_width(cli.max_width)
        .jpeg_quality(cli.quality)
        .cancel_handle(cancel);

    if let Some(ref t) = cli.title {
        builder = builder.title(t);
    }
    if let Some(ref a) = cli.author {
        builder = builder.author(a);
    }
    if let Some(ref i) = cli.image {
        builder = builder.cover_image(i);
    }
    if let Some(ref d) = cli.cache_dir {
        builder = builder.cache_dir(d);
    }
    if let Some(secs) = cli.deadline {
        builder = builder.run_deadline(Duration::from_secs(secs));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

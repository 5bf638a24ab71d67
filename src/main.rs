// feedreel command-line driver.
// Loads a blog listing, opens one post and prints what the viewer would show.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use feedreel::blog::{BlogClient, FeedItem, PostRecord, Transport};
use feedreel::config::Config;
use feedreel::error::{FeedError, Result};
use feedreel::feed::LoadOutcome;
use feedreel::fetch::join_all;
use feedreel::state::{FeedSession, Presenter};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

const USAGE: &str = "Usage: feedreel <listing-url> [--open N] [--config PATH]

  --open N, -o N       Open the item at feed position N (default 0)
  --config PATH        Read configuration from PATH
  --version, -V        Show version and exit
  --help, -h           Show this help message

Logging is controlled by FEEDREEL_LOG (default: feedreel=info).";

struct Args {
    listing_url: String,
    open: usize,
    config: Option<PathBuf>,
}

impl Args {
    /// Parse arguments. Ok(None) means a flag was handled and the program should exit.
    fn parse(mut args: impl Iterator<Item = String>) -> std::result::Result<Option<Self>, String> {
        let mut listing_url = None;
        let mut open = 0;
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--version" | "-V" => {
                    println!("feedreel {}", env!("CARGO_PKG_VERSION"));
                    return Ok(None);
                }
                "--help" | "-h" => {
                    println!("{USAGE}");
                    return Ok(None);
                }
                "--open" | "-o" => {
                    let value = args.next().ok_or("--open needs a position")?;
                    open = value
                        .parse()
                        .map_err(|_| format!("invalid position: {value}"))?;
                }
                "--config" => {
                    let value = args.next().ok_or("--config needs a path")?;
                    config = Some(PathBuf::from(value));
                }
                flag if flag.starts_with('-') => return Err(format!("unknown flag: {flag}")),
                other => {
                    if listing_url.is_some() {
                        return Err(format!("unexpected argument: {other}"));
                    }
                    listing_url = Some(other.to_string());
                }
            }
        }

        let listing_url = listing_url.ok_or("missing listing URL")?;
        Ok(Some(Self {
            listing_url,
            open,
            config,
        }))
    }
}

/// Presenter that reports viewer notifications on the console.
struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn show_loading(&self) {
        info!("loading post");
    }

    fn render(&self, item: &FeedItem, record: &PostRecord, image_index: usize) {
        info!(
            url = %item.id,
            images = record.images.len(),
            image_index,
            "showing post"
        );
    }

    fn notify_no_images(&self, item: &FeedItem) {
        eprintln!("No images found in {}", item.id);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("FEEDREEL_LOG").unwrap_or_else(|_| EnvFilter::new("feedreel=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {msg}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Url::parse(&args.listing_url)?;

    let transport: Arc<dyn Transport> = Arc::new(BlogClient::new(&config.user_agent)?);
    let session = FeedSession::new(config, transport, Arc::new(ConsolePresenter)).await?;

    if let LoadOutcome::Failed(e) = session.start(&args.listing_url).await {
        return Err(FeedError::Other(format!("could not load listing: {e}")));
    }
    for item in session.index().items() {
        println!("{:>3}  {}", item.position, item.id);
    }

    let item = session
        .index()
        .at(args.open)
        .ok_or_else(|| FeedError::Other(format!("no item at position {}", args.open)))?;
    session.open(&item.id).await;
    if let Some(record) = session.active_record() {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    let statuses = join_all(session.take_tasks()).await;
    let failed = statuses.iter().filter(|status| !status.is_success()).count();
    info!(tasks = statuses.len(), failed, "background work finished");
    Ok(())
}

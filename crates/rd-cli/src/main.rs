//! Redirector CLI
//!
//! Drives the redirect engine against a directory of JSON files that stand
//! in for the browser's synchronized and local storage areas.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use rd_core::config::EngineConfig;
use rd_core::interceptor::{NavigationInterceptor, Outcome};
use rd_core::lifecycle::{on_install, InstallOutcome};
use rd_core::pattern::compile_with;
use rd_core::types::NavigationEvent;

mod error;
mod events;
mod file_store;

use error::CliError;
use events::{read_events, PrintSink};
use file_store::open_provider;

#[derive(Parser)]
#[command(name = "rd-cli")]
#[command(about = "Redirector rule engine tools")]
struct Cli {
    /// Engine config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty rule list if none exists
    Init {
        /// Store directory
        #[arg(short, long)]
        store: PathBuf,
    },

    /// Run one navigation event through the interceptor
    Check {
        /// Store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Navigated URL
        #[arg(short, long)]
        url: String,

        #[arg(long, default_value_t = 1)]
        tab_id: i32,

        #[arg(long, default_value_t = 0)]
        frame_id: i32,
    },

    /// Replay newline-delimited JSON navigation events concurrently
    Replay {
        /// Store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Events file
        #[arg(short, long)]
        events: PathBuf,
    },

    /// Show what a pattern compiles to and test URLs against it
    Pattern {
        #[arg(short, long)]
        pattern: String,

        /// URLs to test
        #[arg(short, long)]
        url: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { store } => block_on(cmd_init(&store, &config)),
        Commands::Check {
            store,
            url,
            tab_id,
            frame_id,
        } => block_on(cmd_check(&store, &config, NavigationEvent::new(tab_id, url, frame_id))),
        Commands::Replay { store, events } => block_on(cmd_replay(&store, &config, &events)),
        Commands::Pattern { pattern, url } => {
            cmd_pattern(&config, &pattern, &url);
            Ok(())
        }
    }
}

fn block_on<F>(future: F) -> Result<(), CliError>
where
    F: std::future::Future<Output = Result<(), CliError>>,
{
    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    runtime.block_on(future)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let path = match path {
        Some(path) => path,
        None => return Ok(EngineConfig::default()),
    };

    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })?;
    EngineConfig::from_json(&text).map_err(|source| CliError::Config {
        path: path.display().to_string(),
        source,
    })
}

async fn cmd_init(store: &Path, config: &EngineConfig) -> Result<(), CliError> {
    let provider = open_provider(store, &config.storage);
    let mode = provider.mode().await?;

    match on_install(&provider).await? {
        InstallOutcome::Initialized => println!("Initialized empty rule list ({mode:?} storage)"),
        InstallOutcome::AlreadyPresent => println!("Rule list already present ({mode:?} storage)"),
    }

    Ok(())
}

async fn cmd_check(store: &Path, config: &EngineConfig, event: NavigationEvent) -> Result<(), CliError> {
    let provider = Arc::new(open_provider(store, &config.storage));
    let interceptor = NavigationInterceptor::with_config(provider, Arc::new(PrintSink), config.patterns.clone());

    match interceptor.handle(&event).await {
        Outcome::Redirected(_) => {}
        Outcome::NoAction(reason) => println!("no action: {reason:?}"),
    }

    Ok(())
}

async fn cmd_replay(store: &Path, config: &EngineConfig, events_path: &Path) -> Result<(), CliError> {
    let events = read_events(events_path)?;
    let provider = Arc::new(open_provider(store, &config.storage));
    let interceptor = Arc::new(NavigationInterceptor::with_config(
        provider,
        Arc::new(PrintSink),
        config.patterns.clone(),
    ));

    let start = Instant::now();
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(interceptor.run(rx));

    for event in events {
        // The receiver lives until the worker sees the channel close.
        let _ = tx.send(event);
    }
    drop(tx);

    let stats = worker.await?;
    println!(
        "Replayed {} events: {} redirects in {:.1}ms",
        stats.events,
        stats.redirects,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(())
}

fn cmd_pattern(config: &EngineConfig, pattern: &str, urls: &[String]) {
    let matcher = compile_with(pattern, &config.patterns);
    match matcher.as_str() {
        Some(expr) => println!("Pattern:    {pattern}\nExpression: {expr}"),
        None => println!("Pattern:    {pattern}\nExpression: <invalid, never matches>"),
    }

    for url in urls {
        let verdict = if matcher.is_match(url) { "match" } else { "no match" };
        println!("  {verdict:<8}  {url}");
    }
}

mod console;
mod stdio;

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use toolwire_core::config::{self, CONFIG_PATH};
use toolwire_core::{ActionEngine, FileSessionBackend, HttpTransport, SessionStore};
use toolwire_session::FileConversationStore;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "toolwire",
    version,
    about = "Drive catalog-defined AI tools from the terminal"
)]
struct Cli {
    /// Catalog file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
    /// Tool to activate at startup (defaults to the first one)
    #[arg(long)]
    tool: Option<String>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!("Starting toolwire");
    debug!(config = %cli.config.display(), tool = ?cli.tool, "CLI arguments parsed");

    let app = config::load_config(Some(&cli.config))?;
    let settings = app.settings;
    info!(
        path = %cli.config.display(),
        tools = app.catalog.len(),
        "Loaded tool catalog"
    );

    let session = Arc::new(SessionStore::new(Arc::new(FileSessionBackend::new(
        settings.session_dir(),
    ))));
    if session.load().is_some() {
        info!("Resuming server session");
    }
    let transport = HttpTransport::new(settings.base_url.clone(), session)
        .with_timeout(settings.timeout)?
        .with_headers(settings.headers.clone());
    let storage = Arc::new(FileConversationStore::new(settings.conversations_dir()));

    let engine = Arc::new(
        ActionEngine::new(Arc::new(app.catalog), Arc::new(transport), storage.clone())
            .with_notifier(Arc::new(console::ConsoleNotifier))
            .with_observer(Arc::new(console::ConsoleObserver::default()))
            .with_options(settings.engine_options()),
    );

    let initial = cli
        .tool
        .or_else(|| engine.catalog().ids().first().cloned());
    if let Some(tool) = initial {
        if !engine.activate(&tool) {
            warn!(tool = tool.as_str(), "Requested tool is not in the catalog");
        }
    }

    stdio::run(engine, storage).await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let default = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    });
}

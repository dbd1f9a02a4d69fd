use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::frame_sink::{run_frame_sink, LogFrameSink};
use server::games::rock_paper_scissors::{RockPaperScissors, GAME_NAME};
use server::orchestrator::SessionOrchestrator;
use server::registry::ConnectionRegistry;
use server::supervisor::Supervisor;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "12345")]
    port: u16,

    /// Seconds between keepalive pings
    #[arg(short, long, default_value = "2")]
    keepalive_secs: u64,

    /// Waiting-room poll period and countdown tick in milliseconds
    #[arg(long, default_value = "1000")]
    poll_ms: u64,

    /// Write the log to a timestamped file in this directory instead of stderr
    #[arg(short, long)]
    log_dir: Option<PathBuf>,
}

/// Sets up env_logger, defaulting to `info`. With a log directory the
/// output goes to `game_<unix-seconds>.log` inside it.
fn init_logging(log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)?;
        let started = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let file = File::create(dir.join(format!("game_{}.log", started)))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.log_dir.as_deref())?;

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        keepalive_interval: Duration::from_secs(args.keepalive_secs),
        poll_interval: Duration::from_millis(args.poll_ms),
        ..ServerConfig::default()
    };
    info!("Starting {} server on {}", GAME_NAME, config.bind_addr);

    let (registry, events) = ConnectionRegistry::new(&config);
    let registry = Arc::new(registry);
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();

    let orchestrator = SessionOrchestrator::new(
        Arc::clone(&registry),
        events,
        frames_tx,
        &config,
        RockPaperScissors::new,
    );

    let mut supervisor = Supervisor::new(config.shutdown_timeout);
    supervisor.spawn("server", Arc::clone(&registry).accept_loop());
    supervisor.spawn("visualizer", run_frame_sink(LogFrameSink::new(GAME_NAME), frames_rx));
    supervisor.spawn("game manager", orchestrator.run());

    let report = supervisor
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Could not listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        })
        .await;

    registry.close_all().await;

    if report.has_failures() {
        error!("Server stopped after a task failure: {:?}", report.finished);
    }
    info!("Server stopped");
    Ok(())
}

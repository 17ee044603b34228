//! pmdash daemon - live process-manager dashboard server
//!
//! This binary polls the process manager, derives per-process views, and
//! pushes them to all connected dashboard clients over WebSocket.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! pmdashd start
//!
//! # Start the daemon (background/daemonized)
//! pmdashd start -d
//!
//! # Start on a custom port with a custom pm2 binary
//! pmdashd start --port 9100 --pm2-bin /usr/local/bin/pm2
//!
//! # Stop the daemon
//! pmdashd stop
//!
//! # Check daemon status
//! pmdashd status
//!
//! # Enable debug logging
//! RUST_LOG=pmdashd=debug pmdashd start
//! ```
//!
//! # Exit codes
//!
//! Exits with status 2 when the process manager cannot be reached at
//! startup; all other failures exit with status 1.

use std::env;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pmdashd::dispatch::CommandDispatcher;
use pmdashd::hub::BroadcastHub;
use pmdashd::manager::ProcessManager;
use pmdashd::pm2::{Pm2Client, DEFAULT_PM2_BIN};
use pmdashd::server::{DashboardServer, DEFAULT_PORT};
use pmdashd::snapshot::SnapshotReader;
use pmdashd::sync::{
    SyncScheduler, DEFAULT_FULL_SYNC_INTERVAL, DEFAULT_STATE_SYNC_INTERVAL,
};

/// Exit status when the process manager is unreachable at startup.
const EXIT_MANAGER_UNAVAILABLE: i32 = 2;

/// pmdash daemon - process-manager dashboard server
#[derive(Parser, Debug)]
#[command(name = "pmdashd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,

        /// TCP port for the dashboard channel (or PMDASH_PORT)
        #[arg(long)]
        port: Option<u16>,

        /// pm2 binary to invoke (or PMDASH_PM2_BIN)
        #[arg(long)]
        pm2_bin: Option<PathBuf>,

        /// Full snapshot cadence in milliseconds
        #[arg(long)]
        full_interval_ms: Option<u64>,

        /// State snapshot cadence in milliseconds
        #[arg(long)]
        state_interval_ms: Option<u64>,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

/// Resolved start options after flags and environment are merged.
struct StartOptions {
    port: u16,
    pm2_bin: PathBuf,
    full_interval: Duration,
    state_interval: Duration,
}

fn pid_file_path() -> PathBuf {
    let state_dir = dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pmdash");
    state_dir.join("pmdashd.pid")
}

fn log_file_path() -> PathBuf {
    let state_dir = dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pmdash");
    state_dir.join("pmdash.log")
}

fn read_pid() -> Option<u32> {
    let path = pid_file_path();
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let path = pid_file_path();
    let _ = fs::remove_file(path);
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        // Stale PID file - remove it
        remove_pid_file();
    }
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default to 'start' if no subcommand given
    let command = args.command.unwrap_or(Command::Start {
        daemon: false,
        port: None,
        pm2_bin: None,
        full_interval_ms: None,
        state_interval_ms: None,
    });

    match command {
        Command::Start {
            daemon,
            port,
            pm2_bin,
            full_interval_ms,
            state_interval_ms,
        } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'pmdashd stop' to stop it first.");
                process::exit(1);
            }

            let options = resolve_start_options(
                port,
                pm2_bin,
                full_interval_ms,
                state_interval_ms,
            );

            if daemon {
                // Daemonize before starting the tokio runtime
                daemonize()?;
            }

            write_pid()?;

            let result = run_daemon(options);

            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {pid})...");
                stop_daemon(pid)?;

                // Wait for process to exit (up to 5 seconds)
                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {pid})");
                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
    }
}

/// Merges flags with environment variables and defaults.
fn resolve_start_options(
    port: Option<u16>,
    pm2_bin: Option<PathBuf>,
    full_interval_ms: Option<u64>,
    state_interval_ms: Option<u64>,
) -> StartOptions {
    let port = port
        .or_else(|| env::var("PMDASH_PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(DEFAULT_PORT);

    let pm2_bin = pm2_bin
        .or_else(|| env::var("PMDASH_PM2_BIN").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PM2_BIN));

    let full_interval = full_interval_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_FULL_SYNC_INTERVAL);

    let state_interval = state_interval_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_STATE_SYNC_INTERVAL);

    StartOptions {
        port,
        pm2_bin,
        full_interval,
        state_interval,
    }
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = File::create(&log_path).context("Failed to create log file for stderr")?;

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(options: StartOptions) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pmdashd=info".parse()?)
                .add_directive("pmdash_core=info".parse()?)
                .add_directive("pmdash_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "pmdash daemon starting"
    );

    let manager: Arc<dyn ProcessManager> = Arc::new(Pm2Client::new(&options.pm2_bin));

    // Startup probe: if the process manager is unreachable now there is
    // nothing to serve, and exiting lets a supervisor restart us with a
    // distinct status.
    if let Err(e) = manager.list().await {
        error!(
            pm2_bin = %options.pm2_bin.display(),
            error = %e,
            "Cannot reach process manager, exiting"
        );
        process::exit(EXIT_MANAGER_UNAVAILABLE);
    }
    info!(pm2_bin = %options.pm2_bin.display(), "Process manager reachable");

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let hub = BroadcastHub::new();
    let reader = SnapshotReader::new(Arc::clone(&manager));

    let sync_handle = SyncScheduler::spawn(
        reader,
        hub.clone(),
        options.full_interval,
        options.state_interval,
        cancel_token.clone(),
    );
    info!("Sync scheduler started");

    let dispatcher = Arc::new(CommandDispatcher::new(manager, sync_handle));

    let server = DashboardServer::new(options.port, hub, dispatcher, cancel_token);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("pmdash daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

//! Sidekick CLI - command surface over the process supervisor.
//!
//! Each command maps onto supervisor operations and surfaces failure
//! reasons as user-visible messages. `run` supervises the analyzer in the
//! foreground until interrupted; the other commands are one-shot.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use sidekick_supervisor::{
    HostSurface, MetadataStore, Notice, ProcessSupervisor, ReleaseChannel, ReleaseClient,
    StateStore, StoragePaths, SupervisorState, resolve_binary_identifier, should_update,
};
use sidekick_types::BinaryIdentifier;

const CONFIG_FILE: &str = "sidekick.toml";

const DEFAULT_CONFIG: &str = "\
# Sidekick workspace configuration.
#
# Settings here are passed to the analyzer on startup; Sidekick itself
# only needs this file to exist to treat the directory as a workspace.

[analyzer]
# log_level = \"info\"
";

fn init_tracing(paths: &StoragePaths) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let log_dir = paths.log_dir();
    let log_file = std::fs::create_dir_all(&log_dir).ok().and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("sidekick.log"))
            .ok()
    });

    // Prefer "no logs" over mixing log lines into command output.
    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();
        tracing::info!(dir = %log_dir.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(env_filter).init();
    }
}

/// Terminal implementation of the host surface: yes/no prompts on stdin,
/// notifications on stdout/stderr.
struct TerminalHost;

impl TerminalHost {
    async fn confirm(question: &str) -> bool {
        use tokio::io::{AsyncBufReadExt, BufReader};

        print!("{question} [y/N] ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(_) => matches!(line.trim(), "y" | "Y" | "yes"),
            Err(_) => false,
        }
    }
}

impl HostSurface for TerminalHost {
    async fn confirm_install(&self, identifier: &BinaryIdentifier) -> bool {
        Self::confirm(&format!(
            "No analyzer is installed. Download and install '{identifier}'?"
        ))
        .await
    }

    async fn confirm_update(&self, identifier: &BinaryIdentifier) -> bool {
        Self::confirm(&format!(
            "A newer analyzer build is available. Update '{identifier}'?"
        ))
        .await
    }

    fn notify(&self, level: Notice, message: &str) {
        match level {
            Notice::Info => println!("{message}"),
            Notice::Warning => eprintln!("warning: {message}"),
            Notice::Error => eprintln!("error: {message}"),
        }
    }
}

fn print_usage() {
    eprintln!(
        "usage: sidekick <command>

commands:
  run            start the analyzer and supervise it until interrupted
  update         install the latest published analyzer build
  status         show the installed analyzer and update availability
  set-binary <path>
                 use a custom analyzer binary instead of the managed one
  reset-binary   go back to the managed analyzer binary
  create-config  write a default workspace config (no-op if present)
  help           show this message"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let paths = StoragePaths::discover().context("could not determine a home directory")?;
    init_tracing(&paths);

    match std::env::args().nth(1).as_deref() {
        Some("run") => run(paths).await,
        Some("update") => update(paths).await,
        Some("status") => status(paths).await,
        Some("set-binary") => set_binary(&paths, std::env::args().nth(2)),
        Some("reset-binary") => reset_binary(&paths),
        Some("create-config") => create_config(),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}");
        }
    }
}

/// Start the analyzer and keep supervising it until ctrl-c.
async fn run(paths: StoragePaths) -> Result<()> {
    let mut supervisor = ProcessSupervisor::new(paths, ReleaseChannel::default(), TerminalHost);

    supervisor.start().await?;
    if supervisor.state() != SupervisorState::Running {
        // Install declined; nothing to supervise.
        return Ok(());
    }
    match supervisor.process_id() {
        Some(pid) => println!("Analyzer running (pid {pid}). Press ctrl-c to stop."),
        None => println!("Analyzer running. Press ctrl-c to stop."),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                supervisor.stop().await;
                break;
            }
            event = supervisor.next_event() => {
                match event {
                    Some(event) => supervisor.handle_event(event).await,
                    None => break,
                }
                if supervisor.state() == SupervisorState::NotRunning {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn update(paths: StoragePaths) -> Result<()> {
    let mut supervisor = ProcessSupervisor::new(paths, ReleaseChannel::default(), TerminalHost);
    supervisor.update().await?;
    Ok(())
}

async fn status(paths: StoragePaths) -> Result<()> {
    let identifier = resolve_binary_identifier()?;
    let store = StateStore::load(&paths);

    let binary_path = match store.custom_binary_path() {
        Some(custom) if custom.exists() => {
            println!("binary: {} (custom)", custom.display());
            custom.to_path_buf()
        }
        _ => {
            let default = paths.default_binary_path(&identifier);
            let installed = if default.exists() { "" } else { " (not installed)" };
            println!("binary: {}{installed}", default.display());
            default
        }
    };

    match MetadataStore::read(&binary_path) {
        Some(meta) => println!(
            "installed: {} ({})",
            meta.tag_name(),
            meta.updated_at().to_rfc3339()
        ),
        None => println!("installed: untracked"),
    }

    let client = ReleaseClient::new(ReleaseChannel::default());
    if should_update(&client, &binary_path, &identifier).await {
        println!("update: available (run `sidekick update`)");
    } else {
        println!("update: none");
    }
    Ok(())
}

fn set_binary(paths: &StoragePaths, path: Option<String>) -> Result<()> {
    let Some(path) = path else {
        bail!("set-binary requires a path argument");
    };
    let path = PathBuf::from(path)
        .canonicalize()
        .context("custom binary path does not exist")?;

    let mut store = StateStore::load(paths);
    store
        .set_custom_binary_path(path.clone())
        .context("failed to persist custom binary path")?;
    println!("Using custom analyzer binary: {}", path.display());
    Ok(())
}

fn reset_binary(paths: &StoragePaths) -> Result<()> {
    let mut store = StateStore::load(paths);
    store
        .clear_custom_binary_path()
        .context("failed to persist state")?;
    println!("Using the managed analyzer binary again");
    Ok(())
}

/// Idempotent: never overwrites an existing config.
fn create_config() -> Result<()> {
    let path = PathBuf::from(CONFIG_FILE);
    if path.exists() {
        println!("{CONFIG_FILE} already exists");
        return Ok(());
    }
    std::fs::write(&path, DEFAULT_CONFIG).context("failed to write config")?;
    println!("Created {CONFIG_FILE}");
    Ok(())
}

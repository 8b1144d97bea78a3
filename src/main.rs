use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use matlabctl::banner::{BannerInfo, print_banner, print_session_summary};
use matlabctl::commands::{CommandRegistry, CommandResult, SessionInfo, print_values};
use matlabctl::config::Config;
use matlabctl::consts::{DEFAULT_REQUEST_TIMEOUT, default_db_path};
use matlabctl::history::sqlite::SqliteHistory;
use matlabctl::interactor::Interactor;
use matlabctl::interactor::logging::LoggingInteractor;
use matlabctl::proxy::{ProxyConfig, RemoteProxy};
use matlabctl::transport::Transport;
use matlabctl::transport::loopback::LoopbackEngine;
use matlabctl::transport::process::{ProcessConfig, ProcessTransport};
use matlabctl::value::Value;

#[derive(Parser)]
#[command(
    name = "matlabctl",
    version,
    about = "Drive a MATLAB session from the terminal."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Bridge executable speaking line-delimited JSON on stdin/stdout
    #[arg(short, long, conflicts_with = "loopback")]
    bridge: Option<String>,

    /// Extra argument passed to the bridge (repeatable)
    #[arg(long = "bridge-arg", value_name = "ARG")]
    bridge_args: Vec<String>,

    /// Use the built-in in-process engine instead of a bridge
    #[arg(long, default_value_t = false)]
    loopback: bool,

    /// SQLite database for history and settings (use :memory: for ephemeral)
    #[arg(short, long)]
    db: Option<String>,

    /// Request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Evaluate a single command, print its result and exit
    #[arg(short, long)]
    run: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Read or change stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Store a setting (bridge, timeout)
    Set { key: String, value: String },
    /// Show a setting
    Get { key: String },
    /// Remove a setting
    Unset { key: String },
}

type Session = LoggingInteractor<RemoteProxy<Box<dyn Transport>>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db.as_deref())?;
    let config = Config::open(&db_path)?;

    if let Some(Command::Config { action }) = &cli.command {
        return handle_config(&config, action);
    }

    let timeout = match cli.timeout {
        Some(secs) => Duration::from_secs(secs),
        None => config.timeout()?.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
    };

    let (transport, transport_label): (Box<dyn Transport>, String) = if cli.loopback {
        (Box::new(LoopbackEngine::new()), "loopback".to_string())
    } else {
        let program = match cli.bridge.clone() {
            Some(program) => program,
            None => config.bridge()?.context(
                "no engine configured: pass --bridge <path>, \
                 run `matlabctl config set bridge <path>`, or use --loopback",
            )?,
        };
        let process = ProcessConfig {
            program: program.clone(),
            args: cli.bridge_args.clone(),
            working_dir: None,
        };
        let transport = ProcessTransport::spawn(&process)
            .with_context(|| format!("failed to start bridge {program}"))?;
        (Box::new(transport), program)
    };

    let history = Arc::new(SqliteHistory::new(&db_path)?);
    let proxy = RemoteProxy::new(
        transport,
        ProxyConfig {
            request_timeout: timeout,
        },
    )
    .with_history(history.clone());
    let session: Session = LoggingInteractor::with_label(proxy, transport_label.clone());

    // Single command mode
    if let Some(command) = cli.run {
        if let Err(e) = run_line(&session, &command).await {
            eprintln!("error: {e}");
        }
        return Ok(());
    }

    print_banner(&BannerInfo {
        transport: &transport_label,
        timeout_secs: timeout.as_secs(),
        history: if db_path == ":memory:" {
            "ephemeral"
        } else {
            &db_path
        },
    });

    let registry = CommandRegistry::new();
    let info = SessionInfo {
        session: &session,
        history: Some(&*history),
    };

    // REPL: async stdin so Ctrl+C is caught at the prompt too
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\n>> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {e}");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match registry.dispatch(line, &info).await {
            CommandResult::Quit => break,
            CommandResult::Handled => continue,
            CommandResult::NotACommand => {}
        }

        tokio::select! {
            result = run_line(&session, line) => {
                if let Err(e) = result {
                    eprintln!("error: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n\ninterrupted");
            }
        }
    }

    let proxy = session.inner();
    print_session_summary(proxy.requests_sent(), !proxy.is_exited());
    Ok(())
}

/// Evaluate one line: a trailing `;` discards the result.
async fn run_line(session: &Session, line: &str) -> matlabctl::Result<()> {
    if line.ends_with(';') {
        return session.eval(line).await;
    }
    let values: Vec<Value> = session.returning_eval(line, 1).await?;
    if !values.is_empty() {
        print_values(&values);
    }
    Ok(())
}

fn resolve_db_path(db: Option<&str>) -> Result<String> {
    if let Some(db) = db {
        return Ok(db.to_string());
    }
    let path = default_db_path().context("cannot determine home directory; pass --db")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(path.to_string_lossy().into_owned())
}

fn handle_config(config: &Config, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(key, value)?;
            println!("✓ {key} = {value}");
        }
        ConfigAction::Get { key } => match config.get(key)? {
            Some(value) => println!("{value}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Unset { key } => {
            config.remove(key)?;
            println!("✓ {key} removed");
        }
    }
    Ok(())
}

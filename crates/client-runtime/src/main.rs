//! Ledger-Link command line client.
//!
//! Talks to the ledger backend with the same access as any wallet or dApp.
//!
//! ## Usage
//!
//! ```bash
//! # Print stream events for an agent
//! ledger-client --agent pk-1 watch
//!
//! # Submit a write and wait for its confirmation
//! ledger-client --agent pk-1 write community-1 set_property '{"value": 3}'
//!
//! # Read-only call
//! ledger-client --agent pk-1 read community-1 get_property
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_runtime::{record_metrics, spawn_metrics_reporter, Session, SessionConfig};
use ll_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use serde_json::Value;
use shared_types::{ConnectionStatus, EventKind, StreamEvent, SubjectId};
use tokio::sync::mpsc;
use ll_telemetry::log_event;

/// Ledger-Link client
#[derive(Parser, Debug)]
#[command(name = "ledger-client")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "LL_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL (API and stream)
    #[arg(long)]
    server: Option<String>,

    /// Agent identity (public key)
    #[arg(long)]
    agent: Option<String>,

    /// Log filter, e.g. `debug` or `ll_01_stream_connection=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics on exit
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print decoded stream events and connection changes until Ctrl+C
    Watch {
        /// Event kinds to print (default: the confirmation kind and deploy_contract)
        #[arg(long = "kind")]
        kinds: Vec<String>,
    },

    /// Submit a contract write and wait for its confirmation
    Write {
        contract: String,
        method: String,
        /// JSON arguments
        #[arg(default_value = "{}")]
        args: String,
        /// Confirmation deadline in milliseconds
        #[arg(long, conflicts_with = "no_timeout")]
        timeout_ms: Option<u64>,
        /// Wait for the confirmation indefinitely
        #[arg(long)]
        no_timeout: bool,
    },

    /// Call a read-only contract method
    Read {
        contract: String,
        method: String,
        /// JSON arguments
        #[arg(default_value = "[]")]
        args: String,
    },

    /// List the agent's contracts
    Contracts,

    /// Check backend health
    Health,
}

/// Defaults, then file, then environment, then flags.
fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    config.telemetry = TelemetryConfig::from_env();
    config.apply_env()?;

    if let Some(server) = &args.server {
        config.set_server(server.clone());
    }
    if let Some(agent) = &args.agent {
        config.stream.identity = agent.clone();
    }
    if let Some(level) = &args.log_level {
        config.telemetry.log_level = level.clone();
    }
    if args.json_logs {
        config.telemetry.json_logs = true;
    }
    if let Command::Write {
        timeout_ms,
        no_timeout,
        ..
    } = &args.command
    {
        if *no_timeout {
            config.supervisor.default_timeout_ms = None;
        } else if let Some(ms) = timeout_ms {
            config.supervisor.default_timeout_ms = Some(*ms);
        }
    }
    Ok(config)
}

fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("arguments are not valid JSON: {text}"))
}

/// Wait until the stream is connected or has given up. Each attempt is
/// bounded by the connect timeout and the retry budget is finite.
async fn wait_connected(session: &Session) -> Result<()> {
    let mut status = session.connection_status();
    let settled: ConnectionStatus = *status
        .wait_for(|s: &ConnectionStatus| s.is_connected() || s.gave_up)
        .await
        .context("connection manager stopped")?;
    if !settled.is_connected() {
        bail!(
            "event stream unavailable after {} attempts",
            settled.reconnect_attempts
        );
    }
    Ok(())
}

async fn watch(session: &Session, kinds: Vec<String>) -> Result<()> {
    let kinds = if kinds.is_empty() {
        vec![
            session.config().correlator.confirmation_kind.clone(),
            EventKind::DEPLOY_CONTRACT.to_string(),
        ]
    } else {
        kinds
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<StreamEvent>();
    let subscriptions: Vec<_> = kinds
        .into_iter()
        .map(|kind| {
            let tx = tx.clone();
            session.on_event(kind, move |event| {
                let _ = tx.send(event.clone());
            })
        })
        .collect();
    drop(tx);

    session.start().await?;
    let mut status = session.connection_status();
    println!("{}", serde_json::json!({ "connection": *status.borrow() }));

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                println!("{}", serde_json::to_string(&event)?);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                println!("{}", serde_json::json!({ "connection": current }));
                if current.gave_up {
                    log_event!(
                        warn,
                        "stream",
                        "Event stream gave up reconnecting",
                        attempts = current.reconnect_attempts
                    );
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    for subscription in &subscriptions {
        session.off_event(subscription);
    }
    Ok(())
}

async fn write(session: &Session, contract: String, method: String, args: Value) -> Result<()> {
    session.start().await?;
    wait_connected(session).await?;

    let handle = session
        .write(SubjectId::new(contract), &method, args)
        .await
        .context("write submission failed")?;
    eprintln!("submitted, waiting for confirmation...");

    let outcome = tokio::select! {
        outcome = handle.outcome() => outcome,
        _ = tokio::signal::ctrl_c() => {
            session.supervisor().cancel(&handle);
            handle.outcome().await
        }
    };
    let outcome = outcome.context("write did not resolve")?;
    println!("{}", serde_json::to_string(&outcome)?);
    if !outcome.is_accepted() {
        bail!("write rejected");
    }
    Ok(())
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Watch { kinds } => watch(session, kinds).await,
        Command::Write {
            contract,
            method,
            args,
            ..
        } => write(session, contract, method, parse_json(&args)?).await,
        Command::Read {
            contract,
            method,
            args,
        } => {
            let value = session
                .read(&SubjectId::new(contract), &method, parse_json(&args)?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Command::Contracts => {
            let contracts = session.contracts().await?;
            println!("{}", serde_json::to_string_pretty(&contracts)?);
            Ok(())
        }
        Command::Health => {
            let health = session.api().health().await?;
            println!("{}", serde_json::to_string(&health)?);
            if !health.is_ok() {
                bail!("backend unhealthy: {}", health.status);
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _telemetry = init_telemetry(config.telemetry.clone())?;

    let metrics_interval = Duration::from_millis(config.session.metrics_interval_ms.max(100));
    let session = Arc::new(Session::from_config(config)?);
    let reporter = spawn_metrics_reporter(session.clone(), metrics_interval);

    let result = run(&session, args.command).await;

    session.end().await;
    reporter.abort();
    if args.metrics {
        record_metrics(&session);
        print!("{}", encode_metrics()?);
    }
    result
}

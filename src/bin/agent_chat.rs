//! agent-chat: line-oriented driver for an agent backend.
//!
//! Usage:
//!   agent-chat [--config <file.yaml>] [--base-url <url>]
//!
//! Lines are sent to the active mode. Commands:
//!   /mode <general|datamodel>   switch mode (resets the mode being left)
//!   /connect <ref>              select the external resource for the active mode
//!   /disconnect                 clear the resource selection
//!   /status                     show the active mode's state
//!   /stop                       abandon the in-flight turn
//!   /quit                       exit

use agent_session::notify::BroadcastNotificationSink;
use agent_session::{AgentSessions, ConversationMode, Notification, SessionConfig};
use anyhow::{bail, Context};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config(&args)?;

    let sink = Arc::new(BroadcastNotificationSink::new(256));
    let mut notifications = sink.subscribe();
    let sessions = AgentSessions::builder()
        .config(config)
        .notification_sink(sink.clone())
        .build()
        .context("failed to build agent sessions")?;

    tokio::spawn(async move {
        while let Some(n) = next_notification(&mut notifications).await {
            print_notification(&n);
        }
    });

    println!(
        "agent-chat {} · mode {} · /quit to exit",
        env!("CARGO_PKG_VERSION"),
        sessions.active_mode()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(cmd) = line.strip_prefix('/') {
            if !run_command(&sessions, cmd).await? {
                break;
            }
            continue;
        }
        // Errors were already reported through the sink.
        let _ = sessions.send(line).await;
    }
    Ok(())
}

/// Next notification, skipping over any the printer fell behind on. `None` once the
/// sink is gone.
async fn next_notification(rx: &mut broadcast::Receiver<Notification>) -> Option<Notification> {
    loop {
        match rx.recv().await {
            Ok(n) => return Some(n),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "notification printer lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn load_config(args: &[String]) -> anyhow::Result<SessionConfig> {
    let mut config = SessionConfig::from_env();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                config = SessionConfig::load(path)
                    .with_context(|| format!("failed to load {}", path))?;
            }
            "--base-url" => {
                config.base_url = iter.next().context("--base-url needs a value")?.clone();
            }
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(config)
}

/// Returns `false` when the driver should exit.
async fn run_command(sessions: &AgentSessions, cmd: &str) -> anyhow::Result<bool> {
    let mut parts = cmd.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());
    let mode = sessions.active_mode();

    match (name, arg) {
        ("quit" | "exit", _) => return Ok(false),
        ("mode", Some(m)) => match m.parse::<ConversationMode>() {
            Ok(target) => {
                let outcome = sessions.switch_mode(target);
                if let Some(prewarm) = outcome.prewarm {
                    // Best effort; failures are logged by the library.
                    let _ = prewarm.await;
                }
            }
            Err(e) => eprintln!("{}", e),
        },
        ("connect", Some(r)) => {
            sessions.set_resource_ref(mode, Some(r.to_string()));
            println!("[{}] resource set to {}", mode, r);
        }
        ("disconnect", _) => {
            sessions.set_resource_ref(mode, None);
        }
        ("stop", _) => {
            if sessions.cancel_pending(mode).is_none() {
                println!("[{}] nothing to stop", mode);
            }
        }
        ("status", _) => {
            let snap = sessions.snapshot(mode);
            println!(
                "[{}] state={:?} session={} resource={} messages={}",
                mode,
                snap.state,
                snap.session_id.as_deref().unwrap_or("-"),
                snap.resource_ref.as_deref().unwrap_or("-"),
                snap.messages.len()
            );
            if let Some(name) = snap.display_name {
                println!("[{}] connected to {}", mode, name);
            }
        }
        _ => eprintln!("unknown command: /{}", cmd),
    }
    Ok(true)
}

fn print_notification(n: &Notification) {
    match n {
        Notification::MessageAppended { mode, message } if !message.is_user() => {
            println!("[{}] assistant: {}", mode, message.text);
            if let Some(vis) = &message.attachment {
                println!("[{}]   (visualization: {})", mode, vis.0);
            }
        }
        Notification::MessageAppended { .. } => {}
        Notification::StatusChanged { mode, status } => {
            if let Some(s) = status {
                println!("[{}] … {}", mode, s);
            }
        }
        Notification::Error { mode, kind, message } => {
            eprintln!("[{}] {} error: {}", mode, kind, message);
        }
        Notification::SessionStarted { mode, session_id } => {
            println!("[{}] session {}", mode, session_id);
        }
        Notification::ModeSwitched { from, to } => {
            println!("switched {} -> {}", from, to);
        }
    }
}

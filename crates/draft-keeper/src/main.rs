use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use draft_keeper::config::{Config, ProbeKind};
use draft_keeper::{
    ConnectivityMonitor, DraftHandle, DraftSession, DraftStatus, DraftView, HttpUploadHandler,
    ManualProbe, SubmitOutcome, TcpProbe,
};
use draft_store_core::{DurableStore, MirrorStore, ReachabilityProbe};
use draft_store_local::{LocalDraftStore, LocalMirrorStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch as tokio_watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const TCP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A line typed at the console.
#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    Edit(String),
    Append(String),
    Submit,
    Accept,
    Dismiss,
    Online(bool),
    Show,
    Quit,
    Help,
}

fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (word, rest) = match line.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (line, ""),
    };

    match word {
        "edit" => Ok(ConsoleCommand::Edit(rest.to_string())),
        "append" => Ok(ConsoleCommand::Append(rest.to_string())),
        "submit" => Ok(ConsoleCommand::Submit),
        "accept" => Ok(ConsoleCommand::Accept),
        "dismiss" => Ok(ConsoleCommand::Dismiss),
        "online" => Ok(ConsoleCommand::Online(true)),
        "offline" => Ok(ConsoleCommand::Online(false)),
        "show" => Ok(ConsoleCommand::Show),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "help" | "" => Ok(ConsoleCommand::Help),
        other => Err(format!("unknown command: {}", other)),
    }
}

const HELP: &str = "commands: edit <text> | append <text> | submit | accept | dismiss | online | offline | show | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the console stays readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    info!("Starting draft-keeper");
    info!("  Draft: {}", config.draft_id);
    info!("  Probe: {} ({})", config.probe, config.watch_mode);

    let dir = config.effective_storage_dir();
    info!("  Storage dir: {}", dir.display());
    let durable: Arc<dyn DurableStore> = Arc::new(LocalDraftStore::new(&dir));
    let mirror: Arc<dyn MirrorStore> =
        Arc::new(LocalMirrorStore::new(&dir, config.mirror_prefix.clone()));

    let manual = match config.probe {
        ProbeKind::Manual => Some(ManualProbe::new(true)),
        ProbeKind::Tcp => None,
    };
    let probe: Arc<dyn ReachabilityProbe> = match &manual {
        Some(probe) => Arc::new(probe.clone()),
        None => Arc::new(TcpProbe::new(config.probe_addr.clone(), TCP_PROBE_TIMEOUT)),
    };
    let monitor = ConnectivityMonitor::start(probe, config.monitor_config()).await;

    let upload = Arc::new(HttpUploadHandler::new(
        config.upload_url.clone(),
        config.draft_id.clone(),
        config.upload_timeout(),
    )?);

    let session = DraftSession::spawn(config.session_config(), durable, mirror, upload, monitor);
    let status_renderer = tokio::spawn(render_status(session.subscribe_status(), std::io::stdout()));
    let renderer = tokio::spawn(render(session.subscribe()));

    let mut shutdown_rx = create_shutdown_signal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);
    print_view(&session.view());

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown_rx.wait_for(|&v| v) => None,
        };
        let Some(line) = line else { break };

        match parse_command(&line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => {
                // An upload can take a while; Ctrl+C still gets through
                tokio::select! {
                    _ = run_command(&session, manual.as_ref(), command) => {}
                    _ = shutdown_rx.wait_for(|&v| v) => break,
                }
            }
            Err(e) => println!("{} ({})", e, HELP),
        }
    }

    renderer.abort();
    status_renderer.abort();
    session.shutdown().await;
    info!("draft-keeper stopped");
    Ok(())
}

async fn run_command(session: &DraftHandle, manual: Option<&ManualProbe>, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Edit(text) => report(session.edit(text).await.map(|_| "saved".to_string())),
        ConsoleCommand::Append(text) => {
            let mut content = session.view().content;
            if !content.is_empty() {
                content.push(' ');
            }
            content.push_str(&text);
            report(session.edit(content).await.map(|_| "saved".to_string()));
        }
        ConsoleCommand::Submit => report(session.submit().await.map(|outcome| match outcome {
            SubmitOutcome::Uploaded => "uploaded".to_string(),
            SubmitOutcome::SavedOffline => "saved offline; will offer it again once online".to_string(),
        })),
        ConsoleCommand::Accept => report(
            session
                .accept_pending()
                .await
                .map(|text| format!("restored {} bytes", text.len())),
        ),
        ConsoleCommand::Dismiss => report(session.dismiss_pending().await.map(|_| "dismissed".to_string())),
        ConsoleCommand::Online(online) => match manual {
            Some(probe) => probe.set_online(online),
            None => println!("connectivity is probed over tcp; online/offline are ignored"),
        },
        ConsoleCommand::Show => print_view(&session.view()),
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
}

fn report(result: Result<String, draft_keeper::DraftError>) {
    match result {
        Ok(message) => println!("ok: {}", message),
        Err(e) => println!("error: {}", e),
    }
}

fn print_view(view: &DraftView) {
    match serde_json::to_string_pretty(view) {
        Ok(json) => println!("{}", json),
        Err(e) => println!("error: cannot render state: {}", e),
    }
}

/// Print every status transition, including short-lived ones.
async fn render_status(mut transitions: broadcast::Receiver<DraftStatus>, mut out: impl Write) {
    loop {
        let line = match transitions.recv().await {
            Ok(status) => format!("[status] {}", status),
            Err(RecvError::Lagged(skipped)) => format!("[status] ({} transitions skipped)", skipped),
            Err(RecvError::Closed) => break,
        };
        if writeln!(out, "{}", line).is_err() {
            break;
        }
    }
}

/// Print connectivity flips and reconciliation prompts.
async fn render(mut view: tokio_watch::Receiver<DraftView>) {
    let mut last = view.borrow_and_update().clone();
    while view.changed().await.is_ok() {
        let current = view.borrow_and_update().clone();
        if current.online != last.online {
            println!("[network] {}", if current.online { "online" } else { "offline" });
        }
        if current.pending != last.pending {
            match &current.pending {
                Some(text) => println!("[pending] saved draft found: {:?} (accept / dismiss)", text),
                None => println!("[pending] cleared"),
            }
        }
        if current.content.is_empty() && !last.content.is_empty() {
            println!("[draft] empty - {}", current.placeholder);
        }
        last = current;
    }
}

/// Create a shutdown signal that triggers on Ctrl+C or SIGTERM.
fn create_shutdown_signal() -> tokio_watch::Receiver<bool> {
    let (tx, rx) = tokio_watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, initiating shutdown");
            } else {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, initiating shutdown");
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        let _ = tx.send(true);
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("edit hello world"),
            Ok(ConsoleCommand::Edit("hello world".to_string()))
        );
        assert_eq!(parse_command("edit"), Ok(ConsoleCommand::Edit(String::new())));
        assert_eq!(parse_command("submit\r\n"), Ok(ConsoleCommand::Submit));
        assert_eq!(parse_command("offline"), Ok(ConsoleCommand::Online(false)));
        assert_eq!(parse_command(""), Ok(ConsoleCommand::Help));
        assert!(parse_command("publish").is_err());
    }

    #[tokio::test]
    async fn test_render_status_prints_every_transition() {
        let (tx, rx) = broadcast::channel(8);
        tx.send(DraftStatus::Saving).unwrap();
        tx.send(DraftStatus::Idle).unwrap();
        tx.send(DraftStatus::Uploading).unwrap();
        tx.send(DraftStatus::Uploaded).unwrap();
        drop(tx);

        let mut out = Vec::new();
        render_status(rx, &mut out).await;

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[status] saving\n[status] idle\n[status] uploading\n[status] uploaded\n"
        );
    }

    #[tokio::test]
    async fn test_render_status_reports_skipped_transitions() {
        let (tx, rx) = broadcast::channel(1);
        tx.send(DraftStatus::Saving).unwrap();
        tx.send(DraftStatus::Idle).unwrap();
        drop(tx);

        let mut out = Vec::new();
        render_status(rx, &mut out).await;

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[status] (1 transitions skipped)\n[status] idle\n"
        );
    }
}

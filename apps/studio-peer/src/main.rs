use anyhow::Result;
use clap::Parser;
use collaboration::{ChannelConnection, ConnectionId};
use playback::HeadlessEngine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use studio::{Session, SilentRenderer, StudioConfig};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod console;
mod net;

use console::Command;

const CRATES: [&str; 5] = ["studio_peer", "studio", "collaboration", "playback", "timeline"];

#[derive(Parser)]
#[command(name = "studio-peer")]
#[command(about = "Headless PeerStudio peer - shares a multitrack timeline over websockets")]
#[command(version)]
struct Cli {
    /// Address to accept peer connections on
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Peer websocket URL to dial (repeatable)
    #[arg(short, long)]
    connect: Vec<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

/// Everything the session task reacts to.
pub enum Event {
    Opened {
        id: ConnectionId,
        tx: mpsc::UnboundedSender<String>,
    },
    Frame {
        id: ConnectionId,
        text: String,
    },
    Closed {
        id: ConnectionId,
    },
    Command(String),
}

pub type EventSender = mpsc::UnboundedSender<Event>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let default_filter = CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect::<Vec<_>>()
        .join(",");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let config = match &cli.config {
        Some(path) => StudioConfig::load_or_default(path)?,
        None => StudioConfig::default(),
    };

    let mut session = Session::new(config, Box::new(HeadlessEngine::new()), Arc::new(SilentRenderer));
    info!("Studio peer {} ready", session.replica());

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Event>();

    if let Some(addr) = cli.listen {
        let events = events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = net::listen(addr, events).await {
                error!("Listener on {} stopped: {}", addr, e);
            }
        });
    }

    for url in cli.connect {
        let events = events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = net::dial(url.clone(), events).await {
                error!("Could not connect to {}: {}", url, e);
            }
        });
    }

    tokio::spawn(console::read_stdin(events_tx.clone()));
    drop(events_tx);

    loop {
        tokio::select! {
            ready = session.next_ready(), if session.has_pending() => {
                if let Some(clip_id) = ready {
                    info!("Clip {} added", clip_id);
                }
            }
            event = events_rx.recv() => {
                let Some(event) = event else {
                    info!("No peers or console left, shutting down");
                    break;
                };
                handle(&mut session, event);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn handle(session: &mut Session, event: Event) {
    match event {
        Event::Opened { id, tx } => session.connect(Box::new(ChannelConnection::new(id, tx))),
        Event::Frame { id, text } => {
            session.receive(id, &text);
        }
        Event::Closed { id } => session.disconnect(id),
        Event::Command(line) => match Command::parse(&line) {
            Ok(command) => println!("{}", console::execute(session, command)),
            Err(e) => {
                warn!("{}", e);
                println!("{}", console::HELP);
            }
        },
    }
}

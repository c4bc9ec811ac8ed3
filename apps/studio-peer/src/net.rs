//! Websocket plumbing. Each socket gets a reader task that forwards text
//! frames into the event queue and a writer task fed by the session.
use collaboration::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::{Event, EventSender};

pub async fn listen(addr: SocketAddr, events: EventSender) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening for peers on {}", addr);

    while let Ok((stream, remote)) = listener.accept().await {
        let events = events.clone();
        tokio::spawn(async move {
            match tokio_tungstenite::accept_async(stream).await {
                Ok(ws_stream) => run_connection(ws_stream, remote.to_string(), events).await,
                Err(e) => error!("WebSocket handshake with {} failed: {}", remote, e),
            }
        });
    }

    Ok(())
}

pub async fn dial(url: String, events: EventSender) -> anyhow::Result<()> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    info!("Connected to peer {}", url);
    run_connection(ws_stream, url, events).await;
    Ok(())
}

async fn run_connection<S>(ws_stream: WebSocketStream<S>, label: String, events: EventSender)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = ConnectionId::new();
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    if events.send(Event::Opened { id, tx }).is_err() {
        return;
    }
    info!("Peer {} attached as {}", label, id);

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(text)).await {
                error!("Failed to write to {}: {}", id, e);
                break;
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                debug!("Frame from {}: {} bytes", id, text.len());
                if events.send(Event::Frame { id, text }).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            // tungstenite answers pings itself
            Ok(_) => {}
            Err(e) => {
                warn!("Read error on {}: {}", id, e);
                break;
            }
        }
    }

    send_task.abort();
    let _ = events.send(Event::Closed { id });
    info!("Peer {} ({}) disconnected", label, id);
}

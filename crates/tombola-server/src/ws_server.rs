// WebSocket server for player screens and the operator panel.

use futures_util::stream::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Identifies one client connection for the lifetime of the process.
pub type ConnId = u64;

/// Per-connection outbound queue depth.
pub const OUTBOUND_BUFFER: usize = 256;

/// Events emitted by the WebSocket server to the application layer.
#[derive(Debug)]
pub enum WsEvent {
    /// A client finished the WebSocket handshake. Text pushed into
    /// `outbound` is written to that client in order.
    Connected {
        conn_id: ConnId,
        addr: String,
        outbound: mpsc::Sender<String>,
    },
    /// The client went away (close frame, error, or EOF).
    Disconnected { conn_id: ConnId },
    /// A text message was received from the client (raw JSON string).
    Message { conn_id: ConnId, text: String },
}

/// Bind the TCP listener the server will accept on.
pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections forever, forwarding their events through `tx`.
///
/// Each connection is served by its own task, so any number of clients may
/// be connected at once. Returns when the application side drops its
/// receiver.
pub async fn run(listener: TcpListener, tx: mpsc::Sender<WsEvent>) -> anyhow::Result<()> {
    let mut next_id: ConnId = 1;

    loop {
        let (stream, addr) = listener.accept().await?;
        if tx.is_closed() {
            break;
        }
        let conn_id = next_id;
        next_id += 1;
        info!("Accepted TCP connection #{conn_id} from {addr}");
        tokio::spawn(serve_connection(stream, addr.to_string(), conn_id, tx.clone()));
    }

    Ok(())
}

/// Handshake, then pump messages both ways until either side stops.
async fn serve_connection(
    stream: TcpStream,
    addr: String,
    conn_id: ConnId,
    tx: mpsc::Sender<WsEvent>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };

    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
    if tx
        .send(WsEvent::Connected {
            conn_id,
            addr: addr.clone(),
            outbound: out_tx,
        })
        .await
        .is_err()
    {
        return;
    }

    let (write, read) = ws_stream.split();
    let mut writer = tokio::spawn(write_outbound(write, out_rx));

    // The writer ends when the app drops this session or a write fails;
    // either way the connection closes.
    tokio::select! {
        _ = process_message_stream(read, &tx, conn_id, &addr) => {}
        _ = &mut writer => {
            info!("Outbound writer for connection #{conn_id} finished");
        }
    }

    let _ = tx.send(WsEvent::Disconnected { conn_id }).await;
    writer.abort();
    info!("Connection #{conn_id} from {addr} closed");
}

/// Write every queued text to `sink` until the queue closes or a write fails.
pub async fn write_outbound<S>(mut sink: S, mut rx: mpsc::Receiver<String>)
where
    S: Sink<Message> + Unpin,
{
    while let Some(text) = rx.recv().await {
        if sink.send(Message::Text(text.into())).await.is_err() {
            debug!("Outbound sink closed, dropping writer");
            break;
        }
    }
}

/// Process raw WebSocket [`Message`] items from any [`Stream`], forwarding
/// text payloads through `tx`. Returns `Err(())` if the channel is closed
/// (receiver dropped), signalling the caller to stop.
///
/// Generic over the stream so it can be tested without opening TCP ports.
pub async fn process_message_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<WsEvent>,
    conn_id: ConnId,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let event = WsEvent::Message {
                    conn_id,
                    text: text.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}

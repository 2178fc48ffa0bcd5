use crate::core::config::ConfigError;
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How the server frames payloads on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `/ws/<name>`: each frame is the bare event.
    Single,
    /// `/stream?streams=a/b`: each frame is a `{"stream": .., "data": ..}` envelope.
    Combined,
}

/// `<root>/ws/<name>`
pub fn single_stream_url(ws_root: &str, stream: &str) -> String {
    format!("{}/ws/{}", ws_root.trim_end_matches('/'), stream)
}

/// `<root>/stream?streams=<a>/<b>/...`
pub fn combined_stream_url(
    ws_root: &str,
    streams: &[impl AsRef<str>],
) -> Result<String, ExchangeError> {
    if streams.is_empty() {
        return Err(ConfigError::InvalidConfiguration(
            "combined stream needs at least one stream name".to_string(),
        )
        .into());
    }

    let names = streams
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/");
    Ok(format!(
        "{}/stream?streams={}",
        ws_root.trim_end_matches('/'),
        names
    ))
}

/// WebSocket session trait - pure transport plus a codec
#[async_trait]
pub trait WsSession<C: WsCodec>: Send {
    /// Next data frame payload, in arrival order.
    ///
    /// Pings are answered and skipped. Once the connection has ended, every
    /// call returns `ConnectionClosed`.
    async fn next_raw(&mut self) -> Result<Vec<u8>, ExchangeError>;

    /// Next data frame, decoded by the session's codec.
    async fn next_message(&mut self) -> Result<C::Message, ExchangeError>;

    /// Close the connection. Idempotent.
    async fn close(&mut self) -> Result<(), ExchangeError>;

    fn is_connected(&self) -> bool;

    fn kind(&self) -> StreamKind;
}

/// Closes a connection from outside the task that owns it.
///
/// An in-flight `next_raw` on the connection returns `ConnectionClosed`.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

enum Event {
    Frame(Option<Result<Message, tungstenite::Error>>),
    CloseRequested,
}

/// Tungstenite-based stream connection
pub struct TungsteniteWs<C: WsCodec> {
    url: String,
    kind: StreamKind,
    stream: Option<WsStream>,
    codec: C,
    close_tx: Arc<watch::Sender<bool>>,
    close_rx: watch::Receiver<bool>,
}

impl<C: WsCodec> std::fmt::Debug for TungsteniteWs<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TungsteniteWs")
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("connected", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: WsCodec> TungsteniteWs<C> {
    /// Connect to `url`.
    #[instrument(skip_all, fields(url = %url, kind = ?kind))]
    pub async fn connect(url: String, kind: StreamKind, codec: C) -> Result<Self, ExchangeError> {
        let (stream, _) = connect_async(url.as_str()).await?;
        debug!("stream connected");

        let (close_tx, close_rx) = watch::channel(false);
        Ok(Self {
            url,
            kind,
            stream: Some(stream),
            codec,
            close_tx: Arc::new(close_tx),
            close_rx,
        })
    }

    /// Open `<root>/ws/<stream>`.
    pub async fn open_single(ws_root: &str, stream: &str, codec: C) -> Result<Self, ExchangeError> {
        Self::connect(single_stream_url(ws_root, stream), StreamKind::Single, codec).await
    }

    /// Open `<root>/stream?streams=...` for all `streams` at once.
    pub async fn open_combined(
        ws_root: &str,
        streams: &[impl AsRef<str>],
        codec: C,
    ) -> Result<Self, ExchangeError> {
        let url = combined_stream_url(ws_root, streams)?;
        Self::connect(url, StreamKind::Combined, codec).await
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            tx: Arc::clone(&self.close_tx),
        }
    }

    async fn shutdown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("close handshake failed: {}", e);
            }
            debug!(url = %self.url, "stream closed");
        }
    }
}

#[async_trait]
impl<C: WsCodec> WsSession<C> for TungsteniteWs<C> {
    async fn next_raw(&mut self) -> Result<Vec<u8>, ExchangeError> {
        loop {
            let close_requested = *self.close_rx.borrow();
            if close_requested {
                self.shutdown().await;
                return Err(ExchangeError::ConnectionClosed);
            }

            let Some(stream) = self.stream.as_mut() else {
                return Err(ExchangeError::ConnectionClosed);
            };

            let close_rx = &mut self.close_rx;
            let event = tokio::select! {
                frame = stream.next() => Event::Frame(frame),
                _ = close_rx.changed() => Event::CloseRequested,
            };

            match event {
                Event::CloseRequested => {
                    self.shutdown().await;
                    return Err(ExchangeError::ConnectionClosed);
                }
                Event::Frame(Some(Ok(message))) => match message {
                    Message::Text(text) => return Ok(text.into_bytes()),
                    Message::Binary(data) => return Ok(data),
                    Message::Ping(data) => {
                        if let Some(stream) = self.stream.as_mut() {
                            if let Err(e) = stream.send(Message::Pong(data)).await {
                                warn!("Failed to send pong response: {}", e);
                            }
                        }
                    }
                    Message::Pong(_) | Message::Frame(_) => {}
                    Message::Close(frame) => {
                        debug!(?frame, "server closed stream");
                        self.stream = None;
                        return Err(ExchangeError::ConnectionClosed);
                    }
                },
                Event::Frame(Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                )))
                | Event::Frame(None) => {
                    self.stream = None;
                    return Err(ExchangeError::ConnectionClosed);
                }
                Event::Frame(Some(Err(e))) => {
                    self.stream = None;
                    return Err(e.into());
                }
            }
        }
    }

    async fn next_message(&mut self) -> Result<C::Message, ExchangeError> {
        let payload = self.next_raw().await?;
        self.codec.decode_message(&payload)
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        self.close_tx.send_replace(true);
        self.shutdown().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some() && !*self.close_rx.borrow()
    }

    fn kind(&self) -> StreamKind {
        self.kind
    }
}

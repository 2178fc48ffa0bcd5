//! Shared fixtures for the integration tests

#![allow(dead_code)]

use binanceapi::ExchangeConfig;
use std::future::Future;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, WebSocketStream};
use wiremock::MockServer;

pub const API_KEY: &str = "test-api-key";
pub const SECRET_KEY: &str = "test-secret-key";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Credentialed configuration pointed at the mock server.
pub fn signed_config(server: &MockServer) -> ExchangeConfig {
    ExchangeConfig::new(API_KEY.to_string(), SECRET_KEY.to_string()).base_url(server.uri())
}

pub fn read_only_config(server: &MockServer) -> ExchangeConfig {
    ExchangeConfig::read_only().base_url(server.uri())
}

/// Accept a single WebSocket connection on a random local port and hand it
/// to `handler`. Returns the `ws://` root to connect to.
pub async fn serve_websocket_once<F, Fut>(handler: F) -> String
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        handler(ws).await;
    });

    format!("ws://{}", addr)
}

/// Kernel - transport layer shared by every endpoint and stream
///
/// The kernel holds only transport logic and generic interfaces; nothing in
/// here knows the shape of a specific endpoint or stream payload.
///
/// # Transport Layer
/// - `RestClient`: HTTP client interface, status checked before decode
/// - `WsSession`: stream connection with ping handling and close semantics
///
/// # Authentication
/// - `QueryParams`: canonical, byte-ordered parameter encoding
/// - `Signer` / `HmacSigner`: HMAC-SHA256 over the canonical query
/// - `AuthTier`: public, key-only, or signed
///
/// # Message Handling
/// - `WsCodec`: turns one frame payload into a typed message
///
/// # Example
/// ```rust,no_run
/// use binanceapi::core::kernel::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let signer = Arc::new(HmacSigner::new("api_key".to_string(), "secret_key".to_string()));
/// let rest = RestClientBuilder::new(RestClientConfig::new(
///     "https://api.binance.com".to_string(),
///     "binance".to_string(),
/// ))
/// .with_signer(signer)
/// .build()?;
///
/// let params = QueryParams::new().with("symbol", "BTCUSDT");
/// let account: serde_json::Value = rest.get_json("/api/v3/account", &params, AuthTier::Signed).await?;
/// # let _ = account;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod query;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::{RawCodec, WsCodec};
pub use query::{ParamValue, QueryParams};
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{sign, AuthTier, HmacSigner, Signer, API_KEY_HEADER};
pub use ws::{CloseHandle, StreamKind, TungsteniteWs, WsSession};

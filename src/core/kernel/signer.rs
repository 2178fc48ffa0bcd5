use crate::core::errors::ExchangeError;
use crate::core::kernel::query::QueryParams;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key on key-only and signed requests.
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// How much authentication a REST call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthTier {
    /// No header, no signature.
    Public,
    /// API key header only. Used by the user-data-stream endpoints.
    ApiKey,
    /// API key header plus `timestamp`, `recvWindow` and `signature`.
    Signed,
}

impl AuthTier {
    pub const fn sends_api_key(self) -> bool {
        matches!(self, Self::ApiKey | Self::Signed)
    }
}

/// HMAC-SHA256 of `canonical_query` keyed by `secret`, as lowercase hex.
pub fn sign(canonical_query: &str, secret: &[u8]) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ExchangeError::AuthError(format!("Failed to create HMAC: {}", e)))?;
    mac.update(canonical_query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Current wall-clock time in epoch milliseconds, for the `timestamp` parameter.
pub fn current_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Request authentication.
///
/// Signing is pure: the only time input is the `timestamp` handed to
/// [`Signer::signed_query`], which becomes an ordinary parameter.
pub trait Signer: Send + Sync {
    /// Value sent in the [`API_KEY_HEADER`] header.
    fn api_key(&self) -> &str;

    /// Signature over an already canonical query string.
    fn sign(&self, canonical_query: &str) -> Result<String, ExchangeError>;

    /// Add `timestamp` and `recvWindow`, canonicalize, sign, and append
    /// `&signature=<hex>` as a trailing unsigned suffix.
    fn signed_query(
        &self,
        params: &QueryParams,
        timestamp: i64,
        recv_window: u64,
    ) -> Result<String, ExchangeError> {
        let mut augmented = params.clone();
        augmented.insert("timestamp", timestamp);
        augmented.insert("recvWindow", recv_window);

        let query = augmented.encode();
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }
}

/// HMAC-SHA256 signer holding the account credentials.
pub struct HmacSigner {
    api_key: Secret<String>,
    secret_key: Secret<String>,
}

impl HmacSigner {
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
        }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    fn sign(&self, canonical_query: &str) -> Result<String, ExchangeError> {
        sign(canonical_query, self.secret_key.expose_secret().as_bytes())
    }
}

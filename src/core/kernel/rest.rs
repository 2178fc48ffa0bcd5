use crate::core::config::{DEFAULT_RECV_WINDOW, DEFAULT_TIMEOUT_SECONDS};
use crate::core::errors::ExchangeError;
use crate::core::kernel::query::QueryParams;
use crate::core::kernel::signer::{current_timestamp_millis, AuthTier, Signer, API_KEY_HEADER};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{instrument, trace};

/// REST client trait for making HTTP requests
///
/// Parameters always travel in the query string. Every method checks the HTTP
/// status before anything is decoded: a non-2xx response becomes
/// [`ExchangeError::ApiError`] carrying the raw body, whatever the tier.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Send a request and return the body of a 2xx response undecoded.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<Vec<u8>, ExchangeError>;

    /// GET and decode the JSON response
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<T, ExchangeError>;

    /// POST and decode the JSON response
    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<T, ExchangeError>;

    /// PUT and decode the JSON response
    async fn put_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<T, ExchangeError>;

    /// DELETE and decode the JSON response
    async fn delete_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<T, ExchangeError>;
}

/// Decode a 2xx body.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ExchangeError> {
    serde_json::from_slice(body).map_err(|e| {
        ExchangeError::DecodeError(format!("Failed to parse JSON response: {}", e))
    })
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Origin, e.g. `https://api.binance.com`
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// `recvWindow` sent with signed requests, in milliseconds
    pub recv_window: u64,
}

impl RestClientConfig {
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: concat!("binanceapi/", env!("CARGO_PKG_VERSION")).to_string(),
            recv_window: DEFAULT_RECV_WINDOW,
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = recv_window;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Set the signer used for key-only and signed requests
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
        })
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    fn require_signer(&self) -> Result<&Arc<dyn Signer>, ExchangeError> {
        self.signer.as_ref().ok_or_else(|| {
            ExchangeError::AuthError(
                "Authentication required but no credentials configured".to_string(),
            )
        })
    }

    /// Query string for `tier` at the given timestamp.
    ///
    /// Public and key-only requests send the canonical encoding as is. Signed
    /// requests add `timestamp` and `recvWindow` and end with `&signature=`.
    pub fn prepare_query(
        &self,
        params: &QueryParams,
        tier: AuthTier,
        timestamp: i64,
    ) -> Result<String, ExchangeError> {
        match tier {
            AuthTier::Public | AuthTier::ApiKey => Ok(params.encode()),
            AuthTier::Signed => {
                self.require_signer()?
                    .signed_query(params, timestamp, self.config.recv_window)
            }
        }
    }

    fn build_url(&self, endpoint: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.config.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.config.base_url, endpoint, query)
        }
    }

    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Vec<u8>, ExchangeError> {
        let status = response.status();
        let body = response.bytes().await?;

        trace!("Response body: {}", String::from_utf8_lossy(&body));

        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(ExchangeError::ApiError {
                status: status.as_u16(),
                body: body.to_vec(),
            })
        }
    }

    #[instrument(skip(self, params), fields(exchange = %self.config.exchange_name, method = %method, endpoint = %endpoint, tier = ?tier, param_count = params.len()))]
    async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<Vec<u8>, ExchangeError> {
        let query = self.prepare_query(params, tier, current_timestamp_millis())?;
        let url = self.build_url(endpoint, &query);
        let mut request = self.client.request(method, &url);

        if tier.sends_api_key() {
            let signer = self.require_signer()?;
            request = request.header(API_KEY_HEADER, signer.api_key());
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<Vec<u8>, ExchangeError> {
        self.make_request(method, endpoint, params, tier).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<T, ExchangeError> {
        let body = self.make_request(Method::GET, endpoint, params, tier).await?;
        decode_json(&body)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<T, ExchangeError> {
        let body = self.make_request(Method::POST, endpoint, params, tier).await?;
        decode_json(&body)
    }

    async fn put_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<T, ExchangeError> {
        let body = self.make_request(Method::PUT, endpoint, params, tier).await?;
        decode_json(&body)
    }

    async fn delete_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
        tier: AuthTier,
    ) -> Result<T, ExchangeError> {
        let body = self
            .make_request(Method::DELETE, endpoint, params, tier)
            .await?;
        decode_json(&body)
    }
}

use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::API_KEY_HEADER;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, instrument};

/// An inbound request to pass through to the REST API.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path with any mount prefix already stripped, e.g. `/api/v3/account`.
    pub path: String,
    /// Raw query string without the leading `?`, forwarded byte for byte so
    /// signatures stay valid.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Forwards requests to the REST origin for browser or other clients that
/// cannot call it directly.
///
/// Only the API key header is passed upstream. The upstream status, headers
/// and body come back unchanged, including error responses.
#[derive(Debug, Clone)]
pub struct ApiProxy {
    client: Client,
    target: String,
}

impl ApiProxy {
    pub fn new(target: impl Into<String>) -> Result<Self, ExchangeError> {
        Ok(Self {
            client: Client::builder().build()?,
            target: target.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        Self::new(config.rest_base_url())
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn upstream_url(&self, request: &ProxyRequest) -> String {
        match request.query.as_deref() {
            Some(query) if !query.is_empty() => {
                format!("{}{}?{}", self.target, request.path, query)
            }
            _ => format!("{}{}", self.target, request.path),
        }
    }

    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse, ExchangeError> {
        let url = self.upstream_url(&request);
        let mut upstream = self.client.request(request.method, &url);

        for value in request.headers.get_all(API_KEY_HEADER) {
            upstream = upstream.header(API_KEY_HEADER, value);
        }
        if !request.body.is_empty() {
            upstream = upstream.body(request.body);
        }

        let response = upstream.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(%status, bytes = body.len(), "proxied");
        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }
}

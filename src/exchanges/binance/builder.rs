use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{HmacSigner, ReqwestRest, RestClientBuilder, RestClientConfig};
use crate::exchanges::binance::rest::BinanceRestClient;
use crate::exchanges::binance::streams::BinanceStreams;
use std::sync::Arc;

/// REST and stream access for one account and environment.
#[derive(Debug)]
pub struct BinanceClient {
    pub rest: BinanceRestClient<ReqwestRest>,
    pub streams: BinanceStreams,
}

/// Build the kernel REST client from `config`.
///
/// A signer is attached only when credentials are present; without one,
/// key-only and signed calls fail with `AuthError` before any request is sent.
pub fn build_rest_transport(config: &ExchangeConfig) -> Result<ReqwestRest, ExchangeError> {
    let rest_config = RestClientConfig::new(config.rest_base_url(), "binance".to_string())
        .with_timeout(config.timeout_seconds)
        .with_recv_window(config.recv_window);
    let mut rest_builder = RestClientBuilder::new(rest_config);

    if config.has_credentials() {
        let signer = Arc::new(HmacSigner::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        ));
        rest_builder = rest_builder.with_signer(signer);
    }

    rest_builder.build()
}

pub fn create_binance_rest_client(
    config: &ExchangeConfig,
) -> Result<BinanceRestClient<ReqwestRest>, ExchangeError> {
    build_rest_transport(config).map(BinanceRestClient::new)
}

pub fn create_binance_client(config: &ExchangeConfig) -> Result<BinanceClient, ExchangeError> {
    Ok(BinanceClient {
        rest: create_binance_rest_client(config)?,
        streams: BinanceStreams::from_config(config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_follows_config() {
        let config = ExchangeConfig::new("key".to_string(), "secret".to_string())
            .base_url("http://127.0.0.1:9000".to_string())
            .recv_window(2500)
            .timeout_seconds(5);
        let rest = build_rest_transport(&config).unwrap();

        assert_eq!(rest.config().base_url, "http://127.0.0.1:9000");
        assert_eq!(rest.config().recv_window, 2500);
        assert_eq!(rest.config().timeout_seconds, 5);
        assert!(format!("{:?}", rest).contains("has_signer: true"));
    }

    #[test]
    fn test_read_only_has_no_signer() {
        let client = create_binance_client(&ExchangeConfig::read_only()).unwrap();
        assert!(format!("{:?}", client.rest.inner()).contains("has_signer: false"));
        assert_eq!(client.streams.ws_root(), "wss://stream.binance.com:9443");
    }
}

pub mod core;
pub mod exchanges;

pub use core::{config::ExchangeConfig, errors::ExchangeError, types::*};
pub use exchanges::binance::{
    create_binance_client, create_binance_rest_client, ApiProxy, BinanceClient,
    BinanceRestClient, BinanceStreams,
};

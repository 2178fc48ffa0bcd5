pub mod builder;
pub mod codec;
pub mod proxy;
pub mod rest;
pub mod streams;
pub mod types;

// Re-export main types for easier importing
pub use builder::{build_rest_transport, create_binance_client, create_binance_rest_client, BinanceClient};
pub use codec::{
    AggTradeCodec, AllMarketTickerCodec, CombinedStreamCodec, PartialBookDepthCodec, TickerCodec,
    UserDataCodec,
};
pub use proxy::{ApiProxy, ProxyRequest, ProxyResponse};
pub use rest::BinanceRestClient;
pub use streams::{BinanceStreams, CombinedStreamBuilder};
pub use types::{
    AccountInfo, AccountUpdate, AggTrade, BookTicker, CombinedStreamMessage, ExchangeInfo,
    ExecutionReport, MyTrade, OrderParameters, PartialBookDepth, PriceLevel, PriceTicker,
    QueryOrderResponse, StreamMessage, Ticker,
};

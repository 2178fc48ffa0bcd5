use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{RawCodec, TungsteniteWs, WsCodec};
use crate::exchanges::binance::codec::{
    AggTradeCodec, AllMarketTickerCodec, CombinedStreamCodec, PartialBookDepthCodec, TickerCodec,
    UserDataCodec,
};

pub const ALL_MARKET_TICKER_STREAM: &str = "!ticker@arr";

pub fn agg_trade_stream(symbol: &str) -> String {
    format!("{}@aggTrade", symbol.to_lowercase())
}

pub fn ticker_stream(symbol: &str) -> String {
    format!("{}@ticker", symbol.to_lowercase())
}

/// Top `levels` bids and asks, pushed every second.
pub fn partial_depth_stream(symbol: &str, levels: u32) -> String {
    format!("{}@depth{}", symbol.to_lowercase(), levels)
}

/// Opens market and user data streams against one WebSocket origin.
#[derive(Debug, Clone)]
pub struct BinanceStreams {
    ws_root: String,
}

impl BinanceStreams {
    pub fn new(ws_root: impl Into<String>) -> Self {
        Self {
            ws_root: ws_root.into(),
        }
    }

    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self::new(config.stream_base_url())
    }

    pub fn ws_root(&self) -> &str {
        &self.ws_root
    }

    /// Any single stream with a caller-chosen codec.
    pub async fn open_single<C: WsCodec>(
        &self,
        stream: &str,
        codec: C,
    ) -> Result<TungsteniteWs<C>, ExchangeError> {
        TungsteniteWs::open_single(&self.ws_root, stream, codec).await
    }

    /// Any single stream, frames passed through undecoded.
    pub async fn open_raw_stream(&self, stream: &str) -> Result<TungsteniteWs<RawCodec>, ExchangeError> {
        self.open_single(stream, RawCodec).await
    }

    pub async fn open_agg_trade_stream(
        &self,
        symbol: &str,
    ) -> Result<TungsteniteWs<AggTradeCodec>, ExchangeError> {
        self.open_single(&agg_trade_stream(symbol), AggTradeCodec).await
    }

    pub async fn open_ticker_stream(
        &self,
        symbol: &str,
    ) -> Result<TungsteniteWs<TickerCodec>, ExchangeError> {
        self.open_single(&ticker_stream(symbol), TickerCodec).await
    }

    pub async fn open_partial_book_depth_stream(
        &self,
        symbol: &str,
        depth: u32,
    ) -> Result<TungsteniteWs<PartialBookDepthCodec>, ExchangeError> {
        self.open_single(&partial_depth_stream(symbol, depth), PartialBookDepthCodec)
            .await
    }

    pub async fn open_all_market_ticker_stream(
        &self,
    ) -> Result<TungsteniteWs<AllMarketTickerCodec>, ExchangeError> {
        self.open_single(ALL_MARKET_TICKER_STREAM, AllMarketTickerCodec)
            .await
    }

    /// User data for the account behind `listen_key`.
    pub async fn open_user_data_stream(
        &self,
        listen_key: &str,
    ) -> Result<TungsteniteWs<UserDataCodec>, ExchangeError> {
        self.open_single(listen_key, UserDataCodec).await
    }

    pub fn combined(&self) -> CombinedStreamBuilder {
        CombinedStreamBuilder::new(self.ws_root.clone())
    }
}

/// Collects stream names for one multiplexed connection.
#[derive(Debug)]
pub struct CombinedStreamBuilder {
    ws_root: String,
    streams: Vec<String>,
    codec: CombinedStreamCodec,
}

impl CombinedStreamBuilder {
    pub fn new(ws_root: impl Into<String>) -> Self {
        Self {
            ws_root: ws_root.into(),
            streams: Vec::new(),
            codec: CombinedStreamCodec::new(),
        }
    }

    #[must_use]
    pub fn subscribe_agg_trade(self, symbol: &str) -> Self {
        self.subscribe(agg_trade_stream(symbol))
    }

    #[must_use]
    pub fn subscribe_ticker(self, symbol: &str) -> Self {
        self.subscribe(ticker_stream(symbol))
    }

    #[must_use]
    pub fn subscribe_partial_depth(self, symbol: &str, levels: u32) -> Self {
        self.subscribe(partial_depth_stream(symbol, levels))
    }

    #[must_use]
    pub fn subscribe_all_market_tickers(self) -> Self {
        self.subscribe(ALL_MARKET_TICKER_STREAM)
    }

    /// Add a stream by its full name. Duplicates are ignored.
    #[must_use]
    pub fn subscribe(mut self, stream: impl Into<String>) -> Self {
        let stream = stream.into();
        if !self.streams.contains(&stream) {
            self.streams.push(stream);
        }
        self
    }

    /// Replace the codec, e.g. one extended with `with_route`.
    #[must_use]
    pub fn with_codec(mut self, codec: CombinedStreamCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn streams(&self) -> &[String] {
        &self.streams
    }

    pub async fn connect(self) -> Result<TungsteniteWs<CombinedStreamCodec>, ExchangeError> {
        TungsteniteWs::open_combined(&self.ws_root, &self.streams, self.codec).await
    }
}

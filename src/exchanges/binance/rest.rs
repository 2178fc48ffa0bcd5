use crate::core::errors::ExchangeError;
use crate::core::kernel::{AuthTier, QueryParams, RestClient};
use crate::core::types::OrderType;
use crate::exchanges::binance::codec::decode_partial_book_depth;
use crate::exchanges::binance::types::{
    AccountInfo, BookTicker, CancelOrderResponse, ExchangeInfo, ListenKey, MyTrade,
    OrderParameters, PartialBookDepth, PostOrderResponse, PriceTicker, QueryOrderResponse,
};
use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

const USER_DATA_STREAM: &str = "/api/v1/userDataStream";
const ORDER: &str = "/api/v3/order";

/// Body of endpoints that answer `{}`.
#[derive(Deserialize)]
struct Empty {}

/// Thin typed wrapper around `RestClient` for the spot API
#[derive(Debug)]
pub struct BinanceRestClient<R: RestClient> {
    client: R,
}

impl<R: RestClient> BinanceRestClient<R> {
    pub fn new(client: R) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &R {
        &self.client
    }

    /// Latest price for one symbol
    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_price_ticker(&self, symbol: &str) -> Result<PriceTicker, ExchangeError> {
        let params = QueryParams::new().with("symbol", symbol);
        self.client
            .get_json("/api/v3/ticker/price", &params, AuthTier::Public)
            .await
    }

    /// Latest price for every symbol
    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_price_tickers(&self) -> Result<Vec<PriceTicker>, ExchangeError> {
        self.client
            .get_json("/api/v3/ticker/price", &QueryParams::new(), AuthTier::Public)
            .await
    }

    /// Best bid and ask for one symbol
    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_book_ticker(&self, symbol: &str) -> Result<BookTicker, ExchangeError> {
        let params = QueryParams::new().with("symbol", symbol);
        self.client
            .get_json("/api/v3/ticker/bookTicker", &params, AuthTier::Public)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_exchange_info(&self) -> Result<ExchangeInfo, ExchangeError> {
        self.client
            .get_json("/api/v1/exchangeInfo", &QueryParams::new(), AuthTier::Public)
            .await
    }

    /// Order book snapshot, decoded the same way as the depth stream
    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_depth(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<PartialBookDepth, ExchangeError> {
        let mut params = QueryParams::new().with("symbol", symbol);
        params.insert_opt("limit", limit);

        let body = self
            .client
            .send(Method::GET, "/api/v3/depth", &params, AuthTier::Public)
            .await?;
        decode_partial_book_depth(&body)
    }

    /// Create a listen key for the user data stream
    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn start_user_data_stream(&self) -> Result<String, ExchangeError> {
        let response: ListenKey = self
            .client
            .post_json(USER_DATA_STREAM, &QueryParams::new(), AuthTier::ApiKey)
            .await?;
        Ok(response.listen_key)
    }

    /// Extend the validity of a listen key
    #[instrument(skip(self, listen_key), fields(exchange = "binance"))]
    pub async fn keepalive_user_data_stream(&self, listen_key: &str) -> Result<(), ExchangeError> {
        let params = QueryParams::new().with("listenKey", listen_key);
        let _: Empty = self
            .client
            .put_json(USER_DATA_STREAM, &params, AuthTier::ApiKey)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_order_by_id(
        &self,
        symbol: &str,
        order_id: i64,
    ) -> Result<QueryOrderResponse, ExchangeError> {
        let params = QueryParams::new()
            .with("symbol", symbol)
            .with("orderId", order_id);
        self.client.get_json(ORDER, &params, AuthTier::Signed).await
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<QueryOrderResponse, ExchangeError> {
        let params = QueryParams::new()
            .with("symbol", symbol)
            .with("origClientOrderId", client_order_id);
        self.client.get_json(ORDER, &params, AuthTier::Signed).await
    }

    /// Account trade history. `limit` and `from_id` are sent only when set.
    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_my_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
        from_id: Option<i64>,
    ) -> Result<Vec<MyTrade>, ExchangeError> {
        let mut params = QueryParams::new().with("symbol", symbol);
        params.insert_opt("limit", limit);
        params.insert_opt("fromId", from_id);
        self.client
            .get_json("/api/v3/myTrades", &params, AuthTier::Signed)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_account(&self) -> Result<AccountInfo, ExchangeError> {
        self.client
            .get_json("/api/v3/account", &QueryParams::new(), AuthTier::Signed)
            .await
    }

    /// Place an order. Responds with the `ACK` shape.
    #[instrument(skip(self, order), fields(exchange = "binance", symbol = %order.symbol, side = %order.side))]
    pub async fn post_order(
        &self,
        order: &OrderParameters,
    ) -> Result<PostOrderResponse, ExchangeError> {
        let params = order_params(order);
        self.client.post_json(ORDER, &params, AuthTier::Signed).await
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn cancel_order_by_id(
        &self,
        symbol: &str,
        order_id: i64,
    ) -> Result<CancelOrderResponse, ExchangeError> {
        let params = QueryParams::new()
            .with("symbol", symbol)
            .with("orderId", order_id);
        self.client.delete_json(ORDER, &params, AuthTier::Signed).await
    }
}

/// Query parameters for a new order.
///
/// Quantity and price go out as fixed 8-dp decimals; price is left off
/// `MARKET` orders.
pub fn order_params(order: &OrderParameters) -> QueryParams {
    let mut params = QueryParams::new()
        .with("symbol", &order.symbol)
        .with("side", order.side.as_str())
        .with("type", order.order_type.as_str())
        .with("quantity", order.quantity);

    if order.order_type != OrderType::Market {
        params.insert_opt("price", order.price);
    }
    params.insert_opt("timeInForce", order.time_in_force.as_ref().map(|t| t.as_str()));
    params.insert_opt("newClientOrderId", order.new_client_order_id.as_deref());
    params
}

use crate::core::errors::ExchangeError;
use crate::core::kernel::WsCodec;
use crate::core::types::{decimal_from_value, json_type_name};
use crate::exchanges::binance::types::{
    AccountUpdate, AggTrade, CombinedStreamMessage, ExecutionReport, PartialBookDepth,
    PriceLevel, StreamMessage, Ticker,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

type RoutePredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type RouteDecoder = Box<dyn Fn(Value) -> Result<StreamMessage, ExchangeError> + Send + Sync>;

/// Decode a JSON value into `T`, reporting failures as `DecodeError`.
fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(ExchangeError::from)
}

fn from_slice<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ExchangeError> {
    serde_json::from_slice(payload).map_err(ExchangeError::from)
}

// Partial book depth

#[derive(Deserialize)]
struct RawDepth {
    #[serde(rename = "lastUpdateId", default)]
    last_update_id: Option<Value>,
    #[serde(default)]
    bids: Option<Value>,
    #[serde(default)]
    asks: Option<Value>,
}

fn required(value: Option<Value>, field: &str) -> Result<Value, ExchangeError> {
    match value {
        Some(Value::Null) | None => Err(ExchangeError::DecodeError(format!(
            "missing field `{}`",
            field
        ))),
        Some(value) => Ok(value),
    }
}

fn decode_levels(side: &str, value: Value) -> Result<Vec<PriceLevel>, ExchangeError> {
    let Value::Array(entries) = value else {
        return Err(ExchangeError::DecodeError(format!(
            "{}: expected array, found {}",
            side,
            json_type_name(&value)
        )));
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let Value::Array(pair) = entry else {
                return Err(ExchangeError::DecodeError(format!(
                    "{}[{}]: expected [price, quantity] array, found {}",
                    side,
                    index,
                    json_type_name(entry)
                )));
            };

            let element = |position: usize, label: &str| {
                pair.get(position)
                    .ok_or_else(|| ExchangeError::DecodeError("missing".to_string()))
                    .and_then(decimal_from_value)
                    .map_err(|e| e.context(format!("{}[{}] {}", side, index, label)))
            };

            Ok(PriceLevel {
                price: element(0, "price")?,
                quantity: element(1, "quantity")?,
            })
        })
        .collect()
}

/// Two-phase depth decode: a loose envelope first, then each level converted
/// with an error naming the side, index and element that failed.
pub fn decode_partial_book_depth_value(value: Value) -> Result<PartialBookDepth, ExchangeError> {
    let raw: RawDepth = from_value(value)?;

    let last_update_id = match required(raw.last_update_id, "lastUpdateId")? {
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            ExchangeError::DecodeError(format!("lastUpdateId: expected integer, found {}", n))
        })?,
        other => {
            return Err(ExchangeError::DecodeError(format!(
                "lastUpdateId: expected integer, found {}",
                json_type_name(&other)
            )))
        }
    };

    Ok(PartialBookDepth {
        last_update_id,
        bids: decode_levels("bids", required(raw.bids, "bids")?)?,
        asks: decode_levels("asks", required(raw.asks, "asks")?)?,
    })
}

pub fn decode_partial_book_depth(payload: &[u8]) -> Result<PartialBookDepth, ExchangeError> {
    decode_partial_book_depth_value(from_slice(payload)?)
}

// Stream name predicates

/// `<symbol>@depth<N>` or `<symbol>@depth<N>@100ms`.
pub fn is_partial_depth_stream(stream: &str) -> bool {
    let Some((_, suffix)) = stream.rsplit_once("@depth") else {
        return false;
    };
    let levels = suffix.strip_suffix("@100ms").unwrap_or(suffix);
    !levels.is_empty() && levels.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_agg_trade_stream(stream: &str) -> bool {
    stream.ends_with("@aggTrade")
}

pub fn is_ticker_stream(stream: &str) -> bool {
    stream.ends_with("@ticker")
}

pub fn is_all_market_ticker_stream(stream: &str) -> bool {
    stream == "!ticker@arr"
}

// Combined streams

struct StreamRoute {
    label: &'static str,
    matches: RoutePredicate,
    decode: RouteDecoder,
}

#[derive(Deserialize)]
struct Envelope {
    stream: String,
    data: Value,
}

/// Decoder for combined-stream frames (`{"stream": <name>, "data": <event>}`).
///
/// The envelope is parsed first and the stream name is matched against an
/// ordered route table. The first matching route decodes `data`. Names that
/// match no route yield `UnknownStreamType` so callers can skip stream kinds
/// they do not handle without mistaking them for corrupt frames.
///
/// Default routes, in order: `@aggTrade`, `@ticker`, `!ticker@arr`,
/// `@depth<N>[@100ms]`.
pub struct CombinedStreamCodec {
    routes: Vec<StreamRoute>,
}

impl std::fmt::Debug for CombinedStreamCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedStreamCodec")
            .field("routes", &self.route_labels().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for CombinedStreamCodec {
    fn default() -> Self {
        Self::empty()
            .with_route("aggTrade", is_agg_trade_stream, |data| {
                from_value(data).map(StreamMessage::AggTrade)
            })
            .with_route("ticker", is_ticker_stream, |data| {
                from_value(data).map(StreamMessage::Ticker)
            })
            .with_route("allMarketTickers", is_all_market_ticker_stream, |data| {
                from_value(data).map(StreamMessage::AllMarketTickers)
            })
            .with_route("partialBookDepth", is_partial_depth_stream, |data| {
                decode_partial_book_depth_value(data).map(StreamMessage::PartialBookDepth)
            })
    }
}

impl CombinedStreamCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec with no routes; every frame is an unknown stream type.
    pub fn empty() -> Self {
        Self { routes: Vec::new() }
    }

    /// Append a route. It is tried after every route already registered.
    #[must_use]
    pub fn with_route<P, D>(mut self, label: &'static str, matches: P, decode: D) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
        D: Fn(Value) -> Result<StreamMessage, ExchangeError> + Send + Sync + 'static,
    {
        self.routes.push(StreamRoute {
            label,
            matches: Box::new(matches),
            decode: Box::new(decode),
        });
        self
    }

    /// Route labels in resolution order.
    pub fn route_labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.iter().map(|route| route.label)
    }

    pub fn decode(&self, payload: &[u8]) -> Result<CombinedStreamMessage, ExchangeError> {
        let envelope: Envelope = from_slice(payload)?;

        let route = self
            .routes
            .iter()
            .find(|route| (route.matches)(&envelope.stream))
            .ok_or_else(|| ExchangeError::UnknownStreamType(envelope.stream.clone()))?;

        let message = (route.decode)(envelope.data).map_err(|e| e.context(&envelope.stream))?;
        Ok(CombinedStreamMessage {
            stream: envelope.stream,
            message,
        })
    }
}

impl WsCodec for CombinedStreamCodec {
    type Message = CombinedStreamMessage;

    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message, ExchangeError> {
        self.decode(payload)
    }
}

// Single streams

/// `<symbol>@aggTrade` on a single-stream connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggTradeCodec;

impl WsCodec for AggTradeCodec {
    type Message = AggTrade;

    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message, ExchangeError> {
        from_slice(payload)
    }
}

/// `<symbol>@depth<N>` on a single-stream connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialBookDepthCodec;

impl WsCodec for PartialBookDepthCodec {
    type Message = PartialBookDepth;

    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message, ExchangeError> {
        decode_partial_book_depth(payload)
    }
}

/// `<symbol>@ticker` on a single-stream connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickerCodec;

impl WsCodec for TickerCodec {
    type Message = Ticker;

    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message, ExchangeError> {
        from_slice(payload)
    }
}

/// `!ticker@arr`: a bare array of tickers, order preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMarketTickerCodec;

impl WsCodec for AllMarketTickerCodec {
    type Message = Vec<Ticker>;

    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message, ExchangeError> {
        from_slice(payload)
    }
}

/// User data stream, dispatched on the `e` event name.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataCodec;

impl UserDataCodec {
    pub fn decode_value(&self, value: Value) -> Result<StreamMessage, ExchangeError> {
        let event = match value.get("e") {
            Some(Value::String(event)) => event.clone(),
            Some(other) => {
                return Err(ExchangeError::DecodeError(format!(
                    "e: expected string, found {}",
                    json_type_name(other)
                )))
            }
            None => return Err(ExchangeError::DecodeError("missing field `e`".to_string())),
        };

        let decoded = match event.as_str() {
            "outboundAccountInfo" => {
                from_value::<AccountUpdate>(value).map(StreamMessage::AccountUpdate)
            }
            "executionReport" => {
                from_value::<ExecutionReport>(value).map(StreamMessage::ExecutionReport)
            }
            _ => return Err(ExchangeError::UnknownStreamType(event.clone())),
        };
        decoded.map_err(|e| e.context(&event))
    }
}

impl WsCodec for UserDataCodec {
    type Message = StreamMessage;

    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message, ExchangeError> {
        self.decode_value(from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ExecutionType, OrderSide, OrderStatus};
    use rust_decimal_macros::dec;

    const AGG_TRADE_ENVELOPE: &str = r#"{"stream":"bnbbtc@aggTrade","data":{"e":"aggTrade","E":123456789,"s":"BNBBTC","a":12345,"p":"0.001","q":"100","f":100,"l":105,"T":123456785,"m":true,"M":true}}"#;

    const TICKER: &str = r#"{"e":"24hrTicker","E":123456789,"s":"BNBBTC","p":"0.0015","P":"250.00","w":"0.0018","x":"0.0009","c":"0.0025","Q":"10","b":"0.0024","B":"10","a":"0.0026","A":"100","o":"0.0010","h":"0.0025","l":"0.0010","v":"10000","q":"18","O":0,"C":86400000,"F":0,"L":18150,"n":18151}"#;

    #[test]
    fn test_combined_agg_trade() {
        let decoded = CombinedStreamCodec::new()
            .decode(AGG_TRADE_ENVELOPE.as_bytes())
            .unwrap();

        assert_eq!(decoded.stream, "bnbbtc@aggTrade");
        let StreamMessage::AggTrade(trade) = decoded.message else {
            panic!("expected aggTrade, got {:?}", decoded.message);
        };
        assert_eq!(trade.symbol, "BNBBTC");
        assert_eq!(trade.price, dec!(0.001));
        assert_eq!(trade.quantity, dec!(100));
        assert_eq!(trade.quote_quantity(), dec!(0.1));
        assert!(trade.is_buyer_maker);
    }

    #[test]
    fn test_combined_unknown_suffix() {
        let payload = r#"{"stream":"xyz@unknownKind","data":{"e":"whatever"}}"#;
        let err = CombinedStreamCodec::new().decode(payload.as_bytes()).unwrap_err();

        assert!(
            matches!(err, ExchangeError::UnknownStreamType(ref name) if name == "xyz@unknownKind"),
            "unexpected error: {:?}",
            err
        );
    }

    #[test]
    fn test_combined_malformed_data_is_decode_error() {
        let payload = r#"{"stream":"bnbbtc@aggTrade","data":{"e":"aggTrade","s":"BNBBTC"}}"#;
        let err = CombinedStreamCodec::new().decode(payload.as_bytes()).unwrap_err();

        let ExchangeError::DecodeError(msg) = err else {
            panic!("expected decode error, got {:?}", err);
        };
        assert!(msg.starts_with("bnbbtc@aggTrade: "));
    }

    #[test]
    fn test_combined_missing_stream_field() {
        let err = CombinedStreamCodec::new()
            .decode(br#"{"data":{}}"#)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::DecodeError(msg) if msg.contains("stream")));
    }

    #[test]
    fn test_combined_depth_and_ticker_routes() {
        let codec = CombinedStreamCodec::new();

        let depth = codec
            .decode(br#"{"stream":"ethbtc@depth5@100ms","data":{"lastUpdateId":7,"bids":[],"asks":[["1.5","2"]]}}"#)
            .unwrap();
        assert!(matches!(depth.message, StreamMessage::PartialBookDepth(ref d) if d.last_update_id == 7 && d.asks.len() == 1));

        let ticker = codec
            .decode(format!(r#"{{"stream":"bnbbtc@ticker","data":{}}}"#, TICKER).as_bytes())
            .unwrap();
        assert!(matches!(ticker.message, StreamMessage::Ticker(ref t) if t.last_price == dec!(0.0025)));

        let all = codec
            .decode(format!(r#"{{"stream":"!ticker@arr","data":[{0},{0}]}}"#, TICKER).as_bytes())
            .unwrap();
        assert!(matches!(all.message, StreamMessage::AllMarketTickers(ref t) if t.len() == 2));
    }

    #[test]
    fn test_with_route_appends_after_defaults() {
        let codec = CombinedStreamCodec::new().with_route(
            "catchAll",
            |_| true,
            |_| Err(ExchangeError::DecodeError("catch-all".to_string())),
        );

        assert_eq!(
            codec.route_labels().collect::<Vec<_>>(),
            vec!["aggTrade", "ticker", "allMarketTickers", "partialBookDepth", "catchAll"]
        );

        // earlier routes still win
        assert!(codec.decode(AGG_TRADE_ENVELOPE.as_bytes()).is_ok());
        let err = codec
            .decode(br#"{"stream":"xyz@unknownKind","data":{}}"#)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::DecodeError(msg) if msg.contains("catch-all")));
    }

    #[test]
    fn test_empty_codec_rejects_everything() {
        let err = CombinedStreamCodec::empty()
            .decode(AGG_TRADE_ENVELOPE.as_bytes())
            .unwrap_err();
        assert!(matches!(err, ExchangeError::UnknownStreamType(_)));
    }

    #[test]
    fn test_depth_stream_names() {
        assert!(is_partial_depth_stream("bnbbtc@depth5"));
        assert!(is_partial_depth_stream("bnbbtc@depth20@100ms"));
        assert!(!is_partial_depth_stream("bnbbtc@depth"));
        assert!(!is_partial_depth_stream("bnbbtc@depth@100ms"));
        assert!(!is_partial_depth_stream("bnbbtc@depthX"));
        assert!(!is_partial_depth_stream("bnbbtc@aggTrade"));
    }

    #[test]
    fn test_partial_depth_example() {
        let depth = decode_partial_book_depth(
            br#"{"lastUpdateId":160, "bids":[["0.0024","10"]], "asks":[["0.0026","5"]]}"#,
        )
        .unwrap();

        assert_eq!(depth.last_update_id, 160);
        assert_eq!(
            depth.bids,
            vec![PriceLevel {
                price: dec!(0.0024),
                quantity: dec!(10)
            }]
        );
        assert_eq!(
            depth.asks,
            vec![PriceLevel {
                price: dec!(0.0026),
                quantity: dec!(5)
            }]
        );
    }

    #[test]
    fn test_partial_depth_preserves_level_order() {
        let depth = decode_partial_book_depth(
            br#"{"lastUpdateId":1,"bids":[["3","1"],["1","1"],["2","1"]],"asks":[]}"#,
        )
        .unwrap();
        let prices: Vec<_> = depth.bids.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![dec!(3), dec!(1), dec!(2)]);
        assert!(depth.asks.is_empty());
    }

    #[test]
    fn test_partial_depth_missing_bids() {
        let err = decode_partial_book_depth(br#"{"lastUpdateId":160,"asks":[]}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::DecodeError(ref msg) if msg.contains("bids")), "{:?}", err);
    }

    #[test]
    fn test_partial_depth_bad_last_update_id() {
        let err = decode_partial_book_depth(br#"{"lastUpdateId":"160","bids":[],"asks":[]}"#)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::DecodeError(ref msg) if msg.starts_with("lastUpdateId")));

        let err = decode_partial_book_depth(br#"{"lastUpdateId":1.5,"bids":[],"asks":[]}"#)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::DecodeError(_)));
    }

    #[test]
    fn test_partial_depth_position_aware_errors() {
        let err = decode_partial_book_depth(
            br#"{"lastUpdateId":1,"bids":[["1","1"],["2","1"],["x","1"]],"asks":[]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bids[2] price"), "{}", err);

        let err = decode_partial_book_depth(br#"{"lastUpdateId":1,"bids":[],"asks":[["1"]]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("asks[0] quantity: missing"), "{}", err);

        let err = decode_partial_book_depth(br#"{"lastUpdateId":1,"bids":[],"asks":[["1", 2]]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("asks[0] quantity"), "{}", err);

        let err = decode_partial_book_depth(br#"{"lastUpdateId":1,"bids":["1"],"asks":[]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("bids[0]"), "{}", err);
    }

    #[test]
    fn test_all_market_ticker_order() {
        let second = TICKER.replace("BNBBTC", "ETHBTC");
        let payload = format!("[{},{}]", TICKER, second);
        let tickers = AllMarketTickerCodec.decode_message(payload.as_bytes()).unwrap();

        assert_eq!(
            tickers.iter().map(|t| t.symbol.as_str()).collect::<Vec<_>>(),
            vec!["BNBBTC", "ETHBTC"]
        );
        assert_eq!(tickers[0].trade_count, 18151);
    }

    #[test]
    fn test_user_data_execution_report() {
        let payload = br#"{"e":"executionReport","E":1499405658658,"s":"ETHBTC","c":"mUvoqJxFIILMdfAW5iGSOW","S":"BUY","o":"LIMIT","f":"GTC","q":"1.00000000","p":"0.10264410","P":"0.00000000","F":"0.00000000","g":-1,"C":"","x":"NEW","X":"NEW","r":"NONE","i":4293153,"l":"0.00000000","z":"0.00000000","L":"0.00000000","n":"0","N":null,"T":1499405658657,"t":-1,"I":8641984,"w":true,"m":false,"M":false,"O":1499405658657,"Z":"0.00000000","Y":"0.00000000","Q":"0.00000000"}"#;

        let StreamMessage::ExecutionReport(report) = UserDataCodec.decode_message(payload).unwrap()
        else {
            panic!("expected execution report");
        };
        assert_eq!(report.side, OrderSide::Buy);
        assert_eq!(report.execution_type, ExecutionType::New);
        assert_eq!(report.order_status, OrderStatus::New);
        assert_eq!(report.price, dec!(0.10264410));
        assert_eq!(report.commission_asset, None);
        assert_eq!(report.trade_id, -1);
    }

    #[test]
    fn test_user_data_account_update() {
        let payload = br#"{"e":"outboundAccountInfo","E":1499405658849,"m":0,"t":0,"b":0,"s":0,"T":true,"W":true,"D":true,"u":1499405658848,"B":[{"a":"LTC","f":"17366.18538083","l":"0.00000000"},{"a":"BTC","f":"10537.85314051","l":"2.19464093"}]}"#;

        let StreamMessage::AccountUpdate(update) = UserDataCodec.decode_message(payload).unwrap()
        else {
            panic!("expected account update");
        };
        assert!(update.can_trade);
        assert_eq!(update.balances.len(), 2);
        assert_eq!(update.balances[1].locked, dec!(2.19464093));
    }

    #[test]
    fn test_user_data_unknown_event() {
        let err = UserDataCodec
            .decode_message(br#"{"e":"balanceUpdate","E":1}"#)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::UnknownStreamType(name) if name == "balanceUpdate"));

        let err = UserDataCodec.decode_message(br#"{"E":1}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::DecodeError(_)));
    }
}

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

/// Number of fractional digits decimals are rendered with in a query.
///
/// Changing this changes the signed bytes, so it is fixed rather than derived
/// from the value's own scale.
pub const DECIMAL_PRECISION: u32 = 8;

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Decimal(Decimal),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{}", value),
            Self::UInt(value) => write!(f, "{}", value),
            Self::Decimal(value) => write!(
                f,
                "{:.*}",
                DECIMAL_PRECISION as usize,
                value.round_dp(DECIMAL_PRECISION)
            ),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

/// A parameter set, kept in ascending byte-lexicographic key order.
///
/// The same encoding is transmitted as the query string and fed to the
/// signer, and the server recomputes the signature over it, so the order is
/// part of the protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: BTreeMap<String, ParamValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Insert only when `value` is `Some`.
    pub fn insert_opt<V: Into<ParamValue>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Canonical `k1=v1&k2=v2` form. Empty set encodes to `""`.
    pub fn encode(&self) -> String {
        let mut query = String::new();
        for (key, value) in &self.entries {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(key);
            query.push('=');
            query.push_str(&value.to_string());
        }
        query
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_encodes_to_empty_string() {
        assert_eq!(QueryParams::new().encode(), "");
    }

    #[test]
    fn test_keys_sorted_regardless_of_insert_order() {
        let params = QueryParams::new()
            .with("symbol", "BTCUSDT")
            .with("orderId", 123_i64)
            .with("limit", 5_u32);

        assert_eq!(params.encode(), "limit=5&orderId=123&symbol=BTCUSDT");
        assert_eq!(
            params.keys().collect::<Vec<_>>(),
            vec!["limit", "orderId", "symbol"]
        );
    }

    #[test]
    fn test_byte_order_puts_uppercase_first() {
        let params = QueryParams::new().with("b", "1").with("B", "2").with("a", "3");
        assert_eq!(params.encode(), "B=2&a=3&b=1");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let params: QueryParams = vec![("x", "1"), ("a", "2"), ("m", "3")].into_iter().collect();
        assert_eq!(params.encode(), params.clone().encode());
    }

    #[test]
    fn test_decimal_fixed_precision() {
        let params = QueryParams::new()
            .with("price", dec!(0.0024))
            .with("quantity", dec!(100));

        assert_eq!(params.encode(), "price=0.00240000&quantity=100.00000000");
    }

    #[test]
    fn test_decimal_rounds_past_precision() {
        let params = QueryParams::new().with("price", dec!(0.123456789));
        assert_eq!(params.encode(), "price=0.12345679");
    }

    #[test]
    fn test_large_unsigned_not_wrapped() {
        let params = QueryParams::new().with("recvWindow", 5000_u64).with("id", u64::MAX);
        assert_eq!(params.encode(), "id=18446744073709551615&recvWindow=5000");
    }

    #[test]
    fn test_insert_replaces_and_insert_opt_skips_none() {
        let mut params = QueryParams::new();
        params.insert("limit", 10_i64);
        params.insert("limit", 20_i64);
        params.insert_opt::<i64>("fromId", None);
        params.insert_opt("startTime", Some(1_i64));

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("limit"), Some(&ParamValue::Int(20)));
        assert!(!params.contains_key("fromId"));
    }
}

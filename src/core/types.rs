//! Wire normalization shared by every decoder.
//!
//! Prices and quantities travel as JSON strings and are decoded into
//! [`Decimal`] without passing through a float. Timestamps travel as epoch
//! milliseconds and are decoded into `DateTime<Utc>`. Struct fields opt in with
//! `#[serde(with = "rust_decimal::serde::str")]` and
//! `#[serde(with = "chrono::serde::ts_milliseconds")]`; the helpers here cover
//! values that are not plain struct fields (array elements, raw JSON values).

use crate::core::errors::ExchangeError;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Parse a string-encoded decimal, e.g. `"0.00240000"`.
pub fn parse_decimal(raw: &str) -> Result<Decimal, ExchangeError> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| ExchangeError::DecodeError(format!("invalid decimal {:?}: {}", raw, e)))
}

/// Decode a JSON value that must be a string-encoded decimal.
///
/// Bare JSON numbers are rejected: the wire format never sends prices as numbers.
pub fn decimal_from_value(value: &Value) -> Result<Decimal, ExchangeError> {
    match value {
        Value::String(raw) => parse_decimal(raw),
        other => Err(ExchangeError::DecodeError(format!(
            "expected string-encoded decimal, found {}",
            json_type_name(other)
        ))),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declares a string-valued exchange vocabulary.
///
/// Known values get their own variant; anything else is kept verbatim in
/// `Other` so that new values introduced by the exchange still decode.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Other(raw) => raw.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($wire => Self::$variant,)+
                    _ => Self::Other(raw),
                }
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::from(raw.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Other(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    OrderSide {
        Buy => "BUY",
        Sell => "SELL",
    }
);

string_enum!(
    OrderType {
        Limit => "LIMIT",
        Market => "MARKET",
        StopLoss => "STOP_LOSS",
        StopLossLimit => "STOP_LOSS_LIMIT",
        TakeProfit => "TAKE_PROFIT",
        TakeProfitLimit => "TAKE_PROFIT_LIMIT",
        LimitMaker => "LIMIT_MAKER",
    }
);

string_enum!(
    TimeInForce {
        Gtc => "GTC",
        Ioc => "IOC",
        Fok => "FOK",
    }
);

string_enum!(
    OrderStatus {
        New => "NEW",
        PartiallyFilled => "PARTIALLY_FILLED",
        Filled => "FILLED",
        Canceled => "CANCELED",
        PendingCancel => "PENDING_CANCEL",
        Rejected => "REJECTED",
        Expired => "EXPIRED",
    }
);

string_enum!(
    /// Execution type of a user-data execution report (`x` field).
    ExecutionType {
        New => "NEW",
        Canceled => "CANCELED",
        Replaced => "REPLACED",
        Rejected => "REJECTED",
        Trade => "TRADE",
        Expired => "EXPIRED",
    }
);

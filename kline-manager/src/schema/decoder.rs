//! Decoder for positional kline arrays
//!
//! The klines endpoint returns each candle as a JSON array:
//!
//! ```text
//! [ open_time, "open", "high", "low", "close", "volume",
//!   close_time, "quote_volume", trade_count,
//!   "taker_buy_base_volume", "taker_buy_quote_volume", "ignore" ]
//! ```
//!
//! A field that fails to parse is reported and left at its zero value; the
//! rest of the record is still decoded. Only a missing or unusable open time
//! rejects the record, since it is part of the storage key.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

use super::Candle;

/// Minimum number of positional fields in a kline array
pub const KLINE_FIELD_COUNT: usize = 11;

/// Fractional digits kept for decimal columns (`numeric(32,8)`)
pub const DECIMAL_SCALE: u32 = 8;

const FIELD_NAMES: [&str; KLINE_FIELD_COUNT] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "trade_count",
    "taker_buy_base_volume",
    "taker_buy_quote_volume",
];

/// Floating-point width used when parsing a decimal string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePrecision {
    /// Exact decimal parse, rounded to `DECIMAL_SCALE`
    #[default]
    Double,
    /// Parse through a 32-bit float, losing digits beyond ~7 significant
    Single,
}

/// Record-level decode failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("kline has {0} fields, expected at least 11")]
    TooFewFields(usize),

    #[error("kline is not an array: {0}")]
    NotAnArray(String),

    #[error("invalid open time: {0}")]
    InvalidOpenTime(String),
}

/// Field-level decode failure; the field was left at its zero value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field '{name}' (index {index}): {reason}")]
pub struct FieldError {
    pub index: usize,
    pub name: &'static str,
    pub reason: String,
}

/// A decoded candle plus the fields that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKline {
    pub candle: Candle,
    pub field_errors: Vec<FieldError>,
}

impl DecodedKline {
    pub fn is_complete(&self) -> bool {
        self.field_errors.is_empty()
    }
}

/// Decoder for kline wire arrays
#[derive(Debug, Clone, Copy, Default)]
pub struct KlineDecoder {
    volume_precision: ParsePrecision,
}

impl KlineDecoder {
    /// Create a decoder that parses the volume field at `volume_precision`
    pub fn new(volume_precision: ParsePrecision) -> Self {
        Self { volume_precision }
    }

    /// Decode one kline from a JSON value holding a positional array
    pub fn decode_value(&self, value: &Value) -> Result<DecodedKline, DecodeError> {
        let fields = value
            .as_array()
            .ok_or_else(|| DecodeError::NotAnArray(truncate(&value.to_string())))?;
        self.decode(fields)
    }

    /// Decode one kline from its positional fields
    pub fn decode(&self, fields: &[Value]) -> Result<DecodedKline, DecodeError> {
        if fields.len() < KLINE_FIELD_COUNT {
            return Err(DecodeError::TooFewFields(fields.len()));
        }

        let open_time = epoch_millis(&fields[0]).map_err(DecodeError::InvalidOpenTime)?;
        let mut candle = Candle::empty(open_time);
        let mut field_errors = Vec::new();

        {
            let mut decimal = |index: usize, precision: ParsePrecision, slot: &mut Decimal| {
                match decimal_field(&fields[index], precision) {
                    Ok(value) => *slot = value,
                    Err(reason) => field_errors.push(field_error(index, reason)),
                }
            };

            decimal(1, ParsePrecision::Double, &mut candle.open);
            decimal(2, ParsePrecision::Double, &mut candle.high);
            decimal(3, ParsePrecision::Double, &mut candle.low);
            decimal(4, ParsePrecision::Double, &mut candle.close);
            decimal(5, self.volume_precision, &mut candle.volume);
            decimal(7, ParsePrecision::Double, &mut candle.quote_volume);
            decimal(9, ParsePrecision::Double, &mut candle.taker_buy_base_volume);
            decimal(10, ParsePrecision::Double, &mut candle.taker_buy_quote_volume);
        }

        match epoch_millis(&fields[6]) {
            Ok(close_time) => candle.close_time = close_time,
            Err(reason) => field_errors.push(field_error(6, reason)),
        }

        match count_field(&fields[8]) {
            Ok(count) => candle.trade_count = count,
            Err(reason) => field_errors.push(field_error(8, reason)),
        }

        field_errors.sort_by_key(|e| e.index);

        Ok(DecodedKline {
            candle,
            field_errors,
        })
    }
}

fn field_error(index: usize, reason: String) -> FieldError {
    FieldError {
        index,
        name: FIELD_NAMES[index],
        reason,
    }
}

/// Convert an epoch-millis number into an instant
fn epoch_millis(value: &Value) -> Result<DateTime<Utc>, String> {
    let millis = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| format!("{} is not an integer", n))?,
        other => return Err(format!("expected epoch millis, got {}", truncate(&other.to_string()))),
    };

    DateTime::from_timestamp_millis(millis).ok_or_else(|| format!("{} is out of range", millis))
}

/// Parse a base-10 decimal string (numbers are tolerated too)
fn decimal_field(value: &Value, precision: ParsePrecision) -> Result<Decimal, String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(format!("expected decimal string, got {}", truncate(&other.to_string()))),
    };

    let parsed = match precision {
        ParsePrecision::Double => Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| format!("'{}': {}", text, e))?,
        ParsePrecision::Single => {
            let single = text
                .parse::<f32>()
                .map_err(|e| format!("'{}': {}", text, e))?;
            Decimal::from_f32(single).ok_or_else(|| format!("'{}' is not finite", text))?
        }
    };

    Ok(parsed.round_dp_with_strategy(DECIMAL_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

fn count_field(value: &Value) -> Result<u64, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| format!("{} is not a non-negative integer", n)),
        other => Err(format!("expected trade count, got {}", truncate(&other.to_string()))),
    }
}

fn truncate(s: &str) -> String {
    const MAX: usize = 64;
    if s.len() <= MAX {
        s.to_string()
    } else {
        let cut = (0..=MAX).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &s[..cut])
    }
}

//! Candle, timeframe and market type definitions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One fixed-width bucket of trading activity for a symbol
///
/// The symbol, timeframe and market type are not part of the record; they
/// travel with the batch the candle belongs to (see `SymbolCandles`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket open time
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Base asset volume
    pub volume: Decimal,
    /// Bucket close time
    pub close_time: DateTime<Utc>,
    /// Quote asset volume
    pub quote_volume: Decimal,
    /// Number of trades in the bucket
    pub trade_count: u64,
    pub taker_buy_base_volume: Decimal,
    pub taker_buy_quote_volume: Decimal,
}

impl Candle {
    /// Create an empty candle opening at `open_time`
    ///
    /// All other fields hold their zero value; the decoder fills them in.
    pub fn empty(open_time: DateTime<Utc>) -> Self {
        Self {
            open_time,
            open: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            close: Decimal::ZERO,
            volume: Decimal::ZERO,
            close_time: DateTime::<Utc>::default(),
            quote_volume: Decimal::ZERO,
            trade_count: 0,
            taker_buy_base_volume: Decimal::ZERO,
            taker_buy_quote_volume: Decimal::ZERO,
        }
    }

    /// Check that the bucket opens strictly before it closes
    pub fn has_valid_bounds(&self) -> bool {
        self.open_time < self.close_time
    }
}

/// Candles fetched for one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolCandles {
    pub symbol: String,
    pub candles: Vec<Candle>,
}

impl SymbolCandles {
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            candles,
        }
    }
}

/// Trading venue category a candle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Futures,
    Spot,
}

impl MarketType {
    /// Single-character code stored in the `type` column
    pub fn code(&self) -> &'static str {
        match self {
            MarketType::Futures => "F",
            MarketType::Spot => "S",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Futures => write!(f, "futures"),
            MarketType::Spot => write!(f, "spot"),
        }
    }
}

/// Bucket duration of a candle, using the exchange's interval notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
    ThreeDays,
    OneWeek,
    OneMonth,
}

impl Timeframe {
    /// Every interval the klines endpoint accepts
    pub const ALL: [Timeframe; 15] = [
        Timeframe::OneMinute,
        Timeframe::ThreeMinutes,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::OneHour,
        Timeframe::TwoHours,
        Timeframe::FourHours,
        Timeframe::SixHours,
        Timeframe::EightHours,
        Timeframe::TwelveHours,
        Timeframe::OneDay,
        Timeframe::ThreeDays,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
    ];

    /// Bucket length (`1M` is approximated as 30 days)
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Timeframe::OneMinute => chrono::Duration::minutes(1),
            Timeframe::ThreeMinutes => chrono::Duration::minutes(3),
            Timeframe::FiveMinutes => chrono::Duration::minutes(5),
            Timeframe::FifteenMinutes => chrono::Duration::minutes(15),
            Timeframe::ThirtyMinutes => chrono::Duration::minutes(30),
            Timeframe::OneHour => chrono::Duration::hours(1),
            Timeframe::TwoHours => chrono::Duration::hours(2),
            Timeframe::FourHours => chrono::Duration::hours(4),
            Timeframe::SixHours => chrono::Duration::hours(6),
            Timeframe::EightHours => chrono::Duration::hours(8),
            Timeframe::TwelveHours => chrono::Duration::hours(12),
            Timeframe::OneDay => chrono::Duration::days(1),
            Timeframe::ThreeDays => chrono::Duration::days(3),
            Timeframe::OneWeek => chrono::Duration::weeks(1),
            Timeframe::OneMonth => chrono::Duration::days(30),
        }
    }

    /// Interval string used in requests and in the `interval` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::ThreeMinutes => "3m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::TwoHours => "2h",
            Timeframe::FourHours => "4h",
            Timeframe::SixHours => "6h",
            Timeframe::EightHours => "8h",
            Timeframe::TwelveHours => "12h",
            Timeframe::OneDay => "1d",
            Timeframe::ThreeDays => "3d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1M",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| format!("unknown timeframe '{}'", s))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

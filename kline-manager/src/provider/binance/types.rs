//! Binance REST response types

use serde::{Deserialize, Serialize};

/// One entry of the `/fapi/v1/ticker/24hr` response
///
/// Only `symbol` is used; the remaining fields pass through untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerSummary {
    pub symbol: String,

    #[serde(default)]
    pub last_price: Option<String>,

    #[serde(default)]
    pub price_change_percent: Option<String>,

    #[serde(default)]
    pub quote_volume: Option<String>,

    #[serde(default)]
    pub count: Option<u64>,
}

/// Error body returned by Binance on 4xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_summary_ignores_unknown_fields() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "priceChange": "-94.99999800",
            "priceChangePercent": "-95.960",
            "lastPrice": "4.00000200",
            "quoteVolume": "15.30000000",
            "openTime": 1499783499040,
            "count": 76
        }"#;

        let ticker: TickerSummary = serde_json::from_str(json).unwrap();
        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.last_price.as_deref(), Some("4.00000200"));
        assert_eq!(ticker.count, Some(76));
    }

    #[test]
    fn test_ticker_summary_requires_symbol() {
        let json = r#"{"lastPrice": "1.0"}"#;
        assert!(serde_json::from_str::<TickerSummary>(json).is_err());
    }

    #[test]
    fn test_api_error_body() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"code":-1121,"msg":"Invalid symbol."}"#).unwrap();
        assert_eq!(body.code, -1121);
        assert_eq!(body.msg, "Invalid symbol.");
    }
}

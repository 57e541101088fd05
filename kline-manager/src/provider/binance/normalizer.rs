//! Binance kline normalizer
//!
//! Converts raw klines responses into candles, turning every record or
//! field problem into a warning instead of an error.

use serde_json::Value;

use crate::provider::{Partial, ProviderError};
use crate::schema::{Candle, KlineDecoder, ParsePrecision};

/// Normalizer for Binance kline arrays
#[derive(Debug, Clone, Copy, Default)]
pub struct KlineNormalizer {
    decoder: KlineDecoder,
}

impl KlineNormalizer {
    pub fn new(volume_precision: ParsePrecision) -> Self {
        Self {
            decoder: KlineDecoder::new(volume_precision),
        }
    }

    /// Normalize a klines response body for `symbol`
    ///
    /// Records that cannot be keyed are dropped; records with unparseable
    /// fields are kept with those fields zeroed. A bucket that does not close
    /// after it opens is kept but reported.
    pub fn normalize(&self, symbol: &str, body: &Value) -> Partial<Vec<Candle>> {
        let Some(rows) = body.as_array() else {
            return Partial::failed(ProviderError::Decode(format!(
                "klines response for {} is not an array",
                symbol
            )));
        };

        let mut result = Partial::ok(Vec::with_capacity(rows.len()));

        for row in rows {
            match self.decoder.decode_value(row) {
                Ok(decoded) => {
                    let open_time = decoded.candle.open_time.timestamp_millis();
                    let clean = decoded.field_errors.is_empty();
                    for field_error in decoded.field_errors {
                        result.push_warning(ProviderError::FieldParse {
                            symbol: symbol.to_string(),
                            open_time,
                            reason: field_error.to_string(),
                        });
                    }
                    // A zeroed close time is already reported as a field error
                    if clean && !decoded.candle.has_valid_bounds() {
                        result.push_warning(ProviderError::InvalidRecord {
                            symbol: symbol.to_string(),
                            reason: format!(
                                "close time {} is not after open time {}",
                                decoded.candle.close_time.timestamp_millis(),
                                open_time
                            ),
                        });
                    }
                    result.value.push(decoded.candle);
                }
                Err(e) => result.push_warning(ProviderError::InvalidRecord {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn row(open_time: i64, close: &str) -> Value {
        json!([
            open_time,
            "100.0",
            "110.0",
            "90.0",
            close,
            "12.5",
            open_time + 3_599_999,
            "1250.0",
            42,
            "6.0",
            "600.0",
            "0"
        ])
    }

    #[test]
    fn test_normalize_clean_response() {
        let body = json!([row(1_700_000_000_000, "105.0"), row(1_700_003_600_000, "106.0")]);
        let result = KlineNormalizer::default().normalize("BTCUSDT", &body);

        assert!(result.is_clean());
        assert_eq!(result.value.len(), 2);
        assert_eq!(result.value[1].close, dec!(106.0));
    }

    #[test]
    fn test_normalize_keeps_record_with_bad_field() {
        let body = json!([row(1_700_000_000_000, "abc")]);
        let result = KlineNormalizer::default().normalize("BTCUSDT", &body);

        assert_eq!(result.value.len(), 1);
        assert_eq!(result.value[0].close, dec!(0));
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(
            &result.warnings[0],
            ProviderError::FieldParse { symbol, open_time, .. }
                if symbol == "BTCUSDT" && *open_time == 1_700_000_000_000
        ));
    }

    #[test]
    fn test_normalize_reports_inverted_bucket() {
        let mut inverted = row(1_700_000_000_000, "105.0");
        inverted[6] = json!(1_699_999_000_000i64);
        let body = json!([inverted]);
        let result = KlineNormalizer::default().normalize("BTCUSDT", &body);

        assert_eq!(result.value.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(
            &result.warnings[0],
            ProviderError::InvalidRecord { symbol, reason }
                if symbol == "BTCUSDT" && reason.contains("not after open time")
        ));
    }

    #[test]
    fn test_normalize_drops_short_record() {
        let body = json!([[1_700_000_000_000i64, "1.0"], row(1_700_003_600_000, "2.0")]);
        let result = KlineNormalizer::default().normalize("ETHUSDT", &body);

        assert_eq!(result.value.len(), 1);
        assert!(matches!(
            &result.warnings[0],
            ProviderError::InvalidRecord { symbol, .. } if symbol == "ETHUSDT"
        ));
    }

    #[test]
    fn test_normalize_rejects_non_array_body() {
        let body = json!({"code": -1121, "msg": "Invalid symbol."});
        let result = KlineNormalizer::default().normalize("NOPE", &body);

        assert!(result.value.is_empty());
        assert!(matches!(result.warnings[0], ProviderError::Decode(_)));
    }
}

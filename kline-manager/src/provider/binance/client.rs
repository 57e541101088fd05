//! Binance futures REST client
//!
//! Implements `KlineSource` over the public USDT-M futures endpoints.
//! Requests are paced by a shared rate limiter so concurrent fetches for
//! many symbols stay under the exchange's request weight budget.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::StatusCode;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::provider::{KlineSource, Partial, ProviderError, ProviderInfo, ProviderResult};
use crate::schema::{Candle, MarketType, ParsePrecision, Timeframe};
use crate::symbol::SymbolFilter;

use super::normalizer::KlineNormalizer;
use super::types::{ApiErrorBody, TickerSummary};

/// Default USDT-M futures REST base URL
const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

const DEFAULT_TICKER_PATH: &str = "/fapi/v1/ticker/24hr";
const DEFAULT_KLINES_PATH: &str = "/fapi/v1/klines";

/// Maximum characters of an error body kept in a warning
const MAX_ERROR_BODY: usize = 256;

/// Binance client settings
#[derive(Debug, Clone)]
pub struct BinanceSettings {
    /// REST base URL
    pub base_url: String,
    /// Path of the 24h ticker endpoint
    pub ticker_path: String,
    /// Path of the klines endpoint
    pub klines_path: String,
    /// Quote-asset suffix that selects tracked symbols
    pub quote_suffix: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Requests allowed per second across all tasks
    pub requests_per_second: u32,
    /// Precision used when parsing the volume field
    pub volume_precision: ParsePrecision,
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ticker_path: DEFAULT_TICKER_PATH.to_string(),
            klines_path: DEFAULT_KLINES_PATH.to_string(),
            quote_suffix: "USDT".to_string(),
            request_timeout: Duration::from_secs(15),
            requests_per_second: 10,
            volume_precision: ParsePrecision::Double,
        }
    }
}

/// Binance USDT-M futures kline source
pub struct BinanceFuturesClient {
    info: ProviderInfo,
    http: reqwest::Client,
    base_url: String,
    ticker_path: String,
    klines_path: String,
    filter: SymbolFilter,
    normalizer: KlineNormalizer,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl BinanceFuturesClient {
    /// Create a client with default settings
    pub fn new() -> ProviderResult<Self> {
        Self::with_settings(BinanceSettings::default())
    }

    /// Create a client with custom settings
    pub fn with_settings(settings: BinanceSettings) -> ProviderResult<Self> {
        let per_second = NonZeroU32::new(settings.requests_per_second).ok_or_else(|| {
            ProviderError::Configuration("requests_per_second must be > 0".to_string())
        })?;

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {}", e)))?;

        let info = ProviderInfo {
            name: "binance_futures".to_string(),
            display_name: "Binance USDT-M Futures".to_string(),
            market_type: MarketType::Futures,
        };

        Ok(Self {
            info,
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            ticker_path: settings.ticker_path,
            klines_path: settings.klines_path,
            filter: SymbolFilter::new(settings.quote_suffix),
            normalizer: KlineNormalizer::new(settings.volume_precision),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and parse the body as JSON
    ///
    /// Any non-2xx status is an error carrying the (truncated) body.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ProviderResult<Value> {
        self.rate_limiter.until_ready().await;

        let url = self.url(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        parse_response(&url, status, &body)
    }
}

#[async_trait]
impl KlineSource for BinanceFuturesClient {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn fetch_symbols(&self) -> Partial<Vec<String>> {
        let body = match self.get_json(&self.ticker_path, &[]).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to fetch ticker list: {}", e);
                return Partial::failed(e);
            }
        };

        let result = parse_ticker_list(body, &self.filter);
        debug!(
            "Ticker list yielded {} {} symbols",
            result.value.len(),
            self.filter.quote_suffix()
        );
        result
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Partial<Vec<Candle>> {
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", timeframe.as_str().to_string()),
            ("limit", limit.to_string()),
        ];

        match self.get_json(&self.klines_path, &query).await {
            Ok(body) => self.normalizer.normalize(symbol, &body),
            Err(e) => Partial::failed(e),
        }
    }
}

/// Turn a status and body into JSON; any non-2xx status is an error
fn parse_response(url: &str, status: StatusCode, body: &str) -> ProviderResult<Value> {
    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body: describe_error_body(body),
        });
    }

    serde_json::from_str(body).map_err(|e| ProviderError::Decode(format!("{}: {}", url, e)))
}

/// Keep the symbols of a 24h ticker array that pass `filter`
///
/// Entries without a usable `symbol` become warnings.
fn parse_ticker_list(body: Value, filter: &SymbolFilter) -> Partial<Vec<String>> {
    let Value::Array(entries) = body else {
        return Partial::failed(ProviderError::Decode(
            "ticker response is not an array".to_string(),
        ));
    };

    let mut result = Partial::ok(Vec::new());
    for entry in entries {
        match serde_json::from_value::<TickerSummary>(entry) {
            Ok(ticker) => {
                if let Some(symbol) = filter.accept(&ticker.symbol) {
                    result.value.push(symbol);
                }
            }
            Err(e) => result.push_warning(ProviderError::Decode(format!("ticker entry: {}", e))),
        }
    }
    result
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProviderError::Connection(e.to_string())
    } else if e.is_decode() {
        ProviderError::Decode(e.to_string())
    } else {
        ProviderError::Request(e.to_string())
    }
}

/// Prefer Binance's `{code, msg}` error shape; otherwise keep the raw body
fn describe_error_body(body: &str) -> String {
    if let Ok(api_error) = serde_json::from_str::<ApiErrorBody>(body) {
        return format!("{} (code {})", api_error.msg, api_error.code);
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kline_common::error::ErrorClassification;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_default_settings() {
        let settings = BinanceSettings::default();
        assert_eq!(settings.base_url, "https://fapi.binance.com");
        assert_eq!(settings.quote_suffix, "USDT");
        assert_eq!(settings.volume_precision, ParsePrecision::Double);
    }

    #[test]
    fn test_zero_rate_rejected() {
        let settings = BinanceSettings {
            requests_per_second: 0,
            ..BinanceSettings::default()
        };
        assert!(matches!(
            BinanceFuturesClient::with_settings(settings),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn test_url_building() {
        let settings = BinanceSettings {
            base_url: "http://localhost:8080/".to_string(),
            ..BinanceSettings::default()
        };
        let client = BinanceFuturesClient::with_settings(settings).unwrap();
        assert_eq!(
            client.url(&client.klines_path),
            "http://localhost:8080/fapi/v1/klines"
        );
        assert_eq!(client.info().market_type, MarketType::Futures);
    }

    #[test]
    fn test_describe_error_body() {
        assert_eq!(
            describe_error_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#),
            "Invalid symbol. (code -1121)"
        );
        let long = "x".repeat(1000);
        assert_eq!(describe_error_body(&long).len(), MAX_ERROR_BODY);
    }

    #[test]
    fn test_parse_ticker_list_filters_by_suffix() {
        let body = json!([
            {"symbol": "BTCUSDT", "lastPrice": "64000.10", "count": 120000},
            {"symbol": "ETHBTC", "lastPrice": "0.052"},
            {"symbol": "ETHUSDT", "lastPrice": "3100.5"}
        ]);

        let result = parse_ticker_list(body, &SymbolFilter::default());
        assert!(result.is_clean());
        assert_eq!(result.value, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_parse_ticker_list_skips_bad_entries() {
        let body = json!([{"symbol": "BTCUSDT"}, {"lastPrice": "1.0"}, 42]);

        let result = parse_ticker_list(body, &SymbolFilter::default());
        assert_eq!(result.value, vec!["BTCUSDT"]);
        assert_eq!(result.warnings.len(), 2);

        let result = parse_ticker_list(json!({"code": 0}), &SymbolFilter::default());
        assert!(result.value.is_empty());
        assert!(matches!(result.warnings[0], ProviderError::Decode(_)));
    }

    #[test]
    fn test_parse_response_status_mapping() {
        let ok = parse_response("t", StatusCode::OK, "[1,2]").unwrap();
        assert_eq!(ok, json!([1, 2]));

        let err = parse_response(
            "t",
            StatusCode::BAD_REQUEST,
            r#"{"code":-1121,"msg":"Invalid symbol."}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProviderError::HttpStatus {
                status: 400,
                body: "Invalid symbol. (code -1121)".to_string(),
            }
        );
        assert!(!err.is_transient());

        let err = parse_response("t", StatusCode::TOO_MANY_REQUESTS, "slow down").unwrap_err();
        assert!(matches!(err, ProviderError::HttpStatus { status: 429, .. }));
        assert!(err.is_transient());

        let err = parse_response("t", StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    /// Answer a single HTTP request with a canned response
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    fn local_client(base_url: String) -> BinanceFuturesClient {
        BinanceFuturesClient::with_settings(BinanceSettings {
            base_url,
            request_timeout: Duration::from_secs(5),
            ..BinanceSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_symbols_over_http() {
        let base_url = serve_once(
            "200 OK",
            r#"[{"symbol":"BTCUSDT"},{"symbol":"ETHBTC"},{"symbol":"ETHUSDT"}]"#,
        )
        .await;

        let symbols = local_client(base_url).fetch_symbols().await;
        assert!(symbols.is_clean());
        assert_eq!(symbols.value, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[tokio::test]
    async fn test_error_status_degrades_to_warning() {
        let base_url = serve_once(
            "418 I'm a teapot",
            r#"{"code":-1003,"msg":"Way too many requests; IP banned."}"#,
        )
        .await;

        let candles = local_client(base_url)
            .fetch_candles("BTCUSDT", Timeframe::OneHour, 2)
            .await;
        assert!(candles.value.is_empty());
        assert_eq!(
            candles.warnings,
            vec![ProviderError::HttpStatus {
                status: 418,
                body: "Way too many requests; IP banned. (code -1003)".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_degrades_to_warning() {
        let settings = BinanceSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_secs(2),
            ..BinanceSettings::default()
        };
        let client = BinanceFuturesClient::with_settings(settings).unwrap();

        let symbols = client.fetch_symbols().await;
        assert!(symbols.value.is_empty());
        assert_eq!(symbols.warnings.len(), 1);

        let candles = client
            .fetch_candles("BTCUSDT", Timeframe::OneHour, 2)
            .await;
        assert!(candles.value.is_empty());
        assert!(!candles.is_clean());
    }

    #[tokio::test]
    #[ignore] // Requires network access to fapi.binance.com
    async fn test_live_fetch() {
        let client = BinanceFuturesClient::new().unwrap();

        let symbols = client.fetch_symbols().await;
        assert!(symbols.value.iter().all(|s| s.ends_with("USDT")));
        assert!(symbols.value.contains(&"BTCUSDT".to_string()));

        let candles = client
            .fetch_candles("BTCUSDT", Timeframe::OneHour, 2)
            .await;
        assert!(candles.is_clean());
        assert_eq!(candles.value.len(), 2);
    }
}

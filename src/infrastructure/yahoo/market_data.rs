use crate::domain::errors::DataError;
use crate::domain::market::PriceBar;
use crate::domain::ports::MarketDataService;
use crate::infrastructure::core::http_client_factory::{
    HttpClientFactory, build_url_with_query, percent_encode,
};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

// ===== Chart API payload =====

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Convert a chart payload into daily bars within `[start, end]`.
///
/// Rows with a missing open or close are skipped; when a date repeats the
/// later row wins.
pub fn parse_chart_response(
    symbol: &str,
    response: ChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PriceBar>, DataError> {
    let unavailable = |reason: String| DataError::DataUnavailable {
        symbol: symbol.to_string(),
        reason,
    };

    if let Some(err) = response.chart.error {
        return Err(unavailable(format!("{}: {}", err.code, err.description)));
    }
    let result = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| unavailable("empty chart result".to_string()))?;
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| unavailable("no quote indicators".to_string()))?;

    let offset = result.meta.gmtoffset;
    let mut by_date = BTreeMap::new();
    for (i, ts) in result.timestamp.iter().enumerate() {
        let (Some(Some(open)), Some(Some(close))) = (quote.open.get(i), quote.close.get(i)) else {
            debug!("Skipping {} row {} with missing prices", symbol, i);
            continue;
        };
        let Some(local) = DateTime::from_timestamp(ts + offset, 0) else {
            continue;
        };
        let date = local.date_naive();
        if date >= start && date <= end {
            by_date.insert(date, PriceBar::new(date, *open, *close));
        }
    }

    if by_date.is_empty() {
        return Err(unavailable(format!("no bars between {} and {}", start, end)));
    }
    Ok(by_date.into_values().collect())
}

/// Daily history from the Yahoo Finance chart endpoint.
pub struct YahooMarketDataService {
    client: ClientWithMiddleware,
    base_url: String,
}

impl YahooMarketDataService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let to_unix = |date: NaiveDate| date.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive
        let end_exclusive = end.checked_add_days(Days::new(1)).unwrap_or(end);
        build_url_with_query(
            &format!("{}/v8/finance/chart/{}", self.base_url, percent_encode(symbol)),
            &[
                ("period1", to_unix(start).to_string()),
                ("period2", to_unix(end_exclusive).to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ],
        )
    }
}

#[async_trait]
impl MarketDataService for YahooMarketDataService {
    async fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        let unavailable = |reason: String| DataError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let url = self.chart_url(symbol, start, end);
        debug!("YahooMarketDataService: Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "YahooMarketDataService: API error {} for {}: {}",
                status, symbol, error_text
            );
            return Err(unavailable(format!("HTTP {}", status)));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("failed to parse chart response: {}", e)))?;

        let bars = parse_chart_response(symbol, body, start, end)?;
        info!(
            "YahooMarketDataService: Fetched {} daily bars for {} ({} to {})",
            bars.len(),
            symbol,
            start,
            end
        );
        Ok(bars)
    }
}

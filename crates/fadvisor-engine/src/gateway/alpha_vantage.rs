//! Alpha Vantage company overview client
//!
//! Used by the Yahoo adapter to enrich quotes with sector, market cap and
//! P/E metadata when an API key is configured.

use crate::error::{AdvisorError, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

/// Company overview data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompanyOverview {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    pub market_cap: Option<String>,
    #[serde(rename = "PERatio")]
    pub pe_ratio: Option<String>,
}

impl CompanyOverview {
    /// Market capitalisation as a number; Alpha Vantage reports "None" or "-" when absent
    pub fn market_cap_value(&self) -> Option<f64> {
        parse_numeric(self.market_cap.as_deref())
    }

    /// Trailing P/E as a number
    pub fn pe_ratio_value(&self) -> Option<f64> {
        parse_numeric(self.pe_ratio.as_deref())
    }

    /// Sector label in title case ("TECHNOLOGY" becomes "Technology")
    pub fn sector_label(&self) -> Option<String> {
        let sector = self.sector.as_deref()?.trim();
        if sector.is_empty() || sector.eq_ignore_ascii_case("none") {
            return None;
        }
        Some(
            sector
                .split_whitespace()
                .map(|word| {
                    let lower = word.to_lowercase();
                    let mut chars = lower.chars();
                    chars.next().map_or_else(String::new, |first| {
                        first.to_uppercase().chain(chars).collect()
                    })
                })
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

fn parse_numeric(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

impl AlphaVantageClient {
    /// Create a new Alpha Vantage client with API key and rate limit
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key
    /// * `rate_limit` - Maximum requests per minute (5 on the free tier)
    /// * `timeout` - Per-request timeout
    pub fn new(api_key: impl Into<String>, rate_limit: u32, timeout: Duration) -> Result<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Fetch the company overview for `symbol`
    pub async fn get_company_overview(&self, symbol: &str) -> Result<CompanyOverview> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let params = [
            ("function", "OVERVIEW"),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];

        let response = self.client.get(BASE_URL).query(&params).send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AdvisorError::RateLimited {
                provider: PROVIDER.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(AdvisorError::unavailable(
                symbol,
                format!("{PROVIDER} HTTP error: {}", response.status()),
            ));
        }

        let data: serde_json::Value = response.json().await?;
        parse_overview(symbol, data)
    }
}

/// Interpret an OVERVIEW payload
fn parse_overview(symbol: &str, data: serde_json::Value) -> Result<CompanyOverview> {
    if let Some(error) = data.get("Error Message") {
        return Err(AdvisorError::unavailable(symbol, error.to_string()));
    }

    // Throttled responses carry a "Note" (older API) or "Information" message
    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(AdvisorError::RateLimited {
            provider: PROVIDER.to_string(),
        });
    }

    // Unknown symbols come back as an empty object
    if data.as_object().is_none_or(serde_json::Map::is_empty) {
        return Err(AdvisorError::unavailable(symbol, "unknown symbol"));
    }

    Ok(serde_json::from_value(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = AlphaVantageClient::new("demo", 5, Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_parse_overview() {
        let overview = parse_overview(
            "IBM",
            json!({
                "Symbol": "IBM",
                "Name": "International Business Machines",
                "Sector": "TECHNOLOGY",
                "MarketCapitalization": "169000000000",
                "PERatio": "None"
            }),
        )
        .unwrap();

        assert_eq!(overview.sector_label().as_deref(), Some("Technology"));
        assert_eq!(overview.market_cap_value(), Some(169_000_000_000.0));
        assert_eq!(overview.pe_ratio_value(), None);
    }

    #[test]
    fn test_parse_overview_errors() {
        assert!(matches!(
            parse_overview("IBM", json!({"Note": "Thank you for using Alpha Vantage!"})),
            Err(AdvisorError::RateLimited { .. })
        ));
        assert!(matches!(
            parse_overview("NOPE", json!({})),
            Err(AdvisorError::DataUnavailable { .. })
        ));
        assert!(matches!(
            parse_overview("NOPE", json!({"Error Message": "Invalid API call"})),
            Err(AdvisorError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_sector_label_multi_word() {
        let overview = CompanyOverview {
            symbol: "JNJ".to_string(),
            name: None,
            exchange: None,
            sector: Some("LIFE SCIENCES".to_string()),
            industry: None,
            market_cap: None,
            pe_ratio: None,
        };
        assert_eq!(overview.sector_label().as_deref(), Some("Life Sciences"));
    }

    #[tokio::test]
    #[ignore] // Requires network access and API key
    async fn test_get_company_overview() {
        let key = std::env::var("ALPHA_VANTAGE_API_KEY").unwrap();
        let client = AlphaVantageClient::new(key, 5, Duration::from_secs(30)).unwrap();
        let overview = client.get_company_overview("IBM").await.unwrap();
        assert_eq!(overview.symbol, "IBM");
    }
}

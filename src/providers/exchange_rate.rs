use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::rates::{RateSnapshot, RateSource};
use crate::providers::util::{RetryPolicy, is_transient, with_retry};

/// Fetches latest rates from an ExchangeRate-API compatible endpoint.
pub struct ExchangeRateApiProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("convbuddy/0.1")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ExchangeRateApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn latest_url(&self, reference: &str) -> String {
        match &self.api_key {
            Some(key) => format!("{}/v6/{}/latest/{}", self.base_url, key, reference),
            None => format!("{}/v6/latest/{}", self.base_url, reference),
        }
    }
}

/// Accepts the field spellings of the common free rate APIs.
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: Option<String>,
    success: Option<bool>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    #[serde(alias = "base")]
    base_code: Option<String>,
    #[serde(alias = "rates")]
    conversion_rates: Option<HashMap<String, serde_json::Value>>,
}

fn normalize(response: LatestRatesResponse, reference: &str) -> Result<RateSnapshot> {
    if let Some(result) = response.result.as_deref() {
        if result != "success" {
            return Err(anyhow!(
                "Rate API returned '{}': {}",
                result,
                response.error_type.as_deref().unwrap_or("no details")
            ));
        }
    }
    if response.success == Some(false) {
        return Err(anyhow!(
            "Rate API reported failure: {}",
            response.error_type.as_deref().unwrap_or("no details")
        ));
    }

    let raw_rates = response
        .conversion_rates
        .ok_or_else(|| anyhow!("Rate API response has no rates"))?;
    let mut rates: BTreeMap<String, f64> = raw_rates
        .into_iter()
        .filter_map(|(code, value)| {
            let rate = value.as_f64()?;
            (rate.is_finite() && rate > 0.0).then(|| (code.to_ascii_uppercase(), rate))
        })
        .collect();
    if rates.is_empty() {
        return Err(anyhow!("Rate API response has no usable rates"));
    }

    let base = response
        .base_code
        .unwrap_or_else(|| reference.to_string())
        .to_ascii_uppercase();
    rates.entry(base.clone()).or_insert(1.0);

    Ok(RateSnapshot::new(&base, rates, Utc::now()))
}

#[async_trait]
impl RateSource for ExchangeRateApiProvider {
    #[instrument(
        name = "RateFetch",
        skip(self),
        fields(reference = %reference)
    )]
    async fn fetch_rates(&self, reference: &str) -> Result<RateSnapshot> {
        let url = self.latest_url(reference);
        debug!("Requesting currency rates from {}", self.base_url);

        let response = with_retry(self.retry, || self.client.get(&url).send(), is_transient)
            .await
            .map_err(|e| anyhow!("Request error: {} for reference currency: {}", e, reference))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for reference currency: {}",
                response.status(),
                reference
            ));
        }

        let text = response.text().await?;
        let data: LatestRatesResponse = serde_json::from_str(&text).map_err(|e| {
            anyhow!(
                "Failed to parse JSON response for {}: {}",
                reference,
                e
            )
        })?;

        let snapshot = normalize(data, reference)?;
        debug!(count = snapshot.rates.len(), "Received currency rates");
        Ok(snapshot)
    }
}

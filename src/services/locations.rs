//! Location directory backed by the countriesnow.space REST API

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Result, ScraperError};
use crate::traits::LocationDirectory;
use crate::types::LocationNode;

const API_BASE: &str = "https://countriesnow.space/api/v0.1";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Envelope every countriesnow endpoint wraps its payload in
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    error: bool,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize, Clone)]
struct IsoCountry {
    name: String,
    #[serde(rename = "Iso2")]
    iso2: String,
}

#[derive(Debug, Deserialize)]
struct CountryStates {
    states: Vec<ApiState>,
}

#[derive(Debug, Deserialize)]
struct ApiState {
    name: String,
    #[serde(default)]
    state_code: String,
}

pub struct CountriesNowDirectory {
    client: Client,
    base_url: String,
    /// The ISO listing is fetched once and reused for every country lookup.
    countries: OnceCell<Vec<IsoCountry>>,
}

impl CountriesNowDirectory {
    pub fn new() -> Result<Self> {
        Self::with_base_url(API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            countries: OnceCell::new(),
        })
    }

    async fn all_countries(&self) -> Result<&Vec<IsoCountry>> {
        self.countries
            .get_or_try_init(|| async {
                let url = format!("{}/countries/iso", self.base_url);
                debug!("Fetching country ISO listing from {}", url);
                let response: ApiResponse<Vec<IsoCountry>> =
                    self.client.get(&url).send().await?.json().await?;
                if response.error {
                    return Err(ScraperError::directory(format!(
                        "country listing rejected: {}",
                        response.msg
                    )));
                }
                response
                    .data
                    .ok_or_else(|| ScraperError::directory("country listing had no data"))
            })
            .await
    }
}

#[async_trait::async_trait]
impl LocationDirectory for CountriesNowDirectory {
    async fn country(&self, code: &str) -> Result<LocationNode> {
        let countries = self.all_countries().await?;
        let wanted = code.to_uppercase();
        countries
            .iter()
            .find(|c| c.iso2.eq_ignore_ascii_case(&wanted))
            .map(|c| LocationNode::country(c.iso2.clone(), c.name.clone()))
            .ok_or_else(|| ScraperError::directory(format!("unknown country code '{code}'")))
    }

    async fn states(&self, country: &LocationNode) -> Result<Vec<LocationNode>> {
        let url = format!("{}/countries/states", self.base_url);
        let response: ApiResponse<CountryStates> = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "country": country.name }))
            .send()
            .await?
            .json()
            .await?;

        if response.error {
            return Err(ScraperError::directory(format!(
                "state listing for {} rejected: {}",
                country.name, response.msg
            )));
        }
        let data = response
            .data
            .ok_or_else(|| ScraperError::directory("state listing had no data"))?;

        Ok(data
            .states
            .into_iter()
            .map(|s| {
                let code = if s.state_code.is_empty() {
                    s.name.clone()
                } else {
                    s.state_code
                };
                LocationNode::state(code, s.name, &country.code)
            })
            .collect())
    }

    async fn cities(&self, country: &LocationNode, state: &LocationNode) -> Result<Vec<LocationNode>> {
        let url = format!("{}/countries/state/cities", self.base_url);
        let response: ApiResponse<Vec<String>> = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "country": country.name,
                "state": state.name,
            }))
            .send()
            .await?
            .json()
            .await?;

        if response.error {
            return Err(ScraperError::directory(format!(
                "city listing for {}/{} rejected: {}",
                country.name, state.name, response.msg
            )));
        }
        let cities = response.data.unwrap_or_default();
        Ok(cities
            .into_iter()
            .map(|name| LocationNode::city(name, &state.code))
            .collect())
    }
}

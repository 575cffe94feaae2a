use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    model::{Declination, DeclinationRequest, FieldComponents},
    validate,
};

use super::DeclinationProvider;

pub const DEFAULT_ENDPOINT: &str =
    "https://www.ngdc.noaa.gov/geomag-web/calculators/calculateDeclination";
pub const DEFAULT_API_KEY: &str = "zNEw7";
pub const DEFAULT_MODEL: &str = "WMMHR";

/// Client for NOAA's geomag-web declination calculator.
#[derive(Debug, Clone)]
pub struct NoaaProvider {
    endpoint: String,
    fallback_endpoint: Option<String>,
    api_key: String,
    model: String,
    http: Client,
}

impl NoaaProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            fallback_endpoint: None,
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: Client::new(),
        }
    }

    /// Second URL (usually a same-origin proxy) tried when the primary call fails.
    pub fn with_fallback(mut self, endpoint: &str) -> Self {
        self.fallback_endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    fn query(&self, request: &DeclinationRequest) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("lat1", request.latitude.to_string()),
            ("lon1", request.longitude.to_string()),
            ("key", self.api_key.clone()),
            ("model", self.model.clone()),
            ("startYear", request.date.year().to_string()),
            ("startMonth", request.date.month().to_string()),
            ("startDay", request.date.day().to_string()),
            ("resultFormat", "json".to_string()),
        ];

        if let Some(elevation) = request.elevation {
            query.push(("elev", elevation.to_string()));
        }

        query
    }

    async fn fetch(&self, url: &str, request: &DeclinationRequest) -> Result<Declination> {
        debug!(url, lat = request.latitude, lng = request.longitude, "Requesting declination");

        let res = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&self.query(request))
            .send()
            .await
            .context("Failed to send request to the declination calculator")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read declination calculator response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "API responded with status: {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_response(&body, request, &self.model)
    }
}

#[async_trait]
impl DeclinationProvider for NoaaProvider {
    async fn declination(&self, request: &DeclinationRequest) -> Result<Declination> {
        validate::validate_date(request.date)?;

        match self.fetch(&self.endpoint, request).await {
            Ok(declination) => Ok(declination),
            Err(err) => match &self.fallback_endpoint {
                Some(fallback) => {
                    warn!(error = %err, "Direct calculator call failed, trying fallback endpoint");
                    self.fetch(fallback, request).await
                }
                None => Err(err),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct NoaaUnits {
    declination: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoaaResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    declination: f64,
    #[serde(rename = "declination_sv")]
    declination_sv: f64,
    inclination: Option<f64>,
    total_intensity: Option<f64>,
    horizontal_intensity: Option<f64>,
    north_component: Option<f64>,
    east_component: Option<f64>,
    vertical_component: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NoaaResponse {
    model: Option<String>,
    units: Option<NoaaUnits>,
    #[serde(default)]
    result: Vec<NoaaResult>,
}

/// Turn a calculator JSON body into a [`Declination`] for `request`.
///
/// The date is echoed from the request; the endpoint reports it as a
/// fractional year.
pub(crate) fn parse_response(
    body: &str,
    request: &DeclinationRequest,
    default_model: &str,
) -> Result<Declination> {
    let parsed: NoaaResponse =
        serde_json::from_str(body).context("Invalid response format from API")?;

    if let Some(unit) = parsed.units.as_ref().and_then(|u| u.declination.as_deref()) {
        if unit != "degrees" {
            warn!(unit, "Unexpected declination unit from calculator");
        }
    }

    let result = parsed
        .result
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Invalid response format from API"))?;

    Ok(Declination {
        latitude: result.latitude.unwrap_or(request.latitude),
        longitude: result.longitude.unwrap_or(request.longitude),
        elevation: result.elevation.or(request.elevation).unwrap_or(0.0),
        date: request.date,
        declination_deg: result.declination,
        annual_change_deg_per_year: result.declination_sv,
        model: parsed.model.unwrap_or_else(|| default_model.to_string()),
        components: FieldComponents {
            inclination_deg: result.inclination,
            total_intensity_nt: result.total_intensity,
            horizontal_intensity_nt: result.horizontal_intensity,
            north_component_nt: result.north_component,
            east_component_nt: result.east_component,
            vertical_component_nt: result.vertical_component,
        },
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

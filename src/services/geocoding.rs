//! Nominatim geocoding client
//!
//! Forward and reverse lookups against an OpenStreetMap Nominatim instance.
//! Answers are cached in-process for `cache_ttl_secs`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GeocodingConfig;
use crate::models::GeocodeResult;
use crate::services::cache::Cache;
use crate::utils::{AppError, AppResult};

const DEFAULT_SEARCH_LIMIT: u8 = 5;
const MAX_SEARCH_LIMIT: u8 = 20;

/// Place as returned by Nominatim's `jsonv2` format
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: Option<i64>,
    osm_type: Option<String>,
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    postcode: Option<String>,
}

/// `/reverse` answers HTTP 200 with an `error` body when nothing matches
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseResponse {
    Place(NominatimPlace),
    Error { error: String },
}

impl NominatimPlace {
    fn into_result(self) -> Option<GeocodeResult> {
        let latitude = self.lat.parse::<f64>().ok()?;
        let longitude = self.lon.parse::<f64>().ok()?;
        let address = self.address.unwrap_or_default();

        Some(GeocodeResult {
            display_name: self.display_name,
            latitude,
            longitude,
            place_id: self.place_id,
            osm_type: self.osm_type,
            road: address.road,
            neighbourhood: address.neighbourhood.or(address.suburb),
            city: address.city.or(address.town).or(address.village),
            postcode: address.postcode,
        })
    }
}

/// Geocoding client with a response cache
pub struct GeocodingService {
    client: Client,
    config: GeocodingConfig,
    cache: Cache<String, Vec<GeocodeResult>>,
}

impl GeocodingService {
    pub fn new(config: GeocodingConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build geocoding HTTP client")?;

        Ok(Self {
            client,
            cache: Cache::new(
                config.cache_max_entries,
                Duration::from_secs(config.cache_ttl_secs),
            ),
            config,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Forward geocoding of a free-text address
    pub async fn search(&self, query: &str, limit: Option<u8>) -> AppResult<Vec<GeocodeResult>> {
        self.ensure_enabled()?;

        let query = query.trim();
        if query.chars().count() < 3 {
            return Err(AppError::bad_request("Search text must have at least 3 characters"));
        }
        let limit = limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);

        let cache_key = format!("search:{}:{}", limit, query.to_lowercase());
        if let Some(hit) = self.cache.get(&cache_key).await {
            debug!(query = %query, "Geocoding cache hit");
            return Ok(hit);
        }

        let mut params = vec![
            ("q", query.to_string()),
            ("format", "jsonv2".to_string()),
            ("addressdetails", "1".to_string()),
            ("limit", limit.to_string()),
        ];
        self.push_locale(&mut params);

        let places: Vec<NominatimPlace> = self.fetch("search", &params).await?;
        let results: Vec<GeocodeResult> = places
            .into_iter()
            .filter_map(NominatimPlace::into_result)
            .collect();

        debug!(query = %query, results = results.len(), "Geocoding search");
        self.cache.set(cache_key, results.clone()).await;
        Ok(results)
    }

    /// Reverse geocoding of a coordinate. `None` when nothing is there.
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> AppResult<Option<GeocodeResult>> {
        self.ensure_enabled()?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::bad_request("Coordinates out of range"));
        }

        // ~11 m of precision is plenty for an address
        let cache_key = format!("reverse:{:.4}:{:.4}", latitude, longitude);
        if let Some(hit) = self.cache.get(&cache_key).await {
            return Ok(hit.into_iter().next());
        }

        let mut params = vec![
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("format", "jsonv2".to_string()),
            ("addressdetails", "1".to_string()),
        ];
        if let Some(language) = &self.config.language {
            params.push(("accept-language", language.clone()));
        }

        let result = match self.fetch::<ReverseResponse>("reverse", &params).await? {
            ReverseResponse::Place(place) => place.into_result(),
            ReverseResponse::Error { error } => {
                debug!(latitude, longitude, error = %error, "Reverse geocoding found nothing");
                None
            }
        };

        self.cache
            .set(cache_key, result.clone().into_iter().collect())
            .await;
        Ok(result)
    }

    fn ensure_enabled(&self) -> AppResult<()> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(AppError::ServiceUnavailable(
                "Geocoding is disabled".to_string(),
            ))
        }
    }

    fn push_locale(&self, params: &mut Vec<(&'static str, String)>) {
        if !self.config.country_codes.is_empty() {
            params.push(("countrycodes", self.config.country_codes.join(",")));
        }
        if let Some(language) = &self.config.language {
            params.push(("accept-language", language.clone()));
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> AppResult<T> {
        let base = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let url = Url::parse_with_params(&base, params)
            .map_err(|e| AppError::internal(format!("Invalid geocoding URL {}: {}", base, e)))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(endpoint, status = %status, "Geocoding service returned an error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    AppError::Upstream("Geocoding rate limit exceeded".to_string())
                }
                _ => AppError::Upstream(format!("Geocoding service returned {}", status)),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

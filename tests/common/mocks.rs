//! Mock services for testing
//!
//! A wiremock stand-in for Nominatim so geocoding runs without network
//! access.

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock Nominatim server
pub struct MockNominatim {
    pub server: MockServer,
}

impl MockNominatim {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Answer `/search?q=<query>` with `places`, expecting `calls` requests
    pub async fn expect_search(&self, query: &str, places: Value, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", query))
            .and(query_param("format", "jsonv2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(places))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Answer `/reverse` for a coordinate with `body`
    pub async fn expect_reverse(&self, lat: &str, lon: &str, body: Value, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", lat))
            .and(query_param("lon", lon))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Every request to `endpoint` fails with `status`
    pub async fn fail(&self, endpoint: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream failure"))
            .mount(&self.server)
            .await;
    }
}

/// A Nominatim `jsonv2` place with address details
pub fn nominatim_place(display_name: &str, lat: f64, lon: f64) -> Value {
    json!({
        "place_id": 123456,
        "osm_type": "way",
        "lat": lat.to_string(),
        "lon": lon.to_string(),
        "display_name": display_name,
        "address": {
            "road": "Avenida Juárez",
            "suburb": "Centro",
            "city": "Ciudad de México",
            "postcode": "06000"
        }
    })
}

/// Body Nominatim returns from `/reverse` when nothing is found
pub fn nominatim_not_found() -> Value {
    json!({ "error": "Unable to geocode" })
}

//! Test factories for generating test data
//!
//! Factories create randomized report bodies when a test needs many
//! distinct reports and does not care about their content.

use std::sync::atomic::{AtomicU64, Ordering};

use fake::faker::address::en::StreetName;
use fake::faker::lorem::en::{Sentence, Words};
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};
use uuid::Uuid;

use super::fixtures::CATEGORY_POTHOLES;

/// Factory for report request bodies
pub struct ReportFactory {
    counter: AtomicU64,
    category_id: Uuid,
}

impl Default for ReportFactory {
    fn default() -> Self {
        Self::new(CATEGORY_POTHOLES)
    }
}

impl ReportFactory {
    pub fn new(category_id: Uuid) -> Self {
        Self {
            counter: AtomicU64::new(0),
            category_id,
        }
    }

    /// A unique, valid report body
    pub fn build(&self) -> Value {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let words: Vec<String> = Words(2..4).fake();
        let latitude: f64 = (-90.0..90.0).fake();
        let longitude: f64 = (-180.0..180.0).fake();
        let street: String = StreetName().fake();
        let reporter: String = Name().fake();
        let description: String = Sentence(6..12).fake();

        json!({
            "title": format!("{} #{}", words.join(" "), n),
            "description": description,
            "category_id": self.category_id,
            "latitude": latitude,
            "longitude": longitude,
            "address": format!("{} {}", (n + 1) * 10, street),
            "reporter_name": reporter,
        })
    }

    pub fn build_many(&self, count: usize) -> Vec<Value> {
        (0..count).map(|_| self.build()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_factory_titles_are_unique() {
        let factory = ReportFactory::default();
        let reports = factory.build_many(3);
        assert_ne!(reports[0]["title"], reports[1]["title"]);
        assert_ne!(reports[1]["title"], reports[2]["title"]);
    }

    #[test]
    fn test_report_factory_coordinates_in_range() {
        let factory = ReportFactory::default();
        for report in factory.build_many(20) {
            let lat = report["latitude"].as_f64().unwrap();
            let lon = report["longitude"].as_f64().unwrap();
            assert!((-90.0..=90.0).contains(&lat));
            assert!((-180.0..=180.0).contains(&lon));
        }
    }
}

//! Integration tests for Civic Reports
//!
//! These tests drive the API router with a real SQLite database, the seed
//! catalogs and all authentication middleware.

mod api_tests;
mod workflow_tests;

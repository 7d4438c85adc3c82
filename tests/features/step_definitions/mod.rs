//! Step definitions for Cucumber scenarios

pub mod cascade_steps;
pub mod common_steps;

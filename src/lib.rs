//! Cross-reference graph for Japanese statutes.
//!
//! Article text goes through [`detection`] and [`resolution`] (driven by
//! [`analysis::ReferenceAnalysisService`]) to become [`types::Reference`]
//! edges; [`impact::ImpactAnalysisService`] walks those edges backwards to
//! estimate what an amendment affects.
pub mod analysis;
pub mod config;
pub mod detection;
pub mod errors;
pub mod ids;
pub mod impact;
pub mod law;
pub mod metrics;
pub mod numeral;
pub mod repository;
pub mod resolution;
pub mod types;

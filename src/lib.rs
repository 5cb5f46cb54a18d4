//! Ingestion, feature engineering and filtering for YouTube video/channel
//! datasets. The presentation layer lives elsewhere; this crate hands it a
//! [`data::Dataset`] plus progress events and diagnostics.

pub mod config;
pub mod data;

//! Data layer: core types, loading, cleaning, feature engineering, filtering.
//!
//! Architecture:
//! ```text
//!        .csv
//!          │
//!          ▼
//!   ┌────────────┐
//!   │   loader   │  chunked read → category vocabulary → sample
//!   └────────────┘   (progress events after every chunk)
//!          │
//!          ▼
//!   ┌────────────┐
//!   │   clean    │  sentinels (-1, -2) and ±inf → null
//!   └────────────┘
//!          │
//!          ▼
//!   ┌────────────┐
//!   │  features  │  categoryName, rates, engagement score, season
//!   └────────────┘
//!          │
//!          ▼
//!   ┌────────────┐
//!   │   filter   │  min/max views → categories → IQR outliers → fallback
//!   └────────────┘
//!          │
//!          ▼
//!    stats / export
//! ```

pub mod clean;
pub mod export;
pub mod features;
pub mod filter;
pub mod loader;
pub mod model;
pub mod stats;

pub use filter::{FilterOutcome, FilterSpec};
pub use loader::{DatasetLoader, LoadError, Loaded, LoaderConfig, ProgressEvent};
pub use model::{has_columns, Column, DType, Dataset, Value};

//! XBRL normalization, per-year financial metrics and the linear revenue
//! projection. Everything here is pure and synchronous.

pub mod forecast;
pub mod metrics;
pub mod normalizer;

pub use forecast::{project_revenue, DEFAULT_HORIZON};
pub use metrics::compute_metrics;
pub use normalizer::{normalize, FactTable};

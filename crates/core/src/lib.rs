pub mod brand;
pub mod config;
pub mod error;
pub mod record;

pub use brand::BrandIndex;
pub use config::AnalyticsConfig;
pub use error::*;
pub use record::*;

//! Numeric building blocks shared by the analyses.

pub mod kmeans;
pub mod ols;

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use handset_core::{AnalyticsConfig, AnalyticsError, PhoneRecord, PhoneSpec, Result};

use crate::anomaly::{detect_price_anomalies_with, AnomalyReport, PriceModel};
use crate::segmentation::{segment_market_with, MarketSegmentation};
use crate::similarity::{find_similar_to_member, find_similar_with, SimilarityResult};

/// Wall-clock time spent in each stage, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub similarity_ms: f64,
    pub segmentation_ms: f64,
    pub anomaly_ms: f64,
}

/// Output of [`AnalyticsEngine::run_all`] over one catalog snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub catalog_size: usize,
    pub similar: Option<Vec<SimilarityResult>>,
    pub segmentation: MarketSegmentation,
    pub anomalies: AnomalyReport,
    pub timings: StageTimings,
}

/// Runs the analyses with one validated configuration.
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// `k` defaults to the configured `top_k`.
    pub fn similar(
        &self,
        query: &PhoneSpec,
        catalog: &[PhoneRecord],
        k: Option<usize>,
    ) -> Result<Vec<SimilarityResult>> {
        let k = k.unwrap_or(self.config.similarity.top_k);
        find_similar_with(query, catalog, k, &self.config.similarity)
    }

    pub fn similar_to_member(
        &self,
        index: usize,
        catalog: &[PhoneRecord],
        k: Option<usize>,
    ) -> Result<Vec<SimilarityResult>> {
        let k = k.unwrap_or(self.config.similarity.top_k);
        find_similar_to_member(index, catalog, k, &self.config.similarity)
    }

    pub fn segment(&self, catalog: &[PhoneRecord]) -> Result<MarketSegmentation> {
        segment_market_with(catalog, &self.config.segmentation)
    }

    pub fn anomalies(&self, catalog: &[PhoneRecord]) -> Result<AnomalyReport> {
        detect_price_anomalies_with(catalog, &self.config.anomaly)
    }

    /// Fit the price model so callers can fill in a query's missing price.
    pub fn price_model(&self, catalog: &[PhoneRecord]) -> Result<PriceModel> {
        PriceModel::fit(catalog)
    }

    /// Run every analysis against the same catalog snapshot.
    pub fn run_all(&self, catalog: &[PhoneRecord], query: Option<&PhoneSpec>) -> Result<AnalyticsReport> {
        if catalog.is_empty() {
            return Err(AnalyticsError::EmptyCatalog);
        }
        let start = Instant::now();
        let mut timings = StageTimings::default();

        let similar = match query {
            Some(q) => {
                let t = Instant::now();
                let results = self.similar(q, catalog, None)?;
                timings.similarity_ms = t.elapsed().as_secs_f64() * 1000.0;
                Some(results)
            }
            None => None,
        };

        let t = Instant::now();
        let segmentation = self.segment(catalog)?;
        timings.segmentation_ms = t.elapsed().as_secs_f64() * 1000.0;

        let t = Instant::now();
        let anomalies = self.anomalies(catalog)?;
        timings.anomaly_ms = t.elapsed().as_secs_f64() * 1000.0;

        info!(
            "Analytics complete in {:.1}ms: {} records, {} overpriced, {} underpriced",
            start.elapsed().as_secs_f64() * 1000.0,
            catalog.len(),
            anomalies.overpriced.len(),
            anomalies.underpriced.len()
        );

        Ok(AnalyticsReport {
            generated_at: Utc::now(),
            catalog_size: catalog.len(),
            similar,
            segmentation,
            anomalies,
            timings,
        })
    }
}

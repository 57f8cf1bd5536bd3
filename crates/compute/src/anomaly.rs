//! Price anomaly and specification outlier detection.
//!
//! A linear price model is fitted over z-scored hardware specs. Phones whose
//! residual lies beyond `residual_sigma` standard deviations are flagged as
//! over- or under-priced. Independently, any spec dimension with |z| above
//! `outlier_z` marks the phone as a specification outlier.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use handset_core::config::AnomalyConfig;
use handset_core::{AnalyticsError, Dimension, FeatureSource, PhoneRecord, Result};

use crate::algorithms::ols::{fit_ols, OlsFit};
use crate::normalize::{self, NormalizationParams};

/// Regressors of the price model, also the dimensions checked for outliers.
pub const PRICE_MODEL_DIMS: [Dimension; 4] = [
    Dimension::Ram,
    Dimension::Battery,
    Dimension::Screen,
    Dimension::Weight,
];

/// Linear price model over normalized specs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceModel {
    pub params: NormalizationParams,
    pub intercept: f64,
    /// One coefficient per `PRICE_MODEL_DIMS` entry.
    pub coefficients: Vec<f64>,
}

impl PriceModel {
    /// Fit `price ≈ β₀ + β·[ram, battery, screen, weight]` by least squares.
    pub fn fit(catalog: &[PhoneRecord]) -> Result<Self> {
        let params = normalize::fit(catalog, &PRICE_MODEL_DIMS)?;
        let features: Vec<Vec<f64>> = params
            .transform_all(catalog)
            .into_iter()
            .map(|fv| fv.values)
            .collect();
        let prices: Vec<f64> = catalog.iter().map(|r| r.price_usd).collect();

        let OlsFit {
            intercept,
            coefficients,
        } = fit_ols(&features, &prices)?;

        Ok(Self {
            params,
            intercept,
            coefficients,
        })
    }

    /// Predicted price for anything exposing the model's dimensions.
    pub fn predict<S: FeatureSource + ?Sized>(&self, source: &S) -> f64 {
        let x = self.params.transform(source);
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x.values.iter())
                .map(|(b, v)| b * v)
                .sum::<f64>()
    }
}

/// Result of [`detect_price_anomalies`]. Indices refer to catalog positions.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    /// Residual above `+residual_sigma·σ`, ascending catalog order.
    pub overpriced: Vec<usize>,
    /// Residual below `-residual_sigma·σ`, ascending catalog order.
    pub underpriced: Vec<usize>,
    /// `actual - predicted` for every record, parallel to the catalog.
    pub residuals: Vec<f64>,
    /// Records with at least one spec dimension beyond the z threshold.
    pub outlier_specs: Vec<usize>,
    /// Population standard deviation of `residuals`.
    pub residual_std: f64,
    pub model: PriceModel,
}

impl AnomalyReport {
    /// Overpriced records, largest residual first.
    pub fn ranked_overpriced(&self) -> Vec<(usize, f64)> {
        self.ranked(&self.overpriced)
    }

    /// Underpriced records, most negative residual first.
    pub fn ranked_underpriced(&self) -> Vec<(usize, f64)> {
        self.ranked(&self.underpriced)
    }

    fn ranked(&self, indices: &[usize]) -> Vec<(usize, f64)> {
        let mut out: Vec<(usize, f64)> = indices.iter().map(|&i| (i, self.residuals[i])).collect();
        out.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        out
    }
}

/// Detect mispriced phones and spec outliers with default thresholds.
pub fn detect_price_anomalies(catalog: &[PhoneRecord]) -> Result<AnomalyReport> {
    detect_price_anomalies_with(catalog, &AnomalyConfig::default())
}

/// Detect mispriced phones and spec outliers.
///
/// Fails with `SingularMatrix` when the spec columns are degenerate (a
/// constant dimension, collinear dimensions, or fewer than five records).
pub fn detect_price_anomalies_with(
    catalog: &[PhoneRecord],
    config: &AnomalyConfig,
) -> Result<AnomalyReport> {
    if catalog.is_empty() {
        return Err(AnalyticsError::EmptyCatalog);
    }
    config.validate()?;

    let start = Instant::now();
    let model = PriceModel::fit(catalog)?;

    let residuals: Vec<f64> = catalog
        .iter()
        .map(|r| r.price_usd - model.predict(r))
        .collect();
    let residual_std = population_std(&residuals);

    // A perfect fit leaves only rounding noise; flag nothing in that case.
    let mean_price = catalog.iter().map(|r| r.price_usd).sum::<f64>() / catalog.len() as f64;
    let limit = config.residual_sigma * residual_std;
    let (overpriced, underpriced) = if residual_std <= 1e-9 * mean_price {
        debug!("residual spread negligible, no price anomalies flagged");
        (Vec::new(), Vec::new())
    } else {
        (
            indices_where(&residuals, |r| r > limit),
            indices_where(&residuals, |r| r < -limit),
        )
    };

    let outlier_specs = spec_outliers(catalog, &model.params, config.outlier_z);

    info!(
        "Anomaly detection over {} records: {} overpriced, {} underpriced, {} spec outliers, σ={:.2} ({:.1}ms)",
        catalog.len(),
        overpriced.len(),
        underpriced.len(),
        outlier_specs.len(),
        residual_std,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(AnomalyReport {
        overpriced,
        underpriced,
        residuals,
        outlier_specs,
        residual_std,
        model,
    })
}

/// Records with |z| > `threshold` in any of ram, battery, screen or weight.
pub fn detect_spec_outliers(catalog: &[PhoneRecord], threshold: f64) -> Result<Vec<usize>> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(AnalyticsError::InvalidArgument(format!(
            "outlier threshold must be finite and > 0, got {threshold}"
        )));
    }
    let params = normalize::fit(catalog, &PRICE_MODEL_DIMS)?;
    Ok(spec_outliers(catalog, &params, threshold))
}

fn spec_outliers(catalog: &[PhoneRecord], params: &NormalizationParams, threshold: f64) -> Vec<usize> {
    catalog
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            params
                .transform(*r)
                .values
                .iter()
                .any(|z| z.abs() > threshold)
        })
        .map(|(i, _)| i)
        .collect()
}

fn indices_where(values: &[f64], pred: impl Fn(f64) -> bool) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| pred(v))
        .map(|(i, _)| i)
        .collect()
}

fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Prices follow a clean linear rule except where `markup` is applied.
    fn phone(i: usize, markup: f64) -> PhoneRecord {
        let x = i as f64;
        let ram = 2.0 + (i % 5) as f64 * 2.0;
        let battery = 3000.0 + x * 150.0;
        let screen = 5.0 + ((i * 7) % 11) as f64 * 0.15;
        let weight = 150.0 + ((i * 3) % 8) as f64 * 6.0;
        PhoneRecord {
            brand: format!("B{}", i % 4),
            ram_gb: ram,
            battery_mah: battery,
            screen_in: screen,
            weight_g: weight,
            launch_year: 2020,
            price_usd: 100.0 + ram * 40.0 + (battery - 3000.0) * 0.1 + screen * 20.0 + markup,
            front_camera_mp: None,
            back_camera_mp: None,
        }
    }

    fn catalog_with_markups(markups: &[(usize, f64)]) -> Vec<PhoneRecord> {
        (0..30)
            .map(|i| {
                let m = markups.iter().find(|(j, _)| *j == i).map(|(_, m)| *m).unwrap_or(0.0);
                // small deterministic jitter keeps σ away from zero
                let jitter = ((i * 13) % 7) as f64 - 3.0;
                phone(i, m + jitter)
            })
            .collect()
    }

    #[test]
    fn flags_marked_up_and_discounted_phones() {
        let cat = catalog_with_markups(&[(4, 400.0), (17, -350.0)]);
        let report = detect_price_anomalies(&cat).unwrap();
        assert!(report.overpriced.contains(&4), "overpriced = {:?}", report.overpriced);
        assert!(report.underpriced.contains(&17), "underpriced = {:?}", report.underpriced);
        assert_eq!(report.ranked_overpriced()[0].0, 4);
        assert_eq!(report.ranked_underpriced()[0].0, 17);
    }

    #[test]
    fn residuals_sum_to_zero() {
        let cat = catalog_with_markups(&[(4, 400.0)]);
        let report = detect_price_anomalies(&cat).unwrap();
        assert_eq!(report.residuals.len(), cat.len());
        let sum: f64 = report.residuals.iter().sum();
        assert!(sum.abs() < 1e-6, "sum of residuals = {sum}");
    }

    #[test]
    fn perfect_fit_flags_nothing() {
        let cat: Vec<PhoneRecord> = (0..20).map(|i| phone(i, 0.0)).collect();
        let report = detect_price_anomalies(&cat).unwrap();
        assert!(report.overpriced.is_empty());
        assert!(report.underpriced.is_empty());
    }

    #[test]
    fn constant_dimension_is_singular() {
        let cat: Vec<PhoneRecord> = (0..10)
            .map(|i| PhoneRecord { weight_g: 180.0, ..phone(i, 0.0) })
            .collect();
        assert!(matches!(
            detect_price_anomalies(&cat),
            Err(AnalyticsError::SingularMatrix(_))
        ));
    }

    #[test]
    fn tiny_catalog_is_singular() {
        let cat: Vec<PhoneRecord> = (0..3).map(|i| phone(i, 0.0)).collect();
        assert!(matches!(
            detect_price_anomalies(&cat),
            Err(AnalyticsError::SingularMatrix(_))
        ));
    }

    #[test]
    fn predict_matches_fitted_prices() {
        let cat: Vec<PhoneRecord> = (0..20).map(|i| phone(i, 0.0)).collect();
        let model = PriceModel::fit(&cat).unwrap();
        for r in &cat {
            assert!((model.predict(r) - r.price_usd).abs() < 1e-6);
        }
    }

    #[test]
    fn spec_outlier_on_extreme_battery() {
        let mut cat: Vec<PhoneRecord> = (0..20).map(|i| phone(i, 0.0)).collect();
        cat[9].battery_mah = 20000.0;
        let outliers = detect_spec_outliers(&cat, 2.0).unwrap();
        assert!(outliers.contains(&9));
    }

    #[test]
    fn higher_threshold_never_adds_outliers() {
        let mut cat = catalog_with_markups(&[]);
        cat[3].ram_gb = 24.0;
        cat[11].weight_g = 320.0;
        let at2 = detect_spec_outliers(&cat, 2.0).unwrap();
        let at3 = detect_spec_outliers(&cat, 3.0).unwrap();
        assert!(at3.len() <= at2.len());
        assert!(at3.iter().all(|i| at2.contains(i)));
    }

    #[test]
    fn invalid_threshold_rejected() {
        let cat = catalog_with_markups(&[]);
        assert!(matches!(
            detect_spec_outliers(&cat, 0.0),
            Err(AnalyticsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        let cat = catalog_with_markups(&[(4, 400.0)]);
        for config in [
            AnomalyConfig { outlier_z: f64::NAN, ..AnomalyConfig::default() },
            AnomalyConfig { residual_sigma: f64::NAN, ..AnomalyConfig::default() },
            AnomalyConfig { residual_sigma: 0.0, ..AnomalyConfig::default() },
        ] {
            assert!(matches!(
                detect_price_anomalies_with(&cat, &config),
                Err(AnalyticsError::InvalidArgument(_))
            ));
        }
    }
}

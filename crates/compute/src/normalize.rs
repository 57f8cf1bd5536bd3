//! z-score normalization shared by every analysis.
//!
//! Parameters are fitted once over a catalog and then applied to catalog
//! records and queries alike, so both live in the same feature space.

use serde::{Deserialize, Serialize};

use handset_core::{AnalyticsError, Dimension, FeatureSource, FeatureVector, Result};

/// Added to every standard deviation before dividing.
pub const EPSILON: f64 = 1e-10;

/// Per-dimension population mean and standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub dims: Vec<Dimension>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// Fit normalization parameters over `records` for the given dimensions.
pub fn fit<S: FeatureSource>(records: &[S], dims: &[Dimension]) -> Result<NormalizationParams> {
    if records.is_empty() {
        return Err(AnalyticsError::EmptyCatalog);
    }
    if dims.is_empty() {
        return Err(AnalyticsError::InvalidArgument(
            "at least one dimension is required".to_string(),
        ));
    }

    let raw = raw_matrix(records, dims);
    let (means, stds) = compute_population_stats(&raw);

    Ok(NormalizationParams {
        dims: dims.to_vec(),
        means,
        stds,
    })
}

/// Apply fitted parameters to one record or query.
pub fn transform<S: FeatureSource + ?Sized>(source: &S, params: &NormalizationParams) -> FeatureVector {
    params.transform(source)
}

impl NormalizationParams {
    pub fn transform<S: FeatureSource + ?Sized>(&self, source: &S) -> FeatureVector {
        let values = self
            .dims
            .iter()
            .enumerate()
            .map(|(i, &dim)| self.z_score(i, source.value(dim)))
            .collect();
        FeatureVector {
            dims: self.dims.clone(),
            values,
        }
    }

    /// Transform every record, preserving catalog order.
    pub fn transform_all<S: FeatureSource>(&self, records: &[S]) -> Vec<FeatureVector> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    /// `(value - mean) / (std + ε)` for the dimension at position `i`.
    #[inline]
    pub fn z_score(&self, i: usize, value: f64) -> f64 {
        (value - self.means[i]) / (self.stds[i] + EPSILON)
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }
}

/// Raw values of `dims` for every record, one row per record.
pub(crate) fn raw_matrix<S: FeatureSource>(records: &[S], dims: &[Dimension]) -> Vec<Vec<f64>> {
    records
        .iter()
        .map(|r| dims.iter().map(|&d| r.value(d)).collect())
        .collect()
}

/// Compute population-level mean and stddev per feature dimension.
///
/// A dimension whose values are all identical gets exactly that value as its
/// mean and a zero stddev, so it normalizes to exactly 0.
pub fn compute_population_stats(rows: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    if rows.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let dim = rows[0].len();
    let n = rows.len() as f64;

    let mut means = vec![0.0; dim];
    let mut mins = vec![f64::INFINITY; dim];
    let mut maxs = vec![f64::NEG_INFINITY; dim];
    for row in rows {
        for i in 0..dim.min(row.len()) {
            means[i] += row[i];
            mins[i] = mins[i].min(row[i]);
            maxs[i] = maxs[i].max(row[i]);
        }
    }
    for (i, m) in means.iter_mut().enumerate() {
        *m = if mins[i] == maxs[i] { mins[i] } else { *m / n };
    }

    let mut variance = vec![0.0; dim];
    for row in rows {
        for i in 0..dim.min(row.len()) {
            let diff = row[i] - means[i];
            variance[i] += diff * diff;
        }
    }

    let stds = variance.iter().map(|v| (v / n).sqrt()).collect();

    (means, stds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use handset_core::PhoneRecord;

    fn phone(ram: f64, battery: f64, price: f64) -> PhoneRecord {
        PhoneRecord {
            brand: "Acme".to_string(),
            ram_gb: ram,
            battery_mah: battery,
            screen_in: 6.1,
            weight_g: 180.0,
            launch_year: 2022,
            price_usd: price,
            front_camera_mp: None,
            back_camera_mp: None,
        }
    }

    fn catalog() -> Vec<PhoneRecord> {
        vec![
            phone(4.0, 3000.0, 200.0),
            phone(6.0, 4000.0, 400.0),
            phone(8.0, 4500.0, 800.0),
            phone(8.0, 5000.0, 850.0),
            phone(12.0, 5500.0, 1200.0),
        ]
    }

    #[test]
    fn population_stats_basic() {
        let data = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let (means, stds) = compute_population_stats(&data);
        assert!((means[0] - 2.0).abs() < 1e-12);
        assert!((means[1] - 3.0).abs() < 1e-12);
        assert!((stds[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn population_stats_empty() {
        let (means, stds) = compute_population_stats(&[]);
        assert!(means.is_empty());
        assert!(stds.is_empty());
    }

    #[test]
    fn fit_rejects_empty_catalog() {
        let empty: Vec<PhoneRecord> = Vec::new();
        assert!(matches!(fit(&empty, &Dimension::ALL), Err(AnalyticsError::EmptyCatalog)));
    }

    #[test]
    fn transformed_columns_have_zero_mean_unit_std() {
        let records = catalog();
        let dims = [Dimension::Ram, Dimension::Battery, Dimension::Price];
        let params = fit(&records, &dims).unwrap();
        let vectors = params.transform_all(&records);
        let n = vectors.len() as f64;

        for d in 0..dims.len() {
            let mean: f64 = vectors.iter().map(|v| v.values[d]).sum::<f64>() / n;
            let var: f64 = vectors.iter().map(|v| (v.values[d] - mean).powi(2)).sum::<f64>() / n;
            assert!(mean.abs() < 1e-9, "dim {d} mean = {mean}");
            assert!((var.sqrt() - 1.0).abs() < 1e-6, "dim {d} std = {}", var.sqrt());
        }
    }

    #[test]
    fn constant_dimension_normalizes_to_zero() {
        let records: Vec<PhoneRecord> = (0..5)
            .map(|i| phone(6.1, 3000.0 + i as f64 * 100.0, 300.0))
            .collect();
        let params = fit(&records, &[Dimension::Ram, Dimension::Battery]).unwrap();
        assert_eq!(params.stds[0], 0.0);
        for fv in params.transform_all(&records) {
            assert_eq!(fv.values[0], 0.0);
            assert!(fv.values[1].is_finite());
        }
    }

    #[test]
    fn query_uses_catalog_parameters() {
        let records = catalog();
        let params = fit(&records, &[Dimension::Ram]).unwrap();
        let query = handset_core::PhoneSpec::from(&records[2]);
        let q = transform(&query, &params);
        let r = transform(&records[2], &params);
        assert_eq!(q.values, r.values);
        assert_eq!(q.get(Dimension::Ram), Some(r.values[0]));
    }
}

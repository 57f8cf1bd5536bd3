//! Similar-phone search.
//!
//! Candidates are ranked by a blend of cosine similarity over z-scored
//! features and an inverted, max-normalized weighted Euclidean distance.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use handset_core::config::{DistanceSpace, SimilarityConfig};
use handset_core::{AnalyticsError, Dimension, FeatureSource, PhoneRecord, PhoneSpec, Result};

use crate::algorithms::kmeans::euclidean;
use crate::normalize::{self, NormalizationParams, EPSILON};

/// Dimensions compared, in the order `feature_weights` refers to.
pub const SIMILARITY_DIMS: [Dimension; 6] = [
    Dimension::Ram,
    Dimension::Battery,
    Dimension::Screen,
    Dimension::Weight,
    Dimension::Year,
    Dimension::Price,
];

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    /// Position of the record in the catalog.
    pub index: usize,
    pub record: PhoneRecord,
    /// Combined score, roughly in [0, 1].
    pub score: f64,
    pub cosine: f64,
    /// Weighted distance divided by the largest distance among candidates.
    pub normalized_distance: f64,
}

/// Rank `catalog` against `query` with the default blend and weights.
pub fn find_similar(query: &PhoneSpec, catalog: &[PhoneRecord], k: usize) -> Result<Vec<SimilarityResult>> {
    find_similar_with(query, catalog, k, &SimilarityConfig::default())
}

/// Rank `catalog` against `query`, returning at most `k` results.
///
/// `k` larger than the catalog is clamped. Every record is a candidate,
/// including one identical to the query.
pub fn find_similar_with(
    query: &PhoneSpec,
    catalog: &[PhoneRecord],
    k: usize,
    config: &SimilarityConfig,
) -> Result<Vec<SimilarityResult>> {
    rank(query, catalog, None, k, config)
}

/// Rank the catalog against its own member at `index`, excluding that member.
pub fn find_similar_to_member(
    index: usize,
    catalog: &[PhoneRecord],
    k: usize,
    config: &SimilarityConfig,
) -> Result<Vec<SimilarityResult>> {
    if catalog.is_empty() {
        return Err(AnalyticsError::EmptyCatalog);
    }
    let member = catalog.get(index).ok_or_else(|| {
        AnalyticsError::InvalidArgument(format!(
            "member index {index} out of range for catalog of {}",
            catalog.len()
        ))
    })?;
    rank(&PhoneSpec::from(member), catalog, Some(index), k, config)
}

fn rank(
    query: &PhoneSpec,
    catalog: &[PhoneRecord],
    exclude: Option<usize>,
    k: usize,
    config: &SimilarityConfig,
) -> Result<Vec<SimilarityResult>> {
    if catalog.is_empty() {
        return Err(AnalyticsError::EmptyCatalog);
    }
    if k == 0 {
        return Err(AnalyticsError::InvalidArgument("k must be at least 1".to_string()));
    }
    config.validate()?;
    query.validate()?;

    let start = Instant::now();
    let params = normalize::fit(catalog, &SIMILARITY_DIMS)?;
    let q = params.transform(query);

    struct Scored {
        index: usize,
        cosine: f64,
        distance: f64,
    }

    let scored: Vec<Scored> = catalog
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != exclude)
        .map(|(index, record)| {
            let r = params.transform(record);
            Scored {
                index,
                cosine: cosine_similarity(q.as_slice(), r.as_slice()),
                distance: weighted_distance(query, record, &params, config),
            }
        })
        .collect();

    let max_distance = scored.iter().map(|s| s.distance).fold(0.0, f64::max);

    let mut results: Vec<SimilarityResult> = scored
        .into_iter()
        .map(|s| {
            let normalized_distance = if max_distance > 0.0 {
                s.distance / max_distance
            } else {
                0.0
            };
            SimilarityResult {
                index: s.index,
                record: catalog[s.index].clone(),
                score: config.cosine_weight * s.cosine
                    + config.distance_weight * (1.0 - normalized_distance),
                cosine: s.cosine,
                normalized_distance,
            }
        })
        .collect();

    // Stable: equal scores keep catalog order.
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(k);

    debug!(
        top = ?results.first().map(|r| r.index),
        max_distance, "similarity ranking complete"
    );
    info!(
        "Similarity search over {} records in {:.1}ms",
        catalog.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(results)
}

/// `dot(a, b) / (‖a‖·‖b‖ + ε)`.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt() + EPSILON)
}

/// L2 norm of the per-dimension weighted difference between query and record.
///
/// In `Raw` space the differences are in attribute units, so large-unit
/// dimensions (battery mAh, price USD) dominate.
fn weighted_distance(
    query: &PhoneSpec,
    record: &PhoneRecord,
    params: &NormalizationParams,
    config: &SimilarityConfig,
) -> f64 {
    let (q, r): (Vec<f64>, Vec<f64>) = SIMILARITY_DIMS
        .iter()
        .enumerate()
        .map(|(i, &dim)| {
            let (qv, rv) = (query.value(dim), record.value(dim));
            let (qv, rv) = match config.distance_space {
                DistanceSpace::Raw => (qv, rv),
                DistanceSpace::Normalized => (params.z_score(i, qv), params.z_score(i, rv)),
            };
            let w = config.feature_weights[i];
            (w * qv, w * rv)
        })
        .unzip();
    euclidean(&q, &r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone(brand: &str, ram: f64, battery: f64, price: f64) -> PhoneRecord {
        PhoneRecord {
            brand: brand.to_string(),
            ram_gb: ram,
            battery_mah: battery,
            screen_in: 6.0 + ram / 10.0,
            weight_g: 170.0 + ram,
            launch_year: 2020 + (ram as i32) / 4,
            price_usd: price,
            front_camera_mp: None,
            back_camera_mp: Some(12.0),
        }
    }

    fn catalog() -> Vec<PhoneRecord> {
        vec![
            phone("A", 4.0, 3000.0, 200.0),
            phone("B", 6.0, 4000.0, 400.0),
            phone("C", 8.0, 4500.0, 800.0),
            phone("D", 8.0, 5000.0, 850.0),
            phone("E", 12.0, 5500.0, 1200.0),
        ]
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [1.0, -2.0, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn exact_copy_ranks_first() {
        let cat = catalog();
        let query = PhoneSpec::from(&cat[3]);
        let results = find_similar(&query, &cat, 5).unwrap();
        assert_eq!(results[0].index, 3);
        assert_eq!(results[0].normalized_distance, 0.0);
        assert!(results[1..].iter().all(|r| r.score < results[0].score));
    }

    #[test]
    fn results_sorted_descending() {
        let cat = catalog();
        let query = PhoneSpec::from(&cat[1]);
        let results = find_similar(&query, &cat, 5).unwrap();
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn k_is_clamped_to_catalog_size() {
        let cat = catalog();
        let results = find_similar(&PhoneSpec::from(&cat[0]), &cat, 50).unwrap();
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn zero_k_rejected() {
        let cat = catalog();
        let err = find_similar(&PhoneSpec::from(&cat[0]), &cat, 0).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidArgument(_)));
    }

    #[test]
    fn empty_catalog_rejected() {
        let query = PhoneSpec::from(&catalog()[0]);
        assert!(matches!(find_similar(&query, &[], 3), Err(AnalyticsError::EmptyCatalog)));
    }

    #[test]
    fn malformed_query_rejected() {
        let cat = catalog();
        let mut query = PhoneSpec::from(&cat[0]);
        query.battery_mah = f64::INFINITY;
        assert!(matches!(
            find_similar(&query, &cat, 3),
            Err(AnalyticsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn equal_scores_keep_catalog_order() {
        let mut cat = catalog();
        cat.push(cat[2].clone());
        let results = find_similar(&PhoneSpec::from(&cat[2]), &cat, 2).unwrap();
        assert_eq!(results[0].index, 2);
        assert_eq!(results[1].index, 5);
        assert_eq!(results[0].score, results[1].score);
    }

    #[test]
    fn member_search_excludes_itself() {
        let cat = catalog();
        let results = find_similar_to_member(2, &cat, 10, &SimilarityConfig::default()).unwrap();
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.index != 2));
    }

    #[test]
    fn member_index_out_of_range() {
        let cat = catalog();
        let err = find_similar_to_member(9, &cat, 1, &SimilarityConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidArgument(_)));
    }

    #[test]
    fn invalid_config_rejected() {
        let cat = catalog();
        let query = PhoneSpec::from(&cat[0]);
        let config = SimilarityConfig {
            cosine_weight: f64::NAN,
            ..SimilarityConfig::default()
        };
        assert!(matches!(
            find_similar_with(&query, &cat, 3, &config),
            Err(AnalyticsError::InvalidArgument(_))
        ));

        let mut config = SimilarityConfig::default();
        config.feature_weights[1] = -0.5;
        assert!(matches!(
            find_similar_to_member(0, &cat, 3, &config),
            Err(AnalyticsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn normalized_space_changes_distance_but_not_self_match() {
        let cat = catalog();
        let config = SimilarityConfig {
            distance_space: DistanceSpace::Normalized,
            ..SimilarityConfig::default()
        };
        let query = PhoneSpec::from(&cat[4]);
        let results = find_similar_with(&query, &cat, 3, &config).unwrap();
        assert_eq!(results[0].index, 4);
    }

    #[test]
    fn raw_distance_dominated_by_large_units() {
        let cat = catalog();
        let params = normalize::fit(&cat, &SIMILARITY_DIMS).unwrap();
        let config = SimilarityConfig::default();
        let mut query = PhoneSpec::from(&cat[0]);
        query.battery_mah += 100.0;
        let d = weighted_distance(&query, &cat[0], &params, &config);
        assert!((d - 100.0).abs() < 1e-9);
    }
}

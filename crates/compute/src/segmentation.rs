//! Market segmentation into Budget / MidRange / Premium tiers.
//!
//! k-means (k = 3) runs on z-scored price and spec features. Cluster ids are
//! arbitrary, so tiers are assigned afterwards by ascending mean raw price.

use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use handset_core::config::SegmentationConfig;
use handset_core::{AnalyticsError, Dimension, FeatureSource, FeatureVector, PhoneRecord, Result};

use crate::algorithms::kmeans::{kmeans_with_restarts, silhouette_score, KmeansParams};
use crate::normalize;

/// Clustering features, price first.
pub const SEGMENTATION_DIMS: [Dimension; 5] = [
    Dimension::Price,
    Dimension::Ram,
    Dimension::Battery,
    Dimension::Screen,
    Dimension::Year,
];

const NUM_SEGMENTS: usize = 3;
const TOP_BRANDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SegmentLabel {
    Budget,
    MidRange,
    Premium,
}

impl SegmentLabel {
    /// Labels in ascending price order.
    pub const ORDERED: [SegmentLabel; NUM_SEGMENTS] =
        [SegmentLabel::Budget, SegmentLabel::MidRange, SegmentLabel::Premium];
}

impl std::fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentLabel::Budget => write!(f, "Budget"),
            SegmentLabel::MidRange => write!(f, "Mid-Range"),
            SegmentLabel::Premium => write!(f, "Premium"),
        }
    }
}

/// One market tier with summary statistics over its raw attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSegment {
    pub label: SegmentLabel,
    /// Catalog positions, ascending.
    pub member_indices: Vec<usize>,
    /// Cluster centre in normalized `SEGMENTATION_DIMS` space.
    pub centroid: FeatureVector,
    pub avg_price: f64,
    pub price_range: (f64, f64),
    pub avg_ram: f64,
    pub ram_range: (f64, f64),
    pub avg_battery: f64,
    pub battery_range: (f64, f64),
    pub avg_screen: f64,
    pub screen_range: (f64, f64),
    pub avg_year: f64,
    pub year_range: (f64, f64),
    /// Most frequent brands, ties broken by first appearance.
    pub top_brands: Vec<String>,
}

impl MarketSegment {
    pub fn count(&self) -> usize {
        self.member_indices.len()
    }
}

/// Segments plus clustering diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSegmentation {
    /// Budget, MidRange, Premium in that order.
    pub segments: [MarketSegment; NUM_SEGMENTS],
    pub inertia: f64,
    pub iterations: usize,
    pub silhouette: f64,
}

impl MarketSegmentation {
    pub fn segment(&self, label: SegmentLabel) -> &MarketSegment {
        &self.segments[label as usize]
    }

    /// Tier a catalog position was placed in.
    pub fn label_of(&self, index: usize) -> Option<SegmentLabel> {
        self.segments
            .iter()
            .find(|s| s.member_indices.binary_search(&index).is_ok())
            .map(|s| s.label)
    }
}

/// Segment the catalog with default settings (unseeded).
pub fn segment_market(catalog: &[PhoneRecord]) -> Result<[MarketSegment; NUM_SEGMENTS]> {
    segment_market_with(catalog, &SegmentationConfig::default()).map(|m| m.segments)
}

/// Segment the catalog into three price-ordered tiers.
///
/// Fails with `InsufficientData` when fewer than three distinct feature
/// vectors exist.
pub fn segment_market_with(
    catalog: &[PhoneRecord],
    config: &SegmentationConfig,
) -> Result<MarketSegmentation> {
    if catalog.is_empty() {
        return Err(AnalyticsError::EmptyCatalog);
    }
    config.validate()?;

    let start = Instant::now();
    let params = normalize::fit(catalog, &SEGMENTATION_DIMS)?;
    let points: Vec<Vec<f64>> = params
        .transform_all(catalog)
        .into_iter()
        .map(|fv| fv.values)
        .collect();

    let result = kmeans_with_restarts(
        &points,
        &KmeansParams {
            k: NUM_SEGMENTS,
            restarts: config.restarts,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            seed: config.seed,
        },
    )?;

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); NUM_SEGMENTS];
    for (i, &c) in result.assignments.iter().enumerate() {
        members[c].push(i);
    }

    // Rank clusters by mean raw price; ties fall back to cluster id.
    let mean_prices: Vec<f64> = members
        .iter()
        .map(|m| mean(m.iter().map(|&i| catalog[i].price_usd)))
        .collect();
    let mut order: [usize; NUM_SEGMENTS] = [0, 1, 2];
    order.sort_by(|&a, &b| mean_prices[a].total_cmp(&mean_prices[b]).then(a.cmp(&b)));

    let segments: [MarketSegment; NUM_SEGMENTS] = std::array::from_fn(|rank| {
        let cluster = order[rank];
        summarize(
            SegmentLabel::ORDERED[rank],
            &members[cluster],
            FeatureVector {
                dims: SEGMENTATION_DIMS.to_vec(),
                values: result.centroids[cluster].clone(),
            },
            catalog,
        )
    });

    let silhouette = silhouette_score(&points, &result);

    info!(
        "Segmentation of {} records: sizes {}/{}/{}, inertia={:.3}, silhouette={:.3} ({:.1}ms)",
        catalog.len(),
        segments[0].count(),
        segments[1].count(),
        segments[2].count(),
        result.inertia,
        silhouette,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(MarketSegmentation {
        segments,
        inertia: result.inertia,
        iterations: result.iterations,
        silhouette,
    })
}

fn summarize(
    label: SegmentLabel,
    member_indices: &[usize],
    centroid: FeatureVector,
    catalog: &[PhoneRecord],
) -> MarketSegment {
    let stat = |dim: Dimension| {
        let values = member_indices.iter().map(|&i| catalog[i].value(dim));
        (mean(values.clone()), range(values))
    };
    let (avg_price, price_range) = stat(Dimension::Price);
    let (avg_ram, ram_range) = stat(Dimension::Ram);
    let (avg_battery, battery_range) = stat(Dimension::Battery);
    let (avg_screen, screen_range) = stat(Dimension::Screen);
    let (avg_year, year_range) = stat(Dimension::Year);

    MarketSegment {
        label,
        member_indices: member_indices.to_vec(),
        centroid,
        avg_price,
        price_range,
        avg_ram,
        ram_range,
        avg_battery,
        battery_range,
        avg_screen,
        screen_range,
        avg_year,
        year_range,
        top_brands: top_brands(member_indices.iter().map(|&i| catalog[i].brand.as_str()), TOP_BRANDS),
    }
}

/// Up to `limit` brands by descending count; equal counts keep first-seen order.
pub fn top_brands<'a>(brands: impl Iterator<Item = &'a str>, limit: usize) -> Vec<String> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for brand in brands {
        *counts.entry(brand).or_insert(0) += 1;
    }
    // Stable sort keeps first-seen order among ties.
    counts.sort_by(|_, a, _, b| b.cmp(a));
    counts
        .into_keys()
        .take(limit)
        .map(str::to_owned)
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

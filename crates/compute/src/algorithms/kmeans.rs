use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use handset_core::config::MIN_RESTARTS;
use handset_core::{AnalyticsError, Result};

/// Result of a full batch K-means run.
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster of each point, parallel to the input slice.
    pub assignments: Vec<usize>,
    /// Final centroid vectors, indexed by cluster id.
    pub centroids: Vec<Vec<f64>>,
    /// Number of clusters.
    pub k: usize,
    /// Number of Lloyd's iterations performed.
    pub iterations: usize,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
}

impl KmeansResult {
    /// Number of points assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k];
        for &c in &self.assignments {
            sizes[c] += 1;
        }
        sizes
    }
}

/// Settings for [`kmeans_with_restarts`].
#[derive(Debug, Clone)]
pub struct KmeansParams {
    pub k: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: Option<u64>,
}

/// Run Lloyd's K-means once from `k` randomly chosen distinct points.
///
/// Iterates until no centroid moves further than `tolerance` or
/// `max_iterations` is reached. Every cluster in the result is non-empty.
///
/// Fails with `InsufficientData` when there are fewer than `k` distinct points.
pub fn kmeans<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> Result<KmeansResult> {
    let distinct = distinct_points(points);
    check_preconditions(points, &distinct, k)?;
    Ok(lloyd(points, &distinct, k, max_iterations, tolerance, rng))
}

/// Run K-means `restarts` times and keep the lowest-inertia run.
///
/// Restart seeds are drawn up front from a single master RNG, then the runs
/// execute in parallel. Ties on inertia go to the earliest restart, so a fixed
/// seed gives the same result regardless of thread scheduling.
pub fn kmeans_with_restarts(points: &[Vec<f64>], params: &KmeansParams) -> Result<KmeansResult> {
    if params.restarts < MIN_RESTARTS {
        return Err(AnalyticsError::InvalidArgument(format!(
            "kmeans: restarts must be at least {MIN_RESTARTS}, got {}",
            params.restarts
        )));
    }
    let distinct = distinct_points(points);
    check_preconditions(points, &distinct, params.k)?;

    let mut master = match params.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let seeds: Vec<u64> = (0..params.restarts).map(|_| master.gen()).collect();

    let runs: Vec<KmeansResult> = seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            lloyd(
                points,
                &distinct,
                params.k,
                params.max_iterations,
                params.tolerance,
                &mut rng,
            )
        })
        .collect();

    lowest_inertia(runs)
        .ok_or_else(|| AnalyticsError::InvalidArgument("kmeans: no restarts ran".to_string()))
}

/// Mean silhouette over all points, in [-1, 1].
///
/// s(i) = (b - a) / max(a, b), where a is the mean distance to the rest of
/// i's cluster and b the smallest mean distance to another cluster. Points in
/// singleton clusters score 0.
pub fn silhouette_score(points: &[Vec<f64>], result: &KmeansResult) -> f64 {
    let sizes = result.cluster_sizes();
    if points.len() < 2 || sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    let scores: Vec<f64> = points
        .par_iter()
        .zip(result.assignments.par_iter())
        .map(|(p, &own)| {
            if sizes[own] == 1 {
                return 0.0;
            }
            // Distance sums per cluster; the zero self-distance lands in `own`.
            let mut sums = vec![0.0; result.k];
            for (q, &c) in points.iter().zip(result.assignments.iter()) {
                sums[c] += euclidean(p, q);
            }
            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..result.k)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);
            let max_ab = a.max(b);
            if max_ab > 0.0 { (b - a) / max_ab } else { 0.0 }
        })
        .collect();

    // Sequential sum keeps the score bit-identical across thread counts.
    scores.iter().sum::<f64>() / points.len() as f64
}

/// Indices of the first occurrence of each distinct point, in input order.
pub fn distinct_points(points: &[Vec<f64>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| lexicographic(&points[a], &points[b]).then(a.cmp(&b)));
    order.dedup_by(|later, earlier| lexicographic(&points[*later], &points[*earlier]).is_eq());
    order.sort_unstable();
    order
}

// ── Internal helpers ─────────────────────────────────────────

fn check_preconditions(points: &[Vec<f64>], distinct: &[usize], k: usize) -> Result<()> {
    if points.is_empty() {
        return Err(AnalyticsError::EmptyCatalog);
    }
    if k == 0 {
        return Err(AnalyticsError::InvalidArgument(
            "kmeans: k must be at least 1".to_string(),
        ));
    }
    if distinct.len() < k {
        return Err(AnalyticsError::InsufficientData {
            needed: k,
            found: distinct.len(),
        });
    }
    Ok(())
}

/// First run with the smallest inertia, in restart order.
fn lowest_inertia(runs: Vec<KmeansResult>) -> Option<KmeansResult> {
    let mut best: Option<KmeansResult> = None;
    for (restart, run) in runs.into_iter().enumerate() {
        debug!(
            restart,
            inertia = run.inertia,
            iterations = run.iterations,
            "kmeans restart finished"
        );
        if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }
    best
}

fn lloyd<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    distinct: &[usize],
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> KmeansResult {
    let dim = points[0].len();
    let n = points.len();

    let mut centroids: Vec<Vec<f64>> = rand::seq::index::sample(rng, distinct.len(), k)
        .iter()
        .map(|i| points[distinct[i]].clone())
        .collect();

    let mut assignments = vec![0usize; n];
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;

        // Assignment step: assign each point to nearest centroid.
        for (i, vec) in points.iter().enumerate() {
            assignments[i] = nearest_centroid(vec, &centroids);
        }
        fill_empty_clusters(points, &mut assignments, &centroids, k);

        // Update step: recompute centroids as mean of assigned points.
        let new_centroids = mean_centroids(points, &assignments, k, dim);
        let shift = centroids
            .iter()
            .zip(new_centroids.iter())
            .map(|(old, new)| euclidean(old, new))
            .fold(0.0, f64::max);
        centroids = new_centroids;

        if shift <= tolerance {
            break;
        }
    }

    // Final assignment against the final centroids.
    for (i, vec) in points.iter().enumerate() {
        assignments[i] = nearest_centroid(vec, &centroids);
    }
    if fill_empty_clusters(points, &mut assignments, &centroids, k) {
        centroids = mean_centroids(points, &assignments, k, dim);
    }

    let inertia = points
        .iter()
        .zip(assignments.iter())
        .map(|(vec, &c)| squared_euclidean(vec, &centroids[c]))
        .sum();

    KmeansResult {
        assignments,
        centroids,
        k,
        iterations,
        inertia,
    }
}

/// Move the point farthest from its centroid (taken from a cluster with more
/// than one member) into each empty cluster. Returns whether anything moved.
fn fill_empty_clusters(
    points: &[Vec<f64>],
    assignments: &mut [usize],
    centroids: &[Vec<f64>],
    k: usize,
) -> bool {
    let mut counts = vec![0usize; k];
    for &c in assignments.iter() {
        counts[c] += 1;
    }

    let mut moved = false;
    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }
        let donor = assignments
            .iter()
            .enumerate()
            .filter(|&(_, &c)| counts[c] > 1)
            .map(|(i, &c)| (i, squared_euclidean(&points[i], &centroids[c])))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });
        if let Some((i, _)) = donor {
            counts[assignments[i]] -= 1;
            assignments[i] = empty;
            counts[empty] += 1;
            moved = true;
        }
    }
    moved
}

fn mean_centroids(points: &[Vec<f64>], assignments: &[usize], k: usize, dim: usize) -> Vec<Vec<f64>> {
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (vec, &cluster) in points.iter().zip(assignments.iter()) {
        counts[cluster] += 1;
        for (j, &val) in vec.iter().enumerate() {
            sums[cluster][j] += val;
        }
    }

    for (c, centroid) in sums.iter_mut().enumerate() {
        if counts[c] > 0 {
            let count = counts[c] as f64;
            for val in centroid.iter_mut() {
                *val /= count;
            }
        }
    }
    sums
}

/// Find the index of the nearest centroid. Ties go to the lower index.
fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

fn lexicographic(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// Squared Euclidean distance.
#[inline]
pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance.
#[inline]
pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

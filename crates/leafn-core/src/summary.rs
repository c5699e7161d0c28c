//! Per-cluster descriptions of the target: sample count, mean leaf N,
//! species richness and a density curve on a grid shared by all clusters.

use std::collections::HashSet;

use serde::Serialize;

use crate::observation::ObservationTable;
use crate::stats::{gaussian_kde, mean, silverman_bandwidth};

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    /// 0-based cluster id; reports show it 1-based.
    pub cluster: usize,
    pub n: usize,
    pub mean_leaf_n: f64,
    pub n_species: usize,
    /// Density of leaf N evaluated on the shared grid.
    pub density: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummaries {
    /// Leaf N values at which every density is evaluated.
    pub grid: Vec<f64>,
    pub clusters: Vec<ClusterSummary>,
}

impl ClusterSummaries {
    pub fn max_density(&self) -> f64 {
        self.clusters
            .iter()
            .flat_map(|c| c.density.iter().cloned())
            .fold(0.0, f64::max)
    }
}

/// Summarize leaf N within each of the `k` clusters given by `labels`.
///
/// The grid spans the whole table's leaf N range padded by three times the
/// largest per-cluster bandwidth, so every curve is drawn to its tails.
pub fn summarize_clusters(
    table: &ObservationTable,
    labels: &[usize],
    k: usize,
    grid_points: usize,
) -> ClusterSummaries {
    let mut members: Vec<Vec<f64>> = vec![Vec::new(); k];
    let mut species: Vec<HashSet<&str>> = vec![HashSet::new(); k];
    for (obs, &l) in table.rows().iter().zip(labels) {
        members[l].push(obs.leaf_n);
        species[l].insert(obs.species.as_str());
    }

    let bandwidths: Vec<f64> = members.iter().map(|m| silverman_bandwidth(m)).collect();
    let pad = 3.0 * bandwidths.iter().cloned().fold(0.0, f64::max);
    let target = table.target();
    let lo = target.iter().cloned().fold(f64::INFINITY, f64::min) - pad;
    let hi = target.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + pad;
    let grid: Vec<f64> = if grid_points < 2 || !lo.is_finite() || !hi.is_finite() {
        Vec::new()
    } else {
        let step = (hi - lo) / (grid_points - 1) as f64;
        (0..grid_points).map(|i| lo + i as f64 * step).collect()
    };

    let clusters = members
        .iter()
        .zip(&species)
        .zip(&bandwidths)
        .enumerate()
        .map(|(cluster, ((vals, sp), &bw))| ClusterSummary {
            cluster,
            n: vals.len(),
            mean_leaf_n: mean(vals),
            n_species: sp.len(),
            density: gaussian_kde(vals, &grid, bw),
        })
        .collect();

    ClusterSummaries { grid, clusters }
}

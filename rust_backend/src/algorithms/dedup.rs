//! Spatial deduplication of candidate variables within one visit.
//!
//! Candidates are grouped by detector position with a density-based
//! clustering. Each cluster is then resolved by the first matching rule:
//!
//! - any member brighter than `bright_cps`: every member is rejected as too bright
//! - `max_cluster_members` or more members: every member is rejected
//! - more than one member spread over more than `max_cluster_extent_px`:
//!   every member is rejected
//! - several members within the extent: the member with the largest
//!   `|delta_cps|` is kept, the others are duplicates of it
//! - singletons are kept
//!
//! Clustering is visit-local; candidates of different visits are never compared.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::config::DedupConfig;
use crate::core::domain::{CandidateVariable, ObjectId, RejectionReason};

/// Cluster label of a point that has too few neighbours to join a cluster.
pub const NOISE: i64 = -1;

/// Density-based clustering (DBSCAN) of 2-D points.
///
/// Two points are neighbours when their Euclidean distance is at most `eps`.
/// A point with at least `min_samples` neighbours (itself included) is a core
/// point; clusters are grown from core points in index order, so labels are
/// `0, 1, ...` in order of each cluster's lowest-index core point. Points
/// reachable from no core point get [`NOISE`].
pub fn dbscan(points: &[(f64, f64)], eps: f64, min_samples: usize) -> Vec<i64> {
    let n = points.len();
    let eps2 = eps * eps;
    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| {
                    let dx = points[i].0 - points[j].0;
                    let dy = points[i].1 - points[j].1;
                    dx * dx + dy * dy <= eps2
                })
                .collect()
        })
        .collect();
    let is_core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= min_samples).collect();

    let mut labels = vec![NOISE; n];
    let mut next_label = 0;
    for seed in 0..n {
        if labels[seed] != NOISE || !is_core[seed] {
            continue;
        }
        labels[seed] = next_label;
        let mut queue = VecDeque::from([seed]);
        while let Some(point) = queue.pop_front() {
            if !is_core[point] {
                continue;
            }
            for &nb in &neighbours[point] {
                if labels[nb] == NOISE {
                    labels[nb] = next_label;
                    queue.push_back(nb);
                }
            }
        }
        next_label += 1;
    }
    labels
}

/// Candidates that survive deduplication plus the reasons for the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupOutcome {
    pub kept: Vec<CandidateVariable>,
    pub rejections: BTreeMap<ObjectId, RejectionReason>,
}

/// Groups member indices by cluster label. Noise points become singletons.
fn group_clusters(labels: &[i64]) -> Vec<Vec<usize>> {
    let mut clusters: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    let mut singletons = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        if label == NOISE {
            singletons.push(vec![i]);
        } else {
            clusters.entry(label).or_default().push(i);
        }
    }
    clusters.into_values().chain(singletons).collect()
}

/// Diagonal of the axis-aligned bounding box of the members' pixel positions.
fn bounding_diagonal(candidates: &[CandidateVariable], members: &[usize]) -> f64 {
    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &i in members {
        let c = &candidates[i];
        x_min = x_min.min(c.xcenter);
        x_max = x_max.max(c.xcenter);
        y_min = y_min.min(c.ycenter);
        y_max = y_max.max(c.ycenter);
    }
    ((x_max - x_min).powi(2) + (y_max - y_min).powi(2)).sqrt()
}

/// Member with the largest variability amplitude; the earliest wins ties.
fn representative(candidates: &[CandidateVariable], members: &[usize]) -> usize {
    let mut best = members[0];
    for &i in &members[1..] {
        if candidates[i].delta_cps.abs() > candidates[best].delta_cps.abs() {
            best = i;
        }
    }
    best
}

/// Spatial deduplicator for one visit's candidates.
#[derive(Debug, Clone, Default)]
pub struct SpatialDeduplicator {
    config: DedupConfig,
}

impl SpatialDeduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Resolves every candidate into kept or rejected.
    ///
    /// Kept candidates preserve their input order.
    pub fn eliminate_dupes(&self, candidates: &[CandidateVariable]) -> DedupOutcome {
        let cfg = &self.config;
        let points: Vec<(f64, f64)> = candidates.iter().map(|c| (c.xcenter, c.ycenter)).collect();
        let labels = dbscan(&points, cfg.cluster_radius_px, cfg.min_cluster_size);

        let mut keep = vec![false; candidates.len()];
        let mut rejections = BTreeMap::new();
        let mut reject_all = |members: &[usize], reason: RejectionReason| {
            for &i in members {
                rejections.insert(candidates[i].object_id, reason);
            }
        };

        for members in group_clusters(&labels) {
            if members.iter().any(|&i| candidates[i].median_cps > cfg.bright_cps) {
                reject_all(&members, RejectionReason::TooBright);
            } else if members.len() >= cfg.max_cluster_members {
                reject_all(&members, RejectionReason::ClusterTooLarge);
            } else if members.len() > 1 {
                if bounding_diagonal(candidates, &members) > cfg.max_cluster_extent_px {
                    reject_all(&members, RejectionReason::ClusterTooSpread);
                    continue;
                }
                let best = representative(candidates, &members);
                keep[best] = true;
                let duplicate = RejectionReason::Duplicate {
                    representative: candidates[best].object_id,
                };
                let others: Vec<usize> = members.into_iter().filter(|&i| i != best).collect();
                reject_all(&others, duplicate);
            } else {
                keep[members[0]] = true;
            }
        }

        let kept = candidates
            .iter()
            .zip(keep)
            .filter(|(_, k)| *k)
            .map(|(c, _)| c.clone())
            .collect();
        DedupOutcome { kept, rejections }
    }
}

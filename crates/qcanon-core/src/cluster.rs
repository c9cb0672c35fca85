//! Average-linkage agglomerative clustering and medoid selection.
//!
//! Clusters start as singletons. The pair of live clusters with the
//! smallest average inter-member distance is merged repeatedly, and merging
//! stops for good once that smallest distance exceeds the threshold.
//! Inter-cluster distances are kept in a matrix updated on every merge
//! (Lance–Williams for average linkage), which is exact and `O(n³)` in the
//! worst case; per-topic question counts are small.

use crate::embedding::cosine_distance;

/// Symmetric pairwise distance matrix with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Pairwise cosine distances between unit-normalized embeddings.
    pub fn from_embeddings(embeddings: &[Vec<f32>]) -> Self {
        let n = embeddings.len();
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                // Clamp rounding noise so identical texts sit at exactly 0.
                let d = cosine_distance(&embeddings[i], &embeddings[j]).max(0.0);
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        Self { n, data }
    }

    /// Build from explicit rows. Rows must form a square matrix; only the
    /// upper triangle is read and mirrored.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n = rows.len();
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = rows[i].get(j).copied().unwrap_or(0.0);
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        Self { n, data }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }
}

/// Partition `0..n` into clusters by average-linkage merging while the
/// closest pair is within `threshold`.
///
/// Each cluster's members ascend, and clusters are ordered by their first
/// member. Ties between equally close pairs go to the lowest pair.
pub fn average_linkage(dist: &DistanceMatrix, threshold: f64) -> Vec<Vec<usize>> {
    let n = dist.len();
    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    let mut link: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| dist.get(i, j)).collect())
        .collect();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if members[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if members[j].is_none() {
                    continue;
                }
                let d = link[i][j];
                if best.map_or(true, |(_, _, bd)| d < bd) {
                    best = Some((i, j, d));
                }
            }
        }

        let Some((a, b, d)) = best else { break };
        if d > threshold {
            break;
        }

        // Merge b into a. Cluster a keeps the lower id, so ids stay equal to
        // each cluster's smallest member.
        let (Some(size_a), Some(merged)) = (
            members[a].as_ref().map(Vec::len),
            members[b].take(),
        ) else {
            break;
        };
        let size_b = merged.len();
        let total = (size_a + size_b) as f64;

        for k in 0..n {
            if k == a || k == b || members[k].is_none() {
                continue;
            }
            let updated = (size_a as f64 * link[a][k] + size_b as f64 * link[b][k]) / total;
            link[a][k] = updated;
            link[k][a] = updated;
        }

        if let Some(cluster) = members[a].as_mut() {
            cluster.extend(merged);
            cluster.sort_unstable();
        }
    }

    members.into_iter().flatten().collect()
}

/// The member with the smallest summed distance to the rest of its cluster.
/// The earliest member wins a tie. Panics on an empty slice.
pub fn medoid(cluster: &[usize], dist: &DistanceMatrix) -> usize {
    let mut best = cluster[0];
    let mut best_sum = f64::INFINITY;
    for &i in cluster {
        let sum: f64 = cluster.iter().map(|&j| dist.get(i, j)).sum();
        if sum < best_sum {
            best = i;
            best_sum = sum;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut clusters: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
        clusters.sort();
        clusters
    }

    #[test]
    fn test_medoid_minimum_distance_sum() {
        // A=0, B=1, C=2 with AB=0.1, AC=0.9, BC=0.85.
        let dist = DistanceMatrix::from_rows(&[
            vec![0.0, 0.1, 0.9],
            vec![0.1, 0.0, 0.85],
            vec![0.9, 0.85, 0.0],
        ]);
        // Sums: A=1.0, B=0.95, C=1.75.
        assert_eq!(medoid(&[0, 1, 2], &dist), 1);
    }

    #[test]
    fn test_medoid_tie_prefers_first() {
        let dist = DistanceMatrix::from_rows(&[vec![0.0, 0.2], vec![0.2, 0.0]]);
        assert_eq!(medoid(&[0, 1], &dist), 0);
    }

    #[test]
    fn test_medoid_closer_to_outlier_wins() {
        // With the outlier far from both, the closer-to-outlier point wins.
        let dist = DistanceMatrix::from_rows(&[
            vec![0.0, 0.1, 0.85],
            vec![0.1, 0.0, 0.9],
            vec![0.85, 0.9, 0.0],
        ]);
        assert_eq!(medoid(&[0, 1, 2], &dist), 0);
    }

    #[test]
    fn test_linkage_merges_close_pairs_only() {
        let dist = DistanceMatrix::from_rows(&[
            vec![0.0, 0.1, 0.9, 0.9],
            vec![0.1, 0.0, 0.9, 0.9],
            vec![0.9, 0.9, 0.0, 0.2],
            vec![0.9, 0.9, 0.2, 0.0],
        ]);
        let clusters = average_linkage(&dist, 0.55);
        assert_eq!(clusters, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_linkage_threshold_inclusive() {
        let dist = DistanceMatrix::from_rows(&[vec![0.0, 0.55], vec![0.55, 0.0]]);
        assert_eq!(average_linkage(&dist, 0.55), vec![vec![0, 1]]);
        assert_eq!(average_linkage(&dist, 0.5499), vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_linkage_uses_average_not_single() {
        // 0-1 merge at 0.1. Then d({0,1}, 2) = (0.5 + 0.7) / 2 = 0.6 > 0.55,
        // although single linkage would merge at 0.5.
        let dist = DistanceMatrix::from_rows(&[
            vec![0.0, 0.1, 0.5],
            vec![0.1, 0.0, 0.7],
            vec![0.5, 0.7, 0.0],
        ]);
        assert_eq!(average_linkage(&dist, 0.55), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_linkage_chain_merges_under_average() {
        // d({0,1}, 2) = (0.4 + 0.6) / 2 = 0.5 <= 0.55.
        let dist = DistanceMatrix::from_rows(&[
            vec![0.0, 0.1, 0.4],
            vec![0.1, 0.0, 0.6],
            vec![0.4, 0.6, 0.0],
        ]);
        assert_eq!(average_linkage(&dist, 0.55), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_linkage_interleaved_members_sorted() {
        let dist = DistanceMatrix::from_rows(&[
            vec![0.0, 0.9, 0.1],
            vec![0.9, 0.0, 0.9],
            vec![0.1, 0.9, 0.0],
        ]);
        assert_eq!(average_linkage(&dist, 0.55), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_linkage_idempotent_partition() {
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.436, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 0.3, 0.954],
        ];
        let dist = DistanceMatrix::from_embeddings(&embeddings);
        let first = sorted(average_linkage(&dist, 0.55));
        let second = sorted(average_linkage(&dist, 0.55));
        assert_eq!(first, second);
        assert_eq!(first, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_linkage_empty_and_single() {
        assert!(average_linkage(&DistanceMatrix::from_rows(&[]), 0.55).is_empty());
        let one = DistanceMatrix::from_rows(&[vec![0.0]]);
        assert_eq!(average_linkage(&one, 0.55), vec![vec![0]]);
    }

    #[test]
    fn test_from_embeddings_symmetric_zero_diagonal() {
        let dist = DistanceMatrix::from_embeddings(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(dist.get(0, 0), 0.0);
        assert!((dist.get(0, 1) - 1.0).abs() < 1e-9);
        assert_eq!(dist.get(0, 1), dist.get(1, 0));
    }
}

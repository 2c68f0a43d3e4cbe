//! Statistical outlier removal for sparse map clouds.
//!
//! For every point, the mean distance to its `mean_k` nearest neighbors is
//! computed. Points whose mean distance exceeds the global mean of those
//! values by more than `stddev_mul` standard deviations are dropped.

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::Vector3;
use serde::Deserialize;
use tracing::debug;

use super::point_cloud::PointCloud;

/// Configuration for outlier filtering.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutlierFilterConfig {
    /// Neighbors averaged per point.
    /// Default: 75
    pub mean_k: usize,

    /// Allowed deviation above the global mean, in standard deviations.
    /// Default: 0.5
    pub stddev_mul: f64,
}

impl Default for OutlierFilterConfig {
    fn default() -> Self {
        Self {
            mean_k: 75,
            stddev_mul: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatisticalOutlierFilter {
    config: OutlierFilterConfig,
}

impl StatisticalOutlierFilter {
    pub fn new(config: OutlierFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutlierFilterConfig {
        &self.config
    }

    /// Mean distance from each point to its `mean_k` nearest neighbors (or to
    /// all other points when there are fewer than that).
    pub fn mean_neighbor_distances(&self, points: &[Vector3<f32>]) -> Vec<f64> {
        // Built once, queried once per point. Unlike the mutable tree this
        // accepts any number of points sharing a coordinate.
        let coords: Vec<[f32; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
        let tree: ImmutableKdTree<f32, 3> = ImmutableKdTree::new_from_slice(&coords);

        coords
            .iter()
            .map(|q| {
                // The closest hit is the query point itself (or an exact duplicate).
                let neighbors = tree.nearest_n::<SquaredEuclidean>(q, self.config.mean_k + 1);
                let dists: Vec<f64> = neighbors
                    .iter()
                    .skip(1)
                    .map(|n| (n.distance as f64).sqrt())
                    .collect();
                if dists.is_empty() {
                    0.0
                } else {
                    dists.iter().sum::<f64>() / dists.len() as f64
                }
            })
            .collect()
    }

    /// Indices (ascending) of the points that survive the filter. Non-finite
    /// points never survive.
    pub fn inliers(&self, points: &[Vector3<f32>]) -> Vec<usize> {
        let finite: Vec<usize> = (0..points.len())
            .filter(|&i| points[i].iter().all(|v| v.is_finite()))
            .collect();
        if finite.len() < 2 || self.config.mean_k == 0 {
            return finite;
        }

        let candidates: Vec<Vector3<f32>> = finite.iter().map(|&i| points[i]).collect();
        let distances = self.mean_neighbor_distances(&candidates);

        let n = distances.len() as f64;
        let mean = distances.iter().sum::<f64>() / n;
        let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let threshold = mean + self.config.stddev_mul * variance.sqrt();

        debug!(
            "Outlier filter: mean={:.4} stddev={:.4} threshold={:.4}",
            mean,
            variance.sqrt(),
            threshold
        );

        finite
            .into_iter()
            .zip(distances)
            .filter(|(_, d)| *d <= threshold)
            .map(|(i, _)| i)
            .collect()
    }

    /// Filtered copy of `cloud` (same header, surviving points in order).
    pub fn apply(&self, cloud: &PointCloud) -> PointCloud {
        let points: Vec<Vector3<f32>> = cloud.points().collect();
        cloud.select(&self.inliers(&points))
    }
}

impl Default for StatisticalOutlierFilter {
    fn default() -> Self {
        Self::new(OutlierFilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::messages::Stamp;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit_cube(n: usize, seed: u64) -> Vec<Vector3<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| Vector3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()))
            .collect()
    }

    #[test]
    fn test_far_point_removed_cluster_kept() {
        let mut points = unit_cube(1000, 7);
        points.push(Vector3::new(1000.0, 0.0, 0.0));

        let filter = StatisticalOutlierFilter::default();
        let kept = filter.inliers(&points);

        assert_eq!(kept.len(), 1000);
        assert!(!kept.contains(&1000));
    }

    #[test]
    fn test_apply_on_cloud() {
        let mut points = unit_cube(500, 11);
        points.insert(0, Vector3::new(0.0, -800.0, 0.0));
        let cloud = PointCloud::from_points(&points, "point_cloud", Stamp::new(1, 0));

        let filtered = StatisticalOutlierFilter::default().apply(&cloud);
        assert_eq!(filtered.width, 500);
        assert_eq!(filtered.frame_id, "point_cloud");
        assert!(filtered.points().all(|p| p.y >= 0.0));
    }

    #[test]
    fn test_uniform_cluster_loses_sparse_edge_points() {
        let points = unit_cube(400, 3);
        let kept = StatisticalOutlierFilter::default().inliers(&points);
        // mean + 0.5 sigma cuts the sparsest points but keeps the bulk.
        assert!(kept.len() < 400);
        assert!(kept.len() > 200);
    }

    #[test]
    fn test_small_inputs() {
        let filter = StatisticalOutlierFilter::default();
        assert!(filter.inliers(&[]).is_empty());
        assert_eq!(filter.inliers(&[Vector3::new(1.0, 2.0, 3.0)]), vec![0]);
    }

    #[test]
    fn test_fewer_points_than_k() {
        let mut points = unit_cube(10, 5);
        points.push(Vector3::new(0.0, 0.0, 500.0));
        let kept = StatisticalOutlierFilter::default().inliers(&points);
        assert!(!kept.contains(&10));
    }

    #[test]
    fn test_identical_points_do_not_panic() {
        let mut points = vec![Vector3::new(1.5, 2.5, 0.75); 40];
        points.push(Vector3::new(800.0, 2.5, 0.75));
        let kept = StatisticalOutlierFilter::default().inliers(&points);
        assert_eq!(kept, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_coplanar_points_do_not_panic() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut points: Vec<Vector3<f32>> = (0..40)
            .map(|_| Vector3::new(2.0, rng.gen::<f32>(), rng.gen::<f32>()))
            .collect();
        points.push(Vector3::new(1000.0, 0.0, 0.0));
        let kept = StatisticalOutlierFilter::default().inliers(&points);
        assert_eq!(kept, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_non_finite_points_dropped() {
        let mut points = unit_cube(100, 9);
        points.push(Vector3::new(f32::NAN, 0.0, 0.0));
        let kept = StatisticalOutlierFilter::default().inliers(&points);
        assert!(!kept.contains(&100));
    }
}

use crate::error::{ClusteringError, Result};
use crate::metrics::{euclidean, squared_euclidean};
use crate::{Matrix, Vector};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_SEED: u64 = 42;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Init {
    /// Spread initial centroids by sampling proportional to squared distance.
    #[default]
    #[serde(rename = "k-means++")]
    KMeansPlusPlus,
    /// Distinct rows chosen uniformly at random.
    #[serde(rename = "random")]
    Random,
}

/// Soft failure: the iteration cap was reached before the assignments
/// settled. The model is still usable.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NonConvergence {
    pub k: usize,
    pub max_iter: usize,
    pub final_shift: f64,
}

impl std::fmt::Display for NonConvergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "k-means with k={} did not converge within {} iterations (last centroid shift {:.3e})",
            self.k, self.max_iter, self.final_shift
        )
    }
}

/// Result of one Lloyd's run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterModel {
    pub centroids: Matrix,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub n_iter: usize,
    pub warning: Option<NonConvergence>,
}

impl ClusterModel {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn converged(&self) -> bool {
        self.warning.is_none()
    }

    /// Number of rows assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Assigns each row of `x` to its nearest centroid.
    pub fn predict(&self, x: &Matrix) -> Result<Vec<usize>> {
        if x.ncols() != self.centroids.ncols() {
            return Err(ClusteringError::DimensionMismatch {
                expected: self.centroids.ncols(),
                actual: x.ncols(),
            });
        }
        Ok(assign(x, &self.centroids).0)
    }
}

/// Lloyd's algorithm with seeded initialization.
///
/// Empty clusters are relocated onto the row farthest from its own centroid,
/// chosen only among clusters that keep at least one other member (ties go to
/// the lowest row index), so the result is a pure function of the seed.
#[derive(Clone, Debug)]
pub struct KMeans {
    n_clusters: usize,
    max_iter: usize,
    tolerance: f64,
    random_state: u64,
    init: Init,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tolerance: 1e-4,
            random_state: DEFAULT_SEED,
            init: Init::KMeansPlusPlus,
        }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn fit(&self, x: &Matrix) -> Result<ClusterModel> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusteringError::EmptyInput);
        }
        if self.n_clusters == 0 || self.n_clusters > x.nrows() {
            return Err(ClusteringError::InvalidK {
                k: self.n_clusters,
                n_rows: x.nrows(),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut centroids = self.initialize_centroids(x, &mut rng);
        let mut labels: Vec<usize> = Vec::new();
        let mut converged = false;
        let mut shift = f64::INFINITY;
        let mut n_iter = 0;

        for iteration in 1..=self.max_iter {
            n_iter = iteration;

            let (mut new_labels, distances) = assign(x, &centroids);
            let changed = if labels.is_empty() {
                x.nrows()
            } else {
                labels.iter().zip(&new_labels).filter(|(a, b)| a != b).count()
            };

            let new_centroids = self.update_centroids(x, &mut new_labels, &distances, &centroids);
            shift = self.max_centroid_shift(&centroids, &new_centroids);
            centroids = new_centroids;
            labels = new_labels;

            if changed == 0 || shift <= self.tolerance {
                converged = true;
                break;
            }
        }

        let (labels, distances) = assign(x, &centroids);
        let inertia = distances.sum();

        let warning = if converged {
            debug!(k = self.n_clusters, n_iter, inertia, "k-means converged");
            None
        } else {
            let warning = NonConvergence {
                k: self.n_clusters,
                max_iter: self.max_iter,
                final_shift: shift,
            };
            warn!("{}", warning);
            Some(warning)
        };

        Ok(ClusterModel {
            centroids,
            labels,
            inertia,
            n_iter,
            warning,
        })
    }

    fn initialize_centroids(&self, x: &Matrix, rng: &mut ChaCha8Rng) -> Matrix {
        let n = x.nrows();
        let mut centroids = Matrix::zeros((self.n_clusters, x.ncols()));

        match self.init {
            Init::Random => {
                let indices = rand::seq::index::sample(rng, n, self.n_clusters);
                for (k, idx) in indices.iter().enumerate() {
                    centroids.row_mut(k).assign(&x.row(idx));
                }
            }
            Init::KMeansPlusPlus => {
                let first_idx = rng.gen_range(0..n);
                centroids.row_mut(0).assign(&x.row(first_idx));

                let mut closest = Vector::from_shape_fn(n, |i| {
                    squared_euclidean(&x.row(i), &centroids.row(0))
                });

                for k in 1..self.n_clusters {
                    // all-zero weights mean every row already sits on a centroid
                    let idx = match WeightedIndex::<f64>::new(closest.iter()) {
                        Ok(dist) => dist.sample(rng),
                        Err(_) => rng.gen_range(0..n),
                    };
                    centroids.row_mut(k).assign(&x.row(idx));

                    for i in 0..n {
                        let d = squared_euclidean(&x.row(i), &centroids.row(k));
                        if d < closest[i] {
                            closest[i] = d;
                        }
                    }
                }
            }
        }

        centroids
    }

    fn update_centroids(
        &self,
        x: &Matrix,
        labels: &mut [usize],
        distances: &Vector,
        previous: &Matrix,
    ) -> Matrix {
        let mut sums = Matrix::zeros(previous.raw_dim());
        let mut counts = vec![0usize; self.n_clusters];
        for (row, &label) in x.outer_iter().zip(labels.iter()) {
            let mut sum = sums.row_mut(label);
            sum += &row;
            counts[label] += 1;
        }

        let mut distances = distances.clone();
        for k in 0..self.n_clusters {
            if counts[k] > 0 {
                continue;
            }
            let candidate = (0..x.nrows())
                .filter(|&i| counts[labels[i]] > 1)
                .fold(None, |best: Option<usize>, i| match best {
                    Some(b) if distances[b] >= distances[i] => Some(b),
                    _ => Some(i),
                });

            match candidate {
                Some(i) => {
                    debug!(cluster = k, row = i, "relocating empty cluster");
                    let donor = labels[i];
                    let mut donor_sum = sums.row_mut(donor);
                    donor_sum -= &x.row(i);
                    counts[donor] -= 1;

                    sums.row_mut(k).assign(&x.row(i));
                    counts[k] = 1;
                    labels[i] = k;
                    distances[i] = 0.0;
                }
                None => debug!(cluster = k, "empty cluster kept at previous centroid"),
            }
        }

        let mut centroids = previous.clone();
        for k in 0..self.n_clusters {
            if counts[k] > 0 {
                let mean = &sums.row(k) / counts[k] as f64;
                centroids.row_mut(k).assign(&mean);
            }
        }
        centroids
    }

    fn max_centroid_shift(&self, old_centroids: &Matrix, new_centroids: &Matrix) -> f64 {
        old_centroids
            .outer_iter()
            .zip(new_centroids.outer_iter())
            .map(|(old, new)| euclidean(&old, &new))
            .fold(0.0, f64::max)
    }
}

/// Shorthand for `KMeans::new(k).random_state(seed).fit(x)`.
pub fn cluster(x: &Matrix, k: usize, seed: u64) -> Result<ClusterModel> {
    KMeans::new(k).random_state(seed).fit(x)
}

/// Nearest centroid per row (ties go to the lowest index) and the squared
/// distance to it.
fn assign(x: &Matrix, centroids: &Matrix) -> (Vec<usize>, Vector) {
    let mut labels = vec![0; x.nrows()];
    let mut distances = Vector::zeros(x.nrows());

    for (i, row) in x.outer_iter().enumerate() {
        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (k, centroid) in centroids.outer_iter().enumerate() {
            let distance = squared_euclidean(&row, &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = k;
            }
        }

        labels[i] = closest_cluster;
        distances[i] = min_distance;
    }

    (labels, distances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::total_sum_of_squares;
    use ndarray::array;
    use std::collections::HashSet;

    fn two_blobs() -> Matrix {
        array![
            [0.0, 0.0],
            [0.1, -0.1],
            [-0.1, 0.1],
            [10.0, 10.0],
            [10.1, 9.9],
            [9.9, 10.1]
        ]
    }

    #[test]
    fn test_kmeans_basic() {
        let x = array![
            [1.0, 1.0],
            [1.5, 2.0],
            [3.0, 4.0],
            [5.0, 7.0],
            [3.5, 5.0],
            [4.5, 5.0],
            [3.5, 4.5]
        ];

        let model = KMeans::new(2).fit(&x).unwrap();

        assert_eq!(model.labels.len(), x.nrows());
        assert_eq!(model.centroids.shape(), &[2, 2]);

        let unique_labels: HashSet<usize> = model.labels.iter().copied().collect();
        assert_eq!(unique_labels.len(), 2);
    }

    #[test]
    fn test_two_obvious_groups() {
        let x = two_blobs();
        let model = cluster(&x, 2, 42).unwrap();

        let first = model.labels[0];
        assert!(model.labels[..3].iter().all(|&l| l == first));
        assert!(model.labels[3..].iter().all(|&l| l != first));
        // three points at distance^2 0.02 around each centre
        assert!(model.inertia < 0.1);
        assert!(model.converged());
    }

    #[test]
    fn test_deterministic_for_seed() {
        let x = array![
            [1.0, 2.0],
            [1.5, 1.8],
            [5.0, 8.0],
            [8.0, 8.0],
            [1.0, 0.6],
            [9.0, 11.0],
            [8.0, 2.0],
            [10.0, 2.0],
            [9.0, 3.0]
        ];

        for k in 1..=5 {
            for init in [Init::KMeansPlusPlus, Init::Random] {
                let a = KMeans::new(k).random_state(7).init(init).fit(&x).unwrap();
                let b = KMeans::new(k).random_state(7).init(init).fit(&x).unwrap();
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_single_cluster_inertia_is_total_sum_of_squares() {
        let x = array![[1.0, 2.0], [3.0, 5.0], [4.0, -1.0], [0.0, 0.0]];
        let model = cluster(&x, 1, 0).unwrap();

        assert!(model.labels.iter().all(|&l| l == 0));
        let tss = total_sum_of_squares(&x).unwrap();
        assert!((model.inertia - tss).abs() < 1e-10);
    }

    #[test]
    fn test_labels_in_range_and_all_used() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];

        for k in 1..=x.nrows() {
            let model = cluster(&x, k, 3).unwrap();
            assert_eq!(model.labels.len(), x.nrows());
            assert!(model.labels.iter().all(|&l| l < k));
            assert!(model.cluster_sizes().iter().all(|&s| s > 0), "k={}", k);
            assert!(model.inertia >= 0.0);
        }
    }

    #[test]
    fn test_k_equal_rows_has_zero_inertia() {
        let x = array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]];
        let model = cluster(&x, 3, 11).unwrap();
        assert!(model.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let x = array![[1.0]];
        let centroids = array![[0.0], [2.0]];
        let (labels, distances) = assign(&x, &centroids);
        assert_eq!(labels, vec![0]);
        assert!((distances[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_k() {
        let x = array![[1.0, 2.0]];

        assert!(matches!(
            KMeans::new(2).fit(&x),
            Err(ClusteringError::InvalidK { k: 2, n_rows: 1 })
        ));
        assert!(matches!(
            KMeans::new(0).fit(&x),
            Err(ClusteringError::InvalidK { k: 0, n_rows: 1 })
        ));
    }

    #[test]
    fn test_empty_input() {
        let x = Matrix::zeros((0, 2));
        assert!(matches!(KMeans::new(1).fit(&x), Err(ClusteringError::EmptyInput)));
    }

    #[test]
    fn test_iteration_cap_reports_warning() {
        let x = array![
            [0.0, 0.0],
            [0.5, 0.2],
            [3.0, 3.5],
            [3.2, 2.9],
            [7.0, 0.1],
            [6.5, 0.4],
            [1.0, 6.0],
            [1.4, 6.3]
        ];
        let model = KMeans::new(4).max_iter(1).tolerance(0.0).fit(&x).unwrap();

        // a single iteration cannot observe an unchanged assignment
        let warning = model.warning.expect("expected non-convergence warning");
        assert_eq!(warning.k, 4);
        assert_eq!(warning.max_iter, 1);
        assert_eq!(model.labels.len(), 8);
    }

    #[test]
    fn test_predict() {
        let x = two_blobs();
        let model = cluster(&x, 2, 42).unwrap();

        let labels = model.predict(&array![[0.5, 0.5], [10.5, 10.5]]).unwrap();
        assert_eq!(labels[0], model.labels[0]);
        assert_eq!(labels[1], model.labels[3]);
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let model = cluster(&two_blobs(), 2, 42).unwrap();
        assert!(model.predict(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_empty_cluster_takes_farthest_row() {
        let x = array![[0.0], [1.0], [10.0], [11.0], [12.0]];
        let mut labels = vec![0, 0, 1, 1, 1];
        // rows 2 and 4 tie for farthest; the lower index wins
        let distances = array![0.25, 0.25, 1.0, 0.0, 1.0];
        let previous = array![[0.5], [11.0], [100.0]];

        let centroids = KMeans::new(3).update_centroids(&x, &mut labels, &distances, &previous);

        assert_eq!(labels, vec![0, 0, 2, 1, 1]);
        assert_eq!(centroids, array![[0.5], [11.5], [10.0]]);
    }

    #[test]
    fn test_empty_cluster_never_empties_a_singleton() {
        let x = array![[0.0], [5.0]];
        let mut labels = vec![0, 1];
        let distances = array![3.0, 4.0];
        let previous = array![[1.0], [4.0], [99.0]];

        let centroids = KMeans::new(3).update_centroids(&x, &mut labels, &distances, &previous);

        assert_eq!(labels, vec![0, 1]);
        assert_eq!(centroids, array![[0.0], [5.0], [99.0]]);
    }

    #[test]
    fn test_two_empty_clusters_take_distinct_rows() {
        let x = array![[0.0], [1.0], [2.0], [9.0]];
        let mut labels = vec![0, 0, 0, 0];
        let distances = array![9.0, 4.0, 1.0, 16.0];
        let previous = array![[3.0], [50.0], [60.0]];

        let centroids = KMeans::new(3).update_centroids(&x, &mut labels, &distances, &previous);

        assert_eq!(labels, vec![2, 0, 0, 1]);
        assert_eq!(centroids, array![[1.5], [9.0], [0.0]]);
    }

    #[test]
    fn test_duplicate_rows_keep_every_label_valid() {
        let x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [5.0, 5.0]];
        let model = cluster(&x, 3, 5).unwrap();

        assert!(model.labels.iter().all(|&l| l < 3));
        assert!(model.inertia.abs() < 1e-12);
    }
}

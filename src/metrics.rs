use crate::error::{ClusteringError, Result};
use crate::{Matrix, Vector};
use ndarray::{ArrayView1, Axis};

pub fn squared_euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

pub fn euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Sum of squared distances from each row to the centroid of its label.
pub fn inertia(x: &Matrix, centroids: &Matrix, labels: &[usize]) -> Result<f64> {
    if x.nrows() != labels.len() {
        return Err(ClusteringError::DimensionMismatch {
            expected: x.nrows(),
            actual: labels.len(),
        });
    }
    if x.ncols() != centroids.ncols() {
        return Err(ClusteringError::DimensionMismatch {
            expected: centroids.ncols(),
            actual: x.ncols(),
        });
    }

    let mut total = 0.0;
    for (row, &label) in x.outer_iter().zip(labels) {
        if label >= centroids.nrows() {
            return Err(ClusteringError::InvalidLabel {
                label,
                n_clusters: centroids.nrows(),
            });
        }
        total += squared_euclidean(&row, &centroids.row(label));
    }
    Ok(total)
}

/// Sum of squared distances from each row to the global mean, i.e. the
/// inertia of a single cluster.
pub fn total_sum_of_squares(x: &Matrix) -> Result<f64> {
    let mean: Vector = x.mean_axis(Axis(0)).ok_or(ClusteringError::EmptyInput)?;
    Ok(x.outer_iter()
        .map(|row| squared_euclidean(&row, &mean.view()))
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_squared_euclidean() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];

        assert!((squared_euclidean(&a.view(), &b.view()) - 25.0).abs() < 1e-10);
        assert!((euclidean(&a.view(), &b.view()) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_inertia() {
        let x = array![[0.0, 0.0], [2.0, 0.0], [10.0, 10.0]];
        let centroids = array![[1.0, 0.0], [10.0, 10.0]];

        let value = inertia(&x, &centroids, &[0, 0, 1]).unwrap();
        assert!((value - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_inertia_label_out_of_range() {
        let x = array![[0.0], [1.0]];
        let centroids = array![[0.5]];

        assert!(matches!(
            inertia(&x, &centroids, &[0, 1]),
            Err(ClusteringError::InvalidLabel { label: 1, n_clusters: 1 })
        ));
    }

    #[test]
    fn test_total_sum_of_squares() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        // mean (3, 4): 8 + 0 + 8
        let tss = total_sum_of_squares(&x).unwrap();
        assert!((tss - 16.0).abs() < 1e-10);
    }
}

use crate::error::{ClusteringError, Result};
use crate::preprocessing::FeatureMatrix;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterStats {
    pub count: usize,
    pub means: Vec<f64>,
}

/// Per-cluster means of selected columns, keyed by cluster label.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterSummary {
    columns: Vec<String>,
    clusters: BTreeMap<usize, ClusterStats>,
}

impl ClusterSummary {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn clusters(&self) -> &BTreeMap<usize, ClusterStats> {
        &self.clusters
    }

    pub fn mean(&self, label: usize, column: &str) -> Option<f64> {
        let j = self.columns.iter().position(|c| c == column)?;
        self.clusters.get(&label).map(|stats| stats.means[j])
    }

    pub fn count(&self, label: usize) -> Option<usize> {
        self.clusters.get(&label).map(|stats| stats.count)
    }
}

impl fmt::Display for ClusterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self.columns.iter().map(|c| c.len().max(10)).collect();

        write!(f, "{:>5} {:>5}", "label", "n")?;
        for (column, &width) in self.columns.iter().zip(&widths) {
            write!(f, " {:>width$}", column, width = width)?;
        }
        writeln!(f)?;

        for (label, stats) in &self.clusters {
            write!(f, "{:>5} {:>5}", label, stats.count)?;
            for (mean, &width) in stats.means.iter().zip(&widths) {
                write!(f, " {:>width$.3}", mean, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Groups rows of `x` by label and averages the named columns.
///
/// Every label in `0..n_clusters` must own at least one row.
pub fn summarize(
    x: &FeatureMatrix,
    labels: &[usize],
    n_clusters: usize,
    columns: &[&str],
) -> Result<ClusterSummary> {
    if labels.len() != x.nrows() {
        return Err(ClusteringError::DimensionMismatch {
            expected: x.nrows(),
            actual: labels.len(),
        });
    }
    let selected = x.select(columns)?;

    let mut sums = vec![vec![0.0; columns.len()]; n_clusters];
    let mut counts = vec![0usize; n_clusters];
    for (row, &label) in selected.data().outer_iter().zip(labels) {
        if label >= n_clusters {
            return Err(ClusteringError::InvalidLabel { label, n_clusters });
        }
        counts[label] += 1;
        for (sum, v) in sums[label].iter_mut().zip(row.iter()) {
            *sum += v;
        }
    }

    let mut clusters = BTreeMap::new();
    for (label, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
        if count == 0 {
            return Err(ClusteringError::EmptyCluster { label });
        }
        let means = sum.into_iter().map(|s| s / count as f64).collect();
        clusters.insert(label, ClusterStats { count, means });
    }

    Ok(ClusterSummary {
        columns: selected.columns().to_vec(),
        clusters,
    })
}

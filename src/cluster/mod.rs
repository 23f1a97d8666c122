//! Centroid clustering and model selection.
//!
//! This module provides:
//! - `KMeans`: Lloyd's algorithm with seeded k-means++ or random init
//! - `ElbowSweep`: inertia across a range of K for elbow inspection
//! - `KneeDetector`: optional automatic K selection from an inertia curve
//!
//! # Examples
//!
//! ## K-Means Clustering
//! ```rust
//! use penguin_clusters::{KMeans, Matrix};
//! use ndarray::array;
//!
//! let x = array![
//!     [1.0, 1.0],
//!     [1.5, 2.0],
//!     [3.0, 4.0],
//!     [5.0, 7.0],
//!     [3.5, 5.0],
//!     [4.5, 5.0]
//! ];
//!
//! let model = KMeans::new(2).max_iter(100).random_state(42).fit(&x).unwrap();
//!
//! println!("Cluster centers: {:?}", model.centroids);
//! println!("Inertia: {:.4}", model.inertia);
//! assert!(model.labels.iter().all(|&l| l < 2));
//! ```
//!
//! ## Elbow Sweep
//! ```rust
//! use penguin_clusters::{ElbowSweep, MaxSecondDifference};
//! use ndarray::array;
//!
//! let x = array![[0.0], [0.2], [5.0], [5.1], [9.8], [10.0]];
//!
//! let curve = ElbowSweep::new(1..=5).random_state(42).sweep(&x).unwrap();
//! for point in curve.points() {
//!     println!("k={} inertia={:.3}", point.k, point.inertia);
//! }
//! let suggested = curve.select(&MaxSecondDifference);
//! assert!(suggested.is_some());
//! ```

mod elbow;
mod kmeans;

pub use elbow::{ElbowSweep, InertiaCurve, InertiaPoint, KneeDetector, MaxSecondDifference};
pub use kmeans::{ClusterModel, DEFAULT_SEED, Init, KMeans, NonConvergence, cluster};

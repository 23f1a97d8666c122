//! Feature preparation: categorical encoding and standardization.
//!
//! - `OneHotEncoder`: expands categorical fields into indicator columns
//! - `StandardScaler` / `ScalerState`: z-score normalization per column
//! - `FeatureMatrix`: numeric matrix with named columns
//!
//! # Examples
//!
//! ```rust
//! use penguin_clusters::{Dataset, OneHotEncoder, Record, Schema, StandardScaler};
//! use penguin_clusters::dataset::Field;
//!
//! let schema = Schema::new(vec![Field::numeric("mass"), Field::categorical("sex")]).unwrap();
//! let dataset = Dataset::new(schema, vec![
//!     Record::new().numeric("mass", 3750.0).categorical("sex", "MALE"),
//!     Record::new().numeric("mass", 3200.0).categorical("sex", "FEMALE"),
//! ]);
//!
//! let encoded = OneHotEncoder::new().fit_transform(&dataset).unwrap();
//! assert_eq!(encoded.columns(), &["mass", "sex_FEMALE", "sex_MALE"]);
//!
//! let scaled = StandardScaler::new().fit_transform(&encoded).unwrap();
//! assert!(scaled.column("mass").unwrap().sum().abs() < 1e-10);
//! ```

mod encoder;
mod matrix;
mod scaler;

pub use encoder::OneHotEncoder;
pub use matrix::FeatureMatrix;
pub use scaler::{ScalerState, StandardScaler};

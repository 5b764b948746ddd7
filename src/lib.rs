//! A k-nearest-neighbors classifier over a fixed, labeled reference dataset.
//!
//! ```
//! use knn_classifier::{NearestNeighborClassifier, sample_points};
//!
//! let classifier = NearestNeighborClassifier::new(sample_points()).unwrap();
//! let result = classifier.classify(&[1.0, 1.0], 3).unwrap();
//! assert_eq!(result.label, "A");
//! assert_eq!(result.votes, 2);
//! ```

pub mod common_types;
pub mod error;
pub mod knn;

#[cfg(feature = "python")]
mod python;

pub use common_types::{LabeledPoint, ReferenceDataset, sample_points};
pub use error::{ConfigurationError, InvalidArgument};
pub use knn::{
    ClassificationResult, ClassifierConfig, NearestNeighborClassifier, Neighbor, SearchStrategy,
    euclidean_distance,
};

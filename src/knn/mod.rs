//! The k-nearest-neighbors classifier.

pub mod heap_utils;

use std::collections::HashMap;
use std::hash::Hash;

use num_traits::{AsPrimitive, Float};
use ordered_float::OrderedFloat;

use crate::common_types::{LabeledPoint, ReferenceDataset};
use crate::error::{ConfigurationError, InvalidArgument};
use heap_utils::KBestNeighbors;

/// Defines how the k nearest points are selected. Every strategy yields the
/// same neighbors in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchStrategy {
    /// Pick per call from the dataset size and `k`.
    #[default]
    Auto,
    /// Stable sort of every point by distance.
    FullSort,
    /// Bounded heap of the `k` best points.
    PartialSelection,
}

/// Tunables for a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassifierConfig {
    pub strategy: SearchStrategy,
}

/// A reference point ranked against a query.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Neighbor {
    /// Insertion position in the reference dataset.
    pub index: usize,
    pub distance: f64,
}

/// The winning label and how many of the k neighbors voted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassificationResult<L> {
    pub label: L,
    pub votes: usize,
}

/// Euclidean distance between two equal-length feature slices.
///
/// Coordinates are widened to `f64` before subtracting. When the plain sum of
/// squares overflows or underflows, the differences are rescaled by their
/// largest magnitude so distinct finite distances stay distinct.
pub fn euclidean_distance<F>(a: &[F], b: &[F]) -> f64
where
    F: Float + AsPrimitive<f64>,
{
    let sum_sq: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x.as_() - y.as_();
            diff * diff
        })
        .sum();
    if sum_sq.is_normal() || (sum_sq == 0.0 && a.iter().zip(b.iter()).all(|(x, y)| x == y)) {
        return sum_sq.sqrt();
    }
    scaled_euclidean_distance(a, b)
}

fn scaled_euclidean_distance<F>(a: &[F], b: &[F]) -> f64
where
    F: Float + AsPrimitive<f64>,
{
    let mut factor = 1.0;
    let mut diffs: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x.as_() - y.as_()).collect();
    if diffs.iter().any(|d| d.is_infinite()) {
        // Halved coordinates keep the difference of two finite values finite.
        factor = 2.0;
        diffs = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| x.as_() * 0.5 - y.as_() * 0.5)
            .collect();
    }

    let scale = diffs.iter().fold(0.0_f64, |max, d| max.max(d.abs()));
    if scale == 0.0 {
        return 0.0;
    }
    let sum_sq: f64 = diffs
        .iter()
        .map(|d| {
            let r = d / scale;
            r * r
        })
        .sum();
    factor * scale * sum_sq.sqrt()
}

/// Majority vote over labels given nearest first. `labels` must not be empty.
///
/// Ties on the top count go to the label that occurs first in `labels`.
fn majority_vote<'a, L: Eq + Hash>(labels: &[&'a L]) -> (&'a L, usize) {
    let mut label_counts: HashMap<&L, usize> = HashMap::new();
    for label in labels {
        *label_counts.entry(*label).or_insert(0) += 1;
    }

    let mut winner = (labels[0], 0);
    for label in labels {
        let count = label_counts[label];
        if count > winner.1 {
            winner = (*label, count);
        }
    }
    winner
}

/// The K-Nearest Neighbors Classifier over a fixed reference dataset.
#[derive(Debug, Clone)]
pub struct NearestNeighborClassifier<F, L> {
    dataset: ReferenceDataset<F, L>,
    config: ClassifierConfig,
}

impl<F, L> NearestNeighborClassifier<F, L> {
    // Auto picks partial selection at or above this size when k <= len / 8.
    pub const PARTIAL_SELECTION_MIN_POINTS: usize = 1000;
    pub const PARTIAL_SELECTION_MAX_K_RATIO: usize = 8;
}

impl<F, L> NearestNeighborClassifier<F, L>
where
    F: Float + AsPrimitive<f64>,
    L: Clone + Eq + Hash,
{
    /// Validates `points` into a reference dataset and wraps it with the default config.
    pub fn new(points: Vec<LabeledPoint<F, L>>) -> Result<Self, ConfigurationError> {
        match ReferenceDataset::new(points) {
            Ok(dataset) => Ok(Self::from_dataset(dataset)),
            Err(err) => {
                tracing::warn!("rejected reference dataset: {err}");
                Err(err)
            }
        }
    }

    pub fn from_dataset(dataset: ReferenceDataset<F, L>) -> Self {
        Self::with_config(dataset, ClassifierConfig::default())
    }

    pub fn with_config(dataset: ReferenceDataset<F, L>, config: ClassifierConfig) -> Self {
        tracing::debug!(
            points = dataset.len(),
            dimensions = dataset.dimensions(),
            strategy = ?config.strategy,
            "built nearest neighbor classifier"
        );
        Self { dataset, config }
    }

    pub fn dataset(&self) -> &ReferenceDataset<F, L> {
        &self.dataset
    }

    pub fn config(&self) -> ClassifierConfig {
        self.config
    }

    /// Returns the strategy a query with this `k` will actually run.
    pub fn resolve_strategy(&self, k: usize) -> SearchStrategy {
        match self.config.strategy {
            SearchStrategy::Auto => {
                let n = self.dataset.len();
                if n >= Self::PARTIAL_SELECTION_MIN_POINTS
                    && k <= n / Self::PARTIAL_SELECTION_MAX_K_RATIO
                {
                    SearchStrategy::PartialSelection
                } else {
                    SearchStrategy::FullSort
                }
            }
            fixed => fixed,
        }
    }

    fn validate(&self, query: &[F], k: usize) -> Result<(), InvalidArgument> {
        let expected = self.dataset.dimensions();
        if query.len() != expected {
            return Err(InvalidArgument::QueryDimensionality {
                expected,
                found: query.len(),
            });
        }
        if let Some(position) = query.iter().position(|x| !x.is_finite()) {
            return Err(InvalidArgument::NonFiniteQuery { position });
        }
        let size = self.dataset.len();
        if k == 0 || k > size {
            return Err(InvalidArgument::KOutOfRange { k, size });
        }
        Ok(())
    }

    /// Returns the `k` nearest reference points, nearest first.
    ///
    /// Points at equal distance keep their insertion order.
    pub fn k_nearest(&self, query: &[F], k: usize) -> Result<Vec<Neighbor>, InvalidArgument> {
        self.validate(query, k)?;
        Ok(self.rank_neighbors(query, k, self.resolve_strategy(k)))
    }

    fn rank_neighbors(&self, query: &[F], k: usize, strategy: SearchStrategy) -> Vec<Neighbor> {
        let distances = self
            .dataset
            .points()
            .iter()
            .enumerate()
            .map(|(index, point)| Neighbor {
                index,
                distance: euclidean_distance(query, &point.features),
            });

        match strategy {
            SearchStrategy::PartialSelection => {
                let mut best = KBestNeighbors::new(k);
                for neighbor in distances {
                    best.add(neighbor.distance, neighbor.index, neighbor);
                }
                best.into_sorted_points()
            }
            SearchStrategy::FullSort | SearchStrategy::Auto => {
                let mut ranked: Vec<Neighbor> = distances.collect();
                // sort_by is stable
                ranked.sort_by(|a, b| OrderedFloat(a.distance).cmp(&OrderedFloat(b.distance)));
                ranked.truncate(k);
                ranked
            }
        }
    }

    /// Classifies `query` by majority vote among its `k` nearest reference points.
    ///
    /// When several labels share the top count, the one appearing first in
    /// nearest-to-farthest order wins.
    ///
    /// # Errors
    /// `InvalidArgument` if the query's dimensionality differs from the
    /// dataset's, a coordinate is not finite, or `k` is not in `[1, len]`.
    pub fn classify(&self, query: &[F], k: usize) -> Result<ClassificationResult<L>, InvalidArgument> {
        let neighbors = self.k_nearest(query, k)?;

        // k_nearest returned k >= 1 neighbors, each a valid dataset index.
        let points = self.dataset.points();
        let labels: Vec<&L> = neighbors.iter().map(|n| &points[n.index].label).collect();
        let (label, votes) = majority_vote(&labels);

        tracing::debug!(k, strategy = ?self.resolve_strategy(k), votes, "classified query");
        Ok(ClassificationResult {
            label: label.clone(),
            votes,
        })
    }

    /// Classifies each query in order, stopping at the first invalid one.
    pub fn classify_batch<Q>(&self, queries: &[Q], k: usize) -> Result<Vec<ClassificationResult<L>>, InvalidArgument>
    where
        Q: AsRef<[F]>,
    {
        queries.iter().map(|q| self.classify(q.as_ref(), k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_types::sample_points;

    fn sample_classifier() -> NearestNeighborClassifier<f64, &'static str> {
        NearestNeighborClassifier::new(sample_points()).unwrap()
    }

    fn with_strategy<L: Clone + Eq + Hash>(
        points: Vec<LabeledPoint<f64, L>>,
        strategy: SearchStrategy,
    ) -> NearestNeighborClassifier<f64, L> {
        let dataset = ReferenceDataset::new(points).unwrap();
        NearestNeighborClassifier::with_config(dataset, ClassifierConfig { strategy })
    }

    #[test]
    fn test_euclidean_distance() {
        let epsilon = 1e-12;
        let d = euclidean_distance(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert!((d - 27.0_f64.sqrt()).abs() < epsilon, "got {}", d);
        assert_eq!(euclidean_distance(&[0.5_f32], &[0.5_f32]), 0.0);
        assert_eq!(euclidean_distance::<f64>(&[], &[]), 0.0);
    }

    #[test]
    fn test_euclidean_distance_extreme_magnitudes() {
        let big = euclidean_distance(&[1e300, 1e300], &[0.0, 0.0]);
        assert!(big.is_finite());
        assert!((big / 1e300 - 2.0_f64.sqrt()).abs() < 1e-12, "got {}", big);

        let tiny = euclidean_distance(&[3e-200, 4e-200], &[0.0, 0.0]);
        assert!((tiny / 5e-200 - 1.0).abs() < 1e-12, "got {}", tiny);

        // f32 difference 6e38 only fits once widened.
        let wide = euclidean_distance(&[3e38_f32], &[-3e38_f32]);
        assert!((wide / 6e38 - 1.0).abs() < 1e-6, "got {}", wide);

        // The f64 difference itself overflows.
        let edge = euclidean_distance(&[f64::MAX], &[-f64::MAX]);
        assert!(edge.is_infinite());
        let half = euclidean_distance(&[f64::MAX / 2.0], &[-f64::MAX / 4.0]);
        assert!((half / (f64::MAX * 0.75) - 1.0).abs() < 1e-12, "got {}", half);
    }

    #[test]
    fn test_extreme_coordinates_pick_true_nearest() {
        for strategy in [SearchStrategy::FullSort, SearchStrategy::PartialSelection] {
            let points = vec![
                LabeledPoint::new(vec![1e300, 1e300], "far"),
                LabeledPoint::new(vec![1e200, 1e200], "near"),
            ];
            let classifier = with_strategy(points, strategy);
            let nearest = classifier.k_nearest(&[0.0, 0.0], 2).unwrap();
            assert!(nearest.iter().all(|n| n.distance.is_finite()));
            assert_eq!(classifier.classify(&[0.0, 0.0], 1).unwrap().label, "near");
        }

        let dataset = ReferenceDataset::new(vec![
            LabeledPoint::new(vec![3e38_f32], "far"),
            LabeledPoint::new(vec![2e38_f32], "near"),
        ])
        .unwrap();
        let classifier = NearestNeighborClassifier::from_dataset(dataset);
        assert_eq!(classifier.classify(&[-3e38], 1).unwrap().label, "near");
    }

    #[test]
    fn test_majority_vote_prefers_earliest_label_on_tie() {
        let (a, b, c) = ("a", "b", "c");
        assert_eq!(majority_vote(&[&b, &a, &a, &b]), (&b, 2));
        assert_eq!(majority_vote(&[&c, &a, &a]), (&a, 2));
        assert_eq!(majority_vote(&[&c]), (&c, 1));
    }

    #[test]
    fn test_sample_k3_votes_a_twice() {
        let result = sample_classifier().classify(&[1.0, 1.0], 3).unwrap();
        assert_eq!(result, ClassificationResult { label: "A", votes: 2 });
    }

    #[test]
    fn test_sample_k1_picks_closest_b() {
        let classifier = sample_classifier();
        let result = classifier.classify(&[0.1, 0.1], 1).unwrap();
        assert_eq!(result, ClassificationResult { label: "B", votes: 1 });

        let nearest = classifier.k_nearest(&[0.1, 0.1], 1).unwrap();
        assert_eq!(nearest[0].index, 3);
        assert!((nearest[0].distance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_k_nearest_orders_by_distance() {
        let nearest = sample_classifier().k_nearest(&[1.0, 1.0], 4).unwrap();
        let order: Vec<usize> = nearest.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![1, 0, 3, 2]);
        assert!(nearest.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_k_equal_to_size_breaks_vote_tie_by_nearest_label() {
        let classifier = sample_classifier();
        // 2 A vs 2 B: nearest point decides.
        assert_eq!(
            classifier.classify(&[1.0, 1.0], 4).unwrap(),
            ClassificationResult { label: "A", votes: 2 }
        );
        assert_eq!(
            classifier.classify(&[0.0, 0.0], 4).unwrap(),
            ClassificationResult { label: "B", votes: 2 }
        );
    }

    #[test]
    fn test_k_equal_to_size_returns_overall_majority() {
        let points = vec![
            LabeledPoint::new(vec![0.0], 1),
            LabeledPoint::new(vec![10.0], 2),
            LabeledPoint::new(vec![11.0], 2),
        ];
        let classifier = NearestNeighborClassifier::new(points).unwrap();
        let result = classifier.classify(&[0.0], 3).unwrap();
        assert_eq!(result, ClassificationResult { label: 2, votes: 2 });
    }

    #[test]
    fn test_equidistant_points_keep_insertion_order() {
        for strategy in [SearchStrategy::FullSort, SearchStrategy::PartialSelection] {
            let points = vec![
                LabeledPoint::new(vec![1.0, 0.0], "X"),
                LabeledPoint::new(vec![-1.0, 0.0], "Y"),
                LabeledPoint::new(vec![5.0, 5.0], "Z"),
            ];
            let classifier = with_strategy(points, strategy);
            assert_eq!(classifier.classify(&[0.0, 0.0], 1).unwrap().label, "X");

            let points = vec![
                LabeledPoint::new(vec![-1.0, 0.0], "Y"),
                LabeledPoint::new(vec![1.0, 0.0], "X"),
                LabeledPoint::new(vec![5.0, 5.0], "Z"),
            ];
            let classifier = with_strategy(points, strategy);
            assert_eq!(classifier.classify(&[0.0, 0.0], 1).unwrap().label, "Y");
        }
    }

    #[test]
    fn test_equidistant_tie_for_kth_slot_decides_vote() {
        // B and C are both at distance 1; only one fits next to A when k = 2,
        // and the earlier one (B) must be chosen. The vote is then 1-1 and A,
        // the nearest, wins.
        for strategy in [SearchStrategy::FullSort, SearchStrategy::PartialSelection] {
            let points = vec![
                LabeledPoint::new(vec![0.0, 0.0], "A"),
                LabeledPoint::new(vec![0.0, 1.0], "B"),
                LabeledPoint::new(vec![1.0, 0.0], "C"),
            ];
            let classifier = with_strategy(points, strategy);
            let nearest = classifier.k_nearest(&[0.0, 0.0], 2).unwrap();
            assert_eq!(nearest.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 1]);
            assert_eq!(
                classifier.classify(&[0.0, 0.0], 2).unwrap(),
                ClassificationResult { label: "A", votes: 1 }
            );

            let points = vec![
                LabeledPoint::new(vec![0.0, 1.0], "B"),
                LabeledPoint::new(vec![1.0, 0.0], "C"),
                LabeledPoint::new(vec![1.0, 1.0], "C"),
                LabeledPoint::new(vec![-1.0, 0.0], "B"),
            ];
            let classifier = with_strategy(points, strategy);
            // Three points at distance 1 compete for two slots: B (0) and C (1) win,
            // the later B (3) is left out, so the 1-1 vote goes to B as the earliest.
            assert_eq!(
                classifier.classify(&[0.0, 0.0], 2).unwrap(),
                ClassificationResult { label: "B", votes: 1 }
            );
        }
    }

    #[test]
    fn test_query_dimensionality_mismatch() {
        let err = sample_classifier().classify(&[1.0, 1.0, 1.0], 1).unwrap_err();
        assert_eq!(err, InvalidArgument::QueryDimensionality { expected: 2, found: 3 });
    }

    #[test]
    fn test_k_out_of_range() {
        let classifier = sample_classifier();
        assert_eq!(
            classifier.classify(&[0.0, 0.0], 0).unwrap_err(),
            InvalidArgument::KOutOfRange { k: 0, size: 4 }
        );
        assert_eq!(
            classifier.classify(&[0.0, 0.0], 5).unwrap_err(),
            InvalidArgument::KOutOfRange { k: 5, size: 4 }
        );
        assert!(classifier.k_nearest(&[0.0, 0.0], 5).is_err());
    }

    #[test]
    fn test_non_finite_query_is_rejected() {
        let err = sample_classifier().classify(&[0.0, f64::NAN], 1).unwrap_err();
        assert_eq!(err, InvalidArgument::NonFiniteQuery { position: 1 });
    }

    #[test]
    fn test_empty_dataset_is_a_configuration_error() {
        let result = NearestNeighborClassifier::<f64, &str>::new(vec![]);
        assert_eq!(result.unwrap_err(), ConfigurationError::EmptyDataset);
    }

    #[test]
    fn test_repeated_calls_are_deterministic() {
        let classifier = sample_classifier();
        let first = classifier.classify(&[0.6, 0.4], 3).unwrap();
        for _ in 0..10 {
            assert_eq!(classifier.classify(&[0.6, 0.4], 3).unwrap(), first);
        }
        assert_eq!(classifier.dataset().points(), sample_points().as_slice());
    }

    #[test]
    fn test_classify_batch() {
        let classifier = sample_classifier();
        let results = classifier
            .classify_batch(&[vec![1.0, 1.0], vec![0.1, 0.1]], 1)
            .unwrap();
        let labels: Vec<&str> = results.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["A", "B"]);

        let err = classifier
            .classify_batch(&[vec![1.0, 1.0], vec![0.1]], 1)
            .unwrap_err();
        assert_eq!(err, InvalidArgument::QueryDimensionality { expected: 2, found: 1 });
    }

    #[test]
    fn test_auto_strategy_resolution() {
        let n = NearestNeighborClassifier::<f64, i32>::PARTIAL_SELECTION_MIN_POINTS;
        let points: Vec<_> = (0..n).map(|i| LabeledPoint::new(vec![i as f64], (i % 3) as i32)).collect();
        let classifier = NearestNeighborClassifier::new(points).unwrap();
        assert_eq!(classifier.config().strategy, SearchStrategy::Auto);
        assert_eq!(classifier.resolve_strategy(5), SearchStrategy::PartialSelection);
        assert_eq!(classifier.resolve_strategy(n), SearchStrategy::FullSort);

        assert_eq!(sample_classifier().resolve_strategy(1), SearchStrategy::FullSort);

        let fixed = with_strategy(sample_points(), SearchStrategy::PartialSelection);
        assert_eq!(fixed.resolve_strategy(4), SearchStrategy::PartialSelection);
    }
}

use std::num::NonZeroUsize;

use crate::dataset::{Dataset, Image};
use crate::distance::Metric;
use crate::error::{KnnError, Result};
use crate::{Label, NUM_LABELS};

/// Brute-force k-nearest-neighbour classifier over a borrowed training set.
#[derive(Debug, Clone, Copy)]
pub struct KnnClassifier<'a> {
    training: &'a Dataset,
    k: NonZeroUsize,
    metric: Metric,
}

impl<'a> KnnClassifier<'a> {
    pub fn new(training: &'a Dataset, k: usize, metric: Metric) -> Result<Self> {
        let k = NonZeroUsize::new(k)
            .ok_or_else(|| KnnError::InvalidConfiguration("K must be at least 1".to_owned()))?;
        Ok(Self::with_k(training, k, metric))
    }

    pub fn with_k(training: &'a Dataset, k: NonZeroUsize, metric: Metric) -> Self {
        KnnClassifier {
            training,
            k,
            metric,
        }
    }

    pub fn k(&self) -> usize {
        self.k.get()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Indices of the K training images closest to `query`, in slot order.
    ///
    /// Fewer than K indices come back when the training set is smaller than
    /// K, or when some distances are NaN.
    pub fn nearest(&self, query: &Image) -> Vec<usize> {
        let mut candidates = CandidateSet::new(self.k);
        for (index, image) in self.training.images().iter().enumerate() {
            candidates.offer(self.metric.distance(image, query), index);
        }
        candidates.indices().collect()
    }

    /// Majority label among the K nearest neighbours of `query`.
    /// Ties go to the smallest label.
    pub fn predict(&self, query: &Image) -> Label {
        let mut tally = VoteTally::default();
        for index in self.nearest(query) {
            tally.vote(self.training.label(index));
        }
        tally.winner()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    index: Option<usize>,
}

// Fixed-capacity set of the closest items seen so far.
// Empty slots sit at +inf so they are always evicted first.
#[derive(Debug)]
struct CandidateSet {
    slots: Vec<Candidate>,
}

impl CandidateSet {
    fn new(k: NonZeroUsize) -> Self {
        CandidateSet {
            slots: vec![
                Candidate {
                    distance: f64::INFINITY,
                    index: None
                };
                k.get()
            ],
        }
    }

    // The slot holding the largest distance, first one on ties
    fn farthest(&self) -> usize {
        let mut farthest = 0;
        for (slot, candidate) in self.slots.iter().enumerate().skip(1) {
            if candidate.distance > self.slots[farthest].distance {
                farthest = slot;
            }
        }
        farthest
    }

    fn offer(&mut self, distance: f64, index: usize) {
        let slot = self.farthest();
        // A NaN distance fails this comparison and is never kept
        if distance < self.slots[slot].distance {
            self.slots[slot] = Candidate {
                distance,
                index: Some(index),
            };
        }
    }

    fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().filter_map(|candidate| candidate.index)
    }
}

/// Occurrences of each label among the selected neighbours.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    counts: [usize; NUM_LABELS],
}

impl VoteTally {
    pub fn vote(&mut self, label: Label) {
        self.counts[label as usize] += 1;
    }

    pub fn count(&self, label: Label) -> usize {
        self.counts[label as usize]
    }

    // Highest count wins; scanning upwards with a strict comparison keeps the
    // smallest label on ties. An empty tally returns 0.
    pub fn winner(&self) -> Label {
        let mut best = 0;
        for label in 1..NUM_LABELS {
            if self.counts[label] > self.counts[best] {
                best = label;
            }
        }
        best as Label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NUM_PIXELS;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    // An image whose first pixel is `value` and the rest blank
    fn dot(value: u8) -> Image {
        let mut pixels = vec![0; NUM_PIXELS];
        pixels[0] = value;
        Image::square(pixels).unwrap()
    }

    fn random_dataset(rng: &mut SmallRng, n: usize) -> Dataset {
        let labels = (0..n).map(|_| rng.gen_range(0..NUM_LABELS as u8)).collect();
        let images = (0..n)
            .map(|_| Image::square((0..NUM_PIXELS).map(|_| rng.gen()).collect()).unwrap())
            .collect();
        Dataset::new(labels, images).unwrap()
    }

    #[test]
    fn zero_k_is_rejected() {
        let training = Dataset::default();
        assert!(matches!(
            KnnClassifier::new(&training, 0, Metric::Euclidean),
            Err(KnnError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn single_identical_image_wins_for_every_metric() {
        let training = Dataset::new(vec![6], vec![dot(200)]).unwrap();
        for metric in Metric::ALL {
            let classifier = KnnClassifier::new(&training, 1, metric).unwrap();
            assert_eq!(classifier.predict(&dot(200)), 6);
        }
    }

    #[test]
    fn vote_ties_go_to_the_smaller_label() {
        // Two neighbours labelled 7 and 3, one vote each
        let training = Dataset::new(vec![7, 3], vec![dot(10), dot(20)]).unwrap();
        let classifier = KnnClassifier::new(&training, 2, Metric::Euclidean).unwrap();
        assert_eq!(classifier.predict(&dot(15)), 3);
    }

    #[test]
    fn majority_beats_the_nearest() {
        let training = Dataset::new(
            vec![1, 4, 4, 9],
            vec![dot(100), dot(90), dot(110), dot(0)],
        )
        .unwrap();
        let nearest = KnnClassifier::new(&training, 1, Metric::Euclidean).unwrap();
        let three = KnnClassifier::new(&training, 3, Metric::Euclidean).unwrap();
        assert_eq!(nearest.predict(&dot(100)), 1);
        assert_eq!(three.predict(&dot(100)), 4);
    }

    #[test]
    fn keeps_the_k_closest() {
        let training = Dataset::new(
            vec![0, 1, 2, 3, 4],
            vec![dot(50), dot(0), dot(40), dot(255), dot(45)],
        )
        .unwrap();
        let classifier = KnnClassifier::new(&training, 2, Metric::Euclidean).unwrap();
        let mut nearest = classifier.nearest(&dot(44));
        nearest.sort_unstable();
        assert_eq!(nearest, vec![2, 4]);
    }

    #[test]
    fn equal_distances_keep_the_earlier_item() {
        // Both items are 5 away; the later one is not strictly closer
        let training = Dataset::new(vec![8, 2], vec![dot(5), dot(15)]).unwrap();
        let classifier = KnnClassifier::new(&training, 1, Metric::Euclidean).unwrap();
        assert_eq!(classifier.nearest(&dot(10)), vec![0]);
        assert_eq!(classifier.predict(&dot(10)), 8);
    }

    #[test]
    fn k_larger_than_training_set_uses_every_item() {
        let training = Dataset::new(vec![5, 5, 2], vec![dot(1), dot(2), dot(3)]).unwrap();
        let classifier = KnnClassifier::new(&training, 10, Metric::Euclidean).unwrap();
        assert_eq!(classifier.nearest(&dot(0)).len(), 3);
        assert_eq!(classifier.predict(&dot(0)), 5);
    }

    #[test]
    fn blank_images_are_never_cosine_neighbours() {
        // The blank training image is NaN away under cosine and never kept
        let training = Dataset::new(vec![3, 7], vec![dot(0), dot(9)]).unwrap();
        let classifier = KnnClassifier::new(&training, 1, Metric::Cosine).unwrap();
        assert_eq!(classifier.nearest(&dot(50)), vec![1]);
        assert_eq!(classifier.predict(&dot(50)), 7);
    }

    #[test]
    fn no_neighbours_predicts_label_zero() {
        let training = Dataset::default();
        let classifier = KnnClassifier::new(&training, 3, Metric::Euclidean).unwrap();
        assert!(classifier.nearest(&dot(1)).is_empty());
        assert_eq!(classifier.predict(&dot(1)), 0);

        // A blank query is NaN away from everything under cosine
        let training = Dataset::new(vec![4], vec![dot(9)]).unwrap();
        let classifier = KnnClassifier::new(&training, 1, Metric::Cosine).unwrap();
        assert_eq!(classifier.predict(&dot(0)), 0);
    }

    #[test]
    fn predictions_are_deterministic() {
        let mut rng = SmallRng::seed_from_u64(3);
        let training = random_dataset(&mut rng, 200);
        let queries = random_dataset(&mut rng, 20);
        for metric in Metric::ALL {
            let classifier = KnnClassifier::new(&training, 5, metric).unwrap();
            let first: Vec<Label> = queries.images().iter().map(|q| classifier.predict(q)).collect();
            let second: Vec<Label> = queries.images().iter().map(|q| classifier.predict(q)).collect();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn selection_agrees_with_sorting() {
        let mut rng = SmallRng::seed_from_u64(5);
        let training = random_dataset(&mut rng, 150);
        let query = random_dataset(&mut rng, 1);
        let query = query.image(0);
        let classifier = KnnClassifier::new(&training, 7, Metric::Euclidean).unwrap();

        let mut by_distance: Vec<(f64, usize)> = training
            .images()
            .iter()
            .enumerate()
            .map(|(i, image)| (Metric::Euclidean.distance(image, query), i))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let mut expected: Vec<usize> = by_distance.iter().take(7).map(|&(_, i)| i).collect();
        expected.sort_unstable();

        let mut nearest = classifier.nearest(query);
        nearest.sort_unstable();
        assert_eq!(nearest, expected);
    }

    #[test]
    fn tally_counts_and_breaks_ties_low() {
        let mut tally = VoteTally::default();
        assert_eq!(tally.winner(), 0);
        for label in [9, 2, 9, 2, 5] {
            tally.vote(label);
        }
        assert_eq!(tally.count(9), 2);
        assert_eq!(tally.count(2), 2);
        assert_eq!(tally.winner(), 2);
    }
}

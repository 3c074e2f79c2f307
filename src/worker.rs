use tracing::debug;

use crate::classifier::KnnClassifier;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::partition::PartitionRange;
use crate::protocol::{Report, WorkerLink};

/// Body of one worker: wait for an assignment, classify that slice of the
/// test set and report how many predictions matched their labels.
pub fn run_worker(link: WorkerLink, classifier: &KnnClassifier<'_>, testing: &Dataset) -> Result<()> {
    let worker = link.worker();
    let range = PartitionRange::from(link.recv_assignment()?);
    debug!(worker, start = range.start, count = range.count, "received assignment");

    let correct = count_correct(classifier, testing, range);
    debug!(worker, correct, "reporting");
    link.send_report(Report { correct })
}

/// Number of test images in `range` whose predicted label matches their own.
/// Indices past the end of the test set are ignored.
pub fn count_correct(classifier: &KnnClassifier<'_>, testing: &Dataset, range: PartitionRange) -> usize {
    let end = range.end().min(testing.len());
    let start = range.start.min(end);
    (start..end)
        .filter(|&i| classifier.predict(testing.image(i)) == testing.label(i))
        .count()
}

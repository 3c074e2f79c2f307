use std::ops::Range;

use crate::error::{KnnError, Result};

/// A contiguous run of test-set indices handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRange {
    pub start: usize,
    pub count: usize,
}

impl PartitionRange {
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Split `total` test items into `num_workers` ordered, gap-free ranges.
///
/// The first `total % num_workers` ranges hold one item more than the rest.
/// With more workers than items the trailing ranges are empty.
pub fn partition(total: usize, num_workers: usize) -> Result<Vec<PartitionRange>> {
    if num_workers == 0 {
        return Err(KnnError::InvalidConfiguration(
            "the number of workers must be at least 1".to_owned(),
        ));
    }
    let base = total / num_workers;
    let remainder = total % num_workers;

    let mut start = 0;
    Ok((0..num_workers)
        .map(|worker| {
            let count = if worker < remainder { base + 1 } else { base };
            let range = PartitionRange { start, count };
            start += count;
            range
        })
        .collect())
}

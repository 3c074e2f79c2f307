//! Point-to-point links between the coordinator and one worker.
//!
//! Each link carries exactly one message in each direction: an
//! [`Assignment`] to the worker, then a [`Report`] back. Messages are typed
//! values, so a send or receive either moves the whole message or fails;
//! every failure is turned into a [`KnnError`] here rather than at call sites.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::{KnnError, Result};
use crate::partition::PartitionRange;

/// The slice of the test set a worker must classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub start_idx: usize,
    pub count: usize,
}

impl From<PartitionRange> for Assignment {
    fn from(range: PartitionRange) -> Self {
        Assignment {
            start_idx: range.start,
            count: range.count,
        }
    }
}

impl From<Assignment> for PartitionRange {
    fn from(assignment: Assignment) -> Self {
        PartitionRange {
            start: assignment.start_idx,
            count: assignment.count,
        }
    }
}

/// Number of correct predictions in a worker's assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub correct: usize,
}

/// Coordinator side of a link.
#[derive(Debug)]
pub struct CoordinatorLink {
    worker: usize,
    assignments: Sender<Assignment>,
    reports: Receiver<Report>,
}

/// Worker side of a link.
#[derive(Debug)]
pub struct WorkerLink {
    worker: usize,
    assignments: Receiver<Assignment>,
    reports: Sender<Report>,
}

/// Create the two ends of the link for worker number `worker`.
pub fn link(worker: usize) -> (CoordinatorLink, WorkerLink) {
    let (assignment_tx, assignment_rx) = mpsc::channel();
    let (report_tx, report_rx) = mpsc::channel();
    (
        CoordinatorLink {
            worker,
            assignments: assignment_tx,
            reports: report_rx,
        },
        WorkerLink {
            worker,
            assignments: assignment_rx,
            reports: report_tx,
        },
    )
}

impl CoordinatorLink {
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn send_assignment(&self, assignment: Assignment) -> Result<()> {
        self.assignments
            .send(assignment)
            .map_err(|_| KnnError::ChannelFailure {
                worker: self.worker,
                reason: "worker stopped listening before its assignment was sent".to_owned(),
            })
    }

    // Blocks until the worker reports or its end of the link is dropped
    pub fn recv_report(&self) -> Result<Report> {
        self.reports
            .recv()
            .map_err(|_| KnnError::WorkerAbnormalTermination {
                worker: self.worker,
                reason: "ended without reporting a result".to_owned(),
            })
    }
}

impl WorkerLink {
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn recv_assignment(&self) -> Result<Assignment> {
        self.assignments
            .recv()
            .map_err(|_| KnnError::ChannelFailure {
                worker: self.worker,
                reason: "coordinator closed the link before sending an assignment".to_owned(),
            })
    }

    // The report is the last message, so sending it consumes the link
    pub fn send_report(self, report: Report) -> Result<()> {
        self.reports
            .send(report)
            .map_err(|_| KnnError::ChannelFailure {
                worker: self.worker,
                reason: "coordinator stopped listening before the report was sent".to_owned(),
            })
    }
}

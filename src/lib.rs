pub mod classifier;
pub mod coordinator;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod logging;
pub mod partition;
pub mod protocol;
pub mod worker;

pub use error::{KnnError, Result};

// Images are square, IMAGE_WIDTH pixels to a side
pub const IMAGE_WIDTH: usize = 28;
pub const NUM_PIXELS: usize = IMAGE_WIDTH * IMAGE_WIDTH;
// Labels are digits, 0 to NUM_LABELS - 1
pub const NUM_LABELS: usize = 10;

pub type Label = u8;

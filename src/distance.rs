use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use wide::f64x4;

use crate::dataset::Image;
use crate::error::{KnnError, Result};

// Number of pixels handled per SIMD step
const LANES: usize = 4;

/// Dissimilarity between two images.
///
/// Both variants are pure functions of their inputs. Pixel values are small
/// integers, so every partial sum is an exact integer in `f64` and the SIMD
/// accumulation gives the same result as a sequential one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// `sqrt(sum((a[i] - b[i])^2))`, in `[0, inf)`.
    Euclidean,
    /// `(2 / pi) * acos(a.b / (|a| |b|))`, in `[0, 2]`.
    ///
    /// NaN when either image is all zeros. NaN distances are never selected
    /// as neighbours.
    Cosine,
}

impl Metric {
    // Selection order: a selector matching both names picks the first one
    pub const ALL: [Metric; 2] = [Metric::Euclidean, Metric::Cosine];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Cosine => "cosine",
        }
    }

    /// Resolve a metric from its name or any prefix of it ("eucl", "cos").
    /// Matching is case-sensitive.
    pub fn from_selector(selector: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.name().starts_with(selector))
            .ok_or_else(|| {
                KnnError::InvalidConfiguration(format!(
                    "unknown distance metric {:?}, expected euclidean or cosine",
                    selector
                ))
            })
    }

    pub fn distance(self, a: &Image, b: &Image) -> f64 {
        match self {
            Metric::Euclidean => euclidean(a.pixels(), b.pixels()),
            Metric::Cosine => cosine(a.pixels(), b.pixels()),
        }
    }
}

impl FromStr for Metric {
    type Err = KnnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_selector(s)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn widen(chunk: &[u8]) -> f64x4 {
    f64x4::from([
        chunk[0] as f64,
        chunk[1] as f64,
        chunk[2] as f64,
        chunk[3] as f64,
    ])
}

#[inline]
fn horizontal_sum(x: f64x4) -> f64 {
    x.to_array().iter().sum()
}

pub fn euclidean(a: &[u8], b: &[u8]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let tail: f64 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();

    let mut acc = f64x4::splat(0.0);
    for (x, y) in a_chunks.zip(b_chunks) {
        let d = widen(x) - widen(y);
        acc = acc + d * d;
    }
    (horizontal_sum(acc) + tail).sqrt()
}

pub fn cosine(a: &[u8], b: &[u8]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let (mut dot, mut a_sq, mut b_sq) = (0.0, 0.0, 0.0);
    for (&x, &y) in a_chunks.remainder().iter().zip(b_chunks.remainder()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        a_sq += x * x;
        b_sq += y * y;
    }

    let mut dot_acc = f64x4::splat(0.0);
    let mut a_acc = f64x4::splat(0.0);
    let mut b_acc = f64x4::splat(0.0);
    for (x, y) in a_chunks.zip(b_chunks) {
        let (x, y) = (widen(x), widen(y));
        dot_acc = dot_acc + x * y;
        a_acc = a_acc + x * x;
        b_acc = b_acc + y * y;
    }
    dot += horizontal_sum(dot_acc);
    a_sq += horizontal_sum(a_acc);
    b_sq += horizontal_sum(b_acc);

    // sqrt of the product keeps identical images at exactly 1.0.
    // Rounding can still push the ratio past 1, so clamp; NaN passes through.
    let similarity = (dot / (a_sq * b_sq).sqrt()).clamp(-1.0, 1.0);
    2.0 * similarity.acos() / PI
}

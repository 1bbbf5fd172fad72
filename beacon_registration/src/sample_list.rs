//! Reusable sample batch

use crate::sample::Sample;

/// Growable batch of samples that keeps its allocation across cycles
///
/// `clear` and `drain` reset the length only, so a list rebuilt every
/// registration cycle stops allocating once it reached its working size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleList {
    samples: Vec<Sample>,
}

impl SampleList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty list with room for `capacity` samples
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Append one sample
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the list holds no sample
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Retained capacity
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Drop all samples, keeping the allocation
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Move all samples out, keeping the allocation
    pub fn drain(&mut self) -> std::vec::Drain<'_, Sample> {
        self.samples.drain(..)
    }

    /// Samples in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Samples as a slice
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }
}

impl Extend<Sample> for SampleList {
    fn extend<I: IntoIterator<Item = Sample>>(&mut self, iter: I) {
        self.samples.extend(iter);
    }
}

impl FromIterator<Sample> for SampleList {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SampleList {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

use std::ops::Range;

use crate::config::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_CHARS_PER_BATCH};
use crate::ir::{DocumentMetadata, TextSegment};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_batch_size: usize,
    pub max_chars_per_batch: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_chars_per_batch: DEFAULT_MAX_CHARS_PER_BATCH,
        }
    }
}

/// A contiguous run of segments sent in one backend request.
#[derive(Clone, Copy, Debug)]
pub struct Batch<'a> {
    pub segments: &'a [TextSegment],
    /// Position of the first segment in the full segment list.
    pub start_index: usize,
}

impl Batch<'_> {
    pub fn texts(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.text.clone()).collect()
    }

    pub fn char_count(&self) -> usize {
        self.segments.iter().map(TextSegment::char_len).sum()
    }
}

struct Packer {
    limits: BatchLimits,
    count: usize,
    chars: usize,
}

impl Packer {
    fn new(limits: BatchLimits) -> Self {
        Self {
            limits,
            count: 0,
            chars: 0,
        }
    }

    fn push(&mut self, len: usize) -> bool {
        let full = self.count >= self.limits.max_batch_size.max(1)
            || (self.count > 0 && self.chars + len > self.limits.max_chars_per_batch);
        if full {
            self.count = 0;
            self.chars = 0;
        }
        self.count += 1;
        self.chars += len;
        full
    }
}

fn batch_ranges(lengths: impl IntoIterator<Item = usize>, limits: BatchLimits) -> Vec<Range<usize>> {
    let mut packer = Packer::new(limits);
    let mut ranges = Vec::new();
    let mut start = 0usize;
    let mut end = 0usize;
    for len in lengths {
        if packer.push(len) {
            ranges.push(start..end);
            start = end;
        }
        end += 1;
    }
    if end > start {
        ranges.push(start..end);
    }
    ranges
}

pub fn plan_batches(segments: &[TextSegment], limits: BatchLimits) -> Vec<Batch<'_>> {
    batch_ranges(segments.iter().map(TextSegment::char_len), limits)
        .into_iter()
        .map(|r| Batch {
            start_index: r.start,
            segments: &segments[r],
        })
        .collect()
}

pub fn estimate_batch_count(lengths: impl IntoIterator<Item = usize>, limits: BatchLimits) -> usize {
    let mut packer = Packer::new(limits);
    let mut batches = 0usize;
    for len in lengths {
        if packer.push(len) || batches == 0 {
            batches += 1;
        }
    }
    batches
}

impl DocumentMetadata {
    pub fn from_segments(segments: &[TextSegment], limits: BatchLimits) -> Self {
        Self {
            total_segments: segments.len(),
            total_characters: segments.iter().map(TextSegment::char_len).sum(),
            estimated_batches: estimate_batch_count(segments.iter().map(TextSegment::char_len), limits),
        }
    }
}

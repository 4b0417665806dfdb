//! Implementations for core types: series merging, window arithmetic and value normalization

use crate::types::{
    CallOutput, ColumnType, Height, Sample, SamplingWindow, Series, SourceDescriptor,
};
use std::collections::BTreeMap;

/// Stringify a raw call value and strip enclosing list brackets
pub fn normalize_value(raw: &str) -> String {
    raw.trim_matches(&['[', ']'][..]).to_string()
}

/// Source names key storage files and warehouse tables
pub fn is_valid_source_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Warehouse column names must start with an ASCII letter or underscore
pub fn is_valid_column_name(name: &str) -> bool {
    name.chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
}

impl CallOutput {
    /// Bind the output to column names: tuples zip positionally, a scalar takes the first name.
    /// Values that normalize to nothing are left out, the same as an empty CSV cell.
    pub fn bind(&self, column_names: &[String]) -> Vec<(String, String)> {
        let bound: Vec<(String, String)> = match self {
            CallOutput::Scalar(value) => column_names
                .first()
                .map(|name| vec![(name.clone(), normalize_value(value))])
                .unwrap_or_default(),
            CallOutput::Tuple(values) => column_names
                .iter()
                .zip(values)
                .map(|(name, value)| (name.clone(), normalize_value(value)))
                .collect(),
        };
        bound.into_iter().filter(|(_, value)| !value.is_empty()).collect()
    }
}

impl Sample {
    pub fn new(height: Height, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            height,
            timestamp,
            values: Vec::new(),
        }
    }

    /// Value of a column, if it was read successfully
    pub fn value(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from samples; a later sample for the same height replaces an earlier one
    pub fn from_samples<I: IntoIterator<Item = Sample>>(samples: I) -> Self {
        let mut series = Self::new();
        for sample in samples {
            series.insert(sample);
        }
        series
    }

    /// Insert a sample, replacing any existing sample at the same height
    pub fn insert(&mut self, sample: Sample) {
        self.samples.insert(sample.height, sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, height: Height) -> Option<&Sample> {
        self.samples.get(&height)
    }

    pub fn first_height(&self) -> Option<Height> {
        self.samples.keys().next().copied()
    }

    pub fn last_height(&self) -> Option<Height> {
        self.samples.keys().next_back().copied()
    }

    /// Samples in ascending height order
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    pub fn heights(&self) -> Vec<Height> {
        self.samples.keys().copied().collect()
    }

    /// Value columns in first-seen order across ascending heights
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for sample in self.samples.values() {
            for (name, _) in &sample.values {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }

    /// Union by height where `incoming` wins on shared heights
    pub fn merge(&self, incoming: &Series) -> Series {
        let mut samples: BTreeMap<Height, Sample> = self.samples.clone();
        for (height, sample) in &incoming.samples {
            samples.insert(*height, sample.clone());
        }
        Series { samples }
    }

    /// Samples strictly above `height`
    pub fn after(&self, height: Height) -> Series {
        let samples = match height.checked_add(1) {
            Some(from) => self
                .samples
                .range(from..)
                .map(|(h, s)| (*h, s.clone()))
                .collect(),
            None => BTreeMap::new(),
        };
        Series { samples }
    }

    /// Split into consecutive batches of at most `rows` samples
    pub fn batches(&self, rows: usize) -> Vec<Series> {
        let rows = rows.max(1);
        let samples: Vec<&Sample> = self.samples.values().collect();
        samples
            .chunks(rows)
            .map(|chunk| chunk.iter().map(|s| (*s).clone()).collect())
            .collect()
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Series::from_samples(iter)
    }
}

impl SamplingWindow {
    /// Create a window; `None` when it is empty or the stride is zero
    pub fn new(start: Height, end: Height, stride: u64) -> Option<Self> {
        if stride == 0 || start > end {
            return None;
        }
        Some(Self { start, end, stride })
    }

    /// `start, start + stride, ...` up to and including `end`
    pub fn heights(&self) -> impl Iterator<Item = Height> {
        let stride = self.stride;
        let end = self.end;
        std::iter::successors(Some(self.start), move |h| {
            h.checked_add(stride).filter(|next| *next <= end)
        })
    }

    /// Number of heights in the window
    pub fn len(&self) -> u64 {
        (self.end - self.start) / self.stride + 1
    }

    /// A constructed window always holds at least its start height
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Split into consecutive windows of at most `max_heights` heights each
    pub fn chunks(&self, max_heights: u64) -> Vec<SamplingWindow> {
        let span = max_heights.max(1).saturating_sub(1).saturating_mul(self.stride);
        let mut chunks = Vec::new();
        let mut start = self.start;
        loop {
            let end = start.saturating_add(span).min(self.end);
            chunks.push(SamplingWindow {
                start,
                end,
                stride: self.stride,
            });
            match end.checked_add(self.stride) {
                Some(next) if next <= self.end => start = next,
                _ => break,
            }
        }
        chunks
    }
}

impl ColumnType {
    /// Type name in the warehouse schema
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Timestamp => "timestamp",
            ColumnType::Double => "double",
            ColumnType::Varchar => "varchar",
        }
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

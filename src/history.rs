use crate::Sample;

/// Every sample seen since startup or since the last reset, in log line order.
#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    samples: Vec<Sample>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Owned copy of the accumulated samples.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.clone()
    }

    /// Drop all samples, used when the watched file was truncated or replaced.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Extend<Sample> for HistoryStore {
    fn extend<I: IntoIterator<Item = Sample>>(&mut self, iter: I) {
        self.samples.extend(iter)
    }
}

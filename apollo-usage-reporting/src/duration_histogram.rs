use std::ops::AddAssign;

use serde::Serialize;

/// Approximate distribution of nanosecond durations.
///
/// Bucket `i` holds durations whose value in microseconds falls in
/// `(1.1^(i-1), 1.1^i]`; bucket 0 holds everything up to one microsecond,
/// including zero and negative values. The last bucket absorbs anything larger
/// than it can represent.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationHistogram {
    /// `Vec` indices represents a duration bucket.
    /// `Vec` items are the number of observations in each bucket.
    buckets: Vec<u64>,

    /// The number of observations in all buckets
    total: u64,
}

impl AddAssign for DurationHistogram {
    fn add_assign(&mut self, other: DurationHistogram) {
        self.total += other.total;
        if self.buckets.len() < other.buckets.len() {
            self.buckets.resize(other.buckets.len(), 0)
        }
        self.buckets
            .iter_mut()
            .zip(other.buckets)
            .for_each(|(slot, value)| *slot += value)
    }
}

impl DurationHistogram {
    /// Index of the last bucket.
    pub const MAXIMUM_BUCKET: usize = 383;
    const EXPONENT_LOG: f64 = 0.09531017980432493f64; // ln(1.1) Update when ln() is a const fn (see: https://github.com/rust-lang/rust/issues/57241)

    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a duration to its bucket index.
    pub fn duration_to_bucket(duration_ns: i64) -> usize {
        let log_duration = f64::ln(duration_ns as f64 / 1000.0);
        let unbounded_bucket = f64::ceil(log_duration / DurationHistogram::EXPONENT_LOG);

        // `<= 0` also catches -0 and -inf (a zero duration)
        if unbounded_bucket.is_nan() || unbounded_bucket <= 0f64 {
            return 0;
        } else if unbounded_bucket > DurationHistogram::MAXIMUM_BUCKET as f64 {
            return DurationHistogram::MAXIMUM_BUCKET;
        }

        unbounded_bucket as usize
    }

    pub fn increment_duration(&mut self, duration_ns: i64) {
        self.increment_bucket(DurationHistogram::duration_to_bucket(duration_ns), 1)
    }

    pub(crate) fn increment_bucket(&mut self, bucket: usize, value: u64) {
        if bucket > DurationHistogram::MAXIMUM_BUCKET {
            panic!("bucket is out of bounds of the bucket array");
        }
        self.total += value;
        if bucket >= self.buckets.len() {
            self.buckets.resize(bucket + 1, 0);
        }
        self.buckets[bucket] += value;
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Convert to the type expected by the wire format for `repeated sint64`.
    ///
    /// Runs of empty buckets are collapsed: a single empty bucket stays `0`,
    /// `n` consecutive empty buckets become `-n`. Trailing empty buckets are
    /// dropped.
    pub fn to_array(&self) -> Vec<i64> {
        let mut result = vec![];
        let mut buffered_zeroes: i64 = 0;

        for value in &self.buckets {
            if *value == 0 {
                buffered_zeroes += 1;
            } else {
                if buffered_zeroes == 1 {
                    result.push(0);
                } else if buffered_zeroes != 0 {
                    result.push(-buffered_zeroes);
                }
                result.push(*value as i64);
                buffered_zeroes = 0;
            }
        }
        result
    }
}

/// Durations on the wire are unsigned; anything that does not fit an `i64`
/// still belongs in the last bucket.
pub(crate) fn saturating_ns(duration_ns: u64) -> i64 {
    i64::try_from(duration_ns).unwrap_or(i64::MAX)
}

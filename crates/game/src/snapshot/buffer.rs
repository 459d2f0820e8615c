use std::collections::VecDeque;
use std::sync::Arc;

/// Shared, immutable encoded payload.
pub type Blob = Arc<[u8]>;

/// Entries further than this past the query time stop a neighbour scan.
pub const SCAN_HORIZON_MS: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TimePoint<T> {
    pub time: f64,
    pub value: T,
}

impl<T> TimePoint<T> {
    pub fn new(time: f64, value: T) -> Self {
        Self { time, value }
    }
}

impl TimePoint<Blob> {
    pub fn as_slice(&self) -> TimePoint<&[u8]> {
        TimePoint::new(self.time, &self.value[..])
    }
}

/// Append-ordered store of encoded snapshots keyed by simulation time.
///
/// Callers insert in non-decreasing time order. The two most recently
/// inserted distinct times (the recency pair) are held apart from the main
/// sequence and are only replaced by later inserts, never by pruning.
#[derive(Debug, Default)]
pub struct TimeSeriesBuffer {
    entries: VecDeque<TimePoint<Blob>>,
    last_inserted_time: Option<f64>,
    latest: Option<TimePoint<Blob>>,
    second_latest: Option<TimePoint<Blob>>,
}

impl TimeSeriesBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, time: f64, value: impl Into<Blob>) {
        let point = TimePoint::new(time, value.into());
        self.last_inserted_time = Some(time);
        self.track_recency(&point);
        self.entries.push_back(point);
    }

    fn track_recency(&mut self, point: &TimePoint<Blob>) {
        let (Some(latest), Some(second)) = (&self.latest, &self.second_latest) else {
            self.latest = Some(point.clone());
            self.second_latest = Some(point.clone());
            return;
        };

        if point.time > latest.time {
            self.second_latest = self.latest.take();
            self.latest = Some(point.clone());
        } else if point.time > second.time && point.time < latest.time {
            self.second_latest = Some(point.clone());
        }
    }

    /// `(second_latest, latest)`, or `None` until two distinct times were seen.
    pub fn two_latest(&self) -> Option<(&TimePoint<Blob>, &TimePoint<Blob>)> {
        match (&self.second_latest, &self.latest) {
            (Some(second), Some(latest)) if second.time != latest.time => Some((second, latest)),
            _ => None,
        }
    }

    /// Drops every entry older than `time`, keeping the rest in order.
    pub fn remove_values_upto(&mut self, time: f64) {
        self.entries.retain(|entry| entry.time >= time);
        if self.entries.is_empty() {
            self.last_inserted_time = None;
        }
    }

    /// Splits `[start, end)` into `steps` equal buckets and returns the first
    /// stored value of each bucket.
    pub fn values_within_window(&self, start: f64, end: f64, steps: usize) -> Vec<Option<Blob>> {
        let mut values = vec![None; steps];
        if steps == 0 || end <= start {
            return values;
        }

        let width = (end - start) / steps as f64;
        for entry in &self.entries {
            if entry.time < start || entry.time >= end {
                continue;
            }
            let index = (((entry.time - start) / width) as usize).min(steps - 1);
            if values[index].is_none() {
                values[index] = Some(Arc::clone(&entry.value));
            }
        }

        values
    }

    /// Nearest stored neighbours of `time`: the greatest entry at or before
    /// it and the smallest entry strictly after it.
    pub fn around(&self, time: f64) -> Option<(TimePoint<Blob>, TimePoint<Blob>)> {
        let mut before: Option<&TimePoint<Blob>> = None;
        let mut after: Option<&TimePoint<Blob>> = None;

        for entry in &self.entries {
            if entry.time <= time && before.is_none_or(|b| entry.time > b.time) {
                before = Some(entry);
            }
            if entry.time > time && after.is_none_or(|a| entry.time < a.time) {
                after = Some(entry);
            }
            if entry.time - time > SCAN_HORIZON_MS {
                break;
            }
        }

        Some((before?.clone(), after?.clone()))
    }

    /// Entries at or after `time`, sorted by time; equal times keep insertion order.
    pub fn values_from(&self, time: f64) -> Vec<TimePoint<Blob>> {
        let mut values: Vec<TimePoint<Blob>> = self
            .entries
            .iter()
            .filter(|entry| entry.time >= time)
            .cloned()
            .collect();
        values.sort_by(|a, b| a.time.total_cmp(&b.time));
        values
    }

    pub fn last_inserted_time(&self) -> Option<f64> {
        self.last_inserted_time
    }

    /// Greatest time ever inserted, unaffected by pruning.
    pub fn latest_time(&self) -> Option<f64> {
        self.latest.as_ref().map(|point| point.time)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimePoint<Blob>> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_inserted_time = None;
        self.latest = None;
        self.second_latest = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

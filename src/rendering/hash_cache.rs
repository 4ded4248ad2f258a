//! In-memory index of frame times to content hashes.
//!
//! Fulfilled hash jobs land here; the map answers which frames are already
//! rendered under a given hash and survives timeline edits through shift and
//! truncate maintenance. Stale results are rejected by job currency: a hash
//! is only accepted when a registered job covering that time is at least as
//! new as the result.

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;

use crate::model::TimeRange;

struct CacheJob {
    range: TimeRange,
    job_time: u64,
}

pub struct FrameHashCache {
    timebase: OrderedFloat<f64>,
    time_hash_map: BTreeMap<OrderedFloat<f64>, u64>,
    jobs: Vec<CacheJob>,
}

impl FrameHashCache {
    pub fn new(timebase: f64) -> Self {
        Self {
            timebase: OrderedFloat(timebase),
            time_hash_map: BTreeMap::new(),
            jobs: Vec::new(),
        }
    }

    pub fn set_timebase(&mut self, timebase: f64) {
        self.timebase = OrderedFloat(timebase);
    }

    pub fn get_hash(&self, time: f64) -> Option<u64> {
        self.time_hash_map.get(&OrderedFloat(time)).copied()
    }

    pub fn len(&self) -> usize {
        self.time_hash_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_hash_map.is_empty()
    }

    /// Register a hash job covering `range`, stamped with a monotonic job
    /// time. Results are only accepted for registered jobs.
    pub fn register_job(&mut self, range: TimeRange, job_time: u64) {
        self.jobs.push(CacheJob { range, job_time });
    }

    /// Store a hash result. Returns false when no registered job covers the
    /// time at or after the result's job time, i.e. the result is stale.
    pub fn set_hash(&mut self, time: f64, hash: u64, job_time: u64) -> bool {
        let time = OrderedFloat(time);
        let current = self
            .jobs
            .iter()
            .rev()
            .any(|job| job.range.contains(time) && job_time >= job.job_time);
        if !current {
            return false;
        }
        self.time_hash_map.insert(time, hash);
        true
    }

    pub fn frames_with_hash(&self, hash: u64) -> Vec<f64> {
        self.time_hash_map
            .iter()
            .filter(|(_, h)| **h == hash)
            .map(|(t, _)| t.into_inner())
            .collect()
    }

    /// Remove and return every frame time stored under `hash`.
    pub fn take_frames_with_hash(&mut self, hash: u64) -> Vec<f64> {
        let times: Vec<OrderedFloat<f64>> = self
            .time_hash_map
            .iter()
            .filter(|(_, h)| **h == hash)
            .map(|(t, _)| *t)
            .collect();
        for time in &times {
            self.time_hash_map.remove(time);
        }
        times.into_iter().map(|t| t.into_inner()).collect()
    }

    pub fn invalidate_range(&mut self, range: TimeRange) {
        self.time_hash_map
            .retain(|time, _| !range.contains(*time));
    }

    /// Drop every frame at or beyond the new timeline length.
    pub fn truncate(&mut self, new_length: f64) {
        let cutoff = OrderedFloat(new_length);
        self.time_hash_map.retain(|time, _| *time < cutoff);
    }

    /// Shift all frames at or after `from` so they start at `to`. A backward
    /// shift discards the frames the moved region overwrites.
    pub fn shift(&mut self, from: f64, to: f64) {
        let from = OrderedFloat(from);
        let to = OrderedFloat(to);
        let diff = to - from;

        let mut shifted = Vec::new();
        let mut kept = BTreeMap::new();
        for (time, hash) in std::mem::take(&mut self.time_hash_map) {
            if diff < OrderedFloat(0.0) && time >= to && time < from {
                // Overwritten by the shift.
                continue;
            }
            if time >= from {
                shifted.push((time + diff, hash));
            } else {
                kept.insert(time, hash);
            }
        }
        self.time_hash_map = kept;
        for (time, hash) in shifted {
            self.time_hash_map.insert(time, hash);
        }
    }

    /// Timebase-aligned frame times covering a set of ranges, without
    /// duplicates, in ascending order.
    pub fn frame_list_from_ranges(ranges: &[TimeRange], timebase: f64) -> Vec<f64> {
        let mut indices = BTreeSet::new();
        for range in ranges {
            if range.duration() <= 0.0 {
                continue;
            }
            let start = (range.start.into_inner() / timebase).floor() as i64;
            let end = (range.end.into_inner() / timebase).ceil() as i64;
            for i in start..end.max(start + 1) {
                indices.insert(i);
            }
        }
        indices.into_iter().map(|i| i as f64 * timebase).collect()
    }

    pub fn frame_list(&self, ranges: &[TimeRange]) -> Vec<f64> {
        Self::frame_list_from_ranges(ranges, self.timebase.into_inner())
    }
}

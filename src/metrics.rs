//! Frame metrics: scalar readouts, scrolling timing series, FPS counting.
//!
//! The orchestrator owns one [`Metrics`] and pushes into it every frame.
//! Whoever draws the overlay (or the log line) reads it afterwards.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::info;

/// Points kept per timing series.
pub const SERIES_CAPACITY: usize = 2000;

/// A bounded ring of `(seconds, value)` samples.
#[derive(Clone, Debug, Default)]
pub struct ScrollingSeries {
    points: VecDeque<(f32, f32)>,
}

impl ScrollingSeries {
    pub fn push(&mut self, t: f32, value: f32) {
        if self.points.len() == SERIES_CAPACITY {
            self.points.pop_front();
        }
        self.points.push_back((t, value));
    }

    pub fn latest(&self) -> Option<f32> {
        self.points.back().map(|&(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn mean(&self) -> Option<f32> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|&(_, v)| v).sum::<f32>() / self.points.len() as f32)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f32, f32)> {
        self.points.iter()
    }
}

/// Metrics sink. Pushes are fire-and-forget and cheap when disabled.
#[derive(Debug)]
pub struct Metrics {
    enabled: bool,
    start: Instant,
    values: BTreeMap<String, f32>,
    series: BTreeMap<String, ScrollingSeries>,
}

impl Metrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            start: Instant::now(),
            values: BTreeMap::new(),
            series: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Set a scalar readout such as "instances".
    pub fn push_value(&mut self, name: &str, value: f32) {
        if !self.enabled {
            return;
        }
        self.values.insert(name.to_string(), value);
    }

    /// Append a timing sample (milliseconds) to a scrolling series.
    pub fn push_timing(&mut self, name: &str, millis: f32) {
        if !self.enabled {
            return;
        }
        let t = self.start.elapsed().as_secs_f32();
        self.series.entry(name.to_string()).or_default().push(t, millis);
    }

    pub fn value(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn series(&self, name: &str) -> Option<&ScrollingSeries> {
        self.series.get(name)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Log the current readouts and the mean of each series.
    pub fn log_summary(&self) {
        if !self.enabled {
            return;
        }
        let values: Vec<String> = self.values().map(|(k, v)| format!("{k}={v:.0}")).collect();
        let timings: Vec<String> = self
            .series
            .iter()
            .filter_map(|(k, s)| s.mean().map(|m| format!("{k}={m:.2}ms")))
            .collect();
        info!("metrics: {} | {}", values.join(" "), timings.join(" "));
    }
}

/// Counts frames and reports a rate once per window.
#[derive(Clone, Debug)]
pub struct FpsCounter {
    window: Duration,
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            window_start: now,
            frames: 0,
        }
    }

    /// One-second window, as shown in the overlay.
    pub fn per_second(now: Instant) -> Self {
        Self::new(Duration::from_secs(1), now)
    }

    /// Record a frame; returns the average rate when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

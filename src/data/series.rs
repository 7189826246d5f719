//! Per-sensor time series for the chart panels.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Ordered `(timestamp, value)` points for one sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub points: Vec<(DateTime<Utc>, f64)>,
}

impl Series {
    pub fn new(points: Vec<(DateTime<Utc>, f64)>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The most recent point, if any.
    pub fn latest(&self) -> Option<(DateTime<Utc>, f64)> {
        self.points.last().copied()
    }

    /// Points as `(seconds since origin, value)` pairs for plotting.
    pub fn chart_points(&self, origin: DateTime<Utc>) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|(ts, v)| {
                let secs = (*ts - origin).num_milliseconds() as f64 / 1000.0;
                (secs, *v)
            })
            .collect()
    }

    /// Min and max value with a margin, widened to include `pin` (e.g. the
    /// alarm threshold) so it is always visible.
    ///
    /// Returns `None` for an empty series.
    pub fn value_bounds(&self, pin: f64) -> Option<[f64; 2]> {
        if self.points.is_empty() {
            return None;
        }

        let (min, max) = self
            .points
            .iter()
            .fold((pin, pin), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));
        let margin = ((max - min) * 0.1).max(0.5);
        Some([min - margin, max + margin])
    }
}

/// Latest redrawn series per sensor.
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    series: HashMap<String, Series>,
}

impl SeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the series for a sensor.
    pub fn replace(&mut self, sensor_id: &str, series: Series) {
        self.series.insert(sensor_id.to_string(), series);
    }

    pub fn get(&self, sensor_id: &str) -> Option<&Series> {
        self.series.get(sensor_id)
    }

    /// Total number of points across all sensors.
    pub fn total_points(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }
}

//! Value generators that drive the simulated sensors.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SensorSettings;

/// One generated value plus the pacing delay to wait before the next one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub delay: Duration,
}

/// A lazy, non-restartable sequence of samples for one sensor.
///
/// Pacing is cooperative: the generator only reports the delay, the caller
/// waits it out before asking for the next sample. `None` means the source is
/// exhausted; random generators never return it.
pub trait ValueGenerator: Send {
    fn next_sample(&mut self) -> Option<Sample>;
}

/// Uniformly random values and delays.
#[derive(Debug)]
pub struct RandomGenerator {
    rng: StdRng,
    min_value: f64,
    max_value: f64,
    min_delay_ns: u64,
    max_delay_ns: u64,
}

impl RandomGenerator {
    /// Create a generator over `[min_value, max_value]` with delays in
    /// `[min_delay, max_delay]`. Ranges are assumed validated.
    pub fn new(
        min_value: f64,
        max_value: f64,
        min_delay: Duration,
        max_delay: Duration,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            min_value,
            max_value,
            min_delay_ns: saturating_nanos(min_delay),
            max_delay_ns: saturating_nanos(max_delay),
        }
    }

    /// Generator for the sensor at `index` in the configured list.
    pub fn from_settings(settings: &SensorSettings, index: usize) -> Self {
        Self::new(
            settings.min_value,
            settings.max_value,
            settings.min_delay,
            settings.max_delay,
            settings.seed.map(|s| s.wrapping_add(index as u64)),
        )
    }
}

impl ValueGenerator for RandomGenerator {
    fn next_sample(&mut self) -> Option<Sample> {
        let value = self.rng.random_range(self.min_value..=self.max_value);
        let delay_ns = self.rng.random_range(self.min_delay_ns..=self.max_delay_ns);
        Some(Sample {
            value,
            delay: Duration::from_nanos(delay_ns),
        })
    }
}

/// Nanoseconds of `d`, clamped to `u64::MAX` (about 584 years).
fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// A fixed script of samples, for replays and tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    samples: VecDeque<Sample>,
}

impl ScriptedGenerator {
    /// Emit `values` in order, each followed by the same delay.
    pub fn new(values: &[f64], delay: Duration) -> Self {
        Self {
            samples: values.iter().map(|&value| Sample { value, delay }).collect(),
        }
    }

    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl ValueGenerator for ScriptedGenerator {
    fn next_sample(&mut self) -> Option<Sample> {
        self.samples.pop_front()
    }
}

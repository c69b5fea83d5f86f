//! Bounded sample history with running sums

use std::collections::VecDeque;

/// One observed attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub duration_ms: f64,
    pub succeeded: bool,
}

/// Ring buffer of the most recent samples.
///
/// Sums over successful durations are maintained incrementally so that push
/// and every statistic are O(1).
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
    successes: usize,
    sum_ms: f64,
    sum_sq_ms: f64,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            successes: 0,
            sum_ms: 0.0,
            sum_sq_ms: 0.0,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            if let Some(old) = self.samples.pop_front() {
                self.forget(old);
            }
        }
        if sample.succeeded {
            self.successes += 1;
            self.sum_ms += sample.duration_ms;
            self.sum_sq_ms += sample.duration_ms * sample.duration_ms;
        }
        self.samples.push_back(sample);
    }

    fn forget(&mut self, old: Sample) {
        if old.succeeded {
            self.successes -= 1;
            self.sum_ms -= old.duration_ms;
            self.sum_sq_ms -= old.duration_ms * old.duration_ms;
        }
        if self.successes == 0 {
            self.sum_ms = 0.0;
            self.sum_sq_ms = 0.0;
        }
    }

    /// Attempts in the window
    pub fn attempts(&self) -> usize {
        self.samples.len()
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn failures(&self) -> usize {
        self.samples.len() - self.successes
    }

    /// Mean successful duration
    pub fn mean_ms(&self) -> Option<f64> {
        (self.successes > 0).then(|| self.sum_ms / self.successes as f64)
    }

    /// Population variance of successful durations
    pub fn variance_ms(&self) -> Option<f64> {
        let mean = self.mean_ms()?;
        Some((self.sum_sq_ms / self.successes as f64 - mean * mean).max(0.0))
    }

    /// Squared coefficient of variation of successful durations
    pub fn cv_squared(&self) -> Option<f64> {
        let mean = self.mean_ms()?;
        if mean <= 0.0 {
            return Some(0.0);
        }
        Some(self.variance_ms()? / (mean * mean))
    }
}

/// Successful-duration totals per hour of day
#[derive(Debug, Clone, Default)]
pub struct HourBuckets {
    count: [u64; 24],
    sum_ms: [f64; 24],
}

impl HourBuckets {
    pub fn record(&mut self, hour: u8, duration_ms: f64) {
        let h = (hour % 24) as usize;
        self.count[h] += 1;
        self.sum_ms[h] += duration_ms;
    }

    /// Ratio of the bucket mean to the all-hours mean, once the bucket has `min_samples`
    pub fn factor(&self, hour: u8, min_samples: usize) -> Option<f64> {
        let h = (hour % 24) as usize;
        if self.count[h] < min_samples.max(1) as u64 {
            return None;
        }
        let total: u64 = self.count.iter().sum();
        let total_ms: f64 = self.sum_ms.iter().sum();
        if total_ms <= 0.0 {
            return None;
        }
        let bucket_mean = self.sum_ms[h] / self.count[h] as f64;
        let overall_mean = total_ms / total as f64;
        Some((bucket_mean / overall_mean).clamp(0.25, 4.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(ms: f64) -> Sample {
        Sample {
            duration_ms: ms,
            succeeded: true,
        }
    }

    fn failed() -> Sample {
        Sample {
            duration_ms: 0.0,
            succeeded: false,
        }
    }

    #[test]
    fn test_running_statistics() {
        let mut window = SampleWindow::new(10);
        for ms in [100.0, 200.0, 300.0] {
            window.push(ok(ms));
        }
        window.push(failed());

        assert_eq!(window.attempts(), 4);
        assert_eq!(window.successes(), 3);
        assert_eq!(window.failures(), 1);
        assert_eq!(window.mean_ms(), Some(200.0));
        let variance = window.variance_ms().unwrap();
        assert!((variance - 20000.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = SampleWindow::new(3);
        window.push(failed());
        window.push(ok(10.0));
        window.push(ok(20.0));
        window.push(ok(30.0));

        assert_eq!(window.attempts(), 3);
        assert_eq!(window.failures(), 0);
        assert_eq!(window.mean_ms(), Some(20.0));

        window.push(failed());
        window.push(failed());
        window.push(failed());
        assert_eq!(window.successes(), 0);
        assert_eq!(window.mean_ms(), None);
    }

    #[test]
    fn test_hour_factor() {
        let mut hours = HourBuckets::default();
        for _ in 0..5 {
            hours.record(9, 200.0);
            hours.record(3, 100.0);
        }
        let busy = hours.factor(9, 5).unwrap();
        let quiet = hours.factor(3, 5).unwrap();
        assert!(busy > 1.0);
        assert!(quiet < 1.0);
        assert!(hours.factor(12, 5).is_none());
    }
}

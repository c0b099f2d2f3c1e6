// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

/// Loader and generator timing
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    pub total_time: Option<Duration>,
    pub batch_times: Vec<Duration>,
    pub batches: u64,
    pub samples: u64,
    pub files_generated: u64,
    pub bytes_written: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_total_time(&mut self, duration: Duration) {
        self.total_time = Some(duration);
    }

    /// One batch of `samples` delivered after `duration`.
    pub fn record_batch(&mut self, samples: usize, duration: Duration) {
        self.batch_times.push(duration);
        self.batches += 1;
        self.samples += samples as u64;
    }

    pub fn record_file_generated(&mut self, bytes: u64) {
        self.files_generated += 1;
        self.bytes_written += bytes;
    }

    pub fn average_batch_time(&self) -> Option<Duration> {
        if self.batch_times.is_empty() {
            return None;
        }
        let total: Duration = self.batch_times.iter().sum();
        Some(total / self.batch_times.len() as u32)
    }

    pub fn max_batch_time(&self) -> Option<Duration> {
        self.batch_times.iter().max().copied()
    }

    pub fn samples_per_second(&self) -> Option<f64> {
        let seconds = self.total_time?.as_secs_f64();
        (seconds > 0.0).then(|| self.samples as f64 / seconds)
    }

    /// Fold another run's numbers into this one; total times add up.
    pub fn merge(&mut self, other: &Metrics) {
        self.total_time = match (self.total_time, other.total_time) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.batch_times.extend_from_slice(&other.batch_times);
        self.batches += other.batches;
        self.samples += other.samples;
        self.files_generated += other.files_generated;
        self.bytes_written += other.bytes_written;
    }

    pub fn print_summary(&self, title: &str) {
        println!("\n=== {} ===", title);

        if let Some(total_time) = self.total_time {
            println!("Total Time: {:?}", total_time);
        }

        if self.batches > 0 {
            println!("Batches: {}", self.batches);
            println!("Samples: {}", self.samples);
        }
        if let Some(avg) = self.average_batch_time() {
            println!("Average Batch Time: {:?}", avg);
        }
        if let Some(max) = self.max_batch_time() {
            println!("Slowest Batch: {:?}", max);
        }
        if let Some(rate) = self.samples_per_second() {
            println!("Throughput: {:.1} samples/s", rate);
        }

        if self.files_generated > 0 {
            println!("Files Generated: {}", self.files_generated);
            // KB for smaller values, MB for larger ones
            if self.bytes_written < 1024 * 1024 {
                println!("Bytes Written: {:.2} KB", self.bytes_written as f64 / 1024.0);
            } else {
                println!("Bytes Written: {:.2} MB", self.bytes_written as f64 / (1024.0 * 1024.0));
            }
        }

        println!("{}\n", "=".repeat(title.len() + 8));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_statistics() {
        let mut metrics = Metrics::new();
        assert_eq!(metrics.average_batch_time(), None);
        assert_eq!(metrics.samples_per_second(), None);

        metrics.record_batch(32, Duration::from_millis(10));
        metrics.record_batch(16, Duration::from_millis(30));
        metrics.record_total_time(Duration::from_secs(2));

        assert_eq!(metrics.batches, 2);
        assert_eq!(metrics.samples, 48);
        assert_eq!(metrics.average_batch_time(), Some(Duration::from_millis(20)));
        assert_eq!(metrics.max_batch_time(), Some(Duration::from_millis(30)));
        assert_eq!(metrics.samples_per_second(), Some(24.0));
    }

    #[test]
    fn merge_adds_up() {
        let mut a = Metrics::new();
        a.record_batch(4, Duration::from_millis(1));
        a.record_total_time(Duration::from_secs(1));
        let mut b = Metrics::new();
        b.record_file_generated(100);
        b.record_total_time(Duration::from_secs(3));

        a.merge(&b);
        assert_eq!(a.total_time, Some(Duration::from_secs(4)));
        assert_eq!((a.samples, a.files_generated, a.bytes_written), (4, 1, 100));
    }
}

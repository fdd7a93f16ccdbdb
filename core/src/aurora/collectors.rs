//! Sampled metric collectors feeding Aurora's threshold evaluator (§4.4).
//!
//! Every `record_*` method takes an explicit `now_ms` rather than reading
//! the wall clock itself, so tests can drive deterministic threshold
//! crossings without sleeping (the `ManualClock` pattern from the test
//! harness). Production callers pass `chrono::Utc::now().timestamp_millis()`.

use super::ring_buffer::RingBuffer;
use std::collections::HashMap;

const DEFAULT_WINDOW: usize = 300; // 300 samples at the default 1s cadence = 5 minutes

#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub at_ms: i64,
    pub value: f64,
}

/// Process-level resource collector: CPU%, RAM%, RAM-trend, disk%.
pub struct ProcessCollector {
    cpu: RingBuffer<Sample>,
    ram: RingBuffer<Sample>,
    disk: RingBuffer<Sample>,
}

impl ProcessCollector {
    pub fn new() -> Self {
        Self {
            cpu: RingBuffer::new(DEFAULT_WINDOW),
            ram: RingBuffer::new(DEFAULT_WINDOW),
            disk: RingBuffer::new(DEFAULT_WINDOW),
        }
    }

    pub fn record_cpu(&mut self, at_ms: i64, pct: f64) {
        self.cpu.push(Sample { at_ms, value: pct });
    }

    pub fn record_ram(&mut self, at_ms: i64, pct: f64) {
        self.ram.push(Sample { at_ms, value: pct });
    }

    pub fn record_disk(&mut self, at_ms: i64, pct: f64) {
        self.disk.push(Sample { at_ms, value: pct });
    }

    /// Seconds the CPU has been continuously above `threshold_pct`, ending
    /// at the most recent sample.
    pub fn cpu_seconds_above(&self, threshold_pct: f64) -> f64 {
        seconds_continuously_above(&self.cpu, threshold_pct)
    }

    pub fn latest_ram_pct(&self) -> Option<f64> {
        self.ram.back().map(|s| s.value)
    }

    pub fn latest_disk_pct(&self) -> Option<f64> {
        self.disk.back().map(|s| s.value)
    }

    /// RAM growth in percentage points over the trailing `window_ms`.
    pub fn ram_trend_pct(&self, window_ms: i64) -> f64 {
        let Some(latest) = self.ram.back() else { return 0.0 };
        let floor_at = latest.at_ms - window_ms;
        let baseline = self
            .ram
            .iter()
            .find(|s| s.at_ms >= floor_at)
            .map(|s| s.value)
            .unwrap_or(latest.value);
        latest.value - baseline
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn seconds_continuously_above(buf: &RingBuffer<Sample>, threshold: f64) -> f64 {
    let mut iter = buf.iter().rev();
    let Some(latest) = iter.next() else { return 0.0 };
    if latest.value <= threshold {
        return 0.0;
    }
    let mut earliest_at = latest.at_ms;
    for sample in iter {
        if sample.value <= threshold {
            break;
        }
        earliest_at = sample.at_ms;
    }
    ((latest.at_ms - earliest_at).max(0) as f64) / 1000.0
}

/// Per-execution collector: step duration vs estimate, error rate, repeat
/// actions, running success ratio.
#[derive(Default)]
pub struct ExecutionCollector {
    errors: RingBuffer<Sample>,
    action_counts: HashMap<String, RingBuffer<Sample>>,
    outcomes: RingBuffer<bool>,
}

impl ExecutionCollector {
    pub fn new() -> Self {
        Self {
            errors: RingBuffer::new(DEFAULT_WINDOW),
            action_counts: HashMap::new(),
            outcomes: RingBuffer::new(DEFAULT_WINDOW),
        }
    }

    pub fn record_error(&mut self, at_ms: i64) {
        self.errors.push(Sample { at_ms, value: 1.0 });
    }

    pub fn errors_per_minute(&self, now_ms: i64) -> f64 {
        let floor_at = now_ms - 60_000;
        self.errors.iter().filter(|s| s.at_ms >= floor_at).count() as f64
    }

    pub fn record_action(&mut self, at_ms: i64, normalized_key: &str) {
        self.action_counts
            .entry(normalized_key.to_string())
            .or_insert_with(|| RingBuffer::new(DEFAULT_WINDOW))
            .push(Sample { at_ms, value: 1.0 });
    }

    /// Count of `normalized_key` occurrences within the trailing `window_ms`.
    pub fn repeat_count(&self, normalized_key: &str, now_ms: i64, window_ms: i64) -> usize {
        let floor_at = now_ms - window_ms;
        self.action_counts
            .get(normalized_key)
            .map(|buf| buf.iter().filter(|s| s.at_ms >= floor_at).count())
            .unwrap_or(0)
    }

    pub fn record_outcome(&mut self, success: bool) {
        self.outcomes.push(success);
    }

    pub fn success_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let successes = self.outcomes.iter().filter(|s| **s).count();
        successes as f64 / self.outcomes.len() as f64
    }
}

/// Per-origin channel collector: inbound latency, disconnects.
#[derive(Default)]
pub struct ChannelCollector {
    latencies: HashMap<String, RingBuffer<Sample>>,
    disconnects: HashMap<String, u64>,
}

impl ChannelCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_latency(&mut self, origin: &str, at_ms: i64, latency_ms: f64) {
        self.latencies
            .entry(origin.to_string())
            .or_insert_with(|| RingBuffer::new(DEFAULT_WINDOW))
            .push(Sample {
                at_ms,
                value: latency_ms,
            });
    }

    pub fn record_disconnect(&mut self, origin: &str) {
        *self.disconnects.entry(origin.to_string()).or_insert(0) += 1;
    }

    pub fn disconnect_count(&self, origin: &str) -> u64 {
        self.disconnects.get(origin).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_seconds_above_counts_continuous_run() {
        let mut collector = ProcessCollector::new();
        collector.record_cpu(0, 50.0);
        collector.record_cpu(1_000, 95.0);
        collector.record_cpu(2_000, 95.0);
        collector.record_cpu(3_000, 95.0);
        assert_eq!(collector.cpu_seconds_above(80.0), 2.0);
    }

    #[test]
    fn ram_trend_reports_growth_over_window() {
        let mut collector = ProcessCollector::new();
        collector.record_ram(0, 40.0);
        collector.record_ram(180_000, 65.0);
        assert!((collector.ram_trend_pct(180_000) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn repeat_count_fires_at_exact_threshold() {
        let mut collector = ExecutionCollector::new();
        for i in 0..20 {
            collector.record_action(i * 100, "hub::loop_child");
        }
        assert_eq!(collector.repeat_count("hub::loop_child", 2_000, 10_000), 20);
    }
}

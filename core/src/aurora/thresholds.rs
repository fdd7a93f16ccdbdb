//! Threshold table translating raw collector readings into guardrail
//! signals (§4.4 "Thresholds"). Pure and side-effect free so it can be
//! exercised deterministically in tests; `Monitor` is the stateful shell
//! around it that turns signals into `AuroraEvent`s and live-gate actions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Healthy,
    Alert,
    Throttle,
    Cut,
    SafeMode,
    Pause,
}

pub fn cpu_signal(seconds_above_80: f64, seconds_above_90: f64) -> Signal {
    if seconds_above_90 >= 120.0 {
        Signal::Cut
    } else if seconds_above_80 >= 60.0 {
        Signal::Throttle
    } else {
        Signal::Healthy
    }
}

pub fn ram_signal(ram_pct: f64, ram_trend_pct_180s: f64) -> Signal {
    if ram_pct >= 95.0 || ram_trend_pct_180s >= 20.0 {
        Signal::Cut
    } else if ram_pct >= 85.0 {
        Signal::Alert
    } else {
        Signal::Healthy
    }
}

pub fn disk_signal(disk_pct: f64) -> Signal {
    if disk_pct >= 95.0 {
        // blocks new writes; the executor treats this like a deny on
        // write-class steps rather than a full cut.
        Signal::Cut
    } else if disk_pct >= 90.0 {
        Signal::Alert
    } else {
        Signal::Healthy
    }
}

pub fn step_duration_signal(actual_ms: u64, estimated_ms: u64) -> Signal {
    if estimated_ms == 0 {
        return Signal::Healthy;
    }
    let ratio = actual_ms as f64 / estimated_ms as f64;
    if ratio > 5.0 {
        Signal::Cut
    } else if ratio > 3.0 {
        Signal::Alert
    } else {
        Signal::Healthy
    }
}

pub fn error_rate_signal(errors_per_minute: f64) -> Signal {
    if errors_per_minute > 10.0 {
        Signal::SafeMode
    } else if errors_per_minute > 5.0 {
        Signal::Alert
    } else {
        Signal::Healthy
    }
}

pub fn loop_signal(repeat_count: usize) -> Signal {
    if repeat_count >= 20 {
        Signal::Cut
    } else if repeat_count >= 10 {
        Signal::Alert
    } else {
        Signal::Healthy
    }
}

pub fn success_ratio_signal(ratio: f64) -> Signal {
    if ratio < 0.5 {
        Signal::Pause
    } else if ratio < 0.8 {
        Signal::Alert
    } else {
        Signal::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_throttles_at_60s_and_cuts_at_120s() {
        assert_eq!(cpu_signal(59.0, 0.0), Signal::Healthy);
        assert_eq!(cpu_signal(60.0, 0.0), Signal::Throttle);
        assert_eq!(cpu_signal(120.0, 120.0), Signal::Cut);
    }

    #[test]
    fn loop_detector_fires_on_kth_not_k_minus_one() {
        assert_eq!(loop_signal(9), Signal::Healthy);
        assert_eq!(loop_signal(10), Signal::Alert);
        assert_eq!(loop_signal(19), Signal::Alert);
        assert_eq!(loop_signal(20), Signal::Cut);
    }

    #[test]
    fn ram_leak_signature_cuts_on_trend_alone() {
        assert_eq!(ram_signal(70.0, 20.0), Signal::Cut);
        assert_eq!(ram_signal(70.0, 19.9), Signal::Healthy);
    }
}

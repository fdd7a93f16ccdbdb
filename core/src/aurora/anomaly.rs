//! Anomaly/loop detector: a moving histogram of `(action_type,
//! normalized_params_hash)` over a window; `K` repetitions in `< T`
//! seconds trigger a LOOP alert, `2K` a cut (see `thresholds::loop_signal`).

use super::collectors::ExecutionCollector;
use super::thresholds::{loop_signal, Signal};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const WINDOW_MS: i64 = 10_000;

/// Normalize `(action_type, params)` into a stable histogram key so that
/// structurally-identical calls collapse to the same bucket regardless of
/// field ordering in `params`.
pub fn normalized_key(action_type: &str, params: &serde_json::Value) -> String {
    let mut hasher = DefaultHasher::new();
    action_type.hash(&mut hasher);
    canonical_json(params).hash(&mut hasher);
    format!("{action_type}#{:x}", hasher.finish())
}

fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{k}:{}", canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

pub struct LoopDetector;

impl LoopDetector {
    /// Record one occurrence and return the current signal for this key.
    pub fn observe(
        collector: &mut ExecutionCollector,
        action_type: &str,
        params: &serde_json::Value,
        now_ms: i64,
    ) -> Signal {
        let key = normalized_key(action_type, params);
        collector.record_action(now_ms, &key);
        let count = collector.repeat_count(&key, now_ms, WINDOW_MS);
        loop_signal(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalized_key_ignores_field_order() {
        let a = normalized_key("exec.shell", &json!({"a": 1, "b": 2}));
        let b = normalized_key("exec.shell", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_identical_calls_trigger_cut_at_twentieth() {
        let mut collector = ExecutionCollector::new();
        let params = json!({"path": "/tmp/x"});
        let mut last = Signal::Healthy;
        for i in 0..20 {
            last = LoopDetector::observe(&mut collector, "file.write", &params, i * 100);
        }
        assert_eq!(last, Signal::Cut);
    }
}

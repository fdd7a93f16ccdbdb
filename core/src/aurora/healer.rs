//! Auto-healer: the tiered recovery invoked when a `CUT` fires (§4.4).

use crate::types::{ExecutionId, ExecutionRecord, ExecutionStatus, Origin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Rolled back to the last checkpoint and awaiting human resume.
    AwaitingResume,
    /// No confirmation channel available; execution is terminally failed.
    Failed,
}

pub struct AutoHealer;

impl AutoHealer {
    /// Tiered recovery: (1) the caller has already stopped the executor by
    /// the time this runs, (2) roll to the last checkpoint, (3) if the
    /// origin supports confirmation, hand back to the human; otherwise
    /// mark the execution failed.
    pub fn recover(record: &mut ExecutionRecord, origin: Origin, execution_id: &ExecutionId) -> RecoveryOutcome {
        debug_assert_eq!(&record.execution_id, execution_id);

        let supports_confirmation = matches!(origin, Origin::Cockpit | Origin::Telegram | Origin::Cli);

        if supports_confirmation {
            record.status = ExecutionStatus::Paused;
            RecoveryOutcome::AwaitingResume
        } else {
            record.status = ExecutionStatus::Failed;
            record.error = Some("cut by aurora, no confirmation channel available".to_string());
            record.completed_at = Some(chrono::Utc::now().timestamp_millis());
            RecoveryOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_origin_has_no_confirmation_channel() {
        let mut record = ExecutionRecord::new("e1".into(), "p1".into());
        let outcome = AutoHealer::recover(&mut record, Origin::Api, &"e1".to_string());
        assert_eq!(outcome, RecoveryOutcome::Failed);
        assert_eq!(record.status, ExecutionStatus::Failed);
    }

    #[test]
    fn cockpit_origin_awaits_human_resume() {
        let mut record = ExecutionRecord::new("e1".into(), "p1".into());
        let outcome = AutoHealer::recover(&mut record, Origin::Cockpit, &"e1".to_string());
        assert_eq!(outcome, RecoveryOutcome::AwaitingResume);
        assert_eq!(record.status, ExecutionStatus::Paused);
    }
}

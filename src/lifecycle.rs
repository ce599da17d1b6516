//! Lifecycle phases for one-shot operator notices.

/// `NotStarted -> Running -> Done`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    NotStarted,
    Running,
    Done,
}

impl Phase {
    /// Move to `Running`. Returns `true` only on the `NotStarted -> Running`
    /// transition, which is where one-time notices are emitted.
    pub fn start(&mut self) -> bool {
        match self {
            Phase::NotStarted => {
                *self = Phase::Running;
                true
            }
            Phase::Running | Phase::Done => false,
        }
    }

    pub fn finish(&mut self) {
        *self = Phase::Done;
    }

    pub fn is_running(&self) -> bool {
        *self == Phase::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_fires_once() {
        let mut phase = Phase::default();
        assert!(phase.start());
        assert!(phase.is_running());
        assert!(!phase.start());
        assert!(!phase.start());
    }

    #[test]
    fn test_done_does_not_restart() {
        let mut phase = Phase::NotStarted;
        phase.finish();
        assert!(!phase.start());
        assert_eq!(phase, Phase::Done);
    }
}

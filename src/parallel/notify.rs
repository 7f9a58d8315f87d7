use crossbeam::channel::{Receiver, Sender, bounded};

/// One-shot "runner finished" signal.
///
/// The channel carries a single `true`; firing drops the only sender, so after
/// the value is taken every receiver sees a disconnected channel instead of
/// blocking. Re-arming swaps in a brand new channel.
pub(crate) struct FinishNotifier {
    enabled: bool,
    state: State,
    receiver: Receiver<bool>,
}

enum State {
    Armed(Sender<bool>),
    Fired,
}

impl FinishNotifier {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            enabled: false,
            state: State::Armed(sender),
            receiver,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn is_fired(&self) -> bool {
        matches!(self.state, State::Fired)
    }

    /// Enable with a fresh channel, or disable without touching the current one.
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            self.rearm();
        }
    }

    pub(crate) fn rearm(&mut self) {
        let (sender, receiver) = bounded(1);
        self.state = State::Armed(sender);
        self.receiver = receiver;
    }

    pub(crate) fn receiver(&self) -> Receiver<bool> {
        self.receiver.clone()
    }

    /// Deliver the signal. Returns false when disabled or already fired.
    pub(crate) fn fire(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        match std::mem::replace(&mut self.state, State::Fired) {
            State::Armed(sender) => {
                // Capacity 1 and a single send per channel: never full.
                let _ = sender.try_send(true);
                true
            }
            State::Fired => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_disabled_notifier_never_fires() {
        let mut notifier = FinishNotifier::new();
        assert!(!notifier.fire());
        assert!(notifier.receiver().try_recv().is_err());
    }

    #[test]
    fn test_fires_exactly_once() {
        let mut notifier = FinishNotifier::new();
        notifier.set_enabled(true);
        let receiver = notifier.receiver();

        assert!(notifier.fire());
        assert!(!notifier.fire());
        assert!(notifier.is_fired());

        assert_eq!(receiver.recv_timeout(Duration::from_secs(1)), Ok(true));
        // Closed afterwards: returns immediately instead of blocking.
        assert!(receiver.recv().is_err());
    }

    #[test]
    fn test_rearm_creates_new_channel() {
        let mut notifier = FinishNotifier::new();
        notifier.set_enabled(true);
        let first = notifier.receiver();
        notifier.fire();

        notifier.rearm();
        assert!(!notifier.is_fired());
        let second = notifier.receiver();
        assert!(second.try_recv().is_err());

        assert!(notifier.fire());
        assert_eq!(first.recv(), Ok(true));
        assert_eq!(second.recv(), Ok(true));
    }
}

//! A debug event sink, decoupling the protocol implementation from
//! wherever its diagnostic events end up displayed. The production
//! implementation forwards to the `log` crate.

/// Verbosity levels used throughout the core:
/// 1 = session milestone, 2 = bring-up detail, 3 = byte/line detail.
pub const LEVEL_MILESTONE: u8 = 1;
/// Bring-up detail, e.g. individual reconnection attempts.
pub const LEVEL_BRINGUP: u8 = 2;
/// Byte/line level detail, e.g. raw lines read from the port.
pub const LEVEL_WIRE: u8 = 3;

/// A sink for debug events. Delivery is assumed synchronous and
/// non-throwing.
pub trait Notifier {
    /// Emit a debug event at the given verbosity level.
    fn debug(&self, level: u8, message: &str);
}

/// Default `Notifier` that forwards to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn debug(&self, level: u8, message: &str) {
        match level {
            LEVEL_MILESTONE => log::info!("{}", message),
            LEVEL_BRINGUP => log::debug!("{}", message),
            _ => log::trace!("{}", message),
        }
    }
}

/// `Notifier` that discards everything. Useful for tests that don't
/// want log output cluttering the test harness.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn debug(&self, _level: u8, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNotifier {
        events: RefCell<Vec<(u8, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn debug(&self, level: u8, message: &str) {
            self.events.borrow_mut().push((level, message.to_string()));
        }
    }

    #[test]
    fn records_all_levels() {
        let n = RecordingNotifier::default();
        n.debug(LEVEL_MILESTONE, "opening port");
        n.debug(LEVEL_BRINGUP, "retrying");
        n.debug(LEVEL_WIRE, "7E8 06 41 00");

        let events = n.events.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], (1, "opening port".to_string()));
        assert_eq!(events[2].0, LEVEL_WIRE);
    }

    #[test]
    fn null_notifier_is_silent() {
        // mostly exercised for coverage; must not panic.
        NullNotifier.debug(1, "ignored");
    }
}

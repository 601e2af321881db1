//! Session state: the values established once at connection time and
//! held for the life of the connection.

use crate::frame::EcuAddress;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The interface opened and at least one ECU answered during
    /// bring-up.
    Connected,
    /// The interface failed to open, or no ECU answered within the
    /// configured retry budget.
    Disconnected,
}

/// Tunables for session bring-up.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Serial baud rate, e.g. `38400` for a typical USB ELM327 clone.
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds.
    pub timeout_ms: u32,
    /// Number of reconnect attempts before giving up and surfacing
    /// `ObdError::BringUpTimeout`.
    pub reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { baud_rate: 38400, timeout_ms: 2000, reconnect_attempts: 3 }
    }
}

/// Bring-up results and ambient session state, held alongside the
/// transport and updated once during `Service::connect`.
#[derive(Debug, Clone)]
pub struct Session {
    /// ELM327 firmware version string reported by `ATZ`, e.g. `"ELM327 v1.5"`.
    pub elm_version: String,
    /// Raw protocol name reported by `ATDP`, e.g. `"ISO 15765-4 (CAN 11/500)"`.
    pub protocol: String,
    /// Whether `protocol` names a CAN variant, matched
    /// case-insensitively against the substring `"CAN"`.
    pub prot_is_can: bool,
    /// Sorted list of ECU addresses that answered `0100` during bring-up.
    pub ecu_addresses: Vec<EcuAddress>,
    /// Current connection state.
    pub state: State,
}

impl Session {
    /// A session in the not-yet-connected state, before bring-up runs.
    pub fn disconnected() -> Self {
        Self {
            elm_version: "Unknown".to_string(),
            protocol: String::new(),
            prot_is_can: false,
            ecu_addresses: Vec::new(),
            state: State::Disconnected,
        }
    }

    /// Index of the given ECU within `ecu_addresses`, or `0` if not
    /// present.
    pub fn ecu_num(&self, ecu: &EcuAddress) -> usize {
        self.ecu_addresses.iter().position(|e| e == ecu).unwrap_or(0)
    }

    /// Whether bring-up completed with at least one responding ECU.
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_session_has_unknown_version_and_no_ecus() {
        let s = Session::disconnected();
        assert_eq!(s.elm_version, "Unknown");
        assert!(!s.is_connected());
        assert!(s.ecu_addresses.is_empty());
    }

    #[test]
    fn ecu_num_falls_back_to_zero_for_unknown_ecu() {
        let mut s = Session::disconnected();
        s.ecu_addresses = vec![EcuAddress::new("7E8"), EcuAddress::new("7E9")];
        assert_eq!(s.ecu_num(&EcuAddress::new("7E9")), 1);
        assert_eq!(s.ecu_num(&EcuAddress::new("7EA")), 0);
    }

    #[test]
    fn default_config_matches_typical_elm327_clone() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.baud_rate, 38400);
        assert!(cfg.reconnect_attempts > 0);
    }
}

//! Structured decode of PID `0101` ("Status Since DTCs Cleared") into
//! the MIL state, stored DTC count, and per-monitor pass/fail status,
//! against the public SAE J1979 byte layout for bytes B/C/D.

use std::collections::BTreeMap;

/// One of the three continuously-monitored systems (byte B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContinuousTest {
    /// Misfire monitoring.
    Misfire,
    /// Fuel system monitoring.
    FuelSystem,
    /// Comprehensive components monitoring.
    Components,
}

/// One of the eight non-continuously-monitored systems (bytes C/D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NonContinuousTest {
    /// Catalyst monitoring.
    Catalyst,
    /// Heated catalyst monitoring.
    HeatedCatalyst,
    /// Evaporative system monitoring.
    EvaporativeSystem,
    /// Secondary air system monitoring.
    SecondaryAirSystem,
    /// A/C refrigerant monitoring.
    AcRefrigerant,
    /// Oxygen sensor monitoring.
    OxygenSensor,
    /// Oxygen sensor heater monitoring.
    OxygenSensorHeater,
    /// EGR system monitoring.
    EgrSystem,
}

const NON_CONTINUOUS: [NonContinuousTest; 8] = [
    NonContinuousTest::Catalyst,
    NonContinuousTest::HeatedCatalyst,
    NonContinuousTest::EvaporativeSystem,
    NonContinuousTest::SecondaryAirSystem,
    NonContinuousTest::AcRefrigerant,
    NonContinuousTest::OxygenSensor,
    NonContinuousTest::OxygenSensorHeater,
    NonContinuousTest::EgrSystem,
];

/// Tri-state result of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    /// The vehicle does not implement this monitor.
    NotApplicable,
    /// The monitor ran and passed.
    Complete,
    /// The monitor has not yet completed/passed this drive cycle.
    Failed,
}

/// Structured decode of PID `0101`'s 4-byte payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStatus {
    /// Number of stored DTCs, from byte A bits 0-6.
    pub dtc_count: u8,
    /// MIL ("check engine light") state, from byte A bit 7.
    pub mil_on: bool,
    /// Misfire/fuel system/components monitor outcomes (byte B).
    pub continuous: BTreeMap<ContinuousTest, TestOutcome>,
    /// The eight non-continuous monitor outcomes (bytes C, D).
    pub non_continuous: BTreeMap<NonContinuousTest, TestOutcome>,
}

/// Decode a 4-byte PID `0101` payload (A, B, C, D).
pub fn decode(payload: &[u8]) -> Option<MonitorStatus> {
    if payload.len() < 4 {
        return None;
    }

    let (a, b, c, d) = (payload[0], payload[1], payload[2], payload[3]);

    let mut continuous = BTreeMap::new();
    for (bit, test) in [
        (0u8, ContinuousTest::Misfire),
        (1, ContinuousTest::FuelSystem),
        (2, ContinuousTest::Components),
    ] {
        let supported = (b >> bit) & 1 == 1;
        let not_complete = (b >> (bit + 4)) & 1 == 1;
        continuous.insert(test, outcome(supported, not_complete));
    }

    let mut non_continuous = BTreeMap::new();
    for (bit, test) in NON_CONTINUOUS.iter().enumerate() {
        let supported = (c >> bit) & 1 == 1;
        let not_complete = (d >> bit) & 1 == 1;
        non_continuous.insert(*test, outcome(supported, not_complete));
    }

    Some(MonitorStatus { dtc_count: a & 0x7F, mil_on: a & 0x80 != 0, continuous, non_continuous })
}

fn outcome(supported: bool, not_complete: bool) -> TestOutcome {
    if !supported {
        TestOutcome::NotApplicable
    } else if not_complete {
        TestOutcome::Failed
    } else {
        TestOutcome::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mil_and_dtc_count() {
        let status = decode(&[0x83, 0x00, 0x00, 0x00]).unwrap();
        assert!(status.mil_on);
        assert_eq!(status.dtc_count, 3);
    }

    #[test]
    fn unsupported_monitor_is_not_applicable() {
        let status = decode(&[0x00, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(status.continuous[&ContinuousTest::Misfire], TestOutcome::NotApplicable);
        assert_eq!(status.non_continuous[&NonContinuousTest::Catalyst], TestOutcome::NotApplicable);
    }

    #[test]
    fn supported_and_complete_monitor_reports_complete() {
        // Misfire supported (bit0) and complete (bit4 not set).
        let status = decode(&[0x00, 0b0000_0001, 0x00, 0x00]).unwrap();
        assert_eq!(status.continuous[&ContinuousTest::Misfire], TestOutcome::Complete);
    }

    #[test]
    fn supported_but_not_yet_complete_monitor_reports_failed() {
        // Misfire supported (bit0) and not complete (bit4 set).
        let status = decode(&[0x00, 0b0001_0001, 0x00, 0x00]).unwrap();
        assert_eq!(status.continuous[&ContinuousTest::Misfire], TestOutcome::Failed);
    }

    #[test]
    fn non_continuous_tests_use_separate_supported_and_incomplete_bytes() {
        // EGR (bit7) supported in byte C, not complete in byte D.
        let status = decode(&[0x00, 0x00, 0b1000_0000, 0b1000_0000]).unwrap();
        assert_eq!(status.non_continuous[&NonContinuousTest::EgrSystem], TestOutcome::Failed);
    }

    #[test]
    fn short_payload_is_rejected() {
        assert!(decode(&[0x00, 0x00, 0x00]).is_none());
    }
}

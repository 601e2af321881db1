//! The mode 01 PID catalog: a static table mapping a 2-byte
//! service+PID command to (display name, decoder, unit, expected
//! payload byte count), plus the decoder functions themselves.

use crate::hexutil::{bytes_to_bitstring, signed_offset_128};
use std::collections::BTreeMap;

/// A decoder is a pure function from a PID's raw payload bytes to a
/// formatted engineering-unit string. Decoders must not read past
/// their sensor's declared `length`.
pub type Decoder = fn(&[u8]) -> String;

/// One entry in the PID catalog.
#[derive(Clone, Copy)]
pub struct Sensor {
    /// Human-readable name, e.g. "Engine RPM".
    pub name: &'static str,
    /// Full 4-char command, e.g. "010C" (mode + PID).
    pub cmd: &'static str,
    /// Decoder function.
    pub decoder: Decoder,
    /// Unit label, e.g. "RPM". Empty string if unitless/structured.
    pub unit: &'static str,
    /// Declared payload length in bytes. Mutable for a small subset
    /// (fuel trims on banks 2-4) via `LengthOverlay`, never in place.
    pub length: u8,
}

impl Sensor {
    /// The PID byte (second byte of `cmd`).
    pub fn pid(&self) -> u8 {
        u8::from_str_radix(&self.cmd[2..4], 16).unwrap()
    }

    /// The mode byte (first byte of `cmd`).
    pub fn mode(&self) -> &'static str {
        &self.cmd[0..2]
    }
}

fn temp(code: &[u8]) -> String {
    (code[0] as i16 - 40).to_string()
}

fn percent_scale(code: &[u8]) -> String {
    format!("{:.1}", code[0] as f64 * 100.0 / 255.0)
}

fn fuel_trim_percent(code: &[u8]) -> String {
    format!("{:.1}", signed_offset_128(code[0]) as f64 * 100.0 / 128.0)
}

fn fuel_pres(code: &[u8]) -> String {
    format!("{:.3}", code[0] as f64 * 0.43511)
}

fn intake_m_pres(code: &[u8]) -> String {
    format!("{:.3}", code[0] as f64 * 0.14504)
}

fn rpm(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    (v / 4).to_string()
}

fn speed(code: &[u8]) -> String {
    format!("{:.1}", code[0] as f64 / 1.609)
}

fn timing_advance(code: &[u8]) -> String {
    format!("{:.1}", (code[0] as f64 - 128.0) / 2.0)
}

fn maf(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.3}", v as f64 * 0.00132276)
}

fn throttle_pos(code: &[u8]) -> String {
    format!("{:.1}", code[0] as f64 * 100.0 / 255.0)
}

fn cpass(code: &[u8]) -> String {
    code.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join("")
}

fn sensor_voltage(code: &[u8]) -> String {
    format!("{:.3}", code[0] as f64 * 0.005)
}

fn hex_to_bitstring_decoder(code: &[u8]) -> String {
    bytes_to_bitstring(code)
}

fn sec_to_min(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    (v / 60).to_string()
}

fn km_to_mi(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.1}", v as f64 * 0.6)
}

fn rel_fuel_pres(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.3}", v as f64 * 0.14504 * 0.079)
}

fn fuel_pres_10(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.3}", v as f64 * 1.4504)
}

fn eq_ratio(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.4}", v as f64 * 0.0000305)
}

fn hex_to_int_decoder(code: &[u8]) -> String {
    let mut v: u64 = 0;
    for b in code {
        v = (v << 8) | *b as u64;
    }
    v.to_string()
}

fn evap_pres(code: &[u8]) -> String {
    let raw = ((code[0] as i32) << 8) + code[1] as i32;
    let signed = if raw < 32768 { raw } else { raw - 65535 };
    format!("{:.2}", signed as f64 / 4.0)
}

fn evap_pres2(code: &[u8]) -> String {
    let raw = ((code[0] as i32) << 8) + code[1] as i32;
    let signed = if raw < 32768 { raw } else { raw - 65535 };
    signed.to_string()
}

fn ol_cl_byte(byte: u8) -> &'static str {
    match byte {
        1 => "OL",
        2 => "CL",
        4 => "OL-Drive",
        8 => "OL-Fault",
        16 => "CL-Fault",
        _ => "UNKNOWN",
    }
}

fn ol_cl(code: &[u8]) -> String {
    format!(
        "Fuel System 1: {}; Fuel System 2: {}",
        ol_cl_byte(code[0]),
        ol_cl_byte(code[1])
    )
}

fn cm_voltage(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.3}", v as f64 * 0.001)
}

fn abs_load_percent(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.1}", v as f64 * 100.0 / 255.0)
}

fn abs_vapor_pres(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.5}", v as f64 * 0.005 * 0.14504)
}

fn fuel_rate(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.2}", v as f64 * 0.05 * 0.264172)
}

fn req_torque(code: &[u8]) -> String {
    (code[0] as i16 - 125).to_string()
}

fn ref_torque(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.1}", v as f64 * 0.737562)
}

fn injection_timing(code: &[u8]) -> String {
    let v = ((code[0] as u32) << 8) + code[1] as u32;
    format!("{:.3}", (v as f64 - 38665.0) / 128.0)
}

fn dtc_status_display(code: &[u8]) -> String {
    // Display-only rendering; the structured record comes from
    // monitor::decode.
    let a = code[0];
    format!("DTCs: {}, MIL: {}", a & 0x7f, if a & 0x80 != 0 { "on" } else { "off" })
}

/// Full mode-01-rooted PID catalog, in PID order starting at `0100`.
pub static SENSORS: &[Sensor] = &[
    Sensor { name: "Supported PIDs", cmd: "0100", decoder: hex_to_bitstring_decoder, unit: "", length: 4 },
    Sensor { name: "Status Since DTC Cleared", cmd: "0101", decoder: dtc_status_display, unit: "", length: 4 },
    Sensor { name: "DTC Causing Freeze Frame", cmd: "0102", decoder: cpass, unit: "", length: 2 },
    Sensor { name: "Fuel System Status", cmd: "0103", decoder: ol_cl, unit: "", length: 2 },
    Sensor { name: "Calculated Load Value", cmd: "0104", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Coolant Temperature", cmd: "0105", decoder: temp, unit: "C", length: 1 },
    Sensor { name: "Short Term Fuel Trim - Bank 1", cmd: "0106", decoder: fuel_trim_percent, unit: "%", length: 1 },
    Sensor { name: "Long Term Fuel Trim - Bank 1", cmd: "0107", decoder: fuel_trim_percent, unit: "%", length: 1 },
    Sensor { name: "Short Term Fuel Trim - Bank 2", cmd: "0108", decoder: fuel_trim_percent, unit: "%", length: 1 },
    Sensor { name: "Long Term Fuel Trim - Bank 2", cmd: "0109", decoder: fuel_trim_percent, unit: "%", length: 1 },
    Sensor { name: "Fuel Rail Pressure", cmd: "010A", decoder: fuel_pres, unit: "psi", length: 1 },
    Sensor { name: "Intake Manifold Pressure", cmd: "010B", decoder: intake_m_pres, unit: "psi", length: 1 },
    Sensor { name: "Engine RPM", cmd: "010C", decoder: rpm, unit: "RPM", length: 2 },
    Sensor { name: "Vehicle Speed", cmd: "010D", decoder: speed, unit: "MPH", length: 1 },
    Sensor { name: "Timing Advance", cmd: "010E", decoder: timing_advance, unit: "degrees", length: 1 },
    Sensor { name: "Intake Air Temp", cmd: "010F", decoder: temp, unit: "C", length: 1 },
    Sensor { name: "Air Flow Rate (MAF)", cmd: "0110", decoder: maf, unit: "lb/min", length: 2 },
    Sensor { name: "Throttle Position", cmd: "0111", decoder: throttle_pos, unit: "%", length: 1 },
    Sensor { name: "Secondary Air Status", cmd: "0112", decoder: cpass, unit: "", length: 1 },
    Sensor { name: "Location of O2 sensors", cmd: "0113", decoder: cpass, unit: "", length: 1 },
    Sensor { name: "O2 Sensor: 1 - 1", cmd: "0114", decoder: sensor_voltage, unit: "V", length: 2 },
    Sensor { name: "O2 Sensor: 1 - 2", cmd: "0115", decoder: sensor_voltage, unit: "V", length: 2 },
    Sensor { name: "O2 Sensor: 1 - 3", cmd: "0116", decoder: sensor_voltage, unit: "V", length: 2 },
    Sensor { name: "O2 Sensor: 1 - 4", cmd: "0117", decoder: sensor_voltage, unit: "V", length: 2 },
    Sensor { name: "O2 Sensor: 2 - 1", cmd: "0118", decoder: sensor_voltage, unit: "V", length: 2 },
    Sensor { name: "O2 Sensor: 2 - 2", cmd: "0119", decoder: sensor_voltage, unit: "V", length: 2 },
    Sensor { name: "O2 Sensor: 2 - 3", cmd: "011A", decoder: sensor_voltage, unit: "V", length: 2 },
    Sensor { name: "O2 Sensor: 2 - 4", cmd: "011B", decoder: sensor_voltage, unit: "V", length: 2 },
    Sensor { name: "OBD Designation", cmd: "011C", decoder: cpass, unit: "", length: 1 },
    Sensor { name: "Location of O2 sensors (bank 2)", cmd: "011D", decoder: hex_to_bitstring_decoder, unit: "", length: 1 },
    Sensor { name: "Aux input status", cmd: "011E", decoder: cpass, unit: "", length: 1 },
    Sensor { name: "Time Since Engine Start", cmd: "011F", decoder: sec_to_min, unit: "min", length: 2 },
    Sensor { name: "Supported PIDs", cmd: "0120", decoder: hex_to_bitstring_decoder, unit: "", length: 4 },
    Sensor { name: "Distance Traveled w/ MIL", cmd: "0121", decoder: km_to_mi, unit: "mi", length: 2 },
    Sensor { name: "Fuel Rail Pressure (rel)", cmd: "0122", decoder: rel_fuel_pres, unit: "psi", length: 2 },
    Sensor { name: "Fuel Rail Pressure (abs)", cmd: "0123", decoder: fuel_pres_10, unit: "psi", length: 2 },
    Sensor { name: "Air/Fuel Sensor: 1 - 1", cmd: "0124", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 1 - 2", cmd: "0125", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 1 - 3", cmd: "0126", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 1 - 4", cmd: "0127", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 2 - 1", cmd: "0128", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 2 - 2", cmd: "0129", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 2 - 3", cmd: "012A", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 2 - 4", cmd: "012B", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Commanded EGR %", cmd: "012C", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "EGR Error %", cmd: "012D", decoder: fuel_trim_percent, unit: "%", length: 1 },
    Sensor { name: "Commanded Evaporative Purge", cmd: "012E", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Fuel Level", cmd: "012F", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Warm-ups Since Codes Clear", cmd: "0130", decoder: hex_to_int_decoder, unit: "", length: 1 },
    Sensor { name: "Distance Since Codes Clear", cmd: "0131", decoder: km_to_mi, unit: "mi", length: 2 },
    Sensor { name: "Evap Vapor Pressure", cmd: "0132", decoder: evap_pres, unit: "Pa", length: 2 },
    Sensor { name: "Barometric Pressure", cmd: "0133", decoder: intake_m_pres, unit: "psi", length: 1 },
    Sensor { name: "Air/Fuel Sensor: 1 - 1", cmd: "0134", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 1 - 2", cmd: "0135", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 1 - 3", cmd: "0136", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 1 - 4", cmd: "0137", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 2 - 1", cmd: "0138", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 2 - 2", cmd: "0139", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 2 - 3", cmd: "013A", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Air/Fuel Sensor: 2 - 4", cmd: "013B", decoder: eq_ratio, unit: "", length: 4 },
    Sensor { name: "Catalyst Temp - Bank 1, Sensor 1", cmd: "013C", decoder: temp, unit: "C", length: 2 },
    Sensor { name: "Catalyst Temp - Bank 2, Sensor 1", cmd: "013D", decoder: temp, unit: "C", length: 2 },
    Sensor { name: "Catalyst Temp - Bank 1, Sensor 2", cmd: "013E", decoder: temp, unit: "C", length: 2 },
    Sensor { name: "Catalyst Temp - Bank 2, Sensor 2", cmd: "013F", decoder: temp, unit: "C", length: 2 },
    Sensor { name: "Supported PIDs", cmd: "0140", decoder: hex_to_bitstring_decoder, unit: "", length: 4 },
    Sensor { name: "Monitor Status - Current", cmd: "0141", decoder: cpass, unit: "", length: 4 },
    Sensor { name: "Control Module Voltage", cmd: "0142", decoder: cm_voltage, unit: "V", length: 2 },
    Sensor { name: "Absolute Load %", cmd: "0143", decoder: abs_load_percent, unit: "%", length: 2 },
    Sensor { name: "Commanded Equivalence Ratio", cmd: "0144", decoder: eq_ratio, unit: "", length: 2 },
    Sensor { name: "Relative Throttle Position", cmd: "0145", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Ambient Air Temperature", cmd: "0146", decoder: temp, unit: "C", length: 1 },
    Sensor { name: "Absolute Throttle Position B", cmd: "0147", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Absolute Throttle Position C", cmd: "0148", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Accelerator Pedal Position D", cmd: "0149", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Accelerator Pedal Position E", cmd: "014A", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Accelerator Pedal Position F", cmd: "014B", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Commanded Throttle Actuator", cmd: "014C", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Time Run with MIL on", cmd: "014D", decoder: hex_to_int_decoder, unit: "min", length: 2 },
    Sensor { name: "Time Since Trouble Codes Cleared", cmd: "014E", decoder: hex_to_int_decoder, unit: "min", length: 2 },
    Sensor { name: "Max Equivalence Ratio", cmd: "014F", decoder: hex_to_int_decoder, unit: "", length: 4 },
    Sensor { name: "Max Air Flow Rate", cmd: "0150", decoder: hex_to_int_decoder, unit: "", length: 4 },
    Sensor { name: "Fuel Type", cmd: "0151", decoder: cpass, unit: "", length: 1 },
    Sensor { name: "Alcohol Fuel %", cmd: "0152", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Absolute Vapor Pressure", cmd: "0153", decoder: abs_vapor_pres, unit: "psi", length: 2 },
    Sensor { name: "Evap Vapor Pressure", cmd: "0154", decoder: evap_pres2, unit: "Pa", length: 2 },
    Sensor { name: "Secondary O2 STFT - Bank 1", cmd: "0155", decoder: fuel_trim_percent, unit: "%", length: 2 },
    Sensor { name: "Secondary O2 LTFT - Bank 1", cmd: "0156", decoder: fuel_trim_percent, unit: "%", length: 2 },
    Sensor { name: "Secondary O2 STFT - Bank 2", cmd: "0157", decoder: fuel_trim_percent, unit: "%", length: 2 },
    Sensor { name: "Secondary O2 LTFT - Bank 2", cmd: "0158", decoder: fuel_trim_percent, unit: "%", length: 2 },
    Sensor { name: "Abs Fuel Rail Pressure", cmd: "0159", decoder: fuel_pres_10, unit: "psi", length: 2 },
    Sensor { name: "Relative Acc Pedal Position", cmd: "015A", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Hybrid Batt Remaining Life", cmd: "015B", decoder: percent_scale, unit: "%", length: 1 },
    Sensor { name: "Engine Oil Temperature", cmd: "015C", decoder: temp, unit: "C", length: 1 },
    Sensor { name: "Fuel Injection Timing", cmd: "015D", decoder: injection_timing, unit: "degrees", length: 2 },
    Sensor { name: "Engine Fuel Rate", cmd: "015E", decoder: fuel_rate, unit: "gal/h", length: 2 },
    Sensor { name: "Emission Requirement", cmd: "015F", decoder: cpass, unit: "", length: 1 },
    Sensor { name: "Supported PIDs", cmd: "0160", decoder: hex_to_bitstring_decoder, unit: "", length: 4 },
    Sensor { name: "Requested Torque", cmd: "0161", decoder: req_torque, unit: "%", length: 1 },
    Sensor { name: "Actual Torque", cmd: "0162", decoder: req_torque, unit: "%", length: 1 },
    Sensor { name: "Reference Torque", cmd: "0163", decoder: ref_torque, unit: "lbf*ft", length: 2 },
    Sensor { name: "Engine % Torque Data", cmd: "0164", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "Auxiliary Inputs/Outputs", cmd: "0165", decoder: cpass, unit: "", length: 2 },
    Sensor { name: "MAF Sensor Data", cmd: "0166", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "ECT Sensor Data", cmd: "0167", decoder: cpass, unit: "", length: 3 },
    Sensor { name: "IAT Sensor Data", cmd: "0168", decoder: cpass, unit: "", length: 7 },
    Sensor { name: "Cmd EGR/EGR Error", cmd: "0169", decoder: cpass, unit: "", length: 7 },
    Sensor { name: "Diesel Intake Air", cmd: "016A", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "EGR Temp", cmd: "016B", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "Cmd Throttle Actuator", cmd: "016C", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "Fuel Pressure Control", cmd: "016D", decoder: cpass, unit: "", length: 6 },
    Sensor { name: "Injection Pressure Control", cmd: "016E", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "Turbo Compressor Pressure", cmd: "016F", decoder: cpass, unit: "", length: 3 },
    Sensor { name: "Boost Pressure Control", cmd: "0170", decoder: cpass, unit: "", length: 9 },
    Sensor { name: "Turbo Control", cmd: "0171", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "Wastegate Control", cmd: "0172", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "Exhaust Pressure", cmd: "0173", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "Turbo Charger RPM", cmd: "0174", decoder: cpass, unit: "", length: 3 },
    Sensor { name: "Turbo Charger Temp A", cmd: "0175", decoder: cpass, unit: "", length: 7 },
    Sensor { name: "Turbo Charger Temp B", cmd: "0176", decoder: cpass, unit: "", length: 7 },
    Sensor { name: "Charge Air Cooler Temp", cmd: "0177", decoder: cpass, unit: "", length: 5 },
    Sensor { name: "Exhaust Temp - Bank 1", cmd: "0178", decoder: cpass, unit: "", length: 9 },
    Sensor { name: "Exhaust Temp - Bank 2", cmd: "0179", decoder: cpass, unit: "", length: 9 },
    Sensor { name: "Diesel Filter - Bank 1", cmd: "017A", decoder: cpass, unit: "", length: 7 },
    Sensor { name: "Diesel Filter - Bank 2", cmd: "017B", decoder: cpass, unit: "", length: 7 },
    Sensor { name: "Diesel Filter Temp", cmd: "017C", decoder: cpass, unit: "", length: 9 },
    Sensor { name: "NOx NTE Control", cmd: "017D", decoder: cpass, unit: "", length: 1 },
    Sensor { name: "PM NTE Control", cmd: "017E", decoder: cpass, unit: "", length: 1 },
    Sensor { name: "Engine Run Time", cmd: "017F", decoder: cpass, unit: "", length: 13 },
    Sensor { name: "Supported PIDs", cmd: "0180", decoder: hex_to_bitstring_decoder, unit: "", length: 4 },
    Sensor { name: "Engine Run Time AECD", cmd: "0181", decoder: cpass, unit: "", length: 21 },
    Sensor { name: "Engine Run Time AECD", cmd: "0182", decoder: cpass, unit: "", length: 21 },
    Sensor { name: "NOx Sensor", cmd: "0183", decoder: cpass, unit: "", length: 5 },
];

/// The five supported-PID range PIDs: `$00, $20, $40, $60, $80`, each
/// returning a 32-bit bitmap of which PIDs in the next range are
/// implemented.
pub const SUPPORTED_PIDS: [u8; 5] = [0x00, 0x20, 0x40, 0x60, 0x80];

/// Bank 4 fuel trim PIDs (`$08`/`$09`) whose payload widens from 1 byte
/// to 2 when PID `$1D` reports that bank's O2 sensors are present.
pub const BANK4_TRIM_PIDS: [u8; 2] = [0x08, 0x09];
/// Bank 3 fuel trim PIDs (`$06`/`$07`), widened the same way.
pub const BANK3_TRIM_PIDS: [u8; 2] = [0x06, 0x07];

/// Session-scoped overlay of PID -> payload length, kept alongside the
/// static catalog instead of mutating it in place.
#[derive(Debug, Default, Clone)]
pub struct LengthOverlay {
    lengths: BTreeMap<u8, u8>,
}

impl LengthOverlay {
    /// Create an empty overlay (no PID lengths widened).
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a widened length for the given PID.
    pub fn set(&mut self, pid: u8, length: u8) {
        self.lengths.insert(pid, length);
    }

    /// Resolve the effective payload length for a sensor: the overlay
    /// value if present, otherwise the catalog's declared length.
    pub fn length_for(&self, sensor: &Sensor) -> u8 {
        self.lengths.get(&sensor.pid()).copied().unwrap_or(sensor.length)
    }
}

/// Find a catalog entry for a given full command (e.g. "010C").
pub fn find_by_cmd(cmd: &str) -> Option<&'static Sensor> {
    SENSORS.iter().find(|s| s.cmd == cmd)
}

/// Find a catalog entry for a given mode 01 PID.
pub fn find_mode01(pid: u8) -> Option<&'static Sensor> {
    find_by_cmd(&format!("01{:02X}", pid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpm_combines_both_bytes_and_divides_by_four() {
        assert_eq!(rpm(&[0x1A, 0xF8]), "1726");
    }

    #[test]
    fn fuel_trim_mid_scale_byte_is_zero_percent() {
        assert_eq!(fuel_trim_percent(&[0x80]), "0.0");
    }

    #[test]
    fn coolant_and_speed_decode_from_single_byte() {
        assert_eq!(temp(&[0x7B]), "83");
        assert_eq!(speed(&[0x37]), "34.2");
    }

    #[test]
    fn decoders_never_panic_on_declared_length_inputs() {
        for sensor in SENSORS {
            let payload = vec![0xAAu8; sensor.length as usize];
            let out = (sensor.decoder)(&payload);
            assert!(!out.is_empty() || sensor.length == 0);
        }
    }

    #[test]
    fn fuel_system_status_maps_known_codes() {
        assert_eq!(ol_cl(&[1, 2]), "Fuel System 1: OL; Fuel System 2: CL");
        assert_eq!(ol_cl(&[99, 4]), "Fuel System 1: UNKNOWN; Fuel System 2: OL-Drive");
    }

    #[test]
    fn overlay_widens_bank3_trims_and_falls_back_otherwise() {
        let mut overlay = LengthOverlay::new();
        let pid06 = find_mode01(0x06).unwrap();
        assert_eq!(overlay.length_for(pid06), 1);

        overlay.set(0x06, 2);
        assert_eq!(overlay.length_for(pid06), 2);

        let pid0c = find_mode01(0x0C).unwrap();
        assert_eq!(overlay.length_for(pid0c), 2);
    }
}

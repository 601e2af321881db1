//! The bring-up-and-query client layered on top of the frame parser
//! and PID catalog: resets and talks to the ELM327, discovers which
//! ECUs are on the bus, and exposes the mode 01/03/04/07/09 reads and
//! writes a caller actually wants (live sensor values, stored and
//! pending trouble codes, VIN, DTC clearing).

use crate::dtc::{Dtc, DtcRecord, DtcStatus};
use crate::error::{ObdError, ReadOutcome};
use crate::frame::{self, EcuAddress, FrameSet};
use crate::hexutil;
use crate::monitor::{self, MonitorStatus};
use crate::notifier::{LEVEL_BRINGUP, LEVEL_MILESTONE, LEVEL_WIRE};
use crate::pid::{self, LengthOverlay, Sensor, BANK3_TRIM_PIDS, BANK4_TRIM_PIDS, SUPPORTED_PIDS};
use crate::serial_line::SerialLine;
use crate::session::{Session, SessionConfig, State};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::thread::sleep;
use std::time::Duration;

const GET_DTC_COMMAND: &str = "03";
const CLEAR_DTC_COMMAND: &str = "04";
const GET_PENDING_DTC_COMMAND: &str = "07";
const GET_DTC_RESPONSE: u8 = 0x43;
const GET_PENDING_DTC_RESPONSE: u8 = 0x47;
const O2_SENSOR_POSITION_PID: u8 = 0x1D;

/// The bring-up-and-query client, generic over any `Read + Write`
/// transport.
pub struct Service<T: Read + Write> {
    line: SerialLine<T>,
    config: SessionConfig,
    session: Session,
    overlay: LengthOverlay,
}

impl<T: Read + Write> Service<T> {
    /// Wrap a transport without running bring-up. Call `connect` to
    /// perform the ELM327 handshake and ECU discovery.
    pub fn new(port: T, config: SessionConfig) -> Self {
        Self {
            line: SerialLine::new(port),
            config,
            session: Session::disconnected(),
            overlay: LengthOverlay::new(),
        }
    }

    /// The session state established by the last successful `connect`.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run ELM327 bring-up: reset, disable echo, read the active
    /// protocol, enable headers, and ping every ECU with `0100`.
    /// Retries up to `config.reconnect_attempts` times with a
    /// 5-second backoff between attempts.
    pub fn connect(&mut self) -> Result<(), ObdError> {
        self.line.notify(LEVEL_MILESTONE, "opening interface (serial port)");

        for attempt in 0..=self.config.reconnect_attempts {
            match self.try_bring_up() {
                Ok(()) => {
                    self.session.state = State::Connected;
                    self.line.notify(LEVEL_MILESTONE, "connected to ECU(s)");
                    return Ok(());
                }
                Err(e) => {
                    self.line
                        .notify(LEVEL_BRINGUP, &format!("connection attempt failed: {}", e));
                    if attempt < self.config.reconnect_attempts {
                        self.line
                            .notify(LEVEL_BRINGUP, &format!("reconnection attempt: {}", attempt + 1));
                        sleep(Duration::from_secs(5));
                    }
                }
            }
        }

        self.session.state = State::Disconnected;
        Err(ObdError::BringUpTimeout { attempts: self.config.reconnect_attempts + 1 })
    }

    fn try_bring_up(&mut self) -> Result<(), ObdError> {
        // ATZ's last non-blank line is the ELM327 version banner.
        let version_lines = self.line.query("atz")?.ok_or(ObdError::NoResponse)?;
        self.session.elm_version = version_lines.last().cloned().unwrap_or_default();

        self.line.query("ate0")?.ok_or(ObdError::NoResponse)?;

        let protocol_lines = self.line.query("atdp")?.ok_or(ObdError::NoResponse)?;
        let protocol = protocol_lines.first().cloned().unwrap_or_default();
        self.session.prot_is_can = protocol.to_uppercase().contains("CAN");
        self.session.protocol = protocol;

        self.line.query("ath1")?;

        let ping_lines = self.line.query("0100")?.ok_or(ObdError::NoData)?;
        let frames = frame::parse_bytes(&ping_lines, self.session.prot_is_can)?;

        let mut ecus: Vec<EcuAddress> = frames
            .iter()
            .filter(|(_, bytes)| bytes.starts_with(&[0x41, 0x00]))
            .map(|(ecu, _)| ecu.clone())
            .collect();
        ecus.sort();

        if ecus.is_empty() {
            return Err(ObdError::NoData);
        }

        self.session.ecu_addresses = ecus;
        Ok(())
    }

    /// Send a command composed of `mode` plus the PID half of
    /// `sensor.cmd`, and return the raw response block.
    fn query_sensor_cmd(&mut self, sensor: &Sensor, mode: &str) -> Result<Vec<String>, ObdError> {
        let cmd = format!("{}{:02X}", mode, sensor.pid());
        self.line.query(&cmd)?.ok_or(ObdError::NoResponse)
    }

    /// Read a single sensor for one ECU, or for every responding ECU
    /// if `ecu` is `None`.
    pub fn read_sensor(
        &mut self,
        sensor: &Sensor,
        ecu: Option<&EcuAddress>,
        mode: &str,
    ) -> Result<ReadOutcome<BTreeMap<EcuAddress, String>>, ObdError> {
        let lines = self.query_sensor_cmd(sensor, mode)?;
        let frames = frame::parse_bytes(&lines, self.session.prot_is_can)?;
        let response_mode = 0x40 + u8::from_str_radix(mode, 16).unwrap_or(1);

        let mut out = BTreeMap::new();
        for (addr, bytes) in &frames {
            if let Some(target) = ecu {
                if addr != target {
                    continue;
                }
            }
            let after_mode = frame::strip_mode_echo(bytes, response_mode)?;
            if after_mode.first() != Some(&sensor.pid()) {
                continue;
            }
            let payload = &after_mode[1..];
            let length = self.overlay.length_for(sensor).min(payload.len() as u8) as usize;
            out.insert(addr.clone(), (sensor.decoder)(&payload[..length]));
        }

        if out.is_empty() {
            Ok(ReadOutcome::NoData)
        } else {
            Ok(ReadOutcome::Value(out))
        }
    }

    /// Batched mode 01 read of up to 6 PIDs per CAN request, falling
    /// back to one request per sensor on non-CAN protocols.
    pub fn read_sensors(
        &mut self,
        sensors: &[&'static Sensor],
        ecu: &EcuAddress,
        mode: &str,
    ) -> Result<BTreeMap<&'static str, String>, ObdError> {
        let mut out = BTreeMap::new();

        if !self.session.prot_is_can {
            for sensor in sensors {
                if let ReadOutcome::Value(map) = self.read_sensor(sensor, Some(ecu), mode)? {
                    if let Some(v) = map.get(ecu) {
                        out.insert(sensor.name, v.clone());
                    }
                }
            }
            return Ok(out);
        }

        for chunk in sensors.chunks(6) {
            let mut cmd = mode.to_string();
            for s in chunk {
                cmd.push_str(&format!("{:02X}", s.pid()));
            }
            let lines = self.line.query(&cmd)?.ok_or(ObdError::NoResponse)?;
            let frames = frame::parse_bytes(&lines, true)?;

            let bytes = match frames.get(ecu) {
                Some(b) => b,
                None => continue,
            };

            let response_mode = 0x40 + u8::from_str_radix(mode, 16).unwrap_or(1);
            let mut payload = match frame::strip_mode_echo(bytes, response_mode) {
                Ok(p) => p,
                Err(_) => continue,
            };

            while !payload.is_empty() {
                let pid = payload.remove(0);
                let sensor = match chunk.iter().find(|s| s.pid() == pid) {
                    Some(s) => *s,
                    None => break,
                };
                let n = self.overlay.length_for(sensor) as usize;
                if payload.len() < n {
                    break;
                }
                let data: Vec<u8> = payload.drain(..n).collect();
                out.insert(sensor.name, (sensor.decoder)(&data));
            }
        }

        Ok(out)
    }

    /// Read the mode 01 "supported PIDs" bitmap across the standard
    /// `$00, $20, $40, $60, $80` range PIDs and apply the `$1D`
    /// fuel-trim length overlay: if bank 4 (O2 sensors 5-8) is present,
    /// widen `$08`/`$09`; if bank 3 (O2 sensors 3-4) is present, widen
    /// `$06`/`$07`.
    pub fn read_supported(&mut self, ecu: &EcuAddress) -> Result<String, ObdError> {
        let mut bitmap = String::new();

        for &base in SUPPORTED_PIDS.iter() {
            let sensor = pid::find_mode01(base).ok_or(ObdError::NoData)?;
            match self.read_sensor(sensor, Some(ecu), "01")? {
                ReadOutcome::Value(map) => {
                    bitmap.push_str(map.get(ecu).map(String::as_str).unwrap_or(&"0".repeat(32)));
                }
                _ => bitmap.push_str(&"0".repeat(32)),
            }
        }

        if bitmap.as_bytes().get(O2_SENSOR_POSITION_PID as usize - 1) == Some(&b'1') {
            let o2_sensor = pid::find_mode01(O2_SENSOR_POSITION_PID).unwrap();
            if let ReadOutcome::Value(map) = self.read_sensor(o2_sensor, Some(ecu), "01")? {
                if let Some(res) = map.get(ecu) {
                    let bits: Vec<char> = res.chars().collect();
                    if bits.get(0) == Some(&'1') || bits.get(1) == Some(&'1') {
                        for pid in BANK4_TRIM_PIDS {
                            self.overlay.set(pid, 2);
                        }
                    }
                    if bits.get(2) == Some(&'1') || bits.get(3) == Some(&'1') {
                        for pid in BANK3_TRIM_PIDS {
                            self.overlay.set(pid, 2);
                        }
                    }
                }
            }
        }

        Ok(bitmap)
    }

    /// Read PID `0101` ("Status Since DTCs Cleared") as a structured
    /// [MonitorStatus] instead of the catalog's flat display string.
    /// This supplements, and does not replace, the `Sensor` catalog
    /// entry for PID `0101` used by `read_sensor`/`read_sensors`.
    pub fn read_monitor_status(&mut self, ecu: &EcuAddress) -> Result<MonitorStatus, ObdError> {
        let lines = self.line.query("0101")?.ok_or(ObdError::NoResponse)?;
        let frames = frame::parse_bytes(&lines, self.session.prot_is_can)?;
        let bytes = frames.get(ecu).ok_or(ObdError::NoData)?;
        let after_mode = frame::strip_mode_echo(bytes, 0x41)?;
        if after_mode.first() != Some(&0x01) {
            return Err(ObdError::UnexpectedResponse("expected PID echo 01 in monitor status response".into()));
        }
        monitor::decode(&after_mode[1..]).ok_or_else(|| {
            ObdError::UnexpectedResponse("short response to monitor status query".into())
        })
    }

    /// Check whether mode `09` PID `02` (VIN) is in the ECU's supported
    /// set, via a mode `09` PID `00` supported-range query.
    fn vin_pid_supported(&mut self, ecu: &EcuAddress) -> Result<bool, ObdError> {
        let lines = self.line.query("0900")?.ok_or(ObdError::NoResponse)?;
        let frames = frame::parse_bytes(&lines, self.session.prot_is_can)?;
        let bytes = match frames.get(ecu) {
            Some(b) => b,
            None => return Ok(false),
        };
        let after_mode = match frame::strip_mode_echo(bytes, 0x49) {
            Ok(p) => p,
            Err(_) => return Ok(false),
        };
        if after_mode.first() != Some(&0x00) {
            return Ok(false);
        }
        let bitstring = hexutil::bytes_to_bitstring(&after_mode[1..]);
        Ok(bitstring.as_bytes().get(1) == Some(&b'1'))
    }

    /// Read the Vehicle Identification Number via mode `09` PID `02`.
    /// First verifies PID `02` is supported (mode `09` PID `00` query);
    /// returns an empty string without sending `0902` if it is not.
    pub fn read_vin(&mut self, ecu: &EcuAddress) -> Result<String, ObdError> {
        if !self.vin_pid_supported(ecu)? {
            return Ok(String::new());
        }

        let lines = self.line.query("0902")?.ok_or(ObdError::NoData)?;
        let frames = frame::parse_bytes(&lines, self.session.prot_is_can)?;
        let bytes = frames.get(ecu).ok_or(ObdError::NoData)?;

        if self.session.prot_is_can {
            if bytes.len() < 20 || &bytes[0..3] != [0x49, 0x02, 0x01] {
                return Err(ObdError::UnexpectedResponse("unexpected response to GET_VIN".into()));
            }
            let ascii: Vec<u8> = bytes[3..].to_vec();
            return Ok(String::from_utf8_lossy(&ascii).to_string());
        }

        let mut remaining = bytes.as_slice();
        let mut i = 0u8;
        let mut vin = String::new();
        while !remaining.is_empty() {
            i += 1;
            if remaining.len() < 7 {
                return Err(ObdError::UnexpectedResponse("short GET_VIN message".into()));
            }
            let code = &remaining[0..7];
            if code[0] != 0x49 || code[1] != 0x02 || code[2] != i {
                return Err(ObdError::UnexpectedResponse("unexpected response to GET_VIN".into()));
            }
            let payload = if i == 1 {
                if &code[3..6] != [0, 0, 0] {
                    return Err(ObdError::UnexpectedResponse("unexpected pad bytes in GET_VIN".into()));
                }
                &code[6..7]
            } else {
                &code[3..7]
            };
            vin.push_str(&String::from_utf8_lossy(payload));
            remaining = &remaining[7..];
        }
        Ok(vin)
    }

    /// Walk a reassembled DTC response block, decoding 2-byte DTC pairs
    /// after each segment's mode-response byte. Returns the decoded
    /// records per ECU alongside the CAN NumCodes byte observed per ECU
    /// (the second byte of the first segment), used by `read_dtcs` to
    /// cross-check against the mode-01 PID-01 precursor count.
    fn parse_dtc_block(
        frames: &FrameSet,
        is_can: bool,
        status: DtcStatus,
    ) -> (BTreeMap<EcuAddress, Vec<DtcRecord>>, BTreeMap<EcuAddress, u8>) {
        let mut out: BTreeMap<EcuAddress, Vec<DtcRecord>> = BTreeMap::new();
        let mut observed_counts: BTreeMap<EcuAddress, u8> = BTreeMap::new();

        for (ecu, data) in frames {
            let records = out.entry(ecu.clone()).or_insert_with(Vec::new);
            let mut i = 0usize;

            while i < data.len() {
                if (is_can && i == 0) || (!is_can && i % 7 == 0) {
                    if data[i] != GET_DTC_RESPONSE && data[i] != GET_PENDING_DTC_RESPONSE {
                        break;
                    }
                    i += 1;
                }

                if is_can && i == 1 {
                    observed_counts.insert(ecu.clone(), data[i]);
                    i += 1;
                }

                if i + 1 >= data.len() {
                    break;
                }

                if let Some(dtc) = Dtc::from_bytes(data[i], data[i + 1]) {
                    records.push(DtcRecord { dtc, status });
                }
                i += 2;
            }
        }

        (out, observed_counts)
    }

    /// Read both active (mode `03`) and pending (mode `07`) DTCs for
    /// every responding ECU.
    ///
    /// This first reads mode `01` PID `01` to gate the whole operation
    /// on connection loss and to obtain each ECU's stored-DTC count,
    /// which is cross-checked against the mode `03` response's
    /// NumCodes byte (a mismatch is logged, not treated as fatal).
    pub fn read_dtcs(&mut self) -> Result<BTreeMap<EcuAddress, Vec<DtcRecord>>, ObdError> {
        let mut combined: BTreeMap<EcuAddress, Vec<DtcRecord>> = BTreeMap::new();

        let status_lines = self.line.query("0101")?.ok_or(ObdError::NoResponse)?;
        let status_frames = frame::parse_bytes(&status_lines, self.session.prot_is_can)?;
        if status_frames.is_empty() {
            return Err(ObdError::NoData);
        }

        let mut dtc_numbers: BTreeMap<EcuAddress, u8> = BTreeMap::new();
        for (ecu, bytes) in &status_frames {
            if let Ok(after_mode) = frame::strip_mode_echo(bytes, 0x41) {
                if after_mode.first() == Some(&0x01) {
                    if let Some(status) = monitor::decode(&after_mode[1..]) {
                        self.line.notify(
                            LEVEL_MILESTONE,
                            &format!("{}: {} stored DTC(s)", ecu, status.dtc_count),
                        );
                        dtc_numbers.insert(ecu.clone(), status.dtc_count);
                    }
                }
            }
        }

        let active_lines = self.line.query(GET_DTC_COMMAND)?.ok_or(ObdError::NoData)?;
        let active_frames = frame::parse_bytes(&active_lines, self.session.prot_is_can)?;
        let (active_records, active_counts) =
            Self::parse_dtc_block(&active_frames, self.session.prot_is_can, DtcStatus::Active);
        for (ecu, records) in active_records {
            combined.entry(ecu).or_insert_with(Vec::new).extend(records);
        }
        for (ecu, observed) in &active_counts {
            if let Some(expected) = dtc_numbers.get(ecu) {
                if observed != expected {
                    self.line.notify(
                        LEVEL_MILESTONE,
                        &format!(
                            "{}: expected {} stored DTC(s), got {}",
                            ecu, expected, observed
                        ),
                    );
                }
            }
        }

        let pending_lines = self.line.query(GET_PENDING_DTC_COMMAND)?;
        if let Some(lines) = pending_lines {
            let pending_frames = frame::parse_bytes(&lines, self.session.prot_is_can)?;
            let (pending_records, _) =
                Self::parse_dtc_block(&pending_frames, self.session.prot_is_can, DtcStatus::Passive);
            for (ecu, records) in pending_records {
                combined.entry(ecu).or_insert_with(Vec::new).extend(records);
            }
        }

        Ok(combined)
    }

    /// Clear all stored DTCs and freeze-frame data (mode `04`).
    pub fn clear_dtcs(&mut self) -> Result<(), ObdError> {
        self.line.query(CLEAR_DTC_COMMAND)?;
        Ok(())
    }

    /// Reset the interface and drop the session.
    pub fn close(mut self) -> Result<(), ObdError> {
        if self.session.is_connected() {
            self.line.send("atz")?;
        }
        self.session.state = State::Disconnected;
        self.line.notify(LEVEL_WIRE, "closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Fixture {
        replies: std::collections::VecDeque<Vec<u8>>,
        current: Cursor<Vec<u8>>,
    }

    impl Fixture {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: replies.iter().map(|r| r.as_bytes().to_vec()).collect(),
                current: Cursor::new(Vec::new()),
            }
        }
    }

    impl Read for Fixture {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.current.position() as usize >= self.current.get_ref().len() {
                if let Some(next) = self.replies.pop_front() {
                    self.current = Cursor::new(next);
                } else {
                    return Ok(0);
                }
            }
            self.current.read(buf)
        }
    }

    impl Write for Fixture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn bring_up_discovers_two_ecus() {
        let fixture = Fixture::new(&[
            "ELM327 v1.5\r\r>",
            "OK\r\r>",
            "ISO 15765-4 (CAN 11/500)\r\r>",
            "OK\r\r>",
            "7E8 06 41 00 BE 1F A8 13\r7E9 06 41 00 98 18 80 10\r\r>",
        ]);
        let mut svc = Service::new(fixture, SessionConfig::default());
        svc.connect().unwrap();
        assert!(svc.session().is_connected());
        assert_eq!(
            svc.session().ecu_addresses,
            vec![EcuAddress::new("7E8"), EcuAddress::new("7E9")]
        );
        assert!(svc.session().prot_is_can);
    }

    #[test]
    fn read_dtcs_decodes_p0143() {
        // mode-0101 precursor: mode+PID echo, MIL on, 3 stored codes.
        // mode-03 response: mode echo 0x43, 1 stored code, DTC bytes 01 43 -> P0143
        // (deliberately mismatched against the precursor's count of 3, to
        // exercise the cross-check's logged-not-fatal mismatch path).
        let mut svc = Service::new(
            Fixture::new(&["7E8 06 41 01 83 00 00 00\r\r>", "7E8 04 43 01 01 43\r\r>"]),
            SessionConfig::default(),
        );
        svc.session.prot_is_can = true;
        svc.session.ecu_addresses = vec![EcuAddress::new("7E8")];

        let dtcs = svc.read_dtcs().unwrap();
        let records = &dtcs[&EcuAddress::new("7E8")];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dtc.code(), "P0143");
        assert_eq!(records[0].status, DtcStatus::Active);
    }

    #[test]
    fn read_dtcs_aborts_when_precursor_yields_no_data() {
        // Mode 0101 precursor gets no response at all: the whole read
        // is treated as connection loss, before mode 03/07 are ever
        // sent.
        let mut svc = Service::new(Fixture::new(&[""]), SessionConfig::default());
        svc.session.prot_is_can = true;

        let err = svc.read_dtcs().unwrap_err();
        assert!(matches!(err, ObdError::NoResponse));
    }

    #[test]
    fn read_vin_skips_query_when_pid_unsupported() {
        // mode-0900 response: PID echo 00, bitstring with bit 1 clear -> PID 02 unsupported.
        let mut svc = Service::new(
            Fixture::new(&["7E8 06 49 00 00 00 00 00\r\r>"]),
            SessionConfig::default(),
        );
        svc.session.prot_is_can = true;

        let vin = svc.read_vin(&EcuAddress::new("7E8")).unwrap();
        assert_eq!(vin, "");
    }

    #[test]
    fn read_supported_assembles_bitmap_across_all_ranges() {
        let mut svc = Service::new(
            Fixture::new(&[
                "7E8 06 41 00 00 00 00 01\r\r>",
                "7E8 06 41 20 00 00 00 00\r\r>",
                "7E8 06 41 40 00 00 00 00\r\r>",
                "7E8 06 41 60 00 00 00 00\r\r>",
                "7E8 06 41 80 00 00 00 00\r\r>",
            ]),
            SessionConfig::default(),
        );
        svc.session.prot_is_can = true;

        let bitmap = svc.read_supported(&EcuAddress::new("7E8")).unwrap();
        assert_eq!(bitmap.len(), 32 * 5);
    }

    #[test]
    fn clear_dtcs_sends_mode_04() {
        let mut svc = Service::new(Fixture::new(&["44\r\r>"]), SessionConfig::default());
        svc.clear_dtcs().unwrap();
    }

    #[test]
    fn read_sensor_drops_mode_and_pid_echo_before_decoding() {
        // 41 05 7B: mode echo, PID echo, coolant temp raw byte 0x7B -> 83C.
        let mut svc =
            Service::new(Fixture::new(&["7E8 03 41 05 7B\r\r>"]), SessionConfig::default());
        svc.session.prot_is_can = true;
        let sensor = pid::find_mode01(0x05).unwrap();
        let ecu = EcuAddress::new("7E8");

        match svc.read_sensor(sensor, Some(&ecu), "01").unwrap() {
            ReadOutcome::Value(map) => assert_eq!(map[&ecu], "83"),
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn read_monitor_status_decodes_mil_and_dtc_count() {
        // 41 01 83 00 00 00: mode+PID echo, MIL on, 3 stored codes, no monitors supported.
        let mut svc =
            Service::new(Fixture::new(&["7E8 06 41 01 83 00 00 00\r\r>"]), SessionConfig::default());
        svc.session.prot_is_can = true;

        let status = svc.read_monitor_status(&EcuAddress::new("7E8")).unwrap();
        assert!(status.mil_on);
        assert_eq!(status.dtc_count, 3);
    }
}

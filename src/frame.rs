//! Reassembles a raw ELM327 response block into per-ECU payload bytes.
//!
//! A response block is a handful of text lines, each a whitespace-
//! separated run of hex byte tokens. On CAN the first token is the
//! responding ECU's arbitration ID and the second is an ISO-TP PCI
//! byte whose high nibble says whether this line is a complete
//! single-frame response or one piece of a multi-frame one; on the
//! older line-framed protocols each line instead opens with a fixed
//! two-byte header followed by the ECU address. Either way the job
//! here is the same: walk the lines once and hand back a payload per
//! ECU with the framing bytes stripped off.

use crate::error::ObdError;
use crate::hexutil::hex_to_int;
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a responding ECU by the address token it appears under
/// on the wire, e.g. `"7E8"` or a wider 29-bit arbitration ID. Kept as
/// the uppercased hex text rather than a fixed-width integer so
/// addresses of any width round-trip without truncation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EcuAddress(String);

impl fmt::Display for EcuAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl EcuAddress {
    /// Build an address from an already-known hex token (e.g. a
    /// `--ecu` command-line flag), uppercasing it to match the form
    /// addresses are stored in after parsing a response block.
    pub fn new(token: &str) -> Self {
        EcuAddress(token.trim().to_uppercase())
    }

    /// The address as its uppercase hex text, with no leading/trailing
    /// whitespace.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse and validate a hex token, e.g. a user-supplied `--ecu`
    /// flag, rejecting anything that isn't plain hex digits.
    pub fn parse(token: &str) -> Result<Self, ObdError> {
        let token = token.trim();
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ObdError::UnexpectedResponse(format!("bad ECU address: {}", token)));
        }
        Ok(EcuAddress(token.to_uppercase()))
    }
}

/// Per-ECU reassembled payload bytes, keyed by `EcuAddress` so that
/// iterating the map visits ECUs in sorted order.
pub type FrameSet = BTreeMap<EcuAddress, Vec<u8>>;

/// One line of raw response text, already split by the serial line
/// reader into whitespace-separated hex byte tokens.
type Line<'a> = Vec<&'a str>;

fn split_line(line: &str) -> Line {
    line.split_whitespace().collect()
}

/// Reassemble a full response block (the lines collected between two
/// prompt characters) into per-ECU byte vectors.
///
/// `is_can` distinguishes the PCI-byte framed CAN path from the
/// simpler non-CAN line format.
pub fn parse_bytes(lines: &[String], is_can: bool) -> Result<FrameSet, ObdError> {
    let mut frames: FrameSet = FrameSet::new();
    let mut byte_counts: BTreeMap<EcuAddress, usize> = BTreeMap::new();

    for raw in lines {
        if raw.trim() == "NODATA" {
            continue;
        }

        let mut tokens = split_line(raw);
        if !is_can {
            // Non-CAN lines open with two framing bytes ahead of the
            // ECU address.
            if tokens.len() < 2 {
                continue;
            }
            tokens = tokens.split_off(2);
        }

        if tokens.is_empty() {
            continue;
        }

        let ecu = EcuAddress::parse(tokens[0])?;
        let entry = frames.entry(ecu.clone()).or_insert_with(Vec::new);

        if !is_can {
            for tok in &tokens[1..] {
                entry.push(crate::hexutil::hex_byte(tok)?);
            }
            continue;
        }

        if tokens.len() < 2 {
            continue;
        }
        let pci = tokens[1];
        let pci_nibble = pci.chars().next().unwrap_or('0');

        match pci_nibble {
            '0' => {
                // Single frame: low PCI nibble is the byte count.
                let count = pci[1..].parse::<usize>().unwrap_or(0);
                byte_counts.insert(ecu, count);
                let data = &tokens[2..];
                for tok in data.iter().take(count) {
                    entry.push(crate::hexutil::hex_byte(tok)?);
                }
            }
            '1' => {
                // First frame: PCI extends one byte for a 12-bit length.
                if tokens.len() < 3 {
                    continue;
                }
                let length = hex_to_int(&format!("{}{}", &pci[1..], tokens[2]))? as usize;
                byte_counts.insert(ecu, length);
                entry.clear();
                entry.resize(length, 0);
                for (i, tok) in tokens[3..].iter().enumerate() {
                    if i >= length {
                        break;
                    }
                    entry[i] = crate::hexutil::hex_byte(tok)?;
                }
            }
            '2' => {
                // Consecutive frame: low PCI nibble is the frame index.
                let idx = hex_to_int(&pci[1..2])? as usize;
                let mut offset = idx * 7;
                if offset == 0 {
                    // Index 0 never appears as a first consecutive
                    // frame in practice, but guard the underflow a
                    // literal `i*7-1` would otherwise hit.
                    offset = 7;
                }
                offset -= 1;

                if !byte_counts.contains_key(&ecu) {
                    // Consecutive frame arrived before its first
                    // frame: zero-fill defensively through this frame.
                    let needed = offset + 7;
                    if entry.len() < needed {
                        entry.resize(needed, 0);
                    }
                }

                for (i, tok) in tokens[2..].iter().enumerate() {
                    let pos = offset + i;
                    if pos < entry.len() {
                        entry[pos] = crate::hexutil::hex_byte(tok)?;
                    } else {
                        break;
                    }
                }
            }
            _ => {
                return Err(ObdError::UnexpectedResponse(format!(
                    "unexpected PCI byte {:?} in line {:?}",
                    pci, raw
                )));
            }
        }
    }

    Ok(frames)
}

/// Strip the mode-echo byte from a reassembled ECU payload and verify
/// it matches `expected_mode` (response mode = request mode + 0x40).
/// Returns the remaining payload bytes.
pub fn strip_mode_echo(bytes: &[u8], expected_mode: u8) -> Result<Vec<u8>, ObdError> {
    match bytes.first() {
        Some(&m) if m == expected_mode => Ok(bytes[1..].to_vec()),
        Some(&m) => Err(ObdError::UnexpectedResponse(format!(
            "expected mode echo {:02X}, got {:02X}",
            expected_mode, m
        ))),
        None => Err(ObdError::NoData),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_ecus_answer_a_single_can_frame_ping() {
        let input = lines(&["7E8 06 41 00 BE 1F A8 13", "7E9 06 41 00 98 18 80 10"]);
        let frames = parse_bytes(&input, true).unwrap();
        let ids: Vec<String> = frames.keys().map(|e| e.to_string()).collect();
        assert_eq!(ids, vec!["7E8", "7E9"]);
        assert_eq!(frames[&EcuAddress::new("7E8")], vec![0x41, 0x00, 0xBE, 0x1F, 0xA8, 0x13]);
    }

    #[test]
    fn first_frame_and_two_consecutive_frames_reassemble_a_vin() {
        let input = lines(&[
            "7E8 10 14 49 02 01 31 47 31",
            "7E8 21 4A 43 35 34 34 34 52",
            "7E8 22 37 32 35 32 33 36 37",
        ]);
        let frames = parse_bytes(&input, true).unwrap();
        let bytes = &frames[&EcuAddress::new("7E8")];
        assert_eq!(bytes.len(), 0x14);
        let ascii: String = bytes[3..].iter().map(|&b| b as char).collect();
        assert_eq!(ascii, "1G1JC5444R7252367");
    }

    #[test]
    fn consecutive_frame_before_first_frame_zero_fills() {
        let input = lines(&["7E8 21 AA BB CC DD EE FF 11"]);
        let frames = parse_bytes(&input, true).unwrap();
        let bytes = &frames[&EcuAddress::new("7E8")];
        // offset = 1*7-1 = 6, so entry must be zero-filled through
        // index 12 before the consecutive payload lands at offset 6.
        assert!(bytes.len() >= 13);
        assert_eq!(&bytes[0..6], &[0, 0, 0, 0, 0, 0]);
        assert_eq!(bytes[6], 0xAA);
    }

    #[test]
    fn nodata_line_is_skipped_not_an_ecu() {
        let input = lines(&["NODATA"]);
        let frames = parse_bytes(&input, true).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn non_can_strips_leading_framing_bytes() {
        let input = lines(&["48 6B 10 41 00 BE 1F A8 13"]);
        let frames = parse_bytes(&input, false).unwrap();
        assert_eq!(frames[&EcuAddress::new("10")], vec![0x41, 0x00, 0xBE, 0x1F, 0xA8, 0x13]);
    }

    #[test]
    fn strip_mode_echo_detects_mismatch() {
        let bytes = vec![0x41, 0x00, 0xBE];
        assert!(strip_mode_echo(&bytes, 0x41).is_ok());
        assert!(strip_mode_echo(&bytes, 0x43).is_err());
    }

    #[test]
    fn wide_can_arbitration_ids_round_trip_without_truncation() {
        let input = lines(&["18DAF110 06 41 00 BE 1F A8 13"]);
        let frames = parse_bytes(&input, true).unwrap();
        assert_eq!(frames.keys().next().unwrap().as_str(), "18DAF110");
    }
}

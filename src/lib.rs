#![warn(missing_docs)]

/*!
 * Host-side client for talking to vehicles over an ELM327 OBD-II
 * interface.
 *
 * This crate establishes an ELM327 session, reassembles multi-ECU
 * ISO-TP responses, dispatches mode 01/03/04/07/09 service requests
 * and decodes the results: live sensor values via the [pid] catalog,
 * stored/pending trouble codes via [dtc]. The transport is generic
 * over anything implementing [std::io::Read] and [std::io::Write],
 * so the [service] layer can be driven against real hardware or an
 * in-memory fixture alike.
 */

pub mod dtc;
pub mod error;
pub mod frame;
pub mod hexutil;
pub mod monitor;
pub mod notifier;
pub mod pid;
pub mod serial_line;
pub mod service;
pub mod session;

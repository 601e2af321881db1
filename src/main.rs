use std::io::Write as IoWrite;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use colored::*;
use docopt::Docopt;
use log::{error, Level, LevelFilter};
use serde::{de, Deserialize, Deserializer};
use serial::core::SerialPortSettings;
use serial::SerialPort;

use obdctl::dtc::DtcStatus;
use obdctl::error::ObdError;
use obdctl::frame::EcuAddress;
use obdctl::monitor::TestOutcome;
use obdctl::pid;
use obdctl::service::Service;
use obdctl::session::SessionConfig;

const VERSION: &str = "v0.1";
const USAGE: &str = "
Usage:
    obdctl <port> ecus [-v] [--baud=<rate>]
    obdctl <port> vin [-v] [--baud=<rate>] [--ecu=<ecu>]
    obdctl <port> read-data <pid> [-v] [-t] [--baud=<rate>] [--ecu=<ecu>]
    obdctl <port> monitor [-v] [--baud=<rate>] [--ecu=<ecu>]
    obdctl <port> read-dtcs [-v] [--baud=<rate>]
    obdctl <port> clear-dtcs [-v] [--baud=<rate>]
    obdctl (-h | --help)
    obdctl --version

Args:
    <port>              Serial device the ELM327 interface is attached to,
                            e.g. /dev/ttyUSB0.
    <pid>               Mode 01 PID to read, e.g. 0x0C for Engine RPM.

Commands:
    ecus                Run bring-up and list responding ECU addresses.
    vin                 Read the Vehicle Identification Number.
    read-data           Read a single live-data PID, once or continuously.
    monitor             Read readiness monitor status (PID 0101), decoded.
    read-dtcs           Read stored and pending Diagnostic Trouble Codes.
    clear-dtcs          Clear all DTCs and freeze frame data.

Options:
    -h --help           Show usage information.
    --version           Show version.
    -v --verbose        Show more output.
    --baud=<rate>       Serial baud rate. [default: 38400]
    --ecu=<ecu>         ECU address to target, given in hex, e.g. 7E8.
                            Defaults to the first ECU discovered during
                            bring-up.
    -t --tail           Keep re-reading data until interrupted.

All numerical arguments can be given both in decimal and hex if prefixed
    with '0x'. Hex values should be zero-padded to an even length.

For more information on OBD2 PIDs, consult resources such as:
    https://en.wikipedia.org/wiki/OBD-II_PIDs#Service_01
";

#[derive(Clone, Debug, Eq, PartialEq)]
struct HexInput8 {
    value: u8,
}

impl<'de> Deserialize<'de> for HexInput8 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let value = if s.len() >= 2 && &s[0..2] == "0x" {
            if s.len() != 4 {
                return Err(de::Error::custom("Unexpected hex input length."));
            }
            u8::from_str_radix(&s[2..4], 16).map_err(de::Error::custom)?
        } else {
            u8::from_str_radix(&s, 10).map_err(de::Error::custom)?
        };

        Ok(Self { value })
    }
}

impl Deref for HexInput8 {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// CLI args
#[derive(Debug, Deserialize)]
struct Args {
    cmd_ecus: bool,
    cmd_vin: bool,
    cmd_read_data: bool,
    cmd_monitor: bool,
    cmd_read_dtcs: bool,
    cmd_clear_dtcs: bool,
    arg_port: String,
    arg_pid: Option<HexInput8>,
    flag_verbose: bool,
    flag_baud: u32,
    flag_ecu: Option<String>,
    flag_tail: bool,
}

/// Ask user for confirmation with the given message.
fn confirm(msg: String) -> Result<bool, ObdError> {
    let mut stdout = std::io::stdout();
    print!("{} ({}/{}): ", msg, "y".bold().green(), "N".bold().red());
    stdout.flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.to_lowercase() == "y\n")
}

fn open_service(args: &Args) -> Result<Service<serial::SystemPort>, ObdError> {
    let mut port =
        serial::open(&args.arg_port).map_err(|e| ObdError::OpenFailure(e.to_string()))?;
    port.reconfigure(&|settings| {
        settings.set_baud_rate(serial::BaudOther(args.flag_baud as usize))?;
        settings.set_char_size(serial::Bits8);
        settings.set_parity(serial::ParityNone);
        settings.set_stop_bits(serial::Stop1);
        settings.set_flow_control(serial::FlowNone);
        Ok(())
    })?;

    let config =
        SessionConfig { baud_rate: args.flag_baud, ..SessionConfig::default() };

    let mut service = Service::new(port, config);
    service.connect()?;
    Ok(service)
}

fn resolve_ecu(args: &Args, service: &Service<serial::SystemPort>) -> Result<EcuAddress, ObdError> {
    if let Some(ref ecu) = args.flag_ecu {
        return EcuAddress::parse(ecu);
    }
    service
        .session()
        .ecu_addresses
        .first()
        .cloned()
        .ok_or(ObdError::NoData)
}

fn cmd_ecus(args: Args) -> Result<(), ObdError> {
    let service = open_service(&args)?;
    let session = service.session();

    println!("{}: {}", "ELM327".green().bold(), session.elm_version);
    println!("{}: {}", "Protocol".green().bold(), session.protocol);
    for ecu in &session.ecu_addresses {
        println!("{} {}", "ECU".green().bold(), ecu);
    }

    Ok(())
}

fn cmd_vin(args: Args) -> Result<(), ObdError> {
    let mut service = open_service(&args)?;
    let ecu = resolve_ecu(&args, &service)?;
    let vin = service.read_vin(&ecu)?;
    println!("{}: {}", "VIN".green().bold(), vin);
    Ok(())
}

fn cmd_read_data(args: Args) -> Result<(), ObdError> {
    let pid = *args.arg_pid.clone().unwrap();
    let sensor = pid::find_mode01(pid)
        .ok_or_else(|| ObdError::UnexpectedResponse(format!("no catalog entry for PID {:02X}", pid)))?;

    let mut service = open_service(&args)?;
    let ecu = resolve_ecu(&args, &service)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .unwrap();

    loop {
        match service.read_sensor(sensor, Some(&ecu), "01")? {
            obdctl::error::ReadOutcome::Value(map) => {
                if let Some(v) = map.get(&ecu) {
                    println!(
                        "{}: {} {}",
                        sensor.name.green().bold(),
                        v,
                        sensor.unit
                    );
                }
            }
            _ => println!("{}", "NODATA".yellow().bold()),
        }

        if !args.flag_tail || !running.load(Ordering::SeqCst) {
            break;
        }
        sleep(Duration::from_millis(250));
    }

    Ok(())
}

fn outcome_label(outcome: TestOutcome) -> colored::ColoredString {
    match outcome {
        TestOutcome::NotApplicable => "N/A".normal(),
        TestOutcome::Complete => "complete".green(),
        TestOutcome::Failed => "incomplete".yellow(),
    }
}

fn cmd_monitor(args: Args) -> Result<(), ObdError> {
    let mut service = open_service(&args)?;
    let ecu = resolve_ecu(&args, &service)?;
    let status = service.read_monitor_status(&ecu)?;

    println!(
        "{}: {}    {}: {}",
        "MIL".green().bold(),
        if status.mil_on { "on".red().bold() } else { "off".normal() },
        "DTCs".green().bold(),
        status.dtc_count
    );
    for (test, outcome) in &status.continuous {
        println!("  {:?}: {}", test, outcome_label(*outcome));
    }
    for (test, outcome) in &status.non_continuous {
        println!("  {:?}: {}", test, outcome_label(*outcome));
    }

    Ok(())
}

fn cmd_read_dtcs(args: Args) -> Result<(), ObdError> {
    let mut service = open_service(&args)?;
    let dtcs = service.read_dtcs()?;

    let total: usize = dtcs.values().map(|v| v.len()).sum();
    if total == 0 {
        println!("\n{}", "No DTCs.".green().bold());
    }

    for (ecu, records) in &dtcs {
        for record in records {
            let status = match record.status {
                DtcStatus::Active => "stored",
                DtcStatus::Passive => "pending",
            };
            println!(
                "{} {}: {} ({})",
                "DTC".green().bold(),
                ecu,
                record.dtc.to_string().bold(),
                status
            );
        }
    }

    Ok(())
}

fn cmd_clear_dtcs(args: Args) -> Result<(), ObdError> {
    if !confirm(format!(
        "{}: Clearing DTCs also clears freeze frame data. Are you sure you wish to proceed?",
        "CAUTION".bold().red()
    ))? {
        return Err(ObdError::UnexpectedResponse("aborted".into()));
    }

    let mut service = open_service(&args)?;
    service.clear_dtcs()?;
    println!("\n{}", "DTCs cleared successfully.".green().bold());

    Ok(())
}

fn do_main() -> Result<(), ObdError> {
    let args: Args = Docopt::new(USAGE)
        .map(|d| d.version(Some(VERSION.into())))
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}: {}",
                match record.level() {
                    Level::Error => "error".bold().red(),
                    Level::Warn => "warn".bold().yellow(),
                    Level::Info => "info".bold().green(),
                    Level::Debug => "debug".bold().blue(),
                    Level::Trace => "trace".bold(),
                },
                record.args()
            )
        })
        .filter(None, if args.flag_verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .init();

    if args.cmd_ecus {
        cmd_ecus(args)
    } else if args.cmd_vin {
        cmd_vin(args)
    } else if args.cmd_read_data {
        cmd_read_data(args)
    } else if args.cmd_monitor {
        cmd_monitor(args)
    } else if args.cmd_read_dtcs {
        cmd_read_dtcs(args)
    } else if args.cmd_clear_dtcs {
        cmd_clear_dtcs(args)
    } else {
        unreachable!()
    }
}

fn main() {
    if let Err(e) = do_main() {
        error!("{}", e);
        std::process::exit(1);
    }
}

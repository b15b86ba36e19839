//! Interactive console for the speed-of-sound rig. All the measurement and
//! dataset logic lives in the library; this binary only turns commands into
//! session calls and failures into messages telling the operator what to do
//! next.

use clap::Parser;
use echometer::{
    args::EchoArgs,
    measurement_link::{LinkError, MeasurementLink},
    serial_link::{SerialLink, CONTROLLER_VENDOR_ID},
    session::{
        MeasurementSession, SampleId, SessionError, DISTANCE_PLACEHOLDER, MAX_REPETITIONS,
        TEMPERATURE_PLACEHOLDER,
    },
    sim_link::SimLink,
};
use log::info;
use serialport::SerialPortType;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};

fn main() {
    env_logger::init();
    let args = EchoArgs::parse();

    if args.simulate {
        info!("running against a simulated rig");
        let (distance, jitter) = (args.sim_distance, args.sim_jitter);
        let mut session = MeasurementSession::new();
        session.attach(SimLink::new(distance, jitter));
        println!("Simulated controller attached ({} m apart).", distance);

        run_console(session, move |session, _port| {
            session.attach(SimLink::new(distance, jitter));
            Ok(())
        });
    } else {
        let mut session = MeasurementSession::new();
        if let Err(err) = hardware_reconnect(&mut session, args.port.as_deref()) {
            report_failure(&err);
        }

        let default_port = args.port.clone();
        run_console(session, move |session, port| {
            hardware_reconnect(session, port.or(default_port.as_deref()))
        });
    }
}

/// Resolves a port (explicit, or discovered by USB vendor id) and swaps it
/// in as the session's connection.
fn hardware_reconnect(
    session: &mut MeasurementSession<SerialLink>,
    port: Option<&str>,
) -> Result<(), SessionError> {
    let port_name = match port {
        Some(name) => name.to_owned(),
        None => SerialLink::discover()?,
    };
    session.reconnect(&port_name)?;
    println!("Connected to {}.", port_name);
    Ok(())
}

fn run_console<L, R>(mut session: MeasurementSession<L>, mut reconnect: R)
where
    L: MeasurementLink,
    R: FnMut(&mut MeasurementSession<L>, Option<&str>) -> Result<(), SessionError>,
{
    println!("echometer console; type `help` for commands.");

    loop {
        print!("> ");
        io::stdout().flush().expect("failed to flush stdout");

        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .expect("failed to read stdin");
        if read == 0 {
            break;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        match words.split_first() {
            None => {}
            Some((&"measure", rest)) => cmd_measure(&mut session, rest),
            Some((&"list", _)) => cmd_list(&session),
            Some((&"delete", rest)) => cmd_delete(&mut session, rest),
            Some((&"clear", _)) => cmd_clear(&mut session),
            Some((&"export", rest)) => cmd_export(&mut session, rest),
            Some((&"reconnect", rest)) => {
                if let Err(err) = reconnect(&mut session, rest.first().copied()) {
                    report_failure(&err);
                }
            }
            Some((&"ports", _)) => cmd_ports(),
            Some((&"help", _)) => print_help(),
            Some((&"quit", _)) | Some((&"exit", _)) => {
                if !session.is_dirty()
                    || confirm("There are unsaved samples. Quit anyway?")
                {
                    break;
                }
            }
            Some((other, _)) => println!("Unknown command {:?}; type `help`.", other),
        }
    }
}

fn cmd_measure<L>(session: &mut MeasurementSession<L>, rest: &[&str])
where
    L: MeasurementLink,
{
    let Some(repetitions) = rest.first().and_then(|w| w.parse::<u32>().ok()) else {
        println!("Usage: measure <repetitions> [distance-cm] [temperature-c]");
        return;
    };
    if !(1..=MAX_REPETITIONS).contains(&repetitions) {
        println!("Repetitions must be between 1 and {}.", MAX_REPETITIONS);
        return;
    }

    // A label the operator did not type is the same as one left at the
    // form's placeholder: it comes out Un-Labeled.
    let distance = rest.get(1).copied().unwrap_or(DISTANCE_PLACEHOLDER);
    let temperature = rest.get(2).copied().unwrap_or(TEMPERATURE_PLACEHOLDER);

    match session.measure(repetitions, distance, temperature) {
        Ok(times) => println!("Recorded {} sample(s): {:?}", times.len(), times),
        Err(err) => report_failure(&err),
    }
}

fn cmd_list<L>(session: &MeasurementSession<L>)
where
    L: MeasurementLink,
{
    if session.samples().is_empty() {
        println!("Dataset is empty.");
        return;
    }

    println!("{:>4}  {:<16} {:<16} {:>10}", "id", "temperature", "distance", "time (us)");
    for sample in session.samples() {
        println!(
            "{:>4}  {:<16} {:<16} {:>10}",
            sample.id, sample.temperature_label, sample.distance_label, sample.time_us
        );
    }
    if session.is_dirty() {
        println!("{} sample(s), not yet exported.", session.samples().len());
    }
}

fn cmd_delete<L>(session: &mut MeasurementSession<L>, rest: &[&str])
where
    L: MeasurementLink,
{
    if rest.is_empty() {
        println!("Usage: delete <id> [<id>...]");
        return;
    }

    let wanted: HashSet<&str> = rest.iter().copied().collect();
    let ids: HashSet<SampleId> = session
        .samples()
        .iter()
        .filter(|s| wanted.contains(s.id.to_string().as_str()))
        .map(|s| s.id)
        .collect();

    let removed = session.delete_selected(&ids);
    println!("Removed {} sample(s).", removed);
}

fn cmd_clear<L>(session: &mut MeasurementSession<L>)
where
    L: MeasurementLink,
{
    if session.samples().is_empty() {
        println!("Dataset is already empty.");
        return;
    }
    let question = format!("Discard all {} sample(s)?", session.samples().len());
    if confirm(&question) {
        session.clear();
        println!("Dataset cleared.");
    }
}

fn cmd_export<L>(session: &mut MeasurementSession<L>, rest: &[&str])
where
    L: MeasurementLink,
{
    let Some(path) = rest.first() else {
        // Matches the cancelled save dialog: informational, not an error.
        println!("No destination given; nothing was written.");
        return;
    };

    match File::create(path) {
        Ok(file) => match session.export(file) {
            Ok(()) => println!("Wrote {} sample(s) to {}.", session.samples().len(), path),
            Err(err) => report_failure(&err),
        },
        Err(err) => println!("Could not create {}: {}", path, err),
    }
}

fn cmd_ports() {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(err) => {
            println!("Could not enumerate serial devices: {}", err);
            return;
        }
    };
    if ports.is_empty() {
        println!("No serial devices present.");
        return;
    }

    for p in ports {
        match p.port_type {
            SerialPortType::UsbPort(info) => {
                let label: Vec<String> =
                    [info.manufacturer, info.product].into_iter().flatten().collect();
                let marker = if info.vid == CONTROLLER_VENDOR_ID {
                    "  <- controller"
                } else {
                    ""
                };
                println!(
                    "  {} [{:04x}:{:04x}] {}{}",
                    p.port_name,
                    info.vid,
                    info.pid,
                    label.join(" "),
                    marker
                );
            }
            _ => println!("  {}", p.port_name),
        }
    }
}

/// Maps each failure kind to what the operator should actually do about it.
fn report_failure(err: &SessionError) {
    let guidance = match err {
        SessionError::Link(LinkError::PortBusy(_)) => {
            "Another program is holding the port; close it and run `reconnect`."
        }
        SessionError::Link(LinkError::Connection(_))
        | SessionError::Link(LinkError::NoMatchingDevice) => {
            "Check the USB cable and power, then run `reconnect`."
        }
        SessionError::Link(LinkError::Communication(_)) => {
            "The controller dropped off the bus; plug it back in and run `reconnect`."
        }
        SessionError::Timeout => {
            "The controller stopped responding; press its reset button and try again."
        }
        SessionError::Protocol(_) => {
            "The controller sent garbage; power-cycle it before measuring again."
        }
        SessionError::Validation(_) => "Repetitions must be at least 1.",
        SessionError::Disconnected => "No controller attached; run `reconnect` first.",
        SessionError::Export(_) => "The file could not be written; check the destination path.",
    };

    println!("Error: {}", err);
    println!("  {}", guidance);
}

fn confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    io::stdout().flush().expect("failed to flush stdout");

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .expect("failed to read stdin");
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn print_help() {
    println!("Commands:");
    println!("  measure <repetitions> [distance-cm] [temperature-c]");
    println!("  list                 show the dataset");
    println!("  delete <id> [...]    remove samples by id");
    println!("  clear                discard the dataset");
    println!("  export <path>        write the dataset as CSV");
    println!("  reconnect [port]     reopen the controller connection");
    println!("  ports                list serial devices");
    println!("  quit");
}

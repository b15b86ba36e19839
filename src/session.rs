//! The [`MeasurementSession`] runs one measurement exchange at a time against
//! whatever [`MeasurementLink`] it currently holds, and owns the labeled
//! dataset that the exchanges fill. The protocol is deliberately simple: the
//! host sends a repetition count, the controller echoes the command and then
//! prints one travel time per repetition, one line each. Line count is the
//! only framing there is; a batch either completes in full or is thrown
//! away whole.
//!
//! The session is either `Connected` (it holds a link) or `Disconnected`
//! (it does not). A transport failure mid-exchange drops the link; a
//! half-dead port must never be left looking usable. A timeout or a garbled
//! response keeps it: the port itself is fine, and the next exchange starts
//! with an input flush anyway.

use crate::export;
use crate::measurement_link::{LinkError, MeasurementLink};
use crate::response_decoder::TimingReading;
use crate::serial_link::SerialLink;

use log::{debug, info};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::str::{self, FromStr};

/// Prompt text the temperature entry field starts out with. A label left at
/// this value is stored as [`UNLABELED`].
pub const TEMPERATURE_PLACEHOLDER: &str = "Temperature (°C)";

/// Prompt text the distance entry field starts out with.
pub const DISTANCE_PLACEHOLDER: &str = "Distance (cm)";

/// Sentinel stored when the operator left a label at its placeholder.
pub const UNLABELED: &str = "Un-Labeled";

/// Most repetitions a front-end should request in one batch. The session
/// itself only rejects counts below one; this bound exists to keep the
/// worst-case stall (one read timeout per expected line) tolerable.
pub const MAX_REPETITIONS: u32 = 50;

/// Stable identity of a sample within a session, for selection and deletion.
/// Ids are never reused, so deleting a sample cannot redirect a stale
/// selection at a different row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId(u64);

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One labeled timing observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Identity within this session, in insertion order.
    pub id: SampleId,
    /// Operator-supplied temperature annotation, or [`UNLABELED`].
    pub temperature_label: String,
    /// Operator-supplied distance annotation, or [`UNLABELED`].
    pub distance_label: String,
    /// Acoustic travel time in microseconds.
    pub time_us: i64,
}

/// Everything a session operation can fail with. Link failures pass through
/// unmodified; the session adds the protocol-level failure modes on top.
#[derive(Debug)]
pub enum SessionError {
    /// The underlying serial transport failed; see [`LinkError`].
    Link(LinkError),

    /// An expected response line never arrived within the read timeout. The
    /// whole batch was discarded.
    Timeout,

    /// A response line was not a well-formed integer; carries the offending
    /// line. The whole batch was discarded.
    Protocol(String),

    /// The requested repetition count was below one. Nothing was sent.
    Validation(u32),

    /// No controller is attached; reconnect before measuring.
    Disconnected,

    /// Writing the CSV export failed.
    Export(csv::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SessionError as SE;
        let msg = match self {
            SE::Link(error) => Cow::from(format!("{}", error)),
            SE::Timeout => Cow::from("data request timed out"),
            SE::Protocol(line) => Cow::from(format!("malformed response line {:?}", line)),
            SE::Validation(n) => Cow::from(format!("invalid repetition count {}", n)),
            SE::Disconnected => Cow::from("no controller connected"),
            SE::Export(error) => Cow::from(format!("export failed: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for SessionError {}

impl From<LinkError> for SessionError {
    fn from(value: LinkError) -> Self {
        Self::Link(value)
    }
}

impl From<csv::Error> for SessionError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value)
    }
}

/// Orchestrates measurement batches over a [`MeasurementLink`] and owns the
/// resulting dataset along with its unsaved-changes flag. Single-caller by
/// design; nothing here is safe to share between threads without external
/// locking.
pub struct MeasurementSession<Link>
where
    Link: MeasurementLink,
{
    link: Option<Link>,
    samples: Vec<Sample>,
    next_id: u64,
    dirty: bool,
}

impl<Link> MeasurementSession<Link>
where
    Link: MeasurementLink,
{
    /// Creates a disconnected session with an empty dataset.
    pub fn new() -> Self {
        Self {
            link: None,
            samples: Vec::new(),
            next_id: 0,
            dirty: false,
        }
    }

    /// Attaches a link, replacing (and thereby closing) any previous one.
    /// The dataset is untouched.
    pub fn attach(&mut self, link: Link) {
        self.link = Some(link);
    }

    /// Whether the session currently holds a link.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// The dataset in insertion order, which is also display and export
    /// order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Whether the dataset has changed since the last successful export.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Runs one measurement batch: sends the repetition count, collects the
    /// echo line plus one timing line per repetition, parses them, labels
    /// them, and appends them to the dataset. Returns the parsed times in
    /// response order.
    ///
    /// On any failure the dataset is left exactly as it was. A transport
    /// failure additionally drops the link; a timeout or malformed response
    /// does not.
    pub fn measure(
        &mut self,
        repetitions: u32,
        distance_label: &str,
        temperature_label: &str,
    ) -> Result<Vec<i64>, SessionError> {
        if repetitions < 1 {
            return Err(SessionError::Validation(repetitions));
        }
        let link = self.link.as_mut().ok_or(SessionError::Disconnected)?;

        let lines = match Self::run_exchange(link, repetitions) {
            Ok(lines) => lines,
            Err(err) => {
                if matches!(err, SessionError::Link(_)) {
                    self.link = None;
                }
                return Err(err);
            }
        };

        // The first line is the controller echoing the command; only the
        // remainder carries data.
        let mut times = Vec::with_capacity(repetitions as usize);
        for raw in &lines[1..] {
            times.push(parse_timing_line(raw)?);
        }

        let temperature = normalize_label(temperature_label, TEMPERATURE_PLACEHOLDER);
        let distance = normalize_label(distance_label, DISTANCE_PLACEHOLDER);
        for &time_us in &times {
            let id = SampleId(self.next_id);
            self.next_id += 1;
            self.samples.push(Sample {
                id,
                temperature_label: temperature.clone(),
                distance_label: distance.clone(),
                time_us,
            });
        }
        self.dirty = true;

        info!(
            "measured {} sample(s), dataset now holds {}",
            times.len(),
            self.samples.len()
        );
        Ok(times)
    }

    // Sends the command and collects exactly repetitions + 1 raw lines. An
    // empty read is the timeout signal and aborts the exchange.
    fn run_exchange(link: &mut Link, repetitions: u32) -> Result<Vec<Vec<u8>>, SessionError> {
        link.flush_input()?;
        link.write_line(&repetitions.to_string())?;

        let mut lines = Vec::with_capacity(repetitions as usize + 1);
        for _ in 0..=repetitions {
            let line = link.read_line()?;
            if line.is_empty() {
                debug!(
                    "response line {} of {} never arrived",
                    lines.len() + 1,
                    repetitions + 1
                );
                return Err(SessionError::Timeout);
            }
            lines.push(line);
        }
        Ok(lines)
    }

    /// Removes every sample whose id is in `ids`, preserving the relative
    /// order of the rest, and returns how many were removed. Removing
    /// something marks the dataset unsaved, unless it is now empty, which is
    /// treated like [`clear`](Self::clear).
    pub fn delete_selected(&mut self, ids: &HashSet<SampleId>) -> usize {
        let before = self.samples.len();
        self.samples.retain(|s| !ids.contains(&s.id));
        let removed = before - self.samples.len();
        if removed > 0 {
            self.dirty = !self.samples.is_empty();
        }
        removed
    }

    /// Empties the dataset and clears the unsaved-changes flag. Asking the
    /// operator first is the front-end's job.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.dirty = false;
    }

    /// Writes the dataset as CSV to `sink` and, on success, clears the
    /// unsaved-changes flag. Where the sink points is the front-end's
    /// business; the session never touches the filesystem itself.
    pub fn export<W>(&mut self, sink: W) -> Result<(), SessionError>
    where
        W: Write,
    {
        export::write_samples(&self.samples, sink)?;
        self.dirty = false;
        info!("exported {} sample(s)", self.samples.len());
        Ok(())
    }
}

impl<Link> Default for MeasurementSession<Link>
where
    Link: MeasurementLink,
{
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementSession<SerialLink> {
    /// Opens the named port and swaps it in as the active connection. The
    /// old handle is closed first so the OS never sees both at once. On
    /// failure the session is left disconnected; the dataset is untouched
    /// either way.
    pub fn reconnect(&mut self, port_name: &str) -> Result<(), SessionError> {
        self.link = None;
        let link = SerialLink::open(port_name)?;
        self.link = Some(link);
        Ok(())
    }
}

fn parse_timing_line(raw: &[u8]) -> Result<i64, SessionError> {
    let text = str::from_utf8(raw)
        .map_err(|_| SessionError::Protocol(String::from_utf8_lossy(raw).into_owned()))?;
    let text = text.trim_end();
    let reading = TimingReading::from_str(text)
        .map_err(|_| SessionError::Protocol(text.to_owned()))?;
    Ok(reading.0)
}

fn normalize_label(label: &str, placeholder: &str) -> String {
    if label.is_empty() || label == placeholder {
        UNLABELED.to_owned()
    } else {
        label.to_owned()
    }
}

//! CSV serialization of the measurement dataset. The column layout is fixed
//! so the file opens cleanly in a spreadsheet next to the lab worksheet:
//! temperature, distance, then travel time, one row per sample in dataset
//! order.

use crate::session::Sample;

use serde::Serialize;
use std::io::Write;

/// The fixed header row of every exported file.
pub const HEADER: [&str; 3] = ["Temperature (°C)", "Distance (cm)", "Time Taken (us)"];

// Field order here is the column order in the file.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    temperature: &'a str,
    distance: &'a str,
    time_us: i64,
}

/// Writes the header and one row per sample to `sink`. An empty dataset
/// still produces the header, so the file is well-formed either way.
pub fn write_samples<W>(samples: &[Sample], sink: W) -> Result<(), csv::Error>
where
    W: Write,
{
    // Header written by hand rather than derived from the row struct, since
    // the column names carry units and punctuation no field name could.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(sink);

    writer.write_record(HEADER)?;
    for sample in samples {
        writer.serialize(ExportRow {
            temperature: &sample.temperature_label,
            distance: &sample.distance_label,
            time_us: sample.time_us,
        })?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement_link::{LinkError, MeasurementLink};
    use crate::session::MeasurementSession;
    use std::collections::VecDeque;
    use std::fs;

    struct ScriptedLink(VecDeque<Vec<u8>>);

    impl ScriptedLink {
        fn for_batch(readings: &[i64]) -> Self {
            let mut script = VecDeque::new();
            script.push_back(format!("{}\r", readings.len()).into_bytes());
            for r in readings {
                script.push_back(format!("{}\r", r).into_bytes());
            }
            ScriptedLink(script)
        }
    }

    impl MeasurementLink for ScriptedLink {
        fn flush_input(&mut self) -> Result<(), LinkError> {
            Ok(())
        }
        fn write_line(&mut self, _line: &str) -> Result<(), LinkError> {
            Ok(())
        }
        fn read_line(&mut self) -> Result<Vec<u8>, LinkError> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    /// Two one-shot batches at the same temperature, different distances.
    fn example_session() -> MeasurementSession<ScriptedLink> {
        let mut session = MeasurementSession::new();
        session.attach(ScriptedLink::for_batch(&[2941]));
        session.measure(1, "100", "20").unwrap();
        session.attach(ScriptedLink::for_batch(&[4412]));
        session.measure(1, "150", "20").unwrap();
        session
    }

    #[test]
    fn test_export_round_trip() {
        let mut session = example_session();
        let mut out = Vec::new();
        session.export(&mut out).unwrap();

        let mut reader = csv::Reader::from_reader(&out[..]);
        let headers: Vec<&str> = reader.headers().unwrap().iter().collect();
        assert_eq!(headers, HEADER);

        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_owned).collect())
            .collect();
        assert_eq!(
            rows,
            vec![
                vec!["20".to_owned(), "100".to_owned(), "2941".to_owned()],
                vec!["20".to_owned(), "150".to_owned(), "4412".to_owned()],
            ]
        );
    }

    #[test]
    fn test_empty_dataset_still_writes_header() {
        let mut out = Vec::new();
        write_samples(&[], &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Temperature (°C),Distance (cm),Time Taken (us)\n");
    }

    #[test]
    fn test_export_to_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let mut session = example_session();
        let file = fs::File::create(&path).unwrap();
        session.export(file).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Temperature (°C),Distance (cm),Time Taken (us)\n"));
        assert_eq!(text.lines().count(), 3);
    }
}

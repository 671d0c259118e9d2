//! Canonical trip interchange
//!
//! Canonical trips are persisted as CSV with the fixed header
//! `duration,month,hour,day_of_week,user_type`, one row per trip, so that
//! later runs can aggregate without re-normalizing the raw sources.

use crate::error::TripError;
use crate::types::CanonicalTrip;
use std::borrow::Borrow;
use std::io::{Read, Write};

/// Column header of the canonical interchange format
pub const CANONICAL_HEADER: [&str; 5] = ["duration", "month", "hour", "day_of_week", "user_type"];

/// Streaming writer for canonical trips
pub struct CanonicalWriter<W: Write> {
    inner: csv::Writer<W>,
    written: u64,
}

impl<W: Write> CanonicalWriter<W> {
    /// Create a writer and emit the header row immediately, so an empty
    /// output is still a valid canonical file.
    pub fn new(writer: W) -> Result<Self, TripError> {
        let mut inner = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        inner.write_record(CANONICAL_HEADER)?;

        Ok(Self { inner, written: 0 })
    }

    pub fn write(&mut self, trip: &CanonicalTrip) -> Result<(), TripError> {
        self.inner.serialize(trip)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered rows and return the number of trips written
    pub fn finish(mut self) -> Result<u64, TripError> {
        self.inner.flush()?;
        Ok(self.written)
    }
}

/// Write a sequence of canonical trips, returning how many were written
pub fn write_canonical<W, I>(writer: W, trips: I) -> Result<u64, TripError>
where
    W: Write,
    I: IntoIterator,
    I::Item: Borrow<CanonicalTrip>,
{
    let mut out = CanonicalWriter::new(writer)?;
    for trip in trips {
        out.write(trip.borrow())?;
    }
    out.finish()
}

/// Streaming reader over canonical trips.
///
/// Yields one result per data row; rows that fail to parse or fall outside the
/// canonical ranges come back as recoverable [`TripError::MalformedValue`]s.
pub struct CanonicalReader<R: Read> {
    rows: csv::DeserializeRecordsIntoIter<R, CanonicalTrip>,
}

impl<R: Read> CanonicalReader<R> {
    /// Open a canonical stream, checking its header first
    pub fn new(reader: R) -> Result<Self, TripError> {
        let mut inner = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = inner.headers()?;
        let matches = headers.len() == CANONICAL_HEADER.len()
            && headers
                .iter()
                .zip(CANONICAL_HEADER)
                .all(|(found, expected)| found == expected);
        if !matches {
            return Err(TripError::InvalidHeader(format!(
                "expected '{}', found '{}'",
                CANONICAL_HEADER.join(","),
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }

        Ok(Self {
            rows: inner.into_deserialize(),
        })
    }
}

impl<R: Read> Iterator for CanonicalReader<R> {
    type Item = Result<CanonicalTrip, TripError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(
            row.map_err(TripError::from_row)
                .and_then(|trip| trip.validate().map(|()| trip)),
        )
    }
}

/// Read every canonical trip, failing on the first bad row
pub fn read_canonical<R: Read>(reader: R) -> Result<Vec<CanonicalTrip>, TripError> {
    CanonicalReader::new(reader)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayOfWeek, UserType};
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use std::io::BufReader;

    fn sample_trips() -> Vec<CanonicalTrip> {
        vec![
            CanonicalTrip::new(838.0 / 60.0, 1, 0, DayOfWeek::Friday, UserType::Customer)
                .unwrap(),
            CanonicalTrip::new(
                427_846.0 / 60_000.0,
                3,
                22,
                DayOfWeek::Thursday,
                UserType::Subscriber,
            )
            .unwrap(),
            CanonicalTrip::new(0.1, 12, 23, DayOfWeek::Sunday, UserType::Subscriber).unwrap(),
        ]
    }

    #[test]
    fn test_header_and_row_layout() {
        let mut buffer = Vec::new();
        write_canonical(&mut buffer, &sample_trips()[..1]).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("duration,month,hour,day_of_week,user_type"));
        assert_eq!(lines.next(), Some("13.966666666666667,1,0,Friday,Customer"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_output_has_header() {
        let mut buffer = Vec::new();
        let written = write_canonical(&mut buffer, Vec::<CanonicalTrip>::new()).unwrap();

        assert_eq!(written, 0);
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "duration,month,hour,day_of_week,user_type\n"
        );
        assert!(read_canonical("duration,month,hour,day_of_week,user_type\n".as_bytes())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_file_round_trip() {
        let trips = sample_trips();
        let file = tempfile::NamedTempFile::new().unwrap();

        let written = write_canonical(File::create(file.path()).unwrap(), &trips).unwrap();
        assert_eq!(written, 3);

        let read_back =
            read_canonical(BufReader::new(File::open(file.path()).unwrap())).unwrap();
        assert_eq!(read_back, trips);
    }

    #[test]
    fn test_rejects_wrong_header() {
        let data = "duration,month,hour,weekday,user_type\n5.0,1,0,Friday,Customer\n";
        assert!(matches!(
            CanonicalReader::new(data.as_bytes()),
            Err(TripError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_bad_rows_are_recoverable() {
        let data = "\
duration,month,hour,day_of_week,user_type
5.0,1,0,Friday,Customer
5.0,13,0,Friday,Customer
abc,1,0,Friday,Customer
5.0,1,0,Funday,Customer
7.5,2,9,Monday,Subscriber
";
        let rows: Vec<_> = CanonicalReader::new(data.as_bytes()).unwrap().collect();

        assert_eq!(rows.len(), 5);
        assert!(rows[0].is_ok());
        for bad in &rows[1..4] {
            let err = bad.as_ref().unwrap_err();
            assert!(err.is_recoverable(), "not recoverable: {err}");
        }
        assert_eq!(rows[4].as_ref().unwrap().start_weekday, DayOfWeek::Monday);

        assert!(read_canonical(data.as_bytes()).is_err());
    }
}

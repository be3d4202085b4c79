use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use super::GtfsFeed;
use super::error::{Error, LineError};

impl GtfsFeed {
    /// Reads a zipped feed. `agency`, `routes`, `stops`, `trips` and
    /// `stop_times` are required; the other tables default to empty.
    pub fn from_zip(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::NamedFileIO {
            file_name: path.display().to_string(),
            source: Box::new(e),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, Error> {
        let mut archive = ZipArchive::new(reader)?;
        let feed = GtfsFeed {
            agencies: read_table(&mut archive, "agency.txt")?,
            routes: read_table(&mut archive, "routes.txt")?,
            stops: read_table(&mut archive, "stops.txt")?,
            trips: read_table(&mut archive, "trips.txt")?,
            stop_times: read_table(&mut archive, "stop_times.txt")?,
            calendar: optional_read_table(&mut archive, "calendar.txt")?,
            shapes: optional_read_table(&mut archive, "shapes.txt")?,
            translations: optional_read_table(&mut archive, "translations.txt")?,
        };
        debug!(routes = feed.routes.len(), trips = feed.trips.len(), "GTFS feed read");
        Ok(feed)
    }
}

fn read_table<R, O>(archive: &mut ZipArchive<R>, file_name: &str) -> Result<Vec<O>, Error>
where
    R: Read + Seek,
    for<'de> O: Deserialize<'de>,
{
    match archive.by_name(file_name) {
        Ok(entry) => read_obj(entry, file_name),
        Err(ZipError::FileNotFound) => Err(Error::MissingFile(file_name.to_owned())),
        Err(e) => Err(e.into()),
    }
}

fn optional_read_table<R, O>(archive: &mut ZipArchive<R>, file_name: &str) -> Result<Vec<O>, Error>
where
    R: Read + Seek,
    for<'de> O: Deserialize<'de>,
{
    match read_table(archive, file_name) {
        Err(Error::MissingFile(_)) => Ok(Vec::new()),
        other => other,
    }
}

fn read_obj<T, O>(mut reader: T, file_name: &str) -> Result<Vec<O>, Error>
where
    for<'de> O: Deserialize<'de>,
    T: Read,
{
    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|e| Error::NamedFileIO {
            file_name: file_name.to_owned(),
            source: Box::new(e),
        })?;
    let body = body.strip_prefix(&[0xefu8, 0xbb, 0xbf]).unwrap_or(&body);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);
    // Kept to report the offending line
    let headers = reader
        .headers()
        .map_err(|e| Error::CSVError {
            file_name: file_name.to_owned(),
            source: e,
            line_in_error: None,
        })?
        .clone();

    let mut rec = csv::StringRecord::new();
    let mut objs = Vec::new();
    while reader.read_record(&mut rec).map_err(|e| Error::CSVError {
        file_name: file_name.to_owned(),
        source: e,
        line_in_error: None,
    })? {
        let obj = rec.deserialize(Some(&headers)).map_err(|e| Error::CSVError {
            file_name: file_name.to_owned(),
            source: e,
            line_in_error: Some(LineError {
                headers: headers.iter().map(String::from).collect(),
                values: rec.iter().map(String::from).collect(),
            }),
        })?;
        objs.push(obj);
    }
    Ok(objs)
}

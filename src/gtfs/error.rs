use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error that can occur when reading a GTFS archive.
#[derive(Error, Debug)]
pub enum Error {
    /// A mandatory file is not present in the archive
    #[error("Could not find file {0}")]
    MissingFile(String),
    /// A time is not `HH:MM` or `HH:MM:SS`
    #[error("'{0}' is not a valid time")]
    InvalidTime(String),
    /// Impossible to read a file
    #[error("impossible to read '{file_name}'")]
    NamedFileIO {
        file_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Impossible to read a CSV file
    #[error("impossible to read csv file '{file_name}'")]
    CSVError {
        file_name: String,
        #[source]
        source: csv::Error,
        /// The line that could not be parsed, when there is one
        line_in_error: Option<LineError>,
    },
    /// Error when trying to unzip the GTFS archive
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

/// Specific line from a CSV file that could not be read
#[derive(Debug, Deserialize, Serialize)]
pub struct LineError {
    pub headers: Vec<String>,
    pub values: Vec<String>,
}

//! Output formatting and persistence for summaries and derived tables.
//!
//! Supports pretty-printing to the log, JSON files, CSV files and GeoJSON
//! feature collections.

use anyhow::{Context, Result};
use geojson::{FeatureCollection, GeoJson};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Creates the parent directory of `path` if there is one.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Writes a value as pretty-printed JSON, replacing any existing file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

/// Writes `rows` as a CSV file with a single header row, replacing any
/// existing file.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

/// Writes a GeoJSON feature collection.
pub fn write_geojson(path: &Path, collection: FeatureCollection) -> Result<()> {
    ensure_parent(path)?;
    let features = collection.features.len();
    let geojson = GeoJson::FeatureCollection(collection);
    fs::write(path, geojson.to_string())
        .with_context(|| format!("cannot write {}", path.display()))?;
    info!(path = %path.display(), features, "GeoJSON written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::path::PathBuf;

    #[derive(Debug, Default, Serialize)]
    struct Row {
        id: String,
        trip_count: usize,
    }

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&Row::default());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&Row::default()).unwrap();
    }

    #[test]
    fn test_write_csv_writes_header_once() {
        let path = temp_path("bmtc_gtfs_test_header.csv");
        let _ = fs::remove_file(&path);

        let rows = vec![
            Row { id: "a".to_string(), trip_count: 1 },
            Row { id: "b".to_string(), trip_count: 2 },
        ];
        write_csv(&path, &rows).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines, vec!["id,trip_count", "a,1", "b,2"]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_csv_replaces_existing_file() {
        let path = temp_path("bmtc_gtfs_test_replace.csv");
        let _ = fs::remove_file(&path);

        write_csv(&path, &[Row::default(), Row::default()]).unwrap();
        write_csv(&path, &[Row::default()]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_json_creates_parent_dirs() {
        let dir = temp_path("bmtc_gtfs_test_json_dir");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("summary.json");

        write_json(&path, &Row { id: "x".to_string(), trip_count: 3 }).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["trip_count"], 3);

        fs::remove_dir_all(&dir).unwrap();
    }
}

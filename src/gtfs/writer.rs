use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::info;

use super::GtfsFeed;
use crate::output::ensure_parent;
use crate::raw::archive::{Entries, write_zip};

/// Serializes `rows` as a CSV table. Empty tables produce no entry.
fn add_table<T: Serialize>(entries: &mut Entries, file_name: &str, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("cannot serialize a row of {file_name}"))?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("cannot flush {file_name}: {e}"))?;
    entries.insert(file_name.to_string(), body);
    Ok(())
}

impl GtfsFeed {
    /// The feed as `file name -> CSV bytes`.
    pub fn to_entries(&self) -> Result<Entries> {
        let mut entries = Entries::new();
        add_table(&mut entries, "agency.txt", &self.agencies)?;
        add_table(&mut entries, "routes.txt", &self.routes)?;
        add_table(&mut entries, "stops.txt", &self.stops)?;
        add_table(&mut entries, "trips.txt", &self.trips)?;
        add_table(&mut entries, "stop_times.txt", &self.stop_times)?;
        add_table(&mut entries, "calendar.txt", &self.calendar)?;
        add_table(&mut entries, "shapes.txt", &self.shapes)?;
        add_table(&mut entries, "translations.txt", &self.translations)?;
        Ok(entries)
    }

    pub fn to_writer<W: Write + Seek>(&self, writer: W) -> Result<()> {
        write_zip(writer, &self.to_entries()?)
    }

    /// Writes the feed as a zip archive, replacing `path`.
    pub fn write_zip(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let file = File::create(path)
            .with_context(|| format!("cannot create feed {}", path.display()))?;
        self.to_writer(BufWriter::new(file))
            .with_context(|| format!("cannot write feed {}", path.display()))?;
        info!(path = %path.display(), "GTFS feed written");
        Ok(())
    }
}

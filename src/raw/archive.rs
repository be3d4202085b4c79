//! On-disk store of raw API responses.
//!
//! Each [`Category`] lives in its own zip file inside the raw directory, with
//! one JSON document per entry keyed by route (for example
//! `timetables.zip:Monday/335-E UP.json`). The route list itself is a plain
//! `routes.json` next to the archives.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const ROUTE_LIST_FILE: &str = "routes.json";

/// Entries of one archive, keyed by entry name. A `BTreeMap` keeps archive
/// order stable between runs.
pub type Entries = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    RouteIds,
    RouteLines,
    Stops,
    Timetables,
    Translations,
}

impl Category {
    pub fn file_name(self) -> &'static str {
        match self {
            Category::RouteIds => "routeids.zip",
            Category::RouteLines => "routelines.zip",
            Category::Stops => "stops.zip",
            Category::Timetables => "timetables.zip",
            Category::Translations => "translations.zip",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::RouteIds => "routeids",
            Category::RouteLines => "routelines",
            Category::Stops => "stops",
            Category::Timetables => "timetables",
            Category::Translations => "translations",
        }
    }
}

/// Entry name for a per-route document.
pub fn route_key(route_no: &str) -> String {
    format!("{}.json", route_no.trim())
}

/// Entry name for a per-route timetable fetched for a given weekday.
pub fn timetable_key(weekday: &str, route_no: &str) -> String {
    format!("{}/{}", weekday, route_key(route_no))
}

/// Handle on a raw directory.
#[derive(Debug, Clone)]
pub struct RawStore {
    dir: PathBuf,
}

impl RawStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, category: Category) -> PathBuf {
        self.dir.join(category.file_name())
    }

    pub fn route_list_path(&self) -> PathBuf {
        self.dir.join(ROUTE_LIST_FILE)
    }

    pub fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create raw directory {}", self.dir.display()))
    }

    pub fn has_route_list(&self) -> bool {
        self.route_list_path().is_file()
    }

    pub fn read_route_list(&self) -> Result<Vec<u8>> {
        let path = self.route_list_path();
        fs::read(&path).with_context(|| format!("cannot read route list {}", path.display()))
    }

    pub fn write_route_list(&self, body: &[u8]) -> Result<()> {
        let path = self.route_list_path();
        fs::write(&path, body).with_context(|| format!("cannot write route list {}", path.display()))
    }

    /// Reads every entry of a category archive.
    ///
    /// # Errors
    ///
    /// Fails if the archive is missing or unreadable.
    pub fn read(&self, category: Category) -> Result<Entries> {
        let path = self.path(category);
        let file = File::open(&path)
            .with_context(|| format!("cannot open {} archive {}", category.name(), path.display()))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .with_context(|| format!("{} is not a zip archive", path.display()))?;

        let mut entries = Entries::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut body = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut body)
                .with_context(|| format!("cannot read {} from {}", name, path.display()))?;
            entries.insert(name, body);
        }

        debug!(category = category.name(), entries = entries.len(), "Raw archive read");
        Ok(entries)
    }

    /// Like [`RawStore::read`] but a missing archive is an empty one.
    pub fn read_optional(&self, category: Category) -> Result<Entries> {
        if self.path(category).exists() {
            self.read(category)
        } else {
            Ok(Entries::new())
        }
    }

    /// Replaces a category archive with `entries`.
    pub fn write(&self, category: Category, entries: &Entries) -> Result<()> {
        let path = self.path(category);
        let file = File::create(&path)
            .with_context(|| format!("cannot create {} archive {}", category.name(), path.display()))?;
        write_zip(BufWriter::new(file), entries)
            .with_context(|| format!("cannot write {}", path.display()))?;

        info!(category = category.name(), entries = entries.len(), path = %path.display(), "Raw archive written");
        Ok(())
    }
}

/// Writes `entries` as a deflated zip. Entry timestamps are pinned so the
/// same entries always produce the same bytes.
pub fn write_zip<W: Write + std::io::Seek>(writer: W, entries: &Entries) -> Result<()> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut zip = ZipWriter::new(writer);
    for (name, body) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(body)?;
    }
    zip.finish()?.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_store(name: &str) -> RawStore {
        let dir = env::temp_dir().join(format!("bmtc_gtfs_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let store = RawStore::new(dir);
        store.create_dir().unwrap();
        store
    }

    #[test]
    fn test_keys() {
        assert_eq!(route_key(" 335-E UP "), "335-E UP.json");
        assert_eq!(timetable_key("Monday", "335-E UP"), "Monday/335-E UP.json");
    }

    #[test]
    fn test_write_then_read_category() {
        let store = temp_store("archive_rw");
        let mut entries = Entries::new();
        entries.insert("Monday/1 UP.json".to_string(), b"{\"data\":[]}".to_vec());
        entries.insert("Tuesday/1 UP.json".to_string(), b"{}".to_vec());

        store.write(Category::Timetables, &entries).unwrap();
        let read = store.read(Category::Timetables).unwrap();

        assert_eq!(read, entries);
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_missing_archive() {
        let store = temp_store("archive_missing");
        assert!(store.read(Category::Stops).is_err());
        assert!(store.read_optional(Category::Translations).unwrap().is_empty());
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_identical_entries_give_identical_bytes() {
        let mut entries = Entries::new();
        entries.insert("a.json".to_string(), b"{\"x\":1}".to_vec());

        let mut first = std::io::Cursor::new(Vec::new());
        let mut second = std::io::Cursor::new(Vec::new());
        write_zip(&mut first, &entries).unwrap();
        write_zip(&mut second, &entries).unwrap();

        assert_eq!(first.into_inner(), second.into_inner());
    }
}

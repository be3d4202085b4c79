//! Raw scrape output: API payload types and the zip-backed store.

pub mod archive;
pub mod types;

pub use archive::{Category, Entries, RawStore};

use anyhow::Result;
use tracing::info;

use crate::parser::parse_payload;
use types::RouteListResponse;

/// Everything the builder needs from one scrape, loaded into memory.
#[derive(Debug, Default)]
pub struct RawDataset {
    pub routes: RouteListResponse,
    pub stops: Entries,
    pub routelines: Entries,
    pub timetables: Entries,
    pub translations: Entries,
}

impl RawDataset {
    /// Loads the route list and the per-route archives.
    ///
    /// # Errors
    ///
    /// The route list and the stops, routelines and timetables archives are
    /// required; a missing or unreadable one is fatal. Translations are
    /// optional.
    #[tracing::instrument(skip(store), fields(dir = %store.dir().display()))]
    pub fn load(store: &RawStore) -> Result<Self> {
        let routes = parse_payload(&store.read_route_list()?)?;
        let dataset = Self {
            routes,
            stops: store.read(Category::Stops)?,
            routelines: store.read(Category::RouteLines)?,
            timetables: store.read(Category::Timetables)?,
            translations: store.read_optional(Category::Translations)?,
        };

        info!(
            routes = dataset.routes.data.len(),
            stop_lists = dataset.stops.len(),
            routelines = dataset.routelines.len(),
            timetables = dataset.timetables.len(),
            translations = dataset.translations.len(),
            "Raw dataset loaded"
        );
        Ok(dataset)
    }
}

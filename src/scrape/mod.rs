//! Scrape stage: pull raw JSON from the backend into the raw store.
//!
//! Network and parse failures are logged and recorded per key; they never
//! abort the run. Only the route list (without which nothing else can be
//! requested) and filesystem errors are fatal.

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{Days, NaiveDate};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::output::write_json;
use crate::parser::parse_payload;
use crate::raw::archive::{Category, Entries, RawStore, route_key, timetable_key};
use crate::raw::types::{
    Direction, RouteListEntry, RouteListResponse, RoutePointsResponse, RouteSearchResponse,
    StopListResponse, TimetableResponse, strip_direction,
};
use crate::services::transit_api::{TimetableQuery, TransitApi};
use crate::stats::{CategoryStats, ScrapeStats};

pub const SUMMARY_FILE: &str = "scrape_summary.json";

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Timetables are fetched for this many days after `start_date`.
    pub days: u32,
    pub start_date: NaiveDate,
    pub concurrency: usize,
    pub request_delay: Duration,
    /// Reuse entries already present in the raw store instead of refetching.
    pub resume: bool,
}

impl ScrapeOptions {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            days: 7,
            start_date,
            concurrency: 1,
            request_delay: Duration::from_millis(500),
            resume: false,
        }
    }
}

/// One backend call, as queued by the scraper.
#[derive(Debug, Clone)]
enum Call {
    SearchRoutes(String),
    RoutePoints(String),
    Timetable(TimetableQuery),
    RouteDetails(String),
}

async fn dispatch<A: TransitApi + ?Sized>(api: &A, call: &Call) -> Result<Bytes> {
    match call {
        Call::SearchRoutes(prefix) => api.search_routes(prefix).await,
        Call::RoutePoints(route_id) => api.route_points(route_id).await,
        Call::Timetable(query) => api.timetable(query).await,
        Call::RouteDetails(parent_id) => api.route_details(parent_id).await,
    }
}

pub struct Scraper<A> {
    api: Arc<A>,
    store: RawStore,
    options: ScrapeOptions,
}

impl<A: TransitApi + 'static> Scraper<A> {
    pub fn new(api: A, store: RawStore, options: ScrapeOptions) -> Self {
        Self {
            api: Arc::new(api),
            store,
            options,
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.store.dir().join(SUMMARY_FILE)
    }

    /// Runs every scrape step and writes the summary next to the archives.
    #[tracing::instrument(skip(self), fields(dir = %self.store.dir().display(), resume = self.options.resume))]
    pub async fn run(&self) -> Result<ScrapeStats> {
        self.store.create_dir()?;

        let routes = self.scrape_route_list().await?;
        let mut stats = ScrapeStats::new(routes.len());

        let parents = self.scrape_route_parents(&routes, &mut stats.route_ids).await?;
        self.scrape_routelines(&routes, &mut stats.routelines).await?;
        self.scrape_timetables(&routes, &mut stats.timetables).await?;
        self.scrape_stop_lists(&routes, &parents, &mut stats.stops).await?;

        stats.log();
        write_json(&self.summary_path(), &stats)?;
        Ok(stats)
    }

    /// Fetches (or, when resuming, reloads) the route list. Duplicate route
    /// numbers keep their first entry.
    pub async fn scrape_route_list(&self) -> Result<Vec<RouteListEntry>> {
        let body = if self.options.resume && self.store.has_route_list() {
            info!("Reusing existing route list");
            self.store.read_route_list()?
        } else {
            info!("Fetching route list");
            let body = self
                .api
                .route_list()
                .await
                .context("cannot fetch the route list")?;
            body.to_vec()
        };

        let list: RouteListResponse =
            parse_payload(&body).context("route list is not a valid response")?;
        self.store.write_route_list(&body)?;

        let mut seen = BTreeSet::new();
        let routes: Vec<_> = list
            .data
            .into_iter()
            .filter(|r| !r.route_no().is_empty() && seen.insert(r.route_no().to_string()))
            .collect();
        info!(routes = routes.len(), "Route list ready");
        Ok(routes)
    }

    /// Searches by every 3-character route prefix and maps route numbers
    /// (with and without direction suffix) to their parent ids.
    pub async fn scrape_route_parents(
        &self,
        routes: &[RouteListEntry],
        stats: &mut CategoryStats,
    ) -> Result<BTreeMap<String, String>> {
        info!("Fetching route ids");
        let mut entries = self.existing(Category::RouteIds)?;

        let prefixes: BTreeSet<String> = routes
            .iter()
            .map(|r| r.route_no().chars().take(3).collect())
            .collect();
        let jobs = self.pending(&entries, stats, prefixes.into_iter().map(|prefix| {
            (route_key(&prefix), Call::SearchRoutes(prefix))
        }));

        for (key, body) in self.fetch_all(jobs).await {
            if let Some(body) = accept::<RouteSearchResponse>(&key, body, stats) {
                entries.insert(key, body);
            }
        }
        self.store.write(Category::RouteIds, &entries)?;

        let mut parents = BTreeMap::new();
        for (key, body) in &entries {
            let Ok(found) = parse_payload::<RouteSearchResponse>(body) else {
                warn!(key, "Stored route search result is unreadable");
                continue;
            };
            for route in found.data {
                let route_no = route.routeno.trim();
                parents
                    .entry(strip_direction(route_no).to_string())
                    .or_insert_with(|| route.routeparentid.clone());
                parents
                    .entry(route_no.to_string())
                    .or_insert(route.routeparentid);
            }
        }
        info!(parents = parents.len(), "Route ids resolved");
        Ok(parents)
    }

    pub async fn scrape_routelines(
        &self,
        routes: &[RouteListEntry],
        stats: &mut CategoryStats,
    ) -> Result<()> {
        info!("Fetching routelines");
        let mut entries = self.existing(Category::RouteLines)?;

        let jobs = self.pending(&entries, stats, routes.iter().map(|r| {
            (route_key(r.route_no()), Call::RoutePoints(r.routeid.clone()))
        }));

        for (key, body) in self.fetch_all(jobs).await {
            if let Some(body) = accept::<RoutePointsResponse>(&key, body, stats) {
                entries.insert(key, body);
            }
        }
        self.store.write(Category::RouteLines, &entries)
    }

    /// Fetches one timetable per route for each of the next `days` days,
    /// keyed by weekday name.
    pub async fn scrape_timetables(
        &self,
        routes: &[RouteListEntry],
        stats: &mut CategoryStats,
    ) -> Result<()> {
        info!(days = self.options.days, "Fetching timetables");
        let mut entries = self.existing(Category::Timetables)?;

        let mut calls = Vec::new();
        for day in 1..=self.options.days {
            let Some(date) = self.options.start_date.checked_add_days(Days::new(day as u64)) else {
                continue;
            };
            let weekday = date.format("%A").to_string();
            for route in routes {
                let key = timetable_key(&weekday, route.route_no());
                match (&route.fromstationid, &route.tostationid) {
                    (Some(from), Some(to)) => calls.push((
                        key,
                        Call::Timetable(TimetableQuery {
                            route_id: route.routeid.clone(),
                            from_station_id: from.clone(),
                            to_station_id: to.clone(),
                            date,
                        }),
                    )),
                    _ => {
                        debug!(key, "Route has no terminal stations, cannot ask for a timetable");
                        stats.requested += 1;
                        stats.record_missing(key);
                    }
                }
            }
        }
        let jobs = self.pending(&entries, stats, calls);

        for (key, body) in self.fetch_all(jobs).await {
            if let Some(body) = accept::<TimetableResponse>(&key, body, stats) {
                entries.insert(key, body);
            }
        }
        self.store.write(Category::Timetables, &entries)
    }

    /// Fetches stop lists once per route parent. The same body is stored
    /// under the `UP` and/or `DOWN` key depending on which directions carry
    /// stops.
    pub async fn scrape_stop_lists(
        &self,
        routes: &[RouteListEntry],
        parents: &BTreeMap<String, String>,
        stats: &mut CategoryStats,
    ) -> Result<()> {
        info!("Fetching stop lists");
        let mut entries = self.existing(Category::Stops)?;

        // A parent is done once either direction is stored: a parent whose
        // body only has UP stops never gets a DOWN key.
        let parent_names: BTreeSet<&str> = routes.iter().map(|r| r.parent_name()).collect();
        let mut pending = BTreeSet::new();
        for parent_name in parent_names {
            let stored = Direction::ALL.iter().any(|direction| {
                entries.contains_key(&route_key(&format!("{} {}", parent_name, direction.label())))
            });
            if stored {
                stats.reused += 1;
            } else {
                pending.insert(parent_name.to_string());
            }
        }

        let mut calls = Vec::new();
        for parent_name in pending {
            match parents.get(&parent_name) {
                Some(parent_id) => {
                    calls.push((parent_name, Call::RouteDetails(parent_id.clone())));
                }
                None => {
                    warn!(route = %parent_name, "No route parent id, skipping stop list");
                    stats.requested += 1;
                    stats.record_missing(parent_name);
                }
            }
        }
        stats.requested += calls.len();

        for (parent_name, body) in self.fetch_all(calls).await {
            let Some(body) = accept::<StopListResponse>(&parent_name, body, stats) else {
                continue;
            };
            // `accept` already proved this parses.
            let Ok(stop_list) = parse_payload::<StopListResponse>(&body) else {
                continue;
            };
            if stop_list.is_not_found() {
                debug!(route = %parent_name, "Backend has no stop list");
                stats.fetched -= 1;
                stats.record_missing(parent_name);
                continue;
            }

            let mut stored = false;
            for direction in Direction::ALL {
                if !stop_list.direction(direction).is_empty() {
                    let key = route_key(&format!("{} {}", parent_name, direction.label()));
                    entries.insert(key, body.clone());
                    stored = true;
                }
            }
            if !stored {
                stats.fetched -= 1;
                stats.record_missing(parent_name);
            }
        }
        self.store.write(Category::Stops, &entries)
    }

    fn existing(&self, category: Category) -> Result<Entries> {
        if self.options.resume {
            let entries = self.store.read_optional(category)?;
            info!(category = category.name(), reused = entries.len(), "Resuming category");
            Ok(entries)
        } else {
            Ok(Entries::new())
        }
    }

    /// Drops calls whose key is already stored and counts the rest as
    /// requested.
    fn pending(
        &self,
        entries: &Entries,
        stats: &mut CategoryStats,
        calls: impl IntoIterator<Item = (String, Call)>,
    ) -> Vec<(String, Call)> {
        let mut seen = BTreeSet::new();
        let mut jobs = Vec::new();
        for (key, call) in calls {
            if !seen.insert(key.clone()) {
                continue;
            }
            if entries.contains_key(&key) {
                stats.reused += 1;
            } else {
                stats.requested += 1;
                jobs.push((key, call));
            }
        }
        jobs
    }

    /// Runs `jobs` with bounded concurrency and a politeness delay before
    /// each request. Output order is unspecified.
    async fn fetch_all(&self, jobs: Vec<(String, Call)>) -> Vec<(String, Result<Bytes>)> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let delay = self.options.request_delay;
        let mut tasks = JoinSet::new();

        for (key, call) in jobs {
            let api = Arc::clone(&self.api);
            let sem = Arc::clone(&semaphore);
            let span = tracing::debug_span!("fetch", key = %key);

            tasks.spawn(
                async move {
                    let _permit = sem.acquire().await;
                    tokio::time::sleep(delay).await;
                    let result = dispatch(api.as_ref(), &call).await;
                    (key, result)
                }
                .instrument(span),
            );
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(error = %e, "Fetch task panicked"),
            }
        }
        results
    }
}

/// Keeps a body if the call succeeded and it parses as `T`; otherwise
/// records the key as missing.
fn accept<T: DeserializeOwned>(
    key: &str,
    body: Result<Bytes>,
    stats: &mut CategoryStats,
) -> Option<Vec<u8>> {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(key, error = %format!("{e:#}"), "Fetch failed, skipping");
            stats.record_missing(key);
            return None;
        }
    };
    if let Err(e) = parse_payload::<T>(&body) {
        warn!(key, error = %e, "Malformed response, skipping");
        stats.record_missing(key);
        return None;
    }
    debug!(key, bytes = body.len(), "Fetched");
    stats.fetched += 1;
    Some(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::env;
    use std::fs;

    /// Serves canned bodies keyed by the call's argument.
    #[derive(Default)]
    struct FakeApi {
        search: BTreeMap<String, &'static str>,
        points: BTreeMap<String, &'static str>,
        details: BTreeMap<String, &'static str>,
        timetable: Option<&'static str>,
    }

    fn lookup(map: &BTreeMap<String, &'static str>, key: &str) -> Result<Bytes> {
        map.get(key)
            .map(|body| Bytes::from_static(body.as_bytes()))
            .ok_or_else(|| anyhow!("connection reset for {key}"))
    }

    #[async_trait::async_trait]
    impl TransitApi for FakeApi {
        async fn route_list(&self) -> Result<Bytes> {
            Ok(Bytes::from_static(
                br#"{"data":[
                    {"routeid":1,"routeno":"10-A UP","fromstationid":100,"tostationid":300,"fromstation":"Depot","tostation":"Market"},
                    {"routeid":2,"routeno":"10-A DOWN","fromstationid":300,"tostationid":100,"fromstation":"Market","tostation":"Depot"},
                    {"routeid":3,"routeno":"20-B UP","fromstationid":400,"tostationid":500}
                ]}"#,
            ))
        }

        async fn search_routes(&self, prefix: &str) -> Result<Bytes> {
            lookup(&self.search, prefix)
        }

        async fn route_points(&self, route_id: &str) -> Result<Bytes> {
            lookup(&self.points, route_id)
        }

        async fn timetable(&self, _query: &TimetableQuery) -> Result<Bytes> {
            self.timetable
                .map(|body| Bytes::from_static(body.as_bytes()))
                .ok_or_else(|| anyhow!("timeout"))
        }

        async fn route_details(&self, parent_id: &str) -> Result<Bytes> {
            lookup(&self.details, parent_id)
        }
    }

    fn fake_api() -> FakeApi {
        let mut api = FakeApi::default();
        api.search.insert(
            "10-".to_string(),
            r#"{"data":[{"routeno":"10-A","routeparentid":77}]}"#,
        );
        api.search.insert(
            "20-".to_string(),
            r#"{"data":[{"routeno":"20-B","routeparentid":88}]}"#,
        );
        api.points.insert("1".to_string(), r#"{"data":[{"latitude":12.9,"longitude":77.5}]}"#);
        api.points.insert("2".to_string(), r#"{"data":[{"latitude":12.9,"longitude":77.5}]}"#);
        // Route 3 geometry is garbage.
        api.points.insert("3".to_string(), "<html>Bad Gateway</html>");
        api.details.insert(
            "77".to_string(),
            r#"{"up":{"data":[{"stationid":100,"stationname":"Depot","centerlat":12.9,"centerlong":77.5}]},"down":{"data":[{"stationid":300,"stationname":"Market","centerlat":12.8,"centerlong":77.6}]}}"#,
        );
        api.details.insert("88".to_string(), r#"{"message":"Data not found"}"#);
        api.timetable = Some(r#"{"data":[{"tostationname":"Market","tripdetails":[{"starttime":"06:00","endtime":"06:40"}]}]}"#);
        api
    }

    fn options() -> ScrapeOptions {
        ScrapeOptions {
            days: 2,
            start_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            concurrency: 4,
            request_delay: Duration::ZERO,
            resume: false,
        }
    }

    fn temp_store(name: &str) -> RawStore {
        let dir = env::temp_dir().join(format!("bmtc_gtfs_scrape_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        RawStore::new(dir)
    }

    #[tokio::test]
    async fn test_scrape_records_failures_without_aborting() {
        let store = temp_store("failures");
        let scraper = Scraper::new(fake_api(), store.clone(), options());

        let stats = scraper.run().await.unwrap();

        assert_eq!(stats.routes, 3);
        assert_eq!(stats.routelines.fetched, 2);
        assert_eq!(stats.routelines.missing, vec!["20-B UP.json".to_string()]);
        assert_eq!(stats.stops.missing, vec!["20-B".to_string()]);
        // 3 routes x 2 days
        assert_eq!(stats.timetables.fetched, 6);

        let stops = store.read(Category::Stops).unwrap();
        let keys: Vec<_> = stops.keys().cloned().collect();
        assert_eq!(keys, vec!["10-A DOWN.json", "10-A UP.json"]);

        let timetables = store.read(Category::Timetables).unwrap();
        assert!(timetables.contains_key("Monday/10-A UP.json"));
        assert!(timetables.contains_key("Tuesday/20-B UP.json"));

        assert!(scraper.summary_path().exists());
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_resume_reuses_stored_entries() {
        let store = temp_store("resume");
        Scraper::new(fake_api(), store.clone(), options())
            .run()
            .await
            .unwrap();

        // Second run with a backend that fails everything but the route list.
        let mut resume = options();
        resume.resume = true;
        let stats = Scraper::new(FakeApi::default(), store.clone(), resume)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.routelines.reused, 2);
        assert_eq!(stats.routelines.requested, 1);
        assert_eq!(stats.timetables.reused, 6);
        assert_eq!(store.read(Category::Stops).unwrap().len(), 2);
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_resume_keeps_parent_with_one_direction() {
        let store = temp_store("resume_one_direction");
        let mut api = fake_api();
        api.details.insert(
            "77".to_string(),
            r#"{"up":{"data":[{"stationid":100,"stationname":"Depot","centerlat":12.9,"centerlong":77.5}]},"down":{"data":[]}}"#,
        );
        Scraper::new(api, store.clone(), options()).run().await.unwrap();
        let keys: Vec<_> = store.read(Category::Stops).unwrap().into_keys().collect();
        assert_eq!(keys, vec!["10-A UP.json"]);

        let mut resume = options();
        resume.resume = true;
        let stats = Scraper::new(FakeApi::default(), store.clone(), resume)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.stops.reused, 1);
        assert_eq!(stats.stops.requested, 1);
        assert_eq!(stats.stops.missing, vec!["20-B".to_string()]);
        fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_route_parents_map_both_spellings() {
        let store = temp_store("parents");
        store.create_dir().unwrap();
        let scraper = Scraper::new(fake_api(), store.clone(), options());

        let routes = scraper.scrape_route_list().await.unwrap();
        let mut stats = CategoryStats::default();
        let parents = scraper.scrape_route_parents(&routes, &mut stats).await.unwrap();

        assert_eq!(parents.get("10-A").map(String::as_str), Some("77"));
        assert_eq!(parents.get("20-B").map(String::as_str), Some("88"));
        assert_eq!(stats.fetched, 2);
        fs::remove_dir_all(store.dir()).unwrap();
    }
}

//!
//! tagwire storage module
//! ----------------------
//! The time-series engine is an external collaborator reached through the narrow
//! `TagStore` read interface: fetch the points of one tag (or of every tag), in
//! ascending time order, optionally limited. The wire server never writes.
//!
//! `MemoryStore` is the in-process implementation used by the server binary and
//! the tests. It can be seeded with a demo dataset or loaded from a newline
//! delimited JSON file of `{"name", "time", "value"}` records.
//!
//! The public API centers on `SharedStore` (`Arc<dyn TagStore>`), which is cloned
//! into every connection task.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A single sample of a named series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Tag name; the key of the series.
    pub name: String,
    /// Sample instant, microsecond resolution.
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new<S: Into<String>>(name: S, time: DateTime<Utc>, value: f64) -> Self {
        Self { name: name.into(), time, value }
    }
}

/// Read interface consumed from the time-series engine.
///
/// Implementations are expected to return points in ascending time order per tag
/// (and, for a full scan, tags in ascending name order). Callers must not rely on
/// it: the executor verifies the order it receives.
pub trait TagStore: Send + Sync {
    /// Points for `tag`, or for every tag when `tag` is `None`, truncated to `limit`.
    fn fetch(&self, tag: Option<&str>, limit: Option<usize>) -> Result<Vec<TimeSeriesPoint>>;
}

/// Cheaply clonable handle shared by all connections.
#[derive(Clone)]
pub struct SharedStore(pub Arc<dyn TagStore>);

impl SharedStore {
    pub fn new<S: TagStore + 'static>(store: S) -> Self { SharedStore(Arc::new(store)) }

    pub fn fetch(&self, tag: Option<&str>, limit: Option<usize>) -> Result<Vec<TimeSeriesPoint>> {
        self.0.fetch(tag, limit)
    }
}

/// In-memory tag store. Series are kept sorted by time on insert.
#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<BTreeMap<String, Vec<TimeSeriesPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_points<I: IntoIterator<Item = TimeSeriesPoint>>(points: I) -> Self {
        let store = Self::new();
        store.insert_points(points);
        store
    }

    /// Append points, keeping every series in ascending time order.
    pub fn insert_points<I: IntoIterator<Item = TimeSeriesPoint>>(&self, points: I) {
        let mut guard = self.series.write();
        let mut touched: Vec<String> = Vec::new();
        for p in points {
            if !touched.contains(&p.name) { touched.push(p.name.clone()); }
            guard.entry(p.name.clone()).or_default().push(p);
        }
        for name in touched {
            if let Some(v) = guard.get_mut(&name) { v.sort_by_key(|p| p.time); }
        }
    }

    pub fn tag_count(&self) -> usize { self.series.read().len() }

    pub fn point_count(&self) -> usize { self.series.read().values().map(|v| v.len()).sum() }

    /// Load newline-delimited JSON records. Blank lines are skipped.
    pub fn load_ndjson<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading data file {}", path.display()))?;
        let mut points = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() { continue; }
            let rec: Record = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid record", path.display(), lineno + 1))?;
            points.push(rec.into_point().with_context(|| format!("{}:{}", path.display(), lineno + 1))?);
        }
        let n = points.len();
        self.insert_points(points);
        debug!(target: "tagwire::storage", "load_ndjson: loaded {} points from '{}'", n, path.display());
        Ok(n)
    }
}

impl TagStore for MemoryStore {
    fn fetch(&self, tag: Option<&str>, limit: Option<usize>) -> Result<Vec<TimeSeriesPoint>> {
        let guard = self.series.read();
        let take = limit.unwrap_or(usize::MAX);
        let out: Vec<TimeSeriesPoint> = match tag {
            Some(t) => guard.get(t).map(|v| v.iter().take(take).cloned().collect()).unwrap_or_default(),
            None => guard.values().flat_map(|v| v.iter()).take(take).cloned().collect(),
        };
        debug!(target: "tagwire::storage", "fetch tag={:?} limit={:?} -> {} points", tag, limit, out.len());
        Ok(out)
    }
}

/// On-disk record form. `time` is epoch milliseconds or an RFC 3339 string.
#[derive(Debug, Clone, Deserialize)]
struct Record {
    name: String,
    time: RecordTime,
    value: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RecordTime {
    Millis(i64),
    Text(String),
}

impl Record {
    fn into_point(self) -> Result<TimeSeriesPoint> {
        let time = match self.time {
            RecordTime::Millis(ms) => match Utc.timestamp_millis_opt(ms).single() {
                Some(t) => t,
                None => bail!("timestamp {} out of range", ms),
            },
            RecordTime::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .with_context(|| format!("invalid timestamp '{}'", s))?
                .with_timezone(&Utc),
        };
        Ok(TimeSeriesPoint { name: self.name, time, value: self.value })
    }
}

/// Seed `wave.sin` and `wave.cos` with `seconds` one-second samples ending at `end`.
pub fn create_demo_dataset(store: &MemoryStore, seconds: usize, end: DateTime<Utc>) {
    let start = end - chrono::Duration::seconds(seconds as i64);
    let mut points = Vec::with_capacity(seconds * 2);
    for i in 0..seconds {
        let t = start + chrono::Duration::seconds(i as i64 + 1);
        let phase = (i as f64) * std::f64::consts::PI / 30.0;
        points.push(TimeSeriesPoint::new("wave.sin", t, phase.sin()));
        points.push(TimeSeriesPoint::new("wave.cos", t, phase.cos()));
    }
    store.insert_points(points);
    info!(target: "tagwire::storage", "demo dataset created: 2 tags x {} points", seconds);
}

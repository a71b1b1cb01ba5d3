//! Projection of a dataset through a selection into a transmittable payload.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::table::ProjectedRow;
use crate::{
    Dataset, Error, Map, PropertyProjector, Scalar, SelectionState, TableId, TableSelector,
};

/// Used as the payload's source file when the caller has none.
pub const DEFAULT_SOURCE_FILE: &str = "unknown";

/// Anything that can produce a snapshot image of the trace chart.
pub trait ChartSnapshot {
    /// A base64-encoded image (usually as a `data:` URI), or `None` if the
    /// renderer is not ready.
    fn snapshot(&self) -> Option<String>;
}

/// A chart renderer that never has a snapshot available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSnapshot;

impl ChartSnapshot for NoSnapshot {
    fn snapshot(&self) -> Option<String> {
        None
    }
}

/// Serves a PNG image rendered ahead of time as the chart snapshot.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ChartSnapshot for FileSnapshot {
    fn snapshot(&self) -> Option<String> {
        match fs::read(&self.path) {
            Ok(bytes) => Some(format!(
                "data:image/png;base64,{}",
                BASE64_STANDARD.encode(bytes)
            )),
            Err(e) => {
                warn!(
                    "Chart snapshot unavailable from {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

/// The selected subset of a dataset. Only non-empty parts are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Scalar>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<ProjectedRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<ProjectedRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_image: Option<String>,
}

impl Payload {
    /// True if the payload carries anything besides its source file.
    pub fn has_content(&self) -> bool {
        self.properties.is_some()
            || self.summary.is_some()
            || self.events.is_some()
            || self.chart_image.is_some()
    }

    pub fn to_json_pretty(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Projects the given dataset through the given selection.
///
/// The chart snapshot is only requested if the selection includes the chart.
/// Fails with [`Error::EmptySelection`] if nothing ends up in the payload.
pub fn project_payload(
    dataset: &Dataset,
    state: &SelectionState,
    source_file: Option<&str>,
    chart: Option<&dyn ChartSnapshot>,
) -> Result<Payload, Error> {
    let properties = PropertyProjector::new(&dataset.properties).selected_properties(state);
    let summary = TableSelector::new(TableId::Summary, &dataset.summary).project(state);
    let events = TableSelector::new(TableId::Events, &dataset.events).project(state);
    let chart_image = if state.include_chart_image() {
        chart.and_then(ChartSnapshot::snapshot)
    } else {
        None
    };

    let payload = Payload {
        source_file: source_file.unwrap_or(DEFAULT_SOURCE_FILE).to_string(),
        properties: non_empty_map(properties),
        summary: non_empty(summary),
        events: non_empty(events),
        chart_image,
    };
    if !payload.has_content() {
        return Err(Error::EmptySelection);
    }
    debug!(
        "Projected payload for {} (properties: {}, summary rows: {}, events: {}, chart: {})",
        payload.source_file,
        payload.properties.as_ref().map(Map::len).unwrap_or(0),
        payload.summary.as_ref().map(Vec::len).unwrap_or(0),
        payload.events.as_ref().map(Vec::len).unwrap_or(0),
        payload.chart_image.is_some()
    );
    Ok(payload)
}

fn non_empty<T>(v: Vec<T>) -> Option<Vec<T>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

fn non_empty_map<K, V>(m: Map<K, V>) -> Option<Map<K, V>> {
    if m.is_empty() {
        None
    } else {
        Some(m)
    }
}

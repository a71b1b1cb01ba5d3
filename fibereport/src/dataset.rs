//! The dataset delivered by the trace parser for one loaded file.

use std::{fmt, path::Path, str::FromStr};

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::value::{load_from_file, SupportedFormat};
use crate::{Error, Map, PropertyNode, Scalar};

/// A single table row, mapping column keys to cell values.
pub type Row = Map<String, Scalar>;

/// Identifies one of the two tables of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableId {
    Summary,
    Events,
}

impl TableId {
    pub const ALL: [TableId; 2] = [TableId::Summary, TableId::Events];

    /// Only the events table lets the operator pick individual rows.
    pub fn has_row_selection(&self) -> bool {
        matches!(self, Self::Events)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Summary => "summary",
            Self::Events => "events",
        })
    }
}

impl FromStr for TableId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "events" => Ok(Self::Events),
            _ => Err(format!("unknown table: {}", s)),
        }
    }
}

/// An ordered sequence of rows. The column set is derived from the first
/// row's keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The column keys of this table, in the order of the first row.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.rows
            .first()
            .into_iter()
            .flat_map(|row| row.keys().map(String::as_str))
    }

    pub fn has_column(&self, key: &str) -> bool {
        self.rows
            .first()
            .map(|row| row.contains_key(key))
            .unwrap_or(false)
    }
}

impl FromIterator<Row> for Table {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// The parser emits the summary as a single record, and the events as a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum TableRepr {
    Rows(Vec<Row>),
    Single(Row),
}

impl<'de> Deserialize<'de> for Table {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match TableRepr::deserialize(deserializer)? {
            TableRepr::Rows(rows) => Self::new(rows),
            TableRepr::Single(row) if row.is_empty() => Self::default(),
            TableRepr::Single(row) => Self::new(vec![row]),
        })
    }
}

/// Everything the trace parser produces for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "params", alias = "properties", default)]
    pub properties: PropertyNode,
    #[serde(default)]
    pub summary: Table,
    #[serde(default)]
    pub events: Table,
}

impl Dataset {
    /// Parses a dataset from a string in the given format.
    pub fn load_as(fmt: SupportedFormat, content: &str) -> Result<Self, Error> {
        fmt.parse(content)
    }

    /// Loads a dataset from the given file, detecting its format from the
    /// file's extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let dataset: Self = load_from_file(path)?;
        debug!(
            "Loaded dataset from {} ({} summary rows, {} events)",
            path.display(),
            dataset.summary.len(),
            dataset.events.len()
        );
        Ok(dataset)
    }

    pub fn table(&self, id: TableId) -> &Table {
        match id {
            TableId::Summary => &self.summary,
            TableId::Events => &self.events,
        }
    }
}

//! The operator's current selection across the property tree, both tables
//! and the chart.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::TableId;

/// The keys leading from the root of the property tree to a leaf.
pub type PropertyPath = Vec<String>;

/// Everything currently chosen for projection into a payload or report.
///
/// Entries are not validated against any dataset here. Paths, columns or
/// rows that do not exist in the dataset being projected are ignored at
/// projection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionState {
    selected_property_paths: BTreeSet<PropertyPath>,
    selected_columns: BTreeMap<TableId, BTreeSet<String>>,
    selected_event_rows: BTreeSet<usize>,
    include_chart_image: bool,
}

impl SelectionState {
    /// Convenience method for constructing a selection with the given
    /// property path selected.
    pub fn with_property<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_property(path.into_iter().map(Into::into).collect(), true);
        self
    }

    /// Convenience method for constructing a selection with the given
    /// columns of a table selected.
    pub fn with_columns<I, S>(mut self, table: TableId, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            self.set_column(table, key.into(), true);
        }
        self
    }

    /// Convenience method for constructing a selection with the given event
    /// rows selected.
    pub fn with_event_rows<I: IntoIterator<Item = usize>>(mut self, rows: I) -> Self {
        for row in rows {
            self.set_event_row(row, true);
        }
        self
    }

    pub fn with_chart(mut self, include: bool) -> Self {
        self.include_chart_image = include;
        self
    }

    /// Resets every selection to empty, and excludes the chart.
    pub fn clear(&mut self) {
        self.selected_property_paths.clear();
        self.selected_columns.clear();
        self.selected_event_rows.clear();
        self.include_chart_image = false;
    }

    /// True if nothing at all is selected and the chart is excluded.
    pub fn is_empty(&self) -> bool {
        self.selected_property_paths.is_empty()
            && self.selected_columns.values().all(BTreeSet::is_empty)
            && self.selected_event_rows.is_empty()
            && !self.include_chart_image
    }

    /// Replaces this selection wholesale with the given snapshot. Nothing of
    /// the previous selection survives.
    pub fn replace_with(&mut self, snapshot: SelectionState) {
        *self = snapshot;
    }

    pub fn property_paths(&self) -> impl Iterator<Item = &PropertyPath> {
        self.selected_property_paths.iter()
    }

    pub fn is_property_selected<S: AsRef<str>>(&self, path: &[S]) -> bool {
        let path = path
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect::<PropertyPath>();
        self.selected_property_paths.contains(&path)
    }

    pub(crate) fn set_property(&mut self, path: PropertyPath, selected: bool) {
        if selected {
            self.selected_property_paths.insert(path);
        } else {
            self.selected_property_paths.remove(&path);
        }
    }

    /// The selected columns of the given table, in sorted order.
    pub fn columns(&self, table: TableId) -> impl Iterator<Item = &str> {
        self.selected_columns
            .get(&table)
            .into_iter()
            .flat_map(|keys| keys.iter().map(String::as_str))
    }

    pub fn is_column_selected(&self, table: TableId, key: &str) -> bool {
        self.selected_columns
            .get(&table)
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }

    pub(crate) fn set_column(&mut self, table: TableId, key: String, selected: bool) {
        if selected {
            self.selected_columns.entry(table).or_default().insert(key);
        } else if let Some(keys) = self.selected_columns.get_mut(&table) {
            keys.remove(&key);
            if keys.is_empty() {
                self.selected_columns.remove(&table);
            }
        }
    }

    /// The selected event row indices, in ascending (table) order.
    pub fn event_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected_event_rows.iter().copied()
    }

    pub fn is_event_row_selected(&self, index: usize) -> bool {
        self.selected_event_rows.contains(&index)
    }

    pub(crate) fn set_event_row(&mut self, index: usize, selected: bool) {
        if selected {
            self.selected_event_rows.insert(index);
        } else {
            self.selected_event_rows.remove(&index);
        }
    }

    pub fn include_chart_image(&self) -> bool {
        self.include_chart_image
    }

    pub fn set_include_chart_image(&mut self, include: bool) {
        self.include_chart_image = include;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_selection_is_empty() {
        assert!(SelectionState::default().is_empty());
    }

    #[test]
    fn any_single_field_makes_selection_non_empty() {
        let cases = [
            SelectionState::default().with_property(["GenParams", "wavelength"]),
            SelectionState::default().with_columns(TableId::Summary, ["ORL"]),
            SelectionState::default().with_columns(TableId::Events, ["distance"]),
            SelectionState::default().with_event_rows([3]),
            SelectionState::default().with_chart(true),
        ];
        for (i, state) in cases.iter().enumerate() {
            assert!(!state.is_empty(), "case {}", i);
        }
    }

    #[test]
    fn deselecting_last_column_leaves_selection_empty() {
        let mut state = SelectionState::default().with_columns(TableId::Summary, ["ORL"]);
        state.set_column(TableId::Summary, "ORL".to_string(), false);
        assert!(state.is_empty());
        assert_eq!(state, SelectionState::default());
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = SelectionState::default()
            .with_property(["a"])
            .with_columns(TableId::Events, ["type"])
            .with_event_rows([0, 1])
            .with_chart(true);
        state.clear();
        assert!(state.is_empty());
        assert!(!state.include_chart_image());
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let state = SelectionState::default()
            .with_property(["FxdParams", "range"])
            .with_columns(TableId::Events, ["distance"])
            .with_event_rows([0])
            .with_chart(true);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "selectedPropertyPaths": [["FxdParams", "range"]],
                "selectedColumns": {"events": ["distance"]},
                "selectedEventRows": [0],
                "includeChartImage": true,
            })
        );
        let back: SelectionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn missing_fields_deserialize_as_empty() {
        let state: SelectionState =
            serde_json::from_str(r#"{"includeChartImage": true}"#).unwrap();
        assert_eq!(state, SelectionState::default().with_chart(true));
    }
}

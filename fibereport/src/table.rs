//! Column and row selection over the summary and events tables.

use crate::{Map, Row, SelectionState, Table, TableId};

/// A rendered view may carry this extra column to hold per-row checkboxes.
/// It is never a data column and is never affected by "select all".
pub const ROW_SELECTOR_COLUMN: &str = "__row_selector";

/// A projected row: selected column keys mapped to cell text.
pub type ProjectedRow = Map<String, String>;

/// Applies the operator's column (and, for events, row) choices to one table.
#[derive(Debug, Clone, Copy)]
pub struct TableSelector<'a> {
    id: TableId,
    table: &'a Table,
}

impl<'a> TableSelector<'a> {
    pub fn new(id: TableId, table: &'a Table) -> Self {
        Self { id, table }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    /// The table's data columns, in table order.
    pub fn data_columns(&self) -> Vec<&'a str> {
        self.table
            .columns()
            .filter(|key| *key != ROW_SELECTOR_COLUMN)
            .collect()
    }

    /// Selects or deselects a single column. Returns `false` if the key is
    /// not a data column of this table.
    pub fn toggle_column(&self, state: &mut SelectionState, key: &str, selected: bool) -> bool {
        if key == ROW_SELECTOR_COLUMN || !self.table.has_column(key) {
            return false;
        }
        state.set_column(self.id, key.to_string(), selected);
        true
    }

    /// Selects or deselects every data column of this table.
    pub fn toggle_all_columns(&self, state: &mut SelectionState, selected: bool) {
        for key in self.data_columns() {
            state.set_column(self.id, key.to_string(), selected);
        }
    }

    /// Selects or deselects a single row. Only the events table has rows in
    /// the selection model, so this is a no-op for the summary.
    pub fn toggle_row(&self, state: &mut SelectionState, index: usize, selected: bool) -> bool {
        if !self.id.has_row_selection() || index >= self.table.len() {
            return false;
        }
        state.set_event_row(index, selected);
        true
    }

    /// Selects or deselects every row of the events table. A no-op for the
    /// summary.
    pub fn select_all_rows(&self, state: &mut SelectionState, selected: bool) -> bool {
        if !self.id.has_row_selection() {
            return false;
        }
        for index in 0..self.table.len() {
            state.set_event_row(index, selected);
        }
        true
    }

    /// Projects this table through the current selection.
    pub fn project(&self, state: &SelectionState) -> Vec<ProjectedRow> {
        match self.id {
            TableId::Summary => self.project_summary(state),
            TableId::Events => self.project_events(state),
        }
    }

    /// Every row, restricted to the selected columns. Empty if no column is
    /// selected.
    pub fn project_summary(&self, state: &SelectionState) -> Vec<ProjectedRow> {
        let columns = self.selected_columns(state);
        if columns.is_empty() {
            return Vec::new();
        }
        self.table
            .rows()
            .iter()
            .map(|row| restrict(row, &columns))
            .collect()
    }

    /// Only the selected rows, in table order, restricted to the selected
    /// columns. Empty if no column is selected, regardless of rows.
    pub fn project_events(&self, state: &SelectionState) -> Vec<ProjectedRow> {
        let columns = self.selected_columns(state);
        if columns.is_empty() {
            return Vec::new();
        }
        state
            .event_rows()
            .filter_map(|index| self.table.row(index))
            .map(|row| restrict(row, &columns))
            .filter(|row| !row.is_empty())
            .collect()
    }

    // Selected columns that still exist in this table, in table order.
    fn selected_columns(&self, state: &SelectionState) -> Vec<&'a str> {
        self.data_columns()
            .into_iter()
            .filter(|key| state.is_column_selected(self.id, key))
            .collect()
    }
}

fn restrict(row: &Row, columns: &[&str]) -> ProjectedRow {
    columns
        .iter()
        .filter_map(|key| row.get(*key).map(|v| (key.to_string(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Scalar;

    fn row(cells: &[(&str, Scalar)]) -> Row {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn events() -> Table {
        (0..4)
            .map(|i| {
                row(&[
                    ("number", Scalar::from(i as i64 + 1)),
                    ("distance", Scalar::from(format!("{}.000", i * 5))),
                    ("type", Scalar::from("1F9999LS")),
                ])
            })
            .collect()
    }

    fn summary() -> Table {
        Table::new(vec![row(&[
            ("total loss", Scalar::from("3.2")),
            ("ORL", Scalar::from(40.5_f64)),
        ])])
    }

    #[test]
    fn summary_projects_every_row_with_selected_columns() {
        let table = summary();
        let selector = TableSelector::new(TableId::Summary, &table);
        let mut state = SelectionState::default();
        assert!(selector.project(&state).is_empty());

        assert!(selector.toggle_column(&mut state, "total loss", true));
        let projected = selector.project(&state);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].get("total loss").map(String::as_str), Some("3.2"));
        assert!(projected[0].get("ORL").is_none());
    }

    #[test]
    fn summary_has_no_row_selection() {
        let table = summary();
        let selector = TableSelector::new(TableId::Summary, &table);
        let mut state = SelectionState::default();
        assert!(!selector.toggle_row(&mut state, 0, true));
        assert!(!selector.select_all_rows(&mut state, true));
        assert!(state.is_empty());
    }

    #[test]
    fn events_project_only_selected_rows_in_table_order() {
        let table = events();
        let selector = TableSelector::new(TableId::Events, &table);
        let mut state = SelectionState::default();
        selector.toggle_column(&mut state, "distance", true);
        selector.toggle_row(&mut state, 2, true);
        selector.toggle_row(&mut state, 0, true);

        let projected = selector.project(&state);
        let distances = projected
            .iter()
            .map(|r| r["distance"].as_str())
            .collect::<Vec<_>>();
        assert_eq!(distances, vec!["0.000", "10.000"]);
        assert!(projected.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn events_without_columns_project_nothing() {
        let table = events();
        let selector = TableSelector::new(TableId::Events, &table);
        let mut state = SelectionState::default();
        selector.select_all_rows(&mut state, true);
        assert!(selector.project(&state).is_empty());
    }

    #[test]
    fn out_of_range_rows_and_unknown_columns_are_ignored() {
        let table = events();
        let selector = TableSelector::new(TableId::Events, &table);
        let mut state = SelectionState::default();
        assert!(!selector.toggle_row(&mut state, 99, true));
        assert!(!selector.toggle_column(&mut state, "ORL", true));
        assert!(state.is_empty());

        // Stale entries, e.g. from a template, are skipped at projection.
        let stale = SelectionState::default()
            .with_columns(TableId::Events, ["type", "ORL"])
            .with_event_rows([1, 99]);
        let projected = selector.project(&stale);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].keys().collect::<Vec<_>>(), vec!["type"]);
    }

    #[test]
    fn select_all_skips_the_row_selector_column() {
        let mut with_selector = row(&[(ROW_SELECTOR_COLUMN, Scalar::from(false))]);
        with_selector.extend(row(&[("distance", Scalar::from("1.0"))]));
        let table = Table::new(vec![with_selector]);
        let selector = TableSelector::new(TableId::Events, &table);
        let mut state = SelectionState::default();

        selector.toggle_all_columns(&mut state, true);
        assert_eq!(state.columns(TableId::Events).collect::<Vec<_>>(), vec!["distance"]);
        assert!(!selector.toggle_column(&mut state, ROW_SELECTOR_COLUMN, true));

        selector.toggle_all_columns(&mut state, false);
        assert!(state.is_empty());
    }

    #[test]
    fn columns_project_in_table_order() {
        let table = events();
        let selector = TableSelector::new(TableId::Events, &table);
        let mut state = SelectionState::default();
        selector.toggle_column(&mut state, "type", true);
        selector.toggle_column(&mut state, "number", true);
        selector.toggle_row(&mut state, 0, true);
        let projected = selector.project(&state);
        assert_eq!(projected[0].keys().collect::<Vec<_>>(), vec!["number", "type"]);
    }
}

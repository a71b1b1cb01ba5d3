//! The engine facade: owns the loaded dataset, the live selection and the
//! template store, and translates display-layer actions into state changes.

use std::path::PathBuf;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::payload::project_payload;
use crate::{
    normalize_leaf, ChartSnapshot, Dataset, Error, KeyValueStore, Payload, PreviewSurface, PropertyPath,
    PropertyProjector, ReportGenerator, Scalar, SelectionState, TableId, TableSelector,
    TemplateStore, Transport,
};

/// A discrete event reported by whatever displays the dataset to the
/// operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    ToggleLeaf {
        path: PropertyPath,
        selected: bool,
    },
    ToggleColumn {
        table: TableId,
        key: String,
        selected: bool,
    },
    ToggleRow {
        table: TableId,
        index: usize,
        selected: bool,
    },
    /// Selects or deselects every column of a table and, if `include_rows` is
    /// set, every row too.
    ToggleAllColumns {
        table: TableId,
        selected: bool,
        #[serde(default)]
        include_rows: bool,
    },
    SelectAllRows {
        table: TableId,
        selected: bool,
    },
    SetIncludeChart {
        include: bool,
    },
    SetSourceFile {
        name: String,
    },
    SaveTemplateAs {
        name: String,
    },
    LoadTemplate {
        name: String,
    },
    DeleteTemplate {
        name: String,
    },
    ClearSelections,
}

/// Parses a recorded action log, either as a JSON array of actions or as
/// one JSON action per line. Blank lines are skipped.
pub fn parse_actions(content: &str) -> Result<Vec<Action>, Error> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}

/// One operator's interaction with the engine.
///
/// Actions that refer to the dataset are ignored while no dataset is loaded.
/// Template actions work regardless.
#[derive(Debug)]
pub struct Session<S> {
    dataset: Option<Dataset>,
    source_file: Option<String>,
    selection: SelectionState,
    templates: TemplateStore<S>,
    reports: ReportGenerator<'static>,
}

impl<S: KeyValueStore> Session<S> {
    /// Starts a session against the given template store, seeding the
    /// default template into it if necessary.
    pub fn new(store: S) -> Result<Self, Error> {
        let mut templates = TemplateStore::new(store);
        if templates.ensure_default()? {
            debug!("Seeded default template");
        }
        Ok(Self {
            dataset: None,
            source_file: None,
            selection: SelectionState::default(),
            templates,
            reports: ReportGenerator::new()?,
        })
    }

    /// Replaces the current dataset wholesale. The selection is cleared,
    /// since it may refer to content the new dataset doesn't have.
    pub fn load_dataset(&mut self, dataset: Dataset, source_file: Option<&str>) {
        debug!(
            "Loading dataset {} and clearing selection",
            source_file.unwrap_or("without a source file")
        );
        self.dataset = Some(dataset);
        self.source_file = source_file.map(str::to_string);
        self.selection.clear();
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn templates(&self) -> &TemplateStore<S> {
        &self.templates
    }

    /// Every selectable property leaf of the current dataset, with its path
    /// and its value as it would be projected.
    pub fn leaves(&self) -> impl Iterator<Item = (PropertyPath, Scalar)> + '_ {
        self.dataset
            .iter()
            .flat_map(|dataset| PropertyProjector::new(&dataset.properties).leaves())
            .map(|(path, value)| {
                let key = path.last().map(String::as_str).unwrap_or_default();
                let value = normalize_leaf(key, value);
                (path, value)
            })
    }

    /// The selectable columns of the given table in the current dataset.
    pub fn columns(&self, table: TableId) -> Vec<&str> {
        self.dataset
            .as_ref()
            .map(|dataset| TableSelector::new(table, dataset.table(table)).data_columns())
            .unwrap_or_default()
    }

    pub fn apply(&mut self, action: Action) -> Result<(), Error> {
        debug!("Applying {:?}", action);
        match action {
            Action::SetIncludeChart { include } => {
                self.selection.set_include_chart_image(include);
            }
            Action::SetSourceFile { name } => self.source_file = Some(name),
            Action::SaveTemplateAs { name } => self.templates.save(&name, &self.selection)?,
            Action::LoadTemplate { name } => {
                let snapshot = self.templates.load(&name)?;
                self.selection.replace_with(snapshot);
            }
            Action::DeleteTemplate { name } => self.templates.delete(&name)?,
            Action::ClearSelections => self.selection.clear(),
            action => self.apply_to_dataset(action),
        }
        Ok(())
    }

    /// Applies each of the given actions in turn, stopping at the first
    /// failure.
    pub fn apply_all<I>(&mut self, actions: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Action>,
    {
        for action in actions {
            self.apply(action)?;
        }
        Ok(())
    }

    fn apply_to_dataset(&mut self, action: Action) {
        let dataset = match &self.dataset {
            Some(dataset) => dataset,
            None => {
                debug!("No dataset loaded, ignoring {:?}", action);
                return;
            }
        };
        let state = &mut self.selection;
        let applied = match action {
            Action::ToggleLeaf { path, selected } => {
                PropertyProjector::new(&dataset.properties).toggle_leaf(state, &path, selected)
            }
            Action::ToggleColumn {
                table,
                key,
                selected,
            } => TableSelector::new(table, dataset.table(table)).toggle_column(state, &key, selected),
            Action::ToggleRow {
                table,
                index,
                selected,
            } => TableSelector::new(table, dataset.table(table)).toggle_row(state, index, selected),
            Action::ToggleAllColumns {
                table,
                selected,
                include_rows,
            } => {
                let selector = TableSelector::new(table, dataset.table(table));
                selector.toggle_all_columns(state, selected);
                if include_rows {
                    selector.select_all_rows(state, selected);
                }
                true
            }
            Action::SelectAllRows { table, selected } => {
                TableSelector::new(table, dataset.table(table)).select_all_rows(state, selected)
            }
            _ => false,
        };
        if !applied {
            debug!("Action did not apply to the current dataset");
        }
    }

    /// Projects the current dataset through the current selection.
    pub fn payload(&self, chart: Option<&dyn ChartSnapshot>) -> Result<Payload, Error> {
        let empty = Dataset::default();
        let dataset = self.dataset.as_ref().unwrap_or(&empty);
        project_payload(dataset, &self.selection, self.source_file(), chart)
    }

    /// Renders the current payload as a report.
    pub fn report(&self, chart: Option<&dyn ChartSnapshot>) -> Result<String, Error> {
        let payload = self.payload(chart)?;
        self.reports.render(&payload)
    }

    /// Sends the current payload through the given transport.
    pub fn send(
        &self,
        transport: &dyn Transport,
        chart: Option<&dyn ChartSnapshot>,
    ) -> Result<Payload, Error> {
        let payload = self.payload(chart)?;
        transport.send(&payload)?;
        Ok(payload)
    }

    /// Renders the current payload and hands the report to the given preview
    /// surface.
    pub fn preview(
        &self,
        surface: &dyn PreviewSurface,
        chart: Option<&dyn ChartSnapshot>,
    ) -> Result<PathBuf, Error> {
        let report = self.report(chart)?;
        surface.show(&report)
    }
}

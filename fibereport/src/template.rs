//! Named, persisted snapshots of a selection.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{Error, KeyValueStore, SelectionState, TableId};

/// Every template is stored under this prefix followed by its name.
pub const TEMPLATE_KEY_PREFIX: &str = "template_";

/// The template seeded into a store that doesn't have one by this name.
pub const DEFAULT_TEMPLATE_NAME: &str = "Main template";

/// A named selection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub snapshot: SelectionState,
}

/// The fixed selection carried by the seeded default template.
pub fn default_snapshot() -> SelectionState {
    SelectionState::default()
        .with_property(["GenParams", "cable ID"])
        .with_property(["GenParams", "fiber ID"])
        .with_property(["GenParams", "wavelength"])
        .with_property(["FxdParams", "range"])
        .with_columns(TableId::Summary, ["total loss", "ORL"])
        .with_columns(TableId::Events, ["number", "distance", "splice loss", "type"])
        .with_event_rows([0])
        .with_chart(true)
}

/// Saves, loads, lists and deletes templates in an underlying key/value
/// store.
#[derive(Debug)]
pub struct TemplateStore<S> {
    store: S,
}

impl<S: KeyValueStore> TemplateStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Stores a copy of the given selection under the given name, replacing
    /// any template of the same name. The name is trimmed first and must not
    /// be blank.
    pub fn save(&mut self, name: &str, state: &SelectionState) -> Result<(), Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidName);
        }
        let serialized = serde_json::to_string(state)?;
        self.store.set(&template_key(name), serialized)?;
        info!("Saved template \"{}\"", name);
        Ok(())
    }

    /// Returns an independent copy of the named template's selection.
    pub fn load(&self, name: &str) -> Result<SelectionState, Error> {
        let name = name.trim();
        let serialized = self
            .store
            .get(&template_key(name))?
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        debug!("Loaded template \"{}\"", name);
        Ok(serde_json::from_str(&serialized)?)
    }

    pub fn get(&self, name: &str) -> Result<Template, Error> {
        Ok(Template {
            name: name.trim().to_string(),
            snapshot: self.load(name)?,
        })
    }

    /// Removes the named template, if present.
    pub fn delete(&mut self, name: &str) -> Result<(), Error> {
        let name = name.trim();
        self.store.remove(&template_key(name))?;
        debug!("Deleted template \"{}\"", name);
        Ok(())
    }

    /// The names of all templates currently in the store, in the store's key
    /// order. Always read fresh from the store.
    pub fn list(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(TEMPLATE_KEY_PREFIX).map(str::to_string))
            .collect())
    }

    /// Seeds the default template if the store does not have one yet.
    /// Returns whether anything was written.
    pub fn ensure_default(&mut self) -> Result<bool, Error> {
        if self.store.get(&template_key(DEFAULT_TEMPLATE_NAME))?.is_some() {
            return Ok(false);
        }
        self.save(DEFAULT_TEMPLATE_NAME, &default_snapshot())?;
        Ok(true)
    }
}

fn template_key(name: &str) -> String {
    format!("{}{}", TEMPLATE_KEY_PREFIX, name)
}

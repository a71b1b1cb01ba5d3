//! Leaf-level selection over the parser's property tree.

use indexmap::map::Iter;

use crate::{Map, PropertyNode, PropertyPath, Scalar, SelectionState};

/// Leaves keyed by this name (compared case-insensitively) hold a distance
/// that is surfaced with three decimal places.
pub const RANGE_KEY: &str = "range";

/// Unit tokens recognized at the end of a range value.
pub const DISTANCE_UNITS: &[&str] = &["km", "kft", "mi", "ft", "m"];

/// A lazy, depth-first traversal over the leaves of a property tree, in
/// parser order. Branches are descended into but never produced.
#[derive(Clone)]
pub struct Leaves<'a> {
    stack: Vec<Iter<'a, String, PropertyNode>>,
    prefix: Vec<&'a str>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = (PropertyPath, &'a Scalar);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.stack.last_mut()?.next();
            match next {
                None => {
                    self.stack.pop();
                    self.prefix.pop();
                }
                Some((key, PropertyNode::Leaf(value))) => {
                    let mut path = self
                        .prefix
                        .iter()
                        .map(|s| s.to_string())
                        .collect::<PropertyPath>();
                    path.push(key.clone());
                    return Some((path, value));
                }
                Some((key, PropertyNode::Branch(children))) => {
                    self.prefix.push(key);
                    self.stack.push(children.iter());
                }
            }
        }
    }
}

/// Projects a property tree into independently selectable leaves.
#[derive(Debug, Clone, Copy)]
pub struct PropertyProjector<'a> {
    tree: &'a PropertyNode,
}

impl<'a> PropertyProjector<'a> {
    pub fn new(tree: &'a PropertyNode) -> Self {
        Self { tree }
    }

    /// Every leaf of the tree with its path. Each call starts a fresh
    /// traversal. A tree whose root is itself a leaf has no selectable leaves.
    pub fn leaves(&self) -> Leaves<'a> {
        let stack = match self.tree {
            PropertyNode::Branch(children) => vec![children.iter()],
            PropertyNode::Leaf(_) => Vec::new(),
        };
        Leaves {
            stack,
            prefix: Vec::new(),
        }
    }

    /// Selects or deselects the leaf at the given path. Returns `false`, and
    /// leaves the selection untouched, if the path does not name a leaf.
    pub fn toggle_leaf<S: AsRef<str>>(
        &self,
        state: &mut SelectionState,
        path: &[S],
        selected: bool,
    ) -> bool {
        if self.tree.leaf_at(path).is_none() {
            return false;
        }
        let path = path.iter().map(|s| s.as_ref().to_string()).collect();
        state.set_property(path, selected);
        true
    }

    /// Maps the final key of every selected leaf still present in the tree to
    /// its (normalized) value.
    ///
    /// When two selected leaves share a final key, the one visited later in
    /// traversal order wins.
    pub fn selected_properties(&self, state: &SelectionState) -> Map<String, Scalar> {
        let mut selected = Map::new();
        for (path, value) in self.leaves() {
            if !state.is_property_selected(&path) {
                continue;
            }
            if let Some(key) = path.last() {
                selected.insert(key.clone(), normalize_leaf(key, value));
            }
        }
        selected
    }
}

/// Returns the value of a leaf as it should be surfaced to the operator and
/// in payloads.
pub fn normalize_leaf(key: &str, value: &Scalar) -> Scalar {
    if !key.eq_ignore_ascii_case(RANGE_KEY) {
        return value.clone();
    }
    match value {
        Scalar::String(s) => Scalar::String(format_range(s).unwrap_or_else(|| s.clone())),
        _ => value.clone(),
    }
}

// "12.3456 km" -> "12.346 km". Keeps the separator and unit spelling.
fn format_range(s: &str) -> Option<String> {
    let trimmed = s.trim();
    let head = trimmed.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let unit = &trimmed[head.len()..];
    if !DISTANCE_UNITS.iter().any(|u| u.eq_ignore_ascii_case(unit)) {
        return None;
    }
    let number = head.trim_end();
    let separator = &head[number.len()..];
    let parsed = number.parse::<f64>().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(format!("{:.3}{}{}", parsed, separator, unit))
}

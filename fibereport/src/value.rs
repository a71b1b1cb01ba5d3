//! Values delivered by the trace parser: scalars and property trees.

use std::{ffi::OsStr, fmt, path::Path, str::FromStr};

use indexmap::IndexMap;
use serde::{de, de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

use crate::Error;

/// We use [`indexmap::IndexMap`] as our default map structure, so that
/// properties and columns keep the order in which the parser produced them.
pub type Map<K, V> = IndexMap<K, V>;

/// The supported file formats from which datasets, event logs and
/// configuration can be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SupportedFormat {
    Json,
    Yaml,
}

impl FromStr for SupportedFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Ok(match lower.as_ref() {
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            _ => return Err(Error::UnsupportedFileType(s.to_string())),
        })
    }
}

impl SupportedFormat {
    /// Detects the format of the given file from its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .ok_or_else(|| Error::CannotDetermineFileType(path.to_path_buf()))?;
        Self::from_str(ext)
    }

    /// Parses the given content in this format.
    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T, Error> {
        Ok(match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Yaml => serde_yaml::from_str(content)?,
        })
    }
}

/// Reads and parses the given file, detecting its format from its extension.
pub fn load_from_file<T, P>(path: P) -> Result<T, Error>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let fmt = SupportedFormat::from_path(path)
        .map_err(|e| Error::LoadFromFile(path.to_path_buf(), Box::new(e)))?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("while trying to read from {}", path.display()), e))?;
    fmt.parse(&content)
        .map_err(|e| Error::LoadFromFile(path.to_path_buf(), Box::new(e)))
}

/// A terminal value: either a leaf in a property tree or a table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn from_f64(f: f64) -> Self {
        // NaN and infinities have no JSON number representation.
        Number::from_f64(f)
            .map(Self::Number)
            .unwrap_or_else(|| Self::String(f.to_string()))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Self::Number(i.into())
    }
}

impl From<u64> for Scalar {
    fn from(u: u64) -> Self {
        Self::Number(u.into())
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Self::from_f64(f)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
        }
    }
}

struct ScalarVisitor;

impl<'de> de::Visitor<'de> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a scalar value (null, boolean, number or string)")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Scalar::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Scalar::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Scalar::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Scalar::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Scalar::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Scalar::from_f64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Scalar::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(Scalar::String(v))
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// A node in the parser's property tree: either a leaf holding a scalar, or a
/// branch holding named children in parser order.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyNode {
    Leaf(Scalar),
    Branch(Map<String, PropertyNode>),
}

impl Default for PropertyNode {
    fn default() -> Self {
        Self::Branch(Map::new())
    }
}

impl PropertyNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    pub fn as_branch(&self) -> Option<&Map<String, PropertyNode>> {
        match self {
            Self::Branch(children) => Some(children),
            Self::Leaf(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyNode> {
        self.as_branch().and_then(|children| children.get(key))
    }

    /// Follows the given path of keys from this node.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Option<&PropertyNode> {
        path.iter()
            .try_fold(self, |node, key| node.get(key.as_ref()))
    }

    /// Returns the scalar at the given path, but only if the path ends on a
    /// leaf. The empty path never names a leaf.
    pub fn leaf_at<S: AsRef<str>>(&self, path: &[S]) -> Option<&Scalar> {
        if path.is_empty() {
            return None;
        }
        match self.resolve(path)? {
            Self::Leaf(v) => Some(v),
            Self::Branch(_) => None,
        }
    }
}

impl Serialize for PropertyNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaf(v) => v.serialize(serializer),
            Self::Branch(children) => children.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PropertyNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> de::Visitor<'de> for NodeVisitor {
            type Value = PropertyNode;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a property tree")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(PropertyNode::Leaf(Scalar::Null))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(PropertyNode::Leaf(Scalar::Null))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(PropertyNode::Leaf(Scalar::Bool(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(PropertyNode::Leaf(Scalar::from(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(PropertyNode::Leaf(Scalar::from(v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(PropertyNode::Leaf(Scalar::from_f64(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(PropertyNode::Leaf(Scalar::from(v)))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(PropertyNode::Leaf(Scalar::String(v)))
            }

            // Arrays become branches keyed by element index.
            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut children = Map::new();
                while let Some(child) = seq.next_element::<PropertyNode>()? {
                    children.insert(children.len().to_string(), child);
                }
                Ok(PropertyNode::Branch(children))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut children = Map::new();
                while let Some((key, child)) = map.next_entry::<String, PropertyNode>()? {
                    children.insert(key, child);
                }
                Ok(PropertyNode::Branch(children))
            }
        }

        deserializer.deserialize_any(NodeVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn property_tree_preserves_parser_order() {
        let tree: PropertyNode =
            serde_json::from_str(r#"{"zeta": 1, "alpha": {"b": true, "a": null}, "mid": "x"}"#)
                .unwrap();
        let keys = tree.as_branch().unwrap().keys().collect::<Vec<_>>();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        let inner = tree.get("alpha").unwrap().as_branch().unwrap();
        assert_eq!(inner.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn arrays_become_indexed_branches() {
        let tree: PropertyNode = serde_yaml::from_str("points:\n  - 1.5\n  - 2.5\n").unwrap();
        assert_eq!(
            tree.leaf_at(&["points", "1"]),
            Some(&Scalar::from(2.5_f64))
        );
    }

    #[test]
    fn leaf_at_rejects_branches_and_missing_paths() {
        let tree: PropertyNode =
            serde_json::from_str(r#"{"GenParams": {"wavelength": "1550 nm"}}"#).unwrap();
        assert_eq!(
            tree.leaf_at(&["GenParams", "wavelength"]),
            Some(&Scalar::from("1550 nm"))
        );
        assert!(tree.leaf_at(&["GenParams"]).is_none());
        assert!(tree.leaf_at(&["GenParams", "nope"]).is_none());
        assert!(tree.leaf_at::<&str>(&[]).is_none());
    }

    #[test]
    fn scalar_display_forms() {
        assert_eq!(Scalar::Null.to_string(), "");
        assert_eq!(Scalar::from(3.2_f64).to_string(), "3.2");
        assert_eq!(Scalar::from(12_i64).to_string(), "12");
        assert_eq!(Scalar::from(true).to_string(), "true");
    }

    #[test]
    fn format_detection_from_extension() {
        assert_eq!(
            SupportedFormat::from_path("trace.YML").unwrap(),
            SupportedFormat::Yaml
        );
        assert!(matches!(
            SupportedFormat::from_path("trace.sor"),
            Err(Error::UnsupportedFileType(_))
        ));
        assert!(matches!(
            SupportedFormat::from_path("trace"),
            Err(Error::CannotDetermineFileType(_))
        ));
    }
}

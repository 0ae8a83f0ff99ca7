//! Path-keyed hints for encodings the structural type alone leaves open.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::{Path, Step};

/// Hint tags recorded by the foundry and read by the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Hint {
    /// Declared as a string, but the remote side may send a number
    /// (int-or-string unions).
    AmbiguousNumericString,
    /// Untyped subtree passed through verbatim; no hints apply below it.
    OpaquePassthrough,
}

impl Hint {
    pub fn tag(&self) -> &'static str {
        match self {
            Hint::AmbiguousNumericString => "ambiguous-numeric-string",
            Hint::OpaquePassthrough => "opaque-passthrough",
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Map from path pattern to [`Hint`].
///
/// A `*` segment in a key stands for every map key or element index at
/// that level, so one entry covers all siblings regardless of cardinality.
/// A numeric segment pins one position of a fixed-arity tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HintMap {
    entries: BTreeMap<String, Hint>,
}

impl HintMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `hint` for `path` and all of its siblings: keys and indexes
    /// are normalized to `*`.
    pub fn insert(&mut self, path: &Path, hint: Hint) {
        self.entries.insert(path.normalized().to_string(), hint);
    }

    /// Hint recorded for this path. A pinned position wins over `*`.
    pub fn get(&self, path: &Path) -> Option<Hint> {
        self.lookup(path, false)
    }

    /// Hint in force at `path`: `OpaquePassthrough` if the path is at or
    /// below a passthrough entry, otherwise the recorded entry.
    pub fn effective(&self, path: &Path) -> Option<Hint> {
        self.lookup(path, true)
    }

    /// Copy every entry of `relative` into this map, rooted under `prefix`.
    /// The prefix is used as given: pass [`Step::Wildcard`]
    /// for homogeneous elements and an index for a tuple position.
    pub fn extend_under(&mut self, prefix: &Path, relative: &HintMap) {
        let root = prefix.to_string();
        for (key, hint) in &relative.entries {
            self.entries.insert(format!("{}{}", root, key), *hint);
        }
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Hint> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a HintMap {
    type Item = (&'a String, &'a Hint);
    type IntoIter = btree_map::Iter<'a, String, Hint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// --- Internal implementation ---

impl HintMap {
    fn lookup(&self, path: &Path, passthrough: bool) -> Option<Hint> {
        let steps = path.steps();
        let rendered: Vec<String> = steps.iter().map(ToString::to_string).collect();

        // (wildcard count, hint) of the most specific full-length match
        let mut best: Option<(usize, Hint)> = None;
        for (key, hint) in &self.entries {
            let Some(depth) = matched_prefix(key, steps, &rendered) else {
                continue;
            };
            if passthrough && *hint == Hint::OpaquePassthrough {
                return Some(Hint::OpaquePassthrough);
            }
            if depth == steps.len() {
                let wildcards = segments(key).filter(|s| *s == WILDCARD).count();
                if best.map_or(true, |(w, _)| wildcards < w) {
                    best = Some((wildcards, *hint));
                }
            }
        }
        best.map(|(_, hint)| hint)
    }
}

const WILDCARD: &str = "*";

/// Segments of a stored key; the root key `""` has none.
fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('/').skip(1)
}

/// Number of leading steps matched if `key` is a prefix pattern of the
/// path, `None` otherwise.
fn matched_prefix(key: &str, steps: &[Step], rendered: &[String]) -> Option<usize> {
    let mut depth = 0;
    for segment in segments(key) {
        let step = steps.get(depth)?;
        let matches = if segment == WILDCARD {
            step.is_element() || *step == Step::Wildcard
        } else {
            segment == rendered[depth]
        };
        if !matches {
            return None;
        }
        depth += 1;
    }
    Some(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at_root(hint: Hint) -> HintMap {
        let mut hints = HintMap::new();
        hints.insert(&Path::root(), hint);
        hints
    }

    #[test]
    fn one_entry_covers_all_siblings() {
        let mut hints = HintMap::new();
        hints.insert(
            &Path::root().attribute("ports").wildcard().attribute("targetPort"),
            Hint::AmbiguousNumericString,
        );

        let second = Path::root().attribute("ports").index(1).attribute("targetPort");
        let ninth = Path::root().attribute("ports").index(9).attribute("targetPort");
        assert_eq!(hints.get(&second), Some(Hint::AmbiguousNumericString));
        assert_eq!(hints.get(&ninth), Some(Hint::AmbiguousNumericString));
        assert_eq!(hints.get(&Path::root().attribute("ports")), None);
    }

    #[test]
    fn passthrough_shadows_descendants() {
        let mut hints = HintMap::new();
        hints.insert(&Path::root().attribute("spec"), Hint::OpaquePassthrough);
        hints.insert(
            &Path::root().attribute("spec").attribute("port"),
            Hint::AmbiguousNumericString,
        );

        let inner = Path::root().attribute("spec").attribute("port");
        assert_eq!(hints.get(&inner), Some(Hint::AmbiguousNumericString));
        assert_eq!(hints.effective(&inner), Some(Hint::OpaquePassthrough));
        assert_eq!(hints.effective(&Path::root().attribute("status")), None);
    }

    #[test]
    fn extend_under_reroots_entries() {
        let mut relative = HintMap::new();
        relative.insert(&Path::root().attribute("port"), Hint::AmbiguousNumericString);

        let mut hints = HintMap::new();
        hints.extend_under(&Path::root().attribute("ports").wildcard(), &relative);
        assert_eq!(
            hints.get(&Path::root().attribute("ports").index(4).attribute("port")),
            Some(Hint::AmbiguousNumericString)
        );
    }

    #[test]
    fn pinned_position_does_not_leak_to_siblings() {
        let mut hints = HintMap::new();
        hints.extend_under(&Path::root().index(0), &at_root(Hint::AmbiguousNumericString));

        assert_eq!(hints.effective(&Path::root().index(0)), Some(Hint::AmbiguousNumericString));
        assert_eq!(hints.effective(&Path::root().index(1)), None);
    }

    #[test]
    fn pinned_position_wins_over_wildcard() {
        let mut hints = HintMap::new();
        hints.extend_under(&Path::root().wildcard(), &at_root(Hint::AmbiguousNumericString));
        hints.extend_under(&Path::root().index(1), &at_root(Hint::OpaquePassthrough));

        assert_eq!(hints.get(&Path::root().index(1)), Some(Hint::OpaquePassthrough));
        assert_eq!(hints.get(&Path::root().index(2)), Some(Hint::AmbiguousNumericString));
    }

    #[test]
    fn attribute_named_star_is_not_an_element() {
        let mut hints = HintMap::new();
        hints.insert(&Path::root().wildcard(), Hint::AmbiguousNumericString);

        assert_eq!(hints.effective(&Path::root().attribute("*")), None);
        assert_eq!(
            hints.effective(&Path::root().key("*")),
            Some(Hint::AmbiguousNumericString)
        );
    }

    #[test]
    fn serializes_as_plain_map() {
        let mut hints = HintMap::new();
        hints.insert(&Path::root().attribute("a"), Hint::AmbiguousNumericString);
        hints.insert(&Path::root().attribute("b"), Hint::OpaquePassthrough);
        assert_eq!(
            serde_json::to_value(&hints).unwrap(),
            json!({ "/a": "ambiguous-numeric-string", "/b": "opaque-passthrough" })
        );
    }
}

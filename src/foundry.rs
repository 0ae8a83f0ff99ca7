//! Schema foundry - derives structural types and hints from schema documents.
//!
//! A document holds named definitions under `definitions` (Swagger 2) or
//! `components.schemas` (OpenAPI 3). Nodes are derived depth first:
//!
//! | node | type |
//! |------|------|
//! | `string` | `string`, hinted when tagged int-or-string |
//! | `boolean` | `bool` |
//! | `number` / `integer` | `number` |
//! | untyped, tagged int-or-string | `string` + `ambiguous-numeric-string` hint |
//! | `x-kubernetes-preserve-unknown-fields` | `dynamic` + `opaque-passthrough` hint |
//! | array of `E` | `list(E)`, `set(E)` for list-type `set`, `tuple([E])` if `E` contains `dynamic` |
//! | array with only `additionalItems: E` | `tuple([E])` |
//! | object with `properties` | `object({..})` |
//! | object with only `additionalProperties: E` | `map(E)` |
//! | anything else | `dynamic` |
//!
//! Every nested call, including each `$ref` hop, costs one unit of depth.
//! Running out of depth is a [`FoundryError::RecursionLimit`]; the type
//! algebra has no way to express a self-referencing schema.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use serde_json::{json, Map, Value};
use tracing::{debug, trace, warn};

use crate::error::{FoundryError, Located, LocatedKind};
use crate::hints::{Hint, HintMap};
use crate::loader::{navigate_fragment, reference_id};
use crate::path::{Path, Step};
use crate::types::Type;

/// Depth used by [`Foundry::derive`] unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 50;

pub const INT_OR_STRING: &str = "io.k8s.apimachinery.pkg.util.intstr.IntOrString";
pub const QUANTITY: &str = "io.k8s.apimachinery.pkg.api.resource.Quantity";
pub const JSON_SCHEMA_PROPS_V1: &str =
    "io.k8s.apiextensions-apiserver.pkg.apis.apiextensions.v1.JSONSchemaProps";
pub const JSON_SCHEMA_PROPS_V1BETA1: &str =
    "io.k8s.apiextensions-apiserver.pkg.apis.apiextensions.v1beta1.JSONSchemaProps";
pub const SUBRESOURCE_STATUS: &str =
    "io.k8s.apiextensions-apiserver.pkg.apis.apiextensions.v1.CustomResourceSubresourceStatus";

const INT_OR_STRING_TAG: &str = "x-kubernetes-int-or-string";
const PRESERVE_UNKNOWN_FIELDS: &str = "x-kubernetes-preserve-unknown-fields";
const LIST_TYPE: &str = "x-kubernetes-list-type";
const GVK_EXTENSION: &str = "x-kubernetes-group-version-kind";

/// Replacement nodes for definitions whose declared shape is misleading.
fn reference_override(id: &str) -> Option<Value> {
    match id {
        INT_OR_STRING => Some(json!({ INT_OR_STRING_TAG: true })),
        QUANTITY => Some(json!({ "type": "string" })),
        JSON_SCHEMA_PROPS_V1 | JSON_SCHEMA_PROPS_V1BETA1 => Some(json!({})),
        SUBRESOURCE_STATUS => Some(json!({ "type": "object", "additionalProperties": {} })),
        _ => None,
    }
}

/// Options for a [`Foundry`].
#[derive(Debug, Clone)]
pub struct FoundryOptions {
    /// Depth budget for [`Foundry::derive`].
    pub max_depth: usize,
    /// Apply the built-in reference overrides (int-or-string, quantity, ...).
    pub overrides: bool,
}

impl Default for FoundryOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            overrides: true,
        }
    }
}

impl FoundryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn overrides(mut self, overrides: bool) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Group, version and kind of a resource. The core group is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    fn matches(&self, entry: &Value) -> bool {
        let field = |name: &str| entry.get(name).and_then(Value::as_str).unwrap_or("");
        field("group") == self.group && field("version") == self.version && field("kind") == self.kind
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

impl FromStr for GroupVersionKind {
    type Err = FoundryError;

    /// Parses `group/version/kind`, or `version/kind` for the core group.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [version, kind] if !version.is_empty() && !kind.is_empty() => {
                Ok(Self::new("", *version, *kind))
            }
            [group, version, kind] if !version.is_empty() && !kind.is_empty() => {
                Ok(Self::new(*group, *version, *kind))
            }
            _ => Err(FoundryError::InvalidGvk {
                value: s.to_string(),
            }),
        }
    }
}

/// A derived type with hints relative to the node it was derived from.
#[derive(Debug, Clone)]
struct Derived {
    ty: Type,
    hints: HintMap,
}

impl Derived {
    fn plain(ty: Type) -> Self {
        Self {
            ty,
            hints: HintMap::new(),
        }
    }

    fn hinted(ty: Type, hint: Hint) -> Self {
        let mut hints = HintMap::new();
        hints.insert(&Path::root(), hint);
        Self { ty, hints }
    }
}

/// Derives [`Type`]s and [`HintMap`]s from one immutable schema document.
///
/// Derived nodes are memoized by structural hash. The cache lives as long
/// as the foundry; build a new foundry when the document changes.
pub struct Foundry {
    document: Value,
    options: FoundryOptions,
    cache: Mutex<HashMap<blake3::Hash, Derived>>,
}

impl Foundry {
    pub fn new(document: Value) -> Self {
        Self::with_options(document, FoundryOptions::default())
    }

    pub fn with_options(document: Value, options: FoundryOptions) -> Self {
        Self {
            document,
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn options(&self) -> &FoundryOptions {
        &self.options
    }

    /// Derive with the configured depth budget.
    pub fn derive(&self, node: &Value) -> Result<(Type, HintMap), FoundryError> {
        self.derive_type(node, self.options.max_depth)
    }

    /// Derive the type of `node`, resolving references against this
    /// foundry's document. Hints are keyed by path pattern from `node`.
    ///
    /// The cache lock is held for the whole derivation.
    ///
    /// # Errors
    ///
    /// Returns `FoundryError::RecursionLimit` when `max_depth` is exhausted,
    /// and `UnresolvableRef` / `InvalidSchema` for malformed documents.
    pub fn derive_type(
        &self,
        node: &Value,
        max_depth: usize,
    ) -> Result<(Type, HintMap), FoundryError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let mut deriver = Deriver {
            document: &self.document,
            overrides: self.options.overrides,
            cache: &mut *cache,
        };
        let derived = deriver.derive(node, max_depth)?;
        Ok((derived.ty, derived.hints))
    }

    /// Derive a named definition.
    pub fn derive_definition(&self, id: &str) -> Result<(Type, HintMap), FoundryError> {
        let node = self
            .definition(id)
            .ok_or_else(|| FoundryError::UnknownDefinition { id: id.to_string() })?;
        self.derive(node)
    }

    /// Look up a named definition.
    pub fn definition(&self, id: &str) -> Option<&Value> {
        self.definition_tables().find_map(|table| table.get(id))
    }

    /// All named definitions, Swagger 2 first.
    pub fn definitions(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.definition_tables().flat_map(|table| table.iter())
    }

    /// Id of the definition annotated with `gvk`.
    pub fn definition_id_for(&self, gvk: &GroupVersionKind) -> Option<&str> {
        self.definitions()
            .find(|(_, node)| {
                node.get(GVK_EXTENSION)
                    .and_then(Value::as_array)
                    .is_some_and(|entries| entries.iter().any(|e| gvk.matches(e)))
            })
            .map(|(id, _)| id.as_str())
    }

    /// Derive the type of the resource kind `gvk`.
    pub fn type_for_gvk(&self, gvk: &GroupVersionKind) -> Result<(Type, HintMap), FoundryError> {
        let id = self
            .definition_id_for(gvk)
            .ok_or_else(|| FoundryError::UnknownKind {
                gvk: gvk.to_string(),
            })?;
        debug!(%gvk, id, "deriving type for resource kind");
        self.derive_definition(id)
    }

    /// Number of memoized schema nodes.
    pub fn cache_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn definition_tables(&self) -> impl Iterator<Item = &Map<String, Value>> {
        [
            self.document.get("definitions"),
            self.document.pointer("/components/schemas"),
        ]
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
    }
}

// --- Internal implementation ---

struct Deriver<'a> {
    document: &'a Value,
    overrides: bool,
    cache: &'a mut HashMap<blake3::Hash, Derived>,
}

impl<'a> Deriver<'a> {
    fn derive(&mut self, node: &Value, depth: usize) -> Result<Derived, Located> {
        if depth == 0 {
            return Err(Located::new(LocatedKind::RecursionLimit));
        }

        let key = structural_hash(node);
        if let Some(hit) = self.cache.get(&key) {
            debug!(ty = %hit.ty, "schema cache hit");
            return Ok(hit.clone());
        }

        let derived = self.derive_uncached(node, depth)?;
        debug!(ty = %derived.ty, "schema cache miss");
        self.cache.insert(key, derived.clone());
        Ok(derived)
    }

    fn derive_uncached(&mut self, node: &Value, depth: usize) -> Result<Derived, Located> {
        let map = match node {
            Value::Object(map) => map,
            // Boolean schema: `true` accepts anything.
            Value::Bool(true) => return Ok(Derived::plain(Type::Dynamic)),
            other => {
                return Err(invalid(format!(
                    "schema node must be an object, got {}",
                    crate::types::json_type_name(other)
                )))
            }
        };

        if let Some(reference) = map.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| invalid("$ref must be a string"))?;
            return match self.resolve_reference(reference)? {
                Resolved::Borrowed(target) => self.derive(target, depth - 1),
                Resolved::Owned(target) => self.derive(&target, depth - 1),
            };
        }

        if let Some(all_of) = map.get("allOf") {
            return self.derive_all_of(all_of, depth);
        }

        if is_flag_set(map, PRESERVE_UNKNOWN_FIELDS) {
            return Ok(Derived::hinted(Type::Dynamic, Hint::OpaquePassthrough));
        }

        let int_or_string = is_int_or_string(map);
        match schema_type(map)? {
            Some("string") if int_or_string => Ok(Derived::hinted(
                Type::STRING,
                Hint::AmbiguousNumericString,
            )),
            Some("string") => Ok(Derived::plain(Type::STRING)),
            Some("boolean") => Ok(Derived::plain(Type::BOOL)),
            Some("number") | Some("integer") => Ok(Derived::plain(Type::NUMBER)),
            Some("array") => self.derive_array(map, depth),
            Some("object") => self.derive_object(map, depth),
            Some(other) => Err(invalid(format!("unsupported type \"{}\"", other))),
            None if int_or_string => Ok(Derived::hinted(
                Type::STRING,
                Hint::AmbiguousNumericString,
            )),
            None if map.contains_key("items") || map.contains_key("additionalItems") => {
                self.derive_array(map, depth)
            }
            None if map.contains_key("properties") || map.contains_key("additionalProperties") => {
                self.derive_object(map, depth)
            }
            None => Ok(Derived::plain(Type::Dynamic)),
        }
    }

    fn resolve_reference(&self, reference: &str) -> Result<Resolved<'a>, Located> {
        let id = reference_id(reference);
        if self.overrides {
            if let Some(replacement) = reference_override(&id) {
                debug!(id = %id, "applying reference override");
                return Ok(Resolved::Owned(replacement));
            }
        }

        if !reference.starts_with('#') {
            return Err(Located::new(LocatedKind::UnresolvableRef(
                reference.to_string(),
            )));
        }

        trace!(reference, "following reference");
        let document: &'a Value = self.document;
        navigate_fragment(document, reference)
            .map(Resolved::Borrowed)
            .map_err(|_| Located::new(LocatedKind::UnresolvableRef(reference.to_string())))
    }

    fn derive_array(&mut self, map: &Map<String, Value>, depth: usize) -> Result<Derived, Located> {
        let is_set = map.get(LIST_TYPE).and_then(Value::as_str) == Some("set");

        match (map.get("items"), map.get("additionalItems")) {
            // Positional item schemas. A single one is a template for every
            // element; otherwise hints are pinned to their position.
            (Some(Value::Array(items)), _) => {
                let mut types = Vec::with_capacity(items.len());
                let mut hints = HintMap::new();
                for (i, item) in items.iter().enumerate() {
                    let element = self
                        .derive(item, depth - 1)
                        .map_err(|e| e.under(Step::Index(i)))?;
                    let position = if items.len() == 1 {
                        Path::root().wildcard()
                    } else {
                        Path::root().index(i)
                    };
                    hints.extend_under(&position, &element.hints);
                    types.push(element.ty);
                }
                Ok(Derived {
                    ty: Type::Tuple(types),
                    hints,
                })
            }
            (Some(items), _) => {
                let element = self.derive_element(items, depth)?;
                let ty = if element.ty.contains_dynamic() {
                    Type::tuple([element.ty])
                } else if is_set {
                    Type::set(element.ty)
                } else {
                    Type::list(element.ty)
                };
                Ok(Derived {
                    ty,
                    hints: element.hints,
                })
            }
            (None, Some(additional)) if additional.is_object() => {
                let element = self.derive_element(additional, depth)?;
                Ok(Derived {
                    ty: Type::tuple([element.ty]),
                    hints: element.hints,
                })
            }
            (None, _) => Ok(Derived::plain(Type::tuple([Type::Dynamic]))),
        }
    }

    fn derive_object(
        &mut self,
        map: &Map<String, Value>,
        depth: usize,
    ) -> Result<Derived, Located> {
        let properties = match map.get("properties") {
            None => None,
            Some(Value::Object(props)) => Some(props),
            Some(_) => return Err(invalid("properties must be an object")),
        };

        match (properties, map.get("additionalProperties")) {
            (Some(props), additional) => {
                if additional.is_some_and(Value::is_object) {
                    warn!("object declares both properties and additionalProperties; using properties");
                }
                let mut attributes = BTreeMap::new();
                let mut hints = HintMap::new();
                for (name, prop) in props {
                    let child = self
                        .derive(prop, depth - 1)
                        .map_err(|e| e.under(Step::Attribute(name.clone())))?;
                    hints.extend_under(&Path::root().attribute(name), &child.hints);
                    attributes.insert(name.clone(), child.ty);
                }
                Ok(Derived {
                    ty: Type::Object(attributes),
                    hints,
                })
            }
            (None, Some(additional @ Value::Object(_))) => {
                let element = self.derive_element(additional, depth)?;
                Ok(Derived {
                    ty: Type::map(element.ty),
                    hints: element.hints,
                })
            }
            (None, Some(Value::Bool(false))) => Ok(Derived::plain(Type::Object(BTreeMap::new()))),
            (None, Some(Value::Bool(true))) | (None, None) => Ok(Derived::plain(Type::Dynamic)),
            (None, Some(_)) => Err(invalid("additionalProperties must be a schema or a boolean")),
        }
    }

    /// Derive a homogeneous element schema; hints land under a wildcard.
    fn derive_element(&mut self, node: &Value, depth: usize) -> Result<Derived, Located> {
        let element = self
            .derive(node, depth - 1)
            .map_err(|e| e.under(Step::Wildcard))?;
        let mut hints = HintMap::new();
        hints.extend_under(&Path::root().wildcard(), &element.hints);
        Ok(Derived {
            ty: element.ty,
            hints,
        })
    }

    fn derive_all_of(&mut self, all_of: &Value, depth: usize) -> Result<Derived, Located> {
        let branches = match all_of.as_array() {
            Some(branches) if !branches.is_empty() => branches,
            _ => return Err(invalid("allOf must be a non-empty array")),
        };

        if let [single] = branches.as_slice() {
            return self.derive(single, depth - 1);
        }

        let mut attributes = BTreeMap::new();
        let mut hints = HintMap::new();
        for branch in branches {
            let derived = self.derive(branch, depth - 1)?;
            let kind = derived.ty.kind();
            let Type::Object(branch_attributes) = derived.ty else {
                return Err(Located::new(LocatedKind::UnsupportedComposition(format!(
                    "allOf branch derives {}, expected an object",
                    kind
                ))));
            };
            for (name, ty) in branch_attributes {
                match attributes.get(&name) {
                    Some(existing) if existing != &ty => {
                        return Err(Located::new(LocatedKind::UnsupportedComposition(format!(
                            "allOf branches disagree on the type of \"{}\"",
                            name
                        ))));
                    }
                    _ => {
                        attributes.insert(name, ty);
                    }
                }
            }
            hints.extend_under(&Path::root(), &derived.hints);
        }
        Ok(Derived {
            ty: Type::Object(attributes),
            hints,
        })
    }
}

enum Resolved<'a> {
    Borrowed(&'a Value),
    Owned(Value),
}

fn invalid(message: impl Into<String>) -> Located {
    Located::new(LocatedKind::InvalidSchema(message.into()))
}

fn is_flag_set(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn is_int_or_string(map: &Map<String, Value>) -> bool {
    is_flag_set(map, INT_OR_STRING_TAG)
        || map.get("format").and_then(Value::as_str) == Some("int-or-string")
}

/// Declared type name. A list of names (`["string", "null"]`) yields its
/// first non-null entry.
fn schema_type(map: &Map<String, Value>) -> Result<Option<&str>, Located> {
    match map.get("type") {
        None => Ok(None),
        Some(Value::String(name)) => Ok(Some(name.as_str())),
        Some(Value::Array(names)) => Ok(names
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null")),
        Some(_) => Err(invalid("type must be a string or an array of strings")),
    }
}

/// BLAKE3 digest of a canonical encoding of `node`. Object keys are
/// visited in sorted order so key order does not affect the digest.
fn structural_hash(node: &Value) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    feed(&mut hasher, node);
    hasher.finalize()
}

fn feed(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(b"n");
        }
        Value::Bool(b) => {
            hasher.update(if *b { b"t" } else { b"f" });
        }
        Value::Number(n) => {
            hasher.update(b"#");
            feed_str(hasher, &n.to_string());
        }
        Value::String(s) => {
            hasher.update(b"s");
            feed_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update(b"[");
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                feed(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update(b"{");
            hasher.update(&(map.len() as u64).to_le_bytes());
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, child) in entries {
                feed_str(hasher, key);
                feed(hasher, child);
            }
        }
    }
}

fn feed_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

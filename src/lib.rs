//! Manifest Morph
//!
//! Typed conversion of Kubernetes-style manifests between OpenAPI schemas,
//! an explicit type algebra and schema-free JSON payloads.
//!
//! A [`Foundry`] derives a structural [`Type`] plus a [`HintMap`] from a
//! schema document. Payloads are decoded into [`TypedValue`]s against that
//! type, converted between types with [`morph`], completed for planning with
//! [`backfill_unknown`], and encoded back with [`encode`].
//!
//! # Example
//!
//! ```
//! use manifest_morph::{decode, encode, Foundry, Type};
//! use serde_json::json;
//!
//! let document = json!({
//!     "definitions": {
//!         "Port": {
//!             "type": "object",
//!             "properties": {
//!                 "name": { "type": "string" },
//!                 "targetPort": { "x-kubernetes-int-or-string": true }
//!             }
//!         }
//!     }
//! });
//!
//! let foundry = Foundry::new(document);
//! let (ty, hints) = foundry.derive_definition("Port").unwrap();
//! assert_eq!(
//!     ty,
//!     Type::object([("name", Type::STRING), ("targetPort", Type::STRING)])
//! );
//!
//! // The int-or-string hint lets a number decode into the string slot
//! // and encode back as a number.
//! let payload = json!({ "name": "http", "targetPort": 8080 });
//! let value = decode(&payload, &ty, &hints).unwrap();
//! assert_eq!(value.get("targetPort").and_then(|v| v.as_str()), Some("8080"));
//! assert_eq!(encode(&value, &hints).unwrap(), payload);
//! ```
//!
//! # Values
//!
//! | state | meaning |
//! |-------|---------|
//! | known | concrete data of the value's type |
//! | null | explicitly absent |
//! | unknown | not yet determined (planning) |
//!
//! Unknowns never reach a payload: collapse them with
//! [`collapse_unknown_to_null`] before encoding.

mod error;
mod foundry;
mod hints;
mod loader;
mod morph;
mod path;
mod payload;
mod types;
mod unknown;
mod value;

pub use error::{DecodeError, EncodeError, FoundryError, LoadError, MorphError};
pub use foundry::{
    Foundry, FoundryOptions, GroupVersionKind, DEFAULT_MAX_DEPTH, INT_OR_STRING,
    JSON_SCHEMA_PROPS_V1, JSON_SCHEMA_PROPS_V1BETA1, QUANTITY, SUBRESOURCE_STATUS,
};
pub use hints::{Hint, HintMap};
pub use loader::{load_document, load_document_str, navigate_fragment, reference_id};
pub use morph::{morph, morph_at};
pub use path::{Path, Step};
pub use payload::{decode, decode_at, encode, encode_at, infer};
pub use types::{json_type_name, Primitive, Type};
pub use unknown::{backfill_unknown, collapse_unknown_to_null};
pub use value::{Data, State, TypedValue};

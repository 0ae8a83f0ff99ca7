//! Integration tests for type derivation from schema documents.

use serde_json::{json, Value};
use manifest_morph::{
    Foundry, FoundryError, FoundryOptions, GroupVersionKind, Hint, Path, Type, INT_OR_STRING,
    QUANTITY, SUBRESOURCE_STATUS,
};

fn service_document() -> Value {
    json!({
        "definitions": {
            "io.k8s.api.core.v1.ServicePort": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "port": { "type": "integer" },
                    "targetPort": {
                        "$ref": "#/definitions/io.k8s.apimachinery.pkg.util.intstr.IntOrString"
                    }
                }
            },
            "io.k8s.api.core.v1.ServiceSpec": {
                "type": "object",
                "properties": {
                    "ports": {
                        "type": "array",
                        "items": { "$ref": "#/definitions/io.k8s.api.core.v1.ServicePort" }
                    },
                    "primary": { "$ref": "#/definitions/io.k8s.api.core.v1.ServicePort" },
                    "selector": {
                        "type": "object",
                        "additionalProperties": { "type": "string" }
                    }
                }
            },
            "io.k8s.api.core.v1.Service": {
                "type": "object",
                "properties": {
                    "apiVersion": { "type": "string" },
                    "kind": { "type": "string" },
                    "spec": { "$ref": "#/definitions/io.k8s.api.core.v1.ServiceSpec" }
                },
                "x-kubernetes-group-version-kind": [
                    { "group": "", "version": "v1", "kind": "Service" }
                ]
            },
            "io.k8s.api.apps.v1.Deployment": {
                "type": "object",
                "properties": {
                    "spec": {
                        "type": "object",
                        "properties": { "replicas": { "type": "integer" } }
                    }
                },
                "x-kubernetes-group-version-kind": [
                    { "group": "apps", "version": "v1", "kind": "Deployment" }
                ]
            }
        }
    })
}

fn service_port_type() -> Type {
    Type::object([
        ("name", Type::STRING),
        ("port", Type::NUMBER),
        ("targetPort", Type::STRING),
    ])
}

// === References ===

mod references {
    use super::*;

    #[test]
    fn follows_definition_refs() {
        let foundry = Foundry::new(service_document());
        let (ty, _) = foundry
            .derive_definition("io.k8s.api.core.v1.ServiceSpec")
            .unwrap();

        assert_eq!(
            ty,
            Type::object([
                ("ports", Type::list(service_port_type())),
                ("primary", service_port_type()),
                ("selector", Type::map(Type::STRING)),
            ])
        );
    }

    #[test]
    fn openapi3_components() {
        let document = json!({
            "components": {
                "schemas": {
                    "Item": {
                        "type": "object",
                        "properties": { "id": { "type": "string" } }
                    },
                    "Bag": {
                        "type": "object",
                        "properties": {
                            "items": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Item" }
                            }
                        }
                    }
                }
            }
        });
        let foundry = Foundry::new(document);
        let (ty, _) = foundry.derive_definition("Bag").unwrap();

        assert_eq!(
            ty,
            Type::object([("items", Type::list(Type::object([("id", Type::STRING)])))])
        );
    }

    #[test]
    fn missing_target_is_unresolvable() {
        let foundry = Foundry::new(json!({ "definitions": {} }));
        let node = json!({
            "type": "object",
            "properties": { "spec": { "$ref": "#/definitions/Missing" } }
        });

        match foundry.derive(&node) {
            Err(FoundryError::UnresolvableRef { path, reference }) => {
                assert_eq!(path, "/spec");
                assert_eq!(reference, "#/definitions/Missing");
            }
            other => panic!("expected UnresolvableRef, got {:?}", other),
        }
    }

    #[test]
    fn external_ref_is_unresolvable() {
        let foundry = Foundry::new(json!({}));
        let result = foundry.derive(&json!({ "$ref": "other.json#/definitions/Thing" }));
        assert!(matches!(result, Err(FoundryError::UnresolvableRef { .. })));
    }

    #[test]
    fn unknown_definition() {
        let foundry = Foundry::new(service_document());
        let result = foundry.derive_definition("io.k8s.api.core.v1.Pod");
        assert!(matches!(result, Err(FoundryError::UnknownDefinition { .. })));
    }
}

// === Reference overrides ===

mod overrides {
    use super::*;

    fn reference(id: &str) -> Value {
        json!({ "$ref": format!("#/definitions/{}", id) })
    }

    #[test]
    fn int_or_string_is_hinted_string() {
        let foundry = Foundry::new(json!({ "definitions": {} }));
        let (ty, hints) = foundry.derive(&reference(INT_OR_STRING)).unwrap();

        assert_eq!(ty, Type::STRING);
        assert_eq!(hints.get(&Path::root()), Some(Hint::AmbiguousNumericString));
    }

    #[test]
    fn quantity_is_string() {
        let foundry = Foundry::new(json!({ "definitions": {} }));
        let (ty, hints) = foundry.derive(&reference(QUANTITY)).unwrap();

        assert_eq!(ty, Type::STRING);
        assert!(hints.is_empty());
    }

    #[test]
    fn subresource_status_is_open_map() {
        let foundry = Foundry::new(json!({ "definitions": {} }));
        let (ty, _) = foundry.derive(&reference(SUBRESOURCE_STATUS)).unwrap();
        assert_eq!(ty, Type::map(Type::Dynamic));
    }

    #[test]
    fn json_schema_props_is_dynamic() {
        let foundry = Foundry::new(json!({ "definitions": {} }));
        let (ty, _) = foundry
            .derive(&reference(
                "io.k8s.apiextensions-apiserver.pkg.apis.apiextensions.v1.JSONSchemaProps",
            ))
            .unwrap();
        assert_eq!(ty, Type::Dynamic);
    }

    #[test]
    fn override_wins_over_document_definition() {
        let document = json!({
            "definitions": {
                "io.k8s.apimachinery.pkg.api.resource.Quantity": { "type": "object" }
            }
        });
        let foundry = Foundry::new(document.clone());
        assert_eq!(foundry.derive(&reference(QUANTITY)).unwrap().0, Type::STRING);

        let foundry = Foundry::with_options(document, FoundryOptions::new().overrides(false));
        assert_eq!(foundry.derive(&reference(QUANTITY)).unwrap().0, Type::Dynamic);
    }

    #[test]
    fn disabled_overrides_leave_missing_refs_unresolvable() {
        let foundry = Foundry::with_options(
            json!({ "definitions": {} }),
            FoundryOptions::new().overrides(false),
        );
        let result = foundry.derive(&reference(INT_OR_STRING));
        assert!(matches!(result, Err(FoundryError::UnresolvableRef { .. })));
    }
}

// === Recursion guard ===

mod recursion {
    use super::*;

    #[test]
    fn self_reference_hits_limit() {
        let document = json!({
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "value": { "type": "string" },
                        "next": { "$ref": "#/definitions/Node" }
                    }
                }
            }
        });
        let foundry = Foundry::new(document);
        let result = foundry.derive_definition("Node");

        match result {
            Err(FoundryError::RecursionLimit { path }) => {
                assert!(path.starts_with("/next/next"), "path was {}", path);
            }
            other => panic!("expected RecursionLimit, got {:?}", other),
        }
    }

    #[test]
    fn depth_is_counted_per_level() {
        let node = json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "object",
                    "properties": {
                        "b": {
                            "type": "object",
                            "properties": { "c": { "type": "string" } }
                        }
                    }
                }
            }
        });

        let result = Foundry::new(json!({})).derive_type(&node, 3);
        assert!(matches!(
            result,
            Err(FoundryError::RecursionLimit { ref path }) if path == "/a/b/c"
        ));

        let (ty, _) = Foundry::new(json!({})).derive_type(&node, 4).unwrap();
        assert_eq!(
            ty,
            Type::object([(
                "a",
                Type::object([("b", Type::object([("c", Type::STRING)]))])
            )])
        );
    }

    #[test]
    fn configured_max_depth_is_used() {
        let node = json!({
            "type": "object",
            "properties": { "a": { "type": "string" } }
        });
        let foundry = Foundry::with_options(json!({}), FoundryOptions::new().max_depth(1));
        assert!(matches!(
            foundry.derive(&node),
            Err(FoundryError::RecursionLimit { .. })
        ));
    }
}

// === Hints and the cache ===

mod hints_and_cache {
    use super::*;

    #[test]
    fn hints_follow_every_use_of_a_cached_definition() {
        let foundry = Foundry::new(service_document());
        let (_, hints) = foundry
            .derive_definition("io.k8s.api.core.v1.Service")
            .unwrap();

        let list_path = Path::root()
            .attribute("spec")
            .attribute("ports")
            .index(3)
            .attribute("targetPort");
        let direct_path = Path::root()
            .attribute("spec")
            .attribute("primary")
            .attribute("targetPort");

        assert_eq!(hints.effective(&list_path), Some(Hint::AmbiguousNumericString));
        assert_eq!(hints.effective(&direct_path), Some(Hint::AmbiguousNumericString));
        assert_eq!(hints.len(), 2);
    }

    #[test]
    fn repeated_derivation_is_served_from_cache() {
        let foundry = Foundry::new(service_document());
        let first = foundry
            .derive_definition("io.k8s.api.core.v1.Service")
            .unwrap();
        let cached = foundry.cache_len();
        assert!(cached > 0);

        let second = foundry
            .derive_definition("io.k8s.api.core.v1.Service")
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(foundry.cache_len(), cached);
    }

    #[test]
    fn key_order_does_not_defeat_the_cache() {
        let foundry = Foundry::new(json!({}));
        foundry
            .derive(&json!({ "type": "array", "items": { "type": "string" } }))
            .unwrap();
        let cached = foundry.cache_len();

        foundry
            .derive(&json!({ "items": { "type": "string" }, "type": "array" }))
            .unwrap();
        assert_eq!(foundry.cache_len(), cached);
    }

    #[test]
    fn opaque_subtree_suppresses_nested_hints() {
        let node = json!({
            "type": "object",
            "properties": {
                "raw": { "x-kubernetes-preserve-unknown-fields": true }
            }
        });
        let (ty, hints) = Foundry::new(json!({})).derive(&node).unwrap();

        assert_eq!(ty, Type::object([("raw", Type::Dynamic)]));
        let nested = Path::root().attribute("raw").key("anything");
        assert_eq!(hints.effective(&nested), Some(Hint::OpaquePassthrough));
    }

    #[test]
    fn concurrent_derivations_agree() {
        let foundry = Foundry::new(service_document());
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        foundry
                            .derive_definition("io.k8s.api.core.v1.Service")
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
    }
}

// === Composition ===

mod composition {
    use super::*;

    #[test]
    fn single_all_of_branch_is_transparent() {
        let document = json!({
            "definitions": {
                "Meta": {
                    "type": "object",
                    "properties": { "name": { "type": "string" } }
                }
            }
        });
        let node = json!({
            "allOf": [{ "$ref": "#/definitions/Meta" }],
            "description": "standard object metadata"
        });
        let (ty, _) = Foundry::new(document).derive(&node).unwrap();
        assert_eq!(ty, Type::object([("name", Type::STRING)]));
    }

    #[test]
    fn object_branches_merge() {
        let node = json!({
            "allOf": [
                { "type": "object", "properties": { "a": { "type": "string" } } },
                { "type": "object", "properties": { "b": { "type": "boolean" } } }
            ]
        });
        let (ty, _) = Foundry::new(json!({})).derive(&node).unwrap();
        assert_eq!(ty, Type::object([("a", Type::STRING), ("b", Type::BOOL)]));
    }

    #[test]
    fn non_object_branch_is_unsupported() {
        let node = json!({
            "allOf": [
                { "type": "object", "properties": { "a": { "type": "string" } } },
                { "type": "string" }
            ]
        });
        let result = Foundry::new(json!({})).derive(&node);
        assert!(matches!(
            result,
            Err(FoundryError::UnsupportedComposition { .. })
        ));
    }
}

// === Group/version/kind ===

mod group_version_kind {
    use super::*;

    #[test]
    fn finds_definition_by_kind() {
        let foundry = Foundry::new(service_document());
        let gvk: GroupVersionKind = "apps/v1/Deployment".parse().unwrap();

        assert_eq!(
            foundry.definition_id_for(&gvk),
            Some("io.k8s.api.apps.v1.Deployment")
        );
        let (ty, _) = foundry.type_for_gvk(&gvk).unwrap();
        assert_eq!(
            ty,
            Type::object([("spec", Type::object([("replicas", Type::NUMBER)]))])
        );
    }

    #[test]
    fn core_group_kind() {
        let foundry = Foundry::new(service_document());
        let gvk: GroupVersionKind = "v1/Service".parse().unwrap();
        assert_eq!(
            foundry.definition_id_for(&gvk),
            Some("io.k8s.api.core.v1.Service")
        );
    }

    #[test]
    fn unknown_kind() {
        let foundry = Foundry::new(service_document());
        let gvk = GroupVersionKind::new("batch", "v1", "Job");
        let result = foundry.type_for_gvk(&gvk);
        assert!(matches!(
            result,
            Err(FoundryError::UnknownKind { ref gvk }) if gvk == "batch/v1/Job"
        ));
    }
}

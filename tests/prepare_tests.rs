//! Preparation-level properties: name uniqueness, resolution priority,
//! determinism, and failure semantics over full fixture documents.

use rpcgen::error::Error;
use rpcgen::loader::load_str;
use rpcgen::prepare::{prepare, TypeReference};

const USER_SERVICE: &str = include_str!("fixtures/user-service.yaml");
const KITCHEN_SINK: &str = include_str!("fixtures/kitchen-sink.yaml");

const TS: &[&str] = &["typescript", "ts"];
const PY: &[&str] = &["python", "py"];
const GO: &[&str] = &["go", "golang"];

#[test]
fn user_service_round_trip() {
    let definition = load_str(USER_SERVICE).unwrap();
    let schema = prepare(&definition, TS).unwrap();

    let names: Vec<&str> = schema.generated_type_names().collect();
    assert!(names.contains(&"UserServiceGetUserInput"));
    assert!(names.contains(&"User"));
    // The output reused the shared User reference.
    assert!(!names.contains(&"UserServiceGetUserOutput"));

    let service = &schema.services["UserService"];
    let get_user = &service.operations["getUser"];
    assert_eq!(
        get_user.output,
        Some(TypeReference::Generated {
            name: "User".to_string()
        })
    );
    // Void output is absent, not an empty-shape placeholder.
    let delete_user = &service.operations["deleteUser"];
    assert!(delete_user.output.is_none());
}

#[test]
fn generated_names_are_unique() {
    let definition = load_str(KITCHEN_SINK).unwrap();
    for aliases in [TS, PY, GO] {
        let schema = prepare(&definition, aliases).unwrap();
        let names: Vec<&str> = schema.generated_type_names().collect();
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }
}

#[test]
fn preparation_is_deterministic() {
    let definition = load_str(KITCHEN_SINK).unwrap();
    let first: Vec<String> = prepare(&definition, TS)
        .unwrap()
        .generated_type_names()
        .map(str::to_string)
        .collect();
    let second: Vec<String> = prepare(&definition, TS)
        .unwrap()
        .generated_type_names()
        .map(str::to_string)
        .collect();
    assert_eq!(first, second);
}

#[test]
fn existing_marker_is_per_language() {
    let definition = load_str(KITCHEN_SINK).unwrap();

    let schema = prepare(&definition, GO).unwrap();
    let op = &schema.services["ExistingTypesService"].operations["specificTypes"];
    assert_eq!(
        op.input,
        Some(TypeReference::Existing {
            name: "example.com/existing.MyExistingType".to_string()
        })
    );
    // Existing types never land in the generated set.
    assert!(!schema
        .generated_type_names()
        .any(|n| n.contains("MyExistingType")));

    let schema = prepare(&definition, TS).unwrap();
    let op = &schema.services["ExistingTypesService"].operations["specificTypes"];
    assert_eq!(
        op.input,
        Some(TypeReference::Existing {
            name: "./types.js#MyExistingType".to_string()
        })
    );
}

#[test]
fn synthesized_collision_fails_naming_both_operations() {
    let definition = load_str(
        r#"
rpcgen: alpha
services:
  BillingService:
    operations:
      runReport:
        input: { type: object, properties: { month: { type: string } } }
      RunReport:
        input: { type: object, properties: { year: { type: integer } } }
"#,
    )
    .unwrap();
    let err = prepare(&definition, TS).unwrap_err();
    match err {
        Error::NameCollision {
            name,
            operation,
            prior_operation,
            ..
        } => {
            assert_eq!(name, "BillingServiceRunReportInput");
            assert_eq!(prior_operation, "runReport");
            assert_eq!(operation, "RunReport");
        }
        other => panic!("expected NameCollision, got {:?}", other),
    }
}

#[test]
fn remote_reference_fails_without_fetching() {
    let definition = load_str(
        r#"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        output: { $ref: "https://schemas.example.com/user.json" }
"#,
    )
    .unwrap();
    let err = prepare(&definition, TS).unwrap_err();
    match err {
        Error::UnresolvableExternalReference {
            service, operation, ..
        } => {
            assert_eq!(service, "Svc");
            assert_eq!(operation, "op");
        }
        other => panic!("expected UnresolvableExternalReference, got {:?}", other),
    }
}

#[test]
fn unnamed_local_ref_falls_through_to_synthesis() {
    // The target has no title and the terminal segment is an array index,
    // so the name comes from the operation context.
    let definition = load_str(
        r##"
rpcgen: alpha
services:
  Svc:
    operations:
      pick:
        input: { $ref: "#/types/Choices/anyOf/0" }
types:
  Choices:
    anyOf:
      - type: object
        properties:
          value: { type: string }
"##,
    )
    .unwrap();
    let schema = prepare(&definition, TS).unwrap();
    let names: Vec<&str> = schema.generated_type_names().collect();
    assert_eq!(names, vec!["SvcPickInput"]);
}

//! Error handling tests for the anonymization engine
//!
//! These tests verify that:
//! - Invalid field matrices fail before anything is written
//! - Missing keys and irreversible types are reported with their object
//! - Collaborator and value errors surface with context

mod common;

use common::{engine_with, engine_without_key, fetch, seeded_backend, setup, ty};
use obscura::adapters::database::{AnonymizedDataStore, Backend};
use obscura::adapters::memory::MemoryBackend;
use obscura::anonymization::anonymizer::TextFieldAnonymizer;
use obscura::anonymization::{
    AnonymizationEngine, AnonymizerRegistry, FieldMatrix, ModelAnonymizer, RegistryBuilder,
    UpdateRequest,
};
use obscura::config::secret_string;
use obscura::domain::{ObjectId, ObscuraError, Record, StoreError};
use serde_json::json;
use std::sync::Arc;
use test_case::test_case;

#[test_case("nickname" ; "plain attribute without anonymizer")]
#[test_case("middle_name" ; "field the record does not have")]
#[test_case("__SELF__" ; "whole record token on a field anonymizer")]
fn test_unknown_field_rejected(field: &str) {
    let (engine, backend) = setup();
    let customer = fetch(&backend, "shop.customer", 1);

    let err = engine.anonymize(&customer, [field]).unwrap_err();

    match err {
        ObscuraError::UnknownField {
            entity_type,
            field: name,
            ..
        } => {
            assert_eq!(entity_type, ty("shop.customer"));
            assert_eq!(name, field);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fetch(&backend, "shop.customer", 1), customer);
}

#[test]
fn test_unknown_nested_field_rejected_before_writes() {
    let (engine, backend) = setup();
    let customer = fetch(&backend, "shop.customer", 1);

    let err = engine
        .anonymize(&customer, FieldMatrix::names(["first_name"]).related("emails", ["address"]))
        .unwrap_err();

    assert!(matches!(
        err,
        ObscuraError::UnknownField { ref entity_type, .. } if entity_type == &ty("shop.email")
    ));
    assert!(!engine.is_field_anonymized(&customer, "first_name").unwrap());
}

#[test]
fn test_relation_to_unregistered_type_rejected() {
    let backend = seeded_backend();
    let registry = RegistryBuilder::new()
        .with(common::customer_anonymizer())
        .unwrap()
        .build();
    let engine = engine_with(registry, &backend);

    let err = engine
        .anonymize(&fetch(&backend, "shop.customer", 1), FieldMatrix::all().related("emails", "__ALL__"))
        .unwrap_err();

    match err {
        ObscuraError::UnknownField { field, reason, .. } => {
            assert_eq!(field, "emails");
            assert!(reason.contains("shop.email"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_absent_declared_relation_is_error() {
    let backend = seeded_backend();
    let registry = RegistryBuilder::new()
        .with(
            ModelAnonymizer::builder(ty("shop.customer"))
                .field("first_name", TextFieldAnonymizer::new())
                .related("spouse", ty("shop.customer"))
                .build(),
        )
        .unwrap()
        .build();
    let engine = engine_with(registry, &backend);

    let err = engine
        .anonymize(&fetch(&backend, "shop.customer", 1), "spouse")
        .unwrap_err();

    assert!(matches!(err, ObscuraError::UnknownField { ref field, .. } if field == "spouse"));
}

#[test]
fn test_missing_key_fails_without_writes() {
    let backend = seeded_backend();
    let engine = engine_without_key(common::registry(), &backend);
    let customer = fetch(&backend, "shop.customer", 1);

    let err = engine.anonymize(&customer, "__ALL__").unwrap_err();

    assert!(matches!(err, ObscuraError::Configuration(_)));
    assert!(err.to_string().contains("shop.customer"));
    assert_eq!(fetch(&backend, "shop.customer", 1), customer);
    assert!(backend
        .markers_for(&ty("shop.customer"), &ObjectId::Int(1))
        .unwrap()
        .is_empty());
}

#[test]
fn test_key_fields_replace_supplied_key() {
    let backend = seeded_backend();
    let registry = RegistryBuilder::new()
        .with(
            ModelAnonymizer::builder(ty("shop.registration"))
                .field("ip_address", obscura::anonymization::anonymizer::IpAddressFieldAnonymizer::new())
                .key_fields(["email"])
                .build(),
        )
        .unwrap()
        .build();
    let engine = engine_without_key(registry, &backend);
    let registration = fetch(&backend, "shop.registration", 60);

    engine.anonymize(&registration, "__ALL__").unwrap();
    let anonymized = fetch(&backend, "shop.registration", 60);
    assert_ne!(anonymized.value("ip_address"), &json!("192.168.1.10"));

    engine.deanonymize(&anonymized, "__ALL__").unwrap();
    assert_eq!(fetch(&backend, "shop.registration", 60), registration);
}

#[test]
fn test_irreversible_type_refuses_deanonymization() {
    let backend = seeded_backend();
    let engine = engine_without_key(common::registry(), &backend);
    let payment = fetch(&backend, "shop.payment", 40);

    // a random secret stands in for the key
    engine.anonymize(&payment, "__ALL__").unwrap();
    let anonymized = fetch(&backend, "shop.payment", 40);
    assert_ne!(anonymized.value("reference"), &json!("INVOICE"));

    let err = engine.deanonymize(&anonymized, "__ALL__").unwrap_err();
    match err {
        ObscuraError::IrreversibleAnonymizer {
            entity_type,
            object_id,
        } => {
            assert_eq!(entity_type, ty("shop.payment"));
            assert_eq!(object_id, ObjectId::Int(40));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fetch(&backend, "shop.payment", 40), anonymized);
}

#[test]
fn test_irreversible_type_inside_traversal() {
    let (engine, backend) = setup();
    let customer = fetch(&backend, "shop.customer", 1);

    let matrix = FieldMatrix::names(["first_name"])
        .related("accounts", FieldMatrix::names(["owner"]).related("payments", "__ALL__"));
    let err = engine.deanonymize(&customer, matrix).unwrap_err();

    assert!(matches!(err, ObscuraError::IrreversibleAnonymizer { .. }));
}

#[test]
fn test_invalid_value_names_field() {
    let (engine, backend) = setup();
    backend
        .insert(
            Record::new(ty("shop.customer"), 5)
                .with("first_name", "Grace")
                .with("email", "not-an-address"),
        )
        .unwrap();

    let err = engine
        .anonymize(&fetch(&backend, "shop.customer", 5), ["first_name", "email"])
        .unwrap_err();

    assert!(matches!(err, ObscuraError::InvalidValue { ref field, .. } if field == "email"));
    assert_eq!(fetch(&backend, "shop.customer", 5).value("first_name"), &json!("Grace"));
}

#[test]
fn test_unregistered_root_type() {
    let (engine, backend) = setup();
    let record = Record::new(ty("shop.invoice"), 1).with("number", "F-1");
    backend.insert(record.clone()).unwrap();

    let err = engine.anonymize(&record, "__ALL__").unwrap_err();
    assert!(matches!(err, ObscuraError::Configuration(_)));
}

#[test]
fn test_update_by_id_missing_record() {
    let (engine, _) = setup();

    let err = engine
        .update_by_id(&ty("shop.customer"), &ObjectId::Int(999), UpdateRequest::anonymize())
        .unwrap_err();

    assert!(matches!(err, ObscuraError::Store(StoreError::NotFound { .. })));
}

#[test]
fn test_fields_parsed_for_other_type() {
    let (engine, backend) = setup();
    let fields = engine
        .parse_fields(&ty("shop.email"), &FieldMatrix::all())
        .unwrap();

    let err = engine
        .update(
            &fetch(&backend, "shop.customer", 1),
            UpdateRequest::anonymize().parsed_fields(fields),
        )
        .unwrap_err();

    assert!(matches!(err, ObscuraError::Validation(_)));
}

#[test]
fn test_duplicate_registration() {
    let err = common::registry_builder()
        .with(
            ModelAnonymizer::builder(ty("shop.email"))
                .field("email", TextFieldAnonymizer::new())
                .build(),
        )
        .unwrap_err();

    assert!(matches!(err, ObscuraError::DuplicateRegistration(ref t) if t == &ty("shop.email")));
}

#[test]
fn test_empty_global_secret() {
    let result = AnonymizationEngine::new(
        Arc::new(AnonymizerRegistry::default()),
        Backend::from_shared(Arc::new(MemoryBackend::new())),
        secret_string(String::new()),
    );

    assert!(matches!(result, Err(ObscuraError::Configuration(_))));
}

#[test]
fn test_no_global_registry_installed() {
    let result = AnonymizationEngine::from_global(
        Backend::from_shared(Arc::new(MemoryBackend::new())),
        secret_string(common::GLOBAL_SECRET.to_string()),
    );

    assert!(matches!(result, Err(ObscuraError::Configuration(_))));
}

//! Integration tests for chunked bulk anonymization
//!
//! These tests verify that:
//! - Records are processed in pk-ordered batches of the anonymizer's chunk size
//! - Checkpoints resume after the last processed pk
//! - Shutdown requests stop the job between batches
//! - Delete anonymizers remove their collection batch by batch

mod common;

use common::{engine_with, ty};
use obscura::adapters::database::{Cardinality, Join, OnDelete, RecordStore, RelationDescriptor};
use obscura::adapters::memory::{EntitySchema, MemoryBackend};
use obscura::anonymization::anonymizer::{IpAddressFieldAnonymizer, TextFieldAnonymizer};
use obscura::anonymization::{AnonymizationEngine, ModelAnonymizer, RegistryBuilder};
use obscura::core::bulk::{BulkAnonymizer, BulkCheckpoint, BulkOptions, BulkStatus, PkCursor};
use obscura::domain::{ObjectId, ObscuraError, Record};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

const REGISTRATIONS: i64 = 25;
const ACCOUNTS: i64 = 12;

fn backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::with_schemas([EntitySchema::new(ty(
        "shop.account",
    ))
    .relation(RelationDescriptor {
        name: "payments".to_string(),
        cardinality: Cardinality::OneToMany,
        related_type: ty("shop.payment"),
        join: Join::Reverse {
            column: "account_id".to_string(),
        },
        on_delete: OnDelete::Cascade,
    })]));

    for pk in 1..=REGISTRATIONS {
        backend
            .insert(
                Record::new(ty("shop.registration"), pk)
                    .with("ip_address", format!("10.0.0.{pk}"))
                    .with("source", "web"),
            )
            .unwrap();
    }
    for pk in 1..=ACCOUNTS {
        backend
            .insert(Record::new(ty("shop.account"), pk).with("owner", format!("Owner {pk}")))
            .unwrap();
        backend
            .insert(
                Record::new(ty("shop.payment"), 100 + pk)
                    .with("account_id", pk)
                    .with("reference", "INVOICE"),
            )
            .unwrap();
    }
    backend
}

fn engine(backend: &Arc<MemoryBackend>) -> Arc<AnonymizationEngine> {
    let registry = RegistryBuilder::new()
        .with(
            ModelAnonymizer::builder(ty("shop.registration"))
                .field("ip_address", IpAddressFieldAnonymizer::new())
                .chunk_size(10)
                .build(),
        )
        .unwrap()
        .with(
            ModelAnonymizer::builder(ty("shop.account"))
                .field("owner", TextFieldAnonymizer::new())
                .delete_kind()
                .chunk_size(5)
                .build(),
        )
        .unwrap()
        .build();
    Arc::new(engine_with(registry, backend))
}

fn anonymized_count(engine: &AnonymizationEngine, backend: &MemoryBackend) -> usize {
    backend
        .records_of(&ty("shop.registration"))
        .unwrap()
        .iter()
        .filter(|r| engine.is_field_anonymized(r, "ip_address").unwrap())
        .count()
}

#[test]
fn test_field_run_processes_every_batch() {
    let backend = backend();
    let engine = engine(&backend);
    let bulk = BulkAnonymizer::new(engine.clone());

    let run = bulk
        .run(&ty("shop.registration"), &BulkOptions::new())
        .unwrap();

    assert_eq!(run.batches, 3);
    assert_eq!(run.objects_updated, REGISTRATIONS as usize);
    assert_eq!(run.fields_changed, REGISTRATIONS as usize);
    assert!(run.errors.is_empty());
    assert_eq!(run.checkpoint.status, BulkStatus::Completed);
    assert_eq!(run.checkpoint.processed, REGISTRATIONS as u64);
    assert_eq!(run.checkpoint.last_pk, Some(ObjectId::Int(REGISTRATIONS)));
    assert_eq!(anonymized_count(&engine, &backend), REGISTRATIONS as usize);
}

#[test]
fn test_second_run_changes_nothing() {
    let backend = backend();
    let bulk = BulkAnonymizer::new(engine(&backend));

    bulk.run(&ty("shop.registration"), &BulkOptions::new()).unwrap();
    let snapshot = backend.records_of(&ty("shop.registration")).unwrap();

    let run = bulk
        .run(&ty("shop.registration"), &BulkOptions::new())
        .unwrap();

    assert_eq!(run.objects_updated, 0);
    assert_eq!(run.fields_changed, 0);
    assert_eq!(backend.records_of(&ty("shop.registration")).unwrap(), snapshot);
}

#[test]
fn test_resume_from_checkpoint() {
    let backend = backend();
    let engine = engine(&backend);
    let bulk = BulkAnonymizer::new(engine.clone());

    let mut checkpoint = BulkCheckpoint::new(ty("shop.registration"));
    checkpoint.advance(Some(ObjectId::Int(20)), 20);
    checkpoint.mark_interrupted();

    let run = bulk
        .run(
            &ty("shop.registration"),
            &BulkOptions::new().resume_from(checkpoint),
        )
        .unwrap();

    assert_eq!(run.batches, 1);
    assert_eq!(run.objects_updated, 5);
    assert_eq!(run.checkpoint.processed, REGISTRATIONS as u64);
    assert!(run.checkpoint.is_completed());

    let untouched = backend
        .get(&ty("shop.registration"), &ObjectId::Int(20))
        .unwrap()
        .unwrap();
    assert_eq!(untouched.value("ip_address"), &json!("10.0.0.20"));
    assert_eq!(anonymized_count(&engine, &backend), 5);
}

#[test]
fn test_completed_checkpoint_is_noop() {
    let backend = backend();
    let engine = engine(&backend);
    let bulk = BulkAnonymizer::new(engine.clone());

    let mut checkpoint = BulkCheckpoint::new(ty("shop.registration"));
    checkpoint.mark_completed();

    let run = bulk
        .run(
            &ty("shop.registration"),
            &BulkOptions::new().resume_from(checkpoint),
        )
        .unwrap();

    assert_eq!(run.batches, 0);
    assert_eq!(anonymized_count(&engine, &backend), 0);
}

#[test]
fn test_checkpoint_of_other_type_rejected() {
    let backend = backend();
    let bulk = BulkAnonymizer::new(engine(&backend));

    let err = bulk
        .run(
            &ty("shop.registration"),
            &BulkOptions::new().resume_from(BulkCheckpoint::new(ty("shop.account"))),
        )
        .unwrap_err();

    assert!(matches!(err, ObscuraError::Validation(_)));
}

#[test]
fn test_shutdown_stops_before_next_batch() {
    let backend = backend();
    let engine = engine(&backend);
    let bulk = BulkAnonymizer::new(engine.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let run = bulk
        .run(
            &ty("shop.registration"),
            &BulkOptions::new().with_shutdown(shutdown_rx),
        )
        .unwrap();

    assert!(run.is_interrupted());
    assert_eq!(run.batches, 0);
    assert_eq!(run.checkpoint.status, BulkStatus::Interrupted);
    assert_eq!(anonymized_count(&engine, &backend), 0);
}

#[test]
fn test_interrupted_checkpoint_resumes_to_completion() {
    let backend = backend();
    let engine = engine(&backend);
    let bulk = BulkAnonymizer::new(engine.clone());
    let (_shutdown_tx, shutdown_rx) = watch::channel(true);

    let interrupted = bulk
        .run(
            &ty("shop.registration"),
            &BulkOptions::new().with_shutdown(shutdown_rx),
        )
        .unwrap();
    assert!(interrupted.is_interrupted());

    let resumed = bulk
        .run(
            &ty("shop.registration"),
            &BulkOptions::new().resume_from(interrupted.checkpoint),
        )
        .unwrap();

    assert!(resumed.checkpoint.is_completed());
    assert_eq!(anonymized_count(&engine, &backend), REGISTRATIONS as usize);
}

#[test]
fn test_delete_run_removes_collection_in_batches() {
    let backend = backend();
    let bulk = BulkAnonymizer::new(engine(&backend));

    let run = bulk.run(&ty("shop.account"), &BulkOptions::new()).unwrap();

    // 12 accounts in chunks of 5, payments removed by cascade
    assert_eq!(run.batches, 3);
    assert_eq!(run.records_removed, (ACCOUNTS * 2) as usize);
    assert_eq!(run.checkpoint.processed, ACCOUNTS as u64);
    assert!(run.checkpoint.is_completed());
    assert!(backend.records_of(&ty("shop.account")).unwrap().is_empty());
    assert!(backend.records_of(&ty("shop.payment")).unwrap().is_empty());
}

#[test]
fn test_run_all_in_registration_order() {
    let backend = backend();
    let bulk = BulkAnonymizer::new(engine(&backend));

    let summary = bulk.run_all(None, &BulkOptions::new()).unwrap();

    let types: Vec<&str> = summary.runs.iter().map(|r| r.entity_type().as_str()).collect();
    assert_eq!(types, vec!["shop.registration", "shop.account"]);
    assert!(summary.is_successful());
    assert!(!summary.interrupted);
    assert_eq!(summary.total_processed(), (REGISTRATIONS + ACCOUNTS) as u64);
    assert_eq!(summary.total_fields_changed(), REGISTRATIONS as usize);
    assert_eq!(summary.total_records_removed(), (ACCOUNTS * 2) as usize);
}

#[test]
fn test_run_all_restricted_to_types() {
    let backend = backend();
    let bulk = BulkAnonymizer::new(engine(&backend));

    let only = [ty("shop.account"), ty("shop.unknown")];
    let summary = bulk.run_all(Some(&only), &BulkOptions::new()).unwrap();

    assert_eq!(summary.runs.len(), 1);
    assert_eq!(summary.runs[0].entity_type(), &ty("shop.account"));
    assert_eq!(backend.records_of(&ty("shop.registration")).unwrap().len(), REGISTRATIONS as usize);
}

#[test]
fn test_run_all_stops_on_shutdown() {
    let backend = backend();
    let bulk = BulkAnonymizer::new(engine(&backend));
    let (_shutdown_tx, shutdown_rx) = watch::channel(true);

    let summary = bulk
        .run_all(None, &BulkOptions::new().with_shutdown(shutdown_rx))
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.runs.len(), 1);
    assert!(!backend.records_of(&ty("shop.account")).unwrap().is_empty());
}

#[test]
fn test_cursor_walks_store_in_pk_order() {
    let backend = backend();
    let mut cursor = PkCursor::new(ty("shop.registration"), 10);

    let mut seen = Vec::new();
    loop {
        let batch = cursor.next_batch(backend.as_ref()).unwrap();
        if batch.is_empty() {
            break;
        }
        seen.extend(batch.into_iter().map(|r| r.pk));
    }

    let expected: Vec<ObjectId> = (1..=REGISTRATIONS).map(ObjectId::Int).collect();
    assert_eq!(seen, expected);
    assert!(cursor.is_exhausted());
}

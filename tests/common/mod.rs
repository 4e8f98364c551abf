//! Shared fixture for the integration tests
//!
//! A small shop: customers with e-mails, addresses, accounts (deleted rather
//! than anonymized) and their payments, generic notes and registrations
//! found by e-mail.

#![allow(dead_code)]

use obscura::adapters::database::{
    Backend, Cardinality, Join, OnDelete, RecordStore, RelationDescriptor, SortOrder,
};
use obscura::adapters::memory::{EntitySchema, MemoryBackend, PropertyDefinition, PropertyPick};
use obscura::anonymization::anonymizer::{
    DateFieldAnonymizer, EmailFieldAnonymizer, HashFieldAnonymizer, IpAddressFieldAnonymizer,
    NumericFieldAnonymizer, TextFieldAnonymizer,
};
use obscura::anonymization::{
    AnonymizationEngine, AnonymizerRegistry, ModelAnonymizer, RegistryBuilder, RelationAnonymizer,
};
use obscura::config::secret_string;
use obscura::domain::{EntityType, HistoryEntry, ObjectId, Record};
use serde_json::json;
use std::sync::Arc;

pub const GLOBAL_SECRET: &str = "integration-global-secret";
pub const BASE_KEY: &str = "integration-job-key";

pub fn ty(name: &str) -> EntityType {
    EntityType::new(name).unwrap()
}

fn reverse(name: &str, related: &str, column: &str, on_delete: OnDelete) -> RelationDescriptor {
    RelationDescriptor {
        name: name.to_string(),
        cardinality: Cardinality::OneToMany,
        related_type: ty(related),
        join: Join::Reverse {
            column: column.to_string(),
        },
        on_delete,
    }
}

pub fn schemas() -> Vec<EntitySchema> {
    vec![
        EntitySchema::new(ty("shop.customer"))
            .relation(reverse("emails", "shop.email", "customer_id", OnDelete::Cascade))
            .relation(reverse("addresses", "shop.address", "customer_id", OnDelete::Cascade))
            .relation(reverse("accounts", "shop.account", "customer_id", OnDelete::SetNull))
            .property(PropertyDefinition {
                name: "registrations".to_string(),
                target_type: ty("shop.registration"),
                source_column: "email".to_string(),
                match_column: "email".to_string(),
                order: SortOrder::PkAsc,
                pick: PropertyPick::All,
            })
            .property(PropertyDefinition {
                name: "latest_registration".to_string(),
                target_type: ty("shop.registration"),
                source_column: "email".to_string(),
                match_column: "email".to_string(),
                order: SortOrder::PkAsc,
                pick: PropertyPick::Last,
            }),
        EntitySchema::new(ty("shop.email")).relation(RelationDescriptor {
            name: "customer".to_string(),
            cardinality: Cardinality::ManyToOne,
            related_type: ty("shop.customer"),
            join: Join::Forward {
                column: "customer_id".to_string(),
            },
            on_delete: OnDelete::DoNothing,
        }),
        EntitySchema::new(ty("shop.account")).relation(reverse(
            "payments",
            "shop.payment",
            "account_id",
            OnDelete::Cascade,
        )),
    ]
}

/// Backend holding the fixture records and one history entry per customer
pub fn seeded_backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::with_schemas(schemas()));
    for record in records() {
        backend.insert(record).unwrap();
    }
    backend
        .push_history(
            HistoryEntry::new(ty("shop.customer"), ObjectId::Int(1))
                .with_change("first_name", json!(null), json!("Ada"))
                .with_change("nickname", json!(null), json!("countess")),
        )
        .unwrap();
    backend
        .push_history(
            HistoryEntry::new(ty("shop.account"), ObjectId::Int(30)).with_change(
                "owner",
                json!(null),
                json!("Ada Lovelace"),
            ),
        )
        .unwrap();
    backend
}

fn records() -> Vec<Record> {
    vec![
        Record::new(ty("shop.customer"), 1)
            .with("first_name", "Ada")
            .with("last_name", "Lovelace")
            .with("email", "ada@example.com")
            .with("birth_date", "1815-12-10")
            .with("nickname", "countess"),
        Record::new(ty("shop.customer"), 2)
            .with("first_name", "Charles")
            .with("last_name", "Babbage")
            .with("email", "charles@example.com")
            .with("birth_date", "1791-12-26")
            .with("nickname", "difference"),
        Record::new(ty("shop.email"), 10)
            .with("customer_id", 1)
            .with("email", "ada@example.com"),
        Record::new(ty("shop.email"), 11)
            .with("customer_id", 1)
            .with("email", "countess@analytical.org"),
        Record::new(ty("shop.email"), 12)
            .with("customer_id", 2)
            .with("email", "charles@example.com"),
        Record::new(ty("shop.address"), 20)
            .with("customer_id", 1)
            .with("street", "Saint James Square")
            .with("city", "London"),
        Record::new(ty("shop.account"), 30)
            .with("customer_id", 1)
            .with("owner", "Ada Lovelace"),
        Record::new(ty("shop.account"), 31)
            .with("customer_id", 2)
            .with("owner", "Charles Babbage"),
        Record::new(ty("shop.payment"), 40)
            .with("account_id", 30)
            .with("reference", "INVOICE")
            .with("amount", 1200),
        Record::new(ty("shop.payment"), 41)
            .with("account_id", 31)
            .with("reference", "REFUND")
            .with("amount", 80),
        Record::new(ty("shop.note"), 50)
            .with("content_type", "shop.customer")
            .with("object_id", 1)
            .with("text", "prefers letters")
            .with("author", "Mary Somerville"),
        Record::new(ty("shop.note"), 51)
            .with("content_type", "shop.account")
            .with("object_id", 1)
            .with("text", "unrelated")
            .with("author", "Augustus De Morgan"),
        Record::new(ty("shop.registration"), 60)
            .with("email", "ada@example.com")
            .with("ip_address", "192.168.1.10"),
        Record::new(ty("shop.registration"), 61)
            .with("email", "ada@example.com")
            .with("ip_address", "10.0.0.5"),
        Record::new(ty("shop.registration"), 62)
            .with("email", "charles@example.com")
            .with("ip_address", "172.16.0.1"),
    ]
}

pub fn customer_anonymizer() -> ModelAnonymizer {
    ModelAnonymizer::builder(ty("shop.customer"))
        .field("first_name", TextFieldAnonymizer::new())
        .field("last_name", TextFieldAnonymizer::new())
        .field("email", EmailFieldAnonymizer::new())
        .field("birth_date", DateFieldAnonymizer::new())
        .relation(
            "notes",
            RelationAnonymizer::reverse_generic(ty("shop.note"), "content_type", "object_id"),
        )
        .anonymize_history(true)
        .build()
}

/// Registry builder with one anonymizer per fixture type
pub fn registry_builder() -> RegistryBuilder {
    RegistryBuilder::new()
        .with(customer_anonymizer())
        .unwrap()
        .with(
            ModelAnonymizer::builder(ty("shop.email"))
                .field("email", EmailFieldAnonymizer::new())
                .build(),
        )
        .unwrap()
        .with(
            ModelAnonymizer::builder(ty("shop.address"))
                .field("street", TextFieldAnonymizer::new())
                .field("city", TextFieldAnonymizer::new())
                .build(),
        )
        .unwrap()
        .with(
            ModelAnonymizer::builder(ty("shop.account"))
                .field("owner", TextFieldAnonymizer::new())
                .delete_kind()
                .delete_history(true)
                .build(),
        )
        .unwrap()
        .with(
            ModelAnonymizer::builder(ty("shop.payment"))
                .field("reference", TextFieldAnonymizer::new())
                .field("amount", NumericFieldAnonymizer::new())
                .reversible(false)
                .build(),
        )
        .unwrap()
        .with(
            ModelAnonymizer::builder(ty("shop.note"))
                .field("text", TextFieldAnonymizer::new())
                .field("author", HashFieldAnonymizer::new())
                .build(),
        )
        .unwrap()
        .with(
            ModelAnonymizer::builder(ty("shop.registration"))
                .field("ip_address", IpAddressFieldAnonymizer::new())
                .build(),
        )
        .unwrap()
}

pub fn registry() -> AnonymizerRegistry {
    registry_builder().build()
}

/// Engine over `backend` without a default base key
pub fn engine_without_key(
    registry: AnonymizerRegistry,
    backend: &Arc<MemoryBackend>,
) -> AnonymizationEngine {
    AnonymizationEngine::new(
        Arc::new(registry),
        Backend::from_shared(backend.clone()),
        secret_string(GLOBAL_SECRET.to_string()),
    )
    .unwrap()
}

/// Engine over `backend` with [`BASE_KEY`] as default base key
pub fn engine_with(registry: AnonymizerRegistry, backend: &Arc<MemoryBackend>) -> AnonymizationEngine {
    engine_without_key(registry, backend).with_base_key(secret_string(BASE_KEY.to_string()))
}

/// The standard fixture
pub fn setup() -> (AnonymizationEngine, Arc<MemoryBackend>) {
    let backend = seeded_backend();
    (engine_with(registry(), &backend), backend)
}

pub fn fetch(backend: &MemoryBackend, name: &str, pk: i64) -> Record {
    try_fetch(backend, name, pk).unwrap_or_else(|| panic!("{name} {pk} is missing"))
}

pub fn try_fetch(backend: &MemoryBackend, name: &str, pk: i64) -> Option<Record> {
    backend.get(&ty(name), &ObjectId::Int(pk)).unwrap()
}

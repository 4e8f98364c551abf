//! Declarative anonymizer definitions
//!
//! `[[anonymizers]]` tables of the configuration file describe model
//! anonymizers without code. [`build_registry`] turns them into a
//! [`RegistryBuilder`], so code-defined anonymizers can still be added
//! before the registry is frozen.

use super::anonymizer::{
    DateFieldAnonymizer, DecimalFieldAnonymizer, EmailFieldAnonymizer, EmptyValuePolicy,
    FieldAnonymizer, HashFieldAnonymizer, IpAddressFieldAnonymizer, MaskFieldAnonymizer,
    NoOpFieldAnonymizer, NumericFieldAnonymizer, PhoneNumberFieldAnonymizer,
    RandomTextFieldAnonymizer, StaticValueFieldAnonymizer, TextFieldAnonymizer,
};
use super::model::{AnonymizerKind, ModelAnonymizer};
use super::registry::RegistryBuilder;
use super::relation::RelationAnonymizer;
use crate::domain::{EntityType, ObscuraError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Field anonymizer and its options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldAnonymizerKind {
    Text,
    Email,
    Phone {
        #[serde(default)]
        keep_prefix_digits: Option<usize>,
    },
    Numeric {
        #[serde(default)]
        max_anonymization_range: Option<u64>,
    },
    Decimal {
        #[serde(default)]
        decimal_places: Option<u32>,
        #[serde(default)]
        max_anonymization_range: Option<u64>,
    },
    Date {
        #[serde(default)]
        max_days_shift: Option<u32>,
    },
    IpAddress,
    Hash,
    Mask {
        #[serde(default)]
        keep_prefix: Option<usize>,
        #[serde(default)]
        keep_suffix: Option<usize>,
        #[serde(default)]
        mask_char: Option<char>,
    },
    RandomText,
    StaticValue {
        value: Value,
    },
    #[serde(rename = "noop")]
    NoOp,
}

/// One `[anonymizers.fields.<name>]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(flatten)]
    pub anonymizer: FieldAnonymizerKind,

    #[serde(flatten)]
    pub empty: EmptyValuePolicy,
}

impl FieldDefinition {
    /// Instantiate the field anonymizer
    pub fn build(&self) -> Arc<dyn FieldAnonymizer> {
        let empty = self.empty.clone();
        match &self.anonymizer {
            FieldAnonymizerKind::Text => Arc::new(TextFieldAnonymizer::new().with_empty_values(empty)),
            FieldAnonymizerKind::Email => Arc::new(EmailFieldAnonymizer::new().with_empty_values(empty)),
            FieldAnonymizerKind::Phone { keep_prefix_digits } => {
                let mut anonymizer = PhoneNumberFieldAnonymizer::new().with_empty_values(empty);
                if let Some(count) = keep_prefix_digits {
                    anonymizer = anonymizer.keep_prefix_digits(*count);
                }
                Arc::new(anonymizer)
            }
            FieldAnonymizerKind::Numeric {
                max_anonymization_range,
            } => {
                let mut anonymizer = NumericFieldAnonymizer::new().with_empty_values(empty);
                if let Some(range) = max_anonymization_range {
                    anonymizer = anonymizer.max_anonymization_range(*range);
                }
                Arc::new(anonymizer)
            }
            FieldAnonymizerKind::Decimal {
                decimal_places,
                max_anonymization_range,
            } => {
                let mut anonymizer = DecimalFieldAnonymizer::new().with_empty_values(empty);
                if let Some(places) = decimal_places {
                    anonymizer = anonymizer.decimal_places(*places);
                }
                if let Some(range) = max_anonymization_range {
                    anonymizer = anonymizer.max_anonymization_range(*range);
                }
                Arc::new(anonymizer)
            }
            FieldAnonymizerKind::Date { max_days_shift } => {
                let mut anonymizer = DateFieldAnonymizer::new().with_empty_values(empty);
                if let Some(days) = max_days_shift {
                    anonymizer = anonymizer.max_days_shift(*days);
                }
                Arc::new(anonymizer)
            }
            FieldAnonymizerKind::IpAddress => {
                Arc::new(IpAddressFieldAnonymizer::new().with_empty_values(empty))
            }
            FieldAnonymizerKind::Hash => Arc::new(HashFieldAnonymizer::new().with_empty_values(empty)),
            FieldAnonymizerKind::Mask {
                keep_prefix,
                keep_suffix,
                mask_char,
            } => {
                let mut anonymizer = MaskFieldAnonymizer::new().with_empty_values(empty);
                if let Some(count) = keep_prefix {
                    anonymizer = anonymizer.keep_prefix(*count);
                }
                if let Some(count) = keep_suffix {
                    anonymizer = anonymizer.keep_suffix(*count);
                }
                if let Some(mask) = mask_char {
                    anonymizer = anonymizer.mask_char(*mask);
                }
                Arc::new(anonymizer)
            }
            FieldAnonymizerKind::RandomText => {
                Arc::new(RandomTextFieldAnonymizer::new().with_empty_values(empty))
            }
            FieldAnonymizerKind::StaticValue { value } => {
                Arc::new(StaticValueFieldAnonymizer::new(value.clone()).with_empty_values(empty))
            }
            FieldAnonymizerKind::NoOp => Arc::new(NoOpFieldAnonymizer::new()),
        }
    }
}

/// How a generic relation finds its records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenericRelationKind {
    /// Related records point back through content type and object id columns
    ReverseGeneric {
        content_type_column: String,
        object_id_column: String,
    },
    /// The owner points at one record through content type and object id columns
    GenericForeignKey {
        content_type_column: String,
        object_id_column: String,
    },
    /// Related records whose `match_column` equals the owner's `source_column`
    Query {
        source_column: String,
        match_column: String,
    },
}

/// One `[[anonymizers.generic_relations]]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericRelationDefinition {
    /// Relation name used in field matrices
    pub name: String,

    /// Entity type of the related records
    pub related_type: EntityType,

    #[serde(flatten)]
    pub resolver: GenericRelationKind,
}

impl GenericRelationDefinition {
    /// Instantiate the relation anonymizer
    pub fn build(&self) -> RelationAnonymizer {
        let related_type = self.related_type.clone();
        match &self.resolver {
            GenericRelationKind::ReverseGeneric {
                content_type_column,
                object_id_column,
            } => RelationAnonymizer::reverse_generic(
                related_type,
                content_type_column.as_str(),
                object_id_column.as_str(),
            ),
            GenericRelationKind::GenericForeignKey {
                content_type_column,
                object_id_column,
            } => RelationAnonymizer::generic_foreign_key(
                related_type,
                content_type_column.as_str(),
                object_id_column.as_str(),
            ),
            GenericRelationKind::Query {
                source_column,
                match_column,
            } => RelationAnonymizer::query(related_type, source_column.as_str(), match_column.as_str()),
        }
    }
}

/// One `[[anonymizers]]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizerDefinition {
    /// Entity type handled
    pub entity_type: EntityType,

    /// Anonymizer kind (inherited or `fields` when unset)
    #[serde(default)]
    pub kind: Option<AnonymizerKind>,

    #[serde(default)]
    pub reversible: Option<bool>,

    #[serde(default)]
    pub anonymize_history: Option<bool>,

    #[serde(default)]
    pub delete_history: Option<bool>,

    /// Abstract definitions are only used as `extends` parents
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Entity type of an earlier definition to inherit from
    #[serde(default)]
    pub extends: Option<EntityType>,

    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Record fields forming the per-object key
    #[serde(default)]
    pub key_fields: Vec<String>,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,

    /// Relation name to the entity type whose registered anonymizer handles it
    #[serde(default)]
    pub relations: BTreeMap<String, EntityType>,

    #[serde(default)]
    pub generic_relations: Vec<GenericRelationDefinition>,
}

impl AnonymizerDefinition {
    /// Build the model anonymizer, resolving `extends` against `parents`
    pub fn build(
        &self,
        parents: &HashMap<EntityType, ModelAnonymizer>,
        default_chunk_size: usize,
    ) -> Result<ModelAnonymizer> {
        let mut builder = ModelAnonymizer::builder(self.entity_type.clone());

        match &self.extends {
            Some(parent_type) => {
                let parent = parents.get(parent_type).ok_or_else(|| {
                    ObscuraError::Configuration(format!(
                        "Anonymizer for {} extends {}, which is not defined before it",
                        self.entity_type, parent_type
                    ))
                })?;
                builder = builder.extends(parent);
            }
            None => builder = builder.chunk_size(default_chunk_size),
        }

        if let Some(kind) = self.kind {
            builder = builder.kind(kind);
        }
        if let Some(reversible) = self.reversible {
            builder = builder.reversible(reversible);
        }
        if let Some(enabled) = self.anonymize_history {
            builder = builder.anonymize_history(enabled);
        }
        if let Some(enabled) = self.delete_history {
            builder = builder.delete_history(enabled);
        }
        if let Some(chunk_size) = self.chunk_size {
            builder = builder.chunk_size(chunk_size);
        }
        if self.is_abstract {
            builder = builder.abstract_anonymizer();
        }
        if !self.key_fields.is_empty() {
            builder = builder.key_fields(self.key_fields.iter().cloned());
        }

        for (name, field) in &self.fields {
            builder = builder.field_arc(name.clone(), field.build());
        }
        for (name, related_type) in &self.relations {
            builder = builder.related(name.clone(), related_type.clone());
        }
        for relation in &self.generic_relations {
            builder = builder.relation(relation.name.clone(), relation.build());
        }

        Ok(builder.build())
    }
}

/// Build every definition into a registry builder
///
/// Definitions are processed in order; `extends` may only name an earlier
/// definition. Abstract definitions are built but not registered.
pub fn build_registry(
    definitions: &[AnonymizerDefinition],
    default_chunk_size: usize,
) -> Result<RegistryBuilder> {
    let mut built: HashMap<EntityType, ModelAnonymizer> = HashMap::new();
    let mut builder = RegistryBuilder::new();

    for definition in definitions {
        let anonymizer = definition.build(&built, default_chunk_size)?;
        builder.register(anonymizer.clone())?;
        built.insert(definition.entity_type.clone(), anonymizer);
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Record;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Definitions {
        anonymizers: Vec<AnonymizerDefinition>,
    }

    fn ty(name: &str) -> EntityType {
        EntityType::new(name).unwrap()
    }

    fn parse(toml_str: &str) -> Vec<AnonymizerDefinition> {
        toml::from_str::<Definitions>(toml_str).unwrap().anonymizers
    }

    const SHOP: &str = r#"
[[anonymizers]]
entity_type = "shop.person"
abstract = true
anonymize_history = true

[anonymizers.fields.first_name]
type = "text"

[anonymizers.fields.phone]
type = "phone"
keep_prefix_digits = 3

[[anonymizers]]
entity_type = "shop.customer"
extends = "shop.person"
key_fields = ["first_name"]

[anonymizers.fields.email]
type = "email"
empty_values = ["", "n/a"]

[anonymizers.relations]
emails = "shop.email"

[[anonymizers.generic_relations]]
name = "notes"
related_type = "shop.note"
kind = "reverse_generic"
content_type_column = "content_type"
object_id_column = "object_id"

[[anonymizers]]
entity_type = "shop.account"
kind = "delete"
delete_history = true
chunk_size = 50
"#;

    #[test]
    fn test_parse_definitions() {
        let definitions = parse(SHOP);
        assert_eq!(definitions.len(), 3);
        assert!(definitions[0].is_abstract);
        assert_eq!(
            definitions[0].fields["phone"].anonymizer,
            FieldAnonymizerKind::Phone {
                keep_prefix_digits: Some(3)
            }
        );
        assert!(definitions[0].fields["first_name"].empty.ignore_empty_values);
        assert_eq!(
            definitions[1].fields["email"].empty.empty_values,
            vec![json!(""), json!("n/a")]
        );
        assert_eq!(definitions[2].kind, Some(AnonymizerKind::Delete));
    }

    #[test]
    fn test_build_registry_with_inheritance() {
        let registry = build_registry(&parse(SHOP), 200).unwrap().build();

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&ty("shop.person")).is_none());

        let customer = registry.get(&ty("shop.customer")).unwrap();
        assert!(customer.has_field("first_name"));
        assert!(customer.has_field("phone"));
        assert!(customer.has_field("email"));
        assert!(customer.relation("emails").is_some());
        assert!(customer.relation("notes").is_some());
        assert!(customer.options().anonymize_history);
        assert!(!customer.is_abstract());
        assert!(customer.has_key_source());

        let record = Record::new(ty("shop.customer"), 1).with("first_name", "Ada");
        assert_eq!(customer.key_override(&record).as_deref(), Some("Ada"));

        let account = registry.get(&ty("shop.account")).unwrap();
        assert!(account.is_delete());
        assert_eq!(account.chunk_size(), 50);
    }

    #[test]
    fn test_default_chunk_size_applies_without_parent() {
        let definitions = parse(
            r#"
[[anonymizers]]
entity_type = "shop.email"

[anonymizers.fields.email]
type = "email"
"#,
        );
        let registry = build_registry(&definitions, 200).unwrap().build();
        assert_eq!(registry.get(&ty("shop.email")).unwrap().chunk_size(), 200);
    }

    #[test]
    fn test_extends_must_be_defined_first() {
        let definitions = parse(
            r#"
[[anonymizers]]
entity_type = "shop.customer"
extends = "shop.person"
"#,
        );
        let err = build_registry(&definitions, 100).unwrap_err();
        assert!(matches!(err, ObscuraError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let definitions = parse(
            r#"
[[anonymizers]]
entity_type = "shop.email"

[[anonymizers]]
entity_type = "shop.email"
"#,
        );
        let err = build_registry(&definitions, 100).unwrap_err();
        assert!(matches!(err, ObscuraError::DuplicateRegistration(_)));
    }

    #[test]
    fn test_static_value_and_mask_build() {
        let definitions = parse(
            r##"
[[anonymizers]]
entity_type = "shop.contact_form"

[anonymizers.fields.attachment]
type = "static_value"
value = "/files/anonymized.txt"

[anonymizers.fields.card]
type = "mask"
keep_suffix = 4
mask_char = "#"

[anonymizers.fields.ip]
type = "ip_address"

[anonymizers.fields.internal]
type = "noop"
"##,
        );
        let registry = build_registry(&definitions, 100).unwrap().build();
        let form = registry.get(&ty("shop.contact_form")).unwrap();

        let static_value = form.field("attachment").unwrap();
        assert_eq!(
            static_value.anonymize_value(&json!("cv.pdf"), "key").unwrap(),
            json!("/files/anonymized.txt")
        );

        let mask = form.field("card").unwrap();
        assert_eq!(
            mask.anonymize_value(&json!("4111222233334444"), "key").unwrap(),
            json!("############4444")
        );
        assert_eq!(form.field("internal").unwrap().name(), "noop");
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        let result = toml::from_str::<Definitions>(
            r#"
[[anonymizers]]
entity_type = "shop.email"

[anonymizers.fields.email]
type = "rot13"
"#,
        );
        assert!(result.is_err());
    }
}

//! Field-set parsing
//!
//! A [`FieldMatrix`] is the compact declarative form of "which fields and
//! relations to process": the `__ALL__` token, or a list whose entries are
//! plain names or `(relation, nested matrix)` pairs. [`FieldsParser`] turns
//! it into a [`Fields`] tree scoped to a model anonymizer, resolving every
//! related entry to the anonymizer that governs the related type.
//!
//! Parsing is pure: it reads the registry and schema reflection only, never
//! record state.

use super::model::{ModelAnonymizer, RelatedAnonymizer};
use super::registry::AnonymizerRegistry;
use crate::adapters::database::SchemaReflection;
use crate::domain::{EntityType, ObscuraError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Token selecting every field declared by an anonymizer
pub const ALL_FIELDS: &str = "__ALL__";

/// Token selecting the whole record (delete anonymizers only)
pub const DELETE_TOKEN: &str = "__SELF__";

/// Declarative field selection
///
/// Deserializes from `"__ALL__"` or from a list such as
/// `["first_name", ["emails", ["email"]]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMatrix {
    /// A single token; anything other than `__ALL__` names one field
    Token(String),
    /// A list of entries
    Entries(Vec<FieldEntry>),
}

/// One entry of a [`FieldMatrix`] list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldEntry {
    /// A local field, a relation (implying `__ALL__`) or a token
    Name(String),
    /// A relation with its nested selection
    Related(String, FieldMatrix),
}

impl FieldMatrix {
    /// `__ALL__`
    pub fn all() -> Self {
        FieldMatrix::Token(ALL_FIELDS.to_string())
    }

    /// A flat list of names
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldMatrix::Entries(names.into_iter().map(|n| FieldEntry::Name(n.into())).collect())
    }

    /// Adds a relation entry (builder style)
    pub fn related(self, name: impl Into<String>, nested: impl Into<FieldMatrix>) -> Self {
        let mut entries = match self {
            FieldMatrix::Token(token) => vec![FieldEntry::Name(token)],
            FieldMatrix::Entries(entries) => entries,
        };
        entries.push(FieldEntry::Related(name.into(), nested.into()));
        FieldMatrix::Entries(entries)
    }

    fn entries(&self) -> Vec<FieldEntry> {
        match self {
            FieldMatrix::Token(token) => vec![FieldEntry::Name(token.clone())],
            FieldMatrix::Entries(entries) => entries.clone(),
        }
    }
}

impl From<&str> for FieldMatrix {
    fn from(token: &str) -> Self {
        FieldMatrix::Token(token.to_string())
    }
}

impl From<Vec<FieldEntry>> for FieldMatrix {
    fn from(entries: Vec<FieldEntry>) -> Self {
        FieldMatrix::Entries(entries)
    }
}

impl<const N: usize> From<[&str; N]> for FieldMatrix {
    fn from(names: [&str; N]) -> Self {
        FieldMatrix::names(names)
    }
}

impl From<&str> for FieldEntry {
    fn from(name: &str) -> Self {
        FieldEntry::Name(name.to_string())
    }
}

impl<S, M> From<(S, M)> for FieldEntry
where
    S: Into<String>,
    M: Into<FieldMatrix>,
{
    fn from((name, nested): (S, M)) -> Self {
        FieldEntry::Related(name.into(), nested.into())
    }
}

/// Parsed field selection of one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct Fields {
    /// Entity type the selection applies to
    pub entity_type: EntityType,
    /// Local fields (and `__SELF__`)
    pub local_fields: BTreeSet<String>,
    /// Related selections, in declaration order
    pub related_fields: Vec<RelatedFields>,
}

/// Nested selection reached through a relation
#[derive(Debug, Clone)]
pub struct RelatedFields {
    /// Relation name on the owning type
    pub name: String,
    /// Selection applied to the related records
    pub fields: Fields,
    /// Anonymizer of the related records
    pub anonymizer: Arc<ModelAnonymizer>,
}

impl PartialEq for RelatedFields {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.fields == other.fields
            && self.anonymizer.entity_type() == other.anonymizer.entity_type()
    }
}

impl Fields {
    /// Empty selection
    pub fn empty(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            local_fields: BTreeSet::new(),
            related_fields: Vec::new(),
        }
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.local_fields.is_empty() && self.related_fields.is_empty()
    }

    /// Whether the whole record is selected
    pub fn has_delete_token(&self) -> bool {
        self.local_fields.contains(DELETE_TOKEN)
    }

    /// Nested selection of a relation
    pub fn related(&self, name: &str) -> Option<&RelatedFields> {
        self.related_fields.iter().find(|r| r.name == name)
    }

    /// Copy of this selection without one local field
    pub fn without_local(&self, name: &str) -> Fields {
        let mut fields = self.clone();
        fields.local_fields.remove(name);
        fields
    }

    /// Every field name in the tree, relations as `relation.field`
    pub fn flatten(&self) -> Vec<String> {
        let mut names: Vec<String> = self.local_fields.iter().cloned().collect();
        for related in &self.related_fields {
            names.extend(
                related
                    .fields
                    .flatten()
                    .into_iter()
                    .map(|nested| format!("{}.{}", related.name, nested)),
            );
        }
        names
    }
}

/// Parses field matrices against a registry and schema
pub struct FieldsParser<'a> {
    registry: &'a AnonymizerRegistry,
    schema: &'a dyn SchemaReflection,
}

impl<'a> FieldsParser<'a> {
    /// Creates a parser
    pub fn new(registry: &'a AnonymizerRegistry, schema: &'a dyn SchemaReflection) -> Self {
        Self { registry, schema }
    }

    /// Parses `matrix` for records governed by `anonymizer`
    pub fn parse(&self, anonymizer: &Arc<ModelAnonymizer>, matrix: &FieldMatrix) -> Result<Fields> {
        let entity_type = anonymizer.entity_type();
        let mut fields = Fields::empty(entity_type.clone());

        for entry in matrix.entries() {
            match entry {
                FieldEntry::Name(name) if name == ALL_FIELDS => {
                    fields
                        .local_fields
                        .extend(anonymizer.field_names().map(str::to_string));
                }
                FieldEntry::Name(name) if name == DELETE_TOKEN => {
                    if !anonymizer.is_delete() {
                        return Err(ObscuraError::unknown_field(
                            entity_type,
                            name,
                            "only delete anonymizers accept the whole-record token",
                        ));
                    }
                    fields.local_fields.insert(name);
                }
                FieldEntry::Name(name) => {
                    if anonymizer.has_field(&name) {
                        fields.local_fields.insert(name);
                    } else if let Some(related) = self.resolve_related(anonymizer, &name)? {
                        let nested = self.parse(&related, &FieldMatrix::all())?;
                        push_related(&mut fields, name, nested, related);
                    } else {
                        return Err(ObscuraError::unknown_field(
                            entity_type,
                            name,
                            "no field anonymizer, relation or property",
                        ));
                    }
                }
                FieldEntry::Related(name, nested) => {
                    let Some(related) = self.resolve_related(anonymizer, &name)? else {
                        return Err(ObscuraError::unknown_field(
                            entity_type,
                            name,
                            "not a relation or property",
                        ));
                    };
                    let nested = self.parse(&related, &nested)?;
                    push_related(&mut fields, name, nested, related);
                }
            }
        }

        Ok(fields)
    }

    /// Anonymizer governing the records reached through `name`
    ///
    /// Declared relations win over schema relations, which win over
    /// computed properties. `None` when `name` is none of them.
    pub fn resolve_related(
        &self,
        anonymizer: &ModelAnonymizer,
        name: &str,
    ) -> Result<Option<Arc<ModelAnonymizer>>> {
        let owner = anonymizer.entity_type();

        if let Some(declared) = anonymizer.relation(name) {
            let related = match declared {
                RelatedAnonymizer::Nested(nested) => nested.clone(),
                RelatedAnonymizer::Relation(relation) => match relation.anonymizer() {
                    Some(explicit) => explicit.clone(),
                    None => self
                        .registry
                        .require(owner, name, relation.related_type())?
                        .clone(),
                },
                RelatedAnonymizer::Registered(related_type) => {
                    self.registry.require(owner, name, related_type)?.clone()
                }
            };
            return Ok(Some(related));
        }

        if let Some(descriptor) = self.schema.relation(owner, name) {
            return Ok(Some(
                self.registry
                    .require(owner, name, &descriptor.related_type)?
                    .clone(),
            ));
        }

        if let Some(descriptor) = self.schema.property(owner, name) {
            return Ok(Some(
                self.registry
                    .require(owner, name, &descriptor.target_type)?
                    .clone(),
            ));
        }

        Ok(None)
    }
}

fn push_related(fields: &mut Fields, name: String, nested: Fields, anonymizer: Arc<ModelAnonymizer>) {
    let related = RelatedFields {
        name,
        fields: nested,
        anonymizer,
    };
    match fields.related_fields.iter_mut().find(|r| r.name == related.name) {
        Some(existing) => *existing = related,
        None => fields.related_fields.push(related),
    }
}

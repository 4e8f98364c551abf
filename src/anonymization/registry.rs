//! Anonymizer registry
//!
//! Maps each entity type to the one [`ModelAnonymizer`] governing it.
//! Registration happens on a [`RegistryBuilder`] before any traversal; the
//! built [`AnonymizerRegistry`] is immutable and shared behind an `Arc`, so
//! readers never lock. A process-wide instance can be installed once with
//! [`install_global`].

use super::model::ModelAnonymizer;
use crate::domain::{EntityType, ObscuraError, Result};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<Arc<AnonymizerRegistry>> = OnceLock::new();

/// Collects anonymizers before the registry is frozen
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    anonymizers: Vec<Arc<ModelAnonymizer>>,
    index: HashMap<EntityType, usize>,
}

impl RegistryBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an anonymizer
    ///
    /// Abstract anonymizers are skipped. A second anonymizer for the same
    /// entity type fails with [`ObscuraError::DuplicateRegistration`].
    pub fn register(&mut self, anonymizer: ModelAnonymizer) -> Result<()> {
        if anonymizer.is_abstract() {
            tracing::debug!(
                entity_type = %anonymizer.entity_type(),
                "Skipping abstract anonymizer"
            );
            return Ok(());
        }

        let entity_type = anonymizer.entity_type().clone();
        if self.index.contains_key(&entity_type) {
            return Err(ObscuraError::DuplicateRegistration(entity_type));
        }

        self.index.insert(entity_type, self.anonymizers.len());
        self.anonymizers.push(Arc::new(anonymizer));
        Ok(())
    }

    /// Registers an anonymizer (builder style)
    pub fn with(mut self, anonymizer: ModelAnonymizer) -> Result<Self> {
        self.register(anonymizer)?;
        Ok(self)
    }

    /// Whether an anonymizer is registered for `entity_type`
    pub fn contains(&self, entity_type: &EntityType) -> bool {
        self.index.contains_key(entity_type)
    }

    /// Freezes the registry
    pub fn build(self) -> AnonymizerRegistry {
        tracing::debug!(anonymizers = self.anonymizers.len(), "Anonymizer registry built");
        AnonymizerRegistry {
            anonymizers: self.anonymizers,
            index: self.index,
        }
    }
}

/// Immutable mapping from entity type to anonymizer
#[derive(Debug, Default)]
pub struct AnonymizerRegistry {
    anonymizers: Vec<Arc<ModelAnonymizer>>,
    index: HashMap<EntityType, usize>,
}

impl AnonymizerRegistry {
    /// Starts a new registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Anonymizer governing `entity_type`
    pub fn get(&self, entity_type: &EntityType) -> Option<&Arc<ModelAnonymizer>> {
        self.index.get(entity_type).map(|&i| &self.anonymizers[i])
    }

    /// Anonymizer governing `entity_type`, or an unknown-field error naming `field`
    pub(crate) fn require(
        &self,
        owner: &EntityType,
        field: &str,
        entity_type: &EntityType,
    ) -> Result<&Arc<ModelAnonymizer>> {
        self.get(entity_type).ok_or_else(|| {
            ObscuraError::unknown_field(
                owner,
                field,
                format!("no anonymizer registered for {entity_type}"),
            )
        })
    }

    /// Every anonymizer, in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelAnonymizer>> {
        self.anonymizers.iter()
    }

    /// Number of registered anonymizers
    pub fn len(&self) -> usize {
        self.anonymizers.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.anonymizers.is_empty()
    }
}

/// Installs the process-wide registry
///
/// Fails with [`ObscuraError::RegistryFrozen`] if one is already installed.
pub fn install_global(registry: AnonymizerRegistry) -> Result<Arc<AnonymizerRegistry>> {
    let registry = Arc::new(registry);
    GLOBAL.set(registry.clone()).map_err(|_| {
        ObscuraError::RegistryFrozen("a global anonymizer registry is already installed".to_string())
    })?;
    tracing::info!(anonymizers = registry.len(), "Global anonymizer registry installed");
    Ok(registry)
}

/// The process-wide registry, if installed
pub fn global() -> Option<Arc<AnonymizerRegistry>> {
    GLOBAL.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::anonymizer::TextFieldAnonymizer;

    fn anonymizer(name: &str) -> ModelAnonymizer {
        ModelAnonymizer::builder(EntityType::new(name).unwrap())
            .field("name", TextFieldAnonymizer::new())
            .build()
    }

    #[test]
    fn test_register_and_get() {
        let registry = RegistryBuilder::new()
            .with(anonymizer("shop.customer"))
            .unwrap()
            .with(anonymizer("shop.email"))
            .unwrap()
            .build();

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&EntityType::new("shop.email").unwrap()).is_some());
        assert!(registry.get(&EntityType::new("shop.note").unwrap()).is_none());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut builder = RegistryBuilder::new();
        builder.register(anonymizer("shop.customer")).unwrap();
        let err = builder.register(anonymizer("shop.customer")).unwrap_err();
        assert!(matches!(err, ObscuraError::DuplicateRegistration(_)));
    }

    #[test]
    fn test_abstract_is_skipped() {
        let base = ModelAnonymizer::builder(EntityType::new("shop.base").unwrap())
            .abstract_anonymizer()
            .build();
        let mut builder = RegistryBuilder::new();
        builder.register(base.clone()).unwrap();
        builder.register(base).unwrap();
        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_iteration_order() {
        let registry = RegistryBuilder::new()
            .with(anonymizer("shop.payment"))
            .unwrap()
            .with(anonymizer("shop.account"))
            .unwrap()
            .build();

        let names: Vec<&str> = registry.iter().map(|a| a.entity_type().as_str()).collect();
        assert_eq!(names, vec!["shop.payment", "shop.account"]);
    }

    #[test]
    fn test_install_global_once() {
        let first = install_global(AnonymizerRegistry::default());
        let second = install_global(AnonymizerRegistry::default());
        assert!(first.is_ok());
        assert!(matches!(second, Err(ObscuraError::RegistryFrozen(_))));
        assert!(global().is_some());
    }
}

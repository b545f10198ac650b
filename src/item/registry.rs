//! Item configuration registry: item type name → storage configuration.

use crate::config::{RepositoryConfig, ValidationError};
use crate::error::RepositoryError;
use crate::item::{Item, ItemTypeConfig};
use std::collections::HashMap;

/// Resolves the declared configuration of an item type.
pub trait ItemConfigurationResolver: Send + Sync {
    /// Fails with `UnregisteredItemType` when the type was never registered.
    fn resolve(&self, item_type: &str) -> Result<ItemTypeConfig, RepositoryError>;
}

/// In-memory registry, populated at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ItemConfigurationRegistry {
    items: HashMap<String, ItemTypeConfig>,
}

impl ItemConfigurationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register configuration for item type `T`
    pub fn register<T: Item>(&mut self, config: ItemTypeConfig) -> &mut Self {
        self.register_named(T::TYPE_NAME, config)
    }

    /// Register `T` with its `Item::default_config`
    pub fn register_default<T: Item>(&mut self) -> &mut Self {
        self.register_named(T::TYPE_NAME, T::default_config())
    }

    pub fn register_named(
        &mut self,
        item_type: impl Into<String>,
        config: ItemTypeConfig,
    ) -> &mut Self {
        self.items.insert(item_type.into(), config);
        self
    }

    pub fn resolve_for<T: Item>(&self) -> Result<ItemTypeConfig, RepositoryError> {
        self.resolve(T::TYPE_NAME)
    }

    pub fn contains(&self, item_type: &str) -> bool {
        self.items.contains_key(item_type)
    }

    /// Registered item type names, sorted.
    pub fn item_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.items.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register every item type declared in configuration
    pub fn load_from_config(&mut self, config: &RepositoryConfig) -> &mut Self {
        for entry in &config.items {
            let (item_type, item_config) = entry.clone().into_parts();
            self.items.insert(item_type, item_config);
        }
        self
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors: Vec<ValidationError> = self
            .items
            .iter()
            .filter_map(|(name, config)| {
                config
                    .validate()
                    .err()
                    .map(|msg| ValidationError::Item(name.clone(), msg))
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
            Err(errors)
        }
    }
}

impl ItemConfigurationResolver for ItemConfigurationRegistry {
    fn resolve(&self, item_type: &str) -> Result<ItemTypeConfig, RepositoryError> {
        self.items
            .get(item_type)
            .cloned()
            .ok_or_else(|| RepositoryError::UnregisteredItemType(item_type.to_string()))
    }
}

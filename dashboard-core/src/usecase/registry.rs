//! Use-case registry

use super::config::UseCaseConfig;
use super::presets;
use std::sync::Arc;
use tracing::debug;

/// Lookup table of built-in and user-defined use cases
///
/// User-defined entries with the id of a built-in replace it.
#[derive(Debug, Clone)]
pub struct UseCaseRegistry {
    entries: Vec<Arc<UseCaseConfig>>,
}

impl UseCaseRegistry {
    /// Registry holding only the built-in presets
    pub fn builtin() -> Self {
        Self {
            entries: presets::builtin().into_iter().map(Arc::new).collect(),
        }
    }

    /// Built-ins merged with `custom`, validating every custom entry
    pub fn with_custom(custom: &[UseCaseConfig]) -> crate::Result<Self> {
        let mut registry = Self::builtin();
        for config in custom {
            registry.register(config.clone())?;
        }
        Ok(registry)
    }

    /// Add or replace a use case
    pub fn register(&mut self, config: UseCaseConfig) -> crate::Result<()> {
        config.validate()?;
        let config = Arc::new(config);
        match self.entries.iter_mut().find(|e| e.id == config.id) {
            Some(existing) => {
                debug!(id = %config.id, "Replacing use case");
                *existing = config;
            }
            None => {
                debug!(id = %config.id, "Registering use case");
                self.entries.push(config);
            }
        }
        Ok(())
    }

    /// Look up a use case by id
    pub fn get(&self, id: &str) -> Option<Arc<UseCaseConfig>> {
        self.entries.iter().find(|e| e.id == id).cloned()
    }

    /// Look up a use case, failing with the list of known ids
    pub fn require(&self, id: &str) -> crate::Result<Arc<UseCaseConfig>> {
        self.get(id).ok_or_else(|| {
            crate::Error::UseCase(format!(
                "unknown use case '{}' (known: {})",
                id,
                self.ids().join(", ")
            ))
        })
    }

    /// Ids in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }

    /// Iterate over all use cases
    pub fn iter(&self) -> impl Iterator<Item = &Arc<UseCaseConfig>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for UseCaseRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = UseCaseRegistry::builtin();
        assert!(registry.get(presets::OCCUPANCY).is_some());
        assert!(registry.get(presets::FALL_DETECTION).is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_custom_use_case_is_added() {
        let mut custom = presets::fall_detection();
        custom.id = "bed_exit".to_string();
        custom.name = "Bed Exit".to_string();

        let registry = UseCaseRegistry::with_custom(&[custom]).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("bed_exit").unwrap().name, "Bed Exit");
    }

    #[test]
    fn test_custom_use_case_replaces_builtin() {
        let mut custom = presets::occupancy();
        custom.name = "Lobby".to_string();

        let registry = UseCaseRegistry::with_custom(&[custom]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(presets::OCCUPANCY).unwrap().name, "Lobby");
    }

    #[test]
    fn test_invalid_custom_use_case_rejected() {
        let mut custom = presets::occupancy();
        custom.id = "broken".to_string();
        custom.num_classes = 0;
        custom.class_labels.clear();

        assert!(UseCaseRegistry::with_custom(&[custom]).is_err());
    }

    #[test]
    fn test_require_lists_known_ids() {
        let registry = UseCaseRegistry::builtin();
        let err = registry.require("gesture").unwrap_err().to_string();
        assert!(err.contains("occupancy"));
        assert!(err.contains("fall_detection"));
    }
}

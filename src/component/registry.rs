//! Component registry keyed by component id

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::definition::ComponentDefinition;
use crate::error::{Result, SdkError};

/// Thread-safe registry; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: Arc<DashMap<String, Arc<ComponentDefinition>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert; an id can only be registered once
    pub fn register(&self, definition: ComponentDefinition) -> Result<Arc<ComponentDefinition>> {
        definition.validate()?;

        match self.components.entry(definition.id.clone()) {
            Entry::Occupied(_) => Err(SdkError::DuplicateComponent { id: definition.id }),
            Entry::Vacant(slot) => {
                tracing::debug!(id = %definition.id, runner = definition.runner().kind_name(), "Registered component");
                let definition = Arc::new(definition);
                slot.insert(Arc::clone(&definition));
                Ok(definition)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<ComponentDefinition>> {
        self.components.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn has(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    /// All definitions sorted by id
    pub fn list(&self) -> Vec<Arc<ComponentDefinition>> {
        let mut all: Vec<_> = self
            .components
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn clear(&self) {
        self.components.clear();
    }
}

static GLOBAL_REGISTRY: Lazy<ComponentRegistry> = Lazy::new(ComponentRegistry::new);

/// Process-global registry
pub fn registry() -> &'static ComponentRegistry {
    &GLOBAL_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::execute_fn;
    use crate::port::meta::PortMetadata;
    use crate::schema::Schema;

    fn definition(id: &str) -> ComponentDefinition {
        ComponentDefinition::new(
            id,
            "Test",
            "test",
            Schema::object([("a", Schema::string().with_port(PortMetadata::new("A")))]),
            Schema::object([("b", Schema::number().with_port(PortMetadata::new("B")))]),
            execute_fn(|payload, _ctx| async move { Ok(payload.inputs) }),
        )
    }

    #[test]
    fn register_get_has_list() {
        let registry = ComponentRegistry::new();
        registry.register(definition("z.last")).unwrap();
        registry.register(definition("a.first")).unwrap();

        assert!(registry.has("a.first"));
        assert!(!registry.has("missing"));
        assert_eq!(registry.get("z.last").unwrap().id, "z.last");
        let ids: Vec<_> = registry.list().iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, ["a.first", "z.last"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = ComponentRegistry::new();
        registry.register(definition("dup")).unwrap();
        let err = registry.register(definition("dup")).unwrap_err();
        assert!(matches!(err, SdkError::DuplicateComponent { ref id } if id == "dup"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_definitions_are_not_stored() {
        let registry = ComponentRegistry::new();
        let bad = ComponentDefinition::new(
            "bad",
            "Bad",
            "test",
            Schema::object([("any", Schema::any().with_port(PortMetadata::new("Any")))]),
            Schema::object([] as [(&str, Schema); 0]),
            execute_fn(|payload, _ctx| async move { Ok(payload.inputs) }),
        );
        assert!(registry.register(bad).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_empties_and_clones_share_state() {
        let registry = ComponentRegistry::new();
        let shared = registry.clone();
        registry.register(definition("one")).unwrap();
        assert!(shared.has("one"));
        shared.clear();
        assert!(registry.is_empty());
    }
}

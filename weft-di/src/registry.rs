//! Functionality related to registering [InjectionTarget]s, which are later used by the
//! [ComponentFactory](crate::factory::ComponentFactory) to create instances. Each target is
//! available by its component type and by its name.

use crate::config::EngineConfig;
use crate::error::DefinitionError;
use crate::injection_target::{InjectionTarget, InjectionTargetPtr};
use crate::instance_provider::ComponentInstancePtr;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::any::TypeId;
use tracing::debug;

/// A registry of injection targets.
#[cfg_attr(test, automock)]
pub trait InjectionTargetRegistry {
    /// Adds a new target. Handling of duplicate types and names is registry-dependent.
    fn register(&mut self, target: InjectionTarget) -> Result<(), DefinitionError>;

    /// Returns the target registered for given component type.
    fn target_by_type(&self, type_id: TypeId) -> Option<InjectionTargetPtr>;

    /// Returns the target registered with given name.
    fn target_by_name(&self, name: &str) -> Option<InjectionTargetPtr>;

    /// Checks if given type is present in this registry.
    fn is_registered(&self, type_id: TypeId) -> bool;

    /// Checks if there's a target with given name.
    fn is_name_registered(&self, name: &str) -> bool;
}

/// Simple in-memory [InjectionTargetRegistry]. Registering a duplicate type or name fails, unless
/// definition overriding is enabled, in which case the new target replaces the old one.
#[derive(Default)]
pub struct SimpleInjectionTargetRegistry {
    targets: FxHashMap<TypeId, InjectionTargetPtr>,
    names: FxHashMap<&'static str, TypeId>,
    allow_definition_overriding: bool,
}

impl SimpleInjectionTargetRegistry {
    pub fn new(allow_definition_overriding: bool) -> Self {
        Self {
            allow_definition_overriding,
            ..Default::default()
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.allow_definition_overriding)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl InjectionTargetRegistry for SimpleInjectionTargetRegistry {
    fn register(&mut self, target: InjectionTarget) -> Result<(), DefinitionError> {
        let type_id = target.descriptor().type_id();
        let name = target.descriptor().name();

        if !self.allow_definition_overriding {
            if self.targets.contains_key(&type_id) {
                return Err(DefinitionError::DuplicateInjectionTarget(name));
            }

            if self.names.contains_key(name) {
                return Err(DefinitionError::DuplicateComponentName(name));
            }
        }

        if let Some(previous) = self.targets.remove(&type_id) {
            self.names.remove(previous.descriptor().name());
        }

        if let Some(previous_type) = self.names.remove(name) {
            self.targets.remove(&previous_type);
        }

        debug!(component = name, "Registering injection target.");

        self.names.insert(name, type_id);
        self.targets
            .insert(type_id, ComponentInstancePtr::new(target));

        Ok(())
    }

    #[inline]
    fn target_by_type(&self, type_id: TypeId) -> Option<InjectionTargetPtr> {
        self.targets.get(&type_id).cloned()
    }

    fn target_by_name(&self, name: &str) -> Option<InjectionTargetPtr> {
        self.names
            .get(name)
            .and_then(|type_id| self.targets.get(type_id))
            .cloned()
    }

    #[inline]
    fn is_registered(&self, type_id: TypeId) -> bool {
        self.targets.contains_key(&type_id)
    }

    #[inline]
    fn is_name_registered(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptor::ComponentDescriptor;
    use crate::error::DefinitionError;
    use crate::injection_target::InjectionTarget;
    use crate::registry::{InjectionTargetRegistry, SimpleInjectionTargetRegistry};
    use std::any::TypeId;

    fn target<T: 'static>(name: &'static str) -> InjectionTarget {
        InjectionTarget::new(ComponentDescriptor::builder::<T>(name).build().unwrap())
    }

    #[test]
    fn should_register_target() {
        let mut registry = SimpleInjectionTargetRegistry::default();
        registry.register(target::<u8>("byte")).unwrap();

        assert!(registry.is_registered(TypeId::of::<u8>()));
        assert!(registry.is_name_registered("byte"));
        assert_eq!(
            registry
                .target_by_name("byte")
                .unwrap()
                .descriptor()
                .type_id(),
            TypeId::of::<u8>()
        );
        assert!(registry.target_by_type(TypeId::of::<u16>()).is_none());
    }

    #[test]
    fn should_reject_duplicate_type() {
        let mut registry = SimpleInjectionTargetRegistry::default();
        registry.register(target::<u8>("byte")).unwrap();

        assert_eq!(
            registry.register(target::<u8>("other")).unwrap_err(),
            DefinitionError::DuplicateInjectionTarget("other")
        );
    }

    #[test]
    fn should_reject_duplicate_name() {
        let mut registry = SimpleInjectionTargetRegistry::default();
        registry.register(target::<u8>("byte")).unwrap();

        assert_eq!(
            registry.register(target::<u16>("byte")).unwrap_err(),
            DefinitionError::DuplicateComponentName("byte")
        );
    }

    #[test]
    fn should_override_definitions() {
        let mut registry = SimpleInjectionTargetRegistry::new(true);
        registry.register(target::<u8>("byte")).unwrap();
        registry.register(target::<u8>("renamed")).unwrap();
        registry.register(target::<u16>("renamed")).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_name_registered("byte"));
        assert!(!registry.is_registered(TypeId::of::<u8>()));
        assert!(registry.is_registered(TypeId::of::<u16>()));
    }
}

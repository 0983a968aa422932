//! Core functionality for creating managed component instances. The [ComponentFactory] drives
//! [InjectionTarget]s through the whole creation sequence:
//!
//! 1. materialize interceptor instances for the new object,
//! 2. [produce](InjectionTarget::produce) the instance,
//! 3. [inject](InjectionTarget::inject) its dependencies, creating them recursively,
//! 4. [wrap](InjectionTarget::wrap) it in a proxy, if needed,
//! 5. run [post-construct](InjectionTarget::post_construct) callbacks,
//! 6. keep it in an [InstanceStore](crate::instance_registry::InstanceStore).
//!
//! Dependencies are created anew for every injection point and destroyed together with the
//! instance they were injected into.

use crate::config::EngineConfig;
use crate::descriptor::InjectionPoint;
use crate::error::InjectionTargetError;
use crate::injection_target::InjectionTarget;
use crate::instance_provider::{
    convert_error, ComponentInstanceAnyPtr, ComponentInstanceProvider, ErrorPtr,
};
use crate::instance_registry::{InstanceHandle, InstanceRegistry, InstanceStorePtr, StoredInstance};
use crate::registry::{InjectionTargetRegistry, SimpleInjectionTargetRegistry};
use fxhash::FxHashSet;
use std::any::TypeId;
use tracing::{debug, warn};

#[cfg(not(feature = "threadsafe"))]
pub type InjectionTargetRegistryPtr = Box<dyn InjectionTargetRegistry>;
#[cfg(feature = "threadsafe")]
pub type InjectionTargetRegistryPtr = Box<dyn InjectionTargetRegistry + Send + Sync>;

/// Builder for [ComponentFactory] with sensible defaults, for easy construction.
pub struct ComponentFactoryBuilder {
    target_registry: InjectionTargetRegistryPtr,
    instance_store: InstanceStorePtr,
}

impl Default for ComponentFactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentFactoryBuilder {
    /// Creates a new builder with an empty registry and default instance store.
    pub fn new() -> Self {
        Self {
            target_registry: Box::<SimpleInjectionTargetRegistry>::default(),
            instance_store: Box::<InstanceRegistry>::default(),
        }
    }

    /// Creates a new builder with a registry configured from given config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new()
            .with_target_registry(Box::new(SimpleInjectionTargetRegistry::from_config(config)))
    }

    /// Sets new [InjectionTargetRegistry].
    pub fn with_target_registry(mut self, target_registry: InjectionTargetRegistryPtr) -> Self {
        self.target_registry = target_registry;
        self
    }

    /// Sets new [InstanceStore](crate::instance_registry::InstanceStore).
    pub fn with_instance_store(mut self, instance_store: InstanceStorePtr) -> Self {
        self.instance_store = instance_store;
        self
    }

    /// Builds resulting [ComponentFactory].
    pub fn build(self) -> ComponentFactory {
        ComponentFactory::new(self.target_registry, self.instance_store)
    }
}

/// Generic factory for managed instances. Uses targets from the [InjectionTargetRegistry] and keeps
/// created instances in an [InstanceStore](crate::instance_registry::InstanceStore).
pub struct ComponentFactory {
    target_registry: InjectionTargetRegistryPtr,
    instance_store: InstanceStorePtr,
    types_under_construction: FxHashSet<TypeId>,
    // dependents created for each instance currently under construction
    dependents: Vec<Vec<InstanceHandle>>,
}

impl ComponentFactory {
    pub fn new(
        target_registry: InjectionTargetRegistryPtr,
        instance_store: InstanceStorePtr,
    ) -> Self {
        Self {
            target_registry,
            instance_store,
            types_under_construction: Default::default(),
            dependents: Default::default(),
        }
    }

    /// Registry used to look up targets, e.g. for registering new ones.
    #[inline]
    pub fn target_registry(&mut self) -> &mut dyn InjectionTargetRegistry {
        self.target_registry.as_mut()
    }

    /// Creates a new managed instance of given component type.
    pub fn create(&mut self, type_id: TypeId) -> Result<InstanceHandle, InjectionTargetError> {
        let target = self
            .target_registry
            .target_by_type(type_id)
            .ok_or_else(|| InjectionTargetError::UnknownComponent(format!("{type_id:?}")))?;

        self.create_stored(&target).map(|(handle, _)| handle)
    }

    /// Creates a new managed instance of the component with given name.
    pub fn create_by_name(&mut self, name: &str) -> Result<InstanceHandle, InjectionTargetError> {
        let target = self
            .target_registry
            .target_by_name(name)
            .ok_or_else(|| InjectionTargetError::UnknownComponent(name.to_string()))?;

        self.create_stored(&target).map(|(handle, _)| handle)
    }

    /// Returns a live instance.
    #[inline]
    pub fn instance(&self, handle: InstanceHandle) -> Option<ComponentInstanceAnyPtr> {
        self.instance_store.instance(handle)
    }

    /// Destroys given instance and its dependents. The instance is released before pre-destroy
    /// callbacks run, so it is never reachable afterwards, even if they fail. All dependents are
    /// destroyed regardless of errors and the first error is returned. Unknown handles are ignored.
    pub fn destroy(&mut self, handle: InstanceHandle) -> Result<(), InjectionTargetError> {
        let Some(stored) = self.instance_store.release(handle) else {
            return Ok(());
        };

        debug!(
            dependents = stored.dependents.len(),
            "Released component instance."
        );

        let result = self
            .target_registry
            .target_by_type(stored.type_id)
            .ok_or_else(|| InjectionTargetError::UnknownComponent(format!("{:?}", stored.type_id)))
            .and_then(|target| target.pre_destroy(&stored.instance));

        if let Err(error) = &result {
            warn!(%error, "Error destroying instance.");
        }

        stored
            .dependents
            .into_iter()
            .map(|dependent| self.destroy(dependent))
            .fold(result, |result, dependent_result| result.and(dependent_result))
    }

    fn create_stored(
        &mut self,
        target: &InjectionTarget,
    ) -> Result<(InstanceHandle, ComponentInstanceAnyPtr), InjectionTargetError> {
        let type_id = target.descriptor().type_id();
        if !self.types_under_construction.insert(type_id) {
            return Err(InjectionTargetError::DependencyCycle(
                target.descriptor().name(),
            ));
        }

        debug!(
            component = target.descriptor().name(),
            "Creating component instance."
        );

        self.dependents.push(vec![]);
        let instance = self.create_instance(target);
        let dependents = self.dependents.pop().unwrap_or_default();

        self.types_under_construction.remove(&type_id);

        match instance {
            Ok(instance) => {
                let handle = self.instance_store.store(StoredInstance {
                    type_id,
                    instance: instance.clone(),
                    dependents,
                });

                Ok((handle, instance))
            }
            Err(error) => {
                for dependent in dependents {
                    // the original error is more relevant to the caller
                    let _ = self.destroy(dependent);
                }

                Err(error)
            }
        }
    }

    fn create_instance(
        &mut self,
        target: &InjectionTarget,
    ) -> Result<ComponentInstanceAnyPtr, InjectionTargetError> {
        let interceptor_instances = target.create_interceptor_instances()?;
        let mut instance = target.produce(&interceptor_instances, self)?;
        target.inject(&mut *instance, self)?;

        let instance = target.wrap(instance, interceptor_instances)?;
        target.post_construct(&instance)?;

        Ok(instance)
    }
}

impl ComponentInstanceProvider for ComponentFactory {
    fn instance_for(
        &mut self,
        injection_point: &InjectionPoint,
    ) -> Result<ComponentInstanceAnyPtr, ErrorPtr> {
        let target = self
            .target_registry
            .target_by_type(injection_point.required_type)
            .ok_or_else(|| {
                convert_error(InjectionTargetError::UnknownComponent(
                    injection_point.required_type_name.to_string(),
                ))
            })?;

        let (handle, instance) = self.create_stored(&target).map_err(convert_error)?;
        if let Some(dependents) = self.dependents.last_mut() {
            dependents.push(handle);
        }

        Ok(instance)
    }
}

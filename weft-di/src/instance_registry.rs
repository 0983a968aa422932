//! Managed instances created by a [ComponentFactory](crate::factory::ComponentFactory) are kept in an
//! [InstanceStore] until destroyed. Each instance is identified by an opaque [InstanceHandle], and
//! remembers the dependent instances created while injecting it, so they can be destroyed together.
//!
//! Note: storage semantics of real scopes (e.g. tying instances to sessions) are not handled here -
//! the store only makes sure a destroyed instance is never reachable again.

use crate::instance_provider::ComponentInstanceAnyPtr;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::any::TypeId;

#[cfg(not(feature = "threadsafe"))]
pub type InstanceStorePtr = Box<dyn InstanceStore>;
#[cfg(feature = "threadsafe")]
pub type InstanceStorePtr = Box<dyn InstanceStore + Send + Sync>;

/// Opaque identity of a stored instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InstanceHandle(u64);

/// A managed instance with the type it was created for.
#[derive(Clone, Debug)]
pub struct StoredInstance {
    pub type_id: TypeId,
    pub instance: ComponentInstanceAnyPtr,
    /// Instances created to satisfy injection points of this one.
    pub dependents: Vec<InstanceHandle>,
}

/// Storage for live managed instances.
#[cfg_attr(test, automock)]
pub trait InstanceStore {
    /// Stores given instance and returns its new handle.
    fn store(&mut self, instance: StoredInstance) -> InstanceHandle;

    /// Gets the instance for given handle, if it hasn't been released.
    fn instance(&self, handle: InstanceHandle) -> Option<ComponentInstanceAnyPtr>;

    /// Removes the instance from the store. Released handles are never reused.
    fn release(&mut self, handle: InstanceHandle) -> Option<StoredInstance>;

    /// Number of live instances.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default [InstanceStore] backed by a hash map.
#[derive(Default, Debug)]
pub struct InstanceRegistry {
    instances: FxHashMap<InstanceHandle, StoredInstance>,
    next_handle: u64,
}

impl InstanceStore for InstanceRegistry {
    fn store(&mut self, instance: StoredInstance) -> InstanceHandle {
        let handle = InstanceHandle(self.next_handle);
        self.next_handle += 1;

        self.instances.insert(handle, instance);
        handle
    }

    #[inline]
    fn instance(&self, handle: InstanceHandle) -> Option<ComponentInstanceAnyPtr> {
        self.instances
            .get(&handle)
            .map(|stored| stored.instance.clone())
    }

    #[inline]
    fn release(&mut self, handle: InstanceHandle) -> Option<StoredInstance> {
        self.instances.remove(&handle)
    }

    #[inline]
    fn len(&self) -> usize {
        self.instances.len()
    }
}

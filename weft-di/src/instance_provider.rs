//! Pointer types shared by the engine, and the contract used to supply dependencies for
//! [InjectionPoint]s.

use crate::descriptor::InjectionPoint;
use std::any::Any;
use std::error::Error;
#[cfg(not(feature = "threadsafe"))]
use std::rc::Rc;
#[cfg(feature = "threadsafe")]
use std::sync::Arc;

#[cfg(not(feature = "threadsafe"))]
pub type ComponentInstancePtr<T> = Rc<T>;
#[cfg(feature = "threadsafe")]
pub type ComponentInstancePtr<T> = Arc<T>;

#[cfg(not(feature = "threadsafe"))]
pub type ComponentInstanceAnyPtr = ComponentInstancePtr<dyn Any + 'static>;
#[cfg(feature = "threadsafe")]
pub type ComponentInstanceAnyPtr = ComponentInstancePtr<dyn Any + Send + Sync + 'static>;

/// A freshly constructed instance, exclusively owned until it gets wrapped and shared.
#[cfg(not(feature = "threadsafe"))]
pub type ManagedInstance = Box<dyn Any + 'static>;
#[cfg(feature = "threadsafe")]
pub type ManagedInstance = Box<dyn Any + Send + Sync + 'static>;

#[cfg(not(feature = "threadsafe"))]
pub type ErrorPtr = Rc<dyn Error + 'static>;
#[cfg(feature = "threadsafe")]
pub type ErrorPtr = Arc<dyn Error + Send + Sync + 'static>;

/// Converts any error into an [ErrorPtr].
#[cfg(feature = "threadsafe")]
pub fn convert_error<E: Error + Send + Sync + 'static>(error: E) -> ErrorPtr {
    Arc::new(error) as ErrorPtr
}

/// Converts any error into an [ErrorPtr].
#[cfg(not(feature = "threadsafe"))]
pub fn convert_error<E: Error + 'static>(error: E) -> ErrorPtr {
    Rc::new(error) as ErrorPtr
}

/// Supplier of dependencies for injection points. Usually implemented by the container, e.g.
/// [ComponentFactory](crate::factory::ComponentFactory), which resolves the required type and
/// creates or reuses an instance.
pub trait ComponentInstanceProvider {
    /// Returns an instance satisfying the given injection point.
    fn instance_for(
        &mut self,
        injection_point: &InjectionPoint,
    ) -> Result<ComponentInstanceAnyPtr, ErrorPtr>;
}

/// Helper for extracting strongly-typed dependencies from type-erased values passed to setters,
/// methods and constructors.
pub fn downcast_dependency<T: Any + Send + Sync>(
    value: ComponentInstanceAnyPtr,
) -> Result<ComponentInstancePtr<T>, ErrorPtr> {
    value
        .downcast::<T>()
        .map_err(|_| convert_error(IncompatibleDependency(std::any::type_name::<T>())))
}

#[derive(Debug, thiserror::Error)]
#[error("Tried to downcast dependency to incompatible type: {0}")]
pub struct IncompatibleDependency(pub &'static str);

#[cfg(test)]
mod tests {
    use crate::instance_provider::{
        downcast_dependency, ComponentInstanceAnyPtr, ComponentInstancePtr,
    };

    #[test]
    fn should_downcast_compatible_dependency() {
        let value = ComponentInstancePtr::new(5i32) as ComponentInstanceAnyPtr;
        assert_eq!(*downcast_dependency::<i32>(value).unwrap(), 5);
    }

    #[test]
    fn should_reject_incompatible_dependency() {
        let value = ComponentInstancePtr::new(5i32) as ComponentInstanceAnyPtr;
        assert!(downcast_dependency::<u8>(value)
            .unwrap_err()
            .to_string()
            .contains("u8"));
    }
}

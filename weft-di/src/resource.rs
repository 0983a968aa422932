//! Platform resource injection. Hosting environments can inject their own resources (e.g.
//! connection pools or environment entries) into components, after regular dependencies have been
//! injected. The service is optional - when none is configured, resource injection is skipped.

use crate::instance_provider::{ComponentInstancePtr, ErrorPtr};
use std::any::Any;

/// Injects platform resources into freshly created instances.
pub trait ResourceInjectionService {
    fn inject_platform_resources(&self, instance: &mut dyn Any) -> Result<(), ErrorPtr>;
}

#[cfg(not(feature = "threadsafe"))]
pub type ResourceInjectionServicePtr = ComponentInstancePtr<dyn ResourceInjectionService>;
#[cfg(feature = "threadsafe")]
pub type ResourceInjectionServicePtr =
    ComponentInstancePtr<dyn ResourceInjectionService + Send + Sync>;

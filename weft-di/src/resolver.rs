//! Interceptor chain resolution. A chain for a given [InterceptionType] is built from two sources:
//! environment-declared interceptors come first, followed by binding-declared ones, each keeping
//! its declared relative order. Callers rely on environment interceptors wrapping outside binding
//! interceptors.

use crate::descriptor::{ComponentDescriptor, ConstructorDescriptor};
use crate::error::InjectionTargetError;
use crate::interceptor::{InterceptionType, InterceptorDescriptorPtr};
use tracing::debug;

/// Resolved class-level lifecycle chains of a component.
#[derive(Clone, Debug, Default)]
pub struct LifecycleInterceptors {
    pub post_construct: Vec<InterceptorDescriptorPtr>,
    pub pre_destroy: Vec<InterceptorDescriptorPtr>,
}

impl LifecycleInterceptors {
    pub fn for_phase(&self, phase: InterceptionType) -> &[InterceptorDescriptorPtr] {
        match phase {
            InterceptionType::PostConstruct => &self.post_construct,
            InterceptionType::PreDestroy => &self.pre_destroy,
            InterceptionType::AroundConstruct | InterceptionType::AroundInvoke => &[],
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.post_construct.is_empty() && self.pre_destroy.is_empty()
    }
}

/// Merges both interceptor sources into a single chain for `phase`.
pub fn resolve_chain(
    environment_interceptors: &[InterceptorDescriptorPtr],
    binding_interceptors: &[InterceptorDescriptorPtr],
    phase: InterceptionType,
) -> Vec<InterceptorDescriptorPtr> {
    environment_interceptors
        .iter()
        .chain(binding_interceptors)
        .filter(|interceptor| interceptor.intercepts(phase))
        .cloned()
        .collect()
}

/// Resolves post-construct and pre-destroy chains. Consumes the class-level binding interceptors
/// of the component, so this can succeed only once per descriptor - the result must be memoized.
pub fn resolve_lifecycle_chains(
    descriptor: &ComponentDescriptor,
) -> Result<LifecycleInterceptors, InjectionTargetError> {
    let Some(info) = descriptor.interceptor_info() else {
        return Ok(LifecycleInterceptors::default());
    };

    let binding_interceptors = info
        .take_class_binding_interceptors()
        .ok_or(InjectionTargetError::InterceptorsAlreadyResolved(
            descriptor.name(),
        ))?;

    let interceptors = LifecycleInterceptors {
        post_construct: resolve_chain(
            info.environment_interceptors(),
            &binding_interceptors,
            InterceptionType::PostConstruct,
        ),
        pre_destroy: resolve_chain(
            info.environment_interceptors(),
            &binding_interceptors,
            InterceptionType::PreDestroy,
        ),
    };

    debug!(
        component = descriptor.name(),
        post_construct = interceptors.post_construct.len(),
        pre_destroy = interceptors.pre_destroy.len(),
        "Resolved lifecycle interceptors."
    );

    Ok(interceptors)
}

/// Resolves the around-construct chain for the given constructor. Constructors can have their own
/// environment-declared interceptors, distinct from class-level ones.
pub fn resolve_around_construct_chain(
    descriptor: &ComponentDescriptor,
    constructor: &ConstructorDescriptor,
) -> Vec<InterceptorDescriptorPtr> {
    descriptor
        .interceptor_info()
        .map(|info| {
            resolve_chain(
                info.constructor_environment_interceptors(&constructor.key),
                info.constructor_binding_interceptors(),
                InterceptionType::AroundConstruct,
            )
        })
        .unwrap_or_default()
}

/// Resolves the around-invoke chain for the named business method.
pub fn resolve_around_invoke_chain(
    descriptor: &ComponentDescriptor,
    method: &str,
) -> Vec<InterceptorDescriptorPtr> {
    descriptor
        .interceptor_info()
        .and_then(|info| info.business_method_info(method))
        .map(|info| {
            resolve_chain(
                &info.environment_interceptors,
                &info.binding_interceptors,
                InterceptionType::AroundInvoke,
            )
        })
        .unwrap_or_default()
}

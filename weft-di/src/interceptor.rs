//! Interceptors are cross-cutting units invoked around construction, lifecycle callbacks and
//! business methods. Each interceptor is described by an [InterceptorDescriptor], which states the
//! [InterceptionType]s it takes part in and knows how to create its [InterceptorInstance].
//!
//! Interceptors come from two sources:
//!
//! * [environment-declared](InterceptorProvenance::Environment) - listed explicitly for a component
//! by the hosting platform,
//! * [binding-declared](InterceptorProvenance::Binding) - activated by binding markers present on
//! the component or its members.
//!
//! Environment-declared interceptors always wrap around binding-declared ones. See
//! [crate::resolver] for chain resolution rules.

use crate::descriptor::MemberKey;
use crate::error::InjectionTargetError;
use crate::instance_provider::{ComponentInstanceAnyPtr, ComponentInstancePtr, ErrorPtr};
use crate::invocation::InvocationContext;
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet};
use std::sync::{Mutex, PoisonError};

/// Kind of interception.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum InterceptionType {
    AroundConstruct,
    AroundInvoke,
    PostConstruct,
    PreDestroy,
}

/// A live interceptor. The same instance is shared by all chains run for a single managed object,
/// so any state should use interior mutability.
pub trait InterceptorInstance {
    /// Intercepts the given phase. Implementations should call [InvocationContext::proceed] to
    /// continue the chain and return its result, unless they deliberately short-circuit it.
    fn intercept(
        &self,
        _phase: InterceptionType,
        context: &mut dyn InvocationContext,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        context.proceed()
    }
}

#[cfg(not(feature = "threadsafe"))]
pub type InterceptorInstancePtr = ComponentInstancePtr<dyn InterceptorInstance>;
#[cfg(feature = "threadsafe")]
pub type InterceptorInstancePtr = ComponentInstancePtr<dyn InterceptorInstance + Send + Sync>;

/// Interceptor instances materialized for a single managed object, keyed by interceptor name.
pub type InterceptorInstances = FxHashMap<String, InterceptorInstancePtr>;

/// Creates a new interceptor instance.
pub type InterceptorFactory = fn() -> Result<InterceptorInstancePtr, ErrorPtr>;

pub type InterceptorDescriptorPtr = ComponentInstancePtr<InterceptorDescriptor>;

/// Where an interceptor declaration came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InterceptorProvenance {
    Environment,
    Binding { bindings: Vec<String> },
}

/// Description of an interceptor class.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct InterceptorDescriptor {
    name: String,
    provenance: InterceptorProvenance,
    phases: FxHashSet<InterceptionType>,
    #[derivative(Debug = "ignore")]
    factory: InterceptorFactory,
}

impl InterceptorDescriptor {
    /// Creates an environment-declared interceptor.
    pub fn environment<N: ToString, P: IntoIterator<Item = InterceptionType>>(
        name: N,
        phases: P,
        factory: InterceptorFactory,
    ) -> Self {
        Self {
            name: name.to_string(),
            provenance: InterceptorProvenance::Environment,
            phases: phases.into_iter().collect(),
            factory,
        }
    }

    /// Creates an interceptor activated by the given binding markers.
    pub fn binding<N, B, P>(name: N, bindings: B, phases: P, factory: InterceptorFactory) -> Self
    where
        N: ToString,
        B: IntoIterator,
        B::Item: ToString,
        P: IntoIterator<Item = InterceptionType>,
    {
        Self {
            name: name.to_string(),
            provenance: InterceptorProvenance::Binding {
                bindings: bindings.into_iter().map(|binding| binding.to_string()).collect(),
            },
            phases: phases.into_iter().collect(),
            factory,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn provenance(&self) -> &InterceptorProvenance {
        &self.provenance
    }

    /// Binding markers which activated this interceptor; empty for environment-declared ones.
    pub fn bindings(&self) -> &[String] {
        match &self.provenance {
            InterceptorProvenance::Binding { bindings } => bindings,
            InterceptorProvenance::Environment => &[],
        }
    }

    /// Checks if this interceptor takes part in the given phase.
    #[inline]
    pub fn intercepts(&self, phase: InterceptionType) -> bool {
        self.phases.contains(&phase)
    }

    /// Creates a new instance of this interceptor.
    pub fn create(&self) -> Result<InterceptorInstancePtr, InjectionTargetError> {
        (self.factory)().map_err(|cause| InjectionTargetError::InterceptorCreationFailed {
            interceptor: self.name.clone(),
            cause,
        })
    }
}

/// Interceptors declared for a single business method.
#[derive(Clone, Debug, Default)]
pub struct BusinessMethodInterceptorInfo {
    pub environment_interceptors: Vec<InterceptorDescriptorPtr>,
    pub binding_interceptors: Vec<InterceptorDescriptorPtr>,
}

/// All interceptors bound to a component, as discovered by the metadata layer.
#[derive(Debug)]
pub struct InterceptorInfo {
    environment_interceptors: Vec<InterceptorDescriptorPtr>,
    // consumed when resolving lifecycle chains
    class_binding_interceptors: Mutex<Option<Vec<InterceptorDescriptorPtr>>>,
    constructor_environment_interceptors: FxHashMap<MemberKey, Vec<InterceptorDescriptorPtr>>,
    constructor_binding_interceptors: Vec<InterceptorDescriptorPtr>,
    business_method_infos: FxHashMap<&'static str, BusinessMethodInterceptorInfo>,
}

impl Default for InterceptorInfo {
    fn default() -> Self {
        Self {
            environment_interceptors: vec![],
            class_binding_interceptors: Mutex::new(Some(vec![])),
            constructor_environment_interceptors: Default::default(),
            constructor_binding_interceptors: vec![],
            business_method_infos: Default::default(),
        }
    }
}

impl InterceptorInfo {
    pub fn with_environment_interceptor(mut self, interceptor: InterceptorDescriptorPtr) -> Self {
        self.environment_interceptors.push(interceptor);
        self
    }

    pub fn with_class_binding_interceptor(mut self, interceptor: InterceptorDescriptorPtr) -> Self {
        self.class_binding_interceptors
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(Vec::new)
            .push(interceptor);
        self
    }

    /// Adds an environment-declared interceptor for the given constructor only.
    pub fn with_constructor_environment_interceptor(
        mut self,
        constructor: MemberKey,
        interceptor: InterceptorDescriptorPtr,
    ) -> Self {
        self.constructor_environment_interceptors
            .entry(constructor)
            .or_default()
            .push(interceptor);
        self
    }

    pub fn with_constructor_binding_interceptor(
        mut self,
        interceptor: InterceptorDescriptorPtr,
    ) -> Self {
        self.constructor_binding_interceptors.push(interceptor);
        self
    }

    pub fn with_business_method(
        mut self,
        method: &'static str,
        info: BusinessMethodInterceptorInfo,
    ) -> Self {
        self.business_method_infos.insert(method, info);
        self
    }

    #[inline]
    pub fn environment_interceptors(&self) -> &[InterceptorDescriptorPtr] {
        &self.environment_interceptors
    }

    pub fn constructor_environment_interceptors(
        &self,
        constructor: &MemberKey,
    ) -> &[InterceptorDescriptorPtr] {
        self.constructor_environment_interceptors
            .get(constructor)
            .map(|interceptors| interceptors.as_slice())
            .unwrap_or_default()
    }

    #[inline]
    pub fn constructor_binding_interceptors(&self) -> &[InterceptorDescriptorPtr] {
        &self.constructor_binding_interceptors
    }

    #[inline]
    pub fn business_method_info(&self, method: &str) -> Option<&BusinessMethodInterceptorInfo> {
        self.business_method_infos.get(method)
    }

    pub fn has_constructor_interceptors(&self) -> bool {
        !self.constructor_binding_interceptors.is_empty()
            || self
                .constructor_environment_interceptors
                .values()
                .any(|interceptors| !interceptors.is_empty())
    }

    /// Takes the class-level binding interceptors. Returns `None` if they have already been taken.
    pub(crate) fn take_class_binding_interceptors(&self) -> Option<Vec<InterceptorDescriptorPtr>> {
        self.class_binding_interceptors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

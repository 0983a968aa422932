//! Managed references which need interception are handed out as proxies. Two kinds exist:
//!
//! * [InterceptionProxy] - owns the real instance together with its dispatch state: the
//! interceptor instances materialized for the object's lifetime and the resolved business method
//! chains. The same interceptor instances observe construction, lifecycle and business method
//! interception of one managed object.
//! * [NormalScopeProxy] - a scope-transparent stand-in, which resolves the current contextual
//! instance from the scope layer on demand.
//!
//! Lifecycle calls and business method calls on one instance both read its interceptor instances.
//! Post-construct and pre-destroy must not race with concurrent business method invocations on
//! the same instance - the scope layer owning the instance is responsible for that ordering.

use crate::descriptor::BusinessMethod;
use crate::error::InjectionTargetError;
use crate::instance_provider::{
    ComponentInstanceAnyPtr, ComponentInstancePtr, ErrorPtr, ManagedInstance,
};
use crate::interceptor::{InterceptorDescriptorPtr, InterceptorInstances};
use crate::invocation::{ChainInvocationContext, InvocationContext};
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::any::Any;
use tracing::trace;

/// Capability of references carrying interception state.
pub trait InterceptionCarrier {
    /// The unwrapped instance.
    fn real_instance(&self) -> &ComponentInstanceAnyPtr;

    /// Interceptor instances bound to the instance for its whole lifetime.
    fn interceptor_instances(&self) -> &InterceptorInstances;
}

/// A business method together with its resolved around-invoke chain.
#[derive(Clone, Debug)]
pub struct BusinessMethodChain {
    pub method: BusinessMethod,
    pub interceptors: Vec<InterceptorDescriptorPtr>,
}

pub type BusinessMethodChains = FxHashMap<&'static str, BusinessMethodChain>;

pub type BusinessMethodChainsPtr = ComponentInstancePtr<BusinessMethodChains>;

/// Per-instance dispatch state of an [InterceptionProxy].
pub struct DispatchState {
    target: ComponentInstanceAnyPtr,
    interceptor_instances: InterceptorInstances,
    business_methods: BusinessMethodChainsPtr,
}

impl DispatchState {
    pub fn new(
        target: ComponentInstanceAnyPtr,
        interceptor_instances: InterceptorInstances,
        business_methods: BusinessMethodChainsPtr,
    ) -> Self {
        Self {
            target,
            interceptor_instances,
            business_methods,
        }
    }
}

impl InterceptionCarrier for DispatchState {
    #[inline]
    fn real_instance(&self) -> &ComponentInstanceAnyPtr {
        &self.target
    }

    #[inline]
    fn interceptor_instances(&self) -> &InterceptorInstances {
        &self.interceptor_instances
    }
}

/// Proxy routing business method calls through their interceptor chains.
pub struct InterceptionProxy {
    component: &'static str,
    state: DispatchState,
}

impl InterceptionProxy {
    pub fn new(component: &'static str, state: DispatchState) -> Self {
        Self { component, state }
    }

    /// Name of the proxied component.
    #[inline]
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// The dispatch state installed in this proxy.
    #[inline]
    pub fn handler(&self) -> &DispatchState {
        &self.state
    }

    /// Typed access to the real instance.
    pub fn target<T: Any>(&self) -> Option<&T> {
        self.state.target.downcast_ref::<T>()
    }

    /// Invokes the named business method through its around-invoke chain. A chain short-circuited
    /// by an interceptor without a result yields `()`.
    pub fn invoke(
        &self,
        method: &str,
        arguments: Vec<ComponentInstanceAnyPtr>,
    ) -> Result<ComponentInstanceAnyPtr, InjectionTargetError> {
        let chain = self.state.business_methods.get(method).ok_or_else(|| {
            InjectionTargetError::UnknownBusinessMethod {
                component: self.component,
                method: method.to_string(),
            }
        })?;

        let target = &*self.state.target as &dyn Any;
        let result = if chain.interceptors.is_empty() {
            (chain.method.invoker)(target, &arguments)
        } else {
            trace!(
                component = self.component,
                method,
                "Invoking intercepted business method."
            );

            ChainInvocationContext::business(
                target,
                &chain.method,
                &chain.interceptors,
                Some(&self.state.interceptor_instances),
                arguments,
            )
            .proceed()
            .map(|result| {
                result.unwrap_or_else(|| ComponentInstancePtr::new(()) as ComponentInstanceAnyPtr)
            })
        };

        result.map_err(|cause| InjectionTargetError::InvocationFailed {
            component: self.component,
            method: chain.method.key.name,
            cause,
        })
    }
}

/// Source of the current contextual instance for a normal-scoped component. Implemented by the
/// scope layer.
#[cfg_attr(test, automock)]
pub trait ContextualInstanceProvider {
    fn contextual_instance(&self) -> Result<ComponentInstanceAnyPtr, ErrorPtr>;
}

#[cfg(not(feature = "threadsafe"))]
pub type ContextualInstanceProviderPtr = Box<dyn ContextualInstanceProvider>;
#[cfg(feature = "threadsafe")]
pub type ContextualInstanceProviderPtr = Box<dyn ContextualInstanceProvider + Send + Sync>;

/// Scope-transparent proxy for normal-scoped components.
pub struct NormalScopeProxy {
    provider: ContextualInstanceProviderPtr,
}

impl NormalScopeProxy {
    pub fn new(provider: ContextualInstanceProviderPtr) -> Self {
        Self { provider }
    }

    #[inline]
    pub fn contextual_instance(&self) -> Result<ComponentInstanceAnyPtr, ErrorPtr> {
        self.provider.contextual_instance()
    }
}

/// Creates and inspects proxies.
pub trait ProxyFactory {
    /// Wraps a new instance in an interception proxy.
    fn wrap(
        &self,
        component: &'static str,
        instance: ManagedInstance,
        interceptor_instances: InterceptorInstances,
        business_methods: BusinessMethodChainsPtr,
    ) -> ComponentInstanceAnyPtr;

    /// Returns the dispatch handler, if the reference is an interception proxy.
    fn dispatch_handler_of<'r>(
        &self,
        reference: &'r ComponentInstanceAnyPtr,
    ) -> Option<&'r dyn InterceptionCarrier>;

    /// Returns the contextual instance, if the reference is a scope proxy.
    fn unwrap_scope_proxy(
        &self,
        reference: &ComponentInstanceAnyPtr,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr>;
}

#[cfg(not(feature = "threadsafe"))]
pub type ProxyFactoryPtr = Box<dyn ProxyFactory>;
#[cfg(feature = "threadsafe")]
pub type ProxyFactoryPtr = Box<dyn ProxyFactory + Send + Sync>;

/// [ProxyFactory] producing [InterceptionProxy] and recognizing [NormalScopeProxy].
#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
pub struct DefaultProxyFactory;

impl ProxyFactory for DefaultProxyFactory {
    fn wrap(
        &self,
        component: &'static str,
        instance: ManagedInstance,
        interceptor_instances: InterceptorInstances,
        business_methods: BusinessMethodChainsPtr,
    ) -> ComponentInstanceAnyPtr {
        ComponentInstancePtr::new(InterceptionProxy::new(
            component,
            DispatchState::new(
                ComponentInstancePtr::from(instance),
                interceptor_instances,
                business_methods,
            ),
        )) as ComponentInstanceAnyPtr
    }

    fn dispatch_handler_of<'r>(
        &self,
        reference: &'r ComponentInstanceAnyPtr,
    ) -> Option<&'r dyn InterceptionCarrier> {
        reference
            .downcast_ref::<InterceptionProxy>()
            .map(|proxy| proxy.handler() as &dyn InterceptionCarrier)
    }

    fn unwrap_scope_proxy(
        &self,
        reference: &ComponentInstanceAnyPtr,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        reference
            .downcast_ref::<NormalScopeProxy>()
            .map(NormalScopeProxy::contextual_instance)
            .transpose()
    }
}

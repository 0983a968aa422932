//! Runtime core of a dependency injection container: the lifecycle engine taking managed component
//! instances from construction to destruction.
//!
//! Components are described up front by immutable [descriptors](descriptor::ComponentDescriptor),
//! which capture everything needed to work with a type: its hierarchy, injection points, lifecycle
//! callbacks and [interceptors](interceptor). An [InjectionTarget](injection_target::InjectionTarget)
//! uses a descriptor to:
//!
//! * construct instances, possibly through an around-construct interceptor chain,
//! * inject fields, methods and initializers, from the root ancestor down,
//! * wrap instances in [proxies](proxy), so business methods and lifecycle callbacks remain
//! interceptable,
//! * run post-construct and pre-destroy callbacks through their interceptor chains.
//!
//! Interceptor chains always place environment-declared interceptors before binding-declared ones,
//! and every proxied object uses a single set of interceptor instances for its whole lifetime.
//!
//! The [ComponentFactory](factory::ComponentFactory) ties targets together, resolving dependencies
//! recursively and keeping created instances in an
//! [InstanceStore](instance_registry::InstanceStore).
//!
//! ### Features
//!
//! * `threadsafe` - use threadsafe pointers and `Send + Sync` trait bounds

pub mod config;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod injection_target;
pub mod instance_provider;
pub mod instance_registry;
pub mod interceptor;
pub mod invocation;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod resource;

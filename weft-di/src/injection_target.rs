//! The injection target drives a single component type through its lifecycle:
//!
//! 1. [produce](InjectionTarget::produce) - creates a new instance, running the around-construct
//! interceptor chain, if there is any.
//! 2. [inject](InjectionTarget::inject) - injects fields, injection methods and initializers, from
//! the root ancestor down to the component itself.
//! 3. [wrap](InjectionTarget::wrap) - shares the instance, putting it behind an
//! [InterceptionProxy](crate::proxy::InterceptionProxy) when interception is needed.
//! 4. [post_construct](InjectionTarget::post_construct) and
//! [pre_destroy](InjectionTarget::pre_destroy) - run lifecycle callbacks through their interceptor
//! chains.
//!
//! The resolved constructor and interceptor chains are computed lazily, at most once, and reused
//! for every instance.

use crate::config::EngineConfig;
use crate::descriptor::{
    ComponentDescriptor, ConstructorDescriptor, InjectedMember, InjectionPoint, LifecycleMethod,
    MemberKey, MemberRole,
};
use crate::error::{InjectionTargetError, InvocationError};
use crate::instance_provider::{
    convert_error, ComponentInstanceAnyPtr, ComponentInstanceProvider, ComponentInstancePtr,
    ErrorPtr, ManagedInstance,
};
use crate::interceptor::{InterceptionType, InterceptorDescriptorPtr, InterceptorInstances};
use crate::invocation::{ChainInvocationContext, InvocationContext};
use crate::proxy::{
    BusinessMethodChain, BusinessMethodChainsPtr, DefaultProxyFactory, ProxyFactoryPtr,
};
use crate::resolver::{
    resolve_around_construct_chain, resolve_around_invoke_chain, resolve_lifecycle_chains,
    LifecycleInterceptors,
};
use crate::resource::ResourceInjectionServicePtr;
use fxhash::FxHashSet;
use itertools::Itertools;
use std::any::Any;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing::{debug, trace};

pub type InjectionTargetPtr = ComponentInstancePtr<InjectionTarget>;

/// Lifecycle engine for a single component type. See module documentation for details.
pub struct InjectionTarget {
    descriptor: ComponentDescriptor,
    strict_around_construct: bool,
    proxy_factory: ProxyFactoryPtr,
    resource_injection_service: Option<ResourceInjectionServicePtr>,
    constructor: OnceLock<Option<ConstructorDescriptor>>,
    lifecycle_interceptors: OnceLock<Result<LifecycleInterceptors, InjectionTargetError>>,
    around_construct_interceptors: OnceLock<Vec<InterceptorDescriptorPtr>>,
    business_methods: OnceLock<BusinessMethodChainsPtr>,
    #[cfg(test)]
    invocation_contexts: AtomicUsize,
}

impl InjectionTarget {
    pub fn new(descriptor: ComponentDescriptor) -> Self {
        Self {
            descriptor,
            strict_around_construct: false,
            proxy_factory: Box::<DefaultProxyFactory>::default(),
            resource_injection_service: None,
            constructor: OnceLock::new(),
            lifecycle_interceptors: OnceLock::new(),
            around_construct_interceptors: OnceLock::new(),
            business_methods: OnceLock::new(),
            #[cfg(test)]
            invocation_contexts: AtomicUsize::new(0),
        }
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.strict_around_construct = config.strict_around_construct;
        self
    }

    pub fn with_proxy_factory(mut self, proxy_factory: ProxyFactoryPtr) -> Self {
        self.proxy_factory = proxy_factory;
        self
    }

    pub fn with_resource_injection_service(
        mut self,
        resource_injection_service: ResourceInjectionServicePtr,
    ) -> Self {
        self.resource_injection_service = Some(resource_injection_service);
        self
    }

    #[inline]
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    /// The constructor used to create instances: the one with injection points or, if there's
    /// none, the parameterless one.
    pub fn constructor(&self) -> Option<&ConstructorDescriptor> {
        self.constructor
            .get_or_init(|| {
                self.descriptor
                    .injected_constructor()
                    .or_else(|| self.descriptor.default_constructor())
                    .cloned()
            })
            .as_ref()
    }

    #[inline]
    pub fn has_constructor(&self) -> bool {
        self.constructor().is_some()
    }

    /// Resolved post-construct and pre-destroy chains.
    pub fn lifecycle_interceptors(&self) -> Result<&LifecycleInterceptors, InjectionTargetError> {
        self.lifecycle_interceptors
            .get_or_init(|| resolve_lifecycle_chains(&self.descriptor))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Resolved around-construct chain for the [constructor](Self::constructor).
    pub fn around_construct_interceptors(&self) -> &[InterceptorDescriptorPtr] {
        self.around_construct_interceptors.get_or_init(|| {
            self.constructor()
                .map(|constructor| resolve_around_construct_chain(&self.descriptor, constructor))
                .unwrap_or_default()
        })
    }

    /// Business methods with their resolved around-invoke chains.
    pub fn business_method_chains(&self) -> BusinessMethodChainsPtr {
        self.business_methods
            .get_or_init(|| {
                ComponentInstancePtr::new(
                    self.descriptor
                        .business_methods()
                        .iter()
                        .map(|method| {
                            (
                                method.key.name,
                                BusinessMethodChain {
                                    method: method.clone(),
                                    interceptors: resolve_around_invoke_chain(
                                        &self.descriptor,
                                        method.key.name,
                                    ),
                                },
                            )
                        })
                        .collect(),
                )
            })
            .clone()
    }

    /// Checks if instances need to be wrapped in an interception proxy.
    pub fn needs_proxy(&self) -> Result<bool, InjectionTargetError> {
        Ok(!self.lifecycle_interceptors()?.is_empty()
            || self
                .business_method_chains()
                .values()
                .any(|chain| !chain.interceptors.is_empty()))
    }

    /// Creates one instance of every distinct interceptor taking part in any chain of this
    /// component. The result should be used for the whole lifetime of a single managed object.
    pub fn create_interceptor_instances(
        &self,
    ) -> Result<InterceptorInstances, InjectionTargetError> {
        let lifecycle_interceptors = self.lifecycle_interceptors()?;
        let business_methods = self.business_method_chains();

        let mut instances = InterceptorInstances::default();
        for interceptor in self
            .around_construct_interceptors()
            .iter()
            .chain(&lifecycle_interceptors.post_construct)
            .chain(&lifecycle_interceptors.pre_destroy)
            .chain(
                business_methods
                    .values()
                    .flat_map(|chain| chain.interceptors.iter()),
            )
        {
            if !instances.contains_key(interceptor.name()) {
                instances.insert(interceptor.name().to_string(), interceptor.create()?);
            }
        }

        Ok(instances)
    }

    /// Creates a new, not yet injected instance.
    pub fn produce(
        &self,
        interceptor_instances: &InterceptorInstances,
        instance_provider: &mut dyn ComponentInstanceProvider,
    ) -> Result<ManagedInstance, InjectionTargetError> {
        let constructor = self
            .constructor()
            .ok_or(InjectionTargetError::MissingConstructor(
                self.descriptor.name(),
            ))?;

        let parameters = self.resolve_parameters(constructor.key, instance_provider)?;

        let interceptors = self.around_construct_interceptors();
        if interceptors.is_empty() {
            return (constructor.invoker)(parameters)
                .map_err(|cause| self.instantiation_failed(constructor.key, cause));
        }

        self.record_invocation_context();
        let mut context = ChainInvocationContext::construction(
            interceptors,
            Some(interceptor_instances),
            constructor,
            parameters,
        );

        let instance = match attempt_chain_construction(&mut context) {
            Ok(Some(instance)) => Ok(instance),
            Ok(None) if self.strict_around_construct => Err(convert_error(
                InvocationError::ConstructorNotInvoked(constructor.key.name),
            )),
            Ok(None) => {
                debug!(
                    component = self.descriptor.name(),
                    "Around-construct chain did not invoke the constructor - invoking directly."
                );
                direct_construction(&mut context, constructor)
            }
            Err(error) => Err(error),
        };

        instance.map_err(|cause| self.instantiation_failed(constructor.key, cause))
    }

    /// Injects dependencies into a new instance, starting from the root ancestor.
    pub fn inject(
        &self,
        instance: &mut dyn Any,
        instance_provider: &mut dyn ComponentInstanceProvider,
    ) -> Result<(), InjectionTargetError> {
        self.inject_levels(self.descriptor.hierarchy(), instance, instance_provider)
    }

    /// Shares a produced and injected instance, wrapping it in a proxy if needed.
    pub fn wrap(
        &self,
        instance: ManagedInstance,
        interceptor_instances: InterceptorInstances,
    ) -> Result<ComponentInstanceAnyPtr, InjectionTargetError> {
        if !self.needs_proxy()? {
            return Ok(ComponentInstancePtr::from(instance));
        }

        debug!(
            component = self.descriptor.name(),
            interceptors = interceptor_instances.len(),
            "Wrapping instance in an interception proxy."
        );

        Ok(self.proxy_factory.wrap(
            self.descriptor.name(),
            instance,
            interceptor_instances,
            self.business_method_chains(),
        ))
    }

    /// Runs post-construct callbacks, ancestor-first, through the post-construct chain.
    pub fn post_construct(
        &self,
        instance: &ComponentInstanceAnyPtr,
    ) -> Result<(), InjectionTargetError> {
        self.invoke_lifecycle(
            InterceptionType::PostConstruct,
            instance,
            self.descriptor.post_construct_methods(),
        )
    }

    /// Runs pre-destroy callbacks, descendant-first, through the pre-destroy chain.
    pub fn pre_destroy(&self, instance: &ComponentInstanceAnyPtr) -> Result<(), InjectionTargetError> {
        self.invoke_lifecycle(
            InterceptionType::PreDestroy,
            instance,
            self.descriptor.pre_destroy_methods(),
        )
    }

    fn invoke_lifecycle(
        &self,
        phase: InterceptionType,
        instance: &ComponentInstanceAnyPtr,
        methods: &[LifecycleMethod],
    ) -> Result<(), InjectionTargetError> {
        let instance = self.unwrap_scope_proxy(instance)?;
        let handler = self.proxy_factory.dispatch_handler_of(&instance);

        if handler.is_none() && methods.is_empty() {
            return Ok(());
        }

        let interceptors = self.lifecycle_interceptors()?.for_phase(phase);
        let (target, interceptor_instances) = match handler {
            Some(handler) => (
                &**handler.real_instance() as &dyn Any,
                Some(handler.interceptor_instances()),
            ),
            None => (&*instance as &dyn Any, None),
        };

        trace!(
            component = self.descriptor.name(),
            ?phase,
            "Invoking lifecycle callbacks."
        );

        self.record_invocation_context();
        ChainInvocationContext::lifecycle(phase, target, interceptors, interceptor_instances, methods)
            .proceed()
            .map(|_| ())
            .map_err(|cause| InjectionTargetError::LifecycleFailed {
                component: self.descriptor.name(),
                phase,
                cause,
            })
    }

    fn unwrap_scope_proxy(
        &self,
        instance: &ComponentInstanceAnyPtr,
    ) -> Result<ComponentInstanceAnyPtr, InjectionTargetError> {
        Ok(self
            .proxy_factory
            .unwrap_scope_proxy(instance)
            .map_err(InjectionTargetError::ScopeProxyUnwrapFailed)?
            .unwrap_or_else(|| instance.clone()))
    }

    fn inject_levels(
        &self,
        levels: &[&'static str],
        instance: &mut dyn Any,
        instance_provider: &mut dyn ComponentInstanceProvider,
    ) -> Result<(), InjectionTargetError> {
        let Some((level, ancestors)) = levels.split_last() else {
            return Ok(());
        };

        self.inject_levels(ancestors, instance, instance_provider)?;

        trace!(
            component = self.descriptor.name(),
            level,
            "Injecting hierarchy level."
        );

        self.inject_fields(level, instance, instance_provider)?;
        self.inject_methods(level, instance, instance_provider)?;
        self.invoke_initializers(level, instance)?;
        self.inject_platform_resources(instance)
    }

    fn inject_fields(
        &self,
        level: &str,
        instance: &mut dyn Any,
        instance_provider: &mut dyn ComponentInstanceProvider,
    ) -> Result<(), InjectionTargetError> {
        for injection_point in self.injection_points_of(level) {
            if let InjectedMember::Field(field) = &injection_point.member {
                let value = self.resolve(injection_point, instance_provider)?;
                (field.setter)(instance, value)
                    .map_err(|cause| self.instantiation_failed(field.key, cause))?;
            }
        }

        Ok(())
    }

    fn inject_methods(
        &self,
        level: &str,
        instance: &mut dyn Any,
        instance_provider: &mut dyn ComponentInstanceProvider,
    ) -> Result<(), InjectionTargetError> {
        let mut injected_methods = FxHashSet::default();
        for injection_point in self.injection_points_of(level) {
            let InjectedMember::MethodParameter { method, .. } = &injection_point.member else {
                continue;
            };

            if injection_point.role != MemberRole::Plain || !injected_methods.insert(method.key) {
                continue;
            }

            let arguments = self.resolve_parameters(method.key, instance_provider)?;
            (method.invoker)(instance, arguments)
                .map_err(|cause| self.instantiation_failed(method.key, cause))?;
        }

        Ok(())
    }

    fn invoke_initializers(
        &self,
        level: &str,
        instance: &mut dyn Any,
    ) -> Result<(), InjectionTargetError> {
        for method in self
            .descriptor
            .methods()
            .iter()
            .filter(|method| method.key.declaring_type == level && method.is_initializer())
        {
            (method.invoker)(instance, vec![])
                .map_err(|cause| self.instantiation_failed(method.key, cause))?;
        }

        Ok(())
    }

    fn inject_platform_resources(&self, instance: &mut dyn Any) -> Result<(), InjectionTargetError> {
        let Some(service) = &self.resource_injection_service else {
            return Ok(());
        };

        service
            .inject_platform_resources(instance)
            .map_err(|cause| InjectionTargetError::InstantiationFailed {
                instance: format!("platform resources of component {}", self.descriptor.name()),
                cause,
            })
    }

    fn injection_points_of<'s>(
        &'s self,
        level: &'s str,
    ) -> impl Iterator<Item = &'s InjectionPoint> + 's {
        self.descriptor
            .injection_points()
            .iter()
            .filter(move |injection_point| injection_point.declaring_type() == level)
    }

    fn resolve(
        &self,
        injection_point: &InjectionPoint,
        instance_provider: &mut dyn ComponentInstanceProvider,
    ) -> Result<ComponentInstanceAnyPtr, InjectionTargetError> {
        instance_provider
            .instance_for(injection_point)
            .map_err(|cause| self.instantiation_failed(injection_point.member.key(), cause))
    }

    // arguments for a method or constructor, in parameter order
    fn resolve_parameters(
        &self,
        member: MemberKey,
        instance_provider: &mut dyn ComponentInstanceProvider,
    ) -> Result<Vec<ComponentInstanceAnyPtr>, InjectionTargetError> {
        self.descriptor
            .injection_points()
            .iter()
            .filter_map(|injection_point| match &injection_point.member {
                InjectedMember::MethodParameter { method, position } if method.key == member => {
                    Some((*position, injection_point))
                }
                InjectedMember::ConstructorParameter {
                    constructor,
                    position,
                } if constructor.key == member => Some((*position, injection_point)),
                _ => None,
            })
            .sorted_by_key(|(position, _)| *position)
            .map(|(_, injection_point)| self.resolve(injection_point, instance_provider))
            .try_collect()
    }

    fn instantiation_failed(&self, member: MemberKey, cause: ErrorPtr) -> InjectionTargetError {
        InjectionTargetError::InstantiationFailed {
            instance: format!("{member} of component {}", self.descriptor.name()),
            cause,
        }
    }

    #[inline]
    fn record_invocation_context(&self) {
        #[cfg(test)]
        self.invocation_contexts.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn invocation_contexts(&self) -> usize {
        self.invocation_contexts.load(Ordering::Relaxed)
    }
}

fn attempt_chain_construction(
    context: &mut ChainInvocationContext,
) -> Result<Option<ManagedInstance>, ErrorPtr> {
    context.proceed()?;
    Ok(context.take_new_instance())
}

fn direct_construction(
    context: &mut ChainInvocationContext,
    constructor: &ConstructorDescriptor,
) -> Result<ManagedInstance, ErrorPtr> {
    context.direct_proceed()?;
    context
        .take_new_instance()
        .ok_or_else(|| convert_error(InvocationError::ConstructorNotInvoked(constructor.key.name)))
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::descriptor::{
        ComponentDescriptor, ConstructorDescriptor, FieldDescriptor, InjectionPoint,
        LifecycleMethod, MemberKey, MemberRole, MethodDescriptor,
    };
    use crate::error::InjectionTargetError;
    use crate::injection_target::InjectionTarget;
    use crate::instance_provider::{
        convert_error, ComponentInstanceAnyPtr, ComponentInstanceProvider, ComponentInstancePtr,
        ErrorPtr, ManagedInstance,
    };
    use crate::interceptor::{
        InterceptionType, InterceptorDescriptor, InterceptorInfo, InterceptorInstance,
        InterceptorInstancePtr,
    };
    use crate::invocation::InvocationContext;
    use crate::proxy::{InterceptionProxy, MockContextualInstanceProvider, NormalScopeProxy};
    use crate::resource::{ResourceInjectionService, ResourceInjectionServicePtr};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Recorder {
        fn record<T: ToString>(&self, event: T) {
            self.0.lock().unwrap().push(event.to_string());
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn recorder(instance: &dyn Any) -> &Recorder {
        instance.downcast_ref::<Recorder>().unwrap()
    }

    #[derive(Default)]
    struct TestProvider {
        requested: Vec<&'static str>,
    }

    impl ComponentInstanceProvider for TestProvider {
        fn instance_for(
            &mut self,
            injection_point: &InjectionPoint,
        ) -> Result<ComponentInstanceAnyPtr, ErrorPtr> {
            self.requested.push(injection_point.required_type_name);
            Ok(ComponentInstancePtr::new(0u8) as ComponentInstanceAnyPtr)
        }
    }

    struct FailingProvider;

    impl ComponentInstanceProvider for FailingProvider {
        fn instance_for(
            &mut self,
            _injection_point: &InjectionPoint,
        ) -> Result<ComponentInstanceAnyPtr, ErrorPtr> {
            Err(convert_error(std::fmt::Error))
        }
    }

    static NEXT_INTERCEPTOR_ID: AtomicUsize = AtomicUsize::new(0);

    struct Tracking(usize);

    impl InterceptorInstance for Tracking {
        fn intercept(
            &self,
            phase: InterceptionType,
            context: &mut dyn InvocationContext,
        ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
            let result = context.proceed()?;
            if let Some(recorder) = context
                .target()
                .and_then(|target| target.downcast_ref::<Recorder>())
            {
                recorder.record(format!("interceptor#{} {:?}", self.0, phase));
            }

            Ok(result)
        }
    }

    struct Skipping;

    impl InterceptorInstance for Skipping {
        fn intercept(
            &self,
            _phase: InterceptionType,
            _context: &mut dyn InvocationContext,
        ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
            Ok(None)
        }
    }

    static CONSTRUCTOR_CALLS: AtomicUsize = AtomicUsize::new(0);

    // provides the required type name as the dependency
    struct TypeNameProvider;

    impl ComponentInstanceProvider for TypeNameProvider {
        fn instance_for(
            &mut self,
            injection_point: &InjectionPoint,
        ) -> Result<ComponentInstanceAnyPtr, ErrorPtr> {
            Ok(ComponentInstancePtr::new(injection_point.required_type_name)
                as ComponentInstanceAnyPtr)
        }
    }

    fn construct_counted(
        _arguments: Vec<ComponentInstanceAnyPtr>,
    ) -> Result<ManagedInstance, ErrorPtr> {
        CONSTRUCTOR_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(Box::<Recorder>::default())
    }

    fn construct_with_arguments(
        arguments: Vec<ComponentInstanceAnyPtr>,
    ) -> Result<ManagedInstance, ErrorPtr> {
        CONSTRUCTOR_CALLS.fetch_add(1, Ordering::SeqCst);

        let recorder = Recorder::default();
        for argument in arguments {
            recorder.record(argument.downcast_ref::<&'static str>().copied().unwrap_or_default());
        }

        Ok(Box::new(recorder))
    }

    fn tracking() -> Result<InterceptorInstancePtr, ErrorPtr> {
        Ok(ComponentInstancePtr::new(Tracking(
            NEXT_INTERCEPTOR_ID.fetch_add(1, Ordering::SeqCst),
        )) as InterceptorInstancePtr)
    }

    fn skipping() -> Result<InterceptorInstancePtr, ErrorPtr> {
        Ok(ComponentInstancePtr::new(Skipping) as InterceptorInstancePtr)
    }

    fn construct(_arguments: Vec<ComponentInstanceAnyPtr>) -> Result<ManagedInstance, ErrorPtr> {
        Ok(Box::<Recorder>::default())
    }

    fn set_b_x(instance: &mut dyn Any, _value: ComponentInstanceAnyPtr) -> Result<(), ErrorPtr> {
        recorder(instance).record("field B::x");
        Ok(())
    }

    fn set_a_y(instance: &mut dyn Any, _value: ComponentInstanceAnyPtr) -> Result<(), ErrorPtr> {
        recorder(instance).record("field A::y");
        Ok(())
    }

    fn configure_b(
        instance: &mut dyn Any,
        arguments: Vec<ComponentInstanceAnyPtr>,
    ) -> Result<(), ErrorPtr> {
        recorder(instance).record(format!("method B::configure({})", arguments.len()));
        Ok(())
    }

    fn producer_b(
        instance: &mut dyn Any,
        _arguments: Vec<ComponentInstanceAnyPtr>,
    ) -> Result<(), ErrorPtr> {
        recorder(instance).record("producer B::produce");
        Ok(())
    }

    fn init_a(instance: &mut dyn Any, _arguments: Vec<ComponentInstanceAnyPtr>) -> Result<(), ErrorPtr> {
        recorder(instance).record("initializer A::init");
        Ok(())
    }

    fn post_construct_a(instance: &dyn Any) -> Result<(), ErrorPtr> {
        recorder(instance).record("post A");
        Ok(())
    }

    fn post_construct_b(instance: &dyn Any) -> Result<(), ErrorPtr> {
        recorder(instance).record("post B");
        Ok(())
    }

    fn pre_destroy_a(instance: &dyn Any) -> Result<(), ErrorPtr> {
        recorder(instance).record("pre A");
        Ok(())
    }

    fn pre_destroy_b(instance: &dyn Any) -> Result<(), ErrorPtr> {
        recorder(instance).record("pre B");
        Ok(())
    }

    fn failing_callback(_instance: &dyn Any) -> Result<(), ErrorPtr> {
        Err(convert_error(std::fmt::Error))
    }

    fn constructor() -> ConstructorDescriptor {
        ConstructorDescriptor {
            key: MemberKey::new("A", "new"),
            parameter_count: 0,
            invoker: construct,
        }
    }

    // A extends B, with members on both levels
    fn descriptor(interceptor_info: Option<InterceptorInfo>) -> ComponentDescriptor {
        let configure = MethodDescriptor {
            key: MemberKey::new("B", "configure"),
            parameter_count: 2,
            inject: true,
            invoker: configure_b,
        };
        let producer = MethodDescriptor {
            key: MemberKey::new("B", "produce"),
            parameter_count: 1,
            inject: false,
            invoker: producer_b,
        };

        let mut builder = ComponentDescriptor::builder::<Recorder>("A")
            .with_superclasses(["B"])
            .with_default_constructor(constructor())
            .with_injection_point(InjectionPoint::field::<u8>(FieldDescriptor {
                key: MemberKey::new("A", "y"),
                setter: set_a_y,
            }))
            .with_injection_point(InjectionPoint::field::<u8>(FieldDescriptor {
                key: MemberKey::new("B", "x"),
                setter: set_b_x,
            }))
            .with_injection_point(InjectionPoint::method_parameter::<u16>(configure.clone(), 1))
            .with_injection_point(InjectionPoint::method_parameter::<u32>(configure.clone(), 0))
            .with_injection_point(
                InjectionPoint::method_parameter::<u64>(producer.clone(), 0)
                    .with_role(MemberRole::Producer),
            )
            .with_method(configure)
            .with_method(producer)
            .with_method(MethodDescriptor {
                key: MemberKey::new("A", "init"),
                parameter_count: 0,
                inject: true,
                invoker: init_a,
            })
            .with_post_construct(LifecycleMethod {
                key: MemberKey::new("A", "post_construct_a"),
                callback: post_construct_a,
            })
            .with_post_construct(LifecycleMethod {
                key: MemberKey::new("B", "post_construct_b"),
                callback: post_construct_b,
            })
            .with_pre_destroy(LifecycleMethod {
                key: MemberKey::new("B", "pre_destroy_b"),
                callback: pre_destroy_b,
            })
            .with_pre_destroy(LifecycleMethod {
                key: MemberKey::new("A", "pre_destroy_a"),
                callback: pre_destroy_a,
            });

        if let Some(interceptor_info) = interceptor_info {
            builder = builder.with_interceptor_info(interceptor_info);
        }

        builder.build().unwrap()
    }

    fn lifecycle_interceptor_info() -> InterceptorInfo {
        InterceptorInfo::default().with_environment_interceptor(ComponentInstancePtr::new(
            InterceptorDescriptor::environment(
                "tracking",
                [InterceptionType::PostConstruct, InterceptionType::PreDestroy],
                tracking,
            ),
        ))
    }

    fn around_construct_info(factory: crate::interceptor::InterceptorFactory) -> InterceptorInfo {
        InterceptorInfo::default().with_constructor_binding_interceptor(ComponentInstancePtr::new(
            InterceptorDescriptor::binding(
                "construct",
                ["Constructed"],
                [InterceptionType::AroundConstruct],
                factory,
            ),
        ))
    }

    fn create(target: &InjectionTarget) -> ComponentInstanceAnyPtr {
        let mut provider = TestProvider::default();
        let interceptor_instances = target.create_interceptor_instances().unwrap();
        let mut instance = target
            .produce(&interceptor_instances, &mut provider)
            .unwrap();
        target.inject(&mut *instance, &mut provider).unwrap();
        target.wrap(instance, interceptor_instances).unwrap()
    }

    #[test]
    fn should_inject_ancestor_first() {
        let target = InjectionTarget::new(descriptor(None));
        let mut provider = TestProvider::default();

        let mut instance = target.produce(&Default::default(), &mut provider).unwrap();
        target.inject(&mut *instance, &mut provider).unwrap();

        assert_eq!(
            recorder(&*instance).events(),
            [
                "field B::x",
                "method B::configure(2)",
                "field A::y",
                "initializer A::init"
            ]
        );
        assert_eq!(provider.requested, ["u8", "u32", "u16", "u8"]);
    }

    #[test]
    fn should_run_lifecycle_callbacks_in_hierarchy_order() {
        let target = InjectionTarget::new(descriptor(None));
        let instance = create(&target);

        target.post_construct(&instance).unwrap();
        target.pre_destroy(&instance).unwrap();

        let events = recorder(&*instance).events();
        assert_eq!(events[4..], ["post B", "post A", "pre A", "pre B"]);
    }

    #[test]
    fn should_skip_lifecycle_without_proxy_and_callbacks() {
        let target = InjectionTarget::new(
            ComponentDescriptor::builder::<Recorder>("A")
                .with_default_constructor(constructor())
                .build()
                .unwrap(),
        );
        let instance = create(&target);

        target.post_construct(&instance).unwrap();
        target.pre_destroy(&instance).unwrap();

        assert_eq!(target.invocation_contexts(), 0);
        assert!(!target.needs_proxy().unwrap());
    }

    #[test]
    fn should_reuse_interceptor_instances_for_proxied_instance() {
        let target = InjectionTarget::new(descriptor(Some(lifecycle_interceptor_info())));
        let instance = create(&target);

        target.post_construct(&instance).unwrap();
        target.post_construct(&instance).unwrap();
        target.pre_destroy(&instance).unwrap();

        let proxy = instance.downcast_ref::<InterceptionProxy>().unwrap();
        let interceptor_events = proxy
            .target::<Recorder>()
            .unwrap()
            .events()
            .into_iter()
            .filter(|event| event.starts_with("interceptor#"))
            .collect::<Vec<_>>();

        assert_eq!(interceptor_events.len(), 3);

        let ids = interceptor_events
            .iter()
            .map(|event| event.split(' ').next().unwrap())
            .collect::<Vec<_>>();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert!(interceptor_events[2].ends_with("PreDestroy"));
    }

    #[test]
    fn should_construct_through_interceptor() {
        let target = InjectionTarget::new(descriptor(Some(around_construct_info(tracking))));
        let mut provider = TestProvider::default();

        let interceptor_instances = target.create_interceptor_instances().unwrap();
        let instance = target
            .produce(&interceptor_instances, &mut provider)
            .unwrap();

        let events = recorder(&*instance).events();
        assert_eq!(events.len(), 1);
        assert!(events[0].ends_with("AroundConstruct"));
        assert_eq!(target.invocation_contexts(), 1);
    }

    #[test]
    fn should_fall_back_to_direct_construction() {
        let target = InjectionTarget::new(descriptor(Some(around_construct_info(skipping))));
        let mut provider = TestProvider::default();

        let instance = target.produce(&Default::default(), &mut provider).unwrap();
        assert!(instance.downcast_ref::<Recorder>().is_some());
    }

    #[test]
    fn should_reject_skipped_construction_in_strict_mode() {
        let target = InjectionTarget::new(descriptor(Some(around_construct_info(skipping))))
            .with_config(&EngineConfig::default().with_strict_around_construct(true));
        let mut provider = TestProvider::default();

        assert!(matches!(
            target
                .produce(&Default::default(), &mut provider)
                .unwrap_err(),
            InjectionTargetError::InstantiationFailed { .. }
        ));
    }

    #[test]
    fn should_report_missing_constructor() {
        let target = InjectionTarget::new(
            ComponentDescriptor::builder::<Recorder>("A")
                .build()
                .unwrap(),
        );

        assert!(!target.has_constructor());
        assert!(matches!(
            target
                .produce(&Default::default(), &mut TestProvider::default())
                .unwrap_err(),
            InjectionTargetError::MissingConstructor("A")
        ));
    }

    #[test]
    fn should_wrap_dependency_resolution_errors() {
        let target = InjectionTarget::new(descriptor(None));
        let mut instance = target
            .produce(&Default::default(), &mut TestProvider::default())
            .unwrap();

        let error = target
            .inject(&mut *instance, &mut FailingProvider)
            .unwrap_err();
        assert!(error.to_string().contains("B::x of component A"));
    }

    struct RecordingResourceService;

    impl ResourceInjectionService for RecordingResourceService {
        fn inject_platform_resources(&self, instance: &mut dyn Any) -> Result<(), ErrorPtr> {
            recorder(instance).record("resources");
            Ok(())
        }
    }

    struct FailingResourceService;

    impl ResourceInjectionService for FailingResourceService {
        fn inject_platform_resources(&self, _instance: &mut dyn Any) -> Result<(), ErrorPtr> {
            Err(convert_error(std::fmt::Error))
        }
    }

    #[test]
    fn should_inject_platform_resources_per_level() {
        let target = InjectionTarget::new(descriptor(None)).with_resource_injection_service(
            ComponentInstancePtr::new(RecordingResourceService) as ResourceInjectionServicePtr,
        );
        let instance = create(&target);

        assert_eq!(
            recorder(&*instance).events(),
            [
                "field B::x",
                "method B::configure(2)",
                "resources",
                "field A::y",
                "initializer A::init",
                "resources"
            ]
        );
    }

    #[test]
    fn should_propagate_platform_resource_errors() {
        let target = InjectionTarget::new(descriptor(None)).with_resource_injection_service(
            ComponentInstancePtr::new(FailingResourceService) as ResourceInjectionServicePtr,
        );
        let mut provider = TestProvider::default();
        let mut instance = target.produce(&Default::default(), &mut provider).unwrap();

        assert!(matches!(
            target.inject(&mut *instance, &mut provider).unwrap_err(),
            InjectionTargetError::InstantiationFailed { .. }
        ));
    }

    #[test]
    fn should_report_lifecycle_failure() {
        let target = InjectionTarget::new(
            ComponentDescriptor::builder::<Recorder>("A")
                .with_default_constructor(constructor())
                .with_pre_destroy(LifecycleMethod {
                    key: MemberKey::new("A", "close"),
                    callback: failing_callback,
                })
                .build()
                .unwrap(),
        );
        let instance = create(&target);

        assert!(matches!(
            target.pre_destroy(&instance).unwrap_err(),
            InjectionTargetError::LifecycleFailed {
                component: "A",
                phase: InterceptionType::PreDestroy,
                ..
            }
        ));
    }

    #[test]
    fn should_run_lifecycle_on_contextual_instance() {
        let target = InjectionTarget::new(descriptor(None));
        let contextual = create(&target);

        let mut provider = MockContextualInstanceProvider::new();
        {
            let contextual = contextual.clone();
            provider
                .expect_contextual_instance()
                .times(1)
                .returning(move || Ok(contextual.clone()));
        }

        let scope_proxy = ComponentInstancePtr::new(NormalScopeProxy::new(Box::new(provider)))
            as ComponentInstanceAnyPtr;

        target.post_construct(&scope_proxy).unwrap();
        assert_eq!(recorder(&*contextual).events()[4..], ["post B", "post A"]);
    }

    #[test]
    fn should_construct_once_through_injected_constructor() {
        let injected = ConstructorDescriptor {
            key: MemberKey::new("A", "with_dependencies"),
            parameter_count: 2,
            invoker: construct_with_arguments,
        };
        let descriptor = ComponentDescriptor::builder::<Recorder>("A")
            .with_default_constructor(ConstructorDescriptor {
                key: MemberKey::new("A", "new"),
                parameter_count: 0,
                invoker: construct_counted,
            })
            .with_injection_point(InjectionPoint::constructor_parameter::<u16>(
                injected.clone(),
                1,
            ))
            .with_injection_point(InjectionPoint::constructor_parameter::<u8>(injected, 0))
            .build()
            .unwrap();
        let target = InjectionTarget::new(descriptor);

        assert_eq!(target.constructor().unwrap().key.name, "with_dependencies");

        let instance = target
            .produce(&Default::default(), &mut TypeNameProvider)
            .unwrap();

        assert_eq!(CONSTRUCTOR_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(recorder(&*instance).events(), ["u8", "u16"]);
    }
}

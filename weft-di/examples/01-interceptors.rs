use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use weft_di::config::EngineConfig;
use weft_di::descriptor::{BusinessMethod, ComponentDescriptor, ConstructorDescriptor, MemberKey};
use weft_di::factory::ComponentFactoryBuilder;
use weft_di::injection_target::InjectionTarget;
use weft_di::instance_provider::{
    ComponentInstanceAnyPtr, ComponentInstancePtr, ErrorPtr, ManagedInstance,
};
use weft_di::interceptor::{
    BusinessMethodInterceptorInfo, InterceptionType, InterceptorDescriptor, InterceptorInfo,
    InterceptorInstance, InterceptorInstancePtr,
};
use weft_di::invocation::InvocationContext;
use weft_di::proxy::InterceptionProxy;

struct Calculator;

// interceptors can keep state - a single instance is used for the whole lifetime of an object
#[derive(Default)]
struct CallCounter {
    calls: AtomicUsize,
}

impl InterceptorInstance for CallCounter {
    fn intercept(
        &self,
        phase: InterceptionType,
        context: &mut dyn InvocationContext,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        println!("{phase:?} call #{calls} of {:?}", context.member());

        context.proceed()
    }
}

fn call_counter() -> Result<InterceptorInstancePtr, ErrorPtr> {
    Ok(ComponentInstancePtr::new(CallCounter::default()) as InterceptorInstancePtr)
}

fn construct(_arguments: Vec<ComponentInstanceAnyPtr>) -> Result<ManagedInstance, ErrorPtr> {
    Ok(Box::new(Calculator))
}

fn double(
    _instance: &dyn Any,
    arguments: &[ComponentInstanceAnyPtr],
) -> Result<ComponentInstanceAnyPtr, ErrorPtr> {
    let value = arguments
        .first()
        .and_then(|value| value.downcast_ref::<i32>())
        .copied()
        .unwrap_or_default();

    Ok(ComponentInstancePtr::new(value * 2) as ComponentInstanceAnyPtr)
}

//noinspection DuplicatedCode
// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let counter = ComponentInstancePtr::new(InterceptorDescriptor::binding(
        "call_counter",
        ["Counted"],
        [InterceptionType::AroundConstruct, InterceptionType::AroundInvoke],
        call_counter,
    ));

    let calculator = ComponentDescriptor::builder::<Calculator>("calculator")
        .with_default_constructor(ConstructorDescriptor {
            key: MemberKey::new("calculator", "new"),
            parameter_count: 0,
            invoker: construct,
        })
        .with_business_method(BusinessMethod {
            key: MemberKey::new("calculator", "double"),
            invoker: double,
        })
        .with_interceptor_info(
            InterceptorInfo::default()
                .with_constructor_binding_interceptor(counter.clone())
                .with_business_method(
                    "double",
                    BusinessMethodInterceptorInfo {
                        environment_interceptors: vec![],
                        binding_interceptors: vec![counter],
                    },
                ),
        )
        .build()
        .expect("invalid calculator descriptor");

    // the config can come from weft.json or WEFT_ environment variables
    let config = EngineConfig::init_from_environment().expect("error reading config");

    let mut component_factory = ComponentFactoryBuilder::from_config(&config).build();
    component_factory
        .target_registry()
        .register(InjectionTarget::new(calculator).with_config(&config))
        .expect("error registering calculator");

    // prints "AroundConstruct call #1 ..."
    let handle = component_factory
        .create(TypeId::of::<Calculator>())
        .expect("error creating Calculator");

    let instance = component_factory
        .instance(handle)
        .expect("missing Calculator");
    let proxy = instance
        .downcast_ref::<InterceptionProxy>()
        .expect("Calculator should be proxied");

    // prints "AroundInvoke call #2 ..." - the same interceptor instance saw construction
    let result = proxy
        .invoke(
            "double",
            vec![ComponentInstancePtr::new(21) as ComponentInstanceAnyPtr],
        )
        .expect("error calling double");

    // prints "Some(42)"
    println!("{:?}", result.downcast_ref::<i32>());
}

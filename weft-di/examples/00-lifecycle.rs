use std::any::{Any, TypeId};
use tracing_subscriber::EnvFilter;
use weft_di::descriptor::{
    ComponentDescriptor, ConstructorDescriptor, FieldDescriptor, InjectionPoint, LifecycleMethod,
    MemberKey,
};
use weft_di::factory::ComponentFactoryBuilder;
use weft_di::injection_target::InjectionTarget;
use weft_di::instance_provider::{
    convert_error, downcast_dependency, ComponentInstanceAnyPtr, ComponentInstancePtr, ErrorPtr,
    IncompatibleDependency, ManagedInstance,
};

// a dependency with no dependencies of its own
struct Clock;

impl Clock {
    fn now(&self) -> &'static str {
        "noon"
    }
}

// a component extending a base type - base members are always injected and initialized first
#[derive(Default)]
struct Reporter {
    // declared by the base type
    clock: Option<ComponentInstancePtr<Clock>>,
}

// components are created through plain function pointers, which usually would be generated
fn construct_clock(_arguments: Vec<ComponentInstanceAnyPtr>) -> Result<ManagedInstance, ErrorPtr> {
    Ok(Box::new(Clock))
}

fn construct_reporter(
    _arguments: Vec<ComponentInstanceAnyPtr>,
) -> Result<ManagedInstance, ErrorPtr> {
    Ok(Box::<Reporter>::default())
}

fn set_clock(instance: &mut dyn Any, value: ComponentInstanceAnyPtr) -> Result<(), ErrorPtr> {
    let reporter = instance
        .downcast_mut::<Reporter>()
        .ok_or_else(|| convert_error(IncompatibleDependency("Reporter")))?;
    reporter.clock = Some(downcast_dependency(value)?);
    Ok(())
}

fn report(instance: &dyn Any) -> Result<(), ErrorPtr> {
    if let Some(clock) = instance
        .downcast_ref::<Reporter>()
        .and_then(|reporter| reporter.clock.as_ref())
    {
        println!("Reporter ready at {}", clock.now());
    }

    Ok(())
}

fn say_goodbye(_instance: &dyn Any) -> Result<(), ErrorPtr> {
    println!("Reporter going away");
    Ok(())
}

//noinspection DuplicatedCode
// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // run with RUST_LOG=trace to see what the engine does
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let clock = ComponentDescriptor::builder::<Clock>("clock")
        .with_default_constructor(ConstructorDescriptor {
            key: MemberKey::new("clock", "new"),
            parameter_count: 0,
            invoker: construct_clock,
        })
        .build()
        .expect("invalid clock descriptor");

    let reporter = ComponentDescriptor::builder::<Reporter>("reporter")
        .with_superclasses(["base_reporter"])
        .with_default_constructor(ConstructorDescriptor {
            key: MemberKey::new("reporter", "new"),
            parameter_count: 0,
            invoker: construct_reporter,
        })
        .with_injection_point(InjectionPoint::field::<Clock>(FieldDescriptor {
            key: MemberKey::new("base_reporter", "clock"),
            setter: set_clock,
        }))
        .with_post_construct(LifecycleMethod {
            key: MemberKey::new("reporter", "report"),
            callback: report,
        })
        .with_pre_destroy(LifecycleMethod {
            key: MemberKey::new("reporter", "say_goodbye"),
            callback: say_goodbye,
        })
        .build()
        .expect("invalid reporter descriptor");

    let mut component_factory = ComponentFactoryBuilder::new().build();
    component_factory
        .target_registry()
        .register(InjectionTarget::new(clock))
        .expect("error registering clock");
    component_factory
        .target_registry()
        .register(InjectionTarget::new(reporter))
        .expect("error registering reporter");

    // prints "Reporter ready at noon"
    let handle = component_factory
        .create(TypeId::of::<Reporter>())
        .expect("error creating Reporter");

    // prints "Reporter going away" and destroys the injected clock along with the reporter
    component_factory
        .destroy(handle)
        .expect("error destroying Reporter");
}

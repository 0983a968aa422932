use crate::instance_provider::ErrorPtr;
use crate::interceptor::InterceptionType;
use thiserror::Error;

/// Errors surfaced by an [InjectionTarget](crate::injection_target::InjectionTarget) and the
/// [ComponentFactory](crate::factory::ComponentFactory) driving it. All failures reaching a caller
/// have this single shape.
#[derive(Error, Clone, Debug)]
pub enum InjectionTargetError {
    #[error("Cannot instantiate {instance}: {cause}")]
    InstantiationFailed { instance: String, cause: ErrorPtr },
    #[error("{phase:?} invocation failed for component {component}: {cause}")]
    LifecycleFailed {
        component: &'static str,
        phase: InterceptionType,
        cause: ErrorPtr,
    },
    #[error("Business method {method} failed for component {component}: {cause}")]
    InvocationFailed {
        component: &'static str,
        method: &'static str,
        cause: ErrorPtr,
    },
    #[error("Component {0} has no usable constructor")]
    MissingConstructor(&'static str),
    #[error("Lifecycle interceptors for component {0} have already been resolved")]
    InterceptorsAlreadyResolved(&'static str),
    #[error("Cannot create interceptor {interceptor}: {cause}")]
    InterceptorCreationFailed { interceptor: String, cause: ErrorPtr },
    #[error("Component {component} has no business method named {method}")]
    UnknownBusinessMethod {
        component: &'static str,
        method: String,
    },
    #[error("Cannot find an injection target for: {0}")]
    UnknownComponent(String),
    #[error("Detected dependency cycle for: {0}")]
    DependencyCycle(&'static str),
    #[error("Cannot resolve contextual instance behind a scope proxy: {0}")]
    ScopeProxyUnwrapFailed(ErrorPtr),
}

/// Configuration errors detected while defining components. They are fatal only to the definition
/// being registered.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum DefinitionError {
    #[error("Component name must not be empty")]
    EmptyName,
    #[error("Member {member} of component {component} is declared on {declaring_type}, which is not part of its hierarchy")]
    UnknownDeclaringType {
        component: &'static str,
        member: &'static str,
        declaring_type: &'static str,
    },
    #[error("Component {component} has injection points on multiple constructors: {first} and {second}")]
    ConflictingConstructors {
        component: &'static str,
        first: &'static str,
        second: &'static str,
    },
    #[error("Injection points of {member} in component {component} must cover each of its {parameter_count} parameters exactly once")]
    InvalidParameterPositions {
        component: &'static str,
        member: &'static str,
        parameter_count: usize,
    },
    #[error("Component {0} declares around-construct interceptors, but has no usable constructor")]
    AroundConstructWithoutConstructor(&'static str),
    #[error("Attempted to register a duplicated injection target for type: {0}")]
    DuplicateInjectionTarget(&'static str),
    #[error("Attempted to register a duplicated component with name: {0}")]
    DuplicateComponentName(&'static str),
}

/// Errors raised by an invocation chain itself, as opposed to errors raised by interceptors or
/// target methods.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum InvocationError {
    #[error("{0:?} invocation chain has already completed")]
    AlreadyCompleted(InterceptionType),
    #[error("{0:?} invocation chain has already failed")]
    AlreadyFailed(InterceptionType),
    #[error("Around-construct chain finished without invoking constructor {0}")]
    ConstructorNotInvoked(&'static str),
    #[error("Expected {expected} parameters, got {actual}")]
    ParameterCountMismatch { expected: usize, actual: usize },
    #[error("{0:?} invocation does not accept parameters")]
    ParametersNotSupported(InterceptionType),
}

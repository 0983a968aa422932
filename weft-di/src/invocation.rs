//! Invocation contexts drive a single pass through an interceptor chain, ending with a terminal
//! step: lifecycle callbacks, a deferred constructor call, or a business method.
//!
//! A context starts [pending](InvocationState::Pending), becomes
//! [running](InvocationState::Running) on the first [InvocationContext::proceed], and ends as
//! [completed](InvocationState::Completed) or [failed](InvocationState::Failed) when the outermost
//! `proceed` returns. Interceptors call `proceed` to run the rest of the chain; a nested call
//! returns the cursor to the interceptor after it finishes, so an interceptor may proceed again.

use crate::descriptor::{BusinessMethod, ConstructorDescriptor, LifecycleMethod, MemberKey};
use crate::error::{InjectionTargetError, InvocationError};
use crate::instance_provider::{
    convert_error, ComponentInstanceAnyPtr, ErrorPtr, ManagedInstance,
};
use crate::interceptor::{
    InterceptionType, InterceptorDescriptorPtr, InterceptorInstancePtr, InterceptorInstances,
};
use fxhash::FxHashMap;
use std::any::Any;
use tracing::trace;

/// State of an [InvocationContext].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InvocationState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// View of an invocation, as seen by interceptors.
pub trait InvocationContext {
    /// The phase being intercepted.
    fn phase(&self) -> InterceptionType;

    /// The target instance. Around-construct invocations have a target only after the constructor
    /// has been invoked.
    fn target(&self) -> Option<&dyn Any>;

    /// The intercepted member: the constructor or business method. `None` for lifecycle callbacks.
    fn member(&self) -> Option<MemberKey>;

    /// Parameters passed to the constructor or business method.
    fn parameters(&self) -> &[ComponentInstanceAnyPtr];

    /// Replaces parameters passed to the constructor or business method.
    fn set_parameters(&mut self, parameters: Vec<ComponentInstanceAnyPtr>) -> Result<(), ErrorPtr>;

    /// Data shared between interceptors of this invocation.
    fn context_data(&mut self) -> &mut FxHashMap<String, ComponentInstanceAnyPtr>;

    /// Proceeds to the next interceptor or, at the end of the chain, the terminal step. Returns the
    /// business method result for around-invoke and `None` otherwise.
    fn proceed(&mut self) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr>;
}

enum Terminal<'a> {
    Lifecycle {
        target: &'a dyn Any,
        methods: &'a [LifecycleMethod],
    },
    Construct {
        constructor: &'a ConstructorDescriptor,
        new_instance: Option<ManagedInstance>,
    },
    Invoke {
        target: &'a dyn Any,
        method: &'a BusinessMethod,
    },
}

/// [InvocationContext] running an ordered interceptor chain.
pub struct ChainInvocationContext<'a> {
    phase: InterceptionType,
    interceptors: &'a [InterceptorDescriptorPtr],
    instances: Option<&'a InterceptorInstances>,
    created_instances: InterceptorInstances,
    cursor: usize,
    depth: usize,
    state: InvocationState,
    parameters: Vec<ComponentInstanceAnyPtr>,
    context_data: FxHashMap<String, ComponentInstanceAnyPtr>,
    terminal: Terminal<'a>,
}

impl<'a> ChainInvocationContext<'a> {
    fn new(
        phase: InterceptionType,
        interceptors: &'a [InterceptorDescriptorPtr],
        instances: Option<&'a InterceptorInstances>,
        parameters: Vec<ComponentInstanceAnyPtr>,
        terminal: Terminal<'a>,
    ) -> Self {
        trace!(?phase, interceptors = interceptors.len(), "Creating invocation context.");

        Self {
            phase,
            interceptors,
            instances,
            created_instances: Default::default(),
            cursor: 0,
            depth: 0,
            state: InvocationState::Pending,
            parameters,
            context_data: Default::default(),
            terminal,
        }
    }

    /// Creates a context invoking all `methods` on `target` after the interceptors.
    pub fn lifecycle(
        phase: InterceptionType,
        target: &'a dyn Any,
        interceptors: &'a [InterceptorDescriptorPtr],
        instances: Option<&'a InterceptorInstances>,
        methods: &'a [LifecycleMethod],
    ) -> Self {
        Self::new(
            phase,
            interceptors,
            instances,
            vec![],
            Terminal::Lifecycle { target, methods },
        )
    }

    /// Creates a context invoking `constructor` with `parameters` after the interceptors. The new
    /// instance can be retrieved with [ChainInvocationContext::take_new_instance].
    pub fn construction(
        interceptors: &'a [InterceptorDescriptorPtr],
        instances: Option<&'a InterceptorInstances>,
        constructor: &'a ConstructorDescriptor,
        parameters: Vec<ComponentInstanceAnyPtr>,
    ) -> Self {
        Self::new(
            InterceptionType::AroundConstruct,
            interceptors,
            instances,
            parameters,
            Terminal::Construct {
                constructor,
                new_instance: None,
            },
        )
    }

    /// Creates a context invoking a business `method` on `target` after the interceptors.
    pub fn business(
        target: &'a dyn Any,
        method: &'a BusinessMethod,
        interceptors: &'a [InterceptorDescriptorPtr],
        instances: Option<&'a InterceptorInstances>,
        parameters: Vec<ComponentInstanceAnyPtr>,
    ) -> Self {
        Self::new(
            InterceptionType::AroundInvoke,
            interceptors,
            instances,
            parameters,
            Terminal::Invoke { target, method },
        )
    }

    #[inline]
    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Runs the terminal step immediately, bypassing remaining interceptors.
    pub fn direct_proceed(&mut self) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        if self.state == InvocationState::Failed {
            return Err(convert_error(InvocationError::AlreadyFailed(self.phase)));
        }

        let result = self.invoke_terminal();
        if self.depth == 0 {
            self.finish(&result);
        }

        result
    }

    /// Takes the instance created by the constructor, if it has been invoked.
    pub fn take_new_instance(&mut self) -> Option<ManagedInstance> {
        match &mut self.terminal {
            Terminal::Construct { new_instance, .. } => new_instance.take(),
            _ => None,
        }
    }

    fn finish<T>(&mut self, result: &Result<T, ErrorPtr>) {
        self.state = if result.is_ok() {
            InvocationState::Completed
        } else {
            InvocationState::Failed
        };
    }

    fn interceptor_instance(
        &mut self,
        interceptor: &InterceptorDescriptorPtr,
    ) -> Result<InterceptorInstancePtr, InjectionTargetError> {
        if let Some(instance) = self
            .instances
            .and_then(|instances| instances.get(interceptor.name()))
        {
            return Ok(instance.clone());
        }

        if let Some(instance) = self.created_instances.get(interceptor.name()) {
            return Ok(instance.clone());
        }

        let instance = interceptor.create()?;
        self.created_instances
            .insert(interceptor.name().to_string(), instance.clone());

        Ok(instance)
    }

    fn proceed_next(&mut self) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        let interceptors = self.interceptors;
        let Some(interceptor) = interceptors.get(self.cursor) else {
            return self.invoke_terminal();
        };

        let instance = self
            .interceptor_instance(interceptor)
            .map_err(convert_error)?;

        trace!(
            phase = ?self.phase,
            interceptor = interceptor.name(),
            "Invoking interceptor."
        );

        self.cursor += 1;
        let result = instance.intercept(self.phase, self);
        self.cursor -= 1;

        result
    }

    fn invoke_terminal(&mut self) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        match &mut self.terminal {
            Terminal::Lifecycle { target, methods } => {
                for method in methods.iter() {
                    trace!(method = %method.key, "Invoking lifecycle method.");
                    (method.callback)(*target)?;
                }

                Ok(None)
            }
            Terminal::Construct {
                constructor,
                new_instance,
            } => {
                *new_instance = Some((constructor.invoker)(self.parameters.clone())?);
                Ok(None)
            }
            Terminal::Invoke { target, method } => {
                (method.invoker)(*target, &self.parameters).map(Some)
            }
        }
    }
}

impl InvocationContext for ChainInvocationContext<'_> {
    #[inline]
    fn phase(&self) -> InterceptionType {
        self.phase
    }

    fn target(&self) -> Option<&dyn Any> {
        match &self.terminal {
            Terminal::Lifecycle { target, .. } | Terminal::Invoke { target, .. } => Some(*target),
            Terminal::Construct { new_instance, .. } => new_instance
                .as_ref()
                .map(|instance| &**instance as &dyn Any),
        }
    }

    fn member(&self) -> Option<MemberKey> {
        match &self.terminal {
            Terminal::Lifecycle { .. } => None,
            Terminal::Construct { constructor, .. } => Some(constructor.key),
            Terminal::Invoke { method, .. } => Some(method.key),
        }
    }

    #[inline]
    fn parameters(&self) -> &[ComponentInstanceAnyPtr] {
        &self.parameters
    }

    fn set_parameters(&mut self, parameters: Vec<ComponentInstanceAnyPtr>) -> Result<(), ErrorPtr> {
        match &self.terminal {
            Terminal::Lifecycle { .. } => Err(convert_error(
                InvocationError::ParametersNotSupported(self.phase),
            )),
            _ if parameters.len() != self.parameters.len() => {
                Err(convert_error(InvocationError::ParameterCountMismatch {
                    expected: self.parameters.len(),
                    actual: parameters.len(),
                }))
            }
            _ => {
                self.parameters = parameters;
                Ok(())
            }
        }
    }

    #[inline]
    fn context_data(&mut self) -> &mut FxHashMap<String, ComponentInstanceAnyPtr> {
        &mut self.context_data
    }

    fn proceed(&mut self) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        match self.state {
            InvocationState::Completed => {
                return Err(convert_error(InvocationError::AlreadyCompleted(self.phase)))
            }
            InvocationState::Failed => {
                return Err(convert_error(InvocationError::AlreadyFailed(self.phase)))
            }
            InvocationState::Pending => self.state = InvocationState::Running,
            InvocationState::Running => {}
        }

        self.depth += 1;
        let result = self.proceed_next();
        self.depth -= 1;

        if self.depth == 0 {
            self.finish(&result);
        }

        result
    }
}

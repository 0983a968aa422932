//! Immutable component metadata consumed by the engine. Descriptors are produced once, when a
//! component type gets defined, by whatever discovers components (a derive macro, a registration
//! function, a configuration loader). The engine never introspects types on its own - everything
//! it needs to construct, inject and call lifecycle methods is captured here as plain data and
//! function pointers.
//!
//! Rust has no inheritance, so the type hierarchy of a component is described explicitly as a list
//! of levels, from the root ancestor down to the most-derived type. Every member names the level
//! declaring it, which decides the order of injection and lifecycle callbacks:
//!
//! ```
//! use weft_di::descriptor::{
//!     ComponentDescriptor, FieldDescriptor, InjectionPoint, LifecycleMethod, MemberKey,
//! };
//! use weft_di::instance_provider::{ComponentInstanceAnyPtr, ErrorPtr};
//! use std::any::Any;
//!
//! struct Component;
//!
//! fn set_x(_instance: &mut dyn Any, _value: ComponentInstanceAnyPtr) -> Result<(), ErrorPtr> {
//!     Ok(())
//! }
//!
//! fn init_base(_instance: &dyn Any) -> Result<(), ErrorPtr> {
//!     Ok(())
//! }
//!
//! let descriptor = ComponentDescriptor::builder::<Component>("Component")
//!     .with_superclasses(["Base"])
//!     .with_injection_point(InjectionPoint::field::<u8>(FieldDescriptor {
//!         key: MemberKey::new("Base", "x"),
//!         setter: set_x,
//!     }))
//!     .with_post_construct(LifecycleMethod {
//!         key: MemberKey::new("Base", "init_base"),
//!         callback: init_base,
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(descriptor.hierarchy(), ["Base", "Component"]);
//! ```

use crate::error::DefinitionError;
use crate::instance_provider::{ComponentInstanceAnyPtr, ErrorPtr, ManagedInstance};
use crate::interceptor::InterceptorInfo;
use derivative::Derivative;
use itertools::Itertools;
use std::any::{Any, TypeId};
use std::fmt::{Display, Formatter};

/// Sets an injected value on a field of a type-erased instance.
pub type FieldSetter =
    fn(instance: &mut dyn Any, value: ComponentInstanceAnyPtr) -> Result<(), ErrorPtr>;

/// Calls an injection method with resolved arguments, in parameter order.
pub type MethodInvoker =
    fn(instance: &mut dyn Any, arguments: Vec<ComponentInstanceAnyPtr>) -> Result<(), ErrorPtr>;

/// Creates a new instance from resolved arguments, in parameter order.
pub type ConstructorInvoker =
    fn(arguments: Vec<ComponentInstanceAnyPtr>) -> Result<ManagedInstance, ErrorPtr>;

/// Post-construct or pre-destroy callback. Instances are shared once constructed, so callbacks
/// needing mutation should rely on interior mutability.
pub type LifecycleCallback = fn(instance: &dyn Any) -> Result<(), ErrorPtr>;

/// Calls a business method on a type-erased instance and returns its result.
pub type BusinessMethodInvoker = fn(
    instance: &dyn Any,
    arguments: &[ComponentInstanceAnyPtr],
) -> Result<ComponentInstanceAnyPtr, ErrorPtr>;

/// Identity of a member: the hierarchy level declaring it and its name.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MemberKey {
    pub declaring_type: &'static str,
    pub name: &'static str,
}

impl MemberKey {
    pub const fn new(declaring_type: &'static str, name: &'static str) -> Self {
        Self {
            declaring_type,
            name,
        }
    }
}

impl Display for MemberKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

/// Role of the member owning an injection point. Only [MemberRole::Plain] methods take part in
/// method injection - producer, disposer and observer methods get their parameters injected when
/// invoked by their respective subsystems.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
pub enum MemberRole {
    #[default]
    Plain,
    Producer,
    Disposer,
    Observer,
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct FieldDescriptor {
    pub key: MemberKey,
    #[derivative(Debug = "ignore")]
    pub setter: FieldSetter,
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct MethodDescriptor {
    pub key: MemberKey,
    pub parameter_count: usize,
    /// Is the method marked for injection. Marked methods without parameters are initializers.
    pub inject: bool,
    #[derivative(Debug = "ignore")]
    pub invoker: MethodInvoker,
}

impl MethodDescriptor {
    #[inline]
    pub fn is_initializer(&self) -> bool {
        self.inject && self.parameter_count == 0
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ConstructorDescriptor {
    pub key: MemberKey,
    pub parameter_count: usize,
    #[derivative(Debug = "ignore")]
    pub invoker: ConstructorInvoker,
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct LifecycleMethod {
    pub key: MemberKey,
    #[derivative(Debug = "ignore")]
    pub callback: LifecycleCallback,
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BusinessMethod {
    pub key: MemberKey,
    #[derivative(Debug = "ignore")]
    pub invoker: BusinessMethodInvoker,
}

/// The member an [InjectionPoint] belongs to.
#[derive(Clone, Debug)]
pub enum InjectedMember {
    Field(FieldDescriptor),
    MethodParameter {
        method: MethodDescriptor,
        position: usize,
    },
    ConstructorParameter {
        constructor: ConstructorDescriptor,
        position: usize,
    },
}

impl InjectedMember {
    pub fn key(&self) -> MemberKey {
        match self {
            InjectedMember::Field(field) => field.key,
            InjectedMember::MethodParameter { method, .. } => method.key,
            InjectedMember::ConstructorParameter { constructor, .. } => constructor.key,
        }
    }
}

/// A single dependency required by a component: a field, a method parameter or a constructor
/// parameter.
#[derive(Clone, Debug)]
pub struct InjectionPoint {
    pub member: InjectedMember,
    pub required_type: TypeId,
    pub required_type_name: &'static str,
    pub role: MemberRole,
}

impl InjectionPoint {
    fn new<T: ?Sized + 'static>(member: InjectedMember) -> Self {
        Self {
            member,
            required_type: TypeId::of::<T>(),
            required_type_name: std::any::type_name::<T>(),
            role: MemberRole::Plain,
        }
    }

    /// Field injection point requiring `T`.
    pub fn field<T: ?Sized + 'static>(field: FieldDescriptor) -> Self {
        Self::new::<T>(InjectedMember::Field(field))
    }

    /// Injection point for parameter `position` of `method`, requiring `T`.
    pub fn method_parameter<T: ?Sized + 'static>(method: MethodDescriptor, position: usize) -> Self {
        Self::new::<T>(InjectedMember::MethodParameter { method, position })
    }

    /// Injection point for parameter `position` of `constructor`, requiring `T`.
    pub fn constructor_parameter<T: ?Sized + 'static>(
        constructor: ConstructorDescriptor,
        position: usize,
    ) -> Self {
        Self::new::<T>(InjectedMember::ConstructorParameter {
            constructor,
            position,
        })
    }

    pub fn with_role(mut self, role: MemberRole) -> Self {
        self.role = role;
        self
    }

    #[inline]
    pub fn declaring_type(&self) -> &'static str {
        self.member.key().declaring_type
    }
}

/// Complete, immutable description of a managed component type.
#[derive(Debug)]
pub struct ComponentDescriptor {
    type_id: TypeId,
    name: &'static str,
    hierarchy: Vec<&'static str>,
    injection_points: Vec<InjectionPoint>,
    methods: Vec<MethodDescriptor>,
    default_constructor: Option<ConstructorDescriptor>,
    post_construct_methods: Vec<LifecycleMethod>,
    pre_destroy_methods: Vec<LifecycleMethod>,
    business_methods: Vec<BusinessMethod>,
    interceptor_info: Option<InterceptorInfo>,
}

impl ComponentDescriptor {
    /// Starts building a descriptor for `T`, whose most-derived hierarchy level is called `name`.
    pub fn builder<T: ?Sized + 'static>(name: &'static str) -> ComponentDescriptorBuilder {
        ComponentDescriptorBuilder::new(TypeId::of::<T>(), name)
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Hierarchy levels, root ancestor first.
    #[inline]
    pub fn hierarchy(&self) -> &[&'static str] {
        &self.hierarchy
    }

    #[inline]
    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    #[inline]
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    #[inline]
    pub fn default_constructor(&self) -> Option<&ConstructorDescriptor> {
        self.default_constructor.as_ref()
    }

    /// Constructor referenced by constructor injection points, if any.
    pub fn injected_constructor(&self) -> Option<&ConstructorDescriptor> {
        self.injection_points
            .iter()
            .find_map(|injection_point| match &injection_point.member {
                InjectedMember::ConstructorParameter { constructor, .. } => Some(constructor),
                _ => None,
            })
    }

    /// Post-construct methods, ancestor-first.
    #[inline]
    pub fn post_construct_methods(&self) -> &[LifecycleMethod] {
        &self.post_construct_methods
    }

    /// Pre-destroy methods, descendant-first.
    #[inline]
    pub fn pre_destroy_methods(&self) -> &[LifecycleMethod] {
        &self.pre_destroy_methods
    }

    #[inline]
    pub fn business_methods(&self) -> &[BusinessMethod] {
        &self.business_methods
    }

    #[inline]
    pub fn interceptor_info(&self) -> Option<&InterceptorInfo> {
        self.interceptor_info.as_ref()
    }
}

/// Builder validating and ordering component metadata.
pub struct ComponentDescriptorBuilder {
    type_id: TypeId,
    name: &'static str,
    superclasses: Vec<&'static str>,
    injection_points: Vec<InjectionPoint>,
    methods: Vec<MethodDescriptor>,
    default_constructor: Option<ConstructorDescriptor>,
    post_construct_methods: Vec<LifecycleMethod>,
    pre_destroy_methods: Vec<LifecycleMethod>,
    business_methods: Vec<BusinessMethod>,
    interceptor_info: Option<InterceptorInfo>,
}

impl ComponentDescriptorBuilder {
    pub fn new(type_id: TypeId, name: &'static str) -> Self {
        Self {
            type_id,
            name,
            superclasses: vec![],
            injection_points: vec![],
            methods: vec![],
            default_constructor: None,
            post_construct_methods: vec![],
            pre_destroy_methods: vec![],
            business_methods: vec![],
            interceptor_info: None,
        }
    }

    /// Sets the ancestor levels, root first. The component itself is always the last level.
    pub fn with_superclasses<I: IntoIterator<Item = &'static str>>(mut self, levels: I) -> Self {
        self.superclasses = levels.into_iter().collect();
        self
    }

    pub fn with_injection_point(mut self, injection_point: InjectionPoint) -> Self {
        self.injection_points.push(injection_point);
        self
    }

    /// Adds a declared method. Declared methods are searched for parameterless initializers.
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_default_constructor(mut self, constructor: ConstructorDescriptor) -> Self {
        self.default_constructor = Some(constructor);
        self
    }

    pub fn with_post_construct(mut self, method: LifecycleMethod) -> Self {
        self.post_construct_methods.push(method);
        self
    }

    pub fn with_pre_destroy(mut self, method: LifecycleMethod) -> Self {
        self.pre_destroy_methods.push(method);
        self
    }

    pub fn with_business_method(mut self, method: BusinessMethod) -> Self {
        self.business_methods.push(method);
        self
    }

    pub fn with_interceptor_info(mut self, interceptor_info: InterceptorInfo) -> Self {
        self.interceptor_info = Some(interceptor_info);
        self
    }

    pub fn build(self) -> Result<ComponentDescriptor, DefinitionError> {
        if self.name.is_empty() {
            return Err(DefinitionError::EmptyName);
        }

        let mut hierarchy = self.superclasses;
        hierarchy.push(self.name);

        let depth = |key: &MemberKey| -> Result<usize, DefinitionError> {
            hierarchy
                .iter()
                .position(|level| *level == key.declaring_type)
                .ok_or(DefinitionError::UnknownDeclaringType {
                    component: self.name,
                    member: key.name,
                    declaring_type: key.declaring_type,
                })
        };

        for key in self
            .injection_points
            .iter()
            .map(|injection_point| injection_point.member.key())
            .chain(self.methods.iter().map(|method| method.key))
            .chain(self.default_constructor.iter().map(|constructor| constructor.key))
            .chain(self.business_methods.iter().map(|method| method.key))
        {
            depth(&key)?;
        }

        let constructors = self
            .injection_points
            .iter()
            .filter_map(|injection_point| match &injection_point.member {
                InjectedMember::ConstructorParameter { constructor, .. } => Some(constructor.key),
                _ => None,
            })
            .unique()
            .collect_vec();

        if let [first, second, ..] = constructors.as_slice() {
            return Err(DefinitionError::ConflictingConstructors {
                component: self.name,
                first: first.name,
                second: second.name,
            });
        }

        // every method and constructor parameter needs exactly one injection point
        let parameters = self
            .injection_points
            .iter()
            .filter_map(|injection_point| match &injection_point.member {
                InjectedMember::MethodParameter { method, position } => {
                    Some((method.key, method.parameter_count, *position))
                }
                InjectedMember::ConstructorParameter {
                    constructor,
                    position,
                } => Some((constructor.key, constructor.parameter_count, *position)),
                InjectedMember::Field(_) => None,
            })
            .into_group_map_by(|(key, _, _)| *key);

        for (key, parameters) in parameters.into_iter().sorted_by_key(|(key, _)| *key) {
            let parameter_count = parameters
                .first()
                .map(|(_, parameter_count, _)| *parameter_count)
                .unwrap_or_default();

            if !parameters
                .iter()
                .map(|(_, _, position)| *position)
                .sorted()
                .eq(0..parameter_count)
            {
                return Err(DefinitionError::InvalidParameterPositions {
                    component: self.name,
                    member: key.name,
                    parameter_count,
                });
            }
        }

        if constructors.is_empty()
            && self.default_constructor.is_none()
            && self
                .interceptor_info
                .as_ref()
                .map(InterceptorInfo::has_constructor_interceptors)
                .unwrap_or(false)
        {
            return Err(DefinitionError::AroundConstructWithoutConstructor(
                self.name,
            ));
        }

        let post_construct_methods = self
            .post_construct_methods
            .into_iter()
            .map(|method| depth(&method.key).map(|depth| (depth, method)))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .sorted_by_key(|(depth, _)| *depth)
            .map(|(_, method)| method)
            .collect_vec();

        let pre_destroy_methods = self
            .pre_destroy_methods
            .into_iter()
            .map(|method| depth(&method.key).map(|depth| (depth, method)))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .sorted_by_key(|(depth, _)| std::cmp::Reverse(*depth))
            .map(|(_, method)| method)
            .collect_vec();

        Ok(ComponentDescriptor {
            type_id: self.type_id,
            name: self.name,
            hierarchy,
            injection_points: self.injection_points,
            methods: self.methods,
            default_constructor: self.default_constructor,
            post_construct_methods,
            pre_destroy_methods,
            business_methods: self.business_methods,
            interceptor_info: self.interceptor_info,
        })
    }
}

//! 类型描述
//!
//! Rust 没有运行时反射，组件类型的构造器、属性、方法、能力和提供者
//! 都通过 [`DescriptorBuilder`] 显式声明，容器只通过类型描述访问组件

use crate::instance::{Args, Handle, Instance, Ref, Value};
use crate::resolver::{
    reference_list, ConstructorHint, InitHint, MethodHint, PropertyHint, ProviderHint, TypeMetadata,
    ValueHint,
};
use crate::scope::ScopeType;
use infrastructure_common::{BoxError, ContainerError, ContainerResult, InitPhase, TypeInfo, WiringMode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type ConstructorFn = Arc<dyn Fn(&Args) -> Result<Instance, BoxError> + Send + Sync>;
type SetterFn = Arc<dyn Fn(&Instance, Value) -> ContainerResult<()> + Send + Sync>;
type GetterFn = Arc<dyn Fn(&Instance) -> ContainerResult<Value> + Send + Sync>;
type InvokerFn = Arc<dyn Fn(&Instance, &Args) -> Result<(), BoxError> + Send + Sync>;
type UpcastFn = Arc<dyn Fn(&Instance) -> Option<Handle> + Send + Sync>;

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// 可以实例化的具体类型
    Concrete,
    /// 能力类型（trait），只能作为注入目标，不能注册为组件
    Capability,
}

/// 构造器或方法的形参
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// 声明的参数名
    pub name: Option<String>,
    /// 参数类型，即注入目标类型
    pub type_info: TypeInfo,
}

impl Param {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: None,
            type_info: TypeInfo::of::<T>(),
        }
    }

    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            type_info: TypeInfo::of::<T>(),
        }
    }
}

/// 构造器
pub struct ConstructorDescriptor {
    params: Vec<Param>,
    create: ConstructorFn,
}

impl ConstructorDescriptor {
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn invoke(&self, args: &Args) -> Result<Instance, BoxError> {
        (self.create)(args)
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("params", &self.params)
            .finish()
    }
}

/// 属性种类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// 指向单个组件的引用
    Reference,
    /// 指向所有实现某能力类型的组件的集合
    Aggregate { element: TypeInfo },
    /// 可序列化的数据，参数注入的目标
    Data,
}

/// 属性
pub struct PropertyDescriptor {
    name: String,
    type_info: TypeInfo,
    kind: PropertyKind,
    setter: SetterFn,
    getter: Option<GetterFn>,
}

impl PropertyDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 属性的声明类型，引用属性即注入目标类型
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn is_reference(&self) -> bool {
        self.kind == PropertyKind::Reference
    }

    pub fn set(&self, target: &Instance, value: Value) -> ContainerResult<()> {
        (self.setter)(target, value)
    }

    pub fn get(&self, target: &Instance) -> ContainerResult<Value> {
        match &self.getter {
            Some(getter) => getter(target),
            None => Err(ContainerError::MemberNotFound {
                type_name: target.type_info().full_name().to_string(),
                member: format!("{} (只写)", self.name),
            }),
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("type", &self.type_info.short_name())
            .field("kind", &self.kind)
            .finish()
    }
}

/// 方法，包括注入方法和生命周期钩子
pub struct MethodDescriptor {
    name: String,
    params: Vec<Param>,
    invoker: InvokerFn,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn invoke(&self, target: &Instance, args: &Args) -> Result<(), BoxError> {
        (self.invoker)(target, args)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// 提供者方法
///
/// 静态提供者不需要宿主实例，实例提供者需要先获取宿主组件
#[derive(Clone)]
pub enum ProviderFn {
    Static(Arc<dyn Fn() -> Result<Instance, BoxError> + Send + Sync>),
    Instance(Arc<dyn Fn(&Instance) -> Result<Instance, BoxError> + Send + Sync>),
}

pub struct ProviderDescriptor {
    name: String,
    returns: TypeInfo,
    function: ProviderFn,
}

impl ProviderDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 提供者返回值的类型
    pub fn returns(&self) -> &TypeInfo {
        &self.returns
    }

    pub fn is_static(&self) -> bool {
        matches!(self.function, ProviderFn::Static(_))
    }

    pub fn function(&self) -> &ProviderFn {
        &self.function
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("returns", &self.returns.short_name())
            .field("static", &self.is_static())
            .finish()
    }
}

/// 类型实现的能力
pub struct Capability {
    type_info: TypeInfo,
    upcast: UpcastFn,
}

impl Capability {
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.type_info.short_name())
    }
}

/// 组件类型描述
pub struct TypeDescriptor {
    info: TypeInfo,
    kind: TypeKind,
    capabilities: Vec<Capability>,
    constructors: Vec<ConstructorDescriptor>,
    properties: Vec<PropertyDescriptor>,
    methods: Vec<MethodDescriptor>,
    providers: Vec<ProviderDescriptor>,
    metadata: TypeMetadata,
}

impl TypeDescriptor {
    /// 开始描述具体类型 `T`
    pub fn builder<T: Send + Sync + 'static>() -> DescriptorBuilder<T> {
        DescriptorBuilder {
            descriptor: Self::empty(TypeInfo::of::<T>(), TypeKind::Concrete),
            _marker: PhantomData,
        }
    }

    /// 能力类型的描述，例如 `TypeDescriptor::capability::<dyn Greeter>()`
    pub fn capability<C: ?Sized + 'static>() -> Arc<Self> {
        Arc::new(Self::empty(TypeInfo::of::<C>(), TypeKind::Capability))
    }

    fn empty(info: TypeInfo, kind: TypeKind) -> Self {
        Self {
            info,
            kind,
            capabilities: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            providers: Vec::new(),
            metadata: TypeMetadata::default(),
        }
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.info
    }

    pub fn type_id(&self) -> TypeId {
        self.info.id
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_capability(&self) -> bool {
        self.kind == TypeKind::Capability
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// 类型上声明的注解
    pub fn metadata(&self) -> &TypeMetadata {
        &self.metadata
    }

    /// 本类型的实例能否赋给 `target` 类型
    pub fn is_assignable_to(&self, target: TypeId) -> bool {
        target == self.info.id || self.capabilities.iter().any(|c| c.type_info.id == target)
    }

    /// 把本类型的实例转换为 `target` 类型的句柄
    pub fn upcast(&self, instance: &Instance, target: TypeId) -> Option<Handle> {
        if target == self.info.id {
            return instance.to_handle();
        }
        self.capabilities
            .iter()
            .find(|c| c.type_info.id == target)
            .and_then(|c| (c.upcast)(instance))
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type", &self.info.full_name())
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("constructors", &self.constructors.len())
            .field("properties", &self.properties)
            .field("methods", &self.methods)
            .field("providers", &self.providers)
            .finish()
    }
}

fn target_of<T: Send + Sync + 'static>(instance: &Instance) -> ContainerResult<&T> {
    instance.downcast_ref::<T>().ok_or_else(|| {
        ContainerError::type_mismatch(
            std::any::type_name::<T>(),
            instance.type_info().full_name(),
        )
    })
}

/// 类型描述构建器
pub struct DescriptorBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DescriptorBuilder<T> {
    /// 声明 `T` 实现能力类型 `C`，`cast` 负责把 `Arc<T>` 转换为 `Arc<C>`
    pub fn implements<C>(mut self, cast: impl Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let upcast: UpcastFn =
            Arc::new(move |instance: &Instance| instance.downcast::<T>().map(|value| Handle::new(cast(value))));
        self.descriptor.capabilities.push(Capability {
            type_info: TypeInfo::of::<C>(),
            upcast,
        });
        self
    }

    /// 声明构造器，参数按声明顺序传入 `create`
    pub fn constructor(
        mut self,
        params: Vec<Param>,
        create: impl Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    ) -> Self {
        let create: ConstructorFn = Arc::new(move |args: &Args| create(args).map(Instance::new));
        self.descriptor
            .constructors
            .push(ConstructorDescriptor { params, create });
        self
    }

    /// 以 `Default` 作为无参构造器
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Vec::new(), |_| Ok(T::default()))
    }

    /// 声明引用属性，依赖类型为 `D`
    pub fn reference<D>(mut self, name: &str, set: impl Fn(&T, Ref<D>) + Send + Sync + 'static) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        let setter: SetterFn = Arc::new(move |target: &Instance, value: Value| {
            let this = target_of::<T>(target)?;
            set(this, Ref::<D>::from_value(&value)?);
            Ok(())
        });
        self.descriptor.properties.push(PropertyDescriptor {
            name: name.to_string(),
            type_info: TypeInfo::of::<D>(),
            kind: PropertyKind::Reference,
            setter,
            getter: None,
        });
        self
    }

    /// 声明集合属性，注入所有可以赋给 `E` 的组件
    pub fn aggregate<E>(mut self, name: &str, set: impl Fn(&T, Vec<Arc<E>>) + Send + Sync + 'static) -> Self
    where
        E: ?Sized + Send + Sync + 'static,
    {
        let setter: SetterFn = Arc::new(move |target: &Instance, value: Value| {
            let this = target_of::<T>(target)?;
            let handles = match value {
                Value::Components(handles) => handles,
                other => {
                    return Err(ContainerError::type_mismatch("components", other.kind()));
                }
            };
            let elements = handles
                .iter()
                .map(|handle| {
                    handle.downcast::<E>().ok_or_else(|| {
                        ContainerError::type_mismatch(std::any::type_name::<E>(), handle.target_type())
                    })
                })
                .collect::<ContainerResult<Vec<_>>>()?;
            set(this, elements);
            Ok(())
        });
        self.descriptor.properties.push(PropertyDescriptor {
            name: name.to_string(),
            type_info: TypeInfo::of::<Vec<Arc<E>>>(),
            kind: PropertyKind::Aggregate {
                element: TypeInfo::of::<E>(),
            },
            setter,
            getter: None,
        });
        self
    }

    /// 声明可读写的数据属性
    pub fn data<V>(
        mut self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let setter: SetterFn = Arc::new(move |target: &Instance, value: Value| {
            let this = target_of::<T>(target)?;
            set(this, value.data::<V>()?);
            Ok(())
        });
        let getter: GetterFn = Arc::new(move |target: &Instance| {
            let this = target_of::<T>(target)?;
            serde_json::to_value(get(this))
                .map(Value::Data)
                .map_err(|e| ContainerError::type_mismatch("json", e.to_string()))
        });
        self.descriptor.properties.push(PropertyDescriptor {
            name: name.to_string(),
            type_info: TypeInfo::of::<V>(),
            kind: PropertyKind::Data,
            setter,
            getter: Some(getter),
        });
        self
    }

    /// 声明带参数的方法
    pub fn method(
        mut self,
        name: &str,
        params: Vec<Param>,
        invoke: impl Fn(&T, &Args) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let invoker: InvokerFn = Arc::new(move |target: &Instance, args: &Args| {
            let this = target_of::<T>(target)?;
            invoke(this, args)
        });
        self.descriptor.methods.push(MethodDescriptor {
            name: name.to_string(),
            params,
            invoker,
        });
        self
    }

    /// 声明无参方法，通常用作生命周期钩子
    pub fn hook(self, name: &str, run: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static) -> Self {
        self.method(name, Vec::new(), move |this, _| run(this))
    }

    /// 声明不需要宿主实例的提供者方法
    pub fn static_provider<R>(
        mut self,
        name: &str,
        provide: impl Fn() -> Result<R, BoxError> + Send + Sync + 'static,
    ) -> Self
    where
        R: Send + Sync + 'static,
    {
        self.descriptor.providers.push(ProviderDescriptor {
            name: name.to_string(),
            returns: TypeInfo::of::<R>(),
            function: ProviderFn::Static(Arc::new(move || provide().map(Instance::new))),
        });
        self
    }

    /// 声明在宿主实例上调用的提供者方法
    pub fn instance_provider<R>(
        mut self,
        name: &str,
        provide: impl Fn(&T) -> Result<R, BoxError> + Send + Sync + 'static,
    ) -> Self
    where
        R: Send + Sync + 'static,
    {
        let function = ProviderFn::Instance(Arc::new(move |host: &Instance| {
            let this = target_of::<T>(host)?;
            provide(this).map(Instance::new)
        }));
        self.descriptor.providers.push(ProviderDescriptor {
            name: name.to_string(),
            returns: TypeInfo::of::<R>(),
            function,
        });
        self
    }

    /// 注解：组件名称
    pub fn named(mut self, name: &str) -> Self {
        self.descriptor.metadata.name = Some(name.to_string());
        self
    }

    /// 注解：作用域
    pub fn scope(mut self, scope: ScopeType) -> Self {
        self.descriptor.metadata.scope = Some(scope);
        self
    }

    /// 注解：装配模式
    pub fn wiring(mut self, mode: WiringMode) -> Self {
        self.descriptor.metadata.wiring_mode = mode;
        self
    }

    /// 注解：把第 `index` 个构造器标记为注入点，`references` 中的空字符串表示默认引用
    pub fn inject_constructor(mut self, index: usize, references: &[&str]) -> Self {
        self.descriptor.metadata.constructor = Some(ConstructorHint {
            index,
            references: reference_list(references),
        });
        self
    }

    /// 注解：把引用属性标记为注入点
    pub fn inject(mut self, property: &str, reference: Option<&str>) -> Self {
        self.descriptor.metadata.properties.push(PropertyHint {
            property: property.to_string(),
            reference: reference.map(str::to_string),
        });
        self
    }

    /// 注解：把集合属性标记为注入点
    pub fn inject_set(mut self, property: &str) -> Self {
        self.descriptor.metadata.aggregates.push(property.to_string());
        self
    }

    /// 注解：把方法标记为注入点
    pub fn inject_method(mut self, method: &str, references: &[&str]) -> Self {
        self.descriptor.metadata.methods.push(MethodHint {
            method: method.to_string(),
            references: reference_list(references),
        });
        self
    }

    /// 注解：初始化钩子
    pub fn init(mut self, method: &str, order: Option<i32>, phase: InitPhase) -> Self {
        self.descriptor.metadata.init_methods.push(InitHint {
            method: method.to_string(),
            order,
            phase,
        });
        self
    }

    /// 注解：销毁钩子
    pub fn destroy(mut self, method: &str) -> Self {
        self.descriptor.metadata.destroy_methods.push(method.to_string());
        self
    }

    /// 注解：参数注入点
    pub fn value(mut self, property: &str, template: &str) -> Self {
        self.descriptor.metadata.values.push(ValueHint {
            property: property.to_string(),
            template: template.to_string(),
        });
        self
    }

    /// 注解：把提供者方法以 `name` 注册到容器
    pub fn provides(mut self, name: &str, method: &str) -> Self {
        self.descriptor.metadata.providers.push(ProviderHint {
            name: name.to_string(),
            method: method.to_string(),
        });
        self
    }

    pub fn build(self) -> Arc<TypeDescriptor> {
        Arc::new(self.descriptor)
    }
}

//! 容器门面
//!
//! [`Container`] 是对外的唯一入口，内部状态放在共享的 [`ContainerCore`] 中，
//! 作用域委托通过弱引用回到容器重新查找依赖。
//!
//! 注册与关闭在同一把锁下串行执行；获取组件不加全局锁，
//! 同一单例在多个线程上首次被并发获取时可能被创建多次，只有最后登记的实例会保留在作用域中。

use crate::annotation::AnnotationResolver;
use crate::accessor::PathAccessor;
use crate::definition::ComponentDefinition;
use crate::delegate::LookupDelegateFactory;
use crate::engine::{CreationContext, Instantiation};
use crate::injection::{InjectionPointBuilder, References};
use crate::mixing::ScopeMixingGuard;
use crate::params::ParameterStore;
use crate::registration::ComponentRegistration;
use crate::registry::{ComponentRegistry, ProviderDefinition};
use crate::scopes::SingletonScope;
use dashmap::DashMap;
use di_abstractions::{
    reference_list, DelegateFactory, Handle, Instance, InvokeStrategy, MemberAccessor, MetadataResolver,
    ProviderFn, Scope, ScopeType, TypeDescriptor, Value,
};
use infrastructure_common::{
    ContainerConfig, ContainerError, ContainerResult, InitPhase, NamingConventions, TypeInfo, WiringMode,
};
use parking_lot::Mutex;
use std::any::TypeId;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// 容器自身登记时使用的名称
pub const CONTAINER_REF_NAME: &str = "container";

/// 容器内部状态
pub(crate) struct ContainerCore {
    pub(crate) config: ContainerConfig,
    pub(crate) registry: ComponentRegistry,
    pub(crate) params: ParameterStore,
    pub(crate) guard: ScopeMixingGuard,
    pub(crate) resolver: Arc<dyn MetadataResolver>,
    pub(crate) accessor: Arc<dyn MemberAccessor>,
    externals: DashMap<(TypeId, WiringMode), Arc<ComponentDefinition>>,
    registration_lock: Mutex<()>,
    this: Weak<ContainerCore>,
}

impl ContainerCore {
    pub(crate) fn get(&self, name: &str) -> ContainerResult<Option<Instance>> {
        let mut context = CreationContext::new();
        self.get_in(name, &mut context)
    }

    /// 在给定的创建上下文中获取组件，先查定义再查提供者
    pub(crate) fn get_in(&self, name: &str, context: &mut CreationContext) -> ContainerResult<Option<Instance>> {
        if let Some(instance) = context.acquired(name)? {
            return Ok(Some(instance));
        }
        if let Some(definition) = self.registry.lookup(name, self.config.use_alt_names) {
            return self.instance_of(&definition, context).map(Some);
        }
        match self.registry.provider(name) {
            Some(provider) => self.invoke_provider(&provider, context).map(Some),
            None => Ok(None),
        }
    }

    fn instance_of(&self, definition: &ComponentDefinition, context: &mut CreationContext) -> ContainerResult<Instance> {
        let name = definition.display_name();
        if let Some(instance) = context.acquired(name)? {
            return Ok(instance);
        }
        if let Some(instance) = definition.scope_lookup() {
            return Ok(instance);
        }

        context.enter(name, self.config.max_resolution_depth)?;
        let result = Instantiation::new(self, definition, context).and_then(Instantiation::create);
        context.leave();
        result
    }

    fn invoke_provider(&self, provider: &ProviderDefinition, context: &mut CreationContext) -> ContainerResult<Instance> {
        let descriptor = &provider.descriptor;
        let method = descriptor
            .provider(&provider.method)
            .ok_or_else(|| member_not_found(descriptor, &provider.method))?;
        let label = format!("提供者 {} ({}#{})", provider.name, descriptor.type_info().short_name(), provider.method);
        debug!("调用{}", label);

        match method.function() {
            ProviderFn::Static(provide) => provide().map_err(|e| ContainerError::invocation(label, e)),
            ProviderFn::Instance(provide) => {
                let host_name = provider.host.as_deref().ok_or_else(|| {
                    ContainerError::invalid_injection_point(format!("{} 缺少宿主组件", label))
                })?;
                let host = self
                    .get_in(host_name, context)?
                    .ok_or_else(|| ContainerError::not_found(host_name))?;
                provide(&host).map_err(|e| ContainerError::invocation(label, e))
            }
        }
    }

    /// 依次尝试候选名称，第一个存在的组件转换为目标类型后返回
    pub(crate) fn resolve_reference(
        &self,
        references: &References,
        target: &TypeInfo,
        context: &mut CreationContext,
    ) -> ContainerResult<Option<Value>> {
        for name in references.names() {
            if let Some(instance) = self.get_in(name, context)? {
                return self.upcast(&instance, target).map(|handle| Some(Value::Component(handle)));
            }
        }
        Ok(None)
    }

    pub(crate) fn upcast(&self, instance: &Instance, target: &TypeInfo) -> ContainerResult<Handle> {
        self.try_upcast(instance, target.id)
            .ok_or_else(|| ContainerError::type_mismatch(target.full_name(), instance.type_info().full_name()))
    }

    fn try_upcast(&self, instance: &Instance, target: TypeId) -> Option<Handle> {
        if instance.type_id() == target {
            return instance.to_handle();
        }
        self.registry.descriptor_of(instance.type_id())?.upcast(instance, target)
    }

    /// 委托的查找策略，每次调用都重新从容器获取 `name`
    pub(crate) fn delegate_strategy(&self, name: &str) -> InvokeStrategy {
        let core = self.this.clone();
        let name = name.to_string();
        Arc::new(move |target: TypeId| {
            let core = core.upgrade().ok_or_else(|| ContainerError::ScopeError {
                scope: CONTAINER_REF_NAME.to_string(),
                message: format!("容器已释放，无法解析委托 {}", name),
            })?;
            let instance = core.get(&name)?.ok_or_else(|| ContainerError::not_found(name.as_str()))?;
            core.try_upcast(&instance, target).ok_or_else(|| {
                ContainerError::type_mismatch(format!("{} 的委托目标类型", name), instance.type_info().full_name())
            })
        })
    }

    fn register(&self, registration: ComponentRegistration) -> ContainerResult<Arc<ComponentDefinition>> {
        let _lock = self.registration_lock.lock();
        let ComponentRegistration {
            descriptor,
            name,
            scope,
            wiring_mode,
            define_only,
            on_create,
        } = registration;

        if descriptor.is_capability() {
            return Err(ContainerError::CapabilityRegistration {
                type_name: descriptor.type_info().full_name().to_string(),
            });
        }

        let metadata = self.resolver.resolve(&descriptor);
        let declared_name = metadata.name.is_some();
        let name = name
            .or_else(|| metadata.name.clone())
            .unwrap_or_else(|| NamingConventions::component_name(descriptor.type_info(), self.config.use_full_type_names));
        let wiring_mode = match wiring_mode {
            Some(mode) if mode != WiringMode::Default => mode,
            _ => self.config.resolve_wiring_mode(Some(metadata.wiring_mode)),
        };
        let scope = self
            .registry
            .scope(scope.or(metadata.scope).unwrap_or_else(ScopeType::of::<SingletonScope>));
        let scope_name = scope.name();

        let definition = Arc::new(ComponentDefinition::new(
            name.clone(),
            Arc::clone(&descriptor),
            scope,
            wiring_mode,
            on_create,
        ));
        self.registry.insert(Arc::clone(&definition), &self.config, declared_name)?;
        self.guard.forget(&name);
        info!("注册组件: [{}] --> {} @ {} ({})", name, descriptor.type_info(), scope_name, wiring_mode);

        for hint in &metadata.providers {
            self.register_provider(&hint.name, Some(&name), &descriptor, &hint.method)?;
        }
        if define_only {
            let constructor = InjectionPointBuilder::new(&self.config).constructor(&descriptor, &metadata)?;
            definition.define_only(constructor)?;
        }
        Ok(definition)
    }

    fn register_provider(
        &self,
        name: &str,
        host: Option<&str>,
        descriptor: &Arc<TypeDescriptor>,
        method: &str,
    ) -> ContainerResult<()> {
        let provider = descriptor
            .provider(method)
            .ok_or_else(|| member_not_found(descriptor, method))?;
        let host = if provider.is_static() {
            None
        } else {
            let host = host.ok_or_else(|| {
                ContainerError::invalid_injection_point(format!("实例提供者 {} 需要宿主组件", name))
            })?;
            Some(host.to_string())
        };
        self.registry.remember(Arc::clone(descriptor));
        self.registry.add_provider(ProviderDefinition {
            name: name.to_string(),
            host,
            descriptor: Arc::clone(descriptor),
            method: method.to_string(),
        });
        Ok(())
    }

    /// 外部对象使用的匿名定义，按类型和装配模式缓存
    fn external_definition(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        wiring_mode: Option<WiringMode>,
    ) -> Arc<ComponentDefinition> {
        let mode = match wiring_mode {
            Some(mode) if mode != WiringMode::Default => mode,
            _ => self
                .config
                .resolve_wiring_mode(Some(self.resolver.resolve(descriptor).wiring_mode)),
        };
        self.registry.remember(Arc::clone(descriptor));
        self.externals
            .entry((descriptor.type_id(), mode))
            .or_insert_with(|| Arc::new(ComponentDefinition::external(Arc::clone(descriptor), mode)))
            .value()
            .clone()
    }

    /// 最长的已注册组件名前缀，其余部分为属性路径
    fn split_property_path<'p>(&self, path: &'p str) -> ContainerResult<(Arc<ComponentDefinition>, &'p str)> {
        for (index, _) in path.rmatch_indices('.') {
            if let Some(definition) = self.registry.lookup(&path[..index], self.config.use_alt_names) {
                return Ok((definition, &path[index + 1..]));
            }
        }
        Err(ContainerError::property_path(path, "没有与路径前缀对应的组件"))
    }
}

fn member_not_found(descriptor: &TypeDescriptor, member: &str) -> ContainerError {
    ContainerError::MemberNotFound {
        type_name: descriptor.type_info().full_name().to_string(),
        member: member.to_string(),
    }
}

/// 容器构建器，可以替换元数据解析、成员访问和委托创建策略
pub struct ContainerBuilder {
    config: ContainerConfig,
    resolver: Arc<dyn MetadataResolver>,
    accessor: Arc<dyn MemberAccessor>,
    delegate_factory: Arc<dyn DelegateFactory>,
}

impl ContainerBuilder {
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(AnnotationResolver),
            accessor: Arc::new(PathAccessor),
            delegate_factory: Arc::new(LookupDelegateFactory),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_accessor(mut self, accessor: Arc<dyn MemberAccessor>) -> Self {
        self.accessor = accessor;
        self
    }

    pub fn with_delegate_factory(mut self, factory: Arc<dyn DelegateFactory>) -> Self {
        self.delegate_factory = factory;
        self
    }

    pub fn build(self) -> ContainerResult<Container> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> Container {
        let Self {
            config,
            resolver,
            accessor,
            delegate_factory,
        } = self;
        let core = Arc::new_cyclic(|this| ContainerCore {
            registry: ComponentRegistry::new(),
            params: ParameterStore::new(config.parameter_fallback.clone()),
            guard: ScopeMixingGuard::new(&config, delegate_factory),
            resolver,
            accessor,
            externals: DashMap::new(),
            registration_lock: Mutex::new(()),
            this: this.clone(),
            config,
        });
        debug!("创建容器: {:?}", core.config);
        Container { core }
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}

/// 依赖注入容器
///
/// 克隆得到的是同一个容器的另一个句柄
#[derive(Clone)]
pub struct Container {
    core: Arc<ContainerCore>,
}

impl Container {
    /// 使用默认配置创建容器
    pub fn new() -> Self {
        ContainerBuilder::default().assemble()
    }

    pub fn with_config(config: ContainerConfig) -> ContainerResult<Self> {
        ContainerBuilder::new(config).build()
    }

    pub fn builder(config: ContainerConfig) -> ContainerBuilder {
        ContainerBuilder::new(config)
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.core.config
    }

    /// 以类型上声明的元数据和容器默认值注册组件
    pub fn register_type(&self, descriptor: Arc<TypeDescriptor>) -> ContainerResult<Arc<ComponentDefinition>> {
        self.register(ComponentRegistration::of(descriptor))
    }

    /// 注册组件
    ///
    /// 同名组件会被替换；开启重名检测时旧定义仍会先被移除，然后返回错误
    pub fn register(&self, registration: ComponentRegistration) -> ContainerResult<Arc<ComponentDefinition>> {
        self.core.register(registration)
    }

    /// 按名称获取组件，名称不存在时返回 `None`
    pub fn get(&self, name: &str) -> ContainerResult<Option<Instance>> {
        self.core.get(name)
    }

    /// 按名称获取组件并转换为 `T`，`T` 可以是组件实现的能力类型
    pub fn get_as<T>(&self, name: &str) -> ContainerResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let Some(instance) = self.core.get(name)? else {
            return Ok(None);
        };
        let target = TypeInfo::of::<T>();
        let handle = self.core.upcast(&instance, &target)?;
        handle
            .downcast::<T>()
            .map(Some)
            .ok_or_else(|| ContainerError::type_mismatch(target.full_name(), handle.target_type()))
    }

    /// 按类型推导出的名称获取组件，不查找备用名称
    pub fn get_typed<T>(&self) -> ContainerResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let name = NamingConventions::component_name(&TypeInfo::of::<T>(), self.core.config.use_full_type_names);
        if !self.core.registry.contains(&name) && self.core.registry.provider(&name).is_none() {
            return Ok(None);
        }
        self.get_as::<T>(&name)
    }

    /// 创建并装配一个不登记到容器的实例
    pub fn create(&self, descriptor: &Arc<TypeDescriptor>, wiring_mode: Option<WiringMode>) -> ContainerResult<Instance> {
        let definition = self.core.external_definition(descriptor, wiring_mode);
        let mut context = CreationContext::new();
        Instantiation::new(&self.core, &definition, &mut context)?.create()
    }

    /// 装配调用方持有的对象，执行参数注入和初始化钩子，不登记到容器
    pub fn wire(
        &self,
        instance: &Instance,
        descriptor: &Arc<TypeDescriptor>,
        wiring_mode: Option<WiringMode>,
    ) -> ContainerResult<()> {
        check_instance_type(instance, descriptor)?;
        let definition = self.core.external_definition(descriptor, wiring_mode);
        let mut context = CreationContext::new();
        Instantiation::new(&self.core, &definition, &mut context)?.refresh(instance.clone())?;
        Ok(())
    }

    /// 以单例登记已有对象，并对其执行装配、参数注入和初始化钩子
    pub fn add(
        &self,
        name: &str,
        instance: Instance,
        descriptor: Arc<TypeDescriptor>,
        wiring_mode: Option<WiringMode>,
    ) -> ContainerResult<()> {
        check_instance_type(&instance, &descriptor)?;
        let mut registration = ComponentRegistration::of(descriptor)
            .name(name)
            .scope(ScopeType::of::<SingletonScope>());
        if let Some(mode) = wiring_mode {
            registration = registration.wiring(mode);
        }
        let definition = self.core.register(registration)?;

        let mut context = CreationContext::new();
        Instantiation::new(&self.core, &definition, &mut context)?.refresh(instance)?;
        Ok(())
    }

    /// 把容器自身以 [`CONTAINER_REF_NAME`] 登记为组件，组件通过 [`ContainerHandle`] 访问容器
    pub fn add_self(&self) -> ContainerResult<()> {
        let handle = ContainerHandle {
            core: Arc::downgrade(&self.core),
        };
        let descriptor = TypeDescriptor::builder::<ContainerHandle>().build();
        self.add(CONTAINER_REF_NAME, Instance::new(handle), descriptor, Some(WiringMode::None))
    }

    /// 移除组件定义和作用域中的实例，不执行销毁钩子
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.core.registry.remove(name).is_some();
        self.core.guard.forget(name);
        if removed {
            info!("移除组件: {}", name);
        }
        removed
    }

    /// 移除具体类型为 `T` 的所有组件
    pub fn remove_type<T: 'static>(&self) -> Vec<String> {
        let removed = self.core.registry.remove_type(TypeId::of::<T>());
        for name in &removed {
            self.core.guard.forget(name);
        }
        removed
    }

    /// 所有组件名称，按字典序排列
    pub fn names(&self) -> Vec<String> {
        self.core.registry.names()
    }

    pub fn count(&self) -> usize {
        self.core.registry.count()
    }

    pub fn scope_count(&self) -> usize {
        self.core.registry.scope_count()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.core.registry.contains(name)
    }

    /// 可以赋给 `T` 的所有组件名称
    pub fn names_for_type<T: ?Sized + 'static>(&self) -> Vec<String> {
        self.core.registry.names_for_type(TypeId::of::<T>()).to_vec()
    }

    pub fn definition(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.core.registry.lookup(name, false)
    }

    /// 替换作用域实例，已注册的组件仍使用原来的作用域
    pub fn register_scope(&self, scope_type: ScopeType, scope: Arc<dyn Scope>) {
        self.core.registry.register_scope(scope_type, scope);
    }

    fn require_definition(&self, name: &str) -> ContainerResult<Arc<ComponentDefinition>> {
        self.definition(name).ok_or_else(|| ContainerError::not_found(name))
    }

    fn points(&self) -> InjectionPointBuilder<'_> {
        InjectionPointBuilder::new(&self.core.config)
    }

    /// 手动指定构造器注入点，`references` 中的空字符串表示默认引用
    pub fn register_constructor_injection(
        &self,
        name: &str,
        index: Option<usize>,
        references: &[&str],
    ) -> ContainerResult<()> {
        let definition = self.require_definition(name)?;
        let explicit = reference_list(references);
        let point = self
            .points()
            .constructor_at(definition.descriptor(), index, explicit.as_deref())?;
        definition.set_constructor(point)
    }

    pub fn register_property_injection(
        &self,
        name: &str,
        property: &str,
        reference: Option<&str>,
    ) -> ContainerResult<()> {
        let definition = self.require_definition(name)?;
        let point = self.points().property(definition.descriptor(), property, reference)?;
        definition.add_property(point)
    }

    pub fn register_set_injection(&self, name: &str, property: &str) -> ContainerResult<()> {
        let definition = self.require_definition(name)?;
        let point = self.points().aggregate(definition.descriptor(), property)?;
        definition.add_set(point)
    }

    pub fn register_method_injection(&self, name: &str, method: &str, references: &[&str]) -> ContainerResult<()> {
        let definition = self.require_definition(name)?;
        let explicit = reference_list(references);
        let point = self
            .points()
            .method(definition.descriptor(), method, explicit.as_deref())?;
        definition.add_method(point)
    }

    /// 手动登记初始化钩子，按给出的顺序调用
    pub fn register_init_methods(&self, name: &str, phase: InitPhase, methods: &[&str]) -> ContainerResult<()> {
        let definition = self.require_definition(name)?;
        let points = methods
            .iter()
            .map(|method| self.points().init_method(definition.descriptor(), method, None, phase))
            .collect::<ContainerResult<Vec<_>>>()?;
        definition.add_init_methods(points)
    }

    pub fn register_destroy_methods(&self, name: &str, methods: &[&str]) -> ContainerResult<()> {
        let definition = self.require_definition(name)?;
        let points = methods
            .iter()
            .map(|method| self.points().destroy_method(definition.descriptor(), method))
            .collect::<ContainerResult<Vec<_>>>()?;
        definition.add_destroy_methods(points)
    }

    pub fn register_value_injection(&self, name: &str, property: &str, template: &str) -> ContainerResult<()> {
        let definition = self.require_definition(name)?;
        let point = self.points().value(definition.descriptor(), property, template)?;
        definition.add_value(point)
    }

    /// 把组件 `component` 上的提供者方法以 `name` 注册
    pub fn register_instance_provider(&self, name: &str, component: &str, method: &str) -> ContainerResult<()> {
        let definition = self.require_definition(component)?;
        let _lock = self.core.registration_lock.lock();
        self.core
            .register_provider(name, Some(component), definition.descriptor(), method)
    }

    /// 注册不需要宿主实例的提供者
    pub fn register_static_provider(
        &self,
        name: &str,
        descriptor: &Arc<TypeDescriptor>,
        method: &str,
    ) -> ContainerResult<()> {
        let _lock = self.core.registration_lock.lock();
        self.core.register_provider(name, None, descriptor, method)
    }

    pub fn define_parameter(&self, key: impl Into<String>, value: impl Into<String>) {
        self.core.params.define(key, value);
    }

    pub fn define_parameters<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.core.params.define_all(entries);
    }

    /// 从配置文件加载参数，返回加载的参数个数
    pub fn load_parameters(&self, path: impl AsRef<Path>) -> ContainerResult<usize> {
        self.core.params.load(path)
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.core.params
    }

    /// 写入 `组件名.属性路径`，组件名取最长的已注册前缀
    pub fn set_property(&self, path: &str, value: Value) -> ContainerResult<()> {
        let (definition, property) = self.core.split_property_path(path)?;
        let instance = self
            .core
            .get(definition.display_name())?
            .ok_or_else(|| ContainerError::not_found(definition.display_name()))?;
        self.core
            .accessor
            .set(&instance, definition.descriptor(), property, value, false)
    }

    pub fn get_property(&self, path: &str) -> ContainerResult<Value> {
        let (definition, property) = self.core.split_property_path(path)?;
        let instance = self
            .core
            .get(definition.display_name())?
            .ok_or_else(|| ContainerError::not_found(definition.display_name()))?;
        self.core.accessor.get(&instance, definition.descriptor(), property)
    }

    /// 关闭所有作用域并清空注册表
    ///
    /// 某个作用域的销毁钩子失败时不再关闭其余作用域，但注册表仍会被清空，返回第一个错误
    pub fn shutdown(&self) -> ContainerResult<()> {
        let _lock = self.core.registration_lock.lock();
        let mut result = Ok(());
        for scope in self.core.registry.scopes() {
            if let Err(err) = scope.shutdown() {
                warn!("关闭作用域 {} 失败: {}", scope.name(), err);
                result = Err(err);
                break;
            }
        }

        self.core.registry.clear();
        self.core.guard.clear();
        self.core.externals.clear();
        info!("容器已关闭");
        result
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("components", &self.count())
            .field("scopes", &self.scope_count())
            .finish()
    }
}

fn check_instance_type(instance: &Instance, descriptor: &TypeDescriptor) -> ContainerResult<()> {
    if instance.type_id() == descriptor.type_id() {
        Ok(())
    } else {
        Err(ContainerError::type_mismatch(
            descriptor.type_info().full_name(),
            instance.type_info().full_name(),
        ))
    }
}

/// 登记在容器中的容器自身引用，不延长容器的生命周期
#[derive(Clone)]
pub struct ContainerHandle {
    core: Weak<ContainerCore>,
}

impl ContainerHandle {
    /// 容器仍然存在时返回它
    pub fn container(&self) -> Option<Container> {
        self.core.upgrade().map(|core| Container { core })
    }
}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerHandle(alive: {})", self.core.strong_count() > 0)
    }
}

//! 组件定义
//!
//! 定义由名称、类型、作用域和装配模式组成，注入点在第一次创建实例时解析，
//! 解析完成后不可再修改。手动登记的注入点会取代对应类别的自动解析结果。

use crate::injection::{
    sort_init_methods, CtorInjectionPoint, DestroyMethodPoint, InitMethodPoint, InjectionPointBuilder,
    MethodInjectionPoint, PropertyInjectionPoint, ResolvedInjection, SetInjectionPoint,
    ValueInjectionPoint,
};
use crate::params::ParameterStore;
use di_abstractions::{DestroyCallback, Instance, MetadataResolver, Scope, ScopedInstance, TypeDescriptor};
use infrastructure_common::{BoxError, ContainerConfig, ContainerError, ContainerResult, TypeInfo, WiringMode};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 实例就绪前调用的回调
pub type OnCreate = Arc<dyn Fn(&Instance) -> Result<(), BoxError> + Send + Sync>;

/// 手动登记的注入点，`None` 表示该类别尚未登记，解析时交给元数据解析器
#[derive(Debug, Default)]
struct InjectionCache {
    constructor: Option<CtorInjectionPoint>,
    properties: Option<Vec<PropertyInjectionPoint>>,
    sets: Option<Vec<SetInjectionPoint>>,
    methods: Option<Vec<MethodInjectionPoint>>,
    init_methods: Option<Vec<InitMethodPoint>>,
    destroy_methods: Option<Vec<DestroyMethodPoint>>,
    values: Option<Vec<ValueInjectionPoint>>,
}

/// 组件定义
pub struct ComponentDefinition {
    name: Option<String>,
    descriptor: Arc<TypeDescriptor>,
    scope: Option<Arc<dyn Scope>>,
    wiring_mode: WiringMode,
    on_create: Option<OnCreate>,
    cache: Mutex<InjectionCache>,
    resolved: OnceCell<Arc<ResolvedInjection>>,
}

impl ComponentDefinition {
    pub fn new(
        name: String,
        descriptor: Arc<TypeDescriptor>,
        scope: Arc<dyn Scope>,
        wiring_mode: WiringMode,
        on_create: Option<OnCreate>,
    ) -> Self {
        Self {
            name: Some(name),
            descriptor,
            scope: Some(scope),
            wiring_mode,
            on_create,
            cache: Mutex::new(InjectionCache::default()),
            resolved: OnceCell::new(),
        }
    }

    /// 未注册的外部定义，只用于装配调用方持有的对象，不经过作用域
    pub fn external(descriptor: Arc<TypeDescriptor>, wiring_mode: WiringMode) -> Self {
        Self {
            name: None,
            descriptor,
            scope: None,
            wiring_mode,
            on_create: None,
            cache: Mutex::new(InjectionCache::default()),
            resolved: OnceCell::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 用于日志和错误消息的名称，外部定义使用类型名
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.descriptor.type_info().short_name())
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn type_info(&self) -> &TypeInfo {
        self.descriptor.type_info()
    }

    pub fn scope(&self) -> Option<&Arc<dyn Scope>> {
        self.scope.as_ref()
    }

    pub fn wiring_mode(&self) -> WiringMode {
        self.wiring_mode
    }

    pub fn on_create(&self) -> Option<&OnCreate> {
        self.on_create.as_ref()
    }

    pub fn scope_lookup(&self) -> Option<Instance> {
        let (name, scope) = (self.name.as_deref()?, self.scope.as_ref()?);
        scope.lookup(name)
    }

    pub fn scope_register(&self, instance: Instance, destroy: Option<DestroyCallback>) -> ContainerResult<()> {
        let (Some(name), Some(scope)) = (self.name.as_deref(), self.scope.as_ref()) else {
            return Ok(());
        };
        let mut entry = ScopedInstance::new(name, instance);
        if let Some(destroy) = destroy {
            entry = entry.with_destroy(destroy);
        }
        scope.register(entry)
    }

    pub fn scope_remove(&self) {
        if let (Some(name), Some(scope)) = (self.name.as_deref(), self.scope.as_ref()) {
            scope.remove(name);
        }
    }

    pub fn scope_discard(&self, instance: &Instance) {
        if let (Some(name), Some(scope)) = (self.name.as_deref(), self.scope.as_ref()) {
            scope.discard(name, instance);
        }
    }

    /// 注入点是否已经解析
    pub fn is_sealed(&self) -> bool {
        self.resolved.get().is_some()
    }

    fn with_cache(&self, update: impl FnOnce(&mut InjectionCache)) -> ContainerResult<()> {
        let mut cache = self.cache.lock();
        if self.is_sealed() {
            return Err(ContainerError::DefinitionSealed {
                name: self.display_name().to_string(),
            });
        }
        update(&mut cache);
        Ok(())
    }

    pub fn set_constructor(&self, point: CtorInjectionPoint) -> ContainerResult<()> {
        self.with_cache(|cache| cache.constructor = Some(point))
    }

    pub fn add_property(&self, point: PropertyInjectionPoint) -> ContainerResult<()> {
        self.with_cache(|cache| cache.properties.get_or_insert_with(Vec::new).push(point))
    }

    pub fn add_set(&self, point: SetInjectionPoint) -> ContainerResult<()> {
        self.with_cache(|cache| cache.sets.get_or_insert_with(Vec::new).push(point))
    }

    pub fn add_method(&self, point: MethodInjectionPoint) -> ContainerResult<()> {
        self.with_cache(|cache| cache.methods.get_or_insert_with(Vec::new).push(point))
    }

    pub fn add_init_methods(&self, points: Vec<InitMethodPoint>) -> ContainerResult<()> {
        self.with_cache(|cache| cache.init_methods.get_or_insert_with(Vec::new).extend(points))
    }

    pub fn add_destroy_methods(&self, points: Vec<DestroyMethodPoint>) -> ContainerResult<()> {
        self.with_cache(|cache| cache.destroy_methods.get_or_insert_with(Vec::new).extend(points))
    }

    pub fn add_value(&self, point: ValueInjectionPoint) -> ContainerResult<()> {
        self.with_cache(|cache| cache.values.get_or_insert_with(Vec::new).push(point))
    }

    /// 只保留构造器，其余注入点全部置空，等待手动登记
    pub fn define_only(&self, constructor: Option<CtorInjectionPoint>) -> ContainerResult<()> {
        self.with_cache(|cache| {
            *cache = InjectionCache {
                constructor,
                properties: Some(Vec::new()),
                sets: Some(Vec::new()),
                methods: Some(Vec::new()),
                init_methods: Some(Vec::new()),
                destroy_methods: Some(Vec::new()),
                values: Some(Vec::new()),
            };
        })
    }

    /// 解析注入点，每个定义只解析一次
    pub fn resolve_injection(
        &self,
        config: &ContainerConfig,
        resolver: &dyn MetadataResolver,
        params: &ParameterStore,
    ) -> ContainerResult<Arc<ResolvedInjection>> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(Arc::clone(resolved));
        }

        let cache = self.cache.lock();
        if let Some(resolved) = self.resolved.get() {
            return Ok(Arc::clone(resolved));
        }

        let builder = InjectionPointBuilder::new(config);
        let descriptor = self.descriptor.as_ref();
        let metadata = resolver.resolve(descriptor);
        let autowire = self.wiring_mode == WiringMode::Autowire;

        let constructor = match &cache.constructor {
            Some(point) => Some(point.clone()),
            None => builder.constructor(descriptor, &metadata)?,
        };
        let properties = match &cache.properties {
            Some(points) => points.clone(),
            None => builder.properties(descriptor, &metadata, autowire)?,
        };
        let sets = match &cache.sets {
            Some(points) => points.clone(),
            None => builder.aggregates(descriptor, &metadata, autowire)?,
        };
        let methods = match &cache.methods {
            Some(points) => points.clone(),
            None => builder.methods(descriptor, &metadata)?,
        };
        let mut init_methods = match &cache.init_methods {
            Some(points) => points.clone(),
            None => builder.init_methods(descriptor, &metadata)?,
        };
        sort_init_methods(&mut init_methods);
        let destroy_methods = match &cache.destroy_methods {
            Some(points) => points.clone(),
            None => builder.destroy_methods(descriptor, &metadata)?,
        };
        let values = match &cache.values {
            Some(points) => points.clone(),
            None => builder.values(descriptor, &metadata)?,
        };
        let params = match &self.name {
            Some(name) if config.implicit_param_injection => params.keys_with_prefix(&format!("{}.", name)),
            _ => Vec::new(),
        };

        let resolved = Arc::new(ResolvedInjection {
            constructor,
            properties,
            sets,
            methods,
            init_methods,
            destroy_methods,
            values,
            params,
        });
        debug!(
            "解析注入点: {} (属性 {}, 集合 {}, 方法 {}, 初始化 {}, 销毁 {}, 参数 {})",
            self.display_name(),
            resolved.properties.len(),
            resolved.sets.len(),
            resolved.methods.len(),
            resolved.init_methods.len(),
            resolved.destroy_methods.len(),
            resolved.params.len() + resolved.values.len()
        );

        let resolved = self.resolved.get_or_init(|| resolved);
        drop(cache);
        Ok(Arc::clone(resolved))
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("type", &self.descriptor.type_info().full_name())
            .field("scope", &self.scope.as_ref().map(|s| s.name()))
            .field("wiring_mode", &self.wiring_mode)
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationResolver;
    use crate::scopes::SingletonScope;
    use infrastructure_common::InitPhase;

    #[derive(Default)]
    struct Mailer;

    fn definition() -> ComponentDefinition {
        let descriptor = TypeDescriptor::builder::<Mailer>()
            .default_constructor()
            .hook("open", |_| Ok(()))
            .hook("close", |_| Ok(()))
            .init("open", None, InitPhase::PostConstruct)
            .destroy("close")
            .build();
        ComponentDefinition::new(
            "mailer".to_string(),
            descriptor,
            Arc::new(SingletonScope::default()),
            WiringMode::Strict,
            None,
        )
    }

    #[test]
    fn test_resolve_once_then_sealed() {
        let definition = definition();
        let config = ContainerConfig::default();
        let params = ParameterStore::default();
        params.define("mailer.host", "smtp");

        let first = definition
            .resolve_injection(&config, &AnnotationResolver, &params)
            .unwrap();
        let second = definition
            .resolve_injection(&config, &AnnotationResolver, &params)
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.init_methods.len(), 1);
        assert_eq!(first.destroy_methods.len(), 1);
        assert_eq!(first.params, vec!["mailer.host".to_string()]);

        let result = definition.add_destroy_methods(Vec::new());
        assert!(matches!(result, Err(ContainerError::DefinitionSealed { .. })));
    }

    #[test]
    fn test_define_only_clears_hooks() {
        let definition = definition();
        definition.define_only(None).unwrap();

        let resolved = definition
            .resolve_injection(&ContainerConfig::default(), &AnnotationResolver, &ParameterStore::default())
            .unwrap();
        assert!(resolved.init_methods.is_empty());
        assert!(resolved.destroy_methods.is_empty());
        assert!(resolved.constructor.is_some());
    }

    #[test]
    fn test_scope_roundtrip() {
        let definition = definition();
        assert!(definition.scope_lookup().is_none());

        let instance = Instance::new(Mailer);
        definition.scope_register(instance.clone(), None).unwrap();
        assert!(definition.scope_lookup().unwrap().ptr_eq(&instance));

        definition.scope_remove();
        assert!(definition.scope_lookup().is_none());
    }
}

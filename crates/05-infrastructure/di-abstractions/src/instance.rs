//! 类型擦除的组件实例与注入值
//!
//! 容器在运行时只接触 [`Instance`]，只有用户提供的闭包才知道具体类型。
//! 注入到引用属性时，实例会被转换成目标类型的 [`Handle`]，
//! 从而支持以 `dyn Trait` 能力类型注入。

use infrastructure_common::{BoxError, ContainerError, ContainerResult, TypeInfo};
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

type ErasedArc = Arc<dyn Any + Send + Sync>;

/// 类型擦除的组件实例
///
/// 克隆只增加引用计数，两个克隆指向同一个对象
#[derive(Clone)]
pub struct Instance {
    value: ErasedArc,
    type_info: Arc<TypeInfo>,
    to_handle: fn(&ErasedArc) -> Option<Handle>,
}

impl Instance {
    /// 包装一个新创建的值
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// 包装一个已共享的值
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        let value: ErasedArc = value;
        Self {
            value,
            type_info: Arc::new(TypeInfo::of::<T>()),
            to_handle: own_handle::<T>,
        }
    }

    /// 实例的具体类型
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn type_id(&self) -> TypeId {
        self.type_info.id
    }

    pub fn downcast_ref<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// 以实例自身的具体类型生成句柄
    pub fn to_handle(&self) -> Option<Handle> {
        (self.to_handle)(&self.value)
    }

    /// 是否为同一个对象
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.value) as *const u8,
            Arc::as_ptr(&other.value) as *const u8,
        )
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.type_info.short_name())
    }
}

fn own_handle<T: Send + Sync + 'static>(value: &ErasedArc) -> Option<Handle> {
    value.clone().downcast::<T>().ok().map(Handle::new)
}

/// 已转换为某个目标类型的共享引用
///
/// 目标类型可以是具体类型，也可以是 `dyn Trait`
#[derive(Clone)]
pub struct Handle {
    inner: ErasedArc,
    target: &'static str,
}

impl Handle {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            inner: Arc::new(value),
            target: std::any::type_name::<T>(),
        }
    }

    /// 取回目标类型的引用，类型不一致时返回 `None`
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.downcast_ref::<Arc<T>>().cloned()
    }

    /// 句柄的目标类型名称
    pub fn target_type(&self) -> &'static str {
        self.target
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.target)
    }
}

/// 委托的查找策略，参数为期望的目标类型
pub type InvokeStrategy = Arc<dyn Fn(TypeId) -> ContainerResult<Handle> + Send + Sync>;

/// 作用域委托
///
/// 注入到长生命周期组件中的替身，每次访问时都会重新查找依赖，
/// 因此总能拿到依赖在其自身作用域中的当前实例
#[derive(Clone)]
pub struct Delegate {
    dependency: String,
    type_info: TypeInfo,
    strategy: InvokeStrategy,
}

impl Delegate {
    pub fn new(dependency: impl Into<String>, type_info: TypeInfo, strategy: InvokeStrategy) -> Self {
        Self {
            dependency: dependency.into(),
            type_info,
            strategy,
        }
    }

    /// 被委托的组件名称
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// 被委托组件的声明类型
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// 查找依赖的当前实例
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        let handle = (self.strategy)(TypeId::of::<T>())?;
        handle
            .downcast::<T>()
            .ok_or_else(|| ContainerError::type_mismatch(std::any::type_name::<T>(), handle.target_type()))
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("dependency", &self.dependency)
            .field("type", &self.type_info.short_name())
            .finish()
    }
}

/// 组件持有的依赖引用，可能是直接引用也可能是委托
pub struct Ref<T: ?Sized> {
    source: RefSource<T>,
}

enum RefSource<T: ?Sized> {
    Direct(Arc<T>),
    Delegate(Delegate),
}

impl<T: ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            RefSource::Direct(value) => RefSource::Direct(Arc::clone(value)),
            RefSource::Delegate(delegate) => RefSource::Delegate(delegate.clone()),
        };
        Self { source }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Ref<T> {
    pub fn direct(value: Arc<T>) -> Self {
        Self {
            source: RefSource::Direct(value),
        }
    }

    /// 从注入值构造引用
    pub fn from_value(value: &Value) -> ContainerResult<Self> {
        match value {
            Value::Component(handle) => handle.downcast::<T>().map(Self::direct).ok_or_else(|| {
                ContainerError::type_mismatch(std::any::type_name::<T>(), handle.target_type())
            }),
            Value::Delegate(delegate) => Ok(Self {
                source: RefSource::Delegate(delegate.clone()),
            }),
            other => Err(ContainerError::type_mismatch(
                std::any::type_name::<T>(),
                other.kind(),
            )),
        }
    }

    /// 获取依赖，委托每次都会重新查找
    pub fn get(&self) -> ContainerResult<Arc<T>> {
        match &self.source {
            RefSource::Direct(value) => Ok(Arc::clone(value)),
            RefSource::Delegate(delegate) => delegate.resolve::<T>(),
        }
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self.source, RefSource::Delegate(_))
    }
}

impl<T: ?Sized> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            RefSource::Direct(_) => write!(f, "Ref::Direct({})", std::any::type_name::<T>()),
            RefSource::Delegate(delegate) => write!(f, "Ref::Delegate({})", delegate.dependency()),
        }
    }
}

/// 注入到属性、构造参数或方法参数中的值
#[derive(Debug, Clone)]
pub enum Value {
    /// 已转换为目标类型的组件
    Component(Handle),
    /// 作用域委托
    Delegate(Delegate),
    /// 集合注入的所有匹配组件
    Components(Vec<Handle>),
    /// 参数或配置数据
    Data(serde_json::Value),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Data(serde_json::Value::String(value.into()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Component(_) => "component",
            Self::Delegate(_) => "delegate",
            Self::Components(_) => "components",
            Self::Data(_) => "data",
        }
    }

    /// 取出数据值并转换为目标类型
    ///
    /// 字符串会再按 JSON 文本解析一次，因此 `"42"` 可以赋给整数属性
    pub fn data<V: DeserializeOwned>(&self) -> ContainerResult<V> {
        match self {
            Self::Data(json) => convert_data(json)
                .map_err(|e| ContainerError::type_mismatch(std::any::type_name::<V>(), e.to_string())),
            other => Err(ContainerError::type_mismatch(
                std::any::type_name::<V>(),
                other.kind(),
            )),
        }
    }
}

fn convert_data<V: DeserializeOwned>(json: &serde_json::Value) -> Result<V, serde_json::Error> {
    match serde_json::from_value(json.clone()) {
        Ok(value) => Ok(value),
        Err(err) => match json {
            serde_json::Value::String(text) => serde_json::from_str(text).map_err(|_| err),
            _ => Err(err),
        },
    }
}

/// 构造器或注入方法的实参
///
/// 未解析的依赖在可选模式下为 `None`
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Option<Value>>,
}

impl Args {
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// 取出第 `index` 个组件参数，委托会立即解析
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        match self.value(index)? {
            Value::Component(handle) => handle.downcast::<T>(),
            Value::Delegate(delegate) => delegate.resolve::<T>().ok(),
            _ => None,
        }
    }

    /// 取出第 `index` 个组件参数，保留委托语义
    pub fn reference<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Option<Ref<T>> {
        self.value(index).and_then(|value| Ref::from_value(value).ok())
    }

    /// 取出必需的组件参数
    pub fn require<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, BoxError> {
        self.get::<T>(index).ok_or_else(|| {
            format!("缺少第 {} 个参数: {}", index, std::any::type_name::<T>()).into()
        })
    }
}

//! 作用域抽象接口
//!
//! 作用域决定组件实例的存放位置和生命周期

use crate::instance::Instance;
use infrastructure_common::ContainerResult;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// 作用域 trait
///
/// 每种作用域在一个容器内只存在一个实例，由容器按 [`ScopeType`] 延迟创建
pub trait Scope: Send + Sync + 'static {
    /// 作用域名称，用于日志和错误消息
    fn name(&self) -> &'static str;

    /// 按组件名称查找已存放的实例
    fn lookup(&self, name: &str) -> Option<Instance>;

    /// 存放实例，不存放实例的作用域直接忽略
    fn register(&self, entry: ScopedInstance) -> ContainerResult<()>;

    /// 移除实例，不执行销毁钩子
    fn remove(&self, name: &str);

    /// 撤销一次未完成的登记，实例不再参与关闭时的销毁
    fn discard(&self, name: &str, _instance: &Instance) {
        self.remove(name);
    }

    /// 关闭作用域，按登记顺序执行销毁钩子，遇到第一个失败即返回
    fn shutdown(&self) -> ContainerResult<()>;

    /// 本作用域中的组件能否直接持有另一作用域中组件的引用
    fn accept(&self, referenced: &dyn Scope) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({})", self.name())
    }
}

/// 判断作用域对象是否为指定类型
pub fn is_scope<S: Scope>(scope: &dyn Scope) -> bool {
    scope.as_any().is::<S>()
}

/// 作用域类型标识
///
/// 注册组件时以类型而非实例指定作用域，容器负责创建和复用作用域实例
#[derive(Clone, Copy)]
pub struct ScopeType {
    id: TypeId,
    name: &'static str,
    create: fn() -> Arc<dyn Scope>,
}

impl ScopeType {
    pub fn of<S: Scope + Default>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
            create: create_scope::<S>,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 去掉模块路径的作用域类型名
    pub fn name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    /// 创建一个新的作用域实例
    pub fn create(&self) -> Arc<dyn Scope> {
        (self.create)()
    }
}

fn create_scope<S: Scope + Default>() -> Arc<dyn Scope> {
    Arc::new(S::default())
}

impl PartialEq for ScopeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScopeType {}

impl fmt::Debug for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeType({})", self.name())
    }
}

/// 销毁回调
pub type DestroyCallback = Arc<dyn Fn(&Instance) -> ContainerResult<()> + Send + Sync>;

/// 存放在作用域中的实例
#[derive(Clone)]
pub struct ScopedInstance {
    /// 组件名称
    pub name: String,
    /// 实例
    pub instance: Instance,
    destroy: Option<DestroyCallback>,
}

impl ScopedInstance {
    pub fn new(name: impl Into<String>, instance: Instance) -> Self {
        Self {
            name: name.into(),
            instance,
            destroy: None,
        }
    }

    /// 附加销毁回调，作用域关闭时调用
    pub fn with_destroy(mut self, destroy: DestroyCallback) -> Self {
        self.destroy = Some(destroy);
        self
    }

    pub fn has_destroy(&self) -> bool {
        self.destroy.is_some()
    }

    /// 执行销毁回调
    pub fn destroy(&self) -> ContainerResult<()> {
        match &self.destroy {
            Some(destroy) => destroy(&self.instance),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ScopedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedInstance")
            .field("name", &self.name)
            .field("instance", &self.instance)
            .field("has_destroy", &self.has_destroy())
            .finish()
    }
}

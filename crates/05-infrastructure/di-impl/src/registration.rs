//! 组件注册请求

use crate::definition::OnCreate;
use di_abstractions::{Instance, ScopeType, TypeDescriptor};
use infrastructure_common::{BoxError, WiringMode};
use std::fmt;
use std::sync::Arc;

/// 组件注册请求
///
/// 未指定的项依次取自类型上声明的元数据和容器默认值
///
/// ```ignore
/// container.register(
///     ComponentRegistration::of(descriptor)
///         .name("mailer")
///         .scope(ScopeType::of::<ProtoScope>())
///         .wiring(WiringMode::Optional),
/// )?;
/// ```
pub struct ComponentRegistration {
    pub(crate) descriptor: Arc<TypeDescriptor>,
    pub(crate) name: Option<String>,
    pub(crate) scope: Option<ScopeType>,
    pub(crate) wiring_mode: Option<WiringMode>,
    pub(crate) define_only: bool,
    pub(crate) on_create: Option<OnCreate>,
}

impl ComponentRegistration {
    pub fn of(descriptor: Arc<TypeDescriptor>) -> Self {
        Self {
            descriptor,
            name: None,
            scope: None,
            wiring_mode: None,
            define_only: false,
            on_create: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn scope(mut self, scope: ScopeType) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn wiring(mut self, mode: WiringMode) -> Self {
        self.wiring_mode = Some(mode);
        self
    }

    /// 只登记定义，注入点全部由调用方手动登记
    pub fn define_only(mut self) -> Self {
        self.define_only = true;
        self
    }

    /// 实例就绪前调用的回调
    pub fn on_create(mut self, callback: impl Fn(&Instance) -> Result<(), BoxError> + Send + Sync + 'static) -> Self {
        self.on_create = Some(Arc::new(callback));
        self
    }

    /// 以具体类型接收实例的回调
    pub fn on_create_typed<T>(self, callback: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.on_create(move |instance: &Instance| match instance.downcast_ref::<T>() {
            Some(value) => callback(value),
            None => Err(format!("创建回调期望类型 {}", std::any::type_name::<T>()).into()),
        })
    }
}

impl fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("type", &self.descriptor.type_info().short_name())
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("wiring_mode", &self.wiring_mode)
            .field("define_only", &self.define_only)
            .finish()
    }
}

//! # 依赖注入容器实现
//!
//! 提供 [`Container`] 及其内部协作者的默认实现。
//!
//! ## 核心内容
//!
//! - [`Container`] / [`ContainerBuilder`] - 容器门面与构建器
//! - [`ComponentRegistration`] - 组件注册请求
//! - [`SingletonScope`] / [`ProtoScope`] / [`ThreadLocalScope`] - 内置作用域
//! - [`ParameterStore`] - 参数存储与 `${...}` 解析
//! - [`PathAccessor`] - 属性路径访问器
//!
//! ## 创建流程
//!
//! 构造 → 登记作用域 → POST_CONSTRUCT → 装配 → POST_DEFINE → 参数注入
//! → POST_INITIALIZE → 创建回调 → 就绪

pub mod accessor;
pub mod annotation;
pub mod container;
pub mod definition;
pub mod delegate;
mod engine;
pub mod injection;
pub mod mixing;
pub mod params;
pub mod registration;
pub mod registry;
pub mod scopes;

pub use accessor::*;
pub use annotation::*;
pub use container::*;
pub use definition::*;
pub use delegate::*;
pub use injection::*;
pub use mixing::*;
pub use params::*;
pub use registration::*;
pub use registry::*;
pub use scopes::*;

//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义容器引擎与其协作者之间的接口。
//!
//! ## 核心接口
//!
//! - [`TypeDescriptor`] - 组件类型描述，替代运行时反射
//! - [`Instance`] / [`Value`] - 类型擦除的组件实例与注入值
//! - [`Scope`] - 作用域接口
//! - [`MetadataResolver`] - 元数据解析器接口
//! - [`MemberAccessor`] - 属性路径访问接口
//! - [`DelegateFactory`] - 作用域委托工厂接口

pub mod accessor;
pub mod descriptor;
pub mod factory;
pub mod instance;
pub mod resolver;
pub mod scope;

pub use accessor::*;
pub use descriptor::*;
pub use factory::*;
pub use instance::*;
pub use resolver::*;
pub use scope::*;

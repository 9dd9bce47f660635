//! 委托工厂抽象接口
//!
//! 作用域不兼容的依赖通过委托注入，委托在每次访问时重新查找依赖

use crate::descriptor::TypeDescriptor;
use crate::instance::{Delegate, InvokeStrategy};
use infrastructure_common::ContainerResult;

/// 委托工厂 trait
pub trait DelegateFactory: Send + Sync {
    /// 为名为 `dependency` 的组件创建委托
    ///
    /// `strategy` 负责查找依赖的当前实例，工厂只负责包装
    fn create_delegate(
        &self,
        dependency: &str,
        descriptor: &TypeDescriptor,
        strategy: InvokeStrategy,
    ) -> ContainerResult<Delegate>;
}

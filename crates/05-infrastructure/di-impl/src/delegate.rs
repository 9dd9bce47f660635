//! 默认委托工厂

use di_abstractions::{Delegate, DelegateFactory, InvokeStrategy, TypeDescriptor};
use infrastructure_common::ContainerResult;
use tracing::debug;

/// 以 [`Delegate`] 包装查找策略的委托工厂
///
/// 委托本身不缓存任何实例，每次访问都经由策略重新查找
#[derive(Debug, Default, Clone, Copy)]
pub struct LookupDelegateFactory;

impl DelegateFactory for LookupDelegateFactory {
    fn create_delegate(
        &self,
        dependency: &str,
        descriptor: &TypeDescriptor,
        strategy: InvokeStrategy,
    ) -> ContainerResult<Delegate> {
        debug!("创建作用域委托: {} ({})", dependency, descriptor.type_info().short_name());
        Ok(Delegate::new(dependency, descriptor.type_info().clone(), strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::Handle;
    use std::sync::Arc;

    #[derive(Default)]
    struct Clock;

    #[test]
    fn test_delegate_keeps_dependency_identity() {
        let descriptor = TypeDescriptor::builder::<Clock>().default_constructor().build();
        let strategy: InvokeStrategy = Arc::new(|_| Ok(Handle::new(Arc::new(Clock))));

        let delegate = LookupDelegateFactory
            .create_delegate("clock", &descriptor, strategy)
            .unwrap();

        assert_eq!(delegate.dependency(), "clock");
        assert_eq!(delegate.type_info().short_name(), "Clock");
        assert!(delegate.resolve::<Clock>().is_ok());
    }
}

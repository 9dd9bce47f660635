//! 作用域混用检查
//!
//! 长生命周期组件直接持有短生命周期组件时，后者的替换或失效对前者不可见。
//! 检查在属性和方法注入时进行，构造参数和集合注入不经过检查。

use crate::definition::ComponentDefinition;
use dashmap::DashMap;
use di_abstractions::{Delegate, DelegateFactory, InvokeStrategy, Value};
use infrastructure_common::{ContainerConfig, ContainerError, ContainerResult};
use std::sync::Arc;
use tracing::warn;

/// 作用域混用守卫
pub struct ScopeMixingGuard {
    wire_proxy: bool,
    detect: bool,
    factory: Arc<dyn DelegateFactory>,
    delegates: DashMap<String, Delegate>,
}

impl ScopeMixingGuard {
    pub fn new(config: &ContainerConfig, factory: Arc<dyn DelegateFactory>) -> Self {
        Self {
            wire_proxy: config.wire_scoped_proxy,
            detect: config.detect_mixed_scopes,
            factory,
            delegates: DashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.wire_proxy || self.detect
    }

    /// 检查 `target` 能否直接持有 `dependency`
    ///
    /// 返回 `Ok(None)` 表示可以直接注入；启用委托时返回该依赖的委托
    pub fn lookup_value(
        &self,
        target: &ComponentDefinition,
        dependency: &ComponentDefinition,
        strategy: impl FnOnce(&str) -> InvokeStrategy,
    ) -> ContainerResult<Option<Value>> {
        let (Some(target_scope), Some(dependency_scope)) = (target.scope(), dependency.scope()) else {
            return Ok(None);
        };
        if target_scope.accept(dependency_scope.as_ref()) {
            return Ok(None);
        }

        let mixing = || ContainerError::ScopeMixing {
            component: target.display_name().to_string(),
            scope: target_scope.name().to_string(),
            dependency: dependency.display_name().to_string(),
            dependency_scope: dependency_scope.name().to_string(),
        };

        if !self.wire_proxy {
            if self.detect {
                return Err(mixing());
            }
            return Ok(None);
        }
        if self.detect {
            warn!("{}，改为注入委托", mixing());
        }

        let Some(name) = dependency.name() else {
            return Ok(None);
        };
        if let Some(delegate) = self.delegates.get(name) {
            return Ok(Some(Value::Delegate(delegate.value().clone())));
        }
        let delegate = self
            .factory
            .create_delegate(name, dependency.descriptor(), strategy(name))?;
        let delegate = self
            .delegates
            .entry(name.to_string())
            .or_insert(delegate)
            .value()
            .clone();
        Ok(Some(Value::Delegate(delegate)))
    }

    /// 丢弃某个依赖的委托，组件重新注册后会生成新的委托
    pub fn forget(&self, name: &str) {
        self.delegates.remove(name);
    }

    pub fn clear(&self) {
        self.delegates.clear();
    }
}

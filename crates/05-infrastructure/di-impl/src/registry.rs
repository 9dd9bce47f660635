//! 组件注册表
//!
//! 保存组件定义、备用名称、提供者和作用域实例。
//! 备用名称值为 `None` 表示该名称被多个组件争用，已经作废。

use crate::definition::ComponentDefinition;
use crate::injection::References;
use dashmap::DashMap;
use di_abstractions::{Scope, ScopeType, TypeDescriptor};
use infrastructure_common::{ContainerConfig, ContainerError, ContainerResult, NamingConventions};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 提供者定义
///
/// 实例提供者在宿主组件上调用，静态提供者直接调用类型上的函数
#[derive(Debug, Clone)]
pub struct ProviderDefinition {
    pub name: String,
    pub host: Option<String>,
    pub descriptor: Arc<TypeDescriptor>,
    pub method: String,
}

/// 组件注册表
#[derive(Default)]
pub struct ComponentRegistry {
    definitions: RwLock<HashMap<String, Arc<ComponentDefinition>>>,
    alt_names: RwLock<HashMap<String, Option<String>>>,
    providers: RwLock<HashMap<String, ProviderDefinition>>,
    scopes: RwLock<Vec<(TypeId, Arc<dyn Scope>)>>,
    catalog: DashMap<TypeId, Arc<TypeDescriptor>>,
    names_for_type: DashMap<TypeId, Arc<[String]>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记组件定义
    ///
    /// 同名的旧定义先被移除（包括作用域中的实例），然后才做重名检查
    pub fn insert(
        &self,
        definition: Arc<ComponentDefinition>,
        config: &ContainerConfig,
        declared_name: bool,
    ) -> ContainerResult<()> {
        let name = definition
            .name()
            .ok_or_else(|| ContainerError::invalid_injection_point("外部定义不能登记到注册表"))?
            .to_string();

        if let Some(existing) = self.remove(&name) {
            if config.detect_duplicated_names {
                return Err(ContainerError::DuplicateName {
                    name,
                    existing: existing.type_info().full_name().to_string(),
                    type_name: definition.type_info().full_name().to_string(),
                });
            }
            debug!("替换组件定义: {} ({} -> {})", name, existing.type_info(), definition.type_info());
        }

        let descriptor = Arc::clone(definition.descriptor());
        self.remember(Arc::clone(&descriptor));
        self.definitions.write().insert(name.clone(), definition);

        if config.use_alt_names && !declared_name {
            self.register_alt_names(&name, &descriptor, config.use_full_type_names);
        }
        self.names_for_type.clear();
        Ok(())
    }

    fn register_alt_names(&self, name: &str, descriptor: &TypeDescriptor, use_full_type_names: bool) {
        let definitions = self.definitions.read();
        let mut alt_names = self.alt_names.write();

        for capability in descriptor.capabilities() {
            let alt_name = NamingConventions::component_name(capability.type_info(), use_full_type_names);
            if alt_name == name || definitions.contains_key(&alt_name) {
                continue;
            }
            match alt_names.get(&alt_name).cloned() {
                None => {
                    alt_names.insert(alt_name, Some(name.to_string()));
                }
                Some(Some(owner)) if owner != name => {
                    debug!("备用名称 {} 被 {} 和 {} 争用，已作废", alt_name, owner, name);
                    alt_names.insert(alt_name, None);
                }
                Some(_) => {}
            }
        }
    }

    /// 按名称查找定义，主名称优先，其次为有效的备用名称
    pub fn lookup(&self, name: &str, use_alt_names: bool) -> Option<Arc<ComponentDefinition>> {
        if let Some(definition) = self.definitions.read().get(name) {
            return Some(Arc::clone(definition));
        }
        if !use_alt_names {
            return None;
        }
        let owner = self.alt_names.read().get(name).cloned().flatten()?;
        self.definitions.read().get(&owner).cloned()
    }

    /// 第一个能找到定义的候选名称
    pub fn lookup_first(&self, references: &References, use_alt_names: bool) -> Option<Arc<ComponentDefinition>> {
        references.names().find_map(|name| self.lookup(name, use_alt_names))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    /// 移除定义，同时移除作用域中的实例，不执行销毁钩子
    pub fn remove(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        let removed = self.definitions.write().remove(name)?;
        removed.scope_remove();
        self.names_for_type.clear();
        Some(removed)
    }

    /// 移除所有具体类型为 `type_id` 的定义，返回被移除的名称
    pub fn remove_type(&self, type_id: TypeId) -> Vec<String> {
        let names: Vec<String> = self
            .definitions
            .read()
            .iter()
            .filter(|(_, definition)| definition.descriptor().type_id() == type_id)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            self.remove(name);
        }
        names
    }

    /// 所有主名称，按字典序排列
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.definitions.read().len()
    }

    /// 类型可以赋值给 `target` 的所有组件名称，结果会缓存到下一次注册或移除
    pub fn names_for_type(&self, target: TypeId) -> Arc<[String]> {
        if let Some(cached) = self.names_for_type.get(&target) {
            return Arc::clone(cached.value());
        }
        let mut names: Vec<String> = self
            .definitions
            .read()
            .iter()
            .filter(|(_, definition)| definition.descriptor().is_assignable_to(target))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        let names: Arc<[String]> = names.into();
        self.names_for_type.insert(target, Arc::clone(&names));
        names
    }

    pub fn add_provider(&self, provider: ProviderDefinition) {
        debug!("登记提供者: {} -> {}#{}", provider.name, provider.descriptor.type_info(), provider.method);
        self.providers.write().insert(provider.name.clone(), provider);
    }

    pub fn provider(&self, name: &str) -> Option<ProviderDefinition> {
        self.providers.read().get(name).cloned()
    }

    /// 作用域实例，首次使用时创建
    pub fn scope(&self, scope_type: ScopeType) -> Arc<dyn Scope> {
        if let Some((_, scope)) = self.scopes.read().iter().find(|(id, _)| *id == scope_type.id()) {
            return Arc::clone(scope);
        }
        let mut scopes = self.scopes.write();
        if let Some((_, scope)) = scopes.iter().find(|(id, _)| *id == scope_type.id()) {
            return Arc::clone(scope);
        }
        let scope = scope_type.create();
        debug!("创建作用域: {}", scope.name());
        scopes.push((scope_type.id(), Arc::clone(&scope)));
        scope
    }

    /// 替换作用域实例，只影响之后注册的组件
    pub fn register_scope(&self, scope_type: ScopeType, scope: Arc<dyn Scope>) {
        let mut scopes = self.scopes.write();
        match scopes.iter_mut().find(|(id, _)| *id == scope_type.id()) {
            Some(entry) => entry.1 = scope,
            None => scopes.push((scope_type.id(), scope)),
        }
    }

    /// 所有作用域，按创建顺序排列
    pub fn scopes(&self) -> Vec<Arc<dyn Scope>> {
        self.scopes.read().iter().map(|(_, scope)| Arc::clone(scope)).collect()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.read().len()
    }

    /// 记住类型描述，用于把实例转换为能力类型
    pub fn remember(&self, descriptor: Arc<TypeDescriptor>) {
        self.catalog.entry(descriptor.type_id()).or_insert(descriptor);
    }

    pub fn descriptor_of(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.catalog.get(&type_id).map(|entry| Arc::clone(entry.value()))
    }

    /// 清空所有登记信息
    pub fn clear(&self) {
        self.definitions.write().clear();
        self.alt_names.write().clear();
        self.providers.write().clear();
        self.scopes.write().clear();
        self.names_for_type.clear();
    }
}

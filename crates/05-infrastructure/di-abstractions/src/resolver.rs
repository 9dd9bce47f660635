//! 元数据解析抽象接口
//!
//! 元数据描述组件类型上声明的注入点、生命周期钩子、参数注入点和提供者，
//! 解析器把类型描述转换为 [`TypeMetadata`]，供注入点构建器使用

use crate::descriptor::TypeDescriptor;
use crate::scope::ScopeType;
use infrastructure_common::{InitPhase, WiringMode};

/// 元数据解析器 trait
///
/// 解析过程是纯函数，同一类型描述总是得到相同的结果
pub trait MetadataResolver: Send + Sync {
    fn resolve(&self, descriptor: &TypeDescriptor) -> TypeMetadata;
}

/// 组件类型上声明的元数据
#[derive(Debug, Clone, Default)]
pub struct TypeMetadata {
    /// 声明的组件名称
    pub name: Option<String>,
    /// 声明的作用域
    pub scope: Option<ScopeType>,
    /// 声明的装配模式
    pub wiring_mode: WiringMode,
    /// 标注为注入点的构造器
    pub constructor: Option<ConstructorHint>,
    /// 标注为注入点的引用属性
    pub properties: Vec<PropertyHint>,
    /// 标注为集合注入点的属性
    pub aggregates: Vec<String>,
    /// 标注为注入点的方法
    pub methods: Vec<MethodHint>,
    /// 初始化钩子
    pub init_methods: Vec<InitHint>,
    /// 销毁钩子
    pub destroy_methods: Vec<String>,
    /// 参数注入点
    pub values: Vec<ValueHint>,
    /// 提供者
    pub providers: Vec<ProviderHint>,
}

/// 构造器注入点声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorHint {
    /// 构造器在类型描述中的下标
    pub index: usize,
    /// 每个参数显式指定的引用名称，`None` 表示使用默认引用
    pub references: Option<Vec<Option<String>>>,
}

/// 引用属性注入点声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyHint {
    pub property: String,
    /// 显式指定的引用名称
    pub reference: Option<String>,
}

/// 方法注入点声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHint {
    pub method: String,
    pub references: Option<Vec<Option<String>>>,
}

/// 初始化钩子声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitHint {
    pub method: String,
    /// 调用顺序，`None` 表示默认顺序，负数排在最后
    pub order: Option<i32>,
    pub phase: InitPhase,
}

/// 参数注入点声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHint {
    pub property: String,
    /// 参数模板，可以包含 `${...}` 引用
    pub template: String,
}

/// 提供者声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderHint {
    /// 提供者注册名称
    pub name: String,
    /// 类型描述中的提供者方法名
    pub method: String,
}

/// 把注解中的引用列表转换为内部表示，空字符串表示该位置使用默认引用
pub fn reference_list(references: &[&str]) -> Option<Vec<Option<String>>> {
    if references.is_empty() {
        return None;
    }
    Some(
        references
            .iter()
            .map(|reference| (!reference.is_empty()).then(|| reference.to_string()))
            .collect(),
    )
}

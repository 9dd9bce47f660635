//! 组件装配与生命周期相关的枚举

use serde::{Deserialize, Serialize};
use std::fmt;

/// 装配模式
///
/// 决定依赖无法解析时容器的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WiringMode {
    /// 不做任何依赖查找，仅适用于无参构造
    None,
    /// 严格模式 - 任一依赖缺失即失败
    Strict,
    /// 可选模式 - 缺失的依赖保持为空
    Optional,
    /// 自动装配 - 所有引用属性都视为注入点，缺失的依赖保持为空
    Autowire,
    /// 使用元数据或容器默认值
    #[default]
    Default,
}

impl WiringMode {
    /// 缺失依赖是否为致命错误
    pub fn is_strict(self) -> bool {
        self == Self::Strict
    }
}

impl fmt::Display for WiringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Strict => "STRICT",
            Self::Optional => "OPTIONAL",
            Self::Autowire => "AUTOWIRE",
            Self::Default => "DEFAULT",
        };
        f.write_str(name)
    }
}

/// 初始化钩子的调用时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitPhase {
    /// 构造完成后、装配之前
    PostConstruct,
    /// 装配完成后、参数注入之前
    PostDefine,
    /// 参数注入之后
    #[default]
    PostInitialize,
}

/// 默认引用名称的候选来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// 属性名或参数名
    Name,
    /// 首字母小写的简短类型名
    TypeShortName,
    /// 完整类型路径
    TypeFullName,
}

impl ReferenceKind {
    /// 默认的候选顺序
    pub fn defaults() -> Vec<Self> {
        vec![Self::Name, Self::TypeShortName, Self::TypeFullName]
    }
}

/// 组件实例创建过程中的阶段
///
/// 阶段严格按顺序推进，前一阶段成功不会跳过后续阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationPhase {
    /// 实例已构造
    Created,
    /// 半成品实例已登记到作用域
    ScopeRegistered,
    /// 已执行 POST_CONSTRUCT 钩子
    PostConstruct,
    /// 属性、集合与方法注入完成
    Wired,
    /// 已执行 POST_DEFINE 钩子
    PostDefine,
    /// 参数注入完成
    ParamsInjected,
    /// 已执行 POST_INITIALIZE 钩子
    PostInitialize,
    /// 已执行注册时提供的创建回调
    PostCreateCallback,
    /// 实例可用
    Ready,
}

impl CreationPhase {
    /// 下一个阶段，`Ready` 之后没有阶段
    pub fn next(self) -> Option<Self> {
        let next = match self {
            Self::Created => Self::ScopeRegistered,
            Self::ScopeRegistered => Self::PostConstruct,
            Self::PostConstruct => Self::Wired,
            Self::Wired => Self::PostDefine,
            Self::PostDefine => Self::ParamsInjected,
            Self::ParamsInjected => Self::PostInitialize,
            Self::PostInitialize => Self::PostCreateCallback,
            Self::PostCreateCallback => Self::Ready,
            Self::Ready => return None,
        };
        Some(next)
    }
}

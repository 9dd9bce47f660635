//! 错误类型定义
//!
//! 容器引擎抛出的所有失败都归结为 [`ContainerError`]，
//! 调用方可以直接按类型匹配"是否为容器错误"，无需检查消息字符串。

use thiserror::Error;

/// 用户回调（构造器、注入方法、生命周期钩子、提供者）返回的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 容器错误类型
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("组件未找到: {name}")]
    ComponentNotFound { name: String },

    #[error("组件名称重复: {name}, 已注册类型 {existing}, 新注册类型 {type_name}")]
    DuplicateName {
        name: String,
        existing: String,
        type_name: String,
    },

    #[error("能力类型不能注册为组件: {type_name}")]
    CapabilityRegistration { type_name: String },

    #[error("依赖未解析: {target}, 候选引用 [{references}]")]
    UnresolvedDependency { target: String, references: String },

    #[error("检测到构造器循环依赖: {chain}")]
    CircularDependency { chain: String },

    #[error("解析深度超过上限 {limit}: {name}")]
    ResolutionDepthExceeded { name: String, limit: usize },

    #[error("检测到作用域混用: {component}@{scope} 引用 {dependency}@{dependency_scope}")]
    ScopeMixing {
        component: String,
        scope: String,
        dependency: String,
        dependency_scope: String,
    },

    #[error("成员不存在: {type_name}#{member}")]
    MemberNotFound { type_name: String, member: String },

    #[error("注入点无效: {message}")]
    InvalidInjectionPoint { message: String },

    #[error("组件定义已完成解析，不能再修改注入点: {name}")]
    DefinitionSealed { name: String },

    #[error("调用失败: {message}, 原因: {source}")]
    InvocationFailed {
        message: String,
        source: BoxError,
    },

    #[error("参数解析失败: {message}")]
    ParameterError { message: String },

    #[error("属性路径无效: {path}, 原因: {message}")]
    PropertyPath { path: String, message: String },

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("配置无效: {message}")]
    InvalidConfig { message: String },

    #[error("配置加载失败: {source}")]
    ConfigLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("作用域操作失败: {scope}, 原因: {message}")]
    ScopeError { scope: String, message: String },
}

impl ContainerError {
    /// 创建组件未找到错误
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::ComponentNotFound { name: name.into() }
    }

    /// 创建注入点无效错误
    pub fn invalid_injection_point(message: impl Into<String>) -> Self {
        Self::InvalidInjectionPoint {
            message: message.into(),
        }
    }

    /// 包装用户回调抛出的错误，保留原始原因
    pub fn invocation(message: impl Into<String>, source: BoxError) -> Self {
        Self::InvocationFailed {
            message: message.into(),
            source,
        }
    }

    /// 创建参数错误
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::ParameterError {
            message: message.into(),
        }
    }

    /// 创建属性路径错误
    pub fn property_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PropertyPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 创建类型不匹配错误
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// 结果类型别名
pub type ContainerResult<T> = Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_invocation_error_keeps_cause() {
        let cause: BoxError = "连接被拒绝".into();
        let err = ContainerError::invocation("初始化方法 start", cause);

        assert!(err.to_string().contains("初始化方法 start"));
        let source = err.source().expect("应该保留原始原因");
        assert_eq!(source.to_string(), "连接被拒绝");
    }

    #[test]
    fn test_not_found_message() {
        let err = ContainerError::not_found("userService");
        assert!(matches!(err, ContainerError::ComponentNotFound { ref name } if name == "userService"));
        assert_eq!(err.to_string(), "组件未找到: userService");
    }
}

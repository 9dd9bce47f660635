//! 容器配置
//!
//! 所有开关都应在组件注册开始之前设置完毕

use crate::errors::{ContainerError, ContainerResult};
use crate::lifecycle::{ReferenceKind, WiringMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// 环境变量覆盖的前缀
pub const CONFIG_ENV_PREFIX: &str = "LORN_IOC";

/// 容器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 注册时未指定装配模式、元数据也未声明时使用的装配模式
    pub default_wiring_mode: WiringMode,
    /// 是否在重复注册同名组件时报错
    pub detect_duplicated_names: bool,
    /// 隐式参数注入时是否解析 `${...}` 引用
    pub resolve_reference_parameters: bool,
    /// 推导组件名称时是否使用完整类型路径
    pub use_full_type_names: bool,
    /// 默认引用名称的候选来源及顺序
    pub lookup_references: Vec<ReferenceKind>,
    /// 是否使用声明的参数名作为引用候选
    pub use_parameter_names: bool,
    /// 作用域不兼容时是否注入委托
    pub wire_scoped_proxy: bool,
    /// 作用域不兼容时是否报错（未启用委托时）
    pub detect_mixed_scopes: bool,
    /// 是否根据实现的能力类型登记备用名称
    pub use_alt_names: bool,
    /// 是否按 `组件名.属性路径` 约定隐式注入参数
    pub implicit_param_injection: bool,
    /// 单次获取组件时的最大递归深度
    pub max_resolution_depth: usize,
    /// 无法解析的 `${...}` 占位符的替换值，未设置时报错
    pub parameter_fallback: Option<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            default_wiring_mode: WiringMode::Strict,
            detect_duplicated_names: false,
            resolve_reference_parameters: true,
            use_full_type_names: false,
            lookup_references: ReferenceKind::defaults(),
            use_parameter_names: true,
            wire_scoped_proxy: false,
            detect_mixed_scopes: false,
            use_alt_names: true,
            implicit_param_injection: true,
            max_resolution_depth: 100,
            parameter_fallback: None,
        }
    }
}

impl ContainerConfig {
    /// 从配置文件加载，环境变量 `LORN_IOC__*` 可以覆盖文件中的值
    pub fn load(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        debug!("加载容器配置: {}", path.display());

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// 校验配置
    pub fn validate(&self) -> ContainerResult<()> {
        if self.default_wiring_mode == WiringMode::Default {
            return Err(ContainerError::InvalidConfig {
                message: format!("默认装配模式无效: {}", self.default_wiring_mode),
            });
        }
        if self.max_resolution_depth == 0 {
            return Err(ContainerError::InvalidConfig {
                message: "最大解析深度必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 设置默认装配模式，`DEFAULT` 不是合法的默认值
    pub fn with_default_wiring_mode(mut self, mode: WiringMode) -> ContainerResult<Self> {
        self.default_wiring_mode = mode;
        self.validate()?;
        Ok(self)
    }

    /// 启用或关闭重复名称检测
    pub fn with_duplicate_detection(mut self, enabled: bool) -> Self {
        self.detect_duplicated_names = enabled;
        self
    }

    /// 启用或关闭作用域委托注入
    pub fn with_scoped_proxy(mut self, enabled: bool) -> Self {
        self.wire_scoped_proxy = enabled;
        self
    }

    /// 启用或关闭作用域混用检测
    pub fn with_mixed_scope_detection(mut self, enabled: bool) -> Self {
        self.detect_mixed_scopes = enabled;
        self
    }

    /// 设置是否使用完整类型路径作为组件名称
    pub fn with_full_type_names(mut self, enabled: bool) -> Self {
        self.use_full_type_names = enabled;
        self
    }

    /// 设置 `${...}` 无法解析时的替换值
    pub fn with_parameter_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.parameter_fallback = Some(fallback.into());
        self
    }

    /// 把传入的装配模式解析为实际生效的模式
    pub fn resolve_wiring_mode(&self, mode: Option<WiringMode>) -> WiringMode {
        match mode {
            None | Some(WiringMode::Default) => self.default_wiring_mode,
            Some(mode) => mode,
        }
    }
}

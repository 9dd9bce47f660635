//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn IoC 容器引擎的公共类型和工具。
//!
//! ## 核心内容
//!
//! - [`ContainerError`] - 容器统一错误类型
//! - [`TypeInfo`] - 类型元数据
//! - [`NamingConventions`] - 组件命名约定
//! - [`WiringMode`] / [`InitPhase`] / [`CreationPhase`] - 装配与生命周期枚举
//! - [`ContainerConfig`] - 容器配置
//!
//! ## 设计原则
//!
//! - 基于 Rust 类型系统的类型擦除组件模型
//! - 同步、进程内的对象图构建
//! - 约定优于配置

pub mod configuration;
pub mod conventions;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use conventions::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;

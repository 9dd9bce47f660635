//! 约定规范定义
//!
//! 提供组件名称和默认引用名称的命名约定

use crate::lifecycle::ReferenceKind;
use crate::metadata::TypeInfo;

/// 命名约定规范
#[derive(Debug)]
pub struct NamingConventions;

impl NamingConventions {
    /// 从类型信息推导组件名称
    ///
    /// 简短形式为首字母小写的类型名，完整形式为完整类型路径
    pub fn component_name(type_info: &TypeInfo, use_full_type_names: bool) -> String {
        if use_full_type_names {
            type_info.full_name().to_string()
        } else {
            Self::uncapitalize(type_info.short_name())
        }
    }

    /// 首字母小写
    pub fn uncapitalize(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// 按配置的候选来源生成默认引用名称列表
    ///
    /// 名称不可用（例如参数没有声明名称）时对应位置为 `None`
    pub fn default_references(
        kinds: &[ReferenceKind],
        declared_name: Option<&str>,
        type_info: &TypeInfo,
    ) -> Vec<Option<String>> {
        kinds
            .iter()
            .map(|kind| match kind {
                ReferenceKind::Name => declared_name.map(str::to_string),
                ReferenceKind::TypeShortName => Some(Self::uncapitalize(type_info.short_name())),
                ReferenceKind::TypeFullName => Some(type_info.full_name().to_string()),
            })
            .collect()
    }
}

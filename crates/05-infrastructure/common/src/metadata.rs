//! 元数据定义
//!
//! 提供组件类型的元数据信息

use std::any::TypeId;
use std::fmt;

/// 类型信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// 类型名称（不包含模块路径和泛型参数）
    pub name: String,
    /// 类型ID
    pub id: TypeId,
    /// 完整类型路径
    pub full_name: String,
}

impl TypeInfo {
    /// 从类型获取类型信息，支持 `dyn Trait` 等非定长类型
    pub fn of<T: ?Sized + 'static>() -> Self {
        let full_name = Self::normalize(std::any::type_name::<T>());
        Self {
            name: Self::short_name_of(&full_name),
            id: TypeId::of::<T>(),
            full_name,
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        &self.name
    }

    /// 获取完整类型路径
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// 去掉 `dyn ` 前缀和 `+ Send + Sync` 之类的附加约束
    fn normalize(raw: &str) -> String {
        let trimmed = raw.strip_prefix("dyn ").unwrap_or(raw);
        let end = Self::top_level_plus(trimmed).unwrap_or(trimmed.len());
        trimmed[..end].trim().to_string()
    }

    /// 查找不在泛型参数内部的第一个 `+`
    fn top_level_plus(s: &str) -> Option<usize> {
        let mut depth = 0usize;
        for (index, ch) in s.char_indices() {
            match ch {
                '<' => depth += 1,
                '>' => depth = depth.saturating_sub(1),
                '+' if depth == 0 => return Some(index),
                _ => {}
            }
        }
        None
    }

    fn short_name_of(full_name: &str) -> String {
        let without_generics = full_name.split('<').next().unwrap_or(full_name);
        without_generics
            .rsplit("::")
            .next()
            .unwrap_or(without_generics)
            .to_string()
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

//! 基于类型描述注解的元数据解析器

use di_abstractions::{MetadataResolver, TypeDescriptor, TypeMetadata};

/// 读取 [`TypeDescriptor`] 构建时声明的注解
#[derive(Debug, Default, Clone, Copy)]
pub struct AnnotationResolver;

impl MetadataResolver for AnnotationResolver {
    fn resolve(&self, descriptor: &TypeDescriptor) -> TypeMetadata {
        descriptor.metadata().clone()
    }
}

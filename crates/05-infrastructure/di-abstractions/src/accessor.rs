//! 成员访问抽象接口
//!
//! 通过属性路径读写组件的数据属性，路径形如 `db.pool.size`、`hosts[0]`、`labels[env]`

use crate::descriptor::TypeDescriptor;
use crate::instance::{Instance, Value};
use infrastructure_common::ContainerResult;

/// 成员访问器 trait
pub trait MemberAccessor: Send + Sync {
    /// 写入属性路径
    ///
    /// `forced` 为真时自动创建路径上缺失的中间节点
    fn set(
        &self,
        target: &Instance,
        descriptor: &TypeDescriptor,
        path: &str,
        value: Value,
        forced: bool,
    ) -> ContainerResult<()>;

    /// 读取属性路径
    fn get(&self, target: &Instance, descriptor: &TypeDescriptor, path: &str) -> ContainerResult<Value>;
}

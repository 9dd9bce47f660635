//! 内置作用域实现
//!
//! - [`SingletonScope`] 容器内唯一实例
//! - [`ProtoScope`] 每次获取都创建新实例，不存放
//! - [`ThreadLocalScope`] 每个线程一个实例

use dashmap::DashMap;
use di_abstractions::{is_scope, Instance, Scope, ScopedInstance};
use infrastructure_common::ContainerResult;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::debug;

/// 按登记顺序记录带销毁钩子的实例，同一实例只记录一次
///
/// 线程作用域的记录带上所属线程，线程退出时一并丢弃
#[derive(Default)]
struct Destroyables {
    entries: Mutex<Vec<(Option<ThreadId>, ScopedInstance)>>,
}

impl Destroyables {
    fn track(&self, owner: Option<ThreadId>, entry: &ScopedInstance) {
        if !entry.has_destroy() {
            return;
        }
        let mut entries = self.entries.lock();
        if !entries.iter().any(|(_, e)| e.instance.ptr_eq(&entry.instance)) {
            entries.push((owner, entry.clone()));
        }
    }

    fn untrack(&self, instance: &Instance) {
        self.entries.lock().retain(|(_, e)| !e.instance.ptr_eq(instance));
    }

    fn release_thread(&self, thread: ThreadId) {
        self.entries.lock().retain(|(owner, _)| *owner != Some(thread));
    }

    /// 依次执行销毁钩子，遇到第一个失败立即返回，剩余实例不再销毁
    fn destroy_all(&self, scope: &str) -> ContainerResult<()> {
        let entries = std::mem::take(&mut *self.entries.lock());
        for (_, entry) in &entries {
            debug!("销毁组件: {} @ {}", entry.name, scope);
            entry.destroy()?;
        }
        Ok(())
    }
}

/// 单例作用域
#[derive(Default)]
pub struct SingletonScope {
    instances: RwLock<HashMap<String, Instance>>,
    destroyables: Destroyables,
}

impl Scope for SingletonScope {
    fn name(&self) -> &'static str {
        "singleton"
    }

    fn lookup(&self, name: &str) -> Option<Instance> {
        self.instances.read().get(name).cloned()
    }

    fn register(&self, entry: ScopedInstance) -> ContainerResult<()> {
        self.destroyables.track(None, &entry);
        self.instances.write().insert(entry.name, entry.instance);
        Ok(())
    }

    fn remove(&self, name: &str) {
        self.instances.write().remove(name);
    }

    fn discard(&self, name: &str, instance: &Instance) {
        let mut instances = self.instances.write();
        if instances.get(name).is_some_and(|stored| stored.ptr_eq(instance)) {
            instances.remove(name);
        }
        drop(instances);
        self.destroyables.untrack(instance);
    }

    fn shutdown(&self) -> ContainerResult<()> {
        self.instances.write().clear();
        self.destroyables.destroy_all(self.name())
    }

    /// 单例只能直接持有其他单例
    fn accept(&self, referenced: &dyn Scope) -> bool {
        is_scope::<SingletonScope>(referenced)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 原型作用域
#[derive(Debug, Default)]
pub struct ProtoScope;

impl Scope for ProtoScope {
    fn name(&self) -> &'static str {
        "proto"
    }

    fn lookup(&self, _name: &str) -> Option<Instance> {
        None
    }

    fn register(&self, _entry: ScopedInstance) -> ContainerResult<()> {
        Ok(())
    }

    fn remove(&self, _name: &str) {}

    fn shutdown(&self) -> ContainerResult<()> {
        Ok(())
    }

    fn accept(&self, _referenced: &dyn Scope) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 线程作用域的共享存储
#[derive(Default)]
struct ThreadSlots {
    instances: DashMap<(ThreadId, String), Instance>,
    destroyables: Destroyables,
}

impl ThreadSlots {
    /// 丢弃某个线程的全部实例，不执行销毁钩子
    fn release(&self, thread: ThreadId) {
        self.instances.retain(|(owner, _), _| *owner != thread);
        self.destroyables.release_thread(thread);
    }
}

/// 线程退出时释放该线程在各线程作用域中的实例
struct ThreadExit {
    thread: ThreadId,
    slots: RefCell<Vec<Weak<ThreadSlots>>>,
}

impl ThreadExit {
    fn watch(&self, slots: &Arc<ThreadSlots>) {
        let mut watched = self.slots.borrow_mut();
        watched.retain(|w| w.strong_count() > 0);
        if !watched.iter().any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(slots))) {
            watched.push(Arc::downgrade(slots));
        }
    }
}

impl Drop for ThreadExit {
    fn drop(&mut self) {
        for slots in self.slots.get_mut().iter().filter_map(Weak::upgrade) {
            slots.release(self.thread);
        }
    }
}

thread_local! {
    static THREAD_EXIT: ThreadExit = ThreadExit {
        thread: thread::current().id(),
        slots: RefCell::new(Vec::new()),
    };
}

/// 线程作用域
///
/// 线程退出后其实例随之释放，只有仍存活线程的实例在关闭时执行销毁钩子
#[derive(Default)]
pub struct ThreadLocalScope {
    slots: Arc<ThreadSlots>,
}

impl Scope for ThreadLocalScope {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn lookup(&self, name: &str) -> Option<Instance> {
        let key = (thread::current().id(), name.to_string());
        self.slots.instances.get(&key).map(|entry| entry.value().clone())
    }

    fn register(&self, entry: ScopedInstance) -> ContainerResult<()> {
        let thread = thread::current().id();
        // 线程正在退出时不再登记退出回调，实例在关闭时释放
        let _ = THREAD_EXIT.try_with(|exit| exit.watch(&self.slots));
        self.slots.destroyables.track(Some(thread), &entry);
        self.slots.instances.insert((thread, entry.name), entry.instance);
        Ok(())
    }

    /// 移除所有线程中的同名实例
    fn remove(&self, name: &str) {
        self.slots.instances.retain(|(_, n), _| n != name);
    }

    fn discard(&self, name: &str, instance: &Instance) {
        let key = (thread::current().id(), name.to_string());
        self.slots.instances.remove_if(&key, |_, stored| stored.ptr_eq(instance));
        self.slots.destroyables.untrack(instance);
    }

    fn shutdown(&self) -> ContainerResult<()> {
        self.slots.instances.clear();
        self.slots.destroyables.destroy_all(self.name())
    }

    fn accept(&self, referenced: &dyn Scope) -> bool {
        is_scope::<SingletonScope>(referenced) || is_scope::<ThreadLocalScope>(referenced)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

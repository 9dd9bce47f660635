//! 容器引擎的集成测试

use di_abstractions::{Instance, Param, Ref, ScopeType, TypeDescriptor, Value};
use di_impl::{ComponentRegistration, Container, ProtoScope, ThreadLocalScope};
use infrastructure_common::{ContainerConfig, ContainerError, InitPhase, WiringMode};
use parking_lot::{Mutex, RwLock};
use std::error::Error as _;
use std::io::Write;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

fn next_id() -> u32 {
    NEXT_ID.fetch_add(1, Ordering::SeqCst)
}

fn resolved<T: ?Sized + Send + Sync + 'static>(slot: &RwLock<Option<Ref<T>>>) -> Option<Arc<T>> {
    slot.read().as_ref().map(|reference| reference.get().unwrap())
}

// ---------------------------------------------------------------------------
// 测试组件

trait Repository: Send + Sync {
    fn id(&self) -> u32;
}

struct MemoryRepository {
    id: u32,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self { id: next_id() }
    }
}

impl Repository for MemoryRepository {
    fn id(&self) -> u32 {
        self.id
    }
}

fn repository() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<MemoryRepository>()
        .default_constructor()
        .implements::<dyn Repository>(|r| r as Arc<dyn Repository>)
        .build()
}

#[derive(Default)]
struct UserService {
    repository: RwLock<Option<Ref<dyn Repository>>>,
}

fn user_service() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<UserService>()
        .default_constructor()
        .reference::<dyn Repository>("repository", |s, r| *s.repository.write() = Some(r))
        .inject("repository", None)
        .build()
}

#[derive(Default)]
struct Foo {
    count: RwLock<u32>,
}

fn foo() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Foo>()
        .default_constructor()
        .data("count", |f| *f.count.read(), |f, v| *f.count.write() = v)
        .build()
}

fn container_with_repository() -> Container {
    init_tracing();
    let container = Container::new();
    container
        .register(ComponentRegistration::of(repository()).name("repository"))
        .unwrap();
    container
}

// ---------------------------------------------------------------------------
// 作用域

#[test]
fn test_singleton_identity_and_proto_independence() {
    let container = container_with_repository();
    container
        .register(
            ComponentRegistration::of(user_service())
                .name("users")
                .scope(ScopeType::of::<ProtoScope>()),
        )
        .unwrap();

    let first = container.get_as::<dyn Repository>("repository").unwrap().unwrap();
    let second = container.get_as::<dyn Repository>("repository").unwrap().unwrap();
    assert_eq!(first.id(), second.id());

    let a = container.get_as::<UserService>("users").unwrap().unwrap();
    let b = container.get_as::<UserService>("users").unwrap().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(resolved(&a.repository).unwrap().id(), first.id());
    assert_eq!(resolved(&b.repository).unwrap().id(), first.id());
}

#[test]
fn test_thread_local_scope() {
    init_tracing();
    let container = Container::new();
    container
        .register(ComponentRegistration::of(repository()).scope(ScopeType::of::<ThreadLocalScope>()))
        .unwrap();

    let main_id = container.get_as::<MemoryRepository>("memoryRepository").unwrap().unwrap().id;
    let again = container.get_as::<MemoryRepository>("memoryRepository").unwrap().unwrap().id;
    assert_eq!(main_id, again);

    let worker = container.clone();
    let worker_id = std::thread::spawn(move || {
        worker
            .get_as::<MemoryRepository>("memoryRepository")
            .unwrap()
            .unwrap()
            .id
    })
    .join()
    .unwrap();
    assert_ne!(main_id, worker_id);
}

#[derive(Default)]
struct ThreadBuffer;

static THREAD_BUFFER_DROPS: AtomicUsize = AtomicUsize::new(0);

impl Drop for ThreadBuffer {
    fn drop(&mut self) {
        THREAD_BUFFER_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_thread_local_instances_released_when_thread_exits() {
    init_tracing();
    let container = Container::new();
    container
        .register(
            ComponentRegistration::of(TypeDescriptor::builder::<ThreadBuffer>().default_constructor().build())
                .scope(ScopeType::of::<ThreadLocalScope>()),
        )
        .unwrap();

    let workers: Vec<_> = (0..20)
        .map(|_| {
            let worker = container.clone();
            std::thread::spawn(move || {
                assert!(worker.get("threadBuffer").unwrap().is_some());
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(THREAD_BUFFER_DROPS.load(Ordering::SeqCst), 20);
    container.shutdown().unwrap();
}

// ---------------------------------------------------------------------------
// 装配模式

#[test]
fn test_strict_fails_and_optional_leaves_dependency_unset() {
    init_tracing();
    let strict = Container::new();
    strict.register_type(user_service()).unwrap();
    assert!(matches!(
        strict.get("userService"),
        Err(ContainerError::UnresolvedDependency { .. })
    ));

    let optional = Container::new();
    optional
        .register(ComponentRegistration::of(user_service()).wiring(WiringMode::Optional))
        .unwrap();
    let service = optional.get_as::<UserService>("userService").unwrap().unwrap();
    assert!(service.repository.read().is_none());
}

#[test]
fn test_none_mode_skips_wiring() {
    let container = container_with_repository();
    container
        .register(ComponentRegistration::of(user_service()).wiring(WiringMode::None))
        .unwrap();

    let service = container.get_as::<UserService>("userService").unwrap().unwrap();
    assert!(service.repository.read().is_none());
}

#[test]
fn test_failed_strict_creation_is_not_left_in_scope() {
    init_tracing();
    let container = Container::new();
    container.register_type(user_service()).unwrap();
    assert!(container.get("userService").is_err());

    container
        .register(ComponentRegistration::of(repository()).name("repository"))
        .unwrap();
    let service = container.get_as::<UserService>("userService").unwrap().unwrap();
    assert!(resolved(&service.repository).is_some());
}

// ---------------------------------------------------------------------------
// 循环依赖

#[derive(Default)]
struct Left {
    right: RwLock<Option<Ref<Right>>>,
}

#[derive(Default)]
struct Right {
    left: RwLock<Option<Ref<Left>>>,
}

struct Chicken {
    _egg: Arc<Egg>,
}

struct Egg {
    _chicken: Arc<Chicken>,
}

#[test]
fn test_property_cycle_is_closed() {
    init_tracing();
    let container = Container::new();
    container
        .register_type(
            TypeDescriptor::builder::<Left>()
                .default_constructor()
                .reference::<Right>("right", |l, r| *l.right.write() = Some(r))
                .inject("right", None)
                .build(),
        )
        .unwrap();
    container
        .register_type(
            TypeDescriptor::builder::<Right>()
                .default_constructor()
                .reference::<Left>("left", |r, l| *r.left.write() = Some(l))
                .inject("left", None)
                .build(),
        )
        .unwrap();

    let left = container.get_as::<Left>("left").unwrap().unwrap();
    let right = resolved(&left.right).unwrap();
    let back = resolved(&right.left).unwrap();
    assert!(Arc::ptr_eq(&left, &back));
}

#[test]
fn test_constructor_cycle_fails() {
    init_tracing();
    let container = Container::new();
    container
        .register_type(
            TypeDescriptor::builder::<Chicken>()
                .constructor(vec![Param::named::<Egg>("egg")], |args| {
                    Ok(Chicken {
                        _egg: args.require::<Egg>(0)?,
                    })
                })
                .build(),
        )
        .unwrap();
    container
        .register_type(
            TypeDescriptor::builder::<Egg>()
                .constructor(vec![Param::named::<Chicken>("chicken")], |args| {
                    Ok(Egg {
                        _chicken: args.require::<Chicken>(0)?,
                    })
                })
                .build(),
        )
        .unwrap();

    match container.get("chicken") {
        Err(ContainerError::CircularDependency { chain }) => assert_eq!(chain, "chicken -> egg -> chicken"),
        other => panic!("期望循环依赖错误, 实际为 {:?}", other),
    }
}

#[test]
fn test_resolution_depth_limit() {
    init_tracing();
    let mut config = ContainerConfig::default();
    config.max_resolution_depth = 1;
    let container = Container::with_config(config).unwrap();
    container
        .register(ComponentRegistration::of(repository()).name("repository"))
        .unwrap();
    container.register_type(user_service()).unwrap();

    assert!(matches!(
        container.get("userService"),
        Err(ContainerError::ResolutionDepthExceeded { limit: 1, .. })
    ));
}

// ---------------------------------------------------------------------------
// 备用名称

trait Notifier: Send + Sync {}

#[derive(Default)]
struct EmailNotifier;
impl Notifier for EmailNotifier {}

#[derive(Default)]
struct SmsNotifier;
impl Notifier for SmsNotifier {}

#[test]
fn test_alt_name_of_single_implementation() {
    init_tracing();
    let container = Container::new();
    container.register_type(repository()).unwrap();
    container.register_type(user_service()).unwrap();

    let service = container.get_as::<UserService>("userService").unwrap().unwrap();
    assert!(resolved(&service.repository).is_some());

    assert!(container.get_typed::<dyn Repository>().unwrap().is_none());
    assert!(container.get_as::<dyn Repository>("repository").unwrap().is_some());
}

#[test]
fn test_contended_alt_name_stays_unresolvable() {
    init_tracing();
    let container = Container::new();
    container
        .register_type(
            TypeDescriptor::builder::<EmailNotifier>()
                .default_constructor()
                .implements::<dyn Notifier>(|n| n as Arc<dyn Notifier>)
                .build(),
        )
        .unwrap();
    container
        .register_type(
            TypeDescriptor::builder::<SmsNotifier>()
                .default_constructor()
                .implements::<dyn Notifier>(|n| n as Arc<dyn Notifier>)
                .build(),
        )
        .unwrap();

    assert!(container.get("notifier").unwrap().is_none());
    assert!(container.get("emailNotifier").unwrap().is_some());
    assert!(container.get("smsNotifier").unwrap().is_some());

    container.remove("smsNotifier");
    assert!(container.get("notifier").unwrap().is_none());
    assert_eq!(container.names_for_type::<dyn Notifier>(), vec!["emailNotifier".to_string()]);
}

// ---------------------------------------------------------------------------
// 参数

#[test]
fn test_parameter_chain() {
    init_tracing();
    let container = Container::new();
    container.register_type(foo()).unwrap();
    container.define_parameters([("foo.count", "${base}"), ("base", "${base2}"), ("base2", "10")]);

    let foo = container.get_as::<Foo>("foo").unwrap().unwrap();
    assert_eq!(*foo.count.read(), 10);
}

#[test]
fn test_parameters_loaded_from_file() {
    init_tracing();
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[foo]\ncount = 5").unwrap();

    let container = Container::new();
    assert_eq!(container.load_parameters(file.path()).unwrap(), 1);
    container.register_type(foo()).unwrap();

    let foo = container.get_as::<Foo>("foo").unwrap().unwrap();
    assert_eq!(*foo.count.read(), 5);
}

#[test]
fn test_value_template_injection() {
    init_tracing();
    let container = Container::new();
    container.define_parameter("pool.size", "12");
    container
        .register(
            ComponentRegistration::of(
                TypeDescriptor::builder::<Foo>()
                    .default_constructor()
                    .data("count", |f| *f.count.read(), |f, v| *f.count.write() = v)
                    .value("count", "${pool.size}")
                    .build(),
            )
            .name("counter"),
        )
        .unwrap();

    let counter = container.get_as::<Foo>("counter").unwrap().unwrap();
    assert_eq!(*counter.count.read(), 12);
}

#[test]
fn test_property_access_by_path() {
    init_tracing();
    let container = Container::new();
    container.register_type(foo()).unwrap();

    container.set_property("foo.count", Value::text("3")).unwrap();
    assert_eq!(container.get_property("foo.count").unwrap().data::<u32>().unwrap(), 3);
    assert!(matches!(
        container.set_property("missing.count", Value::text("3")),
        Err(ContainerError::PropertyPath { .. })
    ));
}

// ---------------------------------------------------------------------------
// 生命周期钩子

#[derive(Default)]
struct Lifecycle {
    repository: RwLock<Option<Ref<dyn Repository>>>,
    label: RwLock<String>,
    events: Mutex<Vec<String>>,
}

impl Lifecycle {
    fn record(&self, phase: &str) {
        let event = format!(
            "{}:{}:{}",
            phase,
            self.repository.read().is_some(),
            self.label.read()
        );
        self.events.lock().push(event);
    }
}

#[derive(Default)]
struct Ordered {
    events: Mutex<Vec<&'static str>>,
}

#[test]
fn test_init_phases_bracket_wiring_and_parameters() {
    let container = container_with_repository();
    container.define_parameter("lifecycle.label", "blue");
    container
        .register_type(
            TypeDescriptor::builder::<Lifecycle>()
                .default_constructor()
                .reference::<dyn Repository>("repository", |l, r| *l.repository.write() = Some(r))
                .inject("repository", None)
                .data("label", |l| l.label.read().clone(), |l, v| *l.label.write() = v)
                .hook("initialize", |l| {
                    l.record("initialize");
                    Ok(())
                })
                .hook("define", |l| {
                    l.record("define");
                    Ok(())
                })
                .hook("construct", |l| {
                    l.record("construct");
                    Ok(())
                })
                .init("initialize", None, InitPhase::PostInitialize)
                .init("define", None, InitPhase::PostDefine)
                .init("construct", None, InitPhase::PostConstruct)
                .build(),
        )
        .unwrap();

    let lifecycle = container.get_as::<Lifecycle>("lifecycle").unwrap().unwrap();
    assert_eq!(
        *lifecycle.events.lock(),
        vec!["construct:false:", "define:true:", "initialize:true:blue"]
    );
}

#[test]
fn test_init_order_within_phase() {
    init_tracing();
    let container = Container::new();
    container
        .register_type(
            TypeDescriptor::builder::<Ordered>()
                .default_constructor()
                .hook("a", |o| {
                    o.events.lock().push("a");
                    Ok(())
                })
                .hook("b", |o| {
                    o.events.lock().push("b");
                    Ok(())
                })
                .hook("c", |o| {
                    o.events.lock().push("c");
                    Ok(())
                })
                .hook("d", |o| {
                    o.events.lock().push("d");
                    Ok(())
                })
                .init("a", Some(2), InitPhase::PostInitialize)
                .init("b", None, InitPhase::PostInitialize)
                .init("c", Some(1), InitPhase::PostInitialize)
                .init("d", Some(-1), InitPhase::PostInitialize)
                .build(),
        )
        .unwrap();

    let ordered = container.get_as::<Ordered>("ordered").unwrap().unwrap();
    assert_eq!(*ordered.events.lock(), vec!["c", "a", "b", "d"]);
}

#[test]
fn test_on_create_runs_last() {
    init_tracing();
    let container = Container::new();
    container.define_parameter("foo.count", "1");
    container
        .register(ComponentRegistration::of(foo()).on_create_typed::<Foo>(|f| {
            let mut count = f.count.write();
            *count += 100;
            Ok(())
        }))
        .unwrap();

    let foo = container.get_as::<Foo>("foo").unwrap().unwrap();
    assert_eq!(*foo.count.read(), 101);
}

#[test]
fn test_destroy_hooks_run_on_shutdown() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();

    let database_log = Arc::clone(&log);
    container
        .register(
            ComponentRegistration::of(
                TypeDescriptor::builder::<Foo>()
                    .default_constructor()
                    .hook("close", move |_| {
                        database_log.lock().push("database");
                        Ok(())
                    })
                    .destroy("close")
                    .build(),
            )
            .name("database"),
        )
        .unwrap();
    let cache_log = Arc::clone(&log);
    container
        .register(
            ComponentRegistration::of(
                TypeDescriptor::builder::<Foo>()
                    .default_constructor()
                    .hook("close", move |_| {
                        cache_log.lock().push("cache");
                        Ok(())
                    })
                    .destroy("close")
                    .build(),
            )
            .name("cache"),
        )
        .unwrap();

    container.get("database").unwrap();
    container.get("cache").unwrap();
    container.remove("cache");
    assert!(log.lock().is_empty());

    container.shutdown().unwrap();
    assert_eq!(*log.lock(), vec!["database", "cache"]);
    assert_eq!(container.count(), 0);
    assert!(container.get("database").unwrap().is_none());
}

#[test]
fn test_failed_creation_is_not_destroyed_on_shutdown() {
    init_tracing();
    let closed = Arc::new(AtomicUsize::new(0));
    let container = Container::new();

    let counter = Arc::clone(&closed);
    container
        .register(
            ComponentRegistration::of(
                TypeDescriptor::builder::<UserService>()
                    .default_constructor()
                    .reference::<dyn Repository>("repository", |s, r| *s.repository.write() = Some(r))
                    .inject("repository", None)
                    .hook("close", move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .destroy("close")
                    .build(),
            )
            .name("users"),
        )
        .unwrap();

    assert!(container.get("users").is_err());
    assert!(container.get("users").is_err());

    container
        .register(ComponentRegistration::of(repository()).name("repository"))
        .unwrap();
    assert!(container.get("users").unwrap().is_some());

    container.shutdown().unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// 作用域混用

struct Request {
    id: u32,
}

impl Default for Request {
    fn default() -> Self {
        Self { id: next_id() }
    }
}

#[derive(Default)]
struct Session {
    request: RwLock<Option<Ref<Request>>>,
}

fn session_container(config: ContainerConfig) -> Container {
    init_tracing();
    let container = Container::with_config(config).unwrap();
    container
        .register(
            ComponentRegistration::of(TypeDescriptor::builder::<Request>().default_constructor().build())
                .scope(ScopeType::of::<ProtoScope>()),
        )
        .unwrap();
    container
        .register_type(
            TypeDescriptor::builder::<Session>()
                .default_constructor()
                .reference::<Request>("request", |s, r| *s.request.write() = Some(r))
                .inject("request", None)
                .build(),
        )
        .unwrap();
    container
}

#[test]
fn test_scoped_proxy_yields_fresh_instance_per_access() {
    let container = session_container(ContainerConfig::default().with_scoped_proxy(true));
    let session = container.get_as::<Session>("session").unwrap().unwrap();

    let slot = session.request.read();
    let reference = slot.as_ref().unwrap();
    assert!(reference.is_delegate());
    let first = reference.get().unwrap();
    let second = reference.get().unwrap();
    assert_ne!(first.id, second.id);
}

#[test]
fn test_silent_mixing_captures_single_instance() {
    let container = session_container(ContainerConfig::default());
    let session = container.get_as::<Session>("session").unwrap().unwrap();

    let slot = session.request.read();
    let reference = slot.as_ref().unwrap();
    assert!(!reference.is_delegate());
    assert!(Arc::ptr_eq(&reference.get().unwrap(), &reference.get().unwrap()));
}

#[test]
fn test_mixing_detection_fails() {
    let container = session_container(ContainerConfig::default().with_mixed_scope_detection(true));
    assert!(matches!(
        container.get("session"),
        Err(ContainerError::ScopeMixing { .. })
    ));
}

// ---------------------------------------------------------------------------
// 注册

#[test]
fn test_duplicate_detection_evicts_first() {
    init_tracing();
    let container = Container::with_config(ContainerConfig::default().with_duplicate_detection(true)).unwrap();
    container.register_type(foo()).unwrap();

    assert!(matches!(
        container.register_type(foo()),
        Err(ContainerError::DuplicateName { .. })
    ));
    assert!(!container.is_registered("foo"));
}

#[test]
fn test_capability_cannot_be_registered() {
    init_tracing();
    let container = Container::new();
    assert!(matches!(
        container.register_type(TypeDescriptor::capability::<dyn Repository>()),
        Err(ContainerError::CapabilityRegistration { .. })
    ));
}

#[test]
fn test_constructor_error_keeps_cause() {
    init_tracing();
    let container = Container::new();
    container
        .register_type(
            TypeDescriptor::builder::<Foo>()
                .constructor(Vec::new(), |_| Err("磁盘已满".into()))
                .build(),
        )
        .unwrap();

    let err = container.get("foo").unwrap_err();
    assert!(matches!(err, ContainerError::InvocationFailed { .. }));
    assert_eq!(err.source().unwrap().to_string(), "磁盘已满");
}

#[test]
fn test_names_count_and_remove() {
    let container = container_with_repository();
    container.register_type(foo()).unwrap();

    assert_eq!(container.names(), vec!["foo".to_string(), "repository".to_string()]);
    assert_eq!(container.count(), 2);
    assert!(container.remove("foo"));
    assert!(!container.remove("foo"));
    assert!(container.get("foo").unwrap().is_none());

    assert_eq!(container.remove_type::<MemoryRepository>(), vec!["repository".to_string()]);
    assert_eq!(container.count(), 0);
}

// ---------------------------------------------------------------------------
// 手动注入点

#[derive(Default)]
struct Reporter {
    repository: RwLock<Option<Arc<dyn Repository>>>,
}

fn reporter() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Reporter>()
        .default_constructor()
        .method(
            "attach",
            vec![Param::named::<dyn Repository>("repository")],
            |r, args| {
                *r.repository.write() = Some(args.require::<dyn Repository>(0)?);
                Ok(())
            },
        )
        .build()
}

#[test]
fn test_method_injection_by_annotation_and_by_hand() {
    let container = container_with_repository();
    container
        .register(
            ComponentRegistration::of(
                TypeDescriptor::builder::<Reporter>()
                    .default_constructor()
                    .method(
                        "attach",
                        vec![Param::named::<dyn Repository>("repository")],
                        |r, args| {
                            *r.repository.write() = Some(args.require::<dyn Repository>(0)?);
                            Ok(())
                        },
                    )
                    .inject_method("attach", &[])
                    .build(),
            )
            .name("annotated"),
        )
        .unwrap();
    container
        .register(ComponentRegistration::of(reporter()).name("manual"))
        .unwrap();
    container
        .register_method_injection("manual", "attach", &["repository"])
        .unwrap();

    for name in ["annotated", "manual"] {
        let reporter = container.get_as::<Reporter>(name).unwrap().unwrap();
        assert!(reporter.repository.read().is_some(), "{} 未注入", name);
    }
}

#[test]
fn test_define_only_uses_manual_points() {
    let container = container_with_repository();
    container
        .register(ComponentRegistration::of(user_service()).name("bare").define_only())
        .unwrap();
    container
        .register(ComponentRegistration::of(user_service()).name("manual").define_only())
        .unwrap();
    container
        .register_property_injection("manual", "repository", Some("repository"))
        .unwrap();

    let bare = container.get_as::<UserService>("bare").unwrap().unwrap();
    let manual = container.get_as::<UserService>("manual").unwrap().unwrap();
    assert!(bare.repository.read().is_none());
    assert!(resolved(&manual.repository).is_some());

    assert!(matches!(
        container.register_property_injection("manual", "repository", None),
        Err(ContainerError::DefinitionSealed { .. })
    ));
    assert!(matches!(
        container.register_property_injection("unknown", "repository", None),
        Err(ContainerError::ComponentNotFound { .. })
    ));
}

// ---------------------------------------------------------------------------
// 集合注入

trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Default)]
struct Audit;
impl Plugin for Audit {
    fn name(&self) -> &'static str {
        "audit"
    }
}

#[derive(Default)]
struct Metrics;
impl Plugin for Metrics {
    fn name(&self) -> &'static str {
        "metrics"
    }
}

#[derive(Default)]
struct PluginHost {
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
}

impl Plugin for PluginHost {
    fn name(&self) -> &'static str {
        "host"
    }
}

#[test]
fn test_aggregate_injection_excludes_self() {
    init_tracing();
    let container = Container::new();
    container
        .register_type(
            TypeDescriptor::builder::<Audit>()
                .default_constructor()
                .implements::<dyn Plugin>(|p| p as Arc<dyn Plugin>)
                .build(),
        )
        .unwrap();
    container
        .register_type(
            TypeDescriptor::builder::<Metrics>()
                .default_constructor()
                .implements::<dyn Plugin>(|p| p as Arc<dyn Plugin>)
                .build(),
        )
        .unwrap();
    container
        .register_type(
            TypeDescriptor::builder::<PluginHost>()
                .default_constructor()
                .implements::<dyn Plugin>(|p| p as Arc<dyn Plugin>)
                .aggregate::<dyn Plugin>("plugins", |h, p| *h.plugins.write() = p)
                .inject_set("plugins")
                .build(),
        )
        .unwrap();

    let host = container.get_as::<PluginHost>("pluginHost").unwrap().unwrap();
    let names: Vec<&str> = host.plugins.read().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["audit", "metrics"]);
}

#[derive(Default)]
struct Auditor {
    attached: Mutex<Vec<Option<u32>>>,
}

fn auditor() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Auditor>()
        .default_constructor()
        .method(
            "attach",
            vec![Param::named::<dyn Repository>("repository")],
            |a, args| {
                a.attached.lock().push(args.get::<dyn Repository>(0).map(|r| r.id()));
                Ok(())
            },
        )
        .inject_method("attach", &[])
        .build()
}

#[test]
fn test_strict_method_injection_requires_every_parameter() {
    init_tracing();
    let container = Container::new();
    container.register_type(auditor()).unwrap();

    assert!(matches!(
        container.get("auditor"),
        Err(ContainerError::UnresolvedDependency { .. })
    ));
}

#[test]
fn test_optional_method_injection_passes_missing_parameter() {
    init_tracing();
    let container = Container::new();
    container
        .register(ComponentRegistration::of(auditor()).wiring(WiringMode::Optional))
        .unwrap();

    let auditor = container.get_as::<Auditor>("auditor").unwrap().unwrap();
    assert_eq!(*auditor.attached.lock(), vec![None]);
}

#[derive(Default)]
struct Dashboard {
    repository: RwLock<Option<Ref<dyn Repository>>>,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
}

fn dashboard() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Dashboard>()
        .default_constructor()
        .reference::<dyn Repository>("repository", |d, r| *d.repository.write() = Some(r))
        .aggregate::<dyn Plugin>("plugins", |d, p| *d.plugins.write() = p)
        .build()
}

#[test]
fn test_autowire_injects_undeclared_references_and_aggregates() {
    let container = container_with_repository();
    for plugin in [
        TypeDescriptor::builder::<Audit>()
            .default_constructor()
            .implements::<dyn Plugin>(|p| p as Arc<dyn Plugin>)
            .build(),
        TypeDescriptor::builder::<Metrics>()
            .default_constructor()
            .implements::<dyn Plugin>(|p| p as Arc<dyn Plugin>)
            .build(),
    ] {
        container.register_type(plugin).unwrap();
    }
    container
        .register(ComponentRegistration::of(dashboard()).name("plain").wiring(WiringMode::Optional))
        .unwrap();
    container
        .register(ComponentRegistration::of(dashboard()).name("auto").wiring(WiringMode::Autowire))
        .unwrap();

    let plain = container.get_as::<Dashboard>("plain").unwrap().unwrap();
    assert!(plain.repository.read().is_none());
    assert!(plain.plugins.read().is_empty());

    let auto = container.get_as::<Dashboard>("auto").unwrap().unwrap();
    assert!(resolved(&auto.repository).is_some());
    let names: Vec<&str> = auto.plugins.read().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["audit", "metrics"]);
}

// ---------------------------------------------------------------------------
// 提供者

#[derive(Default)]
struct TokenFactory;

struct Token(String);

#[test]
fn test_instance_and_static_providers() {
    init_tracing();
    let container = Container::new();
    let factory = TypeDescriptor::builder::<TokenFactory>()
        .default_constructor()
        .instance_provider("make", |_| Ok(Token("t-1".to_string())))
        .static_provider("anonymous", || Ok(Token("anon".to_string())))
        .provides("token", "make")
        .build();
    container.register_type(Arc::clone(&factory)).unwrap();
    container.register_static_provider("guest", &factory, "anonymous").unwrap();

    let token = container.get_as::<Token>("token").unwrap().unwrap();
    let guest = container.get_as::<Token>("guest").unwrap().unwrap();
    assert_eq!(token.0, "t-1");
    assert_eq!(guest.0, "anon");
    assert!(container.register_static_provider("broken", &factory, "make").is_err());
}

// ---------------------------------------------------------------------------
// 外部对象

#[test]
fn test_add_wires_existing_object() {
    let container = container_with_repository();
    let service = Arc::new(UserService::default());
    container
        .add("users", Instance::from_arc(Arc::clone(&service)), user_service(), None)
        .unwrap();

    assert!(resolved(&service.repository).is_some());
    let fetched = container.get_as::<UserService>("users").unwrap().unwrap();
    assert!(Arc::ptr_eq(&fetched, &service));

    assert!(matches!(
        container.add("wrong", Instance::new(Foo::default()), user_service(), None),
        Err(ContainerError::TypeMismatch { .. })
    ));
}

#[test]
fn test_wire_and_create_do_not_register() {
    let container = container_with_repository();

    let external = Instance::new(UserService::default());
    container.wire(&external, &user_service(), None).unwrap();
    let service = external.downcast_ref::<UserService>().unwrap();
    assert!(resolved(&service.repository).is_some());

    let created = container.create(&user_service(), None).unwrap();
    let created = created.downcast_ref::<UserService>().unwrap();
    assert!(resolved(&created.repository).is_some());

    assert_eq!(container.count(), 1);
}

#[test]
fn test_add_self_exposes_container() {
    init_tracing();
    let container = Container::new();
    container.add_self().unwrap();

    let handle = container
        .get_as::<di_impl::ContainerHandle>(di_impl::CONTAINER_REF_NAME)
        .unwrap()
        .unwrap();
    assert!(handle.container().unwrap().is_registered(di_impl::CONTAINER_REF_NAME));
}

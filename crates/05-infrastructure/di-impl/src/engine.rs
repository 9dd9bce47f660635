//! 实例创建引擎
//!
//! 一次获取调用内的所有创建共享一个 [`CreationContext`]，
//! 用于识别构造器循环依赖并限制递归深度。单个实例的创建由 [`Instantiation`]
//! 按 [`CreationPhase`] 逐阶段推进，任一阶段失败都会撤销作用域登记。

use crate::container::ContainerCore;
use crate::definition::ComponentDefinition;
use crate::injection::{References, ResolvedInjection};
use di_abstractions::{Args, DestroyCallback, Instance, Value};
use infrastructure_common::{ContainerError, ContainerResult, CreationPhase, InitPhase, TypeInfo, WiringMode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

enum Acquired {
    /// 正在执行构造器
    Constructing,
    Built(Instance),
}

/// 一次获取调用的创建上下文
#[derive(Default)]
pub(crate) struct CreationContext {
    acquired: HashMap<String, Acquired>,
    chain: Vec<String>,
}

impl CreationContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 本次调用中已经得到的实例，正在构造的组件再次被请求时为循环依赖
    pub(crate) fn acquired(&self, name: &str) -> ContainerResult<Option<Instance>> {
        match self.acquired.get(name) {
            Some(Acquired::Built(instance)) => Ok(Some(instance.clone())),
            Some(Acquired::Constructing) => Err(ContainerError::CircularDependency {
                chain: self.describe_cycle(name),
            }),
            None => Ok(None),
        }
    }

    pub(crate) fn enter(&mut self, name: &str, limit: usize) -> ContainerResult<()> {
        if self.chain.len() >= limit {
            return Err(ContainerError::ResolutionDepthExceeded {
                name: name.to_string(),
                limit,
            });
        }
        self.chain.push(name.to_string());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.chain.pop();
    }

    fn constructing(&mut self, name: &str) {
        self.acquired.insert(name.to_string(), Acquired::Constructing);
    }

    fn built(&mut self, name: &str, instance: Instance) {
        self.acquired.insert(name.to_string(), Acquired::Built(instance));
    }

    fn describe_cycle(&self, name: &str) -> String {
        let start = self.chain.iter().position(|n| n == name).unwrap_or(0);
        let mut cycle: Vec<&str> = self.chain[start..].iter().map(String::as_str).collect();
        cycle.push(name);
        cycle.join(" -> ")
    }
}

/// 单个实例的创建过程
pub(crate) struct Instantiation<'a> {
    core: &'a ContainerCore,
    definition: &'a ComponentDefinition,
    points: Arc<ResolvedInjection>,
    context: &'a mut CreationContext,
    instance: Option<Instance>,
    registered: bool,
}

impl<'a> Instantiation<'a> {
    pub(crate) fn new(
        core: &'a ContainerCore,
        definition: &'a ComponentDefinition,
        context: &'a mut CreationContext,
    ) -> ContainerResult<Self> {
        let points = definition.resolve_injection(&core.config, core.resolver.as_ref(), &core.params)?;
        Ok(Self {
            core,
            definition,
            points,
            context,
            instance: None,
            registered: false,
        })
    }

    /// 从构造开始完整创建
    pub(crate) fn create(self) -> ContainerResult<Instance> {
        self.run(CreationPhase::Created)
    }

    /// 对外部提供的实例执行构造之后的所有阶段
    pub(crate) fn refresh(mut self, instance: Instance) -> ContainerResult<Instance> {
        if let Some(name) = self.definition.name() {
            self.context.built(name, instance.clone());
        }
        self.instance = Some(instance);
        self.run(CreationPhase::ScopeRegistered)
    }

    fn run(mut self, start: CreationPhase) -> ContainerResult<Instance> {
        let mut phase = Some(start);
        while let Some(current) = phase {
            if let Err(err) = self.step(current) {
                self.rollback();
                return Err(err);
            }
            trace!("{} -> {:?}", self.definition.display_name(), current);
            phase = current.next();
        }
        self.instance()
    }

    fn step(&mut self, phase: CreationPhase) -> ContainerResult<()> {
        match phase {
            CreationPhase::Created => self.construct(),
            CreationPhase::ScopeRegistered => self.register_in_scope(),
            CreationPhase::PostConstruct => self.invoke_init_methods(InitPhase::PostConstruct),
            CreationPhase::Wired => self.wire(),
            CreationPhase::PostDefine => self.invoke_init_methods(InitPhase::PostDefine),
            CreationPhase::ParamsInjected => self.inject_params(),
            CreationPhase::PostInitialize => self.invoke_init_methods(InitPhase::PostInitialize),
            CreationPhase::PostCreateCallback => self.invoke_on_create(),
            CreationPhase::Ready => {
                debug!("组件就绪: {}", self.definition.display_name());
                Ok(())
            }
        }
    }

    fn rollback(&mut self) {
        if self.registered {
            debug!("撤销作用域登记: {}", self.definition.display_name());
            if let Some(instance) = &self.instance {
                self.definition.scope_discard(instance);
            }
            self.registered = false;
        }
    }

    fn instance(&self) -> ContainerResult<Instance> {
        self.instance.clone().ok_or_else(|| {
            ContainerError::invalid_injection_point(format!("{} 尚未构造", self.definition.display_name()))
        })
    }

    fn strict(&self) -> bool {
        self.definition.wiring_mode().is_strict()
    }

    fn construct(&mut self) -> ContainerResult<()> {
        let definition = self.definition;
        let descriptor = definition.descriptor();
        let point = self.points.constructor.clone().ok_or_else(|| {
            ContainerError::invalid_injection_point(format!("{} 没有可用的构造器", descriptor.type_info()))
        })?;
        let constructor = descriptor.constructors().get(point.index).ok_or_else(|| {
            ContainerError::invalid_injection_point(format!("构造器不存在: {}#{}", descriptor.type_info(), point.index))
        })?;

        if let Some(name) = definition.name() {
            self.context.constructing(name);
        }

        let mut args = Vec::with_capacity(constructor.params().len());
        if definition.wiring_mode() == WiringMode::None {
            if !constructor.params().is_empty() {
                return Err(ContainerError::invalid_injection_point(format!(
                    "{} 的装配模式为 NONE，只能使用无参构造器",
                    definition.display_name()
                )));
            }
        } else {
            for (references, param) in point.references.iter().zip(constructor.params()) {
                let value = self.core.resolve_reference(references, &param.type_info, self.context)?;
                if value.is_none() && self.strict() {
                    return Err(unresolved(
                        format!("{}#new({})", descriptor.type_info().short_name(), param.name.as_deref().unwrap_or("_")),
                        references,
                    ));
                }
                args.push(value);
            }
        }

        let instance = constructor
            .invoke(&Args::new(args))
            .map_err(|e| ContainerError::invocation(format!("构造 {} 失败", descriptor.type_info()), e))?;
        if let Some(name) = definition.name() {
            self.context.built(name, instance.clone());
        }
        self.instance = Some(instance);
        Ok(())
    }

    /// 半成品实例先登记到作用域，属性循环依赖由此得以解析
    fn register_in_scope(&mut self) -> ContainerResult<()> {
        if self.definition.name().is_none() {
            return Ok(());
        }
        let instance = self.instance()?;
        self.definition.scope_register(instance, self.destroy_callback())?;
        self.registered = true;
        Ok(())
    }

    fn destroy_callback(&self) -> Option<DestroyCallback> {
        if self.points.destroy_methods.is_empty() {
            return None;
        }
        let descriptor = Arc::clone(self.definition.descriptor());
        let methods: Vec<String> = self.points.destroy_methods.iter().map(|p| p.method.clone()).collect();
        Some(Arc::new(move |instance: &Instance| {
            for method in &methods {
                let found = descriptor.method(method).ok_or_else(|| ContainerError::MemberNotFound {
                    type_name: descriptor.type_info().full_name().to_string(),
                    member: method.clone(),
                })?;
                found.invoke(instance, &Args::default()).map_err(|e| {
                    ContainerError::invocation(format!("销毁方法 {}#{}", descriptor.type_info().short_name(), method), e)
                })?;
            }
            Ok(())
        }))
    }

    fn invoke_init_methods(&mut self, phase: InitPhase) -> ContainerResult<()> {
        let instance = self.instance()?;
        let descriptor = self.definition.descriptor();
        for point in self.points.init_methods_for(phase) {
            let method = descriptor.method(&point.method).ok_or_else(|| ContainerError::MemberNotFound {
                type_name: descriptor.type_info().full_name().to_string(),
                member: point.method.clone(),
            })?;
            trace!("初始化方法: {}#{} ({:?})", descriptor.type_info().short_name(), point.method, phase);
            method.invoke(&instance, &Args::default()).map_err(|e| {
                ContainerError::invocation(
                    format!("初始化方法 {}#{}", descriptor.type_info().short_name(), point.method),
                    e,
                )
            })?;
        }
        Ok(())
    }

    fn wire(&mut self) -> ContainerResult<()> {
        if self.definition.wiring_mode() == WiringMode::None {
            return Ok(());
        }
        let instance = self.instance()?;
        let descriptor = Arc::clone(self.definition.descriptor());
        let points = Arc::clone(&self.points);

        for point in &points.properties {
            let property = descriptor.property(&point.property).ok_or_else(|| ContainerError::MemberNotFound {
                type_name: descriptor.type_info().full_name().to_string(),
                member: point.property.clone(),
            })?;
            match self.resolve_dependency(&point.references, &point.target)? {
                Some(value) => property.set(&instance, value)?,
                None if self.strict() => {
                    return Err(unresolved(
                        format!("{}#{}", descriptor.type_info().short_name(), point.property),
                        &point.references,
                    ));
                }
                None => {}
            }
        }

        for point in &points.sets {
            let property = descriptor.property(&point.property).ok_or_else(|| ContainerError::MemberNotFound {
                type_name: descriptor.type_info().full_name().to_string(),
                member: point.property.clone(),
            })?;
            let names = self.core.registry.names_for_type(point.element.id);
            let mut handles = Vec::with_capacity(names.len());
            for name in names.iter() {
                if Some(name.as_str()) == self.definition.name() {
                    continue;
                }
                if let Some(member) = self.core.get_in(name, self.context)? {
                    handles.push(self.core.upcast(&member, &point.element)?);
                }
            }
            property.set(&instance, Value::Components(handles))?;
        }

        for point in &points.methods {
            let method = descriptor.method(&point.method).ok_or_else(|| ContainerError::MemberNotFound {
                type_name: descriptor.type_info().full_name().to_string(),
                member: point.method.clone(),
            })?;
            let mut args = Vec::with_capacity(point.references.len());
            for (references, target) in point.references.iter().zip(&point.targets) {
                let value = self.resolve_dependency(references, target)?;
                if value.is_none() && self.strict() {
                    return Err(unresolved(
                        format!("{}#{}()", descriptor.type_info().short_name(), point.method),
                        references,
                    ));
                }
                args.push(value);
            }
            method.invoke(&instance, &Args::new(args)).map_err(|e| {
                ContainerError::invocation(format!("注入方法 {}#{}", descriptor.type_info().short_name(), point.method), e)
            })?;
        }
        Ok(())
    }

    /// 先经过作用域混用检查，再按候选名称查找
    fn resolve_dependency(&mut self, references: &References, target: &TypeInfo) -> ContainerResult<Option<Value>> {
        let core = self.core;
        if core.guard.is_active() {
            if let Some(dependency) = core.registry.lookup_first(references, core.config.use_alt_names) {
                let value = core
                    .guard
                    .lookup_value(self.definition, &dependency, |name| core.delegate_strategy(name))?;
                if value.is_some() {
                    return Ok(value);
                }
            }
        }
        core.resolve_reference(references, target, self.context)
    }

    fn inject_params(&mut self) -> ContainerResult<()> {
        let instance = self.instance()?;
        let core = self.core;
        let descriptor = self.definition.descriptor();

        if let Some(name) = self.definition.name() {
            let prefix_len = name.len() + 1;
            for key in &self.points.params {
                let value = if core.config.resolve_reference_parameters {
                    core.params.resolve(key)?
                } else {
                    core.params.get(key)
                };
                let Some(value) = value else {
                    continue;
                };
                core.accessor
                    .set(&instance, descriptor, &key[prefix_len..], Value::text(value), false)
                    .map_err(|e| ContainerError::invocation(format!("注入参数 {} 到组件 {}", key, name), Box::new(e)))?;
            }
        }

        for point in &self.points.values {
            let value = core.params.resolve_template(&point.template)?;
            core.accessor
                .set(&instance, descriptor, &point.property, Value::text(value), false)?;
        }
        Ok(())
    }

    fn invoke_on_create(&mut self) -> ContainerResult<()> {
        let Some(callback) = self.definition.on_create() else {
            return Ok(());
        };
        let instance = self.instance()?;
        callback(&instance)
            .map_err(|e| ContainerError::invocation(format!("创建回调 {}", self.definition.display_name()), e))
    }
}

fn unresolved(target: String, references: &References) -> ContainerError {
    ContainerError::UnresolvedDependency {
        target,
        references: references.to_string(),
    }
}

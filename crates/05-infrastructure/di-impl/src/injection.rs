//! 注入点构建
//!
//! 把元数据解析器给出的声明转换为具体的注入点，
//! 未显式指定引用名称的参数和属性按配置的候选来源生成默认引用列表

use crate::accessor::{parse_path, Segment};
use di_abstractions::{Param, PropertyKind, TypeDescriptor, TypeMetadata};
use infrastructure_common::{
    ContainerConfig, ContainerError, ContainerResult, InitPhase, NamingConventions, TypeInfo,
};
use std::fmt;

/// 一个注入位置的候选引用名称，按顺序尝试，第一个能解析到组件的名称生效
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    names: Vec<Option<String>>,
}

impl References {
    /// 创建候选列表，重复的名称只保留第一次出现的位置
    pub fn new(names: Vec<Option<String>>) -> Self {
        let mut references = Self { names };
        references.remove_duplicate_names();
        references
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self {
            names: vec![Some(name.into())],
        }
    }

    fn remove_duplicate_names(&mut self) {
        for i in 1..self.names.len() {
            let repeated = match &self.names[i] {
                Some(name) => self.names[..i].iter().flatten().any(|earlier| earlier == name),
                None => false,
            };
            if repeated {
                self.names[i] = None;
            }
        }
    }

    /// 可用的候选名称，跳过空位
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().flatten().map(String::as_str)
    }

    /// 包括空位在内的原始列表
    pub fn slots(&self) -> &[Option<String>] {
        &self.names
    }
}

impl fmt::Display for References {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        f.write_str(&names.join(", "))
    }
}

/// 构造器注入点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtorInjectionPoint {
    /// 构造器在类型描述中的下标
    pub index: usize,
    /// 每个参数的候选引用
    pub references: Vec<References>,
}

/// 引用属性注入点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInjectionPoint {
    pub property: String,
    pub target: TypeInfo,
    pub references: References,
}

/// 集合注入点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetInjectionPoint {
    pub property: String,
    pub element: TypeInfo,
}

/// 方法注入点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInjectionPoint {
    pub method: String,
    pub targets: Vec<TypeInfo>,
    pub references: Vec<References>,
}

/// 初始化钩子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitMethodPoint {
    pub method: String,
    pub order: Option<i32>,
    pub phase: InitPhase,
}

impl InitMethodPoint {
    /// 非负顺序最先并升序，未指定顺序居中，负数最后且 -1 排在末尾
    fn sort_key(&self) -> (u8, i32) {
        match self.order {
            Some(order) if order >= 0 => (0, order),
            None => (1, 0),
            Some(order) => (2, order),
        }
    }
}

/// 按调用顺序稳定排序，顺序相同的保持声明顺序
pub fn sort_init_methods(points: &mut [InitMethodPoint]) {
    points.sort_by_key(InitMethodPoint::sort_key);
}

/// 销毁钩子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyMethodPoint {
    pub method: String,
}

/// 参数注入点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueInjectionPoint {
    pub property: String,
    pub template: String,
}

/// 解析完成后不可变的注入点集合
#[derive(Debug, Clone, Default)]
pub struct ResolvedInjection {
    /// 类型没有声明构造器时为空，只能用于装配已有实例
    pub constructor: Option<CtorInjectionPoint>,
    pub properties: Vec<PropertyInjectionPoint>,
    pub sets: Vec<SetInjectionPoint>,
    pub methods: Vec<MethodInjectionPoint>,
    pub init_methods: Vec<InitMethodPoint>,
    pub destroy_methods: Vec<DestroyMethodPoint>,
    pub values: Vec<ValueInjectionPoint>,
    /// 隐式参数注入的参数键
    pub params: Vec<String>,
}

impl ResolvedInjection {
    pub fn init_methods_for(&self, phase: InitPhase) -> impl Iterator<Item = &InitMethodPoint> {
        self.init_methods.iter().filter(move |point| point.phase == phase)
    }
}

/// 注入点构建器
pub struct InjectionPointBuilder<'a> {
    config: &'a ContainerConfig,
}

impl<'a> InjectionPointBuilder<'a> {
    pub fn new(config: &'a ContainerConfig) -> Self {
        Self { config }
    }

    /// 构造器或方法参数的默认引用
    pub fn param_references(&self, param: &Param) -> References {
        let declared = if self.config.use_parameter_names {
            param.name.as_deref()
        } else {
            None
        };
        References::new(NamingConventions::default_references(
            &self.config.lookup_references,
            declared,
            &param.type_info,
        ))
    }

    /// 属性的默认引用
    pub fn property_references(&self, property: &str, target: &TypeInfo) -> References {
        References::new(NamingConventions::default_references(
            &self.config.lookup_references,
            Some(property),
            target,
        ))
    }

    fn slot_references(
        &self,
        member: &str,
        params: &[Param],
        explicit: Option<&[Option<String>]>,
    ) -> ContainerResult<Vec<References>> {
        if let Some(explicit) = explicit {
            if explicit.len() != params.len() {
                return Err(ContainerError::invalid_injection_point(format!(
                    "{} 声明了 {} 个引用, 但有 {} 个参数",
                    member,
                    explicit.len(),
                    params.len()
                )));
            }
        }

        Ok(params
            .iter()
            .enumerate()
            .map(|(i, param)| match explicit.and_then(|refs| refs[i].as_deref()) {
                Some(name) => References::single(name),
                None => self.param_references(param),
            })
            .collect())
    }

    /// 选择构造器：标注的构造器优先，其次是唯一的构造器，最后是无参构造器
    pub fn constructor(
        &self,
        descriptor: &TypeDescriptor,
        metadata: &TypeMetadata,
    ) -> ContainerResult<Option<CtorInjectionPoint>> {
        let constructors = descriptor.constructors();
        if let Some(hint) = &metadata.constructor {
            return self
                .constructor_at(descriptor, Some(hint.index), hint.references.as_deref())
                .map(Some);
        }
        match constructors.len() {
            0 => Ok(None),
            1 => self.constructor_at(descriptor, Some(0), None).map(Some),
            _ => match constructors.iter().position(|c| c.params().is_empty()) {
                Some(index) => self.constructor_at(descriptor, Some(index), None).map(Some),
                None => Err(ContainerError::invalid_injection_point(format!(
                    "{} 没有可用的构造器（标注、唯一或无参）",
                    descriptor.type_info()
                ))),
            },
        }
    }

    /// 指定构造器的注入点，未指定下标时要求类型只有一个构造器
    pub fn constructor_at(
        &self,
        descriptor: &TypeDescriptor,
        index: Option<usize>,
        explicit: Option<&[Option<String>]>,
    ) -> ContainerResult<CtorInjectionPoint> {
        let constructors = descriptor.constructors();
        let index = match index {
            Some(index) => index,
            None if constructors.len() == 1 => 0,
            None => {
                return Err(ContainerError::invalid_injection_point(format!(
                    "{} 有 {} 个候选构造器",
                    descriptor.type_info(),
                    constructors.len()
                )))
            }
        };
        let constructor = constructors.get(index).ok_or_else(|| {
            ContainerError::invalid_injection_point(format!("构造器不存在: {}#{}", descriptor.type_info(), index))
        })?;
        let member = format!("{}#new[{}]", descriptor.type_info().short_name(), index);

        Ok(CtorInjectionPoint {
            index,
            references: self.slot_references(&member, constructor.params(), explicit)?,
        })
    }

    pub fn property(
        &self,
        descriptor: &TypeDescriptor,
        property: &str,
        reference: Option<&str>,
    ) -> ContainerResult<PropertyInjectionPoint> {
        let found = descriptor
            .property(property)
            .ok_or_else(|| member_not_found(descriptor, property))?;
        if !found.is_reference() {
            return Err(ContainerError::invalid_injection_point(format!(
                "{}#{} 不是引用属性",
                descriptor.type_info(),
                property
            )));
        }

        let references = match reference {
            Some(name) if !name.is_empty() => References::single(name),
            _ => self.property_references(property, found.type_info()),
        };
        Ok(PropertyInjectionPoint {
            property: property.to_string(),
            target: found.type_info().clone(),
            references,
        })
    }

    /// 标注的引用属性，自动装配时所有引用属性都是注入点
    pub fn properties(
        &self,
        descriptor: &TypeDescriptor,
        metadata: &TypeMetadata,
        autowire: bool,
    ) -> ContainerResult<Vec<PropertyInjectionPoint>> {
        let mut points = metadata
            .properties
            .iter()
            .map(|hint| self.property(descriptor, &hint.property, hint.reference.as_deref()))
            .collect::<ContainerResult<Vec<_>>>()?;

        if autowire {
            for property in descriptor.properties().iter().filter(|p| p.is_reference()) {
                if points.iter().all(|p| p.property != property.name()) {
                    points.push(self.property(descriptor, property.name(), None)?);
                }
            }
        }
        Ok(points)
    }

    pub fn aggregate(&self, descriptor: &TypeDescriptor, property: &str) -> ContainerResult<SetInjectionPoint> {
        let found = descriptor
            .property(property)
            .ok_or_else(|| member_not_found(descriptor, property))?;
        match found.kind() {
            PropertyKind::Aggregate { element } => Ok(SetInjectionPoint {
                property: property.to_string(),
                element: element.clone(),
            }),
            _ => Err(ContainerError::invalid_injection_point(format!(
                "{}#{} 不是集合属性",
                descriptor.type_info(),
                property
            ))),
        }
    }

    pub fn aggregates(
        &self,
        descriptor: &TypeDescriptor,
        metadata: &TypeMetadata,
        autowire: bool,
    ) -> ContainerResult<Vec<SetInjectionPoint>> {
        let mut points = metadata
            .aggregates
            .iter()
            .map(|property| self.aggregate(descriptor, property))
            .collect::<ContainerResult<Vec<_>>>()?;

        if autowire {
            for property in descriptor.properties() {
                let is_aggregate = matches!(property.kind(), PropertyKind::Aggregate { .. });
                if is_aggregate && points.iter().all(|p| p.property != property.name()) {
                    points.push(self.aggregate(descriptor, property.name())?);
                }
            }
        }
        Ok(points)
    }

    pub fn method(
        &self,
        descriptor: &TypeDescriptor,
        method: &str,
        explicit: Option<&[Option<String>]>,
    ) -> ContainerResult<MethodInjectionPoint> {
        let found = descriptor
            .method(method)
            .ok_or_else(|| member_not_found(descriptor, method))?;
        let member = format!("{}#{}", descriptor.type_info().short_name(), method);

        Ok(MethodInjectionPoint {
            method: method.to_string(),
            targets: found.params().iter().map(|p| p.type_info.clone()).collect(),
            references: self.slot_references(&member, found.params(), explicit)?,
        })
    }

    pub fn methods(
        &self,
        descriptor: &TypeDescriptor,
        metadata: &TypeMetadata,
    ) -> ContainerResult<Vec<MethodInjectionPoint>> {
        metadata
            .methods
            .iter()
            .map(|hint| self.method(descriptor, &hint.method, hint.references.as_deref()))
            .collect()
    }

    pub fn init_method(
        &self,
        descriptor: &TypeDescriptor,
        method: &str,
        order: Option<i32>,
        phase: InitPhase,
    ) -> ContainerResult<InitMethodPoint> {
        self.hook_method(descriptor, method)?;
        Ok(InitMethodPoint {
            method: method.to_string(),
            order,
            phase,
        })
    }

    /// 所有初始化钩子，已按调用顺序排序
    pub fn init_methods(
        &self,
        descriptor: &TypeDescriptor,
        metadata: &TypeMetadata,
    ) -> ContainerResult<Vec<InitMethodPoint>> {
        let mut points = metadata
            .init_methods
            .iter()
            .map(|hint| self.init_method(descriptor, &hint.method, hint.order, hint.phase))
            .collect::<ContainerResult<Vec<_>>>()?;
        sort_init_methods(&mut points);
        Ok(points)
    }

    pub fn destroy_method(&self, descriptor: &TypeDescriptor, method: &str) -> ContainerResult<DestroyMethodPoint> {
        self.hook_method(descriptor, method)?;
        Ok(DestroyMethodPoint {
            method: method.to_string(),
        })
    }

    pub fn destroy_methods(
        &self,
        descriptor: &TypeDescriptor,
        metadata: &TypeMetadata,
    ) -> ContainerResult<Vec<DestroyMethodPoint>> {
        metadata
            .destroy_methods
            .iter()
            .map(|method| self.destroy_method(descriptor, method))
            .collect()
    }

    pub fn value(
        &self,
        descriptor: &TypeDescriptor,
        property: &str,
        template: &str,
    ) -> ContainerResult<ValueInjectionPoint> {
        let root = match parse_path(property)?.into_iter().next() {
            Some(Segment::Field(root)) => root,
            _ => return Err(ContainerError::property_path(property, "路径必须以属性名开头")),
        };
        if descriptor.property(&root).is_none() {
            return Err(member_not_found(descriptor, &root));
        }
        Ok(ValueInjectionPoint {
            property: property.to_string(),
            template: template.to_string(),
        })
    }

    pub fn values(
        &self,
        descriptor: &TypeDescriptor,
        metadata: &TypeMetadata,
    ) -> ContainerResult<Vec<ValueInjectionPoint>> {
        metadata
            .values
            .iter()
            .map(|hint| self.value(descriptor, &hint.property, &hint.template))
            .collect()
    }

    /// 生命周期钩子必须是无参方法
    fn hook_method(&self, descriptor: &TypeDescriptor, method: &str) -> ContainerResult<()> {
        let found = descriptor
            .method(method)
            .ok_or_else(|| member_not_found(descriptor, method))?;
        if !found.params().is_empty() {
            return Err(ContainerError::invalid_injection_point(format!(
                "生命周期方法不能有参数: {}#{}",
                descriptor.type_info(),
                method
            )));
        }
        Ok(())
    }
}

fn member_not_found(descriptor: &TypeDescriptor, member: &str) -> ContainerError {
    ContainerError::MemberNotFound {
        type_name: descriptor.type_info().full_name().to_string(),
        member: member.to_string(),
    }
}

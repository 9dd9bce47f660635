//! 属性路径访问器
//!
//! 路径的第一段必须是类型描述中声明的属性，其余各段在该属性的 JSON 表示上导航：
//! `.name` 和 `[key]` 访问对象字段，`[0]` 访问数组元素

use di_abstractions::{Instance, MemberAccessor, TypeDescriptor, Value};
use infrastructure_common::{ContainerError, ContainerResult};
use serde_json::{Map, Value as Json};

/// 强制模式下数组最多补齐到的长度
const MAX_FORCED_LEN: usize = 4096;

/// 路径中的一段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// 解析属性路径
pub fn parse_path(path: &str) -> ContainerResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut current)));
                } else if segments.is_empty() {
                    return Err(ContainerError::property_path(path, "空的路径段"));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed || inner.is_empty() {
                    return Err(ContainerError::property_path(path, "方括号未闭合或为空"));
                }
                let segment = match inner.parse::<usize>() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => Segment::Field(inner),
                };
                segments.push(segment);
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        segments.push(Segment::Field(current));
    }

    match segments.first() {
        Some(Segment::Field(_)) => Ok(segments),
        _ => Err(ContainerError::property_path(path, "路径必须以属性名开头")),
    }
}

/// 默认的成员访问器
#[derive(Debug, Default, Clone, Copy)]
pub struct PathAccessor;

impl PathAccessor {
    fn split<'a>(path: &str, segments: &'a [Segment]) -> ContainerResult<(&'a str, &'a [Segment])> {
        match segments.split_first() {
            Some((Segment::Field(name), rest)) => Ok((name.as_str(), rest)),
            _ => Err(ContainerError::property_path(path, "路径必须以属性名开头")),
        }
    }
}

impl MemberAccessor for PathAccessor {
    fn set(
        &self,
        target: &Instance,
        descriptor: &TypeDescriptor,
        path: &str,
        value: Value,
        forced: bool,
    ) -> ContainerResult<()> {
        let segments = parse_path(path)?;
        let (name, rest) = Self::split(path, &segments)?;
        let property = descriptor
            .property(name)
            .ok_or_else(|| member_not_found(descriptor, name))?;

        if rest.is_empty() {
            return property.set(target, value);
        }

        let leaf = match value {
            Value::Data(json) => json,
            other => {
                return Err(ContainerError::property_path(
                    path,
                    format!("嵌套路径只能写入数据值, 实际为 {}", other.kind()),
                ))
            }
        };
        let mut root = match property.get(target)? {
            Value::Data(json) => json,
            other => {
                return Err(ContainerError::property_path(
                    path,
                    format!("属性 {} 不是数据属性: {}", name, other.kind()),
                ))
            }
        };

        write_json(&mut root, rest, leaf, forced).map_err(|message| ContainerError::property_path(path, message))?;
        property.set(target, Value::Data(root))
    }

    fn get(&self, target: &Instance, descriptor: &TypeDescriptor, path: &str) -> ContainerResult<Value> {
        let segments = parse_path(path)?;
        let (name, rest) = Self::split(path, &segments)?;
        let property = descriptor
            .property(name)
            .ok_or_else(|| member_not_found(descriptor, name))?;
        let value = property.get(target)?;
        if rest.is_empty() {
            return Ok(value);
        }

        let Value::Data(root) = value else {
            return Err(ContainerError::property_path(path, "只有数据属性支持嵌套路径"));
        };
        read_json(&root, rest)
            .cloned()
            .map(Value::Data)
            .ok_or_else(|| ContainerError::property_path(path, "路径不存在"))
    }
}

fn member_not_found(descriptor: &TypeDescriptor, member: &str) -> ContainerError {
    ContainerError::MemberNotFound {
        type_name: descriptor.type_info().full_name().to_string(),
        member: member.to_string(),
    }
}

fn read_json<'a>(mut node: &'a Json, segments: &[Segment]) -> Option<&'a Json> {
    for segment in segments {
        node = match segment {
            Segment::Field(key) => node.as_object()?.get(key)?,
            Segment::Index(index) => node.as_array()?.get(*index)?,
        };
    }
    Some(node)
}

fn write_json(node: &mut Json, segments: &[Segment], leaf: Json, forced: bool) -> Result<(), String> {
    let Some((segment, rest)) = segments.split_first() else {
        *node = coerce_leaf(node, leaf);
        return Ok(());
    };

    if node.is_null() && forced {
        *node = empty_container(segment);
    }

    let child = match segment {
        Segment::Field(key) => {
            let object = node
                .as_object_mut()
                .ok_or_else(|| format!("{} 不是对象", key))?;
            if !object.contains_key(key) {
                if !forced && !rest.is_empty() {
                    return Err(format!("字段不存在: {}", key));
                }
                object.insert(key.clone(), Json::Null);
            }
            object
                .get_mut(key)
                .ok_or_else(|| format!("字段不存在: {}", key))?
        }
        Segment::Index(index) => {
            let array = node
                .as_array_mut()
                .ok_or_else(|| format!("[{}] 不是数组", index))?;
            if *index >= array.len() {
                if !forced {
                    return Err(format!("下标越界: {}", index));
                }
                let len = index
                    .checked_add(1)
                    .filter(|len| *len <= MAX_FORCED_LEN)
                    .ok_or_else(|| format!("下标过大: {}", index))?;
                array.resize(len, Json::Null);
            }
            &mut array[*index]
        }
    };

    write_json(child, rest, leaf, forced)
}

fn empty_container(next: &Segment) -> Json {
    match next {
        Segment::Field(_) => Json::Object(Map::new()),
        Segment::Index(_) => Json::Array(Vec::new()),
    }
}

/// 参数都是字符串，写入已有的数值或布尔节点时按 JSON 文本解析
fn coerce_leaf(existing: &Json, leaf: Json) -> Json {
    let structured = matches!(existing, Json::Number(_) | Json::Bool(_) | Json::Array(_) | Json::Object(_));
    if let (true, Json::String(text)) = (structured, &leaf) {
        if let Ok(parsed) = serde_json::from_str(text) {
            return parsed;
        }
    }
    leaf
}

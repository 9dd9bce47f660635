//! 参数存储
//!
//! 扁平的字符串键值对，约定键名为 `组件名.属性路径`。
//! 值中可以包含 `${其他键}` 占位符，使用前递归解析。

use infrastructure_common::{ContainerError, ContainerResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const PLACEHOLDER_START: &str = "${";
const PLACEHOLDER_END: char = '}';
const ESCAPE: char = '\\';

/// 参数存储
#[derive(Debug, Default)]
pub struct ParameterStore {
    values: RwLock<BTreeMap<String, String>>,
    fallback: Option<String>,
}

impl ParameterStore {
    /// `fallback` 为无法解析的占位符的替换值，为空时报错
    pub fn new(fallback: Option<String>) -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            fallback,
        }
    }

    pub fn define(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    pub fn define_all<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = self.values.write();
        for (key, value) in entries {
            values.insert(key.into(), value.into());
        }
    }

    /// 从配置文件加载参数，嵌套表展开为点分键，数组元素展开为 `key[i]`
    pub fn load(&self, path: impl AsRef<Path>) -> ContainerResult<usize> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .build()?;
        let tree: serde_json::Value = settings.try_deserialize()?;

        let mut flat = BTreeMap::new();
        flatten("", &tree, &mut flat);
        let count = flat.len();
        self.values.write().extend(flat);

        info!("从 {} 加载参数 {} 个", path.display(), count);
        Ok(count)
    }

    /// 原始值，不解析占位符
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// 取出参数并解析其中的占位符
    pub fn resolve(&self, key: &str) -> ContainerResult<Option<String>> {
        match self.get(key) {
            Some(raw) => {
                let mut stack = vec![key.to_string()];
                self.expand(&raw, &mut stack).map(Some)
            }
            None => Ok(None),
        }
    }

    /// 解析模板中的占位符
    pub fn resolve_template(&self, template: &str) -> ContainerResult<String> {
        self.expand(template, &mut Vec::new())
    }

    /// 以 `prefix` 开头的所有键，按字典序排列
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.values
            .read()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    pub fn clear(&self) {
        self.values.write().clear();
    }

    fn expand(&self, template: &str, stack: &mut Vec<String>) -> ContainerResult<String> {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find(PLACEHOLDER_START) {
            if rest[..start].ends_with(ESCAPE) {
                output.push_str(&rest[..start - ESCAPE.len_utf8()]);
                output.push_str(PLACEHOLDER_START);
                rest = &rest[start + PLACEHOLDER_START.len()..];
                continue;
            }

            output.push_str(&rest[..start]);
            let after = &rest[start + PLACEHOLDER_START.len()..];
            let end = after.find(PLACEHOLDER_END).ok_or_else(|| {
                ContainerError::parameter(format!("占位符未闭合: {}", template))
            })?;
            let key = &after[..end];
            output.push_str(&self.lookup(key, stack)?);
            rest = &after[end + PLACEHOLDER_END.len_utf8()..];
        }

        output.push_str(rest);
        Ok(output)
    }

    fn lookup(&self, key: &str, stack: &mut Vec<String>) -> ContainerResult<String> {
        if stack.iter().any(|k| k == key) {
            return Err(ContainerError::parameter(format!(
                "参数循环引用: {} -> {}",
                stack.join(" -> "),
                key
            )));
        }

        let Some(raw) = self.get(key) else {
            return match &self.fallback {
                Some(fallback) => {
                    debug!("参数 {} 未定义，使用替换值", key);
                    Ok(fallback.clone())
                }
                None => Err(ContainerError::parameter(format!("参数未定义: {}", key))),
            };
        };

        stack.push(key.to_string());
        let resolved = self.expand(&raw, stack);
        stack.pop();
        resolved
    }
}

fn flatten(prefix: &str, node: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    match node {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(&format!("{}[{}]", prefix, index), child, out);
            }
        }
        serde_json::Value::Null => {}
        serde_json::Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_chained_references() {
        let store = ParameterStore::default();
        store.define("foo.count", "${base}");
        store.define("base", "${base2}");
        store.define("base2", "10");

        assert_eq!(store.resolve("foo.count").unwrap().as_deref(), Some("10"));
        assert_eq!(store.get("foo.count").as_deref(), Some("${base}"));
    }

    #[test]
    fn test_template_with_text() {
        let store = ParameterStore::default();
        store.define_all([("host", "localhost"), ("port", "5432")]);

        let url = store.resolve_template("pg://${host}:${port}/ads").unwrap();
        assert_eq!(url, "pg://localhost:5432/ads");
        assert_eq!(store.resolve_template("\\${host}").unwrap(), "${host}");
    }

    #[test]
    fn test_cycle_is_error() {
        let store = ParameterStore::default();
        store.define("a", "${b}");
        store.define("b", "${a}");

        let err = store.resolve("a").unwrap_err();
        assert!(matches!(err, ContainerError::ParameterError { .. }));
    }

    #[test]
    fn test_missing_reference_and_fallback() {
        let strict = ParameterStore::default();
        strict.define("a", "${missing}");
        assert!(strict.resolve("a").is_err());

        let lenient = ParameterStore::new(Some(String::new()));
        lenient.define("a", "x${missing}y");
        assert_eq!(lenient.resolve("a").unwrap().as_deref(), Some("xy"));
    }

    #[test]
    fn test_unclosed_placeholder() {
        let store = ParameterStore::default();
        assert!(store.resolve_template("${oops").is_err());
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = ParameterStore::default();
        store.define_all([("pool.size", "4"), ("pool.name", "main"), ("poolx.size", "1"), ("other", "x")]);

        assert_eq!(store.keys_with_prefix("pool."), vec!["pool.name", "pool.size"]);
    }

    #[test]
    fn test_load_flattens_nested_tables() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[pool]\nsize = 8\nname = \"main\"\nhosts = [\"a\", \"b\"]\n[pool.retry]\nenabled = true"
        )
        .unwrap();

        let store = ParameterStore::default();
        let count = store.load(file.path()).unwrap();

        assert_eq!(count, 5);
        assert_eq!(store.get("pool.size").as_deref(), Some("8"));
        assert_eq!(store.get("pool.hosts[1]").as_deref(), Some("b"));
        assert_eq!(store.get("pool.retry.enabled").as_deref(), Some("true"));
    }
}

//! 名称到 ID 的请求级查找缓存
//!
//! 每种资源类型的 `{type}/id` 列表在一次调用内只拉取一次，
//! 对该类型发起变更后失效。缓存随 `OvmClient` 一起销毁，不跨调用保留。

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::models::SimpleId;

#[derive(Debug, Default)]
pub struct LookupCache {
    /// (资源类型, 名称) -> 对象引用
    entries: HashMap<(String, String), SimpleId>,

    /// 已加载列表的资源类型
    loaded: HashSet<String>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 该类型的列表是否已加载
    pub fn is_loaded(&self, object_type: &str) -> bool {
        self.loaded.contains(object_type)
    }

    /// 查找名称
    ///
    /// 返回 `None` 表示该类型尚未加载；`Some(None)` 表示已加载但不存在。
    pub fn get(&self, object_type: &str, name: &str) -> Option<Option<SimpleId>> {
        if !self.is_loaded(object_type) {
            return None;
        }
        Some(
            self.entries
                .get(&(object_type.to_string(), name.to_string()))
                .cloned(),
        )
    }

    /// 用列表填充某类型，同名对象以第一个为准
    pub fn load(&mut self, object_type: &str, listing: Vec<SimpleId>) {
        self.invalidate(object_type);

        for element in listing {
            let Some(name) = element.name.clone() else {
                continue;
            };
            let key = (object_type.to_string(), name);
            if let Some(existing) = self.entries.get(&key) {
                warn!(
                    "{} 名称不唯一: {} ({} / {})，使用第一个",
                    object_type, key.1, existing.value, element.value
                );
                continue;
            }
            self.entries.insert(key, element);
        }

        debug!("已缓存 {} 列表", object_type);
        self.loaded.insert(object_type.to_string());
    }

    /// 使某类型的缓存失效
    pub fn invalidate(&mut self, object_type: &str) {
        if self.loaded.remove(object_type) {
            debug!("{} 查找缓存已失效", object_type);
        }
        self.entries.retain(|(kind, _), _| kind != object_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_type_misses() {
        let cache = LookupCache::new();
        assert_eq!(cache.get("Vm", "host01"), None);
    }

    #[test]
    fn test_load_and_get() {
        let mut cache = LookupCache::new();
        cache.load(
            "Network",
            vec![
                SimpleId::named("n1", "10.20.20.0"),
                SimpleId::named("n2", "10.20.30.0"),
            ],
        );

        assert_eq!(
            cache.get("Network", "10.20.30.0"),
            Some(Some(SimpleId::named("n2", "10.20.30.0")))
        );
        assert_eq!(cache.get("Network", "missing"), Some(None));
        assert_eq!(cache.get("Vm", "10.20.30.0"), None);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let mut cache = LookupCache::new();
        cache.load(
            "Vm",
            vec![SimpleId::named("a", "host01"), SimpleId::named("b", "host01")],
        );

        assert_eq!(cache.get("Vm", "host01").unwrap().unwrap().value, "a");
    }

    #[test]
    fn test_invalidate_only_affects_one_type() {
        let mut cache = LookupCache::new();
        cache.load("Vm", vec![SimpleId::named("a", "host01")]);
        cache.load("Network", vec![SimpleId::named("n1", "net")]);

        cache.invalidate("Vm");

        assert!(!cache.is_loaded("Vm"));
        assert_eq!(cache.get("Vm", "host01"), None);
        assert!(cache.get("Network", "net").unwrap().is_some());
    }

    #[test]
    fn test_unnamed_elements_skipped() {
        let mut cache = LookupCache::new();
        cache.load("VirtualDisk", vec![SimpleId::new("d1")]);
        assert_eq!(cache.get("VirtualDisk", "d1"), Some(None));
    }
}

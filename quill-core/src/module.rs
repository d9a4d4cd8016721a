//! Import-path resolution used when a dotted name is not visible lexically.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::defn::DefnId;

pub trait ModuleLoader {
    /// Resolves `path` to its definitions. `None` means the path is not
    /// (yet) importable and the caller should keep trying longer paths.
    fn import(&mut self, path: &str, absolute: bool) -> Option<Vec<DefnId>>;
}

#[derive(Debug, Default)]
struct Registry {
    modules: HashMap<String, Vec<DefnId>>,
    requests: Vec<String>,
}

/// In-memory loader over modules the host has already built. Clones share
/// one registry, so a host can keep a handle after giving one to a session.
#[derive(Clone, Debug, Default)]
pub struct ModuleMap {
    registry: Rc<RefCell<Registry>>,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<String>, defns: Vec<DefnId>) {
        self.registry.borrow_mut().modules.insert(path.into(), defns);
    }

    /// Every path requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.registry.borrow().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.registry.borrow_mut().requests.clear();
    }
}

impl ModuleLoader for ModuleMap {
    fn import(&mut self, path: &str, _absolute: bool) -> Option<Vec<DefnId>> {
        let mut registry = self.registry.borrow_mut();
        registry.requests.push(path.to_string());
        registry.modules.get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_request_log() {
        let map = ModuleMap::new();
        map.register("pkg.a", vec![DefnId(7)]);
        let mut loader = map.clone();
        assert_eq!(loader.import("pkg", false), None);
        assert_eq!(loader.import("pkg.a", false), Some(vec![DefnId(7)]));
        assert_eq!(map.requests(), vec!["pkg".to_string(), "pkg.a".to_string()]);
    }
}

//! The process-wide driver registry (§6, §9: "a process-wide registry maps
//! URI scheme → factory; schemes are registered at startup"). Ported nearly
//! line for line from the teacher's `engine/registry.rs::DriverRegistry`,
//! swapping "driver id" for "URI scheme" and "driver value" for "connect
//! factory", since a `Database` is constructed per-connection rather than
//! being a single long-lived singleton per dialect.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::traits::Database;

/// Connects a URI under one scheme to a concrete [`Database`] + migrator
/// pair. Implemented once per dialect in `redi-drivers`.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// The URI scheme this factory handles, e.g. `"sqlite"`.
    fn scheme(&self) -> &'static str;

    async fn connect(&self, uri: &str) -> CoreResult<Arc<dyn Database>>;
}

/// Registry mapping URI scheme to the factory that can connect it.
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Registers a factory under its own `scheme()`, replacing any prior
    /// registration for that scheme.
    pub fn register(&mut self, factory: Arc<dyn DriverFactory>) {
        self.factories.insert(factory.scheme().to_string(), factory);
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn DriverFactory>> {
        self.factories.get(scheme).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubFactory(&'static str);

    #[async_trait]
    impl DriverFactory for StubFactory {
        fn scheme(&self) -> &'static str {
            self.0
        }

        async fn connect(&self, _uri: &str) -> CoreResult<Arc<dyn Database>> {
            unimplemented!("stub")
        }
    }

    #[test]
    fn register_keys_by_scheme() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(StubFactory("sqlite")));
        registry.register(Arc::new(StubFactory("postgresql")));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("sqlite").is_some());
        assert!(registry.get("mysql").is_none());
    }

    #[test]
    fn re_registering_a_scheme_replaces_the_factory() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(StubFactory("sqlite")));
        registry.register(Arc::new(StubFactory("sqlite")));
        assert_eq!(registry.len(), 1);
    }
}

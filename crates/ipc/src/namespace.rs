//! Namespace routing for IPC handlers.
//!
//! `"particle.send"` goes to the handler registered for `"particle"` as
//! `handle("send", params)`. Methods without a known namespace fall through
//! to the default handler with their full name.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::server::IpcHandler;

#[derive(Default)]
pub struct NamespacedHandler {
    handlers: HashMap<String, Arc<dyn IpcHandler>>,
    default: Option<Arc<dyn IpcHandler>>,
}

impl NamespacedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(&mut self, prefix: &str, handler: Arc<dyn IpcHandler>) {
        self.handlers.insert(prefix.to_string(), handler);
    }

    pub fn set_default(&mut self, handler: Arc<dyn IpcHandler>) {
        self.default = Some(handler);
    }

    /// Registered namespace prefixes, sorted.
    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn resolve<'a>(&self, method: &'a str) -> Option<(&Arc<dyn IpcHandler>, &'a str)> {
        method
            .split_once('.')
            .and_then(|(ns, rest)| self.handlers.get(ns).map(|h| (h, rest)))
            .or_else(|| self.default.as_ref().map(|h| (h, method)))
    }
}

impl IpcHandler for NamespacedHandler {
    fn handle(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
        match self.resolve(method) {
            Some((handler, stripped)) => handler.handle(stripped, params),
            None => {
                let method = method.to_string();
                Box::pin(async move { Err(format!("unknown method: {}", method)) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    impl IpcHandler for Echo {
        fn handle(
            &self,
            method: &str,
            _params: Option<Value>,
        ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
            let result = serde_json::json!({ "handler": self.0, "method": method });
            Box::pin(async move { Ok(result) })
        }
    }

    #[tokio::test]
    async fn test_namespace_routing() {
        let mut router = NamespacedHandler::new();
        router.add_namespace("particle", Arc::new(Echo("particle")));
        router.add_namespace("peer", Arc::new(Echo("peer")));

        let result = router.handle("particle.send", None).await.unwrap();
        assert_eq!(result["handler"], "particle");
        assert_eq!(result["method"], "send");

        let result = router.handle("peer.identify", None).await.unwrap();
        assert_eq!(result["handler"], "peer");
        assert_eq!(result["method"], "identify");

        assert_eq!(router.namespaces(), vec!["particle", "peer"]);
    }

    #[tokio::test]
    async fn test_unknown_namespace_falls_to_default() {
        let mut router = NamespacedHandler::new();
        router.add_namespace("particle", Arc::new(Echo("particle")));
        router.set_default(Arc::new(Echo("default")));

        let result = router.handle("status", None).await.unwrap();
        assert_eq!(result["method"], "status");

        let result = router.handle("unknown.method", None).await.unwrap();
        assert_eq!(result["handler"], "default");
        assert_eq!(result["method"], "unknown.method");
    }

    #[tokio::test]
    async fn test_no_handler_returns_error() {
        let router = NamespacedHandler::new();
        let err = router.handle("particle.send", None).await.unwrap_err();
        assert!(err.contains("unknown method"));
    }
}

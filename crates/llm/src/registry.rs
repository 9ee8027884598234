//! Process-wide backend handles, built once on first use.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::OnceCell;
use tracing::debug;
use vista_core::Config;

use crate::provider::LlmProvider;
use crate::providers::create_providers;

/// A named provider, shared across calls and sessions.
#[derive(Clone)]
pub struct BackendHandle {
    pub name: String,
    pub provider: Arc<dyn LlmProvider>,
}

impl BackendHandle {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle").field("name", &self.name).finish()
    }
}

type Factory = Box<dyn Fn() -> Vec<BackendHandle> + Send + Sync>;

/// Lazily initialized, ordered list of backends. Concurrent first callers
/// wait on the same initialization; the factory runs at most once.
pub struct BackendRegistry {
    factory: Factory,
    handles: OnceCell<Vec<BackendHandle>>,
}

static GLOBAL: OnceLock<Arc<BackendRegistry>> = OnceLock::new();

impl BackendRegistry {
    pub fn new(factory: impl Fn() -> Vec<BackendHandle> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            handles: OnceCell::new(),
        }
    }

    /// Backends from `LLM_PRIORITY`, skipping those without credentials.
    pub fn from_config(config: Config) -> Self {
        Self::new(move || create_providers(&config))
    }

    /// Already-initialized registry, for tests and embedding.
    pub fn with_handles(handles: Vec<BackendHandle>) -> Self {
        Self {
            factory: Box::new(Vec::new),
            handles: OnceCell::new_with(Some(handles)),
        }
    }

    pub async fn handles(&self) -> &[BackendHandle] {
        self.handles
            .get_or_init(|| async {
                debug!("initializing backend registry");
                (self.factory)()
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.handles.initialized()
    }

    /// The process registry. Built from the environment unless one was
    /// installed first with [`BackendRegistry::install_global`].
    pub fn global() -> Arc<BackendRegistry> {
        GLOBAL
            .get_or_init(|| Arc::new(Self::from_config(Config::from_env())))
            .clone()
    }

    /// Install the process registry. Fails (returning the registry) when one
    /// is already in place.
    pub fn install_global(registry: BackendRegistry) -> Result<(), Arc<BackendRegistry>> {
        GLOBAL.set(Arc::new(registry))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::provider::{LlmError, Message};

    struct Echo;

    #[async_trait]
    impl LlmProvider for Echo {
        async fn complete(&self, messages: Vec<Message>, _: f32, _: u32) -> Result<String, LlmError> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn factory_runs_once_under_concurrent_first_use() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = Arc::new(BackendRegistry::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![BackendHandle::new("echo", Arc::new(Echo))]
        }));
        assert!(!registry.is_initialized());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let r = registry.clone();
                tokio::spawn(async move { r.handles().await.len() })
            })
            .collect();
        for t in tasks {
            assert_eq!(t.await.unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_initialized());
    }

    #[tokio::test]
    async fn injected_handles_are_used_as_is() {
        let registry = BackendRegistry::with_handles(vec![BackendHandle::new("echo", Arc::new(Echo))]);
        assert!(registry.is_initialized());
        let handles = registry.handles().await;
        assert_eq!(handles[0].name, "echo");
        let out = handles[0]
            .provider
            .complete(vec![Message::user("ping")], 0.0, 8)
            .await
            .unwrap();
        assert_eq!(out, "ping");
        assert_eq!(format!("{:?}", handles[0]), r#"BackendHandle { name: "echo" }"#);
    }
}

//! Provider registration and resolution.
//!
//! A client spec names a provider (`anthropic:claude-sonnet-4` names
//! `anthropic`). Resolution checks three places, first match wins:
//!
//! 1. providers registered on the agent itself
//! 2. the shared [`ProviderRegistry`] (process-wide unless one is passed in)
//! 3. built-ins (`echo`)

use ostinato_core::error::{Error, Result};
use ostinato_core::provider::{ClientSpec, Provider};
use ostinato_core::registry::Registry;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::scripted::EchoProvider;

/// Concurrent provider registry, populated at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Registry<dyn Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static ProviderRegistry {
        static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ProviderRegistry::new)
    }

    /// Register a provider under its own name.
    pub fn register(&self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        self.providers.register(name, provider);
    }

    /// Register a provider under an explicit name.
    pub fn register_as(&self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.register(name, provider);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.providers.unregister(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.names()
    }
}

/// Providers that ship with the runtime.
pub fn builtin(name: &str) -> Option<Arc<dyn Provider>> {
    match name {
        "echo" => Some(Arc::new(EchoProvider)),
        _ => None,
    }
}

pub const BUILTIN_PROVIDERS: &[&str] = &["echo"];

/// Resolves client specs to providers with pinned precedence.
#[derive(Clone, Default)]
pub struct ProviderResolver {
    explicit: HashMap<String, Arc<dyn Provider>>,
    shared: Option<Arc<ProviderRegistry>>,
}

impl ProviderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider on this resolver only.
    pub fn with_provider(mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.explicit.insert(name.into(), provider);
        self
    }

    /// Use this registry instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.shared = Some(registry);
        self
    }

    fn shared(&self) -> &ProviderRegistry {
        match &self.shared {
            Some(registry) => registry,
            None => ProviderRegistry::global(),
        }
    }

    /// Resolve the provider for a client spec.
    pub fn resolve(&self, client: &ClientSpec) -> Result<Arc<dyn Provider>> {
        let name = client.provider.as_str();
        if let Some(provider) = self.explicit.get(name) {
            debug!(provider = name, source = "explicit", "Resolved provider");
            return Ok(Arc::clone(provider));
        }
        if let Some(provider) = self.shared().get(name) {
            debug!(provider = name, source = "registry", "Resolved provider");
            return Ok(provider);
        }
        if let Some(provider) = builtin(name) {
            debug!(provider = name, source = "builtin", "Resolved provider");
            return Ok(provider);
        }
        Err(Error::Config(format!("unknown provider `{name}` (client {client})")))
    }

    /// Every name this resolver can serve, sorted and deduplicated.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.explicit.keys().cloned().collect();
        names.extend(self.shared().names());
        names.extend(BUILTIN_PROVIDERS.iter().map(|s| s.to_string()));
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedProvider;
    use ostinato_core::error::ErrorKind;

    fn named(name: &str) -> Arc<dyn Provider> {
        Arc::new(ScriptedProvider::new(vec![]).with_name(name))
    }

    #[test]
    fn explicit_beats_registry_beats_builtin() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register_as("echo", named("from-registry"));
        registry.register_as("shared", named("shared"));

        let resolver = ProviderResolver::new()
            .with_registry(registry.clone())
            .with_provider("echo", named("from-agent"));

        let echo = resolver.resolve(&ClientSpec::new("echo", "")).unwrap();
        assert_eq!(echo.name(), "from-agent");
        let shared = resolver.resolve(&ClientSpec::new("shared", "m")).unwrap();
        assert_eq!(shared.name(), "shared");

        let plain = ProviderResolver::new().with_registry(registry);
        assert_eq!(plain.resolve(&ClientSpec::new("echo", "")).unwrap().name(), "from-registry");
    }

    #[test]
    fn builtin_echo_is_always_available() {
        let resolver = ProviderResolver::new().with_registry(Arc::new(ProviderRegistry::new()));
        assert_eq!(resolver.resolve(&ClientSpec::new("echo", "")).unwrap().name(), "echo");
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let resolver = ProviderResolver::new().with_registry(Arc::new(ProviderRegistry::new()));
        let err = resolver.resolve(&ClientSpec::new("nope", "x")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.message().contains("nope"));
    }

    #[test]
    fn registry_registers_under_provider_name() {
        let registry = ProviderRegistry::new();
        registry.register(named("alpha"));
        assert!(registry.get("alpha").is_some());
        assert_eq!(registry.names(), vec!["alpha".to_string()]);
        assert!(registry.unregister("alpha"));
        assert!(registry.get("alpha").is_none());
    }

    #[test]
    fn available_lists_every_source() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(named("shared"));
        let resolver = ProviderResolver::new()
            .with_registry(registry)
            .with_provider("mine", named("mine"));
        assert_eq!(resolver.available(), vec!["echo", "mine", "shared"]);
    }
}

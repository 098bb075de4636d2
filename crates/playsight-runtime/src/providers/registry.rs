//! Registry of remote scoring backends.
//!
//! Each backend is registered with its descriptor and the parser that reads
//! its responses, so backends with different response conventions do not
//! touch merge logic.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = BackendRegistry::new();
//! registry.register(BackendDescriptor::new("primary", 1, "scorer-large"), Arc::new(primary))?;
//!
//! for backend in registry.priority_order(Some("primary")) {
//!     // ...
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use playsight_core::LOCAL_BACKEND;

use super::{BackendDescriptor, BackendError, ScoringBackend};
use crate::normalize::{ResponseParser, TextResponseParser};

/// A backend with its descriptor and response parser.
pub struct RegisteredBackend {
    pub descriptor: BackendDescriptor,
    pub backend: Arc<dyn ScoringBackend>,
    pub parser: Arc<dyn ResponseParser>,
    enabled: AtomicBool,
}

impl RegisteredBackend {
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Registry of remote backends keyed by id.
///
/// Membership is fixed once the registry is built; only the enabled flag
/// changes at runtime.
#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, RegisteredBackend>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend that answers in the default text format.
    pub fn register(
        &mut self,
        descriptor: BackendDescriptor,
        backend: Arc<dyn ScoringBackend>,
    ) -> Result<(), BackendError> {
        self.register_with_parser(descriptor, backend, Arc::new(TextResponseParser::new()))
    }

    /// Register a backend with its own response parser.
    ///
    /// If a backend with the same id already exists, it will be replaced.
    pub fn register_with_parser(
        &mut self,
        descriptor: BackendDescriptor,
        backend: Arc<dyn ScoringBackend>,
        parser: Arc<dyn ResponseParser>,
    ) -> Result<(), BackendError> {
        if descriptor.id == LOCAL_BACKEND {
            return Err(BackendError::NotConfigured(format!(
                "backend id '{}' is reserved for local analysis",
                LOCAL_BACKEND
            )));
        }
        if backend.id() != descriptor.id {
            tracing::warn!(
                backend = %backend.id(),
                descriptor = %descriptor.id,
                "Backend id differs from its descriptor, using descriptor id"
            );
        }

        let enabled = AtomicBool::new(descriptor.enabled);
        self.backends.insert(
            descriptor.id.clone(),
            RegisteredBackend {
                descriptor,
                backend,
                parser,
                enabled,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredBackend> {
        self.backends.get(id)
    }

    /// Enable or disable a backend; returns false for unknown ids.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        match self.backends.get(id) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::SeqCst);
                tracing::info!(backend = %id, enabled, "Backend toggled");
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.backends.get(id).map(|b| b.is_enabled()).unwrap_or(false)
    }

    /// Enabled backends in the order they should be tried.
    ///
    /// The preferred backend goes first when it is registered and enabled;
    /// the rest follow by ascending priority, ties broken by id.
    pub fn priority_order(&self, preferred: Option<&str>) -> Vec<&RegisteredBackend> {
        let mut ordered: Vec<&RegisteredBackend> =
            self.backends.values().filter(|b| b.is_enabled()).collect();
        ordered.sort_by(|a, b| {
            a.descriptor
                .priority
                .cmp(&b.descriptor.priority)
                .then_with(|| a.id().cmp(b.id()))
        });

        if let Some(preferred) = preferred {
            if let Some(index) = ordered.iter().position(|b| b.id() == preferred) {
                let first = ordered.remove(index);
                ordered.insert(0, first);
            }
        }

        ordered
    }

    /// Descriptors of every registered backend.
    pub fn descriptors(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.backends.values().map(|b| &b.descriptor)
    }

    /// List registered backend ids.
    pub fn ids(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.ids())
            .finish()
    }
}

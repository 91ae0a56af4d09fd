use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Proof that the inference runtime has been initialized.
///
/// Only [`InferenceRuntime::initialize`] hands these out, so holding one is
/// enough to build an engine.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeHandle {
    initialized_at: Instant,
}

impl RuntimeHandle {
    pub fn initialized_at(&self) -> Instant {
        self.initialized_at
    }
}

/// Inference runtime with an explicit, one-shot initialization phase.
///
/// Detectors are given an `Arc<InferenceRuntime>` and check it on every call
/// instead of looking anything up globally.
#[derive(Debug, Default)]
pub struct InferenceRuntime {
    handle: OnceLock<RuntimeHandle>,
}

static GLOBAL_RUNTIME: OnceLock<Arc<InferenceRuntime>> = OnceLock::new();

impl InferenceRuntime {
    /// A fresh, uninitialized runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide runtime instance (uninitialized until someone calls `initialize`).
    pub fn global() -> Arc<InferenceRuntime> {
        GLOBAL_RUNTIME
            .get_or_init(|| Arc::new(InferenceRuntime::new()))
            .clone()
    }

    /// Initialize the runtime. Repeated calls return the handle from the first one.
    pub fn initialize(&self) -> RuntimeHandle {
        *self.handle.get_or_init(|| {
            log::info!("inference runtime initialized");
            RuntimeHandle {
                initialized_at: Instant::now(),
            }
        })
    }

    pub fn handle(&self) -> Option<RuntimeHandle> {
        self.handle.get().copied()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }
}

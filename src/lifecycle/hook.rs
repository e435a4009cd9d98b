//! Hook definitions and lifecycle error types.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Error type returned by hooks and health checks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a hook invocation.
pub type HookResult = Result<HookOutcome, BoxError>;

/// Type-erased async hook function.
pub type HookFn<C> = Arc<dyn Fn(Arc<C>) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// Default position of a hook in the startup sequence.
pub const DEFAULT_STARTUP_ORDER: i32 = 50;

/// Base from which the shutdown order is derived.
pub const SHUTDOWN_ORDER_BASE: i32 = 1000;

/// Which side of the lifecycle a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Startup,
    Shutdown,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Startup => f.write_str("startup"),
            HookKind::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// What a hook reports back after running.
///
/// Hooks own the decision of whether their dependency is optional: an
/// optional dependency that cannot start reports `Failed { required: false }`
/// (or `Skipped`) and the process continues in degraded mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Started,
    Skipped { reason: String },
    Failed { required: bool, error: String },
}

impl HookOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        HookOutcome::Skipped { reason: reason.into() }
    }

    /// A failure that must abort the startup sequence.
    pub fn fatal(error: impl fmt::Display) -> Self {
        HookOutcome::Failed { required: true, error: error.to_string() }
    }

    /// A failure the process can survive.
    pub fn degraded(error: impl fmt::Display) -> Self {
        HookOutcome::Failed { required: false, error: error.to_string() }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, HookOutcome::Started)
    }

    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            HookOutcome::Started => "started",
            HookOutcome::Skipped { .. } => "skipped",
            HookOutcome::Failed { required: true, .. } => "failed",
            HookOutcome::Failed { required: false, .. } => "degraded",
        }
    }
}

/// Ordering metadata supplied at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSpec {
    pub name: String,
    pub startup_order: i32,
    pub requires: BTreeSet<String>,
}

impl HookSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            startup_order: DEFAULT_STARTUP_ORDER,
            requires: BTreeSet::new(),
        }
    }

    pub fn order(mut self, startup_order: i32) -> Self {
        self.startup_order = startup_order;
        self
    }

    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(names.into_iter().map(Into::into));
        self
    }
}

/// A registered startup or shutdown action.
pub struct LifecycleHook<C> {
    pub name: String,
    pub kind: HookKind,
    pub startup_order: i32,
    pub requires: BTreeSet<String>,
    pub started: bool,
    func: HookFn<C>,
}

impl<C: Send + Sync + 'static> LifecycleHook<C> {
    pub fn new<F, Fut>(kind: HookKind, spec: HookSpec, func: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self {
            name: spec.name,
            kind,
            startup_order: spec.startup_order,
            requires: spec.requires,
            started: false,
            func: Arc::new(move |ctx: Arc<C>| -> BoxFuture<'static, HookResult> {
                Box::pin(func(ctx))
            }),
        }
    }

    /// Last-started shuts down first.
    pub fn shutdown_order(&self) -> i32 {
        SHUTDOWN_ORDER_BASE - self.startup_order
    }

    pub(crate) fn invoke(&self, ctx: Arc<C>) -> BoxFuture<'static, HookResult> {
        (self.func)(ctx)
    }
}

impl<C> fmt::Debug for LifecycleHook<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHook")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("startup_order", &self.startup_order)
            .field("requires", &self.requires)
            .field("started", &self.started)
            .finish()
    }
}

/// Errors raised by the lifecycle registry.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Two hooks of the same kind were registered under one name.
    #[error("{kind} hook '{name}' is already registered")]
    DuplicateHook { name: String, kind: HookKind },

    /// A hook requires a name that is not a registered startup hook.
    #[error("hook '{hook}' requires unknown hook '{dependency}'")]
    MissingDependency { hook: String, dependency: String },

    /// The `requires` edges form a cycle.
    #[error("circular dependency between hooks: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// A startup hook failed and its dependency is required.
    #[error("startup hook '{name}' failed: {source}")]
    HookFailed {
        name: String,
        #[source]
        source: BoxError,
    },
}

impl LifecycleError {
    /// Configuration errors are detected during resolution, before any hook runs.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, LifecycleError::HookFailed { .. })
    }
}

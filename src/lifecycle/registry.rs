//! Dependency-ordered startup and shutdown orchestration.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::lifecycle::hook::{
    HookKind, HookOutcome, HookResult, HookSpec, LifecycleError, LifecycleHook,
};
use crate::observability::metrics;

/// Per-hook outcomes of a startup run, in execution order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub outcomes: Vec<(String, HookOutcome)>,
}

impl StartupReport {
    /// Names of hooks that started successfully.
    pub fn started(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_started())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// True when at least one hook skipped or failed non-fatally.
    pub fn is_degraded(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| !outcome.is_started())
    }
}

/// Per-hook results of a shutdown run. Failures are collected, never raised.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of named startup/shutdown hook pairs.
///
/// `C` is the context shared by every hook (settings, shared services).
/// Startup and shutdown hooks are paired by name.
pub struct LifecycleRegistry<C> {
    startup: BTreeMap<String, LifecycleHook<C>>,
    shutdown: BTreeMap<String, LifecycleHook<C>>,
    /// Names of startup hooks that succeeded, in execution order.
    started_sequence: Vec<String>,
}

impl<C: Send + Sync + 'static> LifecycleRegistry<C> {
    pub fn new() -> Self {
        Self {
            startup: BTreeMap::new(),
            shutdown: BTreeMap::new(),
            started_sequence: Vec::new(),
        }
    }

    /// Register a hook on the given side of the lifecycle.
    pub fn register<F, Fut>(
        &mut self,
        kind: HookKind,
        spec: HookSpec,
        func: F,
    ) -> Result<(), LifecycleError>
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        let hooks = match kind {
            HookKind::Startup => &mut self.startup,
            HookKind::Shutdown => &mut self.shutdown,
        };
        if hooks.contains_key(&spec.name) {
            return Err(LifecycleError::DuplicateHook { name: spec.name, kind });
        }

        tracing::debug!(
            hook = %spec.name,
            kind = %kind,
            startup_order = spec.startup_order,
            requires = ?spec.requires,
            "Registered lifecycle hook"
        );
        hooks.insert(spec.name.clone(), LifecycleHook::new(kind, spec, func));
        Ok(())
    }

    pub fn on_startup<F, Fut>(&mut self, spec: HookSpec, func: F) -> Result<(), LifecycleError>
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.register(HookKind::Startup, spec, func)
    }

    pub fn on_shutdown<F, Fut>(&mut self, spec: HookSpec, func: F) -> Result<(), LifecycleError>
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.register(HookKind::Shutdown, spec, func)
    }

    pub fn hook_names(&self, kind: HookKind) -> Vec<&str> {
        let hooks = match kind {
            HookKind::Startup => &self.startup,
            HookKind::Shutdown => &self.shutdown,
        };
        hooks.keys().map(String::as_str).collect()
    }

    pub fn is_started(&self, name: &str) -> bool {
        self.startup.get(name).is_some_and(|hook| hook.started)
    }

    /// Startup hooks that are currently marked started, in execution order.
    pub fn started_hooks(&self) -> &[String] {
        &self.started_sequence
    }

    /// Compute an execution order satisfying every `requires` edge.
    ///
    /// Among hooks whose dependencies are already placed, the lowest
    /// `(startup_order, name)` goes next. When nothing is placeable, a
    /// depth-first visit locates the cycle or the unknown dependency.
    pub fn resolve_startup_order(&self) -> Result<Vec<String>, LifecycleError> {
        let mut ordered: Vec<String> = Vec::with_capacity(self.startup.len());
        let mut placed: HashSet<String> = HashSet::with_capacity(self.startup.len());
        let mut remaining: BTreeSet<&str> = self.startup.keys().map(String::as_str).collect();

        while !remaining.is_empty() {
            let next = remaining
                .iter()
                .map(|name| &self.startup[*name])
                .filter(|hook| hook.requires.iter().all(|dep| placed.contains(dep)))
                .min_by(|a, b| {
                    (a.startup_order, a.name.as_str()).cmp(&(b.startup_order, b.name.as_str()))
                })
                .map(|hook| hook.name.clone());

            if let Some(name) = next {
                remaining.remove(name.as_str());
                placed.insert(name.clone());
                ordered.push(name);
                continue;
            }

            let root = remaining
                .iter()
                .map(|name| &self.startup[*name])
                .min_by(|a, b| {
                    (a.startup_order, a.name.as_str()).cmp(&(b.startup_order, b.name.as_str()))
                })
                .map(|hook| hook.name.clone());
            let Some(root) = root else { break };

            let mut path = Vec::new();
            let mut visited = Vec::new();
            self.visit(&root, &placed, &mut path, &mut visited)?;
            for name in visited {
                remaining.remove(name.as_str());
                placed.insert(name.clone());
                ordered.push(name);
            }
        }

        Ok(ordered)
    }

    fn visit(
        &self,
        name: &str,
        placed: &HashSet<String>,
        path: &mut Vec<String>,
        visited: &mut Vec<String>,
    ) -> Result<(), LifecycleError> {
        if let Some(pos) = path.iter().position(|entry| entry == name) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(LifecycleError::CircularDependency { cycle });
        }
        if placed.contains(name) || visited.iter().any(|entry| entry == name) {
            return Ok(());
        }
        let Some(hook) = self.startup.get(name) else {
            return Err(LifecycleError::MissingDependency {
                hook: path.last().cloned().unwrap_or_default(),
                dependency: name.to_string(),
            });
        };

        let mut deps: Vec<&LifecycleHook<C>> = Vec::new();
        for dep in &hook.requires {
            match self.startup.get(dep) {
                Some(dep_hook) => deps.push(dep_hook),
                None => {
                    return Err(LifecycleError::MissingDependency {
                        hook: name.to_string(),
                        dependency: dep.clone(),
                    })
                }
            }
        }
        deps.sort_by(|a, b| (a.startup_order, &a.name).cmp(&(b.startup_order, &b.name)));

        path.push(name.to_string());
        for dep in deps {
            self.visit(&dep.name, placed, path, visited)?;
        }
        path.pop();
        visited.push(name.to_string());
        Ok(())
    }

    /// Run every startup hook in resolved order.
    ///
    /// Fails fast: configuration errors abort before any hook runs, and a
    /// required hook failure aborts the remaining sequence. Hooks still
    /// marked started from an earlier run are not invoked again.
    pub async fn startup(&mut self, ctx: Arc<C>) -> Result<StartupReport, LifecycleError> {
        let order = self.resolve_startup_order()?;
        tracing::info!(hooks = ?order, "Running startup hooks");

        let mut report = StartupReport::default();
        for name in order {
            let Some(hook) = self.startup.get(&name) else { continue };
            if hook.started {
                tracing::debug!(hook = %name, "Startup hook already started, skipping");
                continue;
            }
            let future = hook.invoke(ctx.clone());

            let started_at = Instant::now();
            let result = run_isolated(future).await;

            match result {
                Ok(HookOutcome::Started) => {
                    metrics::record_hook(&name, HookKind::Startup, "started", started_at);
                    if let Some(hook) = self.startup.get_mut(&name) {
                        hook.started = true;
                    }
                    self.started_sequence.push(name.clone());
                    tracing::info!(
                        hook = %name,
                        elapsed_ms = started_at.elapsed().as_millis() as u64,
                        "Startup hook completed"
                    );
                    report.outcomes.push((name, HookOutcome::Started));
                }
                Ok(HookOutcome::Skipped { reason }) => {
                    metrics::record_hook(&name, HookKind::Startup, "skipped", started_at);
                    tracing::info!(hook = %name, reason = %reason, "Startup hook skipped");
                    report.outcomes.push((name, HookOutcome::Skipped { reason }));
                }
                Ok(HookOutcome::Failed { required: false, error }) => {
                    metrics::record_hook(&name, HookKind::Startup, "degraded", started_at);
                    tracing::warn!(
                        hook = %name,
                        error = %error,
                        "Optional startup hook failed, continuing degraded"
                    );
                    report.outcomes.push((name, HookOutcome::Failed { required: false, error }));
                }
                Ok(HookOutcome::Failed { required: true, error }) => {
                    metrics::record_hook(&name, HookKind::Startup, "failed", started_at);
                    tracing::error!(hook = %name, error = %error, "Startup hook failed");
                    return Err(LifecycleError::HookFailed { name, source: error.into() });
                }
                Err(source) => {
                    metrics::record_hook(&name, HookKind::Startup, "failed", started_at);
                    tracing::error!(hook = %name, error = %source, "Startup hook failed");
                    return Err(LifecycleError::HookFailed { name, source });
                }
            }
        }

        Ok(report)
    }

    /// Shutdown hooks to run: those paired with a successfully started
    /// startup hook, last-started first.
    pub fn resolve_shutdown_order(&self) -> Vec<String> {
        self.started_sequence
            .iter()
            .rev()
            .filter(|name| self.is_started(name) && self.shutdown.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Run shutdown hooks. Every hook is attempted; failures are logged.
    pub async fn shutdown(&mut self, ctx: Arc<C>) -> ShutdownReport {
        let order = self.resolve_shutdown_order();
        tracing::info!(hooks = ?order, "Running shutdown hooks");

        let mut report = ShutdownReport::default();
        for name in order {
            let Some(hook) = self.shutdown.get(&name) else { continue };
            let future = hook.invoke(ctx.clone());

            let started_at = Instant::now();
            match run_isolated(future).await {
                Ok(HookOutcome::Failed { error, .. }) => {
                    metrics::record_hook(&name, HookKind::Shutdown, "failed", started_at);
                    tracing::error!(hook = %name, error = %error, "Shutdown hook failed");
                    report.failed.push((name, error));
                }
                Ok(outcome) => {
                    metrics::record_hook(&name, HookKind::Shutdown, outcome.label(), started_at);
                    tracing::info!(hook = %name, outcome = outcome.label(), "Shutdown hook completed");
                    report.completed.push(name);
                }
                Err(e) => {
                    metrics::record_hook(&name, HookKind::Shutdown, "failed", started_at);
                    tracing::error!(hook = %name, error = %e, "Shutdown hook failed");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        for hook in self.startup.values_mut() {
            hook.started = false;
        }
        self.started_sequence.clear();
        report
    }
}

impl<C: Send + Sync + 'static> Default for LifecycleRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a hook future on its own task so a panic surfaces as an error.
async fn run_isolated(future: futures_util::future::BoxFuture<'static, HookResult>) -> HookResult {
    match tokio::spawn(future).await {
        Ok(result) => result,
        Err(join_error) => Err(join_error.into()),
    }
}

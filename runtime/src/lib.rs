//! # Stagepass Runtime
//!
//! Runtime for Stagepass checkout sessions.
//!
//! This crate provides the [`Store`] that serializes reducer execution and
//! runs the effects reducers return.
//!
//! ## Core Components
//!
//! - **Store**: Owns the state, runs the reducer, executes effects
//! - **Effect Handle**: Lets a caller wait until the effects of one action finish
//! - **Task Registry**: Tracks cancellable background tasks (timers) by id
//!
//! ## Example
//!
//! ```ignore
//! use stagepass_runtime::Store;
//!
//! let store = Store::new(initial_state, reducer, environment);
//!
//! let mut handle = store.send(Action::DoSomething).await?;
//! handle.wait().await;
//!
//! let value = store.state(|s| s.some_field).await;
//! ```

use stagepass_core::{
    effect::{Effect, EffectId},
    reducer::Reducer,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

mod cancellation;

use cancellation::TaskRegistry;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for effects to complete
        #[error("Timeout waiting for effects")]
        Timeout,
    }
}

pub use error::StoreError;

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of actions buffered for slow observers
    pub broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 64,
            default_shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`]. Waiting on it returns once every effect
/// started by that action has finished, including the reduction of the
/// actions those effects fed back. Effects started by the fed-back actions
/// are tracked by their own handles.
///
/// Cancellable effects are background work and are never tracked.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Whether all tracked effects have finished
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.effects.load(Ordering::SeqCst) == 0
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all
    /// effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: completion counter shared by all effects of one action
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    /// Tracking nobody waits on, for effects outside any handle
    fn detached() -> Self {
        let (tx, _) = watch::channel(());
        Self {
            counter: Arc::new(AtomicUsize::new(0)),
            notifier: Arc::new(tx),
        }
    }

    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// Ensures the counter is decremented even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectId, EffectTracking, Ordering, Reducer, RwLock, StoreConfig,
        StoreError, TaskRegistry,
    };
    use futures::future::{BoxFuture, FutureExt, join_all};
    use tokio::sync::broadcast;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`; one reducer call at a time)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    /// 5. Cancellable background tasks
    ///
    /// Cloning a store is cheap and every clone drives the same state.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        config: StoreConfig,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        tasks: Arc<TaskRegistry>,
        /// Actions produced by effects, broadcast to observers
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Clone + Send + 'static,
        S: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                config,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                tasks: Arc::new(TaskRegistry::default()),
                action_broadcast,
            }
        }

        /// The configuration this store was created with
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Starts the returned effects
        ///
        /// Returns after starting effect execution, not after completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            self.send_internal(action, |_| ()).await.map(|(handle, ())| handle)
        }

        /// Send an action and inspect the resulting state
        ///
        /// `inspect` runs under the same write lock as the reducer, so it sees
        /// exactly the state this action produced, before any effect runs.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub async fn send_and_inspect<F, T>(
            &self,
            action: A,
            inspect: F,
        ) -> Result<(EffectHandle, T), StoreError>
        where
            F: FnOnce(&S) -> T,
        {
            self.send_internal(action, inspect).await
        }

        /// Subscribe to all actions produced by effects
        ///
        /// Actions sent directly through [`Store::send`] are not broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Whether a cancellable task is currently registered under `id`
        #[must_use]
        pub fn is_task_active(&self, id: &EffectId) -> bool {
            self.tasks.is_active(id)
        }

        /// Refuse new actions and abort every background task
        ///
        /// Synchronous so it can run from `Drop`. Actions fed back by effects
        /// already in flight are still reduced, but no new cancellable task
        /// is started. Returns the number of tasks that were aborted.
        pub fn close(&self) -> usize {
            if !self.shutdown.swap(true, Ordering::AcqRel) {
                tracing::debug!("Store closed to new actions");
            }
            let cancelled = self.tasks.cancel_all();
            if cancelled > 0 {
                tracing::debug!(cancelled, "Cancelled background tasks");
            }
            cancelled
        }

        /// [`close`](Self::close) the store, then reduce one last action
        ///
        /// The action skips the shutdown check and its effects run as usual,
        /// except cancellable ones. It is reduced on a spawned task, so this
        /// needs a Tokio runtime; without one the action is dropped. A later
        /// [`shutdown`](Self::shutdown) waits for it.
        pub fn close_with(&self, action: A) {
            self.close();

            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                tracing::warn!("No runtime to reduce the closing action, dropping it");
                return;
            };

            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
            let store = self.clone();
            runtime.spawn(async move {
                let _pending_guard = pending_guard;
                store.reduce_and_run(action, |_| ()).await;
            });
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Rejects new actions, aborts background tasks, then waits for
        /// in-flight effects to drain.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
        /// when the timeout expires.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.close();

            let start = tokio::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timeout");
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Whether shutdown has been initiated
        #[must_use]
        pub fn is_shut_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        async fn send_internal<F, T>(
            &self,
            action: A,
            inspect: F,
        ) -> Result<(EffectHandle, T), StoreError>
        where
            F: FnOnce(&S) -> T,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            Ok(self.reduce_and_run(action, inspect).await)
        }

        /// Reduce under the write lock, then start the returned effects
        async fn reduce_and_run<F, T>(&self, action: A, inspect: F) -> (EffectHandle, T)
        where
            F: FnOnce(&S) -> T,
        {
            let (handle, tracking) = EffectHandle::new();

            let (effects, inspected) = {
                let mut state = self.state.write().await;

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                (effects, inspect(&*state))
            };

            for effect in effects {
                self.execute_effect(effect, &tracking);
            }

            (handle, inspected)
        }

        /// Start an effect
        ///
        /// `Cancel` is applied synchronously. `Cancellable` starts a detached,
        /// registered task. Everything else runs on a tracked task.
        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Cancel(id) => {
                    metrics::counter!("store.effects.executed", "type" => "cancel").increment(1);
                    let cancelled = self.tasks.cancel(&id);
                    tracing::debug!(effect_id = %id, cancelled, "Executing Effect::Cancel");
                },
                Effect::Cancellable { id, effect } => {
                    metrics::counter!("store.effects.executed", "type" => "cancellable")
                        .increment(1);
                    self.spawn_cancellable(id, *effect);
                },
                effect => {
                    tracking.increment();
                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
                    let guard = DecrementGuard(tracking.clone());
                    let run = self.run_effect(effect);

                    tokio::spawn(async move {
                        let _guard = guard;
                        let _pending_guard = pending_guard;
                        run.await;
                    });
                },
            }
        }

        fn spawn_cancellable(&self, id: EffectId, effect: Effect<A>) {
            if self.is_shut_down() {
                tracing::debug!(effect_id = %id, "Store shut down, not starting cancellable effect");
                return;
            }

            let token = self.tasks.next_token();
            let registry = Arc::clone(&self.tasks);
            let task_id = id.clone();
            let run = self.run_effect(effect);

            let task = tokio::spawn(async move {
                run.await;
                registry.complete(&task_id, token);
            });

            tracing::debug!(effect_id = %id, "Started cancellable effect");
            self.tasks.register(id.clone(), token, task.abort_handle());
            if task.is_finished() {
                self.tasks.complete(&id, token);
            }
        }

        /// Run an effect to completion on the current task
        fn run_effect(&self, effect: Effect<A>) -> BoxFuture<'static, ()> {
            let store = self.clone();

            async move {
                match effect {
                    Effect::None => {},
                    Effect::Future(fut) => {
                        metrics::counter!("store.effects.executed", "type" => "future")
                            .increment(1);
                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action");
                            store.feed_back(action).await;
                        }
                    },
                    Effect::Delay { duration, action } => {
                        metrics::counter!("store.effects.executed", "type" => "delay")
                            .increment(1);
                        tokio::time::sleep(duration).await;
                        store.feed_back(*action).await;
                    },
                    Effect::Interval { period, action } => {
                        metrics::counter!("store.effects.executed", "type" => "interval")
                            .increment(1);
                        let mut ticker = tokio::time::interval(period);
                        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                        loop {
                            ticker.tick().await;
                            if store.is_shut_down() {
                                break;
                            }
                            store.feed_back((*action).clone()).await;
                        }
                    },
                    Effect::Parallel(effects) => {
                        join_all(effects.into_iter().map(|e| store.run_effect(e))).await;
                    },
                    Effect::Sequential(effects) => {
                        for effect in effects {
                            store.run_effect(effect).await;
                        }
                    },
                    nested @ (Effect::Cancellable { .. } | Effect::Cancel(_)) => {
                        store.execute_effect(nested, &EffectTracking::detached());
                    },
                }
            }
            .boxed()
        }

        /// Broadcast an effect-produced action and reduce it
        ///
        /// Results are reduced even once the store is closed, so a response
        /// that lands late is still seen by the reducer.
        async fn feed_back(&self, action: A) {
            let _ = self.action_broadcast.send(action.clone());
            self.reduce_and_run(action, |_| ()).await;
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                config: self.config.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                tasks: Arc::clone(&self.tasks),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;

//! # Stagepass Core
//!
//! Core traits and types for Stagepass checkout sessions.
//!
//! A checkout session is modelled as a reducer over an explicit state value.
//! Everything that touches the outside world (network calls, timers) is
//! described as an [`Effect`](effect::Effect) and executed by the runtime.
//!
//! ## Core Concepts
//!
//! - **State**: The session state owned by a store
//! - **Action**: All inputs to a reducer (user commands, network results, timer ticks)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions, executed by the runtime
//! - **Environment**: Injected dependencies (clock, remote services)
//!
//! ## Example
//!
//! ```ignore
//! use stagepass_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for CheckoutReducer {
//!     type State = CheckoutState;
//!     type Action = CheckoutAction;
//!     type Environment = CheckoutEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CheckoutState,
//!         action: CheckoutAction,
//!         env: &CheckoutEnvironment,
//!     ) -> SmallVec<[Effect<CheckoutAction>; 4]> {
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Reducers return effects in a SmallVec, so callers need the same type
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - the trait that holds all session logic
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// Reducers are deterministic: given the same state, action and
    /// environment they produce the same new state and the same effect
    /// descriptions. All I/O is deferred to the returned effects.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// The effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values. Returning one from a reducer does nothing by itself;
/// the store decides when and how it runs.
pub mod effect {
    use std::borrow::Cow;
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Identifier of a cancellable effect
    ///
    /// At most one task runs per id: scheduling a new cancellable effect
    /// under an id that is already running replaces the old task.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct EffectId(Cow<'static, str>);

    impl EffectId {
        /// Create an id from a static name
        #[must_use]
        pub const fn from_static(name: &'static str) -> Self {
            Self(Cow::Borrowed(name))
        }

        /// Create an id from an owned name
        #[must_use]
        pub fn new(name: impl Into<String>) -> Self {
            Self(Cow::Owned(name.into()))
        }

        /// The id as a string slice
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Dispatch an action once after a delay
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Dispatch an action repeatedly
        ///
        /// The first dispatch happens immediately, then once per `period`.
        /// An interval never finishes on its own; wrap it in
        /// [`Effect::Cancellable`] so it can be stopped.
        Interval {
            /// Time between dispatches
            period: Duration,
            /// Action dispatched on every tick
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Run an effect as a task that can later be cancelled by id
        Cancellable {
            /// Id used to cancel the task
            id: EffectId,
            /// The effect to run
            effect: Box<Effect<Action>>,
        },

        /// Abort the cancellable task registered under this id, if any
        Cancel(EffectId),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Interval { period, action } => f
                    .debug_struct("Effect::Interval")
                    .field("period", period)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Cancellable { id, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Make this effect cancellable under `id`
        #[must_use]
        pub fn cancellable(self, id: EffectId) -> Effect<Action> {
            Effect::Cancellable {
                id,
                effect: Box::new(self),
            }
        }

        /// Returns true for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// Returns true if this effect cancels the task registered under `id`
        #[must_use]
        pub fn cancels(&self, id: &EffectId) -> bool {
            match self {
                Effect::Cancel(cancelled) => cancelled == id,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().any(|e| e.cancels(id))
                },
                _ => false,
            }
        }

        /// Returns true if this effect schedules a cancellable task under `id`
        #[must_use]
        pub fn schedules(&self, id: &EffectId) -> bool {
            match self {
                Effect::Cancellable { id: scheduled, .. } => scheduled == id,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().any(|e| e.schedules(id))
                },
                _ => false,
            }
        }
    }
}

/// Environment module - dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use stagepass_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by [`Utc::now`]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::{Effect, EffectId};
    use std::time::Duration;

    const TIMER: EffectId = EffectId::from_static("timer");

    #[test]
    fn test_cancellable_wraps_effect() {
        let effect: Effect<u8> = Effect::Delay {
            duration: Duration::from_secs(1),
            action: Box::new(1),
        }
        .cancellable(TIMER);

        assert!(effect.schedules(&TIMER));
        assert!(!effect.cancels(&TIMER));
    }

    #[test]
    fn test_cancel_is_found_inside_composites() {
        let effect: Effect<u8> =
            Effect::merge(vec![Effect::None, Effect::chain(vec![Effect::Cancel(TIMER)])]);

        assert!(effect.cancels(&TIMER));
        assert!(!effect.cancels(&EffectId::new("other")));
    }

    #[test]
    fn test_effect_debug_hides_future() {
        let effect: Effect<u8> = Effect::Future(Box::pin(async { Some(1) }));
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }

    #[test]
    fn test_effect_id_display() {
        assert_eq!(EffectId::new("checkout.countdown").to_string(), "checkout.countdown");
        assert_eq!(TIMER.as_str(), "timer");
    }
}

//! Given-When-Then harness for reducers.
//!
//! Reducers are pure over `(state, action, environment)`, so most session
//! logic can be checked without a runtime: seed a state, reduce one or more
//! actions, then inspect the state and the effects that came back.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use stagepass_core::{effect::Effect, reducer::Reducer};

type StateCheck<S> = Box<dyn FnOnce(&S)>;
type EffectCheck<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Builder that reduces a sequence of actions and runs checks on the outcome
///
/// `then_effects` checks see only what the *last* action returned;
/// `then_every_effect` checks see the effects of every action, in order.
///
/// ```ignore
/// use stagepass_testing::{ReducerTest, assertions};
///
/// ReducerTest::new(CheckoutReducer::new())
///     .with_env(test_env())
///     .given_state(CheckoutState::new(listing))
///     .when_action(CheckoutAction::Reserve)
///     .then_state(|state| assert!(state.is_processing()))
///     .then_effects(assertions::assert_has_future_effect)
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    env: Option<E>,
    given: Option<S>,
    actions: Vec<A>,
    state_checks: Vec<StateCheck<S>>,
    last_effect_checks: Vec<EffectCheck<A>>,
    every_effect_checks: Vec<EffectCheck<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Start a test for `reducer`
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            env: None,
            given: None,
            actions: Vec::new(),
            state_checks: Vec::new(),
            last_effect_checks: Vec::new(),
            every_effect_checks: Vec::new(),
        }
    }

    /// Environment handed to every reduction
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.env = Some(env);
        self
    }

    /// Starting state
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.given = Some(state);
        self
    }

    /// Queue an action; repeated calls reduce in call order
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Queue several actions at once
    #[must_use]
    pub fn when_actions(mut self, actions: impl IntoIterator<Item = A>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Check the state after the last action
    #[must_use]
    pub fn then_state<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_checks.push(Box::new(check));
        self
    }

    /// Check the effects returned for the last action
    #[must_use]
    pub fn then_effects<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.last_effect_checks.push(Box::new(check));
        self
    }

    /// Check the effects of every action, concatenated in order
    #[must_use]
    pub fn then_every_effect<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.every_effect_checks.push(Box::new(check));
        self
    }

    /// Reduce the queued actions and run every check
    ///
    /// # Panics
    ///
    /// Panics when no state, environment or action was given, or when a
    /// check fails.
    #[allow(clippy::panic)] // Test harness
    pub fn run(self) {
        let Some(mut state) = self.given else {
            panic!("ReducerTest needs a starting state, call given_state()");
        };
        let Some(env) = self.env else {
            panic!("ReducerTest needs an environment, call with_env()");
        };
        assert!(
            !self.actions.is_empty(),
            "ReducerTest needs at least one action, call when_action()"
        );

        let mut every = Vec::new();
        let mut last_len = 0;
        for action in self.actions {
            let effects = self.reducer.reduce(&mut state, action, &env);
            last_len = effects.len();
            every.extend(effects);
        }
        let last = &every[every.len() - last_len..];

        for check in self.state_checks {
            check(&state);
        }
        for check in self.last_effect_checks {
            check(last);
        }
        for check in self.every_effect_checks {
            check(&every);
        }
    }
}

/// Checks over a reducer's returned effects
pub mod assertions {
    use stagepass_core::effect::{Effect, EffectId};

    /// Nothing to run: empty, or only [`Effect::None`]
    ///
    /// # Panics
    ///
    /// Panics if any other effect is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "expected no effects, got {}: {effects:?}",
            effects.len()
        );
    }

    /// Exactly `expected` effects
    ///
    /// # Panics
    ///
    /// Panics on a different count.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "expected {expected} effects, got {}",
            effects.len()
        );
    }

    /// At least one [`Effect::Future`], i.e. some async work was started
    ///
    /// # Panics
    ///
    /// Panics if there is none.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "expected a Future effect, found none"
        );
    }

    /// No [`Effect::Future`] at the top level
    ///
    /// # Panics
    ///
    /// Panics if one is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            !effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "expected no Future effect, found one"
        );
    }

    /// A cancellable task is started under `id`
    ///
    /// # Panics
    ///
    /// Panics if no effect schedules `id`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_schedules<A>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            effects.iter().any(|e| e.schedules(id)),
            "expected a task to be scheduled under {id}"
        );
    }

    /// The task under `id` is cancelled
    ///
    /// # Panics
    ///
    /// Panics if no effect cancels `id`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_cancels<A>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            effects.iter().any(|e| e.cancels(id)),
            "expected {id} to be cancelled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagepass_core::effect::EffectId;
    use stagepass_core::{SmallVec, smallvec};
    use std::time::Duration;

    const TIMER: EffectId = EffectId::from_static("timer");

    #[derive(Debug)]
    struct Hold {
        seconds_left: u32,
        running: bool,
    }

    #[derive(Clone, Debug)]
    enum HoldAction {
        Start,
        Tick,
    }

    struct HoldReducer;

    impl Reducer for HoldReducer {
        type State = Hold;
        type Action = HoldAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Hold,
            action: HoldAction,
            _env: &(),
        ) -> SmallVec<[Effect<HoldAction>; 4]> {
            match action {
                HoldAction::Start => {
                    state.running = true;
                    smallvec![
                        Effect::Interval {
                            period: Duration::from_secs(1),
                            action: Box::new(HoldAction::Tick),
                        }
                        .cancellable(TIMER)
                    ]
                },
                HoldAction::Tick => {
                    state.seconds_left = state.seconds_left.saturating_sub(1);
                    if state.seconds_left == 0 {
                        state.running = false;
                        smallvec![Effect::Cancel(TIMER)]
                    } else {
                        SmallVec::new()
                    }
                },
            }
        }
    }

    #[test]
    fn test_single_action() {
        ReducerTest::new(HoldReducer)
            .with_env(())
            .given_state(Hold {
                seconds_left: 3,
                running: false,
            })
            .when_action(HoldAction::Start)
            .then_state(|state| assert!(state.running))
            .then_effects(|effects| assertions::assert_schedules(effects, &TIMER))
            .then_effects(assertions::assert_no_future_effect)
            .run();
    }

    #[test]
    fn test_effects_split_between_last_and_every() {
        ReducerTest::new(HoldReducer)
            .with_env(())
            .given_state(Hold {
                seconds_left: 2,
                running: false,
            })
            .when_action(HoldAction::Start)
            .when_actions([HoldAction::Tick, HoldAction::Tick])
            .then_state(|state| {
                assert_eq!(state.seconds_left, 0);
                assert!(!state.running);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_cancels(effects, &TIMER);
            })
            .then_every_effect(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_schedules(effects, &TIMER);
            })
            .run();
    }

    #[test]
    fn test_no_effects_accepts_empty_and_none() {
        assertions::assert_no_effects::<HoldAction>(&[]);
        assertions::assert_no_effects::<HoldAction>(&[Effect::None]);
    }
}

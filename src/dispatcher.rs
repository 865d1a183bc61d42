//! `Dispatcher`: fires registered handlers when an expression's
//! evaluated result crosses a watched `(previous, current)` transition.

use std::collections::{HashMap, HashSet};

use crate::evaluator::Evaluator;
use crate::key::{Key, NO_KEY};
use crate::reservoir::Reservoir;
use crate::value::Ternary;

/// A `(previous, current)` pair a handler watches for. Encoded as a
/// 9-bit mask over the 3×3 combinations so one handler can watch
/// several transitions at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionMask(u16);

impl ConditionMask {
    /// Watch exactly one `(previous, current)` pair.
    pub fn single(previous: Ternary, current: Ternary) -> Self {
        Self(1u16 << bit_index(previous, current))
    }

    /// Watch every transition *into* `current` from a genuinely
    /// different state (the common case: "fire when this becomes
    /// true"). A tick where the expression merely stays at `current`
    /// does not match — `(current, current)` is not a transition.
    pub fn into(current: Ternary) -> Self {
        let mut mask = 0u16;
        for previous in [Ternary::False, Ternary::True, Ternary::Unknown] {
            if previous == current {
                continue;
            }
            mask |= 1u16 << bit_index(previous, current);
        }
        Self(mask)
    }

    /// Combine with another mask (watch the union of both).
    pub fn or(self, other: ConditionMask) -> Self {
        Self(self.0 | other.0)
    }

    fn matches(&self, previous: Ternary, current: Ternary) -> bool {
        self.0 & (1u16 << bit_index(previous, current)) != 0
    }
}

fn bit_index(previous: Ternary, current: Ternary) -> u8 {
    fn ord(t: Ternary) -> u8 {
        match t {
            Ternary::False => 0,
            Ternary::True => 1,
            Ternary::Unknown => 2,
        }
    }
    ord(previous) * 3 + ord(current)
}

/// A registered `(expression, condition, priority)` handler entry.
/// The dispatcher itself does not run handler bodies —
/// callers read [`Dispatcher::tick`]'s fired list and act on it,
/// keeping the core free of a callback/closure ownership story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    expression: Key,
    condition: ConditionMask,
    priority: i32,
}

impl Handler {
    /// The watched expression.
    pub const fn expression(&self) -> Key {
        self.expression
    }

    /// The `(previous, current)` pairs that fire this handler.
    pub const fn condition(&self) -> ConditionMask {
        self.condition
    }

    /// Firing order among handlers that fire the same tick: ascending.
    pub const fn priority(&self) -> i32 {
        self.priority
    }
}

/// Tracks each watched expression's last-seen [`Ternary`] and decides,
/// every tick, which handlers fire.
#[derive(Debug, Default)]
pub struct Dispatcher {
    handlers: Vec<Handler>,
    last: HashMap<Key, Ternary>,
    /// Status keys each watched expression's evaluation reads, cached
    /// from [`Evaluator::dependencies`] the first time `scan` sees the
    /// expression. Gates re-evaluation: an expression whose dependency
    /// set didn't transition this tick keeps its prior result (spec
    /// §4.6 step 2).
    dependencies: HashMap<Key, HashSet<Key>>,
}

impl Dispatcher {
    /// An empty dispatcher, with a capacity hint for its handler list.
    pub fn new(handler_capacity: usize) -> Self {
        Self {
            handlers: Vec::with_capacity(handler_capacity),
            last: HashMap::with_capacity(handler_capacity),
            dependencies: HashMap::with_capacity(handler_capacity),
        }
    }

    /// Register a handler. Fails if `expression` is [`NO_KEY`].
    pub fn register_handler(&mut self, expression: Key, condition: ConditionMask, priority: i32) -> bool {
        if expression == NO_KEY {
            return false;
        }
        self.handlers.push(Handler { expression, condition, priority });
        self.last.entry(expression).or_insert(Ternary::Unknown);
        true
    }

    /// Remove every handler watching `expression`, along with its
    /// cached last-seen value and dependency set.
    pub fn remove_handlers(&mut self, expression: Key) {
        self.handlers.retain(|h| h.expression != expression);
        self.last.remove(&expression);
        self.dependencies.remove(&expression);
    }

    /// Re-evaluate every watched expression whose dependency set
    /// intersects this tick's transitioned statuses, collect the
    /// handlers whose condition matches this tick's `(previous,
    /// current)` pair, update the last-seen cache, and return the
    /// fired handlers in ascending priority order (ties broken by
    /// registration order). An expression none of whose dependencies
    /// transitioned keeps its prior result untouched.
    pub fn scan(&mut self, evaluator: &Evaluator, reservoir: &Reservoir) -> Vec<Handler> {
        let watched: Vec<Key> = self.last.keys().copied().collect();
        let mut current_by_expression: HashMap<Key, Ternary> = HashMap::with_capacity(watched.len());
        for expression in watched {
            let deps = self
                .dependencies
                .entry(expression)
                .or_insert_with(|| evaluator.dependencies(expression));
            let transitioned = deps.iter().any(|status| reservoir.find_transition(*status).is_true());
            let current = if transitioned {
                evaluator.evaluate(expression, reservoir)
            } else {
                self.last[&expression]
            };
            current_by_expression.insert(expression, current);
        }

        let mut fired: Vec<Handler> = self
            .handlers
            .iter()
            .copied()
            .filter(|handler| {
                let previous = self.last[&handler.expression];
                let current = current_by_expression[&handler.expression];
                handler.condition.matches(previous, current)
            })
            .collect();
        fired.sort_by_key(|h| h.priority);

        for (expression, current) in current_by_expression {
            self.last.insert(expression, current);
        }
        fired
    }
}

//! `Evaluator`: owns registered expressions and evaluates them against
//! a [`Reservoir`] under strict Kleene logic.

use std::collections::{HashMap, HashSet};

use crate::expression::{Element, ExpressionChunk, Logic};
use crate::key::{Key, NO_KEY};
use crate::reservoir::{Reservoir, Rhs};
use crate::value::Ternary;

/// Registers and evaluates [`ExpressionChunk`]s.
#[derive(Debug, Default)]
pub struct Evaluator {
    expressions: HashMap<Key, ExpressionChunk>,
}

impl Evaluator {
    /// An empty evaluator with a capacity hint.
    pub fn new(expression_capacity: usize) -> Self {
        Self {
            expressions: HashMap::with_capacity(expression_capacity),
        }
    }

    /// Register `chunk` under `expression_key`.
    ///
    /// Fails if the key is [`NO_KEY`], already registered, the chunk
    /// has no elements, or any `SubExpression` element names a key not
    /// yet registered — construction-order cycle prevention: an
    /// expression can only reference expressions that already exist,
    /// so a cycle can never be built.
    pub fn register_expression(&mut self, expression_key: Key, chunk: ExpressionChunk) -> bool {
        if expression_key == NO_KEY {
            return false;
        }
        if self.expressions.contains_key(&expression_key) {
            return false;
        }
        if chunk.elements().is_empty() {
            return false;
        }
        for element in chunk.elements() {
            if let Element::SubExpression { expression, .. } = element {
                if *expression == expression_key || !self.expressions.contains_key(expression) {
                    return false;
                }
            }
        }
        self.expressions.insert(expression_key, chunk);
        true
    }

    /// Remove a registered expression.
    pub fn remove_expression(&mut self, expression_key: Key) -> bool {
        self.expressions.remove(&expression_key).is_some()
    }

    /// `true` if `expression_key` is registered.
    pub fn contains_expression(&self, expression_key: Key) -> bool {
        self.expressions.contains_key(&expression_key)
    }

    /// Evaluate `expression_key` against `reservoir`, short-circuiting
    /// under strict three-valued logic: `Unknown` never
    /// gets demoted to `False`, and an `And`/`Or` only short-circuits on
    /// a result its own identity can't be overturned by (`False` for
    /// `And`, `True` for `Or`).
    pub fn evaluate(&self, expression_key: Key, reservoir: &Reservoir) -> Ternary {
        let chunk = match self.expressions.get(&expression_key) {
            Some(c) => c,
            None => return Ternary::Unknown,
        };

        let mut saw_unknown = false;
        for element in chunk.elements() {
            let (mut result, invert) = match element {
                Element::SubExpression { expression, invert } => (self.evaluate(*expression, reservoir), *invert),
                Element::StatusTransition { status, invert } => (reservoir.find_transition(*status), *invert),
                Element::StatusComparison { comparison, invert } => (reservoir.compare_status(comparison), *invert),
            };
            if *invert {
                result = negate(result);
            }

            match (chunk.logic(), result) {
                (Logic::And, Ternary::False) => return Ternary::False,
                (Logic::Or, Ternary::True) => return Ternary::True,
                (_, Ternary::Unknown) => saw_unknown = true,
                _ => {}
            }
        }

        if saw_unknown {
            Ternary::Unknown
        } else {
            match chunk.logic() {
                Logic::And => Ternary::True,
                Logic::Or => Ternary::False,
            }
        }
    }

    /// Every status key `expression_key`'s evaluation reads, directly or
    /// through a `SubExpression` chain: the dependency set a dispatcher
    /// uses to decide whether this expression needs re-evaluating this
    /// tick (spec §4.6 step 2 — only expressions whose dependency set
    /// intersects this tick's transitioned statuses get re-scanned).
    /// Empty if `expression_key` isn't registered.
    pub fn dependencies(&self, expression_key: Key) -> HashSet<Key> {
        let mut deps = HashSet::new();
        self.collect_dependencies(expression_key, &mut deps);
        deps
    }

    fn collect_dependencies(&self, expression_key: Key, deps: &mut HashSet<Key>) {
        let Some(chunk) = self.expressions.get(&expression_key) else {
            return;
        };
        for element in chunk.elements() {
            match element {
                Element::SubExpression { expression, .. } => self.collect_dependencies(*expression, deps),
                Element::StatusTransition { status, .. } => {
                    deps.insert(*status);
                }
                Element::StatusComparison { comparison, .. } => {
                    deps.insert(comparison.status);
                    if let Rhs::Status(key) = comparison.rhs {
                        deps.insert(key);
                    }
                }
            }
        }
    }
}

fn negate(t: Ternary) -> Ternary {
    match t {
        Ternary::True => Ternary::False,
        Ternary::False => Ternary::True,
        Ternary::Unknown => Ternary::Unknown,
    }
}

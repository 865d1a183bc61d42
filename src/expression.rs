//! `Expression`/`ExpressionChunk`: a registered boolean combinator over
//! sub-expressions, status transitions, and status comparisons.

use crate::key::Key;
use crate::reservoir::StatusComparison;

/// How an expression combines its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Logic {
    /// Unknown short-circuits, but is not treated as `False`: an `And`
    /// is `False` as soon as one element is `False`, `Unknown` if none
    /// are `False` but at least one is `Unknown`, else `True`.
    And,
    /// `True` as soon as one element is `True`, `Unknown` if none are
    /// `True` but at least one is `Unknown`, else `False`.
    Or,
}

/// One element of an [`ExpressionChunk`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Element {
    /// Another expression's result, optionally negated.
    SubExpression { expression: Key, invert: bool },
    /// A status's transition flag, optionally negated.
    StatusTransition { status: Key, invert: bool },
    /// A status comparison, optionally negated.
    StatusComparison { comparison: StatusComparison, invert: bool },
}

/// One registered expression: its combinator and ordered elements.
/// Stands in for both the expression header and its element storage —
/// the engine keeps them together since elements are never mutated
/// after registration, only replaced wholesale by re-registering the key.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpressionChunk {
    logic: Logic,
    elements: Vec<Element>,
}

impl ExpressionChunk {
    /// Build a chunk from its combinator and elements. Does not
    /// validate non-emptiness or cycles — [`crate::evaluator::Evaluator::register_expression`]
    /// does that at the point a key is known.
    pub fn new(logic: Logic, elements: Vec<Element>) -> Self {
        Self { logic, elements }
    }

    /// This expression's combinator.
    pub const fn logic(&self) -> Logic {
        self.logic
    }

    /// This expression's elements, in registration order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ComparisonOp;
    use crate::reservoir::Rhs;

    #[test]
    fn chunk_carries_its_elements_in_order() {
        let chunk = ExpressionChunk::new(
            Logic::And,
            vec![
                Element::StatusTransition { status: 1, invert: false },
                Element::StatusComparison {
                    comparison: StatusComparison::new(2, ComparisonOp::Eq, Rhs::Value(crate::value::StatusValue::Bool(true))),
                    invert: true,
                },
            ],
        );
        assert_eq!(chunk.logic(), Logic::And);
        assert_eq!(chunk.elements().len(), 2);
    }
}

#![allow(clippy::wrong_self_convention)]

pub mod accumulator;
pub mod chunk;
pub mod consts;
pub mod container;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod format;
pub mod key;
pub mod reservoir;
pub mod value;

pub mod prelude {
    pub use crate::accumulator::{Accumulator, DelayPolicy};
    pub use crate::chunk::StatusChunk;
    pub use crate::dispatcher::{ConditionMask, Dispatcher, Handler};
    pub use crate::driver::{Driver, DriverCapacity};
    pub use crate::error::{ContractError, CoercionError};
    pub use crate::evaluator::Evaluator;
    pub use crate::expression::{Element, ExpressionChunk, Logic};
    pub use crate::format::{Format, Kind};
    pub use crate::key::{FnvKeyHasher, Key, KeyHasher, NO_KEY};
    pub use crate::reservoir::{Reservoir, Rhs, StatusAssignment, StatusComparison, StatusProperty};
    pub use crate::value::{AssignOp, ComparisonOp, Order, StatusValue, Ternary};
}

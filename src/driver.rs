//! `Driver`: the facade gluing [`Reservoir`], [`Evaluator`],
//! [`Accumulator`], and [`Dispatcher`] into one tick loop.

use crate::accumulator::{Accumulator, DelayPolicy};
use crate::dispatcher::{ConditionMask, Dispatcher, Handler};
use crate::evaluator::Evaluator;
use crate::expression::ExpressionChunk;
use crate::key::{Key, KeyHasher};
use crate::reservoir::{Reservoir, StatusAssignment};
use crate::value::{StatusValue, Ternary};

/// Construction-time capacity hints for a [`Driver`]'s four owned
/// components. Each defaults to `0`, i.e. grow on
/// demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverCapacity {
    pub chunks: usize,
    pub statuses: usize,
    pub expressions: usize,
    pub handlers: usize,
    pub queued_writes: usize,
}

/// Owns one [`Reservoir`], [`Evaluator`], [`Accumulator`], and
/// [`Dispatcher`], and drives them through a tick:
/// flush queued writes, evaluate watched expressions, fire handlers
/// whose `(previous, current)` pair matches, then clear this tick's
/// transition flags.
#[derive(Debug)]
pub struct Driver<H> {
    reservoir: Reservoir,
    evaluator: Evaluator,
    accumulator: Accumulator,
    dispatcher: Dispatcher,
    hasher: H,
}

impl<H: KeyHasher> Driver<H> {
    /// Build an empty driver around `hasher`, the [`KeyHasher`] callers
    /// use to turn names into [`Key`]s before calling into this driver.
    pub fn new(capacity: DriverCapacity, hasher: H) -> Self {
        Self {
            reservoir: Reservoir::new(capacity.chunks, capacity.statuses),
            evaluator: Evaluator::new(capacity.expressions),
            accumulator: Accumulator::new(capacity.queued_writes),
            dispatcher: Dispatcher::new(capacity.handlers),
            hasher,
        }
    }

    /// The [`KeyHasher`] this driver was built with.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Shared access to the underlying [`Reservoir`], for read-only
    /// status queries outside a tick.
    pub fn reservoir(&self) -> &Reservoir {
        &self.reservoir
    }

    /// Shared access to the underlying [`Evaluator`].
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Register a new status directly (bypassing the accumulator —
    /// registration is not itself an accumulated write).
    pub fn register_status(&mut self, chunk_key: Key, status_key: Key, value: StatusValue, width: Option<u8>) -> bool {
        self.reservoir.register_status(chunk_key, status_key, value, width)
    }

    /// Remove a chunk and every status it owns.
    pub fn remove_chunk(&mut self, chunk_key: Key) -> bool {
        self.reservoir.remove_chunk(chunk_key)
    }

    /// Compact the reservoir's chunks. Should only be called between
    /// ticks, never from inside one.
    pub fn rebuild_reservoir(&mut self, chunk_capacity: usize, status_capacity: usize) {
        self.reservoir.rebuild(chunk_capacity, status_capacity);
    }

    /// Register an expression.
    pub fn register_expression(&mut self, expression_key: Key, chunk: ExpressionChunk) -> bool {
        self.evaluator.register_expression(expression_key, chunk)
    }

    /// Queue a status write, applied on the next [`Driver::tick`].
    pub fn accumulate(&mut self, assignment: StatusAssignment, delay: DelayPolicy) {
        self.accumulator.accumulate(assignment, delay);
    }

    /// Queue a series of status writes as one unit.
    pub fn accumulate_many<I>(&mut self, assignments: I, delay: DelayPolicy)
    where
        I: IntoIterator<Item = StatusAssignment>,
    {
        self.accumulator.accumulate_many(assignments, delay);
    }

    /// Register a handler watching `expression` for `condition`,
    /// firing in ascending `priority` order among same-tick handlers.
    pub fn register_handler(&mut self, expression: Key, condition: ConditionMask, priority: i32) -> bool {
        self.dispatcher.register_handler(expression, condition, priority)
    }

    /// Run one tick:
    /// 1. Flush the accumulator's queued writes into the reservoir.
    /// 2. Evaluate every watched expression.
    /// 3. Collect the handlers whose `(previous, current)` condition
    ///    matches this tick, in priority order.
    /// 4. Clear every chunk's transition flags for the next tick.
    ///
    /// Returns the fired handlers; running their bodies is the
    /// caller's responsibility — the dispatcher does not own callback
    /// storage.
    pub fn tick(&mut self) -> Vec<Handler> {
        self.accumulator.flush(&mut self.reservoir);
        let fired = self.dispatcher.scan(&self.evaluator, &self.reservoir);
        self.reservoir.clear_transitions();
        fired
    }
}

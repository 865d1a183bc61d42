//! `Accumulator`: reserves status writes and applies them in batched
//! series during [`Accumulator::flush`].

use crate::reservoir::{Reservoir, StatusAssignment};

/// How a reserved write behaves when its series collides with one
/// already applied this flush. `Follow` and `Yield` are
/// the recommended defaults; `Block` and `Nonblock` are sharper tools
/// with the warnings noted on their variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DelayPolicy {
    /// Stay in the same series as the write before this one; applied or
    /// delayed as a unit with it.
    Follow,
    /// Start a new series. If any status this series would touch has
    /// already transitioned this flush, only this series is delayed to
    /// the next flush.
    Yield,
    /// Start a new series. If any status this series would touch has
    /// already transitioned this flush, this series *and every queued
    /// write after it* are delayed to the next flush.
    Block,
    /// Start a new series that always applies this flush, even if a
    /// status it touches already transitioned — ignoring whatever was
    /// queued before it for that status.
    Nonblock,
}

/// One queued write: the assignment plus its series/delay policy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct QueuedWrite {
    assignment: StatusAssignment,
    delay: DelayPolicy,
}

/// Reserves [`StatusAssignment`]s and applies them to a [`Reservoir`]
/// in FIFO series order during [`Accumulator::flush`].
/// Writes within one series are guaranteed to apply in the order they
/// were queued; ordering across series is not guaranteed.
#[derive(Debug, Default)]
pub struct Accumulator {
    queued: Vec<QueuedWrite>,
    deferred: Vec<QueuedWrite>,
}

impl Accumulator {
    /// An empty accumulator, with a reserve hint for the queue.
    pub fn new(reserve: usize) -> Self {
        Self {
            queued: Vec::with_capacity(reserve),
            deferred: Vec::with_capacity(reserve),
        }
    }

    /// Number of writes currently queued (not yet flushed).
    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Queue one write.
    pub fn accumulate(&mut self, assignment: StatusAssignment, delay: DelayPolicy) {
        self.queued.push(QueuedWrite { assignment, delay });
    }

    /// Queue a batch as one series: the first item keeps `delay`, every
    /// item after it is forced to [`DelayPolicy::Follow`].
    pub fn accumulate_many<I>(&mut self, assignments: I, delay: DelayPolicy)
    where
        I: IntoIterator<Item = StatusAssignment>,
    {
        let mut delay = delay;
        for assignment in assignments {
            self.accumulate(assignment, delay);
            delay = DelayPolicy::Follow;
        }
    }

    /// Apply every series whose targets have not already transitioned
    /// this flush, draining the queue; whatever does not apply is kept
    /// for the next call.
    ///
    /// A write that fails (out-of-range, kind mismatch, missing
    /// target/rhs status) cancels the rest of its own series; later
    /// series are unaffected unless this one carried [`DelayPolicy::Block`].
    pub fn flush(&mut self, reservoir: &mut Reservoir) {
        let queue = std::mem::take(&mut self.queued);
        let mut index = 0;
        while index < queue.len() {
            let series_start = index;
            let nonblock = queue[series_start].delay == DelayPolicy::Nonblock;
            let mut should_apply = !nonblock;

            let mut end = series_start;
            loop {
                if should_apply && reservoir.find_transition(queue[end].assignment.target).is_true() {
                    should_apply = false;
                }
                end += 1;
                if end == queue.len() || queue[end].delay != DelayPolicy::Follow {
                    break;
                }
            }

            if nonblock || should_apply {
                for write in &queue[series_start..end] {
                    if !reservoir.assign_status(&write.assignment) {
                        tracing::debug!(status = write.assignment.target, "queued write failed, abandoning its series");
                        break;
                    }
                }
            } else {
                let block_end = if queue[series_start].delay == DelayPolicy::Block { queue.len() } else { end };
                self.deferred.extend_from_slice(&queue[series_start..block_end]);
                end = block_end;
            }

            index = end;
        }

        self.queued.clear();
        std::mem::swap(&mut self.queued, &mut self.deferred);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservoir::Rhs;
    use crate::value::{AssignOp, StatusValue};

    fn assign(target: u64, value: u64) -> StatusAssignment {
        StatusAssignment::new(target, AssignOp::Copy, Rhs::Value(StatusValue::Unsigned(value)))
    }

    #[test]
    fn follow_series_applies_in_queued_order() {
        let mut reservoir = Reservoir::new(2, 4);
        reservoir.register_status(1, 10, StatusValue::Unsigned(0), Some(8));
        reservoir.clear_transitions();

        let mut acc = Accumulator::new(4);
        acc.accumulate(assign(10, 1), DelayPolicy::Yield);
        acc.accumulate(assign(10, 2), DelayPolicy::Follow);
        acc.flush(&mut reservoir);

        assert_eq!(reservoir.find_status(10), StatusValue::Unsigned(2));
    }

    #[test]
    fn yield_defers_only_its_own_series_when_target_already_transitioned() {
        let mut reservoir = Reservoir::new(2, 4);
        reservoir.register_status(1, 10, StatusValue::Unsigned(0), Some(8));
        reservoir.register_status(1, 11, StatusValue::Unsigned(0), Some(8));
        reservoir.clear_transitions();
        // simulate status 10 having already changed earlier this tick
        reservoir.assign_status(&assign(10, 1));

        let mut acc = Accumulator::new(4);
        acc.accumulate(assign(10, 5), DelayPolicy::Yield);
        acc.accumulate(assign(11, 7), DelayPolicy::Yield);
        acc.flush(&mut reservoir);

        assert_eq!(reservoir.find_status(10), StatusValue::Unsigned(1));
        assert_eq!(reservoir.find_status(11), StatusValue::Unsigned(7));
        assert_eq!(acc.queued_count(), 1);

        reservoir.clear_transitions();
        acc.flush(&mut reservoir);
        assert_eq!(reservoir.find_status(10), StatusValue::Unsigned(5));
    }

    #[test]
    fn block_defers_every_later_series_too() {
        let mut reservoir = Reservoir::new(2, 4);
        reservoir.register_status(1, 10, StatusValue::Unsigned(0), Some(8));
        reservoir.register_status(1, 11, StatusValue::Unsigned(0), Some(8));

        let mut acc = Accumulator::new(4);
        acc.accumulate(assign(10, 5), DelayPolicy::Block);
        acc.accumulate(assign(11, 7), DelayPolicy::Yield);
        acc.flush(&mut reservoir);

        assert_eq!(reservoir.find_status(10), StatusValue::Unsigned(0));
        assert_eq!(reservoir.find_status(11), StatusValue::Unsigned(0));
        assert_eq!(acc.queued_count(), 2);
    }

    #[test]
    fn nonblock_applies_even_over_an_already_transitioned_target() {
        let mut reservoir = Reservoir::new(2, 4);
        reservoir.register_status(1, 10, StatusValue::Unsigned(0), Some(8));

        let mut acc = Accumulator::new(4);
        acc.accumulate(assign(10, 9), DelayPolicy::Nonblock);
        acc.flush(&mut reservoir);

        assert_eq!(reservoir.find_status(10), StatusValue::Unsigned(9));
        assert_eq!(acc.queued_count(), 0);
    }

    #[test]
    fn a_failing_write_abandons_the_rest_of_its_own_series() {
        let mut reservoir = Reservoir::new(2, 4);
        reservoir.register_status(1, 10, StatusValue::Unsigned(10), Some(4));
        reservoir.clear_transitions();

        let mut acc = Accumulator::new(4);
        // 20 doesn't fit in a 4-bit field (max 15): this write fails.
        acc.accumulate(assign(10, 20), DelayPolicy::Yield);
        acc.accumulate(assign(10, 3), DelayPolicy::Follow);
        acc.flush(&mut reservoir);

        assert_eq!(reservoir.find_status(10), StatusValue::Unsigned(10));
    }
}

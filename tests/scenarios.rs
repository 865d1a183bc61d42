use rule_reservoir::prelude::*;

fn driver() -> Driver<FnvKeyHasher> {
    Driver::new(DriverCapacity::default(), FnvKeyHasher)
}

#[test]
fn nonblock_write_applies_within_one_tick() {
    let mut driver = driver();
    let b = driver.hasher().hash_name("b");

    driver.register_status(1, b, StatusValue::Bool(false), None);
    driver.tick(); // settle the registration-time transition

    driver.accumulate(
        StatusAssignment::new(b, AssignOp::Copy, Rhs::Value(StatusValue::Bool(true))),
        DelayPolicy::Nonblock,
    );
    driver.tick();

    assert_eq!(driver.reservoir().find_status(b), StatusValue::Bool(true));
}

#[test]
fn registration_overflowing_declared_width_fails_and_leaves_status_empty() {
    let mut driver = driver();
    let h = driver.hasher().hash_name("h");

    // 130 doesn't fit a 7-bit field (max 127).
    assert!(!driver.register_status(1, h, StatusValue::Unsigned(130), Some(7)));
    assert_eq!(driver.reservoir().find_status(h), StatusValue::Empty);
}

#[test]
fn overflowing_follow_up_write_abandons_the_rest_of_its_series() {
    let mut driver = driver();
    let x = driver.hasher().hash_name("x");

    driver.register_status(1, x, StatusValue::Unsigned(10), Some(5));
    driver.tick();

    driver.accumulate(
        StatusAssignment::new(x, AssignOp::Add, Rhs::Value(StatusValue::Unsigned(5))),
        DelayPolicy::Nonblock,
    );
    driver.accumulate(
        StatusAssignment::new(x, AssignOp::Add, Rhs::Value(StatusValue::Unsigned(20))),
        DelayPolicy::Follow,
    );
    driver.tick();

    // first add (10+5=15) applies, second (15+20=35) overflows a 5-bit field (max 31)
    assert_eq!(driver.reservoir().find_status(x), StatusValue::Unsigned(15));
    assert_eq!(driver.reservoir().find_transition(x), Ternary::True);
}

#[test]
fn yield_series_targeting_an_already_transitioned_status_defers_to_next_tick() {
    let mut driver = driver();
    let y = driver.hasher().hash_name("y");

    driver.register_status(1, y, StatusValue::Unsigned(0), Some(8));
    driver.tick();

    driver.accumulate(
        StatusAssignment::new(y, AssignOp::Copy, Rhs::Value(StatusValue::Unsigned(1))),
        DelayPolicy::Nonblock,
    );
    driver.accumulate(
        StatusAssignment::new(y, AssignOp::Copy, Rhs::Value(StatusValue::Unsigned(2))),
        DelayPolicy::Yield,
    );
    driver.tick();
    assert_eq!(driver.reservoir().find_status(y), StatusValue::Unsigned(1));

    driver.tick();
    assert_eq!(driver.reservoir().find_status(y), StatusValue::Unsigned(2));
}

#[test]
fn expression_fires_handler_exactly_once_on_true_to_false_edge() {
    let mut driver = driver();
    let x = driver.hasher().hash_name("x");
    let b = driver.hasher().hash_name("b");
    let e1 = driver.hasher().hash_name("E1");

    driver.register_status(1, x, StatusValue::Unsigned(10), Some(8));
    driver.register_status(1, b, StatusValue::Bool(true), None);
    driver.register_expression(
        e1,
        ExpressionChunk::new(
            Logic::And,
            vec![
                Element::StatusComparison {
                    comparison: StatusComparison::new(x, ComparisonOp::Ge, Rhs::Value(StatusValue::Unsigned(10))),
                    invert: false,
                },
                Element::StatusComparison {
                    comparison: StatusComparison::new(b, ComparisonOp::Eq, Rhs::Value(StatusValue::Bool(true))),
                    invert: false,
                },
            ],
        ),
    );
    driver.register_handler(e1, ConditionMask::single(Ternary::True, Ternary::False), 0);

    // settle registration transitions and seed the dispatcher's "previous" cache at True
    driver.tick();
    assert_eq!(driver.evaluator().evaluate(e1, driver.reservoir()), Ternary::True);

    driver.accumulate(
        StatusAssignment::new(b, AssignOp::Copy, Rhs::Value(StatusValue::Bool(false))),
        DelayPolicy::Nonblock,
    );
    let fired = driver.tick();

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].expression(), e1);
    assert_eq!(driver.evaluator().evaluate(e1, driver.reservoir()), Ternary::False);

    // already False last tick; a second tick with no writes doesn't re-fire
    assert!(driver.tick().is_empty());
}

#[test]
fn float_status_round_trips_within_epsilon_and_rejects_inexact_integer_coercion() {
    let mut driver = driver();
    let f = driver.hasher().hash_name("f");
    let i = driver.hasher().hash_name("i");

    driver.register_status(1, f, StatusValue::Float(0.1), None);
    match driver.reservoir().find_status(f) {
        StatusValue::Float(v) => assert!((v - 0.1).abs() <= 4.0 * f64::EPSILON),
        other => panic!("expected a float status, got {other:?}"),
    }

    assert!(!driver.register_status(1, i, StatusValue::Float(0.1), Some(32)));
    assert_eq!(driver.reservoir().find_status(i), StatusValue::Empty);
}

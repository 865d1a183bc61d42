//! `StatusValue`: a tagged, copy-by-value game-state scalar, and the
//! three-valued logic ([`Ternary`]) the rest of the engine is built on.

use crate::consts::EPSILON_MAGNITUDE;
use crate::error::CoercionError;
use crate::format::{Format, Kind};

/// Three-valued logic result. `Unknown` signals a kind mismatch, an
/// empty operand, or (for expressions) an unavailable dependency —
/// never coerced down to `false` (strict Kleene logic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ternary {
    /// Definitely false.
    False,
    /// Definitely true.
    True,
    /// Could not be determined.
    Unknown,
}

impl Ternary {
    /// Lift a plain boolean into `Ternary`.
    pub const fn from_bool(b: bool) -> Ternary {
        if b {
            Ternary::True
        } else {
            Ternary::False
        }
    }

    /// `true` only for [`Ternary::True`].
    pub const fn is_true(&self) -> bool {
        matches!(self, Ternary::True)
    }

    /// `true` only for [`Ternary::False`].
    pub const fn is_false(&self) -> bool {
        matches!(self, Ternary::False)
    }

    /// `true` only for [`Ternary::Unknown`].
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Ternary::Unknown)
    }
}

/// Result of comparing two values' magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    /// Left operand is smaller.
    Less,
    /// Operands are equal (within the float epsilon band for floats).
    Equal,
    /// Left operand is larger.
    Greater,
    /// The operands could not be ordered (kind mismatch, empty operand,
    /// or an inexact cross-kind coercion).
    Failed,
}

/// A relational operator over two [`StatusValue`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl ComparisonOp {
    fn matches(&self, order: Order) -> Option<bool> {
        use Order::*;
        match (self, order) {
            (_, Failed) => None,
            (ComparisonOp::Eq, o) => Some(o == Equal),
            (ComparisonOp::Ne, o) => Some(o != Equal),
            (ComparisonOp::Lt, o) => Some(o == Less),
            (ComparisonOp::Le, o) => Some(o == Less || o == Equal),
            (ComparisonOp::Gt, o) => Some(o == Greater),
            (ComparisonOp::Ge, o) => Some(o == Greater || o == Equal),
        }
    }
}

/// An in-place assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssignOp {
    /// Replace the current value with the operand.
    Copy,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`
    Div,
    /// `%=`
    Mod,
    /// `|=`
    Or,
    /// `^=`
    Xor,
    /// `&=`
    And,
}

/// A discriminated, copy-by-value game-state scalar.
///
/// `Empty` carries no payload. Values never outlive the tick they were
/// read or computed in; they are not a handle into the [`crate::reservoir::Reservoir`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusValue {
    /// No payload.
    Empty,
    /// A single bit.
    Bool(bool),
    /// Zero-extended unsigned integer.
    Unsigned(u64),
    /// Sign-extended signed integer.
    Signed(i64),
    /// IEEE-754 double.
    Float(f64),
}

impl StatusValue {
    /// This value's [`Kind`].
    pub const fn kind(&self) -> Kind {
        match self {
            StatusValue::Empty => Kind::Empty,
            StatusValue::Bool(_) => Kind::Bool,
            StatusValue::Unsigned(_) => Kind::Unsigned,
            StatusValue::Signed(_) => Kind::Signed,
            StatusValue::Float(_) => Kind::Float,
        }
    }

    /// `true` for [`StatusValue::Empty`].
    pub const fn is_empty(&self) -> bool {
        matches!(self, StatusValue::Empty)
    }

    /// Truncate/zero-or-sign-extend this value into `width` bits and
    /// return the raw bit pattern used for packed storage. Callers must
    /// have already validated the value fits (via [`StatusValue::coerce`]);
    /// this never fails.
    pub(crate) fn to_bits(&self, width: u8) -> u64 {
        let mask = field_mask(width);
        match self {
            StatusValue::Empty => 0,
            StatusValue::Bool(b) => *b as u64,
            StatusValue::Unsigned(u) => u & mask,
            StatusValue::Signed(s) => (*s as u64) & mask,
            StatusValue::Float(f) => f.to_bits(),
        }
    }

    /// Reconstruct a value from raw storage bits, dispatching on `format`.
    pub(crate) fn from_bits(format: Format, bits: u64) -> StatusValue {
        match format.kind() {
            Kind::Empty => StatusValue::Empty,
            Kind::Bool => StatusValue::Bool(bits != 0),
            Kind::Unsigned => StatusValue::Unsigned(bits & field_mask(format.width())),
            Kind::Signed => {
                let width = format.width();
                let masked = bits & field_mask(width);
                StatusValue::Signed(sign_extend(masked, width))
            }
            Kind::Float => StatusValue::Float(f64::from_bits(bits)),
        }
    }

    /// Coerce this value into `format`, validating range/exactness.
    /// Returns the value in the representation
    /// (`Unsigned`/`Signed`/`Float`/`Bool`/`Empty`) that `format` names.
    pub fn coerce(&self, format: Format) -> Result<StatusValue, CoercionError> {
        match format.kind() {
            Kind::Empty => {
                if self.is_empty() {
                    Ok(StatusValue::Empty)
                } else {
                    Err(CoercionError::KindMismatch)
                }
            }
            Kind::Bool => match self {
                StatusValue::Bool(b) => Ok(StatusValue::Bool(*b)),
                _ => Err(CoercionError::KindMismatch),
            },
            Kind::Float => {
                let source = self.numeric_as_f64().ok_or(CoercionError::KindMismatch)?;
                if !round_trips_to_f64(self, source) {
                    return Err(CoercionError::Inexact);
                }
                Ok(StatusValue::Float(source))
            }
            Kind::Signed => {
                let value = self.numeric_as_i64()?;
                let width = format.width();
                let (min, max) = signed_range(width);
                if value < min || value > max {
                    Err(CoercionError::OutOfRange)
                } else {
                    Ok(StatusValue::Signed(value))
                }
            }
            Kind::Unsigned => {
                let value = self.numeric_as_u64()?;
                let max = field_mask(format.width());
                if value > max {
                    Err(CoercionError::OutOfRange)
                } else {
                    Ok(StatusValue::Unsigned(value))
                }
            }
        }
    }

    fn numeric_as_f64(&self) -> Option<f64> {
        match self {
            StatusValue::Unsigned(u) => Some(*u as f64),
            StatusValue::Signed(s) => Some(*s as f64),
            StatusValue::Float(f) => Some(*f),
            StatusValue::Bool(_) | StatusValue::Empty => None,
        }
    }

    fn numeric_as_i64(&self) -> Result<i64, CoercionError> {
        match self {
            StatusValue::Signed(s) => Ok(*s),
            StatusValue::Unsigned(u) => i64::try_from(*u).map_err(|_| CoercionError::OutOfRange),
            StatusValue::Float(f) => float_to_integral(*f).and_then(|f| {
                if f < i64::MIN as f64 || f > i64::MAX as f64 {
                    Err(CoercionError::OutOfRange)
                } else {
                    Ok(f as i64)
                }
            }),
            StatusValue::Bool(_) | StatusValue::Empty => Err(CoercionError::KindMismatch),
        }
    }

    fn numeric_as_u64(&self) -> Result<u64, CoercionError> {
        match self {
            StatusValue::Unsigned(u) => Ok(*u),
            StatusValue::Signed(s) => {
                if *s < 0 {
                    Err(CoercionError::OutOfRange)
                } else {
                    Ok(*s as u64)
                }
            }
            StatusValue::Float(f) => float_to_integral(*f).and_then(|f| {
                if f < 0.0 || f > u64::MAX as f64 {
                    Err(CoercionError::OutOfRange)
                } else {
                    Ok(f as u64)
                }
            }),
            StatusValue::Bool(_) | StatusValue::Empty => Err(CoercionError::KindMismatch),
        }
    }

    /// Combine `self` (the current value) with `rhs` under `op`,
    /// producing the value to be coerced into the target field's
    /// format. Does not itself enforce a field's declared width —
    /// callers run the result back through [`StatusValue::coerce`].
    pub fn assign(&self, op: AssignOp, rhs: &StatusValue) -> Result<StatusValue, CoercionError> {
        if op == AssignOp::Copy {
            return Ok(*rhs);
        }

        match (self, rhs) {
            (StatusValue::Bool(a), StatusValue::Bool(b)) => match op {
                AssignOp::Or => Ok(StatusValue::Bool(*a || *b)),
                AssignOp::Xor => Ok(StatusValue::Bool(*a ^ *b)),
                AssignOp::And => Ok(StatusValue::Bool(*a && *b)),
                _ => Err(CoercionError::KindMismatch),
            },
            (StatusValue::Unsigned(a), StatusValue::Unsigned(b)) => integer_op_u64(op, *a, *b),
            (StatusValue::Signed(a), StatusValue::Signed(b)) => integer_op_i64(op, *a, *b),
            (StatusValue::Float(a), StatusValue::Float(b)) => float_op(op, *a, *b),
            _ => Err(CoercionError::KindMismatch),
        }
    }

    /// Order `self` against `rhs`.
    pub fn pairwise_order(&self, rhs: &StatusValue) -> Order {
        match (self, rhs) {
            (StatusValue::Empty, _) | (_, StatusValue::Empty) => Order::Failed,
            (StatusValue::Bool(a), StatusValue::Bool(b)) => order_of(*a as u8, *b as u8),
            (StatusValue::Unsigned(a), StatusValue::Unsigned(b)) => order_of(*a, *b),
            (StatusValue::Signed(a), StatusValue::Signed(b)) => order_of(*a, *b),
            (StatusValue::Float(a), StatusValue::Float(b)) => float_order(*a, *b),
            (StatusValue::Bool(_), _) | (_, StatusValue::Bool(_)) => Order::Failed,
            _ => match (self.coerce(Format::FLOAT), rhs.coerce(Format::FLOAT)) {
                (Ok(StatusValue::Float(a)), Ok(StatusValue::Float(b))) => float_order(a, b),
                _ => Order::Failed,
            },
        }
    }

    /// Evaluate a [`ComparisonOp`] against `rhs`, producing [`Ternary::Unknown`]
    /// on any kind mismatch, empty operand, or inexact coercion.
    pub fn compare(&self, op: ComparisonOp, rhs: &StatusValue) -> Ternary {
        match op.matches(self.pairwise_order(rhs)) {
            Some(b) => Ternary::from_bool(b),
            None => Ternary::Unknown,
        }
    }
}

fn field_mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn sign_extend(masked: u64, width: u8) -> i64 {
    if width >= 64 {
        return masked as i64;
    }
    let shift = 64 - width;
    ((masked << shift) as i64) >> shift
}

fn signed_range(width: u8) -> (i64, i64) {
    if width >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        let max = (1i64 << (width - 1)) - 1;
        (-max - 1, max)
    }
}

fn order_of<T: PartialOrd>(a: T, b: T) -> Order {
    if a < b {
        Order::Less
    } else if a > b {
        Order::Greater
    } else {
        Order::Equal
    }
}

fn float_order(a: f64, b: f64) -> Order {
    let band = EPSILON_MAGNITUDE * f64::EPSILON;
    let diff = a - b;
    if diff.abs() <= band {
        Order::Equal
    } else if diff < 0.0 {
        Order::Less
    } else {
        Order::Greater
    }
}

/// `true` if `f` has no fractional part, i.e. it can in principle be
/// represented as an integer.
fn float_to_integral(f: f64) -> Result<f64, CoercionError> {
    if f.fract() == 0.0 && f.is_finite() {
        Ok(f)
    } else {
        Err(CoercionError::Inexact)
    }
}

/// `true` if converting `source` to `f64` and back recovers it within
/// `4 * f64::EPSILON`.
fn round_trips_to_f64(source: &StatusValue, as_float: f64) -> bool {
    let band = EPSILON_MAGNITUDE * f64::EPSILON;
    match source {
        StatusValue::Unsigned(u) => {
            let back = as_float as u64;
            let diff = (back as f64 - *u as f64).abs();
            diff <= band * (*u as f64).abs().max(1.0)
        }
        StatusValue::Signed(s) => {
            let back = as_float as i64;
            let diff = (back as f64 - *s as f64).abs();
            diff <= band * (*s as f64).abs().max(1.0)
        }
        StatusValue::Float(_) => true,
        StatusValue::Bool(_) | StatusValue::Empty => false,
    }
}

fn integer_op_u64(op: AssignOp, a: u64, b: u64) -> Result<StatusValue, CoercionError> {
    let result = match op {
        AssignOp::Add => a.checked_add(b).ok_or(CoercionError::OutOfRange)?,
        AssignOp::Sub => a.checked_sub(b).ok_or(CoercionError::OutOfRange)?,
        AssignOp::Mul => a.checked_mul(b).ok_or(CoercionError::OutOfRange)?,
        AssignOp::Div => {
            if b == 0 {
                return Err(CoercionError::DivideByZero);
            }
            a / b
        }
        AssignOp::Mod => {
            if b == 0 {
                return Err(CoercionError::DivideByZero);
            }
            a % b
        }
        AssignOp::Or => a | b,
        AssignOp::Xor => a ^ b,
        AssignOp::And => a & b,
        AssignOp::Copy => unreachable!(),
    };
    Ok(StatusValue::Unsigned(result))
}

fn integer_op_i64(op: AssignOp, a: i64, b: i64) -> Result<StatusValue, CoercionError> {
    let result = match op {
        AssignOp::Add => a.checked_add(b).ok_or(CoercionError::OutOfRange)?,
        AssignOp::Sub => a.checked_sub(b).ok_or(CoercionError::OutOfRange)?,
        AssignOp::Mul => a.checked_mul(b).ok_or(CoercionError::OutOfRange)?,
        AssignOp::Div => {
            if b == 0 {
                return Err(CoercionError::DivideByZero);
            }
            a.checked_div(b).ok_or(CoercionError::OutOfRange)?
        }
        AssignOp::Mod => {
            if b == 0 {
                return Err(CoercionError::DivideByZero);
            }
            a.checked_rem(b).ok_or(CoercionError::OutOfRange)?
        }
        AssignOp::Or => a | b,
        AssignOp::Xor => a ^ b,
        AssignOp::And => a & b,
        AssignOp::Copy => unreachable!(),
    };
    Ok(StatusValue::Signed(result))
}

fn float_op(op: AssignOp, a: f64, b: f64) -> Result<StatusValue, CoercionError> {
    let result = match op {
        AssignOp::Add => a + b,
        AssignOp::Sub => a - b,
        AssignOp::Mul => a * b,
        AssignOp::Div => {
            if b == 0.0 {
                return Err(CoercionError::DivideByZero);
            }
            a / b
        }
        AssignOp::Or | AssignOp::Xor | AssignOp::And | AssignOp::Mod => {
            return Err(CoercionError::KindMismatch)
        }
        AssignOp::Copy => unreachable!(),
    };
    Ok(StatusValue::Float(result))
}

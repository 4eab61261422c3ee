//! Byte-serial integer arithmetic over cells of mixed width and signedness.
//!
//! Every operator walks the result bytes from least to most significant, combining the operand
//! bytes at each position with a running carry. Operands narrower than the result read as zero
//! in the upper bytes, whatever their signedness.
//!
//! This is not general multi-precision arithmetic. The carry scheme is only exact for addition;
//! subtraction with borrows, multiplication across bytes and division by anything wider than one
//! byte give results that differ from native integer arithmetic.

use std::fmt::Display;

use crate::{
    errors::{Error, Result},
    types::{BasicType, TypeDescriptor},
    value::ValueCell,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.verb())
    }
}

impl Operator {
    const fn verb(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    fn combine(self, byte: u64, left: u64, right: u64, carry: u64) -> Result<u64> {
        Ok(match self {
            Self::Add => left.wrapping_add(right).wrapping_add(carry),
            Self::Subtract => left.wrapping_sub(right).wrapping_sub(carry),
            Self::Multiply => left.wrapping_mul(right).wrapping_add(carry),
            Self::Divide => {
                if right == 0 {
                    return Err(Error::DivisionByZero { byte });
                }

                (left / right).wrapping_add(carry)
            }
        })
    }
}

/// # Errors
/// Returns `UnsupportedOperand` unless both cells are non-floating scalars.
pub fn add(left: &ValueCell, right: &ValueCell) -> Result<ValueCell> {
    apply(Operator::Add, left, right)
}

/// # Errors
/// Returns `UnsupportedOperand` unless both cells are non-floating scalars.
pub fn subtract(left: &ValueCell, right: &ValueCell) -> Result<ValueCell> {
    apply(Operator::Subtract, left, right)
}

/// # Errors
/// Returns `UnsupportedOperand` unless both cells are non-floating scalars.
pub fn multiply(left: &ValueCell, right: &ValueCell) -> Result<ValueCell> {
    apply(Operator::Multiply, left, right)
}

/// Divides byte by byte. Because the divisor is also consumed byte by byte, any divisor with a
/// zero byte below the result width, which includes every divisor narrower than the dividend,
/// fails with `DivisionByZero`, and multi-byte divisors do not give true quotients.
///
/// # Errors
/// Returns `UnsupportedOperand` unless both cells are non-floating scalars, and
/// `DivisionByZero` if any divisor byte within the result width is zero.
pub fn divide(left: &ValueCell, right: &ValueCell) -> Result<ValueCell> {
    apply(Operator::Divide, left, right)
}

/// # Errors
/// Returns `UnsupportedOperand` unless both cells are non-floating scalars.
pub fn apply(operator: Operator, left: &ValueCell, right: &ValueCell) -> Result<ValueCell> {
    let result_type = result_type(operator, left, right)?;
    let width = result_type.width();
    let mut bytes = vec![];
    let mut carry = 0;

    for byte in 0..width {
        let combined = operator.combine(
            byte,
            byte_at(left, byte),
            byte_at(right, byte),
            carry,
        )?;

        bytes.push(combined.to_le_bytes()[0]);
        carry = combined >> 8;
    }

    ValueCell::from_raw(
        TypeDescriptor::basic(result_type.is_signed(), width),
        &bytes,
    )
}

/// Width and signedness of the result of `operator` applied to the two cells.
///
/// The result is as wide as the wider operand. It is signed if either operand is signed, unless
/// the operands differ in sign and the unsigned one is already as wide as the result.
///
/// # Errors
/// Returns `UnsupportedOperand` unless both cells are non-floating scalars.
pub fn result_type(operator: Operator, left: &ValueCell, right: &ValueCell) -> Result<BasicType> {
    let unsupported = || Error::UnsupportedOperand {
        operation: operator.verb(),
        left: left.r#type().clone(),
        right: right.r#type().clone(),
    };

    let (Some(left_type), Some(right_type)) = (integer_operand(left), integer_operand(right))
    else {
        return Err(unsupported());
    };

    let width = left_type.width().max(right_type.width());
    let mut signed = left_type.is_signed() || right_type.is_signed();

    if left_type.is_signed() != right_type.is_signed() {
        let unsigned = if left_type.is_signed() {
            right_type
        } else {
            left_type
        };

        if unsigned.width() == width {
            signed = false;
        }
    }

    Ok(BasicType::integer(signed, width))
}

fn integer_operand(cell: &ValueCell) -> Option<&BasicType> {
    if cell.r#type().is_pointer() {
        return None;
    }

    cell.r#type()
        .as_basic()
        .filter(|basic| !basic.is_floating())
}

fn byte_at(cell: &ValueCell, index: u64) -> u64 {
    usize::try_from(index)
        .ok()
        .and_then(|index| cell.bytes().get(index))
        .copied()
        .map_or(0, u64::from)
}

//! # Postfix Evaluator
//!
//! Evaluates the postfix programs used by CFI rules and `STACK WIN` program
//! strings.
//!
//! ## Tokens
//!
//! - Numbers: decimal or `0x`-prefixed hex, optionally negated with a leading `-`
//! - Binary operators: `+ - * / %` and `@` (align: `a & (0 - b)`)
//! - `^`: replace the top of the stack with the pointer-sized value it addresses
//! - `=`: assign the top value to the identifier below it (programs only)
//! - Anything else is an identifier, looked up in the register dictionary
//!
//! All arithmetic wraps at the evaluator's pointer width.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::error::{EvaluationError, ResolverError, ResolverResult};
use crate::types::Address;

/// Register name (or `.cfa`/`.ra`/`$`-variable) to value.
pub type RegisterValueMap = HashMap<String, u64>;

/// Minimal memory accessor required for dereferencing.
///
/// Implementations should return an error for unreadable addresses instead of
/// panicking.
pub trait MemoryAccess
{
    /// Read a little-endian 64-bit value.
    fn read_u64(&self, address: Address) -> ResolverResult<u64>;

    /// Read a little-endian 32-bit value.
    ///
    /// The default truncates an 8-byte read, which fails where fewer than 8
    /// bytes are mapped.
    #[allow(clippy::cast_possible_truncation)]
    fn read_u32(&self, address: Address) -> ResolverResult<u32>
    {
        self.read_u64(address).map(|value| value as u32)
    }
}

/// A `MemoryAccess` with nothing mapped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemory;

impl MemoryAccess for NoMemory
{
    fn read_u64(&self, address: Address) -> ResolverResult<u64>
    {
        Err(ResolverError::MemoryRead(address))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointerWidth
{
    Bits32,
    Bits64,
}

impl PointerWidth
{
    fn mask(self) -> u64
    {
        match self {
            PointerWidth::Bits32 => 0xffff_ffff,
            PointerWidth::Bits64 => u64::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operand<'e>
{
    Value(u64),
    Identifier(&'e str),
}

type EvalStack<'e> = SmallVec<[Operand<'e>; 8]>;

/// Postfix expression evaluator over a register dictionary and target memory.
pub struct PostfixEvaluator<'m, M: MemoryAccess + ?Sized>
{
    memory: &'m M,
    width: PointerWidth,
}

impl<'m, M: MemoryAccess + ?Sized> PostfixEvaluator<'m, M>
{
    /// A 64-bit evaluator.
    pub fn new(memory: &'m M) -> Self
    {
        Self {
            memory,
            width: PointerWidth::Bits64,
        }
    }

    /// An evaluator whose values are `pointer_size` bytes wide.
    ///
    /// A size of 4 selects 32-bit arithmetic and dereferences; any other size
    /// selects 64-bit.
    pub fn with_pointer_size(memory: &'m M, pointer_size: usize) -> Self
    {
        let width = if pointer_size == 4 {
            PointerWidth::Bits32
        } else {
            PointerWidth::Bits64
        };
        Self { memory, width }
    }

    /// Pointer size in bytes.
    pub fn pointer_size(&self) -> usize
    {
        match self.width {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }

    /// Run a program of assignments such as `$eip $esp ^ = $esp $esp 4 + =`,
    /// storing each assigned value in `dictionary`.
    ///
    /// ## Errors
    ///
    /// Any evaluation failure, or values left over once the program ends.
    /// Assignments made before the failure remain in `dictionary`.
    pub fn evaluate(&self, program: &str, dictionary: &mut RegisterValueMap) -> Result<(), EvaluationError>
    {
        let mut stack = EvalStack::new();
        for token in program.split_ascii_whitespace() {
            if token == "=" {
                let value = self.pop_value(&mut stack, token, dictionary)?;
                let Some(Operand::Identifier(target)) = stack.pop() else {
                    return Err(EvaluationError::BadAssignment);
                };
                dictionary.insert(target.to_string(), value);
            } else {
                self.step(&mut stack, token, dictionary)?;
            }
        }

        if stack.is_empty() {
            Ok(())
        } else {
            Err(EvaluationError::UnbalancedStack(stack.len()))
        }
    }

    /// Evaluate a single expression such as `$rsp 8 +` to its value.
    ///
    /// ## Errors
    ///
    /// Any evaluation failure, an `=` token, or anything other than exactly
    /// one value left at the end.
    pub fn evaluate_for_value(&self, expression: &str, dictionary: &RegisterValueMap) -> Result<u64, EvaluationError>
    {
        let mut stack = EvalStack::new();
        for token in expression.split_ascii_whitespace() {
            if token == "=" {
                return Err(EvaluationError::UnexpectedAssignment);
            }
            self.step(&mut stack, token, dictionary)?;
        }

        if stack.len() != 1 {
            return Err(EvaluationError::UnbalancedStack(stack.len()));
        }
        self.pop_value(&mut stack, expression, dictionary)
    }

    fn step<'e>(
        &self,
        stack: &mut EvalStack<'e>,
        token: &'e str,
        dictionary: &RegisterValueMap,
    ) -> Result<(), EvaluationError>
    {
        match token {
            "+" | "-" | "*" | "/" | "%" | "@" => {
                let b = self.pop_value(stack, token, dictionary)?;
                let a = self.pop_value(stack, token, dictionary)?;
                let result = apply_binary(token, a, b)?;
                stack.push(Operand::Value(result & self.width.mask()));
            }
            "^" => {
                let address = Address::new(self.pop_value(stack, token, dictionary)?);
                let value = self.dereference(address)?;
                stack.push(Operand::Value(value));
            }
            _ => stack.push(parse_operand(token)?),
        }
        Ok(())
    }

    fn pop_value(
        &self,
        stack: &mut EvalStack<'_>,
        token: &str,
        dictionary: &RegisterValueMap,
    ) -> Result<u64, EvaluationError>
    {
        match stack.pop() {
            Some(Operand::Value(value)) => Ok(value & self.width.mask()),
            Some(Operand::Identifier(name)) => dictionary
                .get(name)
                .map(|value| value & self.width.mask())
                .ok_or_else(|| EvaluationError::UnknownIdentifier(name.to_string())),
            None => Err(EvaluationError::StackUnderflow(token.to_string())),
        }
    }

    fn dereference(&self, address: Address) -> Result<u64, EvaluationError>
    {
        let value = match self.width {
            PointerWidth::Bits32 => self.memory.read_u32(address).map(u64::from),
            PointerWidth::Bits64 => self.memory.read_u64(address),
        };
        value.map_err(|_| EvaluationError::MemoryRead(address))
    }
}

fn apply_binary(operator: &str, a: u64, b: u64) -> Result<u64, EvaluationError>
{
    let value = match operator {
        "+" => a.wrapping_add(b),
        "-" => a.wrapping_sub(b),
        "*" => a.wrapping_mul(b),
        "/" => a.checked_div(b).ok_or(EvaluationError::DivideByZero)?,
        "%" => a.checked_rem(b).ok_or(EvaluationError::DivideByZero)?,
        "@" => a & b.wrapping_neg(),
        _ => return Err(EvaluationError::InvalidToken(operator.to_string())),
    };
    Ok(value)
}

fn parse_operand(token: &str) -> Result<Operand<'_>, EvaluationError>
{
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) if !rest.is_empty() => (true, rest),
        _ => (false, token),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse::<u64>().ok()
    } else {
        None
    };

    match parsed {
        Some(value) if negative => Ok(Operand::Value(value.wrapping_neg())),
        Some(value) => Ok(Operand::Value(value)),
        // A leading digit or sign means a malformed number, not a register.
        None if negative || digits.starts_with(|c: char| c.is_ascii_digit()) => {
            Err(EvaluationError::InvalidToken(token.to_string()))
        }
        None => Ok(Operand::Identifier(token)),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_operand_numbers()
    {
        assert!(matches!(parse_operand("16"), Ok(Operand::Value(16))));
        assert!(matches!(parse_operand("0x10"), Ok(Operand::Value(16))));
        assert!(matches!(parse_operand("-1"), Ok(Operand::Value(u64::MAX))));
    }

    #[test]
    fn test_parse_operand_identifiers()
    {
        assert!(matches!(parse_operand("$esp"), Ok(Operand::Identifier("$esp"))));
        assert!(matches!(parse_operand(".cfa"), Ok(Operand::Identifier(".cfa"))));
        assert!(matches!(parse_operand("sp"), Ok(Operand::Identifier("sp"))));
    }

    #[test]
    fn test_parse_operand_rejects_malformed_numbers()
    {
        assert!(matches!(parse_operand("12abc"), Err(EvaluationError::InvalidToken(_))));
        assert!(matches!(parse_operand("-x"), Err(EvaluationError::InvalidToken(_))));
    }

    #[test]
    fn test_align_operator()
    {
        assert_eq!(apply_binary("@", 0x1237, 0x10), Ok(0x1230));
    }
}

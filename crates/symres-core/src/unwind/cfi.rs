//! # CFI Rule Sets
//!
//! Textual call-frame information, as found in `STACK CFI` records.
//!
//! A rule set is a sequence of `name: expression` pairs:
//!
//! ```text
//! .cfa: $rsp 16 + .ra: .cfa 8 - ^ $rbp: .cfa 16 - ^
//! ```
//!
//! `.cfa` is the canonical frame address, `.ra` the return address, and every
//! other name is a register of the caller. Expressions are postfix programs
//! (see [`PostfixEvaluator`]) that may refer to the callee's registers and,
//! except for the CFA rule itself, to `.cfa`.

use std::collections::BTreeMap;
use std::fmt;

use super::postfix::{MemoryAccess, PostfixEvaluator, RegisterValueMap};
use crate::error::{CfiRuleError, EvaluationError};

/// Receives the rules of a rule set as they are parsed.
pub trait CfiParseHandler
{
    /// The rule for `.cfa`.
    fn cfa_rule(&mut self, expression: &str);

    /// The rule for `.ra`.
    fn ra_rule(&mut self, expression: &str);

    /// The rule for any other register.
    fn register_rule(&mut self, name: &str, expression: &str);
}

/// Splits a rule set into `(name, expression)` pairs.
///
/// Each pair is handed to the handler as soon as it is complete, so a rule
/// set that fails halfway has already delivered its earlier rules.
pub struct CfiRuleParser<'h>
{
    handler: &'h mut dyn CfiParseHandler,
}

impl<'h> CfiRuleParser<'h>
{
    pub fn new(handler: &'h mut dyn CfiParseHandler) -> Self
    {
        Self { handler }
    }

    /// Parse `rule_set`, reporting every rule to the handler.
    ///
    /// ## Errors
    ///
    /// - `Empty`: the rule set has no tokens
    /// - `EmptyName`: a bare `:` token
    /// - `MissingName`: an expression token before the first name
    /// - `MissingExpression`: a name followed directly by another name or the end
    pub fn parse(&mut self, rule_set: &str) -> Result<(), CfiRuleError>
    {
        let mut pending: Option<(&str, Vec<&str>)> = None;

        for token in rule_set.split_ascii_whitespace() {
            if let Some(name) = token.strip_suffix(':') {
                if name.is_empty() {
                    return Err(CfiRuleError::EmptyName);
                }
                if let Some((previous, expression)) = pending.take() {
                    self.report(previous, &expression)?;
                }
                pending = Some((name, Vec::new()));
            } else {
                match pending.as_mut() {
                    Some((_, expression)) => expression.push(token),
                    None => return Err(CfiRuleError::MissingName),
                }
            }
        }

        match pending {
            Some((name, expression)) => self.report(name, &expression),
            None => Err(CfiRuleError::Empty),
        }
    }

    fn report(&mut self, name: &str, expression: &[&str]) -> Result<(), CfiRuleError>
    {
        if expression.is_empty() {
            return Err(CfiRuleError::MissingExpression(name.to_string()));
        }
        let expression = expression.join(" ");
        match name {
            ".cfa" => self.handler.cfa_rule(&expression),
            ".ra" => self.handler.ra_rule(&expression),
            _ => self.handler.register_rule(name, &expression),
        }
        Ok(())
    }
}

/// Recovery rules for the caller's registers at one instruction.
///
/// Rules accumulate: a later rule for the same name replaces the earlier one,
/// which is how `STACK CFI` delta records update the initial rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfiFrameInfo
{
    cfa_rule: Option<String>,
    ra_rule: Option<String>,
    register_rules: BTreeMap<String, String>,
}

impl CfiFrameInfo
{
    pub fn set_cfa_rule(&mut self, expression: impl Into<String>)
    {
        self.cfa_rule = Some(expression.into());
    }

    pub fn set_ra_rule(&mut self, expression: impl Into<String>)
    {
        self.ra_rule = Some(expression.into());
    }

    pub fn set_register_rule(&mut self, name: impl Into<String>, expression: impl Into<String>)
    {
        self.register_rules.insert(name.into(), expression.into());
    }

    pub fn cfa_rule(&self) -> Option<&str>
    {
        self.cfa_rule.as_deref()
    }

    pub fn ra_rule(&self) -> Option<&str>
    {
        self.ra_rule.as_deref()
    }

    pub fn register_rule(&self, name: &str) -> Option<&str>
    {
        self.register_rules.get(name).map(String::as_str)
    }

    /// Register rules other than `.cfa` and `.ra`, ordered by register name.
    pub fn register_rules(&self) -> impl Iterator<Item = (&str, &str)>
    {
        self.register_rules
            .iter()
            .map(|(name, expression)| (name.as_str(), expression.as_str()))
    }

    /// Returns `true` if no rule of any kind is present.
    pub fn is_empty(&self) -> bool
    {
        self.cfa_rule.is_none() && self.ra_rule.is_none() && self.register_rules.is_empty()
    }

    /// Recover the caller's registers from the callee's, with 64-bit values.
    ///
    /// See [`find_caller_regs_with`](Self::find_caller_regs_with).
    ///
    /// ## Errors
    ///
    /// Any rule failing to evaluate, or a missing `.cfa`/`.ra` rule.
    pub fn find_caller_regs<M: MemoryAccess + ?Sized>(
        &self,
        registers: &RegisterValueMap,
        memory: &M,
    ) -> Result<RegisterValueMap, EvaluationError>
    {
        self.find_caller_regs_with(registers, &PostfixEvaluator::new(memory))
    }

    /// Recover the caller's registers from the callee's.
    ///
    /// The CFA rule is evaluated first, against the callee's registers only.
    /// The RA rule and every register rule are then evaluated with `.cfa`
    /// bound as well. The result holds one entry per register rule, plus
    /// `.cfa` and `.ra`; registers without a rule are not carried over.
    ///
    /// ## Errors
    ///
    /// Any rule failing to evaluate, or a missing `.cfa`/`.ra` rule.
    pub fn find_caller_regs_with<M: MemoryAccess + ?Sized>(
        &self,
        registers: &RegisterValueMap,
        evaluator: &PostfixEvaluator<'_, M>,
    ) -> Result<RegisterValueMap, EvaluationError>
    {
        let cfa_rule = self.cfa_rule.as_deref().ok_or(EvaluationError::MissingRule(".cfa"))?;
        let ra_rule = self.ra_rule.as_deref().ok_or(EvaluationError::MissingRule(".ra"))?;

        let cfa = evaluator.evaluate_for_value(cfa_rule, registers)?;

        let mut working = registers.clone();
        working.insert(".cfa".to_string(), cfa);
        let ra = evaluator.evaluate_for_value(ra_rule, &working)?;

        let mut caller = RegisterValueMap::with_capacity(self.register_rules.len() + 2);
        for (name, expression) in &self.register_rules {
            let value = evaluator.evaluate_for_value(expression, &working)?;
            caller.insert(name.clone(), value);
        }
        caller.insert(".cfa".to_string(), cfa);
        caller.insert(".ra".to_string(), ra);
        Ok(caller)
    }
}

impl fmt::Display for CfiFrameInfo
{
    /// Serialises back into rule-set syntax.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let rules = self
            .cfa_rule
            .as_deref()
            .map(|expression| (".cfa", expression))
            .into_iter()
            .chain(self.ra_rule.as_deref().map(|expression| (".ra", expression)))
            .chain(self.register_rules());

        for (index, (name, expression)) in rules.enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}: {expression}")?;
        }
        Ok(())
    }
}

/// Applies parsed rules to a [`CfiFrameInfo`].
pub struct CfiFrameInfoParseHandler<'a>
{
    frame_info: &'a mut CfiFrameInfo,
}

impl<'a> CfiFrameInfoParseHandler<'a>
{
    pub fn new(frame_info: &'a mut CfiFrameInfo) -> Self
    {
        Self { frame_info }
    }
}

impl CfiParseHandler for CfiFrameInfoParseHandler<'_>
{
    fn cfa_rule(&mut self, expression: &str)
    {
        self.frame_info.set_cfa_rule(expression);
    }

    fn ra_rule(&mut self, expression: &str)
    {
        self.frame_info.set_ra_rule(expression);
    }

    fn register_rule(&mut self, name: &str, expression: &str)
    {
        self.frame_info.set_register_rule(name, expression);
    }
}

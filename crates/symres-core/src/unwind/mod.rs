//! # Unwind Support
//!
//! CFI rule sets and the postfix evaluator that gives them meaning.
//!
//! Symbol modules hand out [`CfiFrameInfo`] for an instruction; a stack walker
//! then calls [`CfiFrameInfo::find_caller_regs`] with the callee's registers
//! and a [`MemoryAccess`] over the crashed process to recover the caller's
//! registers.

pub mod cfi;
pub mod postfix;

pub use cfi::{CfiFrameInfo, CfiFrameInfoParseHandler, CfiParseHandler, CfiRuleParser};
pub use postfix::{MemoryAccess, NoMemory, PostfixEvaluator, RegisterValueMap};

//! # Symbol Modules
//!
//! The contract between the registry and a concrete symbol-table backend.
//!
//! The registry never looks inside a module: it creates one through a
//! [`ModuleFactory`], feeds it a buffer once, and afterwards forwards per-frame
//! queries to it. Backends are free to pick their own table layout and string
//! storage strategy.

use tracing::debug;

use super::buffer::SymbolBuffer;
use crate::error::{CfiRuleError, SymbolParseError};
use crate::types::{StackFrame, WindowsFrameInfo};
use crate::unwind::{CfiFrameInfo, CfiFrameInfoParseHandler, CfiRuleParser};

/// Everything needed to resolve addresses for one binary module.
pub trait SymbolModule
{
    /// Name the module was created with (the module's code file).
    fn name(&self) -> &str;

    /// Parse symbol data into this module's tables.
    ///
    /// Called at most once per module. The buffer is borrowed: ownership stays
    /// with the registry, which releases it after this call returns. A backend
    /// that wants the data to outlive the call must copy it, or be paired with
    /// hooks that retain the buffer.
    ///
    /// ## Errors
    ///
    /// Returns `SymbolParseError` if the data is malformed. The registry then
    /// discards this module.
    fn load_map_from_memory(&mut self, buffer: &SymbolBuffer) -> Result<(), SymbolParseError>;

    /// Fill the frame's function and source-line fields for its instruction.
    ///
    /// Leaves the frame untouched when nothing covers the address.
    fn look_up_address(&self, frame: &mut StackFrame);

    /// Windows frame layout for the frame's instruction, if known.
    fn find_windows_frame_info(&self, frame: &StackFrame) -> Option<WindowsFrameInfo>;

    /// CFI unwind rules in effect at the frame's instruction, if known.
    fn find_cfi_frame_info(&self, frame: &StackFrame) -> Option<CfiFrameInfo>;

    /// Parse a textual CFI rule set into `frame_info`.
    ///
    /// Rules are applied as they are parsed, so on failure `frame_info` may
    /// already hold some of the set's rules.
    ///
    /// ## Errors
    ///
    /// Passes through the rule grammar's verdict unchanged.
    fn parse_cfi_rule_set(&self, rule_set: &str, frame_info: &mut CfiFrameInfo) -> Result<(), CfiRuleError>
    {
        let mut handler = CfiFrameInfoParseHandler::new(frame_info);
        let result = CfiRuleParser::new(&mut handler).parse(rule_set);
        if let Err(err) = &result {
            debug!(module = self.name(), "rejected CFI rule set {rule_set:?}: {err}");
        }
        result
    }
}

/// Builds empty modules for the registry.
pub trait ModuleFactory
{
    /// Create an empty module named after the given code file.
    fn create_module(&self, name: &str) -> Box<dyn SymbolModule>;
}

impl<F> ModuleFactory for F
where
    F: Fn(&str) -> Box<dyn SymbolModule>,
{
    fn create_module(&self, name: &str) -> Box<dyn SymbolModule>
    {
        self(name)
    }
}

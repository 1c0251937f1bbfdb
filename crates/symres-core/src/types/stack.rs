//! Stack frame types.

use std::sync::Arc;

use super::module::CodeModule;
use super::symbols::SymbolName;
use super::Address;

/// How the stack walker arrived at a frame.
///
/// Ordered from least to most trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum FrameTrust
{
    /// Unknown provenance.
    #[default]
    None,
    /// Found by scanning the stack for plausible return addresses.
    Scan,
    /// Scanning, seeded by CFI results.
    CfiScan,
    /// Recovered by following the frame-pointer chain.
    FramePointer,
    /// Recovered by evaluating call-frame information.
    Cfi,
    /// Supplied by an external stack walker.
    Prewalked,
    /// The innermost frame, taken directly from the thread context.
    Context,
}

/// One entry of a crashed thread's call stack.
///
/// The stack walker fills in `instruction`, `module` and `trust`; the resolver
/// fills in the function and source fields in place.
#[derive(Debug, Clone, Default)]
pub struct StackFrame
{
    /// Instruction address for this frame.
    pub instruction: Address,
    /// Module containing `instruction`, if any.
    pub module: Option<Arc<CodeModule>>,
    /// Function containing `instruction`.
    pub function_name: Option<SymbolName>,
    /// Absolute start address of that function.
    pub function_base: Option<Address>,
    /// Source file for `instruction`.
    pub source_file_name: Option<String>,
    /// Source line for `instruction`.
    pub source_line: Option<u32>,
    /// Absolute start address of the line record covering `instruction`.
    pub source_line_base: Option<Address>,
    /// Reliability indicator.
    pub trust: FrameTrust,
}

impl StackFrame
{
    /// A frame at `instruction` inside `module`.
    pub fn new(instruction: impl Into<Address>, module: Option<Arc<CodeModule>>) -> Self
    {
        Self {
            instruction: instruction.into(),
            module,
            ..Self::default()
        }
    }

    /// Instruction offset relative to the module base, if the frame has a module
    /// and the instruction does not lie below it.
    pub fn module_offset(&self) -> Option<u64>
    {
        let module = self.module.as_ref()?;
        self.instruction.offset_from(module.base_address())
    }

    /// Returns `true` once a function name has been attached.
    pub fn is_symbolicated(&self) -> bool
    {
        self.function_name.is_some()
    }
}

//! # symres-core
//!
//! Symbol-module registry and address resolution for crash processing.
//!
//! Given the modules loaded in a crashed process and one text symbol file per
//! module, this crate provides:
//! - Loading each module's symbols at most once, from disk or from memory
//! - Function, source file and line lookup for stack frames
//! - Windows frame layout (`STACK WIN`) and CFI unwind rules (`STACK CFI`)
//! - Evaluation of CFI rules to recover a caller's registers
//!
//! ## Memory Strategy
//!
//! Raw symbol buffers pass through [`symbols::LoadHooks`] on their way in and
//! out. The default frees every buffer right after parsing;
//! [`symbols::RetainedBufferHooks`] keeps them alive until unload.

pub mod error;
pub mod symbols;
pub mod types;
pub mod unwind;

// Re-export commonly used types
pub use error::{ResolverError, ResolverResult};
pub use symbols::{SourceLineResolver, SymbolModule};
pub use types::{Address, CodeModule, StackFrame};

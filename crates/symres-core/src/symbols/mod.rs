//! # Symbols
//!
//! Symbol-module registry, buffer handling and the text symbol-file backend.
//!
//! - [`SourceLineResolver`]: loads modules once, dispatches frame queries
//! - [`LoadHooks`]: memory strategy for raw symbol buffers
//! - [`SymbolModule`] / [`ModuleFactory`]: the backend contract
//! - [`BasicModule`]: backend for the line-oriented text format

mod basic;
mod buffer;
mod demangle;
mod hooks;
mod module;
mod range_map;
mod resolver;
mod table;

pub use basic::{BasicModule, BasicModuleFactory, ModuleHeader};
pub use buffer::{read_whole_file, SymbolBuffer};
pub use hooks::{DefaultLoadHooks, LoadHooks, RetainedBufferHooks};
pub use module::{ModuleFactory, SymbolModule};
pub use resolver::SourceLineResolver;
pub use table::ModuleTable;

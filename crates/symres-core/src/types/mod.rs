//! # Types
//!
//! Value types shared by the registry, the module backends and the unwinder:
//! addresses, module identities, stack frames and frame layout metadata.

pub mod address;
pub mod frame_info;
pub mod module;
pub mod stack;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use frame_info::{FrameInfoValidity, StackInfoType, WindowsFrameInfo};
pub use module::CodeModule;
pub use stack::{FrameTrust, StackFrame};
pub use symbols::{SymbolLanguage, SymbolName};

//! # Load Hooks
//!
//! Extension points around the raw-buffer-to-parsed-module transition.
//!
//! [`SourceLineResolver`](super::SourceLineResolver) calls these at fixed
//! points of every load, unload and teardown:
//!
//! 1. `store_data_before_load`: the buffer is in memory, nothing parsed yet
//! 2. `delete_data_after_load`: the load finished, successfully or not; the
//!    buffer is handed over by value and this is its single release point
//! 3. `delete_data_unload`: a module was unloaded (or an unload was requested
//!    for a module that was never loaded)
//! 4. `clear_local_memory`: the resolver is being dropped, after every module
//!    has been destroyed
//!
//! The defaults do nothing, so the buffer is freed as soon as the load
//! finishes. [`RetainedBufferHooks`] instead keeps each module's buffer alive
//! until that module is unloaded, for resolvers that keep the raw symbol data
//! around for their own bookkeeping.

use std::collections::HashMap;

use tracing::debug;

use super::buffer::SymbolBuffer;
use crate::types::CodeModule;

/// Memory strategy for symbol buffers.
///
/// Implementations are injected at construction time; every method has a no-op
/// default.
pub trait LoadHooks
{
    /// Inspect or transform the buffer before the module backend parses it.
    ///
    /// The buffer's nul terminator cannot be touched through the mutable view.
    fn store_data_before_load(&mut self, _module: &CodeModule, _buffer: &mut SymbolBuffer) {}

    /// Take over the buffer once the load attempt is over.
    ///
    /// Called exactly once per buffer, on success and on every failure path.
    /// `loaded` is `true` only when the module was registered by this attempt.
    /// The default drops the buffer.
    fn delete_data_after_load(&mut self, _module: &CodeModule, buffer: SymbolBuffer, _loaded: bool)
    {
        drop(buffer);
    }

    /// Release per-module bookkeeping created in `store_data_before_load`.
    fn delete_data_unload(&mut self, _module: &CodeModule) {}

    /// Release any remaining bookkeeping; called last during teardown.
    fn clear_local_memory(&mut self) {}
}

/// Frees every buffer right after its load attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoadHooks;

impl LoadHooks for DefaultLoadHooks {}

/// Keeps each module's symbol buffer alive until the module is unloaded or the
/// resolver is dropped.
#[derive(Debug, Default)]
pub struct RetainedBufferHooks
{
    buffers: HashMap<String, SymbolBuffer>,
}

impl RetainedBufferHooks
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Buffer retained for `code_file`, if any.
    pub fn buffer(&self, code_file: &str) -> Option<&SymbolBuffer>
    {
        self.buffers.get(code_file)
    }

    /// Number of buffers currently retained.
    pub fn len(&self) -> usize
    {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.buffers.is_empty()
    }

    /// Total bytes held, including terminators.
    pub fn retained_bytes(&self) -> usize
    {
        self.buffers.values().map(|buffer| buffer.as_bytes_with_nul().len()).sum()
    }
}

impl LoadHooks for RetainedBufferHooks
{
    fn delete_data_after_load(&mut self, module: &CodeModule, buffer: SymbolBuffer, loaded: bool)
    {
        // Failed and duplicate loads must not displace the buffer backing an
        // already loaded module.
        if !loaded {
            return;
        }
        debug!(module = module.code_file(), bytes = buffer.len(), "retaining symbol buffer");
        self.buffers.insert(module.code_file().to_string(), buffer);
    }

    fn delete_data_unload(&mut self, module: &CodeModule)
    {
        if self.buffers.remove(module.code_file()).is_some() {
            debug!(module = module.code_file(), "released symbol buffer");
        }
    }

    fn clear_local_memory(&mut self)
    {
        self.buffers.clear();
    }
}

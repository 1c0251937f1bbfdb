//! # Source Line Resolver
//!
//! Registry of loaded symbol modules and per-frame dispatch.
//!
//! The resolver owns one parsed [`SymbolModule`] per code file. Loading goes
//! through a fixed sequence:
//!
//! 1. Reject the load if the code file is already registered
//! 2. Produce an owned [`SymbolBuffer`] (read from disk or copied from memory)
//! 3. `store_data_before_load` hook
//! 4. Create an empty module through the [`ModuleFactory`] and let it parse the buffer
//! 5. Register the module if parsing succeeded, discard it otherwise
//! 6. `delete_data_after_load` hook, on every path
//!
//! Frame queries look the frame's module up by code file and forward to it. A
//! frame whose module is unknown simply gets no information.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use symres_core::symbols::SourceLineResolver;
//! use symres_core::types::{CodeModule, StackFrame};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let mut resolver = SourceLineResolver::basic();
//!     let module = Arc::new(CodeModule::new("app.exe", 0x400000, 0x10000));
//!
//!     resolver.load_module(&module, "/symbols/app.sym")?;
//!
//!     let mut frame = StackFrame::new(0x401234, Some(module));
//!     resolver.fill_source_line_info(&mut frame);
//!     if let Some(name) = &frame.function_name {
//!         println!("{name} at {:?}:{:?}", frame.source_file_name, frame.source_line);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Thread Safety
//!
//! The resolver is not thread-safe. Use one resolver per crash-processing job,
//! or serialize access externally.

use std::path::Path;

use tracing::{debug, info, trace, warn};

use super::basic::BasicModuleFactory;
use super::buffer::{read_whole_file, SymbolBuffer};
use super::hooks::{DefaultLoadHooks, LoadHooks};
use super::module::{ModuleFactory, SymbolModule};
use super::table::ModuleTable;
use crate::error::{ResolverError, ResolverResult};
use crate::types::{CodeModule, StackFrame, WindowsFrameInfo};
use crate::unwind::CfiFrameInfo;

/// Loaded-module registry and per-frame resolution dispatcher.
pub struct SourceLineResolver<H: LoadHooks = DefaultLoadHooks>
{
    modules: ModuleTable,
    /// `None` only while the resolver is being dropped
    factory: Option<Box<dyn ModuleFactory>>,
    hooks: H,
}

impl SourceLineResolver
{
    /// Create a resolver that frees each symbol buffer right after loading.
    pub fn new(factory: impl ModuleFactory + 'static) -> Self
    {
        Self::with_hooks(factory, DefaultLoadHooks)
    }

    /// Create a resolver backed by [`BasicModule`](super::BasicModule).
    #[must_use]
    pub fn basic() -> Self
    {
        Self::new(BasicModuleFactory)
    }
}

impl<H: LoadHooks> SourceLineResolver<H>
{
    /// Create a resolver with a custom buffer memory strategy.
    pub fn with_hooks(factory: impl ModuleFactory + 'static, hooks: H) -> Self
    {
        Self {
            modules: ModuleTable::new(),
            factory: Some(Box::new(factory)),
            hooks,
        }
    }

    /// The injected hooks.
    pub fn hooks(&self) -> &H
    {
        &self.hooks
    }

    /// Mutable access to the injected hooks.
    pub fn hooks_mut(&mut self) -> &mut H
    {
        &mut self.hooks
    }

    /// Load symbols for `module` from the symbol file at `path`.
    ///
    /// ## Errors
    ///
    /// - `ModuleAlreadyLoaded`: the code file is already registered; nothing is read
    /// - `SymbolFile`: the file could not be stat'd, opened or fully read
    /// - `Parse`: the module backend rejected the data
    ///
    /// The registry is unchanged on every error.
    pub fn load_module(&mut self, module: &CodeModule, path: impl AsRef<Path>) -> ResolverResult<()>
    {
        let path = path.as_ref();
        self.ensure_not_loaded(module)?;

        info!("Loading symbols for module {} from {}", module.code_file(), path.display());

        let mut buffer = read_whole_file(path)?;

        info!("Read symbol file {} succeeded", path.display());

        self.hooks.store_data_before_load(module, &mut buffer);
        self.load_module_using_buffer(module, buffer)
    }

    /// Load symbols for `module` from bytes already in memory.
    ///
    /// The bytes are copied into an owned, nul-terminated buffer; the caller's
    /// slice is not retained. Both buffer hooks fire exactly once per call, even
    /// when the module is already loaded.
    ///
    /// ## Errors
    ///
    /// Same as [`load_module`](Self::load_module), minus the file errors.
    pub fn load_module_from_buffer(&mut self, module: &CodeModule, bytes: &[u8]) -> ResolverResult<()>
    {
        let mut buffer = SymbolBuffer::from_bytes(bytes);
        self.hooks.store_data_before_load(module, &mut buffer);
        self.load_module_using_buffer(module, buffer)
    }

    /// Shared ingest path; hands the buffer to `delete_data_after_load` on every path.
    fn load_module_using_buffer(&mut self, module: &CodeModule, buffer: SymbolBuffer) -> ResolverResult<()>
    {
        let result = self.ingest(module, &buffer);
        self.hooks.delete_data_after_load(module, buffer, result.is_ok());
        result
    }

    fn ingest(&mut self, module: &CodeModule, buffer: &SymbolBuffer) -> ResolverResult<()>
    {
        self.ensure_not_loaded(module)?;

        let key = module.code_file();
        info!("Loading symbols for module {key} from buffer");

        let Some(factory) = self.factory.as_deref() else {
            unreachable!("module factory is only released on drop");
        };
        let mut parsed = factory.create_module(key);
        if let Err(source) = parsed.load_map_from_memory(buffer) {
            warn!("Symbols for module {key} rejected: {source}");
            return Err(ResolverError::Parse {
                module: key.to_string(),
                source,
            });
        }

        self.modules
            .insert(key, parsed)
            .map_err(|_| ResolverError::ModuleAlreadyLoaded(key.to_string()))
    }

    fn ensure_not_loaded(&self, module: &CodeModule) -> ResolverResult<()>
    {
        if self.modules.contains(module.code_file()) {
            info!("Symbols for module {} already loaded", module.code_file());
            return Err(ResolverError::ModuleAlreadyLoaded(module.code_file().to_string()));
        }
        Ok(())
    }

    /// Drop the symbols for `module`.
    ///
    /// `delete_data_unload` fires even if the module was never loaded.
    pub fn unload_module(&mut self, module: &CodeModule)
    {
        if self.modules.remove(module.code_file()).is_some() {
            info!("Unloaded symbols for module {}", module.code_file());
        }
        self.hooks.delete_data_unload(module);
    }

    /// Returns `true` if symbols for `module` are loaded.
    pub fn has_module(&self, module: &CodeModule) -> bool
    {
        self.modules.contains(module.code_file())
    }

    /// Number of loaded modules.
    pub fn module_count(&self) -> usize
    {
        self.modules.len()
    }

    /// Code files of every loaded module, in no particular order.
    pub fn loaded_modules(&self) -> impl Iterator<Item = &str>
    {
        self.modules.keys()
    }

    fn module_for_frame(&self, frame: &StackFrame) -> Option<&dyn SymbolModule>
    {
        let code_module = frame.module.as_ref()?;
        let module = self.modules.get(code_module.code_file());
        if module.is_none() {
            trace!("no symbols loaded for {}", code_module.code_file());
        }
        module
    }

    /// Attach function and source-line information to `frame`.
    ///
    /// A frame without a module, or whose module is not loaded, is left as-is.
    pub fn fill_source_line_info(&self, frame: &mut StackFrame)
    {
        if let Some(module) = self.module_for_frame(frame) {
            module.look_up_address(frame);
            debug!(
                "resolved {} to {}",
                frame.instruction,
                frame.function_name.as_ref().map_or("<unknown>", |name| name.display_name())
            );
        }
    }

    /// Windows frame layout at the frame's instruction.
    ///
    /// `None` both when the module is unknown and when it has no such data.
    pub fn find_windows_frame_info(&self, frame: &StackFrame) -> Option<WindowsFrameInfo>
    {
        self.module_for_frame(frame)?.find_windows_frame_info(frame)
    }

    /// CFI unwind rules at the frame's instruction.
    ///
    /// `None` both when the module is unknown and when it has no such data.
    pub fn find_cfi_frame_info(&self, frame: &StackFrame) -> Option<CfiFrameInfo>
    {
        self.module_for_frame(frame)?.find_cfi_frame_info(frame)
    }
}

impl<H: LoadHooks> Drop for SourceLineResolver<H>
{
    fn drop(&mut self)
    {
        self.modules.clear();
        drop(self.factory.take());
        self.hooks.clear_local_memory();
    }
}

impl<H: LoadHooks + std::fmt::Debug> std::fmt::Debug for SourceLineResolver<H>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("SourceLineResolver")
            .field("modules", &self.modules)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

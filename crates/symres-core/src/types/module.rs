//! Code module identity.

use std::fmt;

use super::Address;

/// One binary module (executable or shared library) loaded in the crashed process.
///
/// The registry keys loaded symbols by [`CodeModule::code_file`]; the other fields
/// are carried along for the module backend and for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeModule
{
    code_file: String,
    base_address: Address,
    size: u64,
    debug_file: Option<String>,
    debug_identifier: Option<String>,
    version: Option<String>,
}

impl CodeModule
{
    /// Describe a module mapped at `base_address` spanning `size` bytes.
    pub fn new(code_file: impl Into<String>, base_address: impl Into<Address>, size: u64) -> Self
    {
        Self {
            code_file: code_file.into(),
            base_address: base_address.into(),
            size,
            debug_file: None,
            debug_identifier: None,
            version: None,
        }
    }

    /// Attach the debug file name and identifier (e.g. PDB name and GUID+age).
    #[must_use]
    pub fn with_debug_info(mut self, debug_file: impl Into<String>, debug_identifier: impl Into<String>) -> Self
    {
        self.debug_file = Some(debug_file.into());
        self.debug_identifier = Some(debug_identifier.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self
    {
        self.version = Some(version.into());
        self
    }

    /// Path or name of the module's code file. This is the registry key.
    pub fn code_file(&self) -> &str
    {
        &self.code_file
    }

    pub fn base_address(&self) -> Address
    {
        self.base_address
    }

    pub fn size(&self) -> u64
    {
        self.size
    }

    pub fn debug_file(&self) -> Option<&str>
    {
        self.debug_file.as_deref()
    }

    pub fn debug_identifier(&self) -> Option<&str>
    {
        self.debug_identifier.as_deref()
    }

    pub fn version(&self) -> Option<&str>
    {
        self.version.as_deref()
    }
}

impl fmt::Display for CodeModule
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} @ {}", self.code_file, self.base_address)
    }
}

//! Loaded-module table.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::module::SymbolModule;

/// Map from code-file name to the parsed module that owns its symbols.
///
/// A key appears at most once. [`ModuleTable::insert`] refuses to replace an
/// existing entry instead of overwriting it.
#[derive(Default)]
pub struct ModuleTable
{
    modules: HashMap<String, Box<dyn SymbolModule>>,
}

impl ModuleTable
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Insert `module` under `key`.
    ///
    /// Returns the module back if the key is already taken; the existing entry
    /// is left untouched.
    pub fn insert(&mut self, key: &str, module: Box<dyn SymbolModule>) -> Result<(), Box<dyn SymbolModule>>
    {
        match self.modules.entry(key.to_string()) {
            Entry::Occupied(_) => Err(module),
            Entry::Vacant(slot) => {
                slot.insert(module);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&dyn SymbolModule>
    {
        self.modules.get(key).map(|module| &**module)
    }

    pub fn contains(&self, key: &str) -> bool
    {
        self.modules.contains_key(key)
    }

    /// Remove and return the module stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Box<dyn SymbolModule>>
    {
        self.modules.remove(key)
    }

    pub fn len(&self) -> usize
    {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }

    /// Code-file names of every loaded module, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str>
    {
        self.modules.keys().map(String::as_str)
    }

    /// Destroy every module.
    pub fn clear(&mut self)
    {
        self.modules.clear();
    }
}

impl std::fmt::Debug for ModuleTable
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_set().entries(self.modules.keys()).finish()
    }
}

//! Symbol demangling utilities.
//!
//! Symbol files usually carry names that were demangled when the file was
//! produced, but Rust symbols (and some `PUBLIC` records) can still be in their
//! mangled form. Those are demangled with `rustc_demangle`; everything else is
//! classified by shape.

use rustc_demangle::try_demangle;

use crate::types::{SymbolLanguage, SymbolName};

/// Create a `SymbolName` from a name as it appears in a symbol file.
///
/// The raw name is always kept. A demangled form is attached only when the raw
/// name is a mangled Rust symbol.
pub(crate) fn make_symbol_name(raw: String) -> SymbolName
{
    let demangled = try_demangle(&raw).ok().map(|d| format!("{d:#}"));
    let language = if demangled.is_some() {
        SymbolLanguage::Rust
    } else if raw.starts_with("_Z") || raw.contains("::") || raw.contains('(') {
        SymbolLanguage::Cpp
    } else if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@') {
        SymbolLanguage::C
    } else {
        SymbolLanguage::Unknown
    };

    SymbolName::new(raw, demangled, language)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_rust_symbol_is_demangled()
    {
        let name = make_symbol_name("_ZN4core9panicking5panic17h0123456789abcdefE".to_string());
        assert_eq!(name.language(), SymbolLanguage::Rust);
        assert_eq!(name.display_name(), "core::panicking::panic");
    }

    #[test]
    fn test_demangled_cpp_name_is_kept()
    {
        let name = make_symbol_name("Foo::Bar(int)".to_string());
        assert_eq!(name.language(), SymbolLanguage::Cpp);
        assert_eq!(name.demangled(), None);
        assert_eq!(name.display_name(), "Foo::Bar(int)");
    }

    #[test]
    fn test_plain_c_name()
    {
        let name = make_symbol_name("_memcpy".to_string());
        assert_eq!(name.language(), SymbolLanguage::C);
        assert_eq!(name.raw(), "_memcpy");
    }
}

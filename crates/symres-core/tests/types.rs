//! Tests for shared value types

use std::sync::Arc;

use symres_core::types::{
    Address, CodeModule, FrameInfoValidity, FrameTrust, StackFrame, StackInfoType, SymbolLanguage, SymbolName,
    WindowsFrameInfo,
};

#[test]
fn test_address_conversions()
{
    let addr = Address::from(0x40_1000);
    let value: u64 = addr.into();
    assert_eq!(value, 0x40_1000);
    assert_eq!(addr.value(), 0x40_1000);
    assert_eq!(Address::default(), Address::ZERO);
}

#[test]
fn test_address_display()
{
    assert_eq!(Address::new(0x1234).to_string(), "0x0000000000001234");
}

#[test]
fn test_address_arithmetic()
{
    let addr = Address::new(0x1000);
    assert_eq!(addr + 0x10, Address::new(0x1010));
    assert_eq!(addr - 0x10, Address::new(0xff0));
    assert_eq!(Address::ZERO - 1, Address::new(u64::MAX));
    assert_eq!(addr.checked_sub(0x2000), None);
    assert_eq!(addr.offset_from(Address::new(0x800)), Some(0x800));
}

#[test]
fn test_code_module_accessors()
{
    let module = CodeModule::new("app.exe", 0x40_0000_u64, 0x2000)
        .with_debug_info("app.pdb", "0123456789ABCDEF1")
        .with_version("1.2.3.4");

    assert_eq!(module.code_file(), "app.exe");
    assert_eq!(module.base_address(), Address::new(0x40_0000));
    assert_eq!(module.size(), 0x2000);
    assert_eq!(module.debug_file(), Some("app.pdb"));
    assert_eq!(module.debug_identifier(), Some("0123456789ABCDEF1"));
    assert_eq!(module.version(), Some("1.2.3.4"));
}

#[test]
fn test_stack_frame_defaults()
{
    let frame = StackFrame::default();
    assert_eq!(frame.instruction, Address::ZERO);
    assert!(frame.module.is_none());
    assert!(!frame.is_symbolicated());
    assert_eq!(frame.trust, FrameTrust::None);
    assert_eq!(frame.module_offset(), None);
}

#[test]
fn test_stack_frame_module_offset()
{
    let module = Arc::new(CodeModule::new("lib.so", 0x7f00_0000_u64, 0x1000));
    let frame = StackFrame::new(0x7f00_0123_u64, Some(Arc::clone(&module)));
    assert_eq!(frame.module_offset(), Some(0x123));

    let below = StackFrame::new(0x10_u64, Some(module));
    assert_eq!(below.module_offset(), None);
}

#[test]
fn test_frame_trust_ordering()
{
    assert!(FrameTrust::Context > FrameTrust::Cfi);
    assert!(FrameTrust::Cfi > FrameTrust::FramePointer);
    assert!(FrameTrust::Scan > FrameTrust::None);
}

#[test]
fn test_symbol_name_display()
{
    let name = SymbolName::new(
        "_ZN3foo3bar17h0123456789abcdefE".to_string(),
        Some("foo::bar".to_string()),
        SymbolLanguage::Rust,
    );
    assert_eq!(name.to_string(), "foo::bar");
    assert_eq!(name.raw(), "_ZN3foo3bar17h0123456789abcdefE");

    let plain = SymbolName::new("main".to_string(), None, SymbolLanguage::C);
    assert_eq!(plain.display_name(), "main");
    assert_eq!(SymbolLanguage::Cpp.to_string(), "c++");
}

#[test]
fn test_stack_info_type_from_raw()
{
    assert_eq!(StackInfoType::from_raw(0), StackInfoType::Fpo);
    assert_eq!(StackInfoType::from_raw(4), StackInfoType::FrameData);
    assert_eq!(StackInfoType::from_raw(9), StackInfoType::Unknown);
}

#[test]
fn test_windows_frame_info_parameter_size_only()
{
    let info = WindowsFrameInfo::with_parameter_size(12);
    assert_eq!(info.valid, FrameInfoValidity::ParameterSize);
    assert_eq!(info.parameter_size, 12);
    assert!(!info.is_complete());
    assert!(info.program_string.is_none());
}

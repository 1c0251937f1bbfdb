//! Windows stack-frame layout metadata.
//!
//! Produced from `STACK WIN` records (or, as a fallback, from the parameter size
//! of the enclosing function) and consumed by x86 stack walkers.

/// Kind of frame data a `STACK WIN` record describes.
///
/// The numeric values match the record's `<type>` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackInfoType
{
    Fpo,
    Trap,
    Tss,
    Standard,
    FrameData,
    Unknown,
}

impl StackInfoType
{
    /// Map the numeric record type to a variant.
    pub fn from_raw(raw: u32) -> Self
    {
        match raw {
            0 => StackInfoType::Fpo,
            1 => StackInfoType::Trap,
            2 => StackInfoType::Tss,
            3 => StackInfoType::Standard,
            4 => StackInfoType::FrameData,
            _ => StackInfoType::Unknown,
        }
    }
}

/// Which fields of a [`WindowsFrameInfo`] carry real data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameInfoValidity
{
    #[default]
    None,
    /// Only `parameter_size` is known (derived from a `FUNC` or `PUBLIC` record).
    ParameterSize,
    /// Every field came from a `STACK WIN` record.
    All,
}

/// Frame layout for one address range on Windows x86.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsFrameInfo
{
    pub kind: StackInfoType,
    pub valid: FrameInfoValidity,
    pub prologue_size: u32,
    pub epilogue_size: u32,
    pub parameter_size: u32,
    pub saved_register_size: u32,
    pub local_size: u32,
    pub max_stack_size: u32,
    /// Set for FPO frames that use `ebp` as a general purpose register.
    pub allocates_base_pointer: bool,
    /// Postfix program recovering the caller's registers (FRAME_DATA only).
    pub program_string: Option<String>,
}

impl WindowsFrameInfo
{
    /// Frame info carrying only the size of the function's stack parameters.
    pub fn with_parameter_size(parameter_size: u32) -> Self
    {
        Self {
            kind: StackInfoType::Unknown,
            valid: FrameInfoValidity::ParameterSize,
            prologue_size: 0,
            epilogue_size: 0,
            parameter_size,
            saved_register_size: 0,
            local_size: 0,
            max_stack_size: 0,
            allocates_base_pointer: false,
            program_string: None,
        }
    }

    pub fn is_complete(&self) -> bool
    {
        self.valid == FrameInfoValidity::All
    }
}

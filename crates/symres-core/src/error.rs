//! # Error Types
//!
//! Error handling for symbol loading, CFI rule parsing and postfix evaluation.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! None of these errors are fatal to crash processing. A failed load leaves the
//! registry untouched, and a frame whose module could not be loaded simply has
//! no source information.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Address;

/// Main error type for registry operations
///
/// ## Error Categories
///
/// 1. **Invariant errors**: ModuleAlreadyLoaded
/// 2. **I/O errors**: SymbolFile
/// 3. **Data errors**: Parse (malformed symbol data rejected by the module backend)
/// 4. **Memory errors**: MemoryRead (raised by `MemoryAccess` implementations)
#[derive(Error, Debug)]
pub enum ResolverError
{
    /// A module with the same code file is already present in the registry.
    ///
    /// Loading never replaces existing data; unload the module first.
    #[error("Symbols for module {0} already loaded")]
    ModuleAlreadyLoaded(String),

    /// The symbol file could not be read into memory.
    #[error(transparent)]
    SymbolFile(#[from] SymbolFileError),

    /// The module backend rejected the symbol data.
    #[error("Failed to load symbols for module {module}: {source}")]
    Parse
    {
        /// Code file of the module being loaded
        module: String,
        /// What the backend did not accept
        #[source]
        source: SymbolParseError,
    },

    /// Target memory could not be read at the given address.
    #[error("Unable to read memory at {0}")]
    MemoryRead(Address),
}

/// Failures while slurping a symbol file into memory.
///
/// `code` carries the raw OS error number when the platform reported one.
#[derive(Error, Debug)]
pub enum SymbolFileError
{
    /// `stat` on the path failed (missing file, permissions, ...).
    #[error("Could not stat {}, error {}: {source}", .path.display(), display_code(.code))]
    Stat
    {
        path: PathBuf,
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    /// The file exists but could not be opened for reading.
    #[error("Could not open {}, error {}: {source}", .path.display(), display_code(.code))]
    Open
    {
        path: PathBuf,
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    /// Reading the file contents failed part way through.
    #[error("Could not slurp {}, error {}: {source}", .path.display(), display_code(.code))]
    Read
    {
        path: PathBuf,
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    /// Fewer bytes were read than `stat` reported.
    #[error("Could not slurp {}: read {actual} of {expected} bytes", .path.display())]
    ShortRead
    {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

impl SymbolFileError
{
    /// Path of the symbol file that failed.
    pub fn path(&self) -> &std::path::Path
    {
        match self {
            SymbolFileError::Stat { path, .. }
            | SymbolFileError::Open { path, .. }
            | SymbolFileError::Read { path, .. }
            | SymbolFileError::ShortRead { path, .. } => path,
        }
    }

    /// Raw OS error number, if one was reported.
    pub fn os_code(&self) -> Option<i32>
    {
        match self {
            SymbolFileError::Stat { code, .. } | SymbolFileError::Open { code, .. } | SymbolFileError::Read { code, .. } => {
                *code
            }
            SymbolFileError::ShortRead { .. } => None,
        }
    }
}

fn display_code(code: &Option<i32>) -> String
{
    code.map_or_else(|| "unknown".to_string(), |code| code.to_string())
}

/// Malformed symbol data.
///
/// `line` is 1-based and points at the first record the backend could not accept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct SymbolParseError
{
    pub line: usize,
    pub reason: String,
}

impl SymbolParseError
{
    pub fn new(line: usize, reason: impl Into<String>) -> Self
    {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Rejections from the CFI rule-set grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CfiRuleError
{
    /// The rule set contained no rules at all.
    #[error("empty CFI rule set")]
    Empty,

    /// A lone `:` token.
    #[error("CFI register name is empty")]
    EmptyName,

    /// Expression tokens appeared before any `name:` token.
    #[error("CFI expression has no register name")]
    MissingName,

    /// A register name was not followed by any expression.
    #[error("CFI rule for {0} has no expression")]
    MissingExpression(String),
}

/// Failures while evaluating a postfix expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError
{
    /// An operator needed more operands than the stack held.
    #[error("stack underflow at token {0:?}")]
    StackUnderflow(String),

    /// An identifier had no value in the dictionary.
    #[error("unknown identifier {0}")]
    UnknownIdentifier(String),

    #[error("division by zero")]
    DivideByZero,

    /// A token that is neither an operator, a number nor an identifier.
    #[error("invalid token {0:?}")]
    InvalidToken(String),

    /// Dereferencing target memory failed.
    #[error("unable to read memory at {0}")]
    MemoryRead(Address),

    /// The expression did not leave exactly one value on the stack.
    #[error("expression left {0} values on the stack")]
    UnbalancedStack(usize),

    /// `.cfa` or `.ra` has no rule, so the frame cannot be unwound.
    #[error("no {0} rule in effect")]
    MissingRule(&'static str),

    /// An `=` appeared where only a value was expected.
    #[error("assignment not allowed in value expression")]
    UnexpectedAssignment,

    /// The left-hand side of `=` was not an identifier.
    #[error("assignment target is not an identifier")]
    BadAssignment,
}

/// Convenience type alias for `Result<T, ResolverError>`
///
/// ```rust
/// use symres_core::error::ResolverResult;
/// fn foo() -> ResolverResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type ResolverResult<T> = std::result::Result<T, ResolverError>;

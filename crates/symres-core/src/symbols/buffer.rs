//! # Symbol Buffers
//!
//! Owned, nul-terminated copies of symbol data.
//!
//! Every load goes through a [`SymbolBuffer`]: either slurped from disk by
//! [`read_whole_file`] or copied from caller-supplied bytes with
//! [`SymbolBuffer::from_bytes`]. The buffer is always one byte longer than its
//! content and ends in `\0`, so text scanners have a hard stop even when the
//! content itself contains nul bytes.
//!
//! Ownership moves through the load path exactly once: the registry hands the
//! buffer to the after-load hook, which either drops it (default) or keeps it.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tracing::{error, info};

use crate::error::SymbolFileError;

/// Owned symbol data with a guaranteed trailing nul byte.
#[derive(Clone, PartialEq, Eq)]
pub struct SymbolBuffer
{
    data: Box<[u8]>,
}

impl SymbolBuffer
{
    /// Copy `bytes` into a new buffer and terminate it.
    ///
    /// The caller's slice is never retained. Embedded nul bytes are copied as-is.
    ///
    /// ```rust
    /// use symres_core::symbols::SymbolBuffer;
    ///
    /// let buffer = SymbolBuffer::from_bytes(b"MODULE");
    /// assert_eq!(buffer.len(), 6);
    /// assert_eq!(buffer.as_bytes_with_nul(), b"MODULE\0");
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Self
    {
        let mut data = Vec::with_capacity(bytes.len() + 1);
        data.extend_from_slice(bytes);
        Self::terminate(data)
    }

    fn terminate(mut data: Vec<u8>) -> Self
    {
        data.push(0);
        Self {
            data: data.into_boxed_slice(),
        }
    }

    /// Length of the content, excluding the terminator.
    pub fn len(&self) -> usize
    {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    /// The content, excluding the terminator.
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.data[..self.len()]
    }

    /// Mutable view of the content. The terminator is not reachable through it.
    pub fn as_bytes_mut(&mut self) -> &mut [u8]
    {
        let len = self.len();
        &mut self.data[..len]
    }

    /// The whole allocation, including the trailing nul.
    pub fn as_bytes_with_nul(&self) -> &[u8]
    {
        &self.data
    }

    /// The content up to (not including) the first nul byte.
    ///
    /// This is what a nul-terminated text scanner sees.
    pub fn text(&self) -> &[u8]
    {
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.len());
        &self.data[..end]
    }
}

impl std::fmt::Debug for SymbolBuffer
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("SymbolBuffer").field("len", &self.len()).finish()
    }
}

/// Read a symbol file in its entirety into a new [`SymbolBuffer`].
///
/// The file size is taken from `stat`; reading fewer bytes than that is an
/// error. The file handle is closed on every exit path.
///
/// ## Errors
///
/// - `Stat`: the path cannot be stat'd (typically it does not exist)
/// - `Open`: the file cannot be opened
/// - `Read`: reading failed part way through
/// - `ShortRead`: fewer bytes arrived than the reported size
pub fn read_whole_file(path: impl AsRef<Path>) -> Result<SymbolBuffer, SymbolFileError>
{
    let path = path.as_ref();

    let metadata = fs::metadata(path).map_err(|source| {
        report(SymbolFileError::Stat {
            path: path.to_path_buf(),
            code: source.raw_os_error(),
            source,
        })
    })?;

    info!("Opening {}", path.display());

    let file = File::open(path).map_err(|source| {
        report(SymbolFileError::Open {
            path: path.to_path_buf(),
            code: source.raw_os_error(),
            source,
        })
    })?;

    read_sized(file, metadata.len(), path).map_err(report)
}

/// Read exactly `expected` bytes from `reader`.
fn read_sized<R: Read>(reader: R, expected: u64, path: &Path) -> Result<SymbolBuffer, SymbolFileError>
{
    let capacity = usize::try_from(expected)
        .ok()
        .and_then(|len| len.checked_add(1))
        .unwrap_or(0);
    let mut data = Vec::with_capacity(capacity);

    reader
        .take(expected)
        .read_to_end(&mut data)
        .map_err(|source| SymbolFileError::Read {
            path: path.to_path_buf(),
            code: source.raw_os_error(),
            source,
        })?;

    let actual = data.len() as u64;
    if actual != expected {
        return Err(SymbolFileError::ShortRead {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    Ok(SymbolBuffer::terminate(data))
}

fn report(err: SymbolFileError) -> SymbolFileError
{
    error!("{err}");
    err
}

#[cfg(test)]
mod tests
{
    use std::io::{self, Cursor};

    use super::*;

    struct FailingReader;

    impl Read for FailingReader
    {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize>
        {
            Err(io::Error::from_raw_os_error(5))
        }
    }

    #[test]
    fn test_read_sized_exact()
    {
        let buffer = read_sized(Cursor::new(b"abc".to_vec()), 3, Path::new("x.sym")).unwrap();
        assert_eq!(buffer.as_bytes_with_nul(), b"abc\0");
    }

    #[test]
    fn test_read_sized_detects_short_read()
    {
        let err = read_sized(Cursor::new(b"abc".to_vec()), 10, Path::new("x.sym")).unwrap_err();
        match err {
            SymbolFileError::ShortRead { expected, actual, .. } => {
                assert_eq!(expected, 10);
                assert_eq!(actual, 3);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[test]
    fn test_read_sized_ignores_growth_past_stat_size()
    {
        let buffer = read_sized(Cursor::new(b"abcdef".to_vec()), 4, Path::new("x.sym")).unwrap();
        assert_eq!(buffer.as_bytes(), b"abcd");
    }

    #[test]
    fn test_read_sized_reports_os_code()
    {
        let err = read_sized(FailingReader, 4, Path::new("x.sym")).unwrap_err();
        assert!(matches!(err, SymbolFileError::Read { .. }));
        assert_eq!(err.os_code(), Some(5));
    }

    #[test]
    fn test_text_stops_at_embedded_nul()
    {
        let buffer = SymbolBuffer::from_bytes(b"FILE 1 a.c\0garbage");
        assert_eq!(buffer.len(), 18);
        assert_eq!(buffer.text(), b"FILE 1 a.c");
        assert_eq!(*buffer.as_bytes_with_nul().last().unwrap(), 0);
    }

    #[test]
    fn test_mutable_view_excludes_terminator()
    {
        let mut buffer = SymbolBuffer::from_bytes(b"ab");
        buffer.as_bytes_mut().fill(b'z');
        assert_eq!(buffer.as_bytes_with_nul(), b"zz\0");
    }
}

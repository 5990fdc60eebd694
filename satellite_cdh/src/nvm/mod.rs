// Non-volatile memory backing for state that must survive power cycles.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub mod counter;

#[derive(Debug, Error)]
pub enum NvmError {
    #[error("nvm is not available: {0}")]
    Unavailable(#[source] io::Error),
    #[error("nvm write failed: {0}")]
    Write(#[source] io::Error),
    #[error("{count} bytes at offset {offset} do not fit a {len}-byte store")]
    OutOfRange {
        offset: usize,
        count: usize,
        len: usize,
    },
}

/// Byte-addressed non-volatile storage. Writes are whole: a reader at the
/// next boot sees either the old bytes or the new ones, never a mix.
pub trait NonVolatileMemory {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), NvmError>;

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), NvmError>;
}

impl<N: NonVolatileMemory> NonVolatileMemory for &mut N {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), NvmError> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), NvmError> {
        (**self).write(offset, bytes)
    }
}

fn check_range(offset: usize, count: usize, len: usize) -> Result<(), NvmError> {
    if offset.checked_add(count).is_none_or(|end| end > len) {
        return Err(NvmError::OutOfRange { offset, count, len });
    }
    Ok(())
}

/// File-backed store. Every write rewrites the whole image through a temp
/// file and renames it into place, so a reset mid-write never exposes a
/// half-updated image.
pub struct FileNvm {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FileNvm {
    /// Opens the backing file, creating a zeroed image of `size` bytes when
    /// none exists yet.
    pub fn open(path: impl Into<PathBuf>, size: usize) -> Result<Self, NvmError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(mut existing) => {
                if existing.len() < size {
                    existing.resize(size, 0);
                }
                existing
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => vec![0u8; size],
            Err(err) => return Err(NvmError::Unavailable(err)),
        };
        let nvm = Self { path, bytes };
        nvm.flush()?;
        Ok(nvm)
    }

    fn flush(&self) -> Result<(), NvmError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &self.bytes).map_err(NvmError::Write)?;
        fs::rename(&tmp, &self.path).map_err(NvmError::Write)
    }
}

impl NonVolatileMemory for FileNvm {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), NvmError> {
        check_range(offset, buf.len(), self.bytes.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), NvmError> {
        check_range(offset, bytes.len(), self.bytes.len())?;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.flush()
    }
}

/// Volatile stand-in used by the test suites.
pub struct MemoryNvm {
    bytes: Vec<u8>,
}

impl MemoryNvm {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size],
        }
    }
}

impl NonVolatileMemory for MemoryNvm {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), NvmError> {
        check_range(offset, buf.len(), self.bytes.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), NvmError> {
        check_range(offset, bytes.len(), self.bytes.len())?;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

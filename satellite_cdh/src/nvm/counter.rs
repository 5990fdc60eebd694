// 16-bit counters stored in non-volatile memory. The replay counter is one
// of these: two consecutive bytes, big-endian, exclusively owned by the
// command handler that guards it.

use super::{NonVolatileMemory, NvmError};

/// A 16-bit counter over two consecutive NVM bytes (high byte first).
pub struct Counter16<N: NonVolatileMemory> {
    nvm: N,
    offset: usize,
}

impl<N: NonVolatileMemory> Counter16<N> {
    /// Fails when the store cannot hold two bytes at `offset`. A missing
    /// store is a hardware-initialization error; callers treat it as fatal.
    pub fn new(nvm: N, offset: usize) -> Result<Self, NvmError> {
        if offset.checked_add(2).is_none_or(|end| end > nvm.len()) {
            return Err(NvmError::OutOfRange {
                offset,
                count: 2,
                len: nvm.len(),
            });
        }
        Ok(Self { nvm, offset })
    }

    pub fn get(&self) -> u16 {
        let mut bytes = [0u8; 2];
        self.nvm
            .read(self.offset, &mut bytes)
            .expect("offset validated at construction");
        u16::from_be_bytes(bytes)
    }

    /// Writes the whole value; both bytes land before any later read can
    /// observe either.
    pub fn set(&mut self, value: u16) -> Result<(), NvmError> {
        self.nvm.write(self.offset, &value.to_be_bytes())
    }

    /// Wrapping add of 1.
    pub fn increment(&mut self) -> Result<(), NvmError> {
        self.set(self.get().wrapping_add(1))
    }
}

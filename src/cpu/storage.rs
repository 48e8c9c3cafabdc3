//! Fixed-size byte storage.
//!
//! One type backs the program ROM, the register file and the one-bit
//! status store. The size is part of the type so nothing is allocated
//! after construction.

use thiserror::Error;

/// A fixed-length addressable byte container.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Storage<const N: usize> {
    cells: [u8; N],
}

impl<const N: usize> Storage<N> {
    /// Create a storage block with every slot zeroed.
    pub const fn new() -> Self {
        Self { cells: [0; N] }
    }

    /// Create a storage block pre-filled with `bytes`.
    pub const fn from_bytes(bytes: [u8; N]) -> Self {
        Self { cells: bytes }
    }

    /// Number of addressable slots.
    #[inline]
    pub const fn len(&self) -> usize {
        N
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Read a slot.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u8, StorageError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(StorageError::AddressOutOfRange { addr, len: N })
    }

    /// Write a slot, returning the stored value.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> Result<u8, StorageError> {
        let cell = self
            .cells
            .get_mut(addr)
            .ok_or(StorageError::AddressOutOfRange { addr, len: N })?;
        *cell = value;
        Ok(value)
    }

    /// Zero every slot.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// Borrow the raw contents.
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.cells
    }
}

impl<const N: usize> Default for Storage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> std::fmt::Debug for Storage<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Storage[")?;
        for (i, byte) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        write!(f, "]")
    }
}

/// Errors raised by storage access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("address {addr} out of range for {len}-slot storage")]
    AddressOutOfRange { addr: usize, len: usize },
}

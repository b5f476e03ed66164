// Licensed under the Apache-2.0 license

//! Register store backing the emulated target.
//!
//! A fixed, ordered table of `(address, value)` pairs. Addresses are unique
//! but need not be sorted or contiguous; lookup is a linear scan.

use crate::i2c::common::ConfigurationError;

/// One bus-visible 8-bit register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Register {
    /// Address the master uses to select the register
    pub address: u8,
    /// Current contents
    pub value: u8,
}

impl Register {
    #[must_use]
    pub const fn new(address: u8, value: u8) -> Self {
        Self { address, value }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterTable<const N: usize> {
    registers: [Register; N],
}

impl<const N: usize> RegisterTable<N> {
    /// Build a table from its initial contents.
    ///
    /// # Errors
    ///
    /// `NoRegisters` for an empty table, `DuplicateRegisterAddress` when an
    /// address appears twice.
    pub fn new(registers: [Register; N]) -> Result<Self, ConfigurationError> {
        if N == 0 {
            return Err(ConfigurationError::NoRegisters);
        }
        for (i, reg) in registers.iter().enumerate() {
            if registers
                .iter()
                .skip(i + 1)
                .any(|other| other.address == reg.address)
            {
                return Err(ConfigurationError::DuplicateRegisterAddress(reg.address));
            }
        }
        Ok(Self { registers })
    }

    // Only for tables known to be valid at compile time.
    pub(crate) const fn from_validated(registers: [Register; N]) -> Self {
        Self { registers }
    }

    /// Index of the register answering to `address`.
    #[must_use]
    pub fn find_index(&self, address: u8) -> Option<usize> {
        self.registers.iter().position(|reg| reg.address == address)
    }

    /// Value stored at `index`.
    #[must_use]
    pub fn read(&self, index: usize) -> Option<u8> {
        self.registers.get(index).map(|reg| reg.value)
    }

    /// Overwrite the value at `index`. Out-of-range indices are ignored.
    pub fn write(&mut self, index: usize, value: u8) {
        if let Some(reg) = self.registers.get_mut(index) {
            reg.value = value;
        }
    }

    /// Value of the register answering to `address`.
    #[must_use]
    pub fn value_of(&self, address: u8) -> Option<u8> {
        self.find_index(address).and_then(|index| self.read(index))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    #[must_use]
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_table() -> RegisterTable<4> {
        RegisterTable::new([
            Register::new(0x40, 0x01),
            Register::new(0x10, 0x02),
            Register::new(0xF0, 0x03),
            Register::new(0x11, 0x04),
        ])
        .unwrap()
    }

    #[test]
    fn test_find_index_unsorted_addresses() {
        let table = sparse_table();
        for (index, reg) in table.registers().iter().enumerate() {
            assert_eq!(table.find_index(reg.address), Some(index));
        }
    }

    #[test]
    fn test_find_index_unknown_address() {
        let table = sparse_table();
        for address in [0x00, 0x12, 0x41, 0xFF] {
            assert_eq!(table.find_index(address), None);
        }
    }

    #[test]
    fn test_read_write() {
        let mut table = sparse_table();
        table.write(2, 0x99);
        assert_eq!(table.read(2), Some(0x99));
        assert_eq!(table.value_of(0xF0), Some(0x99));
        // neighbours untouched
        assert_eq!(table.read(1), Some(0x02));
        assert_eq!(table.read(3), Some(0x04));
    }

    #[test]
    fn test_out_of_range_access() {
        let mut table = sparse_table();
        let before = table.clone();
        table.write(4, 0xAA);
        assert_eq!(table, before);
        assert_eq!(table.read(4), None);
    }

    #[test]
    fn test_rejects_empty_table() {
        let result = RegisterTable::<0>::new([]);
        assert_eq!(result, Err(ConfigurationError::NoRegisters));
    }

    #[test]
    fn test_rejects_duplicate_address() {
        let result = RegisterTable::new([Register::new(0x05, 0x00), Register::new(0x05, 0x01)]);
        assert_eq!(
            result,
            Err(ConfigurationError::DuplicateRegisterAddress(0x05))
        );
    }
}

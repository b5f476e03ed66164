// Licensed under the Apache-2.0 license

//! Common types for the register-mapped I2C target.
//!
//! Events delivered by the transport, status reporting, configuration
//! (with its builder) and the error types shared by the `i2c` modules.

use crate::i2c::registers::{Register, RegisterTable};
use embedded_hal::i2c::{ErrorKind, SevenBitAddress};

/// 7-bit bus address of the reference mock device.
pub const DEFAULT_SLAVE_ADDRESS: SevenBitAddress = 0x3A;

/// Register table of the reference mock device.
pub const REFERENCE_REGISTERS: [Register; 4] = [
    Register::new(0x00, 0x00),
    Register::new(0x01, 0x00),
    Register::new(0x02, 0x55),
    Register::new(0x03, 0x01),
];

/// Transfer direction as seen from the bus master.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Master writes, the target receives.
    Write,
    /// Master reads, the target transmits.
    Read,
}

/// Notifications delivered by the transport to the register slave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlaveEvent {
    /// Our address was matched on the bus.
    AddressMatch(Direction),
    /// An armed receive finished; carries the number of bytes transferred.
    ReceiveComplete(usize),
    /// An armed transmit finished.
    TransmitComplete,
    /// The address listener stopped and must be re-armed.
    ListenComplete,
}

/// Where the cursor goes once a read passes the last register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum EndOfTable {
    /// Start over at the first register.
    #[default]
    Wrap,
    /// Stay on the last register until a write moves the cursor.
    Hold,
}

/// Transaction state of the register slave.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SlaveState {
    #[default]
    Idle,
    Receiving,
    Transmitting,
}

/// Status information for the register slave
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveStatus {
    /// Current transaction state
    pub state: SlaveState,
    /// Register index targeted by the next read
    pub cursor: usize,
    /// Last event handled, if any
    pub last_event: Option<SlaveEvent>,
    /// Bytes received by the last write, address byte included
    pub rx_count: usize,
    /// Bytes queued for the last read
    pub tx_count: usize,
}

/// Number of bytes a DMA-style receive actually transferred, given the
/// length it was armed with and the count it reports as still outstanding.
#[must_use]
pub const fn received_len(expected: usize, remaining: usize) -> usize {
    expected.saturating_sub(remaining)
}

/// Rejected configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The register table is empty.
    NoRegisters,
    /// Two registers share the same bus-visible address.
    DuplicateRegisterAddress(u8),
    /// Not a usable 7-bit target address.
    InvalidSlaveAddress(u8),
    /// Receive staging buffer cannot hold the address byte plus a full table.
    ReceiveBufferTooSmall { required: usize, provided: usize },
    /// Transmit staging buffer cannot hold a full table.
    TransmitBufferTooSmall { required: usize, provided: usize },
}

/// Errors surfaced by the register slave.
///
/// Malformed bus traffic is never an error; only bad configuration and
/// failures reported by the transport are.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error<E> {
    Config(ConfigurationError),
    Transport(E),
}

impl<E> From<ConfigurationError> for Error<E> {
    fn from(err: ConfigurationError) -> Self {
        Error::Config(err)
    }
}

impl<E: embedded_hal::i2c::Error> embedded_hal::i2c::Error for Error<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Other,
            Error::Transport(err) => err.kind(),
        }
    }
}

/// Validated configuration of one register slave.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlaveConfig<const N: usize> {
    pub slave_address: SevenBitAddress,
    pub registers: RegisterTable<N>,
    pub end_of_table: EndOfTable,
}

impl SlaveConfig<4> {
    /// The reference mock device: address `0x3A`, four registers, wrapping reads.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            registers: RegisterTable::from_validated(REFERENCE_REGISTERS),
            end_of_table: EndOfTable::Wrap,
        }
    }
}

impl<const N: usize> SlaveConfig<N> {
    /// Address in the left-aligned 8-bit form most own-address registers expect.
    #[must_use]
    pub fn own_address_register(&self) -> u8 {
        self.slave_address << 1
    }
}

pub struct SlaveConfigBuilder<const N: usize> {
    slave_address: SevenBitAddress,
    registers: [Register; N],
    end_of_table: EndOfTable,
}

impl<const N: usize> SlaveConfigBuilder<N> {
    #[must_use]
    pub fn new(registers: [Register; N]) -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            registers,
            end_of_table: EndOfTable::Wrap,
        }
    }
    #[must_use]
    pub fn slave_address(mut self, address: SevenBitAddress) -> Self {
        self.slave_address = address;
        self
    }
    #[must_use]
    pub fn end_of_table(mut self, policy: EndOfTable) -> Self {
        self.end_of_table = policy;
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlaveAddress` for addresses outside `0x08..=0x77`
    /// (reserved or not 7-bit), and any error from [`RegisterTable::new`].
    pub fn build(self) -> Result<SlaveConfig<N>, ConfigurationError> {
        if !(0x08..=0x77).contains(&self.slave_address) {
            return Err(ConfigurationError::InvalidSlaveAddress(self.slave_address));
        }
        Ok(SlaveConfig {
            slave_address: self.slave_address,
            registers: RegisterTable::new(self.registers)?,
            end_of_table: self.end_of_table,
        })
    }
}

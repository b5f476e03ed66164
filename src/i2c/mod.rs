// Licensed under the Apache-2.0 license

//! Register-mapped I2C target emulation.
//!
//! A [`RegisterSlave`] exposes a small table of 8-bit registers to a bus
//! master through any [`SlaveTransport`]. The transport is the hardware side
//! (own address, DMA transfers, listen re-arming); [`SimulatedBus`] provides
//! one for host-side runs and tests.

pub mod common;
pub mod register_slave;
pub mod registers;
pub mod sim;
pub mod traits;

pub use common::{
    received_len, ConfigurationError, Direction, EndOfTable, Error, SlaveConfig,
    SlaveConfigBuilder, SlaveEvent, SlaveState, SlaveStatus, DEFAULT_SLAVE_ADDRESS,
    REFERENCE_REGISTERS,
};
pub use register_slave::RegisterSlave;
pub use registers::{Register, RegisterTable};
pub use sim::SimulatedBus;
pub use traits::{SlaveEventPolling, SlaveTransport};

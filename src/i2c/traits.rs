// Licensed under the Apache-2.0 license

//! # I2C Target Transport Traits
//!
//! The register slave never touches a peripheral directly. Everything
//! hardware-specific (own-address setup, DMA or interrupt driven transfers,
//! listen re-arming) sits behind these traits, and the hardware reports back
//! through [`SlaveEvent`]s.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! SlaveTransport (outbound requests)
//!     └── SlaveEventPolling (non-blocking event delivery)
//! ```
//!
//! Interrupt-driven ports only need [`SlaveTransport`] and call
//! `RegisterSlave::handle_event` from their ISR. Polled ports add
//! [`SlaveEventPolling`] and drive `RegisterSlave::poll` from a main loop.

use crate::i2c::common::SlaveEvent;
use embedded_hal::i2c::SevenBitAddress;

/// Outbound requests from the register slave to the bus hardware
///
/// # Examples
///
/// ```rust
/// use embedded_hal::i2c::{ErrorKind, SevenBitAddress};
/// use i2c_regmock::i2c::SlaveTransport;
///
/// struct Sink;
///
/// impl SlaveTransport for Sink {
///     type Error = ErrorKind;
///
///     fn enable_slave(&mut self, _address: SevenBitAddress) -> Result<(), ErrorKind> {
///         Ok(())
///     }
///     fn start_receive(&mut self, _buffer: &mut [u8]) -> Result<(), ErrorKind> {
///         Ok(())
///     }
///     fn start_transmit(&mut self, _data: &[u8]) -> Result<(), ErrorKind> {
///         Ok(())
///     }
///     fn re_enable_listen(&mut self) -> Result<(), ErrorKind> {
///         Ok(())
///     }
/// }
/// ```
pub trait SlaveTransport {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Program the own address and start listening for address matches
    ///
    /// # Errors
    ///
    /// Returns an error if the peripheral cannot be configured. Callers
    /// usually treat this as fatal.
    fn enable_slave(&mut self, address: SevenBitAddress) -> Result<(), Self::Error>;

    /// Arm a receive of up to `buffer.len()` bytes from the master
    ///
    /// The transport may fill `buffer` before returning or later through its
    /// own DMA engine. Either way it reports the byte count with
    /// [`SlaveEvent::ReceiveComplete`]; the slave does not read the buffer
    /// before that.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer cannot be started.
    fn start_receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Start sending `data` to the master
    ///
    /// Completion is reported with [`SlaveEvent::TransmitComplete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer cannot be started.
    fn start_transmit(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Re-arm the address listener after [`SlaveEvent::ListenComplete`]
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be re-enabled. The device is
    /// deaf to the bus until this succeeds.
    fn re_enable_listen(&mut self) -> Result<(), Self::Error>;
}

/// Non-blocking event delivery for polled ports
pub trait SlaveEventPolling: SlaveTransport {
    /// Next pending event, or `WouldBlock` if the bus is quiet.
    fn poll_event(&mut self) -> nb::Result<SlaveEvent, Self::Error>;
}

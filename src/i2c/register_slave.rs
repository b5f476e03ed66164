// Licensed under the Apache-2.0 license

//! Register-access state machine of the emulated I2C target.
//!
//! The bus protocol is the usual register pointer scheme:
//!
//! - write transaction: `[register_address, data0, data1, ...]`. Data bytes
//!   land in consecutive table slots starting at the addressed register and
//!   the cursor ends up just after the last slot written.
//! - read transaction: consecutive register values starting at the cursor,
//!   never running past the end of the table.
//! - every completed read moves the cursor by one, wrapping to the first
//!   register or holding on the last one depending on [`EndOfTable`].
//!
//! Malformed traffic (unknown register, read past the end, oversized write)
//! is dropped silently; only the logger hears about it.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{
    ConfigurationError, Direction, EndOfTable, Error, SlaveConfig, SlaveEvent, SlaveState,
    SlaveStatus,
};
use crate::i2c::registers::RegisterTable;
use crate::i2c::traits::{SlaveEventPolling, SlaveTransport};
use embedded_hal::i2c::SevenBitAddress;

/// Emulated register-mapped I2C target.
///
/// `rx_buf` and `tx_buf` are the per-transaction staging areas handed to the
/// transport (DMA-capable memory on real targets). They are borrowed for the
/// lifetime of the slave and reused for every transaction.
pub struct RegisterSlave<'a, T: SlaveTransport, const N: usize, L: Logger = NoOpLogger> {
    transport: T,
    logger: L,
    slave_address: SevenBitAddress,
    registers: RegisterTable<N>,
    end_of_table: EndOfTable,
    cursor: usize,
    state: SlaveState,
    rx_buf: &'a mut [u8],
    tx_buf: &'a mut [u8],
    rx_expected: usize,
    rx_count: usize,
    tx_count: usize,
    last_event: Option<SlaveEvent>,
}

impl<'a, T: SlaveTransport, const N: usize> RegisterSlave<'a, T, N> {
    /// Create a slave without logging.
    ///
    /// # Errors
    ///
    /// Returns `ReceiveBufferTooSmall` unless `rx_buf` holds `N + 1` bytes and
    /// `TransmitBufferTooSmall` unless `tx_buf` holds `N` bytes.
    pub fn new(
        config: SlaveConfig<N>,
        transport: T,
        rx_buf: &'a mut [u8],
        tx_buf: &'a mut [u8],
    ) -> Result<Self, ConfigurationError> {
        Self::with_logger(config, transport, NoOpLogger, rx_buf, tx_buf)
    }
}

impl<'a, T: SlaveTransport, const N: usize, L: Logger> RegisterSlave<'a, T, N, L> {
    /// Address byte plus one byte per register.
    pub const RX_LEN: usize = N + 1;
    pub const TX_LEN: usize = N;

    /// Create a slave reporting dropped traffic to `logger`.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterSlave::new`].
    pub fn with_logger(
        config: SlaveConfig<N>,
        transport: T,
        logger: L,
        rx_buf: &'a mut [u8],
        tx_buf: &'a mut [u8],
    ) -> Result<Self, ConfigurationError> {
        if rx_buf.len() < Self::RX_LEN {
            return Err(ConfigurationError::ReceiveBufferTooSmall {
                required: Self::RX_LEN,
                provided: rx_buf.len(),
            });
        }
        if tx_buf.len() < Self::TX_LEN {
            return Err(ConfigurationError::TransmitBufferTooSmall {
                required: Self::TX_LEN,
                provided: tx_buf.len(),
            });
        }
        Ok(Self {
            transport,
            logger,
            slave_address: config.slave_address,
            registers: config.registers,
            end_of_table: config.end_of_table,
            cursor: 0,
            state: SlaveState::Idle,
            rx_buf,
            tx_buf,
            rx_expected: 0,
            rx_count: 0,
            tx_count: 0,
            last_event: None,
        })
    }

    /// Bring the target onto the bus: program the own address and listen.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the peripheral cannot be configured.
    /// There is no way to serve the bus after that; callers normally halt.
    pub fn start(&mut self) -> Result<(), Error<T::Error>> {
        match self.transport.enable_slave(self.slave_address) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.transport_failed(err)),
        }
    }

    /// Dispatch one transport event.
    ///
    /// Events must be delivered one at a time, in bus order. Each call runs
    /// to completion without blocking.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if a follow-up request to the transport
    /// (arming a transfer, re-enabling the listener) fails. Bus traffic the
    /// device cannot make sense of is never an error.
    pub fn handle_event(&mut self, event: SlaveEvent) -> Result<(), Error<T::Error>> {
        self.last_event = Some(event);
        match event {
            SlaveEvent::AddressMatch(Direction::Write) => self.arm_receive(),
            SlaveEvent::AddressMatch(Direction::Read) => self.arm_transmit(),
            SlaveEvent::ReceiveComplete(transferred) => {
                self.complete_receive(transferred);
                Ok(())
            }
            SlaveEvent::TransmitComplete => {
                self.complete_transmit();
                Ok(())
            }
            SlaveEvent::ListenComplete => match self.transport.re_enable_listen() {
                Ok(()) => Ok(()),
                Err(err) => Err(self.transport_failed(err)),
            },
        }
    }

    fn arm_receive(&mut self) -> Result<(), Error<T::Error>> {
        self.rx_count = 0;
        self.rx_expected = 0;
        let Some(buffer) = self.rx_buf.get_mut(..Self::RX_LEN) else {
            return Ok(());
        };
        self.state = SlaveState::Receiving;
        if let Err(err) = self.transport.start_receive(buffer) {
            self.state = SlaveState::Idle;
            return Err(self.transport_failed(err));
        }
        self.rx_expected = Self::RX_LEN;
        Ok(())
    }

    fn arm_transmit(&mut self) -> Result<(), Error<T::Error>> {
        self.tx_count = 0;
        if self.cursor >= N {
            self.state = SlaveState::Idle;
            self.logger.debug("read with cursor past the table, nothing armed");
            return Ok(());
        }

        // Never wraps mid-read: only the registers from the cursor to the end.
        let len = (N - self.cursor).min(Self::TX_LEN);
        let source = self
            .registers
            .registers()
            .get(self.cursor..)
            .unwrap_or_default();
        for (slot, reg) in self.tx_buf.iter_mut().zip(source).take(len) {
            *slot = reg.value;
        }
        let Some(data) = self.tx_buf.get(..len) else {
            return Ok(());
        };

        self.state = SlaveState::Transmitting;
        if let Err(err) = self.transport.start_transmit(data) {
            self.state = SlaveState::Idle;
            return Err(self.transport_failed(err));
        }
        self.tx_count = len;
        Ok(())
    }

    fn complete_receive(&mut self, transferred: usize) {
        self.state = SlaveState::Idle;
        let received = transferred.min(self.rx_expected);
        self.rx_expected = 0;
        self.rx_count = received;

        let Some((&address, data)) = self
            .rx_buf
            .get(..received)
            .and_then(<[u8]>::split_first)
        else {
            return;
        };
        let Some(start) = self.registers.find_index(address) else {
            self.logger.debug("write to unknown register discarded");
            return;
        };

        let mut index = start;
        for &byte in data {
            // Bytes past the last register are dropped, the transfer still completes.
            if index < N {
                self.registers.write(index, byte);
                index += 1;
            }
        }
        if data.len() > N - start {
            self.logger.debug("write ran past the last register, excess dropped");
        }
        self.cursor = index;
    }

    fn complete_transmit(&mut self) {
        self.state = SlaveState::Idle;
        if self.cursor + 1 < N {
            self.cursor += 1;
        } else {
            self.cursor = match self.end_of_table {
                EndOfTable::Wrap => 0,
                EndOfTable::Hold => N.saturating_sub(1),
            };
        }
    }

    fn transport_failed(&mut self, err: T::Error) -> Error<T::Error> {
        self.logger.error("transport request failed");
        Error::Transport(err)
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn state(&self) -> SlaveState {
        self.state
    }

    #[must_use]
    pub fn slave_address(&self) -> SevenBitAddress {
        self.slave_address
    }

    #[must_use]
    pub fn end_of_table(&self) -> EndOfTable {
        self.end_of_table
    }

    #[must_use]
    pub fn registers(&self) -> &RegisterTable<N> {
        &self.registers
    }

    /// Application-side access to register contents, e.g. to publish a new
    /// sample. The cursor is not affected.
    pub fn registers_mut(&mut self) -> &mut RegisterTable<N> {
        &mut self.registers
    }

    #[must_use]
    pub fn status(&self) -> SlaveStatus {
        SlaveStatus {
            state: self.state,
            cursor: self.cursor,
            last_event: self.last_event,
            rx_count: self.rx_count,
            tx_count: self.tx_count,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Tear down, handing back the transport and the logger.
    pub fn release(self) -> (T, L) {
        (self.transport, self.logger)
    }
}

impl<T: SlaveEventPolling, const N: usize, L: Logger> RegisterSlave<'_, T, N, L> {
    /// Fetch one pending event from the transport and dispatch it.
    ///
    /// # Errors
    ///
    /// `WouldBlock` when no event is pending; otherwise the transport's
    /// polling error or any error from [`RegisterSlave::handle_event`].
    pub fn poll(&mut self) -> nb::Result<(), Error<T::Error>> {
        let event = self
            .transport
            .poll_event()
            .map_err(|err| err.map(Error::Transport))?;
        self.handle_event(event).map_err(nb::Error::Other)
    }
}

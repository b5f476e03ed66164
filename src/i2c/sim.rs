// Licensed under the Apache-2.0 license

//! Simulated bus for running the register slave off-target.
//!
//! [`SimulatedBus`] stands in for both the bus master and the peripheral's
//! DMA engine. A master transaction queues the address-match event plus the
//! closing listen-complete; the matching transfer-complete event is produced
//! when the slave arms the transfer, the way a DMA completion follows its
//! descriptor. Drive it with `RegisterSlave::poll` until `WouldBlock`.
//!
//! ```rust
//! use i2c_regmock::i2c::{RegisterSlave, SimulatedBus, SlaveConfig};
//!
//! let (mut rx, mut tx) = ([0u8; 5], [0u8; 4]);
//! let mut slave =
//!     RegisterSlave::new(SlaveConfig::reference(), SimulatedBus::<8>::new(), &mut rx, &mut tx)
//!         .unwrap();
//! slave.start().unwrap();
//!
//! slave.transport_mut().master_write(0x3A, &[0x02, 0x99]).unwrap();
//! while slave.poll().is_ok() {}
//! slave.transport_mut().master_read(0x3A, 1).unwrap();
//! while slave.poll().is_ok() {}
//!
//! assert_eq!(slave.transport_mut().take_read().as_slice(), &[0x01]);
//! assert_eq!(slave.cursor(), 0);
//! ```

use crate::i2c::common::{received_len, Direction, SlaveEvent};
use crate::i2c::traits::{SlaveEventPolling, SlaveTransport};
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, SevenBitAddress};
use heapless::{Deque, Vec};

/// Value a master clocks in when no target drives SDA.
pub const IDLE_BUS_BYTE: u8 = 0xFF;

// One transaction in flight: match, transfer complete, listen complete.
const EVENT_QUEUE_LEN: usize = 4;

/// Host-side master + DMA model carrying up to `CAP` bytes per transaction.
pub struct SimulatedBus<const CAP: usize> {
    own_address: Option<SevenBitAddress>,
    listening: bool,
    events: Deque<SlaveEvent, EVENT_QUEUE_LEN>,
    write_data: Vec<u8, CAP>,
    read_len: usize,
    read_data: Vec<u8, CAP>,
    listen_rearms: usize,
    fail_next: Option<ErrorKind>,
}

impl<const CAP: usize> Default for SimulatedBus<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> SimulatedBus<CAP> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            own_address: None,
            listening: false,
            events: Deque::new(),
            write_data: Vec::new(),
            read_len: 0,
            read_data: Vec::new(),
            listen_rearms: 0,
            fail_next: None,
        }
    }

    /// Master writes `bytes` to the target at `address`.
    ///
    /// # Errors
    ///
    /// `Bus` while the previous transaction has not been fully polled,
    /// `NoAcknowledge` when no listening target owns `address`, `Overrun`
    /// when `bytes` exceeds `CAP`.
    pub fn master_write(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), ErrorKind> {
        self.begin(address)?;
        self.write_data.clear();
        self.write_data
            .extend_from_slice(bytes)
            .map_err(|()| ErrorKind::Overrun)?;
        self.queue(SlaveEvent::AddressMatch(Direction::Write))
    }

    /// Master reads `len` bytes from the target at `address`.
    ///
    /// The bytes are available through [`SimulatedBus::take_read`] once the
    /// events are polled. Bytes the target did not provide read as
    /// [`IDLE_BUS_BYTE`]. The target only sees a transmit completion when the
    /// master clocks out everything it armed.
    ///
    /// # Errors
    ///
    /// Same as [`SimulatedBus::master_write`].
    pub fn master_read(&mut self, address: SevenBitAddress, len: usize) -> Result<(), ErrorKind> {
        self.begin(address)?;
        self.read_data.clear();
        self.read_data
            .resize(len, IDLE_BUS_BYTE)
            .map_err(|()| ErrorKind::Overrun)?;
        self.read_len = len;
        self.queue(SlaveEvent::AddressMatch(Direction::Read))
    }

    /// Bytes collected by the last master read.
    pub fn take_read(&mut self) -> Vec<u8, CAP> {
        core::mem::take(&mut self.read_data)
    }

    /// Make the next outbound request fail with `kind`.
    pub fn fail_next_request(&mut self, kind: ErrorKind) {
        self.fail_next = Some(kind);
    }

    #[must_use]
    pub fn own_address(&self) -> Option<SevenBitAddress> {
        self.own_address
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Times the listener was re-armed after a transaction.
    #[must_use]
    pub fn listen_rearms(&self) -> usize {
        self.listen_rearms
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    fn begin(&mut self, address: SevenBitAddress) -> Result<(), ErrorKind> {
        if !self.events.is_empty() {
            return Err(ErrorKind::Bus);
        }
        if !self.listening || self.own_address != Some(address) {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        Ok(())
    }

    fn queue(&mut self, matched: SlaveEvent) -> Result<(), ErrorKind> {
        self.events
            .push_back(matched)
            .and_then(|()| self.events.push_back(SlaveEvent::ListenComplete))
            .map_err(|_| ErrorKind::Overrun)
    }

    // Transfer completions jump ahead of the pending listen-complete.
    fn complete_next(&mut self, event: SlaveEvent) -> Result<(), ErrorKind> {
        self.events
            .push_front(event)
            .map_err(|_| ErrorKind::Overrun)
    }

    fn check_failure(&mut self) -> Result<(), ErrorKind> {
        match self.fail_next.take() {
            Some(kind) => Err(kind),
            None => Ok(()),
        }
    }
}

impl<const CAP: usize> SlaveTransport for SimulatedBus<CAP> {
    type Error = ErrorKind;

    fn enable_slave(&mut self, address: SevenBitAddress) -> Result<(), Self::Error> {
        self.check_failure()?;
        self.own_address = Some(address);
        self.listening = true;
        Ok(())
    }

    fn start_receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.check_failure()?;
        let n = self.write_data.len().min(buffer.len());
        if let (Some(dst), Some(src)) = (buffer.get_mut(..n), self.write_data.get(..n)) {
            dst.copy_from_slice(src);
        }
        let remaining = buffer.len() - n;
        self.complete_next(SlaveEvent::ReceiveComplete(received_len(
            buffer.len(),
            remaining,
        )))
    }

    fn start_transmit(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.check_failure()?;
        let sent = data.len().min(self.read_len);
        if let (Some(dst), Some(src)) = (self.read_data.get_mut(..sent), data.get(..sent)) {
            dst.copy_from_slice(src);
        }
        if self.read_len >= data.len() {
            self.complete_next(SlaveEvent::TransmitComplete)?;
        }
        Ok(())
    }

    fn re_enable_listen(&mut self) -> Result<(), Self::Error> {
        self.check_failure()?;
        self.listening = true;
        self.listen_rearms += 1;
        Ok(())
    }
}

impl<const CAP: usize> SlaveEventPolling for SimulatedBus<CAP> {
    fn poll_event(&mut self) -> nb::Result<SlaveEvent, Self::Error> {
        let event = self.events.pop_front().ok_or(nb::Error::WouldBlock)?;
        if event == SlaveEvent::ListenComplete {
            self.listening = false;
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::common::{EndOfTable, Error, SlaveConfig, SlaveConfigBuilder};
    use crate::i2c::register_slave::RegisterSlave;
    use crate::i2c::registers::Register;
    use hex_literal::hex;

    type Bus = SimulatedBus<16>;

    fn drain<const N: usize>(slave: &mut RegisterSlave<'_, Bus, N>) -> usize {
        let mut handled = 0;
        loop {
            match slave.poll() {
                Ok(()) => handled += 1,
                Err(nb::Error::WouldBlock) => return handled,
                Err(nb::Error::Other(err)) => panic!("unexpected error: {err:?}"),
            }
        }
    }

    fn read<const N: usize>(slave: &mut RegisterSlave<'_, Bus, N>, len: usize) -> std::vec::Vec<u8> {
        slave.transport_mut().master_read(0x3A, len).unwrap();
        drain(slave);
        slave.transport_mut().take_read().to_vec()
    }

    #[test]
    fn test_reference_scenario_over_the_bus() {
        let (mut rx, mut tx) = ([0u8; 5], [0u8; 4]);
        let mut slave =
            RegisterSlave::new(SlaveConfig::reference(), Bus::new(), &mut rx, &mut tx).unwrap();
        slave.start().unwrap();

        slave.transport_mut().master_write(0x3A, &hex!("02 99")).unwrap();
        assert_eq!(drain(&mut slave), 3);
        assert_eq!(slave.registers().value_of(0x02), Some(0x99));
        assert_eq!(slave.cursor(), 3);

        assert_eq!(read(&mut slave, 1), vec![0x01]);
        assert_eq!(slave.cursor(), 0);
        assert_eq!(slave.transport().listen_rearms(), 2);
        assert!(slave.transport().is_listening());
    }

    #[test]
    fn test_wrong_address_is_not_acknowledged() {
        let (mut rx, mut tx) = ([0u8; 5], [0u8; 4]);
        let mut slave =
            RegisterSlave::new(SlaveConfig::reference(), Bus::new(), &mut rx, &mut tx).unwrap();
        let nack = Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));

        // not started yet
        assert_eq!(slave.transport_mut().master_write(0x3A, &[0x00]), nack);

        slave.start().unwrap();
        assert_eq!(slave.transport().own_address(), Some(0x3A));
        assert_eq!(slave.transport_mut().master_write(0x3B, &[0x00]), nack);
        assert_eq!(slave.transport().pending_events(), 0);
    }

    #[test]
    fn test_busy_until_polled() {
        let (mut rx, mut tx) = ([0u8; 5], [0u8; 4]);
        let mut slave =
            RegisterSlave::new(SlaveConfig::reference(), Bus::new(), &mut rx, &mut tx).unwrap();
        slave.start().unwrap();

        slave.transport_mut().master_write(0x3A, &[0x01]).unwrap();
        assert_eq!(
            slave.transport_mut().master_read(0x3A, 1),
            Err(ErrorKind::Bus)
        );
        drain(&mut slave);
        assert_eq!(read(&mut slave, 1), vec![0x00]);
    }

    #[test]
    fn test_failed_rearm_leaves_device_deaf() {
        let (mut rx, mut tx) = ([0u8; 5], [0u8; 4]);
        let mut slave =
            RegisterSlave::new(SlaveConfig::reference(), Bus::new(), &mut rx, &mut tx).unwrap();
        slave.start().unwrap();
        slave.transport_mut().master_write(0x3A, &[0x01]).unwrap();

        // match, receive complete
        assert_eq!(slave.poll(), Ok(()));
        assert_eq!(slave.poll(), Ok(()));
        slave.transport_mut().fail_next_request(ErrorKind::Other);
        assert_eq!(
            slave.poll(),
            Err(nb::Error::Other(Error::Transport(ErrorKind::Other)))
        );

        assert!(!slave.transport().is_listening());
        assert_eq!(
            slave.transport_mut().master_read(0x3A, 1),
            Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
        );
    }

    #[test]
    fn test_short_read_does_not_advance_cursor() {
        let (mut rx, mut tx) = ([0u8; 5], [0u8; 4]);
        let mut slave =
            RegisterSlave::new(SlaveConfig::reference(), Bus::new(), &mut rx, &mut tx).unwrap();
        slave.start().unwrap();

        assert_eq!(read(&mut slave, 2), hex!("00 00"));
        assert_eq!(slave.cursor(), 0);

        assert_eq!(read(&mut slave, 4), hex!("00 00 55 01"));
        assert_eq!(slave.cursor(), 1);
    }

    #[test]
    fn test_long_read_is_padded_with_idle_bytes() {
        let (mut rx, mut tx) = ([0u8; 5], [0u8; 4]);
        let mut slave =
            RegisterSlave::new(SlaveConfig::reference(), Bus::new(), &mut rx, &mut tx).unwrap();
        slave.start().unwrap();
        slave.transport_mut().master_write(0x3A, &[0x02]).unwrap();
        drain(&mut slave);

        assert_eq!(read(&mut slave, 4), hex!("55 01 FF FF"));
        assert_eq!(slave.cursor(), 3);
    }

    #[test]
    fn test_read_past_table_end_returns_idle_bus() {
        let (mut rx, mut tx) = ([0u8; 5], [0u8; 4]);
        let config = SlaveConfigBuilder::new(crate::i2c::common::REFERENCE_REGISTERS)
            .end_of_table(EndOfTable::Hold)
            .build()
            .unwrap();
        let mut slave = RegisterSlave::new(config, Bus::new(), &mut rx, &mut tx).unwrap();
        slave.start().unwrap();
        slave
            .transport_mut()
            .master_write(0x3A, &hex!("03 7E"))
            .unwrap();
        drain(&mut slave);
        assert_eq!(slave.cursor(), 4);

        assert_eq!(read(&mut slave, 2), hex!("FF FF"));
        assert_eq!(slave.cursor(), 4);
        assert!(slave.transport().is_listening());
    }

    #[test]
    fn test_oversized_write_is_truncated_by_the_target() {
        let (mut rx, mut tx) = ([0u8; 3], [0u8; 2]);
        let config = SlaveConfigBuilder::new([Register::new(0x10, 0), Register::new(0x11, 0)])
            .build()
            .unwrap();
        let mut slave = RegisterSlave::new(config, Bus::new(), &mut rx, &mut tx).unwrap();
        slave.start().unwrap();

        slave
            .transport_mut()
            .master_write(0x3A, &hex!("10 01 02 03 04"))
            .unwrap();
        drain(&mut slave);

        assert_eq!(slave.registers().value_of(0x10), Some(0x01));
        assert_eq!(slave.registers().value_of(0x11), Some(0x02));
        assert_eq!(slave.cursor(), 2);
        assert_eq!(slave.status().rx_count, 3);
    }

    #[test]
    fn test_transaction_larger_than_capacity() {
        let mut bus = SimulatedBus::<2>::new();
        bus.enable_slave(0x3A).unwrap();
        assert_eq!(
            bus.master_write(0x3A, &[0, 1, 2]),
            Err(ErrorKind::Overrun)
        );
        assert_eq!(bus.master_read(0x3A, 3), Err(ErrorKind::Overrun));
    }
}

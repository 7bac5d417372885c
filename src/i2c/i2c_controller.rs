// Licensed under the Apache-2.0 license

//! Driver-facing I2C controller.
//!
//! Wraps any [`RegisterBus`] transport, logs failed transactions, adds bus
//! scanning, and exposes the transport through the embedded-hal `I2c` trait
//! for drivers written against it.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::Error;
use crate::i2c::traits::RegisterBus;
use crate::{log_debug, log_error};
use embedded_hal::i2c::{NoAcknowledgeSource, Operation, SevenBitAddress};

/// Lowest non-reserved 7-bit address.
pub const SCAN_FIRST: u8 = 0x08;
/// Highest non-reserved 7-bit address.
pub const SCAN_LAST: u8 = 0x77;
/// Number of addresses covered by [`I2cController::scan`].
pub const SCAN_CAPACITY: usize = (SCAN_LAST - SCAN_FIRST + 1) as usize;

pub struct I2cController<H: RegisterBus, L: Logger = NoOpLogger> {
    pub bus: H,
    pub logger: L,
}

impl<H: RegisterBus> I2cController<H, NoOpLogger> {
    pub fn new(bus: H) -> Self {
        Self {
            bus,
            logger: NoOpLogger,
        }
    }
}

impl<H: RegisterBus, L: Logger> I2cController<H, L> {
    pub fn with_logger(bus: H, logger: L) -> Self {
        Self { bus, logger }
    }

    /// Probe every non-reserved address and collect the ones that answer.
    ///
    /// # Errors
    ///
    /// Stops at the first transport failure other than a missing device.
    pub fn scan(&mut self) -> Result<heapless::Vec<u8, SCAN_CAPACITY>, Error> {
        let mut found = heapless::Vec::new();
        for address in SCAN_FIRST..=SCAN_LAST {
            if self.bus.probe(address)? {
                log_debug!(self.logger, "i2c: device at 0x{:02x}", address);
                // Capacity covers the whole range.
                let _ = found.push(address);
            }
        }
        Ok(found)
    }

    fn report(
        &mut self,
        what: &str,
        address: SevenBitAddress,
        result: Result<(), Error>,
    ) -> Result<(), Error> {
        if let Err(e) = result {
            log_error!(self.logger, "i2c: {} 0x{:02x} failed: {:?}", what, address, e);
        }
        result
    }
}

impl<H: RegisterBus, L: Logger> RegisterBus for I2cController<H, L> {
    fn bus_init(&mut self) -> Result<(), Error> {
        self.bus.bus_init()
    }

    fn bus_deinit(&mut self) -> Result<(), Error> {
        self.bus.bus_deinit()
    }

    fn transaction_read(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        let result = self.bus.transaction_read(address, register, buffer);
        self.report("read", address, result)
    }

    fn transaction_write(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Error> {
        let result = self.bus.transaction_write(address, register, bytes);
        self.report("write", address, result)
    }

    fn probe(&mut self, address: SevenBitAddress) -> Result<bool, Error> {
        self.bus.probe(address)
    }
}

impl<H: RegisterBus, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = Error;
}

/// Register-addressed subset of the embedded-hal surface: the first written
/// byte is the register index.
///
/// Supported shapes are an empty write (address probe), a write of register
/// plus payload, and a one-byte write followed by a read. Anything else is
/// `Error::Invalid`.
impl<H: RegisterBus, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match operations {
            [Operation::Write(bytes)] => match bytes.split_first() {
                Some((&register, payload)) => self.transaction_write(address, register, payload),
                None => {
                    if self.bus.probe(address)? {
                        Ok(())
                    } else {
                        Err(Error::NoAck(NoAcknowledgeSource::Address))
                    }
                }
            },
            [Operation::Write(prefix), Operation::Read(buffer)] => match **prefix {
                [register] => self.transaction_read(address, register, buffer),
                _ => Err(Error::Invalid),
            },
            _ => Err(Error::Invalid),
        }
    }
}

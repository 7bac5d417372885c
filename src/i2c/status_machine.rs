// Licensed under the Apache-2.0 license

//! Status-driven I2C master.
//!
//! The controller raises an event after each bus action and reports what
//! just happened as a status code. The code alone identifies the phase of
//! the transaction, so the engine is a table from code to action
//! ([`read_step`], [`write_step`]) plus a loop that waits for events, applies
//! the action and clears the event.
//!
//! The only state carried between events is the buffer index and the cause
//! of the last restart; both live on the stack of the transaction call.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{address_byte, BusStatus, Direction, Error, I2cConfig};
use crate::i2c::traits::{check_len, RegisterBus, StatusController};
use crate::{log_debug, log_error};
use embedded_hal::i2c::{NoAcknowledgeSource, SevenBitAddress};

/// Why a transaction went back to START.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Retry {
    Arbitration,
    AddressNack,
    Unexpected,
}

impl Retry {
    /// Error reported when the retry ceiling runs out after this cause.
    fn exhausted(cause: Option<Self>) -> Error {
        match cause {
            Some(Retry::Arbitration) => Error::ArbitrationLost,
            Some(Retry::AddressNack) => Error::SlaveNack(NoAcknowledgeSource::Address),
            Some(Retry::Unexpected) | None => Error::Timeout,
        }
    }
}

/// Action the engine applies for one status code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepAction {
    /// Drop the START request and load an address byte.
    SendAddress(u8),
    /// Load the register index.
    SendRegister(u8),
    /// Load the next payload byte.
    SendPayload(u8),
    /// Raise the START request while holding the bus.
    RepeatedStart,
    /// Address accepted for reading; select the acknowledge for the first byte.
    AutoAck(bool),
    /// Store a byte that was acknowledged. `ack_next` selects the
    /// acknowledge for the byte that follows it.
    Receive { ack_next: bool },
    /// Store the final byte and issue STOP.
    ReceiveLast,
    /// All payload bytes sent; issue STOP.
    Finish,
    /// Reissue START without releasing the bus.
    Restart(Retry),
    /// Issue STOP, then START.
    StopAndRestart(Retry),
    /// Issue STOP and fail.
    Abort(Error),
}

/// Read table: `received` bytes of a `len`-byte buffer are already stored.
#[must_use]
pub fn read_step(
    status: BusStatus,
    address: SevenBitAddress,
    register: u8,
    received: usize,
    len: usize,
) -> StepAction {
    match status {
        BusStatus::Start => StepAction::SendAddress(address_byte(address, Direction::Write)),
        BusStatus::AddrWriteAck => StepAction::SendRegister(register),
        BusStatus::DataSentAck => StepAction::RepeatedStart,
        BusStatus::RepeatedStart => StepAction::SendAddress(address_byte(address, Direction::Read)),
        BusStatus::AddrReadAck => StepAction::AutoAck(len > 1),
        BusStatus::DataReceivedAck if received + 1 < len => StepAction::Receive {
            ack_next: received + 2 < len,
        },
        BusStatus::DataReceivedNack if received + 1 == len => StepAction::ReceiveLast,
        // Acknowledge policy and byte count disagree.
        BusStatus::DataReceivedAck | BusStatus::DataReceivedNack => {
            StepAction::StopAndRestart(Retry::Unexpected)
        }
        BusStatus::ArbitrationLost => StepAction::Restart(Retry::Arbitration),
        BusStatus::AddrReadNack | BusStatus::AddrWriteNack => {
            StepAction::StopAndRestart(Retry::AddressNack)
        }
        // A repeated START here would skip the register phase.
        BusStatus::DataSentNack => StepAction::StopAndRestart(Retry::Unexpected),
        // Still holding the bus, this comes back as RepeatedStart and skips the register phase.
        BusStatus::Idle | BusStatus::Other(_) => StepAction::Restart(Retry::Unexpected),
    }
}

/// Write table: `sent` payload bytes have already been loaded.
#[must_use]
pub fn write_step(
    status: BusStatus,
    address: SevenBitAddress,
    register: u8,
    bytes: &[u8],
    sent: usize,
) -> StepAction {
    match status {
        BusStatus::Start | BusStatus::RepeatedStart => {
            StepAction::SendAddress(address_byte(address, Direction::Write))
        }
        BusStatus::AddrWriteAck => StepAction::SendRegister(register),
        BusStatus::DataSentAck => match bytes.get(sent) {
            Some(&byte) => StepAction::SendPayload(byte),
            None => StepAction::Finish,
        },
        BusStatus::AddrWriteNack => StepAction::Restart(Retry::AddressNack),
        BusStatus::ArbitrationLost => StepAction::Restart(Retry::Arbitration),
        BusStatus::DataSentNack => StepAction::Abort(Error::SlaveNack(NoAcknowledgeSource::Data)),
        _ => StepAction::Restart(Retry::Unexpected),
    }
}

enum Transfer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl Transfer<'_> {
    fn len(&self) -> usize {
        match self {
            Transfer::Read(buffer) => buffer.len(),
            Transfer::Write(bytes) => bytes.len(),
        }
    }
}

pub struct StatusI2c<C, L = NoOpLogger> {
    controller: C,
    config: I2cConfig,
    logger: L,
}

impl<C: StatusController> StatusI2c<C, NoOpLogger> {
    pub fn new(controller: C, config: I2cConfig) -> Self {
        Self::with_logger(controller, config, NoOpLogger)
    }
}

impl<C: StatusController, L: Logger> StatusI2c<C, L> {
    pub fn with_logger(controller: C, config: I2cConfig, logger: L) -> Self {
        Self {
            controller,
            config,
            logger,
        }
    }

    pub fn release(self) -> C {
        self.controller
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    /// Poll the event flag, failing with `Timeout` once the number of
    /// empty polls exceeds `poll_limit`.
    fn wait_event(&mut self) -> Result<BusStatus, Error> {
        let limit = u32::from(self.config.poll_limit);
        let mut polls: u32 = 0;
        loop {
            match self.controller.poll_event() {
                Ok(code) => return Ok(BusStatus::from(code)),
                Err(nb::Error::WouldBlock) => {
                    polls += 1;
                    if polls > limit {
                        log_error!(self.logger, "i2c: no event after {} polls", polls);
                        return Err(Error::Timeout);
                    }
                }
                Err(nb::Error::Other(_)) => return Err(Error::Bus),
            }
        }
    }

    fn stop(&mut self) {
        self.controller.set_stop();
        self.controller.clear_event();
    }

    fn abort(&mut self, error: Error) -> Error {
        self.controller.set_start(false);
        self.stop();
        error
    }

    fn execute(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        mut transfer: Transfer<'_>,
    ) -> Result<(), Error> {
        let len = transfer.len();
        // Every clean frame needs a handful of events plus one per byte.
        let budget = u32::from(self.config.retry_limit).saturating_add(u32::from(check_len(len)?));
        let mut index = 0usize;
        let mut last_retry = None;

        self.controller.set_start(true);
        for _ in 0..budget {
            let status = match self.wait_event() {
                Ok(status) => status,
                Err(e) => return Err(self.abort(e)),
            };
            let action = match &transfer {
                Transfer::Read(buffer) => read_step(status, address, register, index, buffer.len()),
                Transfer::Write(bytes) => write_step(status, address, register, bytes, index),
            };
            match action {
                StepAction::SendAddress(byte) => {
                    self.controller.set_start(false);
                    self.controller.write_data(byte);
                }
                StepAction::SendRegister(byte) => self.controller.write_data(byte),
                StepAction::SendPayload(byte) => {
                    self.controller.write_data(byte);
                    index += 1;
                }
                StepAction::RepeatedStart => self.controller.set_start(true),
                StepAction::AutoAck(enable) => self.controller.set_auto_ack(enable),
                StepAction::Receive { ack_next } => {
                    self.store(&mut transfer, index);
                    index += 1;
                    if !ack_next {
                        self.controller.set_auto_ack(false);
                    }
                }
                StepAction::ReceiveLast => {
                    self.store(&mut transfer, index);
                    self.stop();
                    return Ok(());
                }
                StepAction::Finish => {
                    self.stop();
                    return Ok(());
                }
                StepAction::Restart(cause) | StepAction::StopAndRestart(cause) => {
                    log_debug!(
                        self.logger,
                        "i2c: restart ({:?}) on status 0x{:02x}",
                        cause,
                        status.code()
                    );
                    index = 0;
                    last_retry = Some(cause);
                    if matches!(action, StepAction::StopAndRestart(_)) {
                        self.controller.set_stop();
                    }
                    self.controller.set_start(true);
                }
                StepAction::Abort(error) => return Err(self.abort(error)),
            }
            self.controller.clear_event();
        }

        let error = Retry::exhausted(last_retry);
        log_error!(self.logger, "i2c: giving up on 0x{:02x}: {:?}", address, error);
        Err(self.abort(error))
    }

    fn store(&mut self, transfer: &mut Transfer<'_>, index: usize) {
        let byte = self.controller.read_data();
        if let Transfer::Read(buffer) = transfer {
            if let Some(slot) = buffer.get_mut(index) {
                *slot = byte;
            }
        }
    }
}

impl<C: StatusController, L: Logger> RegisterBus for StatusI2c<C, L> {
    fn bus_init(&mut self) -> Result<(), Error> {
        self.controller.enable().map_err(|_| Error::Bus)
    }

    fn bus_deinit(&mut self) -> Result<(), Error> {
        self.controller.disable().map_err(|_| Error::Bus)
    }

    fn transaction_read(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        if buffer.is_empty() {
            // Register pointer only.
            return self.execute(address, register, Transfer::Write(&[]));
        }
        self.execute(address, register, Transfer::Read(buffer))
    }

    fn transaction_write(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.execute(address, register, Transfer::Write(bytes))
    }

    fn probe(&mut self, address: SevenBitAddress) -> Result<bool, Error> {
        let mut last_retry = None;
        self.controller.set_start(true);
        for _ in 0..self.config.retry_limit {
            let status = match self.wait_event() {
                Ok(status) => status,
                Err(e) => return Err(self.abort(e)),
            };
            match status {
                BusStatus::Start | BusStatus::RepeatedStart => {
                    self.controller.set_start(false);
                    self.controller
                        .write_data(address_byte(address, Direction::Write));
                }
                BusStatus::AddrWriteAck => {
                    self.stop();
                    return Ok(true);
                }
                BusStatus::AddrWriteNack => {
                    self.stop();
                    return Ok(false);
                }
                BusStatus::ArbitrationLost => {
                    last_retry = Some(Retry::Arbitration);
                    self.controller.set_start(true);
                }
                _ => {
                    last_retry = Some(Retry::Unexpected);
                    self.controller.set_stop();
                    self.controller.set_start(true);
                }
            }
            self.controller.clear_event();
        }
        Err(self.abort(Retry::exhausted(last_retry)))
    }
}

// Licensed under the Apache-2.0 license

//! Common types and constants for the I2C master engine.
//!
//! This module provides shared definitions for error handling, controller
//! status codes, pin modes and transport configuration used by both the
//! bit-banged and the status-driven transports.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use fugit::MicrosDurationU32;

/// Default ceiling for every bounded poll loop.
pub const DEFAULT_POLL_LIMIT: u16 = 250;

/// Default ceiling for state machine iterations, including restarts.
pub const DEFAULT_RETRY_LIMIT: u16 = 250;

/// Errors reported by a bus transaction.
///
/// Every variant is returned with the bus already back in the idle state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Expected acknowledge bit was not observed within the poll ceiling.
    NoAck(NoAcknowledgeSource),
    /// Collisions kept occurring until the retry ceiling ran out.
    ArbitrationLost,
    /// The device actively rejected an address or data byte.
    SlaveNack(NoAcknowledgeSource),
    /// The controller never raised its event flag within the poll ceiling.
    Timeout,
    /// A pin or controller collaborator reported a failure.
    Bus,
    /// Argument out of range.
    Invalid,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Error::NoAck(source) | Error::SlaveNack(source) => ErrorKind::NoAcknowledge(source),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Error::Bus => ErrorKind::Bus,
            Error::Timeout | Error::Invalid => ErrorKind::Other,
        }
    }
}

/// Electrical mode of a bus pin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PinMode {
    OutputOpenDrain,
    OutputPushPull,
    InputPullUp,
}

/// Transfer direction encoded in bit 0 of the address byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// Build the address byte for a 7-bit address and a direction.
#[must_use]
pub const fn address_byte(address: u8, direction: Direction) -> u8 {
    ((address & 0x7f) << 1) | direction as u8
}

/// Controller-reported bus event, decoded from the status register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusStatus {
    Start,
    RepeatedStart,
    AddrWriteAck,
    AddrWriteNack,
    DataSentAck,
    DataSentNack,
    ArbitrationLost,
    AddrReadAck,
    AddrReadNack,
    DataReceivedAck,
    DataReceivedNack,
    Idle,
    Other(u8),
}

impl BusStatus {
    /// Raw status register value for this event.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            BusStatus::Start => 0x08,
            BusStatus::RepeatedStart => 0x10,
            BusStatus::AddrWriteAck => 0x18,
            BusStatus::AddrWriteNack => 0x20,
            BusStatus::DataSentAck => 0x28,
            BusStatus::DataSentNack => 0x30,
            BusStatus::ArbitrationLost => 0x38,
            BusStatus::AddrReadAck => 0x40,
            BusStatus::AddrReadNack => 0x48,
            BusStatus::DataReceivedAck => 0x50,
            BusStatus::DataReceivedNack => 0x58,
            BusStatus::Idle => 0xf8,
            BusStatus::Other(code) => code,
        }
    }
}

impl From<u8> for BusStatus {
    fn from(code: u8) -> Self {
        match code {
            0x08 => BusStatus::Start,
            0x10 => BusStatus::RepeatedStart,
            0x18 => BusStatus::AddrWriteAck,
            0x20 => BusStatus::AddrWriteNack,
            0x28 => BusStatus::DataSentAck,
            0x30 => BusStatus::DataSentNack,
            0x38 => BusStatus::ArbitrationLost,
            0x40 => BusStatus::AddrReadAck,
            0x48 => BusStatus::AddrReadNack,
            0x50 => BusStatus::DataReceivedAck,
            0x58 => BusStatus::DataReceivedNack,
            0xf8 => BusStatus::Idle,
            other => BusStatus::Other(other),
        }
    }
}

/// Hold times of the bit-banged waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// Hold around START and STOP edges.
    pub start_hold: MicrosDurationU32,
    /// Half period of a data or acknowledge clock pulse.
    pub bit_hold: MicrosDurationU32,
    /// Settle time after sampling or releasing SDA.
    pub sample_hold: MicrosDurationU32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            start_hold: MicrosDurationU32::micros(4),
            bit_hold: MicrosDurationU32::micros(2),
            sample_hold: MicrosDurationU32::micros(1),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    /// Ceiling for acknowledge polls and event-flag polls.
    pub poll_limit: u16,
    /// Ceiling for state machine iterations of one hardware transaction.
    pub retry_limit: u16,
    pub timing: TimingConfig,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    poll_limit: u16,
    retry_limit: u16,
    timing: Option<TimingConfig>,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_limit: DEFAULT_POLL_LIMIT,
            retry_limit: DEFAULT_RETRY_LIMIT,
            timing: None,
        }
    }
    #[must_use]
    pub fn poll_limit(mut self, limit: u16) -> Self {
        self.poll_limit = limit;
        self
    }
    #[must_use]
    pub fn retry_limit(mut self, limit: u16) -> Self {
        self.retry_limit = limit;
        self
    }
    #[must_use]
    pub fn timing_config(mut self, config: TimingConfig) -> Self {
        self.timing = Some(config);
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            poll_limit: self.poll_limit,
            retry_limit: self.retry_limit,
            timing: self.timing.unwrap_or_default(),
        }
    }
}

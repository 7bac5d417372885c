// Licensed under the Apache-2.0 license

//! # I2C Engine Abstraction Traits
//!
//! This module defines the seams of the I2C master engine: what it consumes
//! from the board and what it offers to device drivers.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! consumed by the engine
//!     ├── BusPin            (SCL / SDA line with switchable mode)
//!     ├── DelayNs           (embedded-hal, µs/ms busy waits)
//!     └── StatusController  (status-code reporting two-wire controller)
//!
//! offered by the engine
//!     └── RegisterBus       (register-addressed transactions)
//!         ├── BitBangI2c    (pins + delay)
//!         ├── StatusI2c     (status controller)
//!         └── BusSelect     (either of the above, chosen at runtime)
//! ```
//!
//! Transports own their pins or controller and every operation takes
//! `&mut self`, so two transactions can never interleave on one bus.

use crate::i2c::common::{Error, PinMode};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::SevenBitAddress;

/// A bus line that can be switched between driving and listening.
///
/// In `OutputOpenDrain` a high level releases the line to the pull-up; in
/// `InputPullUp` the line is released and [`InputPin`] samples the level
/// produced by the other devices on the bus.
pub trait BusPin: InputPin + OutputPin {
    /// Switch the electrical mode of the pin.
    ///
    /// # Errors
    ///
    /// Returns the pin error if the port rejects the configuration.
    fn configure(&mut self, mode: PinMode) -> Result<(), Self::Error>;
}

/// Register-level view of a two-wire controller that reports each completed
/// bus event through a status code.
///
/// The controller raises an event flag after every START, address byte, data
/// byte or error. While the flag is set the bus is frozen; software programs
/// the request bits and the data register, then clears the flag to let the
/// controller carry out the next action.
pub trait StatusController {
    type Error: core::fmt::Debug;

    /// Enable the peripheral and route the pins to it.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Disable the peripheral and release the pins.
    fn disable(&mut self) -> Result<(), Self::Error>;

    /// Status code of the last bus event, or `WouldBlock` while the event
    /// flag is still clear.
    fn poll_event(&mut self) -> nb::Result<u8, Self::Error>;

    /// Clear the event flag, letting the controller act on the request bits.
    fn clear_event(&mut self);

    /// Set or clear the START request bit.
    ///
    /// With the bus idle and no event pending, setting the bit generates a
    /// START immediately. With an event pending it is latched and produces a
    /// repeated START when the event is cleared.
    fn set_start(&mut self, enable: bool);

    /// Request a STOP on the next event clear.
    fn set_stop(&mut self);

    /// Select ACK (`true`) or NACK for the next received byte.
    fn set_auto_ack(&mut self, enable: bool);

    fn write_data(&mut self, byte: u8);

    fn read_data(&mut self) -> u8;
}

/// Register-addressed transactions against 7-bit I2C devices.
///
/// This is the surface device drivers use. Both transports implement it with
/// identical semantics so a driver never needs to know which one is behind.
///
/// # Examples
///
/// ```rust,ignore
/// use powermon_ddk::i2c::RegisterBus;
///
/// fn read_id<B: RegisterBus>(bus: &mut B) -> Result<u16, powermon_ddk::i2c::Error> {
///     let mut id = [0u8; 2];
///     bus.transaction_read(0x40, 0xfe, &mut id)?;
///     Ok(u16::from_be_bytes(id))
/// }
/// ```
pub trait RegisterBus {
    /// Configure the pins or controller and leave the bus idle.
    ///
    /// Calling it on an initialised bus is harmless.
    ///
    /// # Errors
    ///
    /// `Error::Bus` if a collaborator rejects the configuration.
    fn bus_init(&mut self) -> Result<(), Error>;

    /// Release the pins or controller. Idempotent.
    ///
    /// # Errors
    ///
    /// `Error::Bus` if a collaborator rejects the configuration.
    fn bus_deinit(&mut self) -> Result<(), Error>;

    /// Read `buffer.len()` bytes starting at register `register`.
    ///
    /// An empty buffer only sets the device's register pointer.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not acknowledge, arbitration keeps
    /// failing, the controller stops responding, or the buffer is longer than
    /// `u16::MAX`. The bus is idle when the error is returned.
    fn transaction_read(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error>;

    /// Write `bytes` starting at register `register`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`RegisterBus::transaction_read`].
    fn transaction_write(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Error>;

    /// Address the device and report whether it acknowledged.
    ///
    /// # Errors
    ///
    /// Only collaborator failures and timeouts; a missing device is `Ok(false)`.
    fn probe(&mut self, address: SevenBitAddress) -> Result<bool, Error>;
}

/// Reject transfers whose length does not fit the 16-bit length field.
pub(crate) fn check_len(len: usize) -> Result<u16, Error> {
    u16::try_from(len).map_err(|_| Error::Invalid)
}

// Licensed under the Apache-2.0 license

//! I2C master engine.
//!
//! Two transports with identical transaction semantics: [`BitBangI2c`] drives
//! the waveform on two GPIOs, [`StatusI2c`] steps a status-reporting two-wire
//! controller through a code table. Device drivers use either through
//! [`RegisterBus`].

pub mod bitbang;
pub mod bus_select;
pub mod common;
pub mod i2c_controller;
pub mod status_machine;
pub mod traits;

#[cfg(test)]
pub(crate) mod sim;

pub use bitbang::BitBangI2c;
pub use bus_select::BusSelect;
pub use common::{Error, I2cConfig, I2cConfigBuilder, PinMode, TimingConfig};
pub use i2c_controller::I2cController;
pub use status_machine::StatusI2c;
pub use traits::{BusPin, RegisterBus, StatusController};

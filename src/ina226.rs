// Licensed under the Apache-2.0 license

//! INA226 current, voltage and power monitor.
//!
//! All device registers are 16-bit big-endian and are accessed with one
//! register transaction each. The driver works on any [`RegisterBus`], so the
//! same code runs over the bit-banged and the controller-driven transport.
//!
//! Scaling follows the datasheet: shunt voltage LSB 2.5 µV, bus voltage LSB
//! 1.25 mV, current LSB chosen by the user, power LSB 25 × current LSB.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::{self, RegisterBus};
use crate::{log_debug, log_error};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::SevenBitAddress;
use zerocopy::byteorder::big_endian::{I16, U16};

pub const DEFAULT_ADDRESS: SevenBitAddress = 0x40;

pub const REG_CONFIG: u8 = 0x00;
pub const REG_SHUNT_VOLTAGE: u8 = 0x01;
pub const REG_BUS_VOLTAGE: u8 = 0x02;
pub const REG_POWER: u8 = 0x03;
pub const REG_CURRENT: u8 = 0x04;
pub const REG_CALIBRATION: u8 = 0x05;
pub const REG_MASK_ENABLE: u8 = 0x06;
pub const REG_ALERT_LIMIT: u8 = 0x07;
pub const REG_MANUFACTURER_ID: u8 = 0xfe;
pub const REG_DIE_ID: u8 = 0xff;

/// "TI" in ASCII.
pub const MANUFACTURER_ID: u16 = 0x5449;
pub const DIE_ID: u16 = 0x2260;

const CONFIG_RESET: u16 = 0x8000;
const CONFIG_FIXED: u16 = 0x4000;
const CONFIG_MODE_MASK: u16 = 0x0007;
const RESET_WAIT_MS: u32 = 10;

/// `0.00512 / (current_lsb * r_shunt)` with both factors in micro units.
const CALIBRATION_SCALE: u64 = 5_120_000_000;
const CALIBRATION_MAX: u16 = 0x7fff;

const MASK_AFF: u16 = 1 << 4;
const MASK_CVRF: u16 = 1 << 3;
const MASK_OVF: u16 = 1 << 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Bus(i2c::Error),
    /// Identification registers did not match an INA226.
    WrongDevice { manufacturer: u16, die: u16 },
    /// Shunt and current LSB give a calibration value outside 1..=0x7FFF.
    Calibration,
}

impl From<i2c::Error> for Error {
    fn from(e: i2c::Error) -> Self {
        Error::Bus(e)
    }
}

/// Number of samples averaged per result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Averaging {
    X1 = 0,
    X4 = 1,
    X16 = 2,
    X64 = 3,
    X128 = 4,
    X256 = 5,
    X512 = 6,
    X1024 = 7,
}

/// ADC conversion time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ConversionTime {
    Us140 = 0,
    Us204 = 1,
    Us332 = 2,
    Us588 = 3,
    Us1100 = 4,
    Us2116 = 5,
    Us4156 = 6,
    Us8244 = 7,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Mode {
    PowerDown = 0,
    ShuntTriggered = 1,
    BusTriggered = 2,
    ShuntBusTriggered = 3,
    ShuntContinuous = 5,
    BusContinuous = 6,
    ShuntBusContinuous = 7,
}

/// Alert functions of the MASK/ENABLE register. Only one is armed at a time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Alert {
    ShuntOverVoltage = 1 << 15,
    ShuntUnderVoltage = 1 << 14,
    BusOverVoltage = 1 << 13,
    BusUnderVoltage = 1 << 12,
    PowerOverLimit = 1 << 11,
    ConversionReady = 1 << 10,
}

impl Alert {
    const ALL: [Alert; 6] = [
        Alert::ShuntOverVoltage,
        Alert::ShuntUnderVoltage,
        Alert::BusOverVoltage,
        Alert::BusUnderVoltage,
        Alert::PowerOverLimit,
        Alert::ConversionReady,
    ];
}

/// Decoded MASK/ENABLE register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AlertFlags {
    /// Armed alert function, if any.
    pub armed: Option<Alert>,
    /// The armed function tripped.
    pub alert: bool,
    pub conversion_ready: bool,
    /// Power or current computation overflowed.
    pub overflow: bool,
}

impl From<u16> for AlertFlags {
    fn from(raw: u16) -> Self {
        Self {
            armed: Alert::ALL.into_iter().find(|a| raw & *a as u16 != 0),
            alert: raw & MASK_AFF != 0,
            conversion_ready: raw & MASK_CVRF != 0,
            overflow: raw & MASK_OVF != 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Measurement {
    pub bus_mv: f32,
    pub shunt_uv: f32,
    pub current_ma: f32,
    pub power_mw: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ina226Config {
    pub shunt_micro_ohm: u32,
    pub current_lsb_ua: u32,
    pub averaging: Averaging,
    pub bus_conversion: ConversionTime,
    pub shunt_conversion: ConversionTime,
    pub mode: Mode,
}

impl Default for Ina226Config {
    fn default() -> Self {
        Ina226ConfigBuilder::new().build()
    }
}

impl Ina226Config {
    /// CONFIG register value for these settings.
    #[must_use]
    pub fn config_word(&self) -> u16 {
        CONFIG_FIXED
            | (self.averaging as u16) << 9
            | (self.bus_conversion as u16) << 6
            | (self.shunt_conversion as u16) << 3
            | self.mode as u16
    }

    /// CALIBRATION register value for these settings.
    ///
    /// # Errors
    ///
    /// `Error::Calibration` when the value is zero or does not fit 15 bits.
    pub fn calibration(&self) -> Result<u16, Error> {
        let denominator = u64::from(self.current_lsb_ua) * u64::from(self.shunt_micro_ohm);
        if denominator == 0 {
            return Err(Error::Calibration);
        }
        match u16::try_from(CALIBRATION_SCALE / denominator) {
            Ok(cal) if (1..=CALIBRATION_MAX).contains(&cal) => Ok(cal),
            _ => Err(Error::Calibration),
        }
    }
}

/// Defaults: 0.1 Ω shunt, 1 mA LSB, 4 samples, 1.1 ms conversions,
/// continuous shunt and bus measurement.
pub struct Ina226ConfigBuilder {
    config: Ina226Config,
}

impl Default for Ina226ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Ina226ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Ina226Config {
                shunt_micro_ohm: 100_000,
                current_lsb_ua: 1_000,
                averaging: Averaging::X4,
                bus_conversion: ConversionTime::Us1100,
                shunt_conversion: ConversionTime::Us1100,
                mode: Mode::ShuntBusContinuous,
            },
        }
    }
    #[must_use]
    pub fn shunt_micro_ohm(mut self, value: u32) -> Self {
        self.config.shunt_micro_ohm = value;
        self
    }
    #[must_use]
    pub fn current_lsb_ua(mut self, value: u32) -> Self {
        self.config.current_lsb_ua = value;
        self
    }
    #[must_use]
    pub fn averaging(mut self, averaging: Averaging) -> Self {
        self.config.averaging = averaging;
        self
    }
    #[must_use]
    pub fn conversion_times(mut self, bus: ConversionTime, shunt: ConversionTime) -> Self {
        self.config.bus_conversion = bus;
        self.config.shunt_conversion = shunt;
        self
    }
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }
    #[must_use]
    pub fn build(self) -> Ina226Config {
        self.config
    }
}

pub struct Ina226<B: RegisterBus, L: Logger = NoOpLogger> {
    bus: B,
    address: SevenBitAddress,
    config: Ina226Config,
    logger: L,
}

impl<B: RegisterBus, L: Logger> Ina226<B, L> {
    pub fn new(bus: B, address: SevenBitAddress, config: Ina226Config, logger: L) -> Self {
        Self {
            bus,
            address,
            config,
            logger,
        }
    }

    pub fn release(self) -> B {
        self.bus
    }

    pub fn config(&self) -> &Ina226Config {
        &self.config
    }

    /// Bring the bus up, check the chip identity, reset it and program
    /// configuration and calibration.
    ///
    /// # Errors
    ///
    /// `Calibration` before any bus traffic if the settings are unusable,
    /// `WrongDevice` if the identification registers do not match, `Bus`
    /// for transport failures.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        let calibration = self.config.calibration()?;
        self.bus.bus_init()?;

        let manufacturer = self.read_register(REG_MANUFACTURER_ID)?;
        let die = self.read_register(REG_DIE_ID)?;
        if manufacturer != MANUFACTURER_ID || die != DIE_ID {
            log_error!(
                self.logger,
                "ina226: unexpected id {:04x}/{:04x} at 0x{:02x}",
                manufacturer,
                die,
                self.address
            );
            return Err(Error::WrongDevice { manufacturer, die });
        }

        self.write_register(REG_CONFIG, CONFIG_RESET)?;
        delay.delay_ms(RESET_WAIT_MS);
        self.write_register(REG_CONFIG, self.config.config_word())?;
        self.write_register(REG_CALIBRATION, calibration)?;
        log_debug!(
            self.logger,
            "ina226: config {:04x} calibration {}",
            self.config.config_word(),
            calibration
        );
        Ok(())
    }

    /// Read and scale shunt voltage, bus voltage, current and power.
    pub fn read(&mut self) -> Result<Measurement, Error> {
        let shunt = self.read_signed(REG_SHUNT_VOLTAGE)?;
        let bus = self.read_register(REG_BUS_VOLTAGE)?;
        let current = self.read_signed(REG_CURRENT)?;
        let power = self.read_register(REG_POWER)?;

        let lsb_ma = self.config.current_lsb_ua as f32 / 1000.0;
        Ok(Measurement {
            bus_mv: f32::from(bus) * 1.25,
            shunt_uv: f32::from(shunt) * 2.5,
            current_ma: f32::from(current) * lsb_ma,
            power_mw: f32::from(power) * 25.0 * lsb_ma,
        })
    }

    /// Arm one alert function with its raw limit.
    pub fn set_alert(&mut self, alert: Alert, limit: u16) -> Result<(), Error> {
        self.write_register(REG_ALERT_LIMIT, limit)?;
        self.write_register(REG_MASK_ENABLE, alert as u16)
    }

    /// Read MASK/ENABLE. Reading clears the alert flag on the device.
    pub fn alert_flags(&mut self) -> Result<AlertFlags, Error> {
        let flags = AlertFlags::from(self.read_register(REG_MASK_ENABLE)?);
        if flags.alert {
            log_debug!(self.logger, "ina226: alert {:?} tripped", flags.armed);
        }
        if flags.conversion_ready {
            log_debug!(self.logger, "ina226: conversion ready");
        }
        if flags.overflow {
            log_debug!(self.logger, "ina226: math overflow");
        }
        Ok(flags)
    }

    /// Put the device into power-down and release the bus.
    pub fn deinit(&mut self) -> Result<(), Error> {
        let config = self.read_register(REG_CONFIG)?;
        self.write_register(REG_CONFIG, (config & !CONFIG_MODE_MASK) | Mode::PowerDown as u16)?;
        self.bus.bus_deinit()?;
        Ok(())
    }

    pub fn read_register(&mut self, register: u8) -> Result<u16, Error> {
        let mut raw = [0u8; 2];
        self.bus.transaction_read(self.address, register, &mut raw)?;
        Ok(U16::from_bytes(raw).get())
    }

    fn read_signed(&mut self, register: u8) -> Result<i16, Error> {
        let mut raw = [0u8; 2];
        self.bus.transaction_read(self.address, register, &mut raw)?;
        Ok(I16::from_bytes(raw).get())
    }

    pub fn write_register(&mut self, register: u8, value: u16) -> Result<(), Error> {
        self.bus
            .transaction_write(self.address, register, &U16::new(value).to_bytes())?;
        Ok(())
    }
}

// Licensed under the Apache-2.0 license

//! Software-timed I2C master.
//!
//! SCL and SDA are plain GPIOs; every edge of the waveform is produced by a
//! pin write followed by a busy-wait from the delay provider. SDA is switched
//! to an input with pull-up whenever the device owns the line (acknowledge
//! slots and read data), and back to an open-drain output otherwise.
//!
//! SDA only ever changes while SCL is low, except for the falling edge of a
//! START and the rising edge of a STOP.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{address_byte, Direction, Error, I2cConfig, PinMode};
use crate::i2c::traits::{check_len, BusPin, RegisterBus};
use crate::log_debug;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{NoAcknowledgeSource, SevenBitAddress};
use fugit::MicrosDurationU32;

pub struct BitBangI2c<SCL, SDA, D, L = NoOpLogger> {
    scl: SCL,
    sda: SDA,
    delay: D,
    config: I2cConfig,
    logger: L,
}

impl<SCL: BusPin, SDA: BusPin, D: DelayNs> BitBangI2c<SCL, SDA, D, NoOpLogger> {
    pub fn new(scl: SCL, sda: SDA, delay: D, config: I2cConfig) -> Self {
        Self::with_logger(scl, sda, delay, config, NoOpLogger)
    }
}

impl<SCL: BusPin, SDA: BusPin, D: DelayNs, L: Logger> BitBangI2c<SCL, SDA, D, L> {
    pub fn with_logger(scl: SCL, sda: SDA, delay: D, config: I2cConfig, logger: L) -> Self {
        Self {
            scl,
            sda,
            delay,
            config,
            logger,
        }
    }

    /// Return the pins and the delay provider.
    pub fn release(self) -> (SCL, SDA, D) {
        (self.scl, self.sda, self.delay)
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    fn scl(&mut self, high: bool) -> Result<(), Error> {
        if high {
            self.scl.set_high().map_err(|_| Error::Bus)
        } else {
            self.scl.set_low().map_err(|_| Error::Bus)
        }
    }

    fn sda(&mut self, high: bool) -> Result<(), Error> {
        if high {
            self.sda.set_high().map_err(|_| Error::Bus)
        } else {
            self.sda.set_low().map_err(|_| Error::Bus)
        }
    }

    fn sda_mode(&mut self, mode: PinMode) -> Result<(), Error> {
        self.sda.configure(mode).map_err(|_| Error::Bus)
    }

    fn sda_is_high(&mut self) -> Result<bool, Error> {
        self.sda.is_high().map_err(|_| Error::Bus)
    }

    fn hold(&mut self, duration: MicrosDurationU32) {
        self.delay.delay_us(duration.to_micros());
    }

    /// Generate a START (or repeated START) condition.
    ///
    /// Leaves SCL low with SDA driven low, ready for the address byte.
    pub fn start(&mut self) -> Result<(), Error> {
        let hold = self.config.timing.start_hold;
        self.sda_mode(PinMode::OutputOpenDrain)?;
        self.sda(true)?;
        self.scl(true)?;
        self.hold(hold);
        self.sda(false)?;
        self.hold(hold);
        self.scl(false)
    }

    /// Generate a STOP condition. Both lines end high.
    pub fn stop(&mut self) -> Result<(), Error> {
        let hold = self.config.timing.start_hold;
        self.sda_mode(PinMode::OutputOpenDrain)?;
        self.scl(false)?;
        self.sda(false)?;
        self.hold(hold);
        self.scl(true)?;
        self.hold(hold);
        self.sda(true)?;
        self.hold(hold);
        Ok(())
    }

    /// Clock out one byte, MSB first. The acknowledge slot is left to
    /// [`Self::wait_ack`].
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        let hold = self.config.timing.bit_hold;
        self.sda_mode(PinMode::OutputOpenDrain)?;
        self.scl(false)?;
        for bit in (0..8).rev() {
            self.sda((byte >> bit) & 1 != 0)?;
            self.hold(hold);
            self.scl(true)?;
            self.hold(hold);
            self.scl(false)?;
            self.hold(hold);
        }
        Ok(())
    }

    /// Clock in one byte, MSB first. SCL is left high after the last bit;
    /// the caller follows up with [`Self::send_ack`].
    pub fn read_byte(&mut self) -> Result<u8, Error> {
        let timing = self.config.timing;
        self.sda_mode(PinMode::InputPullUp)?;
        let mut byte = 0u8;
        for _ in 0..8 {
            self.scl(false)?;
            self.hold(timing.bit_hold);
            self.scl(true)?;
            byte <<= 1;
            if self.sda_is_high()? {
                byte |= 1;
            }
            self.hold(timing.sample_hold);
        }
        Ok(byte)
    }

    /// Drive the acknowledge slot after a received byte: low for ACK, high
    /// for NACK.
    pub fn send_ack(&mut self, nack: bool) -> Result<(), Error> {
        let hold = self.config.timing.bit_hold;
        self.scl(false)?;
        self.sda_mode(PinMode::OutputOpenDrain)?;
        self.sda(nack)?;
        self.hold(hold);
        self.scl(true)?;
        self.hold(hold);
        self.scl(false)
    }

    /// Release SDA, raise SCL and wait for the device to pull SDA low.
    ///
    /// SDA is sampled until it reads low; once the number of high samples
    /// exceeds `poll_limit` a STOP is generated and `Error::NoAck(source)`
    /// is returned, so the bus is idle whenever this fails.
    pub fn wait_ack(&mut self, source: NoAcknowledgeSource) -> Result<(), Error> {
        let settle = self.config.timing.sample_hold;
        self.sda_mode(PinMode::InputPullUp)?;
        self.sda(true)?;
        self.hold(settle);
        self.scl(true)?;
        self.hold(settle);

        let limit = u32::from(self.config.poll_limit);
        let mut polls: u32 = 0;
        while self.sda_is_high()? {
            polls += 1;
            if polls > limit {
                self.stop()?;
                log_debug!(self.logger, "i2c: no ack ({:?}) after {} polls", source, polls);
                return Err(Error::NoAck(source));
            }
        }
        self.scl(false)
    }

    fn write_frame(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.start()?;
        self.write_byte(address_byte(address, Direction::Write))?;
        self.wait_ack(NoAcknowledgeSource::Address)?;
        self.write_byte(register)?;
        self.wait_ack(NoAcknowledgeSource::Data)?;
        for &byte in bytes {
            self.write_byte(byte)?;
            self.wait_ack(NoAcknowledgeSource::Data)?;
        }
        self.stop()
    }

    fn read_frame(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.start()?;
        self.write_byte(address_byte(address, Direction::Write))?;
        self.wait_ack(NoAcknowledgeSource::Address)?;
        self.write_byte(register)?;
        self.wait_ack(NoAcknowledgeSource::Data)?;
        if buffer.is_empty() {
            return self.stop();
        }

        self.start()?;
        self.write_byte(address_byte(address, Direction::Read))?;
        self.wait_ack(NoAcknowledgeSource::Address)?;
        let last = buffer.len() - 1;
        for (index, slot) in buffer.iter_mut().enumerate() {
            *slot = self.read_byte()?;
            self.send_ack(index == last)?;
        }
        self.stop()
    }

    fn probe_frame(&mut self, address: SevenBitAddress) -> Result<bool, Error> {
        self.start()?;
        self.write_byte(address_byte(address, Direction::Write))?;
        match self.wait_ack(NoAcknowledgeSource::Address) {
            Ok(()) => {
                self.stop()?;
                Ok(true)
            }
            Err(Error::NoAck(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Protocol failures already end in STOP; pin failures may strike
    /// mid-frame, so try to put the bus back to idle.
    fn settle<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if matches!(result, Err(Error::Bus)) {
            let _ = self.stop();
        }
        result
    }
}

impl<SCL: BusPin, SDA: BusPin, D: DelayNs, L: Logger> RegisterBus for BitBangI2c<SCL, SDA, D, L> {
    fn bus_init(&mut self) -> Result<(), Error> {
        self.scl
            .configure(PinMode::OutputOpenDrain)
            .map_err(|_| Error::Bus)?;
        self.sda_mode(PinMode::OutputOpenDrain)?;
        self.sda(true)?;
        self.scl(true)
    }

    fn bus_deinit(&mut self) -> Result<(), Error> {
        self.scl
            .configure(PinMode::InputPullUp)
            .map_err(|_| Error::Bus)?;
        self.sda_mode(PinMode::InputPullUp)
    }

    fn transaction_read(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        check_len(buffer.len())?;
        let result = self.read_frame(address, register, buffer);
        self.settle(result)
    }

    fn transaction_write(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Error> {
        check_len(bytes.len())?;
        let result = self.write_frame(address, register, bytes);
        self.settle(result)
    }

    fn probe(&mut self, address: SevenBitAddress) -> Result<bool, Error> {
        let result = self.probe_frame(address);
        self.settle(result)
    }
}

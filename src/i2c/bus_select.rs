// Licensed under the Apache-2.0 license

//! # Runtime transport selection
//!
//! Boards that decide between the bit-banged and the controller-driven
//! transport at start-up (strap pin, config word) need one concrete type that
//! can hold either. Generic code cannot, since `BitBangI2c<..>` and
//! `StatusI2c<..>` are unrelated types, and boxing a trait object needs an
//! allocator.
//!
//! [`BusSelect`] is a plain enum over the two. It is stack allocated, costs one
//! match per call, and implements [`RegisterBus`] itself so drivers take it
//! like any other bus:
//!
//! ```rust,ignore
//! let bus = if strap.is_high()? {
//!     BusSelect::Hardware(StatusI2c::new(twi, config))
//! } else {
//!     BusSelect::BitBang(BitBangI2c::new(scl, sda, delay, config))
//! };
//! let mut sensor = Ina226::new(bus, 0x40, Ina226Config::default(), NoOpLogger);
//! ```

use crate::i2c::common::Error;
use crate::i2c::traits::RegisterBus;
use embedded_hal::i2c::SevenBitAddress;

pub enum BusSelect<B, H> {
    BitBang(B),
    Hardware(H),
}

impl<B: RegisterBus, H: RegisterBus> BusSelect<B, H> {
    /// Borrow the selected transport as a trait object.
    pub fn as_bus_mut(&mut self) -> &mut dyn RegisterBus {
        match self {
            BusSelect::BitBang(bus) => bus,
            BusSelect::Hardware(bus) => bus,
        }
    }

    #[must_use]
    pub fn is_bit_bang(&self) -> bool {
        matches!(self, BusSelect::BitBang(_))
    }
}

impl<B: RegisterBus, H: RegisterBus> RegisterBus for BusSelect<B, H> {
    fn bus_init(&mut self) -> Result<(), Error> {
        self.as_bus_mut().bus_init()
    }

    fn bus_deinit(&mut self) -> Result<(), Error> {
        self.as_bus_mut().bus_deinit()
    }

    fn transaction_read(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.as_bus_mut().transaction_read(address, register, buffer)
    }

    fn transaction_write(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.as_bus_mut().transaction_write(address, register, bytes)
    }

    fn probe(&mut self, address: SevenBitAddress) -> Result<bool, Error> {
        self.as_bus_mut().probe(address)
    }
}

// Licensed under the Apache-2.0 license

//! Host-side bus simulators for unit tests.
//!
//! - [`SimBus`] models two open-drain lines with pull-ups (wired-AND) and a
//!   register-addressed device that decodes START/STOP and bits purely from
//!   line edges, the way a real target does.
//! - [`SimController`] models a status-reporting two-wire controller talking
//!   to the same kind of register device.
//! - [`ScriptedController`] replays a fixed list of status codes and records
//!   every request, for exercising the status table in isolation.

use crate::i2c::common::PinMode;
use crate::i2c::traits::{BusPin, StatusController};
use core::convert::Infallible;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEvent {
    Start,
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlaveState {
    Idle,
    Address,
    Receive,
    AckSlot { read: bool },
    Transmit,
    MasterAck { ack: bool },
    Ignore,
}

/// Register device driven by line edges.
pub struct SimSlave {
    pub address: u8,
    pub ack_address: bool,
    /// Acknowledge this many data bytes per frame (register byte included),
    /// then NACK.
    pub nack_after: Option<usize>,
    pub registers: [u8; 256],
    pub pointer: u8,
    /// Every byte clocked in from the master, address bytes included.
    pub received: Vec<u8>,
    /// Acknowledge bits the master returned for transmitted bytes.
    pub master_acks: Vec<bool>,
    state: SlaveState,
    shift: u8,
    bits: u8,
    tx: u8,
    rx_count: usize,
    pulling: bool,
}

impl SimSlave {
    fn new(address: u8) -> Self {
        Self {
            address,
            ack_address: true,
            nack_after: None,
            registers: [0; 256],
            pointer: 0,
            received: Vec::new(),
            master_acks: Vec::new(),
            state: SlaveState::Idle,
            shift: 0,
            bits: 0,
            tx: 0,
            rx_count: 0,
            pulling: false,
        }
    }

    fn on_start(&mut self) {
        self.state = SlaveState::Address;
        self.shift = 0;
        self.bits = 0;
        self.rx_count = 0;
        self.pulling = false;
    }

    fn on_stop(&mut self) {
        self.state = SlaveState::Idle;
        self.pulling = false;
    }

    fn on_rise(&mut self, sda: bool) {
        match self.state {
            SlaveState::Address | SlaveState::Receive => {
                self.shift = (self.shift << 1) | u8::from(sda);
                self.bits += 1;
            }
            SlaveState::Transmit => self.bits += 1,
            SlaveState::MasterAck { .. } => {
                let ack = !sda;
                self.master_acks.push(ack);
                self.state = SlaveState::MasterAck { ack };
            }
            _ => {}
        }
    }

    fn on_fall(&mut self) {
        match self.state {
            SlaveState::Address if self.bits == 8 => {
                let byte = self.shift;
                self.received.push(byte);
                if byte >> 1 == self.address && self.ack_address {
                    self.pulling = true;
                    self.state = SlaveState::AckSlot {
                        read: byte & 1 == 1,
                    };
                } else {
                    self.state = SlaveState::Ignore;
                }
            }
            SlaveState::Receive if self.bits == 8 => {
                let byte = self.shift;
                self.received.push(byte);
                self.rx_count += 1;
                let accept = self.nack_after.map_or(true, |n| self.rx_count <= n);
                if accept {
                    if self.rx_count == 1 {
                        self.pointer = byte;
                    } else {
                        self.registers[usize::from(self.pointer)] = byte;
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                    self.pulling = true;
                    self.state = SlaveState::AckSlot { read: false };
                } else {
                    self.state = SlaveState::Ignore;
                }
            }
            SlaveState::AckSlot { read } => {
                self.pulling = false;
                if read {
                    self.load_tx();
                } else {
                    self.state = SlaveState::Receive;
                    self.shift = 0;
                    self.bits = 0;
                }
            }
            SlaveState::Transmit => {
                if self.bits < 8 {
                    self.pulling = (self.tx >> (7 - self.bits)) & 1 == 0;
                } else {
                    self.pulling = false;
                    self.state = SlaveState::MasterAck { ack: false };
                }
            }
            SlaveState::MasterAck { ack } => {
                if ack {
                    self.load_tx();
                } else {
                    self.state = SlaveState::Ignore;
                }
            }
            _ => {}
        }
    }

    fn load_tx(&mut self) {
        self.tx = self.registers[usize::from(self.pointer)];
        self.pointer = self.pointer.wrapping_add(1);
        self.bits = 0;
        self.state = SlaveState::Transmit;
        self.pulling = self.tx & 0x80 == 0;
    }
}

pub struct BusState {
    pub scl_mode: PinMode,
    pub sda_mode: PinMode,
    scl_latch: bool,
    sda_latch: bool,
    scl_level: bool,
    sda_level: bool,
    pub slave: SimSlave,
    pub events: Vec<LineEvent>,
    /// Number of SDA samples taken by the master.
    pub sda_reads: usize,
    /// Level writes to SCL so far.
    pub scl_writes: usize,
    /// Reject the SCL level write with this 1-based count.
    pub fail_scl_write: Option<usize>,
}

impl BusState {
    pub fn is_idle(&self) -> bool {
        self.scl_level && self.sda_level
    }

    fn resolve(&self) -> (bool, bool) {
        let driven = |mode: PinMode, latch: bool| mode == PinMode::InputPullUp || latch;
        let scl = driven(self.scl_mode, self.scl_latch);
        let sda = driven(self.sda_mode, self.sda_latch) && !self.slave.pulling;
        (scl, sda)
    }

    fn settle(&mut self) {
        let (scl, sda) = self.resolve();
        if scl != self.scl_level {
            self.scl_level = scl;
            if scl {
                self.slave.on_rise(sda);
            } else {
                self.slave.on_fall();
            }
            // The device only moves SDA while SCL is low.
            self.sda_level = self.resolve().1;
        } else if sda != self.sda_level {
            self.sda_level = sda;
            if scl {
                if sda {
                    self.events.push(LineEvent::Stop);
                    self.slave.on_stop();
                } else {
                    self.events.push(LineEvent::Start);
                    self.slave.on_start();
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct SimBus {
    state: Rc<RefCell<BusState>>,
}

impl SimBus {
    pub fn new(device_address: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                scl_mode: PinMode::InputPullUp,
                sda_mode: PinMode::InputPullUp,
                scl_latch: true,
                sda_latch: true,
                scl_level: true,
                sda_level: true,
                slave: SimSlave::new(device_address),
                events: Vec::new(),
                sda_reads: 0,
                scl_writes: 0,
                fail_scl_write: None,
            })),
        }
    }

    pub fn scl(&self) -> SimPin {
        SimPin {
            state: self.state.clone(),
            line: Line::Scl,
        }
    }

    pub fn sda(&self) -> SimPin {
        SimPin {
            state: self.state.clone(),
            line: Line::Sda,
        }
    }

    pub fn state(&self) -> Ref<'_, BusState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, BusState> {
        self.state.borrow_mut()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Line {
    Scl,
    Sda,
}

pub struct SimPin {
    state: Rc<RefCell<BusState>>,
    line: Line,
}

impl SimPin {
    fn set_latch(&mut self, high: bool) -> Result<(), SimFault> {
        let mut state = self.state.borrow_mut();
        match self.line {
            Line::Scl => {
                state.scl_writes += 1;
                if state.fail_scl_write == Some(state.scl_writes) {
                    return Err(SimFault);
                }
                state.scl_latch = high;
            }
            Line::Sda => state.sda_latch = high,
        }
        state.settle();
        Ok(())
    }

    fn level(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        match self.line {
            Line::Scl => state.scl_level,
            Line::Sda => {
                state.sda_reads += 1;
                state.sda_level
            }
        }
    }
}

/// Injected collaborator failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimFault;

impl embedded_hal::digital::Error for SimFault {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = SimFault;
}

impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_latch(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_latch(true)
    }
}

impl embedded_hal::digital::InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

impl BusPin for SimPin {
    fn configure(&mut self, mode: PinMode) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        match self.line {
            Line::Scl => state.scl_mode = mode,
            Line::Sda => state.sda_mode = mode,
        }
        state.settle();
        Ok(())
    }
}

/// Delay provider that only accumulates the requested time.
#[derive(Clone, Default)]
pub struct SimDelay {
    ns: Rc<Cell<u64>>,
}

impl SimDelay {
    pub fn total_us(&self) -> u64 {
        self.ns.get() / 1_000
    }
}

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.ns.set(self.ns.get() + u64::from(ns));
    }
}

/// What a controller put on the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    RepeatedStart,
    Stop,
    Address(u8),
    Write(u8),
    Read { ack: bool },
}

/// Register device behind a [`SimController`].
pub struct SimDevice {
    pub address: u8,
    pub ack_address: bool,
    /// Reject this many SLA+R attempts before accepting one.
    pub nack_address_reads: usize,
    /// Acknowledge this many data bytes per frame (register byte included).
    pub nack_after: Option<usize>,
    pub registers: [u8; 256],
    pub pointer: u8,
    rx_count: usize,
}

impl SimDevice {
    fn select(&mut self, byte: u8) -> bool {
        if byte >> 1 != self.address || !self.ack_address {
            return false;
        }
        if byte & 1 == 1 && self.nack_address_reads > 0 {
            self.nack_address_reads -= 1;
            return false;
        }
        self.rx_count = 0;
        true
    }

    fn write(&mut self, byte: u8) -> bool {
        self.rx_count += 1;
        if self.nack_after.is_some_and(|n| self.rx_count > n) {
            return false;
        }
        if self.rx_count == 1 {
            self.pointer = byte;
        } else {
            self.registers[usize::from(self.pointer)] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        true
    }

    fn read(&mut self) -> u8 {
        let byte = self.registers[usize::from(self.pointer)];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Address,
    Transmit,
    Receive,
    Hold,
}

/// Status-reporting controller simulation.
pub struct SimController {
    pub enabled: bool,
    pub device: SimDevice,
    pub commands: Vec<Command>,
    /// Number of `poll_event` calls.
    pub polls: usize,
    /// Never complete a START, so no event is ever raised.
    pub stall: bool,
    /// Report arbitration loss for this many address bytes.
    pub lose_arbitration: usize,
    /// Status register reads fail once a START has been generated.
    pub fail_poll: bool,
    /// Enabling or disabling the peripheral fails.
    pub fail_power: bool,
    sta: bool,
    sto: bool,
    aa: bool,
    data: u8,
    event: Option<u8>,
    owner: bool,
    phase: Phase,
}

impl SimController {
    pub fn new(device_address: u8) -> Self {
        Self {
            enabled: false,
            device: SimDevice {
                address: device_address,
                ack_address: true,
                nack_address_reads: 0,
                nack_after: None,
                registers: [0; 256],
                pointer: 0,
                rx_count: 0,
            },
            commands: Vec::new(),
            polls: 0,
            stall: false,
            lose_arbitration: 0,
            fail_poll: false,
            fail_power: false,
            sta: false,
            sto: false,
            aa: false,
            data: 0,
            event: None,
            owner: false,
            phase: Phase::Idle,
        }
    }

    /// Bus released and nothing pending.
    pub fn is_idle(&self) -> bool {
        !self.owner && self.event.is_none() && !self.sta && !self.sto
    }

    pub fn count(&self, command: Command) -> usize {
        self.commands.iter().filter(|c| **c == command).count()
    }

    fn generate_start(&mut self) {
        if self.stall {
            return;
        }
        self.commands.push(Command::Start);
        self.owner = true;
        self.phase = Phase::Address;
        self.event = Some(0x08);
    }
}

impl StatusController for SimController {
    type Error = SimFault;

    fn enable(&mut self) -> Result<(), Self::Error> {
        if self.fail_power {
            return Err(SimFault);
        }
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        if self.fail_power {
            return Err(SimFault);
        }
        self.enabled = false;
        Ok(())
    }

    fn poll_event(&mut self) -> nb::Result<u8, Self::Error> {
        self.polls += 1;
        if self.fail_poll && self.owner {
            return Err(nb::Error::Other(SimFault));
        }
        self.event.ok_or(nb::Error::WouldBlock)
    }

    fn clear_event(&mut self) {
        self.event = None;
        if self.sto {
            self.sto = false;
            self.commands.push(Command::Stop);
            self.owner = false;
            self.phase = Phase::Idle;
            if self.sta {
                self.generate_start();
            }
            return;
        }
        if self.sta {
            if self.owner {
                self.commands.push(Command::RepeatedStart);
                self.phase = Phase::Address;
                self.event = Some(0x10);
            } else {
                self.generate_start();
            }
            return;
        }
        match self.phase {
            Phase::Address => {
                let byte = self.data;
                self.commands.push(Command::Address(byte));
                if self.lose_arbitration > 0 {
                    self.lose_arbitration -= 1;
                    self.owner = false;
                    self.phase = Phase::Idle;
                    self.event = Some(0x38);
                    return;
                }
                let read = byte & 1 == 1;
                let ack = self.device.select(byte);
                self.phase = match (ack, read) {
                    (true, true) => Phase::Receive,
                    (true, false) => Phase::Transmit,
                    (false, _) => Phase::Hold,
                };
                self.event = Some(match (read, ack) {
                    (false, true) => 0x18,
                    (false, false) => 0x20,
                    (true, true) => 0x40,
                    (true, false) => 0x48,
                });
            }
            Phase::Transmit => {
                let byte = self.data;
                self.commands.push(Command::Write(byte));
                let ack = self.device.write(byte);
                if !ack {
                    self.phase = Phase::Hold;
                }
                self.event = Some(if ack { 0x28 } else { 0x30 });
            }
            Phase::Receive => {
                self.data = self.device.read();
                self.commands.push(Command::Read { ack: self.aa });
                if !self.aa {
                    self.phase = Phase::Hold;
                }
                self.event = Some(if self.aa { 0x50 } else { 0x58 });
            }
            Phase::Idle | Phase::Hold => {}
        }
    }

    fn set_start(&mut self, enable: bool) {
        self.sta = enable;
        if enable && self.event.is_none() && !self.owner {
            self.generate_start();
        }
    }

    fn set_stop(&mut self) {
        self.sto = true;
    }

    fn set_auto_ack(&mut self, enable: bool) {
        self.aa = enable;
    }

    fn write_data(&mut self, byte: u8) {
        self.data = byte;
    }

    fn read_data(&mut self) -> u8 {
        self.data
    }
}

/// Register access requested by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    Start(bool),
    Stop,
    AutoAck(bool),
    Data(u8),
    Clear,
}

/// Controller replaying scripted status codes, one per event.
pub struct ScriptedController {
    pub script: VecDeque<u8>,
    pub requests: Vec<Request>,
    /// Value returned by every `read_data`; incremented after each read.
    pub next_read: u8,
    event: Option<u8>,
}

impl ScriptedController {
    pub fn new(script: &[u8]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            requests: Vec::new(),
            next_read: 0xa0,
            event: None,
        }
    }
}

impl StatusController for ScriptedController {
    type Error = Infallible;

    fn enable(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll_event(&mut self) -> nb::Result<u8, Self::Error> {
        self.event.ok_or(nb::Error::WouldBlock)
    }

    fn clear_event(&mut self) {
        self.requests.push(Request::Clear);
        self.event = self.script.pop_front();
    }

    fn set_start(&mut self, enable: bool) {
        self.requests.push(Request::Start(enable));
        if enable && self.event.is_none() {
            self.event = self.script.pop_front();
        }
    }

    fn set_stop(&mut self) {
        self.requests.push(Request::Stop);
    }

    fn set_auto_ack(&mut self, enable: bool) {
        self.requests.push(Request::AutoAck(enable));
    }

    fn write_data(&mut self, byte: u8) {
        self.requests.push(Request::Data(byte));
    }

    fn read_data(&mut self) -> u8 {
        let byte = self.next_read;
        self.next_read = self.next_read.wrapping_add(1);
        byte
    }
}

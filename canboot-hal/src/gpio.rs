//! GPIO.

use stm32f1::{
    stm32f103::{
        gpioa::{bsrr::BSRR_SPEC, crh::CRH_SPEC, crl::CRL_SPEC, idr::IDR_SPEC, odr::ODR_SPEC},
        Peripherals,
    },
    Reg,
};

/// GPIO port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
}

/// A single GPIO pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub struct Pin {
    /// Port.
    pub port: Port,
    /// Pin number within port (0..=15).
    pub index: u8,
}

/// Pin configuration (CNF and MODE bits).
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum Mode {
    /// Floating input.
    Floating = 0b0100,
    /// Input with pull-up or pull-down, selected by the output register.
    InputPull = 0b1000,
    /// 2 MHz push-pull output.
    PushPull = 0b0010,
    /// 50 MHz alternate function push-pull output.
    AlternatePushPull = 0b1011,
}

impl Pin {
    /// Creates a pin.
    pub const fn new(port: Port, index: u8) -> Self {
        Self { port, index }
    }

    /// Enables the clock of the pin's port.
    pub fn enable_port(self) {
        let dp = unsafe { Peripherals::steal() };
        let bit = 2 + self.port as u32;
        dp.RCC.apb2enr.modify(|r, w| unsafe { w.bits(r.bits() | 1 << bit) });
    }

    /// Configures the pin.
    pub fn configure(self, mode: Mode) {
        let shift = u32::from(self.index % 8) * 4;
        let update = |bits: u32| (bits & !(0b1111 << shift)) | (mode as u32) << shift;
        if self.index < 8 {
            crl(self.port).modify(|r, w| unsafe { w.bits(update(r.bits())) });
        } else {
            crh(self.port).modify(|r, w| unsafe { w.bits(update(r.bits())) });
        }
    }

    /// Configures the pin as input with pull-up.
    pub fn into_pull_up_input(self) {
        self.enable_port();
        self.configure(Mode::InputPull);
        self.set(true);
    }

    /// Configures the pin as push-pull output with the given initial level.
    pub fn into_push_pull_output(self, high: bool) {
        self.enable_port();
        self.set(high);
        self.configure(Mode::PushPull);
    }

    /// Sets the output level.
    pub fn set(self, high: bool) {
        let bit = if high { self.index } else { self.index + 16 };
        bsrr(self.port).write(|w| unsafe { w.bits(1 << bit) });
    }

    /// Output level.
    pub fn is_set(self) -> bool {
        odr(self.port).read().bits() & (1 << self.index) != 0
    }

    /// Toggles the output level.
    pub fn toggle(self) {
        self.set(!self.is_set());
    }

    /// Input level.
    pub fn is_high(self) -> bool {
        idr(self.port).read().bits() & (1 << self.index) != 0
    }
}

macro_rules! port_reg {
    ($name:ident, $reg:ident, $spec:ty) => {
        fn $name(port: Port) -> &'static Reg<$spec> {
            unsafe {
                match port {
                    Port::A => &(*stm32f1::stm32f103::GPIOA::ptr()).$reg,
                    Port::B => &(*stm32f1::stm32f103::GPIOB::ptr()).$reg,
                    Port::C => &(*stm32f1::stm32f103::GPIOC::ptr()).$reg,
                    Port::D => &(*stm32f1::stm32f103::GPIOD::ptr()).$reg,
                    Port::E => &(*stm32f1::stm32f103::GPIOE::ptr()).$reg,
                    Port::F => &(*stm32f1::stm32f103::GPIOF::ptr()).$reg,
                    Port::G => &(*stm32f1::stm32f103::GPIOG::ptr()).$reg,
                }
            }
        }
    };
}

port_reg!(crl, crl, CRL_SPEC);
port_reg!(crh, crh, CRH_SPEC);
port_reg!(idr, idr, IDR_SPEC);
port_reg!(odr, odr, ODR_SPEC);
port_reg!(bsrr, bsrr, BSRR_SPEC);

//! Status LEDs.

use crate::{board::Board, boards::Chosen, gpio::Pin};

/// Status LED colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum Led {
    /// Bootloader running.
    Red,
    /// Transfer in progress.
    Yellow,
    /// Frame activity or transfer complete.
    Blue,
    /// Image running or acknowledgment received.
    Green,
}

impl Led {
    /// All LEDs.
    pub const ALL: [Led; 4] = [Led::Red, Led::Yellow, Led::Blue, Led::Green];

    /// Pin driving the LED.
    pub const fn pin(self) -> Pin {
        match self {
            Self::Red => Chosen::LED_RED,
            Self::Yellow => Chosen::LED_YELLOW,
            Self::Blue => Chosen::LED_BLUE,
            Self::Green => Chosen::LED_GREEN,
        }
    }

    /// Configures the LED pin as output and switches the LED off.
    pub fn init(self) {
        self.pin().into_push_pull_output(!Chosen::LED_ACTIVE_HIGH);
    }

    /// Switches the LED on or off.
    pub fn set(self, on: bool) {
        self.pin().set(on == Chosen::LED_ACTIVE_HIGH);
    }

    /// Switches the LED on.
    pub fn on(self) {
        self.set(true)
    }

    /// Switches the LED off.
    pub fn off(self) {
        self.set(false)
    }

    /// Toggles the LED.
    pub fn toggle(self) {
        self.pin().toggle()
    }
}

/// Configures all LED pins and switches the LEDs off.
pub fn init_all() {
    for led in Led::ALL {
        led.init();
    }
}

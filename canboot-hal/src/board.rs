//! Board.

use canboot_shared::bxcan::Timing;

use crate::{
    gpio::{Pin, Port},
    lcd::LcdPins,
};

/// Board-specific configuration.
pub trait Board {
    /// Processor clock speed.
    const CPU_CLOCK: u32 = 8_000_000;

    /// CAN bit timing.
    const CAN_TIMING: Timing = Timing::KBIT_100_AT_8MHZ;

    /// Red status LED of the bootloader node.
    const LED_RED: Pin = Pin::new(Port::A, 2);

    /// Yellow status LED.
    const LED_YELLOW: Pin = Pin::new(Port::C, 13);

    /// Blue status LED.
    const LED_BLUE: Pin = Pin::new(Port::C, 14);

    /// Green status LED.
    const LED_GREEN: Pin = Pin::new(Port::C, 15);

    /// Whether LEDs light up when their pin is driven high.
    const LED_ACTIVE_HIGH: bool = true;

    /// Button that selects a firmware update (active low).
    const BUTTON_UPDATE: Pin = Pin::new(Port::B, 11);

    /// Button that starts the firmware (active low).
    const BUTTON_START: Pin = Pin::new(Port::B, 10);

    /// Display wiring.
    const LCD: LcdPins = LcdPins {
        rs: Pin::new(Port::A, 11),
        en: Pin::new(Port::A, 8),
        d4: Pin::new(Port::B, 15),
        d5: Pin::new(Port::B, 14),
        d6: Pin::new(Port::B, 13),
        d7: Pin::new(Port::B, 12),
    };

    /// Creates a new instance.
    fn new() -> Self;

    /// Board model.
    fn model(&self) -> &'static str;
}

//! Fatal error handling.

use crate::{led::Led, util::delay_ms};

/// Blink period of the red LED after a fatal error.
const BLINK_MS: u32 = 250;

/// Logs `reason`, switches off all LEDs and blinks the red LED forever.
pub fn halt(reason: &str) -> ! {
    cortex_m::interrupt::disable();
    defmt::error!("halted: {}", reason);

    for led in Led::ALL {
        led.init();
    }

    loop {
        Led::Red.toggle();
        delay_ms(BLINK_MS);
    }
}

//! Boot menu of the bootloader.
//!
//! ```text
//! MenuShown -> WaitInput -> UpdateSelected -> jump to receiver
//!                        -> StartSelected  -> jump to firmware
//!                                          -> NoFirmwareMessage -> MenuShown
//! ```

use embedded_hal::blocking::delay::DelayMs;

use crate::{
    jump::Presence,
    layout::{FIRMWARE, RECEIVER},
    log,
};

/// How long "No Updates" stays on the display.
pub const NO_FIRMWARE_MESSAGE_MS: u16 = 1500;

/// Character display.
pub trait Display {
    /// Clears the display.
    fn clear(&mut self);

    /// Moves the cursor.
    fn move_cursor(&mut self, row: u8, col: u8);

    /// Writes text at the cursor.
    fn write_str(&mut self, s: &str);
}

/// Menu buttons.
pub trait Buttons {
    /// Whether the update button is pressed.
    fn update_pressed(&mut self) -> bool;

    /// Whether the start button is pressed.
    fn start_pressed(&mut self) -> bool;
}

/// Image to hand over to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    /// Receiver, which downloads new firmware.
    Receiver,
    /// Previously downloaded firmware.
    Firmware,
}

impl Target {
    /// Base address of the image.
    pub const fn base(self) -> usize {
        match self {
            Self::Receiver => RECEIVER.base,
            Self::Firmware => FIRMWARE.base,
        }
    }
}

/// Menu state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuState {
    /// Menu must be drawn.
    MenuShown,
    /// Waiting for a button.
    WaitInput,
    /// Update was chosen.
    UpdateSelected,
    /// Start was chosen.
    StartSelected,
    /// Start was chosen but no firmware is present.
    NoFirmwareMessage,
}

/// Boot menu state machine.
pub struct BootMenu {
    state: MenuState,
}

impl Default for BootMenu {
    fn default() -> Self {
        Self::new()
    }
}

impl BootMenu {
    /// Creates the menu.
    pub const fn new() -> Self {
        Self { state: MenuState::MenuShown }
    }

    /// Current state.
    pub fn state(&self) -> MenuState {
        self.state
    }

    /// Shows the greeting.
    pub fn greet(display: &mut impl Display) {
        display.clear();
        display.move_cursor(0, 0);
        display.write_str("Bootloader Started ...");
    }

    /// Performs one transition.
    ///
    /// `probe` reads the firmware presence word. Returns the image to start,
    /// once one was chosen.
    pub fn step<D, B, T, P>(&mut self, display: &mut D, buttons: &mut B, delay: &mut T, probe: &P) -> Option<Target>
    where
        D: Display,
        B: Buttons,
        T: DelayMs<u16>,
        P: Fn() -> u32,
    {
        match self.state {
            MenuState::MenuShown => {
                display.clear();
                display.move_cursor(0, 0);
                display.write_str("1: Update");
                display.move_cursor(1, 0);
                display.write_str("2: Start");
                self.state = MenuState::WaitInput;
                None
            }
            MenuState::WaitInput => {
                if buttons.update_pressed() {
                    self.state = MenuState::UpdateSelected;
                } else if buttons.start_pressed() {
                    self.state = MenuState::StartSelected;
                }
                None
            }
            MenuState::UpdateSelected => {
                log::info!("update selected");
                Self::message(display, "Updating...");
                Some(Target::Receiver)
            }
            MenuState::StartSelected => match Presence::classify(probe()) {
                Presence::Present(_word) => {
                    log::info!("start selected, firmware probe 0x{:08x}", _word);
                    Self::message(display, "Starting...");
                    Some(Target::Firmware)
                }
                Presence::Absent => {
                    log::info!("start selected, but no firmware present");
                    self.state = MenuState::NoFirmwareMessage;
                    None
                }
            },
            MenuState::NoFirmwareMessage => {
                Self::message(display, "No Updates");
                delay.delay_ms(NO_FIRMWARE_MESSAGE_MS);
                display.clear();
                self.state = MenuState::MenuShown;
                None
            }
        }
    }

    /// Runs the menu until an image was chosen.
    pub fn run<D, B, T, P>(&mut self, display: &mut D, buttons: &mut B, delay: &mut T, probe: P) -> Target
    where
        D: Display,
        B: Buttons,
        T: DelayMs<u16>,
        P: Fn() -> u32,
    {
        loop {
            if let Some(target) = self.step(display, buttons, delay, &probe) {
                return target;
            }
        }
    }

    fn message(display: &mut impl Display, text: &str) {
        display.clear();
        display.move_cursor(0, 3);
        display.write_str(text);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Op {
        Clear,
        Cursor(u8, u8),
        Text(String),
    }

    #[derive(Default)]
    pub struct MockDisplay {
        pub ops: Vec<Op>,
    }

    impl MockDisplay {
        pub fn texts(&self) -> Vec<&str> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Display for MockDisplay {
        fn clear(&mut self) {
            self.ops.push(Op::Clear);
        }

        fn move_cursor(&mut self, row: u8, col: u8) {
            self.ops.push(Op::Cursor(row, col));
        }

        fn write_str(&mut self, s: &str) {
            self.ops.push(Op::Text(s.to_string()));
        }
    }

    /// Button presses as `(update, start)`; released once the script ends.
    #[derive(Default)]
    pub struct ScriptedButtons {
        pub script: VecDeque<(bool, bool)>,
        current: (bool, bool),
    }

    impl ScriptedButtons {
        pub fn new(script: &[(bool, bool)]) -> Self {
            Self { script: script.iter().copied().collect(), current: (false, false) }
        }
    }

    impl Buttons for ScriptedButtons {
        fn update_pressed(&mut self) -> bool {
            self.current = self.script.pop_front().unwrap_or((false, false));
            self.current.0
        }

        fn start_pressed(&mut self) -> bool {
            self.current.1
        }
    }

    #[derive(Default)]
    pub struct MockDelay {
        pub delays: Vec<u16>,
    }

    impl DelayMs<u16> for MockDelay {
        fn delay_ms(&mut self, ms: u16) {
            self.delays.push(ms);
        }
    }

    #[test]
    fn draws_menu_first() {
        let (mut display, mut buttons, mut delay) = (MockDisplay::default(), ScriptedButtons::new(&[]), MockDelay::default());
        let mut menu = BootMenu::new();

        assert_eq!(menu.step(&mut display, &mut buttons, &mut delay, &|| 0), None);
        assert_eq!(menu.state(), MenuState::WaitInput);
        assert_eq!(
            display.ops,
            [
                Op::Clear,
                Op::Cursor(0, 0),
                Op::Text("1: Update".into()),
                Op::Cursor(1, 0),
                Op::Text("2: Start".into())
            ]
        );

        for _ in 0..10 {
            assert_eq!(menu.step(&mut display, &mut buttons, &mut delay, &|| 0), None);
            assert_eq!(menu.state(), MenuState::WaitInput);
        }
    }

    #[test]
    fn update_goes_to_receiver() {
        let (mut display, mut delay) = (MockDisplay::default(), MockDelay::default());
        let mut buttons = ScriptedButtons::new(&[(false, false), (false, false), (true, false)]);

        let target = BootMenu::new().run(&mut display, &mut buttons, &mut delay, || 0xffff_ffff);
        assert_eq!(target, Target::Receiver);
        assert_eq!(target.base(), 0x0800_6400);
        assert_eq!(display.texts().last(), Some(&"Updating..."));
    }

    #[test]
    fn update_has_priority() {
        let (mut display, mut delay) = (MockDisplay::default(), MockDelay::default());
        let mut buttons = ScriptedButtons::new(&[(true, true)]);

        let target = BootMenu::new().run(&mut display, &mut buttons, &mut delay, || 0x2000_5000);
        assert_eq!(target, Target::Receiver);
    }

    #[test]
    fn start_with_firmware() {
        let (mut display, mut delay) = (MockDisplay::default(), MockDelay::default());
        let mut buttons = ScriptedButtons::new(&[(false, true)]);

        let target = BootMenu::new().run(&mut display, &mut buttons, &mut delay, || 0x2000_5000);
        assert_eq!(target, Target::Firmware);
        assert_eq!(target.base(), 0x0800_dc00);
        assert_eq!(display.texts().last(), Some(&"Starting..."));
        assert!(delay.delays.is_empty());
    }

    #[test]
    fn start_without_firmware_returns_to_menu() {
        let (mut display, mut delay) = (MockDisplay::default(), MockDelay::default());
        let mut buttons = ScriptedButtons::new(&[(false, true)]);
        let mut menu = BootMenu::new();

        let mut states = Vec::new();
        for _ in 0..5 {
            assert_eq!(menu.step(&mut display, &mut buttons, &mut delay, &|| 0xffff_ffff), None);
            states.push(menu.state());
        }

        assert_eq!(
            states,
            [
                MenuState::WaitInput,
                MenuState::StartSelected,
                MenuState::NoFirmwareMessage,
                MenuState::MenuShown,
                MenuState::WaitInput,
            ]
        );
        assert_eq!(delay.delays, [NO_FIRMWARE_MESSAGE_MS]);
        assert_eq!(display.texts(), ["1: Update", "2: Start", "No Updates", "1: Update", "2: Start"]);
        assert!(display.ops.contains(&Op::Cursor(0, 3)));
    }

    #[test]
    fn greeting() {
        let mut display = MockDisplay::default();
        BootMenu::greet(&mut display);
        assert_eq!(display.texts(), ["Bootloader Started ..."]);
    }

    #[test]
    fn start_path_hands_over_to_firmware() {
        use crate::{
            jump::{
                tests::{run_jump, MockCpu, Step},
                HandoffCpu,
            },
            layout::FIRMWARE_PROBE,
        };

        let mut cpu = MockCpu::new(Default::default());
        cpu.memory.insert(FIRMWARE.base, 0x2000_4ff0);
        cpu.memory.insert(FIRMWARE.base + 4, 0x0800_de45);

        let (mut display, mut delay) = (MockDisplay::default(), MockDelay::default());
        let mut buttons = ScriptedButtons::new(&[(false, true)]);
        let target = BootMenu::new().run(&mut display, &mut buttons, &mut delay, || cpu.read_word(FIRMWARE_PROBE));
        let steps = run_jump(cpu, target.base());

        let vector_table = steps.iter().position(|s| *s == Step::VectorTable(FIRMWARE.base as u32)).unwrap();
        let bootstrap = steps
            .iter()
            .position(|s| *s == Step::Bootstrap { stack_pointer: 0x2000_4ff0, entry: 0x0800_de45 })
            .unwrap();
        assert!(vector_table < bootstrap);
        assert_eq!(bootstrap, steps.len() - 1);
    }
}

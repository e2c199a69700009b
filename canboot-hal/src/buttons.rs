//! Menu buttons.

use canboot_shared::menu::Buttons;

use crate::{board::Board, boards::Chosen, gpio::Pin};

/// Active-low push buttons with internal pull-ups.
pub struct PanelButtons {
    update: Pin,
    start: Pin,
}

impl PanelButtons {
    /// Configures the button pins of the board.
    pub fn new() -> Self {
        let this = Self { update: Chosen::BUTTON_UPDATE, start: Chosen::BUTTON_START };
        this.update.into_pull_up_input();
        this.start.into_pull_up_input();
        this
    }
}

impl Default for PanelButtons {
    fn default() -> Self {
        Self::new()
    }
}

impl Buttons for PanelButtons {
    fn update_pressed(&mut self) -> bool {
        !self.update.is_high()
    }

    fn start_pressed(&mut self) -> bool {
        !self.start.is_high()
    }
}

//! # Operator panel
//!
//! Status LED, buzzer and the start/stop button.

use serde::{Deserialize, Serialize};

/// Colours of the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedColour {
    Off,
    Green,
    Yellow,
    Red,
}

/// Buzzer patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeepPattern {
    /// One short beep, ready to start
    Ready,

    /// Two short beeps, run complete
    Done,

    /// Long repeated beeps, unrecoverable error
    Fatal,
}

/// The operator panel.
pub trait Panel: Send + Sync {
    fn set_led(&self, colour: LedColour);

    fn beep(&self, pattern: BeepPattern);

    /// Returns true while the button is held down.
    fn button_pressed(&self) -> bool;
}

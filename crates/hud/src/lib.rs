//! Heads-up display model.
//!
//! Pure view state: telemetry text lines, a fading notification, and the
//! help panel. The desktop app owns the actual drawing; nothing here
//! touches a rendering API, which keeps the formatting testable.

pub mod view;

pub use view::{FadingText, HelpPanel, Hud};

//! Keyboard input mapped to control commands.
//!
//! Raw key events come from the windowing layer; everything here is
//! toolkit-agnostic so the mapping logic stays testable with scripted
//! frames.
//!
//! # Invariants
//! - The steer cache never leaves `[-0.7, 0.7]`.
//! - `reverse == (gear < 0)` after every mapping pass.
//! - The light word is returned for pushing only on the frame it changes.

pub mod bindings;
pub mod keys;
pub mod mapper;

pub use bindings::{Action, Binding, LightToggle, dispatch, help_text};
pub use keys::{Key, KeySet, Mods};
pub use mapper::{ControlError, InputMapper, MappedFrame};

//! WarpBoard soundboard engine
//!
//! Mixes triggered sounds into a virtual loopback device, optionally with the
//! microphone, monitors both on separate outputs and triggers sounds from
//! global hotkeys.

/// Audio processing modules
pub mod audio;

/// Global hotkeys
pub mod hotkey;

/// Sound catalog seam
pub mod sound;

/// Application facade
pub mod soundboard;

/// Configuration
pub mod state;

/// Utility modules
pub mod utils;

pub use soundboard::{Notification, Soundboard};

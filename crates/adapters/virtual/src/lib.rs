//! # macrobot-adapter-virtual
//!
//! Simulated devices for testing and demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Port | Behaviour |
//! |--------|------|-----------|
//! | [`VirtualInput`] | `InputDevice` | Records every call as an [`InputEvent`] and tracks the cursor |
//! | [`VirtualScreen`] | `Vision` | Answers searches from templates placed on it, or from a per-template script |
//!
//! ## Dependency rule
//!
//! Depends on `macrobot-app` (port traits) and `macrobot-domain` only.

mod devices;

pub use devices::{InputEvent, VirtualInput, VirtualScreen};

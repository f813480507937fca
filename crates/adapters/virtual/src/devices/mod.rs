//! Virtual device implementations — input recorder and scripted screen.

mod input;
mod screen;

pub use input::{InputEvent, VirtualInput};
pub use screen::VirtualScreen;

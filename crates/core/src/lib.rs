//! Greetcast core: voice-cloned speech laid over video, bookended by
//! intro and outro clips.

pub mod assembler;
pub mod audio;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod greeting;
pub mod mixer;
pub mod process;
pub mod retry;
pub mod synthesis;
pub mod text;
pub mod tts;
pub mod video;

#[cfg(test)]
mod test_support;

pub use error::{GreetError, Result};
pub use greeting::GreetingService;

pub mod buffer;
pub mod effects;
pub mod enhance;
pub mod io;

pub use buffer::{AudioBuffer, SampleSpec};

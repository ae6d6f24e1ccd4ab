pub mod control;
pub mod processor;

pub use control::ControlState;
pub use processor::StreamProcessor;

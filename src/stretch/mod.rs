pub mod params;
pub mod transposer;
pub mod wsola;

pub use params::{SequenceParams, Setting, Settings};
pub use transposer::RateTransposer;
pub use wsola::Wsola;

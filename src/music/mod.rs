pub mod instrument;
pub mod sequencer;
pub mod voice;

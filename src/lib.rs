//! chaosgrid: moving bodies in a 2-D force field wander across a partitioned
//! grid; each body's current cell decides what its voice plays when its
//! circular sequencer fires. Fired notes become gated MIDI note-on/off pairs
//! emitted to an abstract sink.

pub mod config;
pub mod core;
pub mod engine;
pub mod music;
pub mod scene;
pub mod sim;

use std::collections::HashMap;

use crossbeam_channel::Sender;

use crate::core::timebase::Tick;

/// Abstract event for the transport layer; the wire encoding is not this
/// crate's business. All fields are already mapped to their 7-bit ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, control: u8, value: u8 },
}

/// Where the instrument's events go. The run loop (and the tests) hand
/// events to a crossbeam channel and drain them on the other side.
pub trait MidiSink {
    fn send(&mut self, msg: MidiMessage);
}

impl MidiSink for Sender<MidiMessage> {
    fn send(&mut self, msg: MidiMessage) {
        // A gone receiver just means the transport shut down first.
        let _ = Sender::send(self, msg);
    }
}

#[derive(Clone, Copy, Debug)]
struct GateSlot {
    tick_elapsed: Tick,
    gate_ticks: Tick,
}

fn to_7bit(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 127.0).round() as u8
}

/// Gated note model: a note-on with a positive gate registers a countdown
/// slot per (channel, note); `update` closes slots whose gate has elapsed.
/// One slot per key, last writer wins.
pub struct Instrument {
    sink: Box<dyn MidiSink + Send>,
    playing: HashMap<(u8, u8), GateSlot>,
    last_tick: Tick,
}

impl Instrument {
    pub fn new(sink: Box<dyn MidiSink + Send>) -> Self {
        Self {
            sink,
            playing: HashMap::new(),
            last_tick: 0,
        }
    }

    pub fn active_gates(&self) -> usize {
        self.playing.len()
    }

    pub fn note_on(&mut self, channel: u8, note: u8, gate_ticks: Tick, velocity: f32) {
        self.sink.send(MidiMessage::NoteOn {
            channel,
            note,
            velocity: to_7bit(velocity),
        });
        if gate_ticks > 0 {
            self.playing.insert(
                (channel, note),
                GateSlot {
                    tick_elapsed: 0,
                    gate_ticks,
                },
            );
        }
    }

    /// Forced early release of everything gated on one channel.
    pub fn channel_note_off(&mut self, channel: u8) {
        let keys: Vec<(u8, u8)> = self
            .playing
            .keys()
            .copied()
            .filter(|&(ch, _)| ch == channel)
            .collect();
        for (ch, note) in keys {
            self.sink.send(MidiMessage::NoteOff { channel: ch, note });
            self.playing.remove(&(ch, note));
        }
    }

    /// Advance every gate by the elapsed ticks and close expired ones. A tick
    /// below the previous one counts as zero elapsed (clock resync).
    pub fn update(&mut self, tick: Tick) {
        let delta = tick.saturating_sub(self.last_tick);
        self.last_tick = tick;

        let mut expired: Vec<(u8, u8)> = Vec::new();
        for (key, slot) in self.playing.iter_mut() {
            slot.tick_elapsed = slot.tick_elapsed.saturating_add(delta);
            if slot.tick_elapsed >= slot.gate_ticks {
                expired.push(*key);
            }
        }
        for (channel, note) in expired {
            self.sink.send(MidiMessage::NoteOff { channel, note });
            self.playing.remove(&(channel, note));
        }
    }

    /// Stateless control message, value clamped to [0, 1] before mapping.
    pub fn cc(&mut self, channel: u8, control: u8, value: f32) {
        self.sink.send(MidiMessage::ControlChange {
            channel,
            control,
            value: to_7bit(value),
        });
    }

    /// Shutdown sweep: release every gated note on every channel.
    pub fn all_notes_off(&mut self) {
        for channel in 0..16 {
            self.channel_note_off(channel);
        }
    }
}

use crate::config::ConfigError;
use crate::core::timebase::Tick;

/// One scheduled event on the loop. Carries only its tick offset; what firing
/// means is decided by whoever owns the sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeqNote {
    pub tick: Tick,
}

impl SeqNote {
    pub fn at(tick: Tick) -> Self {
        Self { tick }
    }
}

/// Circular scanner over a fixed-length tick axis. Each call to `scan` fires
/// every note whose offset falls on the forward arc between the previous and
/// the current position, so each note fires exactly once per loop traversal
/// no matter how unevenly the clock advances.
///
/// Limitation: a single advance of more than `loop_length` ticks can step
/// over notes; the scanner does not correct for that.
pub struct Sequencer {
    loop_length: Tick,
    last_tick: Tick,
    notes: Vec<SeqNote>,
}

impl Sequencer {
    pub fn new(loop_length: Tick, layer: &str) -> Result<Self, ConfigError> {
        if loop_length == 0 {
            return Err(ConfigError::InvalidLoopLength {
                layer: layer.to_string(),
            });
        }
        Ok(Self {
            loop_length,
            last_tick: 0,
            notes: Vec::new(),
        })
    }

    pub fn loop_length(&self) -> Tick {
        self.loop_length
    }

    /// Current position on the loop, for external displays.
    pub fn position(&self) -> Tick {
        self.last_tick % self.loop_length
    }

    pub fn notes(&self) -> &[SeqNote] {
        &self.notes
    }

    /// Stored order is irrelevant; firing order within one scan is
    /// implementation-defined.
    pub fn set_notes(&mut self, notes: Vec<SeqNote>) {
        self.notes = notes;
    }

    pub fn set_offsets(&mut self, offsets: &[Tick]) {
        self.notes = offsets.iter().map(|&t| SeqNote::at(t)).collect();
    }

    /// Advance to `tick` and return the notes that fired. A `tick` below the
    /// previous one is an external clock reset: resynchronize, fire nothing.
    pub fn scan(&mut self, tick: Tick) -> Vec<SeqNote> {
        if tick < self.last_tick {
            self.last_tick = tick;
        }

        let current = tick % self.loop_length;
        let last = self.last_tick % self.loop_length;

        let mut fired = Vec::new();
        for note in &self.notes {
            let t = note.tick;
            let hit = if last <= current {
                last < t && t <= current
            } else {
                // The scan wrapped past the end of the loop.
                t > last || t <= current
            };
            if hit {
                fired.push(*note);
            }
        }

        self.last_tick = tick;
        fired
    }
}

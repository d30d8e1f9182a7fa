use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{CellProgram, NoteSpec};
use crate::core::timebase::Tick;
use crate::music::instrument::Instrument;
use crate::music::sequencer::Sequencer;
use crate::sim::field::ForceField;
use crate::sim::grid::Grid;
use crate::sim::node::NodeId;

/// Channel forced monophonic: every fire releases whatever is still gated
/// here before the new note-on. Polyphony lives on the other channels.
pub const LEAD_CHANNEL: u8 = 0;

const NOTE_VELOCITY: f32 = 0.8;

/// Layer -> note list, one entry of the harmonic context bank.
pub type ContextEntry = BTreeMap<String, Vec<u8>>;

/// One musical layer bound to a body in the field. The sequencer keeps
/// advancing while the voice is disabled so re-enabling resumes in phase.
pub struct Voice {
    pub id: NodeId,
    pub layer: String,
    pub enabled: bool,
    /// Display color, passed through untouched for external presentation.
    pub color: [u8; 3],
    base_sequence: Vec<Tick>,
    pub sequencer: Sequencer,
    /// Notes this layer plays when a cell opts into the shared context.
    shared_context: Vec<u8>,
}

impl Voice {
    pub fn new(
        id: NodeId,
        layer: impl Into<String>,
        sequencer: Sequencer,
        base_sequence: Vec<Tick>,
        enabled: bool,
        color: [u8; 3],
    ) -> Self {
        let layer = layer.into();
        let mut sequencer = sequencer;
        sequencer.set_offsets(&base_sequence);
        Self {
            id,
            layer,
            enabled,
            color,
            base_sequence,
            sequencer,
            shared_context: Vec::new(),
        }
    }

    pub fn shared_context(&self) -> &[u8] {
        &self.shared_context
    }

    /// Resolve what to send for one fire of this voice in `program`'s cell.
    /// Shared-context expansion uses the cell's channel/gate defaults; the
    /// arpeggio pick is uniform over the resolved set.
    fn resolve_notes(&self, program: &CellProgram, rng: &mut SmallRng) -> Vec<NoteSpec> {
        let mut notes: Vec<NoteSpec> = if program.use_shared_context {
            self.shared_context
                .iter()
                .map(|&note| NoteSpec {
                    channel: program.context_channel,
                    note,
                    gate: program.context_gate,
                })
                .collect()
        } else {
            program.notes.clone()
        };

        if program.arpeggiate && notes.len() > 1 {
            let pick = rng.random_range(0..notes.len());
            notes = vec![notes[pick]];
        }
        notes
    }
}

/// Advances every voice and runs the fire path: body -> cell -> program ->
/// instrument, with the shared-context fan-out handled here so a broadcast
/// lands on every voice before the broadcaster reads its own notes.
pub struct VoiceSet {
    voices: Vec<Voice>,
    context_bank: Vec<ContextEntry>,
    rng: SmallRng,
}

impl VoiceSet {
    pub fn new(voices: Vec<Voice>, context_bank: Vec<ContextEntry>, seed: u64) -> Self {
        Self {
            voices,
            context_bank,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Side-effect-free toggle: nothing is force-started or force-stopped,
    /// the next natural fire simply sees the new state.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.enabled = enabled;
        }
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.enabled = !voice.enabled;
        }
    }

    /// Scan every voice's sequencer up to `tick` and handle the fired notes.
    pub fn update(
        &mut self,
        tick: Tick,
        field: &ForceField,
        grid: &Grid,
        instrument: &mut Instrument,
    ) {
        for index in 0..self.voices.len() {
            let fired = self.voices[index].sequencer.scan(tick);
            for _note in fired {
                self.fire(index, field, grid, instrument);
            }
        }
    }

    fn fire(&mut self, index: usize, field: &ForceField, grid: &Grid, instrument: &mut Instrument) {
        // A disabled voice keeps its phase (the scan already ran) but emits
        // nothing.
        if !self.voices[index].enabled {
            return;
        }
        let (id, layer) = {
            let voice = &self.voices[index];
            (voice.id, voice.layer.clone())
        };

        let Some(node) = field.node(id) else {
            debug!(id, layer = %layer, "fire skipped: body not found in the field");
            return;
        };
        let Some(cell) = grid.cell_at(node.px, node.py) else {
            debug!(id, layer = %layer, px = node.px, py = node.py, "fire skipped: no cell here");
            return;
        };
        let Some(program) = cell.program(&layer) else {
            debug!(
                layer = %layer,
                row = cell.row,
                col = cell.col,
                "fire skipped: cell has no program for this layer"
            );
            return;
        };
        let program = program.clone();

        // Broadcast first so a context change is heard by everyone, this
        // voice included, on the very tick it is set.
        if let Some(context_index) = program.context_index {
            self.broadcast_context(context_index);
        }

        let notes = self.voices[index].resolve_notes(&program, &mut self.rng);

        // Monophonic lead: whatever still sounds there gets released before
        // the new note-on.
        instrument.channel_note_off(LEAD_CHANNEL);
        for spec in &notes {
            instrument.note_on(spec.channel, spec.note, spec.gate, NOTE_VELOCITY);
        }

        // The cell may swap in its own pattern; leaving a cell without an
        // override restores the voice's base sequence.
        let voice = &mut self.voices[index];
        match &program.sequence {
            Some(offsets) => voice.sequencer.set_offsets(offsets),
            None => {
                let base = voice.base_sequence.clone();
                voice.sequencer.set_offsets(&base);
            }
        }
    }

    /// Fan one context bank entry out to every voice.
    fn broadcast_context(&mut self, context_index: usize) {
        let Some(entry) = self.context_bank.get(context_index) else {
            debug!(context_index, "broadcast skipped: no such context entry");
            return;
        };
        for voice in &mut self.voices {
            if let Some(notes) = entry.get(&voice.layer) {
                voice.shared_context = notes.clone();
            }
        }
    }
}

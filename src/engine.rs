use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{ConfigError, SceneConfig};
use crate::core::timebase::{Tick, Timebase};
use crate::music::instrument::{Instrument, MidiSink};
use crate::music::sequencer::Sequencer;
use crate::music::voice::{Voice, VoiceSet, LEAD_CHANNEL};
use crate::sim::field::ForceField;
use crate::sim::grid::Grid;
use crate::sim::node::{NodeId, PhysicsNode};

/// Wires the four moving parts together and fixes the per-step ordering:
/// field motion first, then all sequencer scans, then instrument gate expiry.
pub struct Engine {
    pub timebase: Timebase,
    pub field: ForceField,
    pub grid: Grid,
    pub voices: VoiceSet,
    pub instrument: Instrument,
}

impl Engine {
    pub fn from_config(
        cfg: &SceneConfig,
        sink: Box<dyn MidiSink + Send>,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let timebase = Timebase {
            bpm: cfg.clock.bpm,
            ticks_per_beat: cfg.clock.ticks_per_beat,
        };

        let mut field = ForceField::new(0.0, 0.0, cfg.field.width, cfg.field.height)?;
        let mut grid = Grid::new(
            cfg.grid.rows,
            cfg.grid.cols,
            cfg.grid.cell_width,
            cfg.grid.cell_height,
        )?;
        for cell_cfg in &cfg.cells {
            if let Some(cell) = grid.cell_mut(cell_cfg.row, cell_cfg.col) {
                for (layer, program) in &cell_cfg.programs {
                    cell.set_program(layer.clone(), program.clone());
                }
            }
        }

        let mut rng = SmallRng::seed_from_u64(cfg.seed);
        let mut voices = Vec::with_capacity(cfg.voices.len());
        for (index, vc) in cfg.voices.iter().enumerate() {
            let id = index as NodeId;
            let (px, py) = match vc.start {
                Some([x, y]) => (x, y),
                None => (
                    rng.random_range(0.0..cfg.field.width),
                    rng.random_range(0.0..cfg.field.height),
                ),
            };
            field.add_node(PhysicsNode::new(id, vc.layer.clone(), px, py, vc.mass, vc.radius)?);

            let sequencer = Sequencer::new(vc.loop_length, &vc.layer)?;
            voices.push(Voice::new(
                id,
                vc.layer.clone(),
                sequencer,
                vc.sequence.clone(),
                vc.enabled,
                vc.color,
            ));
        }

        Ok(Self {
            timebase,
            field,
            grid,
            voices: VoiceSet::new(voices, cfg.context_bank.clone(), cfg.seed),
            instrument: Instrument::new(sink),
        })
    }

    /// One spatial step. Runs to completion before any music sub-step of the
    /// same frame.
    pub fn advance_field(&mut self, dt: f32) {
        self.field.update(dt);
    }

    /// Body positions and speeds as a control side channel: CC 20+i / 30+i
    /// carry normalized x / y, CC 40+i normalized speed.
    pub fn emit_motion_cc(&mut self) {
        let readings: Vec<(f32, f32, f32)> = self
            .field
            .nodes()
            .map(|n| {
                (
                    (n.px - self.field.origin_x) / self.field.width,
                    (n.py - self.field.origin_y) / self.field.height,
                    n.speed() / 20.0,
                )
            })
            .collect();
        for (i, (x, y, speed)) in readings.into_iter().enumerate() {
            let i = i as u8;
            self.instrument.cc(LEAD_CHANNEL, 20 + i, x);
            self.instrument.cc(LEAD_CHANNEL, 30 + i, y);
            self.instrument.cc(LEAD_CHANNEL, 40 + i, speed);
        }
    }

    /// One music sub-step: sequencer scans for every voice, then gate expiry.
    /// Tolerates several small increments per frame with no aggregate drift.
    pub fn advance_music(&mut self, tick: Tick) {
        self.voices
            .update(tick, &self.field, &self.grid, &mut self.instrument);
        self.instrument.update(tick);
    }

    /// Every gated note gets a forced release on stop.
    pub fn shutdown(&mut self) {
        self.instrument.all_notes_off();
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::timebase::Tick;
use crate::sim::node::NodeId;

/// Construction-time validation failures. These are the only fatal errors in
/// the crate; everything at play time is a logged, recoverable skip.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("voice {layer:?}: loop_length must be positive")]
    InvalidLoopLength { layer: String },
    #[error("node {id}: mass must be finite and positive, got {mass}")]
    InvalidMass { id: NodeId, mass: f32 },
    #[error("field extent must be positive, got {width}x{height}")]
    InvalidFieldExtent { width: f32, height: f32 },
    #[error("grid shape must be non-empty, got {rows}x{cols}")]
    InvalidGridShape { rows: usize, cols: usize },
    #[error("cell size must be positive, got {width}x{height}")]
    InvalidCellSize { width: f32, height: f32 },
    #[error("clock: bpm and ticks_per_beat must be positive")]
    InvalidClock,
    #[error("cell ({row},{col}) is outside the {rows}x{cols} grid")]
    CellOutOfGrid {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("voice {layer:?}: context_index {index} exceeds the context bank ({len} entries)")]
    ContextIndexOutOfRange {
        layer: String,
        index: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "ClockConfig::default_bpm")]
    pub bpm: f32,
    #[serde(default = "ClockConfig::default_ticks_per_beat")]
    pub ticks_per_beat: u32,
}

impl ClockConfig {
    fn default_bpm() -> f32 {
        120.0
    }
    fn default_ticks_per_beat() -> u32 {
        480
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            bpm: Self::default_bpm(),
            ticks_per_beat: Self::default_ticks_per_beat(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    pub cell_width: f32,
    pub cell_height: f32,
}

/// One literal note a cell tells a voice to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSpec {
    pub channel: u8,
    pub note: u8,
    #[serde(default)]
    pub gate: Tick,
}

/// What a layer plays while its body sits in a given cell. Structured record
/// with named optional fields; only genuinely optional behavior is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellProgram {
    /// Literal notes to emit on fire.
    #[serde(default)]
    pub notes: Vec<NoteSpec>,
    /// Replaces the voice's sequence while it stays in this cell.
    #[serde(default)]
    pub sequence: Option<Vec<Tick>>,
    /// Substitute the shared harmonic context for the literal note list.
    #[serde(default)]
    pub use_shared_context: bool,
    #[serde(default)]
    pub context_channel: u8,
    #[serde(default = "CellProgram::default_context_gate")]
    pub context_gate: Tick,
    /// Collapse a multi-note set to one random pick per fire.
    #[serde(default)]
    pub arpeggiate: bool,
    /// Broadcast this context bank entry to every voice on fire.
    #[serde(default)]
    pub context_index: Option<usize>,
}

impl CellProgram {
    fn default_context_gate() -> Tick {
        10
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellConfig {
    pub row: usize,
    pub col: usize,
    #[serde(default)]
    pub programs: BTreeMap<String, CellProgram>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub layer: String,
    pub loop_length: Tick,
    #[serde(default)]
    pub sequence: Vec<Tick>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub color: [u8; 3],
    #[serde(default = "VoiceConfig::default_mass")]
    pub mass: f32,
    #[serde(default = "VoiceConfig::default_radius")]
    pub radius: f32,
    /// Starting position; omitted means a random spot in the field.
    #[serde(default)]
    pub start: Option<[f32; 2]>,
}

impl VoiceConfig {
    fn default_mass() -> f32 {
        10.0
    }
    fn default_radius() -> f32 {
        50.0
    }
}

/// The whole scene: clock, field, grid, cell programs, voices, and the
/// harmonic context bank. Produced externally (chord extraction from a score
/// is a preprocessing step); this crate only validates and plays it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub clock: ClockConfig,
    pub field: FieldConfig,
    pub grid: GridConfig,
    #[serde(default)]
    pub cells: Vec<CellConfig>,
    #[serde(default)]
    pub voices: Vec<VoiceConfig>,
    /// Entry -> layer -> note list. Cells broadcast an entry by index.
    #[serde(default)]
    pub context_bank: Vec<BTreeMap<String, Vec<u8>>>,
}

impl SceneConfig {
    /// Reject invalid numerics up front; nothing here is silently defaulted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.clock.bpm > 0.0) || self.clock.ticks_per_beat == 0 {
            return Err(ConfigError::InvalidClock);
        }
        if !(self.field.width > 0.0 && self.field.height > 0.0) {
            return Err(ConfigError::InvalidFieldExtent {
                width: self.field.width,
                height: self.field.height,
            });
        }
        if self.grid.rows == 0 || self.grid.cols == 0 {
            return Err(ConfigError::InvalidGridShape {
                rows: self.grid.rows,
                cols: self.grid.cols,
            });
        }
        if !(self.grid.cell_width > 0.0 && self.grid.cell_height > 0.0) {
            return Err(ConfigError::InvalidCellSize {
                width: self.grid.cell_width,
                height: self.grid.cell_height,
            });
        }
        for voice in &self.voices {
            if voice.loop_length == 0 {
                return Err(ConfigError::InvalidLoopLength {
                    layer: voice.layer.clone(),
                });
            }
            if !voice.mass.is_finite() || voice.mass <= 0.0 {
                return Err(ConfigError::InvalidMass {
                    id: 0,
                    mass: voice.mass,
                });
            }
        }
        for cell in &self.cells {
            if cell.row >= self.grid.rows || cell.col >= self.grid.cols {
                return Err(ConfigError::CellOutOfGrid {
                    row: cell.row,
                    col: cell.col,
                    rows: self.grid.rows,
                    cols: self.grid.cols,
                });
            }
            for (layer, program) in &cell.programs {
                if let Some(index) = program.context_index {
                    if index >= self.context_bank.len() {
                        return Err(ConfigError::ContextIndexOutOfRange {
                            layer: layer.clone(),
                            index,
                            len: self.context_bank.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Load a scene from TOML; a missing file gets the built-in default scene
    /// written next to it, a broken file falls back to the default scene.
    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            match fs::read_to_string(path_obj) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => {
                        warn!("failed to parse scene {path}: {err}; using the default scene");
                    }
                },
                Err(err) => {
                    warn!("failed to read scene {path}: {err}; using the default scene");
                }
            }
            return crate::scene::default_scene(0);
        }

        let default_cfg = crate::scene::default_scene(0);
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path_obj, text) {
                    warn!("failed to write default scene to {path}: {err}");
                }
            }
            Err(err) => {
                warn!("failed to serialize default scene: {err}");
            }
        }
        default_cfg
    }
}

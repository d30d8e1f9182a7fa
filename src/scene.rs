//! Built-in default scene: the 4x4 grid performance with ten layers. This is
//! authoring data, not engine logic; a scene loaded from TOML replaces all of
//! it. The harmonic context bank here is a hardcoded progression; extracting
//! one from an existing score is an external preprocessing step.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{
    CellConfig, CellProgram, ClockConfig, FieldConfig, GridConfig, NoteSpec, SceneConfig,
    VoiceConfig,
};
use crate::core::timebase::Tick;

const FIELD_SIZE: f32 = 960.0;
const LOOP_LENGTH: Tick = 1920;

/// Four triads cycled through the sixteen bank entries.
const PROGRESSION: [[u8; 3]; 4] = [
    [57, 60, 64], // Am
    [53, 57, 60], // F
    [48, 52, 55], // C
    [55, 59, 62], // G
];

fn drum_note(channel: u8, note: u8) -> CellProgram {
    CellProgram {
        notes: vec![NoteSpec {
            channel,
            note,
            gate: 10,
        }],
        ..CellProgram::default()
    }
}

fn ticks_from_mask(mask: &[bool]) -> Vec<Tick> {
    mask.iter()
        .enumerate()
        .filter(|(_, on)| **on)
        .map(|(step, _)| step as Tick * 120)
        .collect()
}

fn perc_mask(col: usize) -> Vec<bool> {
    let (t, f) = (true, false);
    match col {
        0 => [f, f, t, f, f, f, f, f].repeat(2),
        1 => [f, f, t, f].repeat(4),
        2 => [f, f, t, f, f, f, t, t].repeat(2),
        _ => [t, f, t, f, t, f, t, t].repeat(2),
    }
}

fn chord_mask(col: usize) -> Vec<bool> {
    let (t, f) = (true, false);
    match col {
        0 => {
            let mut m = [t, f, f, f].repeat(2);
            m.extend([f; 8]);
            m
        }
        1 => {
            let mut m = vec![t, f, f, t, f, f, t, f];
            m.extend([f; 8]);
            m
        }
        2 => {
            let mut m = [t, f, f].repeat(4);
            m.extend([f; 4]);
            m
        }
        _ => {
            let mut m = [t, f, f].repeat(4);
            m.extend([t, f].repeat(2));
            m
        }
    }
}

fn bass_mask(col: usize) -> Vec<bool> {
    let (t, f) = (true, false);
    match col {
        0 => [f, f, t, f].repeat(4),
        1 => [f, f, t, f, f, t, f, t].repeat(2),
        2 => [t, f].repeat(8),
        _ => [f, t, t, t].repeat(4),
    }
}

/// Arp steps get denser to the right: 4*(col+1) active slots of 16, shuffled.
fn arp_offsets(col: usize, rng: &mut SmallRng) -> Vec<Tick> {
    let mut mask = vec![true; 4 * (col + 1)];
    mask.extend(vec![false; 16 - mask.len()]);
    mask.shuffle(rng);
    ticks_from_mask(&mask)
}

fn cell_programs(row: usize, col: usize, rng: &mut SmallRng) -> BTreeMap<String, CellProgram> {
    let mut programs = BTreeMap::new();

    programs.insert(
        "theme".to_string(),
        CellProgram {
            context_index: Some(row * 4 + col),
            ..CellProgram::default()
        },
    );

    programs.insert("kick".to_string(), drum_note(0, 36));

    let snare_notes = [38, 40];
    programs.insert(
        "snare".to_string(),
        drum_note(0, snare_notes[rng.random_range(0..snare_notes.len())]),
    );

    let tom_notes = [48, 45, 47];
    programs.insert(
        "shaker".to_string(),
        drum_note(0, tom_notes[rng.random_range(0..tom_notes.len())]),
    );

    // Hihat pattern drops a different beat per row, with swing on the
    // off-steps.
    let hihat_seq: Vec<Tick> = (0..16)
        .filter(|step| step % 4 != row)
        .map(|step| step as Tick * 120 + if step % 2 == 1 { 30 } else { 0 })
        .collect();
    let mut hihat = drum_note(0, 42);
    hihat.sequence = Some(hihat_seq);
    programs.insert("hihat".to_string(), hihat);

    programs.insert(
        "perc".to_string(),
        CellProgram {
            notes: vec![NoteSpec {
                channel: 5,
                note: 60 + (row * 4 + col) as u8,
                gate: 10,
            }],
            sequence: Some(ticks_from_mask(&perc_mask(col))),
            ..CellProgram::default()
        },
    );

    programs.insert(
        "chord".to_string(),
        CellProgram {
            use_shared_context: true,
            context_channel: 1,
            context_gate: 480,
            sequence: Some(ticks_from_mask(&chord_mask(col))),
            ..CellProgram::default()
        },
    );

    programs.insert(
        "bass".to_string(),
        CellProgram {
            use_shared_context: true,
            context_channel: 2,
            context_gate: 100,
            sequence: Some(ticks_from_mask(&bass_mask(col))),
            ..CellProgram::default()
        },
    );

    programs.insert(
        "arp".to_string(),
        CellProgram {
            use_shared_context: true,
            context_channel: 3,
            context_gate: 50 * col as Tick,
            sequence: Some(arp_offsets(col, rng)),
            arpeggiate: true,
            ..CellProgram::default()
        },
    );

    programs.insert(
        "pad".to_string(),
        CellProgram {
            use_shared_context: true,
            context_channel: 4,
            context_gate: 1900,
            sequence: Some(vec![0]),
            ..CellProgram::default()
        },
    );

    programs
}

fn voice(layer: &str, sequence: Vec<Tick>, enabled: bool, color: [u8; 3]) -> VoiceConfig {
    VoiceConfig {
        layer: layer.to_string(),
        loop_length: LOOP_LENGTH,
        sequence,
        enabled,
        color,
        mass: 10.0,
        radius: 50.0,
        start: None,
    }
}

pub fn default_scene(seed: u64) -> SceneConfig {
    let mut rng = SmallRng::seed_from_u64(seed);

    let voices = vec![
        voice("theme", vec![0], true, [0xF2, 0x01, 0x2F]),
        voice("kick", vec![0, 480, 960, 1440], true, [60, 60, 60]),
        voice("snare", vec![480, 1440], false, [60, 60, 60]),
        voice(
            "hihat",
            (0..16).filter(|i| i % 4 != 0).map(|i| i * 120).collect(),
            false,
            [60, 60, 60],
        ),
        voice("shaker", vec![120, 480, 840, 1200, 1560], false, [60, 60, 60]),
        voice("perc", vec![240, 600, 960, 1320, 1680], false, [60, 60, 60]),
        voice("chord", vec![0], false, [0xFB, 0x51, 0x05]),
        voice("bass", (0..8).map(|i| i * 240).collect(), false, [0x18, 0x61, 0x63]),
        voice("arp", (0..16).map(|i| i * 120).collect(), false, [0xEB, 0xC6, 0x02]),
        voice("pad", vec![0], false, [0x8D, 0x4B, 0x0E]),
    ];

    let mut cells = Vec::new();
    for row in 0..4 {
        for col in 0..4 {
            cells.push(CellConfig {
                row,
                col,
                programs: cell_programs(row, col, &mut rng),
            });
        }
    }

    let context_bank = (0..16)
        .map(|idx| {
            let triad = PROGRESSION[idx % 4];
            // Second half of the bank lifts the voicing an octave.
            let lift = if idx >= 8 { 12 } else { 0 };
            let mut entry = BTreeMap::new();
            entry.insert(
                "chord".to_string(),
                triad.iter().map(|n| n + lift).collect::<Vec<u8>>(),
            );
            entry.insert("bass".to_string(), vec![triad[0] - 24]);
            entry.insert(
                "arp".to_string(),
                triad.iter().map(|n| n + 12 + lift).collect::<Vec<u8>>(),
            );
            entry.insert(
                "pad".to_string(),
                triad.iter().map(|n| n + lift).collect::<Vec<u8>>(),
            );
            entry
        })
        .collect();

    SceneConfig {
        seed,
        clock: ClockConfig::default(),
        field: FieldConfig {
            width: FIELD_SIZE,
            height: FIELD_SIZE,
        },
        grid: GridConfig {
            rows: 4,
            cols: 4,
            cell_width: FIELD_SIZE / 4.0,
            cell_height: FIELD_SIZE / 4.0,
        },
        cells,
        voices,
        context_bank,
    }
}

#[cfg(test)]
mod tests {
    use super::default_scene;

    #[test]
    fn scene_is_deterministic_per_seed() {
        let a = default_scene(42);
        let b = default_scene(42);
        for (ca, cb) in a.cells.iter().zip(&b.cells) {
            assert_eq!(
                ca.programs.get("arp").unwrap().sequence,
                cb.programs.get("arp").unwrap().sequence
            );
            assert_eq!(
                ca.programs.get("snare").unwrap().notes,
                cb.programs.get("snare").unwrap().notes
            );
        }
    }

    #[test]
    fn every_cell_programs_all_ten_layers() {
        let cfg = default_scene(0);
        assert_eq!(cfg.cells.len(), 16);
        for cell in &cfg.cells {
            for layer in [
                "theme", "kick", "snare", "hihat", "shaker", "perc", "chord", "bass", "arp", "pad",
            ] {
                assert!(cell.programs.contains_key(layer), "missing {layer}");
            }
        }
    }

    #[test]
    fn arp_density_grows_with_column() {
        let cfg = default_scene(1);
        for cell in &cfg.cells {
            let arp = cfg.cells[cell.row * 4 + cell.col]
                .programs
                .get("arp")
                .unwrap();
            let steps = arp.sequence.as_ref().unwrap().len();
            assert_eq!(steps, 4 * (cell.col + 1));
        }
    }
}

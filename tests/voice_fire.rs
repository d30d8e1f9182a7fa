use std::collections::BTreeMap;

use crossbeam_channel::{unbounded, Receiver};

use chaosgrid::config::{
    CellConfig, CellProgram, ClockConfig, FieldConfig, GridConfig, NoteSpec, SceneConfig,
    VoiceConfig,
};
use chaosgrid::engine::Engine;
use chaosgrid::music::instrument::MidiMessage;

fn base_config() -> SceneConfig {
    SceneConfig {
        seed: 11,
        clock: ClockConfig::default(),
        field: FieldConfig {
            width: 960.0,
            height: 960.0,
        },
        grid: GridConfig {
            rows: 4,
            cols: 4,
            cell_width: 240.0,
            cell_height: 240.0,
        },
        cells: Vec::new(),
        voices: Vec::new(),
        context_bank: Vec::new(),
    }
}

fn voice_at(layer: &str, sequence: Vec<u64>, x: f32, y: f32, enabled: bool) -> VoiceConfig {
    VoiceConfig {
        layer: layer.to_string(),
        loop_length: 1920,
        sequence,
        enabled,
        color: [0, 0, 0],
        mass: 10.0,
        radius: 50.0,
        start: Some([x, y]),
    }
}

fn cell(row: usize, col: usize, layer: &str, program: CellProgram) -> CellConfig {
    let mut programs = BTreeMap::new();
    programs.insert(layer.to_string(), program);
    CellConfig { row, col, programs }
}

fn engine(cfg: &SceneConfig) -> (Engine, Receiver<MidiMessage>) {
    let (tx, rx) = unbounded();
    let engine = Engine::from_config(cfg, Box::new(tx)).expect("valid config");
    (engine, rx)
}

fn note_ons(rx: &Receiver<MidiMessage>) -> Vec<(u8, u8)> {
    rx.try_iter()
        .filter_map(|msg| match msg {
            MidiMessage::NoteOn { channel, note, .. } => Some((channel, note)),
            _ => None,
        })
        .collect()
}

fn single_note(channel: u8, note: u8) -> CellProgram {
    CellProgram {
        notes: vec![NoteSpec {
            channel,
            note,
            gate: 0,
        }],
        ..CellProgram::default()
    }
}

#[test]
fn one_loop_traversal_fires_exactly_once() {
    let mut cfg = base_config();
    cfg.voices.push(voice_at("lead", vec![0], 10.0, 10.0, true));
    cfg.cells.push(cell(0, 0, "lead", single_note(2, 60)));
    let (mut engine, rx) = engine(&cfg);

    for tick in (0..=1920).step_by(120) {
        engine.advance_music(tick);
    }
    assert_eq!(note_ons(&rx), vec![(2, 60)]);
}

#[test]
fn one_wrap_crossing_fires_exactly_once() {
    let mut cfg = base_config();
    cfg.voices.push(voice_at("lead", vec![0], 10.0, 10.0, true));
    cfg.cells.push(cell(0, 0, "lead", single_note(2, 60)));
    let (mut engine, rx) = engine(&cfg);

    for tick in (1000..=1000 + 1920).step_by(120) {
        engine.advance_music(tick);
    }
    assert_eq!(note_ons(&rx), vec![(2, 60)]);
}

#[test]
fn arpeggio_picks_one_of_the_configured_notes() {
    let mut cfg = base_config();
    let mut voice = voice_at("arp", vec![0], 10.0, 10.0, true);
    voice.loop_length = 16;
    cfg.voices.push(voice);
    cfg.cells.push(cell(
        0,
        0,
        "arp",
        CellProgram {
            notes: vec![
                NoteSpec {
                    channel: 3,
                    note: 60,
                    gate: 0,
                },
                NoteSpec {
                    channel: 3,
                    note: 64,
                    gate: 0,
                },
                NoteSpec {
                    channel: 3,
                    note: 67,
                    gate: 0,
                },
            ],
            arpeggiate: true,
            ..CellProgram::default()
        },
    ));
    let (mut engine, rx) = engine(&cfg);

    // Half-loop sub-steps; the voice fires on every wrap, 1000 wraps total.
    for tick in (8..=16_000u64).step_by(8) {
        engine.advance_music(tick);
    }

    let ons = note_ons(&rx);
    assert_eq!(ons.len(), 1000, "exactly one note-on per fire");
    let mut histogram = BTreeMap::new();
    for (channel, note) in ons {
        assert_eq!(channel, 3);
        assert!([60, 64, 67].contains(&note));
        *histogram.entry(note).or_insert(0u32) += 1;
    }
    assert_eq!(histogram.len(), 3, "all three notes must occur: {histogram:?}");
}

#[test]
fn lead_channel_is_monophonic() {
    let mut cfg = base_config();
    let mut voice = voice_at("lead", vec![0], 10.0, 10.0, true);
    voice.loop_length = 16;
    cfg.voices.push(voice);
    cfg.cells.push(cell(
        0,
        0,
        "lead",
        CellProgram {
            notes: vec![NoteSpec {
                channel: 0,
                note: 60,
                gate: 1000,
            }],
            ..CellProgram::default()
        },
    ));
    let (mut engine, rx) = engine(&cfg);

    for tick in (8..=32).step_by(8) {
        engine.advance_music(tick);
    }
    let msgs: Vec<MidiMessage> = rx.try_iter().collect();
    assert_eq!(
        msgs,
        vec![
            MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 102
            },
            // Second fire forces the still-gated lead note off first.
            MidiMessage::NoteOff {
                channel: 0,
                note: 60
            },
            MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 102
            },
        ]
    );
}

#[test]
fn disabled_voice_keeps_phase_but_stays_silent() {
    let mut cfg = base_config();
    let mut voice = voice_at("lead", vec![8], 10.0, 10.0, false);
    voice.loop_length = 16;
    cfg.voices.push(voice);
    cfg.cells.push(cell(0, 0, "lead", single_note(2, 60)));
    let (mut engine, rx) = engine(&cfg);

    for tick in 1..=40 {
        engine.advance_music(tick);
    }
    assert!(note_ons(&rx).is_empty());

    // Toggling is side-effect free; the next natural fire picks it up.
    engine.voices.set_enabled(0, true);
    assert!(note_ons(&rx).is_empty());
    for tick in 41..=56 {
        engine.advance_music(tick);
    }
    assert_eq!(note_ons(&rx), vec![(2, 60)]);
}

#[test]
fn context_broadcast_reaches_other_voices_the_same_tick() {
    let mut cfg = base_config();
    let mut theme = voice_at("theme", vec![0], 10.0, 10.0, true);
    theme.loop_length = 16;
    let mut pad = voice_at("pad", vec![0], 10.0, 10.0, true);
    pad.loop_length = 16;
    cfg.voices.push(theme);
    cfg.voices.push(pad);

    let mut programs = BTreeMap::new();
    programs.insert(
        "theme".to_string(),
        CellProgram {
            context_index: Some(0),
            ..CellProgram::default()
        },
    );
    programs.insert(
        "pad".to_string(),
        CellProgram {
            use_shared_context: true,
            context_channel: 4,
            context_gate: 0,
            ..CellProgram::default()
        },
    );
    cfg.cells.push(CellConfig {
        row: 0,
        col: 0,
        programs,
    });

    let mut entry = BTreeMap::new();
    entry.insert("pad".to_string(), vec![70u8, 74]);
    cfg.context_bank.push(entry);

    let (mut engine, rx) = engine(&cfg);
    engine.advance_music(8);
    engine.advance_music(16);
    // Both voices fired on the same wrap; the pad already plays the context
    // the theme broadcast this tick.
    assert_eq!(note_ons(&rx), vec![(4, 70), (4, 74)]);
}

#[test]
fn cell_sequence_override_swaps_the_pattern() {
    let mut cfg = base_config();
    cfg.voices.push(voice_at("lead", vec![0], 10.0, 10.0, true));
    cfg.cells.push(cell(
        0,
        0,
        "lead",
        CellProgram {
            notes: vec![NoteSpec {
                channel: 2,
                note: 60,
                gate: 0,
            }],
            sequence: Some(vec![0, 960]),
            ..CellProgram::default()
        },
    ));
    let (mut engine, rx) = engine(&cfg);

    // First traversal follows the base pattern: one fire at the wrap, which
    // installs the cell override.
    for tick in (0..=1920).step_by(120) {
        engine.advance_music(tick);
    }
    assert_eq!(note_ons(&rx).len(), 1);

    // Second traversal runs the override: offsets 0 and 960.
    for tick in (2040..=3840).step_by(120) {
        engine.advance_music(tick);
    }
    assert_eq!(note_ons(&rx).len(), 2);
}

#[test]
fn body_outside_programmed_cells_skips_without_panic() {
    let mut cfg = base_config();
    // Sits in cell (3,3); only (0,0) is programmed.
    cfg.voices.push(voice_at("lead", vec![0], 900.0, 900.0, true));
    cfg.cells.push(cell(0, 0, "lead", single_note(2, 60)));
    let (mut engine, rx) = engine(&cfg);

    for tick in (0..=3840).step_by(120) {
        engine.advance_music(tick);
    }
    assert!(note_ons(&rx).is_empty());
}

#[test]
fn motion_cc_reports_three_controls_per_body() {
    let mut cfg = base_config();
    cfg.voices.push(voice_at("lead", vec![0], 480.0, 240.0, true));
    let (mut engine, rx) = engine(&cfg);

    engine.emit_motion_cc();
    let msgs: Vec<MidiMessage> = rx.try_iter().collect();
    assert_eq!(
        msgs,
        vec![
            MidiMessage::ControlChange {
                channel: 0,
                control: 20,
                value: 64
            },
            MidiMessage::ControlChange {
                channel: 0,
                control: 30,
                value: 32
            },
            MidiMessage::ControlChange {
                channel: 0,
                control: 40,
                value: 0
            },
        ]
    );
}

#[test]
fn shutdown_releases_every_gated_note() {
    let mut cfg = base_config();
    let mut voice = voice_at("lead", vec![0], 10.0, 10.0, true);
    voice.loop_length = 16;
    cfg.voices.push(voice);
    cfg.cells.push(cell(
        0,
        0,
        "lead",
        CellProgram {
            notes: vec![NoteSpec {
                channel: 4,
                note: 70,
                gate: 10_000,
            }],
            ..CellProgram::default()
        },
    ));
    let (mut engine, rx) = engine(&cfg);

    engine.advance_music(8);
    engine.advance_music(16);
    assert_eq!(note_ons(&rx).len(), 1);
    engine.shutdown();
    let offs: Vec<MidiMessage> = rx.try_iter().collect();
    assert_eq!(
        offs,
        vec![MidiMessage::NoteOff {
            channel: 4,
            note: 70
        }]
    );
}

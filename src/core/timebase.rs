pub type Tick = u64;

/// Maps wall-clock seconds onto the musical tick axis.
#[derive(Clone, Copy, Debug)]
pub struct Timebase {
    pub bpm: f32,
    pub ticks_per_beat: u32,
}

impl Timebase {
    pub fn ticks_per_sec(&self) -> f32 {
        self.bpm / 60.0 * self.ticks_per_beat as f32
    }

    pub fn tick_at(&self, elapsed_sec: f32) -> Tick {
        if elapsed_sec <= 0.0 {
            return 0;
        }
        (elapsed_sec as f64 * self.ticks_per_sec() as f64) as Tick
    }

    pub fn tick_to_sec(&self, t: Tick) -> f32 {
        t as f32 / self.ticks_per_sec()
    }
}

#[cfg(test)]
mod tests {
    use super::Timebase;

    #[test]
    fn tick_rate_at_120_bpm() {
        let tb = Timebase {
            bpm: 120.0,
            ticks_per_beat: 480,
        };
        assert_eq!(tb.ticks_per_sec(), 960.0);
        assert_eq!(tb.tick_at(1.0), 960);
        assert_eq!(tb.tick_at(-0.5), 0);
    }

    #[test]
    fn sec_tick_round_trip() {
        let tb = Timebase {
            bpm: 120.0,
            ticks_per_beat: 480,
        };
        let t = 12_345;
        let sec = tb.tick_to_sec(t);
        assert_eq!(tb.tick_at(sec), t);
    }
}

//! Simulated telemetry: narrative events, zone occupancy and system health.
//!
//! Generators only draw values. Scheduling and appending belong to the console, so
//! every generator is a plain function over a [`RandomSource`].

use std::ops::Range;

use crate::vigil_core::{DensitySnapshot, Severity, ZoneCount};

/// Seedable source of pseudo-random numbers.
pub trait RandomSource {
    fn next_u64(&mut self) -> u64;

    fn gen_range_u32(&mut self, range: Range<u32>) -> u32 {
        let width = range.end.saturating_sub(range.start);
        if width == 0 {
            return range.start;
        }
        range.start + (self.next_u64() % u64::from(width)) as u32
    }

    fn chance(&mut self, numerator: u32, denominator: u32) -> bool {
        if denominator == 0 {
            return false;
        }
        self.gen_range_u32(0..denominator) < numerator.min(denominator)
    }

    /// Panics on an empty slice.
    fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T
    where
        Self: Sized,
    {
        let idx = self.gen_range_u32(0..items.len().max(1) as u32) as usize % items.len();
        &items[idx]
    }
}

/// splitmix64; equal seeds give equal sequences.
#[derive(Debug, Clone)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seed from the wall clock and process id.
    pub fn from_entropy() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        Self::new(nanos ^ u64::from(std::process::id()).wrapping_mul(0x9E3779B97F4A7C15))
    }
}

impl RandomSource for SimRng {
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrativeEvent {
    pub message: &'static str,
    pub severity: Severity,
}

const fn narrative(message: &'static str, severity: Severity) -> NarrativeEvent {
    NarrativeEvent { message, severity }
}

pub const NARRATIVE_CATALOG: [NarrativeEvent; 6] = [
    narrative("Motion detected in Zone A", Severity::Info),
    narrative("Person entered restricted area", Severity::Warning),
    narrative("Camera 3 offline", Severity::Error),
    narrative("System scan completed", Severity::Info),
    narrative("High density detected in Zone B", Severity::Warning),
    narrative("All systems operational", Severity::Info),
];

/// Zone label and exclusive upper bound of its simulated count.
pub const ZONES: [(&str, u32); 3] = [("Zone A", 15), ("Zone B", 20), ("Zone C", 10)];

pub const CAMERA_COUNT: u32 = 4;
const CPU_WARNING_PERCENT: u32 = 85;

pub fn next_narrative<R: RandomSource>(rng: &mut R) -> NarrativeEvent {
    *rng.choose(&NARRATIVE_CATALOG)
}

/// Fresh occupancy reading; the total is the sum of the zone draws.
pub fn next_density<R: RandomSource>(rng: &mut R) -> DensitySnapshot {
    let zones: Vec<ZoneCount> = ZONES
        .iter()
        .map(|(label, bound)| ZoneCount { label: (*label).to_string(), count: rng.gen_range_u32(0..*bound) })
        .collect();
    let total_count = zones.iter().map(|zone| zone.count).sum();
    DensitySnapshot { total_count, zones }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReading {
    pub cpu_percent: u32,
    pub memory_percent: u32,
    pub cameras_online: u32,
}

impl HealthReading {
    pub fn severity(&self) -> Severity {
        if self.cpu_percent > CPU_WARNING_PERCENT || self.cameras_online < CAMERA_COUNT {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    pub fn message(&self) -> String {
        format!(
            "System health: CPU {}%, memory {}%, cameras {}/{} online",
            self.cpu_percent, self.memory_percent, self.cameras_online, CAMERA_COUNT
        )
    }
}

pub fn next_health<R: RandomSource>(rng: &mut R) -> HealthReading {
    let cpu_percent = rng.gen_range_u32(5..100);
    let memory_percent = rng.gen_range_u32(20..96);
    let cameras_online = if rng.chance(1, 10) { CAMERA_COUNT - 1 } else { CAMERA_COUNT };
    HealthReading { cpu_percent, memory_percent, cameras_online }
}

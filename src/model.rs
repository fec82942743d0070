//! Simulation data types.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Life stage of an insect.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
pub enum StateName {
    Egg,
    Larva,
    Pupa,
    WildMale,
    SterileMale,
    YoungFemale,
    FertileFemale,
    MatedFemale,
    SterileFemale,
    Dead,
}

impl StateName {
    pub const COUNT: usize = 10;

    pub const ALL: [StateName; Self::COUNT] = [
        StateName::Egg,
        StateName::Larva,
        StateName::Pupa,
        StateName::WildMale,
        StateName::SterileMale,
        StateName::YoungFemale,
        StateName::FertileFemale,
        StateName::MatedFemale,
        StateName::SterileFemale,
        StateName::Dead,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateName::Egg => "Egg",
            StateName::Larva => "Larva",
            StateName::Pupa => "Pupa",
            StateName::WildMale => "WildMale",
            StateName::SterileMale => "SterileMale",
            StateName::YoungFemale => "YoungFemale",
            StateName::FertileFemale => "FertileFemale",
            StateName::MatedFemale => "MatedFemale",
            StateName::SterileFemale => "SterileFemale",
            StateName::Dead => "Dead",
        }
    }

    /// Adult stages are the only ones that migrate between patches.
    pub fn is_adult(self) -> bool {
        matches!(
            self,
            StateName::WildMale
                | StateName::SterileMale
                | StateName::YoungFemale
                | StateName::FertileFemale
                | StateName::MatedFemale
                | StateName::SterileFemale
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match StateName::ALL.iter().find(|state| state.as_str() == s) {
            Some(&state) => Ok(state),
            None => bail!("unknown state {s:?}"),
        }
    }
}

/// Number of insects of each state in one patch.
///
/// The `Dead` entry accumulates the deaths that occurred in the patch.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct PatchCounts([u64; StateName::COUNT]);

impl PatchCounts {
    pub fn get(&self, state: StateName) -> u64 {
        self.0[state.index()]
    }

    pub fn increment(&mut self, state: StateName) {
        self.0[state.index()] += 1;
    }

    pub fn decrement(&mut self, state: StateName) {
        let count = &mut self.0[state.index()];
        debug_assert!(*count > 0, "count of {state} would become negative");
        *count = count.saturating_sub(1);
    }

    /// Number of insects alive in the patch.
    pub fn live_total(&self) -> u64 {
        StateName::ALL
            .iter()
            .filter(|&&state| state != StateName::Dead)
            .map(|&state| self.get(state))
            .sum()
    }
}

/// Outcome of a fertile female's daily mating attempt.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MateOutcome {
    NoMate,
    Fertile,
    Sterile,
}

/// Per-patch counts of the simulation at the end of a given day.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Simulated day (0 is the initial population).
    pub day: u32,

    /// Counts of every patch, indexed by patch.
    pub patches: Vec<PatchCounts>,
}

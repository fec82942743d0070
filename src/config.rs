use crate::sampler::Sampler;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Tolerance on the sum of a probability vector.
pub const PROB_SUM_TOL: f64 = 1e-6;

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub insect: InsectConfig,
}

/// Spatial layout and run length.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of simulated days.
    pub n_days: u32,
    /// Number of patches.
    pub n_patches: usize,

    /// Daily migration probabilities (matrix `n_patches x n_patches`).
    pub migration_rates: Vec<Vec<f64>>,
    /// Daily mating probability of a fertile female in each patch.
    pub mating_rates: Vec<f64>,
    /// Maximum number of eggs held by each patch.
    pub capacities: Vec<u64>,

    /// Seed of the random number generator (random if absent).
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Life-history parameters of the insect species.
///
/// Every [`Sampler`] field is written as `{ dist = "<kind>", params = [..] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsectConfig {
    pub egg_duration: Sampler,
    pub egg_survive: Sampler,

    pub larva_duration: Sampler,
    pub larva_survive: Sampler,

    pub pupa_duration: Sampler,
    pub pupa_survive: Sampler,

    pub wild_male_lifespan: Sampler,

    /// Mating competitiveness of a sterile male relative to a wild male.
    pub sterile_male_competitiveness: f64,
    pub sterile_male_lifespan: Sampler,

    pub female_lifespan: Sampler,
    /// Delay between two reproduction cycles of a mated female.
    pub female_mate_next_cycle: Sampler,
    /// Delay before a young female takes its first blood meal.
    pub female_first_blood_meal: Sampler,
    pub female_max_mating_cycles: u32,

    /// Brood size of male eggs.
    pub eggs_male: Sampler,
    /// Brood size of female eggs.
    pub eggs_female: Sampler,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded with a `[simulation]` and an `[insect]` table.
    /// Distributions are built while parsing, so an unknown distribution kind or
    /// invalid parameters fail here.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        check_num(sim.n_days, 1..100_000).context("invalid number of days")?;
        check_num(sim.n_patches, 1..1_000).context("invalid number of patches")?;

        check_mat(&sim.migration_rates, (sim.n_patches, sim.n_patches), true)
            .context("invalid migration rates")?;
        check_vec(&sim.mating_rates, sim.n_patches, false).context("invalid mating rates")?;
        for &rate in &sim.mating_rates {
            check_num(rate, 0.0..=1.0).context("invalid mating rate")?;
        }
        let n_cap = sim.capacities.len();
        if n_cap != sim.n_patches {
            bail!("capacities length must be {}, but is {n_cap}", sim.n_patches);
        }

        let ins = &self.insect;
        check_num(ins.sterile_male_competitiveness, 0.0..=1.0)
            .context("invalid sterile male competitiveness")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_vec(vec: &[f64], exp_len: usize, prob_vec: bool) -> Result<()> {
    // Ensure vector has expected length.
    let len = vec.len();
    if len != exp_len {
        bail!("vector length must be {exp_len}, but is {len}");
    }
    if !prob_vec {
        return Ok(());
    }
    // For cumulative sampling rows: non-negative elements reaching at least ~1.0.
    if vec.iter().any(|&ele| !ele.is_finite() || ele < 0.0) {
        bail!("vector must have only non-negative elements");
    }
    let sum: f64 = vec.iter().sum();
    if sum < 1.0 - PROB_SUM_TOL {
        bail!("vector must sum to at least 1.0 (tolerance: {PROB_SUM_TOL}), but sums to {sum}");
    }
    Ok(())
}

fn check_mat(mat: &[Vec<f64>], exp_dim: (usize, usize), trans_mat: bool) -> Result<()> {
    // Ensure matrix has expected dimensions.
    let exp_n_rows = exp_dim.0;
    let exp_n_cols = exp_dim.1;
    let n_rows = mat.len();
    if n_rows != exp_n_rows {
        bail!("matrix must have {exp_n_rows} rows, but has {n_rows}");
    }
    if mat.iter().any(|row| row.len() != exp_n_cols) {
        bail!("matrix must have {exp_n_cols} columns");
    }
    if !trans_mat {
        return Ok(());
    }
    // For transition matrices: must be square and each row must cover [0, 1).
    if exp_n_rows != exp_n_cols {
        bail!("matrix must be square");
    }
    for (i_row, row) in mat.iter().enumerate() {
        check_vec(row, exp_n_cols, true).with_context(|| format!("invalid row {i_row}"))?;
    }
    Ok(())
}

//! Initial insect population.

use crate::insect::{Ctx, Insect};
use crate::model::StateName;
use crate::release::parse_count;
use anyhow::{Context, Result, bail};
use std::{fs::File, io::Read, path::Path};

/// Largest initial population accepted from a table.
pub const MAX_INITIAL_INSECTS: u64 = 100_000_000;

/// Group of identical insects present at the start of the simulation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Cohort {
    pub patch: usize,
    pub is_male: bool,
    pub state: StateName,
    pub count: u64,
}

/// Initial population, read from a CSV table.
///
/// The table has a `Patch` column and one column per insect kind. A kind is
/// labelled either `"<Sex> <State>"` (e.g. `Male Egg`, `Female Pupa`) or by a
/// bare adult state name (e.g. `WildMale`, `FertileFemale`), in which case the
/// insect is male when the label contains `Male`.
#[derive(Debug, Default, Clone)]
pub struct InitialPopulation {
    cohorts: Vec<Cohort>,
}

impl InitialPopulation {
    pub fn new(cohorts: Vec<Cohort>) -> Self {
        Self { cohorts }
    }

    pub fn from_file<P: AsRef<Path>>(file: P, n_patches: usize) -> Result<Self> {
        let file = file.as_ref();
        let reader = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        Self::from_reader(reader, n_patches)
            .with_context(|| format!("failed to read initial population from {file:?}"))
    }

    pub fn from_reader<R: Read>(reader: R, n_patches: usize) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().context("failed to read header")?.clone();
        let i_patch = headers
            .iter()
            .position(|col| col == "Patch")
            .context("missing Patch column")?;
        let mut kind_cols = Vec::new();
        for (i_col, col) in headers.iter().enumerate() {
            if i_col == i_patch {
                continue;
            }
            let kind = parse_label(col).with_context(|| format!("invalid column {col:?}"))?;
            kind_cols.push((i_col, kind));
        }

        let mut cohorts = Vec::new();
        for (i_row, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("failed to read row {i_row}"))?;
            let patch: usize = record
                .get(i_patch)
                .unwrap_or("")
                .parse()
                .with_context(|| format!("invalid patch in row {i_row}"))?;
            if patch >= n_patches {
                bail!("patch {patch} out of range (number of patches: {n_patches})");
            }

            for &(i_col, (is_male, state)) in &kind_cols {
                let count = parse_count(record.get(i_col).unwrap_or(""))
                    .with_context(|| format!("invalid count in row {i_row}, column {i_col}"))?;
                if count > 0 {
                    cohorts.push(Cohort {
                        patch,
                        is_male,
                        state,
                        count,
                    });
                }
            }
        }

        let initial = Self::new(cohorts);
        initial.size().context("invalid initial population size")?;
        Ok(initial)
    }

    /// Total number of insects, bounded by [`MAX_INITIAL_INSECTS`].
    pub fn size(&self) -> Result<u64> {
        let size = self
            .cohorts
            .iter()
            .try_fold(0u64, |acc, cohort| acc.checked_add(cohort.count))
            .context("number of insects overflows")?;
        if size > MAX_INITIAL_INSECTS {
            bail!("number of insects must be at most {MAX_INITIAL_INSECTS}, but is {size}");
        }
        Ok(size)
    }

    /// Create every insect of the initial population.
    pub fn spawn(&self, ctx: &mut Ctx) -> Vec<Insect> {
        let mut insects = Vec::new();
        for cohort in &self.cohorts {
            for _ in 0..cohort.count {
                insects.push(Insect::new(cohort.is_male, cohort.state, cohort.patch, ctx));
            }
        }
        insects
    }
}

fn parse_label(label: &str) -> Result<(bool, StateName)> {
    let words: Vec<_> = label.split_whitespace().collect();
    let (is_male, state) = match words.as_slice() {
        [sex, state] => {
            let is_male = match *sex {
                "Male" => true,
                "Female" => false,
                _ => bail!("unknown sex {sex:?}"),
            };
            (is_male, state.parse::<StateName>()?)
        }
        [state] => (state.contains("Male"), state.parse::<StateName>()?),
        _ => bail!("label must be \"<Sex> <State>\" or \"<State>\""),
    };
    if state == StateName::Dead {
        bail!("initial insects cannot be dead");
    }
    Ok((is_male, state))
}

//! Sterile male release schedule.

use crate::insect::{Ctx, Insect};
use crate::model::StateName;
use anyhow::{Context, Result, bail};
use rand::Rng;
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

/// First release day of a generated schedule.
const RANDOM_FIRST_DAY: u32 = 20;
/// Days between two releases of a generated schedule.
const RANDOM_PERIOD: usize = 7;

/// Number of sterile males released in each patch on given days.
///
/// Loaded from a CSV table with a `day` column and one column per patch index
/// (`0`, `1`, ...). Other columns are ignored. Days or patches without an entry
/// release nothing.
#[derive(Debug, Default, Clone)]
pub struct ReleaseStrategy {
    table: BTreeMap<u32, Vec<u64>>,
}

impl ReleaseStrategy {
    pub fn from_file<P: AsRef<Path>>(file: P, n_patches: usize) -> Result<Self> {
        let file = file.as_ref();
        let reader = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        Self::from_reader(reader, n_patches)
            .with_context(|| format!("failed to read release strategy from {file:?}"))
    }

    pub fn from_reader<R: Read>(reader: R, n_patches: usize) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().context("failed to read header")?.clone();
        let i_day = headers
            .iter()
            .position(|col| col == "day")
            .context("missing day column")?;
        let mut patch_cols = Vec::new();
        for (i_col, col) in headers.iter().enumerate() {
            let Ok(patch) = col.parse::<usize>() else {
                continue;
            };
            if patch >= n_patches {
                bail!("patch column {patch} out of range (number of patches: {n_patches})");
            }
            patch_cols.push((i_col, patch));
        }

        let mut table = BTreeMap::new();
        for (i_row, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("failed to read row {i_row}"))?;
            let day = parse_count(record.get(i_day).unwrap_or(""))
                .with_context(|| format!("invalid day in row {i_row}"))?;
            let day = u32::try_from(day).with_context(|| format!("day {day} too large"))?;

            let mut counts = vec![0; n_patches];
            for &(i_col, patch) in &patch_cols {
                counts[patch] = parse_count(record.get(i_col).unwrap_or(""))
                    .with_context(|| format!("invalid count in row {i_row}, patch {patch}"))?;
            }

            // The first row of a repeated day wins.
            table.entry(day).or_insert(counts);
        }

        Ok(Self { table })
    }

    /// Generate a weekly schedule starting on day 20.
    ///
    /// Each patch gets one count drawn uniformly from `0..=max_count`, released
    /// on every scheduled day before `n_days`.
    pub fn random<R: Rng + ?Sized>(
        n_days: u32,
        n_patches: usize,
        max_count: u64,
        rng: &mut R,
    ) -> Self {
        let counts: Vec<u64> = (0..n_patches)
            .map(|_| rng.random_range(0..=max_count))
            .collect();
        let table = (RANDOM_FIRST_DAY..n_days)
            .step_by(RANDOM_PERIOD)
            .map(|day| (day, counts.clone()))
            .collect();
        Self { table }
    }

    /// Write the schedule as a table readable by [`ReleaseStrategy::from_file`].
    pub fn to_file<P: AsRef<Path>>(&self, file: P, n_patches: usize) -> Result<()> {
        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

        let mut header = vec!["day".to_string()];
        header.extend((0..n_patches).map(|patch| patch.to_string()));
        writer.write_record(&header)?;

        for &day in self.table.keys() {
            let mut row = vec![day.to_string()];
            row.extend(
                (0..n_patches).map(|patch| self.number_of_insects(day, patch).to_string()),
            );
            writer.write_record(&row)?;
        }

        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Scheduled number of sterile males for `day` and `patch` (0 if absent).
    pub fn number_of_insects(&self, day: u32, patch: usize) -> u64 {
        self.table
            .get(&day)
            .and_then(|counts| counts.get(patch))
            .copied()
            .unwrap_or(0)
    }

    /// Create the sterile males released on `day` in every patch.
    pub fn release(&self, day: u32, ctx: &mut Ctx) -> Vec<Insect> {
        let mut insects = Vec::new();
        for patch in 0..ctx.spatial.n_patches() {
            for _ in 0..self.number_of_insects(day, patch) {
                insects.push(Insect::new(true, StateName::SterileMale, patch, ctx));
            }
        }
        insects
    }
}

/// Parse a non-negative count, truncating fractional values. Empty cells count as 0.
pub(crate) fn parse_count(field: &str) -> Result<u64> {
    if field.is_empty() {
        return Ok(0);
    }
    let val: f64 = field
        .parse()
        .with_context(|| format!("{field:?} is not a number"))?;
    if !val.is_finite() || val < 0.0 {
        bail!("count must be a non-negative number, but is {val}");
    }
    Ok(val as u64)
}

use crate::model::{Record, StateName};
use crate::release::ReleaseStrategy;
use anyhow::{Context, Result, bail};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Past and future windows of one run, paired with the releases scheduled
/// over the future window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub run_idx: usize,
    pub past: Vec<Vec<u64>>,
    pub future: Vec<Vec<u64>>,
    pub release: Vec<Vec<u64>>,
}

/// Builds one [`Sample`] per run and saves them together.
pub struct Analyzer {
    past_len: usize,
    future_len: usize,
    samples: Vec<Sample>,
}

impl Analyzer {
    pub fn new(past_len: usize, future_len: usize) -> Self {
        Self {
            past_len,
            future_len,
            samples: Vec::new(),
        }
    }

    pub fn add_run<P: AsRef<Path>>(
        &mut self,
        run_idx: usize,
        trajectory_file: P,
        release: &ReleaseStrategy,
    ) -> Result<()> {
        let file = trajectory_file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file);
        let records: Vec<Record> = decode::from_read(reader).context("failed to read records")?;

        let sample = self
            .build_sample(run_idx, &records, release)
            .with_context(|| format!("failed to build sample of run {run_idx}"))?;
        self.samples.push(sample);
        Ok(())
    }

    fn build_sample(
        &self,
        run_idx: usize,
        records: &[Record],
        release: &ReleaseStrategy,
    ) -> Result<Sample> {
        let total_len = self.past_len + self.future_len;
        if records.len() < total_len {
            bail!(
                "run has {} days but the windows need {total_len}",
                records.len()
            );
        }

        let columns = feature_columns();
        let rows: Vec<Vec<u64>> = records[..total_len]
            .iter()
            .map(|record| feature_row(record, &columns))
            .collect();
        let (past, future) = rows.split_at(self.past_len);

        let n_patches = records.first().map_or(0, |record| record.patches.len());
        let release = (0..self.future_len)
            .map(|i_day| {
                let day = (self.past_len + i_day) as u32;
                (0..n_patches)
                    .map(|patch| release.number_of_insects(day, patch))
                    .collect()
            })
            .collect();

        Ok(Sample {
            run_idx,
            past: past.to_vec(),
            future: future.to_vec(),
            release,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self.samples).context("failed to serialize samples")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

/// Per-patch columns of a dataset row: state names in alphabetical order,
/// without `SterileMale` and `Dead`, followed by `SterileMale`.
fn feature_columns() -> Vec<StateName> {
    let mut columns: Vec<_> = StateName::ALL
        .into_iter()
        .filter(|&state| state != StateName::SterileMale && state != StateName::Dead)
        .collect();
    columns.sort_by_key(|state| state.as_str());
    columns.push(StateName::SterileMale);
    columns
}

fn feature_row(record: &Record, columns: &[StateName]) -> Vec<u64> {
    record
        .patches
        .iter()
        .flat_map(|counts| columns.iter().map(move |&state| counts.get(state)))
        .collect()
}

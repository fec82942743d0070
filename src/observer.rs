//! Observers of a running simulation.

use crate::engine::Engine;
use crate::model::{Record, StateName};
use anyhow::{Context, Result};
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Callbacks invoked by [`Engine::run`].
///
/// `on_enter` is called once before the first day, `update` after every day
/// and `on_exit` once after the last day.
pub trait Observer {
    fn on_enter(&mut self, engine: &Engine) -> Result<()>;
    fn update(&mut self, engine: &Engine) -> Result<()>;
    fn on_exit(&mut self, engine: &Engine) -> Result<()>;
}

/// Logs the progress of the simulation.
pub struct Logger;

impl Observer for Logger {
    fn on_enter(&mut self, engine: &Engine) -> Result<()> {
        log::info!(
            "simulation started with {} insects (seed {})",
            engine.population().active().len(),
            engine.seed()
        );
        Ok(())
    }

    fn update(&mut self, engine: &Engine) -> Result<()> {
        let n_days = engine.cfg().simulation.n_days;
        let progress = 100.0 * engine.day() as f64 / n_days as f64;
        let spatial = engine.spatial();
        log::info!(
            "day {}/{n_days} ({progress:06.2}%): {} live insects, {} sterile males",
            engine.day(),
            spatial.live_total(),
            spatial.total(StateName::SterileMale)
        );
        Ok(())
    }

    fn on_exit(&mut self, engine: &Engine) -> Result<()> {
        if engine.population().is_empty() {
            log::warn!("population went extinct by day {}", engine.day());
        }
        log::info!(
            "simulation finished with {} insects",
            engine.spatial().live_total()
        );
        Ok(())
    }
}

/// Collects the per-patch counts of every day and writes them out at the end.
///
/// Writes one `patch_<i>.csv` per patch (a `Day` column and one column per
/// live state) and the whole trajectory to `trajectory.msgpack`.
pub struct DataCollector {
    out_dir: PathBuf,
    records: Vec<Record>,
}

impl DataCollector {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            records: Vec::new(),
        }
    }

    fn write_patch_file(&self, patch: usize) -> Result<()> {
        let file = self.out_dir.join(format!("patch_{patch}.csv"));
        let mut writer =
            csv::Writer::from_path(&file).with_context(|| format!("failed to create {file:?}"))?;

        let states = live_states();
        let mut header = vec!["Day"];
        header.extend(states.iter().map(|state| state.as_str()));
        writer.write_record(&header)?;

        for record in &self.records {
            let counts = &record.patches[patch];
            let mut row = vec![record.day.to_string()];
            row.extend(states.iter().map(|&state| counts.get(state).to_string()));
            writer.write_record(&row)?;
        }

        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    fn write_trajectory(&self) -> Result<()> {
        let file = self.out_dir.join(TRAJECTORY_FILE);
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self.records).context("failed to serialize records")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

impl Observer for DataCollector {
    fn on_enter(&mut self, engine: &Engine) -> Result<()> {
        self.records.clear();
        self.records.push(engine.record());
        Ok(())
    }

    fn update(&mut self, engine: &Engine) -> Result<()> {
        self.records.push(engine.record());
        Ok(())
    }

    fn on_exit(&mut self, engine: &Engine) -> Result<()> {
        for patch in 0..engine.spatial().n_patches() {
            self.write_patch_file(patch)
                .with_context(|| format!("failed to write counts of patch {patch}"))?;
        }
        self.write_trajectory()
            .context("failed to write trajectory")?;
        log::info!("wrote {} records to {:?}", self.records.len(), self.out_dir);
        Ok(())
    }
}

/// Name of the trajectory file written in each run directory.
pub const TRAJECTORY_FILE: &str = "trajectory.msgpack";

fn live_states() -> Vec<StateName> {
    StateName::ALL
        .into_iter()
        .filter(|&state| state != StateName::Dead)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::two_patch_config;
    use crate::initial::{Cohort, InitialPopulation};
    use crate::release::ReleaseStrategy;
    use rmp_serde::decode;
    use std::{env, fs, io::BufReader};

    #[test]
    fn collector_writes_every_day() {
        let out_dir = env::temp_dir().join("sitsim_collector_writes_every_day");
        fs::remove_dir_all(&out_dir).ok();
        fs::create_dir_all(&out_dir).unwrap();

        let mut cfg = two_patch_config();
        cfg.simulation.n_days = 5;
        let initial = InitialPopulation::new(vec![Cohort {
            patch: 1,
            is_male: true,
            state: StateName::WildMale,
            count: 8,
        }]);
        let mut engine = Engine::new(cfg, &initial, ReleaseStrategy::default(), 71).unwrap();
        let mut observers: Vec<Box<dyn Observer>> =
            vec![Box::new(Logger), Box::new(DataCollector::new(&out_dir))];
        engine.run(&mut observers).unwrap();

        let csv = fs::read_to_string(out_dir.join("patch_1.csv")).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("Day,Egg,Larva,Pupa,WildMale"));
        assert!(!lines[0].contains("Dead"));
        assert!(lines[1].starts_with("0,0,0,0,8"));
        assert!(out_dir.join("patch_0.csv").exists());

        let reader = BufReader::new(File::open(out_dir.join(TRAJECTORY_FILE)).unwrap());
        let records: Vec<Record> = decode::from_read(reader).unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[5].day, 5);
        assert_eq!(records[0].patches[1].get(StateName::WildMale), 8);

        fs::remove_dir_all(&out_dir).ok();
    }
}

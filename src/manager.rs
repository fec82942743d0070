use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::initial::InitialPopulation;
use crate::observer::{DataCollector, Logger, Observer, TRAJECTORY_FILE};
use crate::release::ReleaseStrategy;
use anyhow::{Context, Result, bail};
use glob::glob;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::{
    fs,
    path::{Path, PathBuf},
};

const CONFIG_FILE: &str = "config.toml";
const INITIAL_FILE: &str = "initial_insects.csv";
const RELEASE_FILE: &str = "release_strategy.csv";
const DATASET_FILE: &str = "dataset.msgpack";

/// RNG stream of generated release schedules, apart from the engine's stream 0.
const RELEASE_STREAM: u64 = 1;

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg = Config::from_file(sim_dir.join(CONFIG_FILE)).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run one simulation into a new run directory.
    ///
    /// With `random_release`, the run gets its own weekly schedule with counts
    /// up to that value instead of the simulation's `release_strategy.csv`.
    pub fn create_run(&self, seed: Option<u64>, random_release: Option<u64>) -> Result<()> {
        let n_patches = self.cfg.simulation.n_patches;
        let initial = InitialPopulation::from_file(self.sim_dir.join(INITIAL_FILE), n_patches)
            .context("failed to load initial population")?;

        let seed = seed
            .or(self.cfg.simulation.seed)
            .unwrap_or_else(rand::random);
        log::info!("seed = {seed}");

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let run_release_file = run_dir.join(RELEASE_FILE);
        let release = match random_release {
            Some(max_count) => {
                let mut rng = ChaCha12Rng::seed_from_u64(seed);
                rng.set_stream(RELEASE_STREAM);
                let n_days = self.cfg.simulation.n_days;
                let release = ReleaseStrategy::random(n_days, n_patches, max_count, &mut rng);
                release
                    .to_file(&run_release_file, n_patches)
                    .context("failed to save release strategy")?;
                log::info!("generated {run_release_file:?}");
                release
            }
            None => {
                let release_file = self.sim_dir.join(RELEASE_FILE);
                let release = ReleaseStrategy::from_file(&release_file, n_patches)
                    .context("failed to load release strategy")?;
                fs::copy(&release_file, &run_release_file)
                    .with_context(|| format!("failed to copy {release_file:?}"))?;
                release
            }
        };

        let mut engine = Engine::new(self.cfg.clone(), &initial, release, seed)
            .context("failed to construct engine")?;
        let mut observers: Vec<Box<dyn Observer>> =
            vec![Box::new(Logger), Box::new(DataCollector::new(&run_dir))];
        engine
            .run(&mut observers)
            .context("failed to run simulation")?;

        Ok(())
    }

    pub fn analyze_sim(&self, past_len: usize, future_len: usize) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        if n_runs == 0 {
            bail!("no runs to analyze in {:?}", self.sim_dir);
        }

        let mut analyzer = Analyzer::new(past_len, future_len);
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            let release = ReleaseStrategy::from_file(
                run_dir.join(RELEASE_FILE),
                self.cfg.simulation.n_patches,
            )
            .context("failed to load release strategy")?;
            analyzer
                .add_run(run_idx, run_dir.join(TRAJECTORY_FILE), &release)
                .with_context(|| format!("failed to analyze {run_dir:?}"))?;
        }

        let dataset_file = self.sim_dir.join(DATASET_FILE);
        analyzer
            .save_results(&dataset_file)
            .context("failed to save results")?;
        log::info!("wrote {} samples to {dataset_file:?}", analyzer.n_samples());

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let dataset_file = self.sim_dir.join(DATASET_FILE);
        if dataset_file.exists() {
            fs::remove_file(&dataset_file)
                .with_context(|| format!("failed to remove {dataset_file:?}"))?;
            log::info!("removed {dataset_file:?}");
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }
}

use crate::config::Config;
use crate::initial::InitialPopulation;
use crate::insect::Ctx;
use crate::model::Record;
use crate::observer::Observer;
use crate::population::Population;
use crate::release::ReleaseStrategy;
use crate::spatial::SpatialManager;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Simulation engine.
///
/// Owns the configuration, the spatial manager, the scheduled population, the
/// release strategy and the random number generator of a single run. Runs share
/// nothing, so independent engines can be driven side by side.
pub struct Engine {
    cfg: Config,
    spatial: SpatialManager,
    population: Population,
    release: ReleaseStrategy,
    rng: ChaCha12Rng,
    seed: u64,
    day: u32,
}

impl Engine {
    /// Create a new `Engine` holding the given initial population.
    pub fn new(
        cfg: Config,
        initial: &InitialPopulation,
        release: ReleaseStrategy,
        seed: u64,
    ) -> Result<Self> {
        let mut spatial =
            SpatialManager::new(&cfg.simulation).context("failed to construct spatial manager")?;
        let mut rng = ChaCha12Rng::seed_from_u64(seed);

        let mut ctx = Ctx {
            cfg: &cfg.insect,
            spatial: &mut spatial,
            rng: &mut rng,
        };
        let insects = initial.spawn(&mut ctx);
        let population = Population::new(insects);

        Ok(Self {
            cfg,
            spatial,
            population,
            release,
            rng,
            seed,
            day: 0,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Last simulated day (0 before the first step).
    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn spatial(&self) -> &SpatialManager {
        &self.spatial
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Snapshot of the per-patch counts at the current day.
    pub fn record(&self) -> Record {
        Record {
            day: self.day,
            patches: self.spatial.counts().to_vec(),
        }
    }

    /// Run every configured day, notifying the observers.
    ///
    /// Each observer is entered once before the first day, updated after every
    /// day and exited once after the last day.
    pub fn run(&mut self, observers: &mut [Box<dyn Observer>]) -> Result<()> {
        for obs in observers.iter_mut() {
            obs.on_enter(self).context("failed to enter observer")?;
        }

        for _ in 0..self.cfg.simulation.n_days {
            self.perform_day();

            for obs in observers.iter_mut() {
                obs.update(self).context("failed to update observer")?;
            }
        }

        for obs in observers.iter_mut() {
            obs.on_exit(self).context("failed to exit observer")?;
        }

        Ok(())
    }

    /// Simulate a single day.
    pub fn perform_day(&mut self) {
        self.day += 1;

        let mut ctx = Ctx {
            cfg: &self.cfg.insect,
            spatial: &mut self.spatial,
            rng: &mut self.rng,
        };

        // Age every scheduled insect exactly once; survivors and their brood
        // go to the next-day buffer.
        while let Some(mut insect) = self.population.pop() {
            insect.update(&mut ctx);
            if insect.is_dead() {
                continue;
            }

            let brood = insect.reproduce(&mut ctx);
            self.population.extend(brood);
            self.population.push(insect);
        }

        let released = self.release.release(self.day, &mut ctx);
        self.population.extend(released);

        self.population.advance_day();
        debug_assert!(self.population.pending().is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{config_with, two_patch_config};
    use crate::initial::Cohort;
    use crate::model::StateName;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Default)]
    struct Calls {
        n_enter: u32,
        days: Vec<u32>,
        n_exit: u32,
    }

    struct Recorder(Rc<RefCell<Calls>>);

    impl Observer for Recorder {
        fn on_enter(&mut self, engine: &Engine) -> Result<()> {
            assert_eq!(engine.day(), 0);
            self.0.borrow_mut().n_enter += 1;
            Ok(())
        }

        fn update(&mut self, engine: &Engine) -> Result<()> {
            self.0.borrow_mut().days.push(engine.day());
            Ok(())
        }

        fn on_exit(&mut self, _engine: &Engine) -> Result<()> {
            self.0.borrow_mut().n_exit += 1;
            Ok(())
        }
    }

    fn assert_counts_match_population(engine: &Engine) {
        let active = engine.population().active();
        assert!(engine.population().pending().is_empty());
        assert_eq!(engine.spatial().live_total(), active.len() as u64);
        for state in StateName::ALL {
            if state == StateName::Dead {
                continue;
            }
            for patch in 0..engine.spatial().n_patches() {
                let n_scheduled = active
                    .iter()
                    .filter(|insect| insect.state() == state && insect.patch() == patch)
                    .count() as u64;
                assert_eq!(engine.spatial().counts()[patch].get(state), n_scheduled);
            }
        }
    }

    fn cohort(patch: usize, is_male: bool, state: StateName, count: u64) -> Cohort {
        Cohort {
            patch,
            is_male,
            state,
            count,
        }
    }

    #[test]
    fn counts_are_conserved_every_day() {
        let cfg = two_patch_config();
        let initial = InitialPopulation::new(vec![
            cohort(0, true, StateName::WildMale, 50),
            cohort(0, false, StateName::FertileFemale, 50),
            cohort(1, false, StateName::Egg, 30),
            cohort(1, true, StateName::Pupa, 20),
        ]);
        let release =
            ReleaseStrategy::from_reader("day,0,1\n3,10,10\n8,0,25\n".as_bytes(), 2).unwrap();
        let mut engine = Engine::new(cfg, &initial, release, 61).unwrap();

        assert_counts_match_population(&engine);
        for _ in 0..30 {
            engine.perform_day();
            assert_counts_match_population(&engine);
        }
        assert_eq!(engine.day(), 30);
    }

    #[test]
    fn release_lands_on_scheduled_day_and_patch() {
        let cfg = two_patch_config();
        let release = ReleaseStrategy::from_reader("day,0,1\n20,5,0\n".as_bytes(), 2).unwrap();
        let mut engine = Engine::new(cfg, &InitialPopulation::default(), release, 62).unwrap();

        for _ in 0..19 {
            engine.perform_day();
            assert_eq!(engine.spatial().live_total(), 0);
        }
        engine.perform_day();
        assert_eq!(engine.spatial().counts()[0].get(StateName::SterileMale), 5);
        assert_eq!(engine.spatial().counts()[1].get(StateName::SterileMale), 0);
        assert_eq!(engine.population().active().len(), 5);
    }

    #[test]
    fn observers_are_notified_around_every_day() {
        let cfg = two_patch_config();
        let initial = InitialPopulation::new(vec![cohort(0, true, StateName::WildMale, 5)]);
        let mut engine = Engine::new(cfg, &initial, ReleaseStrategy::default(), 63).unwrap();

        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut observers: Vec<Box<dyn Observer>> = vec![Box::new(Recorder(calls.clone()))];
        engine.run(&mut observers).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.n_enter, 1);
        assert_eq!(calls.days, (1..=30).collect::<Vec<_>>());
        assert_eq!(calls.n_exit, 1);
    }

    fn baseline_run(seed: u64) -> Vec<Record> {
        let cfg = config_with(
            r#"
[simulation]
n_days = 50
n_patches = 1
migration_rates = [[1.0]]
mating_rates = [0.3]
capacities = [5000]
"#,
        );
        let initial = InitialPopulation::new(vec![
            cohort(0, true, StateName::WildMale, 100),
            cohort(0, false, StateName::FertileFemale, 100),
        ]);
        let mut engine = Engine::new(cfg, &initial, ReleaseStrategy::default(), seed).unwrap();

        let mut records = vec![engine.record()];
        for _ in 0..50 {
            engine.perform_day();
            assert_counts_match_population(&engine);
            records.push(engine.record());
        }
        records
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let run_a = baseline_run(42);
        let run_b = baseline_run(42);
        assert_eq!(run_a, run_b);

        // Without sterile males no female can be sterilized.
        for record in &run_a {
            assert_eq!(record.patches[0].get(StateName::SterileMale), 0);
            assert_eq!(record.patches[0].get(StateName::SterileFemale), 0);
        }
        assert!(run_a.iter().any(|record| record.patches[0].get(StateName::MatedFemale) > 0));
        assert!(run_a.iter().any(|record| record.patches[0].get(StateName::Egg) > 0));
    }
}

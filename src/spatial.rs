//! Per-patch demography: live counts, migration, mating and brood sizing.

use crate::config::{InsectConfig, PROB_SUM_TOL, SimulationConfig};
use crate::insect::Insect;
use crate::model::{MateOutcome, PatchCounts, StateName};
use anyhow::{Result, bail};
use rand::Rng;

/// Owner of the per-patch live counts.
///
/// Counts are updated incrementally: once when an insect is created, once per
/// state transition and once per migration. Summed over patches, the count of
/// every live state equals the number of scheduled insects in that state.
pub struct SpatialManager {
    cdf_migration: Vec<Vec<f64>>,
    mating_rates: Vec<f64>,
    capacities: Vec<u64>,
    counts: Vec<PatchCounts>,
}

impl SpatialManager {
    /// Build the manager and the cumulative migration matrix.
    ///
    /// # Errors
    /// Returns an error if the patch vectors are inconsistent or if a cumulative
    /// migration row does not reach 1.0, which would leave part of the sampling
    /// range without a destination.
    pub fn new(cfg: &SimulationConfig) -> Result<Self> {
        let n_patches = cfg.n_patches;
        if cfg.migration_rates.len() != n_patches
            || cfg.mating_rates.len() != n_patches
            || cfg.capacities.len() != n_patches
        {
            bail!("patch vectors must all have {n_patches} entries");
        }

        let mut cdf_migration = Vec::with_capacity(n_patches);
        for (i_row, row) in cfg.migration_rates.iter().enumerate() {
            if row.len() != n_patches {
                bail!("migration row {i_row} must have {n_patches} entries");
            }
            let cdf: Vec<f64> = row
                .iter()
                .scan(0.0, |acc, &rate| {
                    *acc += rate;
                    Some(*acc)
                })
                .collect();
            let total = cdf.last().copied().unwrap_or(0.0);
            if total.is_nan() || total < 1.0 - PROB_SUM_TOL {
                bail!("cumulative migration row {i_row} reaches {total}, not 1.0");
            }
            cdf_migration.push(cdf);
        }

        Ok(Self {
            cdf_migration,
            mating_rates: cfg.mating_rates.clone(),
            capacities: cfg.capacities.clone(),
            counts: vec![PatchCounts::default(); n_patches],
        })
    }

    pub fn n_patches(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[PatchCounts] {
        &self.counts
    }

    /// Number of live insects in a given state, summed over patches.
    pub fn total(&self, state: StateName) -> u64 {
        self.counts.iter().map(|counts| counts.get(state)).sum()
    }

    /// Number of live insects, summed over patches.
    pub fn live_total(&self) -> u64 {
        self.counts.iter().map(PatchCounts::live_total).sum()
    }

    pub fn init_insect(&mut self, insect: &Insect) {
        self.counts[insect.patch()].increment(insect.state());
    }

    pub fn update_insect_state(&mut self, insect: &Insect, old: StateName, new: StateName) {
        let counts = &mut self.counts[insect.patch()];
        counts.decrement(old);
        counts.increment(new);
    }

    /// Roll the daily migration of an insect and move it if needed.
    ///
    /// Eggs, larvae and pupae never move.
    pub fn update_insect_patch<R: Rng + ?Sized>(&mut self, insect: &mut Insect, rng: &mut R) {
        let state = insect.state();
        if !state.is_adult() {
            return;
        }

        let old_patch = insect.patch();
        let new_patch = self.random_patch(old_patch, rng);
        if new_patch == old_patch {
            return;
        }

        self.counts[old_patch].decrement(state);
        self.counts[new_patch].increment(state);
        insect.move_to(new_patch);
    }

    /// Sample whether a fertile female in `patch` mates today, and with whom.
    ///
    /// Sterile males compete for matings with weight `competitiveness` relative
    /// to wild males. Without any male in the patch no mating occurs.
    pub fn mate_occurs<R: Rng + ?Sized>(
        &self,
        patch: usize,
        cfg: &InsectConfig,
        rng: &mut R,
    ) -> MateOutcome {
        if rng.random::<f64>() >= self.mating_rates[patch] {
            return MateOutcome::NoMate;
        }

        let counts = &self.counts[patch];
        let n_wm = counts.get(StateName::WildMale) as f64;
        let n_sm = counts.get(StateName::SterileMale) as f64;
        let weight = n_wm + cfg.sterile_male_competitiveness * n_sm;
        if weight <= 0.0 {
            return MateOutcome::NoMate;
        }

        if rng.random_range(0.0..weight) < n_wm {
            MateOutcome::Fertile
        } else {
            MateOutcome::Sterile
        }
    }

    /// Sample the (male, female) brood of a female laying in `patch`.
    ///
    /// Both sizes are scaled down by the same factor when they would exceed the
    /// egg capacity left in the patch, so the brood never overfills it.
    pub fn numbers_of_eggs<R: Rng + ?Sized>(
        &self,
        patch: usize,
        cfg: &InsectConfig,
        rng: &mut R,
    ) -> (u64, u64) {
        let n_egg = self.counts[patch].get(StateName::Egg);
        let max_eggs = self.capacities[patch].saturating_sub(n_egg);

        let n_male = cfg.eggs_male.sample(rng).max(0.0);
        let n_female = cfg.eggs_female.sample(rng).max(0.0);
        let sum = n_male + n_female;
        if sum <= 0.0 {
            return (0, 0);
        }

        let k = (max_eggs as f64 / sum).min(1.0);
        let n_male = (n_male * k) as u64;
        let n_female = (n_female * k) as u64;
        debug_assert!(n_male + n_female <= max_eggs);

        (n_male, n_female)
    }

    fn random_patch<R: Rng + ?Sized>(&self, patch: usize, rng: &mut R) -> usize {
        let cdf = &self.cdf_migration[patch];
        let r = rng.random::<f64>();
        // Rows ending within the tolerance below 1.0 fall back to the last patch.
        cdf.iter().position(|&cum| cum >= r).unwrap_or(cdf.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{config_with, two_patch_config};
    use crate::insect::Ctx;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn single_patch(mating_rate: f64, capacity: u64) -> crate::config::Config {
        config_with(&format!(
            r#"
[simulation]
n_days = 10
n_patches = 1
migration_rates = [[1.0]]
mating_rates = [{mating_rate:?}]
capacities = [{capacity}]
"#
        ))
    }

    #[test]
    fn short_migration_row_is_rejected() {
        let mut cfg = two_patch_config();
        cfg.simulation.migration_rates[1] = vec![0.2, 0.3];
        assert!(SpatialManager::new(&cfg.simulation).is_err());
    }

    #[test]
    fn migration_follows_cumulative_row() {
        let mut cfg = two_patch_config();
        cfg.simulation.migration_rates = vec![vec![0.0, 1.0], vec![0.0, 1.0]];
        let mut spatial = SpatialManager::new(&cfg.simulation).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let mut ctx = Ctx {
            cfg: &cfg.insect,
            spatial: &mut spatial,
            rng: &mut rng,
        };
        let mut male = Insect::new(true, StateName::WildMale, 0, &mut ctx);
        let mut egg = Insect::new(false, StateName::Egg, 0, &mut ctx);

        spatial.update_insect_patch(&mut male, &mut rng);
        spatial.update_insect_patch(&mut egg, &mut rng);

        assert_eq!(male.patch(), 1);
        assert_eq!(egg.patch(), 0);
        assert_eq!(spatial.counts()[0].get(StateName::WildMale), 0);
        assert_eq!(spatial.counts()[1].get(StateName::WildMale), 1);
        assert_eq!(spatial.counts()[0].get(StateName::Egg), 1);
    }

    #[test]
    fn raw_cumulative_row_above_one() {
        let mut cfg = two_patch_config();
        cfg.simulation.migration_rates = vec![vec![0.6, 0.6], vec![0.0, 1.0]];
        let mut spatial = SpatialManager::new(&cfg.simulation).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(16);
        let mut ctx = Ctx {
            cfg: &cfg.insect,
            spatial: &mut spatial,
            rng: &mut rng,
        };
        let mut males: Vec<_> = (0..10_000)
            .map(|_| Insect::new(true, StateName::WildMale, 0, &mut ctx))
            .collect();

        for male in &mut males {
            spatial.update_insect_patch(male, &mut rng);
        }

        let n_stay = spatial.counts()[0].get(StateName::WildMale);
        assert!((5_700..=6_300).contains(&n_stay), "{n_stay} insects stayed");
        assert_eq!(n_stay + spatial.counts()[1].get(StateName::WildMale), 10_000);
    }

    #[test]
    fn no_males_means_no_mate() {
        let cfg = single_patch(1.0, 100);
        let spatial = SpatialManager::new(&cfg.simulation).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(12);
        for _ in 0..100 {
            assert_eq!(
                spatial.mate_occurs(0, &cfg.insect, &mut rng),
                MateOutcome::NoMate
            );
        }
    }

    #[test]
    fn mate_outcome_depends_on_male_pool() {
        let cfg = single_patch(1.0, 100);
        let mut spatial = SpatialManager::new(&cfg.simulation).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(13);
        let mut ctx = Ctx {
            cfg: &cfg.insect,
            spatial: &mut spatial,
            rng: &mut rng,
        };
        let _male = Insect::new(true, StateName::WildMale, 0, &mut ctx);
        for _ in 0..100 {
            assert_eq!(
                spatial.mate_occurs(0, &cfg.insect, &mut rng),
                MateOutcome::Fertile
            );
        }

        let mut spatial = SpatialManager::new(&cfg.simulation).unwrap();
        let mut ctx = Ctx {
            cfg: &cfg.insect,
            spatial: &mut spatial,
            rng: &mut rng,
        };
        let _male = Insect::new(true, StateName::SterileMale, 0, &mut ctx);
        for _ in 0..100 {
            assert_eq!(
                spatial.mate_occurs(0, &cfg.insect, &mut rng),
                MateOutcome::Sterile
            );
        }
    }

    #[test]
    fn zero_mating_rate_never_mates() {
        let cfg = single_patch(0.0, 100);
        let mut spatial = SpatialManager::new(&cfg.simulation).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(14);
        let mut ctx = Ctx {
            cfg: &cfg.insect,
            spatial: &mut spatial,
            rng: &mut rng,
        };
        let _male = Insect::new(true, StateName::WildMale, 0, &mut ctx);
        for _ in 0..100 {
            assert_eq!(
                spatial.mate_occurs(0, &cfg.insect, &mut rng),
                MateOutcome::NoMate
            );
        }
    }

    #[test]
    fn brood_respects_capacity() {
        let cfg = single_patch(1.0, 12);
        let mut spatial = SpatialManager::new(&cfg.simulation).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(15);
        for _ in 0..200 {
            let (n_male, n_female) = spatial.numbers_of_eggs(0, &cfg.insect, &mut rng);
            assert!(n_male + n_female <= 12);
        }

        let mut ctx = Ctx {
            cfg: &cfg.insect,
            spatial: &mut spatial,
            rng: &mut rng,
        };
        let _eggs: Vec<_> = (0..10)
            .map(|_| Insect::new(true, StateName::Egg, 0, &mut ctx))
            .collect();
        for _ in 0..200 {
            let (n_male, n_female) = spatial.numbers_of_eggs(0, &cfg.insect, &mut rng);
            assert!(n_male + n_female <= 2);
        }

        let _more: Vec<_> = (0..5)
            .map(|_| {
                Insect::new(
                    false,
                    StateName::Egg,
                    0,
                    &mut Ctx {
                        cfg: &cfg.insect,
                        spatial: &mut spatial,
                        rng: &mut rng,
                    },
                )
            })
            .collect();
        assert_eq!(spatial.numbers_of_eggs(0, &cfg.insect, &mut rng), (0, 0));
    }
}

//! Life-cycle state machine of a single insect.
//!
//! Every operation receives a [`Ctx`] holding the species parameters, the
//! spatial manager and the random number generator, so insects never keep a
//! reference to shared state.

use crate::config::InsectConfig;
use crate::model::{MateOutcome, StateName};
use crate::sampler::Sampler;
use crate::spatial::SpatialManager;
use rand_chacha::ChaCha12Rng;

/// Shared state threaded through every state-machine operation.
pub struct Ctx<'a> {
    pub cfg: &'a InsectConfig,
    pub spatial: &'a mut SpatialManager,
    pub rng: &'a mut ChaCha12Rng,
}

/// Individual insect of the simulation.
#[derive(Debug)]
pub struct Insect {
    is_male: bool,
    state: StateName,
    patch: usize,

    /// Days spent in the current state.
    age: u32,
    /// Age after which the current state expires.
    duration: f64,

    /// Age of the next reproduction cycle (mated females only).
    next_cycle: f64,
    nb_cycles: u32,
}

impl Insect {
    /// Create an insect, register it in its patch and enter its initial state.
    pub fn new(is_male: bool, state: StateName, patch: usize, ctx: &mut Ctx) -> Self {
        let mut insect = Self {
            is_male,
            state,
            patch,
            age: 0,
            duration: 0.0,
            next_cycle: 0.0,
            nb_cycles: 0,
        };
        ctx.spatial.init_insect(&insect);
        insect.on_enter(ctx);
        insect
    }

    pub fn state(&self) -> StateName {
        self.state
    }

    pub fn patch(&self) -> usize {
        self.patch
    }

    pub fn is_dead(&self) -> bool {
        self.state == StateName::Dead
    }

    pub(crate) fn move_to(&mut self, patch: usize) {
        self.patch = patch;
    }

    /// Leave the current state and enter `new_state`.
    ///
    /// The exit hook, the age reset, the count update and the enter hook run
    /// back to back, so no other insect observes a half-done transition.
    pub fn set_state(&mut self, new_state: StateName, ctx: &mut Ctx) {
        self.on_exit();

        let old_state = self.state;
        self.state = new_state;
        self.age = 0;

        ctx.spatial.update_insect_state(self, old_state, new_state);

        self.on_enter(ctx);
    }

    /// Advance the insect by one day.
    pub fn update(&mut self, ctx: &mut Ctx) {
        match self.state {
            StateName::Dead => {}
            StateName::FertileFemale => self.update_fertile_female(ctx),
            _ => self.update_default(ctx),
        }
    }

    /// Lay the eggs due today, if any.
    ///
    /// Only mated females reproduce. New eggs are registered in the mother's
    /// patch immediately, so later mothers see the reduced egg capacity.
    pub fn reproduce(&mut self, ctx: &mut Ctx) -> Vec<Insect> {
        if self.state != StateName::MatedFemale
            || f64::from(self.age) < self.next_cycle
            || self.nb_cycles > ctx.cfg.female_max_mating_cycles
        {
            return Vec::new();
        }

        let patch = self.patch;
        let (n_male, n_female) = ctx.spatial.numbers_of_eggs(patch, ctx.cfg, ctx.rng);

        let mut brood = Vec::with_capacity((n_male + n_female) as usize);
        for _ in 0..n_male {
            brood.push(Insect::new(true, StateName::Egg, patch, ctx));
        }
        for _ in 0..n_female {
            brood.push(Insect::new(false, StateName::Egg, patch, ctx));
        }

        // The cycle counter is not advanced, so the cycle cap never binds.
        self.next_cycle = f64::from(self.age) + ctx.cfg.female_mate_next_cycle.sample(ctx.rng);

        brood
    }

    fn update_default(&mut self, ctx: &mut Ctx) {
        if self.state.is_adult() {
            ctx.spatial.update_insect_patch(self, ctx.rng);
        }
        self.age += 1;
        if self.expired() {
            self.transition(ctx);
        }
    }

    fn update_fertile_female(&mut self, ctx: &mut Ctx) {
        ctx.spatial.update_insect_patch(self, ctx.rng);
        self.age += 1;
        if self.expired() {
            self.transition(ctx);
            return;
        }

        match ctx.spatial.mate_occurs(self.patch, ctx.cfg, ctx.rng) {
            MateOutcome::NoMate => {}
            MateOutcome::Fertile => self.set_state(StateName::MatedFemale, ctx),
            MateOutcome::Sterile => self.set_state(StateName::SterileFemale, ctx),
        }
    }

    fn expired(&self) -> bool {
        f64::from(self.age) > self.duration
    }

    fn on_enter(&mut self, ctx: &mut Ctx) {
        let cfg = ctx.cfg;
        let rng = &mut *ctx.rng;
        match self.state {
            StateName::Egg => self.duration = cfg.egg_duration.sample(rng),
            StateName::Larva => self.duration = cfg.larva_duration.sample(rng),
            StateName::Pupa => self.duration = cfg.pupa_duration.sample(rng),
            StateName::WildMale => self.duration = cfg.wild_male_lifespan.sample(rng),
            StateName::SterileMale => self.duration = cfg.sterile_male_lifespan.sample(rng),
            StateName::YoungFemale => self.duration = cfg.female_first_blood_meal.sample(rng),
            // Females keep the budget left over from the previous state.
            StateName::FertileFemale => self.duration += cfg.female_lifespan.sample(rng),
            StateName::MatedFemale => {
                self.duration += cfg.female_lifespan.sample(rng);
                self.next_cycle = f64::from(self.age) + cfg.female_mate_next_cycle.sample(rng);
            }
            StateName::SterileFemale | StateName::Dead => {}
        }
    }

    fn on_exit(&mut self) {
        if matches!(
            self.state,
            StateName::YoungFemale | StateName::FertileFemale
        ) {
            self.duration -= f64::from(self.age);
        }
    }

    fn transition(&mut self, ctx: &mut Ctx) {
        let cfg = ctx.cfg;
        let next = match self.state {
            StateName::Egg => survive(&cfg.egg_survive, StateName::Larva, ctx),
            StateName::Larva => survive(&cfg.larva_survive, StateName::Pupa, ctx),
            // Emergence mapping: male pupae become young females, female pupae wild males.
            StateName::Pupa if self.is_male => {
                survive(&cfg.pupa_survive, StateName::YoungFemale, ctx)
            }
            StateName::Pupa => survive(&cfg.pupa_survive, StateName::WildMale, ctx),
            StateName::YoungFemale => StateName::FertileFemale,
            StateName::WildMale
            | StateName::SterileMale
            | StateName::FertileFemale
            | StateName::MatedFemale
            | StateName::SterileFemale => StateName::Dead,
            StateName::Dead => return,
        };
        self.set_state(next, ctx);
    }
}

fn survive(survival: &Sampler, next: StateName, ctx: &mut Ctx) -> StateName {
    if survival.sample_event(ctx.rng) {
        next
    } else {
        StateName::Dead
    }
}

//! Random variate sampling from configured distributions.

use anyhow::{Context, Result, bail};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Geometric, Normal, Uniform, Weibull};
use serde::Deserialize;

/// Lower bound applied to normal draws so durations and brood sizes stay positive.
pub const NORMAL_FLOOR: f64 = 0.1;

/// Kind of probability distribution.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
pub enum DistKind {
    #[serde(rename = "uniform")]
    Uniform,
    #[serde(rename = "geom")]
    Geometric,
    #[serde(rename = "norm")]
    Normal,
    #[serde(rename = "weibull")]
    Weibull,
    #[serde(rename = "bernoulli")]
    Bernoulli,
}

/// Distribution kind plus its parameter tuple, as written in the config file.
///
/// Parameters per kind:
/// - `uniform`: `[a, b]` (bounds in either order)
/// - `geom`: `[p]`
/// - `norm`: `[mean, std_dev]`
/// - `weibull`: `[shape, scale]`
/// - `bernoulli`: `[p]`
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistConfig {
    pub dist: DistKind,
    pub params: Vec<f64>,
}

#[derive(Debug, Clone)]
enum Dist {
    Uniform(Uniform<f64>),
    Geometric(Geometric),
    Normal(Normal<f64>),
    Weibull(Weibull<f64>),
    Bernoulli(Bernoulli),
}

/// Validated sampler built from a [`DistConfig`].
///
/// Construction fails on a wrong parameter count or parameters outside the
/// distribution's domain, so any invalid distribution is caught when the
/// configuration is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "DistConfig")]
pub struct Sampler {
    dist: Dist,
}

impl Sampler {
    pub fn new(cfg: DistConfig) -> Result<Self> {
        let dist = match cfg.dist {
            DistKind::Uniform => {
                let [a, b] = params::<2>(&cfg)?;
                Dist::Uniform(Uniform::new_inclusive(a.min(b), a.max(b))?)
            }
            DistKind::Geometric => {
                let [p] = params::<1>(&cfg)?;
                Dist::Geometric(Geometric::new(p)?)
            }
            DistKind::Normal => {
                let [mean, std_dev] = params::<2>(&cfg)?;
                if std_dev < 0.0 {
                    bail!("standard deviation must be non-negative, but is {std_dev}");
                }
                Dist::Normal(Normal::new(mean, std_dev)?)
            }
            DistKind::Weibull => {
                let [shape, scale] = params::<2>(&cfg)?;
                if shape <= 0.0 || scale <= 0.0 {
                    bail!("shape and scale must be positive, but are {shape} and {scale}");
                }
                Dist::Weibull(Weibull::new(scale, shape)?)
            }
            DistKind::Bernoulli => {
                let [p] = params::<1>(&cfg)?;
                Dist::Bernoulli(Bernoulli::new(p)?)
            }
        };
        Ok(Self { dist })
    }

    /// Draw a real-valued variate.
    ///
    /// Geometric draws count trials up to and including the first success
    /// (support starts at 1). Bernoulli draws are 0 or 1.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.dist {
            Dist::Uniform(dist) => dist.sample(rng),
            Dist::Geometric(dist) => dist.sample(rng).saturating_add(1) as f64,
            Dist::Normal(dist) => dist.sample(rng).max(NORMAL_FLOOR),
            Dist::Weibull(dist) => dist.sample(rng),
            Dist::Bernoulli(dist) => {
                if dist.sample(rng) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Draw a yes/no outcome: any non-zero variate counts as success.
    pub fn sample_event<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.sample(rng) != 0.0
    }
}

impl TryFrom<DistConfig> for Sampler {
    type Error = anyhow::Error;

    fn try_from(cfg: DistConfig) -> Result<Self> {
        let kind = cfg.dist;
        Sampler::new(cfg).with_context(|| format!("invalid {kind:?} distribution"))
    }
}

fn params<const N: usize>(cfg: &DistConfig) -> Result<[f64; N]> {
    let len = cfg.params.len();
    if len != N {
        bail!("distribution takes {N} parameters, but {len} were given");
    }
    if cfg.params.iter().any(|par| !par.is_finite()) {
        bail!("distribution parameters must be finite");
    }
    let mut arr = [0.0; N];
    arr.copy_from_slice(&cfg.params);
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn sampler(dist: DistKind, params: &[f64]) -> Result<Sampler> {
        Sampler::new(DistConfig {
            dist,
            params: params.to_vec(),
        })
    }

    #[test]
    fn uniform_accepts_reversed_bounds() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let s = sampler(DistKind::Uniform, &[4.5, 0.7]).unwrap();
        for _ in 0..1000 {
            let x = s.sample(&mut rng);
            assert!((0.7..=4.5).contains(&x));
        }
    }

    #[test]
    fn normal_draws_are_floored() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let s = sampler(DistKind::Normal, &[-10.0, 1.0]).unwrap();
        for _ in 0..100 {
            assert_eq!(s.sample(&mut rng), NORMAL_FLOOR);
        }
    }

    #[test]
    fn geometric_support_starts_at_one() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let s = sampler(DistKind::Geometric, &[1.0]).unwrap();
        assert_eq!(s.sample(&mut rng), 1.0);
        let s = sampler(DistKind::Geometric, &[0.3]).unwrap();
        for _ in 0..1000 {
            assert!(s.sample(&mut rng) >= 1.0);
        }
    }

    #[test]
    fn bernoulli_events() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let always = sampler(DistKind::Bernoulli, &[1.0]).unwrap();
        let never = sampler(DistKind::Bernoulli, &[0.0]).unwrap();
        for _ in 0..100 {
            assert!(always.sample_event(&mut rng));
            assert!(!never.sample_event(&mut rng));
        }
    }

    #[test]
    fn weibull_is_positive() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let s = sampler(DistKind::Weibull, &[2.19, 22.8]).unwrap();
        for _ in 0..1000 {
            assert!(s.sample(&mut rng) > 0.0);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(sampler(DistKind::Bernoulli, &[1.5]).is_err());
        assert!(sampler(DistKind::Normal, &[1.0]).is_err());
        assert!(sampler(DistKind::Normal, &[1.0, -1.0]).is_err());
        assert!(sampler(DistKind::Normal, &[1.0, 0.0]).is_ok());
        assert!(sampler(DistKind::Weibull, &[0.0, 22.8]).is_err());
        assert!(sampler(DistKind::Weibull, &[2.19, -1.0]).is_err());
        assert!(sampler(DistKind::Geometric, &[0.0, 1.0]).is_err());
        assert!(sampler(DistKind::Uniform, &[0.0, f64::NAN]).is_err());
    }

    #[test]
    fn unknown_kind_fails_to_deserialize() {
        let res: Result<Sampler, _> = toml::from_str("dist = \"gamma\"\nparams = [1.0, 2.0]\n");
        assert!(res.is_err());
        let ok: Sampler = toml::from_str("dist = \"norm\"\nparams = [5.0, 1.0]\n").unwrap();
        assert!(matches!(ok.dist, Dist::Normal(_)));
    }
}

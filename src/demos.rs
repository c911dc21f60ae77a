// src/demos.rs
//
// Small model/guide pairs with known posteriors.

use crate::config::SviConfig;
use crate::infer::Svi;
use crate::prob::{Bernoulli, Beta, Normal, ParamStore, ProbContext, ProbResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

const PRIOR_STD: f64 = 10.0;
const COIN_PRIOR: f64 = 10.0;
const SWITCH_OFFSET: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Demo {
    /// Gaussian mean with a Gaussian prior (pathwise gradients)
    NormalMean,
    /// Coin bias with a Beta prior (implicit reparameterization)
    CoinFlip,
    /// Binary latent switch between two Gaussians (score-function gradients)
    MixtureSwitch,
}

impl fmt::Display for Demo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Demo::NormalMean => write!(f, "normal-mean"),
            Demo::CoinFlip => write!(f, "coin-flip"),
            Demo::MixtureSwitch => write!(f, "mixture-switch"),
        }
    }
}

impl Demo {
    pub fn data(&self, seed: u64) -> Vec<f64> {
        use rand_distr::StandardNormal;
        let mut rng = StdRng::seed_from_u64(seed);
        match self {
            Demo::NormalMean => (0..50)
                .map(|_| 1.5 + rng.sample::<f64, _>(StandardNormal))
                .collect(),
            Demo::CoinFlip => (0..30)
                .map(|_| if rng.gen_bool(0.7) { 1.0 } else { 0.0 })
                .collect(),
            Demo::MixtureSwitch => (0..10)
                .map(|_| SWITCH_OFFSET + rng.sample::<f64, _>(StandardNormal))
                .collect(),
        }
    }
}

pub fn normal_mean_model(ctx: &mut ProbContext<'_>, data: &[f64]) -> ProbResult<()> {
    let mu = ctx.sample("mu", Normal::new(0.0, PRIOR_STD))?;
    for (i, x) in data.iter().enumerate() {
        ctx.observe(&format!("x_{i}"), Normal::new(mu, 1.0), *x)?;
    }
    Ok(())
}

pub fn normal_mean_guide(ctx: &mut ProbContext<'_>, _data: &[f64]) -> ProbResult<()> {
    let loc = ctx.param("mu_loc", 0.0)?;
    let log_scale = ctx.param("mu_log_scale", 0.0)?;
    ctx.sample("mu", Normal::new(loc, log_scale.exp()))?;
    Ok(())
}

/// Exact posterior (mean, std) of `mu` under `normal_mean_model`.
pub fn normal_mean_posterior(data: &[f64]) -> (f64, f64) {
    let precision = 1.0 / (PRIOR_STD * PRIOR_STD) + data.len() as f64;
    let mean = data.iter().sum::<f64>() / precision;
    (mean, precision.sqrt().recip())
}

pub fn coin_flip_model(ctx: &mut ProbContext<'_>, flips: &[f64]) -> ProbResult<()> {
    let p = ctx.sample("p", Beta::new(COIN_PRIOR, COIN_PRIOR))?;
    for (i, x) in flips.iter().enumerate() {
        ctx.observe(&format!("flip_{i}"), Bernoulli::new(p), *x)?;
    }
    Ok(())
}

pub fn coin_flip_guide(ctx: &mut ProbContext<'_>, _flips: &[f64]) -> ProbResult<()> {
    let log_alpha = ctx.param("log_alpha_q", 15.0_f64.ln())?;
    let log_beta = ctx.param("log_beta_q", 15.0_f64.ln())?;
    ctx.sample("p", Beta::new(log_alpha.exp(), log_beta.exp()))?;
    Ok(())
}

/// Exact posterior Beta(alpha, beta) under `coin_flip_model`.
pub fn coin_flip_posterior(flips: &[f64]) -> (f64, f64) {
    let heads: f64 = flips.iter().sum();
    let tails = flips.len() as f64 - heads;
    (COIN_PRIOR + heads, COIN_PRIOR + tails)
}

pub fn mixture_switch_model(ctx: &mut ProbContext<'_>, data: &[f64]) -> ProbResult<()> {
    let z = ctx.sample("z", Bernoulli::new(0.5))?;
    let mean = if z.value() > 0.5 {
        SWITCH_OFFSET
    } else {
        -SWITCH_OFFSET
    };
    for (i, x) in data.iter().enumerate() {
        ctx.observe(&format!("x_{i}"), Normal::new(mean, 1.0), *x)?;
    }
    Ok(())
}

pub fn mixture_switch_guide(ctx: &mut ProbContext<'_>, _data: &[f64]) -> ProbResult<()> {
    let logit = ctx.param("z_logit", 0.0)?;
    ctx.sample("z", Bernoulli::new(logit.sigmoid()))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DemoReport {
    pub demo: Demo,
    pub losses: Vec<f64>,
    pub params: Vec<(String, f64)>,
    pub reference: String,
}

impl DemoReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }
}

/// Fits `demo` with the optimizer and schedule from `config`.
pub fn fit_demo(demo: Demo, config: &SviConfig, store: &mut ParamStore) -> ProbResult<DemoReport> {
    let data = demo.data(config.seed.unwrap_or(0));

    let (losses, reference) = match demo {
        Demo::NormalMean => {
            let mut svi = Svi::from_config(normal_mean_model, normal_mean_guide, config);
            let losses = svi.run(store, data.as_slice(), config.steps)?;
            let (mean, std) = normal_mean_posterior(&data);
            (losses, format!("posterior mu ~ Normal({:.4}, {:.4})", mean, std))
        }
        Demo::CoinFlip => {
            let mut svi = Svi::from_config(coin_flip_model, coin_flip_guide, config);
            let losses = svi.run(store, data.as_slice(), config.steps)?;
            let (a, b) = coin_flip_posterior(&data);
            (losses, format!("posterior p ~ Beta({}, {})", a, b))
        }
        Demo::MixtureSwitch => {
            let mut svi = Svi::from_config(mixture_switch_model, mixture_switch_guide, config);
            let losses = svi.run(store, data.as_slice(), config.steps)?;
            (losses, "posterior P(z = 1) ~ 1".to_string())
        }
    };

    let params = store
        .names()
        .map(|name| store.scalar(name).map(|v| (name.to_string(), v)))
        .collect::<ProbResult<Vec<_>>>()?;

    Ok(DemoReport {
        demo,
        losses,
        params,
        reference,
    })
}

// src/prob/distributions.rs

use crate::ad::types::ADFloat;
use crate::prob::{ProbError, ProbResult};
use rand::Rng;
use std::f64::consts::PI;
use std::fmt::Debug;

pub trait DistributionTrait: Debug {
    fn name(&self) -> &'static str;

    /// Draws a plain value; no gradient reaches the parameters.
    fn sample(&self, rng: &mut dyn rand::RngCore) -> ProbResult<f64>;

    /// Draws a value that stays connected to the parameters when the
    /// distribution is reparameterized.
    fn sample_ad(&self, rng: &mut dyn rand::RngCore) -> ProbResult<ADFloat> {
        Ok(ADFloat::Concrete(self.sample(rng)?))
    }

    fn log_pdf(&self, x: &ADFloat) -> ADFloat;

    fn reparameterized(&self) -> bool {
        false
    }

    fn validate(&self) -> ProbResult<()> {
        Ok(())
    }
}

fn invalid(message: String) -> ProbError {
    ProbError::InvalidDistribution { message }
}

#[derive(Debug, Clone)]
pub struct Normal {
    pub mean: ADFloat,
    pub std: ADFloat,
}

impl Normal {
    pub fn new(mean: impl Into<ADFloat>, std: impl Into<ADFloat>) -> Self {
        Self {
            mean: mean.into(),
            std: std.into(),
        }
    }
}

impl DistributionTrait for Normal {
    fn name(&self) -> &'static str {
        "Normal"
    }

    fn sample(&self, rng: &mut dyn rand::RngCore) -> ProbResult<f64> {
        use rand_distr::{Distribution, Normal};
        let m = self.mean.value();
        let s = self.std.value();
        let n = Normal::new(m, s).map_err(|e| {
            invalid(format!("Invalid Normal parameters: mean={}, std={}: {}", m, s, e))
        })?;
        Ok(n.sample(rng))
    }

    fn sample_ad(&self, rng: &mut dyn rand::RngCore) -> ProbResult<ADFloat> {
        use rand_distr::StandardNormal;
        self.validate()?;
        let eps: f64 = rng.sample(StandardNormal);
        Ok(self.mean + self.std * eps)
    }

    fn log_pdf(&self, x: &ADFloat) -> ADFloat {
        let term1 = ADFloat::Concrete(-0.5 * (2.0 * PI).ln());
        let term2 = self.std.ln();
        let z = (*x - self.mean) / self.std;
        let term3 = 0.5 * z * z;

        term1 - term2 - term3
    }

    fn reparameterized(&self) -> bool {
        true
    }

    fn validate(&self) -> ProbResult<()> {
        let s = self.std.value();
        if !(s > 0.0) || !self.mean.value().is_finite() {
            return Err(invalid(format!(
                "Standard deviation must be positive and mean finite, got mean={}, std={}",
                self.mean.value(),
                s
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Uniform {
    pub low: ADFloat,
    pub high: ADFloat,
}

impl Uniform {
    pub fn new(low: impl Into<ADFloat>, high: impl Into<ADFloat>) -> Self {
        Self {
            low: low.into(),
            high: high.into(),
        }
    }
}

impl DistributionTrait for Uniform {
    fn name(&self) -> &'static str {
        "Uniform"
    }

    fn sample(&self, rng: &mut dyn rand::RngCore) -> ProbResult<f64> {
        self.validate()?;
        Ok(rng.gen_range(self.low.value()..self.high.value()))
    }

    fn sample_ad(&self, rng: &mut dyn rand::RngCore) -> ProbResult<ADFloat> {
        self.validate()?;
        let eps: f64 = rng.gen_range(0.0..1.0);
        Ok(self.low + (self.high - self.low) * eps)
    }

    fn log_pdf(&self, x: &ADFloat) -> ADFloat {
        let val = x.value();
        if val >= self.low.value() && val <= self.high.value() {
            -(self.high - self.low).ln()
        } else {
            ADFloat::Concrete(f64::NEG_INFINITY)
        }
    }

    fn reparameterized(&self) -> bool {
        true
    }

    fn validate(&self) -> ProbResult<()> {
        if !(self.low.value() < self.high.value()) {
            return Err(invalid(format!(
                "Invalid Uniform parameters: low={}, high={}",
                self.low.value(),
                self.high.value()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Exponential {
    pub rate: ADFloat,
}

impl Exponential {
    pub fn new(rate: impl Into<ADFloat>) -> Self {
        Self { rate: rate.into() }
    }
}

impl DistributionTrait for Exponential {
    fn name(&self) -> &'static str {
        "Exponential"
    }

    fn sample(&self, rng: &mut dyn rand::RngCore) -> ProbResult<f64> {
        Ok(self.sample_ad(rng)?.value())
    }

    fn sample_ad(&self, rng: &mut dyn rand::RngCore) -> ProbResult<ADFloat> {
        use rand_distr::Exp1;
        self.validate()?;
        let eps: f64 = rng.sample(Exp1);
        Ok(eps / self.rate)
    }

    fn log_pdf(&self, x: &ADFloat) -> ADFloat {
        if x.value() < 0.0 {
            return ADFloat::Concrete(f64::NEG_INFINITY);
        }
        self.rate.ln() - self.rate * *x
    }

    fn reparameterized(&self) -> bool {
        true
    }

    fn validate(&self) -> ProbResult<()> {
        if !(self.rate.value() > 0.0) {
            return Err(invalid(format!(
                "Exponential rate must be positive, got {}",
                self.rate.value()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Bernoulli {
    pub p: ADFloat,
}

impl Bernoulli {
    pub fn new(p: impl Into<ADFloat>) -> Self {
        Self { p: p.into() }
    }
}

impl DistributionTrait for Bernoulli {
    fn name(&self) -> &'static str {
        "Bernoulli"
    }

    fn sample(&self, rng: &mut dyn rand::RngCore) -> ProbResult<f64> {
        use rand_distr::{Bernoulli, Distribution};
        let p_val = self.p.value();
        let b = Bernoulli::new(p_val)
            .map_err(|e| invalid(format!("Invalid Bernoulli parameter p={}: {}", p_val, e)))?;
        if b.sample(rng) {
            Ok(1.0)
        } else {
            Ok(0.0)
        }
    }

    fn log_pdf(&self, x: &ADFloat) -> ADFloat {
        // Degenerate p must score its certain outcome as exactly 0.
        if x.value() > 0.5 {
            self.p.ln()
        } else {
            (1.0 - self.p).ln()
        }
    }

    fn validate(&self) -> ProbResult<()> {
        let p = self.p.value();
        if !(0.0..=1.0).contains(&p) {
            return Err(invalid(format!("Bernoulli p must lie in [0, 1], got {}", p)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Beta {
    pub alpha: ADFloat,
    pub beta: ADFloat,
}

impl Beta {
    pub fn new(alpha: impl Into<ADFloat>, beta: impl Into<ADFloat>) -> Self {
        Self {
            alpha: alpha.into(),
            beta: beta.into(),
        }
    }
}

impl DistributionTrait for Beta {
    fn name(&self) -> &'static str {
        "Beta"
    }

    fn sample(&self, rng: &mut dyn rand::RngCore) -> ProbResult<f64> {
        use rand_distr::{Beta, Distribution};
        let b = Beta::new(self.alpha.value(), self.beta.value()).map_err(|e| {
            invalid(format!(
                "Invalid Beta parameters alpha={}, beta={}: {}",
                self.alpha.value(),
                self.beta.value(),
                e
            ))
        })?;
        Ok(b.sample(rng))
    }

    fn sample_ad(&self, rng: &mut dyn rand::RngCore) -> ProbResult<ADFloat> {
        let z = self.sample(rng)?;
        Ok(self.alpha.beta_sample(self.beta, z))
    }

    fn log_pdf(&self, x: &ADFloat) -> ADFloat {
        let a = self.alpha;
        let b = self.beta;

        let term1 = (a + b).lgamma() - a.lgamma() - b.lgamma();
        term1 + (a - 1.0) * x.ln() + (b - 1.0) * (1.0 - *x).ln()
    }

    fn reparameterized(&self) -> bool {
        true
    }

    fn validate(&self) -> ProbResult<()> {
        if !(self.alpha.value() > 0.0 && self.beta.value() > 0.0) {
            return Err(invalid(format!(
                "Beta parameters must be positive, got alpha={}, beta={}",
                self.alpha.value(),
                self.beta.value()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ad::create_tape;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_normal_log_pdf_closed_form() {
        let d = Normal::new(1.0, 2.0);
        let x: f64 = 2.5;
        let expected = -0.5 * (2.0 * PI).ln() - 2.0_f64.ln() - 0.5 * ((x - 1.0) / 2.0).powi(2);
        assert!(approx_eq(d.log_pdf(&ADFloat::Concrete(x)).value(), expected, 1e-12));
    }

    #[test]
    fn test_normal_reparameterized_sample_carries_gradient() {
        let tape_id = create_tape();
        let mean = ADFloat::new_input(0.5, tape_id);
        let std = ADFloat::new_input(2.0, tape_id);
        let mut rng = StdRng::seed_from_u64(7);

        let z = Normal::new(mean, std).sample_ad(&mut rng).unwrap();
        let eps = (z.value() - 0.5) / 2.0;
        let grads = z.backward();

        assert!(approx_eq(grads[&mean.node_id().unwrap()], 1.0, 1e-12));
        assert!(approx_eq(grads[&std.node_id().unwrap()], eps, 1e-12));
    }

    #[test]
    fn test_normal_rejects_non_positive_std() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = Normal::new(0.0, -1.0).sample_ad(&mut rng).unwrap_err();
        assert!(matches!(err, ProbError::InvalidDistribution { .. }));
    }

    #[test]
    fn test_bernoulli_is_not_reparameterized() {
        let d = Bernoulli::new(0.3);
        assert!(!d.reparameterized());

        let mut rng = StdRng::seed_from_u64(3);
        let x = d.sample_ad(&mut rng).unwrap();
        assert!(!x.is_dual());
        assert!(x.value() == 0.0 || x.value() == 1.0);

        assert!(approx_eq(d.log_pdf(&ADFloat::Concrete(1.0)).value(), 0.3_f64.ln(), 1e-12));
        assert!(approx_eq(d.log_pdf(&ADFloat::Concrete(0.0)).value(), 0.7_f64.ln(), 1e-12));
    }

    #[test]
    fn test_bernoulli_degenerate_probabilities() {
        let certain = Bernoulli::new(1.0);
        assert_eq!(certain.log_pdf(&ADFloat::Concrete(1.0)).value(), 0.0);
        assert_eq!(certain.log_pdf(&ADFloat::Concrete(0.0)).value(), f64::NEG_INFINITY);

        let never = Bernoulli::new(0.0);
        assert_eq!(never.log_pdf(&ADFloat::Concrete(0.0)).value(), 0.0);
        assert_eq!(never.log_pdf(&ADFloat::Concrete(1.0)).value(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_bernoulli_saturated_logit_has_finite_gradient() {
        let tape_id = create_tape();
        let logit = ADFloat::new_input(40.0, tape_id);
        let d = Bernoulli::new(logit.sigmoid());
        assert_eq!(d.p.value(), 1.0);

        let lp = d.log_pdf(&ADFloat::Concrete(1.0));
        assert_eq!(lp.value(), 0.0);
        let grad = lp.backward()[&logit.node_id().unwrap()];
        assert!(grad.is_finite());
    }

    #[test]
    fn test_beta_log_pdf_matches_statrs() {
        use statrs::distribution::{Beta as StatrsBeta, Continuous};
        let d = Beta::new(2.0, 5.0);
        let reference = StatrsBeta::new(2.0, 5.0).unwrap();
        for x in [0.1, 0.4, 0.9] {
            let ours = d.log_pdf(&ADFloat::Concrete(x)).value();
            assert!(approx_eq(ours, reference.ln_pdf(x), 1e-9));
        }
    }

    #[test]
    fn test_uniform_support() {
        let d = Uniform::new(-1.0, 3.0);
        assert!(approx_eq(d.log_pdf(&ADFloat::Concrete(0.0)).value(), -(4.0_f64.ln()), 1e-12));
        assert_eq!(d.log_pdf(&ADFloat::Concrete(5.0)).value(), f64::NEG_INFINITY);
        assert!(Uniform::new(2.0, 1.0).validate().is_err());
    }

    #[test]
    fn test_exponential_sample_and_density() {
        let d = Exponential::new(2.0);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            assert!(d.sample(&mut rng).unwrap() >= 0.0);
        }
        let x = 0.75;
        assert!(approx_eq(
            d.log_pdf(&ADFloat::Concrete(x)).value(),
            2.0_f64.ln() - 2.0 * x,
            1e-12
        ));
        assert_eq!(d.log_pdf(&ADFloat::Concrete(-0.1)).value(), f64::NEG_INFINITY);
    }
}

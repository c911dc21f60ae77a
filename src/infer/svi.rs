// src/infer/svi.rs

use crate::ad::types::ADFloat;
use crate::ad::TapeScope;
use crate::config::SviConfig;
use crate::infer::optim::{OptimStep, Optimizer};
use crate::prob::{run_traced, ParamStore, ProbResult, Program, SiteKind, Trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Single-sample ELBO surrogate whose gradient is the ELBO gradient.
///
/// Observed sites contribute their log-density. Sample sites contribute
/// `log p - log q` when the model distribution is reparameterized, otherwise
/// `detach(log_r) * log q` where `log_r` is the joint log-ratio of the two
/// traces. Param sites contribute nothing.
pub fn elbo_surrogate(model_trace: &Trace, guide_trace: &Trace) -> ProbResult<ADFloat> {
    let log_r = model_trace.log_pdf() - guide_trace.log_pdf();

    let mut elbo = ADFloat::Concrete(0.0);
    for site in model_trace {
        match site.kind {
            SiteKind::Observe => {
                elbo = elbo + site.log_pdf;
            }
            SiteKind::Sample => {
                let guide_site = guide_trace.site(&site.name, "guide")?;
                if site.is_reparameterized() {
                    elbo = elbo + site.log_pdf - guide_site.log_pdf;
                } else {
                    elbo = elbo + log_r.detach() * guide_site.log_pdf;
                }
            }
            SiteKind::Param => {}
        }
    }
    Ok(elbo)
}

/// Names of the param sites whose owners are not fixed, without duplicates.
pub fn trainable_params(
    model_trace: &Trace,
    guide_trace: &Trace,
    model_fixed: bool,
    guide_fixed: bool,
) -> BTreeSet<String> {
    let mut params = BTreeSet::new();
    if !model_fixed {
        params.extend(model_trace.param_names().map(String::from));
    }
    if !guide_fixed {
        params.extend(guide_trace.param_names().map(String::from));
    }
    params
}

/// Stochastic variational inference driver: each `step` fits the guide to
/// the model's posterior by one optimizer update on the negated ELBO.
pub struct Svi<M, G, O> {
    model: M,
    guide: G,
    optim: O,
    model_fixed: bool,
    guide_fixed: bool,
    rng: StdRng,
    log_every: usize,
    steps_taken: usize,
}

impl<M, G, O> Svi<M, G, O> {
    pub fn new(model: M, guide: G, optim: O) -> Self {
        Self {
            model,
            guide,
            optim,
            model_fixed: false,
            guide_fixed: false,
            rng: StdRng::from_entropy(),
            log_every: 100,
            steps_taken: 0,
        }
    }

    pub fn model_fixed(mut self, fixed: bool) -> Self {
        self.model_fixed = fixed;
        self
    }

    pub fn guide_fixed(mut self, fixed: bool) -> Self {
        self.guide_fixed = fixed;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Progress interval for `run`; zero disables progress logging.
    pub fn log_every(mut self, every: usize) -> Self {
        self.log_every = every;
        self
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }
}

impl<M, G> Svi<M, G, Optimizer> {
    pub fn from_config(model: M, guide: G, config: &SviConfig) -> Self {
        let svi = Svi::new(model, guide, config.optimizer.build())
            .model_fixed(config.model_fixed)
            .guide_fixed(config.guide_fixed)
            .log_every(config.log_every);
        match config.seed {
            Some(seed) => svi.seed(seed),
            None => svi,
        }
    }
}

impl<M, G, O: OptimStep> Svi<M, G, O> {
    /// Takes a single step of optimization and returns the loss (negated
    /// ELBO estimate) before the update.
    pub fn step<A>(&mut self, store: &mut ParamStore, args: &A) -> ProbResult<f64>
    where
        A: ?Sized,
        M: Program<A>,
        G: Program<A>,
    {
        let tape = TapeScope::new();
        let (guide_trace, model_trace) = self.trace_pair(tape.id(), store, args)?;

        let elbo = elbo_surrogate(&model_trace, &guide_trace)?;
        let trainable =
            trainable_params(&model_trace, &guide_trace, self.model_fixed, self.guide_fixed);

        let loss = -elbo;
        let grads = loss.backward();
        store.accumulate_grads(&trainable, &grads)?;

        self.optim.step(store, &trainable);
        store.zero_grads(&trainable);
        store.release_bindings();

        self.steps_taken += 1;
        debug!(
            step = self.steps_taken,
            loss = loss.value(),
            params = trainable.len(),
            sites = model_trace.len(),
            "svi step"
        );
        Ok(loss.value())
    }

    /// Loss estimate without touching gradients or parameters.
    pub fn evaluate_loss<A>(&mut self, store: &mut ParamStore, args: &A) -> ProbResult<f64>
    where
        A: ?Sized,
        M: Program<A>,
        G: Program<A>,
    {
        let tape = TapeScope::new();
        let (guide_trace, model_trace) = self.trace_pair(tape.id(), store, args)?;
        let elbo = elbo_surrogate(&model_trace, &guide_trace)?;
        store.release_bindings();
        Ok(-elbo.value())
    }

    /// Runs `num_steps` steps and returns the loss history.
    pub fn run<A>(
        &mut self,
        store: &mut ParamStore,
        args: &A,
        num_steps: usize,
    ) -> ProbResult<Vec<f64>>
    where
        A: ?Sized,
        M: Program<A>,
        G: Program<A>,
    {
        let mut losses = Vec::with_capacity(num_steps);
        for i in 0..num_steps {
            let loss = self.step(store, args)?;
            if self.log_every > 0 && (i % self.log_every == 0 || i + 1 == num_steps) {
                info!(step = i, loss, "svi progress");
            }
            losses.push(loss);
        }
        Ok(losses)
    }

    fn trace_pair<A>(
        &mut self,
        tape_id: usize,
        store: &mut ParamStore,
        args: &A,
    ) -> ProbResult<(Trace, Trace)>
    where
        A: ?Sized,
        M: Program<A>,
        G: Program<A>,
    {
        let (_, guide_trace) = run_traced(&self.guide, args, tape_id, store, &mut self.rng, None)?;
        let (_, model_trace) = run_traced(
            &self.model,
            args,
            tape_id,
            store,
            &mut self.rng,
            Some(&guide_trace),
        )?;
        Ok((guide_trace, model_trace))
    }
}

// src/prob/context.rs

use crate::ad::types::ADFloat;
use crate::prob::distributions::DistributionTrait;
use crate::prob::params::ParamStore;
use crate::prob::trace::{Site, SiteKind, SiteValue, Trace};
use crate::prob::{ProbError, ProbResult};
use ndarray::{ArrayD, IxDyn};
use rand::RngCore;
use std::rc::Rc;
use tracing::trace;

/// A model or guide: anything that can be run against a recording context.
pub trait Program<A: ?Sized> {
    type Output;

    fn run(&self, ctx: &mut ProbContext<'_>, args: &A) -> ProbResult<Self::Output>;
}

impl<A, R, F> Program<A> for F
where
    A: ?Sized,
    F: Fn(&mut ProbContext<'_>, &A) -> ProbResult<R>,
{
    type Output = R;

    fn run(&self, ctx: &mut ProbContext<'_>, args: &A) -> ProbResult<R> {
        self(ctx, args)
    }
}

/// Records every sample, observe and param statement of one program run.
/// With a replay trace, sample statements reuse the recorded values.
pub struct ProbContext<'a> {
    tape_id: usize,
    store: &'a mut ParamStore,
    rng: &'a mut dyn RngCore,
    replay: Option<&'a Trace>,
    trace: Trace,
}

impl<'a> ProbContext<'a> {
    pub fn new(tape_id: usize, store: &'a mut ParamStore, rng: &'a mut dyn RngCore) -> Self {
        Self {
            tape_id,
            store,
            rng,
            replay: None,
            trace: Trace::new(),
        }
    }

    pub fn with_replay(mut self, replay: &'a Trace) -> Self {
        self.replay = Some(replay);
        self
    }

    pub fn tape_id(&self) -> usize {
        self.tape_id
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn into_trace(self) -> Trace {
        self.trace
    }

    pub fn sample<D>(&mut self, name: &str, dist: D) -> ProbResult<ADFloat>
    where
        D: DistributionTrait + 'static,
    {
        dist.validate()?;

        let replayed = self
            .replay
            .and_then(|t| t.get(name))
            .filter(|site| site.kind == SiteKind::Sample)
            .and_then(|site| site.scalar());

        let value = match replayed {
            Some(v) => v,
            None if dist.reparameterized() => dist.sample_ad(self.rng)?,
            None => ADFloat::Concrete(dist.sample(self.rng)?),
        };
        let log_pdf = dist.log_pdf(&value);
        trace!(
            site = name,
            dist = dist.name(),
            value = value.value(),
            log_pdf = log_pdf.value(),
            replayed = replayed.is_some(),
            "sample"
        );

        self.trace.insert(Site {
            name: name.to_string(),
            kind: SiteKind::Sample,
            dist: Some(Rc::new(dist)),
            value: SiteValue::Scalar(value),
            log_pdf,
        })?;
        Ok(value)
    }

    pub fn observe<D>(&mut self, name: &str, dist: D, value: f64) -> ProbResult<ADFloat>
    where
        D: DistributionTrait + 'static,
    {
        dist.validate()?;

        let value = ADFloat::Concrete(value);
        let log_pdf = dist.log_pdf(&value);
        trace!(site = name, dist = dist.name(), log_pdf = log_pdf.value(), "observe");

        self.trace.insert(Site {
            name: name.to_string(),
            kind: SiteKind::Observe,
            dist: Some(Rc::new(dist)),
            value: SiteValue::Scalar(value),
            log_pdf,
        })?;
        Ok(log_pdf)
    }

    pub fn param(&mut self, name: &str, init: f64) -> ProbResult<ADFloat> {
        let leaves = self.param_array(name, ArrayD::from_elem(IxDyn(&[]), init))?;
        leaves.first().copied().ok_or_else(|| ProbError::ShapeMismatch {
            name: name.to_string(),
            expected: vec![],
            found: vec![0],
        })
    }

    /// Fetches (or creates from `init`) a parameter and returns its elements
    /// in logical order as leaves of the current tape.
    pub fn param_array(&mut self, name: &str, init: ArrayD<f64>) -> ProbResult<Vec<ADFloat>> {
        if let Some(site) = self.trace.get(name) {
            if let SiteValue::Param { leaves, .. } = &site.value {
                return Ok(leaves.clone());
            }
            return Err(ProbError::DuplicateSite {
                name: name.to_string(),
            });
        }

        let shape = self.store.get_or_init(name, init)?.shape().to_vec();
        let leaves = self.store.bind(name, self.tape_id)?;

        self.trace.insert(Site {
            name: name.to_string(),
            kind: SiteKind::Param,
            dist: None,
            value: SiteValue::Param {
                shape,
                leaves: leaves.clone(),
            },
            log_pdf: ADFloat::Concrete(0.0),
        })?;
        Ok(leaves)
    }
}

/// Runs `program` under trace recording, replaying sample sites from
/// `replay` when given.
pub fn run_traced<A, P>(
    program: &P,
    args: &A,
    tape_id: usize,
    store: &mut ParamStore,
    rng: &mut dyn RngCore,
    replay: Option<&Trace>,
) -> ProbResult<(P::Output, Trace)>
where
    A: ?Sized,
    P: Program<A>,
{
    let mut ctx = ProbContext::new(tape_id, store, rng);
    if let Some(t) = replay {
        ctx = ctx.with_replay(t);
    }
    let output = program.run(&mut ctx, args)?;
    Ok((output, ctx.into_trace()))
}

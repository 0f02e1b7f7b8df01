//! Bounded minimization of an [Objective].
//!
//! A global [DifferentialEvolution] search is followed by a local
//! [NelderMead] refinement that starts from the best global candidate.
//! Both stages share a [FitState] that enforces the bounds and the
//! evaluation budget and keeps the best point seen so far.
use crate::estimator::{Evaluation, EstimatorError};
use ndarray::Array1;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

mod differential_evolution;
mod nelder_mead;
pub use differential_evolution::{DifferentialEvolution, DifferentialEvolutionOptions};
pub use nelder_mead::{NelderMead, NelderMeadOptions};

/// A scalar cost function of a parameter vector.
pub trait Objective: Sync {
    fn evaluate(&self, x: &[f64]) -> Evaluation;
}

/// A parameter vector together with its evaluation.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub parameters: Array1<f64>,
    pub evaluation: Evaluation,
    /// The strategy met its convergence criterion.
    pub converged: bool,
}

impl Candidate {
    pub fn cost(&self) -> f64 {
        self.evaluation.cost
    }
}

/// A search strategy that improves on a starting point.
pub trait SearchStrategy {
    /// Name used in progress reports.
    fn name(&self) -> &'static str;

    fn search(&self, objective: &dyn Objective, start: &Array1<f64>, state: &mut FitState)
        -> Candidate;
}

/// Why the fit stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The last stage met its convergence criterion.
    Converged,
    /// The last stage reached its iteration limit.
    MaxIterations,
    /// The evaluation count or wall-clock limit was reached.
    BudgetExhausted,
}

/// Options of [fit_parameters].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Maximum number of objective evaluations.
    pub max_evaluations: usize,
    /// Optional wall-clock limit in seconds.
    pub max_seconds: Option<f64>,
    /// Global stage; skipped if `None`.
    pub differential_evolution: Option<DifferentialEvolutionOptions>,
    /// Local stage; skipped if `None`.
    pub nelder_mead: Option<NelderMeadOptions>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 10_000,
            max_seconds: None,
            differential_evolution: Some(DifferentialEvolutionOptions::default()),
            nelder_mead: Some(NelderMeadOptions::default()),
        }
    }
}

/// Result of [fit_parameters].
#[derive(Clone, Debug, Serialize)]
pub struct FitResult {
    pub parameters: Array1<f64>,
    pub cost: f64,
    pub failed_points: usize,
    pub evaluations: usize,
    /// Best cost after every generation or iteration
    pub history: Vec<f64>,
    pub termination: TerminationReason,
}

/// Bookkeeping of a running fit. Owned by the control thread.
pub struct FitState {
    lower: Array1<f64>,
    upper: Array1<f64>,
    max_evaluations: usize,
    max_time: Option<Duration>,
    start_time: Instant,
    evaluations: usize,
    best: Option<Candidate>,
    history: Vec<f64>,
}

impl FitState {
    pub fn new(bounds: &[(f64, f64)], options: &FitOptions) -> Result<Self, EstimatorError> {
        for (i, &(l, u)) in bounds.iter().enumerate() {
            if !(l.is_finite() && u.is_finite() && l < u) {
                return Err(EstimatorError::InvalidBounds(i, l, u));
            }
        }
        let max_time = match options.max_seconds {
            Some(s) if s.is_finite() && s >= 0.0 => Some(Duration::from_secs_f64(s)),
            Some(_) => return Err(EstimatorError::IncompatibleInput),
            None => None,
        };
        Ok(Self {
            lower: bounds.iter().map(|b| b.0).collect(),
            upper: bounds.iter().map(|b| b.1).collect(),
            max_evaluations: options.max_evaluations,
            max_time,
            start_time: Instant::now(),
            evaluations: 0,
            best: None,
            history: Vec::new(),
        })
    }

    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Clip a point into the bounds.
    pub fn project(&self, x: &mut Array1<f64>) {
        x.iter_mut()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .for_each(|(xi, (&l, &u))| *xi = xi.clamp(l, u));
    }

    pub fn budget_exhausted(&self) -> bool {
        self.evaluations >= self.max_evaluations
            || self
                .max_time
                .is_some_and(|t| self.start_time.elapsed() >= t)
    }

    /// Evaluate a batch of points inside the bounds.
    ///
    /// The batch is truncated to the remaining budget. Results are merged in
    /// input order, so the outcome does not depend on the evaluation order.
    pub fn evaluate_batch(
        &mut self,
        objective: &dyn Objective,
        mut points: Vec<Array1<f64>>,
    ) -> Vec<Candidate> {
        if self.budget_exhausted() {
            return Vec::new();
        }
        points.truncate(self.max_evaluations - self.evaluations);
        points.iter_mut().for_each(|x| self.project(x));

        #[cfg(feature = "rayon")]
        let evaluations: Vec<_> = points
            .par_iter()
            .map(|x| objective.evaluate(&x.to_vec()))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let evaluations: Vec<_> = points
            .iter()
            .map(|x| objective.evaluate(&x.to_vec()))
            .collect();

        self.evaluations += points.len();
        let candidates: Vec<_> = points
            .into_iter()
            .zip(evaluations)
            .map(|(parameters, mut evaluation)| {
                // an undefined cost ranks behind every defined one
                if evaluation.cost.is_nan() {
                    evaluation.cost = f64::INFINITY;
                }
                Candidate {
                    parameters,
                    evaluation,
                    converged: false,
                }
            })
            .collect();
        for c in candidates.iter() {
            if self
                .best
                .as_ref()
                .map_or(true, |b| c.cost().total_cmp(&b.cost()).is_lt())
            {
                self.best = Some(c.clone());
            }
        }
        candidates
    }

    /// Evaluate a single point; `None` if the budget is exhausted.
    pub fn evaluate(&mut self, objective: &dyn Objective, x: Array1<f64>) -> Option<Candidate> {
        self.evaluate_batch(objective, vec![x]).pop()
    }

    /// Append the current best cost to the history.
    pub fn record_progress(&mut self, stage: &str, iteration: usize) {
        if let Some(best) = &self.best {
            self.history.push(best.cost());
            info!(
                stage,
                iteration,
                evaluations = self.evaluations,
                cost = best.cost(),
                failed_points = best.evaluation.failed_points,
                "best so far"
            );
        }
    }
}

/// Minimize `objective` within `bounds` starting from `initial`.
///
/// Returns the best point found. If the budget runs out the best-so-far
/// result is returned with [TerminationReason::BudgetExhausted]. Fails with
/// [EstimatorError::NoFeasibleFit] if no evaluated point could predict a
/// single data point.
pub fn fit_parameters(
    initial: &Array1<f64>,
    bounds: &[(f64, f64)],
    objective: &dyn Objective,
    options: &FitOptions,
) -> Result<FitResult, EstimatorError> {
    if initial.len() != bounds.len() {
        return Err(EstimatorError::IncompatibleInput);
    }
    let mut state = FitState::new(bounds, options)?;
    let mut start = initial.clone();
    state.project(&mut start);
    state.evaluate(objective, start.clone());

    let mut stages: Vec<Box<dyn SearchStrategy>> = Vec::new();
    if let Some(o) = &options.differential_evolution {
        stages.push(Box::new(DifferentialEvolution::new(o.clone())));
    }
    if let Some(o) = &options.nelder_mead {
        stages.push(Box::new(NelderMead::new(o.clone())));
    }

    let mut converged = stages.is_empty();
    for stage in stages.iter() {
        if state.budget_exhausted() {
            break;
        }
        let seed = state
            .best()
            .map_or_else(|| start.clone(), |b| b.parameters.clone());
        let candidate = stage.search(objective, &seed, &mut state);
        converged = candidate.converged;
    }

    let Some(best) = state.best().cloned() else {
        return Err(EstimatorError::NoFeasibleFit {
            evaluations: state.evaluations(),
            history: state.history,
        });
    };
    if !best.evaluation.is_feasible() {
        return Err(EstimatorError::NoFeasibleFit {
            evaluations: state.evaluations(),
            history: state.history,
        });
    }
    let termination = if state.budget_exhausted() && !converged {
        warn!(evaluations = state.evaluations(), cost = best.cost(), "fit budget exhausted");
        TerminationReason::BudgetExhausted
    } else if converged {
        TerminationReason::Converged
    } else {
        TerminationReason::MaxIterations
    };
    Ok(FitResult {
        parameters: best.parameters,
        cost: best.evaluation.cost,
        failed_points: best.evaluation.failed_points,
        evaluations: state.evaluations,
        history: state.history,
        termination,
    })
}

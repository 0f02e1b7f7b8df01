use super::{Candidate, FitState, Objective, SearchStrategy};
use crate::estimator::Evaluation;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Options of the [NelderMead] strategy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadOptions {
    pub max_iter: usize,
    /// Edge length of the initial simplex relative to the width of the bounds.
    pub initial_step: f64,
    /// Tolerance on the simplex size relative to the width of the bounds.
    pub xtol: f64,
    /// Absolute tolerance on the spread of the cost over the simplex.
    pub ftol: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            initial_step: 0.05,
            xtol: 1e-10,
            ftol: 1e-14,
        }
    }
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Local simplex search.
///
/// Every vertex is projected into the bounds before it is evaluated.
pub struct NelderMead {
    options: NelderMeadOptions,
}

impl NelderMead {
    pub fn new(options: NelderMeadOptions) -> Self {
        Self { options }
    }

    fn initial_simplex(&self, start: &Array1<f64>, state: &FitState) -> Vec<Array1<f64>> {
        let width = state.upper() - state.lower();
        let mut simplex = vec![start.clone()];
        for j in 0..start.len() {
            let mut x = start.clone();
            let step = self.options.initial_step * width[j];
            // step inwards if the start sits on the upper bound
            x[j] = if x[j] + step <= state.upper()[j] {
                x[j] + step
            } else {
                x[j] - step
            };
            simplex.push(x);
        }
        simplex
    }

    fn converged(&self, simplex: &[Candidate], width: &Array1<f64>) -> bool {
        let best = &simplex[0];
        let f_spread = simplex
            .iter()
            .map(|c| (c.cost() - best.cost()).abs())
            .fold(0.0, f64::max);
        let x_spread = simplex
            .iter()
            .flat_map(|c| {
                (&c.parameters - &best.parameters)
                    .iter()
                    .zip(width.iter())
                    .map(|(dx, w)| (dx / w).abs())
                    .collect::<Vec<_>>()
            })
            .fold(0.0, f64::max);
        f_spread <= self.options.ftol || x_spread <= self.options.xtol
    }
}

fn sort(simplex: &mut [Candidate]) {
    simplex.sort_by(|a, b| a.cost().total_cmp(&b.cost()));
}

impl SearchStrategy for NelderMead {
    fn name(&self) -> &'static str {
        "nelder-mead"
    }

    fn search(
        &self,
        objective: &dyn Objective,
        start: &Array1<f64>,
        state: &mut FitState,
    ) -> Candidate {
        let n = state.dimension();
        let width = state.upper() - state.lower();
        let mut simplex = state.evaluate_batch(objective, self.initial_simplex(start, state));
        if simplex.len() < n + 1 {
            return finish(simplex, state, false);
        }
        sort(&mut simplex);

        for iteration in 1..=self.options.max_iter {
            if self.converged(&simplex, &width) {
                return finish(simplex, state, true);
            }
            let centroid = simplex[..n]
                .iter()
                .fold(Array1::zeros(n), |acc, c| acc + &c.parameters)
                / n as f64;
            let worst = &simplex[n];
            let point = |t: f64| &centroid + &((&worst.parameters - &centroid) * t);

            let Some(reflected) = state.evaluate(objective, point(-REFLECTION)) else {
                break;
            };
            let replacement = if reflected.cost() < simplex[0].cost() {
                match state.evaluate(objective, point(-REFLECTION * EXPANSION)) {
                    Some(expanded) if expanded.cost() < reflected.cost() => Some(expanded),
                    _ => Some(reflected),
                }
            } else if reflected.cost() < simplex[n - 1].cost() {
                Some(reflected)
            } else {
                // outside or inside contraction
                let (t, reference) = if reflected.cost() < worst.cost() {
                    (-REFLECTION * CONTRACTION, reflected.cost())
                } else {
                    (CONTRACTION, worst.cost())
                };
                match state.evaluate(objective, point(t)) {
                    Some(contracted) if contracted.cost() <= reference => Some(contracted),
                    _ => None,
                }
            };

            match replacement {
                Some(c) => simplex[n] = c,
                None => {
                    let best = simplex[0].parameters.clone();
                    let shrunk: Vec<_> = simplex[1..]
                        .iter()
                        .map(|c| &best + &((&c.parameters - &best) * SHRINK))
                        .collect();
                    let shrunk = state.evaluate_batch(objective, shrunk);
                    let complete = shrunk.len() == n;
                    for (i, c) in shrunk.into_iter().enumerate() {
                        simplex[i + 1] = c;
                    }
                    if !complete {
                        break;
                    }
                }
            }
            sort(&mut simplex);
            state.record_progress(self.name(), iteration);
            if state.budget_exhausted() {
                break;
            }
        }
        let converged = self.converged(&simplex, &width);
        finish(simplex, state, converged)
    }
}

fn finish(mut simplex: Vec<Candidate>, state: &FitState, converged: bool) -> Candidate {
    sort(&mut simplex);
    let mut best = simplex
        .into_iter()
        .next()
        .or_else(|| state.best().cloned())
        .unwrap_or_else(|| Candidate {
            parameters: state.lower().clone(),
            evaluation: Evaluation {
                cost: f64::INFINITY,
                failed_points: 0,
                total_points: 0,
            },
            converged: false,
        });
    best.converged = converged;
    best
}

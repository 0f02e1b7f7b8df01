use super::{Candidate, FitState, Objective, SearchStrategy};
use crate::estimator::Evaluation;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Options of the [DifferentialEvolution] strategy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferentialEvolutionOptions {
    /// Population size per adjustable parameter; at least five members are used.
    pub population_factor: usize,
    /// Differential weight F
    pub mutation: f64,
    /// Crossover probability CR
    pub crossover: f64,
    pub max_generations: usize,
    /// Relative tolerance on the spread of the population cost.
    pub tol: f64,
    /// Absolute tolerance on the spread of the population cost.
    pub atol: f64,
    /// Seed of the random number generator.
    pub seed: u64,
}

impl Default for DifferentialEvolutionOptions {
    fn default() -> Self {
        Self {
            population_factor: 15,
            mutation: 0.8,
            crossover: 0.9,
            max_generations: 100,
            tol: 1e-8,
            atol: 1e-14,
            seed: 42,
        }
    }
}

/// Global search with the rand/1/bin differential evolution scheme.
///
/// The first member of the initial population is the starting point,
/// the others are drawn uniformly within the bounds.
pub struct DifferentialEvolution {
    options: DifferentialEvolutionOptions,
}

impl DifferentialEvolution {
    pub fn new(options: DifferentialEvolutionOptions) -> Self {
        Self { options }
    }

    /// Three mutually distinct indices different from `i`.
    fn pick(rng: &mut StdRng, n: usize, i: usize) -> [usize; 3] {
        let mut idx = [i; 3];
        for k in 0..3 {
            loop {
                let r = rng.gen_range(0..n);
                if r != i && !idx[..k].contains(&r) {
                    idx[k] = r;
                    break;
                }
            }
        }
        idx
    }

    fn converged(&self, population: &[Candidate]) -> bool {
        let n = population.len() as f64;
        let mean = population.iter().map(|c| c.cost()).sum::<f64>() / n;
        let var = population
            .iter()
            .map(|c| (c.cost() - mean).powi(2))
            .sum::<f64>()
            / n;
        var.sqrt() <= self.options.atol + self.options.tol * mean.abs()
    }
}

impl SearchStrategy for DifferentialEvolution {
    fn name(&self) -> &'static str {
        "differential evolution"
    }

    fn search(
        &self,
        objective: &dyn Objective,
        start: &Array1<f64>,
        state: &mut FitState,
    ) -> Candidate {
        let o = &self.options;
        let dim = state.dimension();
        let np = (o.population_factor * dim).max(5);
        let mut rng = StdRng::seed_from_u64(o.seed);

        let (lower, upper) = (state.lower().clone(), state.upper().clone());
        let mut initial = vec![start.clone()];
        initial.extend((1..np).map(|_| {
            Array1::from_shape_fn(dim, |j| rng.gen_range(lower[j]..upper[j]))
        }));
        let mut population = state.evaluate_batch(objective, initial);
        state.record_progress(self.name(), 0);

        let mut converged = false;
        for generation in 1..=o.max_generations {
            if population.len() < np || state.budget_exhausted() {
                break;
            }
            let trials: Vec<_> = (0..np)
                .map(|i| {
                    let [a, b, c] = Self::pick(&mut rng, np, i);
                    let j_rand = rng.gen_range(0..dim);
                    Array1::from_shape_fn(dim, |j| {
                        if j == j_rand || rng.gen::<f64>() < o.crossover {
                            population[a].parameters[j]
                                + o.mutation
                                    * (population[b].parameters[j] - population[c].parameters[j])
                        } else {
                            population[i].parameters[j]
                        }
                    })
                })
                .collect();
            let trials = state.evaluate_batch(objective, trials);
            for (i, trial) in trials.into_iter().enumerate() {
                if trial.cost() <= population[i].cost() {
                    population[i] = trial;
                }
            }
            state.record_progress(self.name(), generation);
            if self.converged(&population) {
                converged = true;
                break;
            }
        }

        let best = population
            .into_iter()
            .min_by(|a, b| a.cost().total_cmp(&b.cost()))
            .or_else(|| state.best().cloned());
        match best {
            Some(mut best) => {
                best.converged = converged;
                best
            }
            // budget exhausted before any evaluation
            None => Candidate {
                parameters: start.clone(),
                evaluation: Evaluation {
                    cost: f64::INFINITY,
                    failed_points: 0,
                    total_points: 0,
                },
                converged: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::tests::Rosenbrock;
    use crate::fit::FitOptions;
    use ndarray::arr1;

    fn state(max_evaluations: usize) -> FitState {
        let options = FitOptions {
            max_evaluations,
            ..Default::default()
        };
        FitState::new(&[(-2.0, 2.0), (-1.0, 3.0)], &options).unwrap()
    }

    #[test]
    fn distinct_indices() {
        let mut rng = StdRng::seed_from_u64(0);
        for i in 0..5 {
            let [a, b, c] = DifferentialEvolution::pick(&mut rng, 5, i);
            assert!(a != i && b != i && c != i);
            assert!(a != b && b != c && a != c);
        }
    }

    #[test]
    fn improves_on_start() {
        let de = DifferentialEvolution::new(Default::default());
        let mut state = state(3000);
        let start = arr1(&[-1.5, 2.5]);
        let initial = Rosenbrock.evaluate(start.as_slice().unwrap()).cost;
        let best = de.search(&Rosenbrock, &start, &mut state);
        assert!(best.cost() < 1e-2 * initial);
        assert!(state.evaluations() <= 3000);
        assert!(best
            .parameters
            .iter()
            .zip(state.lower().iter().zip(state.upper()))
            .all(|(x, (l, u))| l <= x && x <= u));
    }

    #[test]
    fn seed_controls_the_search() {
        let run = |seed| {
            let de = DifferentialEvolution::new(DifferentialEvolutionOptions {
                seed,
                max_generations: 5,
                ..Default::default()
            });
            de.search(&Rosenbrock, &arr1(&[0.0, 0.0]), &mut state(10_000))
                .parameters
        };
        assert_eq!(run(1), run(1));
        assert_ne!(run(1), run(2));
    }
}

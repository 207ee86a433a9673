//! Multi-objective hyperparameter search
//!
//! NSGA-II style evolutionary loop over the retrieval parameters: quality is
//! maximized, latency minimized, and the output is the full Pareto front so
//! an operator picks the trade-off instead of the optimizer collapsing two
//! genuinely competing objectives into one number. The budget is fixed
//! (generations times population size), not convergence-based.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SearchConfig;
use crate::eval::{EvalHarness, Trial};
use crate::retrieval::types::RetrievalParameters;

/// Bounded integer ranges the search explores
///
/// Bounds are inclusive; the context cap moves on a fixed step so the space
/// stays small enough for a 20-trial budget.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    k_general: (usize, usize),
    k_financial: (usize, usize),
    max_context_chars: (usize, usize),
    context_chars_step: usize,
}

impl ParameterSpace {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            k_general: (config.k_general_min, config.k_general_max),
            k_financial: (config.k_financial_min, config.k_financial_max),
            max_context_chars: (config.max_context_chars_min, config.max_context_chars_max),
            context_chars_step: config.context_chars_step,
        }
    }

    /// Draw a uniform random candidate within bounds.
    pub fn sample(&self, rng: &mut StdRng) -> RetrievalParameters {
        RetrievalParameters {
            k_general: rng.gen_range(self.k_general.0..=self.k_general.1),
            k_financial: rng.gen_range(self.k_financial.0..=self.k_financial.1),
            max_context_chars: self.sample_context_chars(rng),
        }
    }

    fn sample_context_chars(&self, rng: &mut StdRng) -> usize {
        let steps = (self.max_context_chars.1 - self.max_context_chars.0) / self.context_chars_step;
        self.max_context_chars.0 + self.context_chars_step * rng.gen_range(0..=steps)
    }

    /// Resample each gene independently with probability `prob`.
    pub fn mutate(&self, rng: &mut StdRng, params: &mut RetrievalParameters, prob: f64) {
        if rng.gen_bool(prob) {
            params.k_general = rng.gen_range(self.k_general.0..=self.k_general.1);
        }
        if rng.gen_bool(prob) {
            params.k_financial = rng.gen_range(self.k_financial.0..=self.k_financial.1);
        }
        if rng.gen_bool(prob) {
            params.max_context_chars = self.sample_context_chars(rng);
        }
    }
}

/// True when `a` is at least as good as `b` on both objectives and strictly
/// better on one. Quality is maximized, latency minimized.
pub fn dominates(a: &Trial, b: &Trial) -> bool {
    let at_least_as_good = a.quality_score >= b.quality_score
        && a.mean_latency_seconds <= b.mean_latency_seconds;
    let strictly_better = a.quality_score > b.quality_score
        || a.mean_latency_seconds < b.mean_latency_seconds;
    at_least_as_good && strictly_better
}

/// Running set of non-dominated trials across all generations
///
/// Accumulates every trial ever seen that no other trial dominates;
/// duplicate parameter vectors are not re-inserted.
#[derive(Debug, Clone, Default)]
pub struct ParetoFront {
    trials: Vec<Trial>,
}

impl ParetoFront {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a trial, keeping the front non-dominated. Returns whether the
    /// trial was admitted.
    pub fn insert(&mut self, candidate: Trial) -> bool {
        if self
            .trials
            .iter()
            .any(|t| t.parameters == candidate.parameters)
        {
            return false;
        }
        if self.trials.iter().any(|t| dominates(t, &candidate)) {
            return false;
        }
        self.trials.retain(|t| !dominates(&candidate, t));
        self.trials.push(candidate);
        true
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

/// Partition trial indices into fronts: front 0 is non-dominated, front 1 is
/// non-dominated once front 0 is removed, and so on.
fn non_dominated_sort(trials: &[Trial]) -> Vec<Vec<usize>> {
    let n = trials.len();
    let mut dominated_by = vec![0usize; n];
    let mut dominates_set: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(&trials[i], &trials[j]) {
                dominates_set[i].push(j);
            } else if dominates(&trials[j], &trials[i]) {
                dominated_by[i] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| dominated_by[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominates_set[i] {
                dominated_by[j] -= 1;
                if dominated_by[j] == 0 {
                    next.push(j);
                }
            }
        }
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Crowding distance per front member, in front order. Boundary individuals
/// get infinity so selection keeps the extremes of the trade-off.
fn crowding_distance(front: &[usize], trials: &[Trial]) -> Vec<f64> {
    let m = front.len();
    let mut distance = vec![0.0f64; m];
    if m <= 2 {
        return vec![f64::INFINITY; m];
    }

    let objectives: [fn(&Trial) -> f64; 2] = [
        |t| t.quality_score,
        |t| t.mean_latency_seconds,
    ];

    for objective in objectives {
        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by(|&a, &b| {
            objective(&trials[front[a]])
                .partial_cmp(&objective(&trials[front[b]]))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let low = objective(&trials[front[order[0]]]);
        let high = objective(&trials[front[order[m - 1]]]);
        distance[order[0]] = f64::INFINITY;
        distance[order[m - 1]] = f64::INFINITY;
        let range = high - low;
        if range <= f64::EPSILON {
            continue;
        }
        for w in 1..m - 1 {
            let prev = objective(&trials[front[order[w - 1]]]);
            let next = objective(&trials[front[order[w + 1]]]);
            distance[order[w]] += (next - prev) / range;
        }
    }
    distance
}

/// The evolutionary loop: evaluate, sort, select, recombine, mutate
pub struct EvolutionarySearch {
    space: ParameterSpace,
    population_size: usize,
    generations: usize,
    mutation_prob: f64,
    rng: StdRng,
}

impl EvolutionarySearch {
    /// Build the search from validated configuration. A configured seed makes
    /// the run reproducible.
    pub fn new(config: &SearchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            space: ParameterSpace::from_config(config),
            population_size: config.population_size,
            generations: config.generations,
            mutation_prob: config.mutation_prob,
            rng,
        }
    }

    /// Total trials this search will evaluate
    pub fn trial_budget(&self) -> usize {
        self.generations * self.population_size
    }

    /// Run the full budget and return the accumulated Pareto front.
    ///
    /// `on_trial` fires after every evaluation, in order; callers use it for
    /// progress reporting. Evaluations run sequentially so the generation
    /// backend sees a predictable load.
    pub async fn run(
        &mut self,
        harness: &EvalHarness,
        mut on_trial: impl FnMut(&Trial),
    ) -> ParetoFront {
        let mut front = ParetoFront::new();
        let mut population: Vec<RetrievalParameters> = (0..self.population_size)
            .map(|_| self.space.sample(&mut self.rng))
            .collect();

        for generation in 0..self.generations {
            tracing::info!("Generation {}/{}", generation + 1, self.generations);

            let mut evaluated = Vec::with_capacity(population.len());
            for candidate in &population {
                let trial = harness.evaluate(candidate).await;
                tracing::debug!(
                    quality = trial.quality_score,
                    latency = trial.mean_latency_seconds,
                    "Evaluated {}",
                    trial.parameters
                );
                front.insert(trial.clone());
                on_trial(&trial);
                evaluated.push(trial);
            }

            if generation + 1 < self.generations {
                population = self.next_generation(&evaluated);
            }
        }

        tracing::info!("Search finished: {} trials on the front", front.len());
        front
    }

    /// Breed the next population from the evaluated one: binary tournament
    /// on (rank, crowding), uniform crossover, per-gene mutation.
    fn next_generation(&mut self, evaluated: &[Trial]) -> Vec<RetrievalParameters> {
        let fronts = non_dominated_sort(evaluated);
        let mut rank = vec![0usize; evaluated.len()];
        let mut crowding = vec![0.0f64; evaluated.len()];
        for (front_rank, front) in fronts.iter().enumerate() {
            let distances = crowding_distance(front, evaluated);
            for (w, &idx) in front.iter().enumerate() {
                rank[idx] = front_rank;
                crowding[idx] = distances[w];
            }
        }

        let mut children = Vec::with_capacity(self.population_size);
        while children.len() < self.population_size {
            let a = self.tournament(&rank, &crowding);
            let b = self.tournament(&rank, &crowding);
            let mut child = self.crossover(&evaluated[a].parameters, &evaluated[b].parameters);
            self.space.mutate(&mut self.rng, &mut child, self.mutation_prob);
            children.push(child);
        }
        children
    }

    fn tournament(&mut self, rank: &[usize], crowding: &[f64]) -> usize {
        let i = self.rng.gen_range(0..rank.len());
        let j = self.rng.gen_range(0..rank.len());
        if rank[i] < rank[j] {
            i
        } else if rank[j] < rank[i] {
            j
        } else if crowding[i] >= crowding[j] {
            i
        } else {
            j
        }
    }

    fn crossover(
        &mut self,
        a: &RetrievalParameters,
        b: &RetrievalParameters,
    ) -> RetrievalParameters {
        RetrievalParameters {
            k_general: if self.rng.gen_bool(0.5) { a.k_general } else { b.k_general },
            k_financial: if self.rng.gen_bool(0.5) { a.k_financial } else { b.k_financial },
            max_context_chars: if self.rng.gen_bool(0.5) {
                a.max_context_chars
            } else {
                b.max_context_chars
            },
        }
    }
}

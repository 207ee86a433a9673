use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use indicatif::{ProgressBar, ProgressStyle};
use orienta_server::config;
use orienta_server::engine::DialogueEngine;
use orienta_server::eval::EvalHarness;
use orienta_server::search::EvolutionarySearch;

use crate::error::CliResult;
use crate::output::OutputFormat;

/// Run the evolutionary search over the configured test set and print the
/// quality/latency Pareto front.
#[derive(Parser)]
pub struct TuneCommand {
    #[clap(long, help = "Override the number of generations")]
    pub generations: Option<usize>,

    #[clap(long, help = "Override the population size")]
    pub population: Option<usize>,

    #[clap(long, help = "RNG seed for a reproducible run")]
    pub seed: Option<u64>,
}

impl TuneCommand {
    pub async fn execute(&self, config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let mut config = config::load(config_path)?;
        if let Some(generations) = self.generations {
            config.search.generations = generations;
        }
        if let Some(population) = self.population {
            config.search.population_size = population;
        }
        if let Some(seed) = self.seed {
            config.search.seed = Some(seed);
        }
        config.validate()?;

        let engine = Arc::new(DialogueEngine::from_config(&config)?);
        let harness = EvalHarness::new(engine, config.eval.cases.clone())?;
        let mut search = EvolutionarySearch::new(&config.search);
        let budget = search.trial_budget();

        let bar = ProgressBar::new(budget as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] trial {pos}/{len}")
            .map_err(|e| format!("Progress bar error: {e}"))?
            .progress_chars("#>-");
        bar.set_style(style);

        let front = search.run(&harness, |_| bar.inc(1)).await;
        bar.finish_and_clear();

        let mut trials = front.trials().to_vec();
        trials.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&trials)?);
            }
            OutputFormat::Table => {
                println!(
                    "Pareto front: {} non-dominated of {} trials\n",
                    trials.len(),
                    budget
                );

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header([
                        "Quality",
                        "Latency (s)",
                        "k_general",
                        "k_financial",
                        "max_context_chars",
                    ]);

                for trial in &trials {
                    table.add_row([
                        format!("{:.2}", trial.quality_score),
                        format!("{:.2}", trial.mean_latency_seconds),
                        trial.parameters.k_general.to_string(),
                        trial.parameters.k_financial.to_string(),
                        trial.parameters.max_context_chars.to_string(),
                    ]);
                }

                println!("{table}");
            }
        }

        Ok(())
    }
}

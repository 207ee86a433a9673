use std::path::Path;

use clap::Parser;
use orienta_server::config;
use orienta_server::engine::DialogueEngine;
use orienta_server::session::SessionId;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct AskCommand {
    #[clap(help = "Question to send through the engine")]
    pub question: String,

    #[clap(long, default_value = "cli", help = "Session id for the exchange")]
    pub session: String,
}

impl AskCommand {
    pub async fn execute(&self, config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let config = config::load(config_path)?;
        let engine = DialogueEngine::from_config(&config)?;
        let session_id = SessionId::try_from(self.session.as_str())?;

        let reply = engine.respond(&session_id, &self.question).await;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "reply": reply });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("{reply}");
            }
        }

        Ok(())
    }
}

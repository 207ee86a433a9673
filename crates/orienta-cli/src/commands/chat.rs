use std::io::{self, BufRead, Write};
use std::path::Path;

use clap::Parser;
use orienta_server::config;
use orienta_server::engine::DialogueEngine;
use orienta_server::session::SessionId;

use crate::error::CliResult;

/// Interactive terminal chat. All turns share one session so the engine
/// threads the conversation history through each generation.
#[derive(Parser)]
pub struct ChatCommand {
    #[clap(long, default_value = "terminal", help = "Session id for this chat")]
    pub session: String,
}

impl ChatCommand {
    pub async fn execute(&self, config_path: Option<&Path>) -> CliResult<()> {
        let config = config::load(config_path)?;
        let engine = DialogueEngine::from_config(&config)?;
        let session_id = SessionId::try_from(self.session.as_str())?;

        println!("Orienta - asistente de postgrados. Escribe 'salir' para terminar.\n");

        let stdin = io::stdin();
        loop {
            print!("Tú: ");
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let message = line.trim();
            if message.eq_ignore_ascii_case("salir") || message.eq_ignore_ascii_case("exit") {
                break;
            }

            let reply = engine.respond(&session_id, message).await;
            println!("Orienta: {reply}\n");
        }

        println!("¡Hasta pronto!");
        Ok(())
    }
}

pub mod ask;
pub mod chat;
pub mod tune;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use tune::TuneCommand;

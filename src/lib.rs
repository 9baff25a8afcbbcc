pub mod action;
pub mod belief;
pub mod config;
pub mod error;
pub mod history;
pub mod moves;
pub mod player;
pub mod policy;
pub mod projector;
pub mod referee;
pub mod role;
pub mod rules;
pub mod search;
pub mod simulator;
pub mod state;
pub mod threat;
pub mod transport;

pub use action::{ActionKind, Command, CommandEnvelope};
pub use config::Config;
pub use error::{ChatError, CommandError, ConfigError, DecisionError, RulesError};
pub use player::{HeuristicPlayer, SearchPlayer};
pub use policy::HeuristicPolicy;
pub use referee::{MatchResult, Seat, Table};
pub use role::Role;
pub use search::{Position, SearchEngine};
pub use state::{GameState, Phase, Settings, Variant};
pub use transport::{ChatResponder, CommandSink, Oracle, Outbox};

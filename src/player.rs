use std::time::Instant;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::{debug, event, warn, Level};
use crate::action::{Command, CommandEnvelope};
use crate::config::{PolicyConfig, SearchConfig};
use crate::error::DecisionError;
use crate::history::HistoryEvent;
use crate::policy::HeuristicPolicy;
use crate::search::{Position, SearchEngine};
use crate::state::GameState;
use crate::transport::{ChatResponder, CommandSink, Oracle};

/// A delayed reaction waiting to fire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PendingReaction {
    pub due: Instant,
    pub version: u64,
}

fn submit<S: CommandSink>(sink: &mut S, player: usize, version: u64, command: Command) -> bool {
    match sink.send(CommandEnvelope { version, command: command.clone() }) {
        Ok(()) => {
            event!(Level::INFO, player, version, command = %command, "submitted");
            true
        }
        Err(err) => {
            // wait for the next snapshot
            warn!(player, version, command = %command, error = %err, "command rejected");
            false
        }
    }
}

/// Brings the heuristic policy to the table: thinking delay, last snapshot wins, chat.
pub struct HeuristicPlayer<S: CommandSink, R: Rng = Pcg64> {
    policy: HeuristicPolicy<R>,
    sink: S,
    chat: Option<Box<dyn ChatResponder>>,
    oracle: Option<Box<dyn Oracle>>,
    latest: Option<GameState>,
    pending: Option<PendingReaction>,
}

impl<S: CommandSink> HeuristicPlayer<S, Pcg64> {
    pub fn from_config(config: PolicyConfig, sink: S) -> Self {
        HeuristicPlayer::new(HeuristicPolicy::from_config(config), sink)
    }
}

impl<S: CommandSink, R: Rng> HeuristicPlayer<S, R> {
    pub fn new(policy: HeuristicPolicy<R>, sink: S) -> Self {
        HeuristicPlayer {
            policy,
            sink,
            chat: None,
            oracle: None,
            latest: None,
            pending: None,
        }
    }

    pub fn with_chat(mut self, chat: Box<dyn ChatResponder>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_oracle(mut self, oracle: Box<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn policy(&self) -> &HeuristicPolicy<R> {
        &self.policy
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn pending(&self) -> Option<PendingReaction> {
        self.pending
    }

    /// Schedules a reaction to `snapshot`, superseding any reaction still pending.
    pub fn on_state_change(&mut self, snapshot: GameState, now: Instant) {
        self.policy.observe_phase(&snapshot);
        let due = now + self.policy.thinking_delay();
        self.pending = Some(PendingReaction { due, version: snapshot.version });
        self.latest = Some(snapshot);
    }

    /// Fires the pending reaction once it is due. Returns the command that went out.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Command>, DecisionError> {
        let pending = match self.pending {
            Some(pending) if pending.due <= now => pending,
            _ => return Ok(None),
        };
        self.pending = None;

        let state = match &self.latest {
            Some(state) if state.version == pending.version => state,
            _ => return Ok(None),
        };
        let oracle = match self.oracle.as_mut() {
            Some(oracle) => Some(oracle.as_mut() as &mut dyn Oracle),
            None => None,
        };
        let command = match self.policy.decide(state, oracle)? {
            Some(command) => command,
            None => return Ok(None),
        };

        if submit(&mut self.sink, state.own_index, state.version, command.clone()) {
            Ok(Some(command))
        } else {
            Ok(None)
        }
    }

    pub fn on_history_event(&mut self, message: &str, kind: &str, group: Option<u64>) {
        let event = HistoryEvent::parse(message, kind, group);
        self.policy.observe_event(&event);
    }

    /// Forwards chat from the configured partner to the chat service, if there is one.
    pub fn on_chat_message(&mut self, player: usize, text: &str) {
        let partner = match (&self.policy.config().chat_partner, &self.latest) {
            (Some(partner), Some(state)) => state.players.get(player).map_or(false, |p| &p.name == partner),
            _ => false,
        };
        if !partner {
            return;
        }
        let chat = match self.chat.as_mut() {
            Some(chat) => chat,
            None => return,
        };

        match chat.respond(player, text) {
            Ok(Some(reply)) => {
                if let Err(err) = self.sink.send_chat(&reply) {
                    warn!(player, error = %err, "chat reply not delivered");
                }
            }
            Ok(None) => {}
            Err(err) => debug!(player, error = %err, "chat service failed, staying quiet"),
        }
    }
}

/// Runs the search synchronously on every snapshot.
pub struct SearchPlayer<S: CommandSink, R: Rng = Pcg64> {
    engine: SearchEngine<R>,
    sink: S,
}

impl<S: CommandSink> SearchPlayer<S, Pcg64> {
    pub fn from_config(config: SearchConfig, sink: S) -> Self {
        let rng = match config.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_entropy(),
        };
        SearchPlayer::new(SearchEngine::new(config, rng), sink)
    }
}

impl<S: CommandSink, R: Rng> SearchPlayer<S, R> {
    pub fn new(engine: SearchEngine<R>, sink: S) -> Self {
        SearchPlayer { engine, sink }
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn on_state_change(&mut self, snapshot: &GameState) -> Result<Option<Command>, DecisionError> {
        snapshot.validate()?;
        let position = Position::for_snapshot(snapshot.clone());
        let command = match self.engine.compute_best_move(&position) {
            Some(command) => command,
            None => return Ok(None),
        };

        if submit(&mut self.sink, snapshot.own_index, snapshot.version, command.clone()) {
            Ok(Some(command))
        } else {
            Ok(None)
        }
    }
}

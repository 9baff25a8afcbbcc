// local stand-in for the authoritative game, used for self-play

use std::time::{Duration, Instant};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::{debug, info, warn};
use crate::action::{Command, CommandEnvelope};
use crate::config::{PolicyConfig, SearchConfig};
use crate::error::{CommandError, ConfigError};
use crate::history::HistoryEvent;
use crate::player::{HeuristicPlayer, SearchPlayer};
use crate::rules::{self, contested_claim, CardSource, Deck};
use crate::state::{GameState, Influence, Phase, Player, RevealReason, Settings, Team};
use crate::transport::Outbox;

pub const STARTING_CASH: u32 = 2;

pub enum Seat {
    Heuristic(HeuristicPlayer<Outbox>),
    Search(SearchPlayer<Outbox>),
}

impl Seat {
    pub fn heuristic(config: PolicyConfig) -> Seat {
        Seat::Heuristic(HeuristicPlayer::from_config(config, Outbox::new()))
    }

    pub fn search(config: SearchConfig) -> Seat {
        Seat::Search(SearchPlayer::from_config(config, Outbox::new()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Seat::Heuristic(_) => "heuristic",
            Seat::Search(_) => "search",
        }
    }

    fn max_delay(&self) -> Duration {
        match self {
            Seat::Heuristic(player) => player.policy().config().delay.max(),
            Seat::Search(_) => Duration::ZERO,
        }
    }

    fn observe(&mut self, idx: usize, snapshot: GameState, now: Instant) {
        match self {
            Seat::Heuristic(player) => player.on_state_change(snapshot, now),
            Seat::Search(player) => {
                if let Err(err) = player.on_state_change(&snapshot) {
                    warn!(seat = idx, error = %err, "search refused snapshot");
                }
            }
        }
    }

    fn poll(&mut self, idx: usize, now: Instant) {
        if let Seat::Heuristic(player) = self {
            if let Err(err) = player.poll(now) {
                warn!(seat = idx, error = %err, "heuristic refused snapshot");
            }
        }
    }

    fn announce(&mut self, event: &HistoryEvent, group: u64) {
        if let Seat::Heuristic(player) = self {
            player.on_history_event(&event.message(), event.kind(), Some(group));
        }
    }

    fn outbox(&mut self) -> &mut Outbox {
        match self {
            Seat::Heuristic(player) => player.sink_mut(),
            Seat::Search(player) => player.sink_mut(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub winner: Option<usize>,
    pub steps: usize,
    pub commands: usize,
    pub rejected: usize,
}

/// Deals a match and runs it, turning the seats' commands into state updates.
pub struct Table {
    state: GameState,
    deck: Deck<Pcg64>,
    seats: Vec<Seat>,
    rng: Pcg64,
    clock: Instant,
    tick: Duration,
    max_steps: usize,
}

impl Table {
    pub fn new(seats: Vec<Seat>, settings: Settings, seed: u64) -> Result<Table, ConfigError> {
        let n = seats.len();
        let cards = settings.roles_in_play().len() * settings.copies_per_role;
        if n < 2 {
            return Err(ConfigError::Invalid(format!("a match needs at least two seats, got {n}")));
        }
        // everyone's hand plus an exchange draw
        if n * settings.hand_size + settings.exchange_draws() > cards {
            return Err(ConfigError::Invalid(format!("{cards} cards cannot deal {n} hands")));
        }

        let mut rng = Pcg64::seed_from_u64(seed);
        let mut deck = Deck::new(&settings.roles_in_play(), settings.copies_per_role, Pcg64::seed_from_u64(rng.gen()));
        let players = (0..n)
            .map(|idx| {
                let influence = (0..settings.hand_size)
                    .filter_map(|_| deck.draw())
                    .map(Influence::hidden)
                    .collect();
                let mut player = Player::new(format!("p{idx}"), STARTING_CASH, influence);
                if settings.is_reformation() {
                    player.team = Some(if idx % 2 == 0 { Team::Loyalist } else { Team::Reformist });
                }
                player
            })
            .collect();

        let first = rng.gen_range(0..n);
        let mut state = GameState::new(0, players, Phase::TurnStart { player: first });
        state.settings = settings;

        let tick = seats.iter().map(Seat::max_delay).max().unwrap_or_default() + Duration::from_millis(1);
        Ok(Table {
            state,
            deck,
            seats,
            rng,
            clock: Instant::now(),
            tick,
            max_steps: 2_000,
        })
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn deck(&self) -> &Deck<Pcg64> {
        &self.deck
    }

    pub fn play(&mut self) -> MatchResult {
        let mut result = MatchResult::default();

        while result.steps < self.max_steps {
            if let Phase::GameWon { player } = self.state.phase {
                result.winner = Some(player);
                break;
            }
            result.steps += 1;

            for idx in 0..self.seats.len() {
                let view = self.state.perspective(idx);
                self.seats[idx].observe(idx, view, self.clock);
            }
            self.clock += self.tick;
            for (idx, seat) in self.seats.iter_mut().enumerate() {
                seat.poll(idx, self.clock);
            }

            let mut envelopes: Vec<(usize, CommandEnvelope)> = vec![];
            for (idx, seat) in self.seats.iter_mut().enumerate() {
                envelopes.extend(seat.outbox().drain().into_iter().map(|envelope| (idx, envelope)));
            }
            // whoever gets in first
            envelopes.shuffle(&mut self.rng);

            for (idx, envelope) in envelopes {
                match self.submit(idx, envelope) {
                    Ok(events) => {
                        result.commands += 1;
                        let group = self.state.version;
                        for event in events {
                            for seat in self.seats.iter_mut() {
                                seat.announce(&event, group);
                            }
                        }
                    }
                    Err(err) => {
                        result.rejected += 1;
                        debug!(seat = idx, error = %err, "table rejected command");
                    }
                }
            }
        }

        if result.winner.is_none() {
            if let Phase::GameWon { player } = self.state.phase {
                result.winner = Some(player);
            }
        }
        info!(
            winner = ?result.winner,
            steps = result.steps,
            commands = result.commands,
            rejected = result.rejected,
            "match finished"
        );
        result
    }

    /// Applies one command if it was decided against the current version.
    pub fn submit(&mut self, player: usize, envelope: CommandEnvelope) -> Result<Vec<HistoryEvent>, CommandError> {
        if envelope.version != self.state.version {
            return Err(CommandError::Stale {
                sent: envelope.version,
                current: self.state.version,
            });
        }

        let next = rules::apply(&self.state, player, &envelope.command, &mut self.deck)
            .map_err(|err| CommandError::Rejected(err.to_string()))?;
        let events = narrate(&self.state, &next, player, &envelope.command);
        self.state = next;
        Ok(events)
    }
}

fn narrate(before: &GameState, after: &GameState, player: usize, command: &Command) -> Vec<HistoryEvent> {
    match command {
        Command::Challenge => match contested_claim(before) {
            Some((challenged, _, _)) => {
                let succeeded = matches!(
                    after.phase,
                    Phase::RevealInfluence { reason: RevealReason::FailedClaim | RevealReason::FailedBlock, .. }
                );
                vec![HistoryEvent::Challenged { challenger: player, challenged, succeeded }]
            }
            None => vec![],
        },
        Command::Reveal { role } => vec![HistoryEvent::Revealed { player, role: *role }],
        Command::Exchange { .. } => vec![HistoryEvent::Exchanged { player }],
        _ => vec![],
    }
}

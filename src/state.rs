use std::fmt::{Debug, Formatter};
use serde::{Deserialize, Serialize};
use crate::action::ActionKind;
use crate::error::DecisionError;
use crate::Role;

/// One physical card. `role` is `None` when this perspective cannot see it.
#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Influence {
    pub role: Option<Role>,
    pub revealed: bool,
}

impl Influence {
    pub fn hidden(role: Role) -> Self {
        Influence { role: Some(role), revealed: false }
    }

    pub fn unknown() -> Self {
        Influence { role: None, revealed: false }
    }
}

impl Debug for Influence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = self.role.map(Role::name).unwrap_or("?");
        if self.revealed {
            f.write_fmt(format_args!("[{name}]"))
        } else {
            f.write_str(name)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Team {
    Loyalist,
    Reformist,
}

impl Team {
    pub fn flipped(self) -> Team {
        match self {
            Team::Loyalist => Team::Reformist,
            Team::Reformist => Team::Loyalist,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub cash: u32,
    pub influence: Vec<Influence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
}

impl Player {
    pub fn new(name: impl Into<String>, cash: u32, influence: Vec<Influence>) -> Self {
        Player {
            name: name.into(),
            cash,
            influence,
            team: None,
        }
    }

    pub fn influence_count(&self) -> usize {
        self.influence.iter().filter(|card| !card.revealed).count()
    }

    pub fn is_alive(&self) -> bool {
        self.influence_count() > 0
    }

    /// Unrevealed cards whose role this perspective knows.
    pub fn live_roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.influence
            .iter()
            .filter(|card| !card.revealed)
            .filter_map(|card| card.role)
    }

    pub fn holds(&self, role: Role) -> bool {
        self.live_roles().any(|held| held == role)
    }

    pub fn revealed_roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.influence
            .iter()
            .filter(|card| card.revealed)
            .filter_map(|card| card.role)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    #[default]
    Standard,
    Reformation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub variant: Variant,
    pub exchange_role: Role,
    pub copies_per_role: usize,
    pub hand_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            variant: Variant::Standard,
            exchange_role: Role::Ambassador,
            copies_per_role: 3,
            hand_size: 2,
        }
    }
}

impl Settings {
    pub fn roles_in_play(&self) -> Vec<Role> {
        vec![Role::Duke, Role::Captain, Role::Assassin, Role::Contessa, self.exchange_role]
    }

    pub fn is_reformation(&self) -> bool {
        self.variant == Variant::Reformation
    }

    /// Cards drawn by an exchange action.
    pub fn exchange_draws(&self) -> usize {
        if self.exchange_role == Role::Inquisitor {
            1
        } else {
            2
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealReason {
    Coup,
    Assassinate,
    // the actor was caught bluffing the action
    FailedClaim,
    // the challenger of the action was wrong
    IncorrectChallenge,
    // the blocker was caught bluffing
    FailedBlock,
    // the challenger of the block was wrong
    IncorrectBlockChallenge,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum Phase {
    TurnStart {
        player: usize,
    },
    ActionResponse {
        player: usize,
        action: ActionKind,
        #[serde(default)]
        target: Option<usize>,
        allowed: Vec<bool>,
    },
    FinalActionResponse {
        player: usize,
        action: ActionKind,
        #[serde(default)]
        target: Option<usize>,
    },
    BlockResponse {
        player: usize,
        action: ActionKind,
        #[serde(default)]
        target: Option<usize>,
        blocker: usize,
        role: Role,
        allowed: Vec<bool>,
    },
    RevealInfluence {
        player: usize,
        action: ActionKind,
        #[serde(default)]
        target: Option<usize>,
        reveal: usize,
        reason: RevealReason,
    },
    Exchange {
        player: usize,
        options: Vec<Role>,
    },
    GameWon {
        player: usize,
    },
}

pub static PHASE_NAMES: [&str; 7] = [
    "turn-start",
    "action-response",
    "final-action-response",
    "block-response",
    "reveal-influence",
    "exchange",
    "game-won",
];

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::TurnStart { .. } => "turn-start",
            Phase::ActionResponse { .. } => "action-response",
            Phase::FinalActionResponse { .. } => "final-action-response",
            Phase::BlockResponse { .. } => "block-response",
            Phase::RevealInfluence { .. } => "reveal-influence",
            Phase::Exchange { .. } => "exchange",
            Phase::GameWon { .. } => "game-won",
        }
    }

    /// The player whose turn it is (or the winner once the game is over).
    pub fn actor(&self) -> usize {
        match self {
            Phase::TurnStart { player }
            | Phase::ActionResponse { player, .. }
            | Phase::FinalActionResponse { player, .. }
            | Phase::BlockResponse { player, .. }
            | Phase::RevealInfluence { player, .. }
            | Phase::Exchange { player, .. }
            | Phase::GameWon { player } => *player,
        }
    }

    pub fn same_kind(&self, other: &Phase) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// The game as seen by one participant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub version: u64,
    pub own_index: usize,
    pub players: Vec<Player>,
    pub phase: Phase,
    #[serde(default)]
    pub treasury: u32,
    #[serde(default)]
    pub settings: Settings,
}

impl Debug for GameState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(format!("V {} | me {} | {:?}\n", self.version, self.own_index, self.phase).as_str())?;
        for (player_idx, player) in self.players.iter().enumerate() {
            f.write_str(format!("\tP {player_idx}: ${} | {:?} {:?}\n", player.cash, player.influence, player.team).as_str())?;
        }
        Ok(())
    }
}

impl GameState {
    pub fn new(own_index: usize, players: Vec<Player>, phase: Phase) -> Self {
        GameState {
            version: 0,
            own_index,
            players,
            phase,
            treasury: 0,
            settings: Settings::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<GameState, DecisionError> {
        // pull the phase name out first so an unknown one is reported by name
        let raw: serde_json::Value = serde_json::from_str(json)?;
        if let Some(name) = raw.pointer("/phase/name").and_then(|name| name.as_str()) {
            if !PHASE_NAMES.contains(&name) {
                return Err(DecisionError::UnknownPhase(name.to_string()));
            }
        }
        let state: GameState = serde_json::from_value(raw)?;
        state.validate()?;
        Ok(state)
    }

    pub fn own(&self) -> &Player {
        &self.players[self.own_index]
    }

    pub fn is_alive(&self, player_idx: usize) -> bool {
        self.players.get(player_idx).map_or(false, Player::is_alive)
    }

    pub fn influence_count(&self, player_idx: usize) -> usize {
        self.players[player_idx].influence_count()
    }

    pub fn living(&self) -> Vec<usize> {
        (0..self.players.len()).filter(|&idx| self.is_alive(idx)).collect()
    }

    /// Living players other than `exclude_idx`, in turn order starting after it.
    pub fn other_player_indexes(&self, exclude_idx: usize) -> Vec<usize> {
        (1..self.players.len())
            .map(|n| (exclude_idx + n) % self.players.len())
            .filter(|&player_idx| self.is_alive(player_idx))
            .collect()
    }

    pub fn next_living_player(&self, after: usize) -> usize {
        let mut idx = (after + 1) % self.players.len();
        while !self.is_alive(idx) && idx != after {
            idx = (idx + 1) % self.players.len();
        }
        idx
    }

    /// Seats between `from` and `to` in turn order; 1 means `to` acts right after `from`.
    pub fn turn_distance(&self, from: usize, to: usize) -> usize {
        let n = self.players.len();
        (to + n - from) % n
    }

    pub fn winner(&self) -> Option<usize> {
        match self.living().as_slice() {
            [winner] => Some(*winner),
            _ => None,
        }
    }

    pub fn team(&self, player_idx: usize) -> Option<Team> {
        if self.settings.is_reformation() {
            self.players[player_idx].team
        } else {
            None
        }
    }

    pub fn same_team(&self, a: usize, b: usize) -> bool {
        match (self.team(a), self.team(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// True once every living player is on one team, which lifts the targeting rule.
    pub fn teams_merged(&self) -> bool {
        let living = self.living();
        match living.first() {
            Some(&first) => living.iter().all(|&idx| self.team(idx) == self.team(first)),
            None => true,
        }
    }

    pub fn can_target(&self, actor: usize, target: usize) -> bool {
        target != actor
            && self.is_alive(target)
            && (!self.same_team(actor, target) || self.teams_merged())
    }

    pub fn revealed_count(&self, role: Role) -> usize {
        self.players
            .iter()
            .flat_map(|player| player.revealed_roles())
            .filter(|&revealed| revealed == role)
            .count()
    }

    pub fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    pub fn validate(&self) -> Result<(), DecisionError> {
        let n = self.players.len();
        let phase = self.phase.name();
        let malformed = |message: String| DecisionError::MalformedPhase { phase, message };

        if self.own_index >= n {
            return Err(malformed(format!("own index {} out of range", self.own_index)));
        }
        for (idx, player) in self.players.iter().enumerate() {
            if player.influence_count() > self.settings.hand_size {
                return Err(malformed(format!("player {idx} holds too many cards")));
            }
            if player.influence.iter().any(|card| card.revealed && card.role.is_none()) {
                return Err(malformed(format!("player {idx} has a revealed card without a role")));
            }
        }

        let check = |idx: usize, what: &str| {
            if idx < n {
                Ok(())
            } else {
                Err(malformed(format!("{what} {idx} out of range")))
            }
        };
        let check_target = |target: &Option<usize>, action: ActionKind| match target {
            Some(target) => check(*target, "target"),
            None if action.is_targeted() => Err(malformed(format!("{} needs a target", action.name()))),
            None => Ok(()),
        };
        let check_allowed = |allowed: &Vec<bool>| {
            if allowed.len() == n {
                Ok(())
            } else {
                Err(malformed(format!("allowed has {} entries for {n} players", allowed.len())))
            }
        };

        match &self.phase {
            Phase::TurnStart { player } | Phase::GameWon { player } => check(*player, "player"),
            Phase::ActionResponse { player, action, target, allowed } => {
                check(*player, "player")?;
                check_target(target, *action)?;
                check_allowed(allowed)
            }
            Phase::FinalActionResponse { player, action, target } => {
                check(*player, "player")?;
                check_target(target, *action)?;
                if target.is_none() {
                    return Err(malformed("final response needs a target".to_string()));
                }
                Ok(())
            }
            Phase::BlockResponse { player, action, target, blocker, allowed, .. } => {
                check(*player, "player")?;
                check(*blocker, "blocker")?;
                check_target(target, *action)?;
                check_allowed(allowed)
            }
            Phase::RevealInfluence { player, action, target, reveal, .. } => {
                check(*player, "player")?;
                check(*reveal, "revealing player")?;
                check_target(target, *action)
            }
            Phase::Exchange { player, options } => {
                check(*player, "player")?;
                // only the exchanging player sees the options
                let visible = *player == self.own_index;
                if visible && options.len() < self.players[*player].influence_count() {
                    return Err(malformed("fewer options than cards to keep".to_string()));
                }
                Ok(())
            }
        }
    }

    /// Copy of the state as `viewer` is allowed to see it.
    pub fn perspective(&self, viewer: usize) -> GameState {
        let mut view = self.clone();
        view.own_index = viewer;
        for (idx, player) in view.players.iter_mut().enumerate() {
            if idx == viewer {
                continue;
            }
            for card in player.influence.iter_mut().filter(|card| !card.revealed) {
                card.role = None;
            }
        }
        if let Phase::Exchange { player, options } = &mut view.phase {
            if *player != viewer {
                options.clear();
            }
        }
        view
    }
}

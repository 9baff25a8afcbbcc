// what-if analysis of coup and allegiance moves in the reformation variant

use crate::action::{ActionKind, Command};
use crate::state::{GameState, Team};

/// The players a heuristic bot protects: its secret friend and the other cooperating bots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alliance {
    pub friend: Option<usize>,
    pub bots: Vec<usize>,
}

impl Alliance {
    /// Resolves configured names against the seating of `state`.
    pub fn resolve(state: &GameState, friend: Option<&str>, allies: &[String]) -> Alliance {
        let index_of = |name: &str| state.players.iter().position(|player| player.name == name);
        Alliance {
            friend: friend.and_then(index_of),
            bots: allies.iter().filter_map(|name| index_of(name.as_str())).collect(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.friend.is_some()
    }

    pub fn is_friendly(&self, player: usize) -> bool {
        self.friend == Some(player) || self.bots.contains(&player)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Candidate {
    Noop,
    Coup(usize),
    ChangeTeam,
    Convert(usize),
}

impl Candidate {
    pub fn command(self) -> Option<Command> {
        match self {
            Candidate::Noop => None,
            Candidate::Coup(target) => Some(Command::play_at(ActionKind::Coup, target)),
            Candidate::ChangeTeam => Some(Command::play(ActionKind::ChangeTeam)),
            Candidate::Convert(target) => Some(Command::play_at(ActionKind::Convert, target)),
        }
    }
}

/// Rich hostile players able to coup members of each group.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Threats {
    pub friend: usize,
    pub bots: usize,
    pub enemies: usize,
}

/// Every candidate `me` can afford right now. Friendly players are never couped.
pub fn candidates(state: &GameState, me: usize, alliance: &Alliance) -> Vec<Candidate> {
    let cash = state.players[me].cash;
    let mut candidates = vec![Candidate::Noop];

    if cash >= ActionKind::Coup.cost() {
        candidates.extend(
            state
                .other_player_indexes(me)
                .into_iter()
                .filter(|&target| state.can_target(me, target) && !alliance.is_friendly(target))
                .map(Candidate::Coup),
        );
    }
    if state.settings.is_reformation() {
        if cash >= ActionKind::ChangeTeam.cost() {
            candidates.push(Candidate::ChangeTeam);
        }
        if cash >= ActionKind::Convert.cost() {
            candidates.extend(state.other_player_indexes(me).into_iter().map(Candidate::Convert));
        }
    }
    candidates
}

/// The game as it would look right after `candidate`, without touching `state`.
pub fn project(state: &GameState, me: usize, candidate: Candidate) -> GameState {
    let mut projected = state.clone();
    match candidate {
        Candidate::Noop => {}
        Candidate::Coup(target) => {
            projected.players[me].cash -= ActionKind::Coup.cost();
            if let Some(card) = projected.players[target].influence.iter_mut().find(|card| !card.revealed) {
                card.revealed = true;
            }
        }
        Candidate::ChangeTeam => {
            projected.players[me].cash -= ActionKind::ChangeTeam.cost();
            projected.treasury += ActionKind::ChangeTeam.cost();
            projected.players[me].team = projected.players[me].team.map(Team::flipped);
        }
        Candidate::Convert(target) => {
            projected.players[me].cash -= ActionKind::Convert.cost();
            projected.treasury += ActionKind::Convert.cost();
            projected.players[target].team = projected.players[target].team.map(Team::flipped);
        }
    }
    projected
}

fn is_threat(state: &GameState, attacker: usize, victim: usize) -> bool {
    state.players[attacker].cash >= ActionKind::Coup.cost() && state.can_target(attacker, victim)
}

pub fn count_threats(state: &GameState, me: usize, alliance: &Alliance) -> Threats {
    let mut threats = Threats::default();
    let living = state.living();

    for &victim in &living {
        let attackers = living.iter().filter(|&&attacker| is_threat(state, attacker, victim));
        if alliance.friend == Some(victim) || victim == me || alliance.bots.contains(&victim) {
            // our own side is no danger to itself
            let count = attackers
                .filter(|&&attacker| attacker != me && !alliance.is_friendly(attacker))
                .count();
            if alliance.friend == Some(victim) {
                threats.friend += count;
            } else {
                threats.bots += count;
            }
        } else {
            threats.enemies += attackers.count();
        }
    }
    threats
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    numerator as f64 / denominator.max(1) as f64
}

/// Picks the candidate that leaves the friend safest, then the bots, then falls back on a
/// fixed preference order.
pub fn choose(state: &GameState, me: usize, alliance: &Alliance) -> Candidate {
    let scored: Vec<(Candidate, Threats)> = candidates(state, me, alliance)
        .into_iter()
        .map(|candidate| (candidate, count_threats(&project(state, me, candidate), me, alliance)))
        .collect();

    scored
        .iter()
        .min_by(|(a, ta), (b, tb)| {
            ta.friend
                .cmp(&tb.friend)
                .then_with(|| ratio(tb.enemies, tb.friend).total_cmp(&ratio(ta.enemies, ta.friend)))
                .then_with(|| ratio(ta.bots, ta.friend).total_cmp(&ratio(tb.bots, tb.friend)))
                .then_with(|| ta.bots.cmp(&tb.bots))
                .then_with(|| ratio(tb.enemies, tb.bots).total_cmp(&ratio(ta.enemies, ta.bots)))
                .then_with(|| preference(state, me, *a).cmp(&preference(state, me, *b)))
        })
        .map(|(candidate, _)| *candidate)
        .unwrap_or(Candidate::Noop)
}

// lower sorts first
fn preference(state: &GameState, me: usize, candidate: Candidate) -> (u8, i64, i64, i64) {
    match candidate {
        Candidate::Coup(target) => (0, state.turn_distance(me, target) as i64, 0, 0),
        Candidate::ChangeTeam => {
            let joins_stronger = state
                .players[me]
                .team
                .map_or(false, |team| team_strength(state, team.flipped()) > team_strength(state, team));
            (if joins_stronger { 1 } else { 3 }, 0, 0, 0)
        }
        Candidate::Convert(target) => {
            let player = &state.players[target];
            let distance = state.turn_distance(me, target) as i64;
            if player.cash == 0 {
                (2, -(player.influence_count() as i64), distance, 0)
            } else {
                // otherwise the one who acts last
                (4, -distance, 0, 0)
            }
        }
        Candidate::Noop => (5, 0, 0, 0),
    }
}

fn team_strength(state: &GameState, team: Team) -> usize {
    state
        .living()
        .into_iter()
        .filter(|&idx| state.team(idx) == Some(team))
        .map(|idx| state.influence_count(idx))
        .sum()
}

// depth limited adversarial search with chance nodes for hidden-role challenges

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use crate::action::Command;
use crate::config::{EvalWeights, SearchConfig};
use crate::moves::{enumerate_moves, Move};
use crate::projector::project_challenge;
use crate::rules::{apply, apply_reveal, is_responder, Unseen};
use crate::state::{GameState, Phase};

pub const WIN_SCORE: f64 = 1_000.0;

/// What applying a move leads to.
pub enum Outcome<P> {
    Single(P),
    /// weighted successors; weights sum to one
    Chance(Vec<(f64, P)>),
}

/// A game the searcher can look ahead in.
pub trait Game {
    type Position;
    type Move: Clone;

    /// Who chooses at `position`, `None` once it is terminal.
    fn decider(&self, position: &Self::Position) -> Option<usize>;

    fn moves(&self, position: &Self::Position) -> Vec<Self::Move>;

    /// `None` when the move turns out to be illegal.
    fn apply(&self, position: &Self::Position, mv: &Self::Move) -> Option<Outcome<Self::Position>>;

    fn evaluate(&self, position: &Self::Position, perspective: usize) -> f64;
}

/// Paranoid alpha-beta: the perspective player maximises, everyone else minimises, chance
/// nodes take the expectation.
pub struct Searcher<'a, G: Game> {
    game: &'a G,
    perspective: usize,
    pub nodes: usize,
}

impl<'a, G: Game> Searcher<'a, G> {
    pub fn new(game: &'a G, perspective: usize) -> Self {
        Searcher { game, perspective, nodes: 0 }
    }

    /// Best move at `root` for the perspective player, with its value. Equal values are
    /// broken at random.
    pub fn best_move<R: Rng>(&mut self, root: &G::Position, depth: usize, rng: &mut R) -> Option<(G::Move, f64)> {
        let mut moves = self.game.moves(root);
        moves.shuffle(rng);

        let mut best: Option<(G::Move, f64)> = None;
        let mut alpha = f64::NEG_INFINITY;
        for mv in moves {
            let outcome = match self.game.apply(root, &mv) {
                Some(outcome) => outcome,
                None => continue,
            };
            let value = self.outcome_value(outcome, depth.saturating_sub(1), alpha, f64::INFINITY);
            if best.as_ref().map_or(true, |(_, best_value)| value > *best_value) {
                alpha = alpha.max(value);
                best = Some((mv, value));
            }
        }
        best
    }

    fn outcome_value(&mut self, outcome: Outcome<G::Position>, depth: usize, alpha: f64, beta: f64) -> f64 {
        match outcome {
            Outcome::Single(position) => self.value(&position, depth, alpha, beta),
            Outcome::Chance(branches) => branches
                .into_iter()
                .filter(|(weight, _)| *weight > 0.0)
                .map(|(weight, position)| weight * self.value(&position, depth, f64::NEG_INFINITY, f64::INFINITY))
                .sum(),
        }
    }

    fn value(&mut self, position: &G::Position, depth: usize, mut alpha: f64, mut beta: f64) -> f64 {
        self.nodes += 1;

        let decider = match self.game.decider(position) {
            Some(decider) if depth > 0 => decider,
            _ => return self.game.evaluate(position, self.perspective),
        };

        let moves = self.game.moves(position);
        if moves.is_empty() {
            return self.game.evaluate(position, self.perspective);
        }

        let maximizing = decider == self.perspective;
        let mut best = if maximizing { f64::NEG_INFINITY } else { f64::INFINITY };
        for mv in moves {
            let outcome = match self.game.apply(position, &mv) {
                Some(outcome) => outcome,
                None => continue,
            };
            let value = self.outcome_value(outcome, depth - 1, alpha, beta);
            if maximizing {
                best = best.max(value);
                alpha = alpha.max(best);
            } else {
                best = best.min(value);
                beta = beta.min(best);
            }
            if alpha >= beta {
                break;
            }
        }

        if best.is_finite() {
            best
        } else {
            self.game.evaluate(position, self.perspective)
        }
    }
}

/// A decision point: the snapshot, who is on move, and who is still in.
#[derive(Clone, Debug)]
pub struct Position {
    pub state: GameState,
    pub to_move: Option<usize>,
    pub living: Vec<usize>,
}

impl Position {
    /// The root position for the player the snapshot belongs to. `to_move` is `None` when
    /// that player has nothing to decide.
    pub fn for_snapshot(state: GameState) -> Self {
        let own = state.own_index;
        let to_move = if enumerate_moves(&state, own).is_empty() { None } else { Some(own) };
        let living = state.living();
        Position { state, to_move, living }
    }

    fn after(previous: &Phase, state: GameState) -> Self {
        let to_move = next_decider(previous, &state);
        let living = state.living();
        Position { state, to_move, living }
    }
}

/// Who decides next once the game moved from `previous` into `state.phase`.
pub fn next_decider(previous: &Phase, state: &GameState) -> Option<usize> {
    let fresh = !previous.same_kind(&state.phase);

    match &state.phase {
        Phase::TurnStart { player } => Some(*player),
        Phase::ActionResponse { player, target, .. } => {
            if fresh {
                if let Some(target) = target.filter(|&target| is_responder(state, target)) {
                    return Some(target);
                }
            }
            first_responder(state, *player)
        }
        Phase::BlockResponse { player, .. } => {
            if fresh && is_responder(state, *player) {
                return Some(*player);
            }
            first_responder(state, *player)
        }
        Phase::FinalActionResponse { target, .. } => *target,
        Phase::Exchange { player, .. } => Some(*player),
        Phase::RevealInfluence { reveal, .. } => Some(*reveal),
        Phase::GameWon { .. } => None,
    }
}

// first player in turn order after the actor who has not allowed yet
fn first_responder(state: &GameState, actor: usize) -> Option<usize> {
    let n = state.players.len();
    (1..=n)
        .map(|k| (actor + k) % n)
        .find(|&player| is_responder(state, player))
}

/// The game as seen from one player's seat.
pub struct CoupSearch {
    pub searcher: usize,
    pub weights: EvalWeights,
}

impl Game for CoupSearch {
    type Position = Position;
    type Move = Move;

    fn decider(&self, position: &Position) -> Option<usize> {
        match position.state.phase {
            Phase::GameWon { .. } => None,
            _ => position.to_move,
        }
    }

    fn moves(&self, position: &Position) -> Vec<Move> {
        match position.to_move {
            Some(player) => enumerate_moves(&position.state, player),
            None => vec![],
        }
    }

    fn apply(&self, position: &Position, mv: &Move) -> Option<Outcome<Position>> {
        let player = position.to_move?;
        let state = &position.state;
        let previous = &state.phase;

        match mv {
            Move::Command(Command::Challenge) => {
                let branches = project_challenge(state, player, self.searcher).ok()?;
                Some(Outcome::Chance(
                    branches
                        .into_iter()
                        .map(|branch| (branch.likelihood_ai, Position::after(previous, branch.state)))
                        .collect(),
                ))
            }
            Move::RevealHidden => {
                let next = apply_reveal(state, player, None, &mut Unseen).ok()?;
                Some(Outcome::Single(Position::after(previous, next)))
            }
            Move::Command(command) => {
                let next = apply(state, player, command, &mut Unseen).ok()?;
                Some(Outcome::Single(Position::after(previous, next)))
            }
        }
    }

    fn evaluate(&self, position: &Position, perspective: usize) -> f64 {
        let state = &position.state;
        if !state.is_alive(perspective) {
            return -WIN_SCORE;
        }
        let opponents = state.other_player_indexes(perspective);
        if opponents.is_empty() {
            return WIN_SCORE;
        }

        let weights = &self.weights;
        let count = opponents.len() as f64;
        let own = &state.players[perspective];
        let opponent_influence: usize = opponents.iter().map(|&idx| state.influence_count(idx)).sum();
        let opponent_cash: u32 = opponents.iter().map(|&idx| state.players[idx].cash).sum();

        weights.influence * own.influence_count() as f64
            - weights.opponent_influence * opponent_influence as f64 / count
            + weights.cash * own.cash.min(10) as f64
            - weights.opponent_cash * opponent_cash as f64 / count
            - weights.opponents * count
    }
}

/// The search-based decision maker for one seat.
pub struct SearchEngine<R: Rng> {
    config: SearchConfig,
    rng: R,
}

impl<R: Rng> SearchEngine<R> {
    pub fn new(config: SearchConfig, rng: R) -> Self {
        SearchEngine { config, rng }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The command to play at `position`, or `None` when the controlled player has no
    /// decision pending.
    pub fn compute_best_move(&mut self, position: &Position) -> Option<Command> {
        let searcher = position.to_move?;
        if searcher != position.state.own_index {
            return None;
        }

        let game = CoupSearch {
            searcher,
            weights: self.config.weights,
        };
        let mut search = Searcher::new(&game, searcher);
        let (mv, value) = search.best_move(position, self.config.depth, &mut self.rng)?;
        debug!(
            player = searcher,
            phase = position.state.phase_name(),
            choice = ?mv,
            value,
            nodes = search.nodes,
            "search decided"
        );
        mv.into_command()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use crate::action::{ActionKind, Command};
    use crate::config::{EvalWeights, SearchConfig};
    use crate::moves::Move;
    use crate::rules::{apply, Unseen};
    use crate::search::{next_decider, CoupSearch, Game, Outcome, Position, SearchEngine, WIN_SCORE};
    use crate::state::tests::table;
    use crate::state::Phase;
    use crate::Role::{Ambassador, Assassin, Captain, Contessa, Duke};

    fn engine(depth: usize) -> SearchEngine<Pcg64> {
        SearchEngine::new(SearchConfig { depth, ..SearchConfig::default() }, Pcg64::seed_from_u64(3))
    }

    #[test]
    fn target_responds_first_to_a_fresh_action() {
        let state = table(vec![vec![Captain, Duke], vec![Duke, Duke], vec![Ambassador, Duke]]);
        let previous = state.phase.clone();
        let state = apply(&state, 0, &Command::play_at(ActionKind::Steal, 2), &mut Unseen).unwrap();
        assert_eq!(next_decider(&previous, &state), Some(2));

        // once inside the phase, responders go in turn order
        let previous = state.phase.clone();
        let state = apply(&state, 2, &Command::Allow, &mut Unseen).unwrap();
        assert_eq!(next_decider(&previous, &state), Some(1));
    }

    #[test]
    fn actor_answers_a_fresh_block_first() {
        let state = table(vec![vec![Captain, Duke], vec![Duke, Duke], vec![Ambassador, Duke], vec![Duke, Duke]]);
        let state = apply(&state, 0, &Command::play_at(ActionKind::Steal, 2), &mut Unseen).unwrap();
        let previous = state.phase.clone();
        let state = apply(&state, 2, &Command::Block { role: Ambassador }, &mut Unseen).unwrap();
        assert_eq!(next_decider(&previous, &state), Some(0));

        let previous = state.phase.clone();
        let state = apply(&state, 0, &Command::Allow, &mut Unseen).unwrap();
        assert_eq!(next_decider(&previous, &state), Some(1));
    }

    #[test]
    fn reveal_exchange_and_final_response_attribution() {
        let mut state = table(vec![vec![Assassin, Duke], vec![Duke, Duke]]);
        state.players[0].cash = 3;
        let state = apply(&state, 0, &Command::play_at(ActionKind::Assassinate, 1), &mut Unseen).unwrap();
        let state = apply(&state, 1, &Command::Challenge, &mut Unseen).unwrap();
        assert_eq!(next_decider(&Phase::TurnStart { player: 0 }, &state), Some(1));

        let previous = state.phase.clone();
        let state = apply(&state, 1, &Command::Reveal { role: Duke }, &mut Unseen).unwrap();
        assert!(matches!(state.phase, Phase::FinalActionResponse { .. }));
        assert_eq!(next_decider(&previous, &state), Some(1));

        let won = Phase::GameWon { player: 0 };
        let mut over = state.clone();
        over.phase = won;
        assert_eq!(next_decider(&previous, &over), None);
    }

    #[test]
    fn challenge_is_a_chance_node() {
        let state = table(vec![vec![Captain, Contessa], vec![Duke, Duke]]).perspective(1);
        let state = apply(&state, 0, &Command::play(ActionKind::Tax), &mut Unseen).unwrap();
        let position = Position::for_snapshot(state);
        assert_eq!(position.to_move, Some(1));

        let game = CoupSearch { searcher: 1, weights: EvalWeights::default() };
        match game.apply(&position, &Move::Command(Command::Challenge)) {
            Some(Outcome::Chance(branches)) => {
                assert_eq!(branches.len(), 2);
                let total: f64 = branches.iter().map(|(weight, _)| weight).sum();
                assert!((total - 1.0).abs() < 1e-9);
                assert_eq!(branches[0].1.to_move, Some(0));
                assert_eq!(branches[1].1.to_move, Some(1));
            }
            _ => panic!("challenge should branch"),
        }
    }

    #[test]
    fn no_decision_means_no_command() {
        let state = table(vec![vec![Captain, Contessa], vec![Duke, Duke]]).perspective(1);
        let position = Position::for_snapshot(state);
        assert_eq!(position.to_move, None);
        assert_eq!(engine(3).compute_best_move(&position), None);
    }

    #[test]
    fn finishes_a_one_card_opponent() {
        let mut state = table(vec![vec![Captain, Contessa], vec![Duke, Duke]]);
        state.players[0].cash = 7;
        state.players[1].influence[0].revealed = true;
        let state = state.perspective(0);

        let command = engine(2).compute_best_move(&Position::for_snapshot(state));
        assert_eq!(command, Some(Command::play_at(ActionKind::Coup, 1)));
    }

    #[test]
    fn always_challenges_a_lethal_last_card_bluff() {
        // p1 holds one card and is assassinated; p0's claim is all that stands in the way
        let mut state = table(vec![vec![Captain, Duke], vec![Duke, Duke]]);
        state.players[0].cash = 3;
        state.players[1].influence[0].revealed = true;
        let state = apply(&state, 0, &Command::play_at(ActionKind::Assassinate, 1), &mut Unseen).unwrap();
        let view = state.perspective(1);
        let position = Position::for_snapshot(view);

        let command = engine(3).compute_best_move(&position);
        assert!(matches!(command, Some(Command::Challenge) | Some(Command::Block { .. })));
        assert_ne!(command, Some(Command::Allow));
    }

    #[test]
    fn terminal_scores() {
        let game = CoupSearch { searcher: 0, weights: EvalWeights::default() };
        let mut state = table(vec![vec![Captain, Contessa], vec![Duke, Duke]]);
        state.players[1].influence.iter_mut().for_each(|card| card.revealed = true);
        let position = Position::for_snapshot(state.clone());
        assert_eq!(game.evaluate(&position, 0), WIN_SCORE);
        assert_eq!(game.evaluate(&position, 1), -WIN_SCORE);
    }
}

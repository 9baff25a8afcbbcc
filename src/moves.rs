use crate::action::{ActionKind, Command};
use crate::rules::{can_block, is_responder};
use crate::state::{GameState, Phase};
use crate::Role;

/// A choice available to a player in the search. Other players' hidden cards can only be
/// given up as `RevealHidden`, since the searcher cannot name them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    Command(Command),
    RevealHidden,
}

impl Move {
    pub fn command(&self) -> Option<&Command> {
        match self {
            Move::Command(command) => Some(command),
            Move::RevealHidden => None,
        }
    }

    pub fn into_command(self) -> Option<Command> {
        match self {
            Move::Command(command) => Some(command),
            Move::RevealHidden => None,
        }
    }
}

impl From<Command> for Move {
    fn from(command: Command) -> Self {
        Move::Command(command)
    }
}

/// Every move `player` may legally make in the current phase.
pub fn enumerate_moves(state: &GameState, player: usize) -> Vec<Move> {
    let mut moves = Vec::with_capacity(state.players.len() * 3);

    match &state.phase {
        Phase::TurnStart { player: actor } => {
            if *actor == player {
                turn_moves(state, player, &mut moves);
            }
        }
        Phase::ActionResponse { player: actor, action, target, .. } => {
            if is_responder(state, player) {
                block_moves(state, player, *action, *actor, *target, &mut moves);
                moves.push(Command::Allow.into());
                if action.claimed_role(state.settings.exchange_role).is_some() {
                    moves.push(Command::Challenge.into());
                }
            }
        }
        Phase::FinalActionResponse { player: actor, action, target } => {
            if is_responder(state, player) {
                block_moves(state, player, *action, *actor, *target, &mut moves);
                // no blocking role applies, so letting the action through is the only move
                if moves.is_empty() {
                    moves.push(Command::Allow.into());
                }
            }
        }
        Phase::BlockResponse { .. } => {
            if is_responder(state, player) {
                moves.push(Command::Allow.into());
                moves.push(Command::Challenge.into());
            }
        }
        Phase::RevealInfluence { reveal, .. } => {
            if *reveal == player {
                let mut roles: Vec<Role> = state.players[player].live_roles().collect();
                roles.sort();
                roles.dedup();
                moves.extend(roles.into_iter().map(|role| Move::Command(Command::Reveal { role })));

                let hidden = state.players[player]
                    .influence
                    .iter()
                    .any(|card| !card.revealed && card.role.is_none());
                if hidden {
                    moves.push(Move::RevealHidden);
                }
            }
        }
        Phase::Exchange { player: actor, options } => {
            if *actor == player {
                let keep = state.influence_count(player);
                moves.extend(
                    exchange_choices(options, keep)
                        .into_iter()
                        .map(|roles| Move::Command(Command::Exchange { roles })),
                );
            }
        }
        Phase::GameWon { .. } => {}
    }

    moves
}

fn turn_moves(state: &GameState, player: usize, moves: &mut Vec<Move>) {
    let cash = state.players[player].cash;
    let targets: Vec<usize> = state
        .other_player_indexes(player)
        .into_iter()
        .filter(|&target| state.can_target(player, target))
        .collect();

    if cash >= 10 {
        // forced coup at $10+
        for &target in &targets {
            moves.push(Command::play_at(ActionKind::Coup, target).into());
        }
        return;
    }

    moves.push(Command::play(ActionKind::Income).into());
    moves.push(Command::play(ActionKind::ForeignAid).into());
    moves.push(Command::play(ActionKind::Tax).into());
    moves.push(Command::play(ActionKind::Exchange).into());

    for &target in &targets {
        moves.push(Command::play_at(ActionKind::Steal, target).into());
        if cash >= ActionKind::Assassinate.cost() {
            moves.push(Command::play_at(ActionKind::Assassinate, target).into());
        }
        if cash >= ActionKind::Coup.cost() {
            moves.push(Command::play_at(ActionKind::Coup, target).into());
        }
        if state.settings.exchange_role == Role::Inquisitor {
            moves.push(Command::play_at(ActionKind::Interrogate, target).into());
        }
    }

    if state.settings.is_reformation() {
        moves.push(Command::play(ActionKind::Embezzle).into());
        if cash >= ActionKind::ChangeTeam.cost() {
            moves.push(Command::play(ActionKind::ChangeTeam).into());
        }
        if cash >= ActionKind::Convert.cost() {
            for target in state.other_player_indexes(player) {
                moves.push(Command::play_at(ActionKind::Convert, target).into());
            }
        }
    }
}

fn block_moves(state: &GameState, player: usize, action: ActionKind, actor: usize, target: Option<usize>, moves: &mut Vec<Move>) {
    for role in action.blocked_by(state.settings.exchange_role) {
        if can_block(state, player, action, actor, target, role) {
            moves.push(Command::Block { role }.into());
        }
    }
}

/// Distinct hands of `keep` cards that can be kept out of `options`.
pub fn exchange_choices(options: &[Role], keep: usize) -> Vec<Vec<Role>> {
    let mut choices: Vec<Vec<Role>> = Vec::new();
    let mut seen: Vec<Vec<Role>> = Vec::new();
    let mut picked = Vec::with_capacity(keep);
    collect_choices(options, keep, 0, &mut picked, &mut |choice: &[Role]| {
        let mut key = choice.to_vec();
        key.sort();
        if !seen.contains(&key) {
            seen.push(key);
            choices.push(choice.to_vec());
        }
    });
    choices
}

fn collect_choices(options: &[Role], keep: usize, start: usize, picked: &mut Vec<usize>, emit: &mut dyn FnMut(&[Role])) {
    if picked.len() == keep {
        let roles: Vec<Role> = picked.iter().map(|&idx| options[idx]).collect();
        emit(&roles);
        return;
    }
    for idx in start..options.len() {
        picked.push(idx);
        collect_choices(options, keep, idx + 1, picked, emit);
        picked.pop();
    }
}

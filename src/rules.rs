// forward model of the phase machine, used by the search and by the local table

use std::fmt::Display;
use rand::seq::SliceRandom;
use rand::Rng;
use crate::action::{ActionKind, Command};
use crate::error::RulesError;
use crate::state::{GameState, Influence, Phase, RevealReason};
use crate::Role;

/// Where replacement cards come from.
pub trait CardSource {
    /// `None` means a card nobody at this perspective can see.
    fn draw(&mut self) -> Option<Role>;

    fn return_card(&mut self, role: Option<Role>);
}

/// Card source for perspective states: every draw is an unknown card.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unseen;

impl CardSource for Unseen {
    fn draw(&mut self) -> Option<Role> {
        None
    }

    fn return_card(&mut self, _role: Option<Role>) {}
}

/// The court deck.
#[derive(Clone, Debug)]
pub struct Deck<R: Rng> {
    cards: Vec<Role>,
    rng: R,
}

impl<R: Rng> Deck<R> {
    pub fn new(roles: &[Role], copies_per_role: usize, mut rng: R) -> Self {
        let mut cards: Vec<Role> = roles.iter()
            .flat_map(|&card| std::iter::repeat(card).take(copies_per_role))
            .collect();
        cards.shuffle(&mut rng);
        Deck { cards, rng }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Role] {
        &self.cards
    }
}

impl<R: Rng> CardSource for Deck<R> {
    fn draw(&mut self) -> Option<Role> {
        if self.cards.is_empty() {
            None
        } else {
            Some(self.cards.remove(0))
        }
    }

    fn return_card(&mut self, role: Option<Role>) {
        if let Some(role) = role {
            self.cards.push(role);
            self.cards.shuffle(&mut self.rng);
        }
    }
}

/// Whether `player` may still respond to the pending action or block.
pub fn is_responder(state: &GameState, player: usize) -> bool {
    match &state.phase {
        Phase::ActionResponse { player: actor, allowed, .. } => {
            player != *actor && state.is_alive(player) && !allowed[player]
        }
        Phase::BlockResponse { blocker, allowed, .. } => {
            player != *blocker && state.is_alive(player) && !allowed[player]
        }
        Phase::FinalActionResponse { target, .. } => *target == Some(player),
        _ => false,
    }
}

/// Whether `player` may claim `role` to block the pending action.
pub fn can_block(state: &GameState, player: usize, action: ActionKind, actor: usize, target: Option<usize>, role: Role) -> bool {
    if player == actor || !action.blocked_by(state.settings.exchange_role).contains(&role) {
        return false;
    }
    match target {
        Some(target) => target == player,
        // foreign aid: anyone, but not for a teammate in the variant
        None => !state.same_team(player, actor) || state.teams_merged(),
    }
}

/// Whether the claim behind `role` holds for the cards this state can see. Unknown
/// cards count as not being the role.
pub fn claim_is_true(state: &GameState, player: usize, role: Role, absence: bool) -> bool {
    let holds = state.players[player].holds(role);
    if absence {
        !holds
    } else {
        holds
    }
}

/// The claim being contested by a challenge in the current phase: (claimant, role, absence).
pub fn contested_claim(state: &GameState) -> Option<(usize, Role, bool)> {
    match &state.phase {
        Phase::ActionResponse { player, action, .. } => action
            .claimed_role(state.settings.exchange_role)
            .map(|role| (*player, role, action.claims_absence())),
        Phase::BlockResponse { blocker, role, .. } => Some((*blocker, *role, false)),
        _ => None,
    }
}

pub fn check_action(state: &GameState, actor: usize, action: ActionKind, target: Option<usize>) -> Result<(), RulesError> {
    let player = &state.players[actor];
    if player.cash < action.cost() {
        return Err(RulesError::CannotAfford { player: actor, action });
    }
    // forced coup at $10+
    if player.cash >= 10 && action != ActionKind::Coup {
        return Err(illegal(state, actor, &Command::PlayAction { action, target }));
    }

    let variant_only = matches!(action, ActionKind::ChangeTeam | ActionKind::Convert | ActionKind::Embezzle);
    if variant_only && !state.settings.is_reformation() {
        return Err(illegal(state, actor, &Command::PlayAction { action, target }));
    }
    if action == ActionKind::Interrogate && state.settings.exchange_role != Role::Inquisitor {
        return Err(illegal(state, actor, &Command::PlayAction { action, target }));
    }

    match (action.is_targeted(), target) {
        (false, None) => Ok(()),
        (false, Some(_)) => Err(RulesError::InvalidTarget { action }),
        (true, None) => Err(RulesError::InvalidTarget { action }),
        (true, Some(target)) => {
            let valid = if action == ActionKind::Convert {
                target != actor && state.is_alive(target)
            } else {
                target < state.players.len() && state.can_target(actor, target)
            };
            if valid {
                Ok(())
            } else {
                Err(RulesError::InvalidTarget { action })
            }
        }
    }
}

pub fn apply<S: CardSource>(state: &GameState, player: usize, command: &Command, source: &mut S) -> Result<GameState, RulesError> {
    match command {
        Command::Reveal { role } => apply_reveal(state, player, Some(*role), source),
        Command::Challenge => {
            let (claimant, role, absence) = contested_claim(state).ok_or_else(|| illegal(state, player, command))?;
            let succeeded = !claim_is_true(state, claimant, role, absence);
            resolve_challenge(state, player, succeeded, source)
        }
        _ => apply_decision(state, player, command, source),
    }
}

fn apply_decision<S: CardSource>(state: &GameState, player: usize, command: &Command, source: &mut S) -> Result<GameState, RulesError> {
    let mut game = state.clone();
    game.version += 1;

    match (&state.phase, command) {
        (Phase::GameWon { .. }, _) => return Err(RulesError::GameOver),
        (Phase::TurnStart { player: actor }, Command::PlayAction { action, target }) if *actor == player => {
            check_action(state, player, *action, *target)?;
            play_action(&mut game, player, *action, *target);
        }
        (Phase::ActionResponse { player: actor, action, target, .. }, Command::Allow) if is_responder(state, player) => {
            if mark_allowed(&mut game, player) {
                resolve_action(&mut game, *actor, *action, *target, source);
            }
        }
        (Phase::ActionResponse { player: actor, action, target, .. }, Command::Block { role })
        | (Phase::FinalActionResponse { player: actor, action, target }, Command::Block { role })
            if is_responder(state, player) && can_block(state, player, *action, *actor, *target, *role) =>
        {
            let allowed = (0..game.players.len())
                .map(|idx| idx == player || !game.is_alive(idx))
                .collect();
            game.phase = Phase::BlockResponse {
                player: *actor,
                action: *action,
                target: *target,
                blocker: player,
                role: *role,
                allowed,
            };
        }
        (Phase::FinalActionResponse { player: actor, action, target }, Command::Allow) if is_responder(state, player) => {
            resolve_action(&mut game, *actor, *action, *target, source);
        }
        (Phase::BlockResponse { player: actor, .. }, Command::Allow) if is_responder(state, player) => {
            if mark_allowed(&mut game, player) {
                // the block stands
                end_turn(&mut game, *actor);
            }
        }
        (Phase::Exchange { player: actor, options }, Command::Exchange { roles }) if *actor == player => {
            let mut remaining = options.clone();
            for role in roles {
                match remaining.iter().position(|option| option == role) {
                    Some(idx) => {
                        remaining.remove(idx);
                    }
                    None => return Err(illegal(state, player, command)),
                }
            }
            if roles.len() != state.influence_count(player) {
                return Err(illegal(state, player, command));
            }
            let mut kept = roles.iter();
            for card in game.players[player].influence.iter_mut().filter(|card| !card.revealed) {
                card.role = kept.next().copied();
            }
            for role in remaining {
                source.return_card(Some(role));
            }
            end_turn(&mut game, player);
        }
        _ => return Err(illegal(state, player, command)),
    }

    Ok(game)
}

/// Reveals one of `player`'s cards. `None` reveals a card this perspective cannot see.
pub fn apply_reveal<S: CardSource>(state: &GameState, player: usize, role: Option<Role>, source: &mut S) -> Result<GameState, RulesError> {
    let (actor, action, target, reason) = match &state.phase {
        Phase::RevealInfluence { player: actor, action, target, reveal, reason } if *reveal == player => {
            (*actor, *action, *target, *reason)
        }
        _ => {
            return Err(illegal(state, player, reveal_label(role)));
        }
    };

    let mut game = state.clone();
    game.version += 1;

    let card_idx = game.players[player]
        .influence
        .iter()
        .position(|card| !card.revealed && card.role == role)
        .ok_or_else(|| illegal(state, player, reveal_label(role)))?;
    // 'losing' an influence means the card is flipped up and no longer counts
    game.players[player].influence[card_idx].revealed = true;

    if let Some(winner) = game.winner() {
        game.phase = Phase::GameWon { player: winner };
        return Ok(game);
    }

    match reason {
        RevealReason::Coup
        | RevealReason::Assassinate
        | RevealReason::FailedClaim
        | RevealReason::IncorrectBlockChallenge => end_turn(&mut game, actor),
        RevealReason::IncorrectChallenge => {
            let target_can_block = action.is_targeted()
                && action.is_blockable()
                && target.map_or(false, |target| game.is_alive(target));
            if target_can_block {
                game.phase = Phase::FinalActionResponse { player: actor, action, target };
            } else {
                resolve_action(&mut game, actor, action, target, source);
            }
        }
        RevealReason::FailedBlock => resolve_action(&mut game, actor, action, target, source),
    }

    Ok(game)
}

/// Settles a challenge on the pending claim with a known outcome. `succeeded` means the
/// claim was false.
pub fn resolve_challenge<S: CardSource>(state: &GameState, challenger: usize, succeeded: bool, source: &mut S) -> Result<GameState, RulesError> {
    if !is_responder(state, challenger) {
        return Err(illegal(state, challenger, &Command::Challenge));
    }

    let mut game = state.clone();
    game.version += 1;

    match &state.phase {
        Phase::ActionResponse { player: actor, action, target, .. } => {
            let role = action
                .claimed_role(state.settings.exchange_role)
                .ok_or_else(|| illegal(state, challenger, &Command::Challenge))?;
            let (reveal, reason) = if succeeded {
                (*actor, RevealReason::FailedClaim)
            } else {
                if !action.claims_absence() {
                    replace_proven_card(&mut game, *actor, role, source);
                }
                (challenger, RevealReason::IncorrectChallenge)
            };
            game.phase = Phase::RevealInfluence { player: *actor, action: *action, target: *target, reveal, reason };
        }
        Phase::BlockResponse { player: actor, action, target, blocker, role, .. } => {
            let (reveal, reason) = if succeeded {
                (*blocker, RevealReason::FailedBlock)
            } else {
                replace_proven_card(&mut game, *blocker, *role, source);
                (challenger, RevealReason::IncorrectBlockChallenge)
            };
            game.phase = Phase::RevealInfluence { player: *actor, action: *action, target: *target, reveal, reason };
        }
        _ => return Err(illegal(state, challenger, &Command::Challenge)),
    }

    Ok(game)
}

fn play_action(game: &mut GameState, actor: usize, action: ActionKind, target: Option<usize>) {
    let cost = action.cost();
    game.players[actor].cash -= cost;

    match action {
        ActionKind::Income => {
            game.players[actor].cash += 1;
            end_turn(game, actor);
        }
        ActionKind::ChangeTeam => {
            game.treasury += cost;
            game.players[actor].team = game.players[actor].team.map(|team| team.flipped());
            end_turn(game, actor);
        }
        ActionKind::Convert => {
            game.treasury += cost;
            if let Some(target) = target {
                game.players[target].team = game.players[target].team.map(|team| team.flipped());
            }
            end_turn(game, actor);
        }
        ActionKind::Coup => {
            if let Some(target) = target {
                game.phase = Phase::RevealInfluence {
                    player: actor,
                    action,
                    target: Some(target),
                    reveal: target,
                    reason: RevealReason::Coup,
                };
            }
        }
        _ => {
            let allowed = (0..game.players.len())
                .map(|idx| idx == actor || !game.is_alive(idx))
                .collect();
            game.phase = Phase::ActionResponse { player: actor, action, target, allowed };
        }
    }
}

fn resolve_action<S: CardSource>(game: &mut GameState, actor: usize, action: ActionKind, target: Option<usize>, source: &mut S) {
    match action {
        ActionKind::ForeignAid => {
            game.players[actor].cash += 2;
            end_turn(game, actor);
        }
        ActionKind::Tax => {
            game.players[actor].cash += 3;
            end_turn(game, actor);
        }
        ActionKind::Steal => {
            if let Some(target) = target {
                let n = game.players[target].cash.min(2);
                game.players[target].cash -= n;
                game.players[actor].cash += n;
            }
            end_turn(game, actor);
        }
        ActionKind::Embezzle => {
            game.players[actor].cash += game.treasury;
            game.treasury = 0;
            end_turn(game, actor);
        }
        ActionKind::Assassinate => match target {
            // target could already be dead from losing a challenge
            Some(target) if game.is_alive(target) => {
                game.phase = Phase::RevealInfluence {
                    player: actor,
                    action,
                    target: Some(target),
                    reveal: target,
                    reason: RevealReason::Assassinate,
                };
            }
            _ => end_turn(game, actor),
        },
        ActionKind::Exchange => begin_exchange(game, actor, source),
        _ => end_turn(game, actor),
    }
}

fn begin_exchange<S: CardSource>(game: &mut GameState, actor: usize, source: &mut S) {
    let drawn: Vec<Option<Role>> = (0..game.settings.exchange_draws()).map(|_| source.draw()).collect();
    let live: Vec<Option<Role>> = game.players[actor]
        .influence
        .iter()
        .filter(|card| !card.revealed)
        .map(|card| card.role)
        .collect();

    let options: Option<Vec<Role>> = live.iter().chain(drawn.iter()).copied().collect();
    match options {
        Some(options) => {
            // the live cards are handed back through the exchange command
            game.phase = Phase::Exchange { player: actor, options };
        }
        None => {
            // nothing to choose between: keep the hand
            for role in drawn {
                source.return_card(role);
            }
            end_turn(game, actor);
        }
    }
}

fn replace_proven_card<S: CardSource>(game: &mut GameState, player: usize, role: Role, source: &mut S) {
    let influence = &mut game.players[player].influence;
    let card_idx = influence
        .iter()
        .position(|card| !card.revealed && card.role == Some(role))
        .or_else(|| influence.iter().position(|card| !card.revealed && card.role.is_none()));

    if let Some(card_idx) = card_idx {
        source.return_card(Some(role));
        influence[card_idx] = Influence { role: source.draw(), revealed: false };
    }
}

// returns true once everyone who could respond has allowed
fn mark_allowed(game: &mut GameState, player: usize) -> bool {
    match &mut game.phase {
        Phase::ActionResponse { allowed, .. } | Phase::BlockResponse { allowed, .. } => {
            allowed[player] = true;
            allowed.iter().all(|&allowed| allowed)
        }
        _ => false,
    }
}

fn end_turn(game: &mut GameState, actor: usize) {
    game.phase = match game.winner() {
        Some(winner) => Phase::GameWon { player: winner },
        None => Phase::TurnStart { player: game.next_living_player(actor) },
    };
}

fn reveal_label(role: Option<Role>) -> String {
    match role {
        Some(role) => format!("reveal {}", role.name()),
        None => "reveal a hidden card".to_string(),
    }
}

fn illegal(state: &GameState, player: usize, command: impl Display) -> RulesError {
    RulesError::IllegalCommand {
        player,
        command: command.to_string(),
        phase: state.phase.name(),
    }
}

use crate::error::RulesError;
use crate::rules::{claim_is_true, contested_claim, resolve_challenge, Unseen};
use crate::state::GameState;
use crate::Role;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// the claim was a bluff
    Succeeded,
    /// the claim was true
    Failed,
}

/// One of the two worlds a challenge can lead to.
#[derive(Clone, Debug)]
pub struct Branch {
    pub outcome: ChallengeOutcome,
    /// base rate from public information
    pub likelihood: f64,
    /// the same, from the searching player's point of view; certain when it is the one
    /// being challenged
    pub likelihood_ai: f64,
    pub state: GameState,
}

/// Base rate of the "challenge succeeds" branch for a claimant holding `cards`
/// unrevealed cards out of a deck with `roles` distinct roles.
pub fn success_likelihood(cards: usize, roles: usize) -> f64 {
    if roles == 0 {
        return 0.0;
    }
    1.0 - (1.0 - 1.0 / roles as f64).powi(cards as i32)
}

/// Splits a challenge by `challenger` on the pending claim into its two branches.
pub fn project_challenge(state: &GameState, challenger: usize, searcher: usize) -> Result<[Branch; 2], RulesError> {
    let (claimant, role, absence) = contested_claim(state).ok_or(RulesError::IllegalCommand {
        player: challenger,
        command: "challenge".to_string(),
        phase: state.phase.name(),
    })?;

    let cards = state.influence_count(claimant);
    let likelihood = success_likelihood(cards, state.settings.roles_in_play().len());
    let likelihood_ai = if claimant == searcher {
        if claim_is_true(state, claimant, role, absence) {
            0.0
        } else {
            1.0
        }
    } else {
        likelihood
    };

    let caught = resolve_challenge(&with_claim(state, claimant, role, absence, false), challenger, true, &mut Unseen)?;
    let proven = resolve_challenge(&with_claim(state, claimant, role, absence, true), challenger, false, &mut Unseen)?;

    Ok([
        Branch {
            outcome: ChallengeOutcome::Succeeded,
            likelihood,
            likelihood_ai,
            state: caught,
        },
        Branch {
            outcome: ChallengeOutcome::Failed,
            likelihood: 1.0 - likelihood,
            likelihood_ai: 1.0 - likelihood_ai,
            state: proven,
        },
    ])
}

// copy of the state where the claimant's hand agrees with the claim being `true` or not
fn with_claim(state: &GameState, claimant: usize, role: Role, absence: bool, truth: bool) -> GameState {
    let mut world = state.clone();
    let influence = &mut world.players[claimant].influence;
    // whether the claimant must end up holding the role
    let hold = truth != absence;

    if hold {
        if !influence.iter().any(|card| !card.revealed && card.role == Some(role)) {
            let slot = influence
                .iter()
                .position(|card| !card.revealed && card.role.is_none())
                .or_else(|| influence.iter().position(|card| !card.revealed));
            if let Some(slot) = slot {
                influence[slot].role = Some(role);
            }
        }
    } else {
        for card in influence.iter_mut().filter(|card| !card.revealed && card.role == Some(role)) {
            card.role = None;
        }
    }

    world
}

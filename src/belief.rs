use std::collections::{HashMap, HashSet};
use crate::history::HistoryEvent;
use crate::state::{GameState, Phase};
use crate::Role;

/// A role asserted by a player and not yet disproven.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Claim {
    pub player: usize,
    pub role: Role,
}

/// Per-player memory of claimed roles and roles a player was caught bluffing. Owned by one
/// player instance; both maps for a player are cleared together when that player's hand is
/// replaced.
#[derive(Clone, Debug, Default)]
pub struct BeliefTracker {
    claims: HashMap<usize, HashSet<Role>>,
    called_bluffs: HashMap<usize, HashSet<Role>>,
    last_claim: Option<Claim>,
}

impl BeliefTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows the claim currently on the table.
    pub fn observe_phase(&mut self, state: &GameState) {
        let exchange_role = state.settings.exchange_role;
        match &state.phase {
            Phase::ActionResponse { player, action, .. } | Phase::FinalActionResponse { player, action, .. } => {
                self.last_claim = match action.claimed_role(exchange_role) {
                    Some(role) if !action.claims_absence() => {
                        self.record_claim(*player, role);
                        Some(Claim { player: *player, role })
                    }
                    _ => None,
                };
            }
            Phase::BlockResponse { blocker, role, .. } => {
                self.record_claim(*blocker, *role);
                self.last_claim = Some(Claim { player: *blocker, role: *role });
            }
            // the reveal event refers back to the claim
            Phase::RevealInfluence { .. } => {}
            _ => self.last_claim = None,
        }
    }

    pub fn observe_event(&mut self, event: &HistoryEvent) {
        match event {
            HistoryEvent::Revealed { player, role } => self.remove_claim(*player, *role),
            HistoryEvent::Challenged { challenged, succeeded, .. } => {
                let claim = match self.last_claim {
                    Some(claim) if claim.player == *challenged => claim,
                    _ => return,
                };
                if *succeeded {
                    self.remove_claim(claim.player, claim.role);
                    self.called_bluffs.entry(claim.player).or_default().insert(claim.role);
                }
            }
            HistoryEvent::Exchanged { player } => self.reset_hand(*player),
            HistoryEvent::Interrogated { .. } | HistoryEvent::Other { .. } => {}
        }
    }

    pub fn record_claim(&mut self, player: usize, role: Role) {
        self.claims.entry(player).or_default().insert(role);
    }

    pub fn remove_claim(&mut self, player: usize, role: Role) {
        if let Some(claims) = self.claims.get_mut(&player) {
            claims.remove(&role);
        }
    }

    /// The player holds a fresh hand: nothing said about the old one applies.
    pub fn reset_hand(&mut self, player: usize) {
        self.claims.remove(&player);
        self.called_bluffs.remove(&player);
        if self.last_claim.map_or(false, |claim| claim.player == player) {
            self.last_claim = None;
        }
    }

    pub fn clear(&mut self) {
        self.claims.clear();
        self.called_bluffs.clear();
        self.last_claim = None;
    }

    pub fn last_claim(&self) -> Option<Claim> {
        self.last_claim
    }

    pub fn has_claimed(&self, player: usize, role: Role) -> bool {
        self.claims.get(&player).map_or(false, |claims| claims.contains(&role))
    }

    pub fn caught_bluffing(&self, player: usize, role: Role) -> bool {
        self.called_bluffs.get(&player).map_or(false, |bluffs| bluffs.contains(&role))
    }

    /// Roles `player` claims and has not been caught bluffing.
    pub fn credible_claims(&self, player: usize) -> HashSet<Role> {
        self.claims
            .get(&player)
            .map(|claims| {
                claims
                    .iter()
                    .copied()
                    .filter(|&role| !self.caught_bluffing(player, role))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn claims(&self, player: usize) -> impl Iterator<Item = Role> + '_ {
        self.claims.get(&player).into_iter().flatten().copied()
    }

    /// Players, other than `except`, currently claiming `role`.
    pub fn claimants(&self, role: Role, except: usize) -> usize {
        self.claims
            .iter()
            .filter(|(&player, claims)| player != except && claims.contains(&role))
            .count()
    }
}

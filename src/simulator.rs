// two-party rollout used to settle end-game challenges and bluffs

use std::collections::HashSet;
use crate::Role;

/// One side of a duel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Side {
    pub cash: u32,
    pub influence: usize,
    /// roles this side is assumed to hold: held cards for us, credible claims for them
    pub roles: HashSet<Role>,
}

impl Side {
    pub fn new(cash: u32, influence: usize, roles: impl IntoIterator<Item = Role>) -> Self {
        Side {
            cash,
            influence,
            roles: roles.into_iter().collect(),
        }
    }

    fn has(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    fn blocks_steal(&self, exchange_role: Role) -> bool {
        self.has(Role::Captain) || self.has(exchange_role)
    }
}

/// A simplified head-to-head: no foreign aid, no challenges, each side plays its best
/// economic move every turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Duel {
    pub me: Side,
    pub opponent: Side,
    pub opponent_first: bool,
    pub exchange_role: Role,
    /// turns simulated before calling it a draw
    pub horizon: usize,
}

impl Duel {
    /// +1 if the opponent runs out of influence first, -1 if we do, 0 if neither happens
    /// within the horizon.
    pub fn simulate(&self) -> i8 {
        let mut me = self.me.clone();
        let mut opponent = self.opponent.clone();
        if opponent.influence == 0 {
            return 1;
        }
        if me.influence == 0 {
            return -1;
        }

        let mut my_turn = !self.opponent_first;
        for _ in 0..self.horizon {
            if my_turn {
                take_turn(&mut me, &mut opponent, self.exchange_role);
                if opponent.influence == 0 {
                    return 1;
                }
            } else {
                take_turn(&mut opponent, &mut me, self.exchange_role);
                if me.influence == 0 {
                    return -1;
                }
            }
            my_turn = !my_turn;
        }
        0
    }
}

fn take_turn(actor: &mut Side, other: &mut Side, exchange_role: Role) {
    // forced coup at $10+
    if actor.cash >= 10 {
        actor.cash -= 7;
        other.influence -= 1;
    } else if actor.has(Role::Assassin) && actor.cash >= 3 && !other.has(Role::Contessa) {
        actor.cash -= 3;
        other.influence -= 1;
    } else if actor.cash >= 7 {
        actor.cash -= 7;
        other.influence -= 1;
    } else if actor.has(Role::Captain) && other.cash > 0 && !other.blocks_steal(exchange_role) {
        let n = other.cash.min(2);
        other.cash -= n;
        actor.cash += n;
    } else if actor.has(Role::Duke) {
        actor.cash += 3;
    } else {
        actor.cash += 1;
    }
}

use std::fmt::{Debug, Display, Formatter};
use serde::{Deserialize, Serialize};
use crate::Role;
use crate::Role::{Assassin, Captain, Contessa, Duke, Inquisitor};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Income,
    ForeignAid,
    Tax,
    Steal,
    Assassinate,
    Coup,
    Exchange,
    Interrogate,
    ChangeTeam,
    Convert,
    Embezzle,
}

pub static BASE_ACTIONS: [ActionKind; 7] = [
    ActionKind::Income,
    ActionKind::ForeignAid,
    ActionKind::Tax,
    ActionKind::Steal,
    ActionKind::Assassinate,
    ActionKind::Coup,
    ActionKind::Exchange,
];

impl ActionKind {
    pub fn cost(self) -> u32 {
        match self {
            ActionKind::Assassinate => 3,
            ActionKind::Coup => 7,
            ActionKind::ChangeTeam => 1,
            ActionKind::Convert => 2,
            _ => 0,
        }
    }

    pub fn is_targeted(self) -> bool {
        matches!(
            self,
            ActionKind::Steal | ActionKind::Assassinate | ActionKind::Coup | ActionKind::Interrogate | ActionKind::Convert
        )
    }

    /// The role a player asserts by declaring this action. Embezzle is the odd one out:
    /// it asserts the player does *not* hold the returned role.
    pub fn claimed_role(self, exchange_role: Role) -> Option<Role> {
        match self {
            ActionKind::Tax => Some(Duke),
            ActionKind::Steal => Some(Captain),
            ActionKind::Assassinate => Some(Assassin),
            ActionKind::Exchange => Some(exchange_role),
            ActionKind::Interrogate => Some(Inquisitor),
            ActionKind::Embezzle => Some(Duke),
            _ => None,
        }
    }

    pub fn claims_absence(self) -> bool {
        self == ActionKind::Embezzle
    }

    pub fn blocked_by(self, exchange_role: Role) -> Vec<Role> {
        match self {
            ActionKind::ForeignAid => vec![Duke],
            ActionKind::Steal => vec![Captain, exchange_role],
            ActionKind::Assassinate => vec![Contessa],
            _ => vec![],
        }
    }

    pub fn is_blockable(self) -> bool {
        matches!(self, ActionKind::ForeignAid | ActionKind::Steal | ActionKind::Assassinate)
    }

    /// Whether the action waits for responses instead of resolving on the spot.
    pub fn is_respondable(self) -> bool {
        self.is_blockable() || self.claimed_role(Role::Ambassador).is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Income => "income",
            ActionKind::ForeignAid => "foreign-aid",
            ActionKind::Tax => "tax",
            ActionKind::Steal => "steal",
            ActionKind::Assassinate => "assassinate",
            ActionKind::Coup => "coup",
            ActionKind::Exchange => "exchange",
            ActionKind::Interrogate => "interrogate",
            ActionKind::ChangeTeam => "change-team",
            ActionKind::Convert => "convert",
            ActionKind::Embezzle => "embezzle",
        }
    }
}

/// The only way a player influences the authoritative game.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    PlayAction {
        action: ActionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<usize>,
    },
    Block { role: Role },
    Allow,
    Challenge,
    Reveal { role: Role },
    Exchange { roles: Vec<Role> },
}

impl Command {
    pub fn play(action: ActionKind) -> Command {
        Command::PlayAction { action, target: None }
    }

    pub fn play_at(action: ActionKind, target: usize) -> Command {
        Command::PlayAction { action, target: Some(target) }
    }
}

impl Debug for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::PlayAction { action, target: Some(target) } => {
                f.write_fmt(format_args!("{} player {target}", action.name()))
            }
            Command::PlayAction { action, target: None } => {
                f.write_fmt(format_args!("{}", action.name()))
            }
            Command::Block { role } => {
                f.write_fmt(format_args!("block with {}", role.name()))
            }
            Command::Allow => {
                f.write_str("allow")
            }
            Command::Challenge => {
                f.write_str("challenge")
            }
            Command::Reveal { role } => {
                f.write_fmt(format_args!("reveal {}", role.name()))
            }
            Command::Exchange { roles } => {
                f.write_fmt(format_args!("keep {:?}", roles))
            }
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// A command tagged with the state version it was decided against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub version: u64,
    #[serde(flatten)]
    pub command: Command,
}

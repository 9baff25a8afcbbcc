use serde::{Deserialize, Serialize};
use crate::Role::{Ambassador, Assassin, Captain, Contessa, Duke, Inquisitor};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Duke,
    Captain,
    Assassin,
    Ambassador,
    Contessa,
    Inquisitor,
}

pub static ROLE_VARIANTS: [Role; 6] = [
    Duke,
    Captain,
    Assassin,
    Ambassador,
    Contessa,
    Inquisitor,
];

/// Order in which cards are kept when exchanging.
pub static EXCHANGE_PRIORITY: [Role; 6] = [
    Duke,
    Assassin,
    Captain,
    Inquisitor,
    Contessa,
    Ambassador,
];

impl Role {
    /// Relative chance of giving this card up when forced to reveal. Cards that are
    /// harder to replace get low weights.
    pub fn reveal_weight(self) -> u32 {
        match self {
            Duke => 3,
            Assassin => 4,
            Captain => 5,
            Contessa => 6,
            Inquisitor => 7,
            Ambassador => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Duke => "duke",
            Captain => "captain",
            Assassin => "assassin",
            Ambassador => "ambassador",
            Contessa => "contessa",
            Inquisitor => "inquisitor",
        }
    }

    pub fn from_name(name: &str) -> Option<Role> {
        ROLE_VARIANTS.iter().copied().find(|role| role.name() == name)
    }
}

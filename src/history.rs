// narrative history notifications, turned into typed events at the boundary

use crate::Role;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryEvent {
    Revealed {
        player: usize,
        role: Role,
    },
    Challenged {
        challenger: usize,
        challenged: usize,
        succeeded: bool,
    },
    /// the player drew a fresh hand
    Exchanged {
        player: usize,
    },
    Interrogated {
        interrogator: usize,
        target: usize,
    },
    Other {
        kind: String,
        group: Option<u64>,
    },
}

impl HistoryEvent {
    /// Parses a notification. Players are written as `{idx}` placeholders, e.g.
    /// `"{1} successfully challenged {0}"` or `"{0} revealed duke"`.
    pub fn parse(message: &str, kind: &str, group: Option<u64>) -> HistoryEvent {
        let players = placeholders(message);
        let other = || HistoryEvent::Other { kind: kind.to_string(), group };
        let text = message.to_ascii_lowercase();

        match (kind, players.as_slice()) {
            (_, [player, ..]) if kind == "reveal" || text.contains(" revealed ") => {
                match revealed_role(&text) {
                    Some(role) => HistoryEvent::Revealed { player: *player, role },
                    None => other(),
                }
            }
            (_, [challenger, challenged, ..]) if text.contains("challenged") => {
                let succeeded = kind == "challenge-success" || text.contains("successfully");
                HistoryEvent::Challenged {
                    challenger: *challenger,
                    challenged: *challenged,
                    succeeded,
                }
            }
            (_, [interrogator, target, ..]) if kind == "interrogate" || text.contains("interrogated") => {
                HistoryEvent::Interrogated {
                    interrogator: *interrogator,
                    target: *target,
                }
            }
            (_, [player, ..]) if kind == "exchange" || text.contains(" exchanged") => {
                HistoryEvent::Exchanged { player: *player }
            }
            _ => other(),
        }
    }

    /// Renders the event the way the local table announces it.
    pub fn message(&self) -> String {
        match self {
            HistoryEvent::Revealed { player, role } => format!("{{{player}}} revealed {}", role.name()),
            HistoryEvent::Challenged { challenger, challenged, succeeded: true } => {
                format!("{{{challenger}}} successfully challenged {{{challenged}}}")
            }
            HistoryEvent::Challenged { challenger, challenged, succeeded: false } => {
                format!("{{{challenger}}} incorrectly challenged {{{challenged}}}")
            }
            HistoryEvent::Exchanged { player } => format!("{{{player}}} exchanged cards"),
            HistoryEvent::Interrogated { interrogator, target } => {
                format!("{{{interrogator}}} interrogated {{{target}}}")
            }
            HistoryEvent::Other { kind, .. } => kind.clone(),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            HistoryEvent::Revealed { .. } => "reveal",
            HistoryEvent::Challenged { succeeded: true, .. } => "challenge-success",
            HistoryEvent::Challenged { succeeded: false, .. } => "challenge-fail",
            HistoryEvent::Exchanged { .. } => "exchange",
            HistoryEvent::Interrogated { .. } => "interrogate",
            HistoryEvent::Other { kind, .. } => kind,
        }
    }
}

fn placeholders(message: &str) -> Vec<usize> {
    let mut players = vec![];
    let mut rest = message;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                if let Ok(idx) = after[..close].trim().parse() {
                    players.push(idx);
                }
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    players
}

fn revealed_role(text: &str) -> Option<Role> {
    let (_, tail) = text.split_once("revealed")?;
    tail.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| !word.is_empty())
        .find_map(Role::from_name)
}

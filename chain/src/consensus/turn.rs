//! Turn phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a node stands in the rotation.
///
/// Exactly one peer should be `Leading` at any wall-clock instant in
/// steady state; everyone else is `Waiting`. `Transition` is the short
/// quiescent interval between consecutive turns during which no content
/// blocks are produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Waiting,
    Leading,
    Transition,
}

impl TurnPhase {
    /// Stable lowercase name, matching the wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::Waiting => "waiting",
            TurnPhase::Leading => "leading",
            TurnPhase::Transition => "transition",
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_are_stable() {
        assert_eq!(TurnPhase::Waiting.to_string(), "waiting");
        assert_eq!(TurnPhase::Leading.to_string(), "leading");
        assert_eq!(TurnPhase::Transition.to_string(), "transition");
        assert_eq!(
            serde_json::to_value(TurnPhase::Leading).expect("phase serializes"),
            serde_json::json!("leading")
        );
    }
}

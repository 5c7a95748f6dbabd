//! # Stage Catalog
//!
//! The six fixed stages of the escape room, presented in order.

use crate::primitives::STAGE_COUNT;
use crate::types::StageKind;

/// Static description of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDefinition {
    /// Stage number, 1-based.
    pub id: u8,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: StageKind,
    /// Progressive hints, least revealing first. Never empty.
    pub hints: &'static [&'static str],
}

/// The stage catalog in play order.
pub const STAGES: [StageDefinition; STAGE_COUNT] = [
    StageDefinition {
        id: 1,
        title: "Code Formatter",
        description: "A minified function guards the first door. Restore its spacing, indentation and line breaks.",
        kind: StageKind::CodeFormat,
        hints: &[
            "Keywords and identifiers need a space between them: `function calculateSum`.",
            "Put spaces around `=`, `+` and after every comma.",
            "Blocks open with ` {` on the same line and close with `}` on their own line.",
        ],
    },
    StageDefinition {
        id: 2,
        title: "Debug Hunt",
        description: "Four tools sit on the desk. Only one of them helps you find bugs.",
        kind: StageKind::DebugClick,
        hints: &[
            "Think about where `console.log` output appears.",
            "Browsers ship developer tools with a console.",
        ],
    },
    StageDefinition {
        id: 3,
        title: "Number Generator",
        description: "The keypad wants every integer from 0 to 1000, in order.",
        kind: StageKind::NumberGenerator,
        hints: &[
            "A for loop or `Array.from()` can build the sequence.",
            "Both ends are inclusive: 0 and 1000 must be present.",
            "The result has exactly 1001 elements.",
        ],
    },
    StageDefinition {
        id: 4,
        title: "Data Port",
        description: "The terminal only accepts CSV. Convert the JSON records it prints.",
        kind: StageKind::DataPort,
        hints: &[
            "The header row is the list of keys of the first record.",
            "Join the values of each record with commas, then join rows with newlines.",
        ],
    },
    StageDefinition {
        id: 5,
        title: "CSS Maze",
        description: "Five boxes must be positioned along the diagonal to reveal the path.",
        kind: StageKind::CssPuzzle,
        hints: &[
            "Every box uses `position: absolute`.",
            "Boxes move 100px down and 100px right each step, starting at 50px.",
            "`.box5` ends at `top: 450px; left: 450px;`.",
        ],
    },
    StageDefinition {
        id: 6,
        title: "Logic Gates",
        description: "Set the inputs so the final gate opens the exit.",
        kind: StageKind::LogicGate,
        hints: &[
            "The circuit is `(input1 AND NOT input2) OR input3`.",
            "Only the middle input is off.",
        ],
    },
];

/// Look up a stage by its 1-based number.
#[must_use]
pub fn stage(id: u8) -> Option<&'static StageDefinition> {
    STAGES.iter().find(|s| s.id == id)
}

/// Zero-based index of a stage number, if valid.
#[must_use]
pub fn index_of(id: u8) -> Option<usize> {
    STAGES.iter().position(|s| s.id == id)
}

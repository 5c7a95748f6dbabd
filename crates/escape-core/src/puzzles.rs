//! # Puzzle Validators
//!
//! Six stateless checks, one per [`StageKind`]. Each compares a submission
//! against a fixed expected value and returns a [`Verdict`].
//!
//! Text puzzles (code formatting, CSS) compare normalized strings: runs of
//! whitespace collapse to one space, then selected punctuation is re-spaced
//! uniformly, so only the token sequence matters.

use crate::primitives::MAX_SUBMISSION_LENGTH;
use crate::types::{EscapeError, StageKind};

// =============================================================================
// VERDICT
// =============================================================================

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The submission matches.
    Correct(&'static str),
    /// The submission does not match; carries feedback for the player.
    Incorrect(String),
}

impl Verdict {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct(_))
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        match self {
            Verdict::Correct(msg) => msg,
            Verdict::Incorrect(msg) => msg,
        }
    }
}

// =============================================================================
// SUBMISSIONS
// =============================================================================

/// Answers for the logic gate truth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TruthTable {
    pub input1: bool,
    pub input2: bool,
    pub input3: bool,
    pub output: bool,
}

/// A player's answer to one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Reformatted source code.
    Code(String),
    /// Id of the selected tool.
    Selection(u8),
    /// Generated integer sequence.
    Sequence(Vec<i64>),
    /// CSV text.
    Csv(String),
    /// CSS rules.
    Css(String),
    /// Truth table answers.
    TruthTable(TruthTable),
}

impl Submission {
    /// Parse free text typed by a player into the submission shape a stage
    /// expects.
    ///
    /// - sequences: integers separated by commas or whitespace, optional `[ ]`
    /// - truth tables: four booleans (`true/false`, `1/0`, `t/f`)
    /// - selections: a tool id
    /// - text puzzles: the text as-is
    pub fn parse(kind: StageKind, text: &str) -> Result<Self, EscapeError> {
        if text.len() > MAX_SUBMISSION_LENGTH {
            return Err(EscapeError::Validation(format!(
                "Submission length {} exceeds maximum {} bytes",
                text.len(),
                MAX_SUBMISSION_LENGTH
            )));
        }

        match kind {
            StageKind::CodeFormat => Ok(Submission::Code(text.to_string())),
            StageKind::CssPuzzle => Ok(Submission::Css(text.to_string())),
            StageKind::DataPort => Ok(Submission::Csv(text.to_string())),
            StageKind::DebugClick => text
                .trim()
                .parse::<u8>()
                .map(Submission::Selection)
                .map_err(|_| {
                    EscapeError::Validation(format!("Expected a tool id, got '{}'", text.trim()))
                }),
            StageKind::NumberGenerator => {
                let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
                let mut numbers = Vec::new();
                for part in inner
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|p| !p.is_empty())
                {
                    let n = part.parse::<i64>().map_err(|_| {
                        EscapeError::Validation(format!("'{}' is not an integer", part))
                    })?;
                    numbers.push(n);
                }
                Ok(Submission::Sequence(numbers))
            }
            StageKind::LogicGate => {
                let values: Vec<bool> = text
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|p| !p.is_empty())
                    .map(parse_bool)
                    .collect::<Result<_, _>>()?;
                match values.as_slice() {
                    [input1, input2, input3, output] => Ok(Submission::TruthTable(TruthTable {
                        input1: *input1,
                        input2: *input2,
                        input3: *input3,
                        output: *output,
                    })),
                    _ => Err(EscapeError::Validation(format!(
                        "Expected 4 boolean answers, got {}",
                        values.len()
                    ))),
                }
            }
        }
    }
}

fn parse_bool(token: &str) -> Result<bool, EscapeError> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "on" | "yes" => Ok(true),
        "false" | "f" | "0" | "off" | "no" => Ok(false),
        other => Err(EscapeError::Validation(format!(
            "'{}' is not a boolean",
            other
        ))),
    }
}

/// Check a submission against the puzzle of the given kind.
///
/// Returns `EscapeError::Validation` when the submission shape does not
/// belong to that kind.
pub fn check(kind: StageKind, submission: &Submission) -> Result<Verdict, EscapeError> {
    match (kind, submission) {
        (StageKind::CodeFormat, Submission::Code(code)) => Ok(check_code_format(code)),
        (StageKind::DebugClick, Submission::Selection(id)) => Ok(check_debug_click(*id)),
        (StageKind::NumberGenerator, Submission::Sequence(seq)) => {
            Ok(check_number_sequence(seq))
        }
        (StageKind::DataPort, Submission::Csv(csv)) => Ok(check_data_port(csv)),
        (StageKind::CssPuzzle, Submission::Css(css)) => Ok(check_css(css)),
        (StageKind::LogicGate, Submission::TruthTable(table)) => Ok(check_logic_gate(*table)),
        (kind, _) => Err(EscapeError::Validation(format!(
            "Submission does not match stage type {}",
            kind
        ))),
    }
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Collapse every run of whitespace into one space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Replace each `token` and the whitespace directly around it with
/// `replacement`.
///
/// Whitespace emitted by a previous replacement belongs to the output and is
/// never absorbed by the next token.
fn respace(text: &str, token: char, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut pending = String::new();
    let mut skipping = false;
    for c in text.chars() {
        if c == token {
            pending.clear();
            out.push_str(replacement);
            skipping = true;
        } else if c.is_whitespace() {
            if !skipping {
                pending.push(c);
            }
        } else {
            out.push_str(&pending);
            pending.clear();
            out.push(c);
            skipping = false;
        }
    }
    out.push_str(&pending);
    out
}

/// Normalize JavaScript source for comparison.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    let mut text = collapse_whitespace(code);
    for token in ['{', '}', '=', '+', '[', ']', '(', ')'] {
        let replacement = format!(" {} ", token);
        text = respace(&text, token, &replacement);
    }
    text.trim().to_string()
}

/// Normalize CSS rules for comparison.
#[must_use]
pub fn normalize_css(css: &str) -> String {
    let mut text = collapse_whitespace(css);
    text = respace(&text, '{', " { ");
    text = respace(&text, '}', " } ");
    text = respace(&text, ':', ": ");
    text = respace(&text, ';', "; ");
    text.trim().to_string()
}

// =============================================================================
// CODE FORMAT
// =============================================================================

/// The minified snippet shown to the player.
pub const MINIFIED_CODE: &str = "functioncalculateSum(a,b){
return a+b;
}
constnumbers=[1,2,3,4,5];
letresult=0;
for(leti=0;i<numbers.length;i++){
result+=numbers[i];
}
console.log(\"Sum:\",result);";

/// The expected formatting.
pub const FORMATTED_CODE: &str = "function calculateSum(a, b) {
  return a + b;
}

const numbers = [1, 2, 3, 4, 5];
let result = 0;

for (let i = 0; i < numbers.length; i++) {
  result += numbers[i];
}

console.log(\"Sum:\", result);";

/// Normalized-string equality against [`FORMATTED_CODE`].
#[must_use]
pub fn check_code_format(code: &str) -> Verdict {
    if normalize_code(code) == normalize_code(FORMATTED_CODE) {
        Verdict::Correct("Perfect! Your code formatting is correct!")
    } else {
        Verdict::Incorrect(
            "Not quite right. Check your spacing, indentation, and line breaks.".to_string(),
        )
    }
}

// =============================================================================
// DEBUG CLICK
// =============================================================================

/// A selectable application in the debug hunt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub id: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub is_debug_tool: bool,
}

/// The four candidates.
pub const TOOLS: [Tool; 4] = [
    Tool {
        id: 1,
        name: "Calculator",
        description: "A basic calculator application",
        is_debug_tool: false,
    },
    Tool {
        id: 2,
        name: "Console Debugger",
        description: "Browser developer tools with console",
        is_debug_tool: true,
    },
    Tool {
        id: 3,
        name: "Text Editor",
        description: "Simple text editing application",
        is_debug_tool: false,
    },
    Tool {
        id: 4,
        name: "Terminal",
        description: "Command line interface",
        is_debug_tool: false,
    },
];

/// Selection lookup against [`TOOLS`].
#[must_use]
pub fn check_debug_click(selected: u8) -> Verdict {
    match TOOLS.iter().find(|t| t.id == selected) {
        Some(tool) if tool.is_debug_tool => {
            Verdict::Correct("Correct! You found the debugging tool!")
        }
        Some(tool) => Verdict::Incorrect(format!(
            "{} is not a debugging tool. Look for console or developer tools.",
            tool.name
        )),
        None => Verdict::Incorrect(format!("There is no tool with id {}.", selected)),
    }
}

// =============================================================================
// NUMBER GENERATOR
// =============================================================================

/// Last number of the expected sequence (inclusive).
pub const SEQUENCE_END: i64 = 1000;

/// Sequence equality with `0..=1000`.
#[must_use]
pub fn check_number_sequence(sequence: &[i64]) -> Verdict {
    let expected_len = (SEQUENCE_END + 1) as usize;
    if sequence.len() == expected_len && sequence.iter().copied().eq(0..=SEQUENCE_END) {
        Verdict::Correct("Perfect! Your code generates all numbers from 0 to 1000!")
    } else {
        Verdict::Incorrect(format!(
            "Generated {} numbers, but the sequence is incorrect. Generate numbers from 0 to 1000 in order.",
            sequence.len()
        ))
    }
}

// =============================================================================
// DATA PORT
// =============================================================================

/// One JSON record shown on the data port terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRecord {
    pub name: &'static str,
    pub age: u32,
    pub city: &'static str,
}

/// Column order of the CSV header.
pub const CSV_COLUMNS: [&str; 3] = ["name", "age", "city"];

/// The records to convert.
pub const PORT_RECORDS: [PortRecord; 3] = [
    PortRecord {
        name: "John",
        age: 25,
        city: "New York",
    },
    PortRecord {
        name: "Alice",
        age: 30,
        city: "London",
    },
    PortRecord {
        name: "Bob",
        age: 35,
        city: "Paris",
    },
];

/// CSV rendering of [`PORT_RECORDS`]: header line, one row per record,
/// `\n` separated, no trailing newline.
#[must_use]
pub fn expected_csv() -> String {
    let mut lines = Vec::with_capacity(PORT_RECORDS.len() + 1);
    lines.push(CSV_COLUMNS.join(","));
    for record in &PORT_RECORDS {
        lines.push(format!("{},{},{}", record.name, record.age, record.city));
    }
    lines.join("\n")
}

/// Structural CSV comparison after trimming and line-ending normalization.
#[must_use]
pub fn check_data_port(csv: &str) -> Verdict {
    let submitted = csv.trim().replace("\r\n", "\n");
    if submitted == expected_csv() {
        Verdict::Correct("Excellent! You successfully converted JSON to CSV format!")
    } else {
        Verdict::Incorrect(
            "The CSV format is not quite right. Check the headers and data formatting."
                .to_string(),
        )
    }
}

// =============================================================================
// CSS PUZZLE
// =============================================================================

/// The expected positioning rules.
pub const EXPECTED_CSS: &str = ".box1 { position: absolute; top: 50px; left: 50px; }
.box2 { position: absolute; top: 150px; left: 150px; }
.box3 { position: absolute; top: 250px; left: 250px; }
.box4 { position: absolute; top: 350px; left: 350px; }
.box5 { position: absolute; top: 450px; left: 450px; }";

/// Normalized CSS equality against [`EXPECTED_CSS`].
#[must_use]
pub fn check_css(css: &str) -> Verdict {
    if normalize_css(css) == normalize_css(EXPECTED_CSS) {
        Verdict::Correct("Perfect! Your CSS positioning is correct!")
    } else {
        Verdict::Incorrect(
            "Not quite right. Check your positioning values and CSS syntax.".to_string(),
        )
    }
}

// =============================================================================
// LOGIC GATE
// =============================================================================

/// The only accepted truth table.
pub const EXPECTED_TRUTH_TABLE: TruthTable = TruthTable {
    input1: true,
    input2: false,
    input3: true,
    output: true,
};

/// Fixed truth-table lookup.
#[must_use]
pub fn check_logic_gate(answers: TruthTable) -> Verdict {
    if answers == EXPECTED_TRUTH_TABLE {
        Verdict::Correct("Perfect! All your logic gate answers are correct!")
    } else {
        Verdict::Incorrect(
            "Some answers are incorrect. Check your boolean logic calculations.".to_string(),
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

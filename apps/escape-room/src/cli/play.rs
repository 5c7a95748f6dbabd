//! # Terminal Play Loop
//!
//! Line-oriented front end for `LifecycleController`.
//!
//! The countdown is driven from wall-clock time: before each command the
//! loop advances the controller by the whole seconds elapsed since the last
//! command, and again once a multi-line answer is in. Multi-line answers are
//! entered after `submit` and end with a line holding a single `.`.

use escape_core::puzzles::{self, MINIFIED_CODE, PORT_RECORDS, TOOLS};
use escape_core::{
    CompletionReason, EscapeError, LifecycleController, PerformanceRating, Phase, SaveStatus,
    ScoreTier, StageKind, Submission, SyncPolicy, average_stage_seconds,
};
use std::io::{BufRead, Write};
use std::time::Duration;

/// Line that ends a multi-line answer.
const END_OF_ANSWER: &str = ".";

/// One parsed player command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCommand {
    Help,
    Status,
    Show,
    Hint,
    /// `submit` alone starts a multi-line answer.
    Submit(Option<String>),
    Save,
    Again,
    Quit,
    Unknown(String),
}

impl PlayCommand {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "status" => Self::Status,
            "show" | "look" => Self::Show,
            "hint" => Self::Hint,
            "submit" | "answer" => Self::Submit((!rest.is_empty()).then(|| rest.to_string())),
            "save" => Self::Save,
            "again" | "restart" => Self::Again,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Interactive loop over any line source and sink.
pub struct PlayLoop<R, W, C> {
    controller: LifecycleController,
    custom_minutes: Option<u32>,
    input: R,
    output: W,
    /// Time since the loop began.
    clock: C,
    /// Clock reading already turned into ticks.
    ticked: Duration,
}

fn io_err(e: std::io::Error) -> EscapeError {
    EscapeError::IoError(e.to_string())
}

impl<R, W, C> PlayLoop<R, W, C>
where
    R: BufRead,
    W: Write,
    C: FnMut() -> Duration,
{
    pub fn new(
        controller: LifecycleController,
        custom_minutes: Option<u32>,
        input: R,
        output: W,
        clock: C,
    ) -> Self {
        Self {
            controller,
            custom_minutes,
            input,
            output,
            clock,
            ticked: Duration::ZERO,
        }
    }

    /// The controller, for inspection after the loop ends.
    #[must_use]
    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    /// Run until `quit` or end of input.
    pub fn run(&mut self) -> Result<(), EscapeError> {
        self.controller.start(self.custom_minutes)?;
        writeln!(
            self.output,
            "Welcome, {}. You have {} to escape. Type `help` for commands.",
            self.controller.player().name,
            format_clock(self.controller.time_remaining())
        )
        .map_err(io_err)?;
        self.warn_if_offline()?;
        self.show_stage()?;

        loop {
            write!(self.output, "> ").map_err(io_err)?;
            self.output.flush().map_err(io_err)?;
            let Some(line) = self.read_line()? else {
                break;
            };
            let command = PlayCommand::parse(&line);
            if command == PlayCommand::Quit {
                break;
            }
            let was_running = self.controller.phase() == Phase::InProgress;
            self.catch_up();
            self.handle(command)?;

            if was_running && let Phase::Completed(reason) = self.controller.phase() {
                self.show_summary(reason)?;
            }
            if self.controller.policy() == SyncPolicy::Outbox && self.controller.pending_writes() > 0
            {
                let report = self.controller.flush_outbox();
                tracing::debug!(
                    delivered = report.delivered,
                    dropped = report.dropped,
                    remaining = report.remaining,
                    "outbox flushed"
                );
            }
        }

        let unsent = self.controller.pending_writes();
        if unsent > 0 {
            writeln!(self.output, "{unsent} write(s) could not be delivered.").map_err(io_err)?;
        }
        writeln!(self.output, "Goodbye!").map_err(io_err)
    }

    fn read_line(&mut self) -> Result<Option<String>, EscapeError> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(io_err)?;
        Ok((read > 0).then_some(line))
    }

    /// Turn elapsed wall-clock seconds into ticks.
    fn catch_up(&mut self) {
        let now = (self.clock)();
        let due = now.saturating_sub(self.ticked).as_secs();
        if due == 0 {
            return;
        }
        self.ticked += Duration::from_secs(due);
        if self.controller.phase() == Phase::InProgress {
            self.controller.advance(u32::try_from(due).unwrap_or(u32::MAX));
        }
    }

    fn handle(&mut self, command: PlayCommand) -> Result<(), EscapeError> {
        let running = self.controller.phase() == Phase::InProgress;
        match command {
            PlayCommand::Help => self.show_help(),
            PlayCommand::Status => self.show_status(),
            PlayCommand::Show if running => self.show_stage(),
            PlayCommand::Hint if running => self.hint(),
            PlayCommand::Submit(inline) if running => {
                let answer = match inline {
                    Some(text) => text,
                    None => {
                        let text = self.read_answer()?;
                        // Typing time counts against the countdown.
                        self.catch_up();
                        if self.controller.phase() != Phase::InProgress {
                            return writeln!(self.output, "Time ran out before the answer was in.")
                                .map_err(io_err);
                        }
                        text
                    }
                };
                self.submit(&answer)
            }
            PlayCommand::Save => self.save(),
            PlayCommand::Again if !running => {
                self.controller.reset();
                self.ticked = (self.clock)();
                self.controller.start(self.custom_minutes)?;
                writeln!(self.output, "New game started.").map_err(io_err)?;
                self.show_stage()
            }
            PlayCommand::Again => {
                writeln!(self.output, "Finish or quit the current game first.").map_err(io_err)
            }
            PlayCommand::Unknown(text) if !text.is_empty() => {
                writeln!(self.output, "Unknown command '{text}'. Type `help`.").map_err(io_err)
            }
            PlayCommand::Unknown(_) => Ok(()),
            PlayCommand::Show | PlayCommand::Hint | PlayCommand::Submit(_) => writeln!(
                self.output,
                "The game is over. Type `again` to play another round or `quit`."
            )
            .map_err(io_err),
            PlayCommand::Quit => Ok(()),
        }
    }

    fn read_answer(&mut self) -> Result<String, EscapeError> {
        writeln!(self.output, "Enter your answer; finish with a line containing only `.`")
            .map_err(io_err)?;
        let mut lines = Vec::new();
        while let Some(line) = self.read_line()? {
            let line = line.trim_end_matches(['\r', '\n']);
            if line == END_OF_ANSWER {
                break;
            }
            lines.push(line.to_string());
        }
        Ok(lines.join("\n"))
    }

    fn submit(&mut self, answer: &str) -> Result<(), EscapeError> {
        let stage = self.controller.current_stage();
        let submission = match Submission::parse(stage.kind, answer) {
            Ok(s) => s,
            Err(e) => return writeln!(self.output, "{e}").map_err(io_err),
        };
        let verdict = puzzles::check(stage.kind, &submission)?;
        writeln!(self.output, "{}", verdict.feedback()).map_err(io_err)?;
        if !verdict.is_correct() {
            return Ok(());
        }

        let spent = self.controller.stage_elapsed();
        self.controller.complete_stage(stage.id, spent)?;
        writeln!(
            self.output,
            "Stage {} cleared in {}. Score: {}",
            stage.id,
            format_clock(spent),
            self.controller.score()
        )
        .map_err(io_err)?;
        if self.controller.phase() == Phase::InProgress {
            self.show_stage()?;
        }
        Ok(())
    }

    fn hint(&mut self) -> Result<(), EscapeError> {
        let stage_id = self.controller.current_stage().id;
        match self.controller.use_hint(stage_id) {
            Ok(text) => writeln!(self.output, "Hint: {text}").map_err(io_err),
            Err(EscapeError::HintsExhausted(_)) => {
                writeln!(self.output, "No more hints for this stage.").map_err(io_err)
            }
            Err(e) => Err(e),
        }
    }

    fn save(&mut self) -> Result<(), EscapeError> {
        let message = match self.controller.save() {
            SaveStatus::Saved => "Progress saved.",
            SaveStatus::Queued => "Save queued; it will be retried.",
            SaveStatus::Failed => "Save failed.",
            SaveStatus::NoSession => "Nothing to save: no session was recorded.",
        };
        writeln!(self.output, "{message}").map_err(io_err)
    }

    fn warn_if_offline(&mut self) -> Result<(), EscapeError> {
        if self.controller.session_id().is_none() {
            writeln!(
                self.output,
                "Warning: the session could not be recorded. Playing offline."
            )
            .map_err(io_err)?;
        }
        Ok(())
    }

    fn show_help(&mut self) -> Result<(), EscapeError> {
        writeln!(
            self.output,
            "Commands:
  show            show the current puzzle
  submit [answer] answer the puzzle (no argument: multi-line, end with `.`)
  hint            reveal the next hint
  status          time, score and progress
  save            save progress now
  again           start a new game after the current one ends
  quit            leave"
        )
        .map_err(io_err)
    }

    fn show_status(&mut self) -> Result<(), EscapeError> {
        let c = &self.controller;
        writeln!(
            self.output,
            "Time left: {} | Score: {} | Hints: {} | Progress: {}/6 ({}%) | {}",
            format_clock(c.time_remaining()),
            c.score(),
            c.hints_used(),
            c.completed_count(),
            c.progress_percent(),
            c.phase().name()
        )
        .map_err(io_err)
    }

    fn show_stage(&mut self) -> Result<(), EscapeError> {
        let stage = self.controller.current_stage();
        writeln!(
            self.output,
            "\n=== Stage {}: {} ===\n{}",
            stage.id, stage.title, stage.description
        )
        .map_err(io_err)?;
        let written = match stage.kind {
            StageKind::CodeFormat => writeln!(self.output, "{MINIFIED_CODE}"),
            StageKind::DebugClick => TOOLS.iter().try_for_each(|tool| {
                writeln!(self.output, "  [{}] {} - {}", tool.id, tool.name, tool.description)
            }),
            StageKind::NumberGenerator => writeln!(
                self.output,
                "Submit the numbers, comma or space separated."
            ),
            StageKind::DataPort => PORT_RECORDS.iter().try_for_each(|r| {
                writeln!(
                    self.output,
                    "  {{\"name\": \"{}\", \"age\": {}, \"city\": \"{}\"}}",
                    r.name, r.age, r.city
                )
            }),
            StageKind::CssPuzzle => writeln!(
                self.output,
                "Write the rules for .box1 through .box5."
            ),
            StageKind::LogicGate => writeln!(
                self.output,
                "Submit input1 input2 input3 output as true/false."
            ),
        };
        written.map_err(io_err)
    }

    fn show_summary(&mut self, reason: CompletionReason) -> Result<(), EscapeError> {
        let state = self.controller.state();
        let headline = match reason {
            CompletionReason::Escaped => "You escaped!",
            CompletionReason::TimeUp => "Time's up!",
        };
        let rating = PerformanceRating::for_state(state);
        let tier = ScoreTier::of(state.score);
        let average = average_stage_seconds(state)
            .map(format_clock)
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            self.output,
            "\n{headline}\nRating: {rating}\nScore: {} ({tier:?})\nStages: {}/6\nTime used: {}\nAverage per stage: {average}\nHints used: {}\nType `again` to play another round or `quit`.",
            state.score,
            state.completed_count(),
            format_clock(state.elapsed()),
            state.hints_used,
        )
        .map_err(io_err)
    }
}

/// `MM:SS`.
#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

//! Line parser for the ground console.
//!
//! Keywords are matched case-insensitively. Arguments after a recognised
//! keyword are committed with `cut_err`, so an error names the argument that
//! failed rather than the whole command.

use core::fmt;

use winnow::ascii::{dec_int, dec_uint, hex_uint, space0};
use winnow::combinator::{alt, cut_err, opt, preceded, separated_pair};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

use super::catalog::{self, CommandTag};
use crate::brakes::{ALL_BRAKES, BrakeId, DevKey, RawMoveSelection};
use crate::mission::PodCommand;

/// Parsed console line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Unlock(PodCommand),
    Execute(PodCommand),
    Brake(BrakeCommand),
    Status,
    Help(Option<&'a str>),
}

/// Brake maintenance actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrakeCommand {
    /// Deployment percentage; values above 100 are clamped by the bank.
    Percent(u8),
    DistanceUm(u32),
    Raw {
        selection: RawMoveSelection,
        microsteps: i32,
        key: DevKey,
    },
    Test {
        id: BrakeId,
        enabled: bool,
    },
    Acknowledge(BrakeId),
}

/// Why a console line could not be parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Empty,
    Expected {
        expected: &'static str,
        column: usize,
        found: Option<&'a str>,
    },
    TrailingInput {
        column: usize,
        rest: &'a str,
    },
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => f.write_str("empty command"),
            ParseError::Expected {
                expected,
                column,
                found: Some(found),
            } => write!(f, "expected {expected}, found `{found}` at column {column}"),
            ParseError::Expected {
                expected,
                column,
                found: None,
            } => write!(f, "expected {expected} at column {column}, found end of line"),
            ParseError::TrailingInput { column, rest } => {
                write!(f, "unexpected `{rest}` at column {column}")
            }
        }
    }
}

/// Parses one console line. Surrounding whitespace and line endings are ignored.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first argument that did not match.
pub fn parse(line: &str) -> Result<ConsoleCommand<'_>, ParseError<'_>> {
    let line = line.trim_end();
    let mut input = line;
    if input.trim_start().is_empty() {
        return Err(ParseError::Empty);
    }

    match command.parse_next(&mut input) {
        Ok(command) => {
            let rest = input.trim_start();
            if rest.is_empty() {
                Ok(command)
            } else {
                Err(ParseError::TrailingInput {
                    column: column(line, rest),
                    rest,
                })
            }
        }
        Err(ErrMode::Backtrack(error) | ErrMode::Cut(error)) => {
            let rest = input.trim_start();
            Err(ParseError::Expected {
                expected: expected_label(&error),
                column: column(line, rest),
                found: rest.split_whitespace().next(),
            })
        }
        Err(ErrMode::Incomplete(_)) => Err(ParseError::Expected {
            expected: "more input",
            column: line.len(),
            found: None,
        }),
    }
}

fn column(line: &str, rest: &str) -> usize {
    line.len() - rest.len()
}

// winnow only keeps context with its `alloc` feature; otherwise every error
// reports the fallback label.
fn expected_label(error: &ContextError) -> &'static str {
    error
        .context()
        .find_map(|context| match context {
            StrContext::Label(label) => Some(*label),
            StrContext::Expected(StrContextValue::Description(description)) => Some(*description),
            _ => None,
        })
        .unwrap_or("valid input")
}

fn command<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    let spec = word
        .verify_map(catalog::lookup)
        .context(StrContext::Label("command"))
        .parse_next(input)?;

    match spec.tag {
        CommandTag::Unlock => cut_err(pod_command)
            .map(ConsoleCommand::Unlock)
            .parse_next(input),
        CommandTag::Execute => cut_err(pod_command)
            .map(ConsoleCommand::Execute)
            .parse_next(input),
        CommandTag::Brake => cut_err(brake).map(ConsoleCommand::Brake).parse_next(input),
        CommandTag::Status => Ok(ConsoleCommand::Status),
        CommandTag::Help => opt(word).map(ConsoleCommand::Help).parse_next(input),
    }
}

fn brake(input: &mut &str) -> ModalResult<BrakeCommand> {
    let action = word
        .verify_map(|action: &str| {
            ["percent", "distance", "raw", "test", "ack"]
                .into_iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(action))
        })
        .context(StrContext::Label("brake action"))
        .parse_next(input)?;

    match action {
        "percent" => cut_err(preceded(space0, dec_uint::<_, u8, _>))
            .context(StrContext::Label("percentage"))
            .map(BrakeCommand::Percent)
            .parse_next(input),
        "distance" => cut_err(preceded(space0, dec_uint::<_, u32, _>))
            .context(StrContext::Label("gap in microns"))
            .map(BrakeCommand::DistanceUm)
            .parse_next(input),
        "raw" => raw_move(input),
        "test" => {
            let id = cut_err(brake_id).parse_next(input)?;
            let enabled = cut_err(switch).parse_next(input)?;
            Ok(BrakeCommand::Test { id, enabled })
        }
        _ => cut_err(brake_id)
            .map(BrakeCommand::Acknowledge)
            .parse_next(input),
    }
}

fn raw_move(input: &mut &str) -> ModalResult<BrakeCommand> {
    let selection = cut_err(word.verify_map(raw_selection))
        .context(StrContext::Label("left, right or both"))
        .parse_next(input)?;
    let microsteps = cut_err(preceded(space0, dec_int::<_, i32, _>))
        .context(StrContext::Label("microstep target"))
        .parse_next(input)?;
    let key = cut_err(dev_key)
        .context(StrContext::Label("key=<hex>:<hex>"))
        .parse_next(input)?;

    Ok(BrakeCommand::Raw {
        selection,
        microsteps,
        key,
    })
}

fn dev_key(input: &mut &str) -> ModalResult<DevKey> {
    word.verify(|keyword: &str| keyword.eq_ignore_ascii_case("key"))
        .parse_next(input)?;
    '='.parse_next(input)?;
    separated_pair(hex_word, ':', hex_word)
        .map(|(key0, key1)| DevKey::new(key0, key1))
        .parse_next(input)
}

fn hex_word(input: &mut &str) -> ModalResult<u32> {
    preceded(opt(alt(("0x", "0X"))), hex_uint).parse_next(input)
}

fn pod_command(input: &mut &str) -> ModalResult<PodCommand> {
    word.verify_map(PodCommand::from_label)
        .context(StrContext::Label("mission command"))
        .parse_next(input)
}

fn brake_id(input: &mut &str) -> ModalResult<BrakeId> {
    word.verify_map(|name: &str| {
        ALL_BRAKES
            .into_iter()
            .find(|id| id.label().eq_ignore_ascii_case(name))
    })
    .context(StrContext::Label("left or right"))
    .parse_next(input)
}

fn raw_selection(name: &str) -> Option<RawMoveSelection> {
    if name.eq_ignore_ascii_case("left") {
        Some(RawMoveSelection::Left)
    } else if name.eq_ignore_ascii_case("right") {
        Some(RawMoveSelection::Right)
    } else if name.eq_ignore_ascii_case("both") {
        Some(RawMoveSelection::Both)
    } else {
        None
    }
}

fn switch(input: &mut &str) -> ModalResult<bool> {
    word.verify_map(|value: &str| {
        if value.eq_ignore_ascii_case("on") {
            Some(true)
        } else if value.eq_ignore_ascii_case("off") {
            Some(false)
        } else {
            None
        }
    })
    .context(StrContext::Label("on or off"))
    .parse_next(input)
}

/// A keyword or label: letters, digits and dashes after optional blanks.
fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded(
        space0,
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-'),
    )
    .parse_next(input)
}

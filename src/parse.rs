//! Small text grammars used on the command line: swept parameters, their ranges and sweep
//! termination.

use std::num::ParseFloatError;
use std::str::FromStr;
use std::time::{Duration, Instant};

use derive_more::Display;
use log::trace;

use crate::scenario::{Parameter, ParameterRange};
use crate::termination::Termination;

#[derive(Debug, Display, PartialEq)]
pub enum ParseRangeError {
    /// No `..` or `..=` between the bounds
    #[display(fmt = "expected 'start..end step' or 'start..=end step'")]
    MissingDots,
    #[display(fmt = "expected a step after the range")]
    MissingStep,
    #[display(fmt = "unexpected trailing input '{}'", _0)]
    UnconsumedTokens(String),
    #[display(fmt = "{}", _0)]
    ParseFloatError(ParseFloatError),
    #[display(fmt = "the step must be positive")]
    NonPositiveStep,
    #[display(fmt = "the range ends before it starts")]
    Reversed,
}

impl std::error::Error for ParseRangeError {}

impl<'s> TryFrom<&'s str> for ParameterRange {
    type Error = ParseRangeError;

    /// Parses `"0.8..1.5 0.01"` (end excluded) or `"0..=15 1"` (end included)
    fn try_from(value: &'s str) -> Result<Self, Self::Error> {
        use ParseRangeError::*;
        let mut tokens = value.split_ascii_whitespace();
        let bounds = tokens.next().ok_or(MissingDots)?;
        let step = tokens.next().ok_or(MissingStep)?;
        if let Some(rest) = tokens.next() {
            return Err(UnconsumedTokens(rest.to_string()));
        }

        let (start, end, inclusive) = match bounds.split_once("..=") {
            Some((start, end)) => (start, end, true),
            None => match bounds.split_once("..") {
                Some((start, end)) => (start, end, false),
                None => return Err(MissingDots),
            },
        };

        let float = |s: &str| s.parse::<f64>().map_err(ParseFloatError);
        let (start, end, step) = (float(start)?, float(end)?, float(step)?);
        trace!("range {start}..{end} step {step}, inclusive = {inclusive}");

        if step <= 0.0 {
            return Err(NonPositiveStep);
        }
        if end < start {
            return Err(Reversed);
        }

        Ok(ParameterRange {
            start,
            end,
            step,
            inclusive,
        })
    }
}

#[derive(Debug, Display, PartialEq)]
pub enum ParseToleranceError {
    #[display(fmt = "{}", _0)]
    ParseFloatError(ParseFloatError),
    #[display(fmt = "the tolerance must be positive, got {}", _0)]
    NotPositive(f64),
}

impl std::error::Error for ParseToleranceError {}

/// Parses the width the tipping point search narrows its bracket down to
pub fn tolerance(s: &str) -> Result<f64, ParseToleranceError> {
    let value = s
        .trim()
        .parse::<f64>()
        .map_err(ParseToleranceError::ParseFloatError)?;
    match value > 0.0 {
        true => Ok(value),
        false => Err(ParseToleranceError::NotPositive(value)),
    }
}

#[derive(Debug, Display, PartialEq)]
pub enum ParseParameterError {
    #[display(fmt = "unknown parameter '{}', expected 'bunker', 'delay' or 'delay:PORT,PORT'", _0)]
    Unknown(String),
    #[display(fmt = "'delay:' must name at least one port")]
    NoPorts,
}

impl std::error::Error for ParseParameterError {}

impl FromStr for Parameter {
    type Err = ParseParameterError;

    /// The inverse of `Display`: `bunker`, `delay` or `delay:QINGDAO,CAOFEIDIAN`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "bunker" | "bunker_multiplier" => return Ok(Parameter::BunkerMultiplier),
            "delay" | "port_delay" => return Ok(Parameter::PortDelay { ports: None }),
            _ => (),
        }

        match s.split_once(':') {
            Some((head, ports)) if head.eq_ignore_ascii_case("delay") => {
                let ports = ports
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>();
                match ports.is_empty() {
                    true => Err(ParseParameterError::NoPorts),
                    false => Ok(Parameter::PortDelay { ports: Some(ports) }),
                }
            }
            _ => Err(ParseParameterError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, Display, PartialEq)]
pub enum ParseTerminationError {
    ExpectedInt,
    ExpectedTerm,
    UnconsumedTokens,
    EmptyStack,
    #[display(fmt = "unrecognized token '{}'", _0)]
    UnrecognizedToken(String),
}

impl std::error::Error for ParseTerminationError {}

impl<'s> TryFrom<&'s str> for Termination {
    type Error = ParseTerminationError;

    /// Parses a termination criterion in reverse polish notation, e.g. `"20 samples 30 timeout |"`
    fn try_from(value: &'s str) -> Result<Self, Self::Error> {
        use ParseTerminationError::*;
        let tokens = value.split_ascii_whitespace();

        enum Arg {
            Int(u64),
            Term(Box<Termination>),
        }

        let mut stack = Vec::new();

        let int = |s: &mut Vec<Arg>| match s.pop() {
            Some(Arg::Int(x)) => Ok(x),
            Some(Arg::Term(_)) => Err(ExpectedInt),
            None => Err(EmptyStack),
        };

        let term = |s: &mut Vec<Arg>| match s.pop() {
            Some(Arg::Term(x)) => Ok(x),
            Some(Arg::Int(_)) => Err(ExpectedTerm),
            None => Err(EmptyStack),
        };

        for token in tokens {
            let new = match token {
                "never" => Arg::Term(Box::new(Termination::Never)),
                "samples" => Arg::Term(Box::new(Termination::Samples(int(&mut stack)?))),
                "timeout" => Arg::Term(Box::new(Termination::Timeout(
                    Instant::now(),
                    Duration::from_secs(int(&mut stack)?),
                ))),
                "|" => Arg::Term(Box::new(Termination::Any(
                    term(&mut stack)?,
                    term(&mut stack)?,
                ))),
                "&" => Arg::Term(Box::new(Termination::All(
                    term(&mut stack)?,
                    term(&mut stack)?,
                ))),
                x => match x.parse::<u64>() {
                    Ok(num) => Arg::Int(num),
                    Err(_) => return Err(UnrecognizedToken(x.to_string())),
                },
            };

            stack.push(new);
        }

        let result = term(&mut stack).map(|x| *x)?;
        match stack.is_empty() {
            true => Ok(result),
            false => Err(UnconsumedTokens),
        }
    }
}

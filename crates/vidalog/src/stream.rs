//! Phase-aware parsing of the diagnostic session log stream
//!
//! A session starts with an ECU identification exchange and then settles into
//! an open-ended series of request/response parameter reads. One session is
//! frequently split across several log files, and a single unit of work (the
//! identification phase, or one request/response pair) can begin in one file
//! and finish in a later one.
//!
//! [StreamParser] is an explicit, externally-driven state machine:
//! [StreamParser::advance] consumes lines from the supplied source until it
//! has an event, a phase transition, or runs out of input. All in-flight
//! state (the identification markers seen so far, a request still waiting
//! for its response) lives in the parser, so feeding it the next file picks
//! up exactly where the last one ended; no line is processed twice and no
//! partial match is lost.
use std::io::BufRead;
use std::sync::LazyLock;

use chrono::NaiveTime;
use eyre::WrapErr;
use regex::Regex;

use crate::logline::parse_log_entry;

/// Message announcing the start of the ECU identification exchange
const ECU_ID_START_MARKER: &str = "> PerformEcuIdentification <";
/// Message announcing the end of identification (the tool moves on to its
/// car-configuration readout, which is where the parameter reads live)
const ECU_ID_END_MARKER: &str = "> PerformCarConfigReadout <";

static ECU_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SP: general_GetEcuId, EcuId: (.+?), Result: ").unwrap());
static REQUEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"VehComm request: Ecu '(.+?)'").unwrap());
static RESPONSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"VehComm response: '(.+?)'").unwrap());

/// Where in the session the parser currently is
///
/// There is no terminal state: ParameterRead lasts until the caller stops
/// supplying input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Init,
    EcuIdentification,
    ParameterRead,
}

/// A raw request/response parameter exchange
///
/// `message` is the response's hex payload text; `ecu_addr` is the address
/// named by the request that solicited it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawBusMsg {
    pub ecu_addr: String,
    pub message: String,
    pub timestamp: NaiveTime,
}

/// A unit of work recognized by the parser
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// One ECU identified during the identification phase
    EcuIdentifier {
        identifier: String,
        timestamp: NaiveTime,
    },
    /// One completed parameter exchange
    BusMessage(RawBusMsg),
}

/// One result of driving [StreamParser::advance]
#[derive(Clone, Debug, PartialEq)]
pub enum Advance {
    /// A unit of work was recognized; keep advancing with the same source
    Event(StreamEvent),
    /// The parser moved to a new phase; the source may have more to give
    Transitioned(Phase),
    /// The source is exhausted mid-phase; advance again with the next file
    NeedMoreInput,
}

#[derive(Debug, Default)]
pub struct StreamParser {
    phase: Phase,
    /// Identification start marker observed
    start_seen: bool,
    /// ECU address of a request still waiting for its response
    pending_request: Option<String>,
}

impl StreamParser {
    pub fn new() -> StreamParser {
        StreamParser::default()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Consume lines from `source` until an event, a phase transition, or EOF
    ///
    /// The parser is timestamp-agnostic; ordering across files is the
    /// caller's concern.
    pub fn advance<R: BufRead>(&mut self, source: &mut R) -> eyre::Result<Advance> {
        if self.phase == Phase::Init {
            self.phase = Phase::EcuIdentification;
            tracing::debug!("Entering ECU identification phase");
            return Ok(Advance::Transitioned(Phase::EcuIdentification));
        }

        let mut line = String::new();
        loop {
            line.clear();
            let n = source
                .read_line(&mut line)
                .wrap_err("Failed to read log line")?;
            if n == 0 {
                return Ok(Advance::NeedMoreInput);
            }

            let advance = match self.phase {
                Phase::Init => None,
                Phase::EcuIdentification => self.scan_identification(&line),
                Phase::ParameterRead => self.scan_parameters(&line),
            };
            if let Some(advance) = advance {
                return Ok(advance);
            }
        }
    }

    fn scan_identification(&mut self, line: &str) -> Option<Advance> {
        let entry = parse_log_entry(line)?;

        if !self.start_seen {
            // Anything can precede the start marker; none of it is searched
            // for identifiers
            if entry.message.contains(ECU_ID_START_MARKER) {
                tracing::debug!("ECU identification started at {}", entry.timestamp);
                self.start_seen = true;
            }
            return None;
        }

        if entry.message.contains(ECU_ID_END_MARKER) {
            tracing::debug!("Entering parameter read phase");
            self.phase = Phase::ParameterRead;
            return Some(Advance::Transitioned(Phase::ParameterRead));
        }

        let caps = ECU_ID.captures(&entry.message)?;
        Some(Advance::Event(StreamEvent::EcuIdentifier {
            identifier: caps[1].to_string(),
            timestamp: entry.timestamp,
        }))
    }

    fn scan_parameters(&mut self, line: &str) -> Option<Advance> {
        if self.pending_request.is_none() {
            if let Some(caps) = REQUEST.captures(line) {
                tracing::trace!("Parameter request for ECU '{}'", &caps[1]);
                self.pending_request = Some(caps[1].to_string());
            }
            return None;
        }

        let caps = RESPONSE.captures(line)?;
        let ecu_addr = self.pending_request.take()?;
        let Some(entry) = parse_log_entry(line) else {
            // A response on a line that isn't a well-formed entry has no
            // usable timestamp; the whole exchange is dropped
            tracing::warn!(
                "Dropping parameter exchange for ECU '{ecu_addr}': malformed response line: {line:?}"
            );
            return None;
        };

        Some(Advance::Event(StreamEvent::BusMessage(RawBusMsg {
            ecu_addr,
            message: caps[1].to_string(),
            timestamp: entry.timestamp,
        })))
    }
}

//! Decoder for recorded vehicle-diagnostic session logs
//!
//! A diagnostic tool session is recorded as timestamped text lines: an ECU
//! identification exchange followed by request/response parameter reads
//! carrying raw CAN-bus payloads. This crate replays those logs — possibly
//! split across several files — and decodes each parameter read into a typed
//! value using a definitions database (see the `vidalog-defs` crate for the
//! store boundary).
//!
//! The usual entry point is [SessionReader]: ingest the session's log files
//! in order, then drain decoded readings. The lower layers (the stream
//! parser, matcher, extractor, and the scaling-expression engine) are public
//! for callers who need to drive them directly.
pub mod bus;
pub mod counter;
pub mod logline;
pub mod scaling;
pub mod session;
pub mod stream;

pub use bus::extract::{BlockExtractor, SkipReason};
pub use bus::matcher::MessageMatcher;
pub use bus::{DecodedReading, EcuBlockId, RawReading};
pub use scaling::{Num, ScalingEngine, Value};
pub use session::{IngestionStats, SessionReader};
pub use stream::{Advance, Phase, RawBusMsg, StreamEvent, StreamParser};

#[cfg(test)]
#[ctor::ctor]
fn setup_test_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .with_ansi(true)
        .init();
}

//! Session-level orchestration of log ingestion and decoding
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::NaiveTime;
use eyre::{WrapErr, bail};
use vidalog_defs::DefinitionsStore;

use crate::bus::DecodedReading;
use crate::bus::extract::{BlockExtractor, SkipReason};
use crate::bus::matcher::MessageMatcher;
use crate::counter::Counter;
use crate::stream::{Advance, Phase, RawBusMsg, StreamEvent, StreamParser};

/// What one ingestion call found
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub ecu_count: usize,
    pub param_count: usize,
}

/// Replays a recorded diagnostic session from its log files
///
/// Log files must be ingested in chronological order; each call drives the
/// stream parser across one file, collects the identified ECUs and the raw
/// parameter exchanges, and enforces that event timestamps never move
/// backwards. Once the identification phase completes, the matcher and
/// extractor are built from the definitions store and
/// [SessionReader::get_new_decoded_readings] turns the buffered exchanges
/// into decoded values.
pub struct SessionReader<S> {
    store: S,
    parser: StreamParser,
    ecu_identifiers: BTreeSet<String>,
    raw_messages: Vec<RawBusMsg>,
    matcher: Option<MessageMatcher>,
    extractor: Option<BlockExtractor>,
    last_timestamp: Option<NaiveTime>,
    files_ingested: usize,
    last_ingestion: Option<IngestionStats>,
}

impl<S: DefinitionsStore> SessionReader<S> {
    pub fn new(store: S) -> SessionReader<S> {
        SessionReader {
            store,
            parser: StreamParser::new(),
            ecu_identifiers: BTreeSet::new(),
            raw_messages: Vec::new(),
            matcher: None,
            extractor: None,
            last_timestamp: None,
            files_ingested: 0,
            last_ingestion: None,
        }
    }

    /// Ingest the next log file of the session
    pub fn ingest_file(&mut self, path: &Path) -> eyre::Result<Phase> {
        let file_i = self.files_ingested;
        tracing::info!("Ingesting log file #{file_i}: {path:?}");

        let file =
            File::open(path).wrap_err_with(|| format!("Failed to open log file: {path:?}"))?;
        let phase = self.ingest_reader(BufReader::new(file))?;

        let stats = self.last_ingestion.unwrap_or_default();
        tracing::info!(
            "Ingested {} ECU identifiers and {} parameter reads from log file #{file_i}",
            stats.ecu_count,
            stats.param_count
        );
        Ok(phase)
    }

    /// Ingest the next log source of the session
    ///
    /// Returns the phase the parser is in once the source is exhausted.
    /// Fails on a timestamp regression (log files ingested out of order) and
    /// on definitions data the matcher cannot be built from; either way
    /// ingestion of the current source stops.
    pub fn ingest_reader<R: BufRead>(&mut self, mut reader: R) -> eyre::Result<Phase> {
        self.last_ingestion = Some(IngestionStats::default());

        loop {
            match self.parser.advance(&mut reader)? {
                Advance::Event(StreamEvent::EcuIdentifier {
                    identifier,
                    timestamp,
                }) => self.add_ecu_identifier(identifier, timestamp)?,
                Advance::Event(StreamEvent::BusMessage(message)) => {
                    self.add_param_message(message)?
                }
                Advance::Transitioned(Phase::ParameterRead) => self.build_decoders()?,
                Advance::Transitioned(_) => {}
                Advance::NeedMoreInput => break,
            }
        }

        self.files_ingested += 1;
        Ok(self.parser.phase())
    }

    /// Decode everything buffered since the last call
    ///
    /// Empty until the identification phase has completed. The raw buffer is
    /// cleared unconditionally: messages that fail to match or decode are
    /// not retried.
    pub fn get_new_decoded_readings(&mut self) -> eyre::Result<Vec<DecodedReading>> {
        let (Some(matcher), Some(extractor)) = (&self.matcher, &mut self.extractor) else {
            return Ok(Vec::new());
        };

        let messages = std::mem::take(&mut self.raw_messages);
        tracing::info!("Decoding {} buffered parameter messages", messages.len());

        let readings: Vec<_> = matcher.match_messages(&messages).collect();
        let decoded = extractor.extract(&self.store, readings)?;

        let skips = extractor.skip_counts();
        if let Some((reason, count)) = skips.single_most_common() {
            tracing::debug!(
                "{} readings skipped so far, most common reason: {reason:?} ({count})",
                skips.total()
            );
        }
        Ok(decoded)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.parser.phase()
    }

    /// ECU identifiers collected during the identification phase
    #[must_use]
    pub fn ecu_identifiers(&self) -> &BTreeSet<String> {
        &self.ecu_identifiers
    }

    #[must_use]
    pub fn files_ingested(&self) -> usize {
        self.files_ingested
    }

    /// Timestamp of the last accepted event
    #[must_use]
    pub fn last_timestamp(&self) -> Option<NaiveTime> {
        self.last_timestamp
    }

    /// Stats of the most recent ingestion call
    #[must_use]
    pub fn last_ingestion(&self) -> Option<IngestionStats> {
        self.last_ingestion
    }

    /// Raw parameter messages buffered for the next decode pass
    #[must_use]
    pub fn buffered_messages(&self) -> usize {
        self.raw_messages.len()
    }

    /// Skip counters of the extractor, once it exists
    #[must_use]
    pub fn skip_counts(&self) -> Option<&Counter<SkipReason>> {
        self.extractor.as_ref().map(BlockExtractor::skip_counts)
    }

    /// Every accepted event must be at or after the previous one; a
    /// regression means the caller fed the log files out of order.
    fn assert_after_last_timestamp(
        &self,
        timestamp: NaiveTime,
        context: &dyn std::fmt::Debug,
    ) -> eyre::Result<()> {
        if let Some(prev) = self.last_timestamp
            && timestamp < prev
        {
            bail!(
                "Log entry is older than the last parsed entry ({timestamp} < {prev}). \
                 Were the log files ingested in the correct order? Context: {context:?}"
            );
        }
        Ok(())
    }

    fn add_ecu_identifier(&mut self, identifier: String, timestamp: NaiveTime) -> eyre::Result<()> {
        self.assert_after_last_timestamp(timestamp, &identifier)?;

        if self.ecu_identifiers.contains(&identifier) {
            tracing::warn!("Duplicate ECU identifier found: '{identifier}'");
            return Ok(());
        }

        self.ecu_identifiers.insert(identifier);
        if let Some(stats) = &mut self.last_ingestion {
            stats.ecu_count += 1;
        }
        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    fn add_param_message(&mut self, message: RawBusMsg) -> eyre::Result<()> {
        self.assert_after_last_timestamp(message.timestamp, &message)?;

        if let Some(stats) = &mut self.last_ingestion {
            stats.param_count += 1;
        }
        self.last_timestamp = Some(message.timestamp);
        self.raw_messages.push(message);
        Ok(())
    }

    /// Build the matcher and extractor once identification has completed
    fn build_decoders(&mut self) -> eyre::Result<()> {
        tracing::info!(
            "ECU identification complete; detected {} unique ECUs: {:?}",
            self.ecu_identifiers.len(),
            self.ecu_identifiers
        );

        let identifiers: Vec<String> = self.ecu_identifiers.iter().cloned().collect();
        let match_data = self
            .store
            .parent_match_data(&identifiers)
            .wrap_err("Failed to read parameter match data from the definitions store")?;
        tracing::info!("Building compare tables from {} match records", match_data.len());

        self.matcher = Some(MessageMatcher::new(match_data)?);
        self.extractor = Some(BlockExtractor::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vidalog_defs::MemoryStore;

    use super::*;

    fn line(sec: u32, message: &str) -> String {
        format!("10:00:{sec:02},000 [thread-1][DEBUG][vehcomm] {message}\n")
    }

    fn reader_with_empty_store() -> SessionReader<MemoryStore> {
        SessionReader::new(MemoryStore::new())
    }

    #[test]
    fn test_readings_empty_before_identification_completes() {
        let mut reader = reader_with_empty_store();
        let log = line(0, "> PerformEcuIdentification <");
        let phase = reader.ingest_reader(log.as_bytes()).unwrap();
        assert_eq!(phase, Phase::EcuIdentification);
        assert_eq!(reader.get_new_decoded_readings().unwrap(), vec![]);
    }

    #[test]
    fn test_duplicate_identifier_counted_once() {
        let mut reader = reader_with_empty_store();
        let mut log = String::new();
        log.push_str(&line(0, "> PerformEcuIdentification <"));
        log.push_str(&line(1, "SP: general_GetEcuId, EcuId: 6A19E1, Result: OK"));
        log.push_str(&line(2, "SP: general_GetEcuId, EcuId: 6A19E1, Result: OK"));
        reader.ingest_reader(log.as_bytes()).unwrap();

        assert_eq!(reader.ecu_identifiers().len(), 1);
        assert_eq!(reader.last_ingestion().unwrap().ecu_count, 1);
        // The duplicate did not advance the session clock
        assert_eq!(
            reader.last_timestamp(),
            Some(NaiveTime::from_hms_opt(10, 0, 1).unwrap())
        );
    }

    #[test]
    fn test_ordering_violation_is_fatal() {
        let mut reader = reader_with_empty_store();
        let mut log = String::new();
        log.push_str(&line(5, "> PerformEcuIdentification <"));
        log.push_str(&line(5, "SP: general_GetEcuId, EcuId: 6A19E1, Result: OK"));
        reader.ingest_reader(log.as_bytes()).unwrap();

        // Second file starts before the first one ended
        let log = line(2, "SP: general_GetEcuId, EcuId: 5F0CC2, Result: OK");
        let err = reader.ingest_reader(log.as_bytes()).unwrap_err();
        let message = format!("{err}");
        assert!(message.contains("10:00:02"), "{message}");
        assert!(message.contains("10:00:05"), "{message}");
        // The failed call does not count as an ingested file
        assert_eq!(reader.files_ingested(), 1);
    }

    #[test]
    fn test_equal_timestamps_allowed() {
        let mut reader = reader_with_empty_store();
        let mut log = String::new();
        log.push_str(&line(1, "> PerformEcuIdentification <"));
        log.push_str(&line(3, "SP: general_GetEcuId, EcuId: 6A19E1, Result: OK"));
        log.push_str(&line(3, "SP: general_GetEcuId, EcuId: 5F0CC2, Result: OK"));
        reader.ingest_reader(log.as_bytes()).unwrap();
        assert_eq!(reader.ecu_identifiers().len(), 2);
    }
}

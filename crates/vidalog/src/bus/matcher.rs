//! Matching raw bus messages to the parent blocks they carry
use std::collections::HashMap;

use eyre::{bail, ensure};
use vidalog_defs::ParentBlockMatch;

use crate::bus::{EcuBlockId, RawReading};
use crate::stream::RawBusMsg;

/// Hex digits of the message-type tag preceding the compare value
const MSG_TYPE_LEN: usize = 2;

/// Compare values known under one CAN receive address
///
/// All compare values under one address share one width, so a fixed-width
/// substring of the message is enough to look one up.
#[derive(Debug)]
struct CompareTable {
    /// Compare value width in hex digits
    width: usize,
    entries: HashMap<String, EcuBlockId>,
}

/// Maps raw bus messages to parameter readings using the definitions data
/// for the identified ECU variants.
///
/// Built once when the identification phase completes; matching itself is
/// stateless and can run over any number of message batches.
#[derive(Debug)]
pub struct MessageMatcher {
    tables: HashMap<String, CompareTable>,
}

impl MessageMatcher {
    /// Build the per-address compare tables
    ///
    /// Fails on definitions data this decoder cannot disambiguate: compare
    /// values without a `0x` prefix, mixed compare-value widths under one
    /// address, or two records sharing an address and compare value.
    pub fn new(records: Vec<ParentBlockMatch>) -> eyre::Result<MessageMatcher> {
        let mut tables: HashMap<String, CompareTable> = HashMap::new();

        for record in records {
            let Some(value) = record.compare_value.strip_prefix("0x") else {
                bail!(
                    "Bad compare value for parent block {}: expected 0x-prefixed hex, got {:?}",
                    record.parent_block_id,
                    record.compare_value
                );
            };
            let id = EcuBlockId {
                ecu_variant_id: record.ecu_variant_id,
                parent_block_id: record.parent_block_id,
            };

            let table = tables
                .entry(record.can_id_rx.clone())
                .or_insert_with(|| CompareTable {
                    width: value.len(),
                    entries: HashMap::new(),
                });
            ensure!(
                value.len() == table.width,
                "Inconsistent compare value widths under CAN id {}: got {} digits, expected {}",
                record.can_id_rx,
                value.len(),
                table.width
            );
            if table.entries.insert(value.to_string(), id).is_some() {
                bail!(
                    "Ambiguous compare value {value:?} under CAN id {}",
                    record.can_id_rx
                );
            }
        }

        tracing::debug!("Built compare tables for {} CAN addresses", tables.len());
        Ok(MessageMatcher { tables })
    }

    /// Match a batch of raw bus messages into parameter readings
    ///
    /// Messages with an unknown address or compare value are bus traffic this
    /// session doesn't care about; they yield nothing.
    pub fn match_messages<'a>(
        &'a self,
        messages: &'a [RawBusMsg],
    ) -> impl Iterator<Item = RawReading> + 'a {
        messages.iter().filter_map(|msg| self.match_one(msg))
    }

    fn match_one(&self, msg: &RawBusMsg) -> Option<RawReading> {
        let table = self.tables.get(&msg.ecu_addr)?;
        // Layout: 2-digit message-type tag, compare value, payload
        let compare = msg.message.get(MSG_TYPE_LEN..MSG_TYPE_LEN + table.width)?;
        let id = *table.entries.get(compare)?;
        Some(RawReading {
            id,
            payload: msg.message[MSG_TYPE_LEN + table.width..].to_string(),
            timestamp: msg.timestamp,
        })
    }
}

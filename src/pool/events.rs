//! Pair event parsing
//!
//! Only used to find which bins a block range touched. Swap and
//! deposit/withdraw events carry the bin id as their third indexed topic;
//! `TransferBatch` carries a list of ids in its data.

use std::collections::BTreeSet;

use alloy::primitives::{B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use tracing::warn;

use crate::contracts::ILBPair;

fn indexed_id(topic: &B256) -> Option<u32> {
    u32::try_from(U256::from_be_bytes(topic.0)).ok()
}

/// Bin ids touched by `logs`. Unknown events are ignored.
pub fn bin_ids_from_logs(logs: &[Log]) -> BTreeSet<u32> {
    let mut ids = BTreeSet::new();

    for log in logs {
        let topics = log.topics();
        let Some(signature) = topics.first() else {
            continue;
        };

        if *signature == ILBPair::Swap::SIGNATURE_HASH
            || *signature == ILBPair::DepositedToBin::SIGNATURE_HASH
            || *signature == ILBPair::WithdrawnFromBin::SIGNATURE_HASH
        {
            match topics.get(3).and_then(indexed_id) {
                Some(id) => {
                    ids.insert(id);
                }
                None => warn!("Bin event without a valid id topic at block {:?}", log.block_number),
            }
        } else if *signature == ILBPair::TransferBatch::SIGNATURE_HASH {
            match ILBPair::TransferBatch::decode_log_data(log.data()) {
                Ok(event) => {
                    ids.extend(event.ids.iter().filter_map(|id| u32::try_from(*id).ok()));
                }
                Err(e) => warn!("Failed to decode TransferBatch: {}", e),
            }
        }
    }

    ids
}

/// Highest block number carried by `logs`, if any.
pub fn latest_block_number(logs: &[Log]) -> Option<u64> {
    logs.iter().filter_map(|log| log.block_number).max()
}

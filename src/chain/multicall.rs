//! Multicall3-backed chain reader
//!
//! Every logical read is one `aggregate3` eth_call with `allowFailure` set on
//! each sub-call, so a single reverting pair only fails its own slot. Calls
//! are pinned to a block when one is given and bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use alloy::eips::BlockId;
use alloy::primitives::aliases::U24;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::debug;

use super::{classify_rpc_error, ChainReader, ChainResult, RpcPoolState};
use crate::contracts::{ILBFactory, ILBPair, IMulticall3};
use crate::error::ChainError;
use crate::pool::Bin;

pub struct MulticallReader<P> {
    provider: Arc<P>,
    multicall: Address,
    timeout: Duration,
}

impl<P: Provider + 'static> MulticallReader<P> {
    pub fn new(provider: Arc<P>, multicall: Address, timeout: Duration) -> Self {
        Self {
            provider,
            multicall,
            timeout,
        }
    }

    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call3>,
        block: Option<u64>,
    ) -> ChainResult<Vec<IMulticall3::Result>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let expected = calls.len();

        let multicall = IMulticall3::new(self.multicall, self.provider.clone());
        let mut request = multicall.aggregate3(calls);
        if let Some(number) = block {
            request = request.block(BlockId::number(number));
        }

        let results = tokio::time::timeout(self.timeout, request.call())
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))?
            .map_err(|e| classify_rpc_error(e.to_string(), block))?;

        if results.len() != expected {
            return Err(ChainError::Decode {
                method: "aggregate3",
                reason: format!("{} results for {} calls", results.len(), expected),
            });
        }
        Ok(results)
    }
}

fn call3<C: SolCall>(target: Address, call: &C) -> IMulticall3::Call3 {
    IMulticall3::Call3 {
        target,
        allowFailure: true,
        callData: call.abi_encode().into(),
    }
}

/// Decode a sub-call result that must have succeeded.
fn decode<C: SolCall>(
    result: &IMulticall3::Result,
    target: Address,
    method: &'static str,
) -> ChainResult<C::Return> {
    if !result.success {
        return Err(ChainError::CallFailed { target, method });
    }
    C::abi_decode_returns(&result.returnData).map_err(|e| ChainError::Decode {
        method,
        reason: e.to_string(),
    })
}

/// Decode a best-effort sub-call; failures become `None`.
fn decode_opt<C: SolCall>(result: &IMulticall3::Result) -> Option<C::Return> {
    if !result.success {
        return None;
    }
    C::abi_decode_returns(&result.returnData).ok()
}

fn to_u64(value: U256, method: &'static str) -> ChainResult<u64> {
    u64::try_from(value).map_err(|_| ChainError::Decode {
        method,
        reason: format!("{} does not fit in u64", value),
    })
}

#[async_trait]
impl<P: Provider + 'static> ChainReader for MulticallReader<P> {
    async fn pool_state(&self, pool: Address, block: Option<u64>) -> ChainResult<RpcPoolState> {
        let calls = vec![
            call3(self.multicall, &IMulticall3::getCurrentBlockTimestampCall {}),
            call3(pool, &ILBPair::getReservesAndIdCall {}),
            call3(pool, &ILBPair::feeParametersCall {}),
        ];
        let results = self.aggregate(calls, block).await?;

        let timestamp = decode::<IMulticall3::getCurrentBlockTimestampCall>(
            &results[0],
            self.multicall,
            "getCurrentBlockTimestamp",
        )?;
        let reserves =
            decode::<ILBPair::getReservesAndIdCall>(&results[1], pool, "getReservesAndId")?;
        let fee_parameters =
            decode::<ILBPair::feeParametersCall>(&results[2], pool, "feeParameters")?;

        let active_bin_id = u32::try_from(reserves.activeId).map_err(|_| ChainError::Decode {
            method: "getReservesAndId",
            reason: format!("active id {} out of range", reserves.activeId),
        })?;

        Ok(RpcPoolState {
            block_timestamp: to_u64(timestamp, "getCurrentBlockTimestamp")?,
            reserves: [reserves.reserveX, reserves.reserveY],
            active_bin_id,
            fee_parameters: fee_parameters.into(),
        })
    }

    async fn bins(&self, pool: Address, ids: &[u32], block: Option<u64>) -> ChainResult<Vec<Bin>> {
        let calls = ids
            .iter()
            .flat_map(|&id| {
                [
                    call3(pool, &ILBPair::getBinCall {
                        id: U24::from_limbs([u64::from(id)]),
                    }),
                    call3(pool, &ILBPair::totalSupplyCall { id: U256::from(id) }),
                ]
            })
            .collect();
        let results = self.aggregate(calls, block).await?;

        let mut bins = Vec::with_capacity(ids.len());
        for (&id, pair) in ids.iter().zip(results.chunks_exact(2)) {
            let reserves = decode::<ILBPair::getBinCall>(&pair[0], pool, "getBin")?;
            let total_supply = decode::<ILBPair::totalSupplyCall>(&pair[1], pool, "totalSupply")?;
            bins.push(Bin {
                id,
                reserve_x: reserves.reserveX,
                reserve_y: reserves.reserveY,
                total_supply,
            });
        }
        debug!("Fetched {} bins of {} from chain", bins.len(), pool);
        Ok(bins)
    }

    async fn pair_count(&self, factory: Address) -> ChainResult<u64> {
        let contract = ILBFactory::new(factory, self.provider.clone());
        let call = contract.getNumberOfLBPairs();
        let count = tokio::time::timeout(self.timeout, call.call())
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))?
            .map_err(|e| classify_rpc_error(e.to_string(), None))?;
        to_u64(count, "getNumberOfLBPairs")
    }

    async fn pair_addresses(
        &self,
        factory: Address,
        start: u64,
        end: u64,
    ) -> ChainResult<Vec<Option<Address>>> {
        let calls = (start..end)
            .map(|index| {
                call3(factory, &ILBFactory::allLBPairsCall {
                    index: U256::from(index),
                })
            })
            .collect();
        let results = self.aggregate(calls, None).await?;
        Ok(results
            .iter()
            .map(decode_opt::<ILBFactory::allLBPairsCall>)
            .collect())
    }

    async fn pair_tokens(&self, pairs: &[Address]) -> ChainResult<Vec<Option<(Address, Address)>>> {
        let calls = pairs
            .iter()
            .flat_map(|&pair| {
                [
                    call3(pair, &ILBPair::tokenXCall {}),
                    call3(pair, &ILBPair::tokenYCall {}),
                ]
            })
            .collect();
        let results = self.aggregate(calls, None).await?;
        Ok(results
            .chunks_exact(2)
            .map(|pair| {
                let token_x = decode_opt::<ILBPair::tokenXCall>(&pair[0])?;
                let token_y = decode_opt::<ILBPair::tokenYCall>(&pair[1])?;
                Some((token_x, token_y))
            })
            .collect())
    }
}

//! Contract Definitions
//!
//! Solidity interfaces for the Liquidity Book v2.0 pair and factory plus
//! Multicall3, defined with alloy's `sol!` macro. The ABI surface is fixed at
//! compile time; deployment addresses come from configuration.

use alloy::sol;

// ── Liquidity Book v2.0 pair ─────────────────────────────────────────

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILBPair {
        struct FeeParameters {
            uint16 binStep;
            uint16 baseFactor;
            uint16 filterPeriod;
            uint16 decayPeriod;
            uint16 reductionFactor;
            uint24 variableFeeControl;
            uint16 protocolShare;
            uint24 maxVolatilityAccumulated;
            uint24 volatilityAccumulated;
            uint24 volatilityReference;
            uint24 indexRef;
            uint40 time;
        }

        function tokenX() external view returns (address);
        function tokenY() external view returns (address);
        function getReservesAndId() external view returns (uint256 reserveX, uint256 reserveY, uint256 activeId);
        function feeParameters() external view returns (FeeParameters memory);
        function getBin(uint24 id) external view returns (uint256 reserveX, uint256 reserveY);
        function totalSupply(uint256 id) external view returns (uint256);

        event Swap(address indexed sender, address indexed recipient, uint256 indexed id, bool swapForY, uint256 amountIn, uint256 amountOut, uint256 volatilityAccumulated, uint256 fees);
        event DepositedToBin(address indexed sender, address indexed recipient, uint256 indexed id, uint256 amountX, uint256 amountY);
        event WithdrawnFromBin(address indexed sender, address indexed recipient, uint256 indexed id, uint256 amountX, uint256 amountY);
        event TransferBatch(address indexed sender, address indexed from, address indexed to, uint256[] ids, uint256[] amounts);
    }
}

// ── Liquidity Book v2.0 factory ──────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface ILBFactory {
        function getNumberOfLBPairs() external view returns (uint256);
        function allLBPairs(uint256 index) external view returns (address);
    }
}

// ── Multicall3 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
        function getCurrentBlockTimestamp() external view returns (uint256 timestamp);
    }
}

impl From<ILBPair::FeeParameters> for crate::pool::FeeParameters {
    fn from(fp: ILBPair::FeeParameters) -> Self {
        Self {
            bin_step: fp.binStep,
            base_factor: fp.baseFactor,
            filter_period: fp.filterPeriod,
            decay_period: fp.decayPeriod,
            reduction_factor: fp.reductionFactor,
            variable_fee_control: fp.variableFeeControl.to(),
            protocol_share: fp.protocolShare,
            max_volatility_accumulated: fp.maxVolatilityAccumulated.to(),
            volatility_accumulated: fp.volatilityAccumulated.to(),
            volatility_reference: fp.volatilityReference.to(),
            index_ref: fp.indexRef.to(),
            time: fp.time.to(),
        }
    }
}

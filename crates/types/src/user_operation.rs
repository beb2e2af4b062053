use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// ERC-4337 v0.7 user operation in its unpacked RPC form.
///
/// `signature` stays empty until the operation is signed. Any change to the
/// other fields invalidates a previously computed operation hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    pub signature: Bytes,
}

/// Gas limits as estimated by a bundler or overridden by a paymaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasLimits {
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasFees {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Fields a paymaster returns when it agrees to sponsor an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsorship {
    pub paymaster: Address,
    pub paymaster_verification_gas_limit: U256,
    pub paymaster_post_op_gas_limit: U256,
    pub paymaster_data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
}

impl UserOperation {
    /// Unsigned, unsponsored operation with zero gas fields.
    pub fn new(sender: Address, nonce: U256, call_data: Bytes) -> Self {
        Self {
            sender,
            nonce,
            factory: None,
            factory_data: None,
            call_data,
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster: None,
            paymaster_verification_gas_limit: None,
            paymaster_post_op_gas_limit: None,
            paymaster_data: None,
            signature: Bytes::new(),
        }
    }

    /// Whether this operation deploys its sender.
    pub fn is_init(&self) -> bool {
        self.factory.is_some()
    }

    /// `factory ‖ factoryData`, empty for deployed senders.
    pub fn init_code(&self) -> Bytes {
        match (&self.factory, &self.factory_data) {
            (Some(factory), data) => {
                let mut out = factory.to_vec();
                if let Some(data) = data {
                    out.extend_from_slice(data);
                }
                out.into()
            }
            (None, _) => Bytes::new(),
        }
    }

    /// `paymaster ‖ uint128 verificationGas ‖ uint128 postOpGas ‖ paymasterData`,
    /// empty for self-funded operations.
    pub fn paymaster_and_data(&self) -> Bytes {
        let Some(paymaster) = self.paymaster else {
            return Bytes::new();
        };

        let mut out = paymaster.to_vec();
        out.extend_from_slice(&low_u128_bytes(
            self.paymaster_verification_gas_limit.unwrap_or_default(),
        ));
        out.extend_from_slice(&low_u128_bytes(
            self.paymaster_post_op_gas_limit.unwrap_or_default(),
        ));
        if let Some(data) = &self.paymaster_data {
            out.extend_from_slice(data);
        }
        out.into()
    }

    pub fn apply_gas_limits(&mut self, limits: GasLimits) {
        self.call_gas_limit = limits.call_gas_limit;
        self.verification_gas_limit = limits.verification_gas_limit;
        self.pre_verification_gas = limits.pre_verification_gas;
    }

    pub fn apply_fees(&mut self, fees: GasFees) {
        self.max_fee_per_gas = fees.max_fee_per_gas;
        self.max_priority_fee_per_gas = fees.max_priority_fee_per_gas;
    }

    /// Merge sponsorship fields into the operation.
    ///
    /// Applying the same sponsorship twice yields the same operation.
    pub fn apply_sponsorship(&mut self, sponsorship: &Sponsorship) {
        self.paymaster = Some(sponsorship.paymaster);
        self.paymaster_verification_gas_limit = Some(sponsorship.paymaster_verification_gas_limit);
        self.paymaster_post_op_gas_limit = Some(sponsorship.paymaster_post_op_gas_limit);
        self.paymaster_data = Some(sponsorship.paymaster_data.clone());

        if let Some(limit) = sponsorship.call_gas_limit {
            self.call_gas_limit = limit;
        }
        if let Some(limit) = sponsorship.verification_gas_limit {
            self.verification_gas_limit = limit;
        }
        if let Some(gas) = sponsorship.pre_verification_gas {
            self.pre_verification_gas = gas;
        }
        if let Some(fee) = sponsorship.max_fee_per_gas {
            self.max_fee_per_gas = fee;
        }
        if let Some(fee) = sponsorship.max_priority_fee_per_gas {
            self.max_priority_fee_per_gas = fee;
        }
    }
}

fn low_u128_bytes(value: U256) -> [u8; 16] {
    let full = value.to_be_bytes::<32>();
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[16..]);
    out
}

use alloy_primitives::{aliases::U176, aliases::U192, keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use safe_rpc::{ChainReader, RpcError};
use safe_types::{Operation, PublicKeyCoordinates, Signer, SubTransaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{SafeContracts, WebAuthnVerifierConfig};
use crate::contracts::{
    IEntryPoint, IMultiSend, ISafe, ISafeModuleSetup, ISafeProxyFactory, ISafeWebAuthnSharedSigner,
    ISafeWebAuthnSignerFactory, SENTINEL,
};
use crate::{AccountError, Result};

/// Owners and threshold a Safe is created with. Order matters: the same
/// signers in another order produce another address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSetup {
    pub signers: Vec<Signer>,
    pub threshold: u64,
}

impl AccountSetup {
    pub fn new(signers: Vec<Signer>, threshold: u64) -> Self {
        Self { signers, threshold }
    }

    /// Single-passkey account, the shape every new user starts with.
    pub fn single_passkey(public_key: PublicKeyCoordinates) -> Self {
        Self {
            signers: vec![Signer::from(public_key)],
            threshold: 1,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.signers.is_empty() {
            return Err(AccountError::InvalidSigners("no signers".into()));
        }
        if self.threshold == 0 || self.threshold as usize > self.signers.len() {
            return Err(AccountError::InvalidThreshold {
                threshold: self.threshold,
                signers: self.signers.len(),
            });
        }
        for (i, signer) in self.signers.iter().enumerate() {
            if self.signers[..i].contains(signer) {
                return Err(AccountError::InvalidSigners(format!(
                    "duplicate signer at position {}",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Index of the passkey configured on the shared WebAuthn signer.
    fn shared_signer_index(&self) -> Option<usize> {
        self.signers
            .iter()
            .position(|s| matches!(s, Signer::WebAuthn { .. }))
    }
}

/// A counterfactual Safe: its address is known before it exists on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeAccount {
    pub address: Address,
    pub setup: AccountSetup,
    /// Owners as passed to `setup`; the first passkey is represented by the
    /// shared WebAuthn signer until the init operation swaps it out.
    pub initial_owners: Vec<Address>,
    pub initializer: Bytes,
    pub factory_data: Bytes,
}

impl SafeAccount {
    /// Compute the deterministic address and deployment data of a Safe.
    ///
    /// Pure: no chain access. Identical inputs always give identical output.
    pub fn compute(
        setup: AccountSetup,
        contracts: &SafeContracts,
        webauthn: &WebAuthnVerifierConfig,
    ) -> Result<Self> {
        setup.validate()?;

        if contracts.proxy_creation_code.is_empty() {
            return Err(AccountError::Configuration(
                "proxy creation code is not configured".into(),
            ));
        }

        let shared_index = setup.shared_signer_index();
        let mut owners = Vec::with_capacity(setup.signers.len());
        for (i, signer) in setup.signers.iter().enumerate() {
            let owner = match signer {
                Signer::Address { address } => *address,
                Signer::WebAuthn { .. } if Some(i) == shared_index => {
                    contracts.webauthn_shared_signer
                }
                Signer::WebAuthn { public_key } => verifier_address(public_key, webauthn)?,
            };
            owners.push(owner);
        }

        let enable_modules = ISafeModuleSetup::enableModulesCall {
            modules: vec![contracts.safe_4337_module],
        }
        .abi_encode();

        let (setup_to, setup_data) = match shared_index.map(|i| &setup.signers[i]) {
            Some(Signer::WebAuthn { public_key }) => {
                let configure = ISafeWebAuthnSharedSigner::configureCall {
                    signer: ISafeWebAuthnSharedSigner::Signer {
                        x: public_key.x,
                        y: public_key.y,
                        verifiers: packed_verifiers_u176(webauthn)?,
                    },
                }
                .abi_encode();

                let mut packed = Vec::new();
                SubTransaction::call(contracts.module_setup, enable_modules)
                    .pack_for_multisend(Operation::DelegateCall, &mut packed);
                SubTransaction::call(contracts.webauthn_shared_signer, configure)
                    .pack_for_multisend(Operation::DelegateCall, &mut packed);

                let data = IMultiSend::multiSendCall {
                    transactions: packed.into(),
                }
                .abi_encode();
                (contracts.multi_send, data)
            }
            _ => (contracts.module_setup, enable_modules),
        };

        let initializer: Bytes = ISafe::setupCall {
            owners: owners.clone(),
            threshold: U256::from(setup.threshold),
            to: setup_to,
            data: setup_data.into(),
            fallbackHandler: contracts.safe_4337_module,
            paymentToken: Address::ZERO,
            payment: U256::ZERO,
            paymentReceiver: Address::ZERO,
        }
        .abi_encode()
        .into();

        let mut salt_preimage = keccak256(&initializer).to_vec();
        salt_preimage.extend_from_slice(&contracts.salt_nonce.to_be_bytes::<32>());
        let salt = keccak256(&salt_preimage);

        let mut init_code = contracts.proxy_creation_code.to_vec();
        init_code.extend_from_slice(contracts.safe_singleton.into_word().as_slice());
        let address = contracts.proxy_factory.create2_from_code(salt, &init_code);

        let factory_data = ISafeProxyFactory::createProxyWithNonceCall {
            singleton: contracts.safe_singleton,
            initializer: initializer.clone(),
            saltNonce: contracts.salt_nonce,
        }
        .abi_encode()
        .into();

        debug!(%address, owners = owners.len(), threshold = setup.threshold, "Computed counterfactual Safe");

        Ok(Self {
            address,
            setup,
            initial_owners: owners,
            initializer,
            factory_data,
        })
    }

    /// Calls the init operation runs before the caller's own transactions:
    /// deploy a signer proxy for every passkey, then replace the shared
    /// signer owner with the first passkey's proxy.
    pub fn init_transactions(
        &self,
        contracts: &SafeContracts,
        webauthn: &WebAuthnVerifierConfig,
    ) -> Result<Vec<SubTransaction>> {
        let mut txs = Vec::new();
        let verifiers = packed_verifiers_u176(webauthn)?;

        for (i, signer) in self.setup.signers.iter().enumerate() {
            let Signer::WebAuthn { public_key } = signer else {
                continue;
            };

            txs.push(SubTransaction::call(
                webauthn.signer_factory,
                ISafeWebAuthnSignerFactory::createSignerCall {
                    x: public_key.x,
                    y: public_key.y,
                    verifiers,
                }
                .abi_encode(),
            ));

            if self.initial_owners[i] == contracts.webauthn_shared_signer {
                let prev_owner = if i == 0 {
                    SENTINEL
                } else {
                    self.initial_owners[i - 1]
                };
                txs.push(SubTransaction::call(
                    self.address,
                    ISafe::swapOwnerCall {
                        prevOwner: prev_owner,
                        oldOwner: contracts.webauthn_shared_signer,
                        newOwner: verifier_address(public_key, webauthn)?,
                    }
                    .abi_encode(),
                ));
            }
        }

        Ok(txs)
    }
}

/// On-chain owner address of a passkey: the CREATE2 address of its WebAuthn
/// signer proxy, whether or not that proxy is deployed yet.
pub fn verifier_address(
    public_key: &PublicKeyCoordinates,
    webauthn: &WebAuthnVerifierConfig,
) -> Result<Address> {
    if webauthn.signer_proxy_creation_code.is_empty() {
        return Err(AccountError::Configuration(
            "WebAuthn signer proxy creation code is not configured".into(),
        ));
    }

    let mut init_code = webauthn.signer_proxy_creation_code.to_vec();
    init_code.extend_from_slice(webauthn.signer_singleton.into_word().as_slice());
    init_code.extend_from_slice(&public_key.x.to_be_bytes::<32>());
    init_code.extend_from_slice(&public_key.y.to_be_bytes::<32>());
    init_code.extend_from_slice(&webauthn.packed_verifiers().to_be_bytes::<32>());

    Ok(webauthn
        .signer_factory
        .create2_from_code(B256::ZERO, &init_code))
}

pub(crate) fn packed_verifiers_u176(webauthn: &WebAuthnVerifierConfig) -> Result<U176> {
    let packed = webauthn.packed_verifiers().to_be_bytes::<32>();
    U176::try_from_be_slice(&packed[10..])
        .ok_or_else(|| AccountError::Configuration("verifier addresses overflow uint176".into()))
}

/// Whether `address` has bytecode.
///
/// Any definitive answer that is not bytecode, including an RPC error
/// response, means "not deployed yet". Transport failures propagate.
pub async fn is_contract_deployed(
    chain: &dyn ChainReader,
    address: Address,
) -> std::result::Result<bool, RpcError> {
    match chain.get_code(address).await {
        Ok(code) => Ok(!code.is_empty()),
        Err(e) if e.is_transport() => Err(e),
        Err(e) => {
            warn!(%address, error = %e, "Bytecode lookup failed, treating account as undeployed");
            Ok(false)
        }
    }
}

/// `eth_call` a view function and decode its return value.
pub async fn read_contract<C>(chain: &dyn ChainReader, to: Address, call: C) -> Result<C::Return>
where
    C: SolCall + Send,
{
    let output = chain
        .call(to, call.abi_encode().into())
        .await
        .map_err(|e| classify_read_error(to, e))?;

    C::abi_decode_returns(&output, true).map_err(|e| AccountError::ReadReverted {
        address: to,
        reason: format!("undecodable return data: {}", e),
    })
}

fn classify_read_error(address: Address, error: RpcError) -> AccountError {
    if error.is_transport() {
        AccountError::Rpc(error)
    } else {
        AccountError::ReadReverted {
            address,
            reason: error.to_string(),
        }
    }
}

async fn ensure_deployed(chain: &dyn ChainReader, address: Address) -> Result<()> {
    if is_contract_deployed(chain, address).await? {
        Ok(())
    } else {
        Err(AccountError::NotDeployed(address))
    }
}

/// Current owner threshold of a deployed Safe. Never reports zero for an
/// account that cannot be read.
pub async fn get_threshold(chain: &dyn ChainReader, address: Address) -> Result<u64> {
    ensure_deployed(chain, address).await?;
    let threshold = read_contract(chain, address, ISafe::getThresholdCall {}).await?;
    Ok(threshold._0.saturating_to::<u64>())
}

pub async fn get_owners(chain: &dyn ChainReader, address: Address) -> Result<Vec<Address>> {
    ensure_deployed(chain, address).await?;
    let owners = read_contract(chain, address, ISafe::getOwnersCall {}).await?;
    Ok(owners._0)
}

/// Next entry point nonce (key 0) of a deployed account.
pub async fn get_nonce(
    chain: &dyn ChainReader,
    entry_point: Address,
    sender: Address,
) -> Result<U256> {
    let nonce = read_contract(
        chain,
        entry_point,
        IEntryPoint::getNonceCall {
            sender,
            key: U192::ZERO,
        },
    )
    .await?;
    Ok(nonce.nonce)
}

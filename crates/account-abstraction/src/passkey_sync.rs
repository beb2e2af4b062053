use std::collections::HashSet;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use safe_rpc::ChainReader;
use safe_types::{
    Passkey, PasskeyRecord, PasskeyStatus, PublicKeyCoordinates, RegisteredPasskey, SubTransaction,
};
use tracing::{debug, warn};

use crate::account::{get_owners, packed_verifiers_u176, verifier_address};
use crate::config::WebAuthnVerifierConfig;
use crate::contracts::{ISafe, ISafeWebAuthnSignerFactory};
use crate::{AccountError, Result};

/// Classify each registered passkey against the account's on-chain owners.
///
/// Never fails. A passkey without a usable key is `Unknown`; if the owner
/// list cannot be read every passkey is `Unknown`. An undeployed account
/// has no owners yet, so its passkeys are `PendingOnchain`.
pub async fn sync_passkeys_with_safe(
    chain: &dyn ChainReader,
    webauthn: &WebAuthnVerifierConfig,
    account: Address,
    passkeys: &[RegisteredPasskey],
) -> Vec<Passkey> {
    let owners: Option<HashSet<Address>> = match get_owners(chain, account).await {
        Ok(owners) => Some(owners.into_iter().collect()),
        Err(AccountError::NotDeployed(_)) => Some(HashSet::new()),
        Err(e) => {
            warn!(%account, error = %e, "Owner lookup failed, passkey statuses unknown");
            None
        }
    };

    let synced: Vec<Passkey> = passkeys
        .iter()
        .map(|registered| {
            let owner_address = registered.public_key.as_ref().and_then(|key| {
                verifier_address(key, webauthn)
                    .map_err(|e| {
                        warn!(passkey = %registered.id, error = %e, "Cannot derive passkey owner")
                    })
                    .ok()
            });

            let status = match (&owners, owner_address) {
                (Some(owners), Some(owner)) if owners.contains(&owner) => {
                    PasskeyStatus::ActiveOnchain
                }
                (Some(_), Some(_)) => PasskeyStatus::PendingOnchain,
                _ => PasskeyStatus::Unknown,
            };

            Passkey {
                registered: registered.clone(),
                owner_address,
                status,
            }
        })
        .collect();

    debug!(
        %account,
        total = synced.len(),
        active = synced.iter().filter(|p| p.status == PasskeyStatus::ActiveOnchain).count(),
        "Synchronized passkeys"
    );
    synced
}

/// Parse raw persisted rows at the boundary, then sync.
pub async fn sync_passkey_records(
    chain: &dyn ChainReader,
    webauthn: &WebAuthnVerifierConfig,
    account: Address,
    records: Vec<PasskeyRecord>,
) -> Vec<Passkey> {
    let registered: Vec<RegisteredPasskey> = records
        .into_iter()
        .map(RegisteredPasskey::from_record)
        .collect();
    sync_passkeys_with_safe(chain, webauthn, account, &registered).await
}

/// Calls that make a pending passkey an owner: deploy its signer proxy,
/// then add the proxy as owner with `threshold`.
pub fn create_add_passkey_owner_transaction(
    account: Address,
    public_key: &PublicKeyCoordinates,
    threshold: u64,
    webauthn: &WebAuthnVerifierConfig,
) -> Result<Vec<SubTransaction>> {
    let owner = verifier_address(public_key, webauthn)?;

    Ok(vec![
        SubTransaction::call(
            webauthn.signer_factory,
            ISafeWebAuthnSignerFactory::createSignerCall {
                x: public_key.x,
                y: public_key.y,
                verifiers: packed_verifiers_u176(webauthn)?,
            }
            .abi_encode(),
        ),
        SubTransaction::call(
            account,
            ISafe::addOwnerWithThresholdCall {
                owner,
                threshold: U256::from(threshold),
            }
            .abi_encode(),
        ),
    ])
}

//! Wallet capability surface and the native SegWit implementation.

use std::sync::OnceLock;

use zeroize::Zeroizing;

use ember_btc::address;
use ember_btc::error::CoreError;
use ember_btc::keys::KeyMaterial;
use ember_btc::network::Network;
use ember_btc::transaction::{self, BuiltTransaction};
use ember_btc::utxo::{Target, Utxo};

/// Capabilities a wallet variant exposes to the surrounding application.
///
/// Each address-type variant opts into the operations it supports; the
/// permission methods default to `false`.
pub trait Wallet {
    /// The wallet's receive address.
    fn derive_address(&self) -> Result<String, CoreError>;

    /// Build a transaction spending `utxos` to `targets`.
    ///
    /// With `skip_signing` the returned PSBT is left for an out-of-band
    /// signer identified by `master_fingerprint`; otherwise the result
    /// carries a fully signed, broadcastable transaction.
    fn create_transaction(
        &self,
        utxos: &[Utxo],
        targets: &[Target],
        fee_rate_sat_vbyte: u64,
        change_address: &str,
        sequence: Option<u32>,
        skip_signing: bool,
        master_fingerprint: Option<u32>,
    ) -> Result<BuiltTransaction, CoreError>;

    /// Whether this variant can spend.
    fn allow_send(&self) -> bool {
        false
    }

    /// Whether this variant can sign and verify free-form messages.
    fn allow_sign_verify_message(&self) -> bool {
        false
    }
}

/// A single-key wallet that receives and spends through native SegWit
/// (P2WPKH) addresses.
pub struct SegwitWallet {
    secret: Zeroizing<String>,
    network: Network,
    address: OnceLock<String>,
}

impl SegwitWallet {
    /// Create a wallet around a WIF-encoded secret.
    ///
    /// The secret is not validated here; parse failures surface from the
    /// operations that need key material.
    pub fn new(secret_wif: impl Into<String>, network: Network) -> Self {
        Self {
            secret: Zeroizing::new(secret_wif.into()),
            network,
            address: OnceLock::new(),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn key_material(&self) -> Result<KeyMaterial, CoreError> {
        KeyMaterial::from_wif(&self.secret, self.network)
    }
}

impl Wallet for SegwitWallet {
    /// Derive the wallet's P2WPKH address, memoizing it after the first
    /// success. Concurrent first calls may recompute; derivation is
    /// idempotent and the first stored value wins.
    fn derive_address(&self) -> Result<String, CoreError> {
        if let Some(cached) = self.address.get() {
            return Ok(cached.clone());
        }
        let key = self.key_material()?;
        let derived = address::address_from_key(&key, self.network)?;
        Ok(self.address.get_or_init(|| derived).clone())
    }

    fn create_transaction(
        &self,
        utxos: &[Utxo],
        targets: &[Target],
        fee_rate_sat_vbyte: u64,
        change_address: &str,
        sequence: Option<u32>,
        skip_signing: bool,
        master_fingerprint: Option<u32>,
    ) -> Result<BuiltTransaction, CoreError> {
        if targets.is_empty() {
            return Err(CoreError::NoTargets);
        }
        let key = if skip_signing {
            None
        } else {
            Some(
                self.key_material()
                    .map_err(|e| CoreError::KeyResolution(e.to_string()))?,
            )
        };
        transaction::create_transaction(
            utxos,
            targets,
            fee_rate_sat_vbyte,
            change_address,
            sequence,
            key.as_ref(),
            master_fingerprint,
            self.network,
        )
    }

    fn allow_send(&self) -> bool {
        true
    }

    fn allow_sign_verify_message(&self) -> bool {
        true
    }
}

//! P2WPKH transaction assembly, signing, and finalization.
//!
//! Builds are two-phase: assembly always produces a PSBT carrying full
//! witness context per input (`witness_utxo`, and the previous transaction
//! when the caller supplied it). Signing and finalization run in the same
//! call unless the caller defers them to an out-of-band signer, in which
//! case the PSBT is completed later via [`sign_psbt`] and [`finalize_psbt`].

use std::collections::BTreeMap;

use bitcoin::absolute::LockTime;
use bitcoin::bip32::{DerivationPath, Fingerprint};
use bitcoin::consensus;
use bitcoin::hashes::Hash;
use bitcoin::key::CompressedPublicKey;
use bitcoin::psbt::Psbt;
use bitcoin::script::ScriptBuf;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use tracing::debug;

use crate::address::parse_address;
use crate::coinselect::{self, Selection};
use crate::error::CoreError;
use crate::keys::KeyMaterial;
use crate::network::Network;
use crate::utxo::{Target, TxRecipient, Utxo};

/// A constructed transaction and its context.
#[derive(Debug)]
pub struct BuiltTransaction {
    /// The broadcastable transaction; `None` when signing was deferred.
    pub tx: Option<Transaction>,
    /// The UTXOs consumed, in input order.
    pub inputs: Vec<Utxo>,
    /// The outputs created, change address resolved, in output order.
    pub outputs: Vec<TxRecipient>,
    /// Fee paid, in satoshis.
    pub fee_sat: u64,
    /// The partially signed transaction. Carries the witness context an
    /// out-of-band signer needs to complete a deferred build; finalized
    /// in place when signing ran here.
    pub psbt: Psbt,
    /// Master fingerprint of the intended signer, when supplied.
    pub master_fingerprint: Option<Fingerprint>,
}

/// Build a transaction paying `targets` out of `utxos`.
///
/// Runs coin selection, assembles the unsigned transaction and its PSBT,
/// and, when `signing_key` is present, signs every input and finalizes the
/// result. `sequence` applies to every input and defaults to the maximum,
/// which opts out of replace-by-fee. With no signing key the returned PSBT
/// awaits an out-of-band signer and `master_fingerprint` identifies it.
pub fn create_transaction(
    utxos: &[Utxo],
    targets: &[Target],
    fee_rate_sat_vbyte: u64,
    change_address: &str,
    sequence: Option<u32>,
    signing_key: Option<&KeyMaterial>,
    master_fingerprint: Option<u32>,
    network: Network,
) -> Result<BuiltTransaction, CoreError> {
    if targets.is_empty() {
        return Err(CoreError::NoTargets);
    }
    let sequence = Sequence(sequence.unwrap_or(u32::MAX));
    let fingerprint = master_fingerprint.map(|fp| Fingerprint::from(fp.to_be_bytes()));

    // Resolve the public key up front: a key failure must abort the build
    // before any signing state exists.
    let signer_pubkey = match signing_key {
        Some(key) => Some(key.public_key()?),
        None => None,
    };

    let selection = coinselect::select_coins(utxos, targets, fee_rate_sat_vbyte)?;

    let outputs: Vec<TxRecipient> = selection
        .outputs
        .iter()
        .map(|payment| TxRecipient {
            address: payment
                .address
                .clone()
                .unwrap_or_else(|| change_address.to_string()),
            value_sat: payment.value_sat,
        })
        .collect();

    let mut psbt = assemble(
        &selection,
        change_address,
        sequence,
        signer_pubkey.as_ref(),
        fingerprint,
        network,
    )?;

    let tx = match signing_key {
        Some(key) => {
            sign_psbt(&mut psbt, key)?;
            Some(finalize_psbt(&mut psbt)?)
        }
        None => None,
    };

    debug_assert_eq!(
        selection.inputs.iter().map(|u| u.value_sat).sum::<u64>(),
        outputs.iter().map(|o| o.value_sat).sum::<u64>() + selection.fee_sat,
    );
    debug!(
        inputs = selection.inputs.len(),
        outputs = outputs.len(),
        fee_sat = selection.fee_sat,
        signed = tx.is_some(),
        "transaction built"
    );

    Ok(BuiltTransaction {
        tx,
        inputs: selection.inputs,
        outputs,
        fee_sat: selection.fee_sat,
        psbt,
        master_fingerprint: fingerprint,
    })
}

/// Assemble the unsigned transaction for a selection and wrap it in a PSBT
/// with per-input witness context.
fn assemble(
    selection: &Selection,
    change_address: &str,
    sequence: Sequence,
    signer_pubkey: Option<&CompressedPublicKey>,
    fingerprint: Option<Fingerprint>,
    network: Network,
) -> Result<Psbt, CoreError> {
    let spend_script = signer_pubkey.map(|pk| ScriptBuf::new_p2wpkh(&pk.wpubkey_hash()));

    let mut tx_inputs = Vec::with_capacity(selection.inputs.len());
    let mut witness_utxos = Vec::with_capacity(selection.inputs.len());
    let mut prev_txs = Vec::with_capacity(selection.inputs.len());
    for utxo in &selection.inputs {
        let txid: Txid = utxo
            .txid
            .parse()
            .map_err(|e| CoreError::InvalidEncoding(format!("invalid txid {}: {e}", utxo.txid)))?;

        let script_pubkey = match &spend_script {
            Some(script) => script.clone(),
            // Deferred signing: the witness context comes from the UTXO's
            // own source address.
            None => parse_address(&utxo.address, network)?.script_pubkey(),
        };

        tx_inputs.push(TxIn {
            previous_output: OutPoint::new(txid, utxo.vout),
            script_sig: ScriptBuf::new(), // Empty for segwit.
            sequence,
            witness: Witness::default(),
        });
        witness_utxos.push(TxOut {
            value: Amount::from_sat(utxo.value_sat),
            script_pubkey,
        });
        prev_txs.push(match &utxo.raw_tx_hex {
            Some(raw) => {
                let bytes = hex::decode(raw).map_err(|e| {
                    CoreError::InvalidEncoding(format!("previous transaction is not hex: {e}"))
                })?;
                let prev: Transaction = consensus::deserialize(&bytes).map_err(|e| {
                    CoreError::InvalidEncoding(format!("previous transaction is malformed: {e}"))
                })?;
                Some(prev)
            }
            None => None,
        });
    }

    let mut tx_outputs = Vec::with_capacity(selection.outputs.len());
    for payment in &selection.outputs {
        let address = payment.address.as_deref().unwrap_or(change_address);
        tx_outputs.push(TxOut {
            value: Amount::from_sat(payment.value_sat),
            script_pubkey: parse_address(address, network)?.script_pubkey(),
        });
    }

    let unsigned_tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: tx_inputs,
        output: tx_outputs,
    };
    let mut psbt =
        Psbt::from_unsigned_tx(unsigned_tx).map_err(|e| CoreError::Signing(e.to_string()))?;

    for ((input, witness_utxo), prev_tx) in
        psbt.inputs.iter_mut().zip(witness_utxos).zip(prev_txs)
    {
        input.witness_utxo = Some(witness_utxo);
        input.non_witness_utxo = prev_tx;
        if let (Some(pubkey), Some(fp)) = (signer_pubkey, fingerprint) {
            input
                .bip32_derivation
                .insert(pubkey.0, (fp, DerivationPath::master()));
        }
    }
    Ok(psbt)
}

/// Sign every input of a P2WPKH PSBT with one key (BIP-143 sighash,
/// SIGHASH_ALL) and record the signatures as partial signatures.
pub fn sign_psbt(psbt: &mut Psbt, key: &KeyMaterial) -> Result<(), CoreError> {
    let pubkey = key.public_key()?;
    let script_code = ScriptBuf::new_p2wpkh(&pubkey.wpubkey_hash());
    let unsigned_tx = psbt.unsigned_tx.clone();
    let mut sighash_cache = SighashCache::new(&unsigned_tx);

    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        let value = input
            .witness_utxo
            .as_ref()
            .ok_or_else(|| CoreError::Signing(format!("input {index} has no witness utxo")))?
            .value;
        let sighash = sighash_cache
            .p2wpkh_signature_hash(index, &script_code, value, EcdsaSighashType::All)
            .map_err(|e| CoreError::Signing(format!("sighash computation failed: {e}")))?;
        let signature = key.sign(sighash.to_byte_array());
        input.partial_sigs.insert(
            bitcoin::PublicKey::new(pubkey.0),
            bitcoin::ecdsa::Signature::sighash_all(signature),
        );
    }
    Ok(())
}

/// Turn every partial signature into a final `[signature, pubkey]` witness
/// and extract the broadcastable transaction.
///
/// Fails if any input is missing its signature; a partially signed PSBT is
/// never extracted.
pub fn finalize_psbt(psbt: &mut Psbt) -> Result<Transaction, CoreError> {
    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        let (pubkey, signature) = input
            .partial_sigs
            .iter()
            .next()
            .map(|(pk, sig)| (*pk, *sig))
            .ok_or_else(|| CoreError::Signing(format!("input {index} is missing a signature")))?;
        input.final_script_witness = Some(Witness::p2wpkh(&signature, &pubkey.inner));
        input.partial_sigs = BTreeMap::new();
        input.bip32_derivation = BTreeMap::new();
    }
    psbt.clone()
        .extract_tx()
        .map_err(|e| CoreError::Signing(e.to_string()))
}

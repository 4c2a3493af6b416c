//! Cross-crate integration tests exercising the full pipeline:
//! secret -> derive address -> select coins -> build -> sign -> finalize.
//!
//! These tests use the public wallet API end to end, including the deferred
//! (two-phase) signing path, to catch regressions at crate boundaries.

use bitcoin::consensus;
use bitcoin::psbt::Psbt;

use ember_btc::coinselect::estimate_fee;
use ember_btc::keys::KeyMaterial;
use ember_btc::transaction::{finalize_psbt, sign_psbt};
use ember_wallet::{CoreError, Network, SegwitWallet, Target, Utxo, Wallet};

/// WIF for secret key 0x...01 (compressed, mainnet); the BIP-143 example key.
const WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
const WALLET_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

fn test_wallet() -> SegwitWallet {
    SegwitWallet::new(WIF, Network::Mainnet)
}

/// A distinct change destination, derived from a fixed witness program.
fn change_address() -> String {
    ember_btc::address::witness_to_address(&"11".repeat(20), Network::Mainnet).unwrap()
}

fn make_utxo(txid_byte: char, value_sat: u64) -> Utxo {
    Utxo {
        txid: txid_byte.to_string().repeat(64),
        vout: 0,
        value_sat,
        address: WALLET_ADDRESS.to_string(),
        raw_tx_hex: None,
    }
}

fn make_target(address: &str, value_sat: u64) -> Target {
    Target {
        address: address.to_string(),
        value_sat,
    }
}

#[test]
fn full_pipeline_signed_payment_with_change() {
    let wallet = test_wallet();
    assert_eq!(wallet.derive_address().unwrap(), WALLET_ADDRESS);
    assert!(wallet.allow_send());

    let change = change_address();
    let utxos = vec![make_utxo('a', 100_000)];
    let built = wallet
        .create_transaction(
            &utxos,
            &[make_target(WALLET_ADDRESS, 50_000)],
            1,
            &change,
            None,
            false,
            None,
        )
        .unwrap();

    // Recipient first, change last, change address substituted.
    assert_eq!(built.outputs.len(), 2);
    assert_eq!(built.outputs[0].address, WALLET_ADDRESS);
    assert_eq!(built.outputs[0].value_sat, 50_000);
    assert_eq!(built.outputs[1].address, change);
    assert_eq!(built.fee_sat, estimate_fee(1, 2, 1));

    // Value conservation, to the satoshi.
    let in_sum: u64 = built.inputs.iter().map(|u| u.value_sat).sum();
    let out_sum: u64 = built.outputs.iter().map(|o| o.value_sat).sum();
    assert_eq!(in_sum, out_sum + built.fee_sat);

    // The signed transaction mirrors the skeleton.
    let tx = built.tx.expect("signed build returns a transaction");
    assert_eq!(tx.input.len(), built.psbt.unsigned_tx.input.len());
    assert_eq!(tx.output.len(), built.psbt.unsigned_tx.output.len());
    for input in &tx.input {
        assert_eq!(input.witness.len(), 2);
    }
}

#[test]
fn full_pipeline_sweep() {
    let wallet = test_wallet();
    let utxos = vec![
        make_utxo('a', 40_000),
        make_utxo('b', 35_000),
        make_utxo('c', 25_000),
    ];

    let built = wallet
        .create_transaction(
            &utxos,
            &[make_target(WALLET_ADDRESS, 0)],
            2,
            &change_address(),
            None,
            false,
            None,
        )
        .unwrap();

    // Sweep: all inputs spent, a single output worth total minus fee.
    assert_eq!(built.inputs.len(), 3);
    assert_eq!(built.outputs.len(), 1);
    let fee = estimate_fee(3, 1, 2);
    assert_eq!(built.fee_sat, fee);
    assert_eq!(built.outputs[0].value_sat, 100_000 - fee);
    assert_eq!(built.outputs[0].address, WALLET_ADDRESS);
    assert!(built.tx.is_some());
}

#[test]
fn two_phase_signing_matches_one_phase() {
    let wallet = test_wallet();
    let change = change_address();
    let utxos = vec![make_utxo('d', 90_000), make_utxo('e', 90_000)];
    let targets = vec![make_target(WALLET_ADDRESS, 140_000)];

    // Phase split: build unsigned, ship the PSBT through its serialized
    // form, then complete it with standalone key material.
    let deferred = wallet
        .create_transaction(&utxos, &targets, 3, &change, None, true, Some(0x1234_5678))
        .unwrap();
    assert!(deferred.tx.is_none());
    assert_eq!(deferred.psbt.inputs.len(), deferred.inputs.len());

    let shipped = Psbt::deserialize(&deferred.psbt.serialize()).unwrap();
    assert_eq!(shipped, deferred.psbt);

    let key = KeyMaterial::from_wif(WIF, Network::Mainnet).unwrap();
    let mut completing = shipped;
    sign_psbt(&mut completing, &key).unwrap();
    let completed_tx = finalize_psbt(&mut completing).unwrap();

    // One-shot signing of the same request.
    let direct = wallet
        .create_transaction(&utxos, &targets, 3, &change, None, false, Some(0x1234_5678))
        .unwrap();
    let direct_tx = direct.tx.unwrap();

    // Deterministic ECDSA: both paths produce identical bytes.
    assert_eq!(
        consensus::serialize(&completed_tx),
        consensus::serialize(&direct_tx)
    );
}

#[test]
fn deferred_build_leaves_no_signatures() {
    let wallet = test_wallet();
    let built = wallet
        .create_transaction(
            &[make_utxo('f', 100_000)],
            &[make_target(WALLET_ADDRESS, 50_000)],
            1,
            &change_address(),
            None,
            true,
            None,
        )
        .unwrap();

    assert!(built.tx.is_none());
    for input in &built.psbt.inputs {
        assert!(input.partial_sigs.is_empty());
        assert!(input.final_script_witness.is_none());
        assert!(input.witness_utxo.is_some());
    }
}

#[test]
fn rbf_opt_in_sequence_reaches_the_wire() {
    let wallet = test_wallet();
    let built = wallet
        .create_transaction(
            &[make_utxo('a', 100_000)],
            &[make_target(WALLET_ADDRESS, 50_000)],
            1,
            &change_address(),
            Some(0xFFFF_FFFD),
            false,
            None,
        )
        .unwrap();
    let tx = built.tx.unwrap();
    assert!(tx.input.iter().all(|i| i.sequence.0 == 0xFFFF_FFFD));
}

#[test]
fn no_targets_fails_before_anything_is_signed() {
    let wallet = test_wallet();
    let err = wallet
        .create_transaction(&[], &[], 1, &change_address(), None, false, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::NoTargets));
}

#[test]
fn insufficient_funds_aborts_the_build() {
    let wallet = test_wallet();
    let err = wallet
        .create_transaction(
            &[make_utxo('a', 1_000)],
            &[make_target(WALLET_ADDRESS, 900_000)],
            1,
            &change_address(),
            None,
            false,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InsufficientFunds { .. }));
}

#[test]
fn codec_and_wallet_agree_on_the_address() {
    let wallet = test_wallet();
    let derived = wallet.derive_address().unwrap();

    let key = KeyMaterial::from_wif(WIF, Network::Mainnet).unwrap();
    let pubkey_hex = key.public_key().unwrap().to_string();
    let from_witness =
        ember_btc::address::witness_to_address(&pubkey_hex, Network::Mainnet).unwrap();
    assert_eq!(derived, from_witness);

    // Address -> scriptPubKey -> address round-trip.
    let script = ember_btc::address::parse_address(&derived, Network::Mainnet)
        .unwrap()
        .script_pubkey();
    let roundtripped =
        ember_btc::address::script_pubkey_to_address(&hex::encode(script.as_bytes()), Network::Mainnet)
            .unwrap();
    assert_eq!(roundtripped, derived);
}

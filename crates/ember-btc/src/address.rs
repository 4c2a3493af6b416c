use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::hashes::Hash;
use bitcoin::key::CompressedPublicKey;
use bitcoin::script::ScriptBuf;
use bitcoin::WPubkeyHash;

use crate::error::CoreError;
use crate::keys::KeyMaterial;
use crate::network::Network;

/// Length of a compressed secp256k1 public key.
const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Length of a P2WPKH witness program (HASH160 of the public key).
const KEY_HASH_LEN: usize = 20;

/// Derive the P2WPKH (native SegWit bech32) address for a wallet key.
///
/// Fails with `UnsupportedKeyFormat` if the key is uncompressed; witness
/// programs commit to the hash of a compressed key only.
pub fn address_from_key(key: &KeyMaterial, network: Network) -> Result<String, CoreError> {
    let pubkey = key.public_key()?;
    Ok(Address::p2wpkh(&pubkey, network.to_bitcoin_network()).to_string())
}

/// Encode a raw witness, given as hex, into a P2WPKH address.
///
/// The witness is either a 33-byte compressed public key or the 20-byte
/// hash it commits to. Malformed hex, a wrong length, or an invalid curve
/// point all fail with `InvalidEncoding`.
pub fn witness_to_address(witness_hex: &str, network: Network) -> Result<String, CoreError> {
    let bytes = hex::decode(witness_hex)
        .map_err(|e| CoreError::InvalidEncoding(format!("witness is not hex: {e}")))?;
    match bytes.len() {
        COMPRESSED_PUBKEY_LEN => {
            let pubkey = CompressedPublicKey::from_slice(&bytes)
                .map_err(|e| CoreError::InvalidEncoding(format!("invalid public key: {e}")))?;
            Ok(Address::p2wpkh(&pubkey, network.to_bitcoin_network()).to_string())
        }
        KEY_HASH_LEN => {
            let hash = WPubkeyHash::from_slice(&bytes)
                .map_err(|e| CoreError::InvalidEncoding(format!("invalid key hash: {e}")))?;
            address_of_script(&ScriptBuf::new_p2wpkh(&hash), network)
        }
        n => Err(CoreError::InvalidEncoding(format!(
            "witness must be {COMPRESSED_PUBKEY_LEN} or {KEY_HASH_LEN} bytes, got {n}"
        ))),
    }
}

/// Convert a hex scriptPubKey to a bech32 address if it is the version-0
/// keyhash pattern (`OP_0 PUSH20`). Any other script shape fails with
/// `InvalidEncoding`.
pub fn script_pubkey_to_address(script_hex: &str, network: Network) -> Result<String, CoreError> {
    let bytes = hex::decode(script_hex)
        .map_err(|e| CoreError::InvalidEncoding(format!("script is not hex: {e}")))?;
    let script = ScriptBuf::from(bytes);
    if !script.is_p2wpkh() {
        return Err(CoreError::InvalidEncoding(
            "script is not a p2wpkh output".into(),
        ));
    }
    address_of_script(&script, network)
}

/// Parse and network-check a destination address.
pub fn parse_address(address: &str, network: Network) -> Result<Address, CoreError> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| CoreError::InvalidAddress(format!("failed to parse address: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|e| CoreError::InvalidAddress(format!("address is for the wrong network: {e}")))
}

fn address_of_script(script: &ScriptBuf, network: Network) -> Result<String, CoreError> {
    Address::from_script(script, network.to_bitcoin_network())
        .map(|address| address.to_string())
        .map_err(|e| CoreError::InvalidEncoding(e.to_string()))
}

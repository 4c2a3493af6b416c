use bitcoin::key::{CompressedPublicKey, PrivateKey};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1};
use bitcoin::NetworkKind;
use tracing::warn;

use crate::error::CoreError;
use crate::network::Network;

/// Signing capability for a single wallet key.
///
/// Parsed from a WIF-encoded secret. Exposes the compressed public key and
/// raw-sighash ECDSA signing; the secret scalar never leaves this type.
pub struct KeyMaterial {
    key: PrivateKey,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Parse a WIF-encoded secret for the given network.
    ///
    /// Fails with `InvalidSecret` if the string is not WIF or encodes a key
    /// for a different network kind. Uncompressed keys parse successfully;
    /// they are rejected by [`KeyMaterial::public_key`] instead, so callers
    /// can distinguish a garbled secret from a merely unusable one.
    pub fn from_wif(wif: &str, network: Network) -> Result<Self, CoreError> {
        let key =
            PrivateKey::from_wif(wif).map_err(|e| CoreError::InvalidSecret(e.to_string()))?;
        if key.network != NetworkKind::from(network.to_bitcoin_network()) {
            return Err(CoreError::InvalidSecret(format!(
                "secret is for a different network than {network}"
            )));
        }
        Ok(Self { key })
    }

    /// The compressed 33-byte public key.
    ///
    /// Fails with `UnsupportedKeyFormat` if the WIF encoded an uncompressed
    /// key.
    pub fn public_key(&self) -> Result<CompressedPublicKey, CoreError> {
        if !self.key.compressed {
            warn!("only compressed public keys are good for segwit");
            return Err(CoreError::UnsupportedKeyFormat);
        }
        let secp = Secp256k1::new();
        Ok(CompressedPublicKey(PublicKey::from_secret_key(
            &secp,
            &self.key.inner,
        )))
    }

    /// Sign a 32-byte message hash (deterministic ECDSA per RFC 6979).
    pub fn sign(&self, msg_hash: [u8; 32]) -> Signature {
        let secp = Secp256k1::new();
        secp.sign_ecdsa(&Message::from_digest(msg_hash), &self.key.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WIF for secret key 0x...01 (compressed, mainnet).
    const COMPRESSED_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
    /// WIF for the same secret key, uncompressed.
    const UNCOMPRESSED_WIF: &str = "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf";

    #[test]
    fn parses_compressed_wif() {
        let key = KeyMaterial::from_wif(COMPRESSED_WIF, Network::Mainnet).unwrap();
        let pubkey = key.public_key().unwrap();
        assert_eq!(
            pubkey.to_string(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn garbage_wif_is_invalid_secret() {
        let err = KeyMaterial::from_wif("definitely-not-a-wif", Network::Mainnet).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSecret(_)));
    }

    #[test]
    fn mainnet_wif_rejected_on_testnet() {
        let err = KeyMaterial::from_wif(COMPRESSED_WIF, Network::Testnet).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSecret(_)));
    }

    #[test]
    fn uncompressed_wif_parses_but_yields_no_pubkey() {
        let key = KeyMaterial::from_wif(UNCOMPRESSED_WIF, Network::Mainnet).unwrap();
        let err = key.public_key().unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedKeyFormat));
    }

    #[test]
    fn signing_is_deterministic() {
        let key = KeyMaterial::from_wif(COMPRESSED_WIF, Network::Mainnet).unwrap();
        let digest = [0xAB; 32];
        assert_eq!(key.sign(digest), key.sign(digest));
    }
}

//! # ember-wallet — single-signature native SegWit wallet.
//!
//! The wallet layer over [`ember_btc`]: a capability trait implemented per
//! address-type variant, and the P2WPKH (bech32) wallet with its cached
//! receive address and transaction-construction entry point.

pub mod wallet;

// Re-exports for convenient access
pub use ember_btc::coinselect::Selection;
pub use ember_btc::error::CoreError;
pub use ember_btc::network::Network;
pub use ember_btc::transaction::BuiltTransaction;
pub use ember_btc::utxo::{Target, TxRecipient, Utxo};
pub use wallet::{SegwitWallet, Wallet};

//! Transaction-construction core for a single-signature native SegWit wallet.
//!
//! Provides P2WPKH address encoding and decoding, greedy UTXO coin
//! selection, and two-phase (PSBT-based) transaction assembly, signing,
//! and finalization.

pub mod address;
pub mod coinselect;
pub mod error;
pub mod keys;
pub mod network;
pub mod transaction;
pub mod utxo;

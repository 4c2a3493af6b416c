/// A spendable output owned by the wallet.
///
/// Caller-owned; the builder borrows these for the duration of one build.
#[derive(Debug, Clone)]
pub struct Utxo {
    /// Funding transaction id as a hex string (display order).
    pub txid: String,
    /// Output index within the funding transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub value_sat: u64,
    /// The address this output pays to.
    pub address: String,
    /// The full funding transaction, hex-serialized, when the caller has it.
    /// Attached to the PSBT for signers that verify the previous output.
    pub raw_tx_hex: Option<String>,
}

/// A payment destination requested by the caller.
///
/// A single target with `value_sat == 0` requests a sweep: every UTXO is
/// spent and this target receives the total minus the fee.
#[derive(Debug, Clone)]
pub struct Target {
    pub address: String,
    pub value_sat: u64,
}

/// One output chosen by coin selection.
///
/// `address` is `None` for the change output; the builder substitutes the
/// caller's change address during assembly.
#[derive(Debug, Clone)]
pub struct Payment {
    pub address: Option<String>,
    pub value_sat: u64,
}

/// A fully resolved output of a built transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecipient {
    pub address: String,
    pub value_sat: u64,
}

//! Coin selection for P2WPKH transactions.
//!
//! Greedy largest-first selection: UTXOs are consumed in descending value
//! order until the accumulated value covers the targets plus the estimated
//! fee. The fee model is a virtual-size estimate from input/output counts.

use tracing::debug;

use crate::error::CoreError;
use crate::utxo::{Payment, Target, Utxo};

/// Estimated virtual size of a P2WPKH input (in vbytes).
/// Breakdown: 41 bytes non-witness + ~27 witness bytes / 4 = ~68 vbytes.
pub(crate) const P2WPKH_INPUT_VBYTES: u64 = 68;

/// Estimated virtual size of any output (in vbytes).
pub(crate) const OUTPUT_VBYTES: u64 = 31;

/// Fixed transaction overhead (in vbytes): version + locktime + segwit
/// marker/flag + counts.
pub(crate) const TX_OVERHEAD_VBYTES: u64 = 11;

/// Outputs at or below this value are unrelayable dust.
pub(crate) const DUST_THRESHOLD_SAT: u64 = 546;

/// Result of coin selection.
///
/// Invariant: `sum(inputs) == sum(outputs) + fee_sat`, to the satoshi.
#[derive(Debug, Clone)]
pub struct Selection {
    /// UTXOs to spend, in selection order.
    pub inputs: Vec<Utxo>,
    /// Outputs to create; an address-less entry is the change output.
    pub outputs: Vec<Payment>,
    /// Fee in satoshis.
    pub fee_sat: u64,
}

/// Estimate the fee for a P2WPKH transaction from its shape.
pub fn estimate_fee(num_inputs: usize, num_outputs: usize, fee_rate_sat_vbyte: u64) -> u64 {
    let vsize = TX_OVERHEAD_VBYTES
        + (num_inputs as u64 * P2WPKH_INPUT_VBYTES)
        + (num_outputs as u64 * OUTPUT_VBYTES);
    vsize * fee_rate_sat_vbyte
}

/// Choose which UTXOs to spend for the given targets and fee rate.
///
/// A single zero-value target sweeps every UTXO to that address. Otherwise
/// UTXOs are selected largest-first until the targets plus fee are covered;
/// excess value becomes a change output when it is worth more than the cost
/// of carrying one, and is absorbed into the fee when it would be dust.
pub fn select_coins(
    utxos: &[Utxo],
    targets: &[Target],
    fee_rate_sat_vbyte: u64,
) -> Result<Selection, CoreError> {
    if targets.is_empty() {
        return Err(CoreError::NoTargets);
    }
    if targets.len() == 1 && targets[0].value_sat == 0 {
        return sweep(utxos, &targets[0], fee_rate_sat_vbyte);
    }

    let target_total: u64 = targets
        .iter()
        .try_fold(0u64, |acc, t| acc.checked_add(t.value_sat))
        .ok_or(CoreError::InsufficientFunds {
            available_sat: utxos.iter().map(|u| u.value_sat).sum(),
            required_sat: u64::MAX,
        })?;

    // Largest-first candidate ordering.
    let mut candidates: Vec<&Utxo> = utxos.iter().collect();
    candidates.sort_by(|a, b| b.value_sat.cmp(&a.value_sat));

    let mut inputs: Vec<Utxo> = Vec::new();
    let mut total_sat: u64 = 0;
    for utxo in candidates {
        inputs.push(utxo.clone());
        total_sat += utxo.value_sat;

        // Assume a change output while accumulating; whether one is actually
        // emitted is decided below.
        let fee = estimate_fee(inputs.len(), targets.len() + 1, fee_rate_sat_vbyte);
        if total_sat >= target_total.saturating_add(fee) {
            break;
        }
    }

    let fee_without_change = estimate_fee(inputs.len(), targets.len(), fee_rate_sat_vbyte);
    let fee_with_change = estimate_fee(inputs.len(), targets.len() + 1, fee_rate_sat_vbyte);
    let required_sat = target_total.saturating_add(fee_without_change);
    if total_sat < required_sat {
        return Err(CoreError::InsufficientFunds {
            available_sat: total_sat,
            required_sat,
        });
    }

    let mut outputs: Vec<Payment> = targets
        .iter()
        .map(|t| Payment {
            address: Some(t.address.clone()),
            value_sat: t.value_sat,
        })
        .collect();

    let excess = total_sat - target_total;
    let change_cost = OUTPUT_VBYTES * fee_rate_sat_vbyte;
    let fee_sat = if excess > fee_without_change + change_cost + DUST_THRESHOLD_SAT {
        // fee_with_change == fee_without_change + change_cost, so the change
        // value below is always above the dust threshold.
        outputs.push(Payment {
            address: None,
            value_sat: excess - fee_with_change,
        });
        fee_with_change
    } else {
        excess
    };

    debug!(
        inputs = inputs.len(),
        outputs = outputs.len(),
        fee_sat,
        "coin selection complete"
    );
    Ok(Selection {
        inputs,
        outputs,
        fee_sat,
    })
}

/// Spend every UTXO to a single destination; the output value is whatever
/// remains after the fee.
fn sweep(utxos: &[Utxo], target: &Target, fee_rate_sat_vbyte: u64) -> Result<Selection, CoreError> {
    let inputs: Vec<Utxo> = utxos.to_vec();
    let total_sat: u64 = inputs.iter().map(|u| u.value_sat).sum();
    let fee_sat = estimate_fee(inputs.len(), 1, fee_rate_sat_vbyte);

    let floor = fee_sat.saturating_add(DUST_THRESHOLD_SAT);
    if total_sat <= floor {
        return Err(CoreError::InsufficientFunds {
            available_sat: total_sat,
            required_sat: floor + 1,
        });
    }

    debug!(
        inputs = inputs.len(),
        swept_sat = total_sat - fee_sat,
        fee_sat,
        "sweep selection complete"
    );
    Ok(Selection {
        inputs,
        outputs: vec![Payment {
            address: Some(target.address.clone()),
            value_sat: total_sat - fee_sat,
        }],
        fee_sat,
    })
}

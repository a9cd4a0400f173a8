//! Availability status derivation.

use thiserror::Error;

use crate::mapping::balance::BalanceByCity;
use crate::model::product::{STATUS_AVAILABLE, STATUS_AWAITING_RECEIPT};
use crate::model::transfer::TransferModel;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("record carries no on-order entry")]
    MissingOnOrder,
}

/// A record is available when it is orderable on demand or any city holds a
/// non-zero balance; otherwise it is awaiting receipt. The first on-order
/// entry is authoritative and its absence is a mapping error.
pub fn derive_status(
    model: &TransferModel,
    balance: &BalanceByCity,
) -> Result<i16, StatusError> {
    let on_order = model.on_order.first().ok_or(StatusError::MissingOnOrder)?;
    let total: f64 = balance.values().map(|b| b.count).sum();
    Ok(if on_order.enabled || total != 0.0 {
        STATUS_AVAILABLE
    } else {
        STATUS_AWAITING_RECEIPT
    })
}

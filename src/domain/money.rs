use super::LedgerError;

/// Token amounts are whole integers. Balances, debts and fees are never negative.
pub type Tokens = i64;

/// Reject zero and negative amounts.
pub fn ensure_positive(amount: Tokens) -> Result<Tokens, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(amount)
}

/// Reject negative amounts (fees may be zero).
pub fn ensure_non_negative(amount: Tokens, what: &str) -> Result<Tokens, LedgerError> {
    if amount < 0 {
        return Err(LedgerError::InvalidAmount(format!(
            "{} must not be negative, got {}",
            what, amount
        )));
    }
    Ok(amount)
}

/// Add `amount` to `total`, failing instead of wrapping.
pub fn credit(total: Tokens, amount: Tokens) -> Result<Tokens, LedgerError> {
    total
        .checked_add(amount)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{} + {} overflows", total, amount)))
}

/// Take `amount` out of `available`.
pub fn debit(available: Tokens, amount: Tokens) -> Result<Tokens, LedgerError> {
    if amount > available {
        return Err(LedgerError::InsufficientBalance {
            available,
            required: amount,
        });
    }
    Ok(available - amount)
}

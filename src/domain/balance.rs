use super::{LedgerError, Tokens, User, UserRegistry, credit, debit, ensure_positive};

/// Token accounts: each user's personal balance plus the owner's pool of
/// collected payments. The two are never mixed; a user withdrawal only
/// touches the user, an owner withdrawal only touches the pool.
pub struct AccountBalance<'a> {
    users: &'a mut UserRegistry,
    collected: &'a mut Tokens,
}

impl<'a> AccountBalance<'a> {
    pub fn new(users: &'a mut UserRegistry, collected: &'a mut Tokens) -> Self {
        Self { users, collected }
    }

    pub fn deposit(&mut self, user_id: &str, amount: Tokens) -> Result<&User, LedgerError> {
        ensure_positive(amount)?;
        let user = self.users.get_user_mut(user_id)?;
        user.balance = credit(user.balance, amount)?;
        Ok(user)
    }

    pub fn withdraw_user_balance(
        &mut self,
        user_id: &str,
        amount: Tokens,
    ) -> Result<&User, LedgerError> {
        ensure_positive(amount)?;
        let user = self.users.get_user_mut(user_id)?;
        user.balance = debit(user.balance, amount)?;
        Ok(user)
    }

    /// Take `amount` out of the collected pool. Returns what remains.
    pub fn withdraw_owner_payments(&mut self, amount: Tokens) -> Result<Tokens, LedgerError> {
        ensure_positive(amount)?;
        *self.collected = debit(*self.collected, amount)?;
        Ok(*self.collected)
    }

    /// Move `amount` from a user's balance into the collected pool.
    pub(crate) fn collect(&mut self, user_id: &str, amount: Tokens) -> Result<(), LedgerError> {
        let user = self.users.get_user_mut(user_id)?;
        let balance = debit(user.balance, amount)?;
        let pool = credit(*self.collected, amount)?;
        user.balance = balance;
        *self.collected = pool;
        Ok(())
    }

    pub fn user_balance(&self, user_id: &str) -> Result<Tokens, LedgerError> {
        Ok(self.users.get_user(user_id)?.balance)
    }

    pub fn total_payments(&self) -> Tokens {
        *self.collected
    }
}

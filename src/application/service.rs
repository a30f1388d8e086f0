use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    Car, CarId, CarMetadata, CarStatus, Clock, IntegrityReport, LedgerState, RentalRules, Tokens,
    User,
};
use crate::storage::{Changes, Repository};

use super::{AppError, PlatformConfig};

/// Application service providing the rental platform's operations.
/// This is the only entry point for clients (CLI, tests, anything else).
///
/// Every operation runs under one lock. Mutations are applied to a copy of
/// the ledger, written to the database in one transaction, and only then
/// made visible; a failure anywhere leaves both untouched.
pub struct RentalService {
    repo: Repository,
    config: PlatformConfig,
    created_at: DateTime<Utc>,
    state: Mutex<LedgerState>,
}

/// Result of checking a car out
#[derive(Debug, Clone)]
pub struct Rental {
    pub user: User,
    pub car: Car,
}

/// Result of checking a car back in
#[derive(Debug, Clone)]
pub struct CheckInReceipt {
    pub user: User,
    pub car: Car,
    pub elapsed: Duration,
    pub charged: Tokens,
}

/// Result of settling a debt
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub user: User,
    pub paid: Tokens,
}

/// Result of a withdrawal; which pool was drawn depends on who asked.
#[derive(Debug, Clone)]
pub enum Withdrawal {
    /// A user took tokens out of their own balance
    User(User),
    /// The owner took tokens out of the collected payments
    Owner { withdrawn: Tokens, remaining: Tokens },
}

impl RentalService {
    fn new(
        repo: Repository,
        config: PlatformConfig,
        created_at: DateTime<Utc>,
        state: LedgerState,
    ) -> Self {
        Self {
            repo,
            config,
            created_at,
            state: Mutex::new(state),
        }
    }

    /// Create (or reopen) a ledger database owned by `config.owner`.
    pub async fn init(database_path: &str, config: PlatformConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;

        let meta = repo.ensure_meta(&config.owner, config.clock.now()).await?;
        if meta.owner_id != config.owner {
            return Err(AppError::OwnerMismatch {
                stored: meta.owner_id,
                requested: config.owner,
            });
        }

        let state = repo.load_state().await?;
        info!(path = database_path, owner = %config.owner, "ledger initialized");
        Ok(Self::new(repo, config, meta.created_at, state))
    }

    /// Open an existing ledger; the owner is read back from the database.
    pub async fn connect(
        database_path: &str,
        rules: RentalRules,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;

        let meta = repo
            .get_meta()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Ledger not initialized: {}", database_path))?;
        let created_at = meta.created_at;
        let config = PlatformConfig {
            owner: meta.owner_id,
            rules,
            clock,
        };

        let state = repo.load_state().await?;
        debug!(path = database_path, owner = %config.owner, "ledger opened");
        Ok(Self::new(repo, config, created_at, state))
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn owner(&self) -> &str {
        &self.config.owner
    }

    /// When the ledger was first initialized.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The single owner capability check.
    fn authorize_owner(&self, caller: &str, action: &str) -> Result<(), AppError> {
        if self.config.is_owner(caller) {
            return Ok(());
        }
        warn!(caller, action, "unauthorized owner operation");
        Err(AppError::Unauthorized {
            caller: caller.to_string(),
            action: action.to_string(),
        })
    }

    /// Run `op` against a working copy, persist what it reports as changed,
    /// then publish the copy.
    async fn apply<T>(
        &self,
        op: impl FnOnce(&mut LedgerState) -> Result<(T, Changes), AppError>,
    ) -> Result<T, AppError> {
        let mut state = self.state.lock().await;
        let mut working = state.clone();

        let (output, changes) = op(&mut working)?;
        self.repo.commit(&changes).await?;

        *state = working;
        Ok(output)
    }

    async fn read<T>(
        &self,
        op: impl FnOnce(&LedgerState) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let state = self.state.lock().await;
        op(&state)
    }

    // ========================
    // Users
    // ========================

    /// Register the caller as a user.
    pub async fn add_user(
        &self,
        caller: &str,
        name: String,
        surname: String,
    ) -> Result<User, AppError> {
        let user = self
            .apply(|state| {
                let user = state.users.add_user(caller, name, surname)?.clone();
                let changes = Changes::new().with_user(&user);
                Ok((user, changes))
            })
            .await?;

        info!(user = %user.id, "user added");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        self.read(|state| Ok(state.users.get_user(user_id)?.clone()))
            .await
    }

    pub async fn is_user(&self, user_id: &str) -> bool {
        self.state.lock().await.users.is_user(user_id)
    }

    pub async fn list_users(&self) -> Vec<User> {
        self.state.lock().await.users.iter().cloned().collect()
    }

    pub async fn user_balance(&self, user_id: &str) -> Result<Tokens, AppError> {
        self.read(|state| Ok(state.users.get_user(user_id)?.balance))
            .await
    }

    // ========================
    // Cars
    // ========================

    pub async fn add_car(&self, caller: &str, metadata: CarMetadata) -> Result<Car, AppError> {
        self.authorize_owner(caller, "add a car")?;

        let car = self
            .apply(|state| {
                let car = state.cars.add_car(metadata)?.clone();
                let changes = Changes::new().with_car(&car).with_counters(state);
                Ok((car, changes))
            })
            .await?;

        info!(car_id = car.id, name = %car.name, rent_fee = car.rent_fee, "car added");
        Ok(car)
    }

    pub async fn get_car(&self, car_id: CarId) -> Result<Car, AppError> {
        self.read(|state| Ok(state.cars.get_car(car_id)?.clone()))
            .await
    }

    pub async fn list_cars(&self) -> Vec<Car> {
        self.state.lock().await.cars.iter().cloned().collect()
    }

    pub async fn cars_by_status(&self, status: CarStatus) -> Vec<Car> {
        let state = self.state.lock().await;
        state
            .cars
            .cars_by_status(status)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn car_count(&self) -> usize {
        self.state.lock().await.cars.car_count()
    }

    pub async fn edit_car_metadata(
        &self,
        caller: &str,
        car_id: CarId,
        metadata: CarMetadata,
    ) -> Result<Car, AppError> {
        self.authorize_owner(caller, "edit car metadata")?;

        let car = self
            .apply(|state| {
                let car = state.cars.edit_car_metadata(car_id, metadata)?.clone();
                let changes = Changes::new().with_car(&car);
                Ok((car, changes))
            })
            .await?;

        info!(car_id, name = %car.name, rent_fee = car.rent_fee, "car metadata edited");
        Ok(car)
    }

    pub async fn edit_car_status(
        &self,
        caller: &str,
        car_id: CarId,
        status: CarStatus,
    ) -> Result<Car, AppError> {
        self.authorize_owner(caller, "edit car status")?;

        let car = self
            .apply(|state| {
                let car = state.cars.edit_car_status(car_id, status)?.clone();
                if car.renter_id.is_some() {
                    warn!(car_id, %status, "status edited while the car is rented");
                }
                let changes = Changes::new().with_car(&car);
                Ok((car, changes))
            })
            .await?;

        info!(car_id, %status, "car status edited");
        Ok(car)
    }

    // ========================
    // Rentals
    // ========================

    /// Rent `car_id` to the caller.
    pub async fn check_out(&self, caller: &str, car_id: CarId) -> Result<Rental, AppError> {
        let config = &self.config;
        let rental = self
            .apply(|state| {
                state
                    .rentals(&config.rules, config.clock.as_ref())
                    .check_out(car_id, caller)?;

                let user = state.users.get_user(caller)?.clone();
                let car = state.cars.get_car(car_id)?.clone();
                let changes = Changes::new().with_user(&user).with_car(&car);
                Ok((Rental { user, car }, changes))
            })
            .await
            .inspect_err(|err| debug!(caller, car_id, %err, "check-out rejected"))?;

        info!(user = caller, car_id, "car checked out");
        Ok(rental)
    }

    /// Return the caller's car and add the rent to their debt.
    pub async fn check_in(&self, caller: &str) -> Result<CheckInReceipt, AppError> {
        let config = &self.config;
        let receipt = self
            .apply(|state| {
                let outcome = state
                    .rentals(&config.rules, config.clock.as_ref())
                    .check_in(caller)?;

                let user = state.users.get_user(caller)?.clone();
                let car = state.cars.get_car(outcome.car_id)?.clone();
                let changes = Changes::new().with_user(&user).with_car(&car);
                let receipt = CheckInReceipt {
                    user,
                    car,
                    elapsed: outcome.elapsed,
                    charged: outcome.charged,
                };
                Ok((receipt, changes))
            })
            .await
            .inspect_err(|err| debug!(caller, %err, "check-in rejected"))?;

        info!(
            user = caller,
            car_id = receipt.car.id,
            charged = receipt.charged,
            debt = receipt.user.debt,
            "car checked in"
        );
        Ok(receipt)
    }

    // ========================
    // Balances and payments
    // ========================

    pub async fn deposit(&self, caller: &str, amount: Tokens) -> Result<User, AppError> {
        let user = self
            .apply(|state| {
                let user = state.accounts().deposit(caller, amount)?.clone();
                let changes = Changes::new().with_user(&user);
                Ok((user, changes))
            })
            .await?;

        info!(user = caller, amount, balance = user.balance, "deposit");
        Ok(user)
    }

    /// Pay the caller's whole debt out of their balance.
    pub async fn make_payment(&self, caller: &str) -> Result<PaymentReceipt, AppError> {
        let config = &self.config;
        let receipt = self
            .apply(|state| {
                let paid = state
                    .rentals(&config.rules, config.clock.as_ref())
                    .make_payment(caller)?;

                let user = state.users.get_user(caller)?.clone();
                let changes = Changes::new().with_user(&user).with_counters(state);
                Ok((PaymentReceipt { user, paid }, changes))
            })
            .await
            .inspect_err(|err| debug!(caller, %err, "payment rejected"))?;

        info!(
            user = caller,
            paid = receipt.paid,
            balance = receipt.user.balance,
            "payment made"
        );
        Ok(receipt)
    }

    /// Withdraw tokens. The owner draws on collected payments; every other
    /// caller draws on their own balance.
    pub async fn withdraw_balance(
        &self,
        caller: &str,
        amount: Tokens,
    ) -> Result<Withdrawal, AppError> {
        if self.config.is_owner(caller) {
            self.withdraw_owner_payments(amount).await
        } else {
            self.withdraw_user_balance(caller, amount).await
        }
    }

    async fn withdraw_user_balance(
        &self,
        caller: &str,
        amount: Tokens,
    ) -> Result<Withdrawal, AppError> {
        let user = self
            .apply(|state| {
                let user = state
                    .accounts()
                    .withdraw_user_balance(caller, amount)?
                    .clone();
                let changes = Changes::new().with_user(&user);
                Ok((user, changes))
            })
            .await?;

        info!(user = caller, amount, balance = user.balance, "balance withdrawn");
        Ok(Withdrawal::User(user))
    }

    async fn withdraw_owner_payments(&self, amount: Tokens) -> Result<Withdrawal, AppError> {
        let remaining = self
            .apply(|state| {
                let remaining = state.accounts().withdraw_owner_payments(amount)?;
                let changes = Changes::new().with_counters(state);
                Ok((remaining, changes))
            })
            .await?;

        info!(amount, remaining, "collected payments withdrawn");
        Ok(Withdrawal::Owner {
            withdrawn: amount,
            remaining,
        })
    }

    /// Sum of all payments collected and not yet withdrawn.
    pub async fn get_total_payments(&self, caller: &str) -> Result<Tokens, AppError> {
        self.authorize_owner(caller, "read total payments")?;
        self.read(|state| Ok(state.total_payments)).await
    }

    // ========================
    // Integrity
    // ========================

    pub async fn check_integrity(&self, caller: &str) -> Result<IntegrityReport, AppError> {
        self.authorize_owner(caller, "check ledger integrity")?;
        self.read(|state| Ok(state.check_integrity())).await
    }

    /// Fail with [`AppError::IntegrityViolation`] unless the ledger is consistent.
    pub async fn verify_integrity(&self, caller: &str) -> Result<IntegrityReport, AppError> {
        let report = self.check_integrity(caller).await?;
        if !report.is_ok() {
            return Err(AppError::IntegrityViolation(report.issues.join("; ")));
        }
        Ok(report)
    }
}

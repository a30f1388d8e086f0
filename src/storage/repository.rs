use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::domain::{
    AccountId, Car, CarId, CarRegistry, CarStatus, LedgerState, Tokens, User, UserRegistry,
};

use super::MIGRATION_001_INITIAL;

/// Ledger-wide values stored in the single `ledger_meta` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerMeta {
    pub owner_id: AccountId,
    pub total_payments: Tokens,
    pub next_car_id: CarId,
    pub created_at: DateTime<Utc>,
}

/// Counters that change alongside users and cars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub total_payments: Tokens,
    pub next_car_id: CarId,
}

impl Counters {
    pub fn of(state: &LedgerState) -> Self {
        Self {
            total_payments: state.total_payments,
            next_car_id: state.cars.next_id(),
        }
    }
}

/// The records touched by one ledger operation, written in one transaction.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub users: Vec<User>,
    pub cars: Vec<Car>,
    pub counters: Option<Counters>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: &User) -> Self {
        self.users.push(user.clone());
        self
    }

    pub fn with_car(mut self, car: &Car) -> Self {
        self.cars.push(car.clone());
        self
    }

    pub fn with_counters(mut self, state: &LedgerState) -> Self {
        self.counters = Some(Counters::of(state));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.cars.is_empty() && self.counters.is_none()
    }
}

/// Repository persisting users, cars and ledger counters.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Ledger meta
    // ========================

    /// Record the owner if the ledger has none yet. Returns the stored meta,
    /// which names the original owner when one was already set.
    pub async fn ensure_meta(&self, owner_id: &str, created_at: DateTime<Utc>) -> Result<LedgerMeta> {
        sqlx::query(
            r#"
            INSERT INTO ledger_meta (id, owner_id, total_payments, next_car_id, created_at)
            VALUES (1, ?, 0, 1, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(owner_id)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to write ledger meta")?;

        self.get_meta()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Ledger meta missing after insert"))
    }

    pub async fn get_meta(&self) -> Result<Option<LedgerMeta>> {
        let row = sqlx::query(
            r#"
            SELECT owner_id, total_payments, next_car_id, created_at
            FROM ledger_meta
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch ledger meta")?;

        match row {
            Some(row) => {
                let created_at_str: String = row.get("created_at");
                Ok(Some(LedgerMeta {
                    owner_id: row.get("owner_id"),
                    total_payments: row.get("total_payments"),
                    next_car_id: row.get("next_car_id"),
                    created_at: DateTime::parse_from_rfc3339(&created_at_str)
                        .context("Invalid created_at timestamp")?
                        .with_timezone(&Utc),
                }))
            }
            None => Ok(None),
        }
    }

    // ========================
    // Loading
    // ========================

    /// Load every user and car plus the counters into memory.
    pub async fn load_state(&self) -> Result<LedgerState> {
        let meta = self
            .get_meta()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Ledger not initialized"))?;
        let users = self.list_users().await?;
        let cars = self.list_cars().await?;

        Ok(LedgerState::new(
            UserRegistry::from_users(users),
            CarRegistry::from_parts(cars, meta.next_car_id),
            meta.total_payments,
        ))
    }

    /// List all users ordered by id.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, surname, rented_car_id, balance, debt, rental_started_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    /// List all cars ordered by id.
    pub async fn list_cars(&self) -> Result<Vec<Car>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, img_url, rent_fee, sale_fee, status, renter_id
            FROM cars
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list cars")?;

        rows.iter().map(Self::row_to_car).collect()
    }

    // ========================
    // Writing
    // ========================

    /// Write every record in `changes` atomically.
    pub async fn commit(&self, changes: &Changes) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for user in &changes.users {
            Self::upsert_user(&mut tx, user).await?;
        }
        for car in &changes.cars {
            Self::upsert_car(&mut tx, car).await?;
        }
        if let Some(counters) = changes.counters {
            sqlx::query("UPDATE ledger_meta SET total_payments = ?, next_car_id = ? WHERE id = 1")
                .bind(counters.total_payments)
                .bind(counters.next_car_id)
                .execute(&mut *tx)
                .await
                .context("Failed to update ledger counters")?;
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    async fn upsert_user(tx: &mut Transaction<'_, Sqlite>, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, surname, rented_car_id, balance, debt, rental_started_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                surname = excluded.surname,
                rented_car_id = excluded.rented_car_id,
                balance = excluded.balance,
                debt = excluded.debt,
                rental_started_at = excluded.rental_started_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.surname)
        .bind(user.rented_car_id)
        .bind(user.balance)
        .bind(user.debt)
        .bind(user.rental_started_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to save user {}", user.id))?;
        Ok(())
    }

    async fn upsert_car(tx: &mut Transaction<'_, Sqlite>, car: &Car) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cars (id, name, img_url, rent_fee, sale_fee, status, renter_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                img_url = excluded.img_url,
                rent_fee = excluded.rent_fee,
                sale_fee = excluded.sale_fee,
                status = excluded.status,
                renter_id = excluded.renter_id
            "#,
        )
        .bind(car.id)
        .bind(&car.name)
        .bind(&car.img_url)
        .bind(car.rent_fee)
        .bind(car.sale_fee)
        .bind(car.status.as_str())
        .bind(&car.renter_id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to save car {}", car.id))?;
        Ok(())
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let started_at_str: Option<String> = row.get("rental_started_at");

        Ok(User {
            id: row.get("id"),
            name: row.get("name"),
            surname: row.get("surname"),
            rented_car_id: row.get("rented_car_id"),
            balance: row.get("balance"),
            debt: row.get("debt"),
            rental_started_at: started_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid rental_started_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    fn row_to_car(row: &sqlx::sqlite::SqliteRow) -> Result<Car> {
        let status_str: String = row.get("status");

        Ok(Car {
            id: row.get("id"),
            name: row.get("name"),
            img_url: row.get("img_url"),
            rent_fee: row.get("rent_fee"),
            sale_fee: row.get("sale_fee"),
            status: CarStatus::from_name(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid car status: {}", status_str))?,
            renter_id: row.get("renter_id"),
        })
    }
}

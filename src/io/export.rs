use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::RentalService;
use crate::domain::{AccountId, Car, Tokens, User};

/// Full ledger snapshot for export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub owner: AccountId,
    pub total_payments: Tokens,
    pub users: Vec<User>,
    pub cars: Vec<Car>,
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a RentalService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a RentalService) -> Self {
        Self { service }
    }

    /// Export users to CSV format
    pub async fn export_users_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let users = self.service.list_users().await;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "name",
            "surname",
            "rented_car_id",
            "balance",
            "debt",
            "rental_started_at",
        ])?;

        for user in &users {
            csv_writer.write_record([
                user.id.clone(),
                user.name.clone(),
                user.surname.clone(),
                user.rented_car_id.to_string(),
                user.balance.to_string(),
                user.debt.to_string(),
                user.rental_started_at
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(users.len())
    }

    /// Export cars to CSV format
    pub async fn export_cars_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let cars = self.service.list_cars().await;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id", "name", "img_url", "rent_fee", "sale_fee", "status", "renter_id",
        ])?;

        for car in &cars {
            csv_writer.write_record([
                car.id.to_string(),
                car.name.clone(),
                car.img_url.clone(),
                car.rent_fee.to_string(),
                car.sale_fee.to_string(),
                car.status.as_str().to_string(),
                car.renter_id.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(cars.len())
    }

    /// Export the whole ledger as a JSON snapshot. Owner only, since it
    /// includes collected payments.
    pub async fn export_full_json<W: Write>(
        &self,
        caller: &str,
        mut writer: W,
    ) -> Result<LedgerSnapshot> {
        let total_payments = self.service.get_total_payments(caller).await?;

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: self.service.config().clock.now(),
            owner: self.service.owner().to_string(),
            total_payments,
            users: self.service.list_users().await,
            cars: self.service.list_cars().await,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

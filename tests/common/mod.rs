// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use carledger::application::{CheckInReceipt, PlatformConfig, RentalService};
use carledger::domain::{CarId, CarMetadata, ManualClock, RentalRules};
use chrono::Utc;
use tempfile::TempDir;

pub const OWNER: &str = "0x0000000000000000000000000000000000000001";
pub const ALICE: &str = "0x00000000000000000000000000000000000a11ce";
pub const BOB: &str = "0x0000000000000000000000000000000000000b0b";

/// A service on a temporary database, driven by a manual clock.
pub struct TestPlatform {
    pub service: RentalService,
    pub clock: Arc<ManualClock>,
    pub db_path: String,
    _temp: TempDir,
}

/// Helper to create a test platform with default rules
pub async fn test_platform() -> Result<TestPlatform> {
    test_platform_with_rules(RentalRules::default()).await
}

/// Helper to create a test platform with custom rules
pub async fn test_platform_with_rules(rules: RentalRules) -> Result<TestPlatform> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_str()
        .unwrap()
        .to_string();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let config = PlatformConfig::new(OWNER)
        .with_rules(rules)
        .with_clock(clock.clone());
    let service = RentalService::init(&db_path, config).await?;
    Ok(TestPlatform {
        service,
        clock,
        db_path,
        _temp: temp_dir,
    })
}

pub fn tesla() -> CarMetadata {
    CarMetadata::new("Tesla Model S", "example url", 10, 5000)
}

impl TestPlatform {
    /// Register Alice and add one Tesla (car 1)
    pub async fn with_alice_and_tesla(&self) -> Result<()> {
        self.service
            .add_user(ALICE, "Alice".into(), "Smith".into())
            .await?;
        self.service.add_car(OWNER, tesla()).await?;
        Ok(())
    }

    /// Check a car out, wait past the minimum hold, check it back in
    pub async fn complete_rental(&self, user: &str, car_id: CarId) -> Result<CheckInReceipt> {
        self.service.check_out(user, car_id).await?;
        self.clock.advance(Duration::from_secs(6));
        Ok(self.service.check_in(user).await?)
    }
}

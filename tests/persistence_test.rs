mod common;

use std::time::Duration;

use anyhow::Result;
use carledger::application::{AppError, PlatformConfig, RentalService};
use carledger::domain::{CarMetadata, RentalRules};
use common::{ALICE, BOB, OWNER, tesla, test_platform};
use tempfile::TempDir;

#[tokio::test]
async fn test_state_survives_reopen() -> Result<()> {
    let p = test_platform().await?;
    p.with_alice_and_tesla().await?;
    p.complete_rental(ALICE, 1).await?;
    p.service.deposit(ALICE, 100).await?;
    p.service.make_payment(ALICE).await?;

    let alice_before = p.service.get_user(ALICE).await?;
    let car_before = p.service.get_car(1).await?;

    let reopened =
        RentalService::connect(&p.db_path, RentalRules::default(), p.clock.clone()).await?;
    assert_eq!(reopened.owner(), OWNER);
    assert_eq!(
        reopened.created_at().timestamp(),
        p.service.created_at().timestamp()
    );
    assert_eq!(reopened.get_user(ALICE).await?, alice_before);
    assert_eq!(reopened.get_car(1).await?, car_before);
    assert_eq!(reopened.get_total_payments(OWNER).await?, 10);

    Ok(())
}

#[tokio::test]
async fn test_car_ids_continue_after_reopen() -> Result<()> {
    let p = test_platform().await?;
    p.service.add_car(OWNER, tesla()).await?;
    p.service.add_car(OWNER, tesla()).await?;

    let reopened =
        RentalService::connect(&p.db_path, RentalRules::default(), p.clock.clone()).await?;
    let car = reopened
        .add_car(OWNER, CarMetadata::new("Honda", "img", 5, 100))
        .await?;
    assert_eq!(car.id, 3);

    Ok(())
}

#[tokio::test]
async fn test_active_rental_survives_reopen() -> Result<()> {
    let p = test_platform().await?;
    p.with_alice_and_tesla().await?;
    p.service.check_out(ALICE, 1).await?;

    let reopened =
        RentalService::connect(&p.db_path, RentalRules::default(), p.clock.clone()).await?;
    assert_eq!(reopened.get_user(ALICE).await?.rented_car_id, 1);
    assert_eq!(
        reopened.get_car(1).await?.renter_id.as_deref(),
        Some(ALICE)
    );

    // The stored start time still gates check-in
    assert!(matches!(
        reopened.check_in(ALICE).await,
        Err(AppError::RentalTooShort { .. })
    ));
    p.clock.advance(Duration::from_secs(6));
    let receipt = reopened.check_in(ALICE).await?;
    assert_eq!(receipt.user.debt, 10);

    Ok(())
}

#[tokio::test]
async fn test_failed_operation_is_not_persisted() -> Result<()> {
    let p = test_platform().await?;
    p.with_alice_and_tesla().await?;
    p.service.deposit(ALICE, 40).await?;

    assert!(p.service.withdraw_balance(ALICE, 41).await.is_err());

    let reopened =
        RentalService::connect(&p.db_path, RentalRules::default(), p.clock.clone()).await?;
    assert_eq!(reopened.user_balance(ALICE).await?, 40);

    Ok(())
}

#[tokio::test]
async fn test_init_keeps_original_owner() -> Result<()> {
    let p = test_platform().await?;
    p.with_alice_and_tesla().await?;

    let result = RentalService::init(&p.db_path, PlatformConfig::new(BOB)).await;
    assert!(matches!(
        result,
        Err(AppError::OwnerMismatch { ref stored, .. }) if stored == OWNER
    ));

    // Re-running init as the same owner keeps existing data
    let again = RentalService::init(
        &p.db_path,
        PlatformConfig::new(OWNER).with_clock(p.clock.clone()),
    )
    .await?;
    assert_eq!(again.car_count().await, 1);
    assert!(again.is_user(ALICE).await);

    Ok(())
}

#[tokio::test]
async fn test_connect_requires_initialized_ledger() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("missing.db");

    let result = RentalService::connect(
        db_path.to_str().unwrap(),
        RentalRules::default(),
        std::sync::Arc::new(carledger::domain::SystemClock::new()),
    )
    .await;
    assert!(matches!(result, Err(AppError::Database(_))));

    Ok(())
}

use std::time::Duration;

use cinema_tests::TestServerBuilder;
use eyre::Result;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn expired_reservations_are_rejected_and_refunded() -> Result<()> {
    let server = TestServerBuilder::new()
        .with_example_catalog()
        .with_timeout(1)
        .start()?;
    let client = server.client().await?;

    let reservation = client.get_reservation(0, 5).await?.into_reservation()?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let rejected = client
        .get_tickets(reservation.reservation_id, &reservation.cookie)
        .await?
        .into_bad_request()?;
    assert_eq!(rejected, reservation.reservation_id);

    let events = client.get_events().await?;
    assert_eq!(events[0].remaining, 123);
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn expiry_frees_the_id_for_reuse() -> Result<()> {
    let server = TestServerBuilder::new()
        .with_example_catalog()
        .with_timeout(1)
        .start()?;
    let client = server.client().await?;

    let first = client.get_reservation(0, 1).await?.into_reservation()?;
    assert_eq!(first.reservation_id, 1_000_000);

    tokio::time::sleep(Duration::from_secs(2)).await;

    // With no live reservations left, the id sequence restarts; the
    // fresh reservation is a different grant with a different cookie.
    let second = client.get_reservation(0, 1).await?.into_reservation()?;
    assert_eq!(second.reservation_id, 1_000_000);
    assert_ne!(second.cookie, first.cookie);

    // The stale cookie does not redeem the reused id.
    let tickets = client
        .get_tickets(second.reservation_id, &second.cookie)
        .await?
        .into_tickets()?;
    assert_eq!(tickets.codes.len(), 1);
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn a_reservation_can_be_redeemed_right_up_to_its_deadline() -> Result<()> {
    let server = TestServerBuilder::new()
        .with_example_catalog()
        .with_timeout(3)
        .start()?;
    let client = server.client().await?;

    let reservation = client.get_reservation(0, 2).await?.into_reservation()?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let tickets = client
        .get_tickets(reservation.reservation_id, &reservation.cookie)
        .await?
        .into_tickets()?;
    assert_eq!(tickets.codes.len(), 2);
    Ok(())
}

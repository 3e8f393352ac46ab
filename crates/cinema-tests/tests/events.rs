use cinema_tests::{Reply, TestServerBuilder};
use eyre::Result;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn events_are_listed_in_catalog_order() -> Result<()> {
    let server = TestServerBuilder::new().with_example_catalog().start()?;
    let client = server.client().await?;

    // The raw reply must be byte-exact, not merely decode correctly.
    client.send_raw(&[0x01]).await?;
    let reply = client
        .recv_raw(std::time::Duration::from_secs(5))
        .await?
        .expect("the server must answer GET_EVENTS");

    let mut expected = vec![0x02];
    expected.extend_from_slice(&[0, 0, 0, 0, 0, 123, 13]);
    expected.extend_from_slice(b"fajny koncert");
    expected.extend_from_slice(&[0, 0, 0, 1, 0, 32, 13]);
    expected.extend_from_slice(b"film o kotach");
    expected.extend_from_slice(&[0, 0, 0, 2, 0, 0, 3]);
    expected.extend_from_slice(b"ZOO");
    assert_eq!(reply, expected);

    // The decoded view agrees.
    let events = client.get_events().await?;
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].description, b"fajny koncert");
    assert_eq!(events[0].remaining, 123);
    assert_eq!(events[2].description, b"ZOO");
    assert_eq!(events[2].remaining, 0);
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn empty_catalog_yields_an_empty_listing() -> Result<()> {
    let server = TestServerBuilder::new().start()?;
    let client = server.client().await?;

    assert!(client.get_events().await?.is_empty());

    // Any reservation or redemption against the empty catalog is a
    // semantic rejection echoing the id.
    for event_id in [0, 1, 42, 999_999] {
        let rejected = client.get_reservation(event_id, 1).await?.into_bad_request()?;
        assert_eq!(rejected, event_id);
    }
    let rejected = client
        .get_tickets(1_000_000, &[b'!'; 48])
        .await?
        .into_bad_request()?;
    assert_eq!(rejected, 1_000_000);
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn oversized_listing_is_cut_at_the_datagram_ceiling() -> Result<()> {
    // 300 events of 262 wire bytes each cannot all fit in 65 507.
    let mut builder = TestServerBuilder::new();
    let description = "x".repeat(255);
    for _ in 0..300 {
        builder = builder.with_event(&description, 1);
    }
    let server = builder.start()?;
    let client = server.client().await?;

    client.send_raw(&[0x01]).await?;
    let reply = client
        .recv_raw(std::time::Duration::from_secs(5))
        .await?
        .expect("the server must answer GET_EVENTS");
    assert!(reply.len() <= 65_507);

    let events = match cinema_tests::decode_reply(&reply)? {
        Reply::Events(events) => events,
        other => panic!("expected EVENTS, got {other:?}"),
    };
    // Exactly the records that fit, in order from id 0.
    assert_eq!(events.len(), (65_507 - 1) / 262);
    assert!(events.iter().enumerate().all(|(i, e)| e.event_id == i as u32));
    Ok(())
}

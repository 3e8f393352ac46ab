use std::fs;
use std::net::Ipv4Addr;

use cinema_engine::{Catalog, Engine};
use cinema_server::Server;
use eyre::Result;

fn temp_file(name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("cinema-{}-{name}", std::process::id()));
    fs::write(&path, content).expect("temp catalog must be writable");
    path
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn a_catalog_file_round_trips_through_the_server() -> Result<()> {
    let path = temp_file("catalog", b"fajny koncert\n123\nfilm o kotach\n32\nZOO\n0\n");
    let catalog = Catalog::load(&path)?;
    fs::remove_file(&path).ok();

    let mut server = Server::bind((Ipv4Addr::LOCALHOST, 0), Engine::new(catalog, 5))?;
    let addr = server.local_addr()?;
    std::thread::spawn(move || {
        let _ = server.run();
    });

    let socket = tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    socket.connect(addr).await?;
    socket.send(&[1]).await?;
    let mut buf = vec![0u8; 65_507];
    let len = socket.recv(&mut buf).await?;
    buf.truncate(len);

    let events = cinema_tests::decode_reply(&buf)?.into_events()?;
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].description, b"film o kotach");
    Ok(())
}

#[test]
fn loading_a_missing_catalog_fails() {
    let path = std::env::temp_dir().join("cinema-definitely-missing-catalog");
    assert!(Catalog::load(&path).is_err());
}

#[test]
fn loading_a_malformed_catalog_fails() {
    let path = temp_file("bad-catalog", b"koncert\nnot a number\n");
    let result = Catalog::load(&path);
    fs::remove_file(&path).ok();
    assert!(result.is_err());
}

#[test]
fn binding_an_occupied_port_fails() {
    let catalog = Catalog::from_entries([(b"koncert".to_vec(), 1)]).unwrap();
    let first = Server::bind((Ipv4Addr::LOCALHOST, 0), Engine::new(catalog.clone(), 5))
        .expect("an ephemeral port must bind");
    let addr = first.local_addr().unwrap();

    assert!(Server::bind(addr, Engine::new(catalog, 5)).is_err());
}

//! The single-threaded datagram serving loop.

use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{SystemTime, UNIX_EPOCH};

use cinema_core::{PacketBuf, Request};
use cinema_engine::Engine;
use eyre::{Result, WrapErr};
use tracing::debug;

/// A bound UDP server around a reservation [`Engine`].
pub struct Server {
    socket: UdpSocket,
    engine: Engine,
    buf: PacketBuf,
}

impl Server {
    /// Binds the datagram socket. Binding failures are fatal startup
    /// errors for the caller.
    ///
    /// # Errors
    ///
    /// Returns a report if the socket cannot be created or bound.
    pub fn bind(addr: impl ToSocketAddrs, engine: Engine) -> Result<Self> {
        let socket = UdpSocket::bind(addr).wrap_err("failed to bind the UDP socket")?;
        Ok(Self {
            socket,
            engine,
            buf: PacketBuf::new(),
        })
    }

    /// The address the socket is bound to; with port 0 this is where
    /// the OS actually placed it.
    ///
    /// # Errors
    ///
    /// Returns a report if the OS cannot report the local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .wrap_err("failed to read the local socket address")
    }

    /// Serves requests forever: one datagram in, expired reservations
    /// pruned, at most one datagram out to the sender.
    ///
    /// # Errors
    ///
    /// Returns only on socket I/O failures or a pre-epoch clock, both
    /// of which make further service impossible.
    pub fn run(&mut self) -> Result<Infallible> {
        loop {
            let (len, peer) = self
                .socket
                .recv_from(self.buf.recv_slice())
                .wrap_err("datagram receive failed")?;
            if len == 0 {
                continue;
            }
            // recv_from never returns more than the buffer it was given.
            self.buf
                .set_received(len)
                .wrap_err("datagram receive failed")?;

            let now = unix_now()?;
            self.engine.prune(now);

            let request = match Request::parse(&self.buf) {
                Ok(request) => request,
                Err(err) => {
                    debug!(%err, %peer, "dropping malformed datagram");
                    continue;
                }
            };
            if let Err(err) = self.engine.handle(request, now, &mut self.buf) {
                debug!(%err, %peer, "dropping request: reply encoding failed");
                continue;
            }

            self.socket
                .send_to(self.buf.as_bytes(), peer)
                .wrap_err("datagram send failed")?;
        }
    }
}

/// Wall-clock time in whole seconds since the Unix epoch.
fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .wrap_err("system clock is before the Unix epoch")?
        .as_secs())
}

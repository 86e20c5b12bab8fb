//! mio-based event loop.
//!
//! Readiness model: poll tells us when sockets are ready, then we perform
//! non-blocking read/write syscalls. Uses epoll on Linux, kqueue on macOS.
//!
//! One thread owns everything: the listener, the connection registry, and
//! the store. Each tick blocks on the poller, dispatches listener and
//! connection readiness, reconciles changed interest, and reaps finished
//! connections. Only listener or poller failures escape `run`.

use crate::config::Config;
use crate::runtime::connection::Connection;
use crate::storage::Store;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::io;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

const LISTENER: Token = Token(usize::MAX);

/// The server: listener, poller, connection registry, and store.
pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    connections: Slab<Connection>,
    store: Store,
    max_connections: usize,
    max_frame_size: usize,
    event_capacity: usize,
}

impl Reactor {
    /// Bind the listening socket and set up the poller.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = create_listener(addr)?;
        let mut listener = TcpListener::from_std(listener);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(Self {
            poll,
            listener,
            connections: Slab::with_capacity(config.max_connections),
            store: Store::new(),
            max_connections: config.max_connections,
            max_frame_size: config.max_frame_size,
            event_capacity: config.event_capacity,
        })
    }

    /// The bound address (useful when listening on an ephemeral port).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the event loop. Does not return except on fatal listener or
    /// poller failure.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(self.event_capacity);
        info!(addr = %self.local_addr()?, "listening");

        loop {
            self.poll.poll(&mut events, None)?;

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_ready()?,
                    Token(conn_id) => {
                        self.connection_ready(conn_id, event.is_readable(), event.is_writable());
                    }
                }
            }
        }
    }

    /// Accept connections until the listener would block.
    fn accept_ready(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.connections.len() >= self.max_connections {
                        warn!(%peer, "connection limit reached, rejecting");
                        continue;
                    }

                    let conn_id = self
                        .connections
                        .insert(Connection::new(stream, self.max_frame_size));

                    let conn = &mut self.connections[conn_id];
                    self.poll.registry().register(
                        conn.stream_mut(),
                        Token(conn_id),
                        Interest::READABLE,
                    )?;

                    debug!(conn_id, %peer, "accepted connection");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(error = %e, "accept error");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Dispatch readiness to one connection, then reconcile its interest or
    /// reap it.
    fn connection_ready(&mut self, conn_id: usize, readable: bool, writable: bool) {
        {
            let Some(conn) = self.connections.get_mut(conn_id) else {
                return;
            };
            if readable {
                conn.on_readable(&mut self.store);
            }
            if writable {
                conn.on_writable();
            }
        }
        self.reconcile(conn_id);
    }

    /// Bring the poller registration in line with the connection's desired
    /// interest, or remove the connection if it is closing.
    fn reconcile(&mut self, conn_id: usize) {
        let want = match self.connections.get(conn_id) {
            Some(conn) => conn.interest(),
            None => return,
        };

        let Some(want) = want else {
            self.close(conn_id);
            return;
        };

        let conn = &mut self.connections[conn_id];
        if conn.registered() != want {
            match self
                .poll
                .registry()
                .reregister(conn.stream_mut(), Token(conn_id), want)
            {
                Ok(()) => conn.set_registered(want),
                Err(e) => {
                    debug!(conn_id, error = %e, "reregister failed");
                    self.close(conn_id);
                }
            }
        }
    }

    fn close(&mut self, conn_id: usize) {
        if let Some(mut conn) = self.connections.try_remove(conn_id) {
            let _ = self.poll.registry().deregister(conn.stream_mut());
            debug!(conn_id, "connection closed");
        }
    }
}

/// Create a non-blocking TCP listener.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}

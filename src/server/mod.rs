pub mod connection;
pub mod dispatcher;
pub mod session;

pub use connection::*;
pub use dispatcher::*;
pub use session::*;

use crate::config::Config;
use crate::protocol::{Line, TfshError, TfshResult, LINE_TOO_LONG};
use crate::sandbox::FileOperations;
use std::collections::BTreeMap;
use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::ops::Bound;
use std::task::Poll;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

type ConnectionId = u64;

/// One wake-up of the event loop.
enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Ready(ConnectionId),
}

enum LineOutcome {
    Continue,
    Disconnect,
}

/// The connection multiplexer.
///
/// A single task owns the listener and every open connection. Each loop
/// iteration waits for exactly one event, either a pending accept or a
/// connection with work to do, and handles it to completion before waiting
/// again, so filesystem operations never overlap. Socket I/O inside a
/// handler never waits: replies are queued and written as the peer drains
/// them.
#[derive(Debug)]
pub struct TfshServer {
    config: Config,
    dispatcher: Dispatcher,
    listener: Option<TcpListener>,
    connections: BTreeMap<ConnectionId, Connection>,
    next_id: ConnectionId,
    last_serviced: ConnectionId,
}

impl TfshServer {
    pub fn new(config: Config) -> TfshResult<Self> {
        config.validate()?;

        let ops = FileOperations::new(config.sandbox.get_path())?;
        info!("Serving files from {}", ops.root_path().display());

        Ok(Self {
            config,
            dispatcher: Dispatcher::new(ops),
            listener: None,
            connections: BTreeMap::new(),
            next_id: 0,
            last_serviced: 0,
        })
    }

    /// Use an already bound listener instead of binding `server.host:port`.
    pub fn from_listener(config: Config, listener: TcpListener) -> TfshResult<Self> {
        let mut server = Self::new(config)?;
        server.listener = Some(listener);
        Ok(server)
    }

    pub async fn bind(&mut self) -> TfshResult<SocketAddr> {
        let bind_addr = self.config.server.bind_addr();

        let listener = TcpListener::bind(&bind_addr).await
            .map_err(|e| TfshError::NetworkError(format!("Failed to bind to {}: {}", bind_addr, e)))?;
        let local_addr = listener.local_addr()?;

        info!("TFSH server listening on {}", local_addr);
        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Run the event loop until the listener is closed.
    pub async fn start(&mut self) -> TfshResult<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }

        loop {
            let event = {
                let Some(listener) = self.listener.as_ref() else {
                    break;
                };

                tokio::select! {
                    accepted = listener.accept() => Event::Accepted(accepted),
                    id = next_ready(&self.connections, self.last_serviced) => Event::Ready(id),
                }
            };

            match event {
                Event::Accepted(Ok((stream, addr))) => self.handle_accept(stream, addr),
                Event::Accepted(Err(e)) => error!("Failed to accept connection: {}", e),
                Event::Ready(id) => {
                    self.last_serviced = id;
                    self.service(id).await;
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&mut self) -> TfshResult<()> {
        info!("Stopping TFSH server");

        self.listener = None;

        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            self.close_connection(id, "server shutdown").await;
        }

        info!("TFSH server stopped");
        Ok(())
    }

    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.connections.len() >= self.config.server.max_connections {
            warn!("Connection limit reached, rejecting connection from {}", addr);
            drop(stream);
            return;
        }

        let session = Session::new(addr);
        info!("Client accepted: {} (session {})", addr, session.id());

        let mut connection = Connection::new(stream, session, self.config.server.max_line_length);
        if let Err(e) = connection.send_banner() {
            warn!("Dropping {} before registration: {}", addr, e);
            return;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(id, connection);
    }

    /// Drain queued output, read once, then run buffered lines until the
    /// client is backlogged or none are left.
    async fn service(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.get_mut(&id) else {
            return;
        };

        if let Err(e) = connection.flush_output() {
            warn!("{}", e);
            self.close_connection(id, "write error").await;
            return;
        }

        if !connection.is_backlogged() {
            match connection.read_available() {
                Ok(ReadOutcome::Data) | Ok(ReadOutcome::NoData) => {}
                Ok(ReadOutcome::Closed) => {
                    self.close_connection(id, "peer closed the stream").await;
                    return;
                }
                Err(e) => {
                    warn!("{}", e);
                    self.close_connection(id, "read error").await;
                    return;
                }
            }
        }

        while let Some(line) = connection.next_line() {
            if let LineOutcome::Disconnect = Self::process_line(&self.dispatcher, connection, line) {
                self.close_connection(id, "client logged out").await;
                return;
            }
            if let Err(e) = connection.flush_output() {
                warn!("{}", e);
                self.close_connection(id, "write error").await;
                return;
            }
        }

        if connection.is_backlogged() {
            debug!(
                "Pausing input from {}: {} bytes unsent",
                connection.session().client_addr(),
                connection.pending_output()
            );
        }
    }

    fn process_line(dispatcher: &Dispatcher, connection: &mut Connection, line: Line) -> LineOutcome {
        let text = match line {
            Line::Complete(text) => text,
            Line::TooLong => {
                warn!("Discarded overlong line from {}", connection.session().client_addr());
                connection.queue(LINE_TOO_LONG);
                connection.queue_prompt();
                return LineOutcome::Continue;
            }
        };

        match dispatcher.handle_line(connection.session_mut(), &text) {
            Reply::Text(body) => {
                connection.queue(&body);
                connection.queue_prompt();
                LineOutcome::Continue
            }
            Reply::Ignored => {
                connection.queue_prompt();
                LineOutcome::Continue
            }
            Reply::Disconnect => LineOutcome::Disconnect,
        }
    }

    async fn close_connection(&mut self, id: ConnectionId, reason: &str) {
        let Some(mut connection) = self.connections.remove(&id) else {
            return;
        };

        connection.shutdown().await;

        let session = connection.session();
        let lifetime = chrono::Utc::now() - session.created_at();
        info!(
            "Client {} disconnected ({}), session {} lasted {}s",
            session.client_addr(),
            reason,
            session.id(),
            lifetime.num_seconds()
        );

        let stats = self.stats();
        debug!("{} of {} connection slots in use", stats.active_sessions, stats.max_connections);
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            active_sessions: self.connections.len(),
            max_connections: self.config.server.max_connections,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub active_sessions: usize,
    pub max_connections: usize,
}

/// Wait until some connection has work.
///
/// Polling starts just after the connection serviced last, so a client that
/// keeps sending cannot starve the others. With no connections this never
/// completes and the accept branch drives the loop.
async fn next_ready(connections: &BTreeMap<ConnectionId, Connection>, after: ConnectionId) -> ConnectionId {
    poll_fn(|cx| {
        let ordered = connections
            .range((Bound::Excluded(after), Bound::Unbounded))
            .chain(connections.range(..=after));

        for (id, connection) in ordered {
            if connection.poll_ready(cx).is_ready() {
                debug!("Connection {} is ready", id);
                return Poll::Ready(*id);
            }
        }
        Poll::Pending
    })
    .await
}

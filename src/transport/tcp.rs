//! TCP server and client endpoints.
//!
//! Both speak the socket event vocabulary on their private channel:
//! - fire `ready(addr)` once listening (server), `connected(conn, peer)`,
//!   `read(conn, data)`, `disconnected(conn)` and `error(...)`
//! - react to `write(conn, data)`, `close(conn)` / `disconnect(conn)`, and
//!   `close()` with no arguments, which shuts the whole endpoint down
//!
//! Connection ids are unique across all endpoints in the process, so a
//! `write` fanned out to several endpoints is acted on by exactly one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use backon::BackoffBuilder;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, trace, warn};

use super::Transport;
use crate::common::error::TransportError;
use crate::common::types::ComponentId;
use crate::event::{Arg, Dispatcher, Event, EventBody, EventKind, Fire, Handler, Matcher};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Retry policy for client connection attempts.
#[derive(Debug, Clone)]
pub struct ClientRetry {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Attempts after the first failure before giving up.
    pub max_retries: usize,
}

impl Default for ClientRetry {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_retries: 10,
        }
    }
}

impl ClientRetry {
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        backon::ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_jitter()
            .with_max_times(self.max_retries)
            .build()
    }
}

struct Connection {
    tx: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
}

type Connections = Arc<Mutex<HashMap<u64, Connection>>>;

fn lock(connections: &Connections) -> MutexGuard<'_, HashMap<u64, Connection>> {
    connections.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sends events into the dispatcher as the endpoint.
#[derive(Clone)]
struct Emitter {
    id: ComponentId,
    channel: String,
    injector: mpsc::UnboundedSender<Fire>,
}

impl Emitter {
    fn emit(&self, kind: EventKind, args: Vec<Arg>) {
        let fire = Fire::new(self.id, self.channel.clone(), EventBody::of(kind, args));
        if let Err(e) = self.injector.send(fire) {
            debug!(endpoint = %self.id, event = %e.0.body, "Dispatcher gone, dropping event");
        }
    }
}

/// Handler that applies `write` / `close` events to live connections.
///
/// Dropping it (unbind or unregister) cancels every task of the endpoint.
struct ConnectionControl {
    id: ComponentId,
    connections: Connections,
    shutdown: CancellationToken,
    _guard: DropGuard,
}

impl ConnectionControl {
    fn new(id: ComponentId, connections: Connections, shutdown: CancellationToken) -> Self {
        Self {
            id,
            connections,
            _guard: shutdown.clone().drop_guard(),
            shutdown,
        }
    }
}

impl Handler for ConnectionControl {
    fn handle(&mut self, event: &Event) -> Option<Fire> {
        if event.origin() == self.id {
            return None;
        }

        let kind = event.kind()?;
        if kind == EventKind::Close && event.args().is_empty() {
            info!(endpoint = %self.id, "Closing endpoint");
            self.shutdown.cancel();
            return None;
        }

        let conn = u64::try_from(event.arg(0).and_then(Arg::as_int)?).ok()?;
        match kind {
            EventKind::Write => {
                let data = event.arg(1).and_then(Arg::as_bytes)?.clone();
                match lock(&self.connections).get(&conn) {
                    Some(connection) => {
                        if connection.tx.send(data).is_err() {
                            debug!(endpoint = %self.id, conn, "Write to closing connection dropped");
                        }
                    }
                    None => trace!(endpoint = %self.id, conn, "Write for foreign connection ignored"),
                }
            }
            EventKind::Close | EventKind::Disconnect => {
                if let Some(connection) = lock(&self.connections).remove(&conn) {
                    connection.cancel.cancel();
                }
            }
            _ => {}
        }
        None
    }
}

fn control_matcher() -> Matcher {
    Matcher::Kinds(vec![EventKind::Write, EventKind::Close, EventKind::Disconnect])
}

fn spawn_connection(
    stream: TcpStream,
    peer: String,
    emitter: &Emitter,
    connections: &Connections,
    cancel: CancellationToken,
) {
    let conn = NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::unbounded_channel();
    lock(connections).insert(
        conn,
        Connection {
            tx,
            cancel: cancel.clone(),
        },
    );

    debug!(endpoint = %emitter.id, conn, peer = %peer, "Connection established");
    emitter.emit(EventKind::Connected, vec![Arg::from(conn), Arg::from(peer)]);

    tokio::spawn(run_connection(
        conn,
        stream,
        rx,
        emitter.clone(),
        Arc::clone(connections),
        cancel,
    ));
}

async fn run_connection(
    conn: u64,
    stream: TcpStream,
    mut outgoing: mpsc::UnboundedReceiver<Bytes>,
    emitter: Emitter,
    connections: Connections,
    cancel: CancellationToken,
) {
    let (reader, writer) = stream.into_split();
    let mut reader = FramedRead::new(reader, BytesCodec::new());
    let mut writer = FramedWrite::new(writer, BytesCodec::new());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = reader.next() => match frame {
                Some(Ok(data)) => {
                    emitter.emit(EventKind::Read, vec![Arg::from(conn), Arg::Bytes(data.freeze())]);
                }
                Some(Err(e)) => {
                    warn!(endpoint = %emitter.id, conn, error = %e, "Read failed");
                    emitter.emit(EventKind::Error, vec![Arg::from(conn), Arg::from(e.to_string())]);
                    break;
                }
                None => break,
            },
            data = outgoing.recv() => match data {
                Some(data) => {
                    if let Err(e) = writer.send(data).await {
                        warn!(endpoint = %emitter.id, conn, error = %e, "Write failed");
                        emitter.emit(EventKind::Error, vec![Arg::from(conn), Arg::from(e.to_string())]);
                        break;
                    }
                }
                None => break,
            },
        }
    }

    if let Err(e) = SinkExt::<Bytes>::close(&mut writer).await {
        trace!(conn, error = %e, "Error closing writer");
    }
    lock(&connections).remove(&conn);
    debug!(endpoint = %emitter.id, conn, "Connection closed");
    emitter.emit(EventKind::Disconnected, vec![Arg::from(conn)]);
}

/// Listening TCP endpoint.
#[derive(Debug, Clone)]
pub struct TcpServer {
    address: String,
}

impl TcpServer {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            address: format!("{}:{}", host, port),
        }
    }
}

impl Transport for TcpServer {
    fn name(&self) -> String {
        format!("TcpServer({})", self.address)
    }

    fn attach(
        self: Box<Self>,
        id: ComponentId,
        channel: &str,
        dispatcher: &mut Dispatcher,
    ) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| TransportError::NoRuntime { name: self.name() })?;

        let connections = Connections::default();
        let shutdown = CancellationToken::new();
        let emitter = Emitter {
            id,
            channel: channel.to_string(),
            injector: dispatcher.injector(),
        };

        dispatcher.add_handler(
            id,
            channel,
            control_matcher(),
            ConnectionControl::new(id, Arc::clone(&connections), shutdown.clone()),
        );
        runtime.spawn(serve(self.address, emitter, connections, shutdown));
        Ok(())
    }
}

async fn serve(address: String, emitter: Emitter, connections: Connections, shutdown: CancellationToken) {
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(endpoint = %emitter.id, address = %address, error = %e, "Failed to listen");
            emitter.emit(EventKind::Error, vec![Arg::from(e.to_string())]);
            return;
        }
    };

    let local = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or(address);
    info!(endpoint = %emitter.id, address = %local, "Listening");
    emitter.emit(EventKind::Ready, vec![Arg::from(local)]);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    spawn_connection(stream, peer.to_string(), &emitter, &connections, shutdown.child_token());
                }
                Err(e) => {
                    warn!(endpoint = %emitter.id, error = %e, "Accept failed");
                    emitter.emit(EventKind::Error, vec![Arg::from(e.to_string())]);
                }
            },
        }
    }

    info!(endpoint = %emitter.id, "Stopped listening");
    emitter.emit(EventKind::Closed, vec![]);
}

/// Outgoing TCP endpoint.
#[derive(Debug, Clone)]
pub struct TcpClient {
    address: String,
    retry: ClientRetry,
}

impl TcpClient {
    pub fn new(host: &str, port: u16, retry: ClientRetry) -> Self {
        Self {
            address: format!("{}:{}", host, port),
            retry,
        }
    }
}

impl Transport for TcpClient {
    fn name(&self) -> String {
        format!("TcpClient({})", self.address)
    }

    fn attach(
        self: Box<Self>,
        id: ComponentId,
        channel: &str,
        dispatcher: &mut Dispatcher,
    ) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| TransportError::NoRuntime { name: self.name() })?;

        let connections = Connections::default();
        let shutdown = CancellationToken::new();
        let emitter = Emitter {
            id,
            channel: channel.to_string(),
            injector: dispatcher.injector(),
        };

        dispatcher.add_handler(
            id,
            channel,
            control_matcher(),
            ConnectionControl::new(id, Arc::clone(&connections), shutdown.clone()),
        );
        runtime.spawn(dial(self.address, self.retry, emitter, connections, shutdown));
        Ok(())
    }
}

async fn dial(
    address: String,
    retry: ClientRetry,
    emitter: Emitter,
    connections: Connections,
    shutdown: CancellationToken,
) {
    let mut backoff = retry.backoff();

    loop {
        let attempt = tokio::select! {
            _ = shutdown.cancelled() => return,
            attempt = TcpStream::connect(&address) => attempt,
        };

        match attempt {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_else(|_| address.clone());
                info!(endpoint = %emitter.id, address = %peer, "Connected");
                spawn_connection(stream, peer, &emitter, &connections, shutdown.child_token());
                return;
            }
            Err(e) => {
                let Some(delay) = backoff.next() else {
                    error!(endpoint = %emitter.id, address = %address, error = %e, "Giving up connecting");
                    emitter.emit(EventKind::Error, vec![Arg::from(e.to_string())]);
                    return;
                };
                warn!(
                    endpoint = %emitter.id,
                    address = %address,
                    error = %e,
                    "Connect failed, retrying in {:.1}s",
                    delay.as_secs_f64()
                );
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::watch;

    use super::*;

    type Seen = Arc<Mutex<Vec<Event>>>;

    fn tap(dispatcher: &mut Dispatcher, owner: ComponentId, channel: &str) -> Seen {
        let seen: Seen = Arc::default();
        let sink = Arc::clone(&seen);
        dispatcher.add_handler(owner, channel, Matcher::socket_events(), move |event: &Event| -> Option<Fire> {
            sink.lock().unwrap().push(event.clone());
            None
        });
        seen
    }

    async fn wait_for(seen: &Seen, name: &str) -> Event {
        for _ in 0..400 {
            if let Some(event) = seen.lock().unwrap().iter().find(|e| e.name() == name) {
                return event.clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {}", name);
    }

    #[test]
    fn test_control_ignores_negative_connection_ids() {
        let id = ComponentId::next();
        let app = ComponentId::next();
        let connections = Connections::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        lock(&connections).insert(
            u64::MAX,
            Connection {
                tx,
                cancel: CancellationToken::new(),
            },
        );
        let mut control = ConnectionControl::new(id, Arc::clone(&connections), CancellationToken::new());

        let data = Arg::Bytes(Bytes::from_static(b"x"));
        let write = Event::new(EventBody::of(EventKind::Write, vec![Arg::Int(-1), data.clone()]), app);
        assert!(control.handle(&write).is_none());
        assert!(rx.try_recv().is_err());

        let close = Event::new(EventBody::of(EventKind::Close, vec![Arg::Int(-1)]), app);
        control.handle(&close);
        assert!(lock(&connections).contains_key(&u64::MAX));
    }

    #[test]
    fn test_control_routes_writes_to_owned_connection() {
        let id = ComponentId::next();
        let app = ComponentId::next();
        let connections = Connections::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        lock(&connections).insert(
            7,
            Connection {
                tx,
                cancel: cancel.clone(),
            },
        );
        let mut control = ConnectionControl::new(id, Arc::clone(&connections), CancellationToken::new());

        let write = Event::new(
            EventBody::of(EventKind::Write, vec![Arg::Int(7), Arg::Bytes(Bytes::from_static(b"hi"))]),
            app,
        );
        control.handle(&write);
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"hi"));

        let close = Event::new(EventBody::of(EventKind::Close, vec![Arg::Int(7)]), app);
        control.handle(&close);
        assert!(cancel.is_cancelled());
        assert!(lock(&connections).is_empty());
    }

    #[test]
    fn test_attach_without_runtime_fails() {
        let mut dispatcher = Dispatcher::default();
        let id = dispatcher.register("server", "web_1", None);
        let result = Box::new(TcpServer::new("127.0.0.1", 0)).attach(id, "web_1", &mut dispatcher);
        assert!(matches!(result, Err(TransportError::NoRuntime { .. })));
    }

    #[tokio::test]
    async fn test_server_echo_round_trip() {
        let mut dispatcher = Dispatcher::default();
        let id = dispatcher.register("server", "web_1", None);
        let seen = tap(&mut dispatcher, id, "web_1");

        // Answer every read with a write from another component.
        let app = ComponentId::next();
        dispatcher.add_handler(id, "web_1", Matcher::Kinds(vec![EventKind::Read]), move |event: &Event| -> Option<Fire> {
            let conn = event.arg(0)?.clone();
            let data = event.arg(1)?.clone();
            Some(Fire::new(app, "web_1", EventBody::of(EventKind::Write, vec![conn, data])))
        });

        Box::new(TcpServer::new("127.0.0.1", 0))
            .attach(id, "web_1", &mut dispatcher)
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            dispatcher.run(shutdown_rx).await.unwrap();
            dispatcher
        });

        let ready = wait_for(&seen, "ready").await;
        let address = ready.arg(0).and_then(Arg::as_text).unwrap().to_string();

        let mut client = TcpStream::connect(&address).await.unwrap();
        client.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        let connected = wait_for(&seen, "connected").await;
        assert_eq!(connected.origin(), id);

        drop(client);
        wait_for(&seen, "disconnected").await;

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}

//! TCP listener for the decoys.
//!
//! Binds the port, accepts connections and spawns one session task per
//! connection. The accept loop never waits on a session; sessions that
//! fail or panic are logged and forgotten.

use crate::config::Config;
use crate::protocols::ProtocolType;
use crate::session::{Session, SessionEnd, DEFAULT_READ_CHUNK};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Pending connection queue length.
const LISTEN_BACKLOG: i32 = 5;

/// Runtime knobs for a listener.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Maximum simultaneous connections; `None` means unlimited.
    pub max_connections: Option<usize>,
    /// Upper bound on a single read.
    pub read_chunk: usize,
    /// How long open connections may keep running after shutdown.
    pub shutdown_grace: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_connections: None,
            read_chunk: DEFAULT_READ_CHUNK,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Listener errors
#[derive(Debug)]
pub enum ServerError {
    /// The port could not be claimed.
    Bind(SocketAddr, io::Error),
    Io(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
            ServerError::Io(e) => write!(f, "Listener I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind(_, e) | ServerError::Io(e) => Some(e),
        }
    }
}

/// A bound decoy listener.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    protocol: ProtocolType,
    options: ServerOptions,
}

type SessionResult = (SocketAddr, io::Result<SessionEnd>);

impl Server {
    /// Bind `addr` for `protocol`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(
        addr: SocketAddr,
        protocol: ProtocolType,
        options: ServerOptions,
    ) -> Result<Self, ServerError> {
        let listener = create_listener(addr)
            .and_then(TcpListener::from_std)
            .map_err(|e| ServerError::Bind(addr, e))?;
        let local_addr = listener.local_addr().map_err(ServerError::Io)?;

        info!(
            address = %local_addr,
            protocol = %protocol,
            max_connections = ?options.max_connections,
            "Server listening"
        );

        Ok(Server {
            listener,
            local_addr,
            protocol,
            options,
        })
    }

    /// Bind using a resolved configuration.
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        Self::bind(config.listen_addr(), config.protocol, config.server_options())
    }

    /// Address actually bound (differs from the requested one for port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes, then drain open connections.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            local_addr,
            protocol,
            options,
        } = self;

        let limit = options
            .max_connections
            .map(|n| Arc::new(Semaphore::new(n)));
        let mut sessions: JoinSet<SessionResult> = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(address = %local_addr, "Shutdown requested, no longer accepting");
                    break;
                }

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    log_session_exit(joined);
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let permit = match &limit {
                            Some(semaphore) => match Arc::clone(semaphore).try_acquire_owned() {
                                Ok(permit) => Some(permit),
                                Err(_) => {
                                    warn!(peer = %peer, "Connection limit reached, dropping connection");
                                    continue;
                                }
                            },
                            None => None,
                        };

                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                        }

                        let session = Session::new(stream, peer, protocol.codec(), options.read_chunk);
                        sessions.spawn(async move {
                            let result = session.run().await;
                            drop(permit);
                            (peer, result)
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        // Stop accepting before waiting on the stragglers
        drop(listener);
        drain(sessions, options.shutdown_grace).await;

        info!(address = %local_addr, "Server stopped");
        Ok(())
    }
}

/// Wait for open sessions, aborting whatever outlives the grace period.
async fn drain(mut sessions: JoinSet<SessionResult>, grace: Duration) {
    if sessions.is_empty() {
        return;
    }

    info!(
        open = sessions.len(),
        grace_secs = grace.as_secs_f64(),
        "Waiting for open connections"
    );

    let finished = tokio::time::timeout(grace, async {
        while let Some(joined) = sessions.join_next().await {
            log_session_exit(joined);
        }
    })
    .await;

    if finished.is_err() {
        warn!(
            remaining = sessions.len(),
            "Grace period elapsed, closing remaining connections"
        );
        sessions.shutdown().await;
    }
}

/// Sessions log their own close, I/O errors included; only task failures
/// are reported here.
fn log_session_exit(joined: Result<SessionResult, JoinError>) {
    match joined {
        Ok(_) => {}
        Err(e) if e.is_panic() => error!(error = %e, "Session panicked"),
        Err(e) => debug!(error = %e, "Session cancelled"),
    }
}

/// Create a TCP listener with SO_REUSEADDR and a short backlog.
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
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::mongodb::{MsgHeader, HEADER_LEN};
    use bytes::BytesMut;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    struct Running {
        addr: SocketAddr,
        stop: oneshot::Sender<()>,
        handle: JoinHandle<Result<(), ServerError>>,
    }

    fn start(protocol: ProtocolType, options: ServerOptions) -> Running {
        let server = Server::bind("127.0.0.1:0".parse().unwrap(), protocol, options).unwrap();
        let addr = server.local_addr();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        Running { addr, stop, handle }
    }

    async fn exchange(stream: &mut TcpStream, request: &[u8], reply_len: usize) -> Vec<u8> {
        stream.write_all(request).await.unwrap();
        let mut reply = vec![0u8; reply_len];
        stream.read_exact(&mut reply).await.unwrap();
        reply
    }

    fn mongo_request(request_id: i32) -> Vec<u8> {
        let body = b"\x05\x00\x00\x00\x00";
        let mut buf = BytesMut::new();
        MsgHeader {
            message_length: (HEADER_LEN + body.len()) as i32,
            request_id,
            response_to: 0,
            op_code: 2004,
        }
        .encode_into(&mut buf);
        buf.extend_from_slice(body);
        buf.to_vec()
    }

    #[tokio::test]
    async fn test_concurrent_connections_no_crosstalk() {
        let running = start(ProtocolType::MongoDb, ServerOptions::default());

        let mut streams = Vec::new();
        for _ in 0..8 {
            streams.push(TcpStream::connect(running.addr).await.unwrap());
        }

        // Send everything first so all sessions are live at once
        for (i, stream) in streams.iter_mut().enumerate() {
            stream.write_all(&mongo_request(1000 + i as i32)).await.unwrap();
        }

        for (i, stream) in streams.iter_mut().enumerate() {
            let mut reply = vec![0u8; 93];
            stream.read_exact(&mut reply).await.unwrap();

            let header = MsgHeader::parse(&reply).unwrap();
            assert_eq!(header.message_length as usize, reply.len());
            assert_eq!(header.response_to, 1000 + i as i32);
        }

        running.stop.send(()).unwrap();
        drop(streams);
        running.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_postgres_handshake_then_errors() {
        let running = start(ProtocolType::Postgres, ServerOptions::default());
        let mut stream = TcpStream::connect(running.addr).await.unwrap();

        let startup = b"\x00\x00\x00\x08\x00\x03\x00\x00";
        let handshake = exchange(&mut stream, startup, 9 + 13 + 6).await;
        assert_eq!(handshake[0], b'R');
        assert_eq!(handshake[9], b'K');
        assert_eq!(&handshake[22..], b"Z\x00\x00\x00\x05I");

        for _ in 0..2 {
            let error = exchange(&mut stream, b"Q\x00\x00\x00\x0dSELECT 1\x00", 34).await;
            assert_eq!(error[0], b'E');
            assert_eq!(&error[1..5], &33u32.to_be_bytes());
        }
    }

    #[tokio::test]
    async fn test_redis_replies_repeat() {
        let running = start(ProtocolType::Redis, ServerOptions::default());
        let mut stream = TcpStream::connect(running.addr).await.unwrap();

        assert_eq!(exchange(&mut stream, b"PING\r\n", 7).await, b"+PONG\r\n");
        assert_eq!(exchange(&mut stream, b"GET foo\r\n", 5).await, b"$-1\r\n");
        assert_eq!(exchange(&mut stream, b"GET foo\r\n", 5).await, b"$-1\r\n");
        assert_eq!(exchange(&mut stream, b"ECHO hi\r\n", 8).await, b"$2\r\nhi\r\n");
    }

    #[tokio::test]
    async fn test_truncated_header_does_not_affect_listener() {
        let running = start(ProtocolType::MongoDb, ServerOptions::default());

        let mut short = TcpStream::connect(running.addr).await.unwrap();
        short.write_all(&[1, 2, 3, 4, 5]).await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(short.read(&mut buf).await.unwrap(), 0);

        let mut stream = TcpStream::connect(running.addr).await.unwrap();
        let reply = exchange(&mut stream, &mongo_request(77), 93).await;
        assert_eq!(MsgHeader::parse(&reply).unwrap().response_to, 77);
    }

    #[tokio::test]
    async fn test_silent_connection_gets_no_reply() {
        let running = start(ProtocolType::Postgres, ServerOptions::default());

        let mut silent = TcpStream::connect(running.addr).await.unwrap();
        silent.shutdown().await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(silent.read(&mut buf).await.unwrap(), 0);

        // A fresh connection still gets the full handshake
        let mut stream = TcpStream::connect(running.addr).await.unwrap();
        let handshake = exchange(&mut stream, b"startup", 28).await;
        assert_eq!(handshake[0], b'R');
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let options = ServerOptions {
            max_connections: Some(1),
            ..ServerOptions::default()
        };
        let running = start(ProtocolType::Redis, options);

        let mut first = TcpStream::connect(running.addr).await.unwrap();
        assert_eq!(exchange(&mut first, b"PING\r\n", 7).await, b"+PONG\r\n");

        let mut second = TcpStream::connect(running.addr).await.unwrap();
        let _ = second.write_all(b"PING\r\n").await;
        let mut buf = [0u8; 16];
        assert!(matches!(second.read(&mut buf).await, Ok(0) | Err(_)));

        // The first connection is unaffected
        assert_eq!(exchange(&mut first, b"PING\r\n", 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        match Server::bind(addr, ProtocolType::Redis, ServerOptions::default()) {
            Err(ServerError::Bind(failed, _)) => assert_eq!(failed, addr),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bind should fail while the port is taken"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_lets_open_sessions_finish() {
        let running = start(ProtocolType::Redis, ServerOptions::default());
        let mut stream = TcpStream::connect(running.addr).await.unwrap();
        assert_eq!(exchange(&mut stream, b"PING\r\n", 7).await, b"+PONG\r\n");

        running.stop.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // No new connections once shutdown has begun
        assert!(TcpStream::connect(running.addr).await.is_err());

        // The open one keeps working until the client leaves
        assert_eq!(exchange(&mut stream, b"SET a b\r\n", 5).await, b"+OK\r\n");
        drop(stream);

        running.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_grace_period_closes_idle_sessions() {
        let options = ServerOptions {
            shutdown_grace: Duration::from_millis(100),
            ..ServerOptions::default()
        };
        let running = start(ProtocolType::Redis, options);
        let mut idle = TcpStream::connect(running.addr).await.unwrap();
        assert_eq!(exchange(&mut idle, b"PING\r\n", 7).await, b"+PONG\r\n");

        running.stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), running.handle)
            .await
            .expect("server should stop after the grace period")
            .unwrap()
            .unwrap();

        let mut buf = [0u8; 8];
        assert!(matches!(idle.read(&mut buf).await, Ok(0) | Err(_)));
    }
}

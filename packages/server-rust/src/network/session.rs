//! Per-connection command session.
//!
//! A session owns its socket and runs the read -> dispatch -> write loop:
//! exactly one framed request in, exactly one framed response out,
//! strictly in order. A transport error closes the session silently; a
//! protocol error gets a best-effort error response first. Sessions are
//! independent -- one failing never disturbs another, and a session never
//! outlives the shutdown drain deadline.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use nimo_core::Response;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::command::{HandlerMap, SessionContext};
use crate::protocol::{CommandCodec, ProtocolError};

use super::shutdown::ShutdownController;

/// Opcode echoed on responses to requests whose opcode never decoded.
const PROTOCOL_FAULT_OPCODE: &str = "!";

/// Runs one session to completion.
///
/// Returns when the peer disconnects, a protocol error poisons the
/// stream, or shutdown is triggered.
pub async fn run_session(
    socket: TcpStream,
    peer: SocketAddr,
    session_id: u64,
    handlers: Arc<HandlerMap>,
    shutdown: Arc<ShutdownController>,
) {
    let mut framed = Framed::new(socket, CommandCodec);
    let mut stop = shutdown.shutdown_receiver();

    debug!(session_id, %peer, "session opened");
    loop {
        tokio::select! {
            next = framed.next() => match next {
                Some(Ok(request)) => {
                    // The guard covers dispatch and the response write so
                    // shutdown drains the full request/response exchange.
                    let _guard = shutdown.in_flight_guard();
                    let ctx = SessionContext { session_id, peer };
                    let response = handlers.dispatch(&request, &ctx);
                    if let Err(error) = framed.send(response).await {
                        debug!(session_id, %error, "response write failed");
                        break;
                    }
                    trace!(session_id, opcode = %request.opcode, "request answered");
                }
                Some(Err(ProtocolError::Io(error))) => {
                    debug!(session_id, %error, "transport error");
                    break;
                }
                Some(Err(error)) => {
                    debug!(session_id, %error, "protocol error");
                    // Best effort only: the output side may be broken too.
                    let _ = framed
                        .send(Response::failure(PROTOCOL_FAULT_OPCODE, error.to_string()))
                        .await;
                    break;
                }
                None => {
                    trace!(session_id, "peer closed the connection");
                    break;
                }
            },
            _ = stop.changed() => {
                trace!(session_id, "session stopping for shutdown");
                break;
            }
        }
    }
    debug!(session_id, %peer, "session closed");
}

#[cfg(test)]
mod tests {
    use nimo_core::{opcodes, Request, Value};
    use tokio::net::TcpListener;

    use super::*;
    use crate::catalog::CatalogStore;
    use crate::command::standard_handlers;
    use crate::protocol::ClientCodec;
    use crate::status::StatusPublisher;

    async fn session_fixture() -> (Framed<TcpStream, ClientCodec>, Arc<ShutdownController>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let handlers = Arc::new(standard_handlers(
            Arc::new(CatalogStore::new()),
            Arc::new(StatusPublisher::disabled()),
        ));
        let shutdown = Arc::new(ShutdownController::new());
        let session_shutdown = Arc::clone(&shutdown);

        tokio::spawn(async move {
            let (socket, peer) = listener.accept().await.expect("accept");
            run_session(socket, peer, 1, handlers, session_shutdown).await;
        });

        let client = TcpStream::connect(addr).await.expect("connect");
        (Framed::new(client, ClientCodec), shutdown)
    }

    #[tokio::test]
    async fn answers_requests_in_order() {
        let (mut client, _shutdown) = session_fixture().await;

        client
            .send(Request::new(
                opcodes::ADD_MACHINE,
                vec![Value::from("alpha"), Value::Integer(0xC0A8_010B)],
            ))
            .await
            .expect("send add");
        client
            .send(Request::new(opcodes::COUNT_MACHINES, Vec::new()))
            .await
            .expect("send count");

        let first = client.next().await.expect("first response").expect("ok");
        assert_eq!(first.opcode, opcodes::ADD_MACHINE);
        assert!(first.ok);

        let second = client.next().await.expect("second response").expect("ok");
        assert_eq!(second.opcode, opcodes::COUNT_MACHINES);
        assert_eq!(second.result.as_i64(), Some(1));
    }

    #[tokio::test]
    async fn unknown_opcode_keeps_session_open() {
        let (mut client, _shutdown) = session_fixture().await;

        client
            .send(Request::new("nope", Vec::new()))
            .await
            .expect("send unknown");
        let response = client.next().await.expect("response").expect("ok");
        assert!(!response.ok);

        // The session is still serving.
        client
            .send(Request::new(opcodes::COUNT_MACHINES, Vec::new()))
            .await
            .expect("send count");
        let response = client.next().await.expect("response").expect("ok");
        assert!(response.ok);
    }

    #[tokio::test]
    async fn protocol_error_ends_session_with_error_response() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handlers = Arc::new(standard_handlers(
            Arc::new(CatalogStore::new()),
            Arc::new(StatusPublisher::disabled()),
        ));
        let shutdown = Arc::new(ShutdownController::new());
        let session_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            let (socket, peer) = listener.accept().await.expect("accept");
            run_session(socket, peer, 1, handlers, session_shutdown).await;
        });

        let mut client = TcpStream::connect(addr).await.expect("connect");
        // A response-role frame where a request belongs: hard protocol error.
        let bogus = nimo_core::frame::frame_message(
            nimo_core::FrameRole::Response,
            &Value::Array(vec![Value::from("x"), Value::Logical(true), Value::Integer(0)]),
        )
        .expect("frame");
        client.write_all(&bogus).await.expect("write");

        let mut framed = Framed::new(client, ClientCodec);
        let response = framed.next().await.expect("error response").expect("decode");
        assert!(!response.ok);
        // And then the server closes.
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn shutdown_closes_idle_session() {
        let (mut client, shutdown) = session_fixture().await;
        shutdown.trigger_shutdown();
        // Server side hangs up without sending anything.
        assert!(client.next().await.is_none());
    }
}

//! # Bootstrap Handler
//!
//! Serves connections that have no session yet. Only the static commands
//! are accepted: `RegisterBdv` (network magic word), `Shutdown` and
//! `ShutdownNode` (cookie).

use super::connection::Connection;
use super::server::TransportServer;
use crate::domain::ShutdownRequest;
use bv_03_session::{
    decode_envelope, fragment, Command, OutboundSink, Packet, Response, ServerMessage,
    SessionError, StaticRequest,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) fn handle(server: &TransportServer, connection: &Connection, payload: Vec<u8>) {
    let whole = Packet::decode(&payload).and_then(|packet| connection.bootstrap.lock().push(packet));
    let (msg_id, message) = match whole {
        Ok(Some(whole)) => whole,
        Ok(None) => return,
        Err(e) => {
            warn!(connection_id = connection.id, error = %e, "Dropping bootstrap packet");
            return;
        }
    };

    let result = match decode_envelope(&message).and_then(Command::try_from) {
        Ok(Command::Static(request)) => run(server, connection, request),
        Ok(Command::Session { session_id, .. }) => Err(SessionError::UnknownSession(session_id)),
        Err(e) => Err(e),
    };
    let response = result.unwrap_or_else(|e| {
        debug!(connection_id = connection.id, error = %e, "Bootstrap command rejected");
        Response::from_error(&e)
    });
    reply(server, connection, msg_id, response);
}

pub(super) fn run(
    server: &TransportServer,
    connection: &Connection,
    request: StaticRequest,
) -> Result<Response, SessionError> {
    let bootstrap = &server.inner.bootstrap;
    match request {
        StaticRequest::RegisterBdv(magic) => {
            if magic != bootstrap.network_magic {
                return Err(SessionError::Unauthorized("network magic word"));
            }
            let mut bound = connection.session.lock();
            // closing marks the queue before it takes this lock
            if connection.queue.is_closed() {
                return Err(SessionError::Closed);
            }
            let sink: Arc<dyn OutboundSink> = connection.queue.clone();
            let session_id = server.inner.sessions.open(sink);
            *bound = Some(session_id.clone());
            info!(connection_id = connection.id, %session_id, "Session registered");
            Ok(Response::Id(session_id))
        }
        StaticRequest::Shutdown(cookie) => {
            check_cookie(&bootstrap.cookie, &cookie)?;
            server.request_shutdown(ShutdownRequest::Server);
            Ok(Response::Empty)
        }
        StaticRequest::ShutdownNode(cookie) => {
            check_cookie(&bootstrap.cookie, &cookie)?;
            server.request_shutdown(ShutdownRequest::Node);
            Ok(Response::Empty)
        }
    }
}

fn check_cookie(expected: &str, presented: &str) -> Result<(), SessionError> {
    if expected.is_empty() || expected != presented {
        return Err(SessionError::Unauthorized("cookie"));
    }
    Ok(())
}

fn reply(server: &TransportServer, connection: &Connection, msg_id: u32, response: Response) {
    let packets = ServerMessage::Response(response)
        .encode()
        .and_then(|bytes| fragment(msg_id, &bytes, server.config().packet_size));
    match packets {
        Ok(packets) => {
            connection
                .queue
                .send(packets.iter().map(Packet::encode).collect());
        }
        Err(e) => warn!(connection_id = connection.id, error = %e, "Failed to encode reply"),
    }
}

//! The live notification endpoint.
//!
//! `GET /ws?token=<access token>` upgrades to a WebSocket. The token is validated *before* the
//! upgrade: a missing or invalid token is refused with 401 and the connection is never accepted.
//! An accepted connection joins its per-user and per-role hub groups, receives a
//! `connection_established` greeting, and from then on is a passive consumer of whatever its
//! groups are sent. The only inbound message with any meaning is the keep-alive ping, which is
//! echoed back as a pong with the original timestamp.

use actix_web::{rt, web, HttpRequest, HttpResponse};
use actix_ws::{Message, MessageStream, Session};
use futures::StreamExt;
use log::*;
use marketplace_engine::events::{GroupKey, NotificationEvent, NotificationHub};
use serde::Deserialize;

use crate::{
    auth::TokenIssuer,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn notifications_ws(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    hub: web::Data<NotificationHub>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let token = query.into_inner().token.ok_or(AuthError::MissingToken)?;
    // Reject before accepting: the handshake only proceeds with a valid token.
    let claims = issuer.validate_token(&token)?;
    let (response, session, msg_stream) =
        actix_ws::handle(&req, stream).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    debug!("📡️ WebSocket connection accepted for user #{} ({})", claims.sub, claims.role);
    let groups = vec![GroupKey::user(claims.sub), GroupKey::role(claims.role)];
    rt::spawn(ws_loop(session, msg_stream, hub.get_ref().clone(), groups));
    Ok(response)
}

async fn ws_loop(mut session: Session, mut stream: MessageStream, hub: NotificationHub, groups: Vec<GroupKey>) {
    let (conn_id, mut events) = hub.subscribe(groups).await;
    if send_event(&mut session, &NotificationEvent::connection_established()).await.is_err() {
        hub.unsubscribe(conn_id).await;
        return;
    }
    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_client_message(&text) {
                        if send_event(&mut session, &reply).await.is_err() {
                            break;
                        }
                    }
                },
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                },
                Some(Ok(Message::Close(reason))) => {
                    debug!("📡️ Connection {conn_id} closed by peer: {reason:?}");
                    break;
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    debug!("📡️ Protocol error on connection {conn_id}: {e}");
                    break;
                },
                None => break,
            },
            event = events.recv() => match event {
                Some(event) => {
                    if send_event(&mut session, &event).await.is_err() {
                        break;
                    }
                },
                None => break,
            },
        }
    }
    hub.unsubscribe(conn_id).await;
    let _ = session.close(None).await;
}

/// Parse an inbound text frame. Pings are answered; everything else is ignored (invalid JSON is
/// logged, as clients occasionally send garbage).
fn handle_client_message(text: &str) -> Option<NotificationEvent> {
    match serde_json::from_str::<NotificationEvent>(text) {
        Ok(NotificationEvent::Ping { timestamp }) => Some(NotificationEvent::pong(timestamp)),
        Ok(_) => None,
        Err(e) => {
            error!("📡️ Invalid JSON received: {e}");
            None
        },
    }
}

async fn send_event(session: &mut Session, event: &NotificationEvent) -> Result<(), actix_ws::Closed> {
    match serde_json::to_string(event) {
        Ok(text) => session.text(text).await,
        Err(e) => {
            error!("📡️ Could not serialize event: {e}");
            Ok(())
        },
    }
}

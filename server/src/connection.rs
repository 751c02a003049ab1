use std::collections::HashMap;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use system::{ClientEvent, ConnectionId, ServerEvent};

use crate::auth::{AuthError, Identity, TokenVerifier};
use crate::outbox::OUTBOX_CAPACITY;
use crate::server::{ServerCommand, ServerTx};

/// Egress half of one websocket connection, fed by the gateway or a
/// room through the connection's outbox.
#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    Event(ServerEvent),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    Idle,
    Connected(ConnectionId),
}

/// Frames accepted while the gateway's registration ack is still in
/// flight. An immediate `join-room` after the handshake lands here.
const PENDING_INGRESS_CAPACITY: usize = 32;

struct ConnectionActor {
    srv_tx: ServerTx,
    identity: Option<Identity>,
    state: ConnectionState,
    pending: Vec<ClientEvent>,
}

impl ConnectionActor {
    /// Routes a parsed ingress frame. The connection id is assigned
    /// asynchronously by the gateway, so frames that race the
    /// registration ack are buffered and replayed instead of lost.
    fn route_event(&mut self, event: ClientEvent) {
        match self.state {
            ConnectionState::Connected(from) => self.forward(from, event),
            ConnectionState::Idle => {
                if self.pending.len() >= PENDING_INGRESS_CAPACITY {
                    log::warn!("ingress buffer full before registration; dropping {:?}", event);
                    return;
                }
                log::debug!("buffering ingress until connection is registered");
                self.pending.push(event);
            }
        }
    }

    /// Completes registration and replays buffered frames in order.
    fn register(&mut self, connection_id: ConnectionId) {
        self.state = ConnectionState::Connected(connection_id);
        for event in std::mem::take(&mut self.pending) {
            self.forward(connection_id, event);
        }
    }

    fn forward(&mut self, from: ConnectionId, event: ClientEvent) {
        if self
            .srv_tx
            .try_send(ServerCommand::Event { from, event })
            .is_err()
        {
            log::warn!("gateway queue full; dropping event from {}", from);
        }
    }

    /// Hands the disconnect to the gateway at most once, no matter how
    /// many times the transport reports it.
    fn notify_disconnect(&mut self) {
        if let ConnectionState::Connected(from) = self.state {
            self.state = ConnectionState::Idle;
            if self
                .srv_tx
                .try_send(ServerCommand::Disconnect { from })
                .is_err()
            {
                log::error!("gateway unavailable for disconnect of {}", from);
            }
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let Some(identity) = self.identity.take() else {
            if let Ok(text) = serde_json::to_string(&ServerEvent::Unauthorized) {
                ctx.text(text);
            }
            ctx.close(Some(CloseReason {
                code: CloseCode::Policy,
                description: None,
            }));
            ctx.stop();
            return;
        };

        let (tx, mut rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(OUTBOX_CAPACITY);

        if self
            .srv_tx
            .try_send(ServerCommand::Connect { tx, identity })
            .is_err()
        {
            log::error!("gateway queue full; refusing connection");
            ctx.stop();
            return;
        }

        let addr = ctx.address().recipient();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if addr.try_send(ConnectionActorMessage(event)).is_err() {
                    break;
                }
            }
            log::debug!("egress pump terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.notify_disconnect();
        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => {
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        log::debug!("ingress {:?}", event);
                        self.route_event(event);
                    }
                    // malformed frames are dropped, never fatal
                    Err(err) => log::warn!("malformed event dropped: {}", err),
                }
            }
            Ok(ws::Message::Close(_)) => {
                self.notify_disconnect();
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: ConnectionActorMessage, ctx: &mut Self::Context) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                self.register(connection_id);
            }
            ConnectionEvent::Event(event) => {
                log::debug!("egress {:?}", event);
                match serde_json::to_string(&event) {
                    Ok(text) => ctx.text(text),
                    Err(err) => log::error!("could not serialize event: {}", err),
                }
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    verifier: web::Data<dyn TokenVerifier>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, Error> {
    let identity = match query.get("token") {
        None => Err(AuthError::MissingToken),
        Some(token) => verifier.verify(token),
    };
    let identity = match identity {
        Ok(identity) => Some(identity),
        Err(err) => {
            log::info!("rejecting connection: {}", err);
            None
        }
    };
    ws::start(
        ConnectionActor {
            srv_tx: srv_tx.get_ref().clone(),
            identity,
            state: ConnectionState::Idle,
            pending: Vec::new(),
        },
        &req,
        stream,
    )
}

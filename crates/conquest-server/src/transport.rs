//! Newline-delimited JSON over TCP.
//!
//! One request per line, one reply per line. A connection that subscribes to a session also
//! receives that session's events, interleaved with replies. A connection holds every seat it
//! created, joined or reconnected to; when it closes, each of those players is marked
//! disconnected.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use conquest_protocol::wire::snapshot_hash;
use conquest_protocol::{ErrorCode, PlayerId, SessionId};

use crate::protocol::{
    decode_client_line, encode_line, ClientMessage, ServerMessage, SessionEvent,
};
use crate::service::GameService;

/// Replies and events queued per connection before the reader waits on the writer.
const OUTBOUND_BUFFER: usize = 64;

type Seat = (SessionId, PlayerId);

/// Transport error types
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind socket to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Failed to determine bound address: {0}")]
    LocalAddrFailed(std::io::Error),

    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub async fn bind(address: SocketAddr) -> Result<TcpListener, TransportError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| TransportError::BindFailed(address, e))?;
    let bound = listener.local_addr().map_err(TransportError::LocalAddrFailed)?;
    info!("Transport bound to {}", bound);
    Ok(listener)
}

/// Accept connections until `shutdown` turns true or its sender goes away.
pub async fn serve(
    listener: TcpListener,
    service: Arc<GameService>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                debug!(%peer, "client connected");
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, service).await {
                        debug!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("transport shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    service: Arc<GameService>,
) -> Result<(), TransportError> {
    let (reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let mut line = encode_line(&msg)?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
        }
        Ok::<_, TransportError>(())
    });

    let mut seats: BTreeSet<Seat> = BTreeSet::new();
    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();
    let mut lines = BufReader::new(reader).lines();
    let result = async {
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let reply = match decode_client_line(&line) {
                Ok(ClientMessage::Subscribe { session_id }) => {
                    let (reply, forwarder) = subscribe(&service, session_id, tx.clone());
                    forwarders.extend(forwarder);
                    reply
                }
                Ok(msg) => {
                    let change = SeatChange::requested(&msg);
                    let reply = dispatch(&service, msg).await;
                    track_seats(&mut seats, change, &reply);
                    reply
                }
                Err(e) => ServerMessage::error(ErrorCode::BadRequest, e.to_string()),
            };
            if tx.send(reply).await.is_err() {
                break;
            }
        }
        Ok::<_, TransportError>(())
    }
    .await;

    for (session_id, player_id) in seats {
        if let Err(e) = service.disconnect(&session_id, player_id).await {
            debug!(session = %session_id, player = %player_id, error = %e, "disconnect on close failed");
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    drop(tx);
    match write_task.await {
        Ok(Err(e)) => debug!(error = %e, "writer stopped"),
        Err(e) => error!(error = %e, "writer task panicked"),
        Ok(Ok(())) => {}
    }
    result
}

/// Seat a request explicitly takes or gives up, by player id.
#[derive(Debug, PartialEq)]
enum SeatChange {
    Take(Seat),
    Release(Seat),
}

impl SeatChange {
    fn requested(msg: &ClientMessage) -> Option<Self> {
        match msg {
            ClientMessage::Reconnect {
                session_id,
                player_id,
            } => Some(Self::Take((session_id.clone(), *player_id))),
            ClientMessage::Disconnect {
                session_id,
                player_id,
            } => Some(Self::Release((session_id.clone(), *player_id))),
            _ => None,
        }
    }
}

/// Apply a request's seat change once the service accepted it. Rejected requests change nothing.
fn track_seats(seats: &mut BTreeSet<Seat>, change: Option<SeatChange>, reply: &ServerMessage) {
    if matches!(reply, ServerMessage::Error { .. }) {
        return;
    }
    match change {
        Some(SeatChange::Take(seat)) => {
            seats.insert(seat);
        }
        Some(SeatChange::Release(seat)) => {
            seats.remove(&seat);
        }
        None => {}
    }
    seats.extend(seated(reply));
}

/// The session seat a reply hands to this connection, if any.
fn seated(reply: &ServerMessage) -> Option<Seat> {
    match reply {
        ServerMessage::Created {
            session_id,
            player_id,
            ..
        } => Some((session_id.clone(), *player_id)),
        ServerMessage::Joined {
            player_id,
            snapshot,
        } => Some((snapshot.session_id.clone(), *player_id)),
        _ => None,
    }
}

/// Forward the session's events to this connection until it closes.
fn subscribe(
    service: &GameService,
    session_id: SessionId,
    tx: mpsc::Sender<ServerMessage>,
) -> (ServerMessage, Option<JoinHandle<()>>) {
    let mut events = match service.subscribe(&session_id) {
        Ok(events) => events,
        Err(e) => return (e.to_payload().into(), None),
    };

    let forwarder = tokio::spawn(async move {
        let mut last_state: Option<u64> = None;
        loop {
            match events.recv().await {
                Ok(event) => {
                    // identical consecutive snapshots are sent once
                    if let SessionEvent::State { snapshot } = &event {
                        let hash = snapshot_hash(snapshot).ok();
                        if hash.is_some() && hash == last_state {
                            continue;
                        }
                        last_state = hash;
                    }
                    let msg = ServerMessage::Event {
                        session_id: session_id.clone(),
                        event,
                    };
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(session = %session_id, missed, "observer lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    (ServerMessage::Ok, Some(forwarder))
}

/// Run one request against the service and turn the outcome into a reply.
pub async fn dispatch(service: &GameService, msg: ClientMessage) -> ServerMessage {
    let result = match msg {
        ClientMessage::CreateSession { host_name } => {
            service
                .create_session(&host_name)
                .map(|created| ServerMessage::Created {
                    session_id: created.session_id,
                    player_id: created.player_id,
                    snapshot: created.snapshot,
                })
        }
        ClientMessage::JoinSession {
            session_id,
            player_name,
        } => service
            .join_session(&session_id, &player_name)
            .await
            .map(|joined| ServerMessage::Joined {
                player_id: joined.player_id,
                snapshot: joined.snapshot,
            }),
        ClientMessage::StartSession {
            session_id,
            player_id,
        } => service
            .start_session(&session_id, player_id)
            .await
            .map(|snapshot| ServerMessage::State { snapshot }),
        ClientMessage::Attack {
            session_id,
            player_id,
            from,
            to,
            soldiers,
        } => service
            .attack(&session_id, player_id, &from, &to, soldiers)
            .await
            .map(|r| ServerMessage::ActionResult {
                success: r.success,
                message: r.message,
                snapshot: r.snapshot,
            }),
        ClientMessage::Build {
            session_id,
            player_id,
            region,
            building_type,
        } => service
            .build(&session_id, player_id, &region, &building_type)
            .await
            .map(|r| ServerMessage::ActionResult {
                success: r.success,
                message: r.message,
                snapshot: r.snapshot,
            }),
        ClientMessage::EndTurn {
            session_id,
            player_id,
        } => service
            .end_turn(&session_id, player_id)
            .await
            .map(|snapshot| ServerMessage::State { snapshot }),
        ClientMessage::GetState { session_id } => service
            .get_state(&session_id)
            .await
            .map(|snapshot| ServerMessage::State { snapshot }),
        ClientMessage::BattleOdds {
            session_id,
            attacking,
            target,
            simulations,
        } => service
            .battle_odds(&session_id, attacking, &target, simulations)
            .await
            .map(|odds| ServerMessage::Odds { odds }),
        ClientMessage::SuggestTargets {
            session_id,
            player_id,
            limit,
        } => service
            .suggest_targets(&session_id, player_id, limit)
            .await
            .map(|regions| ServerMessage::Targets { regions }),
        ClientMessage::Disconnect {
            session_id,
            player_id,
        } => service
            .disconnect(&session_id, player_id)
            .await
            .map(|snapshot| ServerMessage::State { snapshot }),
        ClientMessage::Reconnect {
            session_id,
            player_id,
        } => service
            .reconnect(&session_id, player_id)
            .await
            .map(|snapshot| ServerMessage::State { snapshot }),
        ClientMessage::Subscribe { session_id } => service.subscribe(&session_id).map(|_| {
            // Only a connection can hold a subscription; see `handle_connection`.
            ServerMessage::Ok
        }),
    };

    result.unwrap_or_else(|e| {
        debug!(code = ?e.code(), error = %e, "request rejected");
        e.to_payload().into()
    })
}

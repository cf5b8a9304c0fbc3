//! Per-connection WebSocket loop.
//!
//! One task per viewer multiplexes four sources with `select!`: incoming
//! frames, the shared delta broadcast, the session's scoped chat queue and a
//! heartbeat ticker. The snapshot is sent before anything else.

use super::AppState;
use crate::engine::{Engine, SessionId};
use crate::protocol::{ClientEvent, ServerEvent};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(socket: WebSocket, state: AppState) {
    let engine = state.engine.clone();
    let (session, mut scoped) = engine.rooms().register();
    let (mut sink, mut stream) = socket.split();

    let (snapshot, mut deltas) = engine.coordinator().snapshot_and_subscribe();
    tracing::debug!(
        "Session {} gets {} cells ({} viewers)",
        session,
        snapshot.len(),
        engine.coordinator().viewer_count()
    );
    if !send_event(&mut sink, &ServerEvent::InitState(snapshot)).await {
        engine.rooms().unregister(session);
        return;
    }

    let mut heartbeat = tokio::time::interval(state.config.heartbeat_interval());
    heartbeat.tick().await;

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_text(&engine, session, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Session {} socket error: {}", session, e);
                    break;
                }
            },
            delta = deltas.recv() => match delta {
                Ok(event) => {
                    if !send_event(&mut sink, &event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Session {} lagged by {} deltas, resending snapshot", session, missed);
                    let (snapshot, fresh) = engine.coordinator().snapshot_and_subscribe();
                    deltas = fresh;
                    if !send_event(&mut sink, &ServerEvent::InitState(snapshot)).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            Some(event) = scoped.recv() => {
                if !send_event(&mut sink, &event).await {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    engine.rooms().unregister(session);
}

async fn handle_text(engine: &Engine, session: SessionId, text: &str) {
    let event = match ClientEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Session {} sent an unreadable frame: {}", session, e);
            return;
        }
    };
    let name = event.name();
    if let Err(e) = engine.dispatch(session, event).await {
        tracing::warn!("Session {} {} rejected: {}", session, name, e);
    }
}

/// Returns `false` once the socket is gone.
async fn send_event(sink: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> bool {
    let text = match event.to_json() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to encode {}: {}", event.name(), e);
            return true;
        }
    };
    sink.send(Message::Text(text.into())).await.is_ok()
}

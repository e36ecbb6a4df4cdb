use std::{net::SocketAddr, sync::Arc};

use axum::{
    debug_handler,
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use crate::config::Config;

use super::{Room, dispatch, gate, session::Session};

#[debug_handler(state = crate::AppState)]
pub async fn room_ws(
    State(room): State<Arc<Room>>,
    State(config): State<Arc<Config>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(config.max_frame_bytes)
        .on_upgrade(move |stream| serve(room, stream, peer))
}

async fn serve(room: Arc<Room>, stream: WebSocket, peer: SocketAddr) {
    let (session, mut outbound) = Session::new(peer);
    let (mut sender, mut receiver) = stream.split();
    debug!(session = %session.id(), %peer, "New socket connection");

    let write_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let frame = match msg {
            Message::Text(frame) => frame,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Binary(_) => {
                gate::reject(&session, &gate::ProtocolViolation::MalformedFrame {
                    reason: "binary frame".to_owned(),
                });
                break;
            }
        };

        let Some(event) = gate::screen(&session, frame.as_str()) else {
            break;
        };
        // handlers outlive the connection, a queued join still completes
        tokio::spawn(dispatch(room.clone(), session.clone(), event));
    }

    session.close();
    write_task.abort();
    debug!(session = %session.id(), %peer, "Socket disconnected");
}

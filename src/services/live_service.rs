//! Match WebSocket relay: identification, room membership, answers and fan-out.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::TeamEntity,
    dto::{
        question::PublicQuestion,
        ws::{CorrectCountsDto, MatchInboundMessage, MatchOutboundMessage, MatchSnapshot},
    },
    error::ServiceError,
    services::{auth_service, team_service::load_team},
    state::{
        SharedState,
        match_machine::MatchPhase,
        room::{MatchRoom, Role, Side},
    },
};

/// A socket admitted into a room.
#[derive(Debug, Clone, Copy)]
pub struct Participant {
    /// Room-local socket identifier.
    pub connection_id: Uuid,
    /// Authenticated user behind the socket.
    pub user_id: Uuid,
    /// Team the socket plays for, or spectator.
    pub role: Role,
}

/// Serialize an outbound message into a text frame.
fn encode(message: &MatchOutboundMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize match message `{message:?}`");
            None
        }
    }
}

/// Push a message to a socket that is not (or not yet) part of a room.
fn send_message_to_websocket(tx: &mpsc::UnboundedSender<Message>, message: &MatchOutboundMessage) {
    if let Some(frame) = encode(message) {
        let _ = tx.send(frame);
    }
}

/// Send a message to one participant. Returns `false` when its writer is gone.
fn send_to(room: &MatchRoom, participant: &Participant, message: &MatchOutboundMessage) -> bool {
    match encode(message) {
        Some(frame) => room.send_to(participant.connection_id, frame),
        None => true,
    }
}

/// Fan a message out to every socket of the room.
pub fn broadcast_to_room(room: &MatchRoom, message: &MatchOutboundMessage) -> usize {
    encode(message).map_or(0, |frame| room.broadcast(frame))
}

/// Winner of a finished match, `None` on a draw.
pub fn winner(home: u32, away: u32) -> Option<Side> {
    match home.cmp(&away) {
        std::cmp::Ordering::Greater => Some(Side::Home),
        std::cmp::Ordering::Less => Some(Side::Away),
        std::cmp::Ordering::Equal => None,
    }
}

/// Announce a phase change to the room.
pub fn broadcast_match_status(room: &MatchRoom, phase: MatchPhase) {
    broadcast_to_room(
        room,
        &MatchOutboundMessage::MatchStatus {
            status: phase.status(),
            current_question: phase.question_index(),
            question_open: phase.open_question().is_some(),
        },
    );
}

/// Show the question at `index` to the room, answer hidden.
pub fn broadcast_question_opened(room: &MatchRoom, index: usize) {
    let Some(question) = room.question(index) else {
        warn!(match_id = %room.match_id(), index, "cannot announce unknown question");
        return;
    };
    broadcast_to_room(
        room,
        &MatchOutboundMessage::QuestionOpened {
            question: PublicQuestion::new(index, question),
        },
    );
}

/// Reveal the answer of the question at `index` with per-team results.
pub async fn broadcast_question_closed(room: &MatchRoom, index: usize) {
    let Some(question) = room.question(index) else {
        warn!(match_id = %room.match_id(), index, "cannot reveal unknown question");
        return;
    };
    let counts = room.correct_counts(index).await;
    let (home, away) = room.scores().await;
    broadcast_to_room(
        room,
        &MatchOutboundMessage::QuestionClosed {
            question_index: index,
            correct_index: question.correct_index,
            correct_counts: CorrectCountsDto {
                home: counts.home,
                away: counts.away,
            },
            home,
            away,
        },
    );
}

/// Announce the final score to the room.
pub fn broadcast_match_completed(room: &MatchRoom, home: u32, away: u32) {
    broadcast_to_room(
        room,
        &MatchOutboundMessage::MatchCompleted {
            home,
            away,
            winner: winner(home, away),
        },
    );
}

fn broadcast_presence(room: &MatchRoom) {
    broadcast_to_room(
        room,
        &MatchOutboundMessage::Presence {
            connections: room.connection_count(),
        },
    );
}

fn role_of(user_id: Uuid, home: &TeamEntity, away: &TeamEntity) -> Role {
    if home.member_ids.contains(&user_id) {
        Role::Home
    } else if away.member_ids.contains(&user_id) {
        Role::Away
    } else {
        Role::Spectator
    }
}

async fn build_snapshot(
    room: &MatchRoom,
    role: Role,
    home: &TeamEntity,
    away: &TeamEntity,
) -> MatchSnapshot {
    let phase = room.phase().await;
    let (home_score, away_score) = room.scores().await;
    let current_question = phase
        .question_index()
        .and_then(|index| room.question(index).map(|q| PublicQuestion::new(index, q)));

    MatchSnapshot {
        match_id: room.match_id(),
        status: phase.status(),
        home_team: home.into(),
        away_team: away.into(),
        home_score,
        away_score,
        question_count: room.question_count(),
        current_question,
        question_open: phase.open_question().is_some(),
        role,
    }
}

/// Authenticate `token`, admit the socket into the room of `match_id` and send it a snapshot.
pub async fn join_room(
    state: &SharedState,
    match_id: Uuid,
    token: &str,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<(Arc<MatchRoom>, Participant), ServiceError> {
    let user = auth_service::authenticate(state, token).await?;
    let room = state.room(match_id).await?;

    let store = state.require_store().await?;
    let home = load_team(&store, room.home_team_id()).await?;
    let away = load_team(&store, room.away_team_id()).await?;
    let role = role_of(user.id, &home, &away);

    // Joined before the snapshot is built so no broadcast falls in between.
    let connection_id = room.join(user.id, role, tx);
    let participant = Participant {
        connection_id,
        user_id: user.id,
        role,
    };
    let snapshot = build_snapshot(&room, role, &home, &away).await;
    send_to(&room, &participant, &MatchOutboundMessage::Snapshot(snapshot));

    info!(
        match_id = %match_id,
        user_id = %user.id,
        connection_id = %connection_id,
        role = ?role,
        "match socket joined"
    );
    broadcast_presence(&room);

    Ok((room, participant))
}

/// Remove a participant, tell the others and drop the room if it became idle.
pub fn leave_room(state: &SharedState, room: &MatchRoom, participant: &Participant) {
    if room.leave(participant.connection_id) {
        broadcast_presence(room);
    }
    if state.release_room(room.match_id()) {
        debug!(match_id = %room.match_id(), "idle match room released");
    }
}

/// Handle one text frame from an admitted socket. Returns `false` once the socket's writer is gone.
pub async fn handle_text(room: &MatchRoom, participant: &Participant, text: &str) -> bool {
    let inbound = match MatchInboundMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(
                connection_id = %participant.connection_id,
                error = %err,
                "failed to parse match message"
            );
            return send_to(
                room,
                participant,
                &MatchOutboundMessage::Error {
                    message: "malformed message".into(),
                },
            );
        }
    };

    match inbound {
        MatchInboundMessage::Answer {
            question_index,
            choice,
        } => {
            match room
                .record_answer(participant.user_id, participant.role, question_index, choice)
                .await
            {
                Ok(accepted) => {
                    let delivered = send_to(
                        room,
                        participant,
                        &MatchOutboundMessage::AnswerAck {
                            question_index,
                            correct: accepted.correct,
                        },
                    );
                    broadcast_to_room(
                        room,
                        &MatchOutboundMessage::AnswerReceived {
                            question_index,
                            team: accepted.side,
                            answered_count: accepted.answered_count,
                        },
                    );
                    if accepted.correct {
                        broadcast_to_room(
                            room,
                            &MatchOutboundMessage::Score {
                                home: accepted.home_score,
                                away: accepted.away_score,
                            },
                        );
                    }
                    delivered
                }
                Err(rejection) => {
                    debug!(
                        match_id = %room.match_id(),
                        user_id = %participant.user_id,
                        reason = %rejection,
                        "answer rejected"
                    );
                    send_to(
                        room,
                        participant,
                        &MatchOutboundMessage::Error {
                            message: rejection.to_string(),
                        },
                    )
                }
            }
        }
        MatchInboundMessage::Ping => send_to(room, participant, &MatchOutboundMessage::Pong),
        MatchInboundMessage::Identification { .. } => {
            warn!(connection_id = %participant.connection_id, "ignoring duplicate identification message");
            true
        }
        MatchInboundMessage::Unknown => {
            debug!(connection_id = %participant.connection_id, payload = %text, "ignoring unknown match message");
            true
        }
    }
}

/// Handle the full lifecycle of a match WebSocket connection.
pub async fn handle_socket(state: SharedState, match_id: Uuid, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let ident_timeout = state.config().ws_identification_timeout();
    let initial_message = match tokio::time::timeout(ident_timeout, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            reject(&outbound_tx, "expected an identification message");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(match_id = %match_id, error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!(match_id = %match_id, "websocket identification timed out");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let token = match MatchInboundMessage::from_json_str(&initial_message) {
        Ok(MatchInboundMessage::Identification { token }) => token,
        Ok(_) => {
            warn!(match_id = %match_id, "first message was not identification");
            reject(&outbound_tx, "expected an identification message");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(match_id = %match_id, error = %err, "failed to parse identification message");
            reject(&outbound_tx, "malformed identification message");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let (room, participant) = match join_room(&state, match_id, &token, outbound_tx.clone()).await
    {
        Ok(joined) => joined,
        Err(err) => {
            warn!(match_id = %match_id, error = %err, "match socket refused");
            reject(&outbound_tx, &err.to_string());
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if !handle_text(&room, &participant, &text).await {
                    info!(connection_id = %participant.connection_id, "writer closed, terminating match socket");
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %participant.connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    leave_room(&state, &room, &participant);
    info!(
        match_id = %match_id,
        connection_id = %participant.connection_id,
        "match socket disconnected"
    );

    finalize(writer_task, outbound_tx).await;
}

/// Send an error message followed by a close frame.
fn reject(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    send_message_to_websocket(
        tx,
        &MatchOutboundMessage::Error {
            message: message.to_string(),
        },
    );
    let _ = tx.send(Message::Close(None));
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::services::{
        auth_service::tests::signed_in,
        match_service::tests::{Arena, arena},
    };

    fn next_json(rx: &mut UnboundedReceiver<Message>) -> Value {
        match rx.try_recv() {
            Ok(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }

    async fn connect(
        arena: &Arena,
        token: &str,
    ) -> (Arc<MatchRoom>, Participant, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (room, participant) = join_room(&arena.state, arena.match_id, token, tx)
            .await
            .unwrap();
        (room, participant, rx)
    }

    #[tokio::test]
    async fn joining_sends_snapshot_and_presence_with_role() {
        let arena = arena().await;
        let (_, home, mut home_rx) = connect(&arena, &arena.home_player.token).await;
        assert_eq!(home.role, Role::Home);

        let snapshot = next_json(&mut home_rx);
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["status"], "waiting");
        assert_eq!(snapshot["role"], "home");
        assert_eq!(snapshot["home_team"]["name"], "Owls");
        assert_eq!(next_json(&mut home_rx)["connections"], 1);

        let viewer = signed_in(&arena.state, "viewer").await;
        let (_, spectator, _rx) = connect(&arena, &viewer.token).await;
        assert_eq!(spectator.role, Role::Spectator);
        assert_eq!(next_json(&mut home_rx)["connections"], 2);
    }

    #[tokio::test]
    async fn late_joiner_gets_the_open_question_then_live_updates() {
        let arena = arena().await;
        arena.start().await;

        let (room, _, mut rx) = connect(&arena, &arena.away_player.token).await;
        let snapshot = next_json(&mut rx);
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["status"], "live");
        assert_eq!(snapshot["question_open"], true);
        assert_eq!(snapshot["current_question"]["index"], 0);
        assert_eq!(next_json(&mut rx)["type"], "presence");

        crate::services::match_service::close_question(&arena.state, arena.match_id)
            .await
            .unwrap();
        let types: Vec<Value> = drain(&mut rx)
            .into_iter()
            .map(|frame| frame["type"].clone())
            .collect();
        assert_eq!(types, vec!["match_status", "question_closed"]);
        assert_eq!(room.connection_count(), 1);
    }

    #[tokio::test]
    async fn invalid_token_is_refused() {
        let arena = arena().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let Err(err) = join_room(&arena.state, arena.match_id, "bogus", tx).await else {
            panic!("a bogus token must be refused");
        };
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert_eq!(arena.state.room_count(), 0);
    }

    #[tokio::test]
    async fn answers_are_acknowledged_and_scored() {
        let arena = arena().await;
        let (room, home, mut home_rx) = connect(&arena, &arena.home_player.token).await;
        let (_, away, mut away_rx) = connect(&arena, &arena.away_player.token).await;
        arena.start().await;
        drain(&mut home_rx);
        drain(&mut away_rx);

        let answer = r#"{"type":"answer","question_index":0,"choice":1}"#;
        assert!(handle_text(&room, &home, answer).await);

        let frames = drain(&mut home_rx);
        assert_eq!(frames[0]["type"], "answer_ack");
        assert_eq!(frames[0]["correct"], true);
        assert_eq!(frames[1]["type"], "answer_received");
        assert_eq!(frames[1]["team"], "home");
        assert_eq!(frames[2], serde_json::json!({ "type": "score", "home": 10, "away": 0 }));

        // the away socket only sees the room broadcasts
        let frames = drain(&mut away_rx);
        assert_eq!(frames.len(), 2);

        assert!(handle_text(&room, &home, answer).await);
        let frames = drain(&mut home_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "error");

        assert!(handle_text(&room, &away, r#"{"type":"answer","question_index":0,"choice":0}"#).await);
        let frames = drain(&mut away_rx);
        assert_eq!(frames[0]["correct"], false);
        assert_eq!(room.scores().await, (10, 0));
    }

    #[tokio::test]
    async fn spectators_and_garbage_get_errors_without_disconnecting() {
        let arena = arena().await;
        let viewer = signed_in(&arena.state, "viewer").await;
        let (room, spectator, mut rx) = connect(&arena, &viewer.token).await;
        arena.start().await;
        drain(&mut rx);

        assert!(handle_text(&room, &spectator, r#"{"type":"answer","question_index":0,"choice":1}"#).await);
        assert_eq!(next_json(&mut rx)["message"], "spectators cannot answer");

        assert!(handle_text(&room, &spectator, "not json").await);
        assert_eq!(next_json(&mut rx)["type"], "error");

        assert!(handle_text(&room, &spectator, r#"{"type":"ping"}"#).await);
        assert_eq!(next_json(&mut rx)["type"], "pong");

        assert!(handle_text(&room, &spectator, r#"{"type":"wave"}"#).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leaving_releases_an_idle_room() {
        let arena = arena().await;
        let (room, participant, _rx) = connect(&arena, &arena.home_player.token).await;
        assert_eq!(arena.state.room_count(), 1);

        leave_room(&arena.state, &room, &participant);
        assert_eq!(arena.state.room_count(), 0);
    }

    #[test]
    fn winner_is_none_on_a_draw() {
        assert_eq!(winner(3, 1), Some(Side::Home));
        assert_eq!(winner(1, 3), Some(Side::Away));
        assert_eq!(winner(2, 2), None);
    }
}

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, timeout_at},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ConnectionEvent},
    error::ServiceError,
    services::{
        organizer_service, participant_service,
        quiz_service::{self, SubmitAnswer},
    },
    state::{ConnectionId, SharedState},
};

/// What a connection joined as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Session {
    Participant { event_id: Uuid, participant_id: Uuid },
    Organizer { event_id: Uuid },
}

impl Session {
    fn event_id(self) -> Uuid {
        match self {
            Session::Participant { event_id, .. } | Session::Organizer { event_id } => event_id,
        }
    }
}

/// Why a command from this connection was refused.
///
/// Distinct from `ServiceError`: these are connection protocol errors that
/// never reach the services.
#[derive(Debug, Error)]
enum SessionError {
    #[error("join an event first")]
    NotJoined,
    #[error("this connection already joined an event")]
    AlreadyJoined,
    #[error("only participants can submit answers")]
    NotParticipant,
    #[error("only the organizer can run the quiz")]
    NotOrganizer,
    #[error("{0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of a participant or organizer WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let connection_id: ConnectionId = Uuid::new_v4();
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

    let join_deadline = Instant::now() + state.config().quiz().join_timeout;
    let mut session: Option<Session> = None;
    debug!(connection_id = %connection_id, "websocket connected");

    loop {
        let next = if session.is_some() {
            receiver.next().await
        } else {
            match timeout_at(join_deadline, receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(connection_id = %connection_id, "websocket join timed out");
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
            }
        };

        let Some(message) = next else {
            break;
        };

        match message {
            Ok(Message::Text(text)) => {
                debug!(connection_id = %connection_id, payload = %text, "received client message");

                let inbound = match ClientMessage::from_json_str(&text) {
                    Ok(inbound) => inbound,
                    Err(err) => {
                        warn!(
                            connection_id = %connection_id,
                            error = %err,
                            "failed to parse or validate client message"
                        );
                        send_error(&outbound_tx, err.to_string());
                        continue;
                    }
                };

                let kind = inbound.kind();
                match handle_message(&state, connection_id, &outbound_tx, &mut session, inbound)
                    .await
                {
                    Ok(()) => {}
                    Err(SessionError::Service(ServiceError::DuplicateSubmission)) => {
                        debug!(connection_id = %connection_id, "duplicate answer ignored");
                    }
                    Err(err) => {
                        warn!(
                            connection_id = %connection_id,
                            message = kind,
                            error = %err,
                            "client command failed"
                        );
                        send_error(&outbound_tx, err.to_string());
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(connection_id = %connection_id, "client closed websocket");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    match session {
        Some(Session::Participant {
            event_id,
            participant_id,
        }) => {
            participant_service::leave(&state, event_id, connection_id);
            state.release_participant_lock(participant_id);
            info!(
                event_id = %event_id,
                participant_id = %participant_id,
                "participant disconnected"
            );
        }
        Some(Session::Organizer { event_id }) => {
            participant_service::leave(&state, event_id, connection_id);
            info!(event_id = %event_id, "organizer disconnected");
        }
        None => debug!(connection_id = %connection_id, "websocket closed before joining"),
    }

    finalize(writer_task, outbound_tx).await;
}

async fn handle_message(
    state: &SharedState,
    connection_id: ConnectionId,
    tx: &mpsc::UnboundedSender<Message>,
    session: &mut Option<Session>,
    message: ClientMessage,
) -> Result<(), SessionError> {
    match message {
        ClientMessage::JoinEvent {
            event_id,
            participant_name,
        } => {
            if session.is_some() {
                return Err(SessionError::AlreadyJoined);
            }
            let participant = participant_service::join_event(
                state,
                connection_id,
                tx,
                event_id,
                &participant_name,
            )
            .await?;
            *session = Some(Session::Participant {
                event_id,
                participant_id: participant.id,
            });
        }
        ClientMessage::JoinEventAsOrganizer { event_id } => {
            if session.is_some() {
                return Err(SessionError::AlreadyJoined);
            }
            organizer_service::join_as_organizer(state, connection_id, tx, event_id).await?;
            *session = Some(Session::Organizer { event_id });
        }
        ClientMessage::StartQuiz { activity_id } => {
            require_organizer(*session)?;
            organizer_service::start_quiz(state, activity_id).await?;
        }
        ClientMessage::NextQuestion {
            activity_id,
            question_id,
        } => {
            require_organizer(*session)?;
            organizer_service::next_question(state, activity_id, question_id).await?;
        }
        ClientMessage::EndQuiz { activity_id } => {
            require_organizer(*session)?;
            organizer_service::end_quiz(state, activity_id).await?;
        }
        ClientMessage::SubmitAnswer {
            activity_id,
            question_id,
            answer_id,
            response_time,
        } => {
            let participant_id = match session {
                Some(Session::Participant { participant_id, .. }) => *participant_id,
                Some(Session::Organizer { .. }) => return Err(SessionError::NotParticipant),
                None => return Err(SessionError::NotJoined),
            };
            let result = quiz_service::submit_answer(
                state,
                SubmitAnswer {
                    activity_id,
                    participant_id,
                    question_id,
                    option_id: answer_id,
                    response_time_ms: response_time,
                },
            )
            .await?;
            send_message_to_websocket(tx, &ConnectionEvent::AnswerResult(result));
        }
    }

    if let Some(joined) = session {
        debug!(
            connection_id = %connection_id,
            event_id = %joined.event_id(),
            "client command handled"
        );
    }
    Ok(())
}

fn require_organizer(session: Option<Session>) -> Result<(), SessionError> {
    match session {
        Some(Session::Organizer { .. }) => Ok(()),
        Some(Session::Participant { .. }) => Err(SessionError::NotOrganizer),
        None => Err(SessionError::NotJoined),
    }
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, message: String) {
    send_message_to_websocket(tx, &ConnectionEvent::Error { message });
}

/// Serialize a payload and push it onto the connection's writer channel.
///
/// Returns whether the message was queued. Serialization failures are logged
/// and reported as not queued.
pub fn send_message_to_websocket<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> bool
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return false;
        }
    };

    tx.send(Message::Text(payload.into())).is_ok()
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::event_store::memory::MemoryEventStore,
        services::activity_service::tests::event,
        state::AppState,
    };

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            frames.push(serde_json::from_str(text.as_str()).unwrap());
        }
        frames
    }

    fn setup() -> (SharedState, Uuid) {
        let store = MemoryEventStore::new();
        let event_id = Uuid::new_v4();
        store.insert_event(event(event_id));
        (
            AppState::with_store(AppConfig::default(), Arc::new(store)),
            event_id,
        )
    }

    #[tokio::test]
    async fn commands_need_a_session() {
        let (state, _event_id) = setup();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = None;

        let err = handle_message(
            &state,
            Uuid::new_v4(),
            &tx,
            &mut session,
            ClientMessage::StartQuiz {
                activity_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SessionError::NotJoined));
    }

    #[tokio::test]
    async fn participants_cannot_drive_the_quiz() {
        let (state, event_id) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = None;

        handle_message(
            &state,
            Uuid::new_v4(),
            &tx,
            &mut session,
            ClientMessage::JoinEvent {
                event_id,
                participant_name: "Alice".into(),
            },
        )
        .await
        .unwrap();
        assert!(matches!(session, Some(Session::Participant { .. })));
        assert_eq!(drain(&mut rx)[0]["type"], "joined-event");

        let err = handle_message(
            &state,
            Uuid::new_v4(),
            &tx,
            &mut session,
            ClientMessage::EndQuiz {
                activity_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SessionError::NotOrganizer));

        let err = handle_message(
            &state,
            Uuid::new_v4(),
            &tx,
            &mut session,
            ClientMessage::JoinEventAsOrganizer { event_id },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyJoined));
    }

    #[tokio::test]
    async fn organizers_cannot_answer() {
        let (state, event_id) = setup();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = None;

        handle_message(
            &state,
            Uuid::new_v4(),
            &tx,
            &mut session,
            ClientMessage::JoinEventAsOrganizer { event_id },
        )
        .await
        .unwrap();
        assert_eq!(session, Some(Session::Organizer { event_id }));

        let err = handle_message(
            &state,
            Uuid::new_v4(),
            &tx,
            &mut session,
            ClientMessage::SubmitAnswer {
                activity_id: Uuid::new_v4(),
                question_id: Uuid::new_v4(),
                answer_id: "opt1".into(),
                response_time: 100.0,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SessionError::NotParticipant));
        assert_eq!(err.to_string(), "only participants can submit answers");
    }

    #[test]
    fn payloads_are_sent_as_text_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(send_message_to_websocket(
            &tx,
            &ConnectionEvent::Error {
                message: "nope".into()
            }
        ));
        let frames = drain(&mut rx);
        assert_eq!(frames[0], serde_json::json!({"type": "error", "message": "nope"}));

        drop(rx);
        assert!(!send_message_to_websocket(
            &tx,
            &ConnectionEvent::Error {
                message: "gone".into()
            }
        ));
    }
}

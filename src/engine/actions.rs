//! Player actions as data, for transports that deliver them as messages.

use serde::{Deserialize, Serialize};

use super::{GameEngine, TaskReceipt, VoteReceipt};
use crate::error::EngineError;
use crate::game::model::{MeetingId, PlayerId, Point, SessionId, TaskId};

/// An action sent by a player. The caller is resolved from the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CompleteTask {
        task_id: TaskId,
        /// Where the client says the player is standing
        #[serde(default)]
        position: Option<Point>,
    },
    CallEmergency,
    SendMeetingMessage {
        text: String,
    },
    CastVote {
        /// `None` skips
        #[serde(default)]
        target: Option<PlayerId>,
    },
}

impl Action {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CompleteTask { .. } => "complete_task",
            Self::CallEmergency => "call_emergency",
            Self::SendMeetingMessage { .. } => "send_meeting_message",
            Self::CastVote { .. } => "cast_vote",
        }
    }
}

/// Reply to an accepted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum ActionReply {
    TaskCompleted(TaskReceipt),
    MeetingCalled { meeting_id: MeetingId },
    MessagePosted,
    VoteCast(VoteReceipt),
}

pub(super) async fn route(
    engine: &GameEngine,
    session_id: &SessionId,
    player: &PlayerId,
    action: Action,
) -> Result<ActionReply, EngineError> {
    match action {
        Action::CompleteTask { task_id, position } => engine
            .complete_task(session_id, player, &task_id, position)
            .await
            .map(ActionReply::TaskCompleted),
        Action::CallEmergency => engine
            .call_emergency(session_id, player)
            .await
            .map(|meeting_id| ActionReply::MeetingCalled { meeting_id }),
        Action::SendMeetingMessage { text } => engine
            .send_meeting_message(session_id, player, &text)
            .await
            .map(|()| ActionReply::MessagePosted),
        Action::CastVote { target } => engine
            .cast_vote(session_id, player, target.as_ref())
            .await
            .map(ActionReply::VoteCast),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_from_json() {
        let action: Action =
            serde_json::from_str(r#"{"action":"complete_task","task_id":"p1/wiring"}"#).unwrap();
        assert_eq!(
            action,
            Action::CompleteTask {
                task_id: TaskId::new("p1/wiring"),
                position: None,
            }
        );

        let skip: Action = serde_json::from_str(r#"{"action":"cast_vote"}"#).unwrap();
        assert_eq!(skip, Action::CastVote { target: None });
        assert_eq!(skip.name(), "cast_vote");

        let positioned: Action = serde_json::from_str(
            r#"{"action":"complete_task","task_id":"p1/wiring","position":{"x":1.0,"y":2.5}}"#,
        )
        .unwrap();
        assert!(matches!(
            positioned,
            Action::CompleteTask {
                position: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn unknown_action_rejected() {
        assert!(serde_json::from_str::<Action>(r#"{"action":"teleport"}"#).is_err());
    }

    #[test]
    fn reply_is_tagged() {
        let reply = ActionReply::MeetingCalled {
            meeting_id: MeetingId::new("s1-m1"),
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["reply"], "meeting_called");
        assert_eq!(value["meeting_id"], "s1-m1");
    }
}

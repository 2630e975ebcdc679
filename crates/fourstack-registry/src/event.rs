//! Events the registry hands to the layer above.

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;

use fourstack_protocol::Reply;

/// A point-in-time view of a user or room: its id, metadata, and how
/// many live connections it currently holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartySnapshot {
    pub id: String,
    pub metadata: Map<String, Value>,
    pub connections: usize,
}

/// A handle for replying to the connection that triggered an event.
///
/// Cloneable and detached from the registry: the reply is queued on the
/// connection's outbound channel, so handlers answer without holding
/// any lock. Sending to a connection that has since gone away is a
/// silent no-op.
#[derive(Debug, Clone)]
pub struct Answer {
    sender: UnboundedSender<Vec<u8>>,
}

impl Answer {
    pub(crate) fn new(sender: UnboundedSender<Vec<u8>>) -> Self {
        Self { sender }
    }

    /// Queues a reply envelope on the originating connection.
    pub fn send(&self, act: &str, result: Value, success: bool) {
        let reply = if success {
            Reply::ok(act, result)
        } else {
            Reply::fail(act, result)
        };
        match serde_json::to_vec(&reply) {
            Ok(bytes) => {
                let _ = self.sender.send(bytes);
            }
            Err(error) => {
                tracing::error!(%act, %error, "failed to encode answer");
            }
        }
    }
}

/// An accepted inbound action, enriched with who sent it and from where.
///
/// `answer` is `None` only for the synthetic `close` event, which has no
/// live connection left to reply to.
#[derive(Debug, Clone)]
pub struct Event {
    /// The action name.
    pub act: String,
    /// The action payload as received.
    pub data: Value,
    /// The sending user at the time of the event.
    pub user: PartySnapshot,
    /// The room the sending connection is bound to.
    pub room: PartySnapshot,
    /// Reply channel back to the originating connection.
    pub answer: Option<Answer>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn test_answer_send_queues_reply_envelope() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let answer = Answer::new(tx);

        answer.send("chat_msg", json!({"msg": "hi"}), true);

        let bytes = rx.try_recv().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["act"], "chat_msg");
        assert_eq!(value["success"], true);
        assert_eq!(value["result"]["msg"], "hi");
    }

    #[test]
    fn test_answer_send_to_gone_connection_is_noop() {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        drop(rx);
        let answer = Answer::new(tx);

        // Must not panic or error.
        answer.send("chat_msg", json!({}), false);
    }

    #[test]
    fn test_party_snapshot_serializes_all_fields() {
        let mut metadata = Map::new();
        metadata.insert("name".into(), json!("alice"));
        let snapshot = PartySnapshot {
            id: "u1".into(),
            metadata,
            connections: 2,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["id"], "u1");
        assert_eq!(value["metadata"]["name"], "alice");
        assert_eq!(value["connections"], 2);
    }
}

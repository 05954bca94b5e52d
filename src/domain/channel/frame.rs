//! Event-stream wire framing.
//!
//! Every frame is complete (terminated by a blank line) so a sink can write
//! it as one chunk. Channel names are restricted to `[A-Za-z0-9_-]`, which
//! lets them be embedded in JSON without escaping.

use bytes::Bytes;

use crate::domain::foundation::{ChannelName, MessageId, Timestamp};

/// Comment sent after the connection handshake to push bytes through
/// buffering proxies.
pub const HANDSHAKE_COMMENT: &str = "initial-connection-complete";

/// `event: connect` frame announcing the session and current client count.
pub fn connect(channel: &ChannelName, clients: usize, at: Timestamp) -> Bytes {
    Bytes::from(format!(
        "event: connect\nid: connect-{ts}\ndata: {{\"connected\":true,\"clients\":{clients},\"channel\":\"{channel}\"}}\n\n",
        ts = at.as_unix_millis(),
    ))
}

/// Synthetic `event: test` frame letting clients confirm delivery works.
pub fn test_event(channel: &ChannelName, at: Timestamp) -> Bytes {
    let ts = at.as_unix_millis();
    Bytes::from(format!(
        "event: test\nid: test-{ts}\ndata: {{\"test\":true,\"time\":{ts},\"channel\":\"{channel}\"}}\n\n"
    ))
}

/// Comment frame with a timestamp; ignored by event-stream clients.
pub fn comment(text: &str, at: Timestamp) -> Bytes {
    Bytes::from(format!(":{text} {}\n\n", at.as_unix_millis()))
}

/// Comment frame closing a replay burst.
pub fn replay_flush() -> Bytes {
    Bytes::from_static(b":missed-messages-flush\n\n")
}

/// Broadcast or replay frame. `payload` must be single-line JSON.
pub fn message(id: &MessageId, payload: &str) -> Bytes {
    Bytes::from(format!("id: {id}\ndata: {payload}\n\n"))
}

/// Structured keepalive `event: ping` frame.
pub fn ping(channel: &ChannelName, at: Timestamp) -> Bytes {
    let ts = at.as_unix_millis();
    Bytes::from(format!(
        "event: ping\nid: ping-{ts}\ndata: {{\"time\":{ts},\"channel\":\"{channel}\"}}\n\n"
    ))
}

/// Comment-style keepalive sent alongside [`ping`].
pub fn ping_comment(at: Timestamp) -> Bytes {
    comment("ping", at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ChannelName {
        ChannelName::new("news").unwrap()
    }

    fn text(frame: Bytes) -> String {
        String::from_utf8(frame.to_vec()).unwrap()
    }

    #[test]
    fn connect_frame_carries_count_and_channel() {
        let at = Timestamp::from_unix_millis(1_700_000_000_000);
        assert_eq!(
            text(connect(&channel(), 3, at)),
            "event: connect\nid: connect-1700000000000\ndata: {\"connected\":true,\"clients\":3,\"channel\":\"news\"}\n\n"
        );
    }

    #[test]
    fn test_frame_data_is_valid_json() {
        let frame = text(test_event(&channel(), Timestamp::from_unix_millis(42)));
        let data = frame
            .lines()
            .find_map(|l| l.strip_prefix("data: "))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(value["time"], 42);
        assert_eq!(value["channel"], "news");
    }

    #[test]
    fn message_frame_uses_id_and_data_lines() {
        let id = MessageId::from_client("m-1");
        assert_eq!(
            text(message(&id, r#"{"message":"hi"}"#)),
            "id: m-1\ndata: {\"message\":\"hi\"}\n\n"
        );
    }

    #[test]
    fn ping_frames_share_timestamp() {
        let at = Timestamp::from_unix_millis(5_000);
        assert_eq!(
            text(ping(&channel(), at)),
            "event: ping\nid: ping-5000\ndata: {\"time\":5000,\"channel\":\"news\"}\n\n"
        );
        assert_eq!(text(ping_comment(at)), ":ping 5000\n\n");
    }

    #[test]
    fn comment_frames_start_with_colon() {
        let frame = text(comment(HANDSHAKE_COMMENT, Timestamp::from_unix_millis(7)));
        assert_eq!(frame, ":initial-connection-complete 7\n\n");
        assert!(text(replay_flush()).starts_with(':'));
    }
}

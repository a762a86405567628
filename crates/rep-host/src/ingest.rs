//! The ingest loop: one control message at a time, applied to the live
//! buffer, each answered with one response frame.

use crate::framing::{read_inbound, write_frame, Inbound, MAX_FRAME_LEN};
use rep_core::{LiveBuffer, RepError};
use rep_types::{ControlAction, ControlMessage, ControlResponse};
use tokio::io::{AsyncRead, AsyncWrite};

/// Apply one raw control message to `buffer`.
///
/// Malformed input and failed writes produce an error response rather than
/// ending the loop.
pub fn handle_message(buffer: &LiveBuffer, payload: &[u8]) -> ControlResponse {
    let message: ControlMessage = match serde_json::from_slice(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(target: "rep::ingest", "Invalid control message: {}", e);
            return ControlResponse::error(format!("invalid message: {e}"));
        }
    };

    let action: ControlAction = match message.action.parse() {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!(target: "rep::ingest", "{}", e);
            return ControlResponse::error(e);
        }
    };

    tracing::debug!(target: "rep::ingest", "Handling {}", action.as_str());

    match action {
        ControlAction::Add => match message.request {
            Some(request) => respond(action, buffer.add(request)),
            None => ControlResponse::error("add requires a request"),
        },
        ControlAction::Sync => match message.requests {
            Some(requests) => respond(action, buffer.sync(requests)),
            None => ControlResponse::error("sync requires requests"),
        },
        ControlAction::Clear => match buffer.clear() {
            Ok(()) => ControlResponse::ok(action.as_str()),
            Err(e) => write_failed(action, e),
        },
        ControlAction::Ping => {
            let status = buffer.ping();
            ControlResponse::ok("pong")
                .with_count(status.count)
                .with_path(status.path.display().to_string())
        }
    }
}

fn respond(action: ControlAction, outcome: rep_core::Result<usize>) -> ControlResponse {
    match outcome {
        Ok(count) => ControlResponse::ok(action.as_str()).with_count(count),
        Err(e) => write_failed(action, e),
    }
}

fn write_failed(action: ControlAction, error: RepError) -> ControlResponse {
    tracing::error!(
        target: "rep::live",
        "Failed to persist live buffer after {}: {}",
        action.as_str(),
        error
    );
    ControlResponse::error(error.to_string())
}

/// Serve control messages until the agent closes the stream.
///
/// Oversized frames are skipped and answered with an error. However the loop
/// ends, the buffer gets its disconnect handling (cleared unless configured
/// to keep); an I/O error on the channel is returned after that.
pub async fn run<R, W>(buffer: &LiveBuffer, reader: &mut R, writer: &mut W) -> Result<(), RepError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut handled = 0usize;
    let outcome = serve(buffer, reader, writer, &mut handled).await;

    match &outcome {
        Ok(()) => tracing::info!(
            target: "rep::ingest",
            "Agent disconnected after {} message(s)",
            handled
        ),
        Err(e) => tracing::error!(
            target: "rep::ingest",
            "Control channel failed after {} message(s): {}",
            handled,
            e
        ),
    }

    let disconnected = buffer.disconnect();
    outcome?;
    disconnected.map(|_| ())
}

async fn serve<R, W>(
    buffer: &LiveBuffer,
    reader: &mut R,
    writer: &mut W,
    handled: &mut usize,
) -> Result<(), RepError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = read_inbound(reader).await? {
        let response = match frame {
            Inbound::Payload(payload) => handle_message(buffer, &payload),
            Inbound::Oversized(len) => ControlResponse::error(format!(
                "message of {len} bytes exceeds limit of {MAX_FRAME_LEN} bytes"
            )),
        };
        let encoded = serde_json::to_vec(&response)?;
        write_frame(writer, &encoded).await?;
        *handled += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rep_core::LiveOptions;
    use serde_json::json;
    use tempfile::TempDir;

    fn buffer(dir: &TempDir) -> LiveBuffer {
        LiveBuffer::open(dir.path().join("live.json"), LiveOptions::default())
    }

    fn handle(buffer: &LiveBuffer, value: serde_json::Value) -> ControlResponse {
        handle_message(buffer, &serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_add_and_ping() {
        let dir = TempDir::new().unwrap();
        let live = buffer(&dir);

        let resp = handle(
            &live,
            json!({"action": "add", "request": {"id": "h_1", "method": "GET", "url": "https://a.com/", "timestamp": 1}}),
        );
        assert!(resp.success);
        assert_eq!(resp.action.as_deref(), Some("add"));
        assert_eq!(resp.count, Some(1));

        let resp = handle(&live, json!({"action": "ping"}));
        assert_eq!(resp.action.as_deref(), Some("pong"));
        assert_eq!(resp.count, Some(1));
        assert_eq!(
            resp.path,
            Some(dir.path().join("live.json").display().to_string())
        );
    }

    #[test]
    fn test_sync_and_clear() {
        let dir = TempDir::new().unwrap();
        let live = buffer(&dir);

        let resp = handle(
            &live,
            json!({"type": "rep", "action": "sync", "requests": [
                {"id": "h_1", "url": "https://a.com/1"},
                {"id": "h_2", "url": "https://a.com/2"}
            ]}),
        );
        assert_eq!(resp.count, Some(2));

        let resp = handle(&live, json!({"action": "clear"}));
        assert!(resp.success);
        assert_eq!(resp.count, None);
        assert!(live.is_empty());
    }

    #[test]
    fn test_missing_payloads_are_errors() {
        let dir = TempDir::new().unwrap();
        let live = buffer(&dir);

        let resp = handle(&live, json!({"action": "add"}));
        assert!(!resp.success);
        assert!(resp.error.is_some());

        let resp = handle(&live, json!({"action": "sync"}));
        assert!(!resp.success);
        assert!(live.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_runs_when_channel_fails() {
        let dir = TempDir::new().unwrap();
        let live = buffer(&dir);
        live.add(rep_types::Request {
            id: "h_1".into(),
            url: "https://a.com/".into(),
            ..Default::default()
        })
        .unwrap();

        let mut input = Vec::new();
        crate::framing::write_frame(&mut input, br#"{"action":"ping"}"#)
            .await
            .unwrap();
        let mut reader = &input[..];

        // nobody is left to read the reply
        let (mut writer, peer) = tokio::io::duplex(64);
        drop(peer);

        assert!(run(&live, &mut reader, &mut writer).await.is_err());
        assert!(live.is_empty());
        assert!(live.session_id().is_none());
    }

    #[test]
    fn test_unknown_action_and_bad_json() {
        let dir = TempDir::new().unwrap();
        let live = buffer(&dir);

        let resp = handle(&live, json!({"action": "explode"}));
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("explode"));

        let resp = handle_message(&live, b"not json");
        assert!(!resp.success);
    }
}

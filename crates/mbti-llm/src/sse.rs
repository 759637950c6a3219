use eventsource_stream::Eventsource;
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::ChatStream;

/// What one `data:` line of a chat completion stream means for the caller.
#[derive(Debug, PartialEq)]
enum Frame {
    Delta(String),
    Skip,
    Done,
    Failed(String),
}

/// Turn a streaming chat completion response into text deltas.
///
/// The stream ends at `[DONE]`; an error object sent mid-stream becomes an `Err` item.
pub(crate) fn chat_deltas(response: reqwest::Response) -> ChatStream {
    let deltas = response
        .bytes_stream()
        .eventsource()
        .map(|event| match event {
            Ok(event) => parse_frame(&event.data),
            Err(e) => Frame::Failed(e.to_string()),
        })
        .take_while(|frame| *frame != Frame::Done)
        .filter_map(|frame| match frame {
            Frame::Delta(text) => Some(Ok(text)),
            Frame::Failed(reason) => Some(Err(LlmError::SseParse(reason))),
            Frame::Skip | Frame::Done => None,
        });
    Box::pin(deltas)
}

fn parse_frame(data: &str) -> Frame {
    if data.trim() == "[DONE]" {
        return Frame::Done;
    }

    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => return Frame::Failed(format!("unreadable stream frame: {e}")),
    };
    if let Some(error) = chunk.error {
        return Frame::Failed(error.message);
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Frame::Skip;
    };
    if choice.finish_reason.as_deref() == Some("length") {
        tracing::warn!("reply cut off at max_tokens");
    }
    match choice.delta.content {
        Some(text) if !text.is_empty() => Frame::Delta(text),
        _ => Frame::Skip,
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: String,
}

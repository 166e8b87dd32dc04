//! Tolerant server-sent-event parser for the OpenAI-compatible chat-completion
//! stream. Modeled as a pull-based state machine: feed it lines, get events.

use serde::Deserialize;
use tracing::warn;

/// One decoded unit of meaning extracted from the SSE stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A non-null `choices[0].delta.content` fragment.
    Content(String),
    /// The final chunk's token accounting.
    Usage { n_input: i64, n_output: i64 },
    /// The `[DONE]` terminator.
    Done,
    /// A line that carried no actionable information (blank, malformed JSON,
    /// or a chunk with neither content nor usage).
    Skip,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
}

/// A pull-based parser over raw SSE lines. Owns no I/O; the caller feeds it
/// lines from whatever source (reqwest byte stream split on `\n`, a test
/// fixture, etc.) via [`Parser::feed_line`].
#[derive(Debug, Default)]
pub struct Parser {
    done: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self { done: false }
    }

    /// Whether a `[DONE]` terminator has already been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one raw line from the stream (without its trailing newline) and
    /// get back the [`Event`] it represents, if any.
    pub fn feed_line(&mut self, line: &str) -> Event {
        let line = line.trim();
        if line.is_empty() {
            return Event::Skip;
        }

        let payload = match line.strip_prefix("data:") {
            Some(rest) => rest.trim(),
            None => return Event::Skip,
        };

        if payload == "[DONE]" {
            self.done = true;
            return Event::Done;
        }

        let chunk: Chunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(err) => {
                let truncated: String = payload.chars().take(200).collect();
                warn!(error = %err, line = %truncated, "skipping malformed SSE chunk");
                return Event::Skip;
            }
        };

        if let Some(usage) = chunk.usage {
            return Event::Usage {
                n_input: usage.prompt_tokens,
                n_output: usage.completion_tokens,
            };
        }

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                return Event::Content(content);
            }
        }

        Event::Skip
    }
}

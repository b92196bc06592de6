//! The request/response loop.
//!
//! Strictly sequential: read one frame, decode, execute, write exactly one
//! response frame, repeat. Nothing is read ahead and nothing runs between a
//! response and the next read. The loop ends cleanly when the peer closes
//! the stream.

use std::io::{Read, Write};
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::command::{CommandRegistry, ExecContext};
use crate::delta::DeltaStore;
use crate::error::{Error, Result};
use crate::frame::FrameCodec;
use crate::sample::RawSampler;

/// What the loop does when a request fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop and return the error. The peer sees the channel close, which is
    /// what browser-side code written for this host expects.
    #[default]
    Exit,
    /// Answer with `{"type": ..., "error": ...}` and keep serving. Framing
    /// and stream errors still stop the loop.
    Respond,
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exit => write!(f, "exit"),
            Self::Respond => write!(f, "respond"),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exit" | "fatal" => Ok(Self::Exit),
            "respond" => Ok(Self::Respond),
            other => Err(format!(
                "unknown error policy '{other}' (expected exit or respond)"
            )),
        }
    }
}

/// Counts for one completed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// Frames read and handled.
    pub requests: u64,
    /// Error-shaped frames written under [`ErrorPolicy::Respond`].
    pub error_responses: u64,
}

#[derive(Serialize)]
struct Response<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    stat: Value,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    error: String,
}

/// Owns everything a session needs: the command registry, the sampler, and
/// the delta state.
#[derive(Debug)]
pub struct Dispatcher<S> {
    registry: CommandRegistry,
    sampler: S,
    store: DeltaStore,
    /// Limits what is accepted from the peer. Responses are bounded only by
    /// the wire format.
    codec: FrameCodec,
    error_policy: ErrorPolicy,
}

impl<S: RawSampler> Dispatcher<S> {
    pub fn new(registry: CommandRegistry, sampler: S, store: DeltaStore) -> Self {
        Self {
            registry,
            sampler,
            store,
            codec: FrameCodec::new(),
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn with_codec(mut self, codec: FrameCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn store(&self) -> &DeltaStore {
        &self.store
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Decode and run one request, returning the encoded response document.
    pub fn handle_payload(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let command = self.registry.decode(payload)?;
        let kind = command.command_type();
        log::debug!("executing {kind}");
        let stat = command.execute(&mut ExecContext {
            store: &mut self.store,
            sampler: &mut self.sampler,
        })?;
        serde_json::to_vec(&Response { kind, stat }).map_err(Error::Serialize)
    }

    /// Serve requests from `reader` until it is closed.
    pub fn serve<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<ServeSummary>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut summary = ServeSummary::default();
        log::info!(
            "serving {} command types (error policy: {}, regression policy: {})",
            self.registry.tags().len(),
            self.error_policy,
            self.store.policy()
        );

        loop {
            let payload = match self.codec.read_frame(reader) {
                Ok(payload) => payload,
                Err(Error::StreamClosed) => {
                    log::info!("peer closed the stream after {} requests", summary.requests);
                    return Ok(summary);
                }
                Err(e) => {
                    log::error!("failed to read frame: {e}");
                    return Err(e);
                }
            };
            summary.requests += 1;

            match self.handle_payload(&payload) {
                Ok(response) => FrameCodec::new().write_frame(writer, &response)?,
                Err(e) if self.error_policy == ErrorPolicy::Respond && !e.is_framing() => {
                    log::warn!("request failed, answering with error: {e}");
                    let response = error_response(&payload, &e)?;
                    FrameCodec::new().write_frame(writer, &response)?;
                    summary.error_responses += 1;
                }
                Err(e) => {
                    log::error!("request failed: {e}");
                    return Err(e);
                }
            }
        }
    }
}

/// `{"type": <request tag or "error">, "error": <message>}`
fn error_response(payload: &[u8], err: &Error) -> Result<Vec<u8>> {
    let document: Option<Value> = serde_json::from_slice(payload).ok();
    let kind = document
        .as_ref()
        .and_then(|d| d.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("error");
    serde_json::to_vec(&ErrorResponse {
        kind,
        error: err.to_string(),
    })
    .map_err(Error::Serialize)
}

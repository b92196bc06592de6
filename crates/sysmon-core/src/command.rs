//! Commands, the tag → factory registry, and two-phase request decoding.
//!
//! A request document is `{"type": <tag>, ...params}`. Decoding first reads
//! only `type`, asks the [`CommandRegistry`] for a fresh command of that
//! type, then lets the command decode its own parameters from the full
//! document.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::collectors::{CpuCommand, DiskCommand, MemoryCommand, NetworkCommand};
use crate::delta::DeltaStore;
use crate::error::{Error, Result};
use crate::sample::RawSampler;

/// Wire tags of the built-in commands.
pub mod tag {
    pub const ECHO: &str = "echo";
    pub const OS: &str = "os";
    pub const CPU: &str = "cpu";
    pub const MEMORY: &str = "memory";
    pub const DISK: &str = "disk";
    pub const NETWORK: &str = "network";
}

/// State a command may touch while executing.
pub struct ExecContext<'a> {
    pub store: &'a mut DeltaStore,
    pub sampler: &'a mut dyn RawSampler,
}

/// One decoded request.
pub trait Command {
    /// The wire tag this command answers to.
    fn command_type(&self) -> &'static str;

    /// Fill in parameters from the full request document. Commands without
    /// parameters ignore the document.
    fn decode_params(&mut self, document: &Value) -> Result<(), serde_json::Error> {
        let _ = document;
        Ok(())
    }

    /// Run the command and return the `stat` payload of the response.
    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<Value>;
}

/// Produces an empty command ready to receive its parameters.
pub type CommandFactory = fn() -> Box<dyn Command>;

/// Map from wire tag to command factory.
///
/// Filled once at startup and only read afterwards.
#[derive(Default)]
pub struct CommandRegistry {
    factories: HashMap<String, CommandFactory>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

#[derive(Deserialize)]
struct TypeTag {
    #[serde(rename = "type")]
    kind: String,
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in command.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(tag::ECHO, || Box::new(Echo::default()));
        registry.register(tag::OS, || Box::new(Os));
        registry.register(tag::CPU, || Box::new(CpuCommand));
        registry.register(tag::MEMORY, || Box::new(MemoryCommand));
        registry.register(tag::DISK, || Box::new(DiskCommand));
        registry.register(tag::NETWORK, || Box::new(NetworkCommand));
        registry
    }

    /// Associate `tag` with `factory`. A later registration for the same tag
    /// replaces the earlier one, which is returned.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        factory: CommandFactory,
    ) -> Option<CommandFactory> {
        self.factories.insert(tag.into(), factory)
    }

    /// A fresh command for `tag`.
    pub fn resolve(&self, tag: &str) -> Result<Box<dyn Command>> {
        self.factories
            .get(tag)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownCommandType(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Decode one request payload into a ready-to-run command.
    pub fn decode(&self, payload: &[u8]) -> Result<Box<dyn Command>> {
        let document: Value = serde_json::from_slice(payload).map_err(Error::MalformedCommand)?;
        let TypeTag { kind } =
            TypeTag::deserialize(&document).map_err(Error::MalformedCommand)?;
        let mut command = self.resolve(&kind)?;
        command
            .decode_params(&document)
            .map_err(Error::MalformedCommand)?;
        Ok(command)
    }
}

// ---------------------------------------------------------------------------
// Built-in stateless commands
// ---------------------------------------------------------------------------

/// Returns its message unchanged.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Echo {
    #[serde(default)]
    pub message: String,
}

impl Command for Echo {
    fn command_type(&self) -> &'static str {
        tag::ECHO
    }

    fn decode_params(&mut self, document: &Value) -> Result<(), serde_json::Error> {
        *self = Echo::deserialize(document)?;
        Ok(())
    }

    fn execute(&self, _ctx: &mut ExecContext<'_>) -> Result<Value> {
        Ok(Value::String(self.message.clone()))
    }
}

/// Reports the platform the host was built for.
#[derive(Debug, Default, Clone, Copy)]
pub struct Os;

/// Platform name as reported by `os` (e.g. `"linux"`, `"macos"`).
pub fn platform_name() -> &'static str {
    std::env::consts::OS
}

impl Command for Os {
    fn command_type(&self) -> &'static str {
        tag::OS
    }

    fn execute(&self, _ctx: &mut ExecContext<'_>) -> Result<Value> {
        Ok(Value::String(platform_name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaStore;
    use crate::testing::ScriptedSampler;

    fn run(registry: &CommandRegistry, payload: &str) -> Result<Value> {
        let mut store = DeltaStore::default();
        let mut sampler = ScriptedSampler::default();
        let command = registry.decode(payload.as_bytes())?;
        command.execute(&mut ExecContext {
            store: &mut store,
            sampler: &mut sampler,
        })
    }

    #[test]
    fn builtin_tags() {
        let registry = CommandRegistry::with_builtin();
        assert_eq!(
            registry.tags(),
            vec!["cpu", "disk", "echo", "memory", "network", "os"]
        );
        for t in registry.tags() {
            assert_eq!(registry.resolve(t).unwrap().command_type(), t);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let registry = CommandRegistry::with_builtin();
        assert!(matches!(
            registry.resolve("gpu"),
            Err(Error::UnknownCommandType(t)) if t == "gpu"
        ));
        assert!(matches!(
            registry.decode(br#"{"type":"gpu","message":"well formed"}"#),
            Err(Error::UnknownCommandType(_))
        ));
        assert!(matches!(
            CommandRegistry::new().decode(br#"{"type":"echo"}"#),
            Err(Error::UnknownCommandType(_))
        ));
    }

    #[test]
    fn bad_documents_are_malformed() {
        let registry = CommandRegistry::with_builtin();
        for payload in [
            &b"not json"[..],
            br#"{"message":"no type"}"#,
            br#"{"type":7}"#,
            br#"["echo"]"#,
            br#"{"type":"echo","message":5}"#,
        ] {
            assert!(
                matches!(registry.decode(payload), Err(Error::MalformedCommand(_))),
                "{}",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register("probe", || Box::new(Echo::default())).is_none());
        assert!(registry.register("probe", || Box::new(Os)).is_some());
        assert_eq!(registry.resolve("probe").unwrap().command_type(), tag::OS);
    }

    #[test]
    fn resolve_returns_fresh_instances() {
        let registry = CommandRegistry::with_builtin();
        let first = registry
            .decode(br#"{"type":"echo","message":"one"}"#)
            .unwrap();
        let _second = registry
            .decode(br#"{"type":"echo","message":"two"}"#)
            .unwrap();
        let mut store = DeltaStore::default();
        let mut sampler = ScriptedSampler::default();
        let out = first
            .execute(&mut ExecContext {
                store: &mut store,
                sampler: &mut sampler,
            })
            .unwrap();
        assert_eq!(out, Value::from("one"));
    }

    #[test]
    fn echo_returns_message_verbatim() {
        let registry = CommandRegistry::with_builtin();
        for message in ["", "x", "ping", "nul\u{0}inside", "日本語 \u{1F680}"] {
            let doc = serde_json::json!({ "type": "echo", "message": message });
            let out = run(&registry, &doc.to_string()).unwrap();
            assert_eq!(out, Value::from(message));
        }
    }

    #[test]
    fn echo_without_message_is_empty() {
        let registry = CommandRegistry::with_builtin();
        assert_eq!(
            run(&registry, r#"{"type":"echo"}"#).unwrap(),
            Value::from("")
        );
    }

    #[test]
    fn os_ignores_extra_fields() {
        let registry = CommandRegistry::with_builtin();
        let out = run(&registry, r#"{"type":"os","verbose":true}"#).unwrap();
        assert_eq!(out, Value::from(std::env::consts::OS));
    }
}

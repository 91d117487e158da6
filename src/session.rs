//! Session runner: one identity, one target, an ordered message script.
//!
//! ```text
//! Init ─► IdentityReady ─► TargetValidated ─► Sending(0) ─► … ─► Sending(N-1) ─► Done
//!   │            │                │
//!   └────────────┴────────────────┴─► Aborted(reason)
//! ```
//!
//! Identity and target failures abort before anything is sent. A failed
//! send is recorded and the runner moves on to the next entry.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::did::{DidConstructor, DidResolver, Document};
use crate::dispatch::{EnvelopePacker, MessageDispatcher, SendOutcome, Transport};
use crate::error;
use crate::identity::{Identity, IdentityService};
use crate::prompt::TargetPrompt;

pub const PROFILE_TYPE: &str = "https://didcomm.org/user-profile/1.0/profile";
pub const QUESTION_TYPE: &str = "https://didcomm.org/question-answer/1.0/question";
pub const BASIC_MESSAGE_TYPE: &str = "https://didcomm.org/basicmessage/2.0/message";

/// One scripted message. String values in `body` may use the `{now}` and
/// `{agent_name}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default = "empty_body")]
    pub body: Value,
}

impl ScriptEntry {
    pub fn new(message_type: impl Into<String>, body: Value) -> Self {
        Self { message_type: message_type.into(), body }
    }

    pub fn basic(content: &str) -> Self {
        Self::new(BASIC_MESSAGE_TYPE, json!({ "content": content }))
    }
}

fn empty_body() -> Value {
    json!({})
}

/// Profile, question, then a handful of basic messages.
pub fn default_script() -> Vec<ScriptEntry> {
    vec![
        ScriptEntry::new(
            PROFILE_TYPE,
            json!({
                "profile": {
                    "displayName": "{agent_name} (script) @ {now}",
                    "description": "I'm a bot written in Rust",
                }
            }),
        ),
        ScriptEntry::new(
            QUESTION_TYPE,
            json!({
                "question_text": "Alice, are you on the phone with Bob from Faber Bank right now?",
                "question_detail": "This is optional fine-print giving context to the question and its various answers.",
                "valid_responses": [
                    { "text": "Yes, it's me" },
                    { "text": "No, that's not me!" },
                ],
            }),
        ),
        ScriptEntry::basic("Testing from a script!"),
        ScriptEntry::basic(
            "This contact is from a script written in Rust. If you received this message, then the proof of concept worked!",
        ),
        ScriptEntry::basic(
            "The identity behind it is a did:peer:2 built from an Ed25519 signing key and a derived X25519 key.",
        ),
        ScriptEntry::basic("Anyways, I hope you enjoyed this quick demo!"),
        ScriptEntry::basic("またね〜"),
    ]
}

/// Values substituted into script bodies at send time.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub now: String,
    pub agent_name: String,
}

impl TemplateContext {
    pub fn current(agent_name: &str) -> Self {
        Self {
            now: chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
            agent_name: agent_name.to_string(),
        }
    }

    pub fn render(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(
                s.replace("{now}", &self.now).replace("{agent_name}", &self.agent_name),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.render(v)).collect()),
            Value::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), self.render(v))).collect())
            }
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Init,
    IdentityReady,
    TargetValidated,
    Sending(usize),
    Done,
    Aborted(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Aborted(_))
    }
}

/// One attempted send.
#[derive(Debug)]
pub struct SendRecord {
    pub index: usize,
    pub message_id: String,
    pub message_type: String,
    pub outcome: SendOutcome,
}

#[derive(Debug)]
pub struct SessionReport {
    pub state: SessionState,
    pub identity: Option<Identity>,
    /// Our own resolved document, shown once at startup.
    pub self_document: Option<Document>,
    pub target: Option<String>,
    pub sends: Vec<SendRecord>,
}

impl SessionReport {
    pub fn failures(&self) -> usize {
        self.sends.iter().filter(|s| s.outcome.is_failed()).count()
    }
}

pub struct SessionRunner<M, P, T> {
    identity: IdentityService<M>,
    dispatcher: MessageDispatcher<P, T>,
    script: Vec<ScriptEntry>,
    agent_name: String,
    state: SessionState,
}

impl<M, P, T> SessionRunner<M, P, T>
where
    M: DidResolver + DidConstructor,
    P: EnvelopePacker,
    T: Transport,
{
    pub fn new(
        identity: IdentityService<M>,
        dispatcher: MessageDispatcher<P, T>,
        script: Vec<ScriptEntry>,
    ) -> Self {
        Self {
            identity,
            dispatcher,
            script,
            agent_name: "courier".to_string(),
            state: SessionState::Init,
        }
    }

    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    /// Drive the session to `Done` or `Aborted`.
    pub async fn run(mut self, prompt: &mut impl TargetPrompt) -> SessionReport {
        let mut report = SessionReport {
            state: SessionState::Init,
            identity: None,
            self_document: None,
            target: None,
            sends: Vec::new(),
        };

        let me = match self.identity.self_identity() {
            Ok(identity) => identity,
            Err(e) => return self.abort(report, error::chain(&e)),
        };
        info!(did = %me.did, "identity ready");
        report.identity = Some(me.clone());
        self.transition(SessionState::IdentityReady);

        match self.identity.resolve_self(&me) {
            Ok(doc) => {
                let pretty = serde_json::to_string_pretty(&doc).unwrap_or_default();
                info!("own DID document:\n{pretty}");
                report.self_document = Some(doc);
            }
            Err(e) => warn!(error = %e, "own DID does not resolve"),
        }

        let candidate = match prompt.read_target(&me.did).await {
            Ok(candidate) => candidate,
            Err(e) => return self.abort(report, error::chain(&e)),
        };
        let target = match self.identity.validate_target(&candidate) {
            Ok(doc) => doc.id,
            Err(e) => return self.abort(report, error::chain(&e)),
        };
        info!(target = %target, "target validated");
        report.target = Some(target.clone());
        self.transition(SessionState::TargetValidated);

        let context = TemplateContext::current(&self.agent_name);
        for (index, entry) in self.script.iter().enumerate() {
            debug!(from = ?self.state, to = ?SessionState::Sending(index), "session transition");
            self.state = SessionState::Sending(index);

            let body = context.render(&entry.body);
            let message = self.dispatcher.build_message(&entry.message_type, body, &me.did, &target);
            let outcome = self.dispatcher.send(&message, &me, &target).await;
            report.sends.push(SendRecord {
                index,
                message_id: message.id,
                message_type: message.message_type,
                outcome,
            });
        }

        self.transition(SessionState::Done);
        info!(
            attempted = report.sends.len(),
            failed = report.failures(),
            "session finished"
        );
        report.state = self.state;
        report
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }

    fn abort(mut self, mut report: SessionReport, reason: String) -> SessionReport {
        error!(state = ?self.state, %reason, "session aborted");
        self.transition(SessionState::Aborted(reason));
        report.state = self.state;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script_order() {
        let script = default_script();
        assert_eq!(script[0].message_type, PROFILE_TYPE);
        assert_eq!(script[1].message_type, QUESTION_TYPE);
        assert!(script[2..].iter().all(|e| e.message_type == BASIC_MESSAGE_TYPE));
        assert_eq!(script.len(), 7);
    }

    #[test]
    fn render_substitutes_nested_placeholders() {
        let ctx = TemplateContext { now: "01/02/2026 03:04:05".into(), agent_name: "frosty".into() };
        let rendered = ctx.render(&default_script()[0].body);
        assert_eq!(
            rendered["profile"]["displayName"],
            "frosty (script) @ 01/02/2026 03:04:05"
        );
    }

    #[test]
    fn render_leaves_non_strings_alone() {
        let ctx = TemplateContext { now: "x".into(), agent_name: "y".into() };
        let value = json!({ "n": 3, "flag": true, "list": ["{now}", null] });
        assert_eq!(ctx.render(&value), json!({ "n": 3, "flag": true, "list": ["x", null] }));
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Done.is_terminal());
        assert!(SessionState::Aborted("x".into()).is_terminal());
        assert!(!SessionState::Sending(0).is_terminal());
        assert!(!SessionState::Init.is_terminal());
    }

    #[test]
    fn script_entry_from_toml() {
        let entry: ScriptEntry = toml::from_str(
            r#"
type = "https://didcomm.org/basicmessage/2.0/message"
body = { content = "hello" }
"#,
        )
        .unwrap();
        assert_eq!(entry, ScriptEntry::basic("hello"));
    }
}

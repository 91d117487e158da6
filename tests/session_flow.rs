//! End-to-end session runs against in-process packer and transport doubles.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use courier_agent::did::PeerDid2;
use courier_agent::dispatch::{
    DispatchError, EnvelopePacker, MessageDispatcher, PackConfig, PackError, PackedMessage,
    SendOutcome, Transport, TransportError, TransportResponse,
};
use courier_agent::identity::IdentityService;
use courier_agent::message::Message;
use courier_agent::prompt::FixedTarget;
use courier_agent::secrets::SecretsStore;
use courier_agent::session::{ScriptEntry, SessionRunner, SessionState};
use serde_json::json;
use tempfile::TempDir;

#[derive(Default)]
struct Log {
    packed: Vec<(String, String)>,
    posted: Vec<String>,
}

#[derive(Clone, Default)]
struct RecordingPacker(Arc<Mutex<Log>>);

impl EnvelopePacker for RecordingPacker {
    async fn pack(
        &self,
        config: &PackConfig<'_>,
        message: &Message,
        from: &str,
        to: &str,
    ) -> Result<PackedMessage, PackError> {
        assert_eq!(config.sender.did, from);
        assert!(message.is_addressed_to(to));
        self.0.lock().unwrap().packed.push((message.id.clone(), message.message_type.clone()));
        Ok(PackedMessage {
            blob: serde_json::to_string(message).unwrap(),
            service_endpoint: "http://agent.invalid/didcomm".into(),
            media_type: "application/didcomm-plain+json".into(),
        })
    }
}

/// Fails the post whose 1-based position is `fail_on`.
#[derive(Clone)]
struct FlakyTransport {
    log: Arc<Mutex<Log>>,
    fail_on: usize,
}

impl Transport for FlakyTransport {
    async fn post(
        &self,
        endpoint: &str,
        _media_type: &str,
        blob: String,
    ) -> Result<TransportResponse, TransportError> {
        let mut log = self.log.lock().unwrap();
        log.posted.push(blob);
        if log.posted.len() == self.fail_on {
            return Err(TransportError { endpoint: endpoint.into(), reason: "connection reset".into() });
        }
        Ok(TransportResponse { status: 202, body: String::new() })
    }
}

fn identity_service(dir: &TempDir) -> IdentityService<PeerDid2> {
    IdentityService::new(SecretsStore::new(dir.path().join("secrets.json")), PeerDid2)
}

fn counterparty_did() -> String {
    let dir = TempDir::new().unwrap();
    identity_service(&dir).self_identity().unwrap().did
}

fn script(n: usize) -> Vec<ScriptEntry> {
    (0..n).map(|i| ScriptEntry::basic(&format!("message {i} from {{agent_name}}"))).collect()
}

#[tokio::test]
async fn failed_send_does_not_stop_the_script() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(Mutex::new(Log::default()));
    let dispatcher = MessageDispatcher::new(
        RecordingPacker(log.clone()),
        FlakyTransport { log: log.clone(), fail_on: 2 },
    );
    let target = counterparty_did();

    let report = SessionRunner::new(identity_service(&dir), dispatcher, script(4))
        .with_agent_name("tester")
        .run(&mut FixedTarget(target.clone()))
        .await;

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(report.target.as_deref(), Some(target.as_str()));
    assert_eq!(report.sends.len(), 4);
    assert_eq!(report.failures(), 1);
    assert!(matches!(
        report.sends[1].outcome,
        SendOutcome::Failed(DispatchError::Transport(_))
    ));
    for i in [0, 2, 3] {
        assert!(matches!(report.sends[i].outcome, SendOutcome::Delivered { status: 202 }));
    }

    let ids: HashSet<_> = report.sends.iter().map(|s| s.message_id.clone()).collect();
    assert_eq!(ids.len(), 4);

    let log = log.lock().unwrap();
    let packed_ids: Vec<_> = log.packed.iter().map(|(id, _)| id.clone()).collect();
    let report_ids: Vec<_> = report.sends.iter().map(|s| s.message_id.clone()).collect();
    assert_eq!(packed_ids, report_ids);
    assert_eq!(log.posted.len(), 4);

    for (i, blob) in log.posted.iter().enumerate() {
        let sent: serde_json::Value = serde_json::from_str(blob).unwrap();
        assert_eq!(sent["body"], json!({ "content": format!("message {i} from tester") }));
        assert_eq!(sent["to"], json!([target]));
    }
}

#[tokio::test]
async fn unresolvable_target_aborts_before_sending() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(Mutex::new(Log::default()));
    let dispatcher = MessageDispatcher::new(
        RecordingPacker(log.clone()),
        FlakyTransport { log: log.clone(), fail_on: 0 },
    );

    let report = SessionRunner::new(identity_service(&dir), dispatcher, script(3))
        .run(&mut FixedTarget("did:web:example.com".into()))
        .await;

    match &report.state {
        SessionState::Aborted(reason) => {
            assert!(reason.contains("did:web:example.com"), "reason: {reason}")
        }
        other => panic!("expected Aborted, got {other:?}"),
    }
    assert!(report.identity.is_some());
    assert!(report.target.is_none());
    assert!(report.sends.is_empty());

    let log = log.lock().unwrap();
    assert!(log.packed.is_empty());
    assert!(log.posted.is_empty());
}

#[tokio::test]
async fn identity_survives_across_sessions() {
    let dir = TempDir::new().unwrap();
    let target = counterparty_did();
    let mut seen = Vec::new();

    for _ in 0..2 {
        let log = Arc::new(Mutex::new(Log::default()));
        let dispatcher = MessageDispatcher::new(
            RecordingPacker(log.clone()),
            FlakyTransport { log, fail_on: 0 },
        );
        let report = SessionRunner::new(identity_service(&dir), dispatcher, script(1))
            .run(&mut FixedTarget(target.clone()))
            .await;
        assert_eq!(report.state, SessionState::Done);
        seen.push(report.identity.unwrap());
    }

    assert_eq!(seen[0], seen[1]);
    assert!(dir.path().join("secrets.json").exists());
}

#[tokio::test]
async fn own_did_is_a_valid_target() {
    let dir = TempDir::new().unwrap();
    let me = identity_service(&dir).self_identity().unwrap();
    let log = Arc::new(Mutex::new(Log::default()));
    let dispatcher = MessageDispatcher::new(
        RecordingPacker(log.clone()),
        FlakyTransport { log, fail_on: 0 },
    );

    let report = SessionRunner::new(identity_service(&dir), dispatcher, script(2))
        .run(&mut FixedTarget(format!("  {}\n", me.did)))
        .await;

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(report.target.as_deref(), Some(me.did.as_str()));
    assert_eq!(report.failures(), 0);
}

#[tokio::test]
async fn own_document_is_resolved_before_the_target() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(Mutex::new(Log::default()));
    let dispatcher = MessageDispatcher::new(
        RecordingPacker(log.clone()),
        FlakyTransport { log, fail_on: 0 },
    );

    let report = SessionRunner::new(identity_service(&dir), dispatcher, script(1))
        .run(&mut FixedTarget("not a did".into()))
        .await;

    assert!(matches!(report.state, SessionState::Aborted(_)));
    let me = report.identity.unwrap();
    let doc = report.self_document.expect("own document resolved");
    assert_eq!(doc.id, me.did);
    let listed: Vec<_> = doc.verification_method.iter().map(|vm| vm.public_key_multibase.clone()).collect();
    assert!(listed.contains(&me.keys.ed25519.public));
    assert!(listed.contains(&me.keys.x25519.public));
}

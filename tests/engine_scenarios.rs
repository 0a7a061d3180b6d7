//! End-to-end coordination scenarios
//!
//! Exercises the engine through full multi-agent flows against a real
//! state directory: dependency gating, claim exclusivity, review
//! ownership, vote validity, broadcast visibility, and persistence
//! across engine restarts.

use agora::{
    dispatch, AgentRole, CoordinationEngine, MessageType, Op, Priority, Rejection, RejectionKind,
    Reply, TaskStatus, Verdict,
};
use tempfile::TempDir;

fn new_engine(dir: &TempDir) -> CoordinationEngine {
    let mut engine = CoordinationEngine::with_state_dir(dir.path().join(".agora"));
    engine.initialize().unwrap();
    engine
}

/// Scenario A: a task gated on an incomplete dependency cannot be
/// claimed until the dependency completes.
#[test]
fn dependency_gating_blocks_then_releases() {
    let dir = TempDir::new().unwrap();
    let mut engine = new_engine(&dir);

    let task_a = engine
        .create_task("groundwork", "first", AgentRole::Claude, None, vec![])
        .unwrap();
    let task_b = engine
        .create_task(
            "follow-up",
            "second",
            AgentRole::Claude,
            None,
            vec![task_a.id.clone()],
        )
        .unwrap();

    let blocked = engine.claim_task(&task_b.id, AgentRole::Codex).unwrap();
    assert_eq!(
        blocked.rejection().map(Rejection::kind),
        Some(RejectionKind::Conflict)
    );

    assert!(engine
        .claim_task(&task_a.id, AgentRole::Codex)
        .unwrap()
        .is_accepted());
    assert!(engine
        .complete_task(&task_a.id, AgentRole::Codex, "done", vec![])
        .unwrap()
        .is_accepted());

    // The gate is re-evaluated on every attempt; it now passes.
    let claimed = engine
        .claim_task(&task_b.id, AgentRole::Codex)
        .unwrap()
        .accepted()
        .unwrap();
    assert_eq!(claimed.status, TaskStatus::InProgress);
    assert_eq!(claimed.claimed_by, Some(AgentRole::Codex));
}

/// Scenario B: a broadcast reaches every role except the sender.
#[test]
fn broadcast_reaches_everyone_but_sender() {
    let dir = TempDir::new().unwrap();
    let mut engine = new_engine(&dir);

    engine
        .send_message(
            AgentRole::Claude,
            None,
            "hello",
            MessageType::Broadcast,
            Priority::Normal,
            None,
        )
        .unwrap();

    for role in AgentRole::all() {
        let inbox = engine.inbox(*role, true).unwrap();
        if *role == AgentRole::Claude {
            assert!(inbox.is_empty(), "sender must not see own broadcast");
        } else {
            assert_eq!(inbox.len(), 1, "{} should see the broadcast", role);
            assert_eq!(inbox[0].content, "hello");
        }
    }
}

/// Scenario C: a vote only accepts declared options, one entry per
/// agent.
#[test]
fn vote_validity_and_single_entry() {
    let dir = TempDir::new().unwrap();
    let mut engine = new_engine(&dir);

    engine
        .create_vote("lang", vec!["go".into(), "rust".into()])
        .unwrap()
        .accepted()
        .unwrap();

    assert!(engine
        .cast_vote("lang", AgentRole::Gemini, "go")
        .unwrap()
        .is_accepted());

    let invalid = engine
        .cast_vote("lang", AgentRole::Codex, "python")
        .unwrap();
    assert_eq!(
        invalid.rejection(),
        Some(&Rejection::InvalidChoice {
            topic: "lang".into(),
            choice: "python".into(),
        })
    );

    let unknown = engine
        .cast_vote("framework", AgentRole::Codex, "axum")
        .unwrap();
    assert_eq!(
        unknown.rejection().map(Rejection::kind),
        Some(RejectionKind::NotFound)
    );

    let state_vote = engine
        .cast_vote("lang", AgentRole::Gemini, "rust")
        .unwrap()
        .accepted()
        .unwrap();
    assert_eq!(state_vote.votes.len(), 1);
    assert_eq!(
        state_vote.votes.get("gemini").map(String::as_str),
        Some("rust")
    );
}

/// Scenario D: only the designated reviewer may submit, and the
/// requester receives a review_result message.
#[test]
fn review_ownership_and_result_notification() {
    let dir = TempDir::new().unwrap();
    let mut engine = new_engine(&dir);

    let review = engine
        .request_review(
            AgentRole::Copilot,
            AgentRole::Codex,
            "review diff",
            None,
            vec!["src/parser.rs".into()],
        )
        .unwrap();

    // Wrong agent, including the requester, is refused.
    let wrong = engine
        .submit_review(&review.id, AgentRole::Claude, Verdict::Approved, "ok")
        .unwrap();
    assert!(wrong.is_rejected());
    let requester = engine
        .submit_review(&review.id, AgentRole::Copilot, Verdict::Approved, "ok")
        .unwrap();
    assert!(requester.is_rejected());

    let submitted = engine
        .submit_review(&review.id, AgentRole::Codex, Verdict::Approved, "ship it")
        .unwrap()
        .accepted()
        .unwrap();
    assert_eq!(submitted.verdict, Some(Verdict::Approved));
    assert_eq!(submitted.feedback.as_deref(), Some("ship it"));

    let copilot_inbox = engine.inbox(AgentRole::Copilot, true).unwrap();
    let result_msg = copilot_inbox
        .iter()
        .find(|m| m.message_type == MessageType::ReviewResult)
        .expect("requester should be notified of the verdict");
    assert_eq!(result_msg.from_agent, AgentRole::Codex);
    assert!(result_msg.content.contains("APPROVED"));

    assert!(engine.pending_reviews(AgentRole::Codex).unwrap().is_empty());
}

/// The whole document survives an engine restart field-for-field.
#[test]
fn state_survives_engine_restart() {
    let dir = TempDir::new().unwrap();

    let (session_id, task_id) = {
        let mut engine = new_engine(&dir);
        engine.set_initial_prompt("build the pipeline").unwrap();
        let task = engine
            .create_task(
                "t",
                "d",
                AgentRole::Claude,
                Some(AgentRole::Gemini),
                vec![],
            )
            .unwrap();
        engine.claim_task(&task.id, AgentRole::Gemini).unwrap();
        engine.set_context("branch", "feature/x").unwrap();
        engine
            .create_vote("lang", vec!["go".into(), "rust".into()])
            .unwrap();
        engine.cast_vote("lang", AgentRole::Codex, "rust").unwrap();
        engine.escalate(AgentRole::Gemini, "need a human").unwrap();
        (engine.session_id().unwrap(), task.id)
    };

    // Fresh process over the same working directory.
    let mut engine = new_engine(&dir);
    assert_eq!(engine.session_id().unwrap(), session_id);

    let task = engine.task(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.claimed_by, Some(AgentRole::Gemini));
    assert_eq!(task.assigned_to, Some(AgentRole::Gemini));

    assert_eq!(
        engine.context("branch").unwrap().as_deref(),
        Some("feature/x")
    );

    let status = engine.status().unwrap();
    assert!(status.human_intervention_requested);
    assert_eq!(status.escalation_reason.as_deref(), Some("need a human"));
    assert_eq!(status.tasks.in_progress, 1);

    // Vote map came back intact.
    let again = engine.cast_vote("lang", AgentRole::Codex, "rust").unwrap();
    assert_eq!(again.accepted().unwrap().votes.len(), 1);
}

/// The transcript records events chronologically and is deleted on
/// reset along with the rest of the session.
#[test]
fn transcript_and_reset_lifecycle() {
    let dir = TempDir::new().unwrap();
    let mut engine = new_engine(&dir);
    let transcript_path = dir.path().join(".agora/transcript.md");

    engine.set_initial_prompt("kickoff").unwrap();
    let task = engine
        .create_task("t", "d", AgentRole::Claude, None, vec![])
        .unwrap();
    engine.claim_task(&task.id, AgentRole::Codex).unwrap();
    engine
        .complete_task(&task.id, AgentRole::Codex, "done", vec![])
        .unwrap();
    engine.escalate(AgentRole::Codex, "stuck").unwrap();

    let text = std::fs::read_to_string(&transcript_path).unwrap();
    let order = [
        "## Initial Prompt",
        "[TASK CREATED]",
        "[TASK CLAIMED]",
        "[TASK COMPLETED]",
        "[ESCALATION]",
    ];
    let mut last = 0;
    for marker in order {
        let pos = text[last..]
            .find(marker)
            .unwrap_or_else(|| panic!("{} missing or out of order", marker));
        last += pos;
    }

    let old_session = engine.session_id().unwrap();
    engine.reset().unwrap();

    assert_ne!(engine.session_id().unwrap(), old_session);
    assert!(!transcript_path.exists());
    let status = engine.status().unwrap();
    assert_eq!(status.message_count, 0);
    assert_eq!(status.tasks.total, 0);
    assert!(!status.human_intervention_requested);
}

/// The dispatch contract drives a full flow with per-caller identity.
#[test]
fn dispatch_full_round() {
    let dir = TempDir::new().unwrap();
    let mut engine = new_engine(&dir);

    let reply = dispatch(
        &mut engine,
        AgentRole::Claude,
        serde_json::from_value(serde_json::json!({
            "op": "create_task",
            "title": "wire the codec",
            "description": "see spec",
            "assigned_to": "codex",
        }))
        .unwrap(),
    )
    .unwrap();
    let task_id = match reply {
        Reply::TaskCreated { task } => task.id,
        other => panic!("unexpected reply: {:?}", other),
    };

    let reply = dispatch(
        &mut engine,
        AgentRole::Codex,
        Op::ClaimTask {
            task_id: task_id.clone(),
        },
    )
    .unwrap();
    assert!(!reply.is_rejected());

    let reply = dispatch(
        &mut engine,
        AgentRole::Codex,
        Op::CompleteTask {
            task_id,
            result: "done".into(),
            files_modified: vec!["src/codec.rs".into()],
        },
    )
    .unwrap();
    assert!(!reply.is_rejected());

    let reply = dispatch(&mut engine, AgentRole::Claude, Op::GetStatus).unwrap();
    match reply {
        Reply::Status { status } => {
            assert_eq!(status.tasks.completed, 1);
            assert_eq!(status.tasks.total, 1);
        }
        other => panic!("unexpected reply: {:?}", other),
    }
}

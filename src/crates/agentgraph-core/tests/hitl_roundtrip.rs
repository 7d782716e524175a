//! End-to-end human-in-the-loop round trips
//!
//! Covers the full pause/persist/resume cycle: a run pauses on a selection
//! request, the checkpoint captures the pending tool call, and resuming with
//! a user response drives the run to completion with cleanup.

use agentgraph_core::{
    AgentContext, AgentHandler, Checkpoint, CheckpointConfig, CheckpointError, CheckpointStore,
    Graph, GraphError, GraphRunner, InMemoryCheckpointStore, Message, MessageState, Node,
    RunnerListener, SelectionItem, SelectionType, ToolCall, ToolCallCompleted,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Echo;

#[async_trait]
impl AgentHandler for Echo {
    async fn handle(&self, message: Message) -> agentgraph_core::Result<Message> {
        Ok(message)
    }
}

fn hitl_graph() -> Graph {
    Graph::builder("hitl-test")
        .add_node("start", Node::agent(Arc::new(Echo)))
        .add_node(
            "select",
            Node::human_selection(
                "Pick an option",
                vec![
                    SelectionItem::new("opt1", "Option 1"),
                    SelectionItem::new("opt2", "Option 2"),
                ],
                SelectionType::Single,
            ),
        )
        .add_node("end", Node::agent(Arc::new(Echo)))
        .add_edge("start", "select")
        .add_edge("select", "end")
        .entry_point("start")
        .build()
        .unwrap()
}

fn selection_response(option: &str) -> Message {
    Message::text("user", "ok").with_tool_call(ToolCall::user_response(
        Some("ok".to_string()),
        Some(json!({"selected_option": option})),
    ))
}

#[tokio::test]
async fn hitl_pause_resume_completes_and_cleans_up() {
    let graph = hitl_graph();
    let store = InMemoryCheckpointStore::new();
    let runner = GraphRunner::new();
    let config = CheckpointConfig::default();

    let paused = runner
        .execute_with_checkpoint(&graph, Message::text("user", "Start workflow"), &store, &config)
        .await
        .unwrap();

    assert_eq!(paused.state, MessageState::Waiting);
    assert_eq!(paused.node_id.as_deref(), Some("select"));

    let checkpoints = store.list_by_graph("hitl-test").await.unwrap();
    assert_eq!(checkpoints.len(), 1);
    let checkpoint = &checkpoints[0];
    assert_eq!(checkpoint.current_node_id, "select");
    let pending = checkpoint.pending_tool_call.as_ref().expect("pending call");
    assert_eq!(pending.function_name(), "request_user_selection");

    let finished = runner
        .resume_from_checkpoint(
            &graph,
            &checkpoint.id,
            Some(&selection_response("opt1")),
            &store,
            &config,
        )
        .await
        .unwrap();

    assert_eq!(finished.state, MessageState::Completed);
    assert_eq!(finished.data["response_text"], json!("ok"));
    assert_eq!(finished.data["selected_option"], json!("opt1"));
    assert!(finished.data.contains_key("user_response_tool_call"));

    // autoCleanup removed the run's checkpoints
    assert!(store.list_by_graph("hitl-test").await.unwrap().is_empty());
}

#[tokio::test]
async fn agent_context_survives_the_round_trip() {
    let graph = hitl_graph();
    let store = InMemoryCheckpointStore::new();
    let runner = GraphRunner::new();
    let config = CheckpointConfig::default();

    let context = AgentContext::new()
        .with_tenant_id("acme")
        .with_user_id("u-1")
        .with_correlation_id("corr-9");
    let message = Message::text("user", "Start workflow").with_agent_context(context.clone());

    let paused = runner
        .execute_with_checkpoint(&graph, message, &store, &config)
        .await
        .unwrap();
    assert_eq!(paused.agent_context.as_ref(), Some(&context));

    let checkpoint_id = store.list_by_graph("hitl-test").await.unwrap()[0].id.clone();
    let finished = runner
        .resume_from_checkpoint(
            &graph,
            &checkpoint_id,
            Some(&selection_response("opt2")),
            &store,
            &config,
        )
        .await
        .unwrap();

    assert_eq!(finished.agent_context.as_ref(), Some(&context));
}

#[tokio::test]
async fn expired_checkpoint_cannot_resume() {
    let graph = hitl_graph();
    let store = InMemoryCheckpointStore::new();
    let runner = GraphRunner::new();
    let config = CheckpointConfig::default();

    let paused = runner
        .execute_with_checkpoint(&graph, Message::text("user", "Start workflow"), &store, &config)
        .await
        .unwrap();

    // replace the stored checkpoint with one that expired at the epoch
    let checkpoint_id = {
        let stored = store.list_by_graph("hitl-test").await.unwrap().remove(0);
        let expired = Checkpoint::from_message(&paused)
            .unwrap()
            .with_expires_at(chrono::DateTime::from_timestamp(0, 0).unwrap());
        store.delete(&stored.id).await.unwrap();
        store.save(expired.clone()).await.unwrap();
        assert!(expired.is_expired());
        expired.id
    };

    let err = runner
        .resume_from_checkpoint(
            &graph,
            &checkpoint_id,
            Some(&selection_response("opt1")),
            &store,
            &config,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::Checkpoint(CheckpointError::Expired { .. })
    ));
}

#[tokio::test]
async fn human_node_timeout_overrides_configured_ttl() {
    let graph = Graph::builder("timeout-test")
        .add_node(
            "ask",
            Node::human_input("Anyone there?").with_timeout(chrono::Duration::zero()),
        )
        .entry_point("ask")
        .build()
        .unwrap();
    let store = InMemoryCheckpointStore::new();
    let runner = GraphRunner::new();
    let config = CheckpointConfig::default();

    runner
        .execute_with_checkpoint(&graph, Message::text("user", "go"), &store, &config)
        .await
        .unwrap();

    let checkpoint = store.list_by_graph("timeout-test").await.unwrap().remove(0);
    // zero timeout: expires at the snapshot instant, so any resume is too late
    assert_eq!(checkpoint.expires_at, Some(checkpoint.timestamp));
    let err = runner
        .resume_from_checkpoint(&graph, &checkpoint.id, None, &store, &config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::Checkpoint(CheckpointError::Expired { .. })
    ));
}

#[tokio::test]
async fn resume_unknown_checkpoint_is_not_found() {
    let graph = hitl_graph();
    let store = InMemoryCheckpointStore::new();
    let err = GraphRunner::new()
        .resume_from_checkpoint(&graph, "cp_0_0", None, &store, &CheckpointConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::Checkpoint(CheckpointError::NotFound(_))
    ));
}

#[derive(Default)]
struct CountingListener {
    completed: AtomicUsize,
}

impl RunnerListener for CountingListener {
    fn on_tool_call_completed(&self, _event: &ToolCallCompleted) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn completion_event_is_emitted_at_most_once_per_response() {
    let graph = hitl_graph();
    let store = InMemoryCheckpointStore::new();
    let listener = Arc::new(CountingListener::default());
    let runner = GraphRunner::new().with_listener(listener.clone());
    // keep checkpoints around so the same resume can be replayed
    let config = CheckpointConfig::default().with_auto_cleanup(false);

    runner
        .execute_with_checkpoint(&graph, Message::text("user", "Start workflow"), &store, &config)
        .await
        .unwrap();
    let checkpoint_id = store.list_by_graph("hitl-test").await.unwrap()[0].id.clone();

    let response = selection_response("opt1");

    let first = runner
        .resume_from_checkpoint(&graph, &checkpoint_id, Some(&response), &store, &config)
        .await
        .unwrap();
    assert_eq!(first.state, MessageState::Completed);
    assert_eq!(listener.completed.load(Ordering::SeqCst), 1);

    // the audit copy now carries the response tool call
    let audited = store.load(&checkpoint_id).await.unwrap();
    assert!(audited.response_tool_call.is_some());

    // replaying the same response re-executes safely but does not re-emit
    let second = runner
        .resume_from_checkpoint(&graph, &checkpoint_id, Some(&response), &store, &config)
        .await
        .unwrap();
    assert_eq!(second.state, MessageState::Completed);
    assert_eq!(listener.completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resume_without_response_waits_again() {
    let graph = hitl_graph();
    let store = InMemoryCheckpointStore::new();
    let runner = GraphRunner::new();
    let config = CheckpointConfig::default();

    let paused = runner
        .execute_with_checkpoint(&graph, Message::text("user", "Start workflow"), &store, &config)
        .await
        .unwrap();
    let checkpoint_id = store.list_by_graph("hitl-test").await.unwrap()[0].id.clone();

    let still_waiting = runner
        .resume_from_checkpoint(&graph, &checkpoint_id, None, &store, &config)
        .await
        .unwrap();

    assert_eq!(still_waiting.state, MessageState::Waiting);
    assert_eq!(still_waiting.node_id.as_deref(), Some("select"));
    // the pending request was not duplicated
    assert_eq!(still_waiting.tool_calls.len(), paused.tool_calls.len());
    // the re-pause was checkpointed as a fresh snapshot
    let run_id = still_waiting.run_id.as_deref().unwrap();
    assert_eq!(store.list_by_run(run_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn selection_answer_routes_per_option() {
    use agentgraph_core::{engine, SelectionTemplate};
    use std::collections::HashMap;

    struct Tagger(&'static str);

    #[async_trait]
    impl AgentHandler for Tagger {
        async fn handle(&self, message: Message) -> agentgraph_core::Result<Message> {
            Ok(message.with_data_entry(self.0, json!(true)))
        }
    }

    let graph = Graph::builder("routed-selection")
        .add_node(
            "select",
            Node::human_selection(
                "Which path?",
                vec![
                    SelectionItem::new("opt1", "Path A"),
                    SelectionItem::new("opt2", "Path B"),
                ],
                SelectionType::Single,
            ),
        )
        .add_node(
            "route",
            Node::decision(
                engine::selection(SelectionTemplate::selection(SelectionType::Single), true),
                HashMap::from([
                    ("OPTION:opt1".to_string(), "path_a".to_string()),
                    ("OPTION:opt2".to_string(), "path_b".to_string()),
                ]),
                Some("path_b".to_string()),
            ),
        )
        .add_node("path_a", Node::agent(Arc::new(Tagger("took_a"))))
        .add_node("path_b", Node::agent(Arc::new(Tagger("took_b"))))
        .add_edge("select", "route")
        .entry_point("select")
        .build()
        .unwrap();

    let store = InMemoryCheckpointStore::new();
    let runner = GraphRunner::new();
    let config = CheckpointConfig::default();

    runner
        .execute_with_checkpoint(&graph, Message::text("user", "go"), &store, &config)
        .await
        .unwrap();
    let checkpoint_id = store.list_by_graph("routed-selection").await.unwrap()[0].id.clone();

    let finished = runner
        .resume_from_checkpoint(
            &graph,
            &checkpoint_id,
            Some(&selection_response("opt1")),
            &store,
            &config,
        )
        .await
        .unwrap();

    assert_eq!(finished.state, MessageState::Completed);
    assert_eq!(finished.data["took_a"], json!(true));
    assert!(!finished.data.contains_key("took_b"));
    assert_eq!(finished.data["_decisionResult"], json!("OPTION:opt1"));
}

#[tokio::test]
async fn two_hitl_nodes_pause_twice() {
    let graph = Graph::builder("double-hitl")
        .add_node("first", Node::human_input("First question?"))
        .add_node("second", Node::human_input("Second question?"))
        .add_node("end", Node::agent(Arc::new(Echo)))
        .add_edge("first", "second")
        .add_edge("second", "end")
        .entry_point("first")
        .build()
        .unwrap();
    let store = InMemoryCheckpointStore::new();
    let runner = GraphRunner::new();
    let config = CheckpointConfig::default();

    let paused = runner
        .execute_with_checkpoint(&graph, Message::text("user", "go"), &store, &config)
        .await
        .unwrap();
    assert_eq!(paused.node_id.as_deref(), Some("first"));

    let first_cp = store.list_by_graph("double-hitl").await.unwrap()[0].id.clone();
    let answer_one = Message::text("user", "alpha")
        .with_tool_call(ToolCall::user_response(Some("alpha".to_string()), None));
    let paused_again = runner
        .resume_from_checkpoint(&graph, &first_cp, Some(&answer_one), &store, &config)
        .await
        .unwrap();

    // the second human node must pause instead of consuming the first answer
    assert_eq!(paused_again.state, MessageState::Waiting);
    assert_eq!(paused_again.node_id.as_deref(), Some("second"));

    let second_cp = store
        .list_by_run(paused_again.run_id.as_deref().unwrap())
        .await
        .unwrap()[0]
        .id
        .clone();
    let answer_two = Message::text("user", "beta")
        .with_tool_call(ToolCall::user_response(Some("beta".to_string()), None));
    let finished = runner
        .resume_from_checkpoint(&graph, &second_cp, Some(&answer_two), &store, &config)
        .await
        .unwrap();

    assert_eq!(finished.state, MessageState::Completed);
    // both requests and both responses are on the audit trail
    let hitl_calls = finished
        .tool_calls
        .iter()
        .filter(|c| c.is_hitl_request())
        .count();
    let responses = finished
        .tool_calls
        .iter()
        .filter(|c| c.is_user_response())
        .count();
    assert_eq!(hitl_calls, 2);
    assert_eq!(responses, 2);
}

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{echo_task, echo_tool, registry_with, CannedHuman, Harness, QueueStrategy};
use planloop_core::engine::{LoopConfig, LoopEvent, LoopExit, LoopHandle, LoopState, MessageKind, Role};
use planloop_core::error::{LoopError, ToolError};
use planloop_core::plan::Plan;
use planloop_core::store::PlanStore;
use planloop_core::strategy::{MAKE_INITIAL_PLAN, SELECT_TOOL};
use planloop_core::task::{Task, TaskStatus};
use planloop_core::tool::{
    Handler, ParamType, SuccessCheck, SuccessCheckContext, SuccessVerdict, Tool, ToolParameter,
    ToolReturn,
};

fn planning_tool() -> Tool {
    Tool::builder(MAKE_INITIAL_PLAN, "Break the goal into tasks.")
        .parameter(ToolParameter::optional("goal", ParamType::String, "goal"))
        .handler(Handler::asynchronous(|_, _| async {
            Ok(ToolReturn::new("planned 2 tasks").with_planned_tasks(vec![
                echo_task("greet", "hello"),
                echo_task("farewell", "bye").with_predecessors(["greet"]),
            ]))
        }))
}

fn write_file_tool() -> Tool {
    Tool::builder("write_file", "Write a file.")
        .parameter(ToolParameter::required("filename", ParamType::String, "path"))
        .parameter(ToolParameter::required("contents", ParamType::String, "text"))
        .handler(Handler::sync(|_, _| Ok(ToolReturn::new("written"))))
}

#[tokio::test]
async fn bootstrap_plans_and_runs_to_completion() {
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let registry = registry_with(vec![planning_tool(), echo_tool()]);
    let config = LoopConfig {
        goal: Some("say hello then bye".into()),
        ..LoopConfig::default()
    };
    let mut planner = harness.planner(Plan::new("p-boot"), registry, config);

    let bootstrap_id = planner.add_initial_tasks().unwrap().unwrap();
    assert_eq!(planner.current_task_id(), Some(bootstrap_id.as_str()));
    assert_eq!(planner.add_initial_tasks().unwrap(), None);

    let summary = planner.run().await.unwrap();
    assert_eq!(summary.exit, LoopExit::PlanExhausted);
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.done, 3);
    assert_eq!(summary.failed, 0);

    let plan = planner.plan();
    assert_eq!(plan.root().task_ids(), &[bootstrap_id.clone(), "greet".into(), "farewell".into()]);
    assert_eq!(plan.get_task("greet").unwrap().task_text_output.as_deref(), Some("hello"));
    assert_eq!(harness.strategy.call_count(SELECT_TOOL), 0);

    let messages: Vec<&str> = planner.history().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Tool make_initial_plan returned: planned 2 tasks",
            "Tool echo returned: hello",
            "Tool echo returned: bye",
        ]
    );

    let stored = harness.store.load("p-boot").unwrap();
    assert_eq!(stored.status_counts().done, 3);
}

#[tokio::test]
async fn tool_error_fails_the_task_and_the_loop_continues() {
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let broken = Tool::builder("fetch", "Fetch a URL.").handler(Handler::sync(|_, _| {
        Err(ToolError::execution("connection refused").with_hint("Check the URL."))
    }));
    let registry = registry_with(vec![echo_tool(), broken]);

    let mut plan = Plan::new("p-err");
    plan.add_task(Task::new("fetch").with_id("fetch").with_command("fetch").with_priority(10))
        .unwrap();
    plan.add_task(echo_task("after", "still running")).unwrap();

    let mut planner = harness.planner(plan, registry, LoopConfig::default());
    let summary = planner.run().await.unwrap();

    assert_eq!(summary.done, 1);
    assert_eq!(summary.failed, 1);
    let fetch = planner.plan().get_task("fetch").unwrap();
    assert_eq!(fetch.state, TaskStatus::Failed);
    assert_eq!(fetch.failure_reason.as_deref(), Some("connection refused"));

    let first = planner.history().iter().next().unwrap();
    assert_eq!(first.role, Role::System);
    assert_eq!(first.kind, MessageKind::ActionResult);
    assert_eq!(first.content, "Tool fetch failed: connection refused. Check the URL.");
    assert_eq!(planner.plan().get_task("after").unwrap().state, TaskStatus::Done);
}

#[tokio::test]
async fn missing_required_argument_is_reported_without_calling_the_tool() {
    let strategy = QueueStrategy::new().push(
        SELECT_TOOL,
        json!(["write_file", { "filename": "notes.txt" }, "saving notes"]),
    );
    let harness = Harness::new(strategy, CannedHuman::default());
    let mut plan = Plan::new("p-args");
    plan.add_task(Task::new("save notes").with_id("save")).unwrap();

    let mut planner = harness.planner(plan, registry_with(vec![write_file_tool()]), LoopConfig::default());
    planner.run().await.unwrap();

    let task = planner.plan().get_task("save").unwrap();
    assert_eq!(task.state, TaskStatus::Failed);
    assert!(task.failure_reason.as_deref().unwrap().contains("contents"));

    let contents: Vec<&str> = planner.history().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents[0], "saving notes");
    assert!(contents[1].starts_with("Tool write_file failed: invalid arguments"));
}

#[tokio::test]
async fn unparsable_selection_keeps_the_task_until_its_cycle_limit() {
    let strategy = QueueStrategy::new()
        .push(SELECT_TOOL, json!("I would like to write a file"))
        .push(SELECT_TOOL, json!({ "command_args": {} }));
    let harness = Harness::new(strategy, CannedHuman::default());
    let mut plan = Plan::new("p-bad");
    plan.add_task(Task::new("confused").with_id("confused")).unwrap();

    let config = LoopConfig {
        max_task_cycles: 2,
        ..LoopConfig::default()
    };
    let mut planner = harness.planner(plan, registry_with(vec![echo_tool()]), config);
    let summary = planner.run().await.unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.failed, 1);
    let task = planner.plan().get_task("confused").unwrap();
    assert_eq!(task.state, TaskStatus::Failed);
    assert_eq!(
        task.failure_reason.as_deref(),
        Some("task did not finish within 2 cycles")
    );
    assert_eq!(harness.strategy.call_count(SELECT_TOOL), 2);
}

#[tokio::test]
async fn human_feedback_is_recorded_and_the_task_continues() {
    let strategy = QueueStrategy::new()
        .push(
            SELECT_TOOL,
            json!({ "command_name": "human_feedback", "command_args": { "question": "Which greeting?" } }),
        )
        .push(
            SELECT_TOOL,
            json!({ "command_name": "echo", "command_args": { "text": "howdy" }, "thoughts": "user chose howdy" }),
        );
    let harness = Harness::new(strategy, CannedHuman::answering(["howdy"]));
    let mut plan = Plan::new("p-human");
    plan.add_task(Task::new("greet").with_id("greet")).unwrap();

    let mut planner = harness.planner(plan, registry_with(vec![echo_tool()]), LoopConfig::default());
    let summary = planner.run().await.unwrap();

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.done, 1);
    assert_eq!(*harness.human.prompts.lock().unwrap(), vec!["Which greeting?".to_string()]);

    let user: Vec<&str> = planner
        .history()
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(user, vec!["howdy"]);

    // The second selection saw the human answer.
    let calls = harness.strategy.calls.lock().unwrap();
    let history = calls[1].1["history"].as_array().unwrap();
    assert!(history.iter().any(|m| m["role"] == "user" && m["content"] == "howdy"));
}

#[tokio::test]
async fn failed_human_input_stops_the_loop() {
    let strategy = QueueStrategy::new().push(
        SELECT_TOOL,
        json!(["human_feedback", { "question": "Anyone there?" }]),
    );
    let harness = Harness::new(strategy, CannedHuman::default());
    let mut plan = Plan::new("p-silent");
    plan.add_task(Task::new("ask").with_id("ask")).unwrap();

    let mut planner = harness.planner(plan, registry_with(vec![echo_tool()]), LoopConfig::default());
    let err = planner.run().await.unwrap_err();
    assert!(matches!(err, LoopError::HumanInput(_)));
    assert_eq!(planner.handle().state(), LoopState::Stopped);
}

#[tokio::test]
async fn max_cycles_bounds_the_run() {
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let mut plan = Plan::new("p-max");
    for i in 0..5 {
        plan.add_task(echo_task(&format!("t{i}"), "x")).unwrap();
    }
    let config = LoopConfig {
        max_cycles: 2,
        ..LoopConfig::default()
    };
    let mut planner = harness.planner(plan, registry_with(vec![echo_tool()]), config);
    let summary = planner.run().await.unwrap();

    assert_eq!(summary.exit, LoopExit::MaxCycles);
    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.done, 2);
    assert_eq!(harness.store.load("p-max").unwrap().status_counts().ready, 3);
}

#[tokio::test]
async fn failed_task_is_retried_while_retries_remain() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let flaky = Tool::builder("flaky", "Fails once.").handler(Handler::sync(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ToolError::execution("temporary glitch"))
        } else {
            Ok(ToolReturn::new("ok"))
        }
    }));

    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let mut plan = Plan::new("p-retry");
    plan.add_task(Task::new("flaky").with_id("flaky").with_command("flaky")).unwrap();

    let config = LoopConfig {
        max_task_retries: 1,
        ..LoopConfig::default()
    };
    let mut planner = harness.planner(plan, registry_with(vec![flaky]), config);
    let summary = planner.run().await.unwrap();

    assert_eq!(summary.done, 1);
    assert_eq!(summary.failed, 0);
    let task = planner.plan().get_task("flaky").unwrap();
    assert_eq!(task.retry_count, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_takes_effect_at_the_next_cycle_boundary() {
    let handle = LoopHandle::new();
    let stopper = handle.clone();
    let stop_tool = Tool::builder("stop", "Request a stop.").handler(Handler::sync(move |_, _| {
        stopper.stop().map_err(|e| ToolError::execution(e.to_string()))?;
        Ok(ToolReturn::new("stopping"))
    }));

    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let mut plan = Plan::new("p-stop");
    plan.add_task(Task::new("stop").with_id("stop").with_command("stop").with_priority(5))
        .unwrap();
    plan.add_task(echo_task("never", "x")).unwrap();

    let mut planner = harness
        .planner(plan, registry_with(vec![echo_tool(), stop_tool]), LoopConfig::default())
        .with_handle(handle.clone());
    let summary = planner.run().await.unwrap();

    assert_eq!(summary.exit, LoopExit::Stopped);
    assert_eq!(summary.cycles, 1);
    // The in-flight call finished and its result was recorded.
    assert_eq!(planner.plan().get_task("stop").unwrap().state, TaskStatus::Done);
    assert_eq!(planner.plan().get_task("never").unwrap().state, TaskStatus::Ready);
    assert!(!handle.is_running());
}

#[tokio::test]
async fn paused_loop_waits_for_resume() {
    let handle = LoopHandle::new();
    let pauser = handle.clone();
    let pause_tool = Tool::builder("pause", "Pause the loop.").handler(Handler::sync(move |_, _| {
        pauser.pause().map_err(|e| ToolError::execution(e.to_string()))?;
        let resumer = pauser.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            resumer.resume().ok();
        });
        Ok(ToolReturn::new("paused"))
    }));

    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let mut plan = Plan::new("p-pause");
    plan.add_task(Task::new("pause").with_id("pause").with_command("pause").with_priority(1))
        .unwrap();
    plan.add_task(echo_task("later", "resumed")).unwrap();

    let mut planner = harness
        .planner(plan, registry_with(vec![echo_tool(), pause_tool]), LoopConfig::default())
        .with_handle(handle);
    let summary = tokio::time::timeout(Duration::from_secs(5), planner.run())
        .await
        .expect("loop stayed paused")
        .unwrap();

    assert_eq!(summary.exit, LoopExit::PlanExhausted);
    assert_eq!(summary.done, 2);
}

#[tokio::test]
async fn run_rejects_a_handle_that_is_already_active() {
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let handle = LoopHandle::new();
    handle.start().unwrap();

    let mut planner = harness
        .planner(Plan::new("p-busy"), registry_with(vec![echo_tool()]), LoopConfig::default())
        .with_handle(handle);
    let err = planner.run().await.unwrap_err();
    assert!(matches!(err, LoopError::AlreadyRunning(agent) if agent == "agent-1"));
}

struct RejectEverything;

#[async_trait::async_trait]
impl SuccessCheck for RejectEverything {
    async fn check(
        &self,
        _ctx: SuccessCheckContext<'_>,
    ) -> Result<SuccessVerdict, planloop_core::error::StrategyError> {
        Ok(SuccessVerdict::rejected())
    }
}

#[tokio::test]
async fn rejected_output_fails_the_task() {
    let strict = Tool::builder("strict", "Never good enough.")
        .success_check(Arc::new(RejectEverything))
        .handler(Handler::sync(|_, _| Ok(ToolReturn::new("draft"))));
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let mut plan = Plan::new("p-strict");
    plan.add_task(Task::new("strict").with_id("strict").with_command("strict")).unwrap();

    let mut planner = harness.planner(plan, registry_with(vec![strict]), LoopConfig::default());
    planner.run().await.unwrap();

    let task = planner.plan().get_task("strict").unwrap();
    assert_eq!(task.state, TaskStatus::Failed);
    assert_eq!(task.failure_reason.as_deref(), Some("output of strict was rejected"));
}

#[tokio::test]
async fn planned_tasks_from_a_regular_task_become_subtasks() {
    let splitter = Tool::builder("split", "Split the work.").handler(Handler::sync(|_, _| {
        Ok(ToolReturn::new("split in two")
            .with_planned_tasks(vec![echo_task("part-1", "a"), echo_task("part-2", "b")]))
    }));
    let bad_splitter = Tool::builder("bad_split", "Plans a dangling dependency.").handler(
        Handler::sync(|_, _| {
            Ok(ToolReturn::new("oops")
                .with_planned_tasks(vec![echo_task("orphan", "x").with_predecessors(["ghost"])]))
        }),
    );
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let mut plan = Plan::new("p-split");
    plan.add_task(Task::new("big").with_id("big").with_command("split").with_priority(2))
        .unwrap();
    plan.add_task(Task::new("bad").with_id("bad").with_command("bad_split").with_priority(1))
        .unwrap();

    let registry = registry_with(vec![echo_tool(), splitter, bad_splitter]);
    let mut planner = harness.planner(plan, registry, LoopConfig::default());
    let summary = planner.run().await.unwrap();

    let plan = planner.plan();
    let big = plan.get_task("big").unwrap();
    assert_eq!(big.subtasks.task_ids(), &["part-1".to_string(), "part-2".to_string()]);
    assert_eq!(plan.get_task("part-2").unwrap().task_parent_id.as_deref(), Some("big"));
    assert_eq!(plan.get_task("part-2").unwrap().state, TaskStatus::Done);

    let bad = plan.get_task("bad").unwrap();
    assert_eq!(bad.state, TaskStatus::Failed);
    assert!(bad.failure_reason.as_deref().unwrap().starts_with("planned tasks rejected"));
    assert!(!plan.contains("orphan"));
    assert_eq!(summary.done, 3);
}

#[tokio::test]
async fn events_trace_the_run() {
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let mut plan = Plan::new("p-events");
    plan.add_task(echo_task("only", "hi")).unwrap();

    let mut planner = harness.planner(plan, registry_with(vec![echo_tool()]), LoopConfig::default());
    let mut rx = planner.subscribe();
    planner.run().await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            LoopEvent::TaskStateChanged {
                task_id: "only".into(),
                from: TaskStatus::Ready,
                to: TaskStatus::InProgress,
            },
            LoopEvent::CycleStarted {
                cycle: 1,
                task_id: "only".into(),
            },
            LoopEvent::ToolDispatched {
                task_id: "only".into(),
                command: "echo".into(),
                status: "success".into(),
            },
            LoopEvent::TaskStateChanged {
                task_id: "only".into(),
                from: TaskStatus::InProgress,
                to: TaskStatus::Done,
            },
            LoopEvent::CycleFinished { cycle: 1 },
            LoopEvent::LoopExited {
                cycles: 1,
                exit: LoopExit::PlanExhausted,
            },
        ]
    );
}

#[tokio::test]
async fn tool_results_are_shown_to_the_human() {
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let broken = Tool::builder("fetch", "Fetch a URL.")
        .handler(Handler::sync(|_, _| Err(ToolError::execution("timed out"))));
    let mut plan = Plan::new("p-notify");
    plan.add_task(Task::new("fetch").with_id("fetch").with_command("fetch").with_priority(5))
        .unwrap();
    plan.add_task(echo_task("greet", "hello")).unwrap();

    let mut planner = harness.planner(plan, registry_with(vec![echo_tool(), broken]), LoopConfig::default());
    planner.run().await.unwrap();

    assert_eq!(
        *harness.human.messages.lock().unwrap(),
        vec![
            "Tool fetch failed: timed out".to_string(),
            "Tool echo returned: hello".to_string(),
        ]
    );
}

#[tokio::test]
async fn planned_task_behind_a_finished_task_still_runs() {
    let harness = Harness::new(QueueStrategy::new(), CannedHuman::default());
    let expand = Tool::builder("expand", "Plan follow-up work.").handler(Handler::sync(|_, _| {
        Ok(ToolReturn::new("one follow-up").with_planned_tasks(vec![echo_task("follow", "later")
            .with_predecessors(["first"])
            .with_state(TaskStatus::Backlog)]))
    }));
    let mut plan = Plan::new("p-late");
    plan.add_task(echo_task("first", "now").with_priority(10)).unwrap();
    plan.add_task(Task::new("expand").with_id("expand").with_command("expand"))
        .unwrap();

    let mut planner = harness.planner(plan, registry_with(vec![echo_tool(), expand]), LoopConfig::default());
    let summary = planner.run().await.unwrap();

    assert_eq!(summary.exit, LoopExit::PlanExhausted);
    assert_eq!(summary.done, 3);
    let follow = planner.plan().get_task("follow").unwrap();
    assert_eq!(follow.state, TaskStatus::Done);
    assert_eq!(follow.task_parent_id.as_deref(), Some("expand"));
}

#[tokio::test]
async fn reloaded_plan_resumes_the_in_progress_task_first() {
    let strategy = QueueStrategy::new()
        .push(SELECT_TOOL, json!("still thinking"))
        .push(SELECT_TOOL, json!(["echo", { "text": "resumed" }, "picking up where I left off"]));
    let harness = Harness::new(strategy, CannedHuman::default());
    let mut plan = Plan::new("p-resume");
    plan.add_task(Task::new("draft").with_id("draft")).unwrap();

    let config = LoopConfig {
        max_cycles: 1,
        ..LoopConfig::default()
    };
    let mut first = harness.planner(plan, registry_with(vec![echo_tool()]), config);
    assert_eq!(first.run().await.unwrap().exit, LoopExit::MaxCycles);

    let mut reloaded = harness.store.load("p-resume").unwrap();
    assert_eq!(reloaded.get_task("draft").unwrap().state, TaskStatus::InProgress);
    reloaded.add_task(echo_task("urgent", "now").with_priority(10)).unwrap();

    let mut second = harness.planner(reloaded, registry_with(vec![echo_tool()]), LoopConfig::default());
    let summary = second.run().await.unwrap();

    assert_eq!(summary.done, 2);
    let results: Vec<&str> = second
        .history()
        .iter()
        .filter(|m| m.kind == MessageKind::ActionResult)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(results, vec!["Tool echo returned: resumed", "Tool echo returned: now"]);
}

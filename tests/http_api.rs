//! Integration tests for the HTTP control surface.
//!
//! Each test spins up the full Axum router on a random port, backed by
//! tempdir stores, and exercises the real REST contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::timeout;

use taskdeck::api::{self, AppState};
use taskdeck::config::Config;
use taskdeck::personas::{Persona, PersonaCatalog};
use taskdeck::scheduler::{ProcessAgent, Scheduler};
use taskdeck::store::{ChatStore, ReportStore, RunStore, TaskStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Start the full server on a random port. The timer stays disabled so
/// nothing dispatches behind the tests' backs.
async fn start_server() -> (u16, TempDir) {
    let dir = TempDir::new().unwrap();

    let tasks = Arc::new(TaskStore::open(dir.path().join("tasks")).await.unwrap());
    let runs = Arc::new(RunStore::open(dir.path().join("runs")).await.unwrap());
    let chats = Arc::new(ChatStore::open(dir.path().join("chats")).await.unwrap());
    let reports = Arc::new(ReportStore::open(dir.path().join("reports")).await.unwrap());
    let personas = Arc::new(PersonaCatalog::new(vec![Persona {
        id: "implementer".into(),
        name: "Implementer".into(),
        prompt: "You write code.".into(),
    }]));

    let config = Config {
        scheduler_enabled: false,
        ..Config::default()
    };
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&tasks),
        Arc::clone(&runs),
        Arc::clone(&personas),
        Arc::new(ProcessAgent::new("true", Vec::new())),
        &config,
    ));

    let app = api::router(AppState {
        tasks,
        runs,
        chats,
        reports,
        personas,
        scheduler,
        worker: None,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, dir)
}

fn url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}{path}")
}

/// POST /api/tasks and return the created task body.
async fn create_task(port: u16, body: Value) -> Value {
    let resp = reqwest::Client::new()
        .post(url(port, "/api/tasks"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let resp = reqwest::get(url(port, "/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "taskdeck");
    })
    .await
    .expect("test timed out");
}

// ── Tasks ────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_fetch_task() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let created = create_task(
            port,
            json!({
                "title": "Fix login flow",
                "description": "Session cookie expires too early",
                "priority": 150,
                "assignee": "ai",
                "tags": ["auth"]
            }),
        )
        .await;
        assert_eq!(created["status"], "backlog");
        assert_eq!(created["priority"], 150);
        assert!(created["comments"].as_array().unwrap().is_empty());

        let id = created["id"].as_str().unwrap();
        let resp = reqwest::get(url(port, &format!("/api/tasks/{id}"))).await.unwrap();
        assert_eq!(resp.status(), 200);

        let fetched: Value = resp.json().await.unwrap();
        assert_eq!(fetched["title"], "Fix login flow");
        assert_eq!(fetched["assignee"], "ai");
        assert_eq!(fetched["tags"], json!(["auth"]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_task_requires_title() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let resp = reqwest::Client::new()
            .post(url(port, "/api/tasks"))
            .json(&json!({"title": "   "}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Title is required");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn list_is_sorted_by_priority() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        create_task(port, json!({"title": "Low", "priority": 10})).await;
        create_task(port, json!({"title": "High", "priority": 300})).await;
        create_task(port, json!({"title": "Mid", "priority": 100})).await;

        let resp = reqwest::get(url(port, "/api/tasks")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Vec<Value> = resp.json().await.unwrap();
        let titles: Vec<&str> = body.iter().map(|t| t["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["High", "Mid", "Low"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn list_filters_by_status_and_assignee() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        create_task(port, json!({"title": "Mine", "assignee": "ai"})).await;
        let other = create_task(port, json!({"title": "Other", "assignee": "human"})).await;

        // Move one task out of the backlog.
        let id = other["id"].as_str().unwrap();
        let resp = reqwest::Client::new()
            .patch(url(port, &format!("/api/tasks/{id}")))
            .json(&json!({"status": "done"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let backlog: Vec<Value> = reqwest::get(url(port, "/api/tasks?status=backlog"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0]["title"], "Mine");

        let mine: Vec<Value> = reqwest::get(url(port, "/api/tasks?assignee=ai"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0]["title"], "Mine");

        let resp = reqwest::get(url(port, "/api/tasks?status=bogus")).await.unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn patch_updates_only_named_fields() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let created = create_task(
            port,
            json!({"title": "Original", "description": "keep me", "priority": 50}),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let resp = reqwest::Client::new()
            .patch(url(port, &format!("/api/tasks/{id}")))
            .json(&json!({"title": "Renamed", "status": "review"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let patched: Value = resp.json().await.unwrap();
        assert_eq!(patched["title"], "Renamed");
        assert_eq!(patched["status"], "review");
        assert_eq!(patched["description"], "keep me");
        assert_eq!(patched["priority"], 50);
        assert_eq!(patched["id"], created["id"]);
        assert_eq!(patched["created_at"], created["created_at"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn delete_task_is_idempotent() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let created = create_task(port, json!({"title": "Doomed"})).await;
        let id = created["id"].as_str().unwrap();

        let client = reqwest::Client::new();
        let resp = client.delete(url(port, &format!("/api/tasks/{id}"))).send().await.unwrap();
        assert_eq!(resp.status(), 204);

        let resp = reqwest::get(url(port, &format!("/api/tasks/{id}"))).await.unwrap();
        assert_eq!(resp.status(), 404);

        // Deleting again is still a success.
        let resp = client.delete(url(port, &format!("/api/tasks/{id}"))).send().await.unwrap();
        assert_eq!(resp.status(), 204);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_task_id_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let resp = reqwest::get(url(port, "/api/tasks/not-a-uuid")).await.unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_task_returns_404() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let fake_id = uuid::Uuid::new_v4();
        let resp = reqwest::get(url(port, &format!("/api/tasks/{fake_id}"))).await.unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn comment_appends_to_task() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let created = create_task(port, json!({"title": "Discuss"})).await;
        let id = created["id"].as_str().unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .post(url(port, &format!("/api/tasks/{id}/comments")))
            .json(&json!({"text": "looks good"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        let resp = client
            .post(url(port, &format!("/api/tasks/{id}/comments")))
            .json(&json!({"author": "reviewer", "text": "ship it"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        let task: Value = resp.json().await.unwrap();
        let comments = task["comments"].as_array().unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0]["author"], "user");
        assert_eq!(comments[0]["text"], "looks good");
        assert_eq!(comments[1]["author"], "reviewer");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn board_groups_tasks_by_status() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        create_task(port, json!({"title": "Waiting"})).await;
        let reviewed = create_task(port, json!({"title": "In review"})).await;

        let id = reviewed["id"].as_str().unwrap();
        reqwest::Client::new()
            .patch(url(port, &format!("/api/tasks/{id}")))
            .json(&json!({"status": "review"}))
            .send()
            .await
            .unwrap();

        let board: Value = reqwest::get(url(port, "/api/board")).await.unwrap().json().await.unwrap();
        assert_eq!(board["backlog"].as_array().unwrap().len(), 1);
        assert_eq!(board["review"].as_array().unwrap().len(), 1);
        assert!(board["in_progress"].as_array().unwrap().is_empty());
        assert!(board["done"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Chats ────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_append_and_read_back() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        // A channel nobody has written to reads as an empty log.
        let log: Value = reqwest::get(url(port, "/api/chats/general"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(log["channel"], "general");
        assert!(log["messages"].as_array().unwrap().is_empty());

        let resp = reqwest::Client::new()
            .post(url(port, "/api/chats/general"))
            .json(&json!({"text": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        let message: Value = resp.json().await.unwrap();
        assert_eq!(message["author"], "user");
        assert_eq!(message["text"], "hello");

        let log: Value = reqwest::get(url(port, "/api/chats/general"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(log["messages"].as_array().unwrap().len(), 1);
    })
    .await
    .expect("test timed out");
}

// ── Reports ──────────────────────────────────────────────────────────

#[tokio::test]
async fn report_create_and_fetch() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let resp = reqwest::Client::new()
            .post(url(port, "/api/reports"))
            .json(&json!({
                "title": "Weekly Sync",
                "summary": "What moved this week",
                "tags": ["weekly"],
                "body": "All quiet."
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        let created: Value = resp.json().await.unwrap();
        let name = created["name"].as_str().unwrap().to_string();
        assert_eq!(created["title"], "Weekly Sync");

        let fetched: Value = reqwest::get(url(port, &format!("/api/reports/{name}")))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["body"], "All quiet.");
        assert_eq!(fetched["tags"], json!(["weekly"]));

        let names: Vec<String> = reqwest::get(url(port, "/api/reports"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(names.contains(&name));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_report_returns_404() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let resp = reqwest::get(url(port, "/api/reports/no-such-report")).await.unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

// ── Personas ─────────────────────────────────────────────────────────

#[tokio::test]
async fn personas_lists_catalog() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let personas: Vec<Value> = reqwest::get(url(port, "/api/personas"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0]["id"], "implementer");
        assert_eq!(personas[0]["name"], "Implementer");
    })
    .await
    .expect("test timed out");
}

// ── Scheduler ────────────────────────────────────────────────────────

#[tokio::test]
async fn scheduler_status_reports_settings() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let status: Value = reqwest::get(url(port, "/api/scheduler"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["enabled"], false);
        assert_eq!(status["max_running"], 1);
        assert!(status["running"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn scheduler_settings_partial_update() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let resp = reqwest::Client::new()
            .put(url(port, "/api/scheduler/settings"))
            .json(&json!({"max_running": 3}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let settings: Value = resp.json().await.unwrap();
        assert_eq!(settings["max_running"], 3);
        // Untouched fields keep their values.
        assert_eq!(settings["enabled"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn scheduler_settings_reject_bad_cron() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let resp = reqwest::Client::new()
            .put(url(port, "/api/scheduler/settings"))
            .json(&json!({"cron": "not a cron"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        // The bad expression was not applied.
        let status: Value = reqwest::get(url(port, "/api/scheduler"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_ne!(status["cron"], "not a cron");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn trigger_with_no_eligible_tasks() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        create_task(port, json!({"title": "Unassigned"})).await;

        let resp = reqwest::Client::new()
            .post(url(port, "/api/scheduler/trigger"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let outcome: Value = resp.json().await.unwrap();
        assert_eq!(outcome["outcome"], "no_eligible_task");
    })
    .await
    .expect("test timed out");
}

// ── Worker ───────────────────────────────────────────────────────────

#[tokio::test]
async fn worker_call_without_worker_returns_503() {
    timeout(TEST_TIMEOUT, async {
        let (port, _dir) = start_server().await;

        let resp = reqwest::Client::new()
            .post(url(port, "/api/worker/call"))
            .json(&json!({"action": "ping"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "No worker is configured");
    })
    .await
    .expect("test timed out");
}

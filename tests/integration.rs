//! Cross-module scenarios against scripted fixture services.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;

use taskdeck::active::{self, DeviceCheck};
use taskdeck::completion::{self, CompletionOutcome, RecentlyCompleted};
use taskdeck::due::preserve;
use taskdeck::due::recurrence;
use taskdeck::rank;
use taskdeck::settings::Settings;
use taskdeck::statesync::StateClient;
use taskdeck::statesync::publisher::{self, OwnershipCheck, PublishOutcome};
use taskdeck::store::{
    COMPLETION_LOG_FILE, DAY_COUNT_FILE, FILTERS_FILE, StateStore,
    documents::{ActiveTaskRecord, CompletionEntry, DayCount, FilterEntry, active_filter},
};
use taskdeck::todoist::model::Task;
use taskdeck::todoist::{ClientConfig, TodoistClient};

fn http_response(status_line: &str, body: &str, extra_headers: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{extra_headers}Connection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serves scripted responses in connection order, recording raw requests.
/// Reads each request until its declared Content-Length is satisfied.
fn spawn_recording_server(responses: Vec<String>) -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("listener should bind");
    let port = listener
        .local_addr()
        .expect("listener should have local addr")
        .port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    thread::spawn(move || {
        for response in responses {
            let (mut stream, _) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            let _ = stream.set_read_timeout(Some(Duration::from_millis(500)));
            recorded
                .lock()
                .expect("request log lock should not be poisoned")
                .push(read_http_request(&mut stream));
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (port, requests)
}

fn read_http_request(stream: &mut std::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => {
                data.extend_from_slice(&buffer[..read]);
                if request_complete(&data) {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

fn request_complete(data: &[u8]) -> bool {
    let text = String::from_utf8_lossy(data);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    body.len() >= content_length
}

fn todoist_client(port: u16) -> TodoistClient {
    TodoistClient::with_config(
        ClientConfig {
            base_url: format!("http://127.0.0.1:{port}"),
            retry_base: Duration::from_millis(10),
            read_timeout: Duration::from_secs(2),
            close_timeout: Duration::from_secs(2),
        },
        "test-token",
    )
}

fn envelope_response(etag: &str, state_json: &str) -> String {
    let body = format!(
        r#"{{"ok":true,"data":{{"state":{state_json}}},"meta":{{"server_time":"2026-02-15T12:00:00Z"}}}}"#
    );
    http_response("200 OK", &body, &format!("ETag: {etag}\r\n"))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn due_move_via_probe_preserves_time_and_recurrence() {
    // "sat" goes through the probe: create probe, delete probe, update the
    // real task, re-read it.
    let probe = r#"{"id":"probe-1","content":"[due-probe x]","due":{"date":"2026-02-21","string":"sat"}}"#;
    let moved = r#"{
        "id":"a2","content":"morning review","priority":2,
        "due":{
            "datetime":"2026-02-21T09:30:00+00:00",
            "date":"2026-02-21",
            "string":"every day at 9:30",
            "is_recurring":true
        }
    }"#;
    let (port, requests) = spawn_recording_server(vec![
        http_response("200 OK", probe, ""),
        http_response("204 No Content", "", ""),
        http_response("200 OK", moved, ""),
        http_response("200 OK", moved, ""),
    ]);

    let task: Task = serde_json::from_str(
        r#"{
            "id":"a2","content":"morning review","priority":2,
            "due":{
                "datetime":"2026-02-15T09:30:00+00:00",
                "date":"2026-02-15",
                "string":"every day at 9:30",
                "is_recurring":true
            }
        }"#,
    )
    .expect("valid fixture task");

    let change = preserve::move_due_date(
        &todoist_client(port),
        &task,
        "sat",
        chrono_tz::Europe::London,
        date(2026, 2, 15),
    )
    .expect("the due move should succeed");

    assert_eq!(change.target_date, date(2026, 2, 21));
    assert_eq!(change.effective_date, date(2026, 2, 21));
    assert!(recurrence::is_recurring(change.task.due.as_ref()));

    let recorded = requests.lock().unwrap();
    assert_eq!(recorded.len(), 4);
    assert!(recorded[0].contains("POST /tasks"));
    assert!(recorded[0].contains("\"due_string\":\"sat\""));
    assert!(recorded[1].contains("DELETE /tasks/probe-1"));
    // The real update carries the preserved 09:30 wall-clock time.
    assert!(recorded[2].contains("POST /tasks/a2"));
    assert!(recorded[2].contains("2026-02-21T09:30:00"));
}

#[test]
fn publisher_skips_when_another_device_owns_the_gate() {
    let gate = envelope_response(
        "\"v1\"",
        r#"{"todo.background_owner_device_id":"dev-1"}"#,
    );
    let (state_port, state_requests) = spawn_recording_server(vec![gate]);
    let (todoist_port, todoist_requests) = spawn_recording_server(vec![]);

    let temp = TempDir::new().expect("temp dir");
    let store = StateStore::open(temp.path());
    let settings = Settings::default();
    let state_client = StateClient::new(format!("http://127.0.0.1:{state_port}"), "tok", 2);

    let outcome = publisher::publish_once(
        &todoist_client(todoist_port),
        &state_client,
        &store,
        &settings,
        "dev-2",
        "taskdeck-test",
    )
    .expect("the skip is a clean outcome, not an error");

    assert_eq!(
        outcome,
        PublishOutcome::SkippedNotOwner {
            owner: Some("dev-1".to_string())
        }
    );
    // Only the gate read went out; no task fetch, no PATCH.
    assert_eq!(state_requests.lock().unwrap().len(), 1);
    assert!(todoist_requests.lock().unwrap().is_empty());
}

#[test]
fn publisher_publishes_no_tasks_snapshot_when_it_owns_the_gate() {
    let owner_state = r#"{"todo.background_owner_device_id":"dev-1"}"#;
    let (state_port, state_requests) = spawn_recording_server(vec![
        envelope_response("\"v1\"", owner_state),
        envelope_response("\"v1\"", owner_state),
        envelope_response("\"v2\"", owner_state),
    ]);
    let (todoist_port, _) = spawn_recording_server(vec![
        http_response("200 OK", r#"{"results":[],"next_cursor":null}"#, ""),
        http_response("200 OK", r#"{"results":[],"next_cursor":null}"#, ""),
    ]);

    let temp = TempDir::new().expect("temp dir");
    let store = StateStore::open(temp.path());
    let settings = Settings::default();
    let state_client = StateClient::new(format!("http://127.0.0.1:{state_port}"), "tok", 2);

    let outcome = publisher::publish_once(
        &todoist_client(todoist_port),
        &state_client,
        &store,
        &settings,
        "dev-1",
        "taskdeck-test",
    )
    .expect("publish should succeed");

    let PublishOutcome::Published(report) = outcome else {
        panic!("expected a published report, got {outcome:?}");
    };
    assert!(report.up_to_date);
    assert_eq!(report.regular_count, 0);
    assert_eq!(report.long_showing_count, 0);

    let recorded = state_requests.lock().unwrap();
    let patch = recorded
        .iter()
        .find(|request| request.starts_with("PATCH"))
        .expect("a PATCH should have been sent");
    assert!(patch.contains("if-match: \"v1\""));
    assert!(patch.contains("\"todo.tasks_up_to_date\":true"));
    assert!(patch.contains("\"todo.tasks_up_to_date_reason\":\"no_regular_tasks\""));
    assert!(patch.contains("\"todo.tasks_status_version\":1"));
    assert!(patch.contains("\"todo.next_normal_due_kind\":\"none\""));
}

#[test]
fn complete_active_pairs_remote_close_with_local_bookkeeping() {
    let (port, requests) =
        spawn_recording_server(vec![http_response("204 No Content", "", "")]);

    let temp = TempDir::new().expect("temp dir");
    let store = StateStore::open(temp.path());
    active::set(&store, "t42", "write the report", None).expect("set active");

    let mut recently = RecentlyCompleted::new(Duration::from_secs(20));
    let outcome = completion::complete_active(
        &todoist_client(port),
        &store,
        chrono_tz::Europe::London,
        &mut recently,
    )
    .expect("completion should succeed");

    match outcome {
        CompletionOutcome::Completed {
            task_name,
            total_today,
        } => {
            assert_eq!(task_name, "write the report");
            assert_eq!(total_today, 1);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    assert!(requests.lock().unwrap()[0].contains("POST /tasks/t42/close"));
    assert!(active::get(&store).is_none());
    assert_eq!(recently.suppressed_ids(), vec!["t42".to_string()]);

    let log: Vec<CompletionEntry> = store.read_or(COMPLETION_LOG_FILE, Vec::new);
    assert_eq!(log.len(), 1);
    let count: DayCount = store.read_or(DAY_COUNT_FILE, || panic!("count should exist"));
    assert_eq!(count.total_today, 1);
}

#[test]
fn ranking_runs_on_a_worker_thread() {
    // No signal-based timeout machinery anywhere: ranking off the main
    // thread behaves identically.
    let tasks: Vec<Task> = serde_json::from_str(
        r#"[
            {"id":"a","content":"one","priority":2,"due":{"date":"2026-02-15"}},
            {"id":"b","content":"two","priority":4}
        ]"#,
    )
    .expect("valid fixture tasks");

    let handle = thread::spawn(move || {
        rank::rank(
            tasks,
            &[],
            chrono_tz::Europe::London,
            chrono::NaiveTime::from_hms_opt(6, 59, 0).unwrap(),
            chrono::Utc::now(),
        )
    });

    let ranked = handle.join().expect("worker thread should not panic");
    assert_eq!(ranked[0].task.id, "b");
}

#[test]
fn filters_file_tolerates_legacy_flag_encodings() {
    let temp = TempDir::new().expect("temp dir");
    let store = StateStore::open(temp.path());
    std::fs::write(
        store.path(FILTERS_FILE),
        r##"[
            {"id": 1, "filter": "p1", "isActive": 0},
            {"id": 2, "filter": "today | overdue", "isActive": "1"},
            {"id": 3, "filter": "#Work", "isActive": false}
        ]"##,
    )
    .expect("write raw filters file");

    let filters: Vec<FilterEntry> = store.read_or(FILTERS_FILE, Vec::new);
    let active = active_filter(&filters).expect("one filter should be active");
    assert_eq!(active.id, 2);
    assert_eq!(active.filter, "today | overdue");
}

#[test]
fn stale_temp_file_never_shadows_the_document() {
    let temp = TempDir::new().expect("temp dir");
    let store = StateStore::open(temp.path());

    let record = DayCount {
        total_today: 3,
        todays_date: date(2026, 2, 15),
    };
    store.write(DAY_COUNT_FILE, &record).expect("write count");

    // A crash between tmp-write and rename leaves a stray temp file behind;
    // the original document stays intact and the next write replaces both.
    std::fs::write(store.path(".day_count.json.tmp"), "{half written")
        .expect("write stray temp file");

    let loaded: DayCount = store.read_or(DAY_COUNT_FILE, || panic!("count should exist"));
    assert_eq!(loaded, record);

    store
        .write(DAY_COUNT_FILE, &DayCount {
            total_today: 4,
            todays_date: date(2026, 2, 15),
        })
        .expect("overwrite count");
    let reloaded: DayCount = store.read_or(DAY_COUNT_FILE, || panic!("count should exist"));
    assert_eq!(reloaded.total_today, 4);
}

#[test]
fn cross_device_handle_round_trip() {
    let temp = TempDir::new().expect("temp dir");
    let store = StateStore::open(temp.path());

    active::set(&store, "t1", "same machine", None).expect("set active");
    let record = active::get(&store).expect("handle should exist");
    assert_eq!(active::verify_device(&record), DeviceCheck::Ok);

    let foreign = ActiveTaskRecord {
        device_id: "a-different-machine".to_string(),
        ..record
    };
    assert!(matches!(
        active::verify_device(&foreign),
        DeviceCheck::Warning { .. }
    ));
}

#[test]
fn ownership_check_is_pure_over_snapshots() {
    let (port, _) = spawn_recording_server(vec![envelope_response(
        "\"v9\"",
        r#"{"todo.background_owner_device_id":"dev-1","todo.background_owner_device_label":"desk"}"#,
    )]);

    let snapshot = StateClient::new(format!("http://127.0.0.1:{port}"), "tok", 2)
        .get_state()
        .expect("get should succeed");

    assert_eq!(
        publisher::check_ownership(&snapshot, "dev-1"),
        OwnershipCheck::Owner
    );
    assert_eq!(
        publisher::check_ownership(&snapshot, "dev-9"),
        OwnershipCheck::NotOwner {
            owner: Some("dev-1".to_string())
        }
    );
}

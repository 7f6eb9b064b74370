//! # Single-Flight End-to-End Run
//!
//! Drives `SingleFlight` over the real `ApiClient` against a mock HTTP server
//! bound to a random local port. Each scenario prints a line when it holds and
//! bails out with an error when it does not.
//!
//! Routes served:
//! - `/slow/*`   answers `{"code":200}` after 300 ms
//! - `/ok`       answers `{"code":200}`
//! - `/denied`   answers `{"code":401}`
//! - `/rejected` answers `{"code":500}`
//! - `/down`     answers HTTP 503

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use lib_singleflight::configs::FlightSettings;
use lib_singleflight::loggers::init_tracing;
use lib_singleflight::{Dispatch, ErrorEvent, RequestHandle, RequestSpec, SingleFlight};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

type Hits = Arc<Mutex<HashMap<String, usize>>>;
type Log = Arc<Mutex<Vec<String>>>;

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_tracing("test_single_flight", None, "info")?;

    // 1. Start the mock backend
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let hits: Hits = Arc::default();
    tokio::spawn(serve(listener, Arc::clone(&hits)));

    // 2. Build the controller from settings, as an application would
    let settings = FlightSettings {
        base_url: Some(format!("http://127.0.0.1:{}/", port)),
        login_page: Some("/login".into()),
        request_timeout_ms: Some(5_000),
        ..FlightSettings::defaults()
    };
    let flight = SingleFlight::from_settings(&settings)?;

    let defaults_log: Log = Arc::default();
    let sink = Arc::clone(&defaults_log);
    flight
        .defaults()
        .set_no_permission_action(move |_| sink.lock().unwrap().push("redirect".into()));
    let sink = Arc::clone(&defaults_log);
    flight
        .defaults()
        .set_error_action(move |e| sink.lock().unwrap().push(format!("default-error: {}", e)));

    println!("--- Starting Single-Flight Scenarios ---");

    // --- TEST 1: Identical requests in flight are sent once ---
    println!("\n[Test 1] Duplicate suppression...");
    let log: Log = Arc::default();
    let first = flight.send("list", record(&log, "first", RequestSpec::get("slow/dedup").data("q", 1)))?;
    let second = flight.send("list", record(&log, "second", RequestSpec::get("slow/dedup").data("q", 1)))?;
    ensure!(matches!(second, Dispatch::Suppressed), "second send was not suppressed");
    settled(&first).await?;
    ensure!(hit_count(&hits, "/slow/dedup") == 1, "backend saw more than one request");
    ensure!(entries(&log) == ["first:success", "first:complete:Success"], "unexpected callbacks: {:?}", entries(&log));
    println!("✅ One request reached the server, the duplicate was suppressed.");

    // --- TEST 2: A different request supersedes the one in flight ---
    println!("\n[Test 2] Cancel and replace...");
    let log: Log = Arc::default();
    let old = flight.send("list", record(&log, "old", RequestSpec::get("slow/old")))?;
    let new = flight.send("list", record(&log, "new", RequestSpec::get("ok")))?;
    let old_handle = old.handle().context("old request was not issued")?;
    ensure!(old_handle.is_cancelled(), "superseded request was not cancelled");
    settled(&old).await?;
    settled(&new).await?;
    ensure!(
        entries(&log) == ["old:complete:Aborted", "new:success", "new:complete:Success"],
        "unexpected callbacks: {:?}",
        entries(&log)
    );
    println!("✅ Only the replacement reported success; the superseded request was aborted silently.");

    // --- TEST 3: Permission denied falls back to the default action ---
    println!("\n[Test 3] Permission denied without a handler...");
    let denied = flight.send("auth", RequestSpec::get("denied"))?;
    settled(&denied).await?;
    ensure!(entries(&defaults_log) == ["redirect"], "default action not used: {:?}", entries(&defaults_log));
    println!("✅ Default no-permission action ran.");

    // --- TEST 4: Classified and transport failures reach the error handler ---
    println!("\n[Test 4] Failure routing...");
    let log: Log = Arc::default();
    let rejected = flight.send("save", record(&log, "rejected", RequestSpec::post("rejected").data("id", 7)))?;
    settled(&rejected).await?;
    let down = flight.send("save", record(&log, "down", RequestSpec::get("down")))?;
    settled(&down).await?;
    ensure!(
        entries(&log)
            == [
                "rejected:error:rejected",
                "rejected:complete:Rejected",
                "down:error:HTTP status 503",
                "down:complete:TransportFailure"
            ],
        "unexpected callbacks: {:?}",
        entries(&log)
    );
    println!("✅ Rejected payload and HTTP 503 both went to the error callback.");

    // --- TEST 5: Explicit abort ---
    println!("\n[Test 5] Abort...");
    ensure!(!flight.abort("idle-channel"), "abort on an idle channel reported work");
    let log: Log = Arc::default();
    let slow = flight.send("list", record(&log, "slow", RequestSpec::get("slow/abort")))?;
    ensure!(flight.abort("list"), "abort did not find the request in flight");
    settled(&slow).await?;
    ensure!(entries(&log) == ["slow:complete:Aborted"], "unexpected callbacks: {:?}", entries(&log));
    ensure!(
        !entries(&defaults_log).iter().any(|e| e.contains("abort")),
        "abort leaked into the default error action"
    );
    println!("✅ Abort cancelled the request without reporting an error.");

    println!("\n--- All Scenarios Passed Successfully ---");
    Ok(())
}

/// Installs recording callbacks tagged with `tag`.
fn record(log: &Log, tag: &str, spec: RequestSpec) -> RequestSpec {
    let (on_success, on_error, on_complete) = (Arc::clone(log), Arc::clone(log), Arc::clone(log));
    let (t1, t2, t3) = (tag.to_string(), tag.to_string(), tag.to_string());
    spec.on_success(move |_| on_success.lock().unwrap().push(format!("{}:success", t1)))
        .on_error(move |e| {
            let detail = match e {
                ErrorEvent::Rejected(_) => "rejected".to_string(),
                ErrorEvent::Transport(t) => t.to_string(),
            };
            on_error.lock().unwrap().push(format!("{}:error:{}", t2, detail));
        })
        .on_complete(move |s| on_complete.lock().unwrap().push(format!("{}:complete:{:?}", t3, s)))
}

async fn settled(dispatch: &Dispatch) -> Result<()> {
    let handle: &RequestHandle = dispatch.handle().context("request was not issued")?;
    tokio::time::timeout(Duration::from_secs(5), handle.settled())
        .await
        .with_context(|| format!("request {} did not settle", handle.url()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn hit_count(hits: &Hits, path: &str) -> usize {
    hits.lock().unwrap().get(path).copied().unwrap_or(0)
}

/// Minimal HTTP/1.1 responder, one request per connection.
async fn serve(listener: TcpListener, hits: Hits) {
    while let Ok((mut stream, _)) = listener.accept().await {
        let hits = Arc::clone(&hits);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            let Ok(n) = stream.read(&mut buf).await else {
                return;
            };
            let head = String::from_utf8_lossy(&buf[..n]).to_string();
            let path = head
                .split_whitespace()
                .nth(1)
                .and_then(|target| target.split('?').next())
                .unwrap_or("/")
                .to_string();
            *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

            let (status, body) = route(&path).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.flush().await;
        });
    }
}

async fn route(path: &str) -> (&'static str, &'static str) {
    if path.starts_with("/slow/") {
        tokio::time::sleep(Duration::from_millis(300)).await;
        return ("200 OK", r#"{"code":200}"#);
    }
    match path {
        "/ok" => ("200 OK", r#"{"code":200}"#),
        "/denied" => ("200 OK", r#"{"code":401}"#),
        "/rejected" => ("200 OK", r#"{"code":500,"msg":"invalid id"}"#),
        "/down" => ("503 Service Unavailable", r#"{"msg":"maintenance"}"#),
        _ => ("404 Not Found", r#"{"msg":"no route"}"#),
    }
}

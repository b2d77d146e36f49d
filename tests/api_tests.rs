//! Request/response contract, driven the way a remote client would

use async_trait::async_trait;
use rangescan::{
    api::{self, ApiReply, ApiResponse},
    core::{ConnectOutcome, PortScanner},
    network::{NoopResolver, TargetProber},
    ScanConfig, ScanEngine,
};
use serde_json::{json, Value};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

/// Every `.2` host listens on 443
struct FixedHosts;

#[async_trait]
impl PortScanner for FixedHosts {
    async fn connect(&self, target: Ipv4Addr, port: u16, _timeout: Duration) -> ConnectOutcome {
        if target.octets()[3] == 2 && port == 443 {
            ConnectOutcome::Connected
        } else {
            ConnectOutcome::TimedOut
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn engine(config: ScanConfig) -> ScanEngine {
    let prober = TargetProber::new(
        Arc::new(FixedHosts),
        Arc::new(NoopResolver),
        Duration::from_millis(10),
        Duration::from_millis(10),
    );
    ScanEngine::with_prober(config, prober).unwrap()
}

fn call(engine: &ScanEngine, body: Value) -> Value {
    match tokio_test::block_on(api::handle_json(engine, &body.to_string())) {
        ApiReply::Json(response) => serde_json::to_value(response).unwrap(),
        ApiReply::Csv(csv) => panic!("unexpected csv reply: {}", csv.filename),
    }
}

#[test]
fn test_client_loop_until_completed() {
    let engine = engine(ScanConfig::default());
    let mut current = 0;
    let mut collected = Vec::new();
    let mut calls = 0;

    loop {
        let reply = call(
            &engine,
            json!({"start_ip": "192.168.1.1", "end_ip": "192.168.1.7", "ports": "80,443", "current": current}),
        );
        calls += 1;
        assert_eq!(reply["total"], 7);
        collected.extend(reply["results"].as_array().unwrap().iter().cloned());
        current = reply["current"].as_u64().unwrap();
        if reply["completed"].as_bool().unwrap() {
            break;
        }
    }

    assert_eq!(calls, 3);
    assert_eq!(current, 7);
    assert_eq!(collected.len(), 14);
    let open: Vec<&Value> = collected.iter().filter(|r| r["status"] == "Open").collect();
    assert_eq!(open, vec![&json!({"ip": "192.168.1.2", "port": 443, "status": "Open", "server": "Unknown"})]);
}

#[test]
fn test_progress_query_reports_probe_total() {
    let engine = engine(ScanConfig::default());
    let reply = call(
        &engine,
        json!({"start_ip": "192.168.1.1", "end_ip": "192.168.1.7", "ports": "80,443", "current": 6, "progress": true}),
    );
    assert_eq!(reply, json!({"progress": 6, "total": 14}));
}

#[test]
fn test_strict_port_policy_surfaces_error() {
    let lenient = engine(ScanConfig::default());
    let reply = call(&lenient, json!({"start_ip": "192.168.1.1", "end_ip": "192.168.1.1", "ports": "80,http"}));
    assert_eq!(reply["results"].as_array().unwrap().len(), 1);

    let strict = engine(ScanConfig::default().with_port_policy(rangescan::PortPolicy::Strict));
    let reply = call(&strict, json!({"start_ip": "192.168.1.1", "end_ip": "192.168.1.1", "ports": "80,http"}));
    assert!(reply["error"].is_string());
    assert!(reply.get("results").is_none());
}

#[test]
fn test_export_round_from_chunk_results() {
    let engine = engine(ScanConfig::default());
    let reply = call(&engine, json!({"start_ip": "192.168.1.2", "end_ip": "192.168.1.2", "ports": "443,22"}));

    let body = json!({"action": "export_csv", "data": reply["results"]}).to_string();
    match tokio_test::block_on(api::handle_json(&engine, &body)) {
        ApiReply::Csv(csv) => {
            let text = String::from_utf8(csv.bytes).unwrap();
            assert_eq!(
                text,
                "IP Address,Port,Status,Server Name\n192.168.1.2,443,Open,Unknown\n192.168.1.2,22,Closed,Unknown\n"
            );
            assert!(csv.filename.ends_with(".csv"));
        }
        ApiReply::Json(ApiResponse::Error(e)) => panic!("export failed: {}", e.error),
        ApiReply::Json(other) => panic!("unexpected reply: {:?}", other),
    }
}

//! The §6 Node REST surface, hand-rolled over raw `hyper` the way the
//! teacher's health-check server is (no web framework in the dependency
//! tree for a handful of routes).

use crate::state::AppState;
use hyper::{Body, Method, Request, Response, StatusCode};
use mycelium_farseeing::{FutureStateSchedule, StateInfo};
use mycelium_monitor::buckets::{bandwidth_text2number, latency_text2number};
use mycelium_registry::Registry;
use mycelium_types::AppId;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn not_found() -> Response<Body> {
    json_response(StatusCode::NOT_FOUND, json!({"error": "not found"}))
}

fn bad_request(message: impl Into<String>) -> Response<Body> {
    json_response(StatusCode::BAD_REQUEST, json!({"error": message.into()}))
}

async fn read_value_field(req: Request<Body>) -> Option<Value> {
    let bytes = hyper::body::to_bytes(req.into_body()).await.ok()?;
    let parsed: Value = serde_json::from_slice(&bytes).ok()?;
    parsed.get("value").cloned()
}

pub async fn handle(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, "node request");

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let response = match (&method, segments.as_slice()) {
        (&Method::POST, ["node", "resource", "cpuAvail"]) => set_cpu_avail(req, &state).await,
        (&Method::POST, ["node", "resource", "memAvail"]) => set_mem_avail(req, &state).await,
        (&Method::POST, ["link", "resource", "bandwidth", src, dst]) => {
            set_link_resource(req, &state, src, dst, LinkResource::Bandwidth).await
        }
        (&Method::POST, ["link", "resource", "latency", src, dst]) => {
            set_link_resource(req, &state, src, dst, LinkResource::Latency).await
        }
        (&Method::POST, ["app", id, "farseeing"]) => register_farseeing_schedule(req, &state, id).await,
        (&Method::GET, ["node", "resource"]) => get_node_resource(&state).await,
        (&Method::GET, ["id"]) => json_response(StatusCode::OK, json!({"id": state.node_id.to_string()})),
        (&Method::GET, ["node", id]) => get_node(&state, id).await,
        _ => not_found(),
    };

    Ok(response)
}

async fn set_cpu_avail(req: Request<Body>, state: &AppState) -> Response<Body> {
    let Some(value) = read_value_field(req).await.and_then(|v| v.as_f64()) else {
        return bad_request("expected {\"value\": <0-100>}");
    };
    match state.cpu.set_avail(value).await {
        Ok(()) => json_response(StatusCode::OK, json!({"status": "ok"})),
        Err(err) => {
            warn!(%err, "set_avail(cpu) failed");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": err.to_string()}))
        }
    }
}

async fn set_mem_avail(req: Request<Body>, state: &AppState) -> Response<Body> {
    let Some(value) = read_value_field(req).await.and_then(|v| v.as_f64()) else {
        return bad_request("expected {\"value\": <0-100>}");
    };
    match state.ram.set_avail(value).await {
        Ok(()) => json_response(StatusCode::OK, json!({"status": "ok"})),
        Err(err) => {
            warn!(%err, "set_avail(ram) failed");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": err.to_string()}))
        }
    }
}

enum LinkResource {
    Bandwidth,
    Latency,
}

/// Accepts either a bucket label (`"1G"`, `"10ms"`) or a raw numeric value
/// in the resource's native unit (§6 "bucket-string or int").
fn parse_link_value(resource: &LinkResource, raw: &Value) -> Option<u64> {
    if let Some(n) = raw.as_u64() {
        return Some(n);
    }
    let text = raw.as_str()?;
    match resource {
        LinkResource::Bandwidth => bandwidth_text2number(text),
        LinkResource::Latency => latency_text2number(text),
    }
}

async fn set_link_resource(req: Request<Body>, state: &AppState, src: &str, dst: &str, resource: LinkResource) -> Response<Body> {
    let (Ok(src), Ok(dst)) = (src.parse::<mycelium_types::NodeId>(), dst.parse::<mycelium_types::NodeId>()) else {
        return bad_request("src/dst must be node ids");
    };

    let Some(raw) = read_value_field(req).await else {
        return bad_request("expected {\"value\": <bucket-string-or-int>}");
    };
    let Some(value) = parse_link_value(&resource, &raw) else {
        return bad_request("value must be a recognised bucket label or integer");
    };

    let Some(link_id) = state.link.find_phys_link(src, dst).await else {
        return not_found();
    };

    let result = match resource {
        LinkResource::Bandwidth => state.link.set_bandwidth(link_id, value).await,
        LinkResource::Latency => state.link.set_latency(link_id, value).await,
    };
    match result {
        Ok(()) => json_response(StatusCode::OK, json!({"status": "ok"})),
        Err(err) => {
            warn!(%err, "link resource update failed");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": err.to_string()}))
        }
    }
}

/// Request body for `POST /app/<id>/farseeing` (§4.7): everything a
/// [`FutureStateSchedule`] needs except `app_id`, which comes from the path.
#[derive(Deserialize)]
struct FarseeingScheduleBody {
    initial_date_ns: u64,
    state_info: HashMap<String, StateInfo>,
    trigger_timestamps: Vec<(i64, String)>,
}

/// §4.7 "registered applications publish `{initial_date, state_info,
/// trigger_timestamps}`": replaces any schedule already pending for this
/// app, per `FarseeingScheduler::register`'s "caller clears via `cancel`
/// first" contract.
async fn register_farseeing_schedule(req: Request<Body>, state: &AppState, id: &str) -> Response<Body> {
    let Ok(app_id) = id.parse::<AppId>() else {
        return bad_request("app id must be a valid application id");
    };
    let Ok(bytes) = hyper::body::to_bytes(req.into_body()).await else {
        return bad_request("could not read request body");
    };
    let body: FarseeingScheduleBody = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(err) => return bad_request(format!("invalid farseeing schedule: {err}")),
    };

    let schedule = FutureStateSchedule {
        app_id,
        initial_date_ns: body.initial_date_ns,
        state_info: body.state_info,
        trigger_timestamps: body.trigger_timestamps,
    };
    state.farseeing.cancel(app_id);
    state.farseeing.register(&schedule);
    json_response(StatusCode::OK, json!({"status": "ok"}))
}

async fn get_node_resource(state: &AppState) -> Response<Body> {
    let id = state.node_id.to_string();
    let cpu_avail = state.registry.get("nodeCpuAvail-", &id).await.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let mem_avail = state.registry.get("nodeMemAvail-", &id).await.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    json_response(StatusCode::OK, json!({"cpuAvail": cpu_avail, "memAvail": mem_avail}))
}

async fn get_node(state: &AppState, id: &str) -> Response<Body> {
    match state.registry.get("node-", id).await {
        Ok(value) => json_response(StatusCode::OK, value),
        Err(_) => not_found(),
    }
}

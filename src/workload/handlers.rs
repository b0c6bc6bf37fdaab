//! Workload request handlers.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workload::WorkloadState;

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Envelope returned by every successful workload endpoint.
#[derive(Debug, Serialize)]
pub struct Outcome<I, R> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<I>,
    pub result: R,
}

impl<I, R> Outcome<I, R> {
    fn completed(message: &str, input: Option<I>, result: R) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            input,
            result,
        }
    }
}

/// Local rejection of a malformed body.
#[derive(Debug, Serialize, Deserialize)]
pub struct Rejection {
    pub error: String,
}

fn reject(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(Rejection {
            error: reason.to_string(),
        }),
    )
        .into_response()
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, serde_json::Error> {
    serde_json::from_slice(body)
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the workload started.
    pub uptime: f64,
}

pub async fn health(State(state): State<WorkloadState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        timestamp: now_rfc3339(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

/// Fields the image handler reads. The body itself is echoed back untouched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub image_url: Option<String>,
    pub operations: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub processed_at: String,
    pub operations: Vec<String>,
}

pub async fn process_image(body: Bytes) -> Response {
    let parsed = parse_body::<Value>(&body)
        .and_then(|input| ImageRequest::deserialize(&input).map(|request| (input, request)));
    let (input, request) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting image request");
            return reject("Failed to process image");
        }
    };

    let operations = request
        .operations
        .unwrap_or_else(|| vec!["optimize".to_string()]);
    tracing::info!(image_url = ?request.image_url, operations = ?operations, "Image processing completed");

    Json(Outcome::completed(
        "Image processing completed",
        Some(input),
        ImageResult {
            processed_at: now_rfc3339(),
            operations,
        },
    ))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct PdfRequest {
    pub template: Option<String>,
    pub data: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfResult {
    pub generated_at: String,
    pub template: String,
    pub page_count: u32,
}

pub async fn generate_pdf(body: Bytes) -> Response {
    let request: PdfRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting PDF request");
            return reject("Failed to generate PDF");
        }
    };

    let template = request.template.unwrap_or_else(|| "default".to_string());
    tracing::info!(template = %template, "PDF generation completed");

    Json(Outcome::<(), _>::completed(
        "PDF generation completed",
        None,
        PdfResult {
            generated_at: now_rfc3339(),
            template,
            page_count: 1,
        },
    ))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ComputationRequest {
    pub task: Option<String>,
    pub params: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationResult {
    pub completed_at: String,
    pub duration_ms: u64,
    pub task: String,
}

/// Sum of square roots over the first `n` integers.
fn simulate_work(n: u32) -> f64 {
    (0..n).map(|i| f64::from(i).sqrt()).sum()
}

pub async fn heavy_computation(body: Bytes) -> Response {
    let request: ComputationRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting computation request");
            return reject("Failed to complete computation");
        }
    };

    let start = Instant::now();
    let total = match tokio::task::spawn_blocking(|| simulate_work(1_000_000)).await {
        Ok(total) => total,
        Err(e) => {
            tracing::error!(error = %e, "Computation task failed");
            return reject("Failed to complete computation");
        }
    };
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let task = request.task.unwrap_or_else(|| "default".to_string());
    tracing::info!(task = %task, duration_ms, total, "Computation completed");

    Json(Outcome::<(), _>::completed(
        "Computation completed",
        None,
        ComputationResult {
            completed_at: now_rfc3339(),
            duration_ms,
            task,
        },
    ))
    .into_response()
}

#[derive(Debug, Serialize)]
pub struct Endpoint {
    pub path: &'static str,
    pub method: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Index {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: [Endpoint; 4],
}

pub async fn index() -> Json<Index> {
    Json(Index {
        message: "Commerce Container API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: [
            Endpoint {
                path: "/health",
                method: "GET",
                description: "Health check",
            },
            Endpoint {
                path: "/process-image",
                method: "POST",
                description: "Process and optimize images",
            },
            Endpoint {
                path: "/generate-pdf",
                method: "POST",
                description: "Generate PDF documents",
            },
            Endpoint {
                path: "/heavy-computation",
                method: "POST",
                description: "Run resource-intensive computations",
            },
        ],
    })
}

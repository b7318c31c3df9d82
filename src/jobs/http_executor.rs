use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::database::models::{job, job_type::JobType};

use super::{ExecutionError, ExecutionReport, JobExecutor};

/// Payload of an `http` job.
#[derive(Debug, Deserialize)]
struct HttpPayload {
    #[serde(default)]
    url: String,
    /// Empty means GET.
    #[serde(default)]
    method: String,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    body: Option<String>,
}

/// Performs the HTTP request described by a job's payload.
///
/// Any response counts as success, whatever its status code; only failing to
/// get a response at all is an execution error.
pub struct HttpExecutor {
    client: Client,
    body_limit: usize,
}

impl HttpExecutor {
    pub fn new(body_limit: usize) -> Self {
        Self::with_client(Client::new(), body_limit)
    }

    pub const fn with_client(client: Client, body_limit: usize) -> Self {
        Self { client, body_limit }
    }
}

#[async_trait]
impl JobExecutor for HttpExecutor {
    fn job_type(&self) -> JobType {
        JobType::Http
    }

    async fn execute(&self, job: &job::Model) -> Result<ExecutionReport, ExecutionError> {
        let payload: HttpPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| ExecutionError::MalformedPayload(e.to_string()))?;

        if payload.url.is_empty() {
            return Err(ExecutionError::MissingUrl);
        }

        let method = if payload.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(payload.method.to_uppercase().as_bytes())
                .map_err(|_| ExecutionError::InvalidMethod(payload.method.clone()))?
        };

        debug!("🌐 Job {} sending {} {}", job.id, method, payload.url);

        let mut request = self.client.request(method, &payload.url);
        for (key, value) in payload.headers.unwrap_or_default() {
            request = request.header(key, value);
        }
        if let Some(body) = payload.body {
            request = request.body(body);
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = read_body_capped(&mut response, self.body_limit, job).await;

        Ok(ExecutionReport {
            status: status.to_string(),
            status_code: i32::from(status.as_u16()),
            response: body,
        })
    }
}

/// Reads at most `limit` bytes of the body. A read error keeps what arrived
/// so far.
///
/// Bodies that are not valid UTF-8 are stored with replacement characters.
/// The stored text never exceeds `limit` bytes: a character split by the cut
/// is dropped.
async fn read_body_capped(response: &mut Response, limit: usize, job: &job::Model) -> String {
    let mut body = Vec::with_capacity(limit.min(8 * 1024));

    while body.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("⚠️ Job {} failed reading response body: {}", job.id, e);
                break;
            }
        }
    }

    decode_capped(body, limit)
}

fn decode_capped(mut body: Vec<u8>, limit: usize) -> String {
    // An incomplete trailing sequence is the cut, not bad input
    if let Err(e) = std::str::from_utf8(&body) {
        if e.error_len().is_none() {
            body.truncate(e.valid_up_to());
        }
    }

    let mut text = String::from_utf8_lossy(&body).into_owned();
    if text.len() > limit {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

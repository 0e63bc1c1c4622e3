use confluence_domain::repositories::alerts::AlertSink;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const SERVER_ERROR_RETRIES: u32 = 1;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Checks a Bot API reply. Telegram answers 200 with `ok: false` for some
/// rejections, so the status alone is not enough.
pub fn check_bot_response(status: u16, body: &str) -> Result<(), String> {
    let parsed: Option<BotResponse> = serde_json::from_str(body).ok();
    match parsed {
        Some(reply) if reply.ok && (200..300).contains(&status) => Ok(()),
        Some(reply) => Err(format!(
            "telegram rejected message (status {status}): {}",
            reply.description.unwrap_or_else(|| "no description".to_string())
        )),
        None if (200..300).contains(&status) => {
            Err("failed to parse telegram response".to_string())
        }
        None => Err(format!("telegram http error: status {status}")),
    }
}

pub struct TelegramAlertSink {
    endpoint: String,
    chat_id: String,
    client: Client,
}

impl TelegramAlertSink {
    pub fn new(
        token: &str,
        chat_id: String,
        base_url: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, String> {
        if token.trim().is_empty() {
            return Err("telegram token is empty".to_string());
        }
        if chat_id.trim().is_empty() {
            return Err("telegram chat_id is empty".to_string());
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            endpoint: format!("{}/bot{}/sendMessage", base.trim_end_matches('/'), token.trim()),
            chat_id,
            client,
        })
    }

    fn send(&self, text: &str) -> Result<(), String> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
        };
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            // the token is part of the path, so transport errors drop the url
            let response = self
                .client
                .post(&self.endpoint)
                .json(&payload)
                .send()
                .map_err(|err| format!("telegram request failed: {}", err.without_url()));
            let resp = match response {
                Ok(resp) => resp,
                Err(err) if attempts <= SERVER_ERROR_RETRIES => {
                    tracing::debug!(error = %err, attempts, "retrying telegram request");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let status = resp.status();
            if status.is_server_error() && attempts <= SERVER_ERROR_RETRIES {
                continue;
            }
            let body = resp
                .text()
                .map_err(|err| format!("failed to read telegram response: {}", err.without_url()))?;
            return check_bot_response(status.as_u16(), &body);
        }
    }
}

impl AlertSink for TelegramAlertSink {
    fn notify(&self, message: &str) -> Result<(), String> {
        let _span = tracing::info_span!("infra.telegram.notify", chars = message.len()).entered();
        let started = Instant::now();
        let result = self.send(message);
        let label = if result.is_ok() { "ok" } else { "err" };
        metrics::counter!("confluence.infra.telegram.calls_total", "result" => label).increment(1);
        metrics::histogram!("confluence.infra.telegram.notify_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "telegram notify failed");
        }
        result
    }
}

//! Discord REST adapters (API v10).
//!
//! Implements the thread-service and audit-sink ports over plain REST calls.
//! The realtime gateway (interaction delivery) is wired by the host process;
//! this crate only performs the outbound thread/message operations the engine
//! needs, plus the startup "ensure create button" affordance.

use async_trait::async_trait;
use serde_json::{json, Value};

use dmb_core::{
    domain::{MessageId, ThreadId},
    ports::{AuditSink, ButtonStyle, ControlButton, ThreadService, ThreadState},
    router, Error, Result,
};

const API_BASE: &str = "https://discord.com/api/v10";

/// Forum threads auto-archive after a day of silence; the sweep manages the
/// real lifecycle on top of that.
const THREAD_AUTO_ARCHIVE_MINUTES: u32 = 1440;

pub struct DiscordRest {
    http: reqwest::Client,
    token: String,
}

impl DiscordRest {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::External(format!("http client build: {e}")))?;
        Ok(Self {
            http,
            token: token.into(),
        })
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response> {
        let resp = req
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| Error::Thread(format!("{what}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Thread(format!(
                "{what}: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(resp)
    }

    async fn json(&self, req: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        self.send(req, what)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| Error::Thread(format!("{what}: bad json: {e}")))
    }

    /// Find or post the pinned "Create Listing" message in the create
    /// channel, so the affordance survives restarts.
    pub async fn ensure_create_message(&self, create_channel: u64) -> Result<()> {
        let me = self
            .json(self.http.get(format!("{API_BASE}/users/@me")), "fetch self")
            .await?;
        let bot_id = snowflake(&me, "id")?;

        let url = format!("{API_BASE}/channels/{create_channel}/messages?limit=50");
        let messages = self.json(self.http.get(url), "fetch messages").await?;

        let row = create_button_row();
        let bot_id = bot_id.to_string();
        let existing = messages.as_array().and_then(|msgs| {
            msgs.iter().find(|m| {
                let from_bot = m
                    .get("author")
                    .and_then(|a| a.get("id"))
                    .and_then(Value::as_str)
                    == Some(bot_id.as_str());
                let has_components = m
                    .get("components")
                    .and_then(Value::as_array)
                    .map(|c| !c.is_empty())
                    .unwrap_or(false);
                from_bot && has_components
            })
        });

        if let Some(msg) = existing {
            let msg_id = snowflake(msg, "id")?;
            let url = format!("{API_BASE}/channels/{create_channel}/messages/{msg_id}");
            self.send(
                self.http.patch(url).json(&json!({ "components": [row] })),
                "refresh create message",
            )
            .await?;
            tracing::info!("ensured create-listing message");
            return Ok(());
        }

        let body = json!({
            "content": "**Create a New Marketplace Listing**\nClick the button below to \
                        create a new listing in the marketplace forum. After creation the \
                        author (or staff) can manage their listing.",
            "components": [row],
        });
        let url = format!("{API_BASE}/channels/{create_channel}/messages");
        let sent = self
            .json(self.http.post(url).json(&body), "post create message")
            .await?;

        let sent_id = snowflake(&sent, "id")?;
        let pin_url = format!("{API_BASE}/channels/{create_channel}/pins/{sent_id}");
        if let Err(e) = self.send(self.http.put(pin_url), "pin create message").await {
            tracing::debug!("pinning create message failed: {e}");
        }
        tracing::info!("posted create-listing message");
        Ok(())
    }
}

fn style_code(style: ButtonStyle) -> u8 {
    match style {
        ButtonStyle::Primary => 1,
        ButtonStyle::Secondary => 2,
        ButtonStyle::Success => 3,
        ButtonStyle::Danger => 4,
    }
}

fn component_rows(controls: &[ControlButton]) -> Vec<Value> {
    if controls.is_empty() {
        return Vec::new();
    }
    let buttons = controls
        .iter()
        .map(|c| {
            json!({
                "type": 2,
                "style": style_code(c.style),
                "label": c.label,
                "custom_id": c.custom_id,
            })
        })
        .collect::<Vec<_>>();
    vec![json!({ "type": 1, "components": buttons })]
}

fn create_button_row() -> Value {
    json!({
        "type": 1,
        "components": [{
            "type": 2,
            "style": 1,
            "label": "Create Listing",
            "custom_id": router::Action::CreateListing.encode(),
        }],
    })
}

fn snowflake(v: &Value, key: &str) -> Result<u64> {
    v.get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::Thread(format!("missing snowflake field '{key}'")))
}

#[async_trait]
impl ThreadService for DiscordRest {
    async fn create_thread(
        &self,
        parent: u64,
        name: &str,
        content: &str,
        controls: &[ControlButton],
    ) -> Result<(ThreadId, MessageId)> {
        let body = json!({
            "name": name,
            "auto_archive_duration": THREAD_AUTO_ARCHIVE_MINUTES,
            "message": {
                "content": content,
                "components": component_rows(controls),
            },
        });

        let url = format!("{API_BASE}/channels/{parent}/threads");
        let v = self
            .json(self.http.post(url).json(&body), "create thread")
            .await?;

        let thread_id = snowflake(&v, "id")?;
        // Forum starter messages share the thread's id; newer API versions
        // also return the message object directly.
        let message_id = v
            .get("message")
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(thread_id);

        Ok((ThreadId(thread_id), MessageId(message_id)))
    }

    async fn send_message(&self, thread: ThreadId, content: &str) -> Result<MessageId> {
        let url = format!("{API_BASE}/channels/{}/messages", thread.0);
        let v = self
            .json(
                self.http.post(url).json(&json!({ "content": content })),
                "send message",
            )
            .await?;
        Ok(MessageId(snowflake(&v, "id")?))
    }

    async fn edit_message(
        &self,
        thread: ThreadId,
        message: MessageId,
        content: Option<&str>,
        controls: Option<&[ControlButton]>,
    ) -> Result<()> {
        let mut body = serde_json::Map::new();
        if let Some(c) = content {
            body.insert("content".to_string(), Value::String(c.to_string()));
        }
        if let Some(c) = controls {
            body.insert("components".to_string(), Value::Array(component_rows(c)));
        }
        if body.is_empty() {
            return Ok(());
        }

        let url = format!("{API_BASE}/channels/{}/messages/{}", thread.0, message.0);
        self.send(self.http.patch(url).json(&Value::Object(body)), "edit message")
            .await?;
        Ok(())
    }

    async fn set_archived(&self, thread: ThreadId, archived: bool, reason: &str) -> Result<()> {
        let url = format!("{API_BASE}/channels/{}", thread.0);
        self.send(
            self.http
                .patch(url)
                .header("X-Audit-Log-Reason", reason)
                .json(&json!({ "archived": archived })),
            "set archived",
        )
        .await?;
        Ok(())
    }

    async fn is_archived(&self, thread: ThreadId) -> Result<bool> {
        let state = self
            .fetch_thread(thread)
            .await?
            .ok_or_else(|| Error::Thread(format!("thread {} not found", thread.0)))?;
        Ok(state.archived)
    }

    async fn delete_thread(&self, thread: ThreadId, reason: &str) -> Result<()> {
        let url = format!("{API_BASE}/channels/{}", thread.0);
        self.send(
            self.http.delete(url).header("X-Audit-Log-Reason", reason),
            "delete thread",
        )
        .await?;
        Ok(())
    }

    async fn fetch_thread(&self, thread: ThreadId) -> Result<Option<ThreadState>> {
        let url = format!("{API_BASE}/channels/{}", thread.0);
        let resp = self
            .http
            .get(url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| Error::Thread(format!("fetch thread: {e}")))?;

        // Only a definitive 404 counts as "gone"; any other failure is
        // transient and must not trigger orphan cleanup.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(Error::Thread(format!("fetch thread: {status}")));
        }

        let v = resp
            .json::<Value>()
            .await
            .map_err(|e| Error::Thread(format!("fetch thread: bad json: {e}")))?;
        let archived = v
            .get("thread_metadata")
            .and_then(|m| m.get("archived"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Some(ThreadState { archived }))
    }
}

// ============== Staff Log Audit Sink ==============

/// Posts audit lines to the optional staff-log channel.
pub struct StaffLogAudit {
    rest: DiscordRest,
    channel_id: u64,
}

impl StaffLogAudit {
    pub fn new(token: impl Into<String>, channel_id: u64) -> Result<Self> {
        Ok(Self {
            rest: DiscordRest::new(token)?,
            channel_id,
        })
    }
}

#[async_trait]
impl AuditSink for StaffLogAudit {
    async fn emit(&self, text: &str) -> Result<()> {
        let url = format!("{API_BASE}/channels/{}/messages", self.channel_id);
        self.rest
            .send(
                self.rest.http.post(url).json(&json!({ "content": text })),
                "staff log",
            )
            .await?;
        Ok(())
    }
}

// src/notify/telegram.rs
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::NotificationSink;
use crate::error::DeliveryError;
use crate::ingest::types::Candidate;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Telegram caption limit, in characters.
const CAPTION_LIMIT: usize = 1024;

#[derive(Clone)]
pub struct TelegramSink {
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
}

impl TelegramSink {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token,
            chat_id,
            client: Client::new(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendPhoto",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }
}

#[async_trait::async_trait]
impl NotificationSink for TelegramSink {
    async fn deliver(&self, item: &Candidate) -> Result<(), DeliveryError> {
        let payload = SendPhoto::for_item(&self.chat_id, item);

        let rsp = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = rsp.status();
        // Body is `{ ok, description? }` on both success and failure.
        let body: ApiResponse = rsp.json().await.unwrap_or_default();
        if !status.is_success() || !body.ok {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description: body.description.unwrap_or_else(|| "no description".into()),
            });
        }
        tracing::debug!(target: "notify", id = %item.id, "telegram photo sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SendPhoto {
    pub chat_id: String,
    pub photo: String,
    pub caption: String,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
}

impl SendPhoto {
    pub fn for_item(chat_id: &str, item: &Candidate) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            photo: item.media_ref.clone(),
            caption: caption(item),
            parse_mode: "MarkdownV2",
            disable_web_page_preview: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
}

/// `[title](url)` plus an optional description line, MarkdownV2-escaped and
/// capped at the caption limit. The description is cut first, then the title.
pub fn caption(item: &Candidate) -> String {
    let link = format!("]({})", escape_link_url(&item.id));
    let title_budget = CAPTION_LIMIT.saturating_sub(link.chars().count() + 1);
    let mut out = format!("[{}{}", escape_within(&item.title, title_budget), link);
    let Some(desc) = item.description.as_deref().filter(|d| !d.is_empty()) else {
        return out;
    };

    let budget = CAPTION_LIMIT.saturating_sub(out.chars().count() + 1);
    let desc = escape_within(desc, budget);
    if !desc.is_empty() {
        out.push('\n');
        out.push_str(&desc);
    }
    out
}

/// Escape `s` into at most `budget` chars, ending in `…` when cut. Cuts on
/// unescaped chars so an escape sequence is never split.
fn escape_within(s: &str, budget: usize) -> String {
    let escaped = escape_markdown_v2(s);
    if escaped.chars().count() <= budget {
        return escaped;
    }
    let mut cut = String::new();
    let mut used = 0usize;
    for ch in s.chars() {
        let piece = escape_markdown_v2(ch.encode_utf8(&mut [0u8; 4]));
        let len = piece.chars().count();
        if used + len + 1 > budget {
            break;
        }
        cut.push_str(&piece);
        used += len;
    }
    if !cut.is_empty() {
        cut.push('…');
    }
    cut
}

pub fn escape_markdown_v2(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(
            ch,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
                | '{' | '}' | '.' | '!' | '\\'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

// Inside `(...)` of an inline link only `)` and `\` need escaping.
fn escape_link_url(s: &str) -> String {
    s.replace('\\', "\\\\").replace(')', "\\)")
}

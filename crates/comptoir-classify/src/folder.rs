// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM folder routing.
//!
//! Collects the tenant's auto-classify folders, folds them and the tail
//! of the conversation into one compact prompt, and asks the model for a
//! single folder id back. `NONE`, an empty answer, or an id that was not
//! offered all leave the conversation where it is; the write happens in
//! the worker and only on an actual change.

use std::sync::Arc;

use comptoir_core::ComptoirError;
use comptoir_core::types::{Conversation, Folder, InboxMessage};
use comptoir_storage::Database;
use comptoir_storage::queries::folders;
use tracing::{debug, warn};

use crate::llm::{ChatMessage, ChatRequest, LlmClient};
use crate::throttle::Throttle;

/// Messages offered to the model; older ones are dropped first.
const PROMPT_MESSAGE_LIMIT: usize = 5;

/// Shared byte budget across all message bodies in one prompt.
const PROMPT_BODY_BUDGET: usize = 2_000;

/// Sentinel the model answers when no offered folder fits.
const NO_FOLDER_SENTINEL: &str = "NONE";

const SYSTEM_PROMPT: &str = "You sort customer conversations into folders for a small business. \
     Reply with exactly one folder id from the offered list, or NONE if no folder clearly fits. \
     Reply with the id only, nothing else.";

/// Decides which folder, if any, a conversation belongs in.
#[derive(Clone)]
pub struct FolderClassifier {
    db: Database,
    llm: LlmClient,
    throttle: Arc<Throttle>,
}

impl FolderClassifier {
    pub fn new(db: Database, llm: LlmClient, throttle: Arc<Throttle>) -> Self {
        Self { db, llm, throttle }
    }

    /// Pick a folder for the conversation, or `None` to leave it alone.
    ///
    /// `messages` must be in chronological order, oldest first. One LLM
    /// call per invocation, spaced by the process-wide throttle; tenants
    /// without auto-classify folders cost nothing.
    pub async fn classify(
        &self,
        conversation: &Conversation,
        messages: &[InboxMessage],
    ) -> Result<Option<String>, ComptoirError> {
        let folders = folders::list_auto_classify(&self.db, &conversation.company_id).await?;
        if folders.is_empty() {
            return Ok(None);
        }

        let request = ChatRequest {
            model: self.llm.model().to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(conversation, &folders, messages),
                },
            ],
            max_tokens: 16,
        };

        self.throttle.acquire().await;
        let answer = self.llm.complete(&request).await?;

        Ok(parse_answer(
            &answer,
            &folders,
            &conversation.conversation_id,
        ))
    }
}

fn parse_answer(answer: &str, folders: &[Folder], conversation_id: &str) -> Option<String> {
    let cleaned = answer.trim().trim_matches('"');
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case(NO_FOLDER_SENTINEL) {
        debug!(conversation_id, "model declined to route the conversation");
        return None;
    }
    match folders.iter().find(|f| f.folder_id == cleaned) {
        Some(folder) => Some(folder.folder_id.clone()),
        None => {
            warn!(
                conversation_id,
                answer = cleaned,
                "model answered with an id that was not offered"
            );
            None
        }
    }
}

fn build_prompt(
    conversation: &Conversation,
    folders: &[Folder],
    messages: &[InboxMessage],
) -> String {
    let mut prompt = String::from("Folders:\n");
    for folder in folders {
        prompt.push_str(&format!(
            "- id: {} | name: {} | about: {}\n",
            folder.folder_id, folder.name, folder.ai_context
        ));
    }
    if let Some(subject) = &conversation.subject {
        prompt.push_str(&format!("\nSubject: {subject}\n"));
    }
    prompt.push_str("\nConversation, oldest first:\n");
    prompt.push_str(&render_messages(messages, PROMPT_BODY_BUDGET));
    prompt.push_str("\nAnswer with one folder id or NONE.");
    prompt
}

/// Render the last few messages; when the shared budget runs out the
/// newest survive.
fn render_messages(messages: &[InboxMessage], budget: usize) -> String {
    let tail_start = messages.len().saturating_sub(PROMPT_MESSAGE_LIMIT);
    let tail = &messages[tail_start..];

    let mut remaining = budget;
    let mut lines = Vec::with_capacity(tail.len());
    for message in tail.iter().rev() {
        if remaining == 0 {
            break;
        }
        let body = truncate_bytes(message.body_text.trim(), remaining);
        remaining -= body.len();
        lines.push(format!("[{}] {}\n", message.direction, body));
    }
    lines.reverse();
    lines.concat()
}

/// Cut on a char boundary at or below `max_bytes`.
fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

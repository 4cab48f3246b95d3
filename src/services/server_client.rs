/// Server communication layer (HTTP).
/// Abstracts the REST collaborators the chat dock consumes: conversation
/// list, message pages, start-chat, and counterpart identity lookups.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ClientError, Result};
use crate::models::{Conversation, ConversationDetail, MessagePage, Person};

pub struct ServerClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl ServerClient {
    pub fn new(base_url: String, token: String) -> Self {
        ServerClient {
            base_url,
            token,
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(format!("Request to {} failed: {}", path, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(path.to_string()));
        }

        if !response.status().is_success() {
            return Err(ClientError::ServerError(format!(
                "Server returned status {} for {}",
                response.status(),
                path
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::HttpError(format!("Failed to parse response: {}", e)))
    }

    /// Fetch the conversation list for the authenticated user.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.get_json("/user/chats").await
    }

    /// Fetch one page of messages. `before_sent_at` is the pagination cursor;
    /// omitted for the initial (newest) page.
    pub async fn get_message_page(
        &self,
        conversation_id: &str,
        size: usize,
        before_sent_at: Option<DateTime<Utc>>,
    ) -> Result<MessagePage> {
        let mut path = format!("/user/chats/{}/messages?size={}", conversation_id, size);
        if let Some(cursor) = before_sent_at {
            path.push_str(&format!(
                "&beforeSentAt={}",
                cursor.to_rfc3339_opts(SecondsFormat::Millis, true)
            ));
        }
        self.get_json(&path).await
    }

    /// Start (or fetch the existing) conversation with another user.
    pub async fn start_conversation(&self, other_user_id: &str) -> Result<Conversation> {
        self.get_json(&format!("/user/chats/start/{}", other_user_id))
            .await
    }

    /// Conversation summary plus recent messages, used by the detail view.
    pub async fn get_conversation_detail(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationDetail> {
        self.get_json(&format!("/user/chats/{}", conversation_id))
            .await
    }

    /// The coach assigned to the authenticated client.
    pub async fn get_coach_of_client(&self) -> Result<Person> {
        self.get_json("/user/client/coach").await
    }

    /// One client of the authenticated coach.
    pub async fn get_client_of_coach(&self, client_id: &str) -> Result<Person> {
        self.get_json(&format!("/user/coach/clients/{}", client_id))
            .await
    }

    /// All clients of the authenticated coach (start-chat target list).
    pub async fn get_coach_clients(&self) -> Result<Vec<Person>> {
        self.get_json("/user/coach/clients").await
    }
}

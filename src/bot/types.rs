//! The subset of the Telegram Bot API object model the bot reads and writes.

use serde::{Deserialize, Serialize};

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Result of `getFile`
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// All buttons on a single row
    pub fn row(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: vec![buttons],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_document_update() {
        let json = r#"{
            "ok": true,
            "result": [{
                "update_id": 815,
                "message": {
                    "message_id": 12,
                    "from": {"id": 42, "is_bot": false, "first_name": "Sam"},
                    "chat": {"id": 42, "type": "private"},
                    "date": 1700000000,
                    "document": {
                        "file_id": "BQACAgQAAxkBAAM",
                        "file_unique_id": "AgAD",
                        "file_name": "ubuntu.torrent",
                        "mime_type": "application/x-bittorrent",
                        "file_size": 23094
                    }
                }
            }]
        }"#;

        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(response.ok);
        let updates = response.result.unwrap();
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert!(message.text.is_none());
        let document = message.document.as_ref().unwrap();
        assert_eq!(document.file_name.as_deref(), Some("ubuntu.torrent"));
        assert_eq!(document.file_size, Some(23094));
    }

    #[test]
    fn test_decode_callback_update() {
        let json = r#"{
            "update_id": 816,
            "callback_query": {
                "id": "4382bfdwdsb323b2d9",
                "from": {"id": 42, "is_bot": false, "first_name": "Sam", "username": "sam"},
                "message": {"message_id": 13, "chat": {"id": 42, "type": "private"}, "date": 1, "text": "In which directory will it be?"},
                "chat_instance": "-1",
                "data": "cat:tv"
            }
        }"#;

        let update: Update = serde_json::from_str(json).unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("cat:tv"));
        assert_eq!(query.from.username.as_deref(), Some("sam"));
        assert_eq!(query.message.unwrap().chat.id, 42);
    }

    #[test]
    fn test_decode_error_envelope() {
        let json = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.error_code, Some(401));
    }

    #[test]
    fn test_keyboard_serialization() {
        let keyboard = InlineKeyboardMarkup::row(vec![InlineKeyboardButton::callback(
            "Magnet 🧲",
            "src:magnet",
        )]);
        let value = serde_json::to_value(&keyboard).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "inline_keyboard": [[{"text": "Magnet 🧲", "callback_data": "src:magnet"}]]
            })
        );
    }
}

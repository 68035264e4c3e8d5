use crate::config::ChatId;
use serde::{Deserialize, Serialize};

// https://core.telegram.org/bots/api#sendmessage
#[derive(Debug, Serialize)]
pub(super) struct SendMessageRequest<'a> {
    pub(super) chat_id: &'a ChatId,
    pub(super) text: &'a str,
    pub(super) parse_mode: &'static str,
    pub(super) disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiResponse {
    pub(super) ok: bool,
    #[serde(default)]
    pub(super) description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_chat_id_as_given() {
        let numeric = ChatId::Id(-100123);
        let request = SendMessageRequest {
            chat_id: &numeric,
            text: "hi",
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chat_id"], serde_json::json!(-100123));
        assert_eq!(json["parse_mode"], "Markdown");

        let named = ChatId::Name("@till_reports".to_string());
        let request = SendMessageRequest {
            chat_id: &named,
            ..request
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chat_id"], "@till_reports");
    }

    #[test]
    fn test_error_response() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
        )
        .unwrap();

        assert!(!response.ok);
        assert_eq!(
            response.description.as_deref(),
            Some("Bad Request: chat not found")
        );
    }
}

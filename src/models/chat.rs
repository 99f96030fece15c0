use serde::{ Serialize, Deserialize };

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Part {
    pub text: String,
}

/// One turn of the conversation as sent by the browser client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Body of `POST /chat` and `POST /stream`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    /// The new user utterance.
    pub chat: String,
    /// Prior turns, oldest first.
    pub history: Vec<Content>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_request_with_history() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"chat":"and then?","history":[{"role":"user","parts":[{"text":"hi"}]},{"role":"model","parts":[{"text":"hello"},{"text":"there"}]}]}"#
        ).unwrap();

        assert_eq!(req.chat, "and then?");
        assert_eq!(req.history.len(), 2);
        assert_eq!(req.history[1].role, "model");
        assert_eq!(req.history[1].parts[1].text, "there");
    }

    #[test]
    fn rejects_unknown_fields_at_any_depth() {
        let bodies = [
            r#"{"chat":"hi","history":[],"stream":true}"#,
            r#"{"chat":"hi","history":[{"role":"user","parts":[],"id":1}]}"#,
            r#"{"chat":"hi","history":[{"role":"user","parts":[{"text":"a","inlineData":{}}]}]}"#,
        ];
        for body in bodies {
            assert!(serde_json::from_str::<ChatRequest>(body).is_err(), "accepted {}", body);
        }
    }

    #[test]
    fn requires_every_field() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"chat":"hi"}"#).is_err());
        assert!(serde_json::from_str::<ChatRequest>(r#"{"history":[]}"#).is_err());
    }
}

use crate::llm;
use crate::models::chat::Content;

/// Converts client-supplied turns into the gateway's native turns. Order,
/// roles and part texts are carried over unchanged; role values are not
/// checked here, the model rejects the ones it does not know.
pub fn encode_history(history: &[Content]) -> Vec<llm::Content> {
    history.iter().map(Content::gemini_compatible).collect()
}

impl Content {
    pub fn gemini_compatible(&self) -> llm::Content {
        let parts = self.parts
            .iter()
            .map(|p| llm::Part::text(p.text.clone()))
            .collect();
        llm::Content::new(self.role.clone(), parts)
    }
}

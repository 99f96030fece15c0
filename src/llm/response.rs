use thiserror::Error;

use super::{ Content, GenerateContentResponse };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid response from Gemini model")]
pub struct InvalidResponse;

/// Text of the first candidate, parts joined with newlines.
///
/// Only candidate 0 is read: every request asks for a single candidate. The
/// extraction is all or nothing, so a candidate carrying any non-text part
/// yields `InvalidResponse` rather than partial text.
pub fn response_string(resp: &GenerateContentResponse) -> Result<String, InvalidResponse> {
    resp.candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(content_string)
        .ok_or(InvalidResponse)
}

fn content_string(content: &Content) -> Option<String> {
    let parts = content.parts.as_ref()?;
    let texts = parts
        .iter()
        .map(|p| p.as_text())
        .collect::<Option<Vec<&str>>>()?;
    Some(texts.join("\n"))
}

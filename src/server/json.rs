use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ FromRequest, Request };
use axum::http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::error::ApiError;

const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum JsonRequestError {
    #[error("mime: no media type")]
    NoMediaType,
    #[error("mime: invalid media type {0:?}")]
    InvalidMediaType(String),
    #[error("expecting application/json Content-Type. Got {0}")]
    UnsupportedMediaType(String),
    #[error("failed to read request body: {0}")]
    Body(#[from] BytesRejection),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// JSON body extractor that insists on an `application/json` media type and
/// leaves unknown-field policy to the target type's serde attributes.
pub struct JsonRequest<T>(pub T);

impl<T, S> FromRequest<S> for JsonRequest<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();

        let media_type = parse_media_type(&content_type)?;
        if media_type != JSON_MEDIA_TYPE {
            return Err(JsonRequestError::UnsupportedMediaType(media_type).into());
        }

        let bytes = Bytes::from_request(req, state).await.map_err(JsonRequestError::from)?;
        let value = serde_json::from_slice(&bytes).map_err(JsonRequestError::from)?;
        Ok(JsonRequest(value))
    }
}

/// Returns the lower-cased `type/subtype` of a Content-Type value. Parameters
/// are not used for matching but must be well formed.
pub fn parse_media_type(value: &str) -> Result<String, JsonRequestError> {
    let mut pieces = value.split(';');
    let media_type = pieces.next().unwrap_or_default().trim().to_ascii_lowercase();
    if media_type.is_empty() {
        return Err(JsonRequestError::NoMediaType);
    }

    let valid_type = match media_type.split_once('/') {
        Some((ty, sub)) => is_token(ty) && is_token(sub),
        None => false,
    };
    if !valid_type {
        return Err(JsonRequestError::InvalidMediaType(value.to_string()));
    }

    for param in pieces.map(str::trim).filter(|p| !p.is_empty()) {
        let well_formed = match param.split_once('=') {
            Some((key, val)) => is_token(key.trim()) && is_param_value(val.trim()),
            None => false,
        };
        if !well_formed {
            return Err(JsonRequestError::InvalidMediaType(value.to_string()));
        }
    }

    Ok(media_type)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() &&
        s.chars().all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c))
}

fn is_param_value(s: &str) -> bool {
    match s.strip_prefix('"') {
        Some(quoted) => is_quoted_string_tail(quoted),
        None => is_token(s),
    }
}

/// Checks the rest of a quoted string after its opening quote: backslash
/// escapes any character, and the only bare quote is the closing one.
fn is_quoted_string_tail(s: &str) -> bool {
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.next().is_none() {
                    return false;
                }
            }
            '"' => return chars.as_str().is_empty(),
            _ => {}
        }
    }
    false
}

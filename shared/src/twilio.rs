//! Twilio WhatsApp webhook plumbing: form parsing, request signatures and
//! TwiML replies.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// The fields of an inbound message we use.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundMessage {
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub num_media: u32,
    #[serde(default)]
    pub media_url0: Option<String>,
    #[serde(default)]
    pub media_content_type0: Option<String>,
    #[serde(default)]
    pub message_sid: Option<String>,
}

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Media {
        url: String,
        caption: Option<String>,
    },
    Text(String),
    Empty,
}

impl InboundMessage {
    pub fn kind(&self) -> MessageKind {
        let body = self.body.trim();
        if self.num_media > 0 {
            if let Some(url) = self.media_url0.as_deref().filter(|u| !u.is_empty()) {
                return MessageKind::Media {
                    url: url.to_string(),
                    caption: (!body.is_empty()).then(|| body.to_string()),
                };
            }
        }
        if body.is_empty() {
            MessageKind::Empty
        } else {
            MessageKind::Text(body.to_string())
        }
    }

    /// Sender in `whatsapp:+<number>` form.
    pub fn sender(&self) -> String {
        normalize_phone(&self.from)
    }
}

/// Decode a form-urlencoded webhook body into ordered key/value pairs.
pub fn parse_form(body: &str) -> Result<Vec<(String, String)>> {
    serde_urlencoded::from_str(body)
        .map_err(|e| Error::InvalidInput(format!("Malformed form body: {}", e)))
}

/// Decode a form-urlencoded webhook body into an [`InboundMessage`].
pub fn parse_message(body: &str) -> Result<InboundMessage> {
    serde_urlencoded::from_str(body)
        .map_err(|e| Error::InvalidInput(format!("Malformed Twilio message: {}", e)))
}

/// Prefix a bare number with `whatsapp:`.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with(WHATSAPP_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, trimmed)
    }
}

fn signing_mac(auth_token: &str, url: &str, params: &[(String, String)]) -> Result<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes())
        .map_err(|e| Error::Internal(format!("Invalid HMAC key: {}", e)))?;

    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    mac.update(url.as_bytes());
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Ok(mac)
}

/// Compute the `X-Twilio-Signature` for a request: base64 HMAC-SHA1 over
/// the URL followed by every parameter as `key + value`, sorted by key.
pub fn signature(auth_token: &str, url: &str, params: &[(String, String)]) -> Result<String> {
    let mac = signing_mac(auth_token, url, params)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Check a provided signature in constant time.
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    provided: &str,
) -> Result<()> {
    let expected = STANDARD
        .decode(provided.trim())
        .map_err(|_| Error::Signature("Signature is not valid base64".to_string()))?;

    signing_mac(auth_token, url, params)?
        .verify_slice(&expected)
        .map_err(|_| Error::Signature("Signature mismatch".to_string()))
}

/// Wrap a reply in a TwiML document.
pub fn twiml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        html_escape::encode_text(message)
    )
}

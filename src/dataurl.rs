//! `data:<mime>;base64,<payload>` at the application boundary.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:([^;,]+);base64,(.+)$").expect("data url"));

pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let caps = DATA_URL_RE.captures(url.trim()).ok_or(Error::InvalidDataUrl)?;
    let bytes = STANDARD
        .decode(caps[2].as_bytes())
        .map_err(|_| Error::InvalidDataUrl)?;
    Ok((caps[1].to_string(), bytes))
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

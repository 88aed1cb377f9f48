//! HTTP-Redirect Binding implementation.
//!
//! Messages are DEFLATE compressed, base64-encoded, and URL-encoded into the
//! query string. Signatures are detached and cover the raw query parameters
//! `SAMLRequest`, `RelayState` and `SigAlg` in that order.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{SamlError, SamlResult};
use crate::signature::XmlSigner;

use super::{
    DecodedMessage, DetachedSignature, SamlMessageType, MAX_DECOMPRESSED_SIZE,
    MAX_ENCODED_SIZE_REDIRECT,
};

/// HTTP-Redirect Binding handler.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a SAML request as a redirect URL.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request)
    }

    /// Encodes a SAML response as a redirect URL.
    pub fn encode_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Response)
    }

    /// Encodes a SAML message as a redirect URL.
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let encoded = Self::deflate_and_encode(xml)?;
        let mut query = format!(
            "{}={}",
            message_type.form_param(),
            urlencoding::encode(&encoded)
        );
        if let Some(rs) = relay_state {
            query.push_str("&RelayState=");
            query.push_str(&urlencoding::encode(rs));
        }
        Ok(append_query(destination, &query))
    }

    /// Encodes and signs a SAML message as a redirect URL.
    pub fn encode_signed(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
        signer: &XmlSigner,
    ) -> SamlResult<String> {
        let encoded = Self::deflate_and_encode(xml)?;
        let query = signer.sign_redirect_binding(
            &encoded,
            relay_state,
            message_type == SamlMessageType::Request,
        )?;
        Ok(append_query(destination, &query))
    }

    /// Deflates and base64-encodes a message, without URL encoding.
    pub fn deflate_and_encode(xml: &str) -> SamlResult<String> {
        Ok(STANDARD.encode(deflate_compress(xml.as_bytes())?))
    }

    /// Decodes a message from a raw (still URL-encoded) query string.
    ///
    /// When a `Signature` parameter is present, the signed octets are
    /// reconstructed from the parameters exactly as they were received.
    pub fn decode_query(raw_query: &str) -> SamlResult<DecodedMessage> {
        let params = parse_query(raw_query)?;

        let (raw_message, message_type) = match (
            params.raw("SAMLRequest"),
            params.raw("SAMLResponse"),
        ) {
            (Some(req), None) => (req, SamlMessageType::Request),
            (None, Some(resp)) => (resp, SamlMessageType::Response),
            (Some(_), Some(_)) => {
                return Err(SamlError::InvalidRequest(
                    "both SAMLRequest and SAMLResponse present".to_string(),
                ));
            }
            (None, None) => {
                return Err(SamlError::InvalidRequest(
                    "missing SAMLRequest or SAMLResponse parameter".to_string(),
                ));
            }
        };

        if raw_message.len() > MAX_ENCODED_SIZE_REDIRECT {
            return Err(SamlError::InvalidRequest(format!(
                "{} exceeds {MAX_ENCODED_SIZE_REDIRECT} bytes",
                message_type.form_param()
            )));
        }

        let encoded = url_decode(raw_message)?;
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let compressed = STANDARD.decode(compact)?;
        let inflated = deflate_decompress(&compressed)?;
        let xml = String::from_utf8(inflated)
            .map_err(|e| SamlError::Deflate(format!("message is not UTF-8: {e}")))?;

        let relay_state = params.raw("RelayState").map(url_decode).transpose()?;

        let detached_signature = match (params.raw("Signature"), params.raw("SigAlg")) {
            (Some(signature), Some(sig_alg)) => {
                let mut signed_octets =
                    format!("{}={raw_message}", message_type.form_param());
                if let Some(rs) = params.raw("RelayState") {
                    signed_octets.push_str("&RelayState=");
                    signed_octets.push_str(rs);
                }
                signed_octets.push_str("&SigAlg=");
                signed_octets.push_str(sig_alg);
                Some(DetachedSignature {
                    signed_octets,
                    signature: url_decode(signature)?,
                    sig_alg: url_decode(sig_alg)?,
                })
            }
            (None, None) => None,
            _ => {
                return Err(SamlError::InvalidRequest(
                    "Signature and SigAlg must be sent together".to_string(),
                ));
            }
        };

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state,
            detached_signature,
        })
    }
}

/// Raw query parameters, values left URL-encoded.
struct QueryParams<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> QueryParams<'a> {
    fn raw(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

fn parse_query(raw_query: &str) -> SamlResult<QueryParams<'_>> {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for part in raw_query.trim_start_matches('?').split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').unwrap_or((part, ""));
        if pairs.iter().any(|(k, _)| *k == key) {
            return Err(SamlError::InvalidRequest(format!(
                "duplicate query parameter '{key}'"
            )));
        }
        pairs.push((key, value));
    }
    Ok(QueryParams { pairs })
}

fn url_decode(value: &str) -> SamlResult<String> {
    urlencoding::decode(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| SamlError::Base64Decode(format!("invalid URL encoding: {e}")))
}

fn append_query(destination: &str, query: &str) -> String {
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{destination}{separator}{query}")
}

/// Compresses data using DEFLATE (raw, no zlib header).
pub fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("compression finish error: {e}")))
}

/// Decompresses raw DEFLATE data, refusing output beyond
/// [`MAX_DECOMPRESSED_SIZE`].
pub fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data).take(MAX_DECOMPRESSED_SIZE + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("decompression error: {e}")))?;
    if decompressed.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(SamlError::Deflate(format!(
            "inflated message exceeds {MAX_DECOMPRESSED_SIZE} bytes"
        )));
    }
    Ok(decompressed)
}

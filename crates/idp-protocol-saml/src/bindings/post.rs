//! HTTP-POST Binding implementation.
//!
//! The message is base64-encoded and delivered in a hidden form field of an
//! HTML page that submits itself to the destination.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{SamlError, SamlResult};

use super::{html_escape, DecodedMessage, SamlMessageType, MAX_ENCODED_SIZE_POST};

/// HTTP-POST Binding handler.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Encodes a SAML request as an auto-submitting HTML form.
    #[must_use]
    pub fn encode_request(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request)
    }

    /// Encodes a SAML response as an auto-submitting HTML form.
    #[must_use]
    pub fn encode_response(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::encode(xml, destination, relay_state, SamlMessageType::Response)
    }

    /// Encodes a SAML message as an auto-submitting HTML form.
    #[must_use]
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let encoded = STANDARD.encode(xml.as_bytes());
        let relay_state_input = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    html_escape(rs)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>SAML</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="post" action="{action}">
        <input type="hidden" name="{param}" value="{encoded}"/>
        {relay_state_input}
        <noscript>
            <button type="submit">Continue</button>
        </noscript>
    </form>
</body>
</html>"#,
            action = html_escape(destination),
            param = message_type.form_param(),
        )
    }

    /// Decodes a message received on the HTTP-POST binding.
    ///
    /// Exactly one of `saml_request` and `saml_response` is expected.
    /// Whitespace inside the base64 value is ignored.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = match (saml_request, saml_response) {
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

        if encoded.len() > MAX_ENCODED_SIZE_POST {
            return Err(SamlError::InvalidRequest(format!(
                "{} exceeds {MAX_ENCODED_SIZE_POST} bytes",
                message_type.form_param()
            )));
        }

        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD.decode(compact)?;
        let xml = String::from_utf8(bytes)
            .map_err(|e| SamlError::Base64Decode(format!("message is not UTF-8: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(str::to_string),
            detached_signature: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_value<'a>(html: &'a str, name: &str) -> &'a str {
        let marker = format!(r#"name="{name}" value=""#);
        let start = html.find(&marker).unwrap() + marker.len();
        let end = html[start..].find('"').unwrap();
        &html[start..start + end]
    }

    #[test]
    fn encode_and_decode_request() {
        let xml = r#"<samlp:AuthnRequest>test</samlp:AuthnRequest>"#;
        let html = HttpPostBinding::encode_request(xml, "https://idp.example.com", Some("state123"));

        assert!(html.contains(r#"action="https://idp.example.com""#));
        assert!(html.contains("document.forms[0].submit()"));

        let decoded = HttpPostBinding::decode(
            Some(form_value(&html, "SAMLRequest")),
            None,
            Some(form_value(&html, "RelayState")),
        )
        .unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Request);
        assert_eq!(decoded.relay_state.as_deref(), Some("state123"));
        assert!(decoded.detached_signature.is_none());
    }

    #[test]
    fn response_form_escapes_relay_state() {
        let html = HttpPostBinding::encode_response(
            "<samlp:Response/>",
            "https://sp.example.com/acs?a=1&b=2",
            Some(r#""><script>"#),
        );
        assert!(html.contains(r#"name="SAMLResponse""#));
        assert!(html.contains("https://sp.example.com/acs?a=1&amp;b=2"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains(r#"name="RelayState" value="">"#));
    }

    #[test]
    fn relay_state_is_omitted_when_absent() {
        let html = HttpPostBinding::encode_response("<samlp:Response/>", "https://sp", None);
        assert!(!html.contains("RelayState"));
    }

    #[test]
    fn decode_tolerates_line_breaks() {
        let encoded = STANDARD.encode("<samlp:AuthnRequest/>");
        let (a, b) = encoded.split_at(8);
        let decoded = HttpPostBinding::decode(Some(&format!("{a}\r\n{b}")), None, None).unwrap();
        assert_eq!(decoded.xml, "<samlp:AuthnRequest/>");
    }

    #[test]
    fn decode_failures() {
        assert!(matches!(
            HttpPostBinding::decode(None, None, None),
            Err(SamlError::InvalidRequest(_))
        ));
        assert!(matches!(
            HttpPostBinding::decode(Some("a"), Some("b"), None),
            Err(SamlError::InvalidRequest(_))
        ));

        let err = HttpPostBinding::decode(Some("!!not base64!!"), None, None).unwrap_err();
        assert!(err.is_decode_error());

        let oversized = "A".repeat(MAX_ENCODED_SIZE_POST + 4);
        assert!(matches!(
            HttpPostBinding::decode(Some(&oversized), None, None),
            Err(SamlError::InvalidRequest(_))
        ));
    }
}

//! AuthnRequest parsing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{attribute, local_name};
use crate::error::{SamlError, SamlResult};
use crate::types::{
    AuthnContextComparison, AuthnRequest, Extensions, NameIdPolicy, PrincipalSelectionHint,
    RequestedAttribute, RequestedAttributeSource, RequestedAuthnContext, SignMessage,
};

/// Maximum length of the request `ID` attribute.
pub const MAX_REQUEST_ID_LENGTH: usize = 256;

/// Maximum length of the `Issuer` element value.
pub const MAX_ISSUER_LENGTH: usize = 1024;

/// Text-bearing elements whose content is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    Issuer,
    ClassRef,
    MatchValue,
    Message,
}

/// Parses an `AuthnRequest` document.
///
/// Elements that are not understood are skipped. The returned request has
/// `has_signature` set when the document element carries a direct
/// `Signature` child.
pub fn parse_authn_request(xml: &str) -> SamlResult<AuthnRequest> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut request: Option<AuthnRequest> = None;
    let mut issuer: Option<String> = None;
    let mut path: Vec<String> = Vec::new();
    let mut text_target: Option<TextTarget> = None;
    let mut text = String::new();
    let mut match_name: Option<String> = None;
    let mut sign_message: Option<SignMessage> = None;
    let mut extensions = Extensions::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let local = local_name(&e)?;
                handle_open(
                    &e,
                    &local,
                    &path,
                    &mut request,
                    &mut extensions,
                    &mut sign_message,
                    &mut match_name,
                )?;
                text_target = text_target_for(&local, &path);
                text.clear();
                path.push(local);
            }
            Event::Empty(e) => {
                let local = local_name(&e)?;
                handle_open(
                    &e,
                    &local,
                    &path,
                    &mut request,
                    &mut extensions,
                    &mut sign_message,
                    &mut match_name,
                )?;
            }
            Event::Text(e) => {
                if text_target.is_some() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if text_target.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                path.pop();
                if let Some(target) = text_target.take() {
                    let value = std::mem::take(&mut text);
                    match target {
                        TextTarget::Issuer => issuer = Some(value.trim().to_string()),
                        TextTarget::ClassRef => {
                            if let Some(ctx) = request
                                .as_mut()
                                .and_then(|r| r.requested_authn_context.as_mut())
                            {
                                ctx.authn_context_class_refs.push(value.trim().to_string());
                            }
                        }
                        TextTarget::MatchValue => {
                            if let Some(name) = match_name.take() {
                                extensions
                                    .principal_selection
                                    .push(PrincipalSelectionHint::new(name, value.trim()));
                            }
                        }
                        TextTarget::Message => {
                            if let Some(sign_message) = sign_message.as_mut() {
                                sign_message.message = decode_sign_message(&value)?;
                            }
                        }
                    }
                }
            }
            Event::DocType(_) => {
                return Err(SamlError::XmlParse("DOCTYPE is not allowed".to_string()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut request =
        request.ok_or_else(|| SamlError::MissingElement("AuthnRequest".to_string()))?;

    let issuer = issuer
        .filter(|i| !i.is_empty())
        .ok_or_else(|| SamlError::MissingElement("Issuer".to_string()))?;
    if issuer.len() > MAX_ISSUER_LENGTH {
        return Err(SamlError::InvalidRequest(format!(
            "Issuer exceeds maximum length of {MAX_ISSUER_LENGTH} characters"
        )));
    }
    request.issuer = issuer;

    extensions.sign_message = sign_message;
    request.extensions = extensions;

    request.validate().map_err(SamlError::InvalidRequest)?;
    Ok(request)
}

fn handle_open(
    e: &BytesStart<'_>,
    local: &str,
    path: &[String],
    request: &mut Option<AuthnRequest>,
    extensions: &mut Extensions,
    sign_message: &mut Option<SignMessage>,
    match_name: &mut Option<String>,
) -> SamlResult<()> {
    let parent = path.last().map(String::as_str);
    let in_extensions = path.iter().any(|p| p == "Extensions");

    match (local, parent) {
        ("AuthnRequest", None) => *request = Some(parse_request_attributes(e)?),
        (_, None) => {
            return Err(SamlError::InvalidRequest(format!(
                "expected AuthnRequest, found {local}"
            )));
        }
        ("Signature", Some("AuthnRequest")) => {
            if let Some(request) = request.as_mut() {
                request.has_signature = true;
            }
        }
        ("NameIDPolicy", Some("AuthnRequest")) => {
            if let Some(request) = request.as_mut() {
                request.name_id_policy = Some(NameIdPolicy {
                    format: attribute(e, "Format")?,
                    sp_name_qualifier: attribute(e, "SPNameQualifier")?,
                    allow_create: parse_bool(attribute(e, "AllowCreate")?.as_deref())?,
                });
            }
        }
        ("RequestedAuthnContext", Some("AuthnRequest")) => {
            let comparison = match attribute(e, "Comparison")? {
                Some(value) => AuthnContextComparison::from_attr(&value).ok_or_else(|| {
                    SamlError::InvalidRequest(format!("invalid Comparison '{value}'"))
                })?,
                None => AuthnContextComparison::Exact,
            };
            if let Some(request) = request.as_mut() {
                request.requested_authn_context =
                    Some(RequestedAuthnContext::new().with_comparison(comparison));
            }
        }
        ("RequestedAttribute", _) if in_extensions => {
            let name = attribute(e, "Name")?
                .ok_or_else(|| SamlError::MissingElement("RequestedAttribute/@Name".to_string()))?;
            extensions.requested_attributes.push(RequestedAttribute {
                name,
                friendly_name: attribute(e, "FriendlyName")?,
                name_format: attribute(e, "NameFormat")?,
                is_required: parse_bool(attribute(e, "isRequired")?.as_deref())?,
                source: RequestedAttributeSource::RequestExtension,
            });
        }
        ("MatchValue", Some("PrincipalSelection")) if in_extensions => {
            *match_name = Some(
                attribute(e, "Name")?
                    .ok_or_else(|| SamlError::MissingElement("MatchValue/@Name".to_string()))?,
            );
        }
        ("SignMessage", _) if in_extensions => {
            *sign_message = Some(SignMessage {
                must_show: parse_bool(attribute(e, "MustShow")?.as_deref())?,
                mime_type: attribute(e, "MimeType")?,
                message: String::new(),
            });
        }
        _ => {}
    }
    Ok(())
}

fn text_target_for(local: &str, path: &[String]) -> Option<TextTarget> {
    let parent = path.last().map(String::as_str);
    match (local, parent) {
        ("Issuer", Some("AuthnRequest")) => Some(TextTarget::Issuer),
        ("AuthnContextClassRef", Some("RequestedAuthnContext")) => Some(TextTarget::ClassRef),
        ("MatchValue", Some("PrincipalSelection")) => Some(TextTarget::MatchValue),
        ("Message", Some("SignMessage")) => Some(TextTarget::Message),
        _ => None,
    }
}

fn parse_request_attributes(e: &BytesStart<'_>) -> SamlResult<AuthnRequest> {
    let id = attribute(e, "ID")?
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SamlError::MissingElement("AuthnRequest/@ID".to_string()))?;
    if id.len() > MAX_REQUEST_ID_LENGTH {
        return Err(SamlError::InvalidRequest(format!(
            "ID exceeds maximum length of {MAX_REQUEST_ID_LENGTH} characters"
        )));
    }

    let issue_instant = attribute(e, "IssueInstant")?
        .ok_or_else(|| SamlError::MissingElement("AuthnRequest/@IssueInstant".to_string()))?;
    let issue_instant = DateTime::parse_from_rfc3339(&issue_instant)
        .map_err(|e| SamlError::InvalidRequest(format!("invalid IssueInstant: {e}")))?
        .with_timezone(&Utc);

    let mut request = AuthnRequest::with_id(id, String::new()).issued_at(issue_instant);
    request.version = attribute(e, "Version")?
        .ok_or_else(|| SamlError::MissingElement("AuthnRequest/@Version".to_string()))?;
    request.destination = attribute(e, "Destination")?;
    request.assertion_consumer_service_url = attribute(e, "AssertionConsumerServiceURL")?;
    request.assertion_consumer_service_index =
        parse_index(attribute(e, "AssertionConsumerServiceIndex")?.as_deref())?;
    request.attribute_consuming_service_index =
        parse_index(attribute(e, "AttributeConsumingServiceIndex")?.as_deref())?;
    request.protocol_binding = attribute(e, "ProtocolBinding")?;
    request.provider_name = attribute(e, "ProviderName")?;
    request.force_authn = parse_bool(attribute(e, "ForceAuthn")?.as_deref())?;
    request.is_passive = parse_bool(attribute(e, "IsPassive")?.as_deref())?;
    Ok(request)
}

fn parse_bool(value: Option<&str>) -> SamlResult<bool> {
    match value.map(str::trim) {
        None => Ok(false),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(SamlError::InvalidRequest(format!(
            "invalid boolean value '{other}'"
        ))),
    }
}

fn parse_index(value: Option<&str>) -> SamlResult<Option<u32>> {
    value
        .map(|v| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| SamlError::InvalidRequest(format!("invalid index '{v}'")))
        })
        .transpose()
}

fn decode_sign_message(value: &str) -> SamlResult<String> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| SamlError::InvalidRequest(format!("invalid SignMessage encoding: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| SamlError::InvalidRequest(format!("invalid SignMessage text: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthnContextClass, NameIdFormat, SamlBinding};

    const REQUEST: &str = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    ID="_req1" Version="2.0" IssueInstant="2026-03-01T12:00:00Z"
    Destination="https://idp.example.com/saml/sso"
    AssertionConsumerServiceURL="https://sp.example.com/acs"
    ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST"
    ForceAuthn="true">
  <saml:Issuer>https://sp.example.com</saml:Issuer>
  <samlp:NameIDPolicy Format="urn:oasis:names:tc:SAML:2.0:nameid-format:persistent" AllowCreate="true"/>
  <samlp:RequestedAuthnContext Comparison="minimum">
    <saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef>
  </samlp:RequestedAuthnContext>
</samlp:AuthnRequest>"#;

    #[test]
    fn parses_core_fields() {
        let request = parse_authn_request(REQUEST).unwrap();
        assert_eq!(request.id, "_req1");
        assert_eq!(request.issuer, "https://sp.example.com");
        assert_eq!(
            request.issue_instant,
            "2026-03-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            request.assertion_consumer_service_url.as_deref(),
            Some("https://sp.example.com/acs")
        );
        assert_eq!(request.parsed_binding(), Some(SamlBinding::HttpPost));
        assert!(request.force_authn);
        assert!(!request.is_passive);
        assert!(!request.has_signature);

        let policy = request.name_id_policy.as_ref().unwrap();
        assert_eq!(policy.requested_format(), Some(NameIdFormat::Persistent.uri()));
        assert!(policy.allow_create);

        let ctx = request.requested_authn_context.as_ref().unwrap();
        assert_eq!(ctx.comparison, AuthnContextComparison::Minimum);
        assert_eq!(
            request.requested_class_refs(),
            [AuthnContextClass::PasswordProtectedTransport.uri()]
        );
    }

    #[test]
    fn parses_extensions() {
        let message = STANDARD.encode("I agree");
        let xml = format!(
            r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata"
    ID="_req2" Version="2.0" IssueInstant="2026-03-01T12:00:00Z" AssertionConsumerServiceIndex="2">
  <saml:Issuer>https://sp.example.com</saml:Issuer>
  <samlp:Extensions>
    <md:RequestedAttribute Name="urn:oid:0.9.2342.19200300.100.1.3" FriendlyName="mail" isRequired="true"/>
    <psc:PrincipalSelection xmlns:psc="http://id.swedenconnect.se/authn/1.0/principal-selection/ns">
      <psc:MatchValue Name="urn:oid:1.2.752.29.4.13">197705232382</psc:MatchValue>
    </psc:PrincipalSelection>
    <csig:SignMessage xmlns:csig="http://id.elegnamnden.se/csig/1.1/dss-ext/ns" MustShow="true" MimeType="text">
      <csig:Message>{message}</csig:Message>
    </csig:SignMessage>
    <other:Unknown xmlns:other="urn:example"/>
  </samlp:Extensions>
</samlp:AuthnRequest>"#
        );

        let request = parse_authn_request(&xml).unwrap();
        assert_eq!(request.assertion_consumer_service_index, Some(2));

        let ext = &request.extensions;
        assert_eq!(ext.requested_attributes.len(), 1);
        assert!(ext.requested_attributes[0].is_required);
        assert_eq!(ext.requested_attributes[0].friendly_name.as_deref(), Some("mail"));
        assert_eq!(
            ext.principal_selection,
            vec![PrincipalSelectionHint::new("urn:oid:1.2.752.29.4.13", "197705232382")]
        );
        let sign_message = ext.sign_message.as_ref().unwrap();
        assert!(sign_message.must_show);
        assert_eq!(sign_message.mime_type.as_deref(), Some("text"));
        assert_eq!(sign_message.message, "I agree");
    }

    #[test]
    fn detects_enveloped_signature() {
        let xml = REQUEST.replace(
            "</saml:Issuer>",
            r#"</saml:Issuer><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"/>"#,
        );
        assert!(parse_authn_request(&xml).unwrap().has_signature);
    }

    #[test]
    fn rejects_wrong_document_element() {
        let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_r"/>"#;
        assert!(matches!(
            parse_authn_request(xml),
            Err(SamlError::InvalidRequest(_))
        ));
    }

    #[test]
    fn rejects_missing_issuer_and_id() {
        let xml = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_r" Version="2.0" IssueInstant="2026-03-01T12:00:00Z"/>"#;
        assert!(matches!(
            parse_authn_request(xml),
            Err(SamlError::MissingElement(_))
        ));

        let xml = REQUEST.replace(r#"ID="_req1""#, "");
        assert!(matches!(
            parse_authn_request(&xml),
            Err(SamlError::MissingElement(_))
        ));
    }

    #[test]
    fn rejects_oversized_id() {
        let long_id = format!("_{}", "a".repeat(MAX_REQUEST_ID_LENGTH));
        let xml = REQUEST.replace("_req1", &long_id);
        assert!(matches!(
            parse_authn_request(&xml),
            Err(SamlError::InvalidRequest(_))
        ));
    }

    #[test]
    fn rejects_invalid_values() {
        let xml = REQUEST.replace(r#"ForceAuthn="true""#, r#"ForceAuthn="yes""#);
        assert!(parse_authn_request(&xml).is_err());

        let xml = REQUEST.replace("2026-03-01T12:00:00Z", "yesterday");
        assert!(parse_authn_request(&xml).is_err());

        assert!(parse_authn_request("<samlp:AuthnRequest").is_err());
    }
}

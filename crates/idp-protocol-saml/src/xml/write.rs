//! XML serialization of SAML messages.
//!
//! Messages are written as compact strings with one namespace declaration
//! per prefix on the outermost element that uses it. Every value that comes
//! from outside is escaped.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;

use crate::types::{
    Assertion, AuthnRequest, EncryptedAssertion, Response, ResponseAssertion, Status, StatusCode,
    MD_NS, SAMLP_NS, SAML_NS, XMLDSIG_NS, XMLENC11_NS, XMLENC_NS, XSI_NS, XS_NS,
};

const ENCRYPTED_ELEMENT_TYPE: &str = "http://www.w3.org/2001/04/xmlenc#Element";
const PRINCIPAL_SELECTION_NS: &str = "http://id.swedenconnect.se/authn/1.0/principal-selection/ns";
const SIGN_MESSAGE_NS: &str = "http://id.elegnamnden.se/csig/1.1/dss-ext/ns";

/// Formats a timestamp the way SAML messages carry them.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Serializes an assertion.
///
/// The `Issuer` is written as the first child so that an enveloped
/// signature can be placed directly after it.
#[must_use]
pub fn assertion_xml(assertion: &Assertion) -> String {
    let mut out = format!(
        r#"<saml:Assertion xmlns:saml="{SAML_NS}" xmlns:xs="{XS_NS}" xmlns:xsi="{XSI_NS}" ID="{}" IssueInstant="{}" Version="{}">"#,
        escape(&assertion.id),
        format_instant(assertion.issue_instant),
        escape(&assertion.version),
    );
    out.push_str(&format!(
        "<saml:Issuer>{}</saml:Issuer>",
        escape(&assertion.issuer)
    ));

    if let Some(subject) = &assertion.subject {
        out.push_str("<saml:Subject>");
        if let Some(name_id) = &subject.name_id {
            out.push_str("<saml:NameID");
            push_attr(&mut out, "Format", name_id.format.as_deref());
            push_attr(&mut out, "NameQualifier", name_id.name_qualifier.as_deref());
            push_attr(&mut out, "SPNameQualifier", name_id.sp_name_qualifier.as_deref());
            out.push_str(&format!(">{}</saml:NameID>", escape(&name_id.value)));
        }
        for confirmation in &subject.subject_confirmations {
            out.push_str(&format!(
                r#"<saml:SubjectConfirmation Method="{}">"#,
                escape(&confirmation.method)
            ));
            if let Some(data) = &confirmation.subject_confirmation_data {
                out.push_str("<saml:SubjectConfirmationData");
                push_attr(&mut out, "InResponseTo", data.in_response_to.as_deref());
                push_instant(&mut out, "NotBefore", data.not_before);
                push_instant(&mut out, "NotOnOrAfter", data.not_on_or_after);
                push_attr(&mut out, "Recipient", data.recipient.as_deref());
                push_attr(&mut out, "Address", data.address.as_deref());
                out.push_str("/>");
            }
            out.push_str("</saml:SubjectConfirmation>");
        }
        out.push_str("</saml:Subject>");
    }

    if let Some(conditions) = &assertion.conditions {
        out.push_str("<saml:Conditions");
        push_instant(&mut out, "NotBefore", conditions.not_before);
        push_instant(&mut out, "NotOnOrAfter", conditions.not_on_or_after);
        out.push('>');
        for restriction in &conditions.audience_restrictions {
            out.push_str("<saml:AudienceRestriction>");
            for audience in &restriction.audiences {
                out.push_str(&format!(
                    "<saml:Audience>{}</saml:Audience>",
                    escape(audience)
                ));
            }
            out.push_str("</saml:AudienceRestriction>");
        }
        out.push_str("</saml:Conditions>");
    }

    if let Some(statement) = &assertion.authn_statement {
        out.push_str("<saml:AuthnStatement");
        push_instant(&mut out, "AuthnInstant", Some(statement.authn_instant));
        push_attr(&mut out, "SessionIndex", statement.session_index.as_deref());
        push_instant(
            &mut out,
            "SessionNotOnOrAfter",
            statement.session_not_on_or_after,
        );
        out.push('>');
        if let Some(locality) = &statement.subject_locality {
            out.push_str("<saml:SubjectLocality");
            push_attr(&mut out, "Address", locality.address.as_deref());
            push_attr(&mut out, "DNSName", locality.dns_name.as_deref());
            out.push_str("/>");
        }
        out.push_str("<saml:AuthnContext>");
        let context = &statement.authn_context;
        if let Some(class_ref) = &context.authn_context_class_ref {
            out.push_str(&format!(
                "<saml:AuthnContextClassRef>{}</saml:AuthnContextClassRef>",
                escape(class_ref)
            ));
        }
        if let Some(decl_ref) = &context.authn_context_decl_ref {
            out.push_str(&format!(
                "<saml:AuthnContextDeclRef>{}</saml:AuthnContextDeclRef>",
                escape(decl_ref)
            ));
        }
        for authority in &context.authenticating_authorities {
            out.push_str(&format!(
                "<saml:AuthenticatingAuthority>{}</saml:AuthenticatingAuthority>",
                escape(authority)
            ));
        }
        out.push_str("</saml:AuthnContext></saml:AuthnStatement>");
    }

    if let Some(statement) = assertion
        .attribute_statement
        .as_ref()
        .filter(|s| !s.is_empty())
    {
        out.push_str("<saml:AttributeStatement>");
        for attribute in &statement.attributes {
            out.push_str("<saml:Attribute");
            push_attr(&mut out, "Name", Some(&attribute.name));
            push_attr(&mut out, "NameFormat", attribute.name_format.as_deref());
            push_attr(&mut out, "FriendlyName", attribute.friendly_name.as_deref());
            out.push('>');
            for value in &attribute.values {
                out.push_str(&format!(
                    r#"<saml:AttributeValue xsi:type="xs:string">{}</saml:AttributeValue>"#,
                    escape(value)
                ));
            }
            out.push_str("</saml:Attribute>");
        }
        out.push_str("</saml:AttributeStatement>");
    }

    out.push_str("</saml:Assertion>");
    out
}

/// Serializes an encrypted assertion.
#[must_use]
pub fn encrypted_assertion_xml(encrypted: &EncryptedAssertion) -> String {
    let data = &encrypted.encrypted_data;
    let mut out = format!(
        r#"<saml:EncryptedAssertion xmlns:saml="{SAML_NS}"><xenc:EncryptedData xmlns:xenc="{XMLENC_NS}" Type="{ENCRYPTED_ELEMENT_TYPE}">"#
    );
    if let Some(method) = &data.encryption_method {
        out.push_str(&format!(
            r#"<xenc:EncryptionMethod Algorithm="{}"/>"#,
            escape(method)
        ));
    }
    if let Some(key_info) = &data.key_info {
        out.push_str(&format!(r#"<ds:KeyInfo xmlns:ds="{XMLDSIG_NS}">"#));
        if let Some(name) = &key_info.key_name {
            out.push_str(&format!("<ds:KeyName>{}</ds:KeyName>", escape(name)));
        }
        if let Some(key) = &key_info.encrypted_key {
            out.push_str("<xenc:EncryptedKey>");
            if let Some(method) = &key.encryption_method {
                out.push_str(&format!(
                    r#"<xenc:EncryptionMethod Algorithm="{}">"#,
                    escape(method)
                ));
                if let Some(mgf) = &key.mgf {
                    out.push_str(&format!(
                        r#"<xenc11:MGF xmlns:xenc11="{XMLENC11_NS}" Algorithm="{}"/>"#,
                        escape(mgf)
                    ));
                }
                out.push_str("</xenc:EncryptionMethod>");
            }
            out.push_str(&format!(
                "<xenc:CipherData><xenc:CipherValue>{}</xenc:CipherValue></xenc:CipherData>",
                key.cipher_data.cipher_value
            ));
            out.push_str("</xenc:EncryptedKey>");
        }
        out.push_str("</ds:KeyInfo>");
    }
    out.push_str(&format!(
        "<xenc:CipherData><xenc:CipherValue>{}</xenc:CipherValue></xenc:CipherData>",
        data.cipher_data.cipher_value
    ));
    out.push_str("</xenc:EncryptedData></saml:EncryptedAssertion>");
    out
}

/// Serializes a status element.
#[must_use]
pub fn status_xml(status: &Status) -> String {
    let mut out = String::from("<samlp:Status>");
    push_status_code(&mut out, &status.status_code);
    if let Some(message) = &status.status_message {
        out.push_str(&format!(
            "<samlp:StatusMessage>{}</samlp:StatusMessage>",
            escape(message)
        ));
    }
    out.push_str("</samlp:Status>");
    out
}

/// Serializes a response, embedding its assertion if it has one.
#[must_use]
pub fn response_xml(response: &Response) -> String {
    let mut out = format!(
        r#"<samlp:Response xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{}""#,
        escape(&response.id)
    );
    push_attr(&mut out, "InResponseTo", response.in_response_to.as_deref());
    push_attr(&mut out, "Version", Some(&response.version));
    push_instant(&mut out, "IssueInstant", Some(response.issue_instant));
    push_attr(&mut out, "Destination", response.destination.as_deref());
    out.push('>');
    out.push_str(&format!(
        "<saml:Issuer>{}</saml:Issuer>",
        escape(&response.issuer)
    ));
    out.push_str(&status_xml(&response.status));
    match &response.assertion {
        Some(ResponseAssertion::Plain(issued)) => out.push_str(&issued.xml),
        Some(ResponseAssertion::Encrypted(encrypted)) => {
            out.push_str(&encrypted_assertion_xml(encrypted));
        }
        None => {}
    }
    out.push_str("</samlp:Response>");
    out
}

/// Serializes an authentication request.
///
/// The IdP never sends requests. This is the relying party's side, used by
/// clients and tests that drive the engine.
#[must_use]
pub fn authn_request_xml(request: &AuthnRequest) -> String {
    let mut out = format!(
        r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{}""#,
        escape(&request.id)
    );
    push_attr(&mut out, "Version", Some(&request.version));
    push_instant(&mut out, "IssueInstant", Some(request.issue_instant));
    push_attr(&mut out, "Destination", request.destination.as_deref());
    push_attr(
        &mut out,
        "AssertionConsumerServiceURL",
        request.assertion_consumer_service_url.as_deref(),
    );
    if let Some(index) = request.assertion_consumer_service_index {
        push_attr(&mut out, "AssertionConsumerServiceIndex", Some(&index.to_string()));
    }
    if let Some(index) = request.attribute_consuming_service_index {
        push_attr(&mut out, "AttributeConsumingServiceIndex", Some(&index.to_string()));
    }
    push_attr(&mut out, "ProtocolBinding", request.protocol_binding.as_deref());
    push_attr(&mut out, "ProviderName", request.provider_name.as_deref());
    if request.force_authn {
        out.push_str(r#" ForceAuthn="true""#);
    }
    if request.is_passive {
        out.push_str(r#" IsPassive="true""#);
    }
    out.push('>');
    out.push_str(&format!(
        "<saml:Issuer>{}</saml:Issuer>",
        escape(&request.issuer)
    ));

    let ext = &request.extensions;
    if !ext.is_empty() {
        out.push_str("<samlp:Extensions>");
        for attr in &ext.requested_attributes {
            out.push_str(&format!(r#"<md:RequestedAttribute xmlns:md="{MD_NS}""#));
            push_attr(&mut out, "Name", Some(&attr.name));
            push_attr(&mut out, "FriendlyName", attr.friendly_name.as_deref());
            push_attr(&mut out, "NameFormat", attr.name_format.as_deref());
            if attr.is_required {
                out.push_str(r#" isRequired="true""#);
            }
            out.push_str("/>");
        }
        if !ext.principal_selection.is_empty() {
            out.push_str(&format!(
                r#"<psc:PrincipalSelection xmlns:psc="{PRINCIPAL_SELECTION_NS}">"#
            ));
            for hint in &ext.principal_selection {
                out.push_str(&format!(
                    r#"<psc:MatchValue Name="{}">{}</psc:MatchValue>"#,
                    escape(&hint.name),
                    escape(&hint.value)
                ));
            }
            out.push_str("</psc:PrincipalSelection>");
        }
        if let Some(sign_message) = &ext.sign_message {
            out.push_str(&format!(r#"<csig:SignMessage xmlns:csig="{SIGN_MESSAGE_NS}""#));
            if sign_message.must_show {
                out.push_str(r#" MustShow="true""#);
            }
            push_attr(&mut out, "MimeType", sign_message.mime_type.as_deref());
            out.push_str(&format!(
                "><csig:Message>{}</csig:Message></csig:SignMessage>",
                STANDARD.encode(&sign_message.message)
            ));
        }
        out.push_str("</samlp:Extensions>");
    }

    if let Some(policy) = &request.name_id_policy {
        out.push_str("<samlp:NameIDPolicy");
        push_attr(&mut out, "Format", policy.format.as_deref());
        push_attr(&mut out, "SPNameQualifier", policy.sp_name_qualifier.as_deref());
        if policy.allow_create {
            out.push_str(r#" AllowCreate="true""#);
        }
        out.push_str("/>");
    }

    if let Some(context) = &request.requested_authn_context {
        out.push_str(&format!(
            r#"<samlp:RequestedAuthnContext Comparison="{}">"#,
            context.comparison.as_str()
        ));
        for class_ref in &context.authn_context_class_refs {
            out.push_str(&format!(
                "<saml:AuthnContextClassRef>{}</saml:AuthnContextClassRef>",
                escape(class_ref)
            ));
        }
        out.push_str("</samlp:RequestedAuthnContext>");
    }

    out.push_str("</samlp:AuthnRequest>");
    out
}

fn push_status_code(out: &mut String, code: &StatusCode) {
    out.push_str(&format!(
        r#"<samlp:StatusCode Value="{}""#,
        escape(&code.value)
    ));
    match &code.status_code {
        Some(sub) => {
            out.push('>');
            push_status_code(out, sub);
            out.push_str("</samlp:StatusCode>");
        }
        None => out.push_str("/>"),
    }
}

pub(crate) fn push_attr(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        out.push_str(&format!(r#" {name}="{}""#, escape(value)));
    }
}

fn push_instant(out: &mut String, name: &str, instant: Option<DateTime<Utc>>) {
    if let Some(instant) = instant {
        out.push_str(&format!(r#" {name}="{}""#, format_instant(instant)));
    }
}

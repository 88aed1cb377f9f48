//! Assertion issuance scenarios.

use std::sync::Arc;

use idp_crypto::AwsLcVerifier;
use idp_protocol_saml::error::{ErrorStatus, UnrecoverableKind};
use idp_protocol_saml::handler::Outcome;
use idp_protocol_saml::signature::XmlSignatureValidator;
use idp_protocol_saml::types::{status_codes, AuthnRequest};
use idp_protocol_saml::xml::parse_authn_request;

use crate::common::{request, PeerOptions, TestIdp, ACS, IDP};

#[tokio::test]
async fn signed_request_yields_unsigned_assertion() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;
    let outcome = idp.handler.handle(idp.signed_post(&request("_req-1"))?).await;

    let Outcome::Success { response, session } = &outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(response.destination, ACS);
    assert_eq!(response.relay_state.as_deref(), Some("relay-1"));
    assert_eq!(response.response.in_response_to.as_deref(), Some("_req-1"));
    assert!(session.is_some());

    let issued = response.response.plain_assertion().expect("plain assertion");
    assert!(!issued.signed);
    assert!(!issued.xml.contains("<ds:Signature"));

    let assertion = &issued.assertion;
    assert_eq!(assertion.issuer, IDP);
    let conditions = assertion.conditions.as_ref().expect("conditions");
    let not_before = conditions.not_before.expect("NotBefore");
    let not_on_or_after = conditions.not_on_or_after.expect("NotOnOrAfter");
    assert!(not_before < not_on_or_after);

    let subject = assertion.subject.as_ref().expect("subject");
    let data = subject.subject_confirmations[0]
        .subject_confirmation_data
        .as_ref()
        .expect("confirmation data");
    assert_eq!(data.in_response_to.as_deref(), Some("_req-1"));
    assert_eq!(data.recipient.as_deref(), Some(ACS));
    assert_eq!(data.not_on_or_after, Some(not_on_or_after));
    assert_eq!(data.address.as_deref(), Some("203.0.113.9"));

    let statement = assertion.attribute_statement.as_ref().expect("attributes");
    assert!(statement.get("mail").is_some());
    assert!(statement.get("displayName").is_some());
    assert!(statement.get("uid").is_none());
    Ok(())
}

#[tokio::test]
async fn signed_assertion_verifies_against_published_key() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions {
        want_assertions_signed: true,
        ..PeerOptions::default()
    })?;
    let outcome = idp.handler.handle(idp.signed_post(&request("_req-2"))?).await;
    let Outcome::Success { response, .. } = &outcome else {
        panic!("expected success, got {outcome:?}");
    };

    let published = idp.metadata.signing_key.clone().expect("published key");
    let validator = XmlSignatureValidator::new(Arc::new(AwsLcVerifier::new()));

    let issued = response.response.plain_assertion().expect("plain assertion");
    assert!(issued.signed);
    validator.validate(&issued.xml, &issued.assertion.id, &[published.clone()])?;
    validator.validate(&response.xml, &response.response.id, &[published])?;
    Ok(())
}

#[tokio::test]
async fn encrypted_assertion_decrypts_for_peer() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions {
        encrypt_assertions: true,
        ..PeerOptions::default()
    })?;
    let outcome = idp.handler.handle(idp.signed_post(&request("_req-3"))?).await;
    let Outcome::Success { response, .. } = &outcome else {
        panic!("expected success, got {outcome:?}");
    };

    assert!(response.response.plain_assertion().is_none());
    let encrypted = response.response.encrypted_assertion().expect("encrypted assertion");
    let plaintext = String::from_utf8(idp.decrypter.decrypt(&encrypted.to_payload()?)?)?;
    assert!(plaintext.contains(r#"InResponseTo="_req-3""#));
    Ok(())
}

#[tokio::test]
async fn unknown_destination_is_a_local_fault() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;
    let outcome = idp
        .handler
        .handle(idp.signed_post(&request("_req-4").with_acs_url("https://evil.example.com/acs"))?)
        .await;

    let Outcome::LocalFault(fault) = outcome else {
        panic!("expected a local fault, got {outcome:?}");
    };
    assert_eq!(fault.kind(), UnrecoverableKind::InvalidAssertionConsumerService);
    Ok(())
}

#[tokio::test]
async fn unsigned_request_is_rejected() -> anyhow::Result<()> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use idp_protocol_saml::request::RawAuthnRequest;
    use idp_protocol_saml::xml::authn_request_xml;

    let idp = TestIdp::start(PeerOptions::default())?;
    let raw = RawAuthnRequest::post(STANDARD.encode(authn_request_xml(&request("_req-5"))), None);
    let Outcome::LocalFault(fault) = idp.handler.handle(raw).await else {
        panic!("expected a local fault");
    };
    assert_eq!(fault.kind(), UnrecoverableKind::MissingAuthnRequestSignature);
    Ok(())
}

#[tokio::test]
async fn tampered_request_is_rejected() -> anyhow::Result<()> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use idp_protocol_saml::request::{InboundMessage, RawAuthnRequest};

    let idp = TestIdp::start(PeerOptions::default())?;
    let signed = idp.signed_post(&request("_req-6"))?;
    let InboundMessage::Post { saml_request, .. } = &signed.message else {
        panic!("expected a POST message");
    };
    let xml = String::from_utf8(STANDARD.decode(saml_request)?)?;
    let tampered = xml.replace(r#"ID="_req-6""#, r#"ID="_req-6" ForceAuthn="true""#);
    assert!(parse_authn_request(&tampered)?.force_authn);

    let raw = RawAuthnRequest::post(STANDARD.encode(tampered), None);
    let Outcome::LocalFault(fault) = idp.handler.handle(raw).await else {
        panic!("expected a local fault");
    };
    assert_eq!(fault.kind(), UnrecoverableKind::InvalidAuthnRequestSignature);
    Ok(())
}

#[tokio::test]
async fn unsupported_context_is_reported_to_peer() -> anyhow::Result<()> {
    use idp_protocol_saml::types::RequestedAuthnContext;

    let idp = TestIdp::start(PeerOptions::default())?;
    let request: AuthnRequest = request("_req-7").with_authn_context(
        RequestedAuthnContext::new().with_class_ref("http://id.elegnamnden.se/loa/1.0/loa4"),
    );
    let outcome = idp.handler.handle(idp.signed_post(&request)?).await;

    let Outcome::ErrorResponse { response, error } = outcome else {
        panic!("expected an error response, got {outcome:?}");
    };
    assert_eq!(error.status(), ErrorStatus::NoAuthnContext);
    assert_eq!(response.destination, ACS);
    assert_eq!(response.response.status.status_code.value, status_codes::REQUESTER);
    assert!(response.response.assertion.is_none());
    assert_eq!(response.response.issuer, IDP);
    Ok(())
}

//! NameID scenarios.

use idp_protocol_saml::error::ErrorStatus;
use idp_protocol_saml::handler::Outcome;
use idp_protocol_saml::types::{AuthnRequest, NameId, NameIdFormat, NameIdPolicy};

use crate::common::{request, PeerOptions, TestIdp, IDP, SP};

async fn name_id(idp: &TestIdp, request: &AuthnRequest) -> anyhow::Result<NameId> {
    let outcome = idp.handler.handle(idp.signed_post(request)?).await;
    let Outcome::Success { response, .. } = outcome else {
        anyhow::bail!("expected success, got {outcome:?}");
    };
    response
        .response
        .plain_assertion()
        .and_then(|issued| issued.assertion.subject.clone())
        .and_then(|subject| subject.name_id)
        .ok_or_else(|| anyhow::anyhow!("assertion without NameID"))
}

#[tokio::test]
async fn persistent_name_id_is_stable() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;

    let first = name_id(&idp, &request("_p1")).await?;
    let second = name_id(&idp, &request("_p2")).await?;

    assert_eq!(first.parsed_format(), NameIdFormat::Persistent);
    assert_eq!(first.value, second.value);
    assert_ne!(first.value, "alice");
    assert_eq!(first.name_qualifier.as_deref(), Some(IDP));
    assert_eq!(first.sp_name_qualifier.as_deref(), Some(SP));
    Ok(())
}

#[tokio::test]
async fn transient_name_id_changes() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;
    let policy = NameIdPolicy::with_format(NameIdFormat::Transient);

    let first = name_id(&idp, &request("_t1").with_name_id_policy(policy.clone())).await?;
    let second = name_id(&idp, &request("_t2").with_name_id_policy(policy)).await?;

    assert_eq!(first.parsed_format(), NameIdFormat::Transient);
    assert_ne!(first.value, second.value);
    Ok(())
}

#[tokio::test]
async fn email_name_id_uses_mail_attribute() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;
    let request = request("_e1").with_name_id_policy(NameIdPolicy::with_format(NameIdFormat::Email));

    let name_id = name_id(&idp, &request).await?;
    assert_eq!(name_id.value, "alice@example.com");
    Ok(())
}

#[tokio::test]
async fn unsupported_format_is_reported_to_peer() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;
    let policy = NameIdPolicy {
        format: Some("urn:oasis:names:tc:SAML:2.0:nameid-format:kerberos".to_string()),
        ..NameIdPolicy::new()
    };
    let outcome = idp
        .handler
        .handle(idp.signed_post(&request("_k1").with_name_id_policy(policy))?)
        .await;

    let Outcome::ErrorResponse { error, .. } = outcome else {
        anyhow::bail!("expected an error response, got {outcome:?}");
    };
    assert_eq!(error.status(), ErrorStatus::InvalidNameIdPolicy);
    Ok(())
}

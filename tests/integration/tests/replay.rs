//! Replay protection scenarios.

use futures::future::join_all;
use idp_protocol_saml::error::ErrorStatus;
use idp_protocol_saml::handler::Outcome;
use idp_protocol_saml::types::sub_status_codes;

use crate::common::{request, PeerOptions, TestIdp, ACS};

#[tokio::test]
async fn replayed_request_gets_error_response() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;
    let raw = idp.signed_post(&request("_replay-1"))?;

    let first = idp.handler.handle(raw.clone()).await;
    assert!(matches!(first, Outcome::Success { .. }));

    let second = idp.handler.handle(raw).await;
    let Outcome::ErrorResponse { response, error } = second else {
        anyhow::bail!("expected an error response, got {second:?}");
    };
    assert_eq!(error.status(), ErrorStatus::ReplayDetected);
    assert_eq!(response.destination, ACS);
    assert_eq!(response.response.in_response_to.as_deref(), Some("_replay-1"));
    assert_eq!(
        response.response.status.status_code.sub_status_value(),
        Some(sub_status_codes::REQUEST_DENIED)
    );
    assert!(response.response.assertion.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replays_yield_one_success() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;
    let raw = idp.signed_post(&request("_replay-2"))?;

    let tasks = (0..16).map(|_| {
        let handler = std::sync::Arc::clone(&idp.handler);
        let raw = raw.clone();
        tokio::spawn(async move { handler.handle(raw).await })
    });
    let outcomes = join_all(tasks)
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let successes = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Success { .. }))
        .count();
    let replays = outcomes
        .iter()
        .filter(|o| {
            matches!(o, Outcome::ErrorResponse { error, .. } if error.status() == ErrorStatus::ReplayDetected)
        })
        .count();
    assert_eq!(successes, 1);
    assert_eq!(replays, outcomes.len() - 1);
    Ok(())
}

#[tokio::test]
async fn stale_request_is_too_old() -> anyhow::Result<()> {
    let idp = TestIdp::start(PeerOptions::default())?;
    let stale = request("_old").issued_at(chrono::Utc::now() - chrono::Duration::hours(1));

    let outcome = idp.handler.handle(idp.signed_post(&stale)?).await;
    let Outcome::ErrorResponse { error, .. } = outcome else {
        anyhow::bail!("expected an error response, got {outcome:?}");
    };
    assert_eq!(error.status(), ErrorStatus::MessageTooOld);
    Ok(())
}

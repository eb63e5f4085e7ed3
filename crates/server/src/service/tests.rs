use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use impetus_proto::{
	Action, ActionId, Anchor, ClientMeta, InterventionRequest, Mode, RequestError,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::provider::{DebugProvider, Draft, LlmProvider, ProviderError};

fn request(context: &str, mode: Mode, cursor: Option<(usize, usize)>) -> InterventionRequest {
	InterventionRequest {
		context: context.to_owned(),
		mode,
		client_meta: cursor.map(|(selection_from, selection_to)| ClientMeta {
			doc_version: 1,
			selection_from,
			selection_to,
		}),
	}
}

fn long_context() -> String {
	"The corridor was empty. Nobody had walked here in years. The door creaks.".to_owned()
}

struct Fixed(Draft);

#[async_trait]
impl LlmProvider for Fixed {
	fn name(&self) -> &'static str {
		"fixed"
	}

	async fn draft(&self, _request: &InterventionRequest) -> Result<Draft, ProviderError> {
		Ok(self.0.clone())
	}
}

struct Failing;

#[async_trait]
impl LlmProvider for Failing {
	fn name(&self) -> &'static str {
		"failing"
	}

	async fn draft(&self, _request: &InterventionRequest) -> Result<Draft, ProviderError> {
		Err(ProviderError::Transport("connection reset".into()))
	}
}

struct Stalled;

#[async_trait]
impl LlmProvider for Stalled {
	fn name(&self) -> &'static str {
		"stalled"
	}

	async fn draft(&self, _request: &InterventionRequest) -> Result<Draft, ProviderError> {
		tokio::time::sleep(Duration::from_secs(3600)).await;
		Ok(Draft::provoke("too late"))
	}
}

fn service(draft: Draft) -> InterventionService {
	InterventionService::new(Arc::new(Fixed(draft)))
}

#[tokio::test]
async fn provoke_is_anchored_at_the_cursor() {
	let req = request(&long_context(), Mode::Chaos, Some((70, 73)));
	let command = service(Draft::provoke("> A knock.")).generate(&req).await.unwrap();

	assert_eq!(command.action, Action::Provoke);
	assert_eq!(command.content.as_deref(), Some("> A knock."));
	assert_eq!(command.anchor, Some(Anchor::pos(73)));
	assert_eq!(command.source, Mode::Chaos);
	assert!(command.validate().is_ok());
}

#[tokio::test]
async fn provoke_without_meta_goes_to_zero() {
	let req = request(&long_context(), Mode::Primary, None);
	let command = service(Draft::provoke("> Go.")).generate(&req).await.unwrap();
	assert_eq!(command.anchor, Some(Anchor::pos(0)));
}

#[tokio::test]
async fn chaos_delete_targets_the_last_sentence() {
	let context = long_context();
	let cursor = 1000;
	let req = request(&context, Mode::Chaos, Some((cursor, cursor)));
	let command = service(Draft::delete()).generate(&req).await.unwrap();

	let last = "The door creaks.".chars().count();
	assert_eq!(command.action, Action::Delete);
	assert_eq!(command.anchor, Some(Anchor::range(cursor - last, cursor)));
	assert_eq!(command.lock_id, None);
	assert!(command.validate().is_ok());
}

#[tokio::test]
async fn chaos_rewrite_keeps_provider_content() {
	let req = request(&long_context(), Mode::Chaos, Some((500, 500)));
	let command = service(Draft::rewrite("> It never opens."))
		.generate(&req)
		.await
		.unwrap();
	assert_eq!(command.action, Action::Rewrite);
	assert_eq!(command.content.as_deref(), Some("> It never opens."));
	assert!(matches!(command.anchor, Some(Anchor::Range { to: 500, .. })));
	assert!(command.lock_id.is_some());
}

#[tokio::test]
async fn short_context_delete_is_overridden() {
	let req = request("Too short.", Mode::Chaos, Some((4, 10)));
	let command = service(Draft::delete()).generate(&req).await.unwrap();

	assert_eq!(command.action, Action::Provoke);
	assert_eq!(command.content.as_deref(), Some(OVERRIDE_CONTENT));
	assert_eq!(command.anchor, Some(Anchor::pos(4)));
	assert!(command.lock_id.is_some());
}

#[tokio::test]
async fn threshold_boundary() {
	let at = "a".repeat(SAFETY_THRESHOLD_CHARS);
	let below = "a".repeat(SAFETY_THRESHOLD_CHARS - 1);

	let kept = service(Draft::delete())
		.generate(&request(&at, Mode::Chaos, Some((50, 50))))
		.await
		.unwrap();
	assert_eq!(kept.action, Action::Delete);

	let overridden = service(Draft::rewrite("x"))
		.generate(&request(&below, Mode::Chaos, Some((49, 49))))
		.await
		.unwrap();
	assert_eq!(overridden.action, Action::Provoke);
	assert_eq!(overridden.content.as_deref(), Some(OVERRIDE_CONTENT));
}

#[tokio::test]
async fn threshold_counts_characters_not_bytes() {
	let context = "门".repeat(30);
	assert!(context.len() >= SAFETY_THRESHOLD_CHARS);
	let command = service(Draft::delete())
		.generate(&request(&context, Mode::Chaos, Some((30, 30))))
		.await
		.unwrap();
	assert_eq!(command.action, Action::Provoke);
}

#[tokio::test]
async fn destructive_draft_at_document_start_becomes_provoke() {
	let req = request(&long_context(), Mode::Chaos, Some((0, 0)));
	let command = service(Draft::delete()).generate(&req).await.unwrap();
	assert_eq!(command.action, Action::Provoke);
	assert_eq!(command.anchor, Some(Anchor::pos(0)));
}

#[tokio::test]
async fn primary_mode_never_destroys() {
	let req = request(&long_context(), Mode::Primary, Some((80, 80)));

	let from_delete = service(Draft::delete()).generate(&req).await.unwrap();
	assert_eq!(from_delete.action, Action::Provoke);
	assert_eq!(from_delete.content.as_deref(), Some(PRIMARY_FALLBACK_CONTENT));
	assert_eq!(from_delete.anchor, Some(Anchor::pos(80)));

	let from_rewrite = service(Draft::rewrite("> Keep this."))
		.generate(&req)
		.await
		.unwrap();
	assert_eq!(from_rewrite.action, Action::Provoke);
	assert_eq!(from_rewrite.content.as_deref(), Some("> Keep this."));
}

#[tokio::test]
async fn ids_are_always_minted() {
	let req = request(&long_context(), Mode::Chaos, None);
	let service = InterventionService::new(Arc::new(DebugProvider::default()));
	let first = service.generate(&req).await.unwrap();
	let second = service.generate(&req).await.unwrap();

	assert!(first.action_id.as_str().starts_with(ActionId::PREFIX));
	assert!(first.lock_id.as_ref().unwrap().as_str().starts_with("lock_"));
	assert_ne!(first.action_id, second.action_id);
	assert_ne!(first.lock_id, second.lock_id);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_the_provider() {
	let service = InterventionService::new(Arc::new(Failing));
	let err = service
		.generate(&request(&long_context(), Mode::Chaos, Some((9, 3))))
		.await
		.unwrap_err();
	assert_eq!(
		err,
		ServiceError::Request(RequestError::InvertedSelection { from: 9, to: 3 })
	);
	assert!(!err.is_retryable());
}

#[tokio::test]
async fn provider_failure_is_retryable() {
	let service = InterventionService::new(Arc::new(Failing));
	let err = service
		.generate(&request(&long_context(), Mode::Chaos, None))
		.await
		.unwrap_err();
	assert!(matches!(err, ServiceError::Provider(ProviderError::Transport(_))));
	assert!(err.is_retryable());
}

#[tokio::test]
async fn malformed_draft_is_a_provider_error() {
	let draft = Draft {
		action: Action::Provoke,
		content: None,
	};
	let err = service(draft)
		.generate(&request(&long_context(), Mode::Chaos, None))
		.await
		.unwrap_err();
	assert!(matches!(err, ServiceError::Provider(ProviderError::Malformed(_))));
}

#[tokio::test(start_paused = true)]
async fn provider_call_is_bounded() {
	let service = InterventionService::new(Arc::new(Stalled)).with_timeout(Duration::from_secs(20));
	let err = service
		.generate(&request(&long_context(), Mode::Chaos, None))
		.await
		.unwrap_err();
	assert_eq!(
		err,
		ServiceError::Provider(ProviderError::Timeout(Duration::from_secs(20)))
	);
	assert_eq!(service.provider_name(), "stalled");
}

#[tokio::test(start_paused = true)]
async fn every_provider_call_is_counted() {
	let service = InterventionService::new(Arc::new(Stalled)).with_timeout(Duration::from_secs(5));
	let req = request(&long_context(), Mode::Chaos, None);
	assert!(service.generate(&req).await.is_err());
	service.generate_with(&Fixed(Draft::delete()), &req).await.unwrap();
	service
		.generate_with(&Failing, &request(&long_context(), Mode::Primary, None))
		.await
		.unwrap_err();

	let stats = service.metrics().snapshot();
	let find = |provider: &str| stats.iter().find(|s| s.provider == provider).unwrap();
	assert_eq!(stats.len(), 3);
	assert_eq!((find("stalled").calls_total, find("stalled").failures_total), (1, 1));
	assert!(find("stalled").latency_us_sum >= 5_000_000);
	assert_eq!((find("fixed").mode, find("fixed").failures_total), ("chaos", 0));
	assert_eq!((find("failing").mode, find("failing").failures_total), ("primary", 1));
}

#[tokio::test]
async fn invalid_requests_never_reach_the_metrics() {
	let service = service(Draft::provoke("> x"));
	let err = service
		.generate(&request("", Mode::Chaos, None))
		.await
		.unwrap_err();
	assert!(matches!(err, ServiceError::Request(_)));
	assert!(service.metrics().snapshot().is_empty());
}

#[tokio::test]
async fn generate_with_uses_the_given_provider() {
	let service = service(Draft::provoke("> default"));
	let req = request(&long_context(), Mode::Chaos, Some((73, 73)));
	let command = service
		.generate_with(&Fixed(Draft::rewrite("> chosen")), &req)
		.await
		.unwrap();
	assert_eq!(command.action, Action::Rewrite);
	assert_eq!(command.content.as_deref(), Some("> chosen"));
	assert_eq!(service.provider_name(), "fixed");
}

fn arb_draft() -> impl Strategy<Value = Draft> {
	prop_oneof![
		"[a-z]{1,20}".prop_map(Draft::provoke),
		"[a-z ]{1,20}".prop_map(|c| Draft::rewrite(format!("> {c}"))),
		Just(Draft::delete()),
	]
}

proptest! {
	#[test]
	fn primary_mode_always_provokes(
		context in "[a-zA-Z .!?\n]{1,300}",
		draft in arb_draft(),
		from in 0usize..500,
		extra in 0usize..50,
	) {
		let req = request(&context, Mode::Primary, Some((from, from + extra)));
		let command = decide(&req, draft);
		prop_assert_eq!(command.action, Action::Provoke);
		prop_assert!(command.lock_id.is_some());
		prop_assert!(command.validate().is_ok());
	}

	#[test]
	fn short_chaos_context_never_destroys(
		context in "[a-z .]{1,49}",
		draft in arb_draft(),
		cursor in 0usize..500,
	) {
		let req = request(&context, Mode::Chaos, Some((cursor, cursor)));
		let command = decide(&req, draft);
		prop_assert_eq!(command.action, Action::Provoke);
		prop_assert!(command.validate().is_ok());
	}

	#[test]
	fn destructive_anchors_end_at_the_cursor(
		context in "[a-z .!?]{50,400}",
		cursor in 1usize..2000,
	) {
		let req = request(&context, Mode::Chaos, Some((cursor, cursor)));
		let command = decide(&req, Draft::delete());
		match command.anchor {
			Some(Anchor::Range { from, to }) => {
				prop_assert_eq!(to, cursor);
				prop_assert!(from < to);
				prop_assert!(to - from <= text_window::SENTENCE_MAX_CHARS);
			}
			other => prop_assert!(false, "unexpected anchor {:?}", other),
		}
	}
}

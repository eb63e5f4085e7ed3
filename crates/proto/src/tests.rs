use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

use super::*;

#[test]
fn anchor_wire_shapes() {
	assert_eq!(
		serde_json::to_value(Anchor::pos(12)).unwrap(),
		json!({"type": "pos", "from": 12})
	);
	assert_eq!(
		serde_json::to_value(Anchor::range(3, 9)).unwrap(),
		json!({"type": "range", "from": 3, "to": 9})
	);
	assert_eq!(
		serde_json::to_value(Anchor::lock("lock_a")).unwrap(),
		json!({"type": "lock_id", "ref_lock_id": "lock_a"})
	);
}

#[test]
fn anchor_accepts_camel_case_lock_ref() {
	let anchor: Anchor = serde_json::from_value(json!({"type": "lock_id", "refLockId": "L1"})).unwrap();
	assert_eq!(anchor, Anchor::lock("L1"));
}

#[test]
fn anchor_rejects_negative_offsets() {
	let parsed = serde_json::from_value::<Anchor>(json!({"type": "pos", "from": -1}));
	assert!(parsed.is_err());
}

#[test]
fn minted_commands_are_valid() {
	let provoke = MutationCommand::provoke("> keep going", None, Source::Primary);
	assert!(provoke.validate().is_ok());
	assert!(provoke.action_id.as_str().starts_with(ActionId::PREFIX));
	assert!(provoke.lock_id.as_ref().is_some_and(|id| id.as_str().starts_with(LockId::PREFIX)));

	let rewrite = MutationCommand::rewrite("new text", Anchor::range(0, 4), Source::Chaos);
	assert!(rewrite.validate().is_ok());

	let delete = MutationCommand::delete(Anchor::range(0, 4), Source::Chaos);
	assert!(delete.validate().is_ok());
	assert_eq!(delete.lock_id, None);
}

#[test]
fn destructive_commands_need_a_span_anchor() {
	let mut delete = MutationCommand::delete(Anchor::range(0, 4), Source::Chaos);
	delete.anchor = None;
	assert_eq!(
		delete.validate(),
		Err(CommandError::MissingAnchor { action: Action::Delete })
	);

	delete.anchor = Some(Anchor::pos(3));
	assert_eq!(
		delete.validate(),
		Err(CommandError::PositionAnchor { action: Action::Delete })
	);

	delete.anchor = Some(Anchor::lock("L1"));
	assert!(delete.validate().is_ok());
}

#[test]
fn lock_creating_commands_need_content_and_lock() {
	let mut provoke = MutationCommand::provoke("   ", None, Source::Primary);
	assert_eq!(
		provoke.validate(),
		Err(CommandError::MissingContent { action: Action::Provoke })
	);

	provoke.content = Some("text".into());
	provoke.lock_id = None;
	assert_eq!(
		provoke.validate(),
		Err(CommandError::MissingLockId { action: Action::Provoke })
	);
}

#[test]
fn delete_never_carries_a_lock() {
	let mut delete = MutationCommand::delete(Anchor::range(0, 4), Source::Chaos);
	delete.lock_id = Some(LockId::mint());
	assert_eq!(delete.validate(), Err(CommandError::UnexpectedLockId));
}

#[test]
fn command_serializes_snake_case_and_skips_absent_fields() {
	let delete = MutationCommand::delete(Anchor::range(1, 2), Source::Chaos);
	let value = serde_json::to_value(&delete).unwrap();
	assert_eq!(value["action"], "delete");
	assert_eq!(value["source"], "chaos");
	assert!(value.get("content").is_none());
	assert!(value.get("lock_id").is_none());
	assert!(value["action_id"].as_str().is_some());
	assert!(value["issued_at"].as_str().is_some());

	let back: MutationCommand = serde_json::from_value(value).unwrap();
	assert_eq!(back, delete);
}

#[test]
fn request_accepts_both_casings() {
	let snake: InterventionRequest = serde_json::from_value(json!({
		"context": "abc",
		"mode": "chaos",
		"client_meta": {"doc_version": 1, "selection_from": 2, "selection_to": 3}
	}))
	.unwrap();
	let camel: InterventionRequest = serde_json::from_value(json!({
		"context": "abc",
		"mode": "chaos",
		"clientMeta": {"docVersion": 1, "selectionFrom": 2, "selectionTo": 3}
	}))
	.unwrap();
	assert_eq!(snake, camel);
	assert_eq!(snake.cursor(), 3);
	assert_eq!(snake.selection_from(), 2);
}

#[test]
fn request_without_meta_uses_origin_cursor() {
	let request: InterventionRequest =
		serde_json::from_value(json!({"context": "abc", "mode": "primary"})).unwrap();
	assert_eq!(request.cursor(), 0);
	assert!(request.validate().is_ok());
}

#[test]
fn request_rejects_unknown_mode() {
	let parsed = serde_json::from_value::<InterventionRequest>(json!({"context": "a", "mode": "wild"}));
	assert!(parsed.is_err());
}

#[test]
fn request_validation() {
	let mut request = InterventionRequest {
		context: String::new(),
		mode: Mode::Chaos,
		client_meta: None,
	};
	assert_eq!(request.validate(), Err(RequestError::EmptyContext));

	request.context = "字".repeat(CONTEXT_MAX_CHARS);
	assert!(request.validate().is_ok());
	request.context.push('字');
	assert_eq!(
		request.validate(),
		Err(RequestError::ContextTooLong {
			len: CONTEXT_MAX_CHARS + 1
		})
	);

	request.context = "ok".into();
	request.client_meta = Some(ClientMeta {
		doc_version: 0,
		selection_from: 5,
		selection_to: 4,
	});
	let err = request.validate().unwrap_err();
	assert!(!err.is_schema());
}

#[test]
fn contract_versions_parse_and_order() {
	assert_eq!("2.0".parse::<ContractVersion>().unwrap(), ContractVersion::new(2, 0, 0));
	assert_eq!("1.4.2".parse::<ContractVersion>().unwrap(), ContractVersion::new(1, 4, 2));
	assert!(ContractVersion::new(1, 9, 9) < ContractVersion::CURRENT);
	assert!(ContractVersion::new(2, 0, 1) > ContractVersion::CURRENT);
	assert_eq!(ContractVersion::CURRENT.to_string(), "2.0.0");
}

#[test]
fn contract_version_rejects_garbage() {
	for bad in ["", "2", "2.", "a.b", "1.2.3.4", "+1.2", "1.-2"] {
		assert!(bad.parse::<ContractVersion>().is_err(), "{bad} should not parse");
	}
}

#[test]
fn contract_version_serializes_as_dotted_string() {
	let json = serde_json::to_value(ContractVersion::new(1, 2, 0)).unwrap();
	assert_eq!(json, json!("1.2.0"));
	let parsed: ContractVersion = serde_json::from_value(json!("3.1")).unwrap();
	assert_eq!(parsed, ContractVersion::new(3, 1, 0));
	assert!(serde_json::from_value::<ContractVersion>(json!("three")).is_err());
}

proptest! {
	#[test]
	fn contract_version_order_is_lexicographic(a in (0u32..5, 0u32..5, 0u32..5), b in (0u32..5, 0u32..5, 0u32..5)) {
		let va = ContractVersion::new(a.0, a.1, a.2);
		let vb = ContractVersion::new(b.0, b.1, b.2);
		prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
	}
}

//! Property: two observations that differ only in kubectl-managed
//! annotations, unstable label keys, default-vs-explicit-default spec
//! fields, or dict insertion order produce byte-equal `AgentObserved`
//! payloads (spec.md P6).

use proptest::prelude::*;
use rynxs_adapter::{DeterministicClock, EngineAdapter};
use serde_json::{json, Value};

fn arb_role() -> impl Strategy<Value = String> {
    prop_oneof![Just("worker"), Just("director"), Just("manager")].prop_map(String::from)
}

proptest! {
    /// Explicit defaults and absent fields hash identically.
    #[test]
    fn default_fields_are_indistinguishable_from_absent(role in arb_role(), can_assign in any::<bool>()) {
        let mut a = EngineAdapter::new(DeterministicClock::new());
        let mut b = EngineAdapter::new(DeterministicClock::new());

        let explicit = json!({
            "role": role,
            "permissions": {"canAssignTasks": can_assign, "canAccessAuditLogs": false, "canManageTeam": false},
            "image": {"repository": "ghcr.io/test/agent", "tag": "latest", "verify": false},
            "workspace": {"size": "1Gi"},
        });
        let minimal = json!({
            "role": role,
            "permissions": {"canAssignTasks": can_assign},
            "image": {"repository": "ghcr.io/test/agent"},
        });

        let e1 = a.observe_agent("agent-1", "ns", &explicit, None, None).unwrap();
        let e2 = b.observe_agent("agent-1", "ns", &minimal, None, None).unwrap();

        prop_assert_eq!(&e1.payload["spec"], &e2.payload["spec"]);
        prop_assert_eq!(e1.payload["spec_hash"].clone(), e2.payload["spec_hash"].clone());
    }

    /// Labels outside the stable allowlist, and kubectl-managed annotation
    /// prefixes, never change the emitted payload.
    #[test]
    fn unstable_labels_and_blocked_annotations_never_affect_payload(
        noise_label in "[a-z]{3,10}",
        noise_value in "[a-z]{1,10}",
    ) {
        prop_assume!(!["app", "team", "policy", "role", "network-policy"].contains(&noise_label.as_str()));

        let mut a = EngineAdapter::new(DeterministicClock::new());
        let mut b = EngineAdapter::new(DeterministicClock::new());

        let e1 = a
            .observe_agent("agent-1", "ns", &json!({}), None, None)
            .unwrap();
        let e2 = b
            .observe_agent(
                "agent-1",
                "ns",
                &json!({}),
                Some(&json!({ noise_label.clone(): noise_value.clone() })),
                Some(&json!({
                    "kubectl.kubernetes.io/last-applied-configuration": "{}",
                    format!("deployment.kubernetes.io/{}", noise_label): noise_value,
                })),
            )
            .unwrap();

        prop_assert_eq!(&e1.payload["labels"], &e2.payload["labels"]);
        prop_assert_eq!(&e1.payload["annotations"], &e2.payload["annotations"]);
        prop_assert_eq!(e1.payload["spec_hash"].clone(), e2.payload["spec_hash"].clone());
    }

    /// Dict insertion order inside the spec never changes the spec_hash.
    #[test]
    fn spec_field_order_never_affects_hash(role in arb_role(), tag in "[a-z0-9.]{1,8}") {
        let mut a = EngineAdapter::new(DeterministicClock::new());
        let mut b = EngineAdapter::new(DeterministicClock::new());

        let forward: Value = json!({"role": role, "image": {"repository": "r", "tag": tag}});
        let reversed: Value = json!({"image": {"tag": tag, "repository": "r"}, "role": role});

        let e1 = a.observe_agent("agent-1", "ns", &forward, None, None).unwrap();
        let e2 = b.observe_agent("agent-1", "ns", &reversed, None, None).unwrap();

        prop_assert_eq!(e1.payload["spec_hash"].clone(), e2.payload["spec_hash"].clone());
    }
}

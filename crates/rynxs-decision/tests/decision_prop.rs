//! Property: `DecisionLayer::decide` is pure and its output is canonically
//! sorted (spec.md P5).

use proptest::prelude::*;
use rynxs_decision::DecisionLayer;
use rynxs_events::Event;
use rynxs_reducer::State;
use serde_json::json;

fn arb_spec() -> impl Strategy<Value = serde_json::Value> {
    (
        prop_oneof![Just("worker"), Just("director"), Just("manager")],
        any::<bool>(),
        "[a-z0-9]{1,6}",
        prop_oneof![Just("1Gi"), Just("5Gi"), Just("100Mi")],
    )
        .prop_map(|(role, can_assign, tag, size)| {
            json!({
                "role": role,
                "permissions": {"canAssignTasks": can_assign},
                "image": {"repository": "ghcr.io/test/agent", "tag": tag},
                "workspace": {"size": size},
            })
        })
}

fn observed(name: &str, namespace: &str, spec: serde_json::Value) -> Event {
    Event::new(
        "AgentObserved",
        format!("{namespace}/{name}"),
        0,
        json!({"name": name, "namespace": namespace, "spec": spec}),
    )
    .with_seq(1)
}

proptest! {
    /// Calling `decide` repeatedly on the same `(state, event)` pair always
    /// returns the same canonical action list.
    #[test]
    fn decide_is_repeatable(spec in arb_spec()) {
        let layer = DecisionLayer::new();
        let event = observed("agent-1", "ns", spec);
        let state = State::initial();

        let first = layer.decide(&state, &event);
        for _ in 0..10 {
            prop_assert_eq!(layer.decide(&state, &event), first.clone());
        }
    }

    /// The returned action list is already sorted by (action_type, target,
    /// canonical params) — the ordering invariant that makes the actions
    /// byte-equal across independent implementations.
    #[test]
    fn decide_output_is_canonically_sorted(spec in arb_spec()) {
        let layer = DecisionLayer::new();
        let event = observed("agent-1", "ns", spec);
        let actions = layer.decide(&State::initial(), &event);

        let mut keys: Vec<(String, String, String)> = actions
            .iter()
            .map(|a| {
                let params = rynxs_types::canonical::canonical_string(
                    &rynxs_types::canonical::canonicalize(&a.params).unwrap(),
                )
                .unwrap();
                (a.action_type.clone(), a.target.clone(), params)
            })
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(keys.clone(), sorted.clone());
        keys.dedup();
        prop_assert_eq!(keys.len(), sorted.len());
    }

    /// A fresh `State` for a different, unrelated aggregate never changes
    /// the decision for this event: the built-in AgentObserved decision is
    /// a pure function of the event alone.
    #[test]
    fn decide_ignores_unrelated_state(spec in arb_spec(), other_name in "[a-z]{1,6}") {
        let layer = DecisionLayer::new();
        let event = observed("agent-1", "ns", spec);

        let empty = State::initial();
        let polluted = empty.with_agg(&format!("ns/{other_name}"), json!({"noise": true}));

        prop_assert_eq!(layer.decide(&empty, &event), layer.decide(&polluted, &event));
    }
}

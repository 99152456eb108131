//! Matcher behavior against a populated store

use std::sync::Arc;

use ops5_engine::{Condition, Matcher, Pattern, Rule, WorkerPool};
use ops5_foundation::Value;
use ops5_memory::{FactStore, Template};
use proptest::prelude::*;

fn store(points: &[(i64, i64)]) -> FactStore {
    let mut store = FactStore::new();
    store.register_template(Template::new("point").with_absent("x").with_absent("y"));
    for &(x, y) in points {
        store
            .make("point", &[("x", Value::from(x)), ("y", Value::from(y))])
            .unwrap();
    }
    store.drain();
    store
}

/// Two points sharing an x coordinate.
fn same_x() -> Arc<Rule> {
    Arc::new(
        Rule::new("same-x")
            .when(Condition::new("point").with("x", Pattern::var("$x")))
            .when(Condition::new("point").with("x", Pattern::var("$x"))),
    )
}

#[test]
fn three_way_join_backtracks_through_two_levels() {
    // Chain (0,1) -> (1,2) -> (2,3); decoys make greedy choices fail.
    let store = store(&[(0, 9), (0, 1), (1, 8), (1, 2), (2, 3)]);
    let rule = Arc::new(
        Rule::new("chain")
            .when(Condition::new("point").with("x", Pattern::lit(0)).with("y", Pattern::var("$a")))
            .when(Condition::new("point").with("x", Pattern::var("$a")).with("y", Pattern::var("$b")))
            .when(Condition::new("point").with("x", Pattern::var("$b"))),
    );

    let m = Matcher::default().match_rule(&rule, &store.snapshot()).unwrap();
    assert_eq!(m.bindings.get("$a"), Some(&Value::from(1)));
    assert_eq!(m.bindings.get("$b"), Some(&Value::from(2)));
    assert_eq!(m.facts[2].get("y"), Value::from(3));
}

#[test]
fn absent_marker_excludes_set_fields() {
    let mut store = FactStore::new();
    store.register_template(Template::new("task").with_absent("owner").with_absent("name"));
    store.make("task", &[("owner", Value::from("ann")), ("name", Value::from("a"))]).unwrap();
    store.make("task", &[("name", Value::from("b"))]).unwrap();
    store.drain();

    let rule = Arc::new(
        Rule::new("unowned").when(
            Condition::new("task")
                .with("owner", Pattern::Absent)
                .with("name", Pattern::var("$n")),
        ),
    );
    let m = Matcher::default().match_rule(&rule, &store.snapshot()).unwrap();
    assert_eq!(m.bindings.get("$n"), Some(&Value::from("b")));
}

#[test]
fn matching_does_not_mutate_store() {
    let store = store(&[(1, 1), (1, 2)]);
    let before: Vec<_> = store.get("point").iter().map(|f| f.fields()).collect();
    let _ = Matcher::default().match_rule(&same_x(), &store.snapshot());
    let after: Vec<_> = store.get("point").iter().map(|f| f.fields()).collect();
    assert_eq!(before, after);
    assert_eq!(store.len(), 2);
}

#[test]
fn pooled_and_sequential_agree() {
    let store = store(&[(1, 1), (2, 2), (2, 3), (4, 4)]);
    let rules: Vec<_> = (0..6)
        .map(|i| {
            Arc::new(
                Rule::new(format!("x{i}"))
                    .when(Condition::new("point").with("x", Pattern::lit(i)))
                    .when(Condition::new("point").with("x", Pattern::lit(i))),
            )
        })
        .collect();
    let pool = WorkerPool::new("agree", 3).unwrap();
    let snapshot = store.snapshot();

    let seq: Vec<_> = Matcher::default()
        .match_all(&rules, &snapshot, None)
        .into_iter()
        .map(|m| m.rule.name().to_string())
        .collect();
    let par: Vec<_> = Matcher::default()
        .match_all(&rules, &snapshot, Some(&pool))
        .into_iter()
        .map(|m| m.rule.name().to_string())
        .collect();
    assert_eq!(seq, vec!["x2"]);
    assert_eq!(seq, par);
}

proptest! {
    #[test]
    fn shared_variable_needs_two_distinct_facts(xs in prop::collection::vec(0i64..5, 0..8)) {
        let points: Vec<_> = xs.iter().map(|&x| (x, 0)).collect();
        let store = store(&points);
        let found = Matcher::default().match_rule(&same_x(), &store.snapshot());

        let has_duplicate = xs.iter().enumerate().any(|(i, x)| xs[i + 1..].contains(x));
        prop_assert_eq!(found.is_some(), has_duplicate);
        if let Some(m) = found {
            prop_assert_ne!(m.facts[0].id(), m.facts[1].id());
            prop_assert_eq!(m.facts[0].get("x"), m.facts[1].get("x"));
        }
    }

    #[test]
    fn bindings_agree_with_matched_facts(points in prop::collection::vec((0i64..4, 0i64..4), 0..8)) {
        let store = store(&points);
        let rule = Arc::new(
            Rule::new("step")
                .when(Condition::new("point").with("x", Pattern::var("$a")).with("y", Pattern::var("$b")))
                .when(Condition::new("point").with("x", Pattern::var("$b"))),
        );
        if let Some(m) = Matcher::default().match_rule(&rule, &store.snapshot()) {
            prop_assert_eq!(m.bindings.get("$a").cloned(), Some(m.facts[0].get("x")));
            prop_assert_eq!(m.bindings.get("$b").cloned(), Some(m.facts[0].get("y")));
            prop_assert_eq!(m.facts[1].get("x"), m.facts[0].get("y"));
        }
    }
}

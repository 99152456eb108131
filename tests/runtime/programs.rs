use std::sync::Arc;

use ops5_engine::RunOutcome;
use ops5_foundation::Value;
use ops5_runtime::{load_file, load_str};
use ops5_stdlib::{Async, MakeCommand};
use serde_json::json;

use crate::{demo, engine, registry};

#[test]
fn grandparents_demo_runs_to_quiescence() {
    let (registry, write) = registry();
    let mut engine = engine();
    load_file(demo("grandparents.json"), &registry, &mut engine).unwrap();

    let report = engine.run();
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    assert_eq!(report.firings, 2);
    assert_eq!(
        write.lines(),
        vec!["ann is grandparent of cal", "ann is grandparent of dan"]
    );
    let found = engine.store().get("grandparent");
    assert_eq!(found.len(), 2);
    assert_eq!(found[1].get("grandchild"), Value::from("dan"));
}

#[test]
fn bind_and_halt_from_a_rule_file() {
    let (registry, write) = registry();
    let mut engine = engine();
    let doc = json!({
        "ops": [
            ["literalize", "reading", "celsius"],
            ["make", "reading", "celsius", 21],
            ["p", "report",
                [["reading", "celsius", "$c"]],
                [["bind", "$unit", "C"], ["write", "$c", "$unit"], ["halt"]]]
        ]
    });
    load_str(&doc.to_string(), &registry, &mut engine).unwrap();

    let report = engine.run();
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(write.lines(), vec!["21 C".to_string()]);
}

#[test]
fn absent_marker_matches_unset_fields() {
    let (registry, write) = registry();
    let mut engine = engine();
    let doc = json!({
        "ops": [
            ["literalize", "monkey", "at", {"holds": null}],
            ["make", "monkey", "at", "door"],
            ["make", "monkey", "at", "window", "holds", "bananas"],
            ["p", "empty-handed",
                [["monkey", "at", "$p", "holds", null]],
                [["write", "empty at", "$p"], ["modify", 0, "holds", "ladder"]]]
        ]
    });
    load_str(&doc.to_string(), &registry, &mut engine).unwrap();

    let report = engine.run();
    assert_eq!(report.firings, 1);
    assert_eq!(write.lines(), vec!["empty at door".to_string()]);
}

#[test]
fn async_commands_registered_under_new_names() {
    let (mut registry, write) = registry();
    registry.register_as("make-later", Arc::new(Async(MakeCommand)));
    let mut engine = engine();
    let doc = json!({
        "ops": [
            ["literalize", "order", "item"],
            ["literalize", "shipped", "item"],
            ["make", "order", "item", "lamp"],
            ["p", "ship",
                [["order", "item", "$i"]],
                [["make-later", "shipped", "item", "$i"], ["remove", 0]]],
            ["p", "confirm",
                [["shipped", "item", "$i"]],
                [["write", "shipped", "$i"], ["remove", 0]]]
        ]
    });
    load_str(&doc.to_string(), &registry, &mut engine).unwrap();

    let report = engine.run();
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    assert_eq!(write.lines(), vec!["shipped lamp".to_string()]);
    assert!(engine.store().is_empty());
}

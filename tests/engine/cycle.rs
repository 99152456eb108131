//! The match-resolve-act cycle: visibility, removal, failures, lifecycle

use std::sync::{Arc, Mutex};

use ops5_engine::{
    Action, Condition, Engine, EngineConfig, EngineState, FnCommand, Param, Pattern, Rule,
    RunOutcome,
};
use ops5_foundation::{ErrorKind, Value};
use ops5_memory::Template;

fn engine() -> Engine {
    let engine = Engine::new(EngineConfig::sequential()).unwrap();
    engine.register_template(Template::new("seed").with_absent("n"));
    engine.register_template(Template::new("sprout").with_absent("n"));
    engine
}

/// `seed ^n $n` -> make `sprout ^n $n`, remove the seed.
fn grow() -> Rule {
    let plant = FnCommand::sync("plant", |ctx, args| {
        ctx.create_fact("sprout", &[("n", args[0].clone())])?;
        ctx.remove_matched(0)
    });
    Rule::new("grow")
        .when(Condition::new("seed").with("n", Pattern::var("$n")))
        .then(Action::new(plant).arg(Param::var("$n")))
}

#[test]
fn created_facts_wait_for_next_cycle() {
    let mut engine = engine();
    engine.add_rule(grow());
    engine.make("seed", &[("n", Value::from(1))]).unwrap();

    engine.run_steps(1);
    assert!(engine.store().get("sprout").is_empty());
    assert_eq!(engine.store().pending_len(), 1);
    assert!(engine.store().get("seed").is_empty());

    let report = engine.run();
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    assert_eq!(engine.store().get("sprout")[0].get("n"), Value::from(1));
}

#[test]
fn sprouts_fire_in_the_cycle_after_creation() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let harvest = FnCommand::sync("harvest", move |ctx, args| {
        log.lock().unwrap().push(args[0].clone());
        ctx.remove_matched(0)
    });

    let mut engine = engine();
    engine.add_rule(grow());
    engine.add_rule(
        Rule::new("harvest")
            .when(Condition::new("sprout").with("n", Pattern::var("$n")))
            .then(Action::new(harvest).arg(Param::var("$n"))),
    );
    for n in 0..3 {
        engine.make("seed", &[("n", Value::from(n))]).unwrap();
    }

    let report = engine.run();
    assert_eq!(report.firings, 6);
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    let mut harvested = seen.lock().unwrap().clone();
    harvested.sort_by_key(|v| v.as_int());
    assert_eq!(harvested, vec![Value::from(0), Value::from(1), Value::from(2)]);
    assert!(engine.store().is_empty());
}

#[test]
fn bind_is_visible_to_later_actions_only_within_firing() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let bind = FnCommand::sync("bind", |ctx, args| {
        ctx.set_var("$double", Value::from(args[0].as_int().unwrap_or_default() * 2));
        Ok(())
    });
    let record = FnCommand::sync("record", move |ctx, args| {
        log.lock().unwrap().push(args[0].clone());
        ctx.remove_matched(0)
    });

    let mut engine = engine();
    engine.add_rule(
        Rule::new("double")
            .when(Condition::new("seed").with("n", Pattern::var("$n")))
            .then(Action::new(bind).arg(Param::var("$n")))
            .then(Action::new(record).arg(Param::var("$double"))),
    );
    engine.make("seed", &[("n", Value::from(21))]).unwrap();
    engine.make("seed", &[("n", Value::from(5))]).unwrap();

    engine.run();
    assert_eq!(*seen.lock().unwrap(), vec![Value::from(42), Value::from(10)]);
    assert!(engine.failures().is_empty());
}

#[test]
fn errors_surface_as_action_failures() {
    let bad_make = FnCommand::sync("bad-make", |ctx, _| {
        ctx.create_fact("tree", &[] as &[(&str, Value)])?;
        Ok(())
    });
    let bad_modify = FnCommand::sync("bad-modify", |ctx, _| {
        ctx.modify_matched(0, &[("color", Value::from("green"))])
    });
    let bad_remove = FnCommand::sync("bad-remove", |ctx, _| ctx.remove_matched(4));
    let cleanup = FnCommand::sync("cleanup", |ctx, _| ctx.remove_matched(0));

    let mut engine = engine();
    engine.add_rule(
        Rule::new("broken")
            .when(Condition::new("seed"))
            .then(Action::new(bad_make))
            .then(Action::new(bad_modify))
            .then(Action::new(bad_remove))
            .then(Action::new(cleanup)),
    );
    let seed = engine.make("seed", &[("n", Value::from(1))]).unwrap();

    let report = engine.run();
    assert_eq!(report.firings, 1);
    assert_eq!(seed.get("n"), Value::from(1));
    assert_eq!(engine.store().pending_len(), 0);

    let failures = engine.failures();
    let commands: Vec<_> = failures.iter().map(|f| f.command.as_str()).collect();
    assert_eq!(commands, vec!["bad-make", "bad-modify", "bad-remove"]);
    for failure in &failures {
        assert!(matches!(failure.error.kind, ErrorKind::ActionExecution { .. }));
        let context = failure.error.context.as_ref().unwrap();
        assert_eq!(context.source.as_deref(), Some("broken"));
    }
    assert!(failures[0].error.to_string().contains("not literalized"));
}

#[test]
fn halt_from_action_then_resume() {
    let stop = FnCommand::sync("stop", |ctx, _| {
        ctx.halt();
        ctx.remove_matched(0)
    });
    let mut engine = engine();
    engine.add_rule(
        Rule::new("stop")
            .when(Condition::new("seed"))
            .then(Action::new(stop)),
    );
    engine.make("seed", &[] as &[(&str, Value)]).unwrap();
    engine.make("seed", &[] as &[(&str, Value)]).unwrap();

    assert_eq!(engine.run().outcome, RunOutcome::Halted);
    assert_eq!(engine.state(), EngineState::Halted);
    assert_eq!(engine.store().get("seed").len(), 1);

    // A new run clears the flag and picks up where it stopped.
    assert_eq!(engine.run().outcome, RunOutcome::Halted);
    assert_eq!(engine.run().outcome, RunOutcome::Quiescent);
    assert_eq!(engine.firings(), 2);
}

#[test]
fn shutdown_then_run_matches_sequentially() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register_template(Template::new("seed").with_absent("n"));
    engine.register_template(Template::new("sprout").with_absent("n"));
    engine.add_rule(grow());
    engine.make("seed", &[("n", Value::from(1))]).unwrap();

    engine.shutdown();
    let report = engine.run();
    assert_eq!(report.firings, 1);
    assert_eq!(engine.store().get("sprout").len(), 1);
}

#[test]
fn panicking_command_is_reported_and_firing_continues() {
    let explode = FnCommand::sync("explode", |_, _| panic!("bad wiring"));
    let consume = FnCommand::sync("consume", |ctx, _| ctx.remove_matched(0));
    let mut engine = engine();
    engine.add_rule(
        Rule::new("fragile")
            .when(Condition::new("seed"))
            .then(Action::new(explode))
            .then(Action::new(consume)),
    );
    engine.make("seed", &[("n", Value::from(1))]).unwrap();

    let report = engine.run();
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    assert_eq!(report.firings, 1);
    assert_eq!(engine.state(), EngineState::Halted);
    assert!(engine.store().get("seed").is_empty());

    let failures = engine.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].command, "explode");
    assert!(failures[0].error.to_string().contains("explode panicked: bad wiring"));
}

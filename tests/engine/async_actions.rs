//! Async actions, tickets, and quiescence

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use ops5_engine::{Action, Condition, Engine, EngineConfig, FnCommand, Param, Pattern, Rule, RunOutcome};
use ops5_foundation::{Error, ErrorKind, Value};
use ops5_memory::Template;

fn engine(config: EngineConfig) -> Engine {
    let engine = Engine::new(config).unwrap();
    engine.register_template(Template::new("job").with_absent("id"));
    engine.register_template(Template::new("result").with_absent("id"));
    engine
}

/// `job ^id $id` -> (after a delay, on the pool) make `result ^id $id`.
fn slow_worker(delay: Duration) -> Rule {
    let work = FnCommand::async_("work", move |ctx, args| {
        thread::sleep(delay);
        ctx.create_fact("result", &[("id", args[0].clone())])?;
        Ok(())
    });
    let done = FnCommand::sync("done", |ctx, _| ctx.remove_matched(0));
    Rule::new("dispatch")
        .when(Condition::new("job").with("id", Pattern::var("$id")))
        .then(Action::new(work).arg(Param::var("$id")))
        .then(Action::new(done))
}

fn collector() -> Rule {
    let collect = FnCommand::sync("collect", |ctx, _| ctx.remove_matched(0));
    Rule::new("collect")
        .when(Condition::new("result"))
        .then(Action::new(collect))
}

#[test]
fn late_async_facts_cause_more_cycles() {
    let mut engine = engine(EngineConfig::default());
    engine.add_rule(slow_worker(Duration::from_millis(50)));
    engine.add_rule(collector());
    engine.make("job", &[("id", Value::from(1))]).unwrap();

    let report = engine.run();
    // dispatch, then collect once the result lands.
    assert_eq!(report.firings, 2);
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    assert!(engine.outstanding().is_empty());
    assert!(engine.store().is_empty());
    assert!(!engine.store().has_pending());
}

#[test]
fn many_async_jobs_all_complete() {
    let mut engine = engine(EngineConfig::default().with_action_workers(4));
    engine.add_rule(slow_worker(Duration::from_millis(5)));
    engine.add_rule(collector());
    for id in 0..20 {
        engine.make("job", &[("id", Value::from(id))]).unwrap();
    }

    let report = engine.run();
    assert_eq!(report.firings, 40);
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    assert!(engine.store().is_empty());
}

#[test]
fn failing_async_action_releases_ticket() {
    let fail = FnCommand::async_("explode", |_, _| Err(Error::arguments("no fuel")));
    let done = FnCommand::sync("done", |ctx, _| ctx.remove_matched(0));
    let mut engine = engine(EngineConfig::sequential());
    engine.add_rule(
        Rule::new("launch")
            .when(Condition::new("job"))
            .then(Action::new(fail))
            .then(Action::new(done)),
    );
    engine.make("job", &[] as &[(&str, Value)]).unwrap();

    let report = engine.run();
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    assert!(engine.outstanding().is_empty());
    let failures = engine.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].command, "explode");
}

#[test]
fn async_removal_is_rejected() {
    let remove = FnCommand::async_("remove-later", |ctx, _| ctx.remove_matched(0));
    let done = FnCommand::sync("done", |ctx, _| ctx.remove_matched(0));
    let mut engine = engine(EngineConfig::sequential());
    engine.add_rule(
        Rule::new("sneaky")
            .when(Condition::new("job"))
            .then(Action::new(remove))
            .then(Action::new(done)),
    );
    engine.make("job", &[] as &[(&str, Value)]).unwrap();

    engine.run();
    let failures = engine.failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].error.kind, ErrorKind::ActionExecution { .. }));
    assert!(failures[0].error.to_string().contains("outside the engine loop thread"));
}

#[test]
fn halt_waits_for_outstanding_tickets() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let slow = FnCommand::async_("slow", move |_, _| {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });
    let stop = FnCommand::sync("stop", |ctx, _| {
        ctx.halt();
        Ok(())
    });
    let mut engine = engine(EngineConfig::sequential());
    engine.add_rule(
        Rule::new("slow-then-stop")
            .when(Condition::new("job"))
            .then(Action::new(slow))
            .then(Action::new(stop)),
    );
    engine.make("job", &[] as &[(&str, Value)]).unwrap();

    let report = engine.run();
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert!(finished.load(Ordering::SeqCst));
    assert!(engine.outstanding().is_empty());
}

#[test]
fn idle_timeout_picks_up_external_producers() {
    let mut engine = engine(EngineConfig::sequential().with_idle_timeout(Some(Duration::from_millis(500))));
    engine.add_rule(collector());
    let handle = engine.handle();
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        handle.make("result", &[("id", Value::from(7))]).unwrap();
    });

    let report = engine.run();
    producer.join().unwrap();
    assert_eq!(report.firings, 1);
    assert_eq!(report.outcome, RunOutcome::Quiescent);
}

#[test]
fn external_halt_interrupts_idle_wait() {
    let mut engine = engine(EngineConfig::sequential().with_idle_timeout(Some(Duration::from_secs(30))));
    let halt = engine.halt_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        halt.halt();
    });

    let started = Instant::now();
    let report = engine.run();
    stopper.join().unwrap();
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[test]
fn panicking_async_action_is_reported() {
    let explode = FnCommand::async_("explode", |_, _| panic!("worker lost"));
    let done = FnCommand::sync("done", |ctx, _| ctx.remove_matched(0));
    let mut engine = engine(EngineConfig::sequential());
    engine.add_rule(
        Rule::new("launch")
            .when(Condition::new("job"))
            .then(Action::new(explode))
            .then(Action::new(done)),
    );
    engine.make("job", &[] as &[(&str, Value)]).unwrap();

    let report = engine.run();
    assert_eq!(report.outcome, RunOutcome::Quiescent);
    assert!(engine.outstanding().is_empty());
    let failures = engine.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(&*failures[0].rule, "launch");
    assert!(failures[0].error.to_string().contains("explode panicked: worker lost"));
}

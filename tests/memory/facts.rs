//! Facts and templates across the store boundary

use ops5_foundation::Value;
use ops5_memory::{FactStore, Template};

fn store() -> FactStore {
    let store = FactStore::new();
    store.register_template(
        Template::new("monkey")
            .with_absent("at")
            .with_field("on", "floor")
            .with_field("holds", Value::Nil),
    );
    store
}

#[test]
fn make_fills_defaults_in_schema_order() {
    let mut store = store();
    let fact = store.make("monkey", &[("at", Value::from("door"))]).unwrap();
    store.drain();

    let names: Vec<_> = fact.fields().into_iter().map(|(n, _)| n.to_string()).collect();
    assert_eq!(names, vec!["at", "on", "holds"]);
    assert_eq!(fact.get("on"), Value::from("floor"));
    assert!(fact.get("holds").is_nil());
    assert_eq!(fact.to_string(), "(monkey ^at door ^on floor)");
}

#[test]
fn identical_facts_are_distinct() {
    let mut store = store();
    let a = store.make("monkey", &[] as &[(&str, Value)]).unwrap();
    let b = store.make("monkey", &[] as &[(&str, Value)]).unwrap();
    store.drain();

    assert_eq!(a.fields(), b.fields());
    assert_ne!(a.id(), b.id());
    assert_eq!(store.get("monkey").len(), 2);
}

#[test]
fn re_literalizing_replaces_schema_for_new_facts() {
    let store = store();
    store.register_template(Template::new("monkey").with_absent("mood"));
    assert!(store.make("monkey", &[("at", Value::from("door"))]).unwrap_err().is_field());
    assert!(store.make("monkey", &[("mood", Value::from("calm"))]).is_ok());
}

#[test]
fn set_rejects_fields_outside_schema() {
    let mut store = store();
    let fact = store.make("monkey", &[] as &[(&str, Value)]).unwrap();
    store.drain();

    fact.set("at", Value::from("window")).unwrap();
    assert_eq!(fact.get("at"), Value::from("window"));
    assert!(fact.set("color", Value::from("brown")).unwrap_err().is_field());
}

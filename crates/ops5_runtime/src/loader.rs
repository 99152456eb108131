//! JSON rule files.
//!
//! A rule file is an object with an optional `name` and an `ops` array of
//! statements, applied in order:
//!
//! ```json
//! {
//!   "name": "blocks",
//!   "ops": [
//!     ["literalize", "goal", "status", {"object": "none"}],
//!     ["make", "goal", "status", "active", "object", "b1"],
//!     ["p", "clear-goal",
//!       [["goal", "status", "active", "object", "$b"]],
//!       [["write", "done", "$b"], ["remove", 0]]]
//!   ]
//! }
//! ```
//!
//! Strings beginning with `$` are variables and `null` is the absent marker.
//! Fields declared in an object keep the order they are written in.
//! Rules are added to the engine together after every statement is read.

use std::fs;
use std::path::Path;

use ops5_engine::{Action, Condition, Engine, Param, Pattern, Rule, is_variable_name};
use ops5_foundation::{Error, ErrorContext, Result, Value};
use ops5_memory::Template;
use ops5_stdlib::CommandRegistry;
use serde::Deserialize;
use serde_json::Value as Json;
use tracing::{debug, warn};

/// Commands whose first parameter names a variable rather than reading one.
const BINDING_COMMANDS: &[&str] = &["bind"];

#[derive(Deserialize)]
struct Document {
    name: Option<String>,
    ops: Option<Vec<Json>>,
}

/// What a load added to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// The document's `name`, if any.
    pub name: Option<String>,
    /// Templates literalized.
    pub templates: usize,
    /// Facts made.
    pub facts: usize,
    /// Rules added.
    pub rules: usize,
    /// Statements skipped as malformed.
    pub skipped: usize,
}

/// Reads a rule file and loads it into `engine`.
///
/// # Errors
/// Returns a load error if the file cannot be read or parsed, or any error
/// raised while applying its statements.
pub fn load_file(path: impl AsRef<Path>, registry: &CommandRegistry, engine: &mut Engine) -> Result<LoadSummary> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        Error::load(format!("cannot read {}: {e}", path.display()))
            .with_context(ErrorContext::new().with_source(path.display().to_string()))
    })?;
    load_str(&text, registry, engine).map_err(|e| {
        let context = e
            .context
            .clone()
            .unwrap_or_default()
            .with_source(path.display().to_string());
        e.with_context(context)
    })
}

/// Parses rule-file text and loads it into `engine`.
///
/// # Errors
/// See [`load_file`].
pub fn load_str(text: &str, registry: &CommandRegistry, engine: &mut Engine) -> Result<LoadSummary> {
    let doc: Json = serde_json::from_str(text).map_err(|e| Error::load(format!("invalid JSON: {e}")))?;
    load_value(doc, registry, engine)
}

/// Loads an already-parsed rule document into `engine`.
///
/// # Errors
/// Returns a load error for a missing `ops` section, a malformed statement,
/// or an unknown command; schema and field errors from `make` statements
/// pass through.
pub fn load_value(doc: Json, registry: &CommandRegistry, engine: &mut Engine) -> Result<LoadSummary> {
    let doc: Document =
        serde_json::from_value(doc).map_err(|e| Error::load(format!("invalid rule file: {e}")))?;
    let ops = doc.ops.ok_or_else(|| Error::load("missing ops section"))?;

    let mut summary = LoadSummary {
        name: doc.name,
        ..LoadSummary::default()
    };
    let mut rules = Vec::new();

    for (i, statement) in ops.iter().enumerate() {
        let at = |e: Error| {
            let context = e.context.clone().unwrap_or_default().with_frame(format!("statement {i}"));
            e.with_context(context)
        };
        let items = statement
            .as_array()
            .ok_or_else(|| at(Error::load("statement is not an array")))?;
        if items.len() < 2 {
            warn!(statement = %statement, "malformed statement skipped");
            summary.skipped += 1;
            continue;
        }

        match items[0].as_str() {
            Some("literalize") => {
                engine.register_template(literalize(items).map_err(at)?);
                summary.templates += 1;
            }
            Some("make") => {
                let (fact_type, values) = make(items).map_err(at)?;
                engine.make(&fact_type, &values).map_err(at)?;
                summary.facts += 1;
            }
            Some("p") => rules.push(production(items, registry).map_err(at)?),
            _ => {
                warn!(statement = %statement, "unknown statement skipped");
                summary.skipped += 1;
            }
        }
    }

    summary.rules = rules.len();
    engine.add_rules(rules);
    debug!(?summary, "rule file loaded");
    Ok(summary)
}

// =============================================================================
// Statements
// =============================================================================

fn string<'a>(json: &'a Json, what: &str) -> Result<&'a str> {
    json.as_str()
        .ok_or_else(|| Error::load(format!("expected {what} string, got {json}")))
}

fn array<'a>(json: &'a Json, what: &str) -> Result<&'a [Json]> {
    json.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| Error::load(format!("expected {what} array, got {json}")))
}

/// Converts a JSON scalar or array to a value.
fn value(json: &Json) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::from(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::from(s.as_str()),
        Json::Array(items) => Value::Vec(items.iter().map(value).collect::<Result<_>>()?),
        Json::Object(_) => return Err(Error::load(format!("objects are not values: {json}"))),
    })
}

/// `["literalize", type, field | {field: default}...]`
fn literalize(items: &[Json]) -> Result<Template> {
    let mut template = Template::new(string(&items[1], "type")?);
    for field in &items[2..] {
        match field {
            Json::String(name) => template = template.with_absent(name.as_str()),
            Json::Object(defaults) => {
                for (name, default) in defaults {
                    template = template.with_field(name.as_str(), value(default)?);
                }
            }
            other => return Err(Error::load(format!("bad field declaration: {other}"))),
        }
    }
    Ok(template)
}

fn field_pairs(items: &[Json]) -> Result<Vec<(String, &Json)>> {
    if items.len() % 2 != 0 {
        return Err(Error::load("field list has a field without a value"));
    }
    items
        .chunks_exact(2)
        .map(|pair| Ok((string(&pair[0], "field")?.to_string(), &pair[1])))
        .collect()
}

/// `["make", type, field, value, ...]`
fn make(items: &[Json]) -> Result<(String, Vec<(String, Value)>)> {
    let fact_type = string(&items[1], "type")?.to_string();
    let values = field_pairs(&items[2..])?
        .into_iter()
        .map(|(field, json)| Ok((field, value(json)?)))
        .collect::<Result<_>>()?;
    Ok((fact_type, values))
}

fn pattern(json: &Json) -> Result<Pattern> {
    Ok(match json {
        Json::Null => Pattern::Absent,
        Json::String(s) if is_variable_name(s) => Pattern::var(s.as_str()),
        other => Pattern::Literal(value(other)?),
    })
}

fn param(json: &Json) -> Result<Param> {
    Ok(match json {
        Json::String(s) if is_variable_name(s) => Param::var(s.as_str()),
        other => Param::Literal(value(other)?),
    })
}

/// `["p", name, [[type, field, pattern, ...]...], [[command, param...]...]]`
fn production(items: &[Json], registry: &CommandRegistry) -> Result<Rule> {
    let name = string(&items[1], "rule name")?;
    let conditions = items
        .get(2)
        .ok_or_else(|| Error::load(format!("rule {name} has no conditions")))?;
    let actions = items
        .get(3)
        .ok_or_else(|| Error::load(format!("rule {name} has no actions")))?;

    let mut rule = Rule::new(name);
    for condition in array(conditions, "conditions")? {
        let parts = array(condition, "condition")?;
        let (fact_type, tests) = parts
            .split_first()
            .ok_or_else(|| Error::load(format!("rule {name} has an empty condition")))?;
        let mut cond = Condition::new(string(fact_type, "type")?);
        for (field, json) in field_pairs(tests)? {
            cond = cond.with(field, pattern(json)?);
        }
        rule = rule.when(cond);
    }

    for action in array(actions, "actions")? {
        let parts = array(action, "action")?;
        let (command_name, params) = parts
            .split_first()
            .ok_or_else(|| Error::load(format!("rule {name} has an empty action")))?;
        let command_name = string(command_name, "command")?;
        let command = registry
            .get(command_name)
            .ok_or_else(|| Error::load(format!("command {command_name} not found")))?;

        let mut params = params.iter().map(param).collect::<Result<Vec<_>>>()?;
        if BINDING_COMMANDS.contains(&command_name) {
            if let Some(Param::Variable(var)) = params.first() {
                let literal = Param::lit(var.as_str());
                params[0] = literal;
            }
        }
        rule = rule.then(Action::new(command).args(params));
    }
    Ok(rule)
}

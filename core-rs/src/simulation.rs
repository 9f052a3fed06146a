//! Simulation command builders
//!
//! The game side only exposes a text command interface. Every call into the
//! `universal_edges` module is rendered as a `/sc` command with its JSON
//! payload embedded as an escaped Lua string literal.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::edge::{Edge, InstanceId};
use crate::errors::Result;
use crate::messages::EdgeLinkUpdate;
use crate::transfer::TransferBatch;

const MODULE: &str = "universal_edges";

/// Escape a string for use inside a Lua string literal (either quote style)
///
/// # Example
///
/// ```
/// use universal_edges::simulation::escape_lua_string;
///
/// assert_eq!(escape_lua_string(r#"it's "x""#), r#"it\'s \"x\""#);
/// ```
pub fn escape_lua_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\0' => escaped.push_str("\\0"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn json_literal<T: Serialize>(payload: &T) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(format!("'{}'", escape_lua_string(&json)))
}

fn id_literal(id: &str) -> String {
    format!("\"{}\"", escape_lua_string(id))
}

/// Tell the simulation which instance it runs on
pub fn set_config(instance_id: InstanceId) -> String {
    format!("/sc {}.set_config({{instance_id = {}}})", MODULE, instance_id)
}

/// Push a cached edge record into the simulation
pub fn edge_update(edge: &Edge) -> Result<String> {
    Ok(format!(
        "/sc {}.edge_update({}, {})",
        MODULE,
        id_literal(&edge.id),
        json_literal(edge)?
    ))
}

/// Apply a merged batch received from the partner instance
pub fn edge_transfer(edge_id: &str, batch: &TransferBatch) -> Result<String> {
    Ok(format!(
        "/sc {}.edge_transfer({}, {})",
        MODULE,
        id_literal(edge_id),
        json_literal(batch)?
    ))
}

pub fn edge_link_update(update: &EdgeLinkUpdate) -> Result<String> {
    Ok(format!("/sc {}.edge_link_update({})", MODULE, json_literal(update)?))
}

/// Install routing penalties for one offset
pub fn train_penalty_map(edge_id: &str, offset: i64, penalty_map: &BTreeMap<String, u64>) -> Result<String> {
    Ok(format!(
        "/sc {}.set_train_penalty_map({}, {}, {})",
        MODULE,
        id_literal(edge_id),
        offset,
        json_literal(penalty_map)?
    ))
}

//! JSON rendering for process forests

use crate::forest::Forest;
use crate::models::{Evidence, Identity};
use serde::Serialize;
use time::OffsetDateTime;

/// Nested view of a forest node, borrowed for serialization
#[derive(Serialize)]
struct JsonNode<'a> {
    identity: Identity,
    path: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    evidence: Evidence,
    children: Vec<JsonNode<'a>>,
}

/// Assemble the nested view bottom-up.
///
/// Walking the pre-order backwards visits every child before its parent, so
/// each node can take its finished children out of `slots` without recursion.
/// Serialization itself still descends one stack frame per tree level.
fn nest(forest: &Forest) -> Option<JsonNode<'_>> {
    let order: Vec<_> = forest.preorder().map(|(id, _)| id).collect();
    let mut slots: Vec<Option<JsonNode<'_>>> = Vec::new();
    slots.resize_with(forest.arena_len(), || None);

    for id in order.into_iter().rev() {
        let node = forest.node(id);
        let children = forest
            .children(id)
            .iter()
            .filter_map(|child| slots[child.index()].take())
            .collect();
        slots[id.index()] = Some(JsonNode {
            identity: node.identity,
            path: &node.path,
            timestamp: node.timestamp,
            evidence: node.evidence,
            children,
        });
    }

    slots[forest.root().index()].take()
}

/// Render the forest as a pretty-printed JSON string
pub fn render_json_string(forest: &Forest) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&nest(forest))
}

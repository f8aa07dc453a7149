//! Import of task graphs written as Mermaid flowcharts.
//!
//! Graph generators commonly emit the decomposition as a flowchart:
//!
//! ```text
//! graph TD
//!     N1[Greeting] --> N2[Collect contact details]
//!     N2 -->|premium| N3[Premium upsell]
//!     N2 --> N4[Confirm order] & N5[Send brochure]
//! ```
//!
//! Supported syntax:
//! - node declarations `A`, `A[label]`, `A(label)`, `A{label}` and the
//!   doubled bracket forms, standalone or inside edges
//! - arrows `-->`, `---`, `==>`, `-.->`, chained on one line
//! - `|cond|` arrow labels, which make the edge conditional on `cond`
//! - `&` groups; a group on the right of an unlabelled arrow creates
//!   parallel edges, a group on the left creates one edge per source
//!
//! Header lines, `%%` comments and styling directives are skipped.

use super::{DependencyEdge, EdgeCondition, EdgeKind, GraphError, GraphSpec, SubTask, SubTaskId};
use regex::Regex;
use std::collections::HashMap;

/// Leading keywords of lines that carry no nodes or edges.
const DIRECTIVES: &[&str] = &[
    "graph",
    "flowchart",
    "style",
    "classDef",
    "class",
    "linkStyle",
    "click",
    "subgraph",
    "direction",
    "end",
];

#[derive(Default)]
struct NodeInfo {
    label: Option<String>,
    /// Condition of the first conditional edge entering the node.
    entered_on: Option<String>,
}

/// Parses Mermaid flowchart text into an unvalidated [`GraphSpec`].
///
/// Sub-tasks are declared in order of first appearance.
pub fn parse(text: &str) -> Result<GraphSpec, GraphError> {
    let arrow = Regex::new(r"\s*(?:-->|---|==>|-\.->)\s*(?:\|([^|]*)\|\s*)?")
        .map_err(|e| GraphError::invalid(format!("arrow pattern: {e}")))?;
    let node = Regex::new(
        r#"^([A-Za-z0-9_\-]+)\s*(?:(?:\[\[|\[\(|\(\[|\(\(|\{\{|\[|\(|\{|>)\s*"?(.*?)"?\s*(?:\]\]|\)\]|\]\)|\)\)|\}\}|\]|\)|\}))?$"#,
    )
    .map_err(|e| GraphError::invalid(format!("node pattern: {e}")))?;

    let mut order: Vec<SubTaskId> = Vec::new();
    let mut nodes: HashMap<SubTaskId, NodeInfo> = HashMap::new();
    let mut edges: Vec<DependencyEdge> = Vec::new();

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim().trim_end_matches(';').trim();
        if line.is_empty() || line.starts_with("%%") || is_directive(line) {
            continue;
        }

        // Split "A --> B -->|x| C" into node groups and the labels between them.
        let mut groups: Vec<&str> = Vec::new();
        let mut labels: Vec<Option<String>> = Vec::new();
        let mut last = 0;
        for caps in arrow.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            groups.push(&line[last..whole.start()]);
            labels.push(
                caps.get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|l| !l.is_empty()),
            );
            last = whole.end();
        }
        groups.push(&line[last..]);

        let mut parsed: Vec<Vec<SubTaskId>> = Vec::with_capacity(groups.len());
        for group in groups {
            let mut ids = Vec::new();
            for token in group.split('&').map(str::trim) {
                let caps = node.captures(token).ok_or_else(|| {
                    GraphError::invalid(format!(
                        "line {}: cannot parse node '{}'",
                        line_no + 1,
                        token
                    ))
                })?;
                let id = SubTaskId::from(&caps[1]);
                let info = nodes.entry(id.clone()).or_insert_with(|| {
                    order.push(id.clone());
                    NodeInfo::default()
                });
                if let Some(label) = caps.get(2).map(|m| m.as_str().trim()) {
                    if !label.is_empty() && info.label.is_none() {
                        info.label = Some(label.to_string());
                    }
                }
                ids.push(id);
            }
            parsed.push(ids);
        }

        for (i, label) in labels.into_iter().enumerate() {
            let sources = &parsed[i];
            let targets = &parsed[i + 1];
            for source in sources {
                for target in targets {
                    let edge = match &label {
                        Some(cond) => {
                            if let Some(info) = nodes.get_mut(target) {
                                info.entered_on.get_or_insert_with(|| cond.clone());
                            }
                            DependencyEdge::conditional(
                                source.clone(),
                                target.clone(),
                                EdgeCondition::new(cond.clone()),
                            )
                        }
                        None if targets.len() > 1 => {
                            DependencyEdge::new(source.clone(), target.clone(), EdgeKind::Parallel)
                        }
                        None => DependencyEdge::new(
                            source.clone(),
                            target.clone(),
                            EdgeKind::Sequential,
                        ),
                    };
                    if !edges
                        .iter()
                        .any(|e| e.source == edge.source && e.target == edge.target)
                    {
                        edges.push(edge);
                    }
                }
            }
        }
    }

    let subtasks = order
        .into_iter()
        .map(|id| {
            let info = nodes.remove(&id).unwrap_or_default();
            let label = info.label.unwrap_or_else(|| id.to_string());
            let description = match info.entered_on {
                Some(cond) => format!("after user {cond}: {label}"),
                None => label,
            };
            SubTask::new(id, description)
        })
        .collect();

    Ok(GraphSpec {
        subtasks,
        edges,
        constraints: Vec::new(),
        roots: Vec::new(),
    })
}

fn is_directive(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|word| DIRECTIVES.contains(&word))
}

use shadegraph::shader::{node::NodeId, Error, Graph, Unvalidated};

use std::collections::HashMap;

/// Connection from a named node's output to another named node's input.
pub type Link = (&'static str, &'static str, &'static str, &'static str);

/// Apply every link, looking nodes up by name.
pub fn wire(
    graph: &mut Graph<Unvalidated>,
    nodes: &HashMap<&'static str, NodeId>,
    links: &[Link],
) -> Result<(), Error> {
    let lookup = |name: &str| {
        nodes
            .get(name)
            .copied()
            .ok_or_else(|| Error::InvalidConfig {
                node: "shaderlib",
                reason: format!("no node named `{name}`"),
            })
    };

    for (from, output, to, input) in links {
        graph.connect(lookup(from)?, output, lookup(to)?, input)?;
    }
    Ok(())
}

/// Set the root to the node named `name`.
pub fn set_root(
    graph: &mut Graph<Unvalidated>,
    nodes: &HashMap<&'static str, NodeId>,
    name: &str,
) -> Result<(), Error> {
    match nodes.get(name) {
        Some(root) => graph.set_root(*root),
        None => Err(Error::NoRoot),
    }
}

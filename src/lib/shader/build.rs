//! Build pass turning a [validated](Validated) graph into program sources.
//!
//! A pass walks the graph from its root in post-order, numbers the reachable nodes, lets every
//! node adjust its outputs, checks that each slot's value exists in the stages the slot is read
//! in, then runs one [StageBuilder] per stage. Numbering is local to the pass so rebuilding an
//! unchanged graph produces identical sources.

use super::{
    graph::{Error, Graph, Validated},
    node::{CodeBuffer, Name, Node, NodeId, Side, Slot},
    program::{CompileSink, ProgramConfig, ProgramSource},
    types::{GlslType, Scope, Stage, Stages},
    value::{Code, Value, ValueId},
};

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, Default, PartialEq)]
/// Result of a build pass, kept by the graph for binding.
pub struct BuildPass {
    pub(crate) order: Vec<NodeId>,
    pub(crate) node_uids: HashMap<NodeId, usize>,
    pub(crate) value_uids: HashMap<ValueId, usize>,
    pub(crate) used: HashSet<ValueId>,
    pub(crate) source: ProgramSource,
}

impl BuildPass {
    /// Reachable nodes, producers first.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Suffix of a value's declared name in this pass.
    pub fn uid_of(&self, id: ValueId, value: &Value) -> Option<usize> {
        match value.owner {
            Some(owner) => self.node_uids.get(&owner).copied(),
            None => self.value_uids.get(&id).copied(),
        }
    }

    /// Whether a reachable node reads the value.
    pub fn is_used(&self, id: ValueId) -> bool {
        self.used.contains(&id)
    }

    /// Generated sources.
    pub fn source(&self) -> &ProgramSource {
        &self.source
    }
}

fn resolve<'a>(
    values: &'a IndexMap<ValueId, Value>,
    pass: &BuildPass,
    config: &ProgramConfig,
    id: ValueId,
) -> Result<Code<'a>, Error> {
    let value = values.get(&id).ok_or(Error::UnknownValue(id))?;
    Ok(Code::new(value, pass.uid_of(id, value), config.is_modern()))
}

#[derive(Clone, Copy, Debug)]
/// Read-only view of one node during emission and binding.
pub struct EmitCtx<'a> {
    pub(crate) node: NodeId,
    pub(crate) inputs: &'a IndexMap<Name, Slot>,
    pub(crate) outputs: &'a IndexMap<Name, ValueId>,
    pub(crate) values: &'a IndexMap<ValueId, Value>,
    pub(crate) pass: &'a BuildPass,
    pub(crate) config: &'a ProgramConfig,
}

impl<'a> EmitCtx<'a> {
    pub(crate) fn new(
        id: NodeId,
        node: &'a Node,
        values: &'a IndexMap<ValueId, Value>,
        pass: &'a BuildPass,
        config: &'a ProgramConfig,
    ) -> Self {
        Self {
            node: id,
            inputs: &node.inputs,
            outputs: &node.outputs,
            values,
            pass,
            config,
        }
    }

    /// Build uid of the node, used to suffix node-private names.
    pub fn uid(&self) -> usize {
        self.pass.node_uids.get(&self.node).copied().unwrap_or_default()
    }

    /// Target dialect.
    pub fn config(&self) -> &'a ProgramConfig {
        self.config
    }

    /// Value feeding an input slot.
    pub fn input(&self, slot: &str) -> Result<Code<'a>, Error> {
        let slot = self
            .inputs
            .get(slot)
            .ok_or_else(|| Error::Missing(Side::Input, slot.into()))?;
        resolve(self.values, self.pass, self.config, slot.value)
    }

    /// Whether something other than the default feeds a slot.
    pub fn is_connected(&self, slot: &str) -> bool {
        self.inputs.get(slot).is_some_and(Slot::is_connected)
    }

    /// Output value.
    pub fn output(&self, name: &str) -> Result<Code<'a>, Error> {
        let id = self
            .outputs
            .get(name)
            .ok_or_else(|| Error::Missing(Side::Output, name.into()))?;
        resolve(self.values, self.pass, self.config, *id)
    }

    /// Whether a reachable node reads an output.
    pub fn is_used(&self, name: &str) -> bool {
        self.outputs.get(name).is_some_and(|id| self.pass.is_used(*id))
    }

    /// Declare every used, non-inline output that exists in `stage`.
    pub fn declare_outputs(&self, stage: Stage, out: &mut CodeBuffer) -> Result<(), Error> {
        for name in self.outputs.keys() {
            if !self.is_used(name.as_str()) {
                continue;
            }
            let output = self.output(name.as_str())?;
            if output.value().scope == Scope::Inline {
                continue;
            }
            if let Some(declaration) = output.declaration_for(stage)? {
                out.line(declaration);
            }
        }
        Ok(())
    }

    /// Declaration of an output in `stage`, if it exists there.
    pub fn declare(&self, name: &str, stage: Stage, out: &mut CodeBuffer) -> Result<(), Error> {
        if let Some(declaration) = self.output(name)?.declaration_for(stage)? {
            out.line(declaration);
        }
        Ok(())
    }
}

/// Mutable view of one node while it prepares its outputs.
pub struct PrepareCtx<'a> {
    node: NodeId,
    inputs: &'a mut IndexMap<Name, Slot>,
    outputs: &'a IndexMap<Name, ValueId>,
    values: &'a mut IndexMap<ValueId, Value>,
    pass: &'a BuildPass,
    config: &'a ProgramConfig,
}

impl<'a> PrepareCtx<'a> {
    /// Build uid of the node.
    pub fn uid(&self) -> usize {
        self.pass.node_uids.get(&self.node).copied().unwrap_or_default()
    }

    /// Target dialect.
    pub fn config(&self) -> &ProgramConfig {
        self.config
    }

    /// Value feeding an input slot.
    pub fn input(&self, slot: &str) -> Result<Code<'_>, Error> {
        let slot = self
            .inputs
            .get(slot)
            .ok_or_else(|| Error::Missing(Side::Input, slot.into()))?;
        resolve(&*self.values, self.pass, self.config, slot.value)
    }

    /// Output value.
    pub fn output(&self, name: &str) -> Result<Code<'_>, Error> {
        let id = self
            .outputs
            .get(name)
            .ok_or_else(|| Error::Missing(Side::Output, name.into()))?;
        resolve(&*self.values, self.pass, self.config, *id)
    }

    /// Mutable output value.
    pub fn output_mut(&mut self, name: &str) -> Result<&mut Value, Error> {
        let id = self
            .outputs
            .get(name)
            .ok_or_else(|| Error::Missing(Side::Output, name.into()))?;
        self.values.get_mut(id).ok_or(Error::UnknownValue(*id))
    }

    /// Whether a reachable node reads an output.
    pub fn is_used(&self, name: &str) -> bool {
        self.outputs.get(name).is_some_and(|id| self.pass.is_used(*id))
    }

    /// Change the stages an input slot is read in.
    pub fn set_input_stages(&mut self, slot: &str, stages: Stages) -> Result<(), Error> {
        self.inputs
            .get_mut(slot)
            .ok_or_else(|| Error::Missing(Side::Input, slot.into()))?
            .stages = stages;
        Ok(())
    }
}

/// Emission state of one stage: visited nodes and the two output buffers.
pub struct StageBuilder {
    stage: Stage,
    visited: HashSet<NodeId>,
    declared: HashSet<ValueId>,
    declarations: CodeBuffer,
    executions: CodeBuffer,
}

impl StageBuilder {
    /// Empty builder for `stage`.
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            visited: HashSet::new(),
            declared: HashSet::new(),
            declarations: CodeBuffer::default(),
            executions: CodeBuffer::indented(1),
        }
    }

    /// Emit `id` after everything it depends on, at most once.
    fn visit(&mut self, graph: &Graph<Validated>, pass: &BuildPass, id: NodeId) -> Result<(), Error> {
        if !self.visited.insert(id) {
            return Ok(());
        }
        let node = graph.nodes.get(&id).ok_or(Error::UnknownNode(id))?;

        for slot in node.inputs.values() {
            let value = graph.values.get(&slot.value).ok_or(Error::UnknownValue(slot.value))?;
            let Some(owner) = value.owner else {
                // Values without owner are declared by the first node reading them.
                if value.scope != Scope::Inline && self.declared.insert(slot.value) {
                    let code = resolve(&graph.values, pass, &graph.config, slot.value)?;
                    if let Some(declaration) = code.declaration_for(self.stage)? {
                        self.declarations.line(declaration);
                    }
                }
                continue;
            };
            self.visit(graph, pass, owner)?;
        }

        let ctx = EmitCtx::new(id, node, &graph.values, pass, &graph.config);
        let contract = node.kind.as_node();
        match self.stage {
            Stage::Vertex => {
                contract.declaration_vertex(&ctx, &mut self.declarations)?;
                contract.execution_vertex(&ctx, &mut self.executions)?;
            }
            Stage::Fragment => {
                contract.declaration_fragment(&ctx, &mut self.declarations)?;
                contract.execution_fragment(&ctx, &mut self.executions)?;
            }
        }

        tracing::trace!(node = %id, stage = ?self.stage, "Emitted node");

        Ok(())
    }

    /// Walk the graph from `root` and assemble the stage source.
    pub fn run(
        mut self,
        graph: &Graph<Validated>,
        pass: &BuildPass,
        root: NodeId,
    ) -> Result<String, Error> {
        self.visit(graph, pass, root)?;
        Ok(graph.config.assemble(
            self.stage,
            self.declarations.as_str(),
            self.executions.as_str(),
        ))
    }
}

impl Graph<Validated> {
    fn post_order(&self, current: NodeId, order: &mut Vec<NodeId>, seen: &mut HashSet<NodeId>) {
        if !seen.insert(current) {
            return;
        }
        let Some(node) = self.nodes.get(&current) else {return};

        for slot in node.inputs.values() {
            let owner = self.values.get(&slot.value).and_then(Value::owner);
            if let Some(owner) = owner.filter(|owner| self.nodes.contains_key(owner)) {
                self.post_order(owner, order, seen);
            }
        }

        order.push(current);
    }

    fn check_linkage(&self, order: &[NodeId]) -> Result<(), Error> {
        for id in order {
            let Some(node) = self.nodes.get(id) else {continue};
            for (name, slot) in node.inputs.iter() {
                let value = self
                    .values
                    .get(&slot.value)
                    .ok_or(Error::UnknownValue(slot.value))?;
                if let Some(stage) = slot.stages.iter().find(|stage| !value.stages.contains(*stage)) {
                    return Err(Error::MissingStageLinkage {
                        value: value.name.clone(),
                        node: node.name.clone(),
                        slot: name.clone(),
                        stage,
                    });
                }
            }
        }
        Ok(())
    }

    /// Generate both stage sources. The result is kept for binding until the graph changes.
    pub fn build(&mut self) -> Result<&ProgramSource, Error> {
        let root = self.root.ok_or(Error::NoRoot)?;
        self.pass = None;
        // Uniforms of a new program start unset.
        self.pushed.clear();

        let mut pass = BuildPass::default();
        self.post_order(root, &mut pass.order, &mut HashSet::new());
        let reachable: HashSet<NodeId> = pass.order.iter().copied().collect();

        pass.node_uids = pass
            .order
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index + 1))
            .collect();

        let mut next_uid = pass.order.len() + 1;
        for id in pass.order.iter() {
            let Some(node) = self.nodes.get(id) else {continue};
            let referenced = node
                .outputs
                .values()
                .chain(node.inputs.values().map(|slot| &slot.value));
            for value in referenced.filter_map(|id| self.values.get(id)) {
                if !value.takes_suffix() {
                    return Err(Error::InvalidValueName(value.name.clone()));
                }
            }

            for slot in node.inputs.values() {
                let Some(value) = self.values.get(&slot.value) else {continue};
                if value.owner.is_none()
                    && value.scope != Scope::Inline
                    && !pass.value_uids.contains_key(&slot.value)
                {
                    pass.value_uids.insert(slot.value, next_uid);
                    next_uid += 1;
                }
            }
        }

        pass.used = self
            .values
            .iter()
            .filter(|(_, value)| {
                value
                    .consumers
                    .iter()
                    .any(|consumer| reachable.contains(&consumer.node))
            })
            .map(|(id, _)| *id)
            .collect();

        for id in pass.order.iter() {
            let Some(node) = self.nodes.get_mut(id) else {continue};
            let Node {
                kind,
                inputs,
                outputs,
                ..
            } = node;

            for output in outputs.values() {
                if let Some(value) = self.values.get_mut(output) {
                    value.owner = Some(*id);
                }
            }

            let mut ctx = PrepareCtx {
                node: *id,
                inputs,
                outputs,
                values: &mut self.values,
                pass: &pass,
                config: &self.config,
            };
            kind.as_node_mut().prepare_to_build(&mut ctx)?;
        }

        self.check_linkage(&pass.order)?;

        pass.source = ProgramSource {
            vertex: StageBuilder::new(Stage::Vertex).run(self, &pass, root)?,
            fragment: StageBuilder::new(Stage::Fragment).run(self, &pass, root)?,
        };

        tracing::debug!(
            nodes = pass.order.len(),
            vertex_bytes = pass.source.vertex.len(),
            fragment_bytes = pass.source.fragment.len(),
            "Built shader program"
        );

        Ok(&self.pass.insert(pass).source)
    }

    /// Last build, [None] when the graph changed since.
    pub fn pass(&self) -> Option<&BuildPass> {
        self.pass.as_ref()
    }

    /// Sources of the last build.
    pub fn source(&self) -> Option<&ProgramSource> {
        self.pass.as_ref().map(BuildPass::source)
    }

    /// Reference a value has in the last build, e.g. to push an application uniform.
    pub fn reference(&self, id: ValueId) -> Result<String, Error> {
        let pass = self.pass.as_ref().ok_or(Error::NotBuilt)?;
        Ok(resolve(&self.values, pass, &self.config, id)?.reference().to_owned())
    }

    /// Build if needed and hand both sources to `sink`.
    pub fn compile<C: CompileSink>(&mut self, sink: &mut C) -> Result<C::Program, Error> {
        if self.pass.is_none() {
            self.build()?;
        }
        let source = self.source().ok_or(Error::NotBuilt)?;

        sink.compile(source).map_err(|failure| {
            tracing::error!(
                "Shader program compilation failed:\n{}\nVertex stage:\n{}\nFragment stage:\n{}",
                failure.log,
                source.numbered(Stage::Vertex),
                source.numbered(Stage::Fragment)
            );
            Error::Compile {
                log: failure.log,
                vertex: source.vertex.clone(),
                fragment: source.fragment.clone(),
            }
        })
    }
}

/// Type check shared by nodes that sample textures.
pub(crate) fn require_sampler(node: &'static str, ty: GlslType) -> Result<(), Error> {
    if ty.is_sampler() {
        Ok(())
    } else {
        Err(Error::InvalidConfig {
            node,
            reason: format!("`{ty}` is not a sampler type"),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shader::{
        graph::Unvalidated,
        nodes::{
            AlphaMode, CameraDataNode, LightingNode, OperationNode, OutputNode, SplitVec4Node,
            TextureNode, VertexNode,
        },
        program::CompileFailure,
        types::Literal,
    };

    fn lit_graph() -> (Graph<Unvalidated>, NodeId, NodeId, NodeId) {
        let mut graph = Graph::default();
        let vertex = graph.add_node(VertexNode::default());
        let camera = graph.add_node(CameraDataNode::default());
        let lighting = graph.add_node(LightingNode::default());
        let output = graph.add_node(OutputNode::default());

        graph.connect(vertex, "position", camera, "vertex_position").unwrap();
        graph.connect(vertex, "position", lighting, "world_position").unwrap();
        graph.connect(vertex, "normal", lighting, "normal").unwrap();
        graph.connect(camera, "view_vector", lighting, "view_vector").unwrap();
        graph.connect(camera, "clip_position", output, "vert_position").unwrap();
        graph.connect(lighting, "result", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();

        (graph, vertex, camera, output)
    }

    #[test]
    fn single_emission() {
        let (graph, ..) = lit_graph();
        let mut graph = graph.validate().unwrap();
        let source = graph.build().unwrap().clone();

        // Vertex node is reached through three slots but emitted once per stage.
        assert_eq!(source.vertex.matches("out vec3 worldPosition1;").count(), 1);
        assert_eq!(source.vertex.matches("worldPosition1 = ").count(), 1);
        assert_eq!(source.fragment.matches("in vec3 worldPosition1;").count(), 1);
        assert_eq!(source.fragment.matches("in vec3 worldNormal1;").count(), 1);
    }

    #[test]
    fn dependency_ordering() {
        let (graph, ..) = lit_graph();
        let mut graph = graph.validate().unwrap();
        let source = graph.build().unwrap().clone();

        let world = source.vertex.find("worldPosition1 = ").unwrap();
        let clip = source.vertex.find("clipSpacePosition2 = ").unwrap();
        let position = source.vertex.find("gl_Position = ").unwrap();
        assert!(world < clip && clip < position);

        let lit = source.fragment.find("result3 = ").unwrap();
        let color = source.fragment.find("fragColor = ").unwrap();
        assert!(lit < color);
    }

    #[test]
    fn rebuilds_are_identical() {
        let (graph, ..) = lit_graph();
        let mut graph = graph.validate().unwrap();
        let first = graph.build().unwrap().clone();
        let second = graph.build().unwrap().clone();

        assert_eq!(first, second);
    }

    #[test]
    fn repeated_classes_get_distinct_references() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let first = graph.add_node(TextureNode::default());
        let second = graph.add_node(TextureNode::default());
        let mix = graph.add_node(OperationNode::new("arg1 * arg2", GlslType::Vec4));

        graph.connect(first, "color", mix, "arg1").unwrap();
        graph.connect(second, "color", mix, "arg2").unwrap();
        graph.connect(mix, "result", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        let source = graph.build().unwrap();

        assert!(source.fragment.contains("uniform sampler2D tex1;"));
        assert!(source.fragment.contains("uniform sampler2D tex2;"));
        assert!(source.fragment.contains("result3 = texColor1 * texColor2;"));
    }

    #[test]
    fn stage_linkage_is_checked() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let texture = graph.add_node(TextureNode::default());
        graph.connect(texture, "color", output, "vert_position").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        let result = graph.build().map(Clone::clone);
        assert!(
            matches!(
                &result,
                Err(Error::MissingStageLinkage { stage: Stage::Vertex, slot, .. }) if slot.as_str() == "vert_position"
            ),
            "Expected a linkage error, got `{result:?}`"
        );
        assert!(graph.pass().is_none());
    }

    #[test]
    fn orphan_uniforms_are_declared_once() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let op = graph.add_node(OperationNode::new("arg1 * arg2", GlslType::Vec4));
        let tint = graph.add_value(Value::uniform("tint", GlslType::Vec4));
        graph.set_input(op, "arg1", tint).unwrap();
        graph.set_input(op, "arg2", tint).unwrap();
        graph.connect(op, "result", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        let source = graph.build().unwrap().clone();

        assert_eq!(source.fragment.matches("uniform vec4 tint3;").count(), 1);
        assert!(source.fragment.contains("result1 = tint3 * tint3;"));
        assert_eq!(graph.reference(tint).unwrap(), "tint3");
    }

    #[test]
    fn names_ending_with_a_digit_are_rejected() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let op = graph.add_node(OperationNode::new("arg1 + arg2", GlslType::Vec4));
        let numbered = graph.add_value(Value::uniform("u1", GlslType::Vec4));
        let plain = graph.add_value(Value::uniform("u", GlslType::Vec4));
        graph.set_input(op, "arg1", numbered).unwrap();
        graph.set_input(op, "arg2", plain).unwrap();
        graph.connect(op, "result", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        let result = graph.build().map(Clone::clone);
        assert!(
            matches!(&result, Err(Error::InvalidValueName(name)) if name == "u1"),
            "Expected a name error, got `{result:?}`"
        );

        let mut graph = graph.edit();
        graph.value_mut(numbered).unwrap().name = "uA".to_owned();
        let mut graph = graph.validate().unwrap();
        graph.build().unwrap();
        assert_ne!(graph.reference(numbered).unwrap(), graph.reference(plain).unwrap());
    }

    #[test]
    fn splitter_channels() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let split = graph.add_node(SplitVec4Node::default());
        let pair = graph.add_literal(Literal::Vec2([1., 2.]));
        graph.set_input(split, "vector", pair).unwrap();
        graph.connect(split, "y", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        graph.build().unwrap();

        let inline = |channel: &str| {
            let id = graph.output(split, channel).unwrap();
            graph.value(id).unwrap().inline.clone()
        };
        assert_eq!(inline("x"), "1.0");
        assert_eq!(inline("y"), "2.0");
        assert_eq!(inline("z"), "0.0");
        assert_eq!(inline("w"), "1.0");
        assert!(graph
            .source()
            .unwrap()
            .fragment
            .contains("fragColor = vec4(2.0, 0.0, 0.0, 1.0);"));
    }

    #[test]
    fn alpha_clip() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode {
            alpha_mode: AlphaMode::Mask,
            alpha_cutoff: 0.5,
            ..Default::default()
        });
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        let fragment = graph.build().unwrap().fragment.clone();

        let clip = "    if (fragColor.a < 0.001 || fragColor.a < 0.5) {\n        discard;\n    }\n    fragColor.a = 1.0;\n";
        assert!(fragment.contains(clip), "Unexpected fragment source:\n{fragment}");
    }

    #[test]
    fn legacy_dialect() {
        let (mut graph, ..) = lit_graph();
        graph.set_config(ProgramConfig::legacy());
        let mut graph = graph.validate().unwrap();
        let source = graph.build().unwrap();

        assert!(source.vertex.starts_with("#version 110\n"));
        assert!(source.vertex.contains("attribute vec3 POSITION;"));
        assert!(source.vertex.contains("varying vec3 worldPosition1;"));
        assert!(source.fragment.contains("varying vec3 worldPosition1;"));
        assert!(source.fragment.contains("gl_FragColor = result3;"));
    }

    struct Rejecting;

    impl CompileSink for Rejecting {
        type Program = ();

        fn compile(&mut self, _source: &ProgramSource) -> Result<(), CompileFailure> {
            Err(CompileFailure {
                log: "0:1: syntax error".to_owned(),
            })
        }
    }

    #[test]
    fn compile_errors_carry_sources() {
        let (graph, ..) = lit_graph();
        let mut graph = graph.validate().unwrap();

        let Err(Error::Compile {
            log,
            vertex,
            fragment,
        }) = graph.compile(&mut Rejecting)
        else {
            panic!("Expected a compile error");
        };

        assert_eq!(log, "0:1: syntax error");
        assert!(vertex.contains("gl_Position"));
        assert!(fragment.contains("fragColor"));
    }
}

//! Free-form expression over up to four arguments.

use crate::shader::{
    build::{EmitCtx, PrepareCtx},
    graph::Error,
    json::{JsonExt, JsonObject},
    node::{CodeBuffer, InputSpec, OutputSpec, ShaderNode},
    types::{GlslType, Literal, Scope, Stages},
};

macro_rules! argument {
    ($name:literal) => {
        InputSpec {
            name: $name,
            ty: GlslType::Vec4,
            stages: Stages::FRAGMENT,
            default: Literal::Float(0.),
        }
    };
}

const INPUTS: &[InputSpec] = &[
    argument!("arg1"),
    argument!("arg2"),
    argument!("arg3"),
    argument!("arg4"),
];

const OUTPUTS: &[OutputSpec] = &[OutputSpec {
    name: "result",
    value_name: "result",
    ty: GlslType::Vec4,
    scope: Scope::Local,
    stages: Stages::FRAGMENT,
}];

/// Replace every identifier for which `lookup` has a substitute, leaving the rest untouched.
fn substitute(function: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(function.len());
    let mut chars = function.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if !(c.is_ascii_alphabetic() || c == '_') {
            result.push(c);
            continue;
        }

        let mut end = start + c.len_utf8();
        while let Some((index, c)) = chars.next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_') {
            end = index + c.len_utf8();
        }

        let identifier = &function[start..end];
        match lookup(identifier) {
            Some(replacement) => result.push_str(&replacement),
            None => result.push_str(identifier),
        }
    }

    result
}

#[derive(Clone, Debug, PartialEq)]
/// Computes `function`, in which `arg1` to `arg4` stand for the connected values.
pub struct OperationNode {
    /// Expression producing the result.
    pub function: String,
    /// Type of the result.
    pub result_type: GlslType,
    /// Evaluate in the fragment stage, otherwise in the vertex stage.
    pub is_fragment: bool,
    /// When evaluated per vertex, interpolate the result towards the fragment stage.
    pub is_varying: bool,
}

impl Default for OperationNode {
    fn default() -> Self {
        Self {
            function: "arg1".to_owned(),
            result_type: GlslType::Vec4,
            is_fragment: true,
            is_varying: true,
        }
    }
}

impl OperationNode {
    /// Registry class id.
    pub const CLASS_ID: &'static str = "operation";

    /// Fragment stage operation.
    pub fn new(function: impl Into<String>, result_type: GlslType) -> Self {
        Self {
            function: function.into(),
            result_type,
            ..Default::default()
        }
    }

    fn expression(&self, ctx: &EmitCtx<'_>) -> Result<String, Error> {
        let mut arguments = Vec::with_capacity(INPUTS.len());
        for input in INPUTS {
            arguments.push((input.name, ctx.input(input.name)?.operand()));
        }

        Ok(substitute(&self.function, |identifier| {
            arguments
                .iter()
                .find(|(name, _)| *name == identifier)
                .map(|(_, operand)| operand.clone())
        }))
    }

    fn emit(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        if ctx.is_used("result") {
            out.line(format!(
                "{} = {};",
                ctx.output("result")?.reference(),
                self.expression(ctx)?
            ));
        }
        Ok(())
    }
}

impl ShaderNode for OperationNode {
    fn class_id(&self) -> &'static str {
        Self::CLASS_ID
    }

    fn name(&self) -> &'static str {
        "Operation"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn outputs(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn output_type(&self, _output: &OutputSpec) -> GlslType {
        self.result_type
    }

    fn prepare_to_build(&mut self, ctx: &mut PrepareCtx<'_>) -> Result<(), Error> {
        let (scope, stages, reads) = match (self.is_fragment, self.is_varying) {
            (true, _) => (Scope::Local, Stages::FRAGMENT, Stages::FRAGMENT),
            (false, true) => (Scope::VaryingOut, Stages::BOTH, Stages::VERTEX),
            (false, false) => (Scope::Local, Stages::VERTEX, Stages::VERTEX),
        };

        let result = ctx.output_mut("result")?;
        result.scope = scope;
        result.stages = stages;

        for input in INPUTS {
            ctx.set_input_stages(input.name, reads)?;
        }
        Ok(())
    }

    fn execution_vertex(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        if self.is_fragment {
            return Ok(());
        }
        self.emit(ctx, out)
    }

    fn execution_fragment(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        if !self.is_fragment {
            return Ok(());
        }
        self.emit(ctx, out)
    }

    fn read(&mut self, json: &JsonObject) -> Result<(), Error> {
        let function = json.string_or("function", &self.function);
        if function.trim().is_empty() {
            return Err(Error::InvalidConfig {
                node: Self::CLASS_ID,
                reason: "empty function".to_owned(),
            });
        }

        self.function = function;
        if let Some(result_type) = json.parse("resultType")? {
            self.result_type = result_type;
        }
        self.is_fragment = json.bool_or("isFragment", self.is_fragment);
        self.is_varying = json.bool_or("isVarying", self.is_varying);
        Ok(())
    }

    fn write(&self, json: &mut JsonObject) {
        json.put("function", &self.function);
        json.put("resultType", self.result_type);
        json.put("isFragment", self.is_fragment);
        json.put("isVarying", self.is_varying);
    }
}

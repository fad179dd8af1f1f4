//! [Value] records stored in the graph arena and the [Code] view used to reference them from
//! generated source.

use super::{
    node::{Name, NodeId},
    types::{widening_fill, GlslType, Literal, Scope, Stage, Stages},
};

use paste::paste;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Index of a [Value] in its graph's arena.
pub struct ValueId(pub(crate) usize);

#[derive(Clone, Debug, PartialEq, Eq)]
/// Input slot reading a [Value].
pub struct Consumer {
    /// Consuming node.
    pub node: NodeId,
    /// Input slot of the consuming node.
    pub slot: Name,
}

#[derive(Debug, PartialEq, thiserror::Error)]
/// [Value] code generation error.
pub enum Error {
    #[error("Cannot coerce `{name}` from {from} to {to}")]
    /// Narrowing or otherwise unsupported conversion.
    TypeCoercion {
        /// Reference of the offending value.
        name: String,
        /// Type of the value.
        from: GlslType,
        /// Requested type.
        to: GlslType,
    },

    #[error("`{0}` is inline and cannot be declared")]
    /// Declaration requested for an inline value.
    InvalidScopeAccess(String),
}

#[derive(Clone, Debug, PartialEq)]
/// Typed datum flowing between nodes.
pub struct Value {
    /// Base name, suffixed with the owner's build uid when declared.
    pub name: String,
    /// Type of the datum.
    pub ty: GlslType,
    /// Declaration scope.
    pub scope: Scope,
    /// Expression used in place of a name when [Scope::Inline].
    pub inline: String,
    /// Constant components when the value is a literal.
    pub literal: Option<Literal>,
    /// Stages in which the reference is valid.
    pub stages: Stages,

    pub(crate) owner: Option<NodeId>,
    pub(crate) consumers: Vec<Consumer>,
}

impl Value {
    /// Declared value without owner.
    pub fn new(name: impl Into<String>, ty: GlslType, scope: Scope, stages: Stages) -> Self {
        Self {
            name: name.into(),
            ty,
            scope,
            inline: String::new(),
            literal: None,
            stages,
            owner: None,
            consumers: Vec::new(),
        }
    }

    /// Uniform available to both stages.
    pub fn uniform(name: impl Into<String>, ty: GlslType) -> Self {
        Self::new(name, ty, Scope::GlobalUniform, Stages::BOTH)
    }

    /// Inline expression available to both stages.
    pub fn inline(name: impl Into<String>, ty: GlslType, expression: impl Into<String>) -> Self {
        Self {
            inline: expression.into(),
            ..Self::new(name, ty, Scope::Inline, Stages::BOTH)
        }
    }

    /// Inline constant.
    pub fn literal(literal: Literal) -> Self {
        let mut value = Self::inline("literal", literal.glsl_type(), literal.code());
        value.literal = Some(literal);
        value
    }

    /// Replace the constant of a literal value, updating its type and expression.
    pub fn set_literal(&mut self, literal: Literal) {
        self.ty = literal.glsl_type();
        self.inline = literal.code();
        self.literal = Some(literal);
    }

    /// Node whose output this is.
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    /// Input slots currently reading this value, in connection order.
    pub fn consumers(&self) -> &[Consumer] {
        &self.consumers
    }

    /// Whether at least one slot reads this value.
    pub fn is_used(&self) -> bool {
        !self.consumers.is_empty()
    }

    pub(crate) fn add_consumer(&mut self, node: NodeId, slot: &Name) {
        if !self
            .consumers
            .iter()
            .any(|consumer| consumer.node == node && &consumer.slot == slot)
        {
            self.consumers.push(Consumer {
                node,
                slot: slot.clone(),
            });
        }
    }

    pub(crate) fn remove_consumer(&mut self, node: NodeId, slot: &Name) {
        self.consumers
            .retain(|consumer| !(consumer.node == node && &consumer.slot == slot));
    }

    /// Whether appending a build uid keeps the reference unique: the name must not end with a
    /// digit, otherwise `u1` with uid 6 and `u` with uid 16 would both read `u16`.
    pub fn takes_suffix(&self) -> bool {
        self.scope == Scope::Inline
            || self
                .name
                .chars()
                .last()
                .is_some_and(|last| !last.is_ascii_digit())
    }

    /// Reference of the value given the build uid of its owner.
    pub fn reference(&self, uid: Option<usize>) -> String {
        match (self.scope, uid) {
            (Scope::Inline, _) => self.inline.clone(),
            (_, Some(uid)) => format!("{}{uid}", self.name),
            (_, None) => self.name.clone(),
        }
    }
}

/// Generate the `as_<type>` widening accessors of [Code].
macro_rules! widening_accessors {
    ($($ty:ident),+ $(,)?) => {
        paste! {
            $(
                #[doc = concat!("Reference converted to `", stringify!($ty), "`, widening if needed.")]
                pub fn [<as_ $ty:lower>](&self) -> Result<String, Error> {
                    self.widened(GlslType::$ty)
                }
            )+
        }
    };
}

#[derive(Clone, Debug)]
/// Resolved reference to a [Value] for one build pass.
pub struct Code<'a> {
    value: &'a Value,
    reference: String,
    modern: bool,
}

impl<'a> Code<'a> {
    pub(crate) fn new(value: &'a Value, uid: Option<usize>, modern: bool) -> Self {
        Self {
            value,
            reference: value.reference(uid),
            modern,
        }
    }

    /// Underlying value.
    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// Type of the value.
    pub fn ty(&self) -> GlslType {
        self.value.ty
    }

    /// Name or expression to use at a reference site.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Reference wrapped in parentheses unless it is a plain identifier or constant.
    pub fn operand(&self) -> String {
        if self
            .reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.reference.clone()
        } else {
            format!("({})", self.reference)
        }
    }

    /// Type followed by the reference, e.g. `vec4 texColor3`.
    pub fn typed_ref(&self) -> String {
        format!("{} {}", self.value.ty, self.reference)
    }

    /// Declaration in the stage that produces the value.
    pub fn declaration(&self) -> Result<String, Error> {
        let stage = if self.value.scope == Scope::VaryingIn {
            Stage::Fragment
        } else {
            Stage::Vertex
        };
        match self.declaration_for(stage)? {
            Some(declaration) => Ok(declaration),
            None => self
                .declaration_for(Stage::Fragment)?
                .ok_or_else(|| Error::InvalidScopeAccess(self.reference.clone())),
        }
    }

    /// Declaration of the value in `stage`, [None] when the value does not exist there.
    pub fn declaration_for(&self, stage: Stage) -> Result<Option<String>, Error> {
        if self.value.scope == Scope::Inline {
            return Err(Error::InvalidScopeAccess(self.reference.clone()));
        }
        if !self.value.stages.contains(stage) {
            return Ok(None);
        }

        Ok(self
            .value
            .scope
            .qualifier(stage, self.modern)
            .map(|qualifier| match qualifier {
                "" => format!("{};", self.typed_ref()),
                qualifier => format!("{qualifier} {};", self.typed_ref()),
            }))
    }

    widening_accessors!(Float, Vec2, Vec3, Vec4);

    /// Reference converted to `target`, widening float scalars and vectors.
    pub fn widened(&self, target: GlslType) -> Result<String, Error> {
        let from = self.value.ty;
        if from == target {
            return Ok(self.reference.clone());
        }

        let error = || Error::TypeCoercion {
            name: self.reference.clone(),
            from,
            to: target,
        };
        let (Some(from_arity), Some(to_arity)) = (from.arity(), target.arity()) else {
            return Err(error());
        };
        if from_arity > to_arity {
            return Err(error());
        }

        let fill = (from_arity..to_arity).map(widening_fill);

        if let Some(mut components) = self.value.literal.and_then(|literal| literal.components()) {
            components.extend(fill);
            return Literal::from_components(&components)
                .map(|literal| literal.code())
                .ok_or_else(error);
        }

        Ok(format!(
            "{target}({}, {})",
            self.reference,
            fill.map(super::types::fmt_float)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }
}

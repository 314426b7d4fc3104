use serde::Serialize;

use crate::codegen::{Segment, Template};
use crate::error::{CompileError, Result};
use crate::ir::{Allocation, BufferSpace, Placeholder, PlaceholderTable};

/// Name of the runtime metadata parameter every kernel receives.
pub const META_BUFFER_NAME: &str = "meta_buffer";

/// What a `%%LOAD_BUFFER(role)%%` token stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferValue {
    /// Pointer to a variable's region.
    Buffer(Allocation),
    /// Integer metadata such as an extent or a stride.
    Scalar(Placeholder),
}

impl From<Allocation> for BufferValue {
    fn from(allocation: Allocation) -> Self {
        BufferValue::Buffer(allocation)
    }
}

impl From<&Allocation> for BufferValue {
    fn from(allocation: &Allocation) -> Self {
        BufferValue::Buffer(allocation.clone())
    }
}

impl From<Placeholder> for BufferValue {
    fn from(value: Placeholder) -> Self {
        BufferValue::Scalar(value)
    }
}

impl From<&Placeholder> for BufferValue {
    fn from(value: &Placeholder) -> Self {
        BufferValue::Scalar(value.clone())
    }
}

impl From<i64> for BufferValue {
    fn from(value: i64) -> Self {
        BufferValue::Scalar(Placeholder::Value(value))
    }
}

impl From<usize> for BufferValue {
    fn from(value: usize) -> Self {
        BufferValue::Scalar(value.into())
    }
}

/// One role the kernel actually references, with its substituted expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferBinding {
    pub role: String,
    /// Backing variable for buffer roles; `None` for scalars.
    pub variable: Option<String>,
    pub space: Option<BufferSpace>,
    pub expression: String,
}

/// A value the driver must compute once placeholders are bound and write to
/// `meta_buffer[slot]` before launching the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedValue {
    pub slot: usize,
    pub role: String,
    pub expr: Placeholder,
    pub rendered: String,
}

/// Replaces buffer and metadata tokens with backend expressions.
///
/// Roles must be registered before [`BufferInjector::inject`]. A resolved
/// buffer becomes `((float *)(dynamic_buffer + 64))`; an unresolved one reads
/// its offset from `meta_buffer[k]`.
#[derive(Debug, Clone)]
pub struct BufferInjector<'a> {
    table: &'a PlaceholderTable,
    registered: Vec<(String, BufferValue)>,
    buffers: Vec<BufferBinding>,
    unresolved: Vec<UnresolvedValue>,
}

impl<'a> BufferInjector<'a> {
    pub fn new(table: &'a PlaceholderTable) -> Self {
        Self {
            table,
            registered: Vec::new(),
            buffers: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Registers `role`, replacing any earlier value for it.
    pub fn register(&mut self, role: impl Into<String>, value: impl Into<BufferValue>) -> &mut Self {
        let role = role.into();
        let value = value.into();
        match self.registered.iter_mut().find(|(name, _)| *name == role) {
            Some((_, existing)) => *existing = value,
            None => self.registered.push((role, value)),
        }
        self
    }

    pub fn is_registered(&self, role: &str) -> bool {
        self.registered.iter().any(|(name, _)| name == role)
    }

    /// Substitutes every load and meta token; `%%FUNC_NAME%%` is left alone.
    ///
    /// Fails with `UnknownBufferRole` before producing anything if the
    /// template references a role that was never registered.
    pub fn inject(&mut self, template: &Template) -> Result<Template> {
        for role in template.roles() {
            if !self.is_registered(role) {
                return Err(CompileError::UnknownBufferRole {
                    role: role.to_string(),
                    registered: self
                        .registered
                        .iter()
                        .map(|(name, _)| name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        let mut segments = Vec::with_capacity(template.segments().len());
        for segment in template.segments() {
            let replaced = match segment {
                Segment::LoadBuffer(role) => Segment::Literal(self.expression_for(role)?),
                Segment::MetaBuffer => Segment::Literal(META_BUFFER_NAME.to_string()),
                other => other.clone(),
            };
            segments.push(replaced);
        }
        Ok(Template::from_segments(segments))
    }

    /// Roles used so far, in first-use order.
    pub fn buffers(&self) -> &[BufferBinding] {
        &self.buffers
    }

    /// Metadata slots in slot order.
    pub fn unresolved_values(&self) -> &[UnresolvedValue] {
        &self.unresolved
    }

    pub fn into_parts(self) -> (Vec<BufferBinding>, Vec<UnresolvedValue>) {
        (self.buffers, self.unresolved)
    }

    fn expression_for(&mut self, role: &str) -> Result<String> {
        if let Some(binding) = self.buffers.iter().find(|binding| binding.role == role) {
            return Ok(binding.expression.clone());
        }

        let value = self
            .registered
            .iter()
            .find(|(name, _)| name == role)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| CompileError::UnknownBufferRole {
                role: role.to_string(),
                registered: String::new(),
            })?;

        let binding = match value {
            BufferValue::Buffer(allocation) => {
                let offset = match self.table.evaluate(&allocation.offset)? {
                    Some(offset) => offset.to_string(),
                    None => self.meta_reference(role, &allocation.offset),
                };
                BufferBinding {
                    role: role.to_string(),
                    variable: Some(allocation.name.clone()),
                    space: Some(allocation.space),
                    expression: format!(
                        "((float *)({} + {offset}))",
                        allocation.space.buffer_name()
                    ),
                }
            }
            BufferValue::Scalar(expr) => {
                let expression = match self.table.evaluate(&expr)? {
                    Some(value) => value.to_string(),
                    None => self.meta_reference(role, &expr),
                };
                BufferBinding {
                    role: role.to_string(),
                    variable: None,
                    space: None,
                    expression,
                }
            }
        };

        let expression = binding.expression.clone();
        self.buffers.push(binding);
        Ok(expression)
    }

    fn meta_reference(&mut self, role: &str, expr: &Placeholder) -> String {
        let slot = self.unresolved.len();
        self.unresolved.push(UnresolvedValue {
            slot,
            role: role.to_string(),
            expr: expr.clone(),
            rendered: self.table.render(expr),
        });
        format!("{META_BUFFER_NAME}[{slot}]")
    }
}

#[cfg(test)]
mod tests {
    use super::BufferInjector;
    use crate::codegen::Template;
    use crate::error::CompileError;
    use crate::ir::{Allocation, BufferSpace, Placeholder, PlaceholderTable, VariableId};

    fn allocation(offset: Placeholder) -> Allocation {
        Allocation {
            variable: VariableId(0),
            name: "x".to_string(),
            space: BufferSpace::Dynamic,
            offset,
            size: Placeholder::Value(64),
        }
    }

    #[test]
    fn resolved_roles_become_literals() {
        let table = PlaceholderTable::new();
        let mut injector = BufferInjector::new(&table);
        injector
            .register("k_X", allocation(Placeholder::Value(64)))
            .register("k_N", 12usize);

        let template = Template::parse("X = %%LOAD_BUFFER(k_X)%%; N = %%LOAD_BUFFER(k_N)%%; M = %%META_BUFFER%%");
        let injected = injector.inject(&template).expect("inject");
        assert_eq!(
            injected.render(),
            "X = ((float *)(dynamic_buffer + 64)); N = 12; M = meta_buffer"
        );
        assert!(injected.is_fully_resolved());
        assert_eq!(injector.buffers().len(), 2);
        assert!(injector.unresolved_values().is_empty());
    }

    #[test]
    fn unresolved_roles_read_metadata() {
        let mut table = PlaceholderTable::new();
        let n = table.create("N");
        let mut injector = BufferInjector::new(&table);
        injector
            .register("k_X", allocation(Placeholder::symbol(n) * 16i64))
            .register("k_N", Placeholder::symbol(n));

        let template = Template::parse("%%LOAD_BUFFER(k_X)%% %%LOAD_BUFFER(k_N)%% %%LOAD_BUFFER(k_X)%%");
        let injected = injector.inject(&template).expect("inject");
        assert_eq!(
            injected.render(),
            "((float *)(dynamic_buffer + meta_buffer[0])) meta_buffer[1] ((float *)(dynamic_buffer + meta_buffer[0]))"
        );
        let unresolved = injector.unresolved_values();
        assert_eq!(unresolved.len(), 2);
        assert_eq!(unresolved[0].role, "k_X");
        assert_eq!(unresolved[0].rendered, "N * 16");
        assert_eq!(unresolved[1].slot, 1);
    }

    #[test]
    fn unknown_role_fails_before_substitution() {
        let table = PlaceholderTable::new();
        let mut injector = BufferInjector::new(&table);
        injector.register("k_X", 4usize);

        let template = Template::parse("%%LOAD_BUFFER(k_X)%% %%LOAD_BUFFER(k_Y)%%");
        let err = injector.inject(&template).expect_err("k_Y is missing");
        assert!(matches!(err, CompileError::UnknownBufferRole { ref role, .. } if role == "k_Y"));
        assert!(injector.buffers().is_empty());
    }

    #[test]
    fn token_free_templates_pass_through() {
        let table = PlaceholderTable::new();
        let mut injector = BufferInjector::new(&table);
        let template = Template::parse("int main() { return 0; }");
        let once = injector.inject(&template).expect("inject");
        let twice = injector.inject(&once).expect("inject");
        assert_eq!(once, template);
        assert_eq!(twice, template);
    }
}

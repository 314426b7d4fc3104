use crate::codegen::{Segment, Template};
use crate::ir::Operator;

/// Entry-point name for an operator's kernel: `{kind}_{name}_{id}`.
///
/// The operator id keeps names unique even when user-facing names collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelNameInjector {
    name: String,
}

impl KernelNameInjector {
    pub fn new(operator: &Operator) -> Self {
        Self {
            name: format!(
                "{}_{}_{}",
                snake_case(operator.kind.kind_name()),
                sanitize(&operator.name),
                operator.id.0
            ),
        }
    }

    /// For operators that emit several kernels.
    #[must_use]
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.name.push('_');
        self.name.push_str(&sanitize(suffix));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inject(&self, template: &Template) -> Template {
        Template::from_segments(template.segments().iter().map(|segment| match segment {
            Segment::FuncName => Segment::Literal(self.name.clone()),
            other => other.clone(),
        }))
    }
}

fn snake_case(kind: &str) -> String {
    let mut out = String::with_capacity(kind.len() + 4);
    let mut previous_lower = false;
    for ch in kind.chars() {
        if ch.is_ascii_uppercase() {
            if previous_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            previous_lower = false;
        } else {
            out.push(ch);
            previous_lower = ch.is_ascii_lowercase();
        }
    }
    out
}

fn sanitize(name: &str) -> String {
    let cleaned = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect::<String>();
    if cleaned.is_empty() {
        "op".to_string()
    } else {
        cleaned
    }
}

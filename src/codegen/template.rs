use std::fmt;

const FUNC_NAME_TOKEN: &str = "%%FUNC_NAME%%";
const META_BUFFER_TOKEN: &str = "%%META_BUFFER%%";
const LOAD_BUFFER_OPEN: &str = "%%LOAD_BUFFER(";
const LOAD_BUFFER_CLOSE: &str = ")%%";

/// One piece of a parsed kernel template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `%%FUNC_NAME%%`
    FuncName,
    /// `%%META_BUFFER%%`
    MetaBuffer,
    /// `%%LOAD_BUFFER(role)%%`
    LoadBuffer(String),
}

impl Segment {
    fn write_to(&self, out: &mut String) {
        match self {
            Segment::Literal(text) => out.push_str(text),
            Segment::FuncName => out.push_str(FUNC_NAME_TOKEN),
            Segment::MetaBuffer => out.push_str(META_BUFFER_TOKEN),
            Segment::LoadBuffer(role) => {
                out.push_str(LOAD_BUFFER_OPEN);
                out.push_str(role);
                out.push_str(LOAD_BUFFER_CLOSE);
            }
        }
    }
}

/// Kernel source split once into literal text and substitution tokens.
///
/// `%%` sequences that do not form a known token stay literal, so
/// `Template::parse(text).render() == text` for every input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(start) = rest.find("%%") {
            literal.push_str(&rest[..start]);
            let candidate = &rest[start..];
            match match_token(candidate) {
                Some((segment, consumed)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                    rest = &candidate[consumed..];
                }
                None => {
                    literal.push('%');
                    rest = &candidate[1..];
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    /// Builds a template from segments, merging adjacent literals.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        let mut merged: Vec<Segment> = Vec::new();
        for segment in segments {
            if let Segment::Literal(text) = &segment {
                if text.is_empty() {
                    continue;
                }
                if let Some(Segment::Literal(previous)) = merged.last_mut() {
                    previous.push_str(text);
                    continue;
                }
            }
            merged.push(segment);
        }
        Self { segments: merged }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True once every token has been substituted.
    pub fn is_fully_resolved(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Buffer roles in first-reference order, without duplicates.
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::LoadBuffer(role) = segment
                && !roles.contains(&role.as_str())
            {
                roles.push(role);
            }
        }
        roles
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            segment.write_to(&mut out);
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn match_token(text: &str) -> Option<(Segment, usize)> {
    if text.starts_with(FUNC_NAME_TOKEN) {
        return Some((Segment::FuncName, FUNC_NAME_TOKEN.len()));
    }
    if text.starts_with(META_BUFFER_TOKEN) {
        return Some((Segment::MetaBuffer, META_BUFFER_TOKEN.len()));
    }
    let body = text.strip_prefix(LOAD_BUFFER_OPEN)?;
    let role_len = body
        .bytes()
        .take_while(|byte| byte.is_ascii_alphanumeric() || *byte == b'_')
        .count();
    if role_len == 0 || !body[role_len..].starts_with(LOAD_BUFFER_CLOSE) {
        return None;
    }
    let role = body[..role_len].to_string();
    Some((
        Segment::LoadBuffer(role),
        LOAD_BUFFER_OPEN.len() + role_len + LOAD_BUFFER_CLOSE.len(),
    ))
}

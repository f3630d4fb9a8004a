//! Minimal string templates.
//!
//! `{{ expr }}` marks an expression; everything else is literal text.
//! Expressions are dotted paths into the render data, with optional array
//! indexes: `{{ question.choices[2] }}`. A template is parsed once into
//! segments and can then be rendered any number of times. Carriage returns,
//! tabs and newlines in the source render as spaces.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, UtilError};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Expr(Vec<PathStep>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PathStep {
    Field(String),
    Index(usize),
}

/// A compiled template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`.
    pub fn compile(source: &str) -> Result<Self> {
        let source: String = source
            .chars()
            .map(|c| if matches!(c, '\r' | '\t' | '\n') { ' ' } else { c })
            .collect();

        let mut segments = Vec::new();
        let mut rest = source.as_str();
        let mut offset = 0;
        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let body_start = start + 2;
            let end = rest[body_start..]
                .find("}}")
                .ok_or(UtilError::UnterminatedExpression(offset + start))?;
            let expr = rest[body_start..body_start + end].trim();
            if expr.is_empty() {
                return Err(UtilError::EmptyExpression(offset + start));
            }
            segments.push(Segment::Expr(parse_path(expr)?));
            let consumed = body_start + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        Ok(Self { segments })
    }

    /// Render against `data`. Missing paths and `null` render as nothing;
    /// strings render unquoted; other values render as JSON.
    pub fn render(&self, data: &Value) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expr(path) => match lookup(data, path) {
                    None | Some(Value::Null) => {}
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                },
            }
        }
        out
    }
}

fn parse_path(expr: &str) -> Result<Vec<PathStep>> {
    let invalid = |reason: &str| UtilError::InvalidPath {
        expr: expr.to_string(),
        reason: reason.to_string(),
    };
    let mut steps = Vec::new();
    for part in expr.split('.') {
        let (name, mut indexes) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if name.is_empty() && (steps.is_empty() || indexes.is_empty()) {
            return Err(invalid("empty path component"));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
            return Err(invalid("path components must be identifiers"));
        }
        if !name.is_empty() {
            steps.push(PathStep::Field(name.to_string()));
        }
        while !indexes.is_empty() {
            let close = indexes.find(']').ok_or_else(|| invalid("unclosed '['"))?;
            let index = indexes[1..close]
                .trim()
                .parse()
                .map_err(|_| invalid("array index must be a non-negative integer"))?;
            steps.push(PathStep::Index(index));
            indexes = &indexes[close + 1..];
            if !indexes.is_empty() && !indexes.starts_with('[') {
                return Err(invalid("unexpected text after ']'"));
            }
        }
    }
    Ok(steps)
}

fn lookup<'a>(data: &'a Value, path: &[PathStep]) -> Option<&'a Value> {
    path.iter().try_fold(data, |value, step| match step {
        PathStep::Field(name) => value.get(name.as_str()),
        PathStep::Index(i) => value.get(*i),
    })
}

/// Source of template markup by id.
pub trait TemplateSource {
    fn template_source(&self, id: &str) -> Option<String>;
}

impl TemplateSource for HashMap<String, String> {
    fn template_source(&self, id: &str) -> Option<String> {
        self.get(id).cloned()
    }
}

/// Compile-once cache of named templates.
#[derive(Debug, Default)]
pub struct TemplateCache {
    compiled: HashMap<String, Template>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The template named `id`, compiling it from `source` on first use.
    pub fn get(&mut self, id: &str, source: &dyn TemplateSource) -> Result<&Template> {
        if !self.compiled.contains_key(id) {
            let markup = source
                .template_source(id)
                .ok_or_else(|| UtilError::TemplateNotFound(id.to_string()))?;
            debug!(template = id, "compiling template");
            self.compiled.insert(id.to_string(), Template::compile(&markup)?);
        }
        self.compiled
            .get(id)
            .ok_or_else(|| UtilError::TemplateNotFound(id.to_string()))
    }

    /// Render the template named `id` against `data`.
    pub fn render(&mut self, id: &str, source: &dyn TemplateSource, data: &Value) -> Result<String> {
        Ok(self.get(id, source)?.render(data))
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Compile `source` and render it once.
pub fn render(source: &str, data: &Value) -> Result<String> {
    Ok(Template::compile(source)?.render(data))
}

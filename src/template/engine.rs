//! Template engine accepting both Jinja and Go-template field syntax
//!
//! Uses minijinja's default delimiters:
//! - Variable delimiters: `{{...}}`
//! - Block delimiters: `{%...%}`
//! - Comment delimiters: `{#...#}`
//!
//! Go templates address fields as `.Name`. Inside delimiters, a dot that
//! starts a field path is dropped before rendering so `{{.Name}}` and
//! `{{ Name }}` are equivalent.

use minijinja::{Environment, UndefinedBehavior};

use super::context::TemplateContext;
use super::error::TemplateError;

/// Renders backup path templates with strict undefined handling
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new template engine
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Render a template string with the given context
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` if:
    /// - Template syntax is invalid
    /// - A referenced value is undefined
    pub fn render(&self, template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        if !Self::has_template_syntax(template) {
            return Ok(template.to_string());
        }

        let normalized = normalize_go_field_paths(template);
        self.env
            .render_str(&normalized, ctx.to_value())
            .map_err(TemplateError::from)
    }

    /// Check if a string contains any template syntax
    pub fn has_template_syntax(s: &str) -> bool {
        s.contains("{{") || s.contains("{%") || s.contains("{#")
    }
}

/// Drop the leading dot of Go-style field paths inside `{{...}}` and `{%...%}`.
///
/// Text outside the delimiters is copied unchanged.
fn normalize_go_field_paths(template: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    while let Some((start, close)) = next_tag(remaining) {
        result.push_str(&remaining[..start + 2]); // Include the opening delimiter
        remaining = &remaining[start + 2..];

        if let Some(end) = remaining.find(close) {
            result.push_str(&strip_field_dots(&remaining[..end]));
            result.push_str(close);
            remaining = &remaining[end + close.len()..];
        } else {
            // Unterminated tag, let the parser report it
            result.push_str(remaining);
            remaining = "";
        }
    }

    result.push_str(remaining);
    result
}

/// Position of the next `{{` or `{%` and the delimiter that closes it
fn next_tag(s: &str) -> Option<(usize, &'static str)> {
    let var = s.find("{{").map(|i| (i, "}}"));
    let block = s.find("{%").map(|i| (i, "%}"));
    match (var, block) {
        (Some(v), Some(b)) => Some(if v.0 < b.0 { v } else { b }),
        (v, b) => v.or(b),
    }
}

/// Remove dots that begin a field path, skipping quoted strings.
///
/// A dot begins a field path when it follows the start of the expression,
/// whitespace, `(`, `|`, `,` or a `-` trim marker, and is followed by an
/// identifier character.
/// Attribute dots such as `Labels.team` are kept.
fn strip_field_dots(expr: &str) -> String {
    let mut result = String::with_capacity(expr.len());
    let mut chars = expr.chars().peekable();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                result.push(ch);
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                result.push(ch);
            }
            '.' if !in_single_quote && !in_double_quote => {
                let starts_path = result
                    .chars()
                    .last()
                    .map_or(true, |c| {
                        c.is_whitespace() || matches!(c, '(' | '|' | ',' | '-')
                    });
                let next_is_ident = chars
                    .peek()
                    .is_some_and(|c| c.is_alphabetic() || *c == '_');
                if !(starts_path && next_is_ident) {
                    result.push('.');
                }
            }
            _ => result.push(ch),
        }
    }

    result
}

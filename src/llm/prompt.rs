//! Prompt templates with named placeholders.
//!
//! Syntax follows the usual f-string convention: `{name}` is a placeholder,
//! `{{` and `}}` are literal braces. Values are spliced in a single pass, so a
//! schema or question that itself contains braces is inserted verbatim.

use thiserror::Error;


#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Missing value for prompt variable '{0}'")]
    MissingVariable(String),

    #[error("Unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Variable(String),
}


#[derive(Debug, Clone)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
    variables: Vec<String>,
}

impl PromptTemplate {

    pub fn new(template: &str) -> Result<Self, PromptError> {
        let mut segments = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    text.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    while let Some(&(_, next)) = chars.peek() {
                        chars.next();
                        if next == '}' {
                            closed = true;
                            break;
                        }
                        if !(next.is_alphanumeric() || next == '_') {
                            return Err(PromptError::UnbalancedBrace(pos));
                        }
                        name.push(next);
                    }
                    if !closed || name.is_empty() {
                        return Err(PromptError::UnbalancedBrace(pos));
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    if !variables.contains(&name) {
                        variables.push(name.clone());
                    }
                    segments.push(Segment::Variable(name));
                }
                '}' => return Err(PromptError::UnbalancedBrace(pos)),
                other => text.push(other),
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self { segments, variables })
    }

    /// Placeholder names in order of first appearance.
    pub fn input_variables(&self) -> &[String] {
        &self.variables
    }


    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, PromptError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| PromptError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

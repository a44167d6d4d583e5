//! Per-customer text substitution.
//!
//! Text layers carry template strings like `"{child_name} turns
//! {child_age}!"`. Substitution is a pure string operation; the pixel
//! rendering of the result is behind the pipeline's compositor trait.

/// Variables available to text-layer templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub child_name: String,
    pub child_age: Option<i32>,
    pub child_gender: Option<String>,
}

impl TemplateVars {
    /// Resolve a variable by template name.
    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "child_name" => Some(self.child_name.clone()),
            "child_age" => self.child_age.map(|a| a.to_string()),
            "child_gender" => self.child_gender.clone(),
            _ => None,
        }
    }
}

/// Substitute `{var}` placeholders in `template`.
///
/// Unknown or unset variables are left intact so that a defective
/// template is visible in the output rather than silently blanked.
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match vars.get(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unterminated brace: keep the remainder verbatim.
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

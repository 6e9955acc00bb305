use std::fmt;

const STEP_SEPARATOR: &str = " -> ";
const BRANCH_SEPARATOR: &str = " + ";

/// Diagnostic description attached to every node.
///
/// During compilation each node prefixes its own label with the merged descriptions of its
/// inputs, so the terminal node of a compiled chain describes the whole chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterTag {
    label: Option<String>,
    prefix: Option<String>,
    notes: Vec<String>,
}

impl FilterTag {
    /// Tag carrying a single label.
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            label: (!label.is_empty()).then_some(label),
            prefix: None,
            notes: Vec::new(),
        }
    }

    /// Tag without a label; describes only its inputs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Own label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Attach an extra line shown after the chain description (error messages, warnings).
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Extra lines attached with [`FilterTag::add_note`].
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Merge the descriptions of `inputs` into this tag's prefix.
    ///
    /// Identical branch descriptions are merged once; several distinct branches are grouped.
    pub fn add_prefix(&mut self, inputs: &[FilterTag]) {
        let mut branches: Vec<String> = Vec::new();
        if let Some(existing) = self.prefix.take() {
            branches.push(existing);
        }
        for tag in inputs {
            let d = tag.chain_description();
            if !d.is_empty() && !branches.contains(&d) {
                branches.push(d);
            }
        }

        self.prefix = match branches.len() {
            0 => None,
            1 => branches.pop(),
            _ => Some(format!("({})", branches.join(BRANCH_SEPARATOR))),
        };
    }

    /// One-line description of the chain up to and including this node.
    pub fn chain_description(&self) -> String {
        match (&self.prefix, &self.label) {
            (Some(p), Some(l)) => format!("{p}{STEP_SEPARATOR}{l}"),
            (Some(p), None) => p.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => String::new(),
        }
    }

    /// Full description: the chain description followed by every note on its own line.
    pub fn describe(&self) -> String {
        let mut out = self.chain_description();
        for note in &self.notes {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(note);
        }
        out
    }
}

impl fmt::Display for FilterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filter/tag.rs"]
mod tests;

//! Help documents.
//!
//! A [`HelpDocument`] is assembled from a command's static declarations every
//! time help is requested; nothing is cached on the command between calls.
//! Transports decide how to render it. [`fmt::Display`] gives a markdown-ish
//! text rendering for text-only channels.

use std::fmt;

use serde::Serialize;

use crate::tree::{CommandTree, NodeId};

/// Default accent colour (magenta).
pub const DEFAULT_ACCENT: u32 = 0xFF00FF;

/// Which part of the help a field describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpSection {
    Usage,
    Aliases,
    Flags,
    Commands,
}

impl HelpSection {
    pub fn title(self) -> &'static str {
        match self {
            HelpSection::Usage => "Usage",
            HelpSection::Aliases => "Aliases",
            HelpSection::Flags => "Flags",
            HelpSection::Commands => "Commands",
        }
    }
}

/// One named field of a help document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpField {
    pub section: HelpSection,
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl HelpField {
    fn new(section: HelpSection, value: String, inline: bool) -> Self {
        Self {
            section,
            name: section.title().to_string(),
            value,
            inline,
        }
    }
}

/// Structured help for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpDocument {
    pub title: String,
    pub description: String,
    pub accent: u32,
    pub fields: Vec<HelpField>,
}

impl HelpDocument {
    /// Build help for `id` as seen by a requester in `groups`.
    ///
    /// Children the requester may not invoke, and hidden children, are left
    /// out of the Commands field.
    pub fn build<S: AsRef<str>>(
        tree: &CommandTree,
        id: NodeId,
        groups: &[S],
        default_accent: u32,
    ) -> Self {
        let node = tree.node(id);
        let overrides = node.help_overrides();

        let mut doc = Self {
            title: overrides
                .title
                .clone()
                .unwrap_or_else(|| format!("Help: {}", node.name())),
            description: overrides
                .description
                .clone()
                .unwrap_or_else(|| node.long_text().to_string()),
            accent: overrides.accent.unwrap_or(default_accent),
            fields: Vec::new(),
        };

        if !node.usage_text().is_empty() {
            doc.fields.push(HelpField::new(
                HelpSection::Usage,
                node.usage_text().to_string(),
                false,
            ));
        }

        if !node.alias_list().is_empty() {
            doc.fields.push(HelpField::new(
                HelpSection::Aliases,
                node.alias_list().join(", "),
                false,
            ));
        }

        let schema = node.flags().schema();
        if !schema.is_empty() {
            let lines: Vec<String> = schema
                .sorted()
                .into_iter()
                .map(|f| match f.shorthand {
                    Some(c) => format!("-{c}, --{:<15} {}", f.name, f.usage),
                    None => format!("    --{:<15} {}", f.name, f.usage),
                })
                .collect();
            doc.fields
                .push(HelpField::new(HelpSection::Flags, lines.join("\n"), true));
        }

        let commands: Vec<String> = tree
            .children(id)
            .iter()
            .map(|&child| tree.node(child))
            .filter(|child| !child.is_hidden() && child.has_permission(groups))
            .map(|child| format!("{} - {}", child.name(), child.short_text()))
            .collect();
        if !commands.is_empty() {
            doc.fields.push(HelpField::new(
                HelpSection::Commands,
                commands.join("\n"),
                false,
            ));
        }

        doc
    }

    pub fn field(&self, section: HelpSection) -> Option<&HelpField> {
        self.fields.iter().find(|f| f.section == section)
    }
}

impl fmt::Display for HelpDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "**{}**", self.title)?;
        if !self.description.is_empty() {
            writeln!(f, "{}", self.description)?;
        }
        for field in &self.fields {
            writeln!(f)?;
            writeln!(f, "**{}**", field.name)?;
            match field.section {
                HelpSection::Usage => writeln!(f, "`{}`", field.value)?,
                HelpSection::Aliases => {
                    let quoted: Vec<String> =
                        field.value.split(", ").map(|a| format!("`{a}`")).collect();
                    writeln!(f, "{}", quoted.join(" "))?;
                }
                HelpSection::Flags => {
                    for line in field.value.lines() {
                        writeln!(f, "`{line}`")?;
                    }
                }
                HelpSection::Commands => {
                    for line in field.value.lines() {
                        match line.split_once(" - ") {
                            Some((name, short)) => writeln!(f, "`{name}` - {short}")?,
                            None => writeln!(f, "{line}")?,
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

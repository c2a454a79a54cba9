//! Named preset graphs bundled with the crate.
//!
//! Templates are parsed once from the embedded JSON documents and never change at
//! runtime. Hosts copy them into their own [`Composer`](crate::composer::Composer) and
//! edit the copy.

use crate::types::{ComposerError, Template};
use lazy_static::lazy_static;

// Embedded preset graphs
const TEMPLATE_TEXTS: [&str; 2] = [
    include_str!("../templates/example-912.json"),
    include_str!("../templates/n-n-plus-one.json"),
];

lazy_static! {
    /// The embedded templates, in declaration order.
    pub static ref TEMPLATES: Vec<Template> = TemplateManager::parse_embedded();
}

pub struct TemplateManager;

impl TemplateManager {
    /// Checks that every embedded template parses and returns how many are available.
    ///
    /// The registry itself is built lazily on first access; templates that fail to parse
    /// are skipped there, so hosts call this once at startup to surface the error.
    pub fn load() -> Result<usize, ComposerError> {
        for text in TEMPLATE_TEXTS {
            Self::parse_template(text)?;
        }
        Ok(Self::get_template_count())
    }

    /// Parses a template document, sanitizing the pseudocode of its custom blocks.
    pub fn parse_template(text: &str) -> Result<Template, ComposerError> {
        let mut template: Template = serde_json::from_str(text)?;
        let graph = template.graph().sanitized();
        template.nodes = graph.nodes;
        Ok(template)
    }

    fn parse_embedded() -> Vec<Template> {
        TEMPLATE_TEXTS
            .iter()
            .filter_map(|text| match Self::parse_template(text) {
                Ok(template) => Some(template),
                Err(e) => {
                    log::error!("Failed to parse embedded template: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Returns a copy of every embedded template.
    pub fn all() -> Vec<Template> {
        TEMPLATES.clone()
    }

    /// Get the number of available templates
    pub fn get_template_count() -> usize {
        TEMPLATES.len()
    }

    /// Get a template by its index
    pub fn get_template_by_index(index: usize) -> Result<Template, ComposerError> {
        TEMPLATES.get(index).cloned().ok_or_else(|| {
            ComposerError::TemplateNotFound(format!("index {} out of range", index))
        })
    }

    /// Get a template by its id
    pub fn get_template_by_id(id: &str) -> Result<Template, ComposerError> {
        TEMPLATES
            .iter()
            .find(|template| template.id == id)
            .cloned()
            .ok_or_else(|| ComposerError::TemplateNotFound(id.to_string()))
    }

    /// List all template ids
    pub fn list_template_ids() -> Vec<String> {
        TEMPLATES
            .iter()
            .map(|template| template.id.clone())
            .collect()
    }

    /// Get summary information about a template by its index
    pub fn get_template_info(index: usize) -> Result<TemplateInfo, ComposerError> {
        let template = Self::get_template_by_index(index)?;

        Ok(TemplateInfo {
            index,
            source_count: template.graph().sources().count(),
            node_count: template.nodes.len(),
            edge_count: template.edges.len(),
            id: template.id,
            name: template.name,
            description: template.description,
        })
    }

    /// Search for templates whose id or name contains `query`, ignoring case
    pub fn search_templates(query: &str) -> Vec<usize> {
        let query = query.to_lowercase();

        TEMPLATES
            .iter()
            .enumerate()
            .filter(|(_, template)| {
                template.id.to_lowercase().contains(&query)
                    || template.name.to_lowercase().contains(&query)
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Get the embedded JSON text of a template by its index
    pub fn get_template_text_by_index(index: usize) -> Result<&'static str, ComposerError> {
        TEMPLATE_TEXTS.get(index).copied().ok_or_else(|| {
            ComposerError::TemplateNotFound(format!("text index {} out of range", index))
        })
    }
}

#[derive(Debug, Clone)]
pub struct TemplateInfo {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub description: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub source_count: usize,
}

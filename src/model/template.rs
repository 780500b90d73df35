use serde::Serialize;

use super::types::InType;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TemplateField {
    #[serde(rename = "type")]
    pub in_type: InType,
    pub name: String,
}

/// Structural identity of a template: the ordered field list itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey(Vec<TemplateField>);

impl TemplateKey {
    pub fn new(fields: Vec<TemplateField>) -> Self {
        TemplateKey(fields)
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.0
    }
}

/// An ordered parameter list shared by every event with the same fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataTemplate {
    id: String,
    fields: Vec<TemplateField>,
}

impl DataTemplate {
    pub(crate) fn new(fields: Vec<TemplateField>) -> Self {
        DataTemplate {
            id: structural_id(&fields),
            fields,
        }
    }

    /// A stable name derived from the field list, identical across runs.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }
}

fn structural_id(fields: &[TemplateField]) -> String {
    let mut hasher = crc32fast::Hasher::new();
    for field in fields {
        hasher.update(field.in_type.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(field.name.as_bytes());
        hasher.update(&[0]);
    }
    format!("tid_{:08x}_{}", hasher.finalize(), fields.len())
}

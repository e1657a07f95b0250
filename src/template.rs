//! Certificate templates and the fields each one needs.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Errors raised while building a document request from a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// The record names no template at all.
    #[error("certificate details do not name a template")]
    Missing,

    /// The named template is not registered.
    #[error("unknown certificate template: {0}")]
    Unknown(String),
}

/// Body of a document-generation request: `templateName` plus the fields
/// the template requires.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRequest {
    pub template_name: String,
    pub fields: Map<String, Value>,
    /// Suggested download name, `"{fullName} {templateName}.docx"`.
    pub file_name: String,
}

impl DocumentRequest {
    /// JSON body sent to the generator endpoint.
    pub fn to_body(&self) -> Value {
        let mut body = self.fields.clone();
        body.insert(
            "templateName".to_string(),
            Value::String(self.template_name.clone()),
        );
        Value::Object(body)
    }
}

/// Maps template names to the detail fields they require.
///
/// # Examples
///
/// ```
/// use barangay_sync::TemplateTable;
///
/// let table = TemplateTable::default()
///     .with_template("residency", ["fullName", "purok", "yearsOfResidency"]);
/// assert!(table.fields("residency").is_some());
/// assert!(table.fields("indigency").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct TemplateTable {
    templates: BTreeMap<String, Vec<String>>,
}

impl Default for TemplateTable {
    fn default() -> Self {
        let personal = ["fullName", "age", "purok", "maritalStatus", "purpose"];
        Self::empty()
            .with_template("indigency", personal)
            .with_template("good_moral", personal)
            .with_template("clearance", ["name", "purpose", "date_issued"])
    }
}

impl TemplateTable {
    /// A table with no templates registered.
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Register or replace a template.
    pub fn with_template<I, S>(mut self, name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.templates
            .insert(name.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Required fields of a template, if registered.
    pub fn fields(&self, template: &str) -> Option<&[String]> {
        self.templates.get(template).map(Vec::as_slice)
    }

    /// Build the generator request for a record's certificate details.
    ///
    /// The template name comes from `templateName`, falling back to
    /// `template`. Required fields absent from the details are sent as
    /// `null` so the generator reports them itself.
    ///
    /// # Errors
    ///
    /// [`TemplateError::Missing`] when neither key is present,
    /// [`TemplateError::Unknown`] when the template is not registered.
    pub fn document_request(
        &self,
        details: &Map<String, Value>,
    ) -> Result<DocumentRequest, TemplateError> {
        let template_name = ["templateName", "template"]
            .iter()
            .find_map(|key| details.get(*key).and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .ok_or(TemplateError::Missing)?;

        let required = self
            .fields(template_name)
            .ok_or_else(|| TemplateError::Unknown(template_name.to_string()))?;

        let fields = required
            .iter()
            .map(|field| {
                let value = details.get(field).cloned().unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect();

        let holder = details
            .get("fullName")
            .or_else(|| details.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("certificate");

        Ok(DocumentRequest {
            template_name: template_name.to_string(),
            fields,
            file_name: format!("{holder} {template_name}.docx"),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn details(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn builds_request_with_required_fields_only() {
        let table = TemplateTable::default();
        let request = table
            .document_request(&details(json!({
                "templateName": "clearance",
                "name": "Maria Santos",
                "purpose": "Employment",
                "date_issued": "2025-02-01",
                "unrelated": "dropped"
            })))
            .expect("clearance request should build");

        assert_eq!(request.template_name, "clearance");
        assert_eq!(request.fields.len(), 3);
        assert!(!request.fields.contains_key("unrelated"));
        assert_eq!(request.file_name, "Maria Santos clearance.docx");
        assert_eq!(
            request.to_body(),
            json!({
                "templateName": "clearance",
                "name": "Maria Santos",
                "purpose": "Employment",
                "date_issued": "2025-02-01"
            })
        );
    }

    #[test]
    fn falls_back_to_template_key() {
        let table = TemplateTable::default();
        let request = table
            .document_request(&details(json!({
                "template": "good_moral",
                "fullName": "Jose Rizal"
            })))
            .expect("fallback key should be honoured");
        assert_eq!(request.template_name, "good_moral");
        assert_eq!(request.fields["age"], Value::Null);
        assert_eq!(request.file_name, "Jose Rizal good_moral.docx");
    }

    #[test]
    fn missing_template_name() {
        let table = TemplateTable::default();
        let err = table
            .document_request(&details(json!({"fullName": "A"})))
            .unwrap_err();
        assert_eq!(err, TemplateError::Missing);
    }

    #[test]
    fn unknown_template_name() {
        let table = TemplateTable::default();
        let err = table
            .document_request(&details(json!({"templateName": "ownership"})))
            .unwrap_err();
        assert_eq!(err, TemplateError::Unknown("ownership".into()));
    }

    #[test]
    fn registered_template_is_usable() {
        let table = TemplateTable::default().with_template("ownership", ["fullName", "lotNumber"]);
        let request = table
            .document_request(&details(json!({
                "templateName": "ownership",
                "fullName": "Ana Reyes",
                "lotNumber": "12-B"
            })))
            .expect("registered template should build");
        assert_eq!(request.fields["lotNumber"], json!("12-B"));
    }
}

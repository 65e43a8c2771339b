//! Library of reusable CRF variables and form templates.
//!
//! # Responsibility
//! - Own identity and definition of every Variable and Form.
//! - Provide pure add/update/remove edits that return the next store value.
//!
//! # Invariants
//! - Variable ids are unique; form ids are unique.
//! - Every id listed by a Form resolves to a Variable in the same store.
//! - `select`/`radio` variables carry a non-empty `options` list.
//! - A failed edit returns an error and never yields a partial store.

use crate::model::error::{EntityKind, ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Field type of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Text,
    Number,
    Date,
    Select,
    Radio,
}

impl VariableType {
    /// Whether values are picked from `options`.
    pub fn requires_options(self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

/// Reusable field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Stable identity key, e.g. `PK_DATE`.
    pub id: String,
    /// Display text.
    pub label: String,
    #[serde(rename = "type")]
    pub kind: VariableType,
    /// Ordered choices. Absent and empty are distinct on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Free-text input hint such as a date pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Variable {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: VariableType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            options: None,
            format: None,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Checks definition-level rules that do not depend on the store.
    pub fn validate(&self) -> ModelResult<()> {
        if self.id.trim().is_empty() {
            return Err(ModelError::invalid("variable id must not be blank"));
        }
        if self.kind.requires_options()
            && self.options.as_ref().map_or(true, |options| options.is_empty())
        {
            return Err(ModelError::invalid(format!(
                "variable {} of type {:?} requires at least one option",
                self.id, self.kind
            )));
        }
        Ok(())
    }
}

/// Layout of a form template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    /// Flat list of fields.
    Standard,
    /// Header fields plus repeating rows of column fields.
    Grid,
}

/// Form template composed of library variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FormType,
    /// All fields for `standard`; per-row column fields for `grid`.
    #[serde(default)]
    pub variable_ids: Vec<String>,
    /// Fields shown once per grid instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_variable_ids: Option<Vec<String>>,
    /// Row labels seeding a new grid instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rows: Option<Vec<String>>,
}

impl Form {
    pub fn standard<I, S>(id: impl Into<String>, name: impl Into<String>, variable_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            kind: FormType::Standard,
            variable_ids: variable_ids.into_iter().map(Into::into).collect(),
            header_variable_ids: None,
            default_rows: None,
        }
    }

    pub fn grid(
        id: impl Into<String>,
        name: impl Into<String>,
        header_variable_ids: Vec<String>,
        column_variable_ids: Vec<String>,
        default_rows: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: FormType::Grid,
            variable_ids: column_variable_ids,
            header_variable_ids: Some(header_variable_ids),
            default_rows: Some(default_rows),
        }
    }

    pub fn is_grid(&self) -> bool {
        self.kind == FormType::Grid
    }

    /// Header field ids, empty for forms without a header.
    pub fn header_ids(&self) -> &[String] {
        self.header_variable_ids.as_deref().unwrap_or_default()
    }

    /// Default grid row labels, empty when unset.
    pub fn default_row_labels(&self) -> &[String] {
        self.default_rows.as_deref().unwrap_or_default()
    }

    /// Every referenced variable id: header fields first, then body/columns.
    pub fn referenced_variable_ids(&self) -> impl Iterator<Item = &String> {
        self.header_ids().iter().chain(self.variable_ids.iter())
    }

    pub fn references_variable(&self, variable_id: &str) -> bool {
        self.referenced_variable_ids().any(|id| id == variable_id)
    }
}

/// Catalog of reusable variables and forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStore {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub forms: Vec<Form>,
}

impl LibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard catalog used to seed new projects.
    pub fn default_library() -> Self {
        let rows = |labels: &[&str]| -> Vec<String> {
            labels.iter().map(|label| label.to_string()).collect()
        };
        Self {
            variables: vec![
                Variable::new("SUBJID", "Subject ID", VariableType::Text),
                Variable::new("BRTHDAT", "Date of Birth", VariableType::Date)
                    .with_format("YYYY-MM-DD"),
                Variable::new("AGE", "Age (years)", VariableType::Number),
                Variable::new("SEX", "Sex", VariableType::Radio).with_options(["Male", "Female"]),
                Variable::new("PK_DATE", "Sampling Date", VariableType::Date)
                    .with_format("YYYY-MM-DD"),
                Variable::new("PK_TIME", "Sampling Time", VariableType::Text).with_format("HH:MM"),
                Variable::new("PK_DONE", "Sample Collected", VariableType::Select)
                    .with_options(["Yes", "No"]),
            ],
            forms: vec![
                Form::standard("DM", "Demographics", ["SUBJID", "BRTHDAT", "AGE", "SEX"]),
                Form::grid(
                    "PK",
                    "PK Sampling",
                    rows(&["PK_DATE"]),
                    rows(&["PK_TIME", "PK_DONE"]),
                    rows(&["T0", "T1"]),
                ),
            ],
        }
    }

    pub fn variable(&self, id: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.id == id)
    }

    pub fn form(&self, id: &str) -> Option<&Form> {
        self.forms.iter().find(|form| form.id == id)
    }

    pub fn contains_variable(&self, id: &str) -> bool {
        self.variable(id).is_some()
    }

    pub fn contains_form(&self, id: &str) -> bool {
        self.form(id).is_some()
    }

    /// Forms whose header or body lists `variable_id`, in library order.
    pub fn forms_referencing<'a>(&'a self, variable_id: &'a str) -> impl Iterator<Item = &'a Form> {
        self.forms
            .iter()
            .filter(move |form| form.references_variable(variable_id))
    }

    /// Adds one variable.
    ///
    /// # Errors
    /// - `DuplicateId` when the id is already present.
    /// - `InvalidOperation` when the definition is invalid.
    pub fn add_variable(&self, variable: Variable) -> ModelResult<Self> {
        variable.validate()?;
        if self.contains_variable(&variable.id) {
            return Err(ModelError::duplicate(EntityKind::Variable, variable.id));
        }
        let mut next = self.clone();
        next.variables.push(variable);
        Ok(next)
    }

    /// Replaces the definition stored under `variable.id`.
    pub fn update_variable(&self, variable: Variable) -> ModelResult<Self> {
        variable.validate()?;
        let index = self
            .variable_index(&variable.id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Variable, variable.id.as_str()))?;
        let mut next = self.clone();
        next.variables[index] = variable;
        Ok(next)
    }

    /// Removes one variable that no form references.
    ///
    /// # Errors
    /// - `NotFound` when the id is absent.
    /// - `ReferentialIntegrity` naming the first referencing form.
    pub fn remove_variable(&self, variable_id: &str) -> ModelResult<Self> {
        let index = self
            .variable_index(variable_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Variable, variable_id))?;
        if let Some(form) = self.forms_referencing(variable_id).next() {
            return Err(ModelError::ReferentialIntegrity {
                kind: EntityKind::Variable,
                id: variable_id.to_string(),
                referenced_by: EntityKind::Form,
                referrer_id: form.id.clone(),
            });
        }
        let mut next = self.clone();
        next.variables.remove(index);
        Ok(next)
    }

    /// Removes one variable and strips it from every form that lists it.
    pub fn remove_variable_cascade(&self, variable_id: &str) -> ModelResult<Self> {
        let index = self
            .variable_index(variable_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Variable, variable_id))?;
        let mut next = self.clone();
        next.variables.remove(index);
        for form in &mut next.forms {
            form.variable_ids.retain(|id| id != variable_id);
            if let Some(header) = form.header_variable_ids.as_mut() {
                header.retain(|id| id != variable_id);
            }
        }
        Ok(next)
    }

    /// Adds one form whose variable references all resolve.
    ///
    /// # Errors
    /// - `DuplicateId` when the form id is already present.
    /// - `DanglingReference` for the first unknown variable id.
    pub fn add_form(&self, form: Form) -> ModelResult<Self> {
        self.check_form(&form)?;
        if self.contains_form(&form.id) {
            return Err(ModelError::duplicate(EntityKind::Form, form.id));
        }
        let mut next = self.clone();
        next.forms.push(form);
        Ok(next)
    }

    /// Replaces the form stored under `form.id`.
    pub fn update_form(&self, form: Form) -> ModelResult<Self> {
        let index = self
            .form_index(&form.id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Form, form.id.as_str()))?;
        self.check_form(&form)?;
        let mut next = self.clone();
        next.forms[index] = form;
        Ok(next)
    }

    /// Removes one form. Tree references are checked by the project aggregate.
    pub fn remove_form(&self, form_id: &str) -> ModelResult<Self> {
        let index = self
            .form_index(form_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Form, form_id))?;
        let mut next = self.clone();
        next.forms.remove(index);
        Ok(next)
    }

    /// Validates the whole store as loaded from an external document.
    pub fn validate(&self) -> ModelResult<()> {
        let mut seen = HashSet::new();
        for variable in &self.variables {
            variable.validate()?;
            if !seen.insert(variable.id.as_str()) {
                return Err(ModelError::duplicate(EntityKind::Variable, variable.id.as_str()));
            }
        }

        let mut seen = HashSet::new();
        for form in &self.forms {
            self.check_form(form)?;
            if !seen.insert(form.id.as_str()) {
                return Err(ModelError::duplicate(EntityKind::Form, form.id.as_str()));
            }
        }
        Ok(())
    }

    fn check_form(&self, form: &Form) -> ModelResult<()> {
        if form.id.trim().is_empty() {
            return Err(ModelError::invalid("form id must not be blank"));
        }
        match form
            .referenced_variable_ids()
            .find(|id| !self.contains_variable(id))
        {
            Some(missing) => Err(ModelError::DanglingReference {
                from: EntityKind::Form,
                from_id: form.id.clone(),
                to: EntityKind::Variable,
                to_id: missing.clone(),
            }),
            None => Ok(()),
        }
    }

    fn variable_index(&self, id: &str) -> Option<usize> {
        self.variables.iter().position(|variable| variable.id == id)
    }

    fn form_index(&self, id: &str) -> Option<usize> {
        self.forms.iter().position(|form| form.id == id)
    }
}

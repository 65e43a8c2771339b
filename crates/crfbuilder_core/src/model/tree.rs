//! Project document tree.
//!
//! # Responsibility
//! - Hold the ordered hierarchy of document nodes that reference library forms.
//! - Provide pure insert/move/rename/delete and grid instance edits.
//! - Convert between the in-memory arena and the nested wire representation.
//!
//! # Invariants
//! - Nodes live in a flat table keyed by node id; parent/child links are ids.
//! - Every node appears exactly once, either in `roots` or in one parent's
//!   `children`, so the structure is acyclic.
//! - A node's form reference, if present, resolves in the paired library.
//! - Grid data exists only on grid-form nodes and is keyed by that form's
//!   header and column variables; row ids are unique per grid.
//! - Pre-order traversal respecting child order is the export order.

use crate::model::error::{EntityKind, ModelError, ModelResult};
use crate::model::library::{Form, LibraryStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Tree-scoped node identifier, independent of form/variable ids.
pub type NodeId = String;

/// One operator-entered grid row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRow {
    pub id: String,
    pub label: String,
    /// Column variable id -> entered value.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Node-local data entered against a grid form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridInstance {
    /// Header variable id -> entered value.
    #[serde(default)]
    pub header_values: BTreeMap<String, String>,
    #[serde(default)]
    pub rows: Vec<GridRow>,
}

impl GridInstance {
    /// Fresh instance with one empty row per default row label of `form`.
    pub fn seeded(form: &Form) -> Self {
        Self {
            header_values: BTreeMap::new(),
            rows: form
                .default_row_labels()
                .iter()
                .map(|label| GridRow {
                    id: Uuid::new_v4().to_string(),
                    label: label.clone(),
                    values: BTreeMap::new(),
                })
                .collect(),
        }
    }

    pub fn row(&self, row_id: &str) -> Option<&GridRow> {
        self.rows.iter().find(|row| row.id == row_id)
    }
}

/// Nested wire shape of one node, as stored in `data.project`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    pub id: NodeId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridInstance>,
    #[serde(default)]
    pub children: Vec<DocumentNode>,
}

/// Arena entry for one document node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: NodeId,
    pub title: String,
    pub form_id: Option<String>,
    pub grid: Option<GridInstance>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl TreeNode {
    /// Parent node id. `None` means root-level node.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Ordered document hierarchy stored as an arena of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<DocumentNode>", try_from = "Vec<DocumentNode>")]
pub struct ProjectTree {
    roots: Vec<NodeId>,
    nodes: HashMap<NodeId, TreeNode>,
}

impl ProjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, node_id: &str) -> Option<&TreeNode> {
        self.nodes.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Root-level node ids in order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Ordered children of `parent_id`, or root-level ids for `None`.
    pub fn children(&self, parent_id: Option<&str>) -> ModelResult<&[NodeId]> {
        match parent_id {
            None => Ok(&self.roots),
            Some(parent_id) => Ok(self.require(parent_id)?.children()),
        }
    }

    /// Nodes with their depth in pre-order, respecting child ordering.
    pub fn pre_order(&self) -> Vec<(usize, &TreeNode)> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, &NodeId)> =
            self.roots.iter().rev().map(|id| (0, id)).collect();
        while let Some((depth, node_id)) = stack.pop() {
            let Some(node) = self.nodes.get(node_id) else {
                continue;
            };
            ordered.push((depth, node));
            stack.extend(node.children.iter().rev().map(|id| (depth + 1, id)));
        }
        ordered
    }

    /// Nodes whose form reference equals `form_id`, in pre-order.
    pub fn nodes_referencing_form<'a>(
        &'a self,
        form_id: &'a str,
    ) -> impl Iterator<Item = &'a TreeNode> + 'a {
        self.pre_order()
            .into_iter()
            .map(|(_, node)| node)
            .filter(move |node| node.form_id.as_deref() == Some(form_id))
    }

    /// Inserts a new untyped node and returns the next tree with its id.
    ///
    /// `position` is clamped to the sibling count; `None` appends.
    ///
    /// # Errors
    /// - `NotFound` when `parent_id` is not in the tree.
    /// - `InvalidOperation` when `title` is blank.
    pub fn insert_node(
        &self,
        parent_id: Option<&str>,
        position: Option<usize>,
        title: impl Into<String>,
    ) -> ModelResult<(Self, NodeId)> {
        let title = normalize_title(title.into())?;
        if let Some(parent_id) = parent_id {
            self.require(parent_id)?;
        }

        let node_id = Uuid::new_v4().to_string();
        let mut next = self.clone();
        next.nodes.insert(
            node_id.clone(),
            TreeNode {
                id: node_id.clone(),
                title,
                form_id: None,
                grid: None,
                parent: parent_id.map(str::to_string),
                children: Vec::new(),
            },
        );
        insert_clamped(next.siblings_mut(parent_id), position, node_id.clone());
        Ok((next, node_id))
    }

    /// Re-parents one node, keeping its subtree intact.
    ///
    /// # Errors
    /// - `NotFound` for an unknown node or parent.
    /// - `Cycle` when the new parent is the node itself or a descendant.
    pub fn move_node(
        &self,
        node_id: &str,
        new_parent_id: Option<&str>,
        position: Option<usize>,
    ) -> ModelResult<Self> {
        let node = self.require(node_id)?;
        if let Some(parent_id) = new_parent_id {
            self.require(parent_id)?;
            if self.is_self_or_descendant(parent_id, node_id) {
                return Err(ModelError::Cycle {
                    node_id: node_id.to_string(),
                    parent_id: parent_id.to_string(),
                });
            }
        }

        let old_parent = node.parent.clone();
        let mut next = self.clone();
        next.siblings_mut(old_parent.as_deref())
            .retain(|id| id != node_id);
        insert_clamped(
            next.siblings_mut(new_parent_id),
            position,
            node_id.to_string(),
        );
        if let Some(moved) = next.nodes.get_mut(node_id) {
            moved.parent = new_parent_id.map(str::to_string);
        }
        Ok(next)
    }

    pub fn rename_node(&self, node_id: &str, title: impl Into<String>) -> ModelResult<Self> {
        let title = normalize_title(title.into())?;
        self.require(node_id)?;
        let mut next = self.clone();
        next.node_mut(node_id)?.title = title;
        Ok(next)
    }

    /// Points a node at a library form.
    ///
    /// A grid form seeds fresh instance data from its default rows unless the
    /// node already references the same form; a standard form clears it.
    ///
    /// # Errors
    /// - `NotFound` for an unknown node.
    /// - `DanglingReference` when `form_id` is absent from `library`.
    pub fn set_form(&self, node_id: &str, form_id: &str, library: &LibraryStore) -> ModelResult<Self> {
        let node = self.require(node_id)?;
        let form = library
            .form(form_id)
            .ok_or_else(|| ModelError::DanglingReference {
                from: EntityKind::Node,
                from_id: node_id.to_string(),
                to: EntityKind::Form,
                to_id: form_id.to_string(),
            })?;

        let grid = if !form.is_grid() {
            None
        } else if node.form_id.as_deref() == Some(form_id) && node.grid.is_some() {
            node.grid.clone()
        } else {
            Some(GridInstance::seeded(form))
        };

        let mut next = self.clone();
        let target = next.node_mut(node_id)?;
        target.form_id = Some(form_id.to_string());
        target.grid = grid;
        Ok(next)
    }

    /// Removes a node's form reference and any instance data.
    pub fn clear_form(&self, node_id: &str) -> ModelResult<Self> {
        self.require(node_id)?;
        let mut next = self.clone();
        let target = next.node_mut(node_id)?;
        target.form_id = None;
        target.grid = None;
        Ok(next)
    }

    /// Deletes a node together with its whole subtree.
    pub fn delete_node(&self, node_id: &str) -> ModelResult<Self> {
        let node = self.require(node_id)?;
        let parent = node.parent.clone();

        let mut next = self.clone();
        next.siblings_mut(parent.as_deref()).retain(|id| id != node_id);
        let mut pending = vec![node_id.to_string()];
        while let Some(current) = pending.pop() {
            if let Some(removed) = next.nodes.remove(&current) {
                pending.extend(removed.children);
            }
        }
        Ok(next)
    }

    /// Appends a grid row labelled `label` and returns its id.
    pub fn add_row(
        &self,
        node_id: &str,
        label: impl Into<String>,
        library: &LibraryStore,
    ) -> ModelResult<(Self, String)> {
        self.grid_form(node_id, library)?;
        let row_id = Uuid::new_v4().to_string();
        let mut next = self.clone();
        next.grid_mut(node_id)?.rows.push(GridRow {
            id: row_id.clone(),
            label: label.into(),
            values: BTreeMap::new(),
        });
        Ok((next, row_id))
    }

    pub fn remove_row(&self, node_id: &str, row_id: &str, library: &LibraryStore) -> ModelResult<Self> {
        self.grid_form(node_id, library)?;
        let mut next = self.clone();
        let grid = next.grid_mut(node_id)?;
        let index = grid
            .rows
            .iter()
            .position(|row| row.id == row_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Row, row_id))?;
        grid.rows.remove(index);
        Ok(next)
    }

    /// Sets one cell of a grid row.
    ///
    /// # Errors
    /// - `InvalidOperation` when the node has no grid form or `variable_id`
    ///   is not one of its column variables.
    /// - `NotFound` for an unknown node or row.
    pub fn set_cell(
        &self,
        node_id: &str,
        row_id: &str,
        variable_id: &str,
        value: impl Into<String>,
        library: &LibraryStore,
    ) -> ModelResult<Self> {
        let form = self.grid_form(node_id, library)?;
        if !form.variable_ids.iter().any(|id| id == variable_id) {
            return Err(ModelError::invalid(format!(
                "variable {variable_id} is not a column of grid form {}",
                form.id
            )));
        }

        let mut next = self.clone();
        let row = next
            .grid_mut(node_id)?
            .rows
            .iter_mut()
            .find(|row| row.id == row_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Row, row_id))?;
        row.values.insert(variable_id.to_string(), value.into());
        Ok(next)
    }

    /// Sets one header value of a grid instance.
    pub fn set_header_value(
        &self,
        node_id: &str,
        variable_id: &str,
        value: impl Into<String>,
        library: &LibraryStore,
    ) -> ModelResult<Self> {
        let form = self.grid_form(node_id, library)?;
        if !form.header_ids().iter().any(|id| id == variable_id) {
            return Err(ModelError::invalid(format!(
                "variable {variable_id} is not a header of grid form {}",
                form.id
            )));
        }

        let mut next = self.clone();
        next.grid_mut(node_id)?
            .header_values
            .insert(variable_id.to_string(), value.into());
        Ok(next)
    }

    /// Checks every node's form reference and grid data against `library`.
    ///
    /// # Errors
    /// - `DanglingReference` for an unknown form, or a header/cell keyed by a
    ///   variable that is not a header/column of the node's form.
    /// - `InvalidOperation` for grid data on a node without a grid form.
    /// - `DuplicateId` for repeated row ids within one grid.
    pub fn validate(&self, library: &LibraryStore) -> ModelResult<()> {
        for (_, node) in self.pre_order() {
            let form = match node.form_id.as_deref() {
                Some(form_id) => Some(library.form(form_id).ok_or_else(|| {
                    ModelError::DanglingReference {
                        from: EntityKind::Node,
                        from_id: node.id.clone(),
                        to: EntityKind::Form,
                        to_id: form_id.to_string(),
                    }
                })?),
                None => None,
            };
            if let Some(grid) = &node.grid {
                match form {
                    Some(form) if form.is_grid() => validate_grid(&node.id, grid, form)?,
                    Some(form) => {
                        return Err(ModelError::invalid(format!(
                            "node {} carries grid data but form {} is standard",
                            node.id, form.id
                        )));
                    }
                    None => {
                        return Err(ModelError::invalid(format!(
                            "node {} carries grid data without a form",
                            node.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn require(&self, node_id: &str) -> ModelResult<&TreeNode> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Node, node_id))
    }

    fn node_mut(&mut self, node_id: &str) -> ModelResult<&mut TreeNode> {
        self.nodes
            .get_mut(node_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Node, node_id))
    }

    fn grid_mut(&mut self, node_id: &str) -> ModelResult<&mut GridInstance> {
        Ok(self.node_mut(node_id)?.grid.get_or_insert_with(GridInstance::default))
    }

    fn siblings_mut(&mut self, parent_id: Option<&str>) -> &mut Vec<NodeId> {
        match parent_id.and_then(|id| self.nodes.get_mut(id)) {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        }
    }

    fn grid_form<'l>(&self, node_id: &str, library: &'l LibraryStore) -> ModelResult<&'l Form> {
        let node = self.require(node_id)?;
        let form_id = node.form_id.as_deref().ok_or_else(|| {
            ModelError::invalid(format!("node {node_id} has no form; grid edits need a grid form"))
        })?;
        let form = library
            .form(form_id)
            .ok_or_else(|| ModelError::DanglingReference {
                from: EntityKind::Node,
                from_id: node_id.to_string(),
                to: EntityKind::Form,
                to_id: form_id.to_string(),
            })?;
        if !form.is_grid() {
            return Err(ModelError::invalid(format!(
                "node {node_id} references standard form {form_id}; grid edits need a grid form"
            )));
        }
        Ok(form)
    }

    fn is_self_or_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == ancestor || !visited.insert(current) {
                return true;
            }
            cursor = self.nodes.get(current).and_then(TreeNode::parent);
        }
        false
    }

    fn adopt(
        &mut self,
        document: DocumentNode,
        parent: Option<&str>,
    ) -> ModelResult<NodeId> {
        if document.id.trim().is_empty() {
            return Err(ModelError::invalid("node id must not be blank"));
        }
        if self.nodes.contains_key(&document.id) {
            return Err(ModelError::duplicate(EntityKind::Node, document.id));
        }

        let node_id = document.id;
        self.nodes.insert(
            node_id.clone(),
            TreeNode {
                id: node_id.clone(),
                title: document.title,
                form_id: document.form_id,
                grid: document.grid,
                parent: parent.map(str::to_string),
                children: Vec::new(),
            },
        );
        let mut children = Vec::with_capacity(document.children.len());
        for child in document.children {
            children.push(self.adopt(child, Some(node_id.as_str()))?);
        }
        self.node_mut(&node_id)?.children = children;
        Ok(node_id)
    }

    fn to_document(&self, node_id: &str) -> Option<DocumentNode> {
        let node = self.nodes.get(node_id)?;
        Some(DocumentNode {
            id: node.id.clone(),
            title: node.title.clone(),
            form_id: node.form_id.clone(),
            grid: node.grid.clone(),
            children: node
                .children
                .iter()
                .filter_map(|child| self.to_document(child))
                .collect(),
        })
    }
}

impl TryFrom<Vec<DocumentNode>> for ProjectTree {
    type Error = ModelError;

    /// Builds the arena from nested nodes, rejecting duplicate node ids.
    fn try_from(documents: Vec<DocumentNode>) -> Result<Self, Self::Error> {
        let mut tree = Self::new();
        for document in documents {
            let node_id = tree.adopt(document, None)?;
            tree.roots.push(node_id);
        }
        Ok(tree)
    }
}

impl From<ProjectTree> for Vec<DocumentNode> {
    fn from(tree: ProjectTree) -> Self {
        tree.roots
            .iter()
            .filter_map(|root| tree.to_document(root))
            .collect()
    }
}

fn validate_grid(node_id: &str, grid: &GridInstance, form: &Form) -> ModelResult<()> {
    let dangling = |variable_id: &str| ModelError::DanglingReference {
        from: EntityKind::Node,
        from_id: node_id.to_string(),
        to: EntityKind::Variable,
        to_id: variable_id.to_string(),
    };

    if let Some(key) = grid
        .header_values
        .keys()
        .find(|key| !form.header_ids().contains(*key))
    {
        return Err(dangling(key.as_str()));
    }

    let mut row_ids = HashSet::new();
    for row in &grid.rows {
        if !row_ids.insert(row.id.as_str()) {
            return Err(ModelError::duplicate(EntityKind::Row, row.id.as_str()));
        }
        if let Some(key) = row.values.keys().find(|key| !form.variable_ids.contains(*key)) {
            return Err(dangling(key.as_str()));
        }
    }
    Ok(())
}

fn insert_clamped(siblings: &mut Vec<NodeId>, position: Option<usize>, node_id: NodeId) {
    let index = position.map_or(siblings.len(), |value| value.min(siblings.len()));
    siblings.insert(index, node_id);
}

fn normalize_title(value: String) -> ModelResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ModelError::invalid("node title must not be blank"));
    }
    Ok(trimmed.to_string())
}

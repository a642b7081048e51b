//! ProjectService: the single coordinator between HTTP handlers and the
//! core, check, compiler and storage crates.
//!
//! The service keeps one project active in memory. Requests naming another
//! project are rejected until it is loaded. Every committed mutation is
//! written to the store before the call returns: structural changes save
//! the whole project, canvas moves and connections use the row-level
//! methods.

use netforge_check::{
    apply_edit, insert_block, reconcile_in_place, validate_graph, Adjustment, EditOutcome,
    ShapeViolation,
};
use netforge_compiler::{compile_graph, Compilation, CompileOptions, ModelDescription};
use netforge_core::{
    block, BlockKind, BlockSpec, CoreError, Edge, EdgeId, Family, Node, NodeId, ShapeConfig,
    TrainingConfig,
};
use netforge_storage::{revision, Project, ProjectId, ProjectStore, ProjectSummary};

use crate::error::ApiError;
use crate::schema::graph::{
    AddEdgeRequest, EditNodeRequest, FamiliesView, GraphResponse, InsertBlockRequest,
};

pub struct ProjectService {
    store: Box<dyn ProjectStore + Send>,
    shape: ShapeConfig,
    /// The active project.
    project: Project,
}

impl ProjectService {
    /// Opens the first stored project, or creates one named "default".
    pub fn new(mut store: Box<dyn ProjectStore + Send>, shape: ShapeConfig) -> Result<Self, ApiError> {
        let id = match store.list_projects(None)?.first() {
            Some(first) => first.id,
            None => store.create_project("default", "")?,
        };
        let project = store.load_project(id)?;
        let mut service = ProjectService {
            store,
            shape,
            project,
        };
        service.reconcile_active()?;
        Ok(service)
    }

    pub fn project_id(&self) -> ProjectId {
        self.project.id
    }

    pub fn shape(&self) -> &ShapeConfig {
        &self.shape
    }

    pub fn revision(&self) -> String {
        revision(&self.project.graph, &self.project.training)
    }

    fn require_active(&self, id: ProjectId) -> Result<(), ApiError> {
        if id != self.project.id {
            return Err(ApiError::BadRequest(format!(
                "project {} is not loaded (active project is {})",
                id, self.project.id
            )));
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<(), ApiError> {
        self.store
            .save_project(self.project.id, &self.project.graph, &self.project.training)?;
        Ok(())
    }

    fn reconcile_active(&mut self) -> Result<Vec<Adjustment>, ApiError> {
        let adjustments = reconcile_in_place(&mut self.project.graph, &self.shape);
        if !adjustments.is_empty() {
            tracing::info!(
                "reconciled project {}: {} derived value(s) updated",
                self.project.id,
                adjustments.len()
            );
            self.persist()?;
        }
        Ok(adjustments)
    }

    // -----------------------------------------------------------------------
    // Registry and project management
    // -----------------------------------------------------------------------

    pub fn blocks(&self) -> &'static [BlockSpec] {
        block::all_specs()
    }

    pub fn create_project(&mut self, name: &str, owner: &str) -> Result<ProjectSummary, ApiError> {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("project name must not be empty".to_string()));
        }
        let id = self.store.create_project(name, owner)?;
        tracing::info!("created project {} ({:?})", id, name);
        Ok(ProjectSummary {
            id,
            name: name.to_string(),
            owner: owner.to_string(),
        })
    }

    pub fn list_projects(&self, owner: Option<&str>) -> Result<Vec<ProjectSummary>, ApiError> {
        Ok(self.store.list_projects(owner)?)
    }

    pub fn delete_project(&mut self, id: ProjectId) -> Result<(), ApiError> {
        if id == self.project.id {
            return Err(ApiError::BadRequest(
                "cannot delete the active project".to_string(),
            ));
        }
        self.store.delete_project(id)?;
        tracing::info!("deleted project {}", id);
        Ok(())
    }

    /// Makes `id` the active project. The loaded graph is reconciled before
    /// any edit can see it.
    pub fn load_project(&mut self, id: ProjectId) -> Result<(ProjectSummary, Vec<Adjustment>), ApiError> {
        self.project = self.store.load_project(id)?;
        tracing::info!(
            "loaded project {} ({} block(s), {} connection(s))",
            id,
            self.project.graph.node_count(),
            self.project.graph.edge_count()
        );
        let adjustments = self.reconcile_active()?;
        Ok((self.project.summary(), adjustments))
    }

    // -----------------------------------------------------------------------
    // Graph queries
    // -----------------------------------------------------------------------

    pub fn graph(&self, id: ProjectId) -> Result<GraphResponse, ApiError> {
        self.require_active(id)?;
        let doc = self.project.graph.to_document();
        Ok(GraphResponse {
            project_id: id.0,
            nodes: doc.nodes,
            edges: doc.edges,
            families: FamiliesView {
                neural: self.project.graph.family_ids(Family::Neural),
                spatial: self.project.graph.family_ids(Family::Spatial),
            },
            revision: self.revision(),
        })
    }

    pub fn node(&self, id: ProjectId, node_id: &NodeId) -> Result<Node, ApiError> {
        self.require_active(id)?;
        Ok(self.project.graph.get_node(node_id)?.clone())
    }

    pub fn check(&self, id: ProjectId) -> Result<Vec<ShapeViolation>, ApiError> {
        self.require_active(id)?;
        Ok(validate_graph(&self.project.graph, &self.shape))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn insert_block(&mut self, id: ProjectId, req: InsertBlockRequest) -> Result<Node, ApiError> {
        self.require_active(id)?;
        let kind = BlockKind::from_wire(&req.kind)
            .ok_or_else(|| CoreError::UnknownBlockKind { kind: req.kind.clone() })?;

        let graph = &mut self.project.graph;
        let node_id = insert_block(graph, kind, req.id, &self.shape)?;
        if let Some(label) = req.label {
            graph.set_label(&node_id, label)?;
        }
        if req.position.is_some() {
            graph.set_position(&node_id, req.position)?;
        }
        let node = graph.get_node(&node_id)?.clone();
        self.persist()?;

        tracing::info!("project {}: inserted {} block {}", id, kind.as_str(), node_id);
        Ok(node)
    }

    pub fn edit_node(
        &mut self,
        id: ProjectId,
        node_id: &NodeId,
        req: EditNodeRequest,
    ) -> Result<(Node, Option<EditOutcome>), ApiError> {
        self.require_active(id)?;
        self.project.graph.get_node(node_id)?;

        let edit = match (req.param, req.value) {
            (Some(param), Some(value)) => Some(apply_edit(
                &mut self.project.graph,
                node_id,
                &param,
                value,
                &self.shape,
            )?),
            (Some(param), None) => {
                return Err(ApiError::BadRequest(format!("missing value for '{}'", param)))
            }
            (None, Some(_)) => {
                return Err(ApiError::BadRequest("value given without a param".to_string()))
            }
            (None, None) => None,
        };
        if edit.is_none() && req.position.is_none() {
            return Err(ApiError::BadRequest("nothing to change".to_string()));
        }
        if req.position.is_some() {
            self.project.graph.set_position(node_id, req.position)?;
        }

        let node = self.project.graph.get_node(node_id)?.clone();
        match &edit {
            Some(outcome) => {
                self.persist()?;
                tracing::info!(
                    "project {}: {}.{} = {:?} ({} adjustment(s))",
                    id,
                    node_id,
                    outcome.param,
                    outcome.value,
                    outcome.adjustments.len()
                );
            }
            None => self.store.update_node(id, &node)?,
        }
        Ok((node, edit))
    }

    pub fn delete_node(&mut self, id: ProjectId, node_id: &NodeId) -> Result<(Node, Vec<Adjustment>), ApiError> {
        self.require_active(id)?;
        let removed = self.project.graph.remove_node(node_id)?;
        let adjustments = reconcile_in_place(&mut self.project.graph, &self.shape);
        self.persist()?;
        tracing::info!(
            "project {}: removed block {} ({} adjustment(s))",
            id,
            node_id,
            adjustments.len()
        );
        Ok((removed, adjustments))
    }

    pub fn add_edge(&mut self, id: ProjectId, req: AddEdgeRequest) -> Result<Edge, ApiError> {
        self.require_active(id)?;
        let edge = match req.id {
            Some(edge_id) => Edge::new(edge_id, req.source, req.target),
            None => Edge::connect(req.source, req.target),
        };
        self.project.graph.add_edge(edge.clone())?;
        if let Err(err) = self.store.insert_edge(id, &edge) {
            self.project.graph.remove_edge(&edge.id)?;
            return Err(err.into());
        }
        Ok(edge)
    }

    pub fn delete_edge(&mut self, id: ProjectId, edge_id: &EdgeId) -> Result<Edge, ApiError> {
        self.require_active(id)?;
        if self.project.graph.edge(edge_id).is_none() {
            return Err(CoreError::EdgeNotFound { id: edge_id.clone() }.into());
        }
        self.store.delete_edge(id, edge_id)?;
        Ok(self.project.graph.remove_edge(edge_id)?)
    }

    pub fn reconcile(&mut self, id: ProjectId) -> Result<Vec<Adjustment>, ApiError> {
        self.require_active(id)?;
        self.reconcile_active()
    }

    // -----------------------------------------------------------------------
    // Training configuration and compilation
    // -----------------------------------------------------------------------

    pub fn training_config(&self, id: ProjectId) -> Result<TrainingConfig, ApiError> {
        self.require_active(id)?;
        Ok(self.project.training.clone())
    }

    pub fn set_training_config(&mut self, id: ProjectId, training: TrainingConfig) -> Result<(), ApiError> {
        self.require_active(id)?;
        training.validate()?;
        self.store.set_training_config(id, &training)?;
        self.project.training = training;
        Ok(())
    }

    pub fn compile(&self, id: ProjectId) -> Result<Compilation, ApiError> {
        self.require_active(id)?;
        let options = CompileOptions {
            shape: self.shape,
            check_shapes: true,
        };
        let compilation = compile_graph(&self.project.graph, &self.project.training, &options)?;
        tracing::info!(
            "project {}: compiled {} layer(s), {} skipped, {} warning(s)",
            id,
            compilation.model.len(),
            compilation.skipped.len(),
            compilation.warnings.len()
        );
        Ok(compilation)
    }

    /// Compiles for submission. Unlike [`compile`](Self::compile), shape
    /// violations are fatal here.
    pub fn compile_for_training(&self, id: ProjectId) -> Result<ModelDescription, ApiError> {
        let compilation = self.compile(id)?;
        if !compilation.warnings.is_empty() {
            return Err(ApiError::ValidationFailed(compilation.warnings));
        }
        Ok(compilation.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netforge_storage::InMemoryStore;

    fn service_with_two_blocks() -> (ProjectService, NodeId, NodeId) {
        let mut service =
            ProjectService::new(Box::new(InMemoryStore::new()), ShapeConfig::default()).unwrap();
        let id = service.project_id();
        let mut add = |kind: &str| {
            let req = InsertBlockRequest {
                kind: kind.to_string(),
                id: None,
                position: None,
                label: None,
            };
            service.insert_block(id, req).unwrap().id
        };
        let input = add("inputBlock");
        let output = add("outputBlock");
        (service, input, output)
    }

    #[test]
    fn failed_edge_insert_leaves_graph_untouched() {
        let (mut service, input, output) = service_with_two_blocks();
        let id = service.project_id();
        service.store.delete_project(id).unwrap();

        let req = AddEdgeRequest {
            id: Some(EdgeId::new("e-1")),
            source: input,
            target: output,
        };
        assert!(service.add_edge(id, req).is_err());
        assert_eq!(service.project.graph.edge_count(), 0);
    }

    #[test]
    fn failed_edge_delete_keeps_the_edge() {
        let (mut service, input, output) = service_with_two_blocks();
        let id = service.project_id();
        let req = AddEdgeRequest {
            id: Some(EdgeId::new("e-1")),
            source: input,
            target: output,
        };
        service.add_edge(id, req).unwrap();
        service.store.delete_project(id).unwrap();

        assert!(service.delete_edge(id, &EdgeId::new("e-1")).is_err());
        assert!(service.project.graph.edge(&EdgeId::new("e-1")).is_some());
    }

    #[test]
    fn deleting_a_missing_edge_is_not_found() {
        let (mut service, _, _) = service_with_two_blocks();
        let id = service.project_id();
        let err = service.delete_edge(id, &EdgeId::new("nope")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)), "{:?}", err);
    }
}

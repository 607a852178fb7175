//! Boot-time assembly of the domain and mapping models

use std::sync::Arc;

use anyhow::Context;
use relmap_core::model::{DomainModel, DomainModelBuilder, EntityModel, MappingModel};
use relmap_core::mutation::FlushCoordinator;
use relmap_core::path::QueryTree;
use relmap_shared::RelmapConfig;
use tracing::{debug, info};

/// Immutable, shareable metamodel built once from registered entities.
#[derive(Debug, Clone)]
pub struct Metamodel {
    config: RelmapConfig,
    domain: Arc<DomainModel>,
    mapping: Arc<MappingModel>,
}

impl Metamodel {
    /// Validate `config`, resolve every entity model and derive table metadata.
    pub fn boot(config: &RelmapConfig, entities: &[&'static EntityModel]) -> anyhow::Result<Self> {
        config.validate().context("invalid relmap configuration")?;

        let mut builder = DomainModelBuilder::new();
        for model in entities {
            debug!(entity = model.entity_name, rust_type = model.rust_name, "registering entity");
            builder = builder.register(model);
        }
        let domain = builder.build().context("failed to build the domain model")?;
        let mapping = MappingModel::derive(&domain, &config.mapping)
            .context("failed to derive the mapping model")?;

        info!(
            types = domain.len(),
            tables = mapping.tables().count(),
            "Metamodel booted"
        );

        Ok(Self {
            config: config.clone(),
            domain: Arc::new(domain),
            mapping: Arc::new(mapping),
        })
    }

    /// Configuration the metamodel was booted with.
    pub fn config(&self) -> &RelmapConfig {
        &self.config
    }

    /// Resolved domain types.
    pub fn domain(&self) -> &Arc<DomainModel> {
        &self.domain
    }

    /// Table and column mapping of every entity.
    pub fn mapping(&self) -> &Arc<MappingModel> {
        &self.mapping
    }

    /// Fresh path tree over this metamodel's domain.
    pub fn query(&self) -> QueryTree {
        QueryTree::new(Arc::clone(&self.domain))
    }

    /// Planner that turns entity changes into table mutations.
    pub fn flush_coordinator(&self) -> FlushCoordinator {
        FlushCoordinator::new(Arc::clone(&self.mapping), self.config.flush.clone())
    }
}

//! Blueprint screen: category tree with templates as leaves.

use crate::config::ConsoleConfig;
use crate::db::open_db;
use crate::model::blueprint::{GlobalCategory, TaskTemplate, TemplateId};
use crate::repo::blueprint_repo::{
    BlueprintRepository, CategoryListQuery, SqliteBlueprintRepository, TemplateListQuery,
};
use crate::repo::{RepoError, RepoResult};
use crate::service::snapshot_loader::{fetch_concurrently, FetchJob, PartialTree, SnapshotError};
use crate::tree::sources::blueprint_nodes;
use crate::tree::TreeSnapshot;
use std::path::Path;

/// Blueprint use-case service.
pub struct BlueprintService<R: BlueprintRepository> {
    repo: R,
}

impl<R: BlueprintRepository> BlueprintService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Categories and templates as one tree.
    ///
    /// Without `include_archived`, archived categories hide their subtree.
    pub fn blueprint_tree(&self, include_archived: bool) -> Result<TreeSnapshot, SnapshotError> {
        // Archived rows are always fetched so visibility can hide the
        // descendants of an archived category.
        let categories = self.repo.list_categories(&CategoryListQuery {
            include_archived: true,
            ..CategoryListQuery::default()
        })?;
        let templates = self.repo.list_templates(&TemplateListQuery {
            include_archived,
            ..TemplateListQuery::default()
        })?;
        Ok(TreeSnapshot::build(blueprint_nodes(
            &categories,
            &templates,
            include_archived,
        ))?)
    }

    /// Active template `id`.
    pub fn template(&self, id: TemplateId) -> RepoResult<TaskTemplate> {
        self.repo
            .get_template(id)?
            .filter(|template| !template.is_archived())
            .ok_or_else(|| RepoError::not_found("template", id))
    }
}

enum BlueprintPart {
    Categories(RepoResult<Vec<GlobalCategory>>),
    Templates(RepoResult<Vec<TaskTemplate>>),
}

/// Fetches categories and templates concurrently from the store at
/// `db_path` and builds the blueprint tree within the configured wait.
pub fn fetch_blueprint_tree(
    db_path: &Path,
    config: &ConsoleConfig,
    include_archived: bool,
) -> Result<PartialTree, SnapshotError> {
    let limits = config.row_limits;
    let categories_path = db_path.to_path_buf();
    let templates_path = db_path.to_path_buf();
    let jobs = vec![
        FetchJob::new("categories", move || {
            BlueprintPart::Categories(with_repo(&categories_path, |repo| {
                repo.with_limits(limits).list_categories(&CategoryListQuery {
                    include_archived: true,
                    ..CategoryListQuery::default()
                })
            }))
        }),
        FetchJob::new("templates", move || {
            BlueprintPart::Templates(with_repo(&templates_path, |repo| {
                repo.with_limits(limits).list_templates(&TemplateListQuery {
                    include_archived,
                    ..TemplateListQuery::default()
                })
            }))
        }),
    ];

    let outcome = fetch_concurrently(jobs, config.fetch_wait());
    let mut categories = None;
    let mut templates = Vec::new();
    for (_, part) in outcome.settled {
        match part {
            BlueprintPart::Categories(result) => categories = Some(result?),
            BlueprintPart::Templates(result) => templates = result?,
        }
    }

    // Templates without their categories would all surface as roots.
    let nodes = match categories {
        Some(categories) => blueprint_nodes(&categories, &templates, include_archived),
        None => Vec::new(),
    };
    Ok(PartialTree {
        tree: TreeSnapshot::build(nodes)?,
        pending: outcome.pending,
    })
}

fn with_repo<T>(
    db_path: &Path,
    query: impl FnOnce(SqliteBlueprintRepository<'_>) -> RepoResult<T>,
) -> RepoResult<T> {
    let conn = open_db(db_path)?;
    let repo = SqliteBlueprintRepository::try_new(&conn)?;
    query(repo)
}

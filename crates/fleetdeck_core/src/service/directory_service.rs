//! Directory screen: groups with vessels, users and group access.

use crate::config::ConsoleConfig;
use crate::db::open_db;
use crate::model::directory::{Group, Role, User, UserId, Yacht};
use crate::repo::directory_repo::{
    DirectoryRepository, GroupListQuery, SqliteDirectoryRepository, YachtListQuery,
};
use crate::repo::RepoResult;
use crate::service::snapshot_loader::{fetch_concurrently, FetchJob, PartialTree, SnapshotError};
use crate::tree::sources::directory_nodes;
use crate::tree::TreeSnapshot;
use std::path::Path;

/// Directory use-case service.
pub struct DirectoryService<R: DirectoryRepository> {
    repo: R,
}

impl<R: DirectoryRepository> DirectoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Groups and vessels as one tree.
    pub fn directory_tree(&self, include_archived: bool) -> Result<TreeSnapshot, SnapshotError> {
        // Archived groups are always fetched so visibility can hide their
        // descendants instead of promoting them to roots.
        let groups = self.repo.list_groups(&GroupListQuery {
            include_archived: true,
            ..GroupListQuery::default()
        })?;
        let yachts = self.repo.list_yachts(&YachtListQuery {
            include_archived,
            ..YachtListQuery::default()
        })?;
        Ok(TreeSnapshot::build(directory_nodes(
            &groups,
            &yachts,
            include_archived,
        ))?)
    }

    /// Groups the user may act on, as a tree without vessels.
    pub fn accessible_group_tree(&self, user_id: UserId) -> Result<TreeSnapshot, SnapshotError> {
        let groups = self.repo.list_accessible_groups_for_user(user_id)?;
        Ok(TreeSnapshot::build(directory_nodes(&groups, &[], false))?)
    }

    pub fn users(&self) -> RepoResult<Vec<User>> {
        self.repo.list_users(None)
    }

    pub fn roles(&self) -> RepoResult<Vec<Role>> {
        self.repo.list_roles(None)
    }
}

enum DirectoryPart {
    Groups(RepoResult<Vec<Group>>),
    Yachts(RepoResult<Vec<Yacht>>),
}

/// Fetches groups and vessels concurrently from the store at `db_path` and
/// builds the directory tree from what arrives within the configured wait.
pub fn fetch_directory_tree(
    db_path: &Path,
    config: &ConsoleConfig,
    include_archived: bool,
) -> Result<PartialTree, SnapshotError> {
    let limits = config.row_limits;
    let groups_path = db_path.to_path_buf();
    let yachts_path = db_path.to_path_buf();
    let jobs = vec![
        FetchJob::new("groups", move || {
            DirectoryPart::Groups(with_repo(&groups_path, |repo| {
                repo.with_limits(limits).list_groups(&GroupListQuery {
                    include_archived: true,
                    ..GroupListQuery::default()
                })
            }))
        }),
        FetchJob::new("yachts", move || {
            DirectoryPart::Yachts(with_repo(&yachts_path, |repo| {
                repo.with_limits(limits).list_yachts(&YachtListQuery {
                    include_archived,
                    ..YachtListQuery::default()
                })
            }))
        }),
    ];

    let outcome = fetch_concurrently(jobs, config.fetch_wait());
    let mut groups = None;
    let mut yachts = Vec::new();
    for (_, part) in outcome.settled {
        match part {
            DirectoryPart::Groups(result) => groups = Some(result?),
            DirectoryPart::Yachts(result) => yachts = result?,
        }
    }

    Ok(PartialTree {
        tree: partial_directory_tree(groups.as_deref(), &yachts, include_archived)?,
        pending: outcome.pending,
    })
}

/// Vessels are only placed once their groups arrived; without groups they
/// would all surface as roots.
fn partial_directory_tree(
    groups: Option<&[Group]>,
    yachts: &[Yacht],
    include_archived: bool,
) -> Result<TreeSnapshot, SnapshotError> {
    let nodes = match groups {
        Some(groups) => directory_nodes(groups, yachts, include_archived),
        None => Vec::new(),
    };
    Ok(TreeSnapshot::build(nodes)?)
}

fn with_repo<T>(
    db_path: &Path,
    query: impl FnOnce(SqliteDirectoryRepository<'_>) -> RepoResult<T>,
) -> RepoResult<T> {
    let conn = open_db(db_path)?;
    let repo = SqliteDirectoryRepository::try_new(&conn)?;
    query(repo)
}

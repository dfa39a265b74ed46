//! The version manager.
//!
//! Every mutating operation is one `RecordStore::write` unit, so a failure
//! anywhere leaves no trace, and a reader never sees a commit without the
//! branch head that points at it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::{Branch, BranchType, Commit, CommitType, Repository, Snapshot, Tag, TagType};
use crate::store::{RecordStore, Records, RecordsMut, StoreWrite};
use crate::version::error::{VersionError, VersionResult};
use crate::version::hasher::{self, HashInput};

pub const DEFAULT_BRANCH_DESCRIPTION: &str = "Main development branch";
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial character creation";

const MAX_NAME_LEN: usize = 100;

/// Engine settings; the `[versioning]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionOptions {
    pub default_branch: String,
    /// snapshot field read as the progress level
    pub level_field: String,
    /// default limit for history and lineage
    pub history_limit: usize,
}

impl Default for VersionOptions {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            level_field: "level".to_string(),
            history_limit: 50,
        }
    }
}

/// Input for `create_repository`.
#[derive(Debug, Clone)]
pub struct NewRepository {
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub is_public: bool,
    pub allow_forks: bool,
    pub initial_snapshot: Option<Snapshot>,
    pub author: Option<String>,
}

impl NewRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            owner: None,
            is_public: false,
            allow_forks: true,
            initial_snapshot: None,
            author: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn allow_forks(mut self, allow: bool) -> Self {
        self.allow_forks = allow;
        self
    }

    pub fn initial_snapshot(mut self, snapshot: impl Into<Snapshot>) -> Self {
        self.initial_snapshot = Some(snapshot.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Input for `create_branch`.
#[derive(Debug, Clone)]
pub struct NewBranch {
    pub name: String,
    pub parent_branch: String,
    /// defaults to the parent branch's head
    pub branch_point_hash: Option<String>,
    pub description: Option<String>,
    pub branch_type: BranchType,
}

impl NewBranch {
    pub fn new(name: impl Into<String>, parent_branch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_branch: parent_branch.into(),
            branch_point_hash: None,
            description: None,
            branch_type: BranchType::default(),
        }
    }

    pub fn branch_point(mut self, hash: impl Into<String>) -> Self {
        self.branch_point_hash = Some(hash.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn branch_type(mut self, branch_type: BranchType) -> Self {
        self.branch_type = branch_type;
        self
    }
}

/// Free-form context recorded with a commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitContext {
    pub session_date: Option<DateTime<Utc>>,
    pub narrative_context: Option<String>,
    pub notes: Option<String>,
    /// second parent; marks a merge commit
    pub merge_parent_hash: Option<String>,
    pub changes_summary: Option<Value>,
    pub files_changed: Vec<String>,
}

/// Input for `create_commit`.
#[derive(Debug, Clone)]
pub struct NewCommit {
    pub message: String,
    pub snapshot: Snapshot,
    /// read from the snapshot when absent, then 1
    pub level: Option<u32>,
    pub commit_type: CommitType,
    pub milestone: Option<String>,
    pub context: CommitContext,
    pub author: Option<String>,
}

impl NewCommit {
    pub fn new(message: impl Into<String>, snapshot: impl Into<Snapshot>) -> Self {
        Self {
            message: message.into(),
            snapshot: snapshot.into(),
            level: None,
            commit_type: CommitType::default(),
            milestone: None,
            context: CommitContext::default(),
            author: None,
        }
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn commit_type(mut self, commit_type: CommitType) -> Self {
        self.commit_type = commit_type;
        self
    }

    pub fn milestone(mut self, milestone: impl Into<String>) -> Self {
        self.milestone = Some(milestone.into());
        self
    }

    pub fn context(mut self, context: CommitContext) -> Self {
        self.context = context;
        self
    }

    pub fn merge_parent(mut self, hash: impl Into<String>) -> Self {
        self.context.merge_parent_hash = Some(hash.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Input for `create_tag`.
#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub tag_type: TagType,
    pub description: Option<String>,
    pub author: Option<String>,
}

impl NewTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_type: TagType::default(),
            description: None,
            author: None,
        }
    }

    pub fn tag_type(mut self, tag_type: TagType) -> Self {
        self.tag_type = tag_type;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchView {
    #[serde(flatten)]
    pub branch: Branch,
    /// commits owned by this branch
    pub commit_count: usize,
}

/// Everything in one repository, read from a single snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryTree {
    pub repository: Repository,
    /// oldest first
    pub branches: Vec<BranchView>,
    /// oldest first
    pub commits: Vec<Commit>,
    pub tags: Vec<Tag>,
    pub branch_count: usize,
    pub commit_count: usize,
}

impl RepositoryTree {
    pub fn branch_by_id(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.iter().map(|v| &v.branch).find(|b| b.id == branch_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDeletion {
    pub repository_id: String,
    pub branches: usize,
    pub commits: usize,
    pub tags: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitVerification {
    pub commit_hash: String,
    pub recomputed_hash: String,
    pub valid: bool,
}

/// Orchestrates repositories, branches, commits and tags over a record store.
pub struct VersionManager<S> {
    store: S,
    options: VersionOptions,
}

impl<S: RecordStore> VersionManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, VersionOptions::default())
    }

    pub fn with_options(store: S, options: VersionOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &VersionOptions {
        &self.options
    }

    pub fn close(&self) -> VersionResult<()> {
        Ok(self.store.close()?)
    }

    /// Create a repository with its default branch, and a genesis commit when
    /// an initial snapshot is given.
    pub fn create_repository(&self, new: NewRepository) -> VersionResult<Repository> {
        let name = validate_name("repository", &new.name)?;
        let default_branch = validate_name("branch", &self.options.default_branch)?;
        let level_field = self.options.level_field.as_str();

        let repository = self.store.write(|w| -> VersionResult<Repository> {
            let mut repository = Repository::new(name, default_branch.as_str());
            repository.description = new.description;
            repository.owner = new.owner;
            repository.is_public = new.is_public;
            repository.allow_forks = new.allow_forks;

            let mut branch = Branch::new(repository.id.as_str(), default_branch.as_str(), BranchType::Main);
            branch.description = Some(DEFAULT_BRANCH_DESCRIPTION.to_string());

            w.create(&repository)?;
            w.create(&branch)?;

            if let Some(snapshot) = new.initial_snapshot {
                let level = snapshot.level(level_field).unwrap_or(1);
                let mut initial = NewCommit::new(INITIAL_COMMIT_MESSAGE, snapshot)
                    .level(level)
                    .commit_type(CommitType::Initial);
                initial.author = new.author;
                append_commit(w, &mut repository, &mut branch, initial, level_field)?;
            }

            Ok(repository)
        })?;

        info!(
            repository = %repository.id,
            name = %repository.name,
            genesis = repository.genesis_commit_hash.as_deref().map(hasher::short_hash).unwrap_or_default(),
            "created repository"
        );
        Ok(repository)
    }

    pub fn get_repository(&self, repository_id: &str) -> VersionResult<Repository> {
        self.store.read(|r| require_repository(r, repository_id))
    }

    /// All repositories, optionally only those of one owner, oldest first.
    pub fn list_repositories(&self, owner: Option<&str>) -> VersionResult<Vec<Repository>> {
        let mut repositories = self.store.read(|r| r.all::<Repository>())?;
        if let Some(owner) = owner {
            repositories.retain(|repo| repo.owner.as_deref() == Some(owner));
        }
        repositories.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(repositories)
    }

    /// Remove a repository with all its branches, commits and tags.
    pub fn delete_repository(&self, repository_id: &str) -> VersionResult<RepositoryDeletion> {
        let deletion = self.store.write(|w| -> VersionResult<RepositoryDeletion> {
            require_repository(&*w, repository_id)?;
            let tags = w.list_by_repository::<Tag>(repository_id)?;
            let commits = w.list_by_repository::<Commit>(repository_id)?;
            let branches = w.list_by_repository::<Branch>(repository_id)?;

            for tag in &tags {
                w.remove::<Tag>(&tag.id)?;
            }
            for commit in &commits {
                w.remove::<Commit>(&commit.commit_hash)?;
            }
            for branch in &branches {
                w.remove::<Branch>(&branch.id)?;
            }
            w.remove::<Repository>(repository_id)?;

            Ok(RepositoryDeletion {
                repository_id: repository_id.to_string(),
                branches: branches.len(),
                commits: commits.len(),
                tags: tags.len(),
            })
        })?;

        info!(
            repository = %repository_id,
            branches = deletion.branches,
            commits = deletion.commits,
            tags = deletion.tags,
            "deleted repository"
        );
        Ok(deletion)
    }

    /// Fork a branch from `parent_branch`. Its head starts at the branch
    /// point, an inherited commit; the branch owns no commits yet.
    pub fn create_branch(&self, repository_id: &str, new: NewBranch) -> VersionResult<Branch> {
        let name = validate_name("branch", &new.name)?;

        let branch = self.store.write(|w| -> VersionResult<Branch> {
            require_repository(&*w, repository_id)?;
            if w.find_named::<Branch>(repository_id, &name)?.is_some() {
                return Err(VersionError::DuplicateBranchName {
                    repository_id: repository_id.to_string(),
                    branch: name.clone(),
                });
            }

            let parent = require_branch(&*w, repository_id, &new.parent_branch)?;
            let branch_point = match new.branch_point_hash {
                Some(hash) => Some(require_commit_in(&*w, repository_id, &hash)?.commit_hash),
                None => parent.head_commit_hash.clone(),
            };

            let mut branch = Branch::new(repository_id, name.as_str(), new.branch_type);
            branch.description = new.description;
            branch.parent_branch = Some(parent.branch_name);
            branch.head_commit_hash = branch_point.clone();
            branch.branch_point_hash = branch_point;

            w.create(&branch)?;
            Ok(branch)
        })?;

        info!(
            repository = %repository_id,
            branch = %branch.branch_name,
            parent = branch.parent_branch.as_deref().unwrap_or_default(),
            "created branch"
        );
        Ok(branch)
    }

    pub fn get_branch(&self, repository_id: &str, branch_name: &str) -> VersionResult<Branch> {
        self.store.read(|r| {
            require_repository(r, repository_id)?;
            require_branch(r, repository_id, branch_name)
        })
    }

    /// Branches of a repository, oldest first.
    pub fn list_branches(&self, repository_id: &str) -> VersionResult<Vec<Branch>> {
        self.store.read(|r| -> VersionResult<Vec<Branch>> {
            require_repository(r, repository_id)?;
            let mut branches = r.list_by_repository::<Branch>(repository_id)?;
            sort_branches(&mut branches);
            Ok(branches)
        })
    }

    /// Record that `branch_name` was merged into `into`. No content is merged.
    pub fn mark_branch_merged(&self, repository_id: &str, branch_name: &str, into: &str) -> VersionResult<Branch> {
        let (branch_name, into) = (branch_name.trim(), into.trim());
        if branch_name == into {
            return Err(VersionError::InvalidOperation(format!(
                "branch '{}' cannot be merged into itself",
                branch_name
            )));
        }

        let branch = self.store.write(|w| -> VersionResult<Branch> {
            require_repository(&*w, repository_id)?;
            let mut branch = require_branch(&*w, repository_id, branch_name)?;
            let target = require_branch(&*w, repository_id, into)?;

            branch.is_merged = true;
            branch.is_active = false;
            branch.merged_into = Some(target.branch_name);
            branch.updated_at = Utc::now();
            w.save(&branch)?;
            Ok(branch)
        })?;

        info!(repository = %repository_id, branch = %branch_name, into = %into, "marked branch merged");
        Ok(branch)
    }

    /// Append a commit to a branch and advance its head, atomically.
    pub fn create_commit(&self, repository_id: &str, branch_name: &str, new: NewCommit) -> VersionResult<Commit> {
        let level_field = self.options.level_field.as_str();

        let result = self.store.write(|w| -> VersionResult<Commit> {
            let mut repository = require_repository(&*w, repository_id)?;
            let mut branch = require_branch(&*w, repository_id, branch_name)?;
            append_commit(w, &mut repository, &mut branch, new, level_field)
        });

        match &result {
            Ok(commit) => info!(
                repository = %repository_id,
                branch = %branch_name,
                commit = %commit.short_hash,
                level = commit.progress_level,
                "created commit"
            ),
            Err(e) => warn!(repository = %repository_id, branch = %branch_name, error = %e, "commit rejected"),
        }
        result
    }

    pub fn get_commit(&self, commit_hash: &str) -> VersionResult<Commit> {
        self.store.read(|r| require_commit(r, commit_hash))
    }

    /// Commits newest first. With a branch name, only commits *owned* by that
    /// branch; inherited ancestors are left out, see `get_lineage` for those.
    pub fn get_commit_history(
        &self,
        repository_id: &str,
        branch_name: Option<&str>,
        limit: Option<usize>,
    ) -> VersionResult<Vec<Commit>> {
        let limit = limit.unwrap_or(self.options.history_limit);

        let mut commits = self.store.read(|r| -> VersionResult<Vec<Commit>> {
            require_repository(r, repository_id)?;
            match branch_name {
                Some(name) => {
                    let branch = require_branch(r, repository_id, name)?;
                    Ok(r.list_where(repository_id, |c: &Commit| c.branch_id == branch.id)?)
                }
                None => Ok(r.list_by_repository::<Commit>(repository_id)?),
            }
        })?;

        sort_newest_first(&mut commits);
        commits.truncate(limit);
        debug!(repository = %repository_id, branch = ?branch_name, count = commits.len(), "read history");
        Ok(commits)
    }

    /// Ancestors reached through `parent_commit_hash`, starting with the
    /// commit itself, newest first.
    pub fn get_lineage(&self, commit_hash: &str, limit: Option<usize>) -> VersionResult<Vec<Commit>> {
        let limit = limit.unwrap_or(self.options.history_limit);

        self.store.read(|r| -> VersionResult<Vec<Commit>> {
            let mut lineage = Vec::new();
            let mut next = Some(commit_hash.to_string());

            while let Some(hash) = next {
                if lineage.len() >= limit {
                    break;
                }
                let commit = require_commit(r, &hash)?;
                next = commit.parent_commit_hash.clone();
                lineage.push(commit);
            }
            Ok(lineage)
        })
    }

    pub fn get_snapshot_at_commit(&self, commit_hash: &str) -> VersionResult<Snapshot> {
        Ok(self.get_commit(commit_hash)?.snapshot)
    }

    /// Recompute a commit's hash from its stored inputs.
    pub fn verify_commit(&self, commit_hash: &str) -> VersionResult<CommitVerification> {
        let commit = self.get_commit(commit_hash)?;
        let recomputed = hasher::compute_commit_hash(&HashInput {
            payload: commit.snapshot.as_value(),
            message: &commit.commit_message,
            created_at: commit.created_at,
            parent_hash: commit.parent_commit_hash.as_deref(),
            nonce: &commit.hash_nonce,
        });

        let valid = recomputed == commit.commit_hash;
        if !valid {
            warn!(commit = %commit.commit_hash, "commit hash does not match its contents");
        }
        Ok(CommitVerification {
            commit_hash: commit.commit_hash,
            recomputed_hash: recomputed,
            valid,
        })
    }

    /// Tag a commit of the repository.
    pub fn create_tag(&self, repository_id: &str, commit_hash: &str, new: NewTag) -> VersionResult<Tag> {
        let name = validate_name("tag", &new.name)?;

        let tag = self.store.write(|w| -> VersionResult<Tag> {
            require_repository(&*w, repository_id)?;
            let commit = require_commit_in(&*w, repository_id, commit_hash)?;
            if w.find_named::<Tag>(repository_id, &name)?.is_some() {
                return Err(VersionError::DuplicateTagName {
                    repository_id: repository_id.to_string(),
                    tag: name.clone(),
                });
            }

            let tag = Tag {
                id: crate::model::new_id(),
                repository_id: repository_id.to_string(),
                tag_name: name.clone(),
                tag_type: new.tag_type,
                description: new.description,
                commit_hash: commit.commit_hash,
                author: new.author,
                created_at: Utc::now(),
            };
            w.create(&tag)?;
            Ok(tag)
        })?;

        info!(repository = %repository_id, tag = %tag.tag_name, commit = %hasher::short_hash(&tag.commit_hash), "created tag");
        Ok(tag)
    }

    /// Tags of a repository, oldest first.
    pub fn list_tags(&self, repository_id: &str) -> VersionResult<Vec<Tag>> {
        let mut tags = self.store.read(|r| -> VersionResult<Vec<Tag>> {
            require_repository(r, repository_id)?;
            Ok(r.list_by_repository::<Tag>(repository_id)?)
        })?;
        tags.sort_by(|a, b| (a.created_at, &a.tag_name).cmp(&(b.created_at, &b.tag_name)));
        Ok(tags)
    }

    pub fn get_repository_tree(&self, repository_id: &str) -> VersionResult<RepositoryTree> {
        self.store.read(|r| -> VersionResult<RepositoryTree> {
            let repository = require_repository(r, repository_id)?;
            let mut branches = r.list_by_repository::<Branch>(repository_id)?;
            let mut commits = r.list_by_repository::<Commit>(repository_id)?;
            let mut tags = r.list_by_repository::<Tag>(repository_id)?;

            sort_branches(&mut branches);
            sort_newest_first(&mut commits);
            commits.reverse();
            tags.sort_by(|a, b| (a.created_at, &a.tag_name).cmp(&(b.created_at, &b.tag_name)));

            let branches: Vec<BranchView> = branches
                .into_iter()
                .map(|branch| {
                    let commit_count = commits.iter().filter(|c| c.branch_id == branch.id).count();
                    BranchView { branch, commit_count }
                })
                .collect();

            Ok(RepositoryTree {
                repository,
                branch_count: branches.len(),
                commit_count: commits.len(),
                branches,
                commits,
                tags,
            })
        })
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for VersionManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionManager")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish()
    }
}

/// Hash, insert, then move the branch head and bump the repository's commit
/// counter (setting the genesis pointer on the first commit). Callers run
/// this inside one write unit.
fn append_commit(
    w: &mut dyn StoreWrite,
    repository: &mut Repository,
    branch: &mut Branch,
    new: NewCommit,
    level_field: &str,
) -> VersionResult<Commit> {
    if branch.is_merged {
        return Err(VersionError::BranchMerged {
            branch: branch.branch_name.clone(),
            merged_into: branch.merged_into.clone().unwrap_or_default(),
        });
    }
    if let Some(merge_parent) = &new.context.merge_parent_hash {
        require_commit_in(&*w, &repository.id, merge_parent)?;
    }

    let created_at = Utc::now();
    let nonce = hasher::new_nonce();
    let parent_commit_hash = branch.head_commit_hash.clone();
    let commit_hash = hasher::compute_commit_hash(&HashInput {
        payload: new.snapshot.as_value(),
        message: &new.message,
        created_at,
        parent_hash: parent_commit_hash.as_deref(),
        nonce: &nonce,
    });
    if repository.commit_count == 0 && repository.genesis_commit_hash.is_some() {
        // stored before the counter existed
        repository.commit_count = w.list_by_repository::<Commit>(&repository.id)?.len() as u64;
    }
    let sequence = repository.commit_count + 1;

    let commit = Commit {
        id: crate::model::new_id(),
        repository_id: repository.id.clone(),
        branch_id: branch.id.clone(),
        short_hash: hasher::short_hash(&commit_hash),
        commit_hash,
        commit_message: new.message,
        commit_type: new.commit_type,
        progress_level: new.level.or_else(|| new.snapshot.level(level_field)).unwrap_or(1),
        experience_points: new.snapshot.experience_points(),
        milestone: new.milestone,
        parent_commit_hash,
        merge_parent_hash: new.context.merge_parent_hash,
        snapshot: new.snapshot,
        changes_summary: new.context.changes_summary,
        files_changed: new.context.files_changed,
        session_date: new.context.session_date,
        narrative_context: new.context.narrative_context,
        notes: new.context.notes,
        hash_nonce: nonce,
        sequence,
        author: new.author,
        created_at,
    };
    insert_commit(w, &commit)?;

    branch.head_commit_hash = Some(commit.commit_hash.clone());
    branch.updated_at = created_at;
    w.save(&*branch)?;

    if repository.genesis_commit_hash.is_none() {
        repository.genesis_commit_hash = Some(commit.commit_hash.clone());
    }
    repository.commit_count = sequence;
    repository.updated_at = created_at;
    w.save(&*repository)?;

    Ok(commit)
}

/// Commits are keyed by hash: an existing key is a collision, never an update.
fn insert_commit(w: &mut dyn StoreWrite, commit: &Commit) -> VersionResult<()> {
    w.create(commit).map_err(|e| {
        if e.is_duplicate() {
            VersionError::HashCollision(commit.commit_hash.clone())
        } else {
            e.into()
        }
    })
}

fn require_repository<R: Records + ?Sized>(r: &R, repository_id: &str) -> VersionResult<Repository> {
    r.fetch::<Repository>(repository_id)?
        .ok_or_else(|| VersionError::RepositoryNotFound(repository_id.to_string()))
}

/// Looks the name up trimmed, the way it was stored.
fn require_branch<R: Records + ?Sized>(r: &R, repository_id: &str, branch_name: &str) -> VersionResult<Branch> {
    r.find_named::<Branch>(repository_id, branch_name.trim())?
        .ok_or_else(|| VersionError::BranchNotFound {
            repository_id: repository_id.to_string(),
            branch: branch_name.to_string(),
        })
}

fn require_commit<R: Records + ?Sized>(r: &R, commit_hash: &str) -> VersionResult<Commit> {
    r.fetch::<Commit>(commit_hash)?
        .ok_or_else(|| VersionError::CommitNotFound(commit_hash.to_string()))
}

/// A commit of another repository counts as missing.
fn require_commit_in<R: Records + ?Sized>(r: &R, repository_id: &str, commit_hash: &str) -> VersionResult<Commit> {
    let commit = require_commit(r, commit_hash)?;
    if commit.repository_id != repository_id {
        return Err(VersionError::CommitNotFound(commit_hash.to_string()));
    }
    Ok(commit)
}

fn validate_name(kind: &str, name: &str) -> VersionResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(VersionError::InvalidName(format!("{} name cannot be empty", kind)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(VersionError::InvalidName(format!(
            "{} name longer than {} characters",
            kind, MAX_NAME_LEN
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(VersionError::InvalidName(format!(
            "{} name contains control characters",
            kind
        )));
    }
    Ok(trimmed.to_string())
}

fn sort_newest_first(commits: &mut [Commit]) {
    commits.sort_by(|a, b| (b.created_at, b.sequence).cmp(&(a.created_at, a.sequence)));
}

fn sort_branches(branches: &mut [Branch]) {
    branches.sort_by(|a, b| (a.created_at, &a.branch_name).cmp(&(b.created_at, &b.branch_name)));
}

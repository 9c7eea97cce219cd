//! Git-backed module configuration store
//!
//! Module packages and claim defaults live in git repositories: the
//! product catalog repos hold the shipped defaults, the user's config
//! repo accumulates their answers. A store is a shallow working clone
//! in a temp directory that lives as long as the handle.

use std::fs;
use std::path::Path;

use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature};
use tempfile::TempDir;

use crate::{Error, Result};

/// Organization hosting the product module repositories
pub const PRODUCT_GIT_URL: &str = "https://github.com/kosmohq";

const COMMIT_AUTHOR: &str = "kosmo";
const COMMIT_EMAIL: &str = "kosmo@localhost";

/// Repository URL of a product module
pub fn module_repo_url(module: &str) -> String {
    format!("{PRODUCT_GIT_URL}/kosmo-module-{module}")
}

/// In-repo path of a module's package manifest
pub fn package_path(module: &str) -> String {
    format!("defaults/kosmo-package-module-{module}.yaml")
}

/// In-repo path of a module's claim defaults
pub fn defaults_path(module: &str) -> String {
    format!("defaults/kosmo-module-{module}.yaml")
}

/// In-repo path of a module's XRD definition
pub fn definition_path() -> &'static str {
    "cluster/definition.yaml"
}

/// A stored file together with the revision it was read at
#[derive(Debug, Clone)]
pub struct Entry {
    /// In-repo path of the entry
    pub path: String,
    /// Commit id the entry was read from (empty for an unborn repo)
    pub revision: String,
    /// File content
    pub content: Vec<u8>,
}

/// A working clone of a remote config repository
pub struct GitStore {
    // Holds the checkout alive; the Repository points into it.
    _workdir: TempDir,
    repo: Repository,
    token: Option<String>,
}

impl GitStore {
    /// Clone a remote repository into a fresh temp directory
    pub fn open(url: &str, token: Option<&str>) -> Result<Self> {
        let workdir = TempDir::new()?;
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks(token.map(String::from)));
        let repo = RepoBuilder::new()
            .fetch_options(fetch)
            .clone(url, workdir.path())?;
        Ok(Self {
            _workdir: workdir,
            repo,
            token: token.map(String::from),
        })
    }

    /// Read an entry; a missing file is the distinct EntryNotFound error
    pub fn get(&self, path: &str) -> Result<Entry> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| Error::Other("store clone has no working tree".to_string()))?;
        let full = workdir.join(path);
        if !full.is_file() {
            return Err(Error::entry_not_found(path));
        }
        Ok(Entry {
            path: path.to_string(),
            revision: self.head_revision(),
            content: fs::read(full)?,
        })
    }

    /// Write an entry, commit it and push to the remote
    pub fn put(&self, path: &str, content: &[u8]) -> Result<()> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| Error::Other("store clone has no working tree".to_string()))?;
        let full = workdir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content)?;

        let mut index = self.repo.index()?;
        index.add_path(Path::new(path))?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let signature = Signature::now(COMMIT_AUTHOR, COMMIT_EMAIL)?;
        let parent_commit = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| self.repo.find_commit(oid).ok());
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &format!("update {path}"),
            &tree,
            &parents,
        )?;

        let branch = self
            .repo
            .find_reference("HEAD")?
            .symbolic_target()
            .map(String::from)
            .unwrap_or_else(|| "refs/heads/main".to_string());
        let mut push = PushOptions::new();
        push.remote_callbacks(callbacks(self.token.clone()));
        self.repo
            .find_remote("origin")?
            .push(&[format!("{branch}:{branch}").as_str()], Some(&mut push))?;
        Ok(())
    }

    fn head_revision(&self) -> String {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .map(|oid| oid.to_string())
            .unwrap_or_default()
    }
}

fn callbacks(token: Option<String>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed| {
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        if let Some(token) = &token {
            return Cred::userpass_plaintext(token, "");
        }
        Cred::default()
    });
    callbacks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_paths() {
        assert_eq!(
            module_repo_url("core"),
            "https://github.com/kosmohq/kosmo-module-core"
        );
        assert_eq!(
            package_path("core"),
            "defaults/kosmo-package-module-core.yaml"
        );
        assert_eq!(defaults_path("core"), "defaults/kosmo-module-core.yaml");
        assert_eq!(definition_path(), "cluster/definition.yaml");
    }

    /// Story: a fresh (even empty) remote can be cloned, written to and
    /// read back by a later clone; missing entries surface as the
    /// distinct not-found error that drives the defaults fallback.
    #[test]
    fn story_put_then_get_round_trip() {
        let remote_dir = TempDir::new().unwrap();
        Repository::init_bare(remote_dir.path()).unwrap();
        let url = remote_dir.path().to_str().unwrap().to_string();

        let store = GitStore::open(&url, None).unwrap();
        let missing = store.get("defaults/kosmo-module-core.yaml").unwrap_err();
        assert!(missing.is_entry_not_found());

        store
            .put("defaults/kosmo-module-core.yaml", b"spec:\n  domain: x\n")
            .unwrap();

        // A separate clone sees the pushed entry.
        let fresh = GitStore::open(&url, None).unwrap();
        let entry = fresh.get("defaults/kosmo-module-core.yaml").unwrap();
        assert_eq!(entry.content, b"spec:\n  domain: x\n");
        assert!(!entry.revision.is_empty());
    }
}

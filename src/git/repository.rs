use std::fs;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{BranchType, Repository, StatusOptions};
use tracing::{debug, info};

use super::WorkingCopy;
use crate::error::{ReleaseError, Result};

const REMOTE: &str = "origin";

/// Wrapper around a local clone with our trait interface
pub struct Git2WorkingCopy {
    repo: Repository,
    root: PathBuf,
}

impl Git2WorkingCopy {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::discover(path)?;
        let root = repo
            .workdir()
            .ok_or_else(|| ReleaseError::config("bb_path points at a bare repository"))?
            .to_path_buf();

        Ok(Git2WorkingCopy { repo, root })
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(str::to_string))
    }

    fn fetch_origin(&self) -> Result<()> {
        let mut remote = self.repo.find_remote(REMOTE)?;

        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(|_url, username_from_url, allowed_types| {
            if allowed_types.contains(git2::CredentialType::SSH_KEY) {
                let username = username_from_url.unwrap_or("git");
                if let Some(home) = dirs::home_dir() {
                    for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                        let path = home.join(".ssh").join(key);
                        if path.exists() {
                            if let Ok(cred) = git2::Cred::ssh_key(username, None, &path, None) {
                                return Ok(cred);
                            }
                        }
                    }
                }

                if let Ok(cred) = git2::Cred::ssh_key_from_agent(username) {
                    return Ok(cred);
                }
            }

            git2::Cred::default()
        });

        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        let refspec_heads = format!("+refs/heads/*:refs/remotes/{}/*", REMOTE);
        let refspecs = [refspec_heads.as_str(), "+refs/tags/*:refs/tags/*"];
        remote.fetch(&refspecs, Some(&mut fetch_options), None)?;
        Ok(())
    }

    /// Move `branch_name` to its remote-tracking head when that is a fast-forward.
    ///
    /// The working tree is updated before the ref moves, so a checkout that
    /// would clobber local edits fails without touching the branch.
    /// Returns whether the branch moved.
    fn fast_forward(&self, branch_name: &str) -> Result<bool> {
        let remote_ref = match self
            .repo
            .find_reference(&format!("refs/remotes/{}/{}", REMOTE, branch_name))
        {
            Ok(r) => r,
            Err(_) => return Ok(false),
        };
        let remote_oid = match remote_ref.target() {
            Some(oid) => oid,
            None => return Ok(false),
        };

        let mut local_ref = self
            .repo
            .find_branch(branch_name, BranchType::Local)?
            .into_reference();
        let local_oid = match local_ref.target() {
            Some(oid) => oid,
            None => return Ok(false),
        };

        if local_oid == remote_oid || !self.repo.graph_descendant_of(remote_oid, local_oid)? {
            return Ok(false);
        }

        let remote_commit = self.repo.find_commit(remote_oid)?;
        self.repo
            .checkout_tree(remote_commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
        local_ref.set_target(
            remote_oid,
            &format!("bb-release: fast-forward {} to {}", branch_name, remote_oid),
        )?;
        Ok(true)
    }

    fn ensure_clean(&self) -> Result<()> {
        if self.is_dirty()? {
            return Err(ReleaseError::DirtyWorkingCopy(self.root.display().to_string()));
        }
        Ok(())
    }
}

impl WorkingCopy for Git2WorkingCopy {
    fn path(&self) -> &Path {
        &self.root
    }

    fn is_dirty(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;
        Ok(!statuses.is_empty())
    }

    fn pull(&self) -> Result<()> {
        self.fetch_origin()?;

        if let Some(branch) = self.current_branch()? {
            if self.fast_forward(&branch)? {
                info!(%branch, "fast-forwarded from {}", REMOTE);
            }
        }
        Ok(())
    }

    fn checkout_ref(&self, reference: &str) -> Result<()> {
        self.ensure_clean()?;

        if self.repo.find_branch(reference, BranchType::Local).is_err() {
            let tracking = format!("{}/{}", REMOTE, reference);
            if let Ok(remote_branch) = self.repo.find_branch(&tracking, BranchType::Remote) {
                let commit = remote_branch.get().peel_to_commit()?;
                let mut local = self.repo.branch(reference, &commit, false)?;
                local.set_upstream(Some(tracking.as_str()))?;
                debug!(branch = %reference, "created local branch from {}", tracking);
            }
        }

        if let Ok(branch) = self.repo.find_branch(reference, BranchType::Local) {
            let reference_name = branch
                .get()
                .name()
                .ok_or_else(|| {
                    ReleaseError::config(format!("invalid branch name '{}'", reference))
                })?
                .to_string();
            let commit = branch.get().peel_to_commit()?;
            self.repo
                .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
            self.repo.set_head(&reference_name)?;
        } else {
            let object = self.repo.revparse_single(reference)?;
            let commit = object.peel_to_commit()?;
            self.repo
                .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
            self.repo.set_head_detached(commit.id())?;
        }

        debug!(%reference, "checked out");
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(path))?)
    }

    fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        Ok(fs::write(self.root.join(path), contents)?)
    }
}

//! Git operations on a service working directory.

use crate::{Error, Result};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, CredentialType, FetchOptions, Progress, RemoteCallbacks, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the remote every service checkout tracks.
pub const ORIGIN: &str = "origin";

/// Ref checked out when the source does not pin one.
pub const DEFAULT_CHECKOUT: &str = "origin/main";

/// User assumed for SSH remotes that do not name one, as in `ssh://host/repo`.
const DEFAULT_SSH_USER: &str = "git";

/// libgit2 keeps asking while credentials are rejected; give up after this many.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// A git working directory holding a service's source.
pub struct GitCheckout {
    path: PathBuf,
    repo: Repository,
}

impl GitCheckout {
    /// Open an existing working directory.
    ///
    /// Only `path` itself is considered; parent repositories are ignored.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path).map_err(|e| Error::InvalidProvisioningState {
            path: path.to_path_buf(),
            reason: format!("not a git repository ({})", e.message()),
        })?;
        if repo.is_bare() {
            return Err(Error::InvalidProvisioningState {
                path: path.to_path_buf(),
                reason: "bare repository has no working directory".to_string(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            repo,
        })
    }

    /// Clone `url` into `path`, which must not exist yet.
    pub fn clone_remote(url: &str, path: &Path) -> Result<Self> {
        info!("Cloning {} into {:?}", url, path);

        let mut builder = RepoBuilder::new();
        builder.fetch_options(progress_fetch_options());

        let repo = builder.clone(url, path).map_err(|e| {
            Error::Other(format!("Failed to clone repository from {}: {}", url, e))
        })?;

        info!("Repository cloned successfully");
        Ok(Self {
            path: path.to_path_buf(),
            repo,
        })
    }

    /// URL configured for the `origin` remote.
    pub fn origin_url(&self) -> Result<String> {
        let remote = self
            .repo
            .find_remote(ORIGIN)
            .map_err(|e| Error::InvalidProvisioningState {
                path: self.path.clone(),
                reason: format!("no '{}' remote ({})", ORIGIN, e.message()),
            })?;
        let url = remote.url().ok_or_else(|| Error::InvalidProvisioningState {
            path: self.path.clone(),
            reason: format!("'{}' remote URL is not valid UTF-8", ORIGIN),
        })?;
        Ok(url.trim().to_string())
    }

    /// Fetch `origin` using its configured refspecs.
    pub fn fetch_origin(&self) -> Result<()> {
        debug!("Fetching {} in {:?}", ORIGIN, self.path);

        let mut remote = self
            .repo
            .find_remote(ORIGIN)
            .map_err(|e| Error::Other(format!("Failed to find origin remote: {}", e)))?;

        remote
            .fetch(&[] as &[&str], Some(&mut progress_fetch_options()), None)
            .map_err(|e| Error::Other(format!("Failed to fetch from remote: {}", e)))?;

        Ok(())
    }

    /// Check out `reference`, or `origin/main` when none is given.
    ///
    /// A pinned ref is looked up as a remote branch first, then as a tag or
    /// commit. HEAD is detached at the resolved commit.
    pub fn checkout(&self, reference: Option<&str>) -> Result<()> {
        let object = match reference {
            Some(reference) => self
                .repo
                .revparse_single(&format!("{}/{}", ORIGIN, reference))
                .or_else(|_| self.repo.revparse_single(reference))
                .map_err(|e| {
                    Error::Other(format!("Failed to resolve ref '{}': {}", reference, e))
                })?,
            None => self.repo.revparse_single(DEFAULT_CHECKOUT).map_err(|e| {
                Error::Other(format!("Failed to resolve '{}': {}", DEFAULT_CHECKOUT, e))
            })?,
        };
        let commit = object.peel_to_commit()?;

        self.repo
            .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
        self.repo.set_head_detached(commit.id())?;

        debug!(
            "Checked out {} at {}",
            reference.unwrap_or(DEFAULT_CHECKOUT),
            commit.id()
        );
        Ok(())
    }

    /// Commit currently checked out.
    #[cfg(test)]
    pub(crate) fn head_commit(&self) -> Result<git2::Oid> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }
}

fn progress_fetch_options<'a>() -> FetchOptions<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(|progress| {
        print_progress(&progress);
        true
    });

    let mut attempts = 0;
    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(&format!(
                "authentication to {} failed after {} attempts",
                url, MAX_CREDENTIAL_ATTEMPTS
            )));
        }
        credentials(url, username, allowed)
    });

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);
    fetch_options
}

/// Pick credentials the way the `git` command line would: the SSH agent for
/// SSH remotes, configured credential helpers for HTTPS.
fn credentials(
    url: &str,
    username: Option<&str>,
    allowed: CredentialType,
) -> std::result::Result<Cred, git2::Error> {
    let user = username.unwrap_or(DEFAULT_SSH_USER);
    debug!("Credentials requested for {} ({:?})", url, allowed);

    if allowed.contains(CredentialType::USERNAME) {
        return Cred::username(user);
    }
    if allowed.contains(CredentialType::SSH_KEY) {
        return Cred::ssh_key_from_agent(user);
    }
    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
        let config = git2::Config::open_default()?;
        return Cred::credential_helper(&config, url, username);
    }
    if allowed.contains(CredentialType::DEFAULT) {
        return Cred::default();
    }
    Err(git2::Error::from_str(&format!("no supported credentials for {}", url)))
}

/// Print git transfer progress
fn print_progress(progress: &Progress) {
    let received = progress.received_objects();
    let total = progress.total_objects();
    if total > 0 {
        debug!(
            "Receiving objects: {}% ({}/{})",
            (received * 100) / total,
            received,
            total
        );
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clone_checks_out_main() {
        let temp_dir = TempDir::new().unwrap();
        let upstream_path = temp_dir.path().join("upstream");
        let upstream = init_upstream(&upstream_path);
        let main = upstream.refname_to_id("refs/heads/main").unwrap();

        let workdir = temp_dir.path().join("issuer");
        let checkout =
            GitCheckout::clone_remote(upstream_path.to_str().unwrap(), &workdir).unwrap();
        checkout.checkout(None).unwrap();

        assert_eq!(checkout.head_commit().unwrap(), main);
        assert_eq!(checkout.origin_url().unwrap(), upstream_path.to_str().unwrap());
    }

    #[test]
    fn test_fetch_picks_up_new_commits() {
        let temp_dir = TempDir::new().unwrap();
        let upstream_path = temp_dir.path().join("upstream");
        let upstream = init_upstream(&upstream_path);

        let workdir = temp_dir.path().join("issuer");
        GitCheckout::clone_remote(upstream_path.to_str().unwrap(), &workdir).unwrap();

        let newer = commit_file(&upstream, "refs/heads/main", "CHANGELOG.md", "v2");

        let checkout = GitCheckout::open(&workdir).unwrap();
        checkout.fetch_origin().unwrap();
        checkout.checkout(None).unwrap();
        assert_eq!(checkout.head_commit().unwrap(), newer);
    }

    #[test]
    fn test_checkout_unknown_ref_fails() {
        let temp_dir = TempDir::new().unwrap();
        let upstream_path = temp_dir.path().join("upstream");
        init_upstream(&upstream_path);

        let workdir = temp_dir.path().join("issuer");
        let checkout =
            GitCheckout::clone_remote(upstream_path.to_str().unwrap(), &workdir).unwrap();
        assert!(checkout.checkout(Some("does-not-exist")).is_err());
    }

    #[test]
    fn test_ssh_remotes_are_supported() {
        // Port 1 refuses connections; the URL must get as far as connecting.
        for url in [
            "git@127.0.0.1:org/issuer.git",
            "ssh://git@127.0.0.1:1/org/issuer.git",
        ] {
            let temp_dir = TempDir::new().unwrap();
            let err = match GitCheckout::clone_remote(url, &temp_dir.path().join("issuer")) {
                Ok(_) => panic!("cloning {} should not succeed", url),
                Err(e) => e.to_string(),
            };
            assert!(!err.contains("unsupported URL protocol"), "{}", err);
        }
    }

    #[test]
    fn test_open_plain_directory_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let result = GitCheckout::open(temp_dir.path());
        assert!(matches!(
            result,
            Err(Error::InvalidProvisioningState { .. })
        ));
    }
}

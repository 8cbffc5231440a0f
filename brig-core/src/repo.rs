//! The public facade: one open repository handle with an explicit
//! open/close lifecycle (spec.md §9: "the daemon holds a single
//! repository handle ... no process-wide singletons"). Grounded on
//! the teacher's `Infinitree` facade in `tree.rs`, which plays the
//! same role of gluing the index, the object store, and the commit
//! log behind one `anyhow::Result`-returning API.

use crate::{
    catalog::{CatalogStore, CommitId, Entry, HistoryEntry},
    config::Config,
    diff::{self, Diff},
    identity::Identity,
    object::ObjectStore,
    remote::{self, Remote},
    sync::{self, RemoteFetch, SessionMode},
};
use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    sync::Arc,
};

/// An open repository: catalog log, blob store client, the remotes
/// list, and this peer's long-term identity, all under
/// `config.repo_path`.
pub struct Repo {
    pub config: Config,
    catalog: CatalogStore<File>,
    store: Arc<dyn ObjectStore>,
    remotes: Vec<Remote>,
    remote_cache: BTreeMap<String, BTreeMap<String, sync::RemoteEntry>>,
    identity: Identity,
}

impl Repo {
    /// Opens `<config.repo_path>/catalog.log` and `remotes.yml`,
    /// creating the repo directory if it doesn't exist yet.
    pub fn open(
        config: Config,
        store: Arc<dyn ObjectStore>,
        local_peer_id: impl Into<String>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.repo_path)?;

        let log_path = config.repo_path.join("catalog.log");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&log_path)?;
        let catalog = CatalogStore::open(file, local_peer_id)?;

        let remotes_path = config.repo_path.join("remotes.yml");
        let remotes = if remotes_path.exists() {
            remote::list_from_yaml(&std::fs::read_to_string(&remotes_path)?)?
        } else {
            Vec::new()
        };

        let identity = Identity::load_or_generate(
            config.repo_path.join("otr.key"),
            &ring::rand::SystemRandom::new(),
        )?;

        tracing::info!(
            path = %config.repo_path.display(),
            fingerprint = %identity.fingerprint(),
            "repository opened"
        );

        Ok(Repo {
            config,
            catalog,
            store,
            remotes,
            remote_cache: BTreeMap::new(),
            identity,
        })
    }

    pub fn whoami(&self) -> (&str, Option<&str>) {
        self.catalog.whoami()
    }

    /// This peer's long-term fingerprint, the value `Remote.fingerprint`
    /// and SMP authentication check incoming peers against.
    pub fn fingerprint(&self) -> String {
        self.identity.fingerprint()
    }

    pub fn stage(&mut self, entry: Entry) -> anyhow::Result<()> {
        Ok(self.catalog.stage(entry)?)
    }

    pub fn commit(&mut self, message: &str, now: i64) -> anyhow::Result<CommitId> {
        Ok(self.catalog.make_commit(message, now)?)
    }

    pub fn tag(&mut self, rev: &str, label: &str) -> anyhow::Result<()> {
        Ok(self.catalog.tag(rev, label)?)
    }

    pub fn untag(&mut self, label: &str) -> anyhow::Result<()> {
        Ok(self.catalog.untag(label)?)
    }

    pub fn reset(&mut self, path: &str, rev: &str, force: bool) -> anyhow::Result<()> {
        Ok(self.catalog.reset(path, rev, force)?)
    }

    pub fn history(&self, path: &str) -> anyhow::Result<Vec<HistoryEntry>> {
        Ok(self.catalog.history(path)?)
    }

    pub fn log(&self) -> Vec<crate::catalog::Commit> {
        self.catalog.log()
    }

    pub fn become_peer(&mut self, peer_id: &str) -> anyhow::Result<()> {
        Ok(self.catalog.become_peer(peer_id)?)
    }

    pub fn become_self(&mut self) {
        self.catalog.become_self()
    }

    /// `MakeDiff(self, self, CURR, HEAD)`.
    pub fn status(&self) -> anyhow::Result<Diff> {
        let curr = self.catalog.entries("CURR")?.clone();
        let head = match self.catalog.entries("HEAD") {
            Ok(entries) => entries.clone(),
            Err(crate::catalog::CatalogError::NotFound(_)) => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(diff::make_diff(&curr, &head, &[], None))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sync(
        &mut self,
        remote_name: &str,
        fetch: bool,
        fetcher: Option<&dyn RemoteFetch>,
        mode: SessionMode,
        now: i64,
    ) -> anyhow::Result<Diff> {
        let (local_peer_id, _) = self.catalog.whoami();
        let local_peer_id = local_peer_id.to_string();
        Ok(sync::sync(
            &mut self.catalog,
            self.store.as_ref(),
            &mut self.remote_cache,
            remote_name,
            fetch,
            fetcher,
            &local_peer_id,
            mode,
            now,
        )?)
    }

    pub fn remotes(&self) -> &[Remote] {
        &self.remotes
    }

    pub fn add_remote(&mut self, remote: Remote) -> anyhow::Result<()> {
        if self.remotes.iter().any(|r| r.name == remote.name) {
            anyhow::bail!("remote {} already exists", remote.name);
        }
        self.remotes.push(remote);
        self.save_remotes()
    }

    pub fn remove_remote(&mut self, name: &str) -> anyhow::Result<()> {
        let before = self.remotes.len();
        self.remotes.retain(|r| r.name != name);
        if self.remotes.len() == before {
            anyhow::bail!("no such remote: {name}");
        }
        self.save_remotes()
    }

    pub fn locate_remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|r| r.name == name)
    }

    fn save_remotes(&self) -> anyhow::Result<()> {
        let yaml = remote::to_yaml(&self.remotes)?;
        std::fs::write(self.config.repo_path.join("remotes.yml"), yaml)?;
        Ok(())
    }
}

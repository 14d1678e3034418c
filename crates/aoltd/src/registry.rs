//! Site registry and per-site concurrency gate.
//!
//! Every chassis record lives behind its own FIFO mutex. Operations on one
//! site are totally ordered by lock acquisition, including the provisioner
//! calls they make. Operations on different sites never wait on each other.
//! The outer map lock is held only long enough to look up or insert an
//! entry.
//!
//! Once a mutation has found its site it runs on a task of its own, so a
//! caller that stops waiting (a timeout, a dropped connection) still has its
//! effect applied, and a provisioner call is never left without its commit.

use crate::error::{RegistryError, RegistryResult};
use crate::inventory::{self, ChassisInventory};
use crate::provisioner::Provisioner;
use crate::sink::SnapshotSink;
use aolt_model::snapshot;
use aolt_model::{
    Action, ChassisError, ChassisRecord, ChassisResult, LineCard, PreProvision,
    PreparedTransition, ProvisioningEndpoint, TerminalOverrides, TerminalState,
};
use aolt_types::{LineCardDriver, SiteId, TerminalCoord};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Arguments of [`Registry::create_chassis`].
#[derive(Debug, Clone)]
pub struct CreateChassis {
    pub site: SiteId,
    pub endpoint: ProvisioningEndpoint,
    pub rack: u32,
    pub shelf: u32,
}

/// Arguments of [`Registry::attach_line_card`].
#[derive(Debug, Clone)]
pub struct AttachLineCard {
    pub driver: LineCardDriver,
    pub address: SocketAddr,
    pub hostname: String,
}

/// Outcome of one [`Registry::flush`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub stored: usize,
    pub clean: usize,
    pub failed: usize,
}

/// Outcome of [`Registry::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
}

/// Outcome of [`Registry::reflow`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReflowReport {
    pub line_cards: usize,
    pub terminals: usize,
    pub failures: usize,
}

#[derive(Debug)]
struct SiteEntry {
    record: ChassisRecord,
    dirty: bool,
}

type SharedEntry = Arc<Mutex<SiteEntry>>;
type SiteMap = Arc<RwLock<HashMap<SiteId, SharedEntry>>>;

/// All chassis records known to the daemon.
pub struct Registry {
    sites: SiteMap,
    provisioner: Arc<dyn Provisioner>,
}

fn require_credentials(user: &str, password: &str) -> ChassisResult<()> {
    if user.trim().is_empty() || password.is_empty() {
        return Err(ChassisError::validation(
            "credentials",
            "user and password must not be empty",
        ));
    }
    Ok(())
}

/// Runs a mutation on its own task and waits for it. Dropping the returned
/// future abandons the wait, never the mutation.
async fn detached<T, F>(work: F) -> RegistryResult<T>
where
    T: Send + 'static,
    F: Future<Output = RegistryResult<T>> + Send + 'static,
{
    match tokio::spawn(work.in_current_span()).await {
        Ok(result) => result,
        Err(e) => Err(ChassisError::internal(format!("registry task failed: {e}")).into()),
    }
}

async fn insert_chassis(
    sites: SiteMap,
    provisioner: Arc<dyn Provisioner>,
    request: CreateChassis,
) -> RegistryResult<SiteId> {
    provisioner
        .validate_login(&request.endpoint)
        .await
        .map_err(|e| ChassisError::external("validate_login", e.to_string()))?;

    let mut sites = sites.write().await;
    if sites.contains_key(&request.site) {
        info!("chassis created concurrently");
        return Ok(request.site);
    }
    let record = ChassisRecord::new(
        request.site.clone(),
        request.endpoint,
        request.rack,
        request.shelf,
    );
    sites.insert(
        request.site.clone(),
        Arc::new(Mutex::new(SiteEntry {
            record,
            dirty: true,
        })),
    );
    info!(rack = request.rack, shelf = request.shelf, "created chassis");
    Ok(request.site)
}

async fn apply_credentials(
    entry: SharedEntry,
    provisioner: Arc<dyn Provisioner>,
    user: String,
    password: String,
) -> RegistryResult<()> {
    let mut guard = entry.lock().await;

    let mut endpoint = guard.record.endpoint().clone();
    endpoint.user = user.clone();
    endpoint.password = password.clone();
    provisioner
        .validate_login(&endpoint)
        .await
        .map_err(|e| ChassisError::external("validate_login", e.to_string()))?;

    guard.record.set_credentials(&user, &password);
    guard.dirty = true;
    info!("updated provisioning credentials");
    Ok(())
}

async fn apply_line_card(
    entry: SharedEntry,
    provisioner: Arc<dyn Provisioner>,
    request: AttachLineCard,
) -> RegistryResult<u8> {
    let mut guard = entry.lock().await;

    let notice = guard
        .record
        .prepare_line_card(request.driver, request.address, &request.hostname)?;
    provisioner.add_line_card(&notice).await.map_err(|e| {
        warn!(error = %e, "provisioner rejected line card");
        ChassisError::external("add_line_card", e.to_string())
    })?;
    let number = guard.record.commit_line_card(&notice)?;
    guard.dirty = true;
    info!(card = number, "attached line card");
    Ok(number)
}

async fn notify(provisioner: &dyn Provisioner, prepared: &PreparedTransition) -> ChassisResult<()> {
    let Some(notice) = prepared.notice() else {
        return Ok(());
    };
    let result = match prepared.action() {
        Action::Activate => provisioner.activate_terminal(notice).await,
        Action::Deactivate => provisioner.deactivate_terminal(notice).await,
        Action::PreProvision => Ok(()),
    };
    result.map_err(|e| {
        warn!(
            action = %prepared.action(),
            subscriber = %notice.subscriber_name,
            error = %e,
            "provisioner call failed, transition not committed"
        );
        ChassisError::external(prepared.action().as_str(), e.to_string())
    })
}

async fn apply_transition<F>(
    entry: SharedEntry,
    provisioner: Arc<dyn Provisioner>,
    prepare: F,
) -> RegistryResult<TerminalState>
where
    F: FnOnce(&ChassisRecord) -> ChassisResult<PreparedTransition>,
{
    let mut guard = entry.lock().await;

    let prepared = prepare(&guard.record).map_err(|e| {
        if e.is_state_conflict() {
            debug!(error = %e, "transition refused");
        } else {
            warn!(error = %e, "transition rejected");
        }
        e
    })?;
    notify(provisioner.as_ref(), &prepared).await?;
    let action = prepared.action();
    let state = guard.record.commit(prepared)?;
    guard.dirty = true;
    info!(%action, %state, "terminal transition committed");
    Ok(state)
}

impl Registry {
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            sites: Arc::new(RwLock::new(HashMap::new())),
            provisioner,
        }
    }

    async fn entry(&self, site: &SiteId) -> RegistryResult<SharedEntry> {
        self.sites
            .read()
            .await
            .get(site)
            .cloned()
            .ok_or_else(|| RegistryError::unknown_site(site))
    }

    /// Entries sorted by site, so passes over the registry are deterministic.
    async fn entries(&self) -> Vec<(SiteId, SharedEntry)> {
        let mut entries: Vec<_> = self
            .sites
            .read()
            .await
            .iter()
            .map(|(site, entry)| (site.clone(), Arc::clone(entry)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Sites currently registered, sorted.
    pub async fn sites(&self) -> Vec<SiteId> {
        self.entries().await.into_iter().map(|(site, _)| site).collect()
    }

    /// Sites with changes not yet handed to a sink, sorted.
    pub async fn dirty_sites(&self) -> Vec<SiteId> {
        let mut dirty = Vec::new();
        for (site, entry) in self.entries().await {
            if entry.lock().await.dirty {
                dirty.push(site);
            }
        }
        dirty
    }

    /// Registers a new chassis. If the site already exists, its identifier
    /// is returned and nothing changes.
    #[instrument(skip(self, request), fields(site = %request.site))]
    pub async fn create_chassis(&self, request: CreateChassis) -> RegistryResult<SiteId> {
        require_credentials(&request.endpoint.user, &request.endpoint.password)?;
        if self.sites.read().await.contains_key(&request.site) {
            info!("chassis already exists");
            return Ok(request.site);
        }
        detached(insert_chassis(
            Arc::clone(&self.sites),
            Arc::clone(&self.provisioner),
            request,
        ))
        .await
    }

    /// Replaces the provisioning credentials after checking them.
    #[instrument(skip(self, password))]
    pub async fn update_credentials(
        &self,
        site: &SiteId,
        user: &str,
        password: &str,
    ) -> RegistryResult<()> {
        require_credentials(user, password)?;
        let entry = self.entry(site).await?;
        detached(apply_credentials(
            entry,
            Arc::clone(&self.provisioner),
            user.to_string(),
            password.to_string(),
        ))
        .await
    }

    /// Attaches a line card and binds its ports. Returns the card ordinal.
    #[instrument(skip(self, request), fields(driver = %request.driver, hostname = %request.hostname))]
    pub async fn attach_line_card(
        &self,
        site: &SiteId,
        request: AttachLineCard,
    ) -> RegistryResult<u8> {
        let entry = self.entry(site).await?;
        detached(apply_line_card(entry, Arc::clone(&self.provisioner), request)).await
    }

    async fn transition<F>(&self, site: &SiteId, prepare: F) -> RegistryResult<TerminalState>
    where
        F: FnOnce(&ChassisRecord) -> ChassisResult<PreparedTransition> + Send + 'static,
    {
        let entry = self.entry(site).await?;
        detached(apply_transition(entry, Arc::clone(&self.provisioner), prepare)).await
    }

    /// Activates a terminal with planned VLANs and generated identifiers.
    #[instrument(skip(self), fields(coord = %coord))]
    pub async fn activate(
        &self,
        site: &SiteId,
        coord: TerminalCoord,
        serial: &str,
    ) -> RegistryResult<TerminalState> {
        let serial = serial.to_string();
        self.transition(site, move |record| record.prepare_activate(coord, &serial))
            .await
    }

    /// Activates a terminal with caller-chosen VLANs and identifiers.
    #[instrument(skip(self, overrides), fields(coord = %coord))]
    pub async fn activate_explicit(
        &self,
        site: &SiteId,
        coord: TerminalCoord,
        serial: &str,
        overrides: TerminalOverrides,
    ) -> RegistryResult<TerminalState> {
        let serial = serial.to_string();
        self.transition(site, move |record| {
            record.prepare_activate_explicit(coord, &serial, overrides)
        })
        .await
    }

    /// Stages VLANs, identifiers and profiles on an inactive terminal.
    #[instrument(skip(self, values), fields(coord = %coord))]
    pub async fn pre_provision(
        &self,
        site: &SiteId,
        coord: TerminalCoord,
        values: PreProvision,
    ) -> RegistryResult<TerminalState> {
        self.transition(site, move |record| record.prepare_pre_provision(coord, values))
            .await
    }

    /// Activates a pre-provisioned terminal by serial number.
    #[instrument(skip(self), fields(coord = %coord))]
    pub async fn activate_serial(
        &self,
        site: &SiteId,
        coord: TerminalCoord,
        serial: &str,
    ) -> RegistryResult<TerminalState> {
        let serial = serial.to_string();
        self.transition(site, move |record| record.prepare_activate_serial(coord, &serial))
            .await
    }

    #[instrument(skip(self), fields(coord = %coord))]
    pub async fn deactivate(
        &self,
        site: &SiteId,
        coord: TerminalCoord,
    ) -> RegistryResult<TerminalState> {
        self.transition(site, move |record| record.prepare_deactivate(coord))
            .await
    }

    pub async fn terminal_state(
        &self,
        site: &SiteId,
        coord: TerminalCoord,
    ) -> RegistryResult<TerminalState> {
        let entry = self.entry(site).await?;
        let guard = entry.lock().await;
        Ok(guard.record.terminal_state(coord))
    }

    /// Copy of the line card with the given ordinal.
    pub async fn line_card(&self, site: &SiteId, number: u32) -> RegistryResult<LineCard> {
        let entry = self.entry(site).await?;
        let guard = entry.lock().await;
        Ok(guard.record.line_card(number)?.clone())
    }

    pub async fn inventory(&self, site: &SiteId) -> RegistryResult<ChassisInventory> {
        let entry = self.entry(site).await?;
        let guard = entry.lock().await;
        Ok(inventory::gather(&guard.record))
    }

    /// Inventory of every site, sorted by site.
    pub async fn inventory_all(&self) -> Vec<ChassisInventory> {
        let mut all = Vec::new();
        for (_, entry) in self.entries().await {
            all.push(inventory::gather(&entry.lock().await.record));
        }
        all
    }

    /// Serialized snapshot of one site.
    pub async fn snapshot(&self, site: &SiteId) -> RegistryResult<Vec<u8>> {
        let entry = self.entry(site).await?;
        let guard = entry.lock().await;
        Ok(snapshot::encode(&guard.record)?)
    }

    /// Re-sends every line card and active terminal to the provisioner.
    ///
    /// Failures are counted and logged; the pass always visits every site.
    #[instrument(skip(self))]
    pub async fn reflow(&self) -> ReflowReport {
        let mut report = ReflowReport::default();
        for (site, entry) in self.entries().await {
            let guard = entry.lock().await;
            for card in guard.record.line_card_notices() {
                match self.provisioner.add_line_card(&card).await {
                    Ok(()) => report.line_cards += 1,
                    Err(e) => {
                        report.failures += 1;
                        warn!(%site, card = card.number, error = %e, "reflow of line card failed");
                    }
                }
            }
            let notices = match guard.record.active_notices() {
                Ok(notices) => notices,
                Err(e) => {
                    report.failures += 1;
                    error!(%site, error = %e, "cannot enumerate active terminals");
                    continue;
                }
            };
            for notice in notices {
                match self.provisioner.activate_terminal(&notice).await {
                    Ok(()) => report.terminals += 1,
                    Err(e) => {
                        report.failures += 1;
                        warn!(
                            %site,
                            subscriber = %notice.subscriber_name,
                            error = %e,
                            "reflow of terminal failed"
                        );
                    }
                }
            }
        }
        info!(
            line_cards = report.line_cards,
            terminals = report.terminals,
            failures = report.failures,
            "reflow complete"
        );
        report
    }

    /// Hands every dirty site to the sink. A site stays dirty when encoding
    /// or storing fails.
    pub async fn flush(&self, sink: &dyn SnapshotSink) -> FlushReport {
        let mut report = FlushReport::default();
        for (site, entry) in self.entries().await {
            let mut guard = entry.lock().await;
            if !guard.dirty {
                report.clean += 1;
                continue;
            }
            let blob = match snapshot::encode(&guard.record) {
                Ok(blob) => blob,
                Err(e) => {
                    report.failed += 1;
                    error!(%site, error = %e, "cannot encode snapshot");
                    continue;
                }
            };
            match sink.store(&site, &blob).await {
                Ok(()) => {
                    guard.dirty = false;
                    report.stored += 1;
                    debug!(%site, bytes = blob.len(), "flushed snapshot");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(%site, error = %e, "snapshot store failed, site stays dirty");
                }
            }
        }
        report
    }

    /// Loads every stored snapshot. Restored sites start clean.
    ///
    /// Blobs that fail to decode, or that belong to a site already present,
    /// are skipped and logged.
    #[instrument(skip(self, sink))]
    pub async fn restore(&self, sink: &dyn SnapshotSink) -> RegistryResult<RestoreReport> {
        let blobs = sink
            .load_all()
            .await
            .map_err(|e| RegistryError::persistence("*", e.to_string()))?;

        let mut report = RestoreReport::default();
        let mut sites = self.sites.write().await;
        for (key, blob) in blobs {
            let record = match snapshot::decode(&blob) {
                Ok(record) => record,
                Err(e) => {
                    report.skipped += 1;
                    error!(site = %key, error = %e, "cannot decode snapshot");
                    continue;
                }
            };
            if record.site() != &key {
                report.skipped += 1;
                error!(key = %key, site = %record.site(), "snapshot stored under the wrong site");
                continue;
            }
            if sites.contains_key(&key) {
                report.skipped += 1;
                warn!(site = %key, "site already registered, ignoring stored snapshot");
                continue;
            }
            sites.insert(
                key,
                Arc::new(Mutex::new(SiteEntry {
                    record,
                    dirty: false,
                })),
            );
            report.restored += 1;
        }
        info!(restored = report.restored, skipped = report.skipped, "restore complete");
        Ok(report)
    }
}

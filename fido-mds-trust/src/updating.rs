//! A metadata service that keeps itself current by fetching the BLOB from the metadata
//! authority once a day.
//!
//! The installed [`MetadataService`] is held behind an `Arc` in a lock that is only taken
//! to clone the pointer out, or to swap a new one in. Fetching, verifying and indexing all
//! happen on a private instance before it is published, so lookups never wait on the
//! network and always observe one complete snapshot.

use crate::constants::{DEFAULT_FETCH_TIMEOUT, DEFAULT_REFRESH_AT, FIDO_MDS_URL};
use crate::error::{MdsError, MdsResult};
use crate::mds::{MetadataBlobPayloadEntry, MetadataStatement};
use crate::scheduler::{DailyScheduler, ScheduledTask, Scheduler};
use crate::service::MetadataService;
use chrono::NaiveTime;
use fido_pki::TrustedRoots;
use futures::FutureExt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use url::Url;

/// A constructor for a [`SelfUpdatingMds`].
pub struct SelfUpdatingMdsBuilder {
    url: Url,
    fetch_timeout: Duration,
    refresh_at: NaiveTime,
    trust_roots: Option<TrustedRoots>,
    scheduler: Option<Arc<dyn Scheduler>>,
    client: Option<reqwest::Client>,
}

impl SelfUpdatingMdsBuilder {
    /// Fetch the BLOB from `url`.
    pub fn new(url: Url) -> Self {
        SelfUpdatingMdsBuilder {
            url,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            refresh_at: DEFAULT_REFRESH_AT,
            trust_roots: None,
            scheduler: None,
            client: None,
        }
    }

    /// Fetch the BLOB from the FIDO Alliance production endpoint.
    pub fn fido_default() -> MdsResult<Self> {
        Ok(Self::new(Url::parse(FIDO_MDS_URL)?))
    }

    /// Bound on how long one fetch may take. Defaults to 10 seconds.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// The UTC time of day the default scheduler refreshes at. Defaults to midnight. Has no
    /// effect when a custom [`Scheduler`] is supplied.
    pub fn refresh_at(mut self, at: NaiveTime) -> Self {
        self.refresh_at = at;
        self
    }

    /// The roots the BLOB signing chain must terminate in. Defaults to the GlobalSign Root
    /// CA - R3 used by the FIDO Alliance. Only change this if you run your own metadata
    /// authority.
    pub fn trust_roots(mut self, roots: TrustedRoots) -> Self {
        self.trust_roots = Some(roots);
        self
    }

    /// Drive refreshes from this scheduler rather than a tokio [`DailyScheduler`].
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Fetch with this HTTP client. The fetch timeout is still applied per request.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Perform the first refresh and start the schedule. Fails if the first refresh fails,
    /// a service that has never held a snapshot is never handed out.
    pub async fn build(self) -> MdsResult<SelfUpdatingMds> {
        let roots = match self.trust_roots {
            Some(roots) => roots,
            None => TrustedRoots::fido_default().map_err(MdsError::Parse)?,
        };
        let client = self.client.unwrap_or_default();
        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(DailyScheduler::new(self.refresh_at)),
        };

        let fetcher = Fetcher {
            client,
            url: self.url,
            timeout: self.fetch_timeout,
            roots,
        };

        let first = fetcher.load().await.map_err(|e| {
            error!(?e, url = %fetcher.url, "initial metadata refresh failed");
            e
        })?;
        info!(
            no = first.sequence_number(),
            entries = first.entries().len(),
            next_update = first.next_update(),
            "installed initial metadata snapshot"
        );

        let inner = Arc::new(Inner {
            snapshot: RwLock::new(Arc::new(first)),
            refresh_guard: tokio::sync::Mutex::new(()),
            fetcher,
        });

        let weak = Arc::downgrade(&inner);
        let task: ScheduledTask = Arc::new(move || scheduled_refresh(weak.clone()).boxed());
        scheduler.schedule_daily(task)?;

        Ok(SelfUpdatingMds { inner, scheduler })
    }
}

struct Fetcher {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
    roots: TrustedRoots,
}

impl Fetcher {
    async fn fetch(&self) -> MdsResult<String> {
        debug!(url = %self.url, "fetching metadata BLOB");
        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MdsError::HttpStatus(status.as_u16()));
        }

        Ok(response.text().await?)
    }

    /// Fetch, verify and index a BLOB, without publishing it anywhere.
    async fn load(&self) -> MdsResult<MetadataService> {
        let blob = self.fetch().await?;
        MetadataService::from_blob(&blob, &self.roots)
    }
}

struct Inner {
    snapshot: RwLock<Arc<MetadataService>>,
    // Held for the whole of a refresh so that two never run at once.
    refresh_guard: tokio::sync::Mutex<()>,
    fetcher: Fetcher,
}

impl Inner {
    fn current(&self) -> Arc<MetadataService> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn refresh(&self) -> MdsResult<u32> {
        let _guard = self
            .refresh_guard
            .try_lock()
            .map_err(|_| MdsError::RefreshInProgress)?;

        let next = self.fetcher.load().await?;
        self.install(next)
    }

    fn install(&self, next: MetadataService) -> MdsResult<u32> {
        let offered = next.sequence_number();
        let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let current = slot.sequence_number();

        if offered < current {
            warn!(current, offered, "refusing to install an older metadata BLOB");
            return Err(MdsError::SequenceRollback { current, offered });
        }
        if offered == current {
            debug!(no = current, "metadata BLOB unchanged");
            return Ok(current);
        }

        *slot = Arc::new(next);
        drop(slot);

        info!(previous = current, no = offered, "installed new metadata snapshot");
        Ok(offered)
    }
}

async fn scheduled_refresh(inner: Weak<Inner>) {
    let Some(inner) = inner.upgrade() else {
        debug!("metadata service dropped, skipping scheduled refresh");
        return;
    };
    match inner.refresh().await {
        Ok(_) => {}
        Err(MdsError::RefreshInProgress) => {
            warn!("a metadata refresh is already running, skipping scheduled refresh");
        }
        Err(e) => {
            error!(?e, "scheduled metadata refresh failed, keeping the installed snapshot");
        }
    }
}

/// A [`MetadataService`] that refreshes itself on a daily schedule.
///
/// Lookups always read the most recently installed snapshot. A refresh that fails for any
/// reason leaves the installed snapshot in place. Dropping this value cancels the schedule.
pub struct SelfUpdatingMds {
    inner: Arc<Inner>,
    scheduler: Arc<dyn Scheduler>,
}

impl SelfUpdatingMds {
    /// Start building a service that fetches from `url`.
    pub fn builder(url: Url) -> SelfUpdatingMdsBuilder {
        SelfUpdatingMdsBuilder::new(url)
    }

    /// Build a service that fetches from the FIDO Alliance with default settings.
    pub async fn fido_default() -> MdsResult<Self> {
        SelfUpdatingMdsBuilder::fido_default()?.build().await
    }

    /// Fetch and install a new BLOB now. Returns the sequence number that is installed
    /// afterwards.
    ///
    /// # Errors
    ///
    /// [`MdsError::RefreshInProgress`] if another refresh is running,
    /// [`MdsError::SequenceRollback`] if the fetched BLOB is older than the installed one,
    /// or any fetch or verification error. In every case the installed snapshot is unchanged.
    pub async fn refresh(&self) -> MdsResult<u32> {
        self.inner.refresh().await.map_err(|e| {
            error!(?e, "metadata refresh failed, keeping the installed snapshot");
            e
        })
    }

    /// The currently installed snapshot. Hold on to it to make several lookups against the
    /// same BLOB.
    pub fn snapshot(&self) -> Arc<MetadataService> {
        self.inner.current()
    }

    /// The statement for the authenticator model with this AAGUID, in the installed
    /// snapshot. `aaguid` is compared as a UUID rather than as a string, so upper case and
    /// unhyphenated forms match too. See [`MetadataService::lookup_by_aaguid`].
    pub fn lookup_by_aaguid(&self, aaguid: &str) -> Option<MetadataStatement> {
        self.snapshot().lookup_by_aaguid(aaguid).cloned()
    }

    /// See [`MetadataService::lookup_by_key_identifier`].
    pub fn lookup_by_key_identifier(&self, key_id: &str) -> Option<MetadataStatement> {
        self.snapshot().lookup_by_key_identifier(key_id).cloned()
    }

    /// The full entry for this AAGUID, compared as a UUID. See
    /// [`MetadataService::lookup_entry_by_aaguid`].
    pub fn lookup_entry_by_aaguid(&self, aaguid: &str) -> Option<MetadataBlobPayloadEntry> {
        self.snapshot().lookup_entry_by_aaguid(aaguid).cloned()
    }

    /// The next update date of the installed BLOB.
    pub fn next_update(&self) -> String {
        self.snapshot().next_update().to_string()
    }

    /// The sequence number of the installed BLOB.
    pub fn sequence_number(&self) -> u32 {
        self.snapshot().sequence_number()
    }
}

impl Drop for SelfUpdatingMds {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::{
    errors::WorkflowError,
    types::{
        lease::{LeaseId, LeaseRequest},
        ticker::Ticker,
    },
    venue::{
        DynamicVenue,
        venue_error::{VenueError, VenueResult},
    },
};

/// Local view of the leases we hold, keyed by asset ticker.
///
/// Lease ids are only ever taken from the venue; whenever the local view and
/// the venue disagree the venue wins and the map is rebuilt.
pub struct LeaseRegistry {
    venue: DynamicVenue,
    held: BTreeMap<Ticker, Vec<LeaseId>>,
}

impl LeaseRegistry {
    pub fn new(venue: DynamicVenue) -> Self {
        Self {
            venue,
            held: BTreeMap::new(),
        }
    }

    pub fn ids(&self, ticker: &Ticker) -> &[LeaseId] {
        self.held.get(ticker).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn first(&self, ticker: &Ticker) -> Option<LeaseId> {
        self.ids(ticker).first().copied()
    }

    pub fn total(&self) -> usize {
        self.held.values().map(Vec::len).sum()
    }

    pub async fn refresh(&mut self) -> VenueResult<()> {
        let leases = self.venue.leases().await?;

        self.held.clear();
        for lease in leases {
            self.held.entry(lease.ticker).or_default().push(lease.id);
        }
        for ids in self.held.values_mut() {
            ids.sort();
        }

        debug!(held = self.total(), "lease registry refreshed");
        Ok(())
    }

    /// Requests a lease. When the venue does not echo the new lease back, the
    /// id is recovered by re-reading the held leases. A lease-and-use request
    /// may legitimately consume the lease, in which case `None` is returned.
    pub async fn acquire(&mut self, request: &LeaseRequest) -> VenueResult<Option<LeaseId>> {
        let before = self.ids(&request.ticker).to_vec();

        match self.venue.acquire_lease(request).await? {
            Some(lease) => {
                info!(ticker = %lease.ticker, id = %lease.id, "lease acquired");
                let ids = self.held.entry(lease.ticker).or_default();
                if !ids.contains(&lease.id) {
                    ids.push(lease.id);
                }
                Ok(Some(lease.id))
            }
            None => {
                self.refresh().await?;
                let id = self
                    .ids(&request.ticker)
                    .iter()
                    .find(|id| !before.contains(id))
                    .copied();

                match id {
                    Some(id) => info!(ticker = %request.ticker, %id, "lease acquired"),
                    None if request.inputs.is_empty() => {
                        warn!(ticker = %request.ticker, "lease request returned no lease")
                    }
                    None => debug!(ticker = %request.ticker, "lease consumed on use"),
                }

                Ok(id)
            }
        }
    }

    /// Reuses a held lease on `ticker` or rents a new one.
    pub async fn ensure(&mut self, ticker: &Ticker) -> Result<LeaseId, WorkflowError> {
        if let Some(id) = self.first(ticker) {
            return Ok(id);
        }

        self.refresh().await?;
        if let Some(id) = self.first(ticker) {
            return Ok(id);
        }

        self.acquire(&LeaseRequest::rent(ticker.clone()))
            .await?
            .ok_or_else(|| WorkflowError::LeaseUnavailable {
                ticker: ticker.clone(),
            })
    }

    /// Releases one lease. A lease the venue no longer knows is dropped from
    /// the local view after a refresh instead of failing the caller.
    pub async fn release(&mut self, id: LeaseId) -> VenueResult<()> {
        match self.venue.release_lease(id).await {
            Ok(()) => {
                for ids in self.held.values_mut() {
                    ids.retain(|held| *held != id);
                }
                self.held.retain(|_, ids| !ids.is_empty());
                info!(%id, "lease released");
                Ok(())
            }
            Err(VenueError::StaleLease { id }) => {
                warn!(%id, "lease already gone, refreshing");
                self.refresh().await
            }
            Err(error) => Err(error),
        }
    }

    /// Releases every lease held on `ticker`, as reported by the venue.
    pub async fn release_all(&mut self, ticker: &Ticker) -> VenueResult<usize> {
        self.refresh().await?;

        let ids = self.ids(ticker).to_vec();
        for id in &ids {
            self.release(*id).await?;
        }

        Ok(ids.len())
    }
}

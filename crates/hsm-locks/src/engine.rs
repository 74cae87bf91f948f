use std::sync::Arc;

use chrono::Utc;
use hsm_domain::{
    verify_reservation_duration, HsmError, ProcessingModel, Reservation, Xname,
};
use hsm_store::HsmStore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{
    Counts, FailedComponent, LockResponse, LockStatusResponse, ReservationCheckEntry,
    ReservationCheckResponse, ReservationCreateResponse, ReservationGrant,
};

/// The v2 cooperative locking engine.
///
/// All state lives in the store; this layer mints keys, validates requests,
/// applies the rigid/flexible batch model and shapes responses. Lock and
/// reservation changes are deliberately invisible to the SCN bus.
#[derive(Clone)]
pub struct LockEngine {
    store: Arc<dyn HsmStore>,
}

impl LockEngine {
    pub fn new(store: Arc<dyn HsmStore>) -> Self {
        LockEngine { store }
    }

    // ── Admin locks ─────────────────────────────────────────────────────────

    pub async fn lock(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
    ) -> Result<LockResponse, HsmError> {
        let batch = self.store.update_comp_locked(ids, true, model).await?;
        Ok(LockResponse::from_batch(batch))
    }

    pub async fn unlock(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
    ) -> Result<LockResponse, HsmError> {
        let batch = self.store.update_comp_locked(ids, false, model).await?;
        Ok(LockResponse::from_batch(batch))
    }

    pub async fn disable_reservations(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
    ) -> Result<LockResponse, HsmError> {
        let batch = self
            .store
            .update_comp_reservation_disabled(ids, true, model)
            .await?;
        Ok(LockResponse::from_batch(batch))
    }

    /// `repair` re-enables reservations on components disabled by an admin.
    pub async fn repair(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
    ) -> Result<LockResponse, HsmError> {
        let batch = self
            .store
            .update_comp_reservation_disabled(ids, false, model)
            .await?;
        Ok(LockResponse::from_batch(batch))
    }

    pub async fn status(&self, ids: &[Xname]) -> Result<LockStatusResponse, HsmError> {
        // Status reports absent ids rather than failing the batch.
        let mut found = Vec::new();
        let mut not_found = Vec::new();
        for id in ids {
            match self.store.get_lock_states(std::slice::from_ref(id)).await {
                Ok(mut states) => found.append(&mut states),
                Err(HsmError::NotFound(_)) => not_found.push(id.to_string()),
                Err(e) => return Err(e),
            }
        }
        Ok(LockStatusResponse { components: found, not_found })
    }

    // ── Reservations ────────────────────────────────────────────────────────

    fn mint(&self, id: &Xname, expiration_minutes: Option<u32>) -> Reservation {
        let now = Utc::now();
        Reservation {
            component_id: id.clone(),
            deputy_key: format!("{}:dk:{}", id, Uuid::new_v4()),
            reservation_key: format!("{}:rk:{}", id, Uuid::new_v4()),
            create_timestamp: now,
            expiration_timestamp: expiration_minutes
                .map(|m| now + chrono::Duration::minutes(m as i64)),
        }
    }

    /// Indefinite reservation: no expiration, admin scope.
    pub async fn reserve(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
    ) -> Result<ReservationCreateResponse, HsmError> {
        self.reserve_inner(ids, model, None).await
    }

    /// Service reservation: expires after `duration_minutes ∈ [1, 15]`.
    pub async fn reserve_service(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
        duration_minutes: u32,
    ) -> Result<ReservationCreateResponse, HsmError> {
        verify_reservation_duration(duration_minutes)?;
        self.reserve_inner(ids, model, Some(duration_minutes)).await
    }

    async fn reserve_inner(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
        duration_minutes: Option<u32>,
    ) -> Result<ReservationCreateResponse, HsmError> {
        let minted: Vec<Reservation> =
            ids.iter().map(|id| self.mint(id, duration_minutes)).collect();
        let (batch, created) = self.store.create_reservations(minted, model).await?;

        let success: Vec<ReservationGrant> = created
            .into_iter()
            .map(|r| ReservationGrant {
                id: r.component_id.to_string(),
                deputy_key: r.deputy_key,
                reservation_key: r.reservation_key,
                expiration_time: r.expiration_timestamp,
            })
            .collect();
        let failure: Vec<FailedComponent> = batch
            .failure
            .into_iter()
            .map(|(id, reason)| FailedComponent { id, reason: reason.to_string() })
            .collect();
        debug!(granted = success.len(), failed = failure.len(), "reservation create");
        Ok(ReservationCreateResponse {
            counts: Counts {
                total: success.len() + failure.len(),
                success: success.len(),
                failure: failure.len(),
            },
            success,
            failure,
        })
    }

    pub async fn renew(
        &self,
        reservation_keys: &[String],
        duration_minutes: u32,
        model: ProcessingModel,
    ) -> Result<LockResponse, HsmError> {
        let extend = verify_reservation_duration(duration_minutes)?;
        if reservation_keys.is_empty() {
            return Err(HsmError::ArgMissing("ReservationKeys".to_string()));
        }
        let batch = self
            .store
            .renew_reservations(reservation_keys, extend, model)
            .await?;
        Ok(LockResponse::from_batch(batch))
    }

    pub async fn check(
        &self,
        deputy_keys: &[String],
    ) -> Result<ReservationCheckResponse, HsmError> {
        if deputy_keys.is_empty() {
            return Err(HsmError::ArgMissing("DeputyKeys".to_string()));
        }
        let (checks, failures) = self.store.check_reservations(deputy_keys).await?;
        let success: Vec<ReservationCheckEntry> = checks
            .into_iter()
            .map(|c| ReservationCheckEntry {
                id: c.component_id.to_string(),
                deputy_key: c.deputy_key,
                creation_time: c.create_timestamp,
                expiration_time: c.expiration_timestamp,
            })
            .collect();
        let failure: Vec<FailedComponent> = failures
            .into_iter()
            .map(|(id, reason)| FailedComponent { id, reason: reason.to_string() })
            .collect();
        Ok(ReservationCheckResponse {
            counts: Counts {
                total: success.len() + failure.len(),
                success: success.len(),
                failure: failure.len(),
            },
            success,
            failure,
        })
    }

    pub async fn release(
        &self,
        reservation_keys: &[String],
        model: ProcessingModel,
    ) -> Result<LockResponse, HsmError> {
        if reservation_keys.is_empty() {
            return Err(HsmError::ArgMissing("ReservationKeys".to_string()));
        }
        let batch = self
            .store
            .release_reservations(reservation_keys, model)
            .await?;
        Ok(LockResponse::from_batch(batch))
    }

    /// Admin force-remove: clears reservations by component id, keyless.
    pub async fn remove(
        &self,
        ids: &[Xname],
        model: ProcessingModel,
    ) -> Result<LockResponse, HsmError> {
        let batch = self.store.release_reservations_force(ids, model).await?;
        Ok(LockResponse::from_batch(batch))
    }

    /// One sweep pass: drop reservations past expiry. No SCN is emitted.
    pub async fn sweep_expired(&self) -> Result<usize, HsmError> {
        let freed = self.store.expire_reservations(Utc::now()).await?;
        if !freed.is_empty() {
            info!(count = freed.len(), "expired reservations released");
        }
        Ok(freed.len())
    }
}

/// Periodic expiration sweep; runs until the process exits.
pub async fn run_expiry_sweep(engine: LockEngine, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = engine.sweep_expired().await {
            tracing::warn!(error = %e, "reservation sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_domain::{Component, ComponentState, FailReason};
    use hsm_store::InMemoryStore;

    async fn engine_with(ids: &[&str]) -> (LockEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let comps: Vec<Component> = ids
            .iter()
            .map(|id| Component::new(Xname::parse(id).unwrap(), ComponentState::On))
            .collect();
        store.upsert_components(comps).await.unwrap();
        (LockEngine::new(store.clone()), store)
    }

    fn x(s: &str) -> Xname {
        Xname::parse(s).unwrap()
    }

    #[tokio::test]
    async fn reserve_then_reserve_again_reports_reserved() {
        let (engine, _) = engine_with(&["x3000c0s9b0n0"]).await;
        let ids = [x("x3000c0s9b0n0")];

        let first = engine.reserve(&ids, ProcessingModel::Flexible).await.unwrap();
        assert_eq!(first.counts.success, 1);
        let grant = &first.success[0];
        assert!(grant.deputy_key.starts_with("x3000c0s9b0n0:dk:"));
        assert!(grant.reservation_key.starts_with("x3000c0s9b0n0:rk:"));
        assert!(grant.expiration_time.is_none());

        let second = engine.reserve(&ids, ProcessingModel::Flexible).await.unwrap();
        assert_eq!(second.counts.failure, 1);
        assert_eq!(second.failure[0].reason, FailReason::Reserved.to_string());
    }

    #[tokio::test]
    async fn service_reservation_durations_validated() {
        let (engine, _) = engine_with(&["x0c0s0b0n0"]).await;
        let ids = [x("x0c0s0b0n0")];
        assert!(matches!(
            engine.reserve_service(&ids, ProcessingModel::Rigid, 0).await,
            Err(HsmError::LockBadDuration(0))
        ));
        assert!(matches!(
            engine.reserve_service(&ids, ProcessingModel::Rigid, 16).await,
            Err(HsmError::LockBadDuration(16))
        ));
        let resp = engine
            .reserve_service(&ids, ProcessingModel::Rigid, 5)
            .await
            .unwrap();
        assert!(resp.success[0].expiration_time.is_some());
    }

    #[tokio::test]
    async fn renew_check_release_flow() {
        let (engine, _) = engine_with(&["x0c0s0b0n0"]).await;
        let ids = [x("x0c0s0b0n0")];
        let grant = engine
            .reserve_service(&ids, ProcessingModel::Rigid, 2)
            .await
            .unwrap()
            .success
            .remove(0);

        let renewed = engine
            .renew(&[grant.reservation_key.clone()], 15, ProcessingModel::Rigid)
            .await
            .unwrap();
        assert_eq!(renewed.counts.success, 1);

        let check = engine.check(&[grant.deputy_key.clone()]).await.unwrap();
        assert_eq!(check.counts.success, 1);
        assert_eq!(check.success[0].id, "x0c0s0b0n0");

        let released = engine
            .release(&[grant.reservation_key], ProcessingModel::Rigid)
            .await
            .unwrap();
        assert_eq!(released.counts.success, 1);

        // A released key no longer authorizes anything.
        let check = engine.check(&[grant.deputy_key]).await.unwrap();
        assert_eq!(check.counts.failure, 1);
    }

    #[tokio::test]
    async fn locked_component_rejects_reservation() {
        let (engine, _) = engine_with(&["x0c0s0b0n0"]).await;
        let ids = [x("x0c0s0b0n0")];
        engine.lock(&ids, ProcessingModel::Rigid).await.unwrap();

        let resp = engine.reserve(&ids, ProcessingModel::Flexible).await.unwrap();
        assert_eq!(resp.counts.failure, 1);
        assert_eq!(resp.failure[0].reason, FailReason::Locked.to_string());
    }

    #[tokio::test]
    async fn disable_evicts_and_blocks_reservations() {
        let (engine, _) = engine_with(&["x0c0s0b0n0"]).await;
        let ids = [x("x0c0s0b0n0")];
        engine.reserve(&ids, ProcessingModel::Rigid).await.unwrap();
        engine
            .disable_reservations(&ids, ProcessingModel::Rigid)
            .await
            .unwrap();

        let status = engine.status(&ids).await.unwrap();
        assert!(!status.components[0].reserved, "disable evicts the holder");
        assert!(status.components[0].reservation_disabled);

        let resp = engine.reserve(&ids, ProcessingModel::Flexible).await.unwrap();
        assert_eq!(resp.failure[0].reason, FailReason::Disabled.to_string());

        engine.repair(&ids, ProcessingModel::Rigid).await.unwrap();
        let resp = engine.reserve(&ids, ProcessingModel::Flexible).await.unwrap();
        assert_eq!(resp.counts.success, 1);
    }

    #[tokio::test]
    async fn force_remove_clears_without_key() {
        let (engine, _) = engine_with(&["x0c0s0b0n0"]).await;
        let ids = [x("x0c0s0b0n0")];
        engine.reserve(&ids, ProcessingModel::Rigid).await.unwrap();
        let removed = engine.remove(&ids, ProcessingModel::Rigid).await.unwrap();
        assert_eq!(removed.counts.success, 1);

        let status = engine.status(&ids).await.unwrap();
        assert!(!status.components[0].reserved);
    }

    #[tokio::test]
    async fn status_reports_missing_ids() {
        let (engine, _) = engine_with(&["x0c0s0b0n0"]).await;
        let resp = engine
            .status(&[x("x0c0s0b0n0"), x("x9c0s0b0n0")])
            .await
            .unwrap();
        assert_eq!(resp.components.len(), 1);
        assert_eq!(resp.not_found, ["x9c0s0b0n0"]);
    }
}

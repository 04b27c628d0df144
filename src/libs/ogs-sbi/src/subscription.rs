//! NF status subscriptions
//!
//! A [`SubscriptionSpec`] records a standing interest to subscribe to; a
//! [`SubscriptionData`] is one live subscription with its validity and
//! patch timers. Data refers to the requesting NF instance by id only and
//! is dropped together with that instance.

use std::time::{Duration, Instant};

use ogs_core::{OgsPoolId, OgsTimerId};

use crate::client::{ClientId, SbiClientKey};
use crate::context::{SbiContext, SbiTimerEvent};
use crate::error::{SbiError, SbiResult};
use crate::types::NfType;

pub type SubscriptionSpecId = OgsPoolId;
pub type SubscriptionDataId = OgsPoolId;

/// Subscription condition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscrCond {
    pub nf_type: Option<NfType>,
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    pub subscr_cond: SubscrCond,
}

#[derive(Debug, Clone)]
pub struct SubscriptionData {
    /// Subscription id assigned by the NRF
    pub id: Option<String>,
    pub notification_uri: Option<String>,
    pub resource_uri: Option<String>,
    pub req_nf_type: Option<NfType>,
    /// Instance that requested the subscription
    pub req_nf_instance_id: Option<String>,
    pub subscr_cond: SubscrCond,
    pub requester_features: u64,
    pub nrf_supported_features: u64,
    pub validity_duration: Option<Duration>,
    t_validity: OgsTimerId,
    t_patch: OgsTimerId,
    pub client: Option<ClientId>,
}

impl SubscriptionData {
    pub fn t_validity(&self) -> OgsTimerId {
        self.t_validity
    }

    pub fn t_patch(&self) -> OgsTimerId {
        self.t_patch
    }
}

impl SbiContext {
    /// Record a standing interest in an NF type and/or service
    pub fn subscription_spec_add(
        &mut self,
        nf_type: Option<NfType>,
        service_name: Option<&str>,
    ) -> SbiResult<SubscriptionSpecId> {
        if nf_type.is_none() && service_name.is_none() {
            return Err(SbiError::InvalidParam(
                "subscription needs an NF type or a service name".to_string(),
            ));
        }
        let spec = SubscriptionSpec {
            subscr_cond: SubscrCond {
                nf_type,
                service_name: service_name.map(str::to_string),
            },
        };
        self.subscription_specs
            .alloc(spec)
            .ok_or(SbiError::PoolExhausted("subscription_spec"))
    }

    pub fn subscription_spec(&self, id: SubscriptionSpecId) -> Option<&SubscriptionSpec> {
        self.subscription_specs.find(id)
    }

    pub fn subscription_specs(
        &self,
    ) -> impl Iterator<Item = (SubscriptionSpecId, &SubscriptionSpec)> {
        self.subscription_specs.iter()
    }

    pub fn subscription_spec_remove(&mut self, id: SubscriptionSpecId) -> SbiResult<()> {
        self.subscription_specs
            .free(id)
            .map(|_| ())
            .ok_or_else(|| SbiError::NotFound(format!("subscription spec {}", id)))
    }

    pub fn subscription_spec_remove_all(&mut self) {
        for id in self.subscription_specs.ids() {
            self.subscription_specs.free(id);
        }
    }

    /// Add a subscription with its (stopped) validity and patch timers
    pub fn subscription_data_add(&mut self) -> SbiResult<SubscriptionDataId> {
        self.ensure_initialized()?;
        if self.subscription_data.is_full() {
            log::error!(
                "Maximum number of subscriptions [{}] reached",
                self.subscription_data.capacity()
            );
            return Err(SbiError::PoolExhausted("subscription_data"));
        }

        let timers = &mut self.timers;
        let result = self.subscription_data.try_alloc_with(|id| {
            let t_validity = timers
                .add(SbiTimerEvent::SubscriptionValidity(id))
                .ok_or(SbiError::TimerUnavailable)?;
            let Some(t_patch) = timers.add(SbiTimerEvent::SubscriptionPatch(id)) else {
                timers.delete(t_validity);
                return Err(SbiError::TimerUnavailable);
            };
            Ok(SubscriptionData {
                id: None,
                notification_uri: None,
                resource_uri: None,
                req_nf_type: None,
                req_nf_instance_id: None,
                subscr_cond: SubscrCond::default(),
                requester_features: 0,
                nrf_supported_features: 0,
                validity_duration: None,
                t_validity,
                t_patch,
                client: None,
            })
        });

        match result {
            Some(Ok(id)) => {
                log::debug!("Subscription add ({})", id);
                Ok(id)
            }
            Some(Err(e)) => {
                log::error!("Subscription add failed: {}", e);
                Err(e)
            }
            None => Err(SbiError::PoolExhausted("subscription_data")),
        }
    }

    pub fn subscription_data(&self, id: SubscriptionDataId) -> Option<&SubscriptionData> {
        self.subscription_data.find(id)
    }

    pub fn subscription_data_mut(
        &mut self,
        id: SubscriptionDataId,
    ) -> Option<&mut SubscriptionData> {
        self.subscription_data.find_mut(id)
    }

    pub fn subscription_data_set_id(
        &mut self,
        id: SubscriptionDataId,
        subscription_id: &str,
    ) -> SbiResult<()> {
        let data = self
            .subscription_data
            .find_mut(id)
            .ok_or_else(|| SbiError::NotFound(format!("subscription {}", id)))?;
        data.id = Some(subscription_id.to_string());
        Ok(())
    }

    /// Find a subscription by the id the NRF gave it
    pub fn subscription_data_find(&self, subscription_id: &str) -> Option<SubscriptionDataId> {
        self.subscription_data
            .iter()
            .find(|(_, data)| data.id.as_deref() == Some(subscription_id))
            .map(|(id, _)| id)
    }

    pub fn subscription_data_count(&self) -> usize {
        self.subscription_data.allocated()
    }

    /// Start the validity timer and, when the validity is longer than the
    /// configured margin, the patch timer that fires that much earlier
    ///
    /// Without a validity granted by the peer the configured one applies.
    pub fn subscription_data_start_timers_at(
        &mut self,
        id: SubscriptionDataId,
        now: Instant,
        validity: Option<Duration>,
    ) -> SbiResult<()> {
        let validity = validity.unwrap_or_else(|| self.config().subscription_validity());
        let margin = Duration::from_secs(self.config().time.subscription_patch_margin);
        let data = self
            .subscription_data
            .find_mut(id)
            .ok_or_else(|| SbiError::NotFound(format!("subscription {}", id)))?;
        data.validity_duration = Some(validity);

        self.timers.start_at(data.t_validity, now, validity);
        match validity.checked_sub(margin) {
            Some(patch) if !patch.is_zero() => {
                self.timers.start_at(data.t_patch, now, patch);
            }
            _ => self.timers.stop(data.t_patch),
        }
        Ok(())
    }

    pub fn subscription_data_start_timers(
        &mut self,
        id: SubscriptionDataId,
        validity: Option<Duration>,
    ) -> SbiResult<()> {
        self.subscription_data_start_timers_at(id, Instant::now(), validity)
    }

    /// Bind the client the subscription talks to
    pub fn subscription_data_set_client(
        &mut self,
        id: SubscriptionDataId,
        key: SbiClientKey,
    ) -> SbiResult<ClientId> {
        if !self.subscription_data.contains(id) {
            return Err(SbiError::NotFound(format!("subscription {}", id)));
        }
        let client = self.clients.obtain(key)?;
        if let Some(data) = self.subscription_data.find_mut(id) {
            self.clients.bind(&mut data.client, client);
        }
        Ok(client)
    }

    /// Remove a subscription with its timers and client
    pub fn subscription_data_remove(&mut self, id: SubscriptionDataId) -> SbiResult<()> {
        let Some(mut data) = self.subscription_data.free(id) else {
            return Err(SbiError::NotFound(format!("subscription {}", id)));
        };
        self.timers.delete(data.t_validity);
        self.timers.delete(data.t_patch);
        self.clients.release(&mut data.client);
        log::debug!(
            "[{}] Subscription removed",
            data.id.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    /// Remove every subscription requested by `nf_instance_id`
    pub fn subscription_data_remove_all_by_nf_instance_id(&mut self, nf_instance_id: &str) {
        let ids: Vec<_> = self
            .subscription_data
            .iter()
            .filter(|(_, data)| data.req_nf_instance_id.as_deref() == Some(nf_instance_id))
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            if let Err(e) = self.subscription_data_remove(id) {
                log::warn!("{}", e);
            }
        }
    }

    pub fn subscription_data_remove_all(&mut self) {
        for id in self.subscription_data.ids() {
            if let Err(e) = self.subscription_data_remove(id) {
                log::warn!("{}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SbiConfig;
    use crate::types::UriScheme;

    fn context() -> SbiContext {
        let mut config = SbiConfig::default();
        config.pool.subscription = 4;
        config.pool.timer = 16;
        config.time.subscription_patch_margin = 10;
        SbiContext::new(NfType::Amf, config).unwrap()
    }

    #[test]
    fn test_subscription_spec() {
        let mut ctx = context();
        assert!(matches!(
            ctx.subscription_spec_add(None, None),
            Err(SbiError::InvalidParam(_))
        ));
        let a = ctx.subscription_spec_add(Some(NfType::Udm), None).unwrap();
        let b = ctx
            .subscription_spec_add(None, Some("nudm-sdm"))
            .unwrap();
        assert_eq!(ctx.subscription_specs().count(), 2);
        assert_eq!(
            ctx.subscription_spec(b).unwrap().subscr_cond.service_name.as_deref(),
            Some("nudm-sdm")
        );

        ctx.subscription_spec_remove(a).unwrap();
        assert!(ctx.subscription_spec_remove(a).is_err());
        ctx.subscription_spec_remove_all();
        assert_eq!(ctx.subscription_specs().count(), 0);
    }

    #[test]
    fn test_subscription_data_find_and_remove() {
        let mut ctx = context();
        let id = ctx.subscription_data_add().unwrap();
        ctx.subscription_data_set_id(id, "sub-1").unwrap();
        assert_eq!(ctx.subscription_data_find("sub-1"), Some(id));
        assert_eq!(ctx.subscription_data_find("sub-2"), None);

        let timers = ctx.timers.allocated();
        ctx.subscription_data_remove(id).unwrap();
        assert_eq!(ctx.timers.allocated(), timers - 2);
        assert!(ctx.subscription_data_remove(id).is_err());
        assert_eq!(ctx.subscription_data_find("sub-1"), None);
    }

    #[test]
    fn test_subscription_data_pool_bound() {
        let mut ctx = context();
        for _ in 0..4 {
            ctx.subscription_data_add().unwrap();
        }
        assert!(matches!(
            ctx.subscription_data_add(),
            Err(SbiError::PoolExhausted(_))
        ));
        ctx.subscription_data_remove_all();
        assert_eq!(ctx.subscription_data_count(), 0);
    }

    #[test]
    fn test_subscription_data_timer_exhaustion() {
        let mut config = SbiConfig::default();
        config.pool.timer = 1;
        let mut ctx = SbiContext::new(NfType::Amf, config).unwrap();
        assert!(matches!(
            ctx.subscription_data_add(),
            Err(SbiError::TimerUnavailable)
        ));
        assert_eq!(ctx.subscription_data_count(), 0);
        assert_eq!(ctx.timers.allocated(), 0);
    }

    #[test]
    fn test_subscription_timers() {
        let mut ctx = context();
        let id = ctx.subscription_data_add().unwrap();
        let now = Instant::now();
        ctx.subscription_data_start_timers_at(id, now, Some(Duration::from_secs(60)))
            .unwrap();

        assert_eq!(
            ctx.process_at(now + Duration::from_secs(55)),
            vec![SbiTimerEvent::SubscriptionPatch(id)]
        );
        assert_eq!(
            ctx.process_at(now + Duration::from_secs(61)),
            vec![SbiTimerEvent::SubscriptionValidity(id)]
        );

        // Shorter than the margin: no patch
        ctx.subscription_data_start_timers_at(id, now, Some(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(
            ctx.process_at(now + Duration::from_secs(6)),
            vec![SbiTimerEvent::SubscriptionValidity(id)]
        );
    }

    #[test]
    fn test_subscription_default_validity() {
        let mut config = SbiConfig::default();
        config.time.subscription_validity = 120;
        config.time.subscription_patch_margin = 20;
        let mut ctx = SbiContext::new(NfType::Amf, config).unwrap();
        let id = ctx.subscription_data_add().unwrap();
        let now = Instant::now();
        ctx.subscription_data_start_timers_at(id, now, None).unwrap();

        assert_eq!(
            ctx.subscription_data(id).unwrap().validity_duration,
            Some(Duration::from_secs(120))
        );
        assert!(ctx.process_at(now + Duration::from_secs(99)).is_empty());
        assert_eq!(
            ctx.process_at(now + Duration::from_secs(100)),
            vec![SbiTimerEvent::SubscriptionPatch(id)]
        );
        assert_eq!(
            ctx.process_at(now + Duration::from_secs(120)),
            vec![SbiTimerEvent::SubscriptionValidity(id)]
        );
    }

    #[test]
    fn test_subscription_client() {
        let mut ctx = context();
        let id = ctx.subscription_data_add().unwrap();
        let key = SbiClientKey::new(UriScheme::Http, Some("nrf.local".into()), 0, None, None);
        ctx.subscription_data_set_client(id, key.clone()).unwrap();
        ctx.subscription_data_set_client(id, key).unwrap();
        assert_eq!(ctx.client_count(), 1);
        ctx.subscription_data_remove(id).unwrap();
        assert_eq!(ctx.client_count(), 0);
    }

    #[test]
    fn test_remove_all_by_nf_instance_id() {
        let mut ctx = context();
        let a = ctx.subscription_data_add().unwrap();
        let b = ctx.subscription_data_add().unwrap();
        ctx.subscription_data_mut(a).unwrap().req_nf_instance_id = Some("nf-1".into());
        ctx.subscription_data_mut(b).unwrap().req_nf_instance_id = Some("nf-2".into());

        ctx.subscription_data_remove_all_by_nf_instance_id("nf-1");
        assert!(ctx.subscription_data(a).is_none());
        assert!(ctx.subscription_data(b).is_some());
    }
}

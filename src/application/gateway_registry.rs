//! Name-keyed registry of payment gateways.
//!
//! Constructed at startup and injected into the orchestrator; there is no
//! process-wide active gateway.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::payment::{GatewayError, GatewayErrorCode};
use crate::ports::PaymentGateway;

#[derive(Default)]
struct RegistryState {
    gateways: BTreeMap<String, Arc<dyn PaymentGateway>>,
    active: Option<String>,
}

/// Holds gateway adapters by name and tracks the active one.
#[derive(Default)]
pub struct GatewayRegistry {
    state: RwLock<RegistryState>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `gateway` under its own name. Last registration wins.
    pub fn register(&self, gateway: Arc<dyn PaymentGateway>) {
        let name = gateway.name().to_string();
        let replaced = self.write().gateways.insert(name.clone(), gateway).is_some();
        if replaced {
            tracing::debug!(gateway = %name, "Replaced registered payment gateway");
        } else {
            tracing::debug!(gateway = %name, "Registered payment gateway");
        }
    }

    /// Marks `name` as the active gateway.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` if no gateway with that name exists.
    pub fn set_active(&self, name: &str) -> Result<(), GatewayError> {
        let mut state = self.write();
        if !state.gateways.contains_key(name) {
            return Err(GatewayError::not_registered(name));
        }
        state.active = Some(name.to_string());
        tracing::info!(gateway = %name, "Active payment gateway set");
        Ok(())
    }

    /// The active gateway, or any registered gateway if none was set.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` only when the registry is empty.
    pub fn active(&self) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
        let state = self.read();
        if let Some(gateway) = state.active.as_ref().and_then(|n| state.gateways.get(n)) {
            return Ok(Arc::clone(gateway));
        }
        state
            .gateways
            .values()
            .next()
            .map(Arc::clone)
            .ok_or_else(|| {
                GatewayError::new(GatewayErrorCode::NotRegistered, "no payment gateway registered")
            })
    }

    /// Gateway registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
        self.read()
            .gateways
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| GatewayError::not_registered(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.read().gateways.keys().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

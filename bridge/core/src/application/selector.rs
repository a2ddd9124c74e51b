// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Selection - Load Balancing Policy
//
// Chooses which registered provider serves an unpinned request. The
// round-robin cursor belongs to one selector (one bridge); separate bridges
// rotate independently.

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::bridge_config::LoadBalancing;

#[derive(Debug, Default)]
pub struct ProviderSelector {
    cursor: AtomicUsize,
}

impl ProviderSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a provider name from `providers` (registry order).
    ///
    /// An empty registry yields `default_provider` so callers can report it.
    pub fn select(
        &self,
        providers: &[String],
        default_provider: &str,
        strategy: LoadBalancing,
    ) -> String {
        match providers {
            [] => default_provider.to_string(),
            [only] => only.clone(),
            _ => match strategy {
                LoadBalancing::RoundRobin => {
                    let index = self.cursor.fetch_add(1, Ordering::Relaxed) % providers.len();
                    providers[index].clone()
                }
                LoadBalancing::Random => {
                    let index = rand::rng().random_range(0..providers.len());
                    providers[index].clone()
                }
                LoadBalancing::Default => providers
                    .iter()
                    .find(|p| p.as_str() == default_provider)
                    .unwrap_or(&providers[0])
                    .clone(),
            },
        }
    }
}

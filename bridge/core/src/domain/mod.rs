// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provider-neutral types, the connector contract and bridge configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements the connector contract

pub mod llm;
pub mod retry;
pub mod connector;
pub mod bridge_config;

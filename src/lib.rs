//! # tiletuner
//!
//! An adaptive, background index tuner for a tile-group-oriented, MVCC
//! storage engine. Watches workload samples, proposes and retires
//! secondary indexes, and builds them incrementally without blocking
//! concurrent readers or writers.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                           Tuner                             │
//! │   drains samples → write-ratio EMA → column histogram       │
//! │   → add/drop policy → utility EMA → invokes the builder      │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ per table
//!          ┌──────────────────┼──────────────────┐
//!          ▼                  ▼                  ▼
//!   ┌─────────────┐   ┌───────────────┐   ┌──────────────┐
//!   │ SampleRing  │   │ IndexRegistry │   │  Builder      │
//!   │ (producers) │   │ (live slots)  │   │ (cursor++)   │
//!   └─────────────┘   └───────┬───────┘   └──────┬───────┘
//!                             │                  │
//!                             ▼                  ▼
//!                      ┌─────────────────────────────┐
//!                      │        Hybrid Scan           │
//!                      │ indexed prefix + seq suffix  │
//!                      └─────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`tile`] | Tile groups and tables — the storage model the tuner operates on |
//! | [`txn`] | MVCC visibility: tuple versions, snapshots, transaction manager |
//! | [`sample`] | Per-table ring buffer of workload observations |
//! | [`index`] | The polymorphic index interface and a concurrent skiplist implementation |
//! | [`registry`] | The per-table collection of live indexes |
//! | [`scan`] | The hybrid scan operator: index probe + sequential suffix |
//! | [`builder`] | The incremental, cursor-advancing index builder |
//! | [`tuner`] | The control loop tying all of the above together |
//!
//! ## Key Properties
//!
//! - **No stop-the-world builds** — an index under construction is
//!   queried correctly the moment it exists, via [`scan::hybrid_scan`].
//! - **Lock-free index core** — [`index::SkipListIndex`] keys on
//!   `(key, tuple identity)`, which makes re-inserting the same entry a
//!   safe no-op with no separate deduplication layer.
//! - **Bounded tuning cost** — both the builder and the tuner process a
//!   capped amount of work per pass ([`builder::BuildConfig`],
//!   [`tuner::TunerConfig`]), so neither starves foreground traffic.
//! - **Explicitly owned, not a singleton** — [`tuner::Tuner`] is a plain
//!   value you construct, register tables with, and start/stop; nothing
//!   is reached through a process-wide accessor.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tiletuner::tile::{Table, Value};
//! use tiletuner::tuner::{Tuner, TunerConfig};
//! use tiletuner::sample::Sample;
//! use tiletuner::txn::SimpleTransactionManager;
//!
//! let table = Arc::new(Table::new("orders", 3));
//! let txn = SimpleTransactionManager::new();
//! table.insert(vec![Value::Int(1), Value::Int(42), Value::Int(0)], txn.next_commit_id());
//!
//! // Workload observations feed the tuner.
//! table.samples.record(Sample::access(vec![1], 0.4));
//!
//! let tuner = Tuner::new(TunerConfig::default());
//! tuner.register_table(table.clone());
//! tuner.start();
//! // ... the background worker analyzes samples and builds indexes ...
//! tuner.stop();
//! ```

#![allow(dead_code)]

pub mod builder;
pub mod index;
pub mod registry;
pub mod sample;
pub mod scan;
pub mod tile;
pub mod tuner;
pub mod txn;

//! # Usagegate Server
//!
//! A standalone usage-control plane guarding the billable and
//! abuse-sensitive actions of an application: rate limiting, credit
//! consumption and one-time event rewards.
//!
//! ## Purpose
//!
//! Edge functions that generate menus, scan photos or process purchase
//! webhooks all need the same three decisions answered consistently:
//!
//! - **May this caller act right now?** (token-bucket rate limiting)
//! - **Has this exact operation already been paid for?** (idempotent
//!   credit ledger)
//! - **Has this event already been rewarded?** (idempotent event ledger)
//!
//! Instead of re-implementing those checks in every function, this server
//! centralizes them behind one HTTP surface. Every decision runs as a
//! single atomic unit inside one actor, so concurrent duplicate
//! submissions cannot double-charge or double-award.
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! usagegate --help
//!
//! # Start on port 8080 with 30 free credits per new subject
//! usagegate --http --http-port 8080 --initial-grant 30
//!
//! # Per-endpoint limits from a JSON file
//! usagegate --http --limits limits.json
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments or environment variables (CLI takes
//! precedence):
//!
//! ```bash
//! export USAGEGATE_HTTP=true
//! export USAGEGATE_HTTP_PORT=9090
//! export USAGEGATE_INITIAL_GRANT=30
//! usagegate
//!
//! # List all available environment variables
//! usagegate --list-env-vars
//! ```
//!
//! ## How It Works
//!
//! - **Rate checks** use a token bucket per (identifier, endpoint): each
//!   bucket holds `max_tokens`, refills at `refill_rate` tokens per
//!   second, and each call consumes `cost` tokens. Denied callers get an
//!   advisory `retry_after`. Infrastructure faults fail open.
//! - **Credit operations** are exactly-once per idempotency key: the
//!   first attempt settles the outcome (applied or rejected) and every
//!   replay returns that same outcome without moving the balance again.
//!   Infrastructure faults fail closed.
//! - **Events** are recorded at most once per dedup key, either the
//!   provider's event id or a (user, event type, calendar day) window in
//!   a fixed reference time zone. Award and dedup commit together.
//!
//! ## Architecture
//!
//! The server uses an actor-based architecture with Tokio for async I/O:
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  menu edge  │   │  scan edge  │   │   webhook   │
//! │  function   │   │  function   │   │   handler   │
//! └──────┬──────┘   └──────┬──────┘   └──────┬──────┘
//!        │                 │                 │
//!        └─────────────────┴─────────────────┘
//!                          │ HTTP/JSON
//!                    ┌─────▼─────┐
//!                    │   Actor   │
//!                    │  (single  │
//!                    │   owner)  │
//!                    └─────┬─────┘
//!                          │
//!                    ┌─────▼─────┐
//!                    │  Control  │
//!                    │   Plane   │
//!                    │   Store   │
//!                    └───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Rate check
//!
//! ```bash
//! curl -X POST http://localhost:8080/v1/throttle \
//!   -H "Content-Type: application/json" \
//!   -d '{"identifier": "user:123", "endpoint": "generate-menu"}'
//! ```
//!
//! ### Credit consume
//!
//! ```bash
//! curl -X POST http://localhost:8080/v1/credits/consume \
//!   -H "Content-Type: application/json" \
//!   -d '{"subject_id": "user:123", "amount": 5, "idempotency_key": "generate-menu:user:123:2025-W31"}'
//! ```
//!
//! ### Event reward
//!
//! ```bash
//! curl -X POST http://localhost:8080/v1/events \
//!   -H "Content-Type: application/json" \
//!   -d '{"user_id": "user:123", "event_type": "meal_logged", "points": 10, "credits": 1}'
//! ```

pub mod actor;
pub mod config;
pub mod metrics;
pub mod store;
pub mod transport;
pub mod types;

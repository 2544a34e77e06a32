//! Editorial board: reconciles ingested news and production items into a
//! six-column Kanban view.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │          │ <─────── │    ├─ api.rs  (route handlers, AppState)         │
//! └──────────┘ WebSocket│    └─ ws.rs   (WsMessage, event forwarder)       │
//!                       │         │                                        │
//!                       │         │ BoardController::drop_on()             │
//!                       │         v                                        │
//!                       │  dnd.rs  (DragPayload, reprove confirmations)    │
//!                       │         │                                        │
//!                       │         │ MoveOrchestrator::move_item()          │
//!                       │         v                                        │
//!                       │  orchestrator.rs ──> notify.rs (webhooks)        │
//!                       │         │                                        │
//!                       │         │ optimistic apply / confirm / rollback  │
//!                       │         v                                        │
//!                       │  store.rs  (snapshot + overlay) ──> projection   │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  gateway.rs  (BoardGateway trait)                │
//!                       │    ├─ rest.rs    (PostgREST backend)             │
//!                       │    └─ memory.rs  (seeded, in-process)            │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module       | Responsibility                                          |
//! |--------------|---------------------------------------------------------|
//! | `rows`       | Backend row shapes and their mapping to domain types    |
//! | `projection` | Pure column rules: promotion exclusion, published order |
//!
//! ## Typical Move Flow (production item review → send)
//!
//! 1. `POST /api/drop` → `BoardController::drop_on()` decodes the payload.
//! 2. `MoveOrchestrator::move_item()` checks the session, resolves the item
//!    against the store and claims it so no second move can overlap.
//! 3. `BoardStore::apply_optimistic()` records `{prev, target}` in the
//!    overlay; the card shows in `send` immediately.
//! 4. `BoardGateway::update_production_column()` persists. On failure the
//!    overlay entry is dropped and the card returns to `review`.
//! 5. The full record is re-fetched and posted to the review-complete
//!    webhook. A failed post only produces a warning notice.

pub mod api;
pub mod dnd;
pub mod gateway;
pub mod memory;
pub mod notify;
pub mod orchestrator;
pub mod projection;
pub mod rest;
pub mod rows;
pub mod server;
pub mod store;
pub mod ws;

pub use dnd::{BoardController, DragPayload, DropResult};
pub use gateway::{BoardGateway, ChangeEvent, ChangeSubscription, NewProductionItem};
pub use memory::{MemoryGateway, SeedData};
pub use notify::{Endpoint, Notifier, RetryPolicy, WebhookNotifier};
pub use orchestrator::{Delivery, MoveOrchestrator, MoveOutcome, MoveReport};
pub use projection::{BoardView, CardView, ColumnView, PendingMove};
pub use rest::{RestConfig, RestGateway};
pub use store::{BoardEvent, BoardState, BoardStore};

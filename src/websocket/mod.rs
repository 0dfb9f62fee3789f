//! WebSocket Change Notifications
//!
//! Pushes vault and table changes to connected clients so open views can
//! refresh. Notifications are informational: nothing is merged, the last
//! write wins.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: Manages all active connections and subscriptions
//! - **Handler**: Handles WebSocket upgrade and message processing
//! - **Bridge**: Relays `FallbackStore` and `TableStore` events into the hub
//! - **Messages**: Defines client and server message formats
//!
//! ## Topics
//!
//! - `vault.*` - Every vault key
//! - `vault.{key}` - One key (e.g., `vault.invoices`)
//! - `tables.*` - Every table row change
//! - `tables.{name}` - One table (e.g., `tables.clients`)
//! - `system` - Server notices
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8082/api/v1/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'subscribe', topics: ['tables.invoices']}));
//! };
//! ```

mod bridge;
mod handler;
mod hub;
mod messages;

pub use bridge::forward_events;
pub use handler::websocket_handler;
pub use hub::{ConnectionHub, HubConfig, HubError};
pub use messages::{ClientMessage, ServerMessage, WsEvent};

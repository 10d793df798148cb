//! Infrastructure Layer - adapters to the exchange
//!
//! - RestClient: listen-key lifecycle and signed REST calls
//! - WsClient: WebSocket connection to the streaming gateway
//! - codec: inbound frame classification, outbound message building
//! - signer: HMAC-SHA256 request signing
//! - url: connect URL construction

pub mod codec;
pub mod rest_client;
pub mod signer;
pub mod url;
pub mod ws_client;

pub use codec::{COMPRESSED_PONG_MAGIC, Decoded};
pub use rest_client::RestClient;
pub use signer::{SignedRequest, canonical_query, sign};
pub use url::connect_url;
pub use ws_client::{WsClient, WsWriter};

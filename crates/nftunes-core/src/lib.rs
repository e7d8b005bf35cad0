//! Domain core for the nftunes storefront: catalog, wallet session, unlock
//! reconciliation, purchase flow and the render projection, plus the
//! JSON-RPC chain client they run against.

pub mod abi;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod platform;
pub mod playback;
pub mod prefs;
pub mod projection;
pub mod protocol;
pub mod purchase;
pub mod reconcile;
pub mod rpc;
pub mod session;
pub mod state;
pub mod track;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

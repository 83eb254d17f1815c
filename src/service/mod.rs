//! Service layer
//!
//! Orchestrates the local stores, the image cache and the remote
//! collaborators. Services never hold a connection between calls.

mod account;
mod remote;
mod status;
mod timeline;

pub use account::{AccountService, UserLookup};
pub use remote::{Connectivity, RemoteClient, StaticConnectivity};
pub use status::StatusService;
pub use timeline::{Loaded, Origin, TimelineRequest, TimelineService};

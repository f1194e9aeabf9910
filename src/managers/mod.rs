// Managers Module
//
// Focused manager classes shared between the runtime driver and its
// observers (CLI, debug HTTP server).
//
// - BroadcastChannelManager: Tokio broadcast channel management

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;

/**
 * Real-time Module
 *
 * The live half of the server: the membership registry with its per-space
 * broadcast channels, and the WebSocket session endpoint that feeds it.
 */

pub mod registry;
pub mod session;

pub use registry::{MemberSession, MembershipRegistry, Outbound};
pub use session::handle_space_socket;

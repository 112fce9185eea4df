/**
 * Authentication Module
 *
 * JWT-based credential verification for the join path and the REST write
 * path. Password handling and signup/login flows live outside this core.
 */

pub mod sessions;

pub use sessions::{create_token, get_user_id_from_token, verify_token, Claims};

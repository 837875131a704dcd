//! Service layer over the API client

pub mod session;

pub use session::SessionService;

pub use self::client::{Client, ClientBuilder};
pub use self::response::Response;

pub mod client;
pub mod response;

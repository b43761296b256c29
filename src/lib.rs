pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod permission;
pub mod source;
pub mod window;
pub mod tasks {
    pub mod fetcher;
    pub mod load_more;
}

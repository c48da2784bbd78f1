pub mod config;
pub mod corrections;
pub mod eligibility;
pub mod error;
pub mod export;
pub mod formations;
pub mod http_cache;
pub mod http_client;
pub mod pipeline;
pub mod records;
pub mod season;
pub mod source;
pub mod teams;

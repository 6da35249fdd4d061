//! Data models for the pylon-link client library.
//!
//! Defines the wire frames exchanged with the Pylon gateway and the
//! configuration/status records exposed through the public API.

pub mod client_frame;
pub mod connection_options;
pub mod connection_state;
pub mod error_detail;
pub mod publish_options;
pub mod server_frame;
pub mod subscription_filter;
pub mod subscription_info;
pub mod subscription_kind;
pub mod subscription_status;


pub use client_frame::ClientFrame;
pub use connection_options::ConnectionOptions;
pub use connection_state::ConnectionState;
pub use error_detail::ErrorDetail;
pub use publish_options::PublishOptions;
pub use server_frame::ServerFrame;
pub use subscription_filter::SubscriptionFilter;
pub use subscription_info::SubscriptionInfo;
pub use subscription_kind::SubscriptionKind;
pub use subscription_status::SubscriptionStatus;

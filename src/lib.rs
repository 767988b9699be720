pub mod access_log;
pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod exception;
pub mod logging;
pub mod param;
pub mod redirect;
pub mod resolver;
pub mod response;
pub mod server;
pub mod util;

pub use codec::{HttpMessage, OutboundRequest};
pub use config::{ClientConfig, Config};
pub use dispatcher::ServerContext;
pub use exception::Exception;
pub use param::{HttpRequestMethod, HttpVersion};
pub use redirect::{FollowOutcome, FollowState, RedirectFollower, RedirectStep};
pub use resolver::ParsedUrl;
pub use response::Response;
pub use util::HtmlBuilder;

pub mod core;

pub use crate::core::config::ClientConfig;
pub use crate::core::errors::TransportError;
pub use crate::core::kernel::{
    Credentials, Params, ReqwestRest, Request, RestClient, RestResponse, RpcClient, SigningScheme,
    WsResponse, WsSession,
};

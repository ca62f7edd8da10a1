// Interface adapters: upstream clients, transports, storage and the HTTP surface.

pub mod channel;
pub mod clients;
pub mod http;
pub mod net;
pub mod protocol;
pub mod render;
pub mod routes;
pub mod state;
pub mod storage;
pub mod utils;

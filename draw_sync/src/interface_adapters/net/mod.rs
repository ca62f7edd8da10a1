// Network adapter modules split by streaming sockets vs request/response routes.

pub mod client;
pub mod internal;

pub use client::{snapshot_serializer, ws_handler};
pub use internal::{
    clear_selected_draw_handler, force_sync_handler, get_selected_draw_handler, health_handler,
    set_selected_draw_handler, state_handler,
};

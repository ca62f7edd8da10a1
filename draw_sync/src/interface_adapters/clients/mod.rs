// Outbound HTTP clients for the upstream time and draw endpoints.

pub mod time;

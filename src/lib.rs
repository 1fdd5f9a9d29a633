// src/lib.rs
pub mod ports {
    pub mod market_feed;
    pub mod replay_feed;
}
pub mod trade {
    pub mod execution {
        pub mod gateway;
        pub mod gateway_box;
        pub mod paper_gateway;
    }
}
pub mod config;
pub mod email_client;
pub mod execution_alert;
pub mod pair;
pub mod pairtrade;
pub mod selector;
pub mod series;
pub mod stats;

pub mod domain {
    pub mod error;
    pub mod models;
    pub mod ports;
    pub mod query;
    pub mod reply;
    pub mod run;
    pub mod schema;
}

pub mod app {
    pub mod catalog {
        pub mod confluence;
        pub mod jira;
    }
    pub mod catalog_audit;
    pub mod dispatcher;
    pub mod handlers {
        pub mod confluence;
        pub mod jira;
    }
    pub mod registry;
}

pub mod infra {
    pub mod config;
    pub mod confluence_client;
    pub mod jira_client;
    pub mod metrics;
    pub mod rest;
}

pub mod adapters {
    pub mod server;
}

pub mod shared {
    pub mod text;
}

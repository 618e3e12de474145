//! Deployment pipeline

pub mod certificate;
pub mod database;
pub mod dependencies;
pub mod envfile;
pub mod environment;
pub mod fsm;
pub mod migrations;
pub mod packages;
pub mod pipeline;
pub mod proxy;
pub mod repository;

pub mod bulk;
pub mod column;
pub mod commands;
pub mod config;
pub mod controller;
pub mod detail;
pub mod domain;
pub mod filter;
pub mod form;
pub mod inputter;
pub mod jobs;
pub mod layout;
pub mod model;
pub mod record;
pub mod repository;
pub mod resource;
pub mod selection;
pub mod tabular;
pub mod toast;
pub mod ui;

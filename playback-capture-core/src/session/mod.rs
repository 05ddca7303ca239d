mod capture_loop;
mod command;
pub mod controller;

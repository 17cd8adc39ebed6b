//! Command handlers

pub mod daemon;
pub mod doctor;
pub mod index;
pub mod init;
pub mod record;
pub mod status;
pub mod tag;

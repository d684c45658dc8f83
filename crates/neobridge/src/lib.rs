//! Case lifecycle and bed capacity coordination for urgent critical-care transfer referrals.

pub mod config;
pub mod error;
pub mod referrals;
pub mod telemetry;

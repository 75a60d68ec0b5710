//! Live push of activities, alerts, emergencies and visitor movements.

pub mod hub;
pub mod socket;

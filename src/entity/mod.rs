//! Entity model: who we are investigating and what we know about them.

mod intel;
mod profile;

pub use intel::{BasicInfo, EntityIntel, Finding, IntelCategory, PageIntel, PageType};
pub use profile::{EntityProfile, EntityType};

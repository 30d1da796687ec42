//! Group data structures
//!
//! A **group** is a named set of users, devices and resources that share a
//! default permission. Groups form a tree through `parent`/`subgroups` links:
//!
//! ```text
//!                 g1 (myhome)
//!        members {u1, u2, u3}  devices {d1, d3}
//!                     |
//!          +----------+----------+
//!          |                     |
//!     g2 (myroom)           g3 (balcony)
//!   members {u1, u2}      members {u1}
//! ```
//!
//! A child never holds a member, device or resource its parent does not.
//!
//! - **[`Group`]**: the persisted record
//! - **[`GroupResource`]**: a resource registered to a group via a routed href
//! - **[`Property`]** / **[`Replacement`]**: typed property values carried by a request
//! - **[`href`]**: routed href parsing

pub mod href;
mod model;
mod property;

pub use href::HrefError;
pub use model::{Group, GroupAcl, GroupResource, Permission};
pub use property::{Operation, Property, PropertyKey, PropertyUpdate, Replacement};

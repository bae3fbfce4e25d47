use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::db::Role;

/// A kind of authenticated user. Marker types implementing this trait select
/// which rights an [`super::AuthToken`] demands.
pub trait User {
    const RIGHTS: Rights;
}

/// Marker for routes only voters may reach.
pub struct VoterUser;

/// Marker for routes only administrators may reach.
pub struct AdminUser;

impl User for VoterUser {
    const RIGHTS: Rights = Rights::Voter;
}

impl User for AdminUser {
    const RIGHTS: Rights = Rights::Admin;
}

/// The rights claim carried inside an auth token.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl From<Role> for Rights {
    fn from(role: Role) -> Self {
        match role {
            Role::Voter => Self::Voter,
            Role::Admin => Self::Admin,
        }
    }
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

//! Caller identity as delivered by the identity provider.

use super::SignerRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Fiscal,
    Treasurer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Fiscal => "fiscal",
            Self::Treasurer => "treasurer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "fiscal" => Some(Self::Fiscal),
            "treasurer" => Some(Self::Treasurer),
            _ => None,
        }
    }
}

/// The acting user for a single engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub display_name: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, display_name: Option<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            display_name,
            role,
        }
    }

    /// Name shown on signatures and diligence stamps, falling back to the user id.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }

    /// Signature set this actor signs into, if any.
    pub fn signer_role(&self) -> Option<SignerRole> {
        match self.role {
            Role::Fiscal => Some(SignerRole::Fiscal),
            Role::Treasurer => Some(SignerRole::Treasurer),
            Role::Admin => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::parse("Treasurer"), Some(Role::Treasurer));
        assert_eq!(Role::parse(" fiscal "), Some(Role::Fiscal));
        assert_eq!(Role::parse("auditor"), None);
    }

    #[test]
    fn admins_do_not_sign() {
        let admin = Actor::new("u-1", None, Role::Admin);
        assert_eq!(admin.signer_role(), None);
        assert_eq!(admin.name(), "u-1");
    }
}

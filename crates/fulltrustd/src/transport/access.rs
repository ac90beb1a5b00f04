//! Access rules attached to the control channel endpoint.
//!
//! Rules are expressed as principals and rights, then projected onto the
//! socket's ownership and mode bits when the endpoint is bound.

use std::fmt;
use std::ops::BitOr;

/// Identity class a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    /// The sandboxed UI's identity, mapped to the socket's group.
    AppContainer,
    /// The account that owns the endpoint.
    Owner,
    /// Every local account.
    Everyone,
}

impl fmt::Display for Principal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::AppContainer => "app_container",
            Self::Owner => "owner",
            Self::Everyone => "everyone",
        })
    }
}

/// Set of rights granted by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessRights(u8);

impl AccessRights {
    /// Exchange messages over an existing connection.
    pub const READ_WRITE: Self = Self(0b001);
    /// Open a new connection to the endpoint.
    pub const CREATE_INSTANCE: Self = Self(0b010);
    /// Every right, including changing the endpoint itself.
    pub const FULL_CONTROL: Self = Self(0b111);

    /// Returns `true` when every right in `other` is granted.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AccessRights {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A single grant of rights to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRule {
    /// Who the rule applies to.
    pub principal: Principal,
    /// What the principal may do.
    pub rights: AccessRights,
}

impl AccessRule {
    /// Builds a rule.
    #[must_use]
    pub const fn new(principal: Principal, rights: AccessRights) -> Self {
        Self { principal, rights }
    }
}

/// Ordered list of access rules for the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    /// Builds the default policy for the helper's privilege level.
    ///
    /// The UI's identity may connect and exchange messages and the owner has
    /// full control. When the helper runs elevated, every account may also
    /// connect so a non-elevated UI can still reach it.
    #[must_use]
    pub fn for_privilege(elevated: bool) -> Self {
        let connect = AccessRights::READ_WRITE | AccessRights::CREATE_INSTANCE;
        let mut rules = vec![
            AccessRule::new(Principal::AppContainer, connect),
            AccessRule::new(Principal::Owner, AccessRights::FULL_CONTROL),
        ];
        if elevated {
            rules.push(AccessRule::new(Principal::Everyone, connect));
        }
        Self { rules }
    }

    /// Rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Returns `true` when `principal` may open and use a connection.
    #[must_use]
    pub fn allows_connect(&self, principal: Principal) -> bool {
        let connect = AccessRights::READ_WRITE | AccessRights::CREATE_INSTANCE;
        self.rules
            .iter()
            .any(|rule| rule.principal == principal && rule.rights.contains(connect))
    }

    /// Permission bits applied to the socket file.
    #[must_use]
    pub fn socket_mode(&self) -> u32 {
        self.class_bits(0o600, 0o060, 0o006)
    }

    /// Permission bits for the directory holding the socket.
    ///
    /// Every class that may connect needs to traverse the directory.
    #[must_use]
    pub fn directory_mode(&self) -> u32 {
        self.class_bits(0o700, 0o010, 0o001)
    }

    fn class_bits(&self, owner: u32, group: u32, other: u32) -> u32 {
        let mut mode = 0;
        if self.allows_connect(Principal::Owner) {
            mode |= owner;
        }
        if self.allows_connect(Principal::AppContainer) {
            mode |= group;
        }
        if self.allows_connect(Principal::Everyone) {
            mode |= other;
        }
        mode
    }
}

use super::*;
use duel_core::ID;
use duel_core::Unique;

/// User represents authentication state: anonymous or authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum User {
    Anon(Lurker),
    Auth(Member),
}

impl User {
    pub fn id(&self) -> Option<ID<Member>> {
        match self {
            Self::Auth(m) => Some(m.id()),
            Self::Anon(_) => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Auth(m) => Some(m.username()),
            Self::Anon(_) => None,
        }
    }
}

impl From<Lurker> for User {
    fn from(lurker: Lurker) -> Self {
        Self::Anon(lurker)
    }
}

impl From<Member> for User {
    fn from(member: Member) -> Self {
        Self::Auth(member)
    }
}

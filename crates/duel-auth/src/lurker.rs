use duel_core::ID;
use duel_core::Unique;

/// Anonymous session tracking for unauthenticated spectators.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lurker {
    id: ID<Lurker>,
}

impl Unique for Lurker {
    fn id(&self) -> ID<Lurker> {
        self.id
    }
}

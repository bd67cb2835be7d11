use std::fmt;

/// Lifecycle of a room session. Only `Idle` accepts `join`, only `Joined`
/// accepts `leave`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Idle,
    Joining,
    Joined,
    Leaving,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Joining | Self::Joined)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Joining => "joining",
            Self::Joined => "joined",
            Self::Leaving => "leaving",
        };
        f.write_str(name)
    }
}

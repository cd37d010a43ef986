use derive_more::Display;

/// Opaque identity of the signed-in user, as the store knows them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// An authenticated session. Its absence is all the engine cares about
/// beyond the user's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: UserId,
}

impl Session {
    pub fn new(user: impl Into<UserId>) -> Self {
        Self { user: user.into() }
    }
}

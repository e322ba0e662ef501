// cartsync/src/auth.rs

//! The authentication signal as the cart core sees it.
//!
//! Token acquisition and refresh happen elsewhere; the cart only cares about
//! whether a user is signed in and about the edges of that flag.

/// Opaque identity of the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentity(pub String);

impl UserIdentity {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for UserIdentity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthState {
  pub user: Option<UserIdentity>,
}

impl AuthState {
  pub fn guest() -> Self {
    Self { user: None }
  }

  pub fn signed_in(user: UserIdentity) -> Self {
    Self { user: Some(user) }
  }

  pub fn is_authenticated(&self) -> bool {
    self.user.is_some()
  }
}

/// Change of the authentication flag between two observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEdge {
  /// not authenticated → authenticated
  SignedIn,
  /// authenticated → not authenticated
  SignedOut,
  Unchanged,
}

impl AuthEdge {
  pub fn between(was_authenticated: bool, is_authenticated: bool) -> Self {
    match (was_authenticated, is_authenticated) {
      (false, true) => AuthEdge::SignedIn,
      (true, false) => AuthEdge::SignedOut,
      _ => AuthEdge::Unchanged,
    }
  }
}

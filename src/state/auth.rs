//! Reactive view of the signed-in member, fed by the external auth collaborator.

use tokio::sync::watch;

/// Identity of a signed-in member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Stable opaque identifier issued by the auth collaborator.
    pub uid: String,
}

impl Member {
    /// Wrap a uid.
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Profile attributes the components care about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberProfile {
    /// Whether the member may change other members' presence.
    pub is_admin: bool,
}

impl MemberProfile {
    /// Profile of an administrator.
    pub fn admin() -> Self {
        Self { is_admin: true }
    }
}

/// Owning side of the auth state. Integrators drive it from their authentication flow.
pub struct AuthProvider {
    user: watch::Sender<Option<Member>>,
    profile: watch::Sender<Option<MemberProfile>>,
}

impl AuthProvider {
    /// Start with nobody signed in.
    pub fn new() -> Self {
        let (user, _) = watch::channel(None);
        let (profile, _) = watch::channel(None);
        Self { user, profile }
    }

    /// Publish a signed-in member. The profile is published first so readers never
    /// see the new member paired with the previous profile.
    pub fn sign_in(&self, member: Member, profile: MemberProfile) {
        self.profile.send_replace(Some(profile));
        self.user.send_replace(Some(member));
    }

    /// Clear the signed-in member and its profile.
    pub fn sign_out(&self) {
        self.user.send_replace(None);
        self.profile.send_replace(None);
    }

    /// Read side handed to the components.
    pub fn handle(&self) -> AuthHandle {
        AuthHandle {
            user: self.user.subscribe(),
            profile: self.profile.subscribe(),
        }
    }
}

impl Default for AuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheap, cloneable read side of [`AuthProvider`].
#[derive(Clone)]
pub struct AuthHandle {
    user: watch::Receiver<Option<Member>>,
    profile: watch::Receiver<Option<MemberProfile>>,
}

impl AuthHandle {
    /// Handle that never has a signed-in member, for read-only consumers.
    pub fn signed_out() -> Self {
        AuthProvider::new().handle()
    }

    /// Currently signed-in member, if any.
    pub fn user(&self) -> Option<Member> {
        self.user.borrow().clone()
    }

    /// Whether the current profile carries the admin flag. A missing profile is not admin.
    pub fn is_admin(&self) -> bool {
        self.profile
            .borrow()
            .map(|profile| profile.is_admin)
            .unwrap_or(false)
    }

    /// Receiver notified whenever the signed-in member changes.
    pub fn watch_user(&self) -> watch::Receiver<Option<Member>> {
        self.user.clone()
    }
}

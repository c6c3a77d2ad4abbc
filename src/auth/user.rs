use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Roles granted to a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roles(u32);

bitflags! {
    impl Roles: u32 {
        /// Listing, metadata and content reads
        const READ = 0x0000_0001;
        /// Writes, deletes, moves and folder creation
        const WRITE = 0x0000_0002;
    }
}

/// Path prefixes a user may touch. `None` means unrestricted and an empty
/// list grants nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Permissions {
    #[serde(default)]
    pub paths: Option<Vec<String>>,
}

impl Permissions {
    pub fn unrestricted() -> Self {
        Self { paths: None }
    }

    pub fn paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            paths: Some(paths.into_iter().map(Into::into).collect()),
        }
    }

    /// Prefix match against the list. Restricted users are refused any path
    /// with a `..` segment.
    pub fn allows(&self, path: &str) -> bool {
        let Some(paths) = self.paths.as_ref() else {
            return true;
        };

        if Path::new(path)
            .components()
            .any(|component| component == Component::ParentDir)
        {
            return false;
        }

        paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub security_key: String,
    pub roles: Roles,
    #[serde(default)]
    pub permissions: Permissions,
}

impl User {
    pub fn new<N: Into<String>, K: Into<String>>(name: N, security_key: K, roles: Roles) -> Self {
        Self {
            id: crate::utils::new_id(),
            name: name.into(),
            security_key: security_key.into(),
            roles,
            permissions: Permissions::unrestricted(),
        }
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub const fn has_role(&self, role: Roles) -> bool {
        self.roles.contains(role)
    }

    pub fn can_access(&self, path: &str) -> bool {
        self.permissions.allows(path)
    }
}

#[cfg(test)]
mod test_user {
    use super::*;

    #[test]
    fn test_absent_list_allows_everything() {
        assert!(Permissions::unrestricted().allows("/anything/at/all"));
    }

    #[test]
    fn test_empty_list_denies_everything() {
        let permissions = Permissions::paths(Vec::<String>::new());
        assert!(!permissions.allows("/data"));
        assert!(!permissions.allows(""));
    }

    #[test]
    fn test_prefix_match() {
        let permissions = Permissions::paths(["/data", "/srv/shared"]);
        assert!(permissions.allows("/data"));
        assert!(permissions.allows("/data/a.txt"));
        assert!(permissions.allows("/srv/shared/x"));
        assert!(!permissions.allows("/other"));
        assert!(!permissions.allows("/srv"));
    }

    #[test]
    fn test_parent_segments_are_denied() {
        let permissions = Permissions::paths(["/data"]);
        assert!(!permissions.allows("/data/../etc/passwd"));
        assert!(!permissions.allows("/data/a/../../etc"));
        assert!(!permissions.allows("/data/.."));
        assert!(permissions.allows("/data/a..b/c"));
        assert!(permissions.allows("/data/./a"));

        assert!(Permissions::unrestricted().allows("/data/../etc"));
    }

    #[test]
    fn test_user_json() {
        let user = User::new("reader", "secret", Roles::READ)
            .with_permissions(Permissions::paths(["/data"]));
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains(r#""SecurityKey":"secret""#));
        assert!(json.contains(r#""Paths":["/data"]"#));

        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
        assert!(back.has_role(Roles::READ));
        assert!(!back.has_role(Roles::WRITE));
    }
}

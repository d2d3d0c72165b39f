use super::{ModuleVersion, NewDirectoryUser};

/// Argument builders for one admin module version.
pub trait DirectoryAdmin: Send + Sync {
    fn version(&self) -> ModuleVersion;

    fn connect(&self, server: &str, admin_user: &str) -> Vec<String>;

    fn disconnect(&self, server: &str) -> Vec<String>;

    fn create_user(&self, user: &NewDirectoryUser, domain: &str) -> Vec<String>;

    fn add_group_member(&self, group: &str, user_name: &str, domain: &str) -> Vec<String>;
}

/// Select the implementation once, at startup.
pub fn admin_for(version: ModuleVersion) -> Box<dyn DirectoryAdmin> {
    match version {
        ModuleVersion::V1 => Box::new(LegacyModule),
        ModuleVersion::V2 => Box::new(CurrentModule),
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_string()).collect()
}

/// V1: flat verbs, principals as `name@domain`.
pub struct LegacyModule;

impl DirectoryAdmin for LegacyModule {
    fn version(&self) -> ModuleVersion {
        ModuleVersion::V1
    }

    fn connect(&self, server: &str, admin_user: &str) -> Vec<String> {
        args(&["connect", "--server", server, "--user", admin_user])
    }

    fn disconnect(&self, server: &str) -> Vec<String> {
        args(&["disconnect", "--server", server])
    }

    fn create_user(&self, user: &NewDirectoryUser, domain: &str) -> Vec<String> {
        let principal = format!("{}@{domain}", user.user_name);
        args(&[
            "person-user",
            "new",
            "--user",
            &principal,
            "--email",
            &user.email,
            "--first-name",
            &user.first_name,
            "--last-name",
            &user.last_name,
        ])
    }

    fn add_group_member(&self, group: &str, user_name: &str, domain: &str) -> Vec<String> {
        let group = format!("{group}@{domain}");
        let member = format!("{user_name}@{domain}");
        args(&["group", "add-member", "--group", &group, "--member", &member])
    }
}

/// V2: noun-verb subcommands, explicit `--domain`.
pub struct CurrentModule;

impl DirectoryAdmin for CurrentModule {
    fn version(&self) -> ModuleVersion {
        ModuleVersion::V2
    }

    fn connect(&self, server: &str, admin_user: &str) -> Vec<String> {
        args(&["session", "open", "--server", server, "--username", admin_user])
    }

    fn disconnect(&self, server: &str) -> Vec<String> {
        args(&["session", "close", "--server", server])
    }

    fn create_user(&self, user: &NewDirectoryUser, domain: &str) -> Vec<String> {
        args(&[
            "users",
            "create",
            "--name",
            &user.user_name,
            "--domain",
            domain,
            "--email",
            &user.email,
            "--given-name",
            &user.first_name,
            "--family-name",
            &user.last_name,
        ])
    }

    fn add_group_member(&self, group: &str, user_name: &str, domain: &str) -> Vec<String> {
        args(&[
            "groups", "members", "add", group, "--member", user_name, "--domain", domain,
        ])
    }
}

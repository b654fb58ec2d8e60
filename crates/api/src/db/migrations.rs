//! Canonical migration definitions.

/// A named migration: `(name, sql)`.
pub type Migration = (&'static str, &'static str);

/// Applied in order; each name is recorded in `_migrations` once run.
pub const MIGRATIONS: &[Migration] = &[(
    "0001_schema",
    include_str!("../../migrations/0001_schema.sql"),
)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_names_are_unique_and_ordered() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(n, _)| *n).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_schema_declares_every_table() {
        let sql = MIGRATIONS[0].1;
        for table in [
            "users",
            "otp_codes",
            "refresh_tokens",
            "workspaces",
            "workspace_users",
            "workspace_invitations",
            "form_templates",
            "forms",
            "form_responses",
            "form_response_files",
        ] {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing table {table}"
            );
        }
    }
}

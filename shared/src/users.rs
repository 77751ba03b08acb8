use chrono::Duration;

use crate::capabilities::SubscriptionId;
use crate::model::{Timestamp, UserEntry};

#[derive(Debug, Default)]
pub struct UserDirectory {
    pub open: bool,
    pub loading: bool,
    pub users: Vec<UserEntry>,
    pub query: String,
    pub subscription: Option<SubscriptionId>,
}

impl UserDirectory {
    /// Entries matching the current query, in snapshot order.
    #[must_use]
    pub fn filtered(&self) -> Vec<&UserEntry> {
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return self.users.iter().collect();
        }
        self.users
            .iter()
            .filter(|user| {
                user.email.to_lowercase().contains(&query)
                    || user
                        .display_name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(&query))
            })
            .collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[must_use]
pub fn display_label(user: &UserEntry) -> String {
    match user.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => crate::auth::fallback_display_name(&user.email),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

#[must_use]
pub fn format_last_seen(last_seen: Option<Timestamp>, now: Timestamp) -> String {
    let Some(seen) = last_seen.and_then(Timestamp::to_datetime) else {
        return "Never".into();
    };
    let Some(now) = now.to_datetime() else {
        return "Never".into();
    };

    let elapsed = now.signed_duration_since(seen);
    if elapsed < Duration::minutes(1) {
        return "Just now".into();
    }
    if elapsed < Duration::hours(1) {
        return plural(elapsed.num_minutes(), "minute");
    }
    if elapsed < Duration::days(1) {
        return plural(elapsed.num_hours(), "hour");
    }
    if elapsed < Duration::days(7) {
        return plural(elapsed.num_days(), "day");
    }

    seen.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str, name: Option<&str>) -> UserEntry {
        UserEntry {
            id: email.into(),
            email: email.into(),
            display_name: name.map(Into::into),
            is_online: None,
            last_seen: None,
        }
    }

    #[test]
    fn search_matches_email_and_name_case_insensitively() {
        let directory = UserDirectory {
            users: vec![
                user("budi@example.com", Some("Budi Santoso")),
                user("citra@example.com", None),
            ],
            query: "  SANTOSO ".into(),
            ..UserDirectory::default()
        };
        let hits: Vec<_> = directory.filtered().iter().map(|u| u.email.as_str()).collect();
        assert_eq!(hits, ["budi@example.com"]);

        let directory = UserDirectory {
            query: "CITRA@".into(),
            ..directory
        };
        assert_eq!(directory.filtered().len(), 1);
    }

    #[test]
    fn blank_query_shows_everyone() {
        let directory = UserDirectory {
            users: vec![user("a@x.io", None), user("b@x.io", None)],
            query: "   ".into(),
            ..UserDirectory::default()
        };
        assert_eq!(directory.filtered().len(), 2);
    }

    #[test]
    fn label_falls_back_to_email_local_part() {
        assert_eq!(display_label(&user("dewi@x.io", Some("Dewi"))), "Dewi");
        assert_eq!(display_label(&user("dewi@x.io", Some("  "))), "dewi");
        assert_eq!(display_label(&user("dewi@x.io", None)), "dewi");
    }

    #[test]
    fn last_seen_labels() {
        let now = Timestamp::from_millis(1_700_000_000_000);
        let ago = |secs: i64| Some(Timestamp::from_millis(now.as_millis() - secs * 1000));

        assert_eq!(format_last_seen(None, now), "Never");
        assert_eq!(format_last_seen(ago(30), now), "Just now");
        assert_eq!(format_last_seen(ago(60), now), "1 minute ago");
        assert_eq!(format_last_seen(ago(5 * 60), now), "5 minutes ago");
        assert_eq!(format_last_seen(ago(3600), now), "1 hour ago");
        assert_eq!(format_last_seen(ago(2 * 86_400), now), "2 days ago");
        assert_eq!(format_last_seen(ago(30 * 86_400), now), "2023-10-15");
    }
}

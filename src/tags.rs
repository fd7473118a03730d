//! Tag Codec (C1) — the engine's authoritative state representation.
//!
//! Every piece of jellysweep state lives as a string tag attached to a title
//! inside the owning manager (Sonarr/Radarr). This module is the only place
//! that knows the tag grammar; everything else reasons about titles purely
//! through [`Tag`] and the predicates below.
//!
//! Sanitization note: because `-` is both the field separator and a legal
//! character in a requester's own name, two distinct requesters (`a-b` and
//! `a_b`) sanitize to the same label and are therefore indistinguishable once
//! encoded. This is a known limitation, not a bug — see DESIGN.md.

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use std::fmt;

pub const PREFIX: &str = "jellysweep";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Delete {
        date: NaiveDate,
    },
    DeleteDiskUsage {
        pct: u32,
        date: NaiveDate,
    },
    KeepRequest {
        date: NaiveDate,
        requester: Option<String>,
    },
    MustKeep {
        date: NaiveDate,
        requester: Option<String>,
    },
    MustDeleteForSure,
    Ignore,
}

impl Tag {
    /// Sanitizes a requester name the way the encoder will: `-` and
    /// whitespace become `_`, and the whole string is lowercased.
    pub fn sanitize_requester(requester: &str) -> String {
        requester
            .trim()
            .chars()
            .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
            .collect::<String>()
            .to_lowercase()
    }

    pub fn encode(&self) -> String {
        match self {
            Tag::Delete { date } => format!("{PREFIX}-delete-{date}"),
            Tag::DeleteDiskUsage { pct, date } => format!("{PREFIX}-delete-du{pct}-{date}"),
            Tag::KeepRequest { date, requester } => match requester {
                Some(r) => format!("{PREFIX}-keep-request-{date}-{}", Tag::sanitize_requester(r)),
                None => format!("{PREFIX}-keep-request-{date}"),
            },
            Tag::MustKeep { date, requester } => match requester {
                Some(r) => format!("{PREFIX}-must-keep-{date}-{}", Tag::sanitize_requester(r)),
                None => format!("{PREFIX}-must-keep-{date}"),
            },
            Tag::MustDeleteForSure => format!("{PREFIX}-must-delete-for-sure"),
            Tag::Ignore => format!("{PREFIX}-ignore"),
        }
        .to_lowercase()
    }

    /// Parses a raw tag label. Returns `None` for anything that isn't a
    /// jellysweep tag, or whose shape we recognize but whose date fails to
    /// parse (§4.1: "failure to parse is logged but never panics").
    pub fn parse(label: &str) -> Option<Tag> {
        let label = label.to_lowercase();
        let rest = label.strip_prefix(&format!("{PREFIX}-"))?;

        if rest == "ignore" {
            return Some(Tag::Ignore);
        }
        if rest == "must-delete-for-sure" {
            return Some(Tag::MustDeleteForSure);
        }

        if let Some(rest) = rest.strip_prefix("delete-du") {
            let mut parts = rest.splitn(2, '-');
            let pct_str = parts.next()?;
            let date_str = parts.next()?;
            let pct = match pct_str.parse::<f64>() {
                Ok(p) => p.round() as u32,
                Err(_) => {
                    warn!("unparseable disk-usage percentage in tag {label:?}, ignoring");
                    return None;
                }
            };
            let date = parse_date(date_str, &label)?;
            return Some(Tag::DeleteDiskUsage { pct, date });
        }

        if let Some(rest) = rest.strip_prefix("delete-") {
            let date = parse_date(rest, &label)?;
            return Some(Tag::Delete { date });
        }

        if let Some(rest) = rest.strip_prefix("keep-request-") {
            let (date, requester) = parse_date_and_requester(rest, &label)?;
            return Some(Tag::KeepRequest { date, requester });
        }

        if let Some(rest) = rest.strip_prefix("must-keep-") {
            let (date, requester) = parse_date_and_requester(rest, &label)?;
            return Some(Tag::MustKeep { date, requester });
        }

        warn!("unrecognized jellysweep tag shape {label:?}, ignoring");
        None
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Tag::Delete { date } => Some(*date),
            Tag::DeleteDiskUsage { date, .. } => Some(*date),
            Tag::KeepRequest { date, .. } => Some(*date),
            Tag::MustKeep { date, .. } => Some(*date),
            Tag::MustDeleteForSure | Tag::Ignore => None,
        }
    }

    pub fn requester(&self) -> Option<&str> {
        match self {
            Tag::KeepRequest { requester, .. } | Tag::MustKeep { requester, .. } => {
                requester.as_deref()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_date(s: &str, raw_label: &str) -> Option<NaiveDate> {
    // first three `-`-separated components form the date
    let parts: Vec<&str> = s.splitn(3, '-').collect();
    if parts.len() < 3 {
        warn!("unparseable date in tag {raw_label:?}, ignoring");
        return None;
    }
    let date_str = format!("{}-{}-{}", parts[0], parts[1], parts[2]);
    match NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            warn!("unparseable date {date_str:?} in tag {raw_label:?}, ignoring");
            None
        }
    }
}

/// Splits `YYYY-MM-DD[-requester]` into its date and optional requester.
fn parse_date_and_requester(s: &str, raw_label: &str) -> Option<(NaiveDate, Option<String>)> {
    let mut parts = s.splitn(4, '-');
    let y = parts.next()?;
    let m = parts.next()?;
    let d = parts.next()?;
    let requester = parts.next().map(str::to_owned);

    let date_str = format!("{y}-{m}-{d}");
    let date = match NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => {
            warn!("unparseable date {date_str:?} in tag {raw_label:?}, ignoring");
            return None;
        }
    };
    Some((date, requester))
}

/// Is this a jellysweep-owned tag at all (regardless of shape)?
pub fn is_jellysweep_tag(label: &str) -> bool {
    label.to_lowercase().starts_with(&format!("{PREFIX}-"))
}

/// Is this tag one that marks a title for eventual deletion (plain, disk-usage
/// gated, or the admin override)?
pub fn is_delete_tag(label: &str) -> bool {
    matches!(
        Tag::parse(label),
        Some(Tag::Delete { .. } | Tag::DeleteDiskUsage { .. } | Tag::MustDeleteForSure)
    )
}

/// Is this a jellysweep tag that is *not* a delete tag (keep-request,
/// must-keep, ignore)?
pub fn is_jellysweep_non_delete_tag(label: &str) -> bool {
    is_jellysweep_tag(label) && !is_delete_tag(label)
}

/// Builds the default `delete-YYYY-MM-DD` tag plus one disk-usage-gated tag
/// per configured threshold (§4.6 step 4).
pub fn generate_deletion_tags(
    now: DateTime<Utc>,
    cleanup_delay: chrono::Duration,
    disk_usage_thresholds: &[(u32, chrono::Duration)],
) -> Vec<Tag> {
    let mut tags = vec![Tag::Delete {
        date: (now + cleanup_delay).date_naive(),
    }];
    for (pct, delay) in disk_usage_thresholds {
        tags.push(Tag::DeleteDiskUsage {
            pct: *pct,
            date: (now + *delay).date_naive(),
        });
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_delete() {
        let tag = Tag::Delete {
            date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        assert_eq!(tag.encode(), "jellysweep-delete-2024-01-31");
        assert_eq!(Tag::parse(&tag.encode()), Some(tag));
    }

    #[test]
    fn test_round_trip_disk_usage() {
        let tag = Tag::DeleteDiskUsage {
            pct: 90,
            date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        };
        assert_eq!(tag.encode(), "jellysweep-delete-du90-2024-01-08");
        assert_eq!(Tag::parse(&tag.encode()), Some(tag));
    }

    #[test]
    fn test_round_trip_keep_request_with_requester() {
        let tag = Tag::KeepRequest {
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            requester: Some("alice".to_string()),
        };
        assert_eq!(tag.encode(), "jellysweep-keep-request-2024-02-01-alice");
        assert_eq!(Tag::parse(&tag.encode()), Some(tag));
    }

    #[test]
    fn test_requester_sanitization() {
        assert_eq!(Tag::sanitize_requester("Al-ice Bob"), "al_ice_bob");
        // collision: distinct requesters collapse to the same sanitized form
        assert_eq!(
            Tag::sanitize_requester("a-b"),
            Tag::sanitize_requester("a b")
        );
    }

    #[test]
    fn test_must_delete_for_sure() {
        assert_eq!(
            Tag::parse("jellysweep-must-delete-for-sure"),
            Some(Tag::MustDeleteForSure)
        );
    }

    #[test]
    fn test_ignore() {
        assert_eq!(Tag::parse("jellysweep-ignore"), Some(Tag::Ignore));
    }

    #[test]
    fn test_unrelated_tag_is_none() {
        assert_eq!(Tag::parse("keep"), None);
        assert_eq!(Tag::parse("4k"), None);
    }

    #[test]
    fn test_malformed_date_is_none_not_panic() {
        assert_eq!(Tag::parse("jellysweep-delete-not-a-date"), None);
        assert_eq!(Tag::parse("jellysweep-delete-2024-13-99"), None);
    }

    #[test]
    fn test_is_delete_tag() {
        assert!(is_delete_tag("jellysweep-delete-2024-01-01"));
        assert!(is_delete_tag("jellysweep-delete-du80-2024-01-01"));
        assert!(is_delete_tag("jellysweep-must-delete-for-sure"));
        assert!(!is_delete_tag("jellysweep-keep-request-2024-01-01"));
        assert!(!is_delete_tag("keep"));
    }

    #[test]
    fn test_is_jellysweep_non_delete_tag() {
        assert!(is_jellysweep_non_delete_tag("jellysweep-ignore"));
        assert!(is_jellysweep_non_delete_tag(
            "jellysweep-must-keep-2024-01-01-bob"
        ));
        assert!(!is_jellysweep_non_delete_tag("jellysweep-delete-2024-01-01"));
        assert!(!is_jellysweep_non_delete_tag("keep"));
    }

    #[test]
    fn test_generate_deletion_tags() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let tags = generate_deletion_tags(
            now,
            chrono::Duration::days(30),
            &[
                (80, chrono::Duration::days(14)),
                (90, chrono::Duration::days(7)),
            ],
        );
        assert_eq!(tags.len(), 3);
        assert_eq!(
            tags[0],
            Tag::Delete {
                date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
            }
        );
        assert_eq!(
            tags[1],
            Tag::DeleteDiskUsage {
                pct: 80,
                date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
            }
        );
        assert_eq!(
            tags[2],
            Tag::DeleteDiskUsage {
                pct: 90,
                date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
            }
        );
    }

    /// spec §8 S1 — basic mark: contentAge=120, cleanupDelay=30, no
    /// thresholds. Run at 2024-01-01 yields a single `delete-2024-01-31`.
    #[test]
    fn test_s1_basic_mark() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let tags = generate_deletion_tags(now, chrono::Duration::days(30), &[]);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].encode(), "jellysweep-delete-2024-01-31");
    }

    /// Invariant 1 (idempotence): generating deletion tags twice from the
    /// same inputs produces the same tag set.
    #[test]
    fn test_invariant_idempotent_tag_generation() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let delay = chrono::Duration::days(30);
        let first = generate_deletion_tags(now, delay, &[]);
        let second = generate_deletion_tags(now, delay, &[]);
        assert_eq!(first, second);
    }
}

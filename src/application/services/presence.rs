//! Away-state tracking: set on request, cleared by the next activity,
//! surfaced when an away user gets mentioned.

use chrono::Utc;
use std::sync::Arc;

use crate::application::errors::StorageError;
use crate::domain::entities::User;
use crate::infrastructure::database::Database;

const DAY_SECS: u64 = 86_400;
const HOUR_SECS: u64 = 3_600;
const MINUTE_SECS: u64 = 60;

/// Parse an away declaration: an optional leading run of `<int><unit>`
/// tokens (units `d`, `h`, `m`, in that order, each at most once, no
/// separators), then the rest of the input verbatim as the reason.
///
/// The duration prefix ends at the first token that is malformed, repeats a
/// unit, or breaks the order; that token onwards is reason text. `"x"`
/// parses as zero seconds with reason `"x"`.
pub fn parse_away_spec(input: &str) -> (u64, String) {
    let input = input.trim();
    let mut rest = input;
    let mut total: u64 = 0;
    // Ranks enforce the d > h > m order and single use per unit.
    let mut last_rank = 0u8;

    loop {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            break;
        }
        let (number, after) = rest.split_at(digits);
        let (rank, unit_secs) = match after.chars().next() {
            Some('d') => (1, DAY_SECS),
            Some('h') => (2, HOUR_SECS),
            Some('m') => (3, MINUTE_SECS),
            _ => break,
        };
        if rank <= last_rank {
            break;
        }
        let Ok(count) = number.parse::<u64>() else {
            break;
        };
        total = total.saturating_add(count.saturating_mul(unit_secs));
        last_rank = rank;
        rest = &after[1..];
    }

    (total, rest.trim_start().to_string())
}

/// Human formatting by successive integer division: non-zero units only,
/// pluralized, `"few seconds"` when everything divides to zero.
pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / DAY_SECS;
    let hours = (total_secs % DAY_SECS) / HOUR_SECS;
    let minutes = (total_secs % HOUR_SECS) / MINUTE_SECS;

    let mut parts = Vec::new();
    for (count, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
        match count {
            0 => {}
            1 => parts.push(format!("1 {}", unit)),
            n => parts.push(format!("{} {}s", n, unit)),
        }
    }

    if parts.is_empty() {
        "few seconds".to_string()
    } else {
        parts.join(" ")
    }
}

/// Per-user away state. One record per user, present only while away.
pub struct PresenceTracker {
    db: Arc<Database>,
}

impl PresenceTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Mark a user as away. Re-declaring overwrites the record and resets
    /// the start time. Returns the acknowledgement notice.
    pub fn set_away(&self, user: &User, text: &str) -> Result<String, StorageError> {
        let (declared_secs, reason) = parse_away_spec(text);
        self.db
            .set_presence(user.id, &reason, declared_secs, Utc::now())?;
        tracing::debug!(
            "{} ({}) is away: declared {}s, reason '{}'",
            user.display_name(),
            user.id,
            declared_secs,
            reason
        );

        let mut notice = format!("⏸️ {} is now away", user.display_name());
        if declared_secs > 0 {
            notice.push_str(&format!(" for {}", format_duration(declared_secs)));
        }
        if !reason.is_empty() {
            notice.push_str(&format!(": {}", reason));
        }
        notice.push('!');
        Ok(notice)
    }

    /// Drop the user's away record because they spoke. Returns the
    /// welcome-back notice built from wall-clock elapsed time, or `None`
    /// when the user was not away. The declared duration plays no part
    /// here.
    pub fn clear_on_activity(&self, user: &User) -> Result<Option<String>, StorageError> {
        let Some(record) = self.db.get_presence(user.id)? else {
            return Ok(None);
        };
        // The delete is the decider: if a concurrent message got there
        // first, exactly one of the two produces the notice.
        if !self.db.clear_presence(user.id)? {
            return Ok(None);
        }

        let elapsed = (Utc::now() - record.since).num_seconds().max(0) as u64;
        Ok(Some(format!(
            "🎉 {} is back online! Away for {}.",
            user.display_name(),
            format_duration(elapsed)
        )))
    }

    /// Notice for one mentioned user, or `None` when they are not away.
    /// Mentions are independent; the caller loops over resolved users.
    pub fn mention_notice(&self, user: &User) -> Result<Option<String>, StorageError> {
        let Some(record) = self.db.get_presence(user.id)? else {
            return Ok(None);
        };

        let mut notice = format!("💤 {} is away", user.display_name());
        if record.declared_secs > 0 {
            notice.push_str(&format!(" for {}", format_duration(record.declared_secs)));
        }
        if !record.reason.is_empty() {
            notice.push_str(&format!(": {}", record.reason));
        }
        notice.push('.');
        Ok(Some(notice))
    }
}

//! Message rendering for the webhook.
//!
//! Everything here is pure: the same inputs always produce byte-identical
//! messages.
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::config::BalanceTokens;
use crate::model::{BalanceSnapshot, Project};
use crate::notify::Message;

const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a chain timestamp. The node emits zone-less ISO strings that are
/// UTC (`2024-01-01T00:00:00` or with `.500`); full RFC 3339 is accepted too.
pub fn parse_chain_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// `YYYY-MM-DD HH:MM:SS` in the given offset.
pub fn local_time(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format(LOCAL_FORMAT).to_string()
}

fn offset_label(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    if secs % 3600 == 0 {
        format!("UTC{}{}", sign, secs / 3600)
    } else {
        format!("UTC{}{}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
    }
}

#[derive(Debug, Clone)]
pub struct MessageFormatter {
    offset: FixedOffset,
    primary_symbol: String,
    secondary_symbol: String,
    primary_zero: String,
}

impl MessageFormatter {
    pub fn new(offset: FixedOffset, tokens: &BalanceTokens) -> Self {
        Self {
            offset,
            primary_symbol: tokens.primary.symbol.clone(),
            secondary_symbol: tokens.secondary.symbol.clone(),
            primary_zero: tokens.primary_zero.clone(),
        }
    }

    /// Renders a chain timestamp locally; unparsable input is shown verbatim.
    pub fn render_time(&self, raw: &str) -> String {
        match parse_chain_time(raw) {
            Some(ts) => local_time(ts, self.offset),
            None => raw.to_string(),
        }
    }

    pub fn new_project(&self, project: &Project, balances: Option<&BalanceSnapshot>) -> Message {
        let empty = BalanceSnapshot::default();
        let balances = balances.unwrap_or(&empty);
        let primary = if balances.primary.is_empty() {
            self.primary_zero.clone()
        } else {
            balances.primary.join(", ")
        };
        // Holdings always render as a list, `[]` when there are none.
        let secondary = format!("[{}]", balances.secondary.join(", "));

        let mut text = format!(
            "### New project: {name}\n\n\
             - NFT: {nft}\n\
             - Creator: {creator}\n\
             - Initial price: {price}\n\
             - Initial supply: {supply}\n\
             - Created: {created} ({zone})\n\
             - Creator {psym} balance: {primary}\n\
             - Creator {ssym} holdings: {secondary}\n",
            name = project.project_name,
            nft = project.nft_name,
            creator = project.creator,
            price = project.init_nft_price,
            supply = project.init_nft_number,
            created = self.render_time(&project.create_time),
            zone = offset_label(self.offset),
            psym = self.primary_symbol,
            primary = primary,
            ssym = self.secondary_symbol,
            secondary = secondary,
        );
        if !project.nft_img.trim().is_empty() {
            text.push_str(&format!("\n![{}]({})\n", project.nft_name, project.nft_img));
        }

        Message::Markdown {
            title: format!("New project: {}", project.project_name),
            text,
        }
    }

    pub fn countdown(&self, project: &Project, minutes_left: i64, next_round: DateTime<Utc>) -> Message {
        Message::Text {
            content: format!(
                "Round reminder: {name} (#{id}) starts its next round in {m} minutes, at {at} ({zone}).",
                name = project.project_name,
                id = project.id,
                m = minutes_left,
                at = local_time(next_round, self.offset),
                zone = offset_label(self.offset),
            ),
        }
    }
}

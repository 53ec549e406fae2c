//! Embed builders shared by commands and alerts.

use crate::helpers::{format_hours_minutes, format_time_online};
use crate::ping::ServerStatus;
use mcwatch_db::{PlayerInfo, PlayerRecord};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter, Timestamp};

pub const SERVER_DOWN_GIF: &str = "https://media.giphy.com/media/bC8EUWeuy5OIx6o7ul/giphy.gif";
pub const SERVER_UP_GIF: &str = "https://media.giphy.com/media/3o7abGQa0aRJUurpII/giphy.gif";

pub const COLOR_GREEN: u32 = 0x2ECC71;
pub const COLOR_RED: u32 = 0xE74C3C;
pub const COLOR_BLUE: u32 = 0x3498DB;

/// Attachment name the status favicon is uploaded under.
pub const FAVICON_FILENAME: &str = "favicon.png";

/// Discord's per-embed caps, counted in characters.
pub const DESCRIPTION_LIMIT: usize = 4096;
pub const FIELD_VALUE_LIMIT: usize = 1024;

pub fn server_back_online() -> CreateEmbed {
    CreateEmbed::new()
        .title("Server Back Online!")
        .color(COLOR_GREEN)
        .timestamp(Timestamp::now())
        .image(SERVER_UP_GIF)
}

pub fn server_went_offline() -> CreateEmbed {
    CreateEmbed::new()
        .title("Server Went Offline")
        .color(COLOR_RED)
        .timestamp(Timestamp::now())
        .image(SERVER_DOWN_GIF)
}

pub fn server_not_responding() -> CreateEmbed {
    CreateEmbed::new()
        .title("Server Not Responding")
        .color(COLOR_RED)
        .image(SERVER_DOWN_GIF)
}

pub fn players_joined(names: &[String]) -> CreateEmbed {
    CreateEmbed::new()
        .title("🎉 Player Joined!")
        .description(bullet_list(names, DESCRIPTION_LIMIT))
        .color(COLOR_BLUE)
        .timestamp(Timestamp::now())
}

pub fn server_status(status: &ServerStatus, with_favicon: bool) -> CreateEmbed {
    let motd = if status.motd.trim().is_empty() {
        "Unknown".to_string()
    } else {
        status.motd.clone()
    };

    let embed = CreateEmbed::new()
        .title("✅ Server Online")
        .description(format!("Responded in {}ms", status.latency_ms))
        .color(COLOR_GREEN)
        .timestamp(Timestamp::now())
        .field("📜 MOTD", motd, false)
        .field("👥 Players", format!("{}/{}", status.online, status.max), true);

    let embed = if status.version.is_empty() {
        embed
    } else {
        embed.field("🧱 Version", status.version.clone(), true)
    };

    if with_favicon {
        embed.thumbnail(format!("attachment://{}", FAVICON_FILENAME))
    } else {
        embed
    }
}

pub fn players_online(status: &ServerStatus) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title("🎮 Players Online")
        .description(format!("{}/{} players", status.online, status.max))
        .color(COLOR_GREEN);

    match status.sample.as_deref() {
        Some(names) if !names.is_empty() => {
            embed.field(
            "Currently Playing",
            bullet_list(names, FIELD_VALUE_LIMIT),
            false,
        )
        }
        _ => embed.field("Status", "No visible players", false),
    }
}

pub fn playtime(top: &[(String, PlayerRecord)], now: i64) -> CreateEmbed {
    let lines: Vec<String> = top
        .iter()
        .map(|(name, record)| {
            let session = record
                .current_session(now)
                .map(|secs| format!(" (Current: {})", format_hours_minutes(secs)))
                .unwrap_or_default();
            format!(
                "• **{}**: {}{}",
                name,
                format_hours_minutes(record.total_time as i64),
                session
            )
        })
        .collect();

    // The description holds four times what a field does
    CreateEmbed::new()
        .title("⏱ Player Playtime")
        .color(COLOR_BLUE)
        .description(fit_lines(&lines, DESCRIPTION_LIMIT))
}

pub fn player_detail(name: &str, info: &PlayerInfo, now: i64) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title(format!("👤 {}", name))
        .color(COLOR_BLUE)
        .field("Total Playtime", format_hours_minutes(info.total_time as i64), true);

    let embed = match info.current_session {
        Some(secs) => embed.field("Status", format!("🟢 Online for {}", format_hours_minutes(secs)), true),
        None => embed.field("Status", "⚫ Offline", true),
    };

    match info.last_seen {
        Some(last_seen) => embed.footer(CreateEmbedFooter::new(format!(
            "Last seen {} ago",
            format_time_online(now.saturating_sub(last_seen))
        ))),
        None => embed,
    }
}

fn bullet_list(names: &[String], limit: usize) -> String {
    let lines: Vec<String> = names.iter().map(|name| format!("• {}", name)).collect();
    fit_lines(&lines, limit)
}

/// Joins lines with newlines, dropping whole lines from the end so the result
/// stays within `limit` characters. Dropped lines are summarised in a trailer.
/// A single line longer than `limit` is cut short.
pub fn fit_lines(lines: &[String], limit: usize) -> String {
    let mut out = String::new();
    let mut used = 0;

    for (i, line) in lines.iter().enumerate() {
        let sep = usize::from(i > 0);
        let len = line.chars().count();
        let remaining = lines.len() - i - 1;
        // Room for this line plus the trailer if anything is left after it
        let reserve = if remaining > 0 {
            trailer(remaining).chars().count() + 1
        } else {
            0
        };

        if used + sep + len + reserve > limit {
            if i == 0 {
                if reserve >= limit {
                    return truncate_chars(line, limit);
                }
                let mut cut = truncate_chars(line, limit - reserve);
                cut.push('\n');
                cut.push_str(&trailer(remaining));
                return cut;
            }
            let trailer = trailer(lines.len() - i);
            if used + 1 + trailer.chars().count() <= limit {
                out.push('\n');
                out.push_str(&trailer);
            }
            return out;
        }

        if sep == 1 {
            out.push('\n');
        }
        out.push_str(line);
        used += sep + len;
    }

    out
}

fn trailer(hidden: usize) -> String {
    format!("…and {} more", hidden)
}

fn truncate_chars(line: &str, limit: usize) -> String {
    if limit == 0 {
        return String::new();
    }
    let mut cut: String = line.chars().take(limit - 1).collect();
    cut.push('…');
    cut
}

//! Message composer: turns a validated payload into the text users receive.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use serde_json::Value;

use taskping_core::types::Payload;

/// Quotes used by motivational messages.
pub const MOTIVATIONAL_QUOTES: [&str; 10] = [
    "🌟 Every expert was once a beginner. Keep going!",
    "💪 Success is the sum of small efforts repeated day in and day out.",
    "🎯 The only impossible journey is the one you never begin.",
    "🔥 Your potential is limitless. Believe in yourself!",
    "⭐ Great things never come from comfort zones.",
    "🚀 Today's hard work is tomorrow's success story.",
    "💎 You are capable of amazing things. Keep pushing forward!",
    "🌈 Every challenge is an opportunity to grow stronger.",
    "🎪 Consistency is the key to mastery. You've got this!",
    "🏆 Champions are made when nobody's watching. Keep training!",
];

/// Sent when a custom message has no text.
const DEFAULT_CUSTOM_TEXT: &str = "Notification";

/// Changed fields listed first in an update message, in this order.
const PRIORITY_FIELDS: [&str; 3] = ["deadline", "title", "pages"];

/// Render the message for `payload`.
///
/// Deterministic for every kind except `motivational`, which picks a quote at random.
pub fn compose(payload: &Payload) -> String {
    match payload {
        Payload::TaskCreated { title, creator_name } => format!(
            "📝 New Task Assigned!\n\nTask: {title}\nCreated by: {creator_name}\n\nCheck your dashboard to get started!"
        ),
        Payload::TaskUpdated { title, changed_fields } => format!(
            "📋 Task Updated!\n\nTask: {title}\n\nChanges:\n{}\n\nCheck your dashboard for details!",
            render_changes(changed_fields)
        ),
        Payload::TaskCompleted { title } => format!(
            "🎉 Task Completed!\n\nGreat job completing: {title}\n\nKeep up the excellent work! 💪"
        ),
        Payload::TaskReminder { title, deadline } => {
            let deadline_text = deadline
                .as_deref()
                .map(|d| format!("\nDeadline: {d}"))
                .unwrap_or_default();
            format!("⏰ Task Reminder!\n\nDon't forget: {title}{deadline_text}\n\nTime to focus and get it done! 🎯")
        }
        Payload::ProgressUpdate {
            overall_progress,
            total_revisions,
        } => format!(
            "📊 Progress Update!\n\nOverall Progress: {overall_progress}%\nTotal Revisions: {total_revisions}\n\nYou're making great progress! Keep it up! 🚀"
        ),
        Payload::Motivational { streak } => {
            let quote = MOTIVATIONAL_QUOTES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(MOTIVATIONAL_QUOTES[0]);
            let streak_text = if *streak > 0 {
                format!("\n\n🔥 Current Streak: {streak} days!")
            } else {
                String::new()
            };
            format!("💪 Motivational Boost!\n\n{quote}{streak_text}\n\nYou're doing amazing! Keep up the great work! 🌟")
        }
        Payload::DailySummary {
            completed_count,
            pending_count,
        } => {
            let closing = if *completed_count > 0 {
                "🎉 Great work today! You're making excellent progress!"
            } else if *pending_count > 0 {
                "⏰ You have pending tasks. Time to tackle them tomorrow!"
            } else {
                "🌟 All caught up! Enjoy your well-deserved rest!"
            };
            format!(
                "📅 Daily Summary!\n\n✅ Completed: {completed_count} tasks\n📋 Pending: {pending_count} tasks\n\n{closing}"
            )
        }
        Payload::Custom { text } if text.trim().is_empty() => DEFAULT_CUSTOM_TEXT.to_string(),
        Payload::Custom { text } => text.clone(),
    }
}

fn render_changes(changes: &BTreeMap<String, Value>) -> String {
    if changes.is_empty() {
        return "Task details updated".to_string();
    }

    let priority = PRIORITY_FIELDS
        .iter()
        .filter_map(|&key| changes.get_key_value(key));
    let rest = changes
        .iter()
        .filter(|(key, _)| !PRIORITY_FIELDS.contains(&key.as_str()));

    priority
        .chain(rest)
        .map(|(key, value)| format!("{}: {}", field_label(key), display_value(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "start_page" → "Start page".
fn field_label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}

use crate::access::{AccessPolicy, Outcome};
use crate::store::{ClientRecord, ReportPayload};
use chrono::{DateTime, SecondsFormat, Utc};

fn stamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Human-readable summary of one client's trial and window state.
pub fn render_client_status(
    record: &ClientRecord,
    payload: Option<&ReportPayload>,
    policy: &AccessPolicy,
    now: DateTime<Utc>,
) -> String {
    let trial_state = if policy.trial_active(record, now) {
        "active"
    } else {
        "ended"
    };
    let window = match record.window_expires_at {
        None => "never opened".to_string(),
        Some(expires) if now <= expires => format!("open until {}", stamp(expires)),
        Some(expires) => format!("expired at {}", stamp(expires)),
    };

    let mut lines = vec![
        format!("Client:       {}", record.client_id),
        format!(
            "Trial:        {trial_state} (started {}, ends {})",
            stamp(record.trial_start),
            stamp(policy.trial_ends_at(record))
        ),
        format!(
            "Views:        {} of {} used, {} left",
            record.views_used,
            policy.max_views,
            policy.views_remaining(record)
        ),
        format!("Window:       {window}"),
        format!(
            "Password:     {}",
            if record.requires_password() {
                "required"
            } else {
                "not set"
            }
        ),
    ];

    match payload {
        Some(payload) => {
            lines.push(format!("Report:       updated {}", stamp(payload.updated_at)));
            if let Some(attachment) = &payload.attachment {
                lines.push(format!("Attachment:   {}", attachment.filename));
            }
        }
        None => lines.push("Report:       none".to_string()),
    }

    lines.join("\n")
}

/// One line describing what the data API would answer right now.
pub fn render_check(client_id: &str, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Admitted(record) => format!(
            "{client_id}: admitted (window open until {}, {} views used)",
            record.window_expires_at.map(stamp).unwrap_or_default(),
            record.views_used
        ),
        Outcome::Denied(reason) => format!("{client_id}: denied ({reason})"),
    }
}

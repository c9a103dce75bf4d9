//! Plain-text rendering for terminal output.

use crate::contact::Contact;
use crate::sections::DisplayItem;

/// Shown in place of an empty name.
const NO_NAME: &str = "(no name)";

/// Render a display sequence, one line per header or entry.
#[must_use]
pub fn render_display(items: &[DisplayItem]) -> String {
    items
        .iter()
        .map(|item| match item {
            DisplayItem::Header(label) => format!("{label}\n"),
            DisplayItem::Entry(contact) => format!("  {}\n", contact_line(contact)),
        })
        .collect()
}

/// One-line summary: name, phone number, blocked marker and id.
#[must_use]
pub fn contact_line(contact: &Contact) -> String {
    let name = contact.full_name();
    let name = if name.is_empty() { NO_NAME } else { &name };
    let mut line = format!("{name:<28}");
    if let Some(phone) = contact.phone_number.as_deref() {
        line.push_str(&format!(" {phone:<18}"));
    }
    if contact.blocked {
        line.push_str(" [blocked]");
    }
    line.push_str(&format!(" ({})", contact.id));
    line
}

/// Multi-line detail view of one contact.
#[must_use]
pub fn render_contact(contact: &Contact) -> String {
    let name = contact.full_name();
    let mut lines = vec![
        if name.is_empty() { NO_NAME.to_string() } else { name },
        format!("  Id:        {}", contact.id),
    ];

    let optional = [
        ("Phone", contact.phone_number.as_deref()),
        ("Email", contact.email.as_deref()),
        ("Web", contact.url.as_deref()),
        ("Address", contact.address.as_deref()),
        ("Notes", contact.notes.as_deref()),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            lines.push(format!("  {:<10} {value}", format!("{label}:")));
        }
    }
    if let Some(birthday) = contact.birthday {
        lines.push(format!("  Birthday:  {birthday}"));
    }
    if let Some(photo) = contact.photo.as_ref().filter(|p| !p.is_empty()) {
        lines.push(format!("  Photo:     {} bytes encoded", photo.len()));
    }
    lines.push(format!("  Favorite:  {}", yes_no(contact.favorite)));
    lines.push(format!("  Blocked:   {}", yes_no(contact.blocked)));
    if let Some(updated) = contact.updated_at {
        lines.push(format!(
            "  Updated:   {}",
            updated.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

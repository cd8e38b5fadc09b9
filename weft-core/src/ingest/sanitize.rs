//! Text cleanup for user-side records
//!
//! The assistant wraps a lot of machinery in pseudo-XML tags inside user
//! turns: injected reminders, slash-command invocations, local command
//! output, and relayed teammate messages. This module turns that text into
//! what a human actually typed (or recognizes it as something else).

/// What a piece of user text turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserText {
    /// A human turn, cleaned.
    Human(String),
    /// Output of a local command, shown as a system note.
    CommandOutput(String),
    /// A message relayed from a team member.
    Teammate { sender_id: String, text: String },
    /// Nothing left to show.
    Noise,
}

const TEAMMATE_OPEN: &str = "<teammate-message";
const TEAMMATE_CLOSE: &str = "</teammate-message>";

/// Tags whose entire content is dropped.
const DROPPED_TAGS: [&str; 2] = ["system-reminder", "local-command-caveat"];

/// Classify and clean a user text payload.
pub fn sanitize_user_text(raw: &str) -> UserText {
    let trimmed = raw.trim();

    if let Some(teammate) = parse_teammate_message(trimmed) {
        return teammate;
    }

    if let Some(output) = tag_content(trimmed, "local-command-stdout") {
        let output = output.trim();
        return if output.is_empty() {
            UserText::Noise
        } else {
            UserText::CommandOutput(output.to_string())
        };
    }

    if let Some(name) = tag_content(trimmed, "command-name") {
        let args = tag_content(trimmed, "command-args").unwrap_or("").trim();
        let name = name.trim();
        let command = if args.is_empty() {
            name.to_string()
        } else {
            format!("{name} {args}")
        };
        return if command.is_empty() {
            UserText::Noise
        } else {
            UserText::Human(command)
        };
    }

    let mut text = trimmed.to_string();
    for tag in DROPPED_TAGS {
        text = strip_tag(&text, tag);
    }
    let text = text.trim();

    if text.is_empty() {
        UserText::Noise
    } else {
        UserText::Human(text.to_string())
    }
}

/// Parse `<teammate-message teammate_id="x" ...>body</teammate-message>`.
fn parse_teammate_message(text: &str) -> Option<UserText> {
    let rest = text.strip_prefix(TEAMMATE_OPEN)?;
    let header_end = rest.find('>')?;
    let header = &rest[..header_end];
    let body = &rest[header_end + 1..];
    let body = body
        .rfind(TEAMMATE_CLOSE)
        .map(|end| &body[..end])
        .unwrap_or(body);

    let sender_id = attribute(header, "teammate_id")
        .or_else(|| attribute(header, "from"))
        .unwrap_or("unknown")
        .to_string();

    Some(UserText::Teammate {
        sender_id,
        text: body.trim().to_string(),
    })
}

/// Value of `name="value"` inside a tag header.
fn attribute<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let start = header.find(&needle)? + needle.len();
    let len = header[start..].find('"')?;
    Some(&header[start..start + len])
}

/// Content of the first `<tag>...</tag>` pair.
fn tag_content<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let len = text[start..].find(&close)?;
    Some(&text[start..start + len])
}

/// Remove every `<tag>...</tag>` pair. An unclosed tag drops the remainder.
fn strip_tag(text: &str, tag: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(&close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

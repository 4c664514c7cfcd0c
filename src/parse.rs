//! Turns the model's free-text reply into an [`Action`].
//!
//! Only the last non-empty line is read. It must start with `Action: `,
//! followed by a verb and `;`-separated arguments. Verbs are matched
//! exactly as listed in the system prompt.

use crate::prompt::ACTION_PREFIX;
use crate::types::{Action, ActionError, Direction, ScrollTarget, TerminateReason};

pub fn parse_action(raw: &str) -> Action {
    let Some(line) = raw.trim().lines().rev().find(|l| !l.trim().is_empty()) else {
        return Action::Terminate(TerminateReason::Unparseable(raw.to_string()));
    };
    let Some(body) = line.strip_prefix(ACTION_PREFIX) else {
        return Action::Terminate(TerminateReason::Unparseable(raw.to_string()));
    };

    let (verb, rest) = match body.split_once(' ') {
        Some((verb, rest)) => (verb.trim(), rest.trim()),
        None => (body.trim(), ""),
    };
    let args: Vec<String> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(';').map(|arg| arg.trim().to_string()).collect()
    };

    match verb {
        "Click" => click(args),
        "Type" => type_text(args),
        "Scroll" => scroll(&args),
        "Wait" => Action::Wait,
        "GoBack" => Action::GoBack,
        "TERMINATE" => Action::Terminate(TerminateReason::Requested(args.join("; "))),
        other => Action::Rejected(ActionError::UnknownVerb(other.to_string())),
    }
}

fn click(args: Vec<String>) -> Action {
    if args.len() != 1 {
        return Action::Rejected(ActionError::ClickArguments(args));
    }
    match parse_label(&args[0]) {
        Ok(label) => Action::Click { label },
        Err(err) => Action::Rejected(err),
    }
}

fn type_text(mut args: Vec<String>) -> Action {
    if args.len() != 2 {
        return Action::Rejected(ActionError::TypeArguments(args));
    }
    let text = args.pop().unwrap_or_default();
    match parse_label(&args[0]) {
        Ok(label) => Action::Type { label, text },
        Err(err) => Action::Rejected(err),
    }
}

fn scroll(args: &[String]) -> Action {
    let [target, direction] = args else {
        return Action::Rejected(ActionError::ScrollArguments);
    };
    let direction = if direction.eq_ignore_ascii_case("up") {
        Direction::Up
    } else if direction.eq_ignore_ascii_case("down") {
        Direction::Down
    } else {
        return Action::Rejected(ActionError::ScrollArguments);
    };
    let target = if target.eq_ignore_ascii_case("WINDOW") {
        ScrollTarget::Window
    } else {
        match parse_label(target) {
            Ok(label) => ScrollTarget::Label(label),
            Err(err) => return Action::Rejected(err),
        }
    };
    Action::Scroll { target, direction }
}

fn parse_label(raw: &str) -> Result<usize, ActionError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| ActionError::NoBox(raw.to_string()))
}

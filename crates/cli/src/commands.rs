use cachedump_engine::{Command, DumpMode};
use tracing::warn;

/// First `script-message` argument addressed to this client.
pub const MESSAGE_NAMESPACE: &str = "cachedump";

/// Maps `script-message cachedump <verb> [args...]` to an engine command.
///
/// Messages for other namespaces return `None` silently; malformed ones are
/// logged and dropped.
pub fn parse_client_message(args: &[String]) -> Option<Command> {
    let (namespace, rest) = args.split_first()?;
    if namespace != MESSAGE_NAMESPACE {
        return None;
    }
    let Some((verb, rest)) = rest.split_first() else {
        warn!("empty cachedump message");
        return None;
    };

    let command = match (verb.as_str(), rest) {
        ("dump" | "quiet-dump", rest) => parse_dump(verb == "quiet-dump", rest)?,
        ("stop", []) => Command::Stop,
        ("align", []) => Command::AlignCache,
        ("reload", []) => Command::Reload,
        ("cycle-mode", []) => Command::CycleMode,
        ("cycle-label", []) => Command::CycleLabel,
        ("set", [key, value]) => Command::SetOption {
            key: key.clone(),
            value: value.clone(),
        },
        _ => {
            warn!(verb = %verb, args = ?rest, "unrecognized cachedump message");
            return None;
        }
    };
    Some(command)
}

fn parse_dump(quiet: bool, args: &[String]) -> Option<Command> {
    let mode = match args.first() {
        Some(value) => match DumpMode::parse(value) {
            Some(mode) => Some(mode),
            None => {
                warn!(mode = %value, "unknown dump mode");
                return None;
            }
        },
        None => None,
    };
    let chapter = match args.get(1) {
        Some(value) => match value.parse::<usize>() {
            Ok(index) => Some(index),
            Err(error) => {
                warn!(chapter = %value, %error, "invalid chapter index");
                return None;
            }
        },
        None => None,
    };
    Some(Command::Dump {
        mode,
        quiet,
        chapter,
    })
}

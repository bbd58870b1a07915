//! Console command catalog shared by the parser and the help output.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Unlock,
    Execute,
    Brake,
    Status,
    Help,
}

/// One top-level console command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    /// One usage line per accepted form.
    pub usage: &'static [&'static str],
    pub summary: &'static str,
}

pub const COMMANDS: [CommandSpec; 5] = [
    CommandSpec {
        name: "unlock",
        tag: CommandTag::Unlock,
        usage: &["unlock <idle|test-mode|drive|armed-wait|flight-prep|ready>"],
        summary: "open the 10 s confirmation window for a mission command",
    },
    CommandSpec {
        name: "execute",
        tag: CommandTag::Execute,
        usage: &["execute <idle|test-mode|drive|armed-wait|flight-prep|ready>"],
        summary: "send an unlocked command to the mission sequencer",
    },
    CommandSpec {
        name: "brake",
        tag: CommandTag::Brake,
        usage: &[
            "brake percent <0-100>",
            "brake distance <microns>",
            "brake raw <left|right|both> <microsteps> key=<hex>:<hex>",
            "brake test <left|right> <on|off>",
            "brake ack <left|right>",
        ],
        summary: "move, test or acknowledge the brake actuators",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        usage: &["status"],
        summary: "print mission, brake, fault and range status",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: &["help [topic]"],
        summary: "list commands or describe one",
    },
];

/// Finds a command by name, ignoring ASCII case.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("BRAKE").map(|spec| spec.tag), Some(CommandTag::Brake));
        assert_eq!(lookup("reboot"), None);
    }
}

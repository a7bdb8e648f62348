//! The bot's command set.

use anyhow::{Context, bail};
use parley_commands::{ArgValidator, ArgsError, CommandNode, CommandTree, RegistrationError};
use rand::Rng;
use tracing::info;

/// Largest die `roll` accepts.
const MAX_SIDES: u32 = 1000;

/// Build the command tree served by the bot.
pub fn build_tree() -> Result<CommandTree, RegistrationError> {
    let mut tree = CommandTree::new(
        CommandNode::new("parley")
            .long("Parley answers commands prefixed with the configured prefix. Use `<command> -h` for details."),
    );
    let root = tree.root();

    tree.add_children(root, [ping(), echo(), roll(), whoami()])?;

    let admin = tree.add_child(root, admin())?;
    tree.add_children(admin, [kick(), purge()])?;
    tree.add_aliases(admin, ["mod"])?;

    Ok(tree)
}

fn ping() -> CommandNode {
    CommandNode::new("ping")
        .usage("ping")
        .short("Check the bot is alive")
        .args(ArgValidator::no_args())
        .run(|inv| {
            inv.reply("pong")?;
            Ok(())
        })
}

fn echo() -> CommandNode {
    CommandNode::new("echo")
        .aliases(["say"])
        .usage("echo [-u] [-n count] <text>")
        .short("Repeat text")
        .long("Repeats the given text back to the channel.")
        .args(ArgValidator::minimum(1))
        .bool_flag("upper", Some('u'), false, "Shout the reply")
        .int_flag("repeat", Some('n'), 1, "Number of times to repeat")
        .run(|inv| {
            let flags = inv.flags();
            let repeat = flags.get_int("repeat").unwrap_or(1);
            if !(1..=10).contains(&repeat) {
                bail!("--repeat must be between 1 and 10, got {repeat}");
            }

            let mut text = inv.args().join(" ");
            if flags.get_bool("upper") == Some(true) {
                text = text.to_uppercase();
            }
            let reply = vec![text; repeat as usize].join(" ");
            inv.reply(&reply)?;
            Ok(())
        })
}

fn roll() -> CommandNode {
    CommandNode::new("roll")
        .aliases(["dice"])
        .usage("roll <sides> [sides...]")
        .short("Roll up to three dice")
        .args(ArgValidator::range(1, 3).and(ArgValidator::custom(|_, args| {
            match args.iter().find(|a| parse_sides(a).is_none()) {
                Some(bad) => Err(ArgsError::Custom(format!(
                    "'{bad}' is not a die size between 2 and {MAX_SIDES}"
                ))),
                None => Ok(()),
            }
        })))
        .run(|inv| {
            let mut rng = rand::rng();
            let mut rolls = Vec::with_capacity(inv.args().len());
            for arg in inv.args() {
                let sides = parse_sides(arg).context("die size changed after validation")?;
                rolls.push(format!("d{sides}: {}", rng.random_range(1..=sides)));
            }
            inv.reply(&rolls.join(", "))?;
            Ok(())
        })
}

fn parse_sides(arg: &str) -> Option<u32> {
    let arg = arg.strip_prefix(['d', 'D']).unwrap_or(arg);
    arg.parse().ok().filter(|n| (2..=MAX_SIDES).contains(n))
}

fn whoami() -> CommandNode {
    CommandNode::new("whoami")
        .short("Show your permission groups")
        .hidden(true)
        .run(|inv| {
            let author = inv.message().author.as_deref().unwrap_or("unknown");
            let groups = if inv.groups().is_empty() {
                "none".to_string()
            } else {
                inv.groups().join(", ")
            };
            inv.reply(&format!("{author} in groups: {groups}"))?;
            Ok(())
        })
}

fn admin() -> CommandNode {
    CommandNode::new("admin")
        .usage("admin <command>")
        .short("Moderation tools")
        .long("Moderation commands. Subcommands are only listed for members allowed to use them.")
        .bool_flag("verbose", Some('v'), false, "Explain each action")
}

fn audit(inv: &parley_commands::Invocation<'_>) -> anyhow::Result<()> {
    info!(
        "Audit: {} {:?} by {} in {}",
        inv.path(),
        inv.args(),
        inv.message().author.as_deref().unwrap_or("unknown"),
        inv.channel_id()
    );
    Ok(())
}

fn kick() -> CommandNode {
    CommandNode::new("kick")
        .usage("admin kick <member> [-r reason]")
        .short("Remove a member")
        .groups(["mods", "admins"])
        .args(ArgValidator::exact(1))
        .string_flag("reason", Some('r'), "", "Reason shown to the member")
        .pre_run(audit)
        .run(|inv| {
            let flags = inv.flags();
            let member = &inv.args()[0];
            let mut reply = format!("Kicked {member}");
            if let Some(reason) = flags.get_str("reason").filter(|r| !r.is_empty()) {
                reply.push_str(&format!(" ({reason})"));
            }
            if flags.get_bool("verbose") == Some(true) {
                reply.push_str(&format!(". Requested in #{}", inv.channel_id()));
            }
            inv.reply(&reply)?;
            Ok(())
        })
}

fn purge() -> CommandNode {
    CommandNode::new("purge")
        .usage("admin purge [count]")
        .short("Delete recent messages")
        .groups(["admins"])
        .args(ArgValidator::maximum(1))
        .pre_run(audit)
        .run(|inv| {
            let count: u32 = match inv.args().first() {
                Some(arg) => arg
                    .parse()
                    .with_context(|| format!("'{arg}' is not a message count"))?,
                None => 10,
            };
            inv.reply(&format!("Purged {count} message(s)"))?;
            Ok(())
        })
        .post_run(|inv| {
            if inv.flags().get_bool("verbose") == Some(true) {
                inv.reply("Purge complete")?;
            }
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_commands::{
        DispatchConfig, Dispatcher, HelpSection, IncomingMessage, Outcome, RecordingSink,
    };
    use pretty_assertions::assert_eq;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(build_tree().unwrap(), DispatchConfig::default())
    }

    fn run(d: &Dispatcher, content: &str, groups: &[&str]) -> (Vec<String>, RecordingSink) {
        let sink = RecordingSink::new();
        let msg = IncomingMessage::new("test", content)
            .with_groups(groups.iter().copied())
            .with_author("tester");
        let _ = d.process(&msg, &sink);
        (sink.texts(), sink)
    }

    #[test]
    fn test_echo_flags() {
        let d = dispatcher();
        let (texts, _) = run(&d, "!say -u -n 2 hey there", &[]);
        assert_eq!(texts, vec!["HEY THERE HEY THERE"]);

        let (texts, _) = run(&d, "!echo -n 11 x", &[]);
        assert_eq!(texts, vec!["echo: --repeat must be between 1 and 10, got 11"]);
    }

    #[test]
    fn test_roll_validation() {
        let d = dispatcher();
        let (texts, _) = run(&d, "!roll d6 20", &[]);
        assert_eq!(texts.len(), 1);
        let parts: Vec<&str> = texts[0].split(", ").collect();
        assert_eq!(parts.len(), 2);
        let value: u32 = parts[0].trim_start_matches("d6: ").parse().unwrap();
        assert!((1..=6).contains(&value));

        let (texts, _) = run(&d, "!dice d1", &[]);
        assert_eq!(texts, vec!["'d1' is not a die size between 2 and 1000"]);

        let (texts, _) = run(&d, "!roll", &[]);
        assert_eq!(texts, vec!["command accepts between 1 and 3 arg(s), received 0"]);
    }

    #[test]
    fn test_admin_permissions() {
        let d = dispatcher();

        let (texts, sink) = run(&d, "!admin kick bob", &["users"]);
        assert!(texts.is_empty());
        assert!(sink.is_empty());

        let (texts, _) = run(&d, "!mod kick bob -r spam -v", &["Mods"]);
        assert_eq!(texts, vec!["Kicked bob (spam). Requested in #test"]);

        let (texts, _) = run(&d, "!admin purge", &["mods"]);
        assert!(texts.is_empty());

        let (texts, _) = run(&d, "!admin -v purge 3", &["admins"]);
        assert_eq!(texts, vec!["Purged 3 message(s)", "Purge complete"]);
    }

    #[test]
    fn test_help_listing_hides_hidden_and_forbidden() {
        let d = dispatcher();
        let sink = RecordingSink::new();

        let outcome = d
            .process(&IncomingMessage::new("test", "!help"), &sink)
            .unwrap();
        assert_eq!(outcome, Outcome::Help { command: "parley".to_string() });
        let helps = sink.helps();
        let commands = &helps[0].field(HelpSection::Commands).unwrap().value;
        assert!(commands.contains("echo - Repeat text"));
        assert!(!commands.contains("whoami"));

        sink.clear();
        d.process(&IncomingMessage::new("test", "!admin").with_groups(["mods"]), &sink)
            .unwrap();
        let helps = sink.helps();
        let commands = &helps[0].field(HelpSection::Commands).unwrap().value;
        assert_eq!(commands, "kick - Remove a member");
    }

    #[test]
    fn test_whoami_is_hidden_but_callable() {
        let d = dispatcher();
        let (texts, _) = run(&d, "!whoami", &["mods", "admins"]);
        assert_eq!(texts, vec!["tester in groups: mods, admins"]);
    }
}

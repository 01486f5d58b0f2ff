// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use club_roster::{
    AdminCredentials, Club, Config, MatchEvent, MatchResult, Money, PlayerRecord,
    SheetClient,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;

const MENU: &str = "\
1. Record match result
2. Record offence
3. Record contribution
4. Record expense (admin)
5. Show standings
6. Show balance
7. Exit";

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(io::stderr)
        .init();
}

struct Args {
    config: Option<PathBuf>,
    command: String,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut config = None;
    let mut command = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            other if command.is_none() => command = Some(other.to_string()),
            other => bail!("unexpected argument: {}", other),
        }
    }

    Ok(Args {
        config,
        command: command.unwrap_or_else(|| "menu".to_string()),
    })
}

fn main() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    // Log lines would tear the alternate screen
    init_tracing(if args.command == "ui" { "warn" } else { "info" });

    let config = Config::load(args.config.as_deref())?;
    info!(db = ?config.database_path, workbook = ?config.workbook_dir, "opening club");

    let mut club = Club::open(&config)?;

    match args.command.as_str() {
        "menu" => {
            let stdin = io::stdin();
            let mut console = Console::new(stdin.lock());
            run_menu(&mut club, &config.admin_credentials(), &mut console)?;
        }
        "sync" => {
            let outcome = club.sync()?;
            for report in [&outcome.players, &outcome.ledger] {
                println!(
                    "✓ {}: {} rows written ({} updated, {} unchanged, {} appended, {} discarded)",
                    report.worksheet,
                    report.rows_written,
                    report.updated,
                    report.unchanged,
                    report.appended,
                    report.discarded
                );
                if report.replaced_unreadable {
                    println!("  previous {} could not be read and was replaced", report.worksheet);
                }
            }
        }
        "bootstrap" => {
            let imported = club.bootstrap()?;
            println!("✓ Imported {} players from the sheet", imported);
        }
        "standings" => print_standings(&club.standings()?),
        "ui" => run_ui_mode(&club)?,
        other => bail!("unknown command: {} (expected menu, sync, bootstrap, standings or ui)", other),
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode<C: SheetClient>(club: &Club<C>) -> Result<()> {
    let mut app = ui::App::new(club.standings()?, club.ledger_summary()?);
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode<C: SheetClient>(_club: &Club<C>) -> Result<()> {
    bail!("TUI mode not available, rebuild with --features tui")
}

// ============================================================================
// MENU
// ============================================================================

/// Line-oriented prompt over any reader.
struct Console<R> {
    input: R,
}

impl<R: BufRead> Console<R> {
    fn new(input: R) -> Self {
        Console { input }
    }

    /// `None` on end of input.
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        print!("{}", label);
        io::stdout().flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn require(&mut self, label: &str) -> Result<String> {
        self.prompt(label)?.context("input closed")
    }
}

fn run_menu<C: SheetClient, R: BufRead>(
    club: &mut Club<C>,
    credentials: &AdminCredentials,
    console: &mut Console<R>,
) -> Result<()> {
    loop {
        println!("\n{}", MENU);
        let Some(choice) = console.prompt("> ")? else {
            return Ok(());
        };

        let outcome = match choice.as_str() {
            "1" => record_match(club, console),
            "2" => console
                .require("Player: ")
                .and_then(|name| Ok(club.record_offence(&name)?))
                .map(|p| println!("✓ {}", p)),
            "3" => record_contribution(club, console),
            "4" => record_expense(club, credentials, console),
            "5" => show_standings(club),
            "6" => club.balance().map(|b| println!("Balance: {}", b)).map_err(Into::into),
            "7" | "q" | "exit" => return Ok(()),
            "" => Ok(()),
            other => {
                println!("Unknown option: {}", other);
                Ok(())
            }
        };

        if let Err(err) = outcome {
            eprintln!("❌ {}", err);
        }
    }
}

fn record_match<C: SheetClient, R: BufRead>(club: &mut Club<C>, console: &mut Console<R>) -> Result<()> {
    let players = parse_names(&console.require("Players (comma separated): ")?);
    let result: MatchResult = console
        .require("Result (win/draw/loss): ")?
        .parse()?;

    let mut event = MatchEvent::new(players.iter(), result);
    for name in &players {
        let answer = console.require(&format!("Goals for {}: ", name))?;
        if answer.is_empty() {
            continue;
        }
        let goals: u32 = answer
            .parse()
            .with_context(|| format!("invalid goal count for {}: {}", name, answer))?;
        event = event.with_goals(name, goals);
    }

    let report = club.record_match(&event)?;
    for name in &report.registered {
        println!("+ registered {}", name);
    }
    for player in &report.players {
        println!("✓ {}", player);
    }
    Ok(())
}

fn record_contribution<C: SheetClient, R: BufRead>(
    club: &mut Club<C>,
    console: &mut Console<R>,
) -> Result<()> {
    let name = console.require("Player: ")?;
    let amount: Money = console.require("Amount: ")?.parse()?;

    let player = club.record_contribution(&name, amount)?;
    println!("✓ {}", player);
    Ok(())
}

fn record_expense<C: SheetClient, R: BufRead>(
    club: &mut Club<C>,
    credentials: &AdminCredentials,
    console: &mut Console<R>,
) -> Result<()> {
    let access = credentials.verify(&console.require("Admin password: ")?);
    let amount: Money = console.require("Amount: ")?.parse()?;
    let description = console.require("Description: ")?;

    let entry = club.record_expense(access, amount, &description)?;
    println!("✓ Expense {} recorded: {}", entry.description, entry.amount);
    Ok(())
}

fn show_standings<C: SheetClient>(club: &mut Club<C>) -> Result<()> {
    print_standings(&club.standings()?);
    club.sync()?;
    Ok(())
}

fn print_standings(players: &[PlayerRecord]) {
    if players.is_empty() {
        println!("No players registered yet");
        return;
    }
    for (rank, player) in players.iter().enumerate() {
        println!("{:>3}. {}", rank + 1, player);
    }
}

fn parse_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use club_roster::{
        Database, MemorySheet, ProjectionSynchronizer, RankingEngine, RosterError, SheetLayout,
    };
    use std::io::Cursor;

    fn club() -> Club<MemorySheet> {
        Club::new(
            Database::open_in_memory().unwrap(),
            RankingEngine::new(),
            ProjectionSynchronizer::new(MemorySheet::new(), SheetLayout::default()),
        )
    }

    fn console(script: &str) -> Console<Cursor<Vec<u8>>> {
        Console::new(Cursor::new(script.as_bytes().to_vec()))
    }

    #[test]
    fn test_parse_args() {
        let args = parse_args(["--config", "club.json", "sync"].map(String::from)).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("club.json")));
        assert_eq!(args.command, "sync");

        assert_eq!(parse_args(Vec::new()).unwrap().command, "menu");
        assert!(parse_args(["--config".to_string()]).is_err());
        assert!(parse_args(["sync", "extra"].map(String::from)).is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_names(" Alice, Bob ,,"), vec!["Alice", "Bob"]);
        assert!(parse_names("  ").is_empty());
    }

    #[test]
    fn test_menu_session() {
        let mut club = club();
        let credentials = AdminCredentials::from_password("coach");
        let mut console = console(
            "1\nAlice, Bob\nwin\n2\n0\n\
             3\nAlice\n10\n\
             4\nwrong\n5\n\n\
             4\ncoach\n4\nPitch\n\
             9\n5\n7\n",
        );

        run_menu(&mut club, &credentials, &mut console).unwrap();

        let alice = club.player("Alice").unwrap();
        assert_eq!(alice.points(), 3);
        assert_eq!(alice.goals_scored(), 2);
        assert_eq!(alice.contribution(), Money::from_units(10));
        // Denied expense left nothing behind
        assert_eq!(club.balance().unwrap(), Money::from_units(6));
    }

    #[test]
    fn test_menu_errors_do_not_stop_the_loop() {
        let mut club = club();
        let credentials = AdminCredentials::default();
        // Offence for an unknown player, then a missing goal entry, then exit at EOF
        let mut console = console("2\nGhost\n1\nAlice\ndraw\n\n");

        run_menu(&mut club, &credentials, &mut console).unwrap();

        assert!(matches!(club.player("Alice"), Err(RosterError::PlayerNotFound(_))));
        assert_eq!(club.projection().client().write_count(), 0);
    }
}

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::api::ApiClient;
use crate::config::Config;
use crate::events;
use crate::format::{format_date_time, initials, truncate};
use crate::session::SessionStore;
use crate::types::{Event, EventInput, User};
use crate::validate::{validate_event, validate_login, validate_registration, ValidationError};

#[derive(Parser)]
#[command(name = "gather", about = "A command-line client for the Gather event service")]
pub struct Args {
    #[arg(short, long, help = "Run a single command and exit")]
    pub command: Option<String>,

    #[arg(long, env = "GATHER_BASE_URL", help = "Backend base URL (with API prefix)")]
    pub base_url: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "GATHER_DATA_DIR", help = "Session data directory")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, help = "Print each HTTP call")]
    pub verbose: bool,
}

pub struct Context {
    pub args: Args,
    pub config: Config,
    pub api: ApiClient,
    pub session: Rc<RefCell<SessionStore>>,
}

pub fn run_once(ctx: &Context, line: &str) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    handle_command(ctx, &mut rl, line)?;
    Ok(())
}

pub fn run_repl(ctx: &Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("gather - type 'help' for commands, 'exit' to quit");
    if let Some(user) = ctx.session.borrow().current_user() {
        println!("Logged in as {} <{}>", user.name, user.email);
    }

    loop {
        match rl.readline("gather> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                match handle_command(ctx, &mut rl, line) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        }
    }

    Ok(())
}

/// Dispatch one command line. Returns true when the REPL should exit.
fn handle_command(ctx: &Context, rl: &mut DefaultEditor, line: &str) -> Result<bool> {
    let parts = shell_words::split(line).map_err(|e| anyhow!("bad quoting: {e}"))?;
    let Some(cmd) = parts.first() else {
        return Ok(false);
    };

    match cmd.as_str() {
        "exit" | "quit" => return Ok(true),
        "help" => print_help(),
        "login" => cmd_login(ctx, rl, &parts[1..])?,
        "register" => cmd_register(ctx, rl)?,
        "logout" => cmd_logout(ctx),
        "whoami" => cmd_whoami(ctx),
        "events" => cmd_events(ctx, &parts[1..].join(" "))?,
        "show" => cmd_show(ctx, parse_id(&parts, 1)?)?,
        "create" => cmd_create(ctx, rl)?,
        "edit" => cmd_edit(ctx, rl, parse_id(&parts, 1)?)?,
        "delete" => cmd_delete(ctx, rl, parse_id(&parts, 1)?)?,
        "attendees" => cmd_attendees(ctx, parse_id(&parts, 1)?)?,
        "join" => cmd_join(ctx, parse_id(&parts, 1)?)?,
        "leave" => cmd_leave(ctx, parse_id(&parts, 1)?)?,
        "mine" => cmd_mine(ctx)?,
        other => println!("Unknown command '{other}' - type 'help' for commands"),
    }

    Ok(false)
}

fn print_help() {
    println!("Commands:");
    println!("  events [query]    - list events, optionally filtered");
    println!("  show <id>         - show one event");
    println!("  attendees <id>    - list who's going");
    println!("  mine              - your joined events, upcoming and past");
    println!("  create            - create an event (prompts for fields)");
    println!("  edit <id>         - edit an event you own");
    println!("  delete <id>       - delete an event you own");
    println!("  join <id>         - join an event");
    println!("  leave <id>        - leave an event");
    println!("Account:");
    println!("  login [email]     - log in");
    println!("  register          - create an account and log in");
    println!("  logout            - log out");
    println!("  whoami            - show the current account");
    println!("  help              - show commands");
    println!("  exit              - quit");
}

fn cmd_login(ctx: &Context, rl: &mut DefaultEditor, args: &[String]) -> Result<()> {
    let email = match args.first() {
        Some(e) => e.clone(),
        None => prompt(rl, "Email: ")?,
    };
    let password = match args.get(1) {
        Some(p) => p.clone(),
        None => prompt(rl, "Password: ")?,
    };

    let errors = validate_login(&email, &password);
    if !errors.is_empty() {
        print_field_errors(&errors);
        bail!("not logged in");
    }

    let user = ctx.session.borrow_mut().login(&ctx.api, &email, &password)?;
    println!("Welcome back, {}!", user.name);
    Ok(())
}

fn cmd_register(ctx: &Context, rl: &mut DefaultEditor) -> Result<()> {
    let name = prompt(rl, "Name: ")?;
    let email = prompt(rl, "Email: ")?;
    let password = prompt(rl, "Password: ")?;
    let confirm = prompt(rl, "Confirm password: ")?;

    let mut errors = validate_registration(&email, &password, &name);
    if password != confirm {
        errors.push(ValidationError {
            field: "password".to_string(),
            message: "Passwords do not match".to_string(),
        });
    }
    if !errors.is_empty() {
        print_field_errors(&errors);
        bail!("account not created");
    }

    let user = ctx
        .session
        .borrow_mut()
        .register(&ctx.api, &email, &password, &name)?;
    println!("Account created. Welcome, {}!", user.name);
    Ok(())
}

fn cmd_logout(ctx: &Context) {
    ctx.session.borrow_mut().logout();
    println!("Logged out.");
}

fn cmd_whoami(ctx: &Context) {
    match ctx.session.borrow().current_user() {
        Some(user) => println!("{} <{}> (id {})", user.name, user.email, user.id),
        None => println!("Not logged in."),
    }
}

fn cmd_events(ctx: &Context, query: &str) -> Result<()> {
    let all = events::list_events(&ctx.api)
        .map_err(|e| anyhow!("{e} - run 'events' again to retry"))?;
    let hits = events::filter_events(&all, query);

    if hits.is_empty() {
        if query.trim().is_empty() {
            println!("No events yet.");
        } else {
            println!("No events match '{}'.", query.trim());
        }
        return Ok(());
    }

    println!("{} event{}:", hits.len(), if hits.len() == 1 { "" } else { "s" });
    for event in hits {
        print_event_line(event);
    }
    Ok(())
}

fn cmd_show(ctx: &Context, id: i64) -> Result<()> {
    match events::get_event(&ctx.api, id) {
        Ok(event) => {
            print_event(&event);
            Ok(())
        }
        Err(crate::api::ApiError::NotFound) => {
            println!("Event #{id} doesn't exist - 'events' lists what's on.");
            Ok(())
        }
        Err(e) => Err(anyhow!("{e} - run 'show {id}' again to retry")),
    }
}

fn cmd_create(ctx: &Context, rl: &mut DefaultEditor) -> Result<()> {
    let Some(_user) = require_user(ctx) else {
        return Ok(());
    };

    let input = read_event_form(rl, None)?;
    let errors = validate_event(&input, Utc::now());
    if !errors.is_empty() {
        print_field_errors(&errors);
        bail!("event not created");
    }

    let created = events::create_event(&ctx.api, &input)?;
    println!("Created event #{}: {}", created.id, created.name);
    Ok(())
}

fn cmd_edit(ctx: &Context, rl: &mut DefaultEditor, id: i64) -> Result<()> {
    let Some(user) = require_user(ctx) else {
        return Ok(());
    };

    let current = match events::get_event(&ctx.api, id) {
        Ok(event) => event,
        Err(crate::api::ApiError::NotFound) => {
            println!("Event #{id} doesn't exist - 'events' lists what's on.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if current.user_id != user.id {
        println!("Only the event's creator can edit it.");
        return Ok(());
    }

    println!("Editing '{}' - press enter to keep a value.", current.name);
    let input = read_event_form(rl, Some(&current))?;
    let errors = validate_event(&input, Utc::now());
    if !errors.is_empty() {
        print_field_errors(&errors);
        bail!("event not updated");
    }

    let updated = events::update_event(&ctx.api, id, &input)?;
    println!("Updated event #{}: {}", updated.id, updated.name);
    Ok(())
}

fn cmd_delete(ctx: &Context, rl: &mut DefaultEditor, id: i64) -> Result<()> {
    let Some(user) = require_user(ctx) else {
        return Ok(());
    };

    let current = match events::get_event(&ctx.api, id) {
        Ok(event) => event,
        Err(crate::api::ApiError::NotFound) => {
            println!("Event #{id} doesn't exist - 'events' lists what's on.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if current.user_id != user.id {
        println!("Only the event's creator can delete it.");
        return Ok(());
    }

    let answer = prompt(rl, &format!("Delete '{}'? [y/N] ", current.name))?;
    if !answer.eq_ignore_ascii_case("y") {
        println!("Kept.");
        return Ok(());
    }

    events::delete_event(&ctx.api, id)?;
    println!("Deleted event #{id}.");
    Ok(())
}

fn cmd_attendees(ctx: &Context, id: i64) -> Result<()> {
    let list = match events::list_attendees(&ctx.api, id) {
        Ok(list) => list,
        Err(crate::api::ApiError::NotFound) => {
            println!("Event #{id} doesn't exist - 'events' lists what's on.");
            return Ok(());
        }
        Err(e) => return Err(anyhow!("{e} - run 'attendees {id}' again to retry")),
    };

    if list.is_empty() {
        println!("Nobody has joined yet.");
        return Ok(());
    }

    println!("{} going:", list.len());
    for user in &list {
        println!("  [{}] {} <{}>", initials(&user.name), user.name, user.email);
    }
    Ok(())
}

fn cmd_join(ctx: &Context, id: i64) -> Result<()> {
    let Some(user) = require_user(ctx) else {
        return Ok(());
    };
    events::join_event(&ctx.api, id, user.id)?;
    println!("Joined event #{id}. See it under 'mine'.");
    Ok(())
}

fn cmd_leave(ctx: &Context, id: i64) -> Result<()> {
    let Some(user) = require_user(ctx) else {
        return Ok(());
    };
    events::leave_event(&ctx.api, id, user.id)?;
    println!("Left event #{id}.");
    Ok(())
}

fn cmd_mine(ctx: &Context) -> Result<()> {
    let Some(user) = require_user(ctx) else {
        return Ok(());
    };
    let mine = events::events_for_attendee(&ctx.api, user.id)
        .map_err(|e| anyhow!("{e} - run 'mine' again to retry"))?;
    let (upcoming, past) = events::partition_by_time(&mine, Utc::now());

    println!("Upcoming ({}):", upcoming.len());
    for event in upcoming {
        print_event_line(event);
    }
    println!("Past ({}):", past.len());
    for event in past {
        print_event_line(event);
    }
    Ok(())
}

/// Prompt field-by-field; with defaults (edit), empty input keeps the
/// current value.
fn read_event_form(rl: &mut DefaultEditor, defaults: Option<&Event>) -> Result<EventInput> {
    let name = prompt_with_default(rl, "Name", defaults.map(|e| e.name.clone()))?;
    let description =
        prompt_with_default(rl, "Description", defaults.map(|e| e.description.clone()))?;
    let location = prompt_with_default(rl, "Location", defaults.map(|e| e.location.clone()))?;

    let date_default = defaults.map(|e| e.date_time.format("%Y-%m-%dT%H:%M").to_string());
    let raw = prompt_with_default(rl, "Date and time (YYYY-MM-DDTHH:MM, UTC)", date_default)?;
    let date_time = parse_date_time(&raw)?;

    Ok(EventInput {
        name,
        description,
        location,
        date_time,
    })
}

/// Accepts the short form the original picker produced, or full RFC 3339.
fn parse_date_time(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| anyhow!("couldn't read '{raw}' as a date - use YYYY-MM-DDTHH:MM"))
}

fn prompt(rl: &mut DefaultEditor, label: &str) -> Result<String> {
    let line = rl.readline(label)?;
    Ok(line.trim().to_string())
}

fn prompt_with_default(
    rl: &mut DefaultEditor,
    label: &str,
    default: Option<String>,
) -> Result<String> {
    match default {
        Some(current) => {
            let line = prompt(rl, &format!("{label} [{current}]: "))?;
            Ok(if line.is_empty() { current } else { line })
        }
        None => prompt(rl, &format!("{label}: ")),
    }
}

/// Commands that act as the current user bail out with a notice when
/// nobody is logged in. Clones the user so no session borrow is held
/// across the network call.
fn require_user(ctx: &Context) -> Option<User> {
    let user = ctx.session.borrow().current_user();
    if user.is_none() {
        println!("You need to log in first - try 'login' or 'register'.");
    }
    user
}

fn parse_id(parts: &[String], index: usize) -> Result<i64> {
    let raw = parts
        .get(index)
        .ok_or_else(|| anyhow!("missing event id - usage: {} <id>", parts[0]))?;
    raw.parse()
        .map_err(|_| anyhow!("'{raw}' is not an event id"))
}

fn print_field_errors(errors: &[ValidationError]) {
    for error in errors {
        eprintln!("  {error}");
    }
}

fn print_event_line(event: &Event) {
    println!(
        "  #{:<4} {}  {} - {} - {}",
        event.id,
        event.name,
        format_date_time(&event.date_time),
        event.location,
        truncate(&event.description, 40)
    );
}

fn print_event(event: &Event) {
    println!("#{} {}", event.id, event.name);
    println!("  When:  {}", format_date_time(&event.date_time));
    println!("  Where: {}", event.location);
    println!("  {}", event.description);
}
